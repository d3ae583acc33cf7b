//! Listen API endpoint table.
//!
//! # Design
//! Each endpoint is described by data rather than code: its verb, a path
//! template whose `{name}` segments are filled from the caller's parameters,
//! and where the remaining parameters go (query string or form body).
//! Parameters other than path parameters are passed through verbatim; the
//! API itself is the authority on which names it accepts.

use std::fmt;

use crate::error::ApiError;
use crate::http::HttpMethod;

/// Where non-path parameters are placed on the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    Query,
    Form,
}

/// Static description of one endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndpointSpec {
    pub method: HttpMethod,
    /// Path relative to the API base, e.g. `/podcasts/{id}`.
    pub template: &'static str,
    pub placement: Placement,
}

impl EndpointSpec {
    const fn get(template: &'static str) -> Self {
        Self {
            method: HttpMethod::Get,
            template,
            placement: Placement::Query,
        }
    }

    const fn post(template: &'static str) -> Self {
        Self {
            method: HttpMethod::Post,
            template,
            placement: Placement::Form,
        }
    }

    const fn delete(template: &'static str) -> Self {
        Self {
            method: HttpMethod::Delete,
            template,
            placement: Placement::Query,
        }
    }

    /// Names of the `{...}` segments in the template, in order.
    pub fn path_params(&self) -> impl Iterator<Item = &'static str> {
        self.template.split('/').filter_map(path_param_name)
    }
}

fn path_param_name(segment: &str) -> Option<&str> {
    segment.strip_prefix('{')?.strip_suffix('}')
}

/// Every operation the Listen API exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Search,
    Typeahead,
    Spellcheck,
    RelatedSearches,
    TrendingSearches,
    BestPodcasts,
    PodcastById,
    EpisodeById,
    BatchFetchPodcasts,
    BatchFetchEpisodes,
    CuratedPodcastsListById,
    CuratedPodcastsLists,
    PodcastGenres,
    PodcastRegions,
    PodcastLanguages,
    JustListen,
    PodcastRecommendations,
    EpisodeRecommendations,
    PlaylistById,
    MyPlaylists,
    SubmitPodcast,
    DeletePodcast,
}

impl Endpoint {
    pub const ALL: [Endpoint; 22] = [
        Endpoint::Search,
        Endpoint::Typeahead,
        Endpoint::Spellcheck,
        Endpoint::RelatedSearches,
        Endpoint::TrendingSearches,
        Endpoint::BestPodcasts,
        Endpoint::PodcastById,
        Endpoint::EpisodeById,
        Endpoint::BatchFetchPodcasts,
        Endpoint::BatchFetchEpisodes,
        Endpoint::CuratedPodcastsListById,
        Endpoint::CuratedPodcastsLists,
        Endpoint::PodcastGenres,
        Endpoint::PodcastRegions,
        Endpoint::PodcastLanguages,
        Endpoint::JustListen,
        Endpoint::PodcastRecommendations,
        Endpoint::EpisodeRecommendations,
        Endpoint::PlaylistById,
        Endpoint::MyPlaylists,
        Endpoint::SubmitPodcast,
        Endpoint::DeletePodcast,
    ];

    pub fn spec(self) -> EndpointSpec {
        match self {
            Endpoint::Search => EndpointSpec::get("/search"),
            Endpoint::Typeahead => EndpointSpec::get("/typeahead"),
            Endpoint::Spellcheck => EndpointSpec::get("/spellcheck"),
            Endpoint::RelatedSearches => EndpointSpec::get("/related_searches"),
            Endpoint::TrendingSearches => EndpointSpec::get("/trending_searches"),
            Endpoint::BestPodcasts => EndpointSpec::get("/best_podcasts"),
            Endpoint::PodcastById => EndpointSpec::get("/podcasts/{id}"),
            Endpoint::EpisodeById => EndpointSpec::get("/episodes/{id}"),
            Endpoint::BatchFetchPodcasts => EndpointSpec::post("/podcasts"),
            Endpoint::BatchFetchEpisodes => EndpointSpec::post("/episodes"),
            Endpoint::CuratedPodcastsListById => EndpointSpec::get("/curated_podcasts/{id}"),
            Endpoint::CuratedPodcastsLists => EndpointSpec::get("/curated_podcasts"),
            Endpoint::PodcastGenres => EndpointSpec::get("/genres"),
            Endpoint::PodcastRegions => EndpointSpec::get("/regions"),
            Endpoint::PodcastLanguages => EndpointSpec::get("/languages"),
            Endpoint::JustListen => EndpointSpec::get("/just_listen"),
            Endpoint::PodcastRecommendations => {
                EndpointSpec::get("/podcasts/{id}/recommendations")
            }
            Endpoint::EpisodeRecommendations => {
                EndpointSpec::get("/episodes/{id}/recommendations")
            }
            Endpoint::PlaylistById => EndpointSpec::get("/playlists/{id}"),
            Endpoint::MyPlaylists => EndpointSpec::get("/playlists"),
            Endpoint::SubmitPodcast => EndpointSpec::post("/podcasts/submit"),
            Endpoint::DeletePodcast => EndpointSpec::delete("/podcasts/{id}"),
        }
    }

    /// Snake-case operation name, matching the `PodcastClient` method.
    pub fn name(self) -> &'static str {
        match self {
            Endpoint::Search => "search",
            Endpoint::Typeahead => "typeahead",
            Endpoint::Spellcheck => "spellcheck",
            Endpoint::RelatedSearches => "fetch_related_searches",
            Endpoint::TrendingSearches => "fetch_trending_searches",
            Endpoint::BestPodcasts => "fetch_best_podcasts",
            Endpoint::PodcastById => "fetch_podcast_by_id",
            Endpoint::EpisodeById => "fetch_episode_by_id",
            Endpoint::BatchFetchPodcasts => "batch_fetch_podcasts",
            Endpoint::BatchFetchEpisodes => "batch_fetch_episodes",
            Endpoint::CuratedPodcastsListById => "fetch_curated_podcasts_list_by_id",
            Endpoint::CuratedPodcastsLists => "fetch_curated_podcasts_lists",
            Endpoint::PodcastGenres => "fetch_podcast_genres",
            Endpoint::PodcastRegions => "fetch_podcast_regions",
            Endpoint::PodcastLanguages => "fetch_podcast_languages",
            Endpoint::JustListen => "just_listen",
            Endpoint::PodcastRecommendations => "fetch_recommendations_for_podcast",
            Endpoint::EpisodeRecommendations => "fetch_recommendations_for_episode",
            Endpoint::PlaylistById => "fetch_playlist_by_id",
            Endpoint::MyPlaylists => "fetch_my_playlists",
            Endpoint::SubmitPodcast => "submit_podcast",
            Endpoint::DeletePodcast => "delete_podcast",
        }
    }

    pub fn from_name(name: &str) -> Option<Endpoint> {
        Endpoint::ALL.into_iter().find(|e| e.name() == name)
    }

    /// Split `params` into path segments (relative to the API base) and the
    /// parameters left to forward.
    ///
    /// Fails with `InvalidRequest` when a path parameter is missing, empty, or
    /// a dot segment (`.`, `..`) that URL normalization would drop.
    pub fn resolve(self, mut params: Params) -> Result<(Vec<String>, Params), ApiError> {
        let spec = self.spec();
        let mut segments = Vec::new();
        for segment in spec.template.split('/').filter(|s| !s.is_empty()) {
            match path_param_name(segment) {
                Some(name) => match params.remove(name) {
                    Some(value) if value == "." || value == ".." => {
                        return Err(ApiError::invalid(format!(
                            "{} got '{value}' for '{name}', which is not a valid path segment",
                            self.name()
                        )))
                    }
                    Some(value) if !value.is_empty() => segments.push(value),
                    _ => {
                        return Err(ApiError::invalid(format!(
                            "{} requires a non-empty '{name}' parameter",
                            self.name()
                        )))
                    }
                },
                None => segments.push(segment.to_string()),
            }
        }
        Ok((segments, params))
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Parameters of one endpoint call, in insertion order.
///
/// Path parameters such as `id` are taken out by the endpoint; everything else
/// is forwarded unchanged as query parameters or form fields. Setting a name
/// twice keeps the latest value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params {
    pairs: Vec<(String, String)>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `name` to `value`, builder style.
    pub fn with(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl ToString) {
        let name = name.into();
        let value = value.to_string();
        match self.pairs.iter_mut().find(|(k, _)| *k == name) {
            Some(pair) => pair.1 = value,
            None => self.pairs.push((name, value)),
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        let index = self.pairs.iter().position(|(k, _)| k == name)?;
        Some(self.pairs.remove(index).1)
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn into_pairs(self) -> Vec<(String, String)> {
        self.pairs
    }
}

impl<K: Into<String>, V: ToString> FromIterator<(K, V)> for Params {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Params::new();
        for (k, v) in iter {
            params.insert(k, v);
        }
        params
    }
}

impl<K: Into<String>, V: ToString, const N: usize> From<[(K, V); N]> for Params {
    fn from(pairs: [(K, V); N]) -> Self {
        pairs.into_iter().collect()
    }
}
