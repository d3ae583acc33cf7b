//! Listen API client.
//!
//! # Design
//! `PodcastClient` holds a `Transport`, the base URL and the headers attached
//! to every request. Each endpoint method is a thin binding of an `Endpoint`
//! to `call`; `build_request` exposes the request that `call` would send so
//! it can be inspected without touching the network. Errors from the
//! transport are never caught or reinterpreted here.
//!
//! Without an API key the client talks to the test server, which serves mock
//! data; with a key it talks to production.

use std::sync::Arc;

use url::Url;

use crate::config::SessionConfig;
use crate::endpoint::{Endpoint, Params, Placement};
use crate::error::{ApiError, ConfigError};
use crate::http::{HttpRequest, HttpResponse};
use crate::sender::Sender;
use crate::transport::Transport;

pub const API_BASE_PROD: &str = "https://listen-api.listennotes.com/api/v2";
pub const API_BASE_TEST: &str = "https://listen-api-test.listennotes.com/api/v2";

pub const API_KEY_HEADER: &str = "X-ListenAPI-Key";
pub const API_KEY_ENV: &str = "LISTEN_API_KEY";
pub const MAX_RETRIES_ENV: &str = "LISTEN_API_MAX_RETRIES";
pub const TIMEOUT_ENV: &str = "LISTEN_API_TIMEOUT_SECS";

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub fn default_user_agent() -> String {
    format!("podcasts-api-rust {VERSION}")
}

/// Builder for configuring [`PodcastClient`].
#[derive(Clone, Default)]
pub struct ClientBuilder {
    api_key: Option<String>,
    user_agent: Option<String>,
    base_url: Option<String>,
    session: SessionConfig,
    sender: Option<Arc<dyn Sender>>,
}

impl std::fmt::Debug for ClientBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientBuilder")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("user_agent", &self.user_agent)
            .field("base_url", &self.base_url)
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

impl ClientBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder seeded from `LISTEN_API_KEY`, `LISTEN_API_MAX_RETRIES` and
    /// `LISTEN_API_TIMEOUT_SECS`. Unset variables keep their defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut session = SessionConfig::builder();
        if let Some(value) = lookup(MAX_RETRIES_ENV) {
            let retries = value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                name: MAX_RETRIES_ENV,
                value: value.clone(),
            })?;
            session = session.max_retries(retries);
        }
        if let Some(value) = lookup(TIMEOUT_ENV) {
            let secs = value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                name: TIMEOUT_ENV,
                value: value.clone(),
            })?;
            session = session.timeout_secs(secs);
        }

        let mut builder = Self::new().session(session.build()?);
        if let Some(key) = lookup(API_KEY_ENV).filter(|k| !k.trim().is_empty()) {
            builder = builder.api_key(key.trim());
        }
        Ok(builder)
    }

    /// API key sent as `X-ListenAPI-Key`. Also selects the production server.
    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Override the base URL chosen from the presence of an API key.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn session(mut self, session: SessionConfig) -> Self {
        self.session = session;
        self
    }

    /// Replace the HTTP backend.
    pub fn sender(mut self, sender: Arc<dyn Sender>) -> Self {
        self.sender = Some(sender);
        self
    }

    pub fn build(self) -> Result<PodcastClient, ConfigError> {
        // A blank key is no key: sandbox base URL and no auth header.
        let api_key = self.api_key.filter(|key| !key.trim().is_empty());
        let base_url = match self.base_url {
            Some(url) => url,
            None if api_key.is_some() => API_BASE_PROD.to_string(),
            None => API_BASE_TEST.to_string(),
        };
        let base_url = base_url.trim_end_matches('/').to_string();
        let parsed = Url::parse(&base_url).map_err(|source| ConfigError::InvalidBaseUrl {
            url: base_url.clone(),
            source,
        })?;
        if parsed.cannot_be_a_base() {
            return Err(ConfigError::OpaqueBaseUrl(base_url));
        }

        let mut headers = Vec::new();
        if let Some(key) = api_key {
            headers.push((API_KEY_HEADER.to_string(), key));
        }
        headers.push((
            "User-Agent".to_string(),
            self.user_agent.unwrap_or_else(default_user_agent),
        ));

        let transport = match self.sender {
            Some(sender) => Transport::with_sender(self.session, sender),
            None => Transport::new(self.session),
        };

        tracing::debug!(base_url = %parsed, "Created Listen API client");
        Ok(PodcastClient {
            transport,
            base_url: parsed,
            headers,
        })
    }
}

/// Synchronous client for the Listen API. Cheap to clone and safe to share
/// across threads.
#[derive(Debug, Clone)]
pub struct PodcastClient {
    transport: Transport,
    base_url: Url,
    headers: Vec<(String, String)>,
}

impl PodcastClient {
    /// Client with default settings. Without an API key requests go to the
    /// mock-data test server.
    pub fn new(api_key: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = ClientBuilder::new();
        if let Some(key) = api_key {
            builder = builder.api_key(key);
        }
        builder.build()
    }

    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    /// Headers attached to every request.
    pub fn request_headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn api_key(&self) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k == API_KEY_HEADER)
            .map(|(_, v)| v.as_str())
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    /// The request `call` would send for `endpoint` with `params`.
    pub fn build_request(&self, endpoint: Endpoint, params: Params) -> Result<HttpRequest, ApiError> {
        let spec = endpoint.spec();
        let (segments, rest) = endpoint.resolve(params)?;

        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::invalid(format!("base url {} cannot carry a path", self.base_url)))?
            .pop_if_empty()
            .extend(segments);

        let mut request = HttpRequest::new(spec.method, url.to_string());
        request.headers = self.headers.clone();
        match spec.placement {
            Placement::Query => request.query = rest.into_pairs(),
            Placement::Form => request.form = Some(rest.into_pairs()),
        }
        Ok(request)
    }

    /// Build and send the request for `endpoint`.
    pub fn call(&self, endpoint: Endpoint, params: Params) -> Result<HttpResponse, ApiError> {
        let request = self.build_request(endpoint, params)?;
        tracing::trace!(endpoint = %endpoint, url = %request.url, "Calling Listen API");
        self.transport.execute(request)
    }

    /// Full-text search on episodes, podcasts or curated lists.
    pub fn search(&self, params: Params) -> Result<HttpResponse, ApiError> {
        self.call(Endpoint::Search, params)
    }

    /// Autocomplete suggestions, genres and podcasts for a partial query.
    pub fn typeahead(&self, params: Params) -> Result<HttpResponse, ApiError> {
        self.call(Endpoint::Typeahead, params)
    }

    pub fn spellcheck(&self, params: Params) -> Result<HttpResponse, ApiError> {
        self.call(Endpoint::Spellcheck, params)
    }

    pub fn fetch_related_searches(&self, params: Params) -> Result<HttpResponse, ApiError> {
        self.call(Endpoint::RelatedSearches, params)
    }

    pub fn fetch_trending_searches(&self, params: Params) -> Result<HttpResponse, ApiError> {
        self.call(Endpoint::TrendingSearches, params)
    }

    pub fn fetch_best_podcasts(&self, params: Params) -> Result<HttpResponse, ApiError> {
        self.call(Endpoint::BestPodcasts, params)
    }

    /// Podcast metadata and episodes. Requires `id`.
    pub fn fetch_podcast_by_id(&self, params: Params) -> Result<HttpResponse, ApiError> {
        self.call(Endpoint::PodcastById, params)
    }

    /// Episode metadata. Requires `id`.
    pub fn fetch_episode_by_id(&self, params: Params) -> Result<HttpResponse, ApiError> {
        self.call(Endpoint::EpisodeById, params)
    }

    /// Several podcasts at once, e.g. `ids` as a comma-separated list.
    pub fn batch_fetch_podcasts(&self, params: Params) -> Result<HttpResponse, ApiError> {
        self.call(Endpoint::BatchFetchPodcasts, params)
    }

    pub fn batch_fetch_episodes(&self, params: Params) -> Result<HttpResponse, ApiError> {
        self.call(Endpoint::BatchFetchEpisodes, params)
    }

    /// Requires `id`.
    pub fn fetch_curated_podcasts_list_by_id(&self, params: Params) -> Result<HttpResponse, ApiError> {
        self.call(Endpoint::CuratedPodcastsListById, params)
    }

    pub fn fetch_curated_podcasts_lists(&self, params: Params) -> Result<HttpResponse, ApiError> {
        self.call(Endpoint::CuratedPodcastsLists, params)
    }

    pub fn fetch_podcast_genres(&self, params: Params) -> Result<HttpResponse, ApiError> {
        self.call(Endpoint::PodcastGenres, params)
    }

    pub fn fetch_podcast_regions(&self, params: Params) -> Result<HttpResponse, ApiError> {
        self.call(Endpoint::PodcastRegions, params)
    }

    pub fn fetch_podcast_languages(&self, params: Params) -> Result<HttpResponse, ApiError> {
        self.call(Endpoint::PodcastLanguages, params)
    }

    /// A random episode.
    pub fn just_listen(&self, params: Params) -> Result<HttpResponse, ApiError> {
        self.call(Endpoint::JustListen, params)
    }

    /// Requires `id`.
    pub fn fetch_recommendations_for_podcast(&self, params: Params) -> Result<HttpResponse, ApiError> {
        self.call(Endpoint::PodcastRecommendations, params)
    }

    /// Requires `id`.
    pub fn fetch_recommendations_for_episode(&self, params: Params) -> Result<HttpResponse, ApiError> {
        self.call(Endpoint::EpisodeRecommendations, params)
    }

    /// Requires `id`.
    pub fn fetch_playlist_by_id(&self, params: Params) -> Result<HttpResponse, ApiError> {
        self.call(Endpoint::PlaylistById, params)
    }

    pub fn fetch_my_playlists(&self, params: Params) -> Result<HttpResponse, ApiError> {
        self.call(Endpoint::MyPlaylists, params)
    }

    /// Submit an RSS feed (`rss`) to the podcast database.
    pub fn submit_podcast(&self, params: Params) -> Result<HttpResponse, ApiError> {
        self.call(Endpoint::SubmitPodcast, params)
    }

    /// Request removal of a podcast. Requires `id`.
    pub fn delete_podcast(&self, params: Params) -> Result<HttpResponse, ApiError> {
        self.call(Endpoint::DeletePodcast, params)
    }
}
