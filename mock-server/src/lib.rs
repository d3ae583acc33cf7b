//! In-memory imitation of the Listen API for integration tests.
//!
//! API routes live under `/api/v2` and serve a small fixture catalogue. The
//! routes outside that prefix (`/status/{code}`, `/redirect/{n}`, `/echo`)
//! exist to exercise client plumbing: status mapping, redirect limits and the
//! exact request that went over the wire.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::{
    extract::{OriginalUri, Path, Query, Request, State},
    http::{HeaderMap, HeaderValue, Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Redirect, Response},
    routing::{any, get, post},
    Form, Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

pub const API_KEY_HEADER: &str = "x-listenapi-key";
/// Requests carrying this key are answered with 401.
pub const REVOKED_KEY: &str = "revoked";
pub const FREE_QUOTA: u64 = 300;
pub const NEXT_BILLING_DATE: &str = "2026-11-01T00:00:00+00:00";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Podcast {
    pub id: String,
    pub title: String,
    pub publisher: String,
    pub rss: String,
    pub total_episodes: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Episode {
    pub id: String,
    pub podcast_id: String,
    pub title: String,
    pub audio_length_sec: u32,
}

#[derive(Debug, Default)]
pub struct Catalog {
    pub podcasts: BTreeMap<String, Podcast>,
    pub episodes: BTreeMap<String, Episode>,
}

impl Catalog {
    pub fn fixtures() -> Self {
        let podcasts = [
            ("4d3fe717742d4963a85562e9f84d8c79", "Star Talk Radio", "Neil deGrasse Tyson", 2),
            ("25212ac3c53240a880dd5032e547047b", "Startup Stories", "Mixergy", 1),
            ("8758da9be6c8452884a8cab6373b007c", "The Daily Bytes", "Bytes Media", 0),
        ];
        let episodes = [
            ("6b6d65930c5a4f71b254465871fed370", "4d3fe717742d4963a85562e9f84d8c79", "Cosmic Queries", 3120),
            ("02f0123246c944e289ee2bb90804e41b", "4d3fe717742d4963a85562e9f84d8c79", "Black Holes", 2890),
            ("c577d55b2b2b483c969fae3ceb58e362", "25212ac3c53240a880dd5032e547047b", "Bootstrapped to Exit", 1800),
        ];

        let mut catalog = Catalog::default();
        for (id, title, publisher, total_episodes) in podcasts {
            catalog.podcasts.insert(
                id.to_string(),
                Podcast {
                    id: id.to_string(),
                    title: title.to_string(),
                    publisher: publisher.to_string(),
                    rss: format!("https://feeds.example.com/{id}.xml"),
                    total_episodes,
                },
            );
        }
        for (id, podcast_id, title, audio_length_sec) in episodes {
            catalog.episodes.insert(
                id.to_string(),
                Episode {
                    id: id.to_string(),
                    podcast_id: podcast_id.to_string(),
                    title: title.to_string(),
                    audio_length_sec,
                },
            );
        }
        catalog
    }
}

#[derive(Clone)]
pub struct AppState {
    catalog: Arc<RwLock<Catalog>>,
    usage: Arc<AtomicU64>,
}

impl AppState {
    pub fn new(catalog: Catalog) -> Self {
        Self {
            catalog: Arc::new(RwLock::new(catalog)),
            usage: Arc::new(AtomicU64::new(0)),
        }
    }
}

pub fn app() -> Router {
    let state = AppState::new(Catalog::fixtures());

    let api = Router::new()
        .route("/search", get(search))
        .route("/typeahead", get(typeahead))
        .route("/spellcheck", get(echo))
        .route("/related_searches", get(echo))
        .route("/trending_searches", get(echo))
        .route("/best_podcasts", get(best_podcasts))
        .route("/podcasts", post(batch_fetch_podcasts))
        .route("/podcasts/submit", post(submit_podcast))
        .route("/podcasts/{id}", get(fetch_podcast).delete(delete_podcast))
        .route("/podcasts/{id}/recommendations", get(podcast_recommendations))
        .route("/episodes", post(batch_fetch_episodes))
        .route("/episodes/{id}", get(fetch_episode))
        .route("/episodes/{id}/recommendations", get(echo))
        .route("/curated_podcasts", get(echo))
        .route("/curated_podcasts/{id}", get(echo))
        .route("/genres", get(echo))
        .route("/regions", get(echo))
        .route("/languages", get(echo))
        .route("/just_listen", get(just_listen))
        .route("/playlists", get(echo))
        .route("/playlists/{id}", get(echo))
        .layer(middleware::from_fn_with_state(state.clone(), api_gate))
        .with_state(state);

    Router::new()
        .nest("/api/v2", api)
        .route("/status/{code}", any(status))
        .route("/redirect/{n}", any(redirect_chain))
        .route("/echo", any(echo))
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

/// Rejects the revoked key and stamps the quota headers on every API response.
async fn api_gate(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let key = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok());
    let mut response = if key == Some(REVOKED_KEY) {
        error(StatusCode::UNAUTHORIZED, "wrong api key or account suspended")
    } else {
        next.run(request).await
    };

    let usage = state.usage.fetch_add(1, Ordering::SeqCst) + 1;
    let headers = response.headers_mut();
    headers.insert("x-listenapi-freequota", HeaderValue::from(FREE_QUOTA));
    headers.insert("x-listenapi-usage", HeaderValue::from(usage));
    headers.insert(
        "x-listenapi-nextbillingdate",
        HeaderValue::from_static(NEXT_BILLING_DATE),
    );
    response
}

fn error(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

#[derive(Deserialize)]
struct SearchQuery {
    q: Option<String>,
    offset: Option<usize>,
}

async fn search(State(state): State<AppState>, Query(query): Query<SearchQuery>) -> Response {
    let Some(q) = query.q.filter(|q| !q.trim().is_empty()) else {
        return error(StatusCode::BAD_REQUEST, "missing required parameter: q");
    };
    let needle = q.to_lowercase();
    let catalog = state.catalog.read().await;
    let matches: Vec<&Podcast> = catalog
        .podcasts
        .values()
        .filter(|p| p.title.to_lowercase().contains(&needle))
        .collect();
    let offset = query.offset.unwrap_or(0);
    let results: Vec<&Podcast> = matches.iter().skip(offset).copied().collect();
    Json(json!({
        "count": results.len(),
        "total": matches.len(),
        "next_offset": offset + results.len(),
        "results": results,
    }))
    .into_response()
}

#[derive(Deserialize)]
struct TypeaheadQuery {
    q: Option<String>,
    show_podcasts: Option<u8>,
}

async fn typeahead(State(state): State<AppState>, Query(query): Query<TypeaheadQuery>) -> Response {
    let Some(q) = query.q else {
        return error(StatusCode::BAD_REQUEST, "missing required parameter: q");
    };
    let podcasts: Vec<Podcast> = if query.show_podcasts == Some(1) {
        let needle = q.to_lowercase();
        let catalog = state.catalog.read().await;
        catalog
            .podcasts
            .values()
            .filter(|p| p.title.to_lowercase().starts_with(&needle))
            .cloned()
            .collect()
    } else {
        Vec::new()
    };
    Json(json!({ "terms": [q], "genres": [], "podcasts": podcasts })).into_response()
}

async fn best_podcasts(State(state): State<AppState>) -> Json<Value> {
    let catalog = state.catalog.read().await;
    let podcasts: Vec<&Podcast> = catalog.podcasts.values().collect();
    Json(json!({ "podcasts": podcasts, "page_number": 1, "has_next": false }))
}

async fn fetch_podcast(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let catalog = state.catalog.read().await;
    let Some(podcast) = catalog.podcasts.get(&id) else {
        return error(StatusCode::NOT_FOUND, "podcast not found");
    };
    let episodes: Vec<&Episode> = catalog
        .episodes
        .values()
        .filter(|e| e.podcast_id == id)
        .collect();
    Json(json!({ "podcast": podcast, "episodes": episodes })).into_response()
}

async fn delete_podcast(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let mut catalog = state.catalog.write().await;
    match catalog.podcasts.remove(&id) {
        Some(podcast) => Json(json!({ "status": "deleted", "podcast": podcast })).into_response(),
        None => error(StatusCode::NOT_FOUND, "podcast not found"),
    }
}

async fn podcast_recommendations(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Response {
    let catalog = state.catalog.read().await;
    if !catalog.podcasts.contains_key(&id) {
        return error(StatusCode::NOT_FOUND, "podcast not found");
    }
    let recommendations: Vec<&Podcast> = catalog.podcasts.values().filter(|p| p.id != id).collect();
    Json(json!({ "recommendations": recommendations })).into_response()
}

#[derive(Deserialize)]
struct BatchForm {
    ids: Option<String>,
}

fn split_ids(ids: &str) -> impl Iterator<Item = &str> {
    ids.split(',').map(str::trim).filter(|id| !id.is_empty())
}

async fn batch_fetch_podcasts(State(state): State<AppState>, Form(form): Form<BatchForm>) -> Response {
    let Some(ids) = form.ids else {
        return error(StatusCode::BAD_REQUEST, "missing required parameter: ids");
    };
    let catalog = state.catalog.read().await;
    let podcasts: Vec<&Podcast> = split_ids(&ids)
        .filter_map(|id| catalog.podcasts.get(id))
        .collect();
    Json(json!({ "podcasts": podcasts })).into_response()
}

async fn batch_fetch_episodes(State(state): State<AppState>, Form(form): Form<BatchForm>) -> Response {
    let Some(ids) = form.ids else {
        return error(StatusCode::BAD_REQUEST, "missing required parameter: ids");
    };
    let catalog = state.catalog.read().await;
    let episodes: Vec<&Episode> = split_ids(&ids)
        .filter_map(|id| catalog.episodes.get(id))
        .collect();
    Json(json!({ "episodes": episodes })).into_response()
}

#[derive(Deserialize)]
struct SubmitForm {
    rss: Option<String>,
}

async fn submit_podcast(State(state): State<AppState>, Form(form): Form<SubmitForm>) -> Response {
    let Some(rss) = form.rss.filter(|r| !r.trim().is_empty()) else {
        return error(StatusCode::BAD_REQUEST, "missing required parameter: rss");
    };
    let podcast = Podcast {
        id: Uuid::new_v4().simple().to_string(),
        title: String::new(),
        publisher: String::new(),
        rss,
        total_episodes: 0,
    };
    state
        .catalog
        .write()
        .await
        .podcasts
        .insert(podcast.id.clone(), podcast.clone());
    Json(json!({ "status": "in review", "podcast": podcast })).into_response()
}

async fn fetch_episode(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let catalog = state.catalog.read().await;
    match catalog.episodes.get(&id) {
        Some(episode) => Json(episode.clone()).into_response(),
        None => error(StatusCode::NOT_FOUND, "episode not found"),
    }
}

async fn just_listen(State(state): State<AppState>) -> Response {
    let catalog = state.catalog.read().await;
    match catalog.episodes.values().next() {
        Some(episode) => Json(episode.clone()).into_response(),
        None => error(StatusCode::NOT_FOUND, "no episodes"),
    }
}

/// Answer with the requested status code.
async fn status(Path(code): Path<u16>) -> Response {
    match StatusCode::from_u16(code) {
        Ok(status) => (status, Json(json!({ "status": code }))).into_response(),
        Err(_) => error(StatusCode::BAD_REQUEST, "invalid status code"),
    }
}

/// `/redirect/{n}` redirects to `/redirect/{n-1}`; `/redirect/0` answers 200.
async fn redirect_chain(Path(n): Path<u32>) -> Response {
    if n == 0 {
        return Json(json!({ "redirected": true })).into_response();
    }
    Redirect::temporary(&format!("/redirect/{}", n - 1)).into_response()
}

/// Echo the request as JSON: method, full path, query, form body, headers.
async fn echo(
    method: Method,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
    body: String,
) -> Json<Value> {
    let query: BTreeMap<String, String> = uri
        .query()
        .map(|q| url::form_urlencoded::parse(q.as_bytes()).into_owned().collect())
        .unwrap_or_default();
    let form: BTreeMap<String, String> =
        url::form_urlencoded::parse(body.as_bytes()).into_owned().collect();
    let headers: BTreeMap<String, String> = headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect();

    Json(json!({
        "method": method.as_str(),
        "path": uri.path(),
        "query": query,
        "form": form,
        "headers": headers,
    }))
}
