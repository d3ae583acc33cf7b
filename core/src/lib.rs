//! Blocking client for the Listen Notes podcast search API.
//!
//! # Overview
//! `PodcastClient` exposes one method per Listen API endpoint. Each method
//! fills a fixed URL template, attaches the API key and User-Agent headers and
//! hands the request to a `Transport`, which sends it with bounded retries,
//! bounded redirects and a timeout, then maps error statuses to `ApiError`.
//!
//! # Design
//! - `Transport` is stateless between calls; its `SessionConfig` is
//!   immutable and the network backend sits behind the `Sender` trait.
//! - Endpoints are data (`Endpoint::spec`), so path parameters, verbs and
//!   parameter placement are declared in one table.
//! - No global state: the API key, base URL and retry settings are given to
//!   `ClientBuilder` explicitly (or read once by `ClientBuilder::from_env`).
//!
//! ```rust,no_run
//! use podcast_api::{ApiError, Params, PodcastClient};
//!
//! let client = PodcastClient::new(None)?;
//! match client.search(Params::new().with("q", "startup")) {
//!     Ok(response) => println!("{}", response.body),
//!     Err(ApiError::RateLimit { .. }) => println!("quota exhausted"),
//!     Err(e) => println!("request failed: {e}"),
//! }
//! # Ok::<(), podcast_api::ConfigError>(())
//! ```

pub mod client;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod http;
pub mod retry;
pub mod sender;
pub mod transport;

pub use client::{ClientBuilder, PodcastClient, API_BASE_PROD, API_BASE_TEST, VERSION};
pub use config::{SessionConfig, SessionConfigBuilder};
pub use endpoint::{Endpoint, EndpointSpec, Params, Placement};
pub use error::{ApiError, ConfigError, ErrorKind, SendError};
pub use http::{AccountUsage, HttpMethod, HttpRequest, HttpResponse, PreparedRequest, RequestParts};
pub use retry::Backoff;
pub use sender::{Sender, UreqSender};
pub use transport::Transport;
