//! Request execution with bounded retries and redirects.
//!
//! # Design
//! `Transport` is stateless between calls: it holds the immutable
//! `SessionConfig` and a shared `Sender`. Each `execute` call prepares the
//! request, sends it (retrying transport failures within the configured
//! budget), follows redirects up to the configured limit and finally maps the
//! status code to an `ApiError` when `raise_on_error` is set.

use std::sync::Arc;
use std::thread;

use crate::config::SessionConfig;
use crate::error::{ApiError, SendError};
use crate::http::{HttpMethod, HttpRequest, HttpResponse, PreparedRequest, RequestParts};
use crate::sender::{Sender, UreqSender};

/// Issues HTTP requests on behalf of the client. Cheap to clone; clones share
/// the same connection pool.
#[derive(Clone)]
pub struct Transport {
    config: SessionConfig,
    sender: Arc<dyn Sender>,
}

impl std::fmt::Debug for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transport")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Transport {
    /// Transport backed by a `ureq` agent configured from `config`.
    pub fn new(config: SessionConfig) -> Self {
        let sender = Arc::new(UreqSender::new(&config));
        Self { config, sender }
    }

    /// Transport backed by a custom sender.
    pub fn with_sender(config: SessionConfig, sender: Arc<dyn Sender>) -> Self {
        Self { config, sender }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Encode `request` into the exact form that would be put on the wire.
    pub fn prepare(&self, request: &HttpRequest) -> Result<PreparedRequest, ApiError> {
        PreparedRequest::from_request(request)
    }

    /// Send `request` and return the final response.
    ///
    /// # Errors
    ///
    /// - `InvalidRequest` if the URL is not an absolute http(s) URL (nothing is
    ///   sent).
    /// - `Connection` once transport failures exhaust the retry budget.
    /// - `Unknown` when redirects exceed the limit or cannot be followed.
    /// - With `raise_on_error`, the kind mapped from an error status.
    pub fn execute(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        let mut prepared = self.prepare(&request)?;
        let mut retries = 0;
        let mut redirects = 0;

        loop {
            let response = self.send_with_retry(&prepared, &mut retries)?;

            let Some(next) = follow_redirect(&prepared, &response)? else {
                tracing::trace!(
                    method = %prepared.method,
                    url = %prepared.url,
                    status = response.status,
                    "request complete"
                );
                return if self.config.raise_on_error() {
                    ApiError::from_status(response)
                } else {
                    Ok(response)
                };
            };

            if redirects >= self.config.max_redirects() {
                return Err(ApiError::Unknown {
                    message: format!(
                        "exceeded {} redirects, last hop from {}",
                        self.config.max_redirects(),
                        prepared.url
                    ),
                    response: Some(Arc::new(response)),
                });
            }
            redirects += 1;
            tracing::debug!(
                redirect = redirects,
                status = response.status,
                from = %prepared.url,
                to = %next.url,
                "Following redirect"
            );
            prepared = next;
        }
    }

    fn send_with_retry(
        &self,
        request: &PreparedRequest,
        retries: &mut u32,
    ) -> Result<HttpResponse, ApiError> {
        loop {
            match self.sender.send(request) {
                Ok(response) => return Ok(response),
                Err(e) => {
                    let retryable = e.is_retryable(request.method.is_idempotent());
                    if retryable && *retries < self.config.max_retries() {
                        let delay = self.config.backoff().delay_for_attempt(*retries);
                        *retries += 1;
                        tracing::debug!(
                            attempt = *retries,
                            max_retries = self.config.max_retries(),
                            delay_ms = delay.as_millis() as u64,
                            error = %e,
                            "Retrying request to {}",
                            request.url
                        );
                        if !delay.is_zero() {
                            thread::sleep(delay);
                        }
                        continue;
                    }
                    return Err(give_up(e, *retries + 1));
                }
            }
        }
    }

    pub fn get(&self, url: impl Into<String>, parts: RequestParts) -> Result<HttpResponse, ApiError> {
        self.execute(HttpRequest::new(HttpMethod::Get, url).with_parts(parts))
    }

    pub fn post(&self, url: impl Into<String>, parts: RequestParts) -> Result<HttpResponse, ApiError> {
        self.execute(HttpRequest::new(HttpMethod::Post, url).with_parts(parts))
    }

    pub fn put(&self, url: impl Into<String>, parts: RequestParts) -> Result<HttpResponse, ApiError> {
        self.execute(HttpRequest::new(HttpMethod::Put, url).with_parts(parts))
    }

    pub fn patch(&self, url: impl Into<String>, parts: RequestParts) -> Result<HttpResponse, ApiError> {
        self.execute(HttpRequest::new(HttpMethod::Patch, url).with_parts(parts))
    }

    pub fn delete(&self, url: impl Into<String>, parts: RequestParts) -> Result<HttpResponse, ApiError> {
        self.execute(HttpRequest::new(HttpMethod::Delete, url).with_parts(parts))
    }

    pub fn head(&self, url: impl Into<String>, parts: RequestParts) -> Result<HttpResponse, ApiError> {
        self.execute(HttpRequest::new(HttpMethod::Head, url).with_parts(parts))
    }

    pub fn options(&self, url: impl Into<String>, parts: RequestParts) -> Result<HttpResponse, ApiError> {
        self.execute(HttpRequest::new(HttpMethod::Options, url).with_parts(parts))
    }

    pub fn trace(&self, url: impl Into<String>, parts: RequestParts) -> Result<HttpResponse, ApiError> {
        self.execute(HttpRequest::new(HttpMethod::Trace, url).with_parts(parts))
    }

    pub fn purge(&self, url: impl Into<String>, parts: RequestParts) -> Result<HttpResponse, ApiError> {
        self.execute(HttpRequest::new(HttpMethod::Purge, url).with_parts(parts))
    }
}

fn give_up(err: SendError, attempts: u32) -> ApiError {
    match ApiError::from(err) {
        ApiError::Connection { source, .. } => ApiError::Connection { attempts, source },
        other => other,
    }
}

/// The request to send next if `response` is a redirect, `None` otherwise.
///
/// 303, and 301/302 for anything but GET/HEAD, continue as a bodiless GET;
/// 307/308 replay the original method and body.
fn follow_redirect(
    current: &PreparedRequest,
    response: &HttpResponse,
) -> Result<Option<PreparedRequest>, ApiError> {
    if !response.is_redirect() {
        return Ok(None);
    }
    let Some(location) = response.header("location") else {
        return Ok(None);
    };
    let url = current.url.join(location).map_err(|e| ApiError::Unknown {
        message: format!("invalid redirect location '{location}': {e}"),
        response: Some(Arc::new(response.clone())),
    })?;

    let keep_method = match response.status {
        307 | 308 => true,
        303 => current.method == HttpMethod::Head,
        _ => matches!(current.method, HttpMethod::Get | HttpMethod::Head),
    };

    let next = if keep_method {
        PreparedRequest {
            url,
            ..current.clone()
        }
    } else {
        PreparedRequest {
            method: HttpMethod::Get,
            url,
            headers: current
                .headers
                .iter()
                .filter(|(k, _)| {
                    !k.eq_ignore_ascii_case("content-type") && !k.eq_ignore_ascii_case("content-length")
                })
                .cloned()
                .collect(),
            body: None,
        }
    };
    Ok(Some(next))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::retry::Backoff;
    use crate::sender::testing::{redirect, reply, ScriptedSender};

    fn config() -> crate::config::SessionConfigBuilder {
        SessionConfig::builder().backoff(Backoff::none())
    }

    fn transport(
        config: crate::config::SessionConfigBuilder,
        script: Vec<Result<HttpResponse, SendError>>,
    ) -> (Transport, Arc<ScriptedSender>) {
        let sender = Arc::new(ScriptedSender::new(script));
        let transport = Transport::with_sender(config.build().unwrap(), sender.clone());
        (transport, sender)
    }

    fn refused() -> Result<HttpResponse, SendError> {
        Err(SendError::Connect("connection refused".to_string()))
    }

    #[test]
    fn error_statuses_map_to_kinds_and_keep_response() {
        let cases = [
            (404, ErrorKind::NotFound),
            (401, ErrorKind::Authentication),
            (429, ErrorKind::RateLimit),
            (400, ErrorKind::InvalidRequest),
            (500, ErrorKind::Server),
            (502, ErrorKind::Server),
            (403, ErrorKind::Http),
        ];
        for (status, kind) in cases {
            let (t, _) = transport(config(), vec![Ok(reply(status, &[], "nope"))]);
            let err = t.get("https://api.test/v2/search", RequestParts::new()).unwrap_err();
            assert_eq!(err.kind(), kind, "status {status}");
            let response = err.response().unwrap();
            assert_eq!(response.status, status);
            assert_eq!(response.body, "nope");
            assert_eq!(response.url, "https://api.test/v2/search");
        }
    }

    #[test]
    fn raise_on_error_false_returns_every_status() {
        for status in [200, 400, 401, 404, 429, 500, 503] {
            let (t, _) = transport(
                config().raise_on_error(false),
                vec![Ok(reply(status, &[], ""))],
            );
            let response = t.get("https://api.test/", RequestParts::new()).unwrap();
            assert_eq!(response.status, status);
        }
    }

    #[test]
    fn raise_on_error_false_still_fails_on_network_errors() {
        let (t, _) = transport(
            config().raise_on_error(false).max_retries(0),
            vec![refused()],
        );
        let err = t.get("https://api.test/", RequestParts::new()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Connection);
    }

    #[test]
    fn retries_connection_failures_within_budget() {
        let (t, sender) = transport(
            config().max_retries(3),
            vec![refused(), refused(), refused(), Ok(reply(200, &[], "ok"))],
        );
        let response = t.get("https://api.test/", RequestParts::new()).unwrap();
        assert_eq!(response.body, "ok");
        assert_eq!(sender.seen().len(), 4);
    }

    #[test]
    fn exceeding_retries_surfaces_connection_failure() {
        let (t, sender) = transport(
            config().max_retries(2),
            vec![refused(), refused(), refused(), Ok(reply(200, &[], "ok"))],
        );
        let err = t.get("https://api.test/", RequestParts::new()).unwrap_err();
        assert!(matches!(err, ApiError::Connection { attempts: 3, .. }));
        assert_eq!(sender.seen().len(), 3);
    }

    #[test]
    fn zero_retries_sends_once() {
        let (t, sender) = transport(config().max_retries(0), vec![refused()]);
        assert!(t.get("https://api.test/", RequestParts::new()).is_err());
        assert_eq!(sender.seen().len(), 1);
    }

    #[test]
    fn connect_failures_are_retried_for_post() {
        let (t, sender) = transport(config(), vec![refused(), Ok(reply(200, &[], ""))]);
        t.post("https://api.test/podcasts", RequestParts::new().form("ids", "a,b"))
            .unwrap();
        assert_eq!(sender.seen().len(), 2);
    }

    #[test]
    fn timeouts_are_not_retried_for_post() {
        let (t, sender) = transport(
            config(),
            vec![Err(SendError::Timeout("read".into())), Ok(reply(200, &[], ""))],
        );
        let err = t
            .post("https://api.test/podcasts/submit", RequestParts::new().form("rss", "x"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Connection);
        assert_eq!(sender.seen().len(), 1);
    }

    #[test]
    fn timeouts_are_retried_for_get() {
        let (t, sender) = transport(
            config(),
            vec![Err(SendError::Timeout("read".into())), Ok(reply(200, &[], ""))],
        );
        t.get("https://api.test/", RequestParts::new()).unwrap();
        assert_eq!(sender.seen().len(), 2);
    }

    #[test]
    fn other_send_errors_are_unknown_and_not_retried() {
        let (t, sender) = transport(config(), vec![Err(SendError::Other("tls".into()))]);
        let err = t.get("https://api.test/", RequestParts::new()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unknown);
        assert_eq!(sender.seen().len(), 1);
    }

    #[test]
    fn follows_redirects_within_limit() {
        let (t, sender) = transport(
            config().max_redirects(2),
            vec![
                Ok(redirect(302, "/v2/step1")),
                Ok(redirect(301, "https://other.test/final")),
                Ok(reply(200, &[], "done")),
            ],
        );
        let response = t.get("https://api.test/v2/start", RequestParts::new()).unwrap();
        assert_eq!(response.body, "done");
        assert_eq!(response.url, "https://other.test/final");
        let urls: Vec<String> = sender.seen().iter().map(|r| r.url.to_string()).collect();
        assert_eq!(
            urls,
            vec![
                "https://api.test/v2/start",
                "https://api.test/v2/step1",
                "https://other.test/final"
            ]
        );
    }

    #[test]
    fn redirect_chain_longer_than_limit_fails() {
        let (t, sender) = transport(
            config().max_redirects(2),
            vec![
                Ok(redirect(307, "/a")),
                Ok(redirect(307, "/b")),
                Ok(redirect(307, "/c")),
                Ok(reply(200, &[], "too late")),
            ],
        );
        let err = t.get("https://api.test/", RequestParts::new()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unknown);
        assert_eq!(err.status(), Some(307));
        assert_eq!(sender.seen().len(), 3);
    }

    #[test]
    fn redirect_limit_applies_without_raise_on_error() {
        let (t, _) = transport(
            config().max_redirects(0).raise_on_error(false),
            vec![Ok(redirect(302, "/elsewhere"))],
        );
        assert!(t.get("https://api.test/", RequestParts::new()).is_err());
    }

    #[test]
    fn see_other_switches_post_to_get() {
        let (t, sender) = transport(
            config(),
            vec![Ok(redirect(303, "/result")), Ok(reply(200, &[], ""))],
        );
        t.post("https://api.test/submit", RequestParts::new().form("rss", "x"))
            .unwrap();
        let seen = sender.seen();
        assert_eq!(seen[1].method, HttpMethod::Get);
        assert!(seen[1].body.is_none());
        assert!(seen[1].header("content-type").is_none());
    }

    #[test]
    fn temporary_redirect_replays_post_body() {
        let (t, sender) = transport(
            config(),
            vec![Ok(redirect(307, "/moved")), Ok(reply(200, &[], ""))],
        );
        t.post("https://api.test/submit", RequestParts::new().form("rss", "x"))
            .unwrap();
        let seen = sender.seen();
        assert_eq!(seen[1].method, HttpMethod::Post);
        assert_eq!(seen[1].body.as_deref(), Some("rss=x"));
    }

    #[test]
    fn redirect_without_location_is_returned() {
        let (t, _) = transport(config(), vec![Ok(reply(302, &[], "no location"))]);
        let response = t.get("https://api.test/", RequestParts::new()).unwrap();
        assert_eq!(response.status, 302);
    }

    #[test]
    fn relative_url_is_rejected_before_sending() {
        let (t, sender) = transport(config(), vec![]);
        let err = t.get("/search", RequestParts::new()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);
        assert!(sender.seen().is_empty());
    }

    #[test]
    fn verb_shortcuts_use_their_method() {
        let (t, sender) = transport(config(), vec![]);
        let url = "https://api.test/";
        t.get(url, RequestParts::new()).unwrap();
        t.post(url, RequestParts::new()).unwrap();
        t.put(url, RequestParts::new()).unwrap();
        t.patch(url, RequestParts::new()).unwrap();
        t.delete(url, RequestParts::new()).unwrap();
        t.head(url, RequestParts::new()).unwrap();
        t.options(url, RequestParts::new()).unwrap();
        t.trace(url, RequestParts::new()).unwrap();
        t.purge(url, RequestParts::new()).unwrap();
        let methods: Vec<&str> = sender.seen().iter().map(|r| r.method.as_str()).collect();
        assert_eq!(
            methods,
            vec!["GET", "POST", "PUT", "PATCH", "DELETE", "HEAD", "OPTIONS", "TRACE", "PURGE"]
        );
    }

    #[test]
    fn headers_and_query_reach_the_sender() {
        let (t, sender) = transport(config(), vec![]);
        t.get(
            "https://api.test/search",
            RequestParts::new()
                .query("q", "startup")
                .header("X-ListenAPI-Key", "k"),
        )
        .unwrap();
        let seen = &sender.seen()[0];
        assert_eq!(seen.header("x-listenapi-key"), Some("k"));
        assert_eq!(seen.query_pairs(), vec![("q".to_string(), "startup".to_string())]);
    }

    #[test]
    fn transport_is_shareable_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Transport>();
    }
}
