//! HTTP request and response types.
//!
//! # Design
//! Requests and responses are plain data. `HttpRequest` is what callers hand
//! to the `Transport`; `PreparedRequest` is its wire form (absolute URL with
//! the query string encoded, form body serialized) and is what a `Sender`
//! actually puts on the network. `HttpResponse` is returned to the caller
//! after redirects have been followed.
//!
//! All fields use owned types so responses can be shared behind an `Arc`
//! inside errors without lifetime concerns.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::Serialize;
use url::Url;

use crate::error::ApiError;

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
    Trace,
    /// Non-standard cache invalidation verb.
    Purge,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Head => "HEAD",
            HttpMethod::Options => "OPTIONS",
            HttpMethod::Trace => "TRACE",
            HttpMethod::Purge => "PURGE",
        }
    }

    /// Whether repeating the request has the same effect as sending it once.
    ///
    /// Only idempotent requests are retried after a failure that may have
    /// happened once the request already reached the server.
    pub fn is_idempotent(self) -> bool {
        !matches!(self, HttpMethod::Post | HttpMethod::Patch)
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Query parameters, form fields and headers attached to a request.
///
/// Used by the verb shortcuts on `Transport` (`get`, `post`, ...).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestParts {
    pub query: Vec<(String, String)>,
    pub form: Option<Vec<(String, String)>>,
    pub headers: Vec<(String, String)>,
}

impl RequestParts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    pub fn form(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.form
            .get_or_insert_with(Vec::new)
            .push((name.into(), value.into()));
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// An HTTP request described as plain data.
///
/// `url` must be absolute. `query` pairs are appended to any query string
/// already present in `url`. When `form` is set the pairs are sent as an
/// `application/x-www-form-urlencoded` body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub query: Vec<(String, String)>,
    pub form: Option<Vec<(String, String)>>,
    pub headers: Vec<(String, String)>,
}

impl HttpRequest {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            query: Vec::new(),
            form: None,
            headers: Vec::new(),
        }
    }

    /// Attach query parameters, form fields and headers in one go.
    pub fn with_parts(mut self, parts: RequestParts) -> Self {
        self.query.extend(parts.query);
        self.form = parts.form;
        self.headers.extend(parts.headers);
        self
    }

    /// Look up a header by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// Look up a query parameter by exact name.
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Look up a form field by exact name.
    pub fn form_field(&self, name: &str) -> Option<&str> {
        self.form
            .as_ref()?
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// The wire form of an `HttpRequest`, ready for a single exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedRequest {
    pub method: HttpMethod,
    pub url: Url,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

impl PreparedRequest {
    /// Encode `request` into its wire form.
    ///
    /// Fails with `ApiError::InvalidRequest` when the URL is not an absolute
    /// http or https URL.
    pub fn from_request(request: &HttpRequest) -> Result<Self, ApiError> {
        let mut url = Url::parse(&request.url).map_err(|e| ApiError::InvalidRequest {
            message: format!("invalid url '{}': {e}", request.url),
            response: None,
        })?;
        if url.cannot_be_a_base() || !matches!(url.scheme(), "http" | "https") {
            return Err(ApiError::InvalidRequest {
                message: format!("url '{}' is not an absolute http(s) url", request.url),
                response: None,
            });
        }
        if !request.query.is_empty() {
            url.query_pairs_mut().extend_pairs(&request.query);
        }

        let mut headers = request.headers.clone();
        let body = request.form.as_ref().map(|fields| {
            if find_header(&headers, "content-type").is_none() {
                headers.push(("Content-Type".to_string(), FORM_CONTENT_TYPE.to_string()));
            }
            url::form_urlencoded::Serializer::new(String::new())
                .extend_pairs(fields)
                .finish()
        });

        Ok(Self {
            method: request.method,
            url,
            headers,
            body,
        })
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// Decoded query pairs of the target URL.
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        self.url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect()
    }

    /// Decoded form fields of the body, empty when there is no body.
    pub fn form_pairs(&self) -> Vec<(String, String)> {
        self.body
            .as_deref()
            .map(|body| {
                url::form_urlencoded::parse(body.as_bytes())
                    .map(|(k, v)| (k.into_owned(), v.into_owned()))
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// An HTTP response described as plain data.
///
/// `url` is the URL that produced this response, after any redirects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
    pub url: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_redirect(&self) -> bool {
        matches!(self.status, 301 | 302 | 303 | 307 | 308)
    }

    /// Look up a header by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// Deserialize the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_str(&self.body)
    }

    /// Quota and billing information the API attaches to every response.
    pub fn usage(&self) -> AccountUsage {
        AccountUsage {
            free_quota: self.header("X-ListenAPI-FreeQuota").and_then(|v| v.trim().parse().ok()),
            usage: self.header("X-ListenAPI-Usage").and_then(|v| v.trim().parse().ok()),
            next_billing_date: self
                .header("X-Listenapi-NextBillingDate")
                .map(|v| v.trim().to_string()),
            latency_seconds: self
                .header("X-ListenAPI-LatencySeconds")
                .and_then(|v| v.trim().parse().ok()),
        }
    }
}

/// Account usage reported through response headers. Every field is absent
/// when the header is missing or malformed.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AccountUsage {
    pub free_quota: Option<u64>,
    pub usage: Option<u64>,
    pub next_billing_date: Option<String>,
    pub latency_seconds: Option<f64>,
}

fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response_with_headers(headers: &[(&str, &str)]) -> HttpResponse {
        HttpResponse {
            status: 200,
            headers: headers
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            body: String::new(),
            url: "https://example.com/".to_string(),
        }
    }

    #[test]
    fn only_post_and_patch_are_not_idempotent() {
        assert!(!HttpMethod::Post.is_idempotent());
        assert!(!HttpMethod::Patch.is_idempotent());
        assert!(HttpMethod::Get.is_idempotent());
        assert!(HttpMethod::Delete.is_idempotent());
        assert!(HttpMethod::Purge.is_idempotent());
    }

    #[test]
    fn prepare_appends_query_to_existing_query_string() {
        let request = HttpRequest::new(HttpMethod::Get, "https://example.com/search?sort=1")
            .with_parts(RequestParts::new().query("q", "star talk"));
        let prepared = PreparedRequest::from_request(&request).unwrap();
        assert_eq!(prepared.url.path(), "/search");
        assert_eq!(
            prepared.query_pairs(),
            vec![
                ("sort".to_string(), "1".to_string()),
                ("q".to_string(), "star talk".to_string())
            ]
        );
        assert!(prepared.body.is_none());
    }

    #[test]
    fn prepare_encodes_form_body_and_content_type() {
        let request = HttpRequest::new(HttpMethod::Post, "https://example.com/podcasts/submit")
            .with_parts(RequestParts::new().form("rss", "http://x/y?a=1&b=2"));
        let prepared = PreparedRequest::from_request(&request).unwrap();
        assert_eq!(prepared.header("content-type"), Some(FORM_CONTENT_TYPE));
        assert_eq!(
            prepared.form_pairs(),
            vec![("rss".to_string(), "http://x/y?a=1&b=2".to_string())]
        );
    }

    #[test]
    fn prepare_rejects_relative_url() {
        let request = HttpRequest::new(HttpMethod::Get, "/search");
        let err = PreparedRequest::from_request(&request).unwrap_err();
        assert!(matches!(err, ApiError::InvalidRequest { response: None, .. }));
    }

    #[test]
    fn prepare_rejects_non_base_url() {
        let request = HttpRequest::new(HttpMethod::Get, "mailto:hello@example.com");
        assert!(PreparedRequest::from_request(&request).is_err());
    }

    #[test]
    fn prepare_rejects_non_http_schemes() {
        for url in ["file:///etc/hosts", "ftp://example.com/feed.xml"] {
            let request = HttpRequest::new(HttpMethod::Get, url);
            let err = PreparedRequest::from_request(&request).unwrap_err();
            assert!(matches!(err, ApiError::InvalidRequest { response: None, .. }), "{url}");
        }
    }

    #[test]
    fn request_lookups_read_query_and_form() {
        let request = HttpRequest::new(HttpMethod::Post, "https://example.com/podcasts")
            .with_parts(RequestParts::new().query("page", "2").form("ids", "a,b"));
        assert_eq!(request.query_param("page"), Some("2"));
        assert_eq!(request.form_field("ids"), Some("a,b"));
        assert_eq!(request.form_field("page"), None);

        let request = HttpRequest::new(HttpMethod::Get, "https://example.com/search");
        assert_eq!(request.form_field("ids"), None);
    }

    #[test]
    fn header_lookup_is_case_insensitive() {
        let response = response_with_headers(&[("Content-Type", "application/json")]);
        assert_eq!(response.header("content-type"), Some("application/json"));
        assert_eq!(response.header("x-missing"), None);
    }

    #[test]
    fn usage_reads_quota_headers() {
        let response = response_with_headers(&[
            ("x-listenapi-freequota", "300"),
            ("x-listenapi-usage", "42"),
            ("x-listenapi-nextbillingdate", "2026-11-01T00:00:00+00:00"),
            ("x-listenapi-latencyseconds", "0.125"),
        ]);
        let usage = response.usage();
        assert_eq!(usage.free_quota, Some(300));
        assert_eq!(usage.usage, Some(42));
        assert_eq!(usage.next_billing_date.as_deref(), Some("2026-11-01T00:00:00+00:00"));
        assert_eq!(usage.latency_seconds, Some(0.125));
    }

    #[test]
    fn usage_ignores_malformed_headers() {
        let response = response_with_headers(&[("X-ListenAPI-Usage", "lots")]);
        assert_eq!(response.usage(), AccountUsage::default());
    }

    #[test]
    fn json_body_decodes() {
        let mut response = response_with_headers(&[]);
        response.body = r#"{"results":[{"id":"abc"}],"count":1}"#.to_string();
        let value: serde_json::Value = response.json().unwrap();
        assert_eq!(value["results"][0]["id"], "abc");
    }

    #[test]
    fn redirect_statuses() {
        let mut response = response_with_headers(&[]);
        for status in [301, 302, 303, 307, 308] {
            response.status = status;
            assert!(response.is_redirect(), "{status}");
        }
        response.status = 304;
        assert!(!response.is_redirect());
    }

    #[test]
    fn success_statuses() {
        let mut response = response_with_headers(&[]);
        for status in [200, 201, 204, 299] {
            response.status = status;
            assert!(response.is_success(), "{status}");
        }
        for status in [199, 301, 404, 500] {
            response.status = status;
            assert!(!response.is_success(), "{status}");
        }
    }
}
