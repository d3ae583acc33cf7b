//! Single-exchange HTTP backends.
//!
//! # Design
//! A `Sender` performs exactly one HTTP exchange: no retries, no redirect
//! following, and status codes come back as data. Retry, redirect and status
//! policy all live in `Transport`, which keeps that policy testable with a
//! scripted sender and keeps the network backend swappable.

use std::io;

use ureq::http;

use crate::config::SessionConfig;
use crate::error::SendError;
use crate::http::{HttpResponse, PreparedRequest};

/// One HTTP exchange. Implementations must be safe to share across threads.
pub trait Sender: Send + Sync {
    fn send(&self, request: &PreparedRequest) -> Result<HttpResponse, SendError>;
}

/// Blocking sender backed by a pooled `ureq` agent.
#[derive(Debug, Clone)]
pub struct UreqSender {
    agent: ureq::Agent,
}

impl UreqSender {
    /// Build an agent that applies the session timeout to each exchange and
    /// leaves redirects and status interpretation to the caller.
    pub fn new(config: &SessionConfig) -> Self {
        let agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .max_redirects(0)
            .max_redirects_will_error(false)
            .timeout_global(Some(config.timeout()))
            .allow_non_standard_methods(true)
            .build()
            .new_agent();
        Self { agent }
    }
}

impl Sender for UreqSender {
    fn send(&self, request: &PreparedRequest) -> Result<HttpResponse, SendError> {
        let mut builder = http::Request::builder()
            .method(request.method.as_str())
            .uri(request.url.as_str());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let result = match &request.body {
            Some(body) => {
                let req = builder
                    .body(body.clone().into_bytes())
                    .map_err(|e| SendError::Other(format!("invalid request: {e}")))?;
                self.agent.run(req)
            }
            None => {
                let req = builder
                    .body(())
                    .map_err(|e| SendError::Other(format!("invalid request: {e}")))?;
                self.agent.run(req)
            }
        };
        let mut response = result.map_err(classify)?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        // The exchange is complete once headers arrive; a body that is not
        // UTF-8 is decoded lossily rather than failing the call.
        let bytes = response.body_mut().read_to_vec().map_err(classify)?;
        let body = String::from_utf8_lossy(&bytes).into_owned();

        Ok(HttpResponse {
            status,
            headers,
            body,
            url: request.url.to_string(),
        })
    }
}

fn classify(err: ureq::Error) -> SendError {
    match &err {
        ureq::Error::Timeout(_) => SendError::Timeout(err.to_string()),
        ureq::Error::ConnectionFailed | ureq::Error::HostNotFound => {
            SendError::Connect(err.to_string())
        }
        ureq::Error::Io(io_err) => match io_err.kind() {
            io::ErrorKind::ConnectionRefused
            | io::ErrorKind::AddrNotAvailable
            | io::ErrorKind::NotConnected => SendError::Connect(err.to_string()),
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => {
                SendError::Timeout(err.to_string())
            }
            _ => SendError::Io(err.to_string()),
        },
        _ => SendError::Other(err.to_string()),
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted sender used by the transport and client tests.

    use std::collections::VecDeque;
    use std::sync::Mutex;

    use super::*;

    /// Replays a fixed script of outcomes and records every request it saw.
    /// Once the script runs out it answers `200` with an empty JSON object.
    #[derive(Default)]
    pub(crate) struct ScriptedSender {
        script: Mutex<VecDeque<Result<HttpResponse, SendError>>>,
        seen: Mutex<Vec<PreparedRequest>>,
    }

    impl ScriptedSender {
        pub(crate) fn new(script: Vec<Result<HttpResponse, SendError>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                seen: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn seen(&self) -> Vec<PreparedRequest> {
            self.seen.lock().unwrap().clone()
        }
    }

    impl Sender for ScriptedSender {
        fn send(&self, request: &PreparedRequest) -> Result<HttpResponse, SendError> {
            self.seen.lock().unwrap().push(request.clone());
            let next = self.script.lock().unwrap().pop_front();
            next.unwrap_or_else(|| Ok(reply(200, &[], "{}")))
                .map(|mut response| {
                    response.url = request.url.to_string();
                    response
                })
        }
    }

    pub(crate) fn reply(status: u16, headers: &[(&str, &str)], body: &str) -> HttpResponse {
        HttpResponse {
            status,
            headers: headers
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            body: body.to_string(),
            url: String::new(),
        }
    }

    pub(crate) fn redirect(status: u16, location: &str) -> HttpResponse {
        reply(status, &[("Location", location)], "")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_errors_are_classified_by_kind() {
        let refused = ureq::Error::Io(io::Error::new(io::ErrorKind::ConnectionRefused, "refused"));
        assert!(matches!(classify(refused), SendError::Connect(_)));

        let timed_out = ureq::Error::Io(io::Error::new(io::ErrorKind::TimedOut, "slow"));
        assert!(matches!(classify(timed_out), SendError::Timeout(_)));

        let reset = ureq::Error::Io(io::Error::new(io::ErrorKind::ConnectionReset, "reset"));
        assert!(matches!(classify(reset), SendError::Io(_)));
    }

    #[test]
    fn lookup_failures_are_connection_failures() {
        assert!(matches!(
            classify(ureq::Error::HostNotFound),
            SendError::Connect(_)
        ));
        assert!(matches!(
            classify(ureq::Error::ConnectionFailed),
            SendError::Connect(_)
        ));
    }

    /// Serve one canned HTTP response on a fresh port.
    fn serve_once(response: &'static [u8]) -> std::net::SocketAddr {
        use std::io::{Read, Write};

        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut request: Vec<u8> = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = stream.read(&mut buf).unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            stream.write_all(response).unwrap();
        });
        addr
    }

    #[test]
    fn non_utf8_body_is_decoded_lossily() {
        let addr = serve_once(
            b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\nConnection: close\r\n\r\n\xff\xfe",
        );
        let sender = UreqSender::new(&SessionConfig::default());
        let request = PreparedRequest {
            method: crate::http::HttpMethod::Get,
            url: url::Url::parse(&format!("http://{addr}/search")).unwrap(),
            headers: Vec::new(),
            body: None,
        };
        let response = sender.send(&request).unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.body, "\u{FFFD}\u{FFFD}");
    }

    #[test]
    fn refused_connection_surfaces_as_connect_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let sender = UreqSender::new(&SessionConfig::default());
        let request = PreparedRequest {
            method: crate::http::HttpMethod::Get,
            url: url::Url::parse(&format!("http://{addr}/search")).unwrap(),
            headers: Vec::new(),
            body: None,
        };
        let err = sender.send(&request).unwrap_err();
        assert!(err.is_retryable(false), "{err:?}");
    }
}
