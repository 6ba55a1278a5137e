use async_trait::async_trait;
use reqwest::header::{ACCEPT, USER_AGENT};
use tracing::debug;

use crate::config::UA;
use crate::error::TransportError;
use crate::multipart::MultipartPayload;

/// A response that made it back to us, whatever its status code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self { status, body: body.into() }
    }
}

/// HTTP calls the assembly run needs.
///
/// Only failures where no response was obtained are errors; non-2xx replies come back as `Ok`.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn post_multipart(&self, url: &str, payload: MultipartPayload) -> Result<HttpResponse, TransportError>;
    async fn get(&self, url: &str) -> Result<HttpResponse, TransportError>;
    async fn delete(&self, url: &str) -> Result<HttpResponse, TransportError>;
}

#[derive(Clone, Default)]
pub struct HttpTransport {
    http: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(http: reqwest::Client) -> Self {
        Self { http }
    }

    async fn send(&self, url: &str, req: reqwest::RequestBuilder) -> Result<HttpResponse, TransportError> {
        let res = req
            .header(ACCEPT, "application/json")
            .header(USER_AGENT, UA)
            .send()
            .await
            .map_err(|e| network(url, e))?;
        let status = res.status().as_u16();
        let body = res.text().await.map_err(|e| network(url, e))?;
        debug!(url, status, bytes = body.len(), "received response");
        Ok(HttpResponse { status, body })
    }
}

fn network(url: &str, err: reqwest::Error) -> TransportError {
    TransportError::Network { url: url.to_string(), message: err.to_string() }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post_multipart(&self, url: &str, payload: MultipartPayload) -> Result<HttpResponse, TransportError> {
        let form = payload.into_form()?;
        debug!(url, boundary = form.boundary(), "posting multipart submission");
        self.send(url, self.http.post(url).multipart(form)).await
    }

    async fn get(&self, url: &str) -> Result<HttpResponse, TransportError> {
        self.send(url, self.http.get(url)).await
    }

    async fn delete(&self, url: &str) -> Result<HttpResponse, TransportError> {
        self.send(url, self.http.delete(url)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unreachable_host_is_a_network_error() {
        // Grab a free port, then close it so nothing is listening.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let url = format!("http://{addr}/assemblies/abc");
        let transport = HttpTransport::new();
        let err = transport.get(&url).await.unwrap_err();
        match err {
            TransportError::Network { url: failed, .. } => assert_eq!(failed, url),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_http_response_new() {
        let res = HttpResponse::new(404, r#"{"error":"ASSEMBLY_NOT_FOUND"}"#);
        assert_eq!(res.status, 404);
        assert!(res.body.contains("ASSEMBLY_NOT_FOUND"));
    }
}
