//! Collector transport
//!
//! Batches are posted as one request body: newline-terminated JSON records
//! concatenated together. The content type says JSON even though the body
//! is a sequence of lines; the collector relies on that.

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use hyper::client::HttpConnector;
use hyper::header::CONTENT_TYPE;
use hyper::{Body, Client, Method, Request, Uri};
use std::time::Duration;

/// One-time notice posted when forwarding starts
pub const STARTUP_NOTICE: &str = r#"{"message": "wptagent.started"}"#;

/// Content type declared on every post
pub const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

/// Destination for forwarded batches
#[async_trait]
pub trait Sink: Send + Sync {
    /// Post one request body. An error means the body was not accepted.
    async fn post(&self, body: String) -> Result<()>;
}

/// Sink posting to the local HTTP collector
#[derive(Debug, Clone)]
pub struct HttpSink {
    client: Client<HttpConnector>,
    uri: Uri,
    timeout: Duration,
}

impl HttpSink {
    pub fn new(url: &str, timeout: Duration) -> Result<Self> {
        let uri: Uri = url
            .parse()
            .with_context(|| format!("Invalid collector URL: {}", url))?;
        Ok(Self {
            client: Client::new(),
            uri,
            timeout,
        })
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }
}

#[async_trait]
impl Sink for HttpSink {
    async fn post(&self, body: String) -> Result<()> {
        let request = Request::builder()
            .method(Method::POST)
            .uri(self.uri.clone())
            .header(CONTENT_TYPE, JSON_CONTENT_TYPE)
            .body(Body::from(body))
            .context("Failed to build collector request")?;

        let exchange = async {
            let response = self.client.request(request).await?;
            let status = response.status();
            // Read the reply so the connection can be reused
            hyper::body::to_bytes(response.into_body()).await?;
            Ok::<_, hyper::Error>(status)
        };

        let status = tokio::time::timeout(self.timeout, exchange)
            .await
            .map_err(|_| anyhow!("Collector request timed out after {:?}", self.timeout))?
            .with_context(|| format!("Collector request to {} failed", self.uri))?;

        if !status.is_success() {
            bail!("Collector at {} responded {}", self.uri, status);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_startup_notice_is_json() {
        let value: serde_json::Value = serde_json::from_str(STARTUP_NOTICE).unwrap();
        assert_eq!(value["message"], "wptagent.started");
    }

    #[test]
    fn test_invalid_url_rejected() {
        assert!(HttpSink::new("not a url", Duration::from_secs(1)).is_err());
        let sink = HttpSink::new("http://127.0.0.1:8888/etw", Duration::from_secs(1)).unwrap();
        assert_eq!(sink.uri().path(), "/etw");
    }

    #[tokio::test]
    async fn test_unreachable_collector_is_an_error() {
        // Bind then drop to get a port nothing listens on
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let sink = HttpSink::new(
            &format!("http://127.0.0.1:{}/etw", port),
            Duration::from_secs(2),
        )
        .unwrap();
        assert!(sink.post("{}\n".to_string()).await.is_err());
    }
}
