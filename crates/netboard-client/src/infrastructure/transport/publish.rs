//! `POST /publish`.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::StatusCode;
use tracing::trace;

use crate::application::ports::{Publish, PublishError};
use crate::domain::config::SubscribeConfig;
use crate::infrastructure::transport::{ServerEndpoint, TransportError};

/// Path of the relay's publish endpoint.
pub const PUBLISH_PATH: &str = "/publish";

/// Publishes clipboard payloads with one HTTP request each.
#[derive(Debug, Clone)]
pub struct HttpPublisher {
    client: reqwest::Client,
    url: String,
}

impl HttpPublisher {
    /// # Errors
    ///
    /// Returns [`TransportError::Http`] if the HTTP client cannot be built.
    pub fn new(endpoint: &ServerEndpoint, config: &SubscribeConfig) -> Result<Self, TransportError> {
        Ok(Self {
            client: endpoint.http_client(config.connect_timeout, Some(config.publish_timeout))?,
            url: endpoint.http_url(PUBLISH_PATH),
        })
    }
}

#[async_trait]
impl Publish for HttpPublisher {
    async fn publish(&self, data: Bytes) -> Result<(), PublishError> {
        let len = data.len();
        let response = self
            .client
            .post(&self.url)
            .body(data)
            .send()
            .await
            .map_err(|e| PublishError::Request(error_chain(&e)))?;

        let status = response.status();
        if status != StatusCode::NO_CONTENT {
            let body = response.text().await.unwrap_or_default();
            return Err(PublishError::Rejected {
                status: status.as_u16(),
                body: body.trim().to_string(),
            });
        }

        trace!(bytes = len, "published");
        Ok(())
    }
}

/// `reqwest` puts the useful part (refused, TLS failure) in the source chain.
fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fmt;

    #[derive(Debug)]
    struct Layer(&'static str, Option<Box<Layer>>);

    impl fmt::Display for Layer {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(self.0)
        }
    }

    impl std::error::Error for Layer {
        fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
            self.1
                .as_deref()
                .map(|e| e as &(dyn std::error::Error + 'static))
        }
    }

    #[test]
    fn test_error_chain_joins_sources() {
        // Arrange
        let err = Layer(
            "error sending request",
            Some(Box::new(Layer("connection refused", None))),
        );

        // Act
        let message = error_chain(&err);

        // Assert
        assert_eq!(message, "error sending request: connection refused");
    }
}
