//! Network access for the offline controller
//!
//! A transport failure (DNS, refused connection, timeout) is an `Err`; an
//! HTTP error status is still a `Response`.

use crate::error::{PostroomError, PostroomResult};
use crate::offline::request::{Request, Response, ResponseSource};
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;
use ureq::Agent;

/// Abstract network interface
#[async_trait]
pub trait Network: Send + Sync {
    /// Perform the request against the network
    async fn fetch(&self, request: &Request) -> PostroomResult<Response>;
}

/// Blocking `ureq` agent driven from the tokio blocking pool
#[derive(Clone)]
pub struct HttpNetwork {
    agent: Agent,
}

impl HttpNetwork {
    /// Create an agent with a global per-request timeout
    pub fn new(timeout: Duration) -> Self {
        let config = Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(Some(timeout))
            .build();
        Self {
            agent: Agent::new_with_config(config),
        }
    }

    fn fetch_blocking(agent: &Agent, request: &Request) -> PostroomResult<Response> {
        let url = request.url.as_str();
        let mut builder = ureq::http::Request::builder()
            .method(request.method.as_str())
            .uri(url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        let http_request = builder
            .body(())
            .map_err(|e| PostroomError::network(url, e.to_string()))?;

        let mut response = agent
            .run(http_request)
            .map_err(|e| PostroomError::network(url, e.to_string()))?;

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
        let body = response
            .body_mut()
            .read_to_vec()
            .map_err(|e| PostroomError::network(url, format!("reading body: {}", e)))?;

        Ok(Response {
            status,
            headers,
            body,
            source: ResponseSource::Network,
        })
    }
}

#[async_trait]
impl Network for HttpNetwork {
    async fn fetch(&self, request: &Request) -> PostroomResult<Response> {
        debug!("{} {}", request.method, request.url);
        let agent = self.agent.clone();
        let request = request.clone();
        tokio::task::spawn_blocking(move || Self::fetch_blocking(&agent, &request))
            .await
            .map_err(|e| PostroomError::Internal(format!("network task failed: {}", e)))?
    }
}
