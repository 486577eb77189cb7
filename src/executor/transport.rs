//! The subgraph transport boundary.
//!
//! The executor only ever talks to subgraphs through [`SubgraphTransport`];
//! tests inject in-memory implementations, production uses the
//! reqwest-backed [`HttpSubgraphTransport`] routed by the blueprint's
//! subgraph catalog.

use std::time::Duration;

use async_trait::async_trait;
use indexmap::IndexMap;
use tracing::debug;
use url::Url;

use crate::blueprint::Blueprint;
use crate::error::TransportError;
use crate::graphql;

/// GraphQL-over-HTTP accept header, preferring the dedicated media type.
const ACCEPT: &str = "application/graphql-response+json, application/json";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// One subgraph call: a POSTed GraphQL request, a GraphQL response back.
/// Non-2xx statuses are transport failures, distinct from GraphQL-level
/// errors in an otherwise well-formed response.
#[async_trait]
pub trait SubgraphTransport: Send + Sync {
    async fn fetch(
        &self,
        subgraph: &str,
        request: graphql::Request,
    ) -> Result<graphql::Response, TransportError>;
}

/// GraphQL-over-HTTP transport routing by subgraph id.
#[derive(Clone)]
pub struct HttpSubgraphTransport {
    client: reqwest::Client,
    endpoints: IndexMap<String, Url>,
    timeout: Duration,
}

impl HttpSubgraphTransport {
    /// Routes every subgraph of the blueprint's catalog to its composed
    /// url. Subgraphs without one (fusion schemas carry none) must be added
    /// with [`with_endpoint`](Self::with_endpoint) before use.
    pub fn from_blueprint(blueprint: &Blueprint) -> Result<Self, TransportError> {
        let mut endpoints = IndexMap::new();
        for (subgraph, info) in &blueprint.subgraphs {
            if info.url.is_empty() {
                continue;
            }
            let url = Url::parse(&info.url).map_err(|error| TransportError::UnknownSubgraph {
                subgraph: subgraph.clone(),
                reason: format!("invalid url \"{}\": {error}", info.url),
            })?;
            endpoints.insert(subgraph.clone(), url);
        }
        Ok(Self {
            client: reqwest::Client::new(),
            endpoints,
            timeout: DEFAULT_TIMEOUT,
        })
    }

    pub fn with_endpoint(mut self, subgraph: impl Into<String>, url: Url) -> Self {
        self.endpoints.insert(subgraph.into(), url);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl SubgraphTransport for HttpSubgraphTransport {
    async fn fetch(
        &self,
        subgraph: &str,
        request: graphql::Request,
    ) -> Result<graphql::Response, TransportError> {
        let url = self
            .endpoints
            .get(subgraph)
            .ok_or_else(|| TransportError::UnknownSubgraph {
                subgraph: subgraph.to_owned(),
                reason: "no endpoint configured".to_owned(),
            })?;

        debug!(subgraph, %url, "subgraph request");
        let response = self
            .client
            .post(url.clone())
            .timeout(self.timeout)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .header(reqwest::header::ACCEPT, ACCEPT)
            .json(&request)
            .send()
            .await
            .map_err(|source| TransportError::Http {
                subgraph: subgraph.to_owned(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::UnexpectedStatus {
                subgraph: subgraph.to_owned(),
                status: status.as_u16(),
            });
        }

        response
            .json::<graphql::Response>()
            .await
            .map_err(|error| TransportError::MalformedResponse {
                subgraph: subgraph.to_owned(),
                reason: error.to_string(),
            })
    }
}
