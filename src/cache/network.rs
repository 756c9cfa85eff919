/// Network retrieval primitive
///
/// The coordinator only needs "fetch this URL"; HttpNetwork implements it
/// with reqwest and resolves relative paths (e.g., "/data/designs.json")
/// against a configured base URL.

use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Url};
use std::future::Future;
use thiserror::Error;

use super::{Response, ResponseOrigin};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NetworkError {
    #[error("invalid resource URL: {0}")]
    InvalidUrl(String),

    #[error("transport failure: {0}")]
    Transport(String),
}

/// Anything that can retrieve a resource by URL.
///
/// Only transport failures are errors: a 404 is a successful retrieval
/// of a non-success response.
pub trait Network: Send + Sync + 'static {
    fn fetch(&self, url: &str) -> impl Future<Output = Result<Response, NetworkError>> + Send;
}

/// reqwest-backed network
#[derive(Debug, Clone)]
pub struct HttpNetwork {
    client: Client,
    base: Option<Url>,
}

impl HttpNetwork {
    /// Create a network client. `base_url` is used to resolve relative resource paths.
    pub fn new(base_url: Option<&str>) -> Result<Self, NetworkError> {
        let base = match base_url {
            Some(raw) => Some(Url::parse(raw).map_err(|e| NetworkError::InvalidUrl(format!("{}: {}", raw, e)))?),
            None => None,
        };
        Ok(Self {
            client: Client::new(),
            base,
        })
    }

    /// A client that only accepts absolute URLs
    pub fn without_base() -> Self {
        Self {
            client: Client::new(),
            base: None,
        }
    }

    /// Turn a resource key into an absolute URL
    pub fn resolve(&self, url: &str) -> Result<Url, NetworkError> {
        match Url::parse(url) {
            Ok(absolute) => Ok(absolute),
            Err(_) => match &self.base {
                Some(base) => base
                    .join(url)
                    .map_err(|e| NetworkError::InvalidUrl(format!("{}: {}", url, e))),
                None => Err(NetworkError::InvalidUrl(format!("{}: relative URL without base", url))),
            },
        }
    }
}

impl Network for HttpNetwork {
    async fn fetch(&self, url: &str) -> Result<Response, NetworkError> {
        let target = self.resolve(url)?;
        log::debug!("GET {}", target);

        let response = self
            .client
            .get(target)
            .send()
            .await
            .map_err(|e| NetworkError::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let body = response
            .bytes()
            .await
            .map_err(|e| NetworkError::Transport(e.to_string()))?;

        Ok(Response {
            status,
            content_type,
            body: body.to_vec(),
            origin: ResponseOrigin::Network,
        })
    }
}
