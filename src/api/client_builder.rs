use reqwest::{IntoUrl, Url};
use std::time::Duration;

use super::{Client, Error, Result};

// -------------------------------------------------------------------------------------------------
// ClientBuilder
// -------------------------------------------------------------------------------------------------
pub struct ClientBuilder {
    base_url: reqwest::Url,
    timeout: Option<Duration>,
}

impl ClientBuilder {
    const USER_AGENT: &str = "fanquote";

    pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8081";

    pub fn new() -> Self {
        ClientBuilder {
            base_url: Url::parse(Self::DEFAULT_BASE_URL).expect("default base URL should parse"),
            timeout: None,
        }
    }

    pub fn base_url<T: IntoUrl>(mut self, url: T) -> Result<Self> {
        self.base_url = url.into_url().map_err(Error::ReqwestError)?;
        Ok(self)
    }

    /// Set a timeout covering each whole request, from connecting until the body is read.
    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn build(self) -> Result<Client> {
        let mut inner = reqwest::ClientBuilder::new().user_agent(Self::USER_AGENT);
        if let Some(timeout) = self.timeout {
            inner = inner.timeout(timeout);
        }
        let inner = inner.build().map_err(Error::ReqwestError)?;
        Ok(Client {
            base_url: self.base_url,
            inner,
        })
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
