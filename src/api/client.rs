use reqwest::{StatusCode, Url};
use tracing::{debug, debug_span, Instrument};

use super::models::{AccessStatus, HealthStatus};
use super::{ClientBuilder, Error, Result};
use crate::history::history_params;
use crate::prediction::{self, Prediction, PredictionResponse, ServerErrorBody};
use crate::record::{CandidateRecord, QueryRecord};

// -------------------------------------------------------------------------------------------------
// Client
// -------------------------------------------------------------------------------------------------
/// A client for the price-prediction server, which also serves historical purchase records.
pub struct Client {
    pub(super) base_url: Url,
    pub(super) inner: reqwest::Client,
}

impl Client {
    pub fn new() -> Result<Self> {
        ClientBuilder::new().build()
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Request a price prediction for the given query.
    pub async fn predict(&self, query: &QueryRecord) -> Result<Prediction> {
        let url = self.make_url(&["predict"], &[])?;
        let body = prediction::request_body(query);
        debug!("Prediction request: {body}");

        let response = self
            .inner
            .post(url)
            .json(&body)
            .send()
            .instrument(debug_span!("predict"))
            .await
            .map_err(Error::ReqwestError)?;
        let response = Self::check_status(response).await?;
        let body: PredictionResponse = response.json().await.map_err(Error::ReqwestError)?;
        Ok(body.into_prediction()?)
    }

    /// Fetch historical purchase records resembling the given query.
    ///
    /// The records come back in server order; ranking is up to the caller.
    pub async fn history(&self, query: &QueryRecord) -> Result<Vec<CandidateRecord>> {
        let params = history_params(query);
        let params: Vec<(&str, &str)> = params.iter().map(|(k, v)| (*k, v.as_str())).collect();
        let url = self.make_url(&["history"], &params)?;

        let response = self
            .get_url(url)
            .instrument(debug_span!("history"))
            .await?;
        let records: Vec<CandidateRecord> = response.json().await.map_err(Error::ReqwestError)?;
        debug!("Fetched {} historical records", records.len());
        Ok(records)
    }

    pub async fn health(&self) -> Result<HealthStatus> {
        let url = self.make_url(&["health"], &[])?;
        let response = self.get_url(url).await?;
        let body = response.json().await.map_err(Error::ReqwestError)?;
        Ok(body)
    }

    /// Ask an allowlist endpoint whether this machine may use the service.
    ///
    /// The endpoint answers with a JSON body for both outcomes: `200 OK` when allowed and
    /// `403 Forbidden` when denied.
    pub async fn check_access(&self, url: &str) -> Result<AccessStatus> {
        let url = Url::parse(url).map_err(Error::UrlParseError)?;
        let response = self
            .inner
            .get(url)
            .send()
            .await
            .map_err(Error::ReqwestError)?;
        let status = response.status();
        if status != StatusCode::OK && status != StatusCode::FORBIDDEN {
            return Err(Self::server_error(response).await);
        }
        let mut body: AccessStatus = response.json().await.map_err(Error::ReqwestError)?;
        if status == StatusCode::FORBIDDEN {
            body.allowed = false;
        }
        Ok(body)
    }
}

// private implementation
impl Client {
    /// Construct a `Url` from the given path parts and query parameters, relative to the base URL.
    fn make_url(&self, path_parts: &[&str], params: &[(&str, &str)]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| Error::UrlParseError(url::ParseError::RelativeUrlWithCannotBeABaseBase))?
            .pop_if_empty()
            .extend(path_parts);
        if !params.is_empty() {
            url.query_pairs_mut().extend_pairs(params);
        }
        Ok(url)
    }

    async fn get_url(&self, url: Url) -> Result<reqwest::Response> {
        debug!("GET {url}");
        let response = self
            .inner
            .get(url)
            .send()
            .await
            .map_err(Error::ReqwestError)?;
        Self::check_status(response).await
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
        if response.status().is_success() {
            Ok(response)
        } else {
            Err(Self::server_error(response).await)
        }
    }

    /// Turn an unsuccessful response into an error, keeping its body if it has the usual shape.
    async fn server_error(response: reqwest::Response) -> Error {
        let status = response.status();
        let body = response.json::<ServerErrorBody>().await.ok();
        Error::ServerError { status, body }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn client(base: &str) -> Client {
        ClientBuilder::new().base_url(base).unwrap().build().unwrap()
    }

    #[test]
    fn make_url_joins_paths() {
        let c = client("http://127.0.0.1:8081");
        assert_eq!(
            c.make_url(&["predict"], &[]).unwrap().as_str(),
            "http://127.0.0.1:8081/predict"
        );

        let c = client("http://pricing.example.com/api/");
        assert_eq!(
            c.make_url(&["history"], &[("length", "2500"), ("model", "型五")])
                .unwrap()
                .as_str(),
            "http://pricing.example.com/api/history?length=2500&model=%E5%9E%8B%E4%BA%94"
        );
    }
}
