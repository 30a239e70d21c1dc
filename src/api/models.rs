use serde::{Deserialize, Serialize};

/// The body of `GET /health`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct HealthStatus {
    pub status: String,

    #[serde(default)]
    pub message: Option<String>,

    #[serde(default)]
    pub version: Option<String>,
}

/// The body of an access-check response, sent with both granted and denied statuses.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct AccessStatus {
    #[serde(default)]
    pub ip: Option<String>,

    #[serde(default)]
    pub allowed: bool,

    #[serde(default)]
    pub message: Option<String>,
}
