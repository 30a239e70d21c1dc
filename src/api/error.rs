use reqwest::StatusCode;

use crate::prediction::{PriceError, ServerErrorBody};

// -------------------------------------------------------------------------------------------------
// Error
// -------------------------------------------------------------------------------------------------
#[derive(Debug)]
pub enum Error {
    UrlParseError(url::ParseError),
    ReqwestError(reqwest::Error),

    /// The server answered with a non-success status
    ServerError {
        status: StatusCode,

        /// The error body, if the server sent one in the expected shape
        body: Option<ServerErrorBody>,
    },

    PriceError(PriceError),
}

impl Error {
    /// Did the request fail because the server could not be reached at all?
    pub fn is_connect(&self) -> bool {
        match self {
            Error::ReqwestError(e) => e.is_connect() || e.is_timeout(),
            _ => false,
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::UrlParseError(e) => write!(f, "error parsing URL: {e}"),
            Error::ReqwestError(e) if e.is_connect() => write!(f, "server unreachable: {e}"),
            Error::ReqwestError(e) if e.is_decode() => write!(f, "malformed response: {e}"),
            Error::ReqwestError(e) => write!(f, "error making request: {e}"),
            Error::ServerError { status, body } => {
                match body.as_ref().and_then(|b| b.error.as_deref().or(b.message.as_deref())) {
                    Some(detail) => write!(f, "server error ({status}): {detail}"),
                    None => write!(f, "server error ({status})"),
                }
            }
            Error::PriceError(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::UrlParseError(e) => Some(e),
            Error::ReqwestError(e) => Some(e),
            Error::ServerError { .. } => None,
            Error::PriceError(e) => Some(e),
        }
    }
}

impl From<PriceError> for Error {
    fn from(e: PriceError) -> Self {
        Error::PriceError(e)
    }
}
