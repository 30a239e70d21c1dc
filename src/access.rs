//! IP-allowlist gating.
//!
//! The handler is a pure function from a request description to a response description, so it
//! can back any HTTP front end and can be exercised directly from the command line.

use serde::Serialize;
use std::collections::BTreeSet;
use std::net::IpAddr;
use std::str::FromStr;
use tracing::debug;

// -------------------------------------------------------------------------------------------------
// Allowlist
// -------------------------------------------------------------------------------------------------
/// A set of IP addresses permitted to use the service.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Allowlist {
    addrs: BTreeSet<IpAddr>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllowlistParseError {
    pub entry: String,
}

impl std::fmt::Display for AllowlistParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid IP address in allowlist: {:?}", self.entry)
    }
}

impl std::error::Error for AllowlistParseError {}

/// Parse a list of addresses separated by commas, whitespace, or newlines.
///
/// Anything from a `#` to the end of its line is ignored.
impl FromStr for Allowlist {
    type Err = AllowlistParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut addrs = BTreeSet::new();
        for line in s.lines() {
            let line = line.split('#').next().unwrap_or("");
            for entry in line.split(|c: char| c == ',' || c.is_whitespace()) {
                if entry.is_empty() {
                    continue;
                }
                let addr = entry.parse().map_err(|_| AllowlistParseError {
                    entry: entry.to_string(),
                })?;
                addrs.insert(addr);
            }
        }
        Ok(Allowlist { addrs })
    }
}

impl FromIterator<IpAddr> for Allowlist {
    fn from_iter<T: IntoIterator<Item = IpAddr>>(iter: T) -> Self {
        Allowlist {
            addrs: iter.into_iter().collect(),
        }
    }
}

impl Allowlist {
    pub fn len(&self) -> usize {
        self.addrs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addrs.is_empty()
    }

    /// Is the given client address on the list?
    ///
    /// Addresses that do not parse are never allowed.
    pub fn allows(&self, client_ip: &str) -> bool {
        client_ip
            .trim()
            .parse::<IpAddr>()
            .map(|ip| self.addrs.contains(&ip))
            .unwrap_or(false)
    }

    /// Decide how to answer an access-check request.
    pub fn evaluate(&self, request: &AccessRequest) -> AccessResponse {
        if request.method.eq_ignore_ascii_case("OPTIONS") {
            return AccessResponse::new(200, None);
        }

        let ip = request.client_ip().unwrap_or_default().to_string();
        debug!("Access check from client IP {ip:?}");

        if self.allows(&ip) {
            AccessResponse::new(
                200,
                Some(AccessBody {
                    error: None,
                    message: GRANTED_MESSAGE.to_string(),
                    ip,
                    allowed: true,
                }),
            )
        } else {
            AccessResponse::new(
                403,
                Some(AccessBody {
                    error: Some(DENIED_ERROR.to_string()),
                    message: DENIED_MESSAGE.to_string(),
                    ip,
                    allowed: false,
                }),
            )
        }
    }
}

const GRANTED_MESSAGE: &str = "Access granted";
const DENIED_ERROR: &str = "Access Denied";
const DENIED_MESSAGE: &str = "Your IP address is not authorized to access this application.";

// -------------------------------------------------------------------------------------------------
// AccessRequest
// -------------------------------------------------------------------------------------------------
/// The parts of an incoming HTTP request that matter for access checks.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AccessRequest {
    pub method: String,

    /// The raw `X-Forwarded-For` header
    pub forwarded_for: Option<String>,

    /// The raw `X-Real-IP` header
    pub real_ip: Option<String>,

    /// The address of the connecting socket
    pub peer: Option<String>,
}

impl AccessRequest {
    /// The client's address: the first `X-Forwarded-For` entry, then `X-Real-IP`, then the
    /// socket peer. Empty values are skipped.
    pub fn client_ip(&self) -> Option<&str> {
        let forwarded = self
            .forwarded_for
            .as_deref()
            .and_then(|h| h.split(',').next())
            .map(str::trim);
        let real_ip = self.real_ip.as_deref().map(str::trim);
        let peer = self.peer.as_deref().map(str::trim);

        forwarded
            .into_iter()
            .chain(real_ip)
            .chain(peer)
            .find(|s| !s.is_empty())
    }
}

// -------------------------------------------------------------------------------------------------
// AccessResponse
// -------------------------------------------------------------------------------------------------
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AccessBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub message: String,
    pub ip: String,
    pub allowed: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AccessResponse {
    pub status: u16,
    pub headers: Vec<(&'static str, &'static str)>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<AccessBody>,
}

pub const CORS_HEADERS: [(&str, &str); 3] = [
    ("Access-Control-Allow-Origin", "*"),
    ("Access-Control-Allow-Methods", "GET, POST, OPTIONS"),
    ("Access-Control-Allow-Headers", "Content-Type"),
];

impl AccessResponse {
    fn new(status: u16, body: Option<AccessBody>) -> Self {
        AccessResponse {
            status,
            headers: CORS_HEADERS.to_vec(),
            body,
        }
    }

    pub fn is_allowed(&self) -> bool {
        self.status == 200
    }
}
