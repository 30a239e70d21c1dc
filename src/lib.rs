//! Price estimation support for industrial fans and blowers.
//!
//! The heart of this crate is [`matcher`], which scores historical purchase records by their
//! similarity to a query. Around it are the pieces needed to quote a unit end to end: derived
//! features and the prediction wire format, a client for the pricing server, an access
//! allowlist, extraction of records from vision-model replies, and a local log of recent quotes.

pub mod access;
pub mod api;
pub mod datastore;
pub mod dimension;
pub mod extract;
pub mod features;
pub mod history;
pub mod matcher;
pub mod prediction;
pub mod progress;
pub mod record;
pub mod session;
