use anyhow::{bail, Context, Result};
use serde::de::DeserializeOwned;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::{debug, warn};

use fanquote::api;
use fanquote::dimension::Axis;
use fanquote::progress::Progress;
use fanquote::record::{number_of, QueryRecord};

use crate::args::{ApiArgs, GlobalArgs};

/// Read and deserialize a JSON file.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let value = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Failed to parse JSON from {}", path.display()))?;
    Ok(value)
}

/// Create the single-threaded async runtime used for network calls.
pub fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to initialize async runtime")
}

/// Log a warning for each dimension that looks like a typo or a unit mix-up.
pub fn warn_implausible_dimensions(query: &QueryRecord) {
    let dims = [
        (Axis::Length, &query.length),
        (Axis::Width, &query.width),
        (Axis::Height, &query.height),
    ];
    for (axis, value) in dims {
        if let Some(mm) = number_of(value) {
            if let Some(msg) = axis.check(mm).warning(axis) {
                warn!("{msg} (got {mm}mm)");
            }
        }
    }
}

/// Consult the configured access-check endpoint, if any.
///
/// A failed check counts as a denial.
pub async fn ensure_access(
    global_args: &GlobalArgs,
    api_args: &ApiArgs,
    client: &api::Client,
) -> Result<()> {
    let url = match &api_args.access_url {
        None => return Ok(()),
        Some(url) => url,
    };

    let progress = Progress::new_spinner("Checking access", global_args.use_progress());
    let status = client.check_access(url).await;
    progress.finish_and_clear();

    match status {
        Ok(status) if status.allowed => {
            debug!("Access granted for {}", status.ip.as_deref().unwrap_or("unknown address"));
            Ok(())
        }
        Ok(status) => bail!(
            "Access denied for {}: {}",
            status.ip.as_deref().unwrap_or("unknown address"),
            status.message.as_deref().unwrap_or("not authorized")
        ),
        Err(e) => Err(e).context("Access check failed; treating as not authorized"),
    }
}
