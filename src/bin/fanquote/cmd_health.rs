use anyhow::{Context, Result};

use fanquote::api::HealthStatus;
use fanquote::progress::Progress;

use crate::args::{self, Reportable};
use crate::util;

pub fn run(global_args: &args::GlobalArgs, args: &args::HealthArgs) -> Result<()> {
    let client = args.api_args.client()?;
    let runtime = util::runtime()?;

    runtime.block_on(util::ensure_access(global_args, &args.api_args, &client))?;

    let progress = Progress::new_spinner("Checking server health", global_args.use_progress());
    let status = runtime.block_on(client.health());
    progress.finish_and_clear();
    let status = status.with_context(|| format!("Failed to reach {}", client.base_url()))?;

    HealthReport(status).report(&args.output_args)
}

struct HealthReport(HealthStatus);

impl Reportable for HealthReport {
    fn human_format<W: std::io::Write>(&self, mut writer: W) -> Result<()> {
        let h = &self.0;
        write!(writer, "Server status: {}", h.status)?;
        if let Some(version) = &h.version {
            write!(writer, " (version {version})")?;
        }
        writeln!(writer)?;
        if let Some(message) = &h.message {
            writeln!(writer, "{message}")?;
        }
        Ok(())
    }

    fn json_format<W: std::io::Write>(&self, mut writer: W) -> Result<()> {
        serde_json::to_writer_pretty(&mut writer, &self.0)?;
        writeln!(writer)?;
        Ok(())
    }

    fn jsonl_format<W: std::io::Write>(&self, mut writer: W) -> Result<()> {
        serde_json::to_writer(&mut writer, &self.0)?;
        writeln!(writer)?;
        Ok(())
    }
}
