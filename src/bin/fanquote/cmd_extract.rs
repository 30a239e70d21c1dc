use anyhow::{Context, Result};
use std::path::Path;
use tracing::info;

use fanquote::extract::ScannedRecord;
use fanquote::record::QueryRecord;

use crate::args::{self, Reportable};
use crate::util;

fn read_text(path: Option<&Path>) -> Result<Option<String>> {
    path.map(|p| {
        std::fs::read_to_string(p).with_context(|| format!("Failed to read {}", p.display()))
    })
    .transpose()
}

pub fn run(_global_args: &args::GlobalArgs, args: &args::ExtractArgs) -> Result<()> {
    let spec = read_text(args.spec.as_deref())?;
    let dimensions = read_text(args.dimensions.as_deref())?;

    let scanned = ScannedRecord::from_responses(spec.as_deref(), dimensions.as_deref())
        .context("Failed to extract a query record")?;
    info!(
        "Recognized {}{}",
        if scanned.has_spec { "attributes " } else { "" },
        if scanned.has_dimensions { "dimensions" } else { "" },
    );
    util::warn_implausible_dimensions(&scanned.query);

    ExtractReport(scanned.query).report(&args.output_args)
}

struct ExtractReport(QueryRecord);

impl Reportable for ExtractReport {
    fn human_format<W: std::io::Write>(&self, writer: W) -> Result<()> {
        // the output is meant to be fed back in with `--query`
        self.json_format(writer)
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
