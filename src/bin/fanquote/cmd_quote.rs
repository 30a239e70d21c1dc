use anyhow::{Context, Result};
use indicatif::HumanCount;
use lazy_static::lazy_static;
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use fanquote::api;
use fanquote::datastore::{Datastore, QuoteEntry, QuoteOutcome};
use fanquote::features::DerivedFeatures;
use fanquote::progress::Progress;

use crate::args::{self, Reportable};
use crate::util;

lazy_static! {
    static ref STYLE_PRICE: console::Style = console::Style::new().bold().green();
    static ref STYLE_ERROR: console::Style = console::Style::new().bold().red();
    static ref STYLE_HEADING: console::Style = console::Style::new().bold();
}

pub fn run(global_args: &args::GlobalArgs, args: &args::QuoteArgs) -> Result<()> {
    let query = args.record_args.to_query()?;
    util::warn_implausible_dimensions(&query);
    let features = DerivedFeatures::compute(&query);

    let client = args.api_args.client()?;
    let runtime = util::runtime()?;

    runtime.block_on(util::ensure_access(global_args, &args.api_args, &client))?;

    let progress = Progress::new_spinner("Requesting prediction", global_args.use_progress());
    let prediction = runtime.block_on(client.predict(&query));
    progress.finish_and_clear();

    let (outcome, formatted, input_summary) = match prediction {
        Ok(p) => {
            info!("Predicted price: {}", p.formatted);
            (QuoteOutcome::Price(p.price), Some(p.formatted), p.input_summary)
        }
        Err(e) => {
            warn!("Prediction failed: {e}");
            (QuoteOutcome::Error(failure_message(&e)), None, None)
        }
    };

    let mut datastore = Datastore::create_or_open(&args.datastore_args.datastore)?;
    let entry = datastore
        .record_quote(&query, &outcome)
        .context("Failed to record quote")?;

    QuoteReport {
        entry,
        features,
        formatted,
        input_summary,
    }
    .report(&args.output_args)
}

/// The message shown to the user, and logged, for a failed prediction.
pub fn failure_message(e: &api::Error) -> String {
    match e {
        e if e.is_connect() => "prediction server unreachable".to_string(),
        api::Error::ServerError { body: Some(body), .. } if body.error.is_some() => {
            format!("server error: {}", body.error.as_deref().unwrap_or_default())
        }
        api::Error::ServerError { status, body } => format!(
            "server error ({}): {}",
            status.as_u16(),
            body.as_ref()
                .and_then(|b| b.message.as_deref())
                .unwrap_or("unknown error")
        ),
        api::Error::ReqwestError(e) if e.is_decode() => {
            "malformed response from prediction server".to_string()
        }
        e => e.to_string(),
    }
}

// -------------------------------------------------------------------------------------------------
// report
// -------------------------------------------------------------------------------------------------
#[derive(Serialize)]
struct QuoteReport {
    #[serde(flatten)]
    entry: QuoteEntry,

    features: DerivedFeatures,

    #[serde(skip_serializing_if = "Option::is_none")]
    formatted: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    input_summary: Option<Value>,
}

impl Reportable for QuoteReport {
    fn human_format<W: std::io::Write>(&self, mut writer: W) -> Result<()> {
        match &self.entry.outcome {
            QuoteOutcome::Price(price) => writeln!(
                writer,
                "{} {}",
                STYLE_HEADING.apply_to("Predicted price:"),
                STYLE_PRICE.apply_to(format!("NT$ {} 元", HumanCount(*price)))
            )?,
            QuoteOutcome::Error(msg) => writeln!(
                writer,
                "{} {}",
                STYLE_HEADING.apply_to("Prediction failed:"),
                STYLE_ERROR.apply_to(msg)
            )?,
        }

        let f = &self.features;
        writeln!(writer)?;
        writeln!(writer, "{}", STYLE_HEADING.apply_to("Derived features"))?;
        writeln!(writer, "  volume               {}", f.volume)?;
        writeln!(writer, "  power density        {}", f.power_density)?;
        writeln!(writer, "  airflow efficiency   {}", f.airflow_efficiency)?;
        writeln!(writer, "  pressure efficiency  {}", f.pressure_efficiency)?;
        writeln!(writer, "  length/width         {}", f.length_width_ratio)?;
        writeln!(writer, "  height/width         {}", f.height_width_ratio)?;

        if let Some(summary) = &self.input_summary {
            writeln!(writer)?;
            writeln!(writer, "{}", STYLE_HEADING.apply_to("Server input summary"))?;
            serde_json::to_writer_pretty(&mut writer, summary)?;
            writeln!(writer)?;
        }

        writeln!(writer)?;
        writeln!(writer, "Recorded as quote {}", self.entry.id)?;
        Ok(())
    }

    fn json_format<W: std::io::Write>(&self, mut writer: W) -> Result<()> {
        serde_json::to_writer_pretty(&mut writer, self)?;
        writeln!(writer)?;
        Ok(())
    }

    fn jsonl_format<W: std::io::Write>(&self, mut writer: W) -> Result<()> {
        serde_json::to_writer(&mut writer, self)?;
        writeln!(writer)?;
        Ok(())
    }
}
