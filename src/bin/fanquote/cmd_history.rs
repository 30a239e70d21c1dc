use anyhow::{bail, Context, Result};
use indicatif::HumanCount;
use serde::Serialize;
use tracing::info;

use fanquote::matcher::ScoredCandidate;
use fanquote::progress::Progress;
use fanquote::record::{number_of, text_of, FieldValue, QueryRecord};
use fanquote::session::RankingSession;

use crate::args::{self, Reportable};
use crate::util;

pub fn run(global_args: &args::GlobalArgs, args: &args::HistoryArgs) -> Result<()> {
    let live = args.record_args.to_query()?;
    util::warn_implausible_dimensions(&live);

    let client = args.api_args.client()?;
    let runtime = util::runtime()?;

    runtime.block_on(util::ensure_access(global_args, &args.api_args, &client))?;

    let progress = Progress::new_spinner("Fetching history", global_args.use_progress());
    let session = runtime.block_on(async {
        let records = client
            .history(&live)
            .await
            .context("Failed to fetch historical records")?;
        let mut session = RankingSession::new().with_candidates(records);

        if let Some(n) = args.select {
            let ranked = session.rescored(&live);
            let chosen = match ranked.get(n.get() - 1) {
                Some(s) => s.candidate.clone(),
                None => bail!("Cannot select record {n}: only {} found", ranked.len()),
            };
            info!(
                "Ranking against record {n} (order {})",
                text_of(&chosen.order_number).as_deref().unwrap_or("unknown")
            );
            session = session.select(&chosen);

            let pinned = session.matching_query(&live).clone();
            progress.set_message("Fetching history for the selected record");
            let records = client
                .history(&pinned)
                .await
                .context("Failed to fetch historical records")?;
            session = session.with_candidates(records);
        }

        Ok::<_, anyhow::Error>(session)
    });
    progress.finish_and_clear();
    let session = session?;

    let mut ranked = session.rescored(&live);
    if let Some(limit) = args.limit {
        ranked.truncate(limit);
    }
    RankingReport {
        query: session.matching_query(&live).clone(),
        records: ranked,
    }
    .report(&args.output_args)
}

// -------------------------------------------------------------------------------------------------
// report
// -------------------------------------------------------------------------------------------------
/// Ranked historical records, along with the query they were ranked against.
#[derive(Serialize)]
pub struct RankingReport {
    pub query: QueryRecord,
    pub records: Vec<ScoredCandidate>,
}

fn cell(v: &Option<FieldValue>) -> String {
    text_of(v).map(|s| s.into_owned()).unwrap_or_default()
}

fn dimensions_cell(s: &ScoredCandidate) -> String {
    let c = &s.candidate;
    match (number_of(&c.length), number_of(&c.width), number_of(&c.height)) {
        (None, None, None) => String::new(),
        (l, w, h) => {
            let f = |v: Option<f64>| v.map(|v| v.to_string()).unwrap_or_else(|| "?".to_string());
            format!("{}×{}×{}", f(l), f(w), f(h))
        }
    }
}

fn price_cell(v: &Option<FieldValue>) -> String {
    match number_of(v) {
        Some(p) if p >= 0.0 => HumanCount(p.round() as u64).to_string(),
        _ => cell(v),
    }
}

pub fn ranking_table(records: &[ScoredCandidate]) -> prettytable::Table {
    use prettytable::format::{FormatBuilder, LinePosition, LineSeparator};
    use prettytable::row;

    let f = FormatBuilder::new()
        .column_separator(' ')
        .separators(&[LinePosition::Title], LineSeparator::new('─', '─', '─', '─'))
        .padding(1, 1)
        .build();

    let mut table: prettytable::Table = records
        .iter()
        .enumerate()
        .map(|(i, s)| {
            let c = &s.candidate;
            row![
                r -> i + 1,
                r -> format!("{:.1}", s.match_score),
                l -> cell(&c.vendor_name),
                l -> cell(&c.order_number),
                l -> cell(&c.product_name),
                l -> cell(&c.specification),
                r -> dimensions_cell(s),
                r -> cell(&c.horsepower_hp),
                r -> price_cell(&c.unit_price),
                l -> c.date().unwrap_or_default(),
            ]
        })
        .collect();
    table.set_format(f);
    table.set_titles(row![
        rb -> "#",
        cb -> "Match",
        lb -> "Vendor",
        lb -> "Order",
        lb -> "Product",
        lb -> "Spec",
        cb -> "L×W×H (mm)",
        cb -> "HP",
        cb -> "Unit Price",
        lb -> "Date",
    ]);
    table
}

impl Reportable for RankingReport {
    fn human_format<W: std::io::Write>(&self, mut writer: W) -> Result<()> {
        if self.records.is_empty() {
            writeln!(writer, "No historical records found")?;
            return Ok(());
        }
        writeln!(writer)?;
        ranking_table(&self.records).print(&mut writer)?;
        Ok(())
    }

    fn json_format<W: std::io::Write>(&self, mut writer: W) -> Result<()> {
        serde_json::to_writer_pretty(&mut writer, self)?;
        writeln!(writer)?;
        Ok(())
    }

    fn jsonl_format<W: std::io::Write>(&self, mut writer: W) -> Result<()> {
        for record in self.records.iter() {
            serde_json::to_writer(&mut writer, record)?;
            writeln!(writer)?;
        }
        Ok(())
    }
}
