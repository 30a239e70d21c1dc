use anyhow::Result;
use tracing::debug;

use fanquote::matcher::MatchScorer;
use fanquote::record::CandidateRecord;

use crate::args::{self, Reportable};
use crate::cmd_history::RankingReport;
use crate::util;

pub fn run(_global_args: &args::GlobalArgs, args: &args::ScoreArgs) -> Result<()> {
    let query = args.record_args.to_query()?;
    util::warn_implausible_dimensions(&query);

    let candidates: Vec<CandidateRecord> = util::read_json(&args.candidates)?;
    debug!("Ranking {} candidates from {}", candidates.len(), args.candidates.display());

    let mut records = MatchScorer::new().rank(&query, candidates);
    if let Some(limit) = args.limit {
        records.truncate(limit);
    }
    RankingReport { query, records }.report(&args.output_args)
}
