use anyhow::{bail, Result};
use indicatif::HumanCount;
use tracing::info;

use fanquote::datastore::{Datastore, QuoteEntry, QuoteOutcome};
use fanquote::record::text_of;

use crate::args::{self, Reportable};

pub fn run(global_args: &args::GlobalArgs, args: &args::QuotesCommand) -> Result<()> {
    match args {
        args::QuotesCommand::List(args) => list(global_args, args),
        args::QuotesCommand::Remove(args) => remove(global_args, args),
    }
}

fn list(_global_args: &args::GlobalArgs, args: &args::QuotesListArgs) -> Result<()> {
    let datastore = Datastore::create_or_open(&args.datastore_args.datastore)?;
    QuoteLog(datastore.quotes()?).report(&args.output_args)
}

fn remove(_global_args: &args::GlobalArgs, args: &args::QuotesRemoveArgs) -> Result<()> {
    let mut datastore = Datastore::create_or_open(&args.datastore_args.datastore)?;
    if !datastore.remove_quote(args.id)? {
        bail!("No quote with id {}", args.id);
    }
    info!("Removed quote {}", args.id);
    Ok(())
}

// -------------------------------------------------------------------------------------------------
// report
// -------------------------------------------------------------------------------------------------
struct QuoteLog(Vec<QuoteEntry>);

fn quote_table(entries: &[QuoteEntry]) -> prettytable::Table {
    use prettytable::format::{FormatBuilder, LinePosition, LineSeparator};
    use prettytable::row;

    let f = FormatBuilder::new()
        .column_separator(' ')
        .separators(&[LinePosition::Title], LineSeparator::new('─', '─', '─', '─'))
        .padding(1, 1)
        .build();

    let mut table: prettytable::Table = entries
        .iter()
        .map(|e| {
            let q = &e.query;
            let describe = [&q.product_name, &q.specification]
                .into_iter()
                .filter_map(text_of)
                .collect::<Vec<_>>()
                .join(" ");
            let outcome = match &e.outcome {
                QuoteOutcome::Price(p) => HumanCount(*p).to_string(),
                QuoteOutcome::Error(msg) => msg.clone(),
            };
            row![
                r -> e.id,
                l -> e.created_at.format("%Y-%m-%d %H:%M:%S"),
                l -> describe,
                r -> outcome,
            ]
        })
        .collect();
    table.set_format(f);
    table.set_titles(row![rb -> "Id", lb -> "Time (UTC)", lb -> "Query", cb -> "Price"]);
    table
}

impl Reportable for QuoteLog {
    fn human_format<W: std::io::Write>(&self, mut writer: W) -> Result<()> {
        if self.0.is_empty() {
            writeln!(writer, "No quotes recorded")?;
            return Ok(());
        }
        writeln!(writer)?;
        quote_table(&self.0).print(&mut writer)?;
        Ok(())
    }

    fn json_format<W: std::io::Write>(&self, mut writer: W) -> Result<()> {
        serde_json::to_writer_pretty(&mut writer, &self.0)?;
        writeln!(writer)?;
        Ok(())
    }

    fn jsonl_format<W: std::io::Write>(&self, mut writer: W) -> Result<()> {
        for entry in self.0.iter() {
            serde_json::to_writer(&mut writer, entry)?;
            writeln!(writer)?;
        }
        Ok(())
    }
}
