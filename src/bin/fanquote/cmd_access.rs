use anyhow::{bail, Context, Result};
use serde::Serialize;

use fanquote::access::{AccessRequest, AccessResponse, Allowlist};
use fanquote::api::AccessStatus;
use fanquote::progress::Progress;

use crate::args::{self, Reportable};
use crate::util;

pub fn run(global_args: &args::GlobalArgs, args: &args::AccessCommand) -> Result<()> {
    match args {
        args::AccessCommand::Evaluate(args) => evaluate(global_args, args),
        args::AccessCommand::Check(args) => check(global_args, args),
    }
}

fn load_allowlist(args: &args::AccessEvaluateArgs) -> Result<Allowlist> {
    let mut text = args.allow.clone().unwrap_or_default();
    if let Some(path) = &args.allow_file {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read allowlist from {}", path.display()))?;
        text.push('\n');
        text.push_str(&contents);
    }
    let allowlist: Allowlist = text.parse()?;
    if allowlist.is_empty() {
        bail!("The allowlist is empty");
    }
    Ok(allowlist)
}

fn evaluate(_global_args: &args::GlobalArgs, args: &args::AccessEvaluateArgs) -> Result<()> {
    let allowlist = load_allowlist(args)?;
    let request = AccessRequest {
        method: args.method.clone(),
        forwarded_for: args.forwarded_for.clone(),
        real_ip: args.real_ip.clone(),
        peer: args.peer.clone(),
    };
    EvaluateReport(allowlist.evaluate(&request)).report(&args.output_args)
}

fn check(global_args: &args::GlobalArgs, args: &args::AccessCheckArgs) -> Result<()> {
    let url = match &args.api_args.access_url {
        Some(url) => url,
        None => bail!("No access-check URL configured; use --access-url or FQ_ACCESS_URL"),
    };
    let client = args.api_args.client()?;
    let runtime = util::runtime()?;

    let progress = Progress::new_spinner("Checking access", global_args.use_progress());
    let status = runtime.block_on(client.check_access(url));
    progress.finish_and_clear();
    let status = status.context("Access check failed")?;

    let allowed = status.allowed;
    CheckReport(status).report(&args.output_args)?;
    if !allowed {
        bail!("Access denied");
    }
    Ok(())
}

// -------------------------------------------------------------------------------------------------
// reports
// -------------------------------------------------------------------------------------------------
#[derive(Serialize)]
struct EvaluateReport(AccessResponse);

impl Reportable for EvaluateReport {
    fn human_format<W: std::io::Write>(&self, mut writer: W) -> Result<()> {
        let r = &self.0;
        writeln!(writer, "HTTP {}", r.status)?;
        for (name, value) in r.headers.iter() {
            writeln!(writer, "{name}: {value}")?;
        }
        if let Some(body) = &r.body {
            writeln!(writer)?;
            serde_json::to_writer_pretty(&mut writer, body)?;
            writeln!(writer)?;
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

struct CheckReport(AccessStatus);

impl Reportable for CheckReport {
    fn human_format<W: std::io::Write>(&self, mut writer: W) -> Result<()> {
        let s = &self.0;
        let verdict = if s.allowed { "allowed" } else { "denied" };
        writeln!(writer, "Access {verdict} for {}", s.ip.as_deref().unwrap_or("unknown address"))?;
        if let Some(message) = &s.message {
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
