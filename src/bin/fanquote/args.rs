use anyhow::{Context, Result};
use clap::{crate_description, crate_version, ArgAction, Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

use fanquote::api;
use fanquote::dimension::parse_millimetres;
use fanquote::record::{FieldValue, QueryRecord};

// -----------------------------------------------------------------------------
// command-line args
// -----------------------------------------------------------------------------
#[derive(Parser, Debug)]
#[command(
    version,  // retrieved from Cargo.toml `version`
    about,    // retrieved from Cargo.toml `description`

    long_version = concat!(
        crate_version!(),
    ),

    long_about = concat!(
        crate_description!(),
    ),
)]
#[deny(missing_docs)]
/// Predict fan and blower prices and find similar historical purchases
pub struct CommandLineArgs {
    #[command(subcommand)]
    pub command: Command,

    #[command(flatten)]
    pub global_args: GlobalArgs,
}

impl CommandLineArgs {
    pub fn parse_args() -> Self {
        let mut s = Self::parse();

        // If `NO_COLOR` is set in the environment, disable colored output
        //
        // https://no-color.org/
        if std::env::var("NO_COLOR").is_ok() {
            s.global_args.color = Mode::Never
        }

        s
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Request a price prediction
    ///
    /// The query starts from the usual form defaults (2500mm cube, 250HP, SS400 materials, and so
    /// on). Values from `--query` are applied on top of those, and then any explicit attribute
    /// options.
    ///
    /// The outcome, whether a price or an error, is recorded in the local quote log.
    #[command(display_order = 1)]
    Quote(QuoteArgs),

    /// Look up historical purchases ranked by similarity to a query
    ///
    /// Records are fetched from the pricing server's history endpoint and ranked locally.
    ///
    /// With `--select N`, the attributes of the Nth-ranked record become the query: history is
    /// fetched again using them, and the new results are ranked against that record instead of
    /// the command-line query.
    #[command(display_order = 2)]
    History(HistoryArgs),

    /// Rank historical records from a file, without contacting any server
    #[command(display_order = 3)]
    Score(ScoreArgs),

    /// Show or edit the local log of recent quotes
    #[command(display_order = 4, subcommand)]
    Quotes(QuotesCommand),

    /// Build a query record from saved vision-model replies
    ///
    /// Each input is the raw text of one reply, containing a JSON object somewhere within it. At
    /// least one of the two must yield usable information.
    #[command(display_order = 5)]
    Extract(ExtractArgs),

    /// Evaluate or query an IP allowlist
    #[command(display_order = 6, subcommand)]
    Access(AccessCommand),

    /// Check that the pricing server is up
    #[command(display_order = 7)]
    Health(HealthArgs),
}

// -----------------------------------------------------------------------------
// global options
// -----------------------------------------------------------------------------
#[derive(Args, Debug)]
#[command(next_help_heading = "Global Options")]
pub struct GlobalArgs {
    /// Enable verbose output
    ///
    /// This can be repeated up to 3 times to enable successively more output.
    #[arg(global=true, long, short, action=ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error feedback messages
    ///
    /// This silences WARNING, INFO, DEBUG, and TRACE messages and disables progress spinners.
    /// This takes precedence over the verbose option.
    #[arg(global = true, long, short)]
    pub quiet: bool,

    /// Enable or disable colored output
    ///
    /// When this is "auto", colors are enabled when stdout is a tty.
    ///
    /// If the `NO_COLOR` environment variable is set, it takes precedence and is equivalent to `--color=never`.
    #[arg(global=true, long, default_value_t=Mode::Auto, value_name="MODE")]
    pub color: Mode,

    /// Enable or disable progress spinners
    ///
    /// When this is "auto", spinners are enabled when stderr is a tty.
    #[arg(global=true, long, default_value_t=Mode::Auto, value_name="MODE")]
    pub progress: Mode,
}

impl GlobalArgs {
    pub fn use_color(&self) -> bool {
        match self.color {
            Mode::Never => false,
            Mode::Always => true,
            Mode::Auto => atty::is(atty::Stream::Stdout),
        }
    }

    pub fn use_color_stderr(&self) -> bool {
        match self.color {
            Mode::Never => false,
            Mode::Always => true,
            Mode::Auto => atty::is(atty::Stream::Stderr),
        }
    }

    pub fn use_progress(&self) -> bool {
        if self.quiet {
            return false;
        }
        match self.progress {
            Mode::Never => false,
            Mode::Always => true,
            Mode::Auto => atty::is(atty::Stream::Stderr),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
pub enum Mode {
    Auto,
    Never,
    Always,
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Mode::Auto => "auto",
            Mode::Never => "never",
            Mode::Always => "always",
        };
        write!(f, "{s}")
    }
}

// -----------------------------------------------------------------------------
// server options
// -----------------------------------------------------------------------------
#[derive(Args, Debug)]
#[command(next_help_heading = "Server Options")]
pub struct ApiArgs {
    /// Base URL of the pricing server
    #[arg(long, value_name = "URL", env("FQ_API_URL"), default_value = api::ClientBuilder::DEFAULT_BASE_URL)]
    pub api_url: String,

    /// URL of an access-check endpoint to consult before contacting the pricing server
    ///
    /// If access is denied, or the check itself fails, the command stops without contacting the
    /// pricing server.
    #[arg(long, value_name = "URL", env("FQ_ACCESS_URL"))]
    pub access_url: Option<String>,

    /// Request timeout, in seconds
    #[arg(long, value_name = "SECONDS", env("FQ_TIMEOUT"))]
    pub timeout: Option<f64>,
}

impl ApiArgs {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
            .filter(|t| t.is_finite() && *t > 0.0)
            .map(Duration::from_secs_f64)
    }

    pub fn client(&self) -> Result<api::Client> {
        let client = api::ClientBuilder::new()
            .base_url(self.api_url.as_str())
            .with_context(|| format!("Invalid server URL {:?}", self.api_url))?
            .timeout(self.timeout())
            .build()
            .context("Failed to initialize HTTP client")?;
        Ok(client)
    }
}

// -----------------------------------------------------------------------------
// record options
// -----------------------------------------------------------------------------
fn parse_dimension(s: &str) -> Result<f64, String> {
    parse_millimetres(s).map_err(|e| e.to_string())
}

#[derive(Args, Debug, Default)]
#[command(next_help_heading = "Record Options")]
pub struct RecordArgs {
    /// Read a query record from a JSON file
    ///
    /// Keys are the snake_case attribute names, e.g. `length`, `static_pressure`, `casing_material`.
    #[arg(long, value_name = "FILE")]
    pub query: Option<PathBuf>,

    /// Do not start from the form defaults
    #[arg(long)]
    pub no_defaults: bool,

    /// Overall length; a bare number is in mm, or give a unit: mm, cm, m
    #[arg(long, value_name = "LENGTH", value_parser = parse_dimension)]
    pub length: Option<f64>,

    /// Overall width; a bare number is in mm, or give a unit: mm, cm, m
    #[arg(long, value_name = "LENGTH", value_parser = parse_dimension)]
    pub width: Option<f64>,

    /// Overall height; a bare number is in mm, or give a unit: mm, cm, m
    #[arg(long, value_name = "LENGTH", value_parser = parse_dimension)]
    pub height: Option<f64>,

    /// Static pressure in mmAq
    #[arg(long, value_name = "MMAQ")]
    pub static_pressure: Option<f64>,

    /// Motor power in HP
    #[arg(long, value_name = "HP")]
    pub horsepower: Option<f64>,

    /// Airflow in NCMM
    #[arg(long, value_name = "NCMM")]
    pub airflow: Option<f64>,

    /// Operating temperature in °C
    #[arg(long, value_name = "CELSIUS", allow_negative_numbers = true)]
    pub operating_temperature: Option<f64>,

    /// Purchase quantity
    #[arg(long, value_name = "N")]
    pub quantity: Option<f64>,

    /// Impeller diameter in mm
    #[arg(long, value_name = "MM")]
    pub impeller_diameter: Option<f64>,

    /// Series code
    #[arg(long, value_name = "TEXT")]
    pub series: Option<String>,

    /// Specification, e.g. 型五
    #[arg(long, value_name = "TEXT")]
    pub specification: Option<String>,

    /// Outlet direction
    #[arg(long, value_name = "TEXT")]
    pub outlet_direction: Option<String>,

    /// Casing material
    #[arg(long, value_name = "TEXT")]
    pub casing_material: Option<String>,

    /// Frame material
    #[arg(long, value_name = "TEXT")]
    pub frame_material: Option<String>,

    /// Product name
    #[arg(long, value_name = "TEXT")]
    pub product_name: Option<String>,

    /// Drive method
    #[arg(long, value_name = "TEXT")]
    pub drive_method: Option<String>,

    /// Fire-spark protection level
    #[arg(long, value_name = "TEXT")]
    pub fire_spark_level: Option<String>,

    /// Single or double suction
    #[arg(long, value_name = "TEXT")]
    pub suction: Option<String>,

    /// Fan grade
    #[arg(long, value_name = "TEXT")]
    pub fan_grade: Option<String>,
}

impl RecordArgs {
    /// The query record given by these options, as described in the `quote` help.
    pub fn to_query(&self) -> Result<QueryRecord> {
        let mut query = if self.no_defaults {
            QueryRecord::default()
        } else {
            QueryRecord::form_defaults()
        };

        if let Some(path) = &self.query {
            let from_file = crate::util::read_json::<QueryRecord>(path)?;
            query.overlay(&from_file);
        }

        let num = |v: Option<f64>| v.map(FieldValue::from);
        let text = |v: &Option<String>| v.clone().map(FieldValue::from);

        query.overlay(&QueryRecord {
            length: num(self.length),
            width: num(self.width),
            height: num(self.height),
            static_pressure: num(self.static_pressure),
            horsepower: num(self.horsepower),
            airflow: num(self.airflow),
            operating_temperature: num(self.operating_temperature),
            purchase_quantity: num(self.quantity),
            impeller_diameter: num(self.impeller_diameter),
            series: text(&self.series),
            specification: text(&self.specification),
            outlet_direction: text(&self.outlet_direction),
            casing_material: text(&self.casing_material),
            frame_material: text(&self.frame_material),
            product_name: text(&self.product_name),
            drive_method: text(&self.drive_method),
            fire_spark_level: text(&self.fire_spark_level),
            suction: text(&self.suction),
            fan_grade: text(&self.fan_grade),
        });

        Ok(query)
    }
}

// -----------------------------------------------------------------------------
// `quote` command
// -----------------------------------------------------------------------------
#[derive(Args, Debug)]
pub struct QuoteArgs {
    #[command(flatten)]
    pub record_args: RecordArgs,

    #[command(flatten)]
    pub datastore_args: DatastoreArgs,

    #[command(flatten)]
    pub api_args: ApiArgs,

    #[command(flatten)]
    pub output_args: OutputArgs,
}

// -----------------------------------------------------------------------------
// `history` command
// -----------------------------------------------------------------------------
#[derive(Args, Debug)]
pub struct HistoryArgs {
    /// Rank against the attributes of the Nth result (1-based) instead of the query
    #[arg(long, value_name = "N")]
    pub select: Option<std::num::NonZeroUsize>,

    /// Show at most this many records
    #[arg(long, short = 'n', value_name = "N")]
    pub limit: Option<usize>,

    #[command(flatten)]
    pub record_args: RecordArgs,

    #[command(flatten)]
    pub api_args: ApiArgs,

    #[command(flatten)]
    pub output_args: OutputArgs,
}

// -----------------------------------------------------------------------------
// `score` command
// -----------------------------------------------------------------------------
#[derive(Args, Debug)]
pub struct ScoreArgs {
    /// JSON file holding an array of historical records
    #[arg(long, value_name = "FILE")]
    pub candidates: PathBuf,

    /// Show at most this many records
    #[arg(long, short = 'n', value_name = "N")]
    pub limit: Option<usize>,

    #[command(flatten)]
    pub record_args: RecordArgs,

    #[command(flatten)]
    pub output_args: OutputArgs,
}

// -----------------------------------------------------------------------------
// `quotes` command
// -----------------------------------------------------------------------------
#[derive(Subcommand, Debug)]
pub enum QuotesCommand {
    /// List recent quotes, newest first
    List(QuotesListArgs),

    /// Remove a quote from the log
    Remove(QuotesRemoveArgs),
}

#[derive(Args, Debug)]
pub struct QuotesListArgs {
    #[command(flatten)]
    pub datastore_args: DatastoreArgs,

    #[command(flatten)]
    pub output_args: OutputArgs,
}

#[derive(Args, Debug)]
pub struct QuotesRemoveArgs {
    /// The id of the quote to remove
    #[arg(value_name = "ID")]
    pub id: i64,

    #[command(flatten)]
    pub datastore_args: DatastoreArgs,
}

#[derive(Args, Debug)]
pub struct DatastoreArgs {
    /// Use the specified datastore path for the quote log
    ///
    /// The datastore will be created if it does not exist.
    #[arg(long, short, value_name = "PATH", env("FQ_DATASTORE"), default_value = "fanquote.db.d")]
    pub datastore: PathBuf,
}

// -----------------------------------------------------------------------------
// `extract` command
// -----------------------------------------------------------------------------
#[derive(Args, Debug)]
pub struct ExtractArgs {
    /// File holding the reply to the attribute question
    #[arg(long, value_name = "FILE", required_unless_present = "dimensions")]
    pub spec: Option<PathBuf>,

    /// File holding the reply to the dimension question
    #[arg(long, value_name = "FILE")]
    pub dimensions: Option<PathBuf>,

    #[command(flatten)]
    pub output_args: OutputArgs,
}

// -----------------------------------------------------------------------------
// `access` command
// -----------------------------------------------------------------------------
#[derive(Subcommand, Debug)]
pub enum AccessCommand {
    /// Run the allowlist check locally against a described request
    Evaluate(AccessEvaluateArgs),

    /// Ask the configured access-check endpoint whether this machine is allowed
    Check(AccessCheckArgs),
}

#[derive(Args, Debug)]
pub struct AccessEvaluateArgs {
    /// Allowed addresses, separated by commas or whitespace
    #[arg(long, value_name = "LIST", required_unless_present = "allow_file")]
    pub allow: Option<String>,

    /// Read allowed addresses from a file, one or more per line; `#` starts a comment
    #[arg(long, value_name = "FILE")]
    pub allow_file: Option<PathBuf>,

    /// The request method
    #[arg(long, value_name = "METHOD", default_value = "GET")]
    pub method: String,

    /// Value of the `X-Forwarded-For` header
    #[arg(long, value_name = "VALUE")]
    pub forwarded_for: Option<String>,

    /// Value of the `X-Real-IP` header
    #[arg(long, value_name = "VALUE")]
    pub real_ip: Option<String>,

    /// Address of the connecting peer
    #[arg(long, value_name = "ADDR")]
    pub peer: Option<String>,

    #[command(flatten)]
    pub output_args: OutputArgs,
}

#[derive(Args, Debug)]
pub struct AccessCheckArgs {
    #[command(flatten)]
    pub api_args: ApiArgs,

    #[command(flatten)]
    pub output_args: OutputArgs,
}

// -----------------------------------------------------------------------------
// `health` command
// -----------------------------------------------------------------------------
#[derive(Args, Debug)]
pub struct HealthArgs {
    #[command(flatten)]
    pub api_args: ApiArgs,

    #[command(flatten)]
    pub output_args: OutputArgs,
}

// -----------------------------------------------------------------------------
// output options
// -----------------------------------------------------------------------------
#[derive(Args, Debug)]
#[command(next_help_heading = "Output Options")]
pub struct OutputArgs {
    /// Write output to the specified path
    ///
    /// If this argument is not provided, stdout will be used.
    #[arg(long, short, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Write output in the specified format
    #[arg(long, short, value_name="FORMAT", default_value_t=OutputFormat::Human)]
    pub format: OutputFormat,
}

impl OutputArgs {
    /// Get a writer for the specified output destination.
    pub fn get_writer(&self) -> std::io::Result<Box<dyn std::io::Write>> {
        use std::fs::File;
        use std::io::BufWriter;

        match &self.output {
            None => Ok(Box::new(BufWriter::new(std::io::stdout()))),
            Some(p) => {
                let f = File::create(p)?;
                Ok(Box::new(BufWriter::new(f)))
            }
        }
    }
}

// -----------------------------------------------------------------------------
// output format
// -----------------------------------------------------------------------------
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
pub enum OutputFormat {
    /// A text-based format designed for humans
    Human,

    /// Pretty-printed JSON format
    Json,

    /// JSON Lines format
    ///
    /// This is a sequence of JSON objects, one per line.
    Jsonl,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            OutputFormat::Human => "human",
            OutputFormat::Json => "json",
            OutputFormat::Jsonl => "jsonl",
        };
        write!(f, "{s}")
    }
}

// -----------------------------------------------------------------------------
// report writer
// -----------------------------------------------------------------------------
pub trait Reportable {
    fn human_format<W: std::io::Write>(&self, writer: W) -> Result<()>;
    fn json_format<W: std::io::Write>(&self, writer: W) -> Result<()>;
    fn jsonl_format<W: std::io::Write>(&self, writer: W) -> Result<()>;

    fn report(&self, output_args: &OutputArgs) -> Result<()> {
        let writer = output_args
            .get_writer()
            .context("Failed to open output destination for writing")?;

        let result = match &output_args.format {
            OutputFormat::Human => self.human_format(writer),
            OutputFormat::Json => self.json_format(writer),
            OutputFormat::Jsonl => self.jsonl_format(writer),
        };
        match result {
            Ok(()) => Ok(()),
            Err(e) => match e.downcast_ref::<std::io::Error>() {
                // Ignore SIGPIPE errors, like those that can come from piping to `head`
                Some(e) if e.kind() == std::io::ErrorKind::BrokenPipe => Ok(()),
                _ => Err(e)?,
            },
        }
    }
}
