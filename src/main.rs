use chrono::{DateTime, Utc};
use clap::{ArgAction, Args, Parser, Subcommand};
use colored::Colorize;
use eyre::Result;
use revlog_export::{ExportConfig, ExportError, ExportResult, Exporter, Store, VerifyReport, exit_code, verify_export};
use std::path::PathBuf;
use std::process;
use tracing::Level;

#[derive(Parser)]
#[command(name = "revlog-export")]
#[command(about = "Export an Anki collection's review history as JSONL")]
#[command(version = env!("GIT_DESCRIBE"))]
struct Cli {
    /// Increase log detail on stderr (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write matching reviews to a JSONL file
    Export(ExportArgs),

    /// Check that a collection can be opened for reading
    Check {
        /// Path to the collection file
        #[arg(short, long)]
        store: PathBuf,
    },

    /// Validate an exported JSONL file
    Verify {
        /// Export file to check
        file: PathBuf,
    },
}

#[derive(Args)]
struct ExportArgs {
    /// YAML config file; flags override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Path to the collection file
    #[arg(short, long)]
    store: Option<PathBuf>,

    /// Output JSONL file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Earliest review: YYYY-MM-DD, RFC 3339, or epoch milliseconds
    #[arg(long)]
    from: Option<String>,

    /// Latest review, inclusive; a bare date covers the whole day
    #[arg(long)]
    to: Option<String>,

    /// Only the last N days
    #[arg(long, conflicts_with = "from")]
    days: Option<u32>,

    /// Deck name, including subdecks (repeatable)
    #[arg(long = "deck")]
    decks: Vec<String>,

    /// Card type (template) name (repeatable)
    #[arg(long = "card-type")]
    card_types: Vec<String>,

    /// Note tag (repeatable)
    #[arg(long = "tag")]
    tags: Vec<String>,

    /// Minimum resulting interval in days
    #[arg(long)]
    min_interval: Option<i64>,

    /// 0-based note field index to export (repeatable)
    #[arg(long = "field")]
    fields: Vec<usize>,

    /// Add card, note, and deck ids to each line
    #[arg(long)]
    include_ids: bool,

    /// Add an ISO 8601 timestamp to each line
    #[arg(long)]
    iso_time: bool,

    /// Export field text with its HTML markup
    #[arg(long)]
    keep_markup: bool,

    /// Short keys and a field list instead of the full line layout
    #[arg(long)]
    compact: bool,

    /// Stop after this many seconds, keeping what was written
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Print the summary as JSON
    #[arg(long)]
    json: bool,
}

impl ExportArgs {
    fn overrides(&self) -> ExportConfig {
        ExportConfig {
            store_path: self.store.clone(),
            output_path: self.output.clone(),
            from_date: self.from.clone(),
            to_date: self.to.clone(),
            days: self.days,
            decks: self.decks.clone(),
            card_types: self.card_types.clone(),
            tags: self.tags.clone(),
            min_interval: self.min_interval,
            fields: (!self.fields.is_empty()).then(|| self.fields.clone()),
            include_ids: self.include_ids,
            include_iso_time: self.iso_time,
            keep_markup: self.keep_markup,
            compact: self.compact,
            timeout_secs: self.timeout_secs,
        }
    }
}

fn main() {
    // Usage errors exit with clap's code 2, the configuration error code
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        _ => Level::DEBUG,
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level)
        .init();

    let code = match run(cli.command) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {:#}", "Error:".red().bold(), e);
            e.downcast_ref::<ExportError>()
                .map(ExportError::exit_code)
                .unwrap_or(exit_code::EXPORT_FAILED)
        }
    };
    process::exit(code);
}

fn run(command: Commands) -> Result<i32> {
    match command {
        Commands::Export(args) => export(args),
        Commands::Check { store } => check(store),
        Commands::Verify { file } => Ok(verify(file)),
    }
}

fn export(args: ExportArgs) -> Result<i32> {
    let base = match &args.config {
        Some(path) => ExportConfig::load(path)?,
        None => ExportConfig::default(),
    };
    let plan = base.merge(args.overrides()).resolve(Utc::now())?;

    let result = Exporter::from_plan(plan).run()?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_summary(&result);
    }
    Ok(exit_code::SUCCESS)
}

fn print_summary(result: &ExportResult) {
    let status = if result.cancelled {
        "Export cancelled".yellow().bold()
    } else {
        "Export complete".green().bold()
    };
    println!("{}: {}", status, result.output_path.display());
    println!("  scanned:  {}", result.scanned);
    println!("  emitted:  {}", result.emitted);
    println!("  filtered: {}", result.filtered);
    println!("  skipped:  {}", result.skipped);

    let counts = &result.skip_counts;
    for (label, count) in [
        ("dangling card", counts.dangling_card),
        ("dangling note", counts.dangling_note),
        ("dangling deck", counts.dangling_deck),
        ("unencodable", counts.unencodable),
    ] {
        if count > 0 {
            println!("    {}: {}", label, count.to_string().yellow());
        }
    }

    if let (Some(first), Some(last)) = (result.first_timestamp_ms, result.last_timestamp_ms) {
        println!("  range:    {} .. {}", format_ms(first), format_ms(last));
    }
}

fn format_ms(timestamp_ms: i64) -> String {
    DateTime::from_timestamp_millis(timestamp_ms)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| timestamp_ms.to_string())
}

fn check(path: PathBuf) -> Result<i32> {
    let store = Store::open(&path)?;
    let stats = store.stats()?;
    let size = std::fs::metadata(&path).map(|m| m.len()).unwrap_or(0);

    println!("{}: {}", "Collection readable".green().bold(), path.display());
    println!("  schema:  {:?}", stats.schema);
    println!("  size:    {} bytes", size);
    println!("  reviews: {}", stats.review_entries);
    println!("  cards:   {}", stats.cards);
    println!("  notes:   {}", stats.notes);
    println!("  decks:   {}", stats.decks);
    Ok(exit_code::SUCCESS)
}

fn verify(path: PathBuf) -> i32 {
    let report = match verify_export(&path) {
        Ok(report) => report,
        Err(e) => {
            eprintln!("{} {:#}", "Error:".red().bold(), e);
            return exit_code::VERIFY_FAILED;
        }
    };

    print_report(&path, &report);
    if report.is_clean() {
        exit_code::SUCCESS
    } else {
        exit_code::VERIFY_FAILED
    }
}

fn print_report(path: &std::path::Path, report: &VerifyReport) {
    let status = if report.is_clean() {
        "Export valid".green().bold()
    } else {
        "Export invalid".red().bold()
    };
    println!("{}: {}", status, path.display());
    println!("  lines:        {}", report.lines);
    println!("  valid:        {}", report.valid);
    println!("  malformed:    {}", report.malformed);
    println!("  out of order: {}", report.out_of_order);
    if report.missing_final_newline {
        println!("  {}", "missing final newline".yellow());
    }
}
