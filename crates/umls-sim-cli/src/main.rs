//! UMLS-Sim - semantic similarity over the UMLS from the command line
//!
//! The `umls-sim` command drives the UMLS::Similarity toolkit scripts and
//! prints typed result tables.
//!
//! ## Commands
//!
//! - `similarity`: Score concept pairs under one or more measures
//! - `shortest-path`: Shortest is-a path between each pair
//! - `lcs`: Least common subsumer of each pair
//! - `batch`: Run a JSON list of tasks concurrently
//! - `measures`: List the supported measures
//! - `check`: Show toolkit and connection settings

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use tracing::{info, warn, Level};

use umls_sim_core::{
    split_pair_line, AmbiguityPolicy, BatchResult, ConnectionConfig, Measure, ResultTable,
    SimilarityOptions, TaskSpec, ToolkitConfig, UmlsSimilarity,
};
use umls_toolkit::{is_toolkit_available, Script};

#[derive(Parser)]
#[command(name = "umls-sim")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Semantic similarity and relatedness over the UMLS", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Result output format
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Table)]
    format: OutputFormat,

    /// What to do when a term maps to several concepts
    #[arg(long, global = true, value_enum, default_value_t = OnAmbiguity::PickFirst)]
    on_ambiguity: OnAmbiguity,

    #[command(flatten)]
    connection: ConnectionArgs,

    #[command(flatten)]
    toolkit: ToolkitArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct ConnectionArgs {
    /// Database user
    #[arg(long, global = true, env = "UMLS_USERNAME")]
    username: Option<String>,

    /// Database password
    #[arg(long, global = true, env = "UMLS_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Database host
    #[arg(long, global = true, env = "UMLS_HOSTNAME")]
    hostname: Option<String>,

    /// MySQL socket path
    #[arg(long, global = true, env = "UMLS_SOCKET")]
    socket: Option<String>,

    /// UMLS database name
    #[arg(long, global = true, env = "UMLS_DATABASE")]
    database: Option<String>,
}

#[derive(Args)]
struct ToolkitArgs {
    /// Perl interpreter (scripts are executed directly when omitted)
    #[arg(long, global = true, env = "UMLS_PERL_BIN")]
    perl_bin: Option<PathBuf>,

    /// Directory containing the toolkit scripts
    #[arg(long, global = true, env = "UMLS_SCRIPT_DIR", default_value = ".")]
    script_dir: PathBuf,

    /// Kill a toolkit call after this many seconds (0 = never)
    #[arg(long, global = true, env = "UMLS_TIMEOUT_SECS", default_value = "0")]
    timeout_secs: u64,

    /// Decimal places for similarity scores
    #[arg(long, global = true, env = "UMLS_PRECISION", default_value = "4")]
    precision: u32,

    /// Do not pass --forcerun to the toolkit
    #[arg(long, global = true)]
    no_forcerun: bool,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Table,
    Tsv,
    Json,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OnAmbiguity {
    PickFirst,
    Error,
}

impl From<OnAmbiguity> for AmbiguityPolicy {
    fn from(value: OnAmbiguity) -> Self {
        match value {
            OnAmbiguity::PickFirst => AmbiguityPolicy::PickFirst,
            OnAmbiguity::Error => AmbiguityPolicy::Error,
        }
    }
}

#[derive(Args)]
struct PairArgs {
    /// Concept pair as `A,B` or `A<>B` (CUI or term, repeatable)
    #[arg(short, long = "pair", value_name = "A,B")]
    pairs: Vec<String>,

    /// File with one `A<>B` pair per line
    #[arg(short, long)]
    infile: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Score concept pairs under one or more measures
    Similarity {
        #[command(flatten)]
        pairs: PairArgs,

        /// Measure name (repeatable or comma-separated; default: lch)
        #[arg(short, long = "measure", value_delimiter = ',')]
        measures: Vec<String>,
    },

    /// Find the shortest is-a path between each pair
    ShortestPath {
        #[command(flatten)]
        pairs: PairArgs,
    },

    /// Find the least common subsumer of each pair
    Lcs {
        #[command(flatten)]
        pairs: PairArgs,
    },

    /// Run a JSON list of tasks concurrently
    Batch {
        /// JSON file: [{"function": "...", "arguments": [...]}, ...]
        #[arg(long)]
        tasks: PathBuf,

        /// Print one merged table instead of one per task
        #[arg(long)]
        merge: bool,
    },

    /// List the supported similarity measures
    Measures,

    /// Show toolkit availability and connection settings
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    umls_sim_core::init_tracing(cli.json, level);

    match &cli.command {
        Commands::Measures => return cmd_measures(cli.format),
        Commands::Check => return cmd_check(&cli),
        _ => {}
    }

    let service = build_service(&cli)?;
    match cli.command {
        Commands::Similarity { pairs, measures } => {
            cmd_similarity(&service, &pairs, &measures, cli.format).await
        }
        Commands::ShortestPath { pairs } => cmd_shortest_path(&service, &pairs, cli.format).await,
        Commands::Lcs { pairs } => cmd_lcs(&service, &pairs, cli.format).await,
        Commands::Batch { tasks, merge } => cmd_batch(&service, &tasks, merge, cli.format).await,
        Commands::Measures | Commands::Check => Ok(()),
    }
}

fn connection_config(args: &ConnectionArgs) -> ConnectionConfig {
    let field = |v: &Option<String>| v.clone().unwrap_or_default();
    ConnectionConfig::new(
        field(&args.username),
        field(&args.password),
        field(&args.hostname),
        field(&args.socket),
        field(&args.database),
    )
}

fn toolkit_config(args: &ToolkitArgs) -> ToolkitConfig {
    ToolkitConfig {
        perl_bin: args.perl_bin.clone(),
        script_dir: args.script_dir.clone(),
        timeout_secs: args.timeout_secs,
        forcerun: !args.no_forcerun,
        precision: args.precision,
    }
}

fn build_service(cli: &Cli) -> Result<UmlsSimilarity> {
    let service = UmlsSimilarity::new(
        connection_config(&cli.connection),
        toolkit_config(&cli.toolkit),
    )
    .context("Incomplete connection settings (pass --username/--password/--hostname/--socket/--database or set UMLS_*)")?;
    Ok(service.with_options(SimilarityOptions {
        ambiguity: cli.on_ambiguity.into(),
    }))
}

/// Collect pairs from `--pair` flags and the optional infile, in that order.
fn read_pairs(args: &PairArgs) -> Result<Vec<(String, String)>> {
    let mut pairs = Vec::new();
    for raw in &args.pairs {
        let pair = split_pair_line(raw)
            .ok_or_else(|| anyhow!("Pair `{}` must look like A,B or A<>B", raw))?;
        pairs.push(pair);
    }

    if let Some(path) = &args.infile {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        for (i, line) in contents.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let pair = split_pair_line(line).ok_or_else(|| {
                anyhow!("{}:{}: expected A<>B, got `{}`", path.display(), i + 1, line)
            })?;
            pairs.push(pair);
        }
    }

    if pairs.is_empty() {
        bail!("No pairs given (use --pair A,B or --infile FILE)");
    }
    Ok(pairs)
}

fn render(table: &ResultTable, format: OutputFormat) -> Result<String> {
    Ok(match format {
        OutputFormat::Table if table.is_empty() => "(no results)\n".to_string(),
        OutputFormat::Table => table.to_string(),
        OutputFormat::Tsv => table.to_tsv(),
        OutputFormat::Json => format!("{}\n", serde_json::to_string_pretty(table)?),
    })
}

fn print_table(table: &ResultTable, format: OutputFormat) -> Result<()> {
    for skipped in &table.skipped {
        warn!(
            index = skipped.index,
            "Skipped {}<>{}: {}", skipped.first, skipped.second, skipped.reason
        );
    }
    for warning in &table.warnings {
        warn!("{}", warning);
    }
    print!("{}", render(table, format)?);
    Ok(())
}

async fn cmd_similarity(
    service: &UmlsSimilarity,
    pairs: &PairArgs,
    measures: &[String],
    format: OutputFormat,
) -> Result<()> {
    let pairs = read_pairs(pairs)?;
    let measures = Measure::parse_list(measures)?;
    let table = service.similarity(&pairs, &measures).await?;
    print_table(&table, format)
}

async fn cmd_shortest_path(
    service: &UmlsSimilarity,
    pairs: &PairArgs,
    format: OutputFormat,
) -> Result<()> {
    let pairs = read_pairs(pairs)?;
    let table = service.find_shortest_path(&pairs).await?;
    print_table(&table, format)
}

async fn cmd_lcs(service: &UmlsSimilarity, pairs: &PairArgs, format: OutputFormat) -> Result<()> {
    let pairs = read_pairs(pairs)?;
    let table = service.find_least_common_subsumer(&pairs).await?;
    print_table(&table, format)
}

fn read_tasks(path: &Path) -> Result<Vec<TaskSpec>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("{} is not a JSON list of tasks", path.display()))
}

fn batch_json(batch: &BatchResult) -> Result<Value> {
    let mut slots = Vec::with_capacity(batch.len());
    for outcome in &batch.outcomes {
        slots.push(match &outcome.result {
            Ok(table) => json!({
                "index": outcome.index,
                "function": outcome.function,
                "table": serde_json::to_value(table)?,
            }),
            Err(err) => json!({
                "index": outcome.index,
                "function": outcome.function,
                "error": err.to_string(),
            }),
        });
    }
    Ok(Value::Array(slots))
}

async fn cmd_batch(
    service: &UmlsSimilarity,
    tasks: &Path,
    merge: bool,
    format: OutputFormat,
) -> Result<()> {
    let specs = read_tasks(tasks)?;
    info!("Running {} tasks", specs.len());
    let batch = service.run_concurrently(specs).await;

    if merge {
        print_table(&batch.merged(), format)?;
    } else if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&batch_json(&batch)?)?);
    } else {
        for outcome in &batch.outcomes {
            println!("== Task #{}: {} ==", outcome.index, outcome.function);
            match &outcome.result {
                Ok(table) => print_table(table, format)?,
                Err(err) => println!("error: {}", err),
            }
            println!();
        }
    }

    for outcome in batch.outcomes.iter().filter(|o| o.result.is_err()) {
        if let Err(err) = &outcome.result {
            if let Some(stderr) = err.stderr() {
                warn!(index = outcome.index, "toolkit stderr: {}", stderr);
            }
        }
    }

    if !batch.all_succeeded() {
        bail!("{} of {} tasks failed", batch.failed(), batch.len());
    }
    Ok(())
}

fn cmd_measures(format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&Measure::ALL)?),
        _ => {
            for measure in Measure::ALL {
                let marker = if measure == Measure::DEFAULT {
                    " (default)"
                } else {
                    ""
                };
                println!("{}{}", measure, marker);
            }
        }
    }
    Ok(())
}

fn cmd_check(cli: &Cli) -> Result<()> {
    let toolkit = toolkit_config(&cli.toolkit);

    println!("UMLS-Sim Toolkit Info");
    println!("=====================");
    println!();

    println!("Script dir: {}", toolkit.script_dir().display());
    for script in Script::ALL {
        let present = toolkit.script_path(script.file_name()).is_file();
        println!(
            "  {}: {}",
            script.file_name(),
            if present { "found" } else { "MISSING" }
        );
    }
    match &toolkit.perl_bin {
        Some(perl) => println!("Perl: {}", perl.display()),
        None => println!("Perl: (scripts run directly)"),
    }
    println!("Timeout: {}", match toolkit.timeout_secs {
        0 => "none".to_string(),
        secs => format!("{}s", secs),
    });

    println!();
    println!("Connection:");
    let connection = &cli.connection;
    let show = |name: &str, value: &Option<String>| match value {
        Some(v) if !v.trim().is_empty() => println!("  {}: {}", name, v),
        _ => println!("  {}: (not set)", name),
    };
    show("username", &connection.username);
    show("hostname", &connection.hostname);
    show("socket", &connection.socket);
    show("database", &connection.database);
    match &connection.password {
        Some(p) if !p.is_empty() => println!("  password: (set)"),
        _ => println!("  password: (not set)"),
    }

    if !is_toolkit_available(&toolkit) {
        bail!(
            "UMLS::Similarity scripts not found in {}",
            toolkit.script_dir().display()
        );
    }
    connection_config(connection)
        .validate()
        .context("Connection settings incomplete")?;
    Ok(())
}
