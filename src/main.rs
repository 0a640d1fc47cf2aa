use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use spending_etl::config::EtlConfig;
use spending_etl::db;
use spending_etl::logging::init_logging;
use spending_etl::pipeline::{self, OutcomeStatus, Pipeline, RunSummary, StructureReport};
use spending_etl::Categorizer;
use std::path::PathBuf;
use tracing::{debug, info};

#[derive(Parser)]
#[command(name = "spending-etl")]
#[command(about = "Brazilian state expenditure CSVs → one categorized SQLite table")]
#[command(version)]
struct Cli {
    /// TOML config file (defaults to ./spending-etl.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory with the per-state CSV files
    #[arg(long, global = true)]
    csv_dir: Option<PathBuf>,

    /// SQLite database path
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    /// JSON file replacing the built-in category definitions
    #[arg(long, global = true)]
    categories: Option<PathBuf>,

    /// Log filter directive, e.g. "debug" or "spending_etl=trace"
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Print machine-readable JSON instead of the text report
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the database and destination table if missing
    Setup,
    /// Ingest every state (or one state and year)
    Import {
        #[arg(long)]
        state: Option<String>,
        #[arg(long)]
        year: Option<i32>,
    },
    /// Process one uploaded state/year file; exits non-zero on failure
    ProcessFile {
        #[arg(long, required_unless_present = "upload", requires = "year")]
        state: Option<String>,
        #[arg(long, requires = "state")]
        year: Option<i32>,
        /// Uploaded file name ("CE_2024.csv" or "CE_2024_original.csv")
        #[arg(long, conflicts_with_all = ["state", "year"])]
        upload: Option<String>,
    },
    /// Inspect every CSV's structure against the column mapping (read-only)
    Analyze,
    /// Row counts per state/year and category totals
    Summary,
    /// Show how organization names would be categorized
    Categorize {
        #[arg(required = true)]
        names: Vec<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_level.as_deref());

    let mut config = EtlConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(csv_dir) = &cli.csv_dir {
        config.csv_dir = csv_dir.clone();
    }
    if let Some(database) = &cli.database {
        config.database_path = database.clone();
    }
    config.validate().context("Invalid configuration")?;
    debug!(?config, "effective configuration");

    match &cli.command {
        Commands::Setup => run_setup(&config),
        Commands::Import { state, year } => run_import(&cli, config, state.as_deref(), *year),
        Commands::ProcessFile { state, year, upload } => {
            let (state, year) = match (upload, state, year) {
                (Some(upload), _, _) => {
                    let parsed = pipeline::parse_upload_name(upload)
                        .with_context(|| format!("'{}' is not STATE_YEAR.csv or STATE_YEAR_name.csv", upload))?;
                    (parsed.state, parsed.year)
                }
                (None, Some(state), Some(year)) => (state.clone(), *year),
                _ => bail!("give --upload, or --state and --year"),
            };
            run_process_file(&cli, config, &state, year)
        }
        Commands::Analyze => run_analyze(&config, cli.json),
        Commands::Summary => run_summary(&config, cli.json),
        Commands::Categorize { names } => run_categorize(&cli, names),
    }
}

fn load_categorizer(cli: &Cli) -> Result<Categorizer> {
    match &cli.categories {
        Some(path) => Categorizer::from_file(path)
            .with_context(|| format!("Failed to load categories from {}", path.display())),
        None => Ok(Categorizer::new()),
    }
}

fn open_pipeline(cli: &Cli, config: EtlConfig) -> Result<Pipeline> {
    let categorizer = load_categorizer(cli)?;
    info!(categories = categorizer.category_count(), "categorizer ready");
    let path = config.database_path.clone();
    Pipeline::open(config, categorizer).with_context(|| format!("Failed to open database {}", path.display()))
}

fn run_setup(config: &EtlConfig) -> Result<()> {
    println!("🔧 Setting up database...");
    let conn = db::open_database(&config.database_path, &config.table_name)
        .with_context(|| format!("Failed to open database {}", config.database_path.display()))?;
    let count = db::count_rows(&conn, &config.table_name)?;

    println!("✓ {} ready (WAL mode)", config.database_path.display());
    println!("✓ Table '{}' contains {} records", config.table_name, count);
    Ok(())
}

fn run_import(cli: &Cli, config: EtlConfig, state: Option<&str>, year: Option<i32>) -> Result<()> {
    let pipeline = open_pipeline(cli, config)?;

    let summary = match (state, year) {
        (None, None) => pipeline.run_all(),
        (Some(state), Some(year)) => {
            let outcome = pipeline
                .run_state_year(state, year)
                .with_context(|| format!("Failed to import {} {}", state, year))?;
            RunSummary {
                outcomes: vec![outcome],
            }
        }
        _ => bail!("--state and --year must be given together"),
    };

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_run_summary(&summary);
    }
    Ok(())
}

fn run_process_file(cli: &Cli, config: EtlConfig, state: &str, year: i32) -> Result<()> {
    let pipeline = open_pipeline(cli, config)?;
    let success = pipeline.process_new_file(state, year);

    if cli.json {
        println!("{}", serde_json::json!({ "state": state, "year": year, "success": success }));
    } else if success {
        println!("✅ {} {} processed", state, year);
    } else {
        println!("❌ {} {} failed (see log)", state, year);
    }

    if !success {
        std::process::exit(1);
    }
    Ok(())
}

fn run_analyze(config: &EtlConfig, json: bool) -> Result<()> {
    let reports = pipeline::analyze(config);

    if json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
        return Ok(());
    }

    println!("🔍 Analyzing CSV structure in {}", config.csv_dir.display());
    println!("{}", "━".repeat(60));
    for report in &reports {
        print_structure_report(report);
    }
    Ok(())
}

fn run_summary(config: &EtlConfig, json: bool) -> Result<()> {
    let conn = db::open_database(&config.database_path, &config.table_name)
        .with_context(|| format!("Failed to open database {}", config.database_path.display()))?;
    let table = &config.table_name;

    let total = db::count_rows(&conn, table)?;
    let per_state_year = db::state_year_counts(&conn, table)?;
    let categories = db::category_totals(&conn, table)?;

    if json {
        let report = serde_json::json!({
            "total": total,
            "by_state_year": per_state_year,
            "by_category": categories,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("📊 {} records in '{}'", total, table);
    println!("\nBy state/year:");
    for row in &per_state_year {
        println!("  {} {}  {:>8} records  R$ {:>18.2}", row.state, row.year, row.records, row.total_value);
    }
    println!("\nBy category:");
    for row in &categories {
        println!("  {:<40} {:>8} records  R$ {:>18.2}", row.category, row.records, row.total_value);
    }
    Ok(())
}

fn run_categorize(cli: &Cli, names: &[String]) -> Result<()> {
    let categorizer = load_categorizer(cli)?;

    for name in names {
        let category = categorizer.categorize(Some(name));
        if cli.json {
            let scores: Vec<_> = categorizer.scores(name).into_iter().take(3).collect();
            println!(
                "{}",
                serde_json::json!({ "organization": name, "category": category, "top_scores": scores })
            );
        } else {
            println!("{} → {}", name, category);
            for score in categorizer.scores(name).iter().take(3).filter(|s| s.score > 0) {
                println!("    {:<40} score {:>5}  hits {}", score.category, score.score, score.hits);
            }
        }
    }
    Ok(())
}

fn print_run_summary(summary: &RunSummary) {
    for outcome in &summary.outcomes {
        let year = outcome.year.map(|y| y.to_string()).unwrap_or_else(|| "-".to_string());
        match outcome.status {
            OutcomeStatus::Processed => println!(
                "✅ {} {}: {} inserted (committed {}, paid {}, dropped {}) [{}]",
                outcome.state,
                year,
                outcome.inserted,
                outcome.stats.committed_used,
                outcome.stats.paid_used,
                outcome.stats.dropped,
                outcome.processor.name()
            ),
            OutcomeStatus::NotFound => println!("❌ {}: no source file", outcome.state),
            OutcomeStatus::Skipped => println!(
                "⏭️  {} {}: skipped ({})",
                outcome.state,
                year,
                outcome.error.as_deref().unwrap_or("")
            ),
            OutcomeStatus::Failed => println!(
                "❌ {} {}: {}",
                outcome.state,
                year,
                outcome.error.as_deref().unwrap_or("failed")
            ),
        }
    }

    println!("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("🎉 SUMMARY");
    println!("   States processed: {}", summary.states_processed());
    println!("   Records inserted: {}", summary.total_inserted());
    println!("   Files failed:     {}", summary.count(OutcomeStatus::Failed));
}

fn print_structure_report(report: &StructureReport) {
    let Some(path) = &report.path else {
        println!("❌ {}: {}", report.state, report.error.as_deref().unwrap_or("no file"));
        return;
    };

    println!("\n📁 {}: {}", report.state, path.display());
    if let Some(error) = &report.error {
        println!("  ❌ {}", error);
        return;
    }

    println!("  📋 Columns: {:?}", report.headers);
    println!(
        "  📊 Rows: {} ({})",
        report.rows,
        report.strategy.as_deref().unwrap_or("?")
    );
    for column in &report.configured {
        let mark = if column.present { "✅" } else { "❌" };
        println!("    - {}: '{}' {}", column.slot, column.name, mark);
    }
    if let Some(suggestions) = &report.suggestions {
        println!("  🔍 Detection suggestions:");
        println!("    - organization: {:?}", suggestions.organization);
        println!("    - committed_value: {:?}", suggestions.committed_value);
        println!("    - paid_value: {:?}", suggestions.paid_value);
    }
}
