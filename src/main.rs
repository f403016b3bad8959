use anyhow::{bail, Result};
use std::env;
use std::path::PathBuf;

use epidemic_etl::{logging, EntityStore, ImportConfig, ImportRunner, SqliteStore, VERSION};

fn main() -> Result<()> {
    logging::init();

    let args: Vec<String> = env::args().skip(1).collect();
    let config_path = config_flag(&args)?;

    match args.first().map(String::as_str) {
        Some("import") => run_import(config_path)?,
        Some("counts") => run_counts(config_path)?,
        _ => print_usage(),
    }

    Ok(())
}

/// `--config <path>` anywhere after the subcommand
fn config_flag(args: &[String]) -> Result<Option<PathBuf>> {
    match args.iter().position(|a| a == "--config") {
        Some(i) => match args.get(i + 1) {
            Some(path) => Ok(Some(PathBuf::from(path))),
            None => bail!("--config needs a file path"),
        },
        None => Ok(None),
    }
}

fn run_import(config_path: Option<PathBuf>) -> Result<()> {
    println!("🦠 Epidemic ETL v{} - CSV → SQLite import", VERSION);
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let config = ImportConfig::load(config_path.as_deref())?;
    println!("📂 Data directory: {}", config.data_dir.display());
    println!("💾 Database:       {}", config.db_path.display());

    let mut store = SqliteStore::open(&config.db_path)?;
    let summary = ImportRunner::new(config, &mut store).run()?;

    println!("\n{}", summary);

    let failed = summary.failed_sources();
    if failed.is_empty() {
        println!("✅ All sources imported");
    } else {
        println!("⚠️  {} source(s) failed, see log for details", failed.len());
    }

    Ok(())
}

fn run_counts(config_path: Option<PathBuf>) -> Result<()> {
    let config = ImportConfig::load(config_path.as_deref())?;
    if !config.db_path.exists() {
        eprintln!("❌ Database not found: {}", config.db_path.display());
        eprintln!("   Run: epidemic-etl import");
        std::process::exit(1);
    }

    let mut store = SqliteStore::open(&config.db_path)?;
    let counts = store.counts()?;

    println!("🔍 {}", config.db_path.display());
    println!("   countries:     {}", counts.countries);
    println!("   regions:       {}", counts.regions);
    println!("   locations:     {}", counts.locations);
    println!("   diseases:      {}", counts.diseases);
    println!("   disease cases: {}", counts.disease_cases);

    Ok(())
}

fn print_usage() {
    println!("epidemic-etl {}", VERSION);
    println!();
    println!("USAGE:");
    println!("    epidemic-etl import [--config <file.json>]");
    println!("    epidemic-etl counts [--config <file.json>]");
    println!();
    println!("ENVIRONMENT:");
    println!("    EPI_ETL_DATA_DIR, EPI_ETL_DB_PATH, EPI_ETL_CASE_CHUNK_SIZE, EPI_ETL_RESET");
    println!("    RUST_LOG (e.g. RUST_LOG=epidemic_etl=debug)");
}
