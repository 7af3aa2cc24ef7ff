use std::env;

use anyhow::{anyhow, Context, Result};
use tracing_subscriber::EnvFilter;

use bates_backend::{audit, config::AppConfig, db};

const USAGE: &str = "Usage: maintenance <migrate|verify-ranges>";

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let mut args = env::args().skip(1);
    match args.next().as_deref() {
        Some("migrate") => migrate()?,
        Some("verify-ranges") => verify_ranges()?,
        Some(cmd) => {
            eprintln!("Unknown command: {cmd}\n{USAGE}");
            std::process::exit(1);
        }
        None => {
            eprintln!("{USAGE}");
            std::process::exit(1);
        }
    }

    Ok(())
}

fn connect() -> Result<db::PgPool> {
    let config = AppConfig::from_env()?;
    tracing::info!(
        component = "maintenance",
        database_url = %config.redacted_database_url(),
        pool_size = config.database_max_pool_size,
        "loaded backend configuration"
    );
    db::init_pool_with_size(&config.database_url, config.database_max_pool_size)
}

fn migrate() -> Result<()> {
    let pool = connect()?;
    let mut conn = pool.get().context("failed to get database connection")?;
    db::run_migrations(&mut conn)?;
    println!("Migrations applied.");
    Ok(())
}

fn verify_ranges() -> Result<()> {
    let pool = connect()?;
    let mut conn = pool.get().context("failed to get database connection")?;

    let violations = audit::verify_all(&mut conn)?;
    if violations.is_empty() {
        println!("All Bates ranges are consistent.");
        return Ok(());
    }

    for violation in &violations {
        eprintln!("{violation:?}");
    }
    Err(anyhow!("found {} Bates range violations", violations.len()))
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}
