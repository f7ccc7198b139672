mod display;

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use mflix_insights::config::DEFAULT_DATABASE;
use mflix_insights::{ConnectionProvider, DashboardData, MongoSettings, StoreConfig};

#[derive(Parser)]
#[command(name = "mflix", about = "Movie analytics dashboard over the sample_mflix dataset")]
struct Cli {
    /// TOML configuration file
    #[arg(long, conflicts_with_all = ["uri", "data"])]
    config: Option<PathBuf>,

    /// MongoDB connection string
    #[arg(long, env = "MFLIX_URI", conflicts_with = "data")]
    uri: Option<String>,

    /// Database name (with --uri)
    #[arg(long, env = "MFLIX_DATABASE", default_value = DEFAULT_DATABASE)]
    database: String,

    /// Directory of exported collections (movies.json, comments.json, users.json)
    #[arg(long, env = "MFLIX_DATA_DIR")]
    data: Option<PathBuf>,

    /// Which part of the dashboard to print
    #[arg(long, value_enum, default_value_t = Section::All)]
    section: Section,

    /// Output raw JSON (no tables)
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Section {
    Counts,
    Genres,
    Ratings,
    TopRated,
    MostCommented,
    All,
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("mflix_insights=info,mflix=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = match store_config(&cli) {
        Ok(c) => c,
        Err(e) => {
            error!(error = %e, "invalid store configuration");
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    let provider = ConnectionProvider::new(config);
    let store = match provider.get_connection() {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, "could not open store");
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    match DashboardData::collect(&*store) {
        Ok(data) => {
            info!(section = ?cli.section, json = cli.json, "rendering dashboard");
            display::print_dashboard(&data, cli.section, cli.json);
        }
        Err(e) => {
            error!(error = %e, "render cycle failed");
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}

fn store_config(cli: &Cli) -> Result<StoreConfig, String> {
    if let Some(path) = &cli.config {
        // load() validates
        return StoreConfig::load(path).map_err(|e| format!("{}: {e}", path.display()));
    }
    let config = if let Some(uri) = &cli.uri {
        StoreConfig::Mongo(MongoSettings::new(uri.as_str(), cli.database.as_str()))
    } else if let Some(data) = &cli.data {
        StoreConfig::Directory { path: data.clone() }
    } else {
        return Err("specify --config <FILE>, --uri <URI> or --data <DIR>".into());
    };
    config.validate().map_err(|e| e.to_string())?;
    Ok(config)
}
