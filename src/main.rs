//! # PLU Extract CLI (`plu`)
//!
//! ## Usage
//!
//! ```bash
//! plu --config ./config/plu.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `plu init` | Create the SQLite database and the `plu_reglement` table |
//! | `plu ask <document>` | Ingest a document and answer questions interactively |
//! | `plu extract <document> ...` | Extract height and footprint limits per zone and store them |
//! | `plu facts` | List stored fact records |
//!
//! ## Examples
//!
//! ```bash
//! # Initialize the database
//! plu init --config ./config/plu.toml
//!
//! # One question, no REPL
//! plu ask plu_0.pdf --query "Quelle est la hauteur maximum des constructions dans la zone U1 ?"
//!
//! # Extract zones U1 and U2 without writing to the database
//! plu extract plu_0.pdf --territoire T01 --codcom 33063 --annee 2024 \
//!     --section UA --zone U1 --zone U2 --dry-run
//! ```

use clap::{Parser, Subcommand};
use plu_extract::extract_cmd::ExtractArgs;
use plu_extract::repository::FactFilter;
use plu_extract::{ask_cmd, config, extract_cmd, facts_cmd, logging, migrate};
use std::path::PathBuf;

/// PLU Extract: retrieval-augmented extraction of zoning limits from
/// urbanism regulations.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file.
#[derive(Parser)]
#[command(
    name = "plu",
    about = "PLU Extract: extract zoning limits from urbanism regulations",
    version,
    long_about = "PLU Extract ingests a PLU document (PDF or text), answers questions about it \
    with retrieval-augmented generation, and stores maximum height and footprint per zone \
    in a SQLite table."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/plu.toml")]
    config: PathBuf,

    /// Debug logging for plu crates (overrides RUST_LOG).
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and the `plu_reglement` table.
    /// Running it multiple times is safe.
    Init,

    /// Ingest a document and ask questions about it.
    ///
    /// Reads questions from stdin until `exit` unless `--query` is given.
    Ask {
        /// PDF or text document.
        document: PathBuf,

        /// Answer this single question and exit.
        #[arg(long)]
        query: Option<String>,
    },

    /// Extract height and footprint limits for one or more zones.
    ///
    /// Asks the configured questions for every zone, then commits one record
    /// per zone in a single transaction.
    Extract {
        /// PDF or text document.
        document: PathBuf,

        /// Territory identifier (at most 10 characters).
        #[arg(long)]
        territoire: String,

        /// Commune code (at most 6 characters).
        #[arg(long)]
        codcom: String,

        /// Year of the regulation.
        #[arg(long)]
        annee: i32,

        /// Section identifier (at most 10 characters).
        #[arg(long)]
        section: String,

        /// Zone code (at most 2 characters). Repeat for several zones.
        #[arg(long = "zone", required = true)]
        zones: Vec<String>,

        /// Print the records without writing to the database.
        #[arg(long)]
        dry_run: bool,
    },

    /// List stored fact records.
    Facts {
        /// Only this commune.
        #[arg(long)]
        codcom: Option<String>,

        /// Only this year.
        #[arg(long)]
        annee: Option<i32>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Ask { document, query } => {
            ask_cmd::run_ask(&cfg, &document, query).await?;
        }
        Commands::Extract {
            document,
            territoire,
            codcom,
            annee,
            section,
            zones,
            dry_run,
        } => {
            let args = ExtractArgs {
                document,
                territoire,
                codcom,
                annee,
                section,
                zones,
                dry_run,
            };
            extract_cmd::run_extract(&cfg, &args).await?;
        }
        Commands::Facts { codcom, annee } => {
            facts_cmd::run_facts(&cfg, &FactFilter { codcom, annee }).await?;
        }
    }

    Ok(())
}
