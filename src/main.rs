//! # manualbase CLI (`mbase`)
//!
//! Register equipment, ingest extracted manual segments into the
//! equipment's own collection, and query it.
//!
//! ## Usage
//!
//! ```bash
//! mbase --config ./config/mbase.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `mbase init` | Create the storage directory, database, and registry file |
//! | `mbase equipment register <id> <name>` | Register an equipment and create its collection |
//! | `mbase equipment list` | List registered equipment |
//! | `mbase equipment show <id>` | Show one equipment with its stored chunk count |
//! | `mbase equipment delete <id>` | Delete an equipment and its collection |
//! | `mbase ingest <id> <path>` | Chunk, embed, and store segment files |
//! | `mbase query <id> "<question>"` | Nearest chunks of one equipment |
//! | `mbase stats [<id>]` | Storage statistics |
//! | `mbase reset --yes` | Delete every equipment |
//! | `mbase completions <shell>` | Print shell completions |

use clap::{CommandFactory, Parser, Subcommand};
use std::path::{Path, PathBuf};

use manualbase::config::{self, Config};
use manualbase::query::QueryOutput;
use manualbase::{equipment, ingest, logging, query, stats, store};
use manualbase_core::models::ChunkKind;

const DEFAULT_CONFIG: &str = "./config/mbase.toml";

/// manualbase: an equipment-isolated chunk store for technical manuals.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. Without it, `./config/mbase.toml` is used when present and built-in
/// defaults otherwise. See `config/mbase.example.toml`.
#[derive(Parser)]
#[command(
    name = "mbase",
    about = "manualbase: an equipment-isolated chunk store for technical manuals",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize storage.
    ///
    /// Creates the storage directory, the SQLite schema, and an empty
    /// registry file. Idempotent.
    Init,

    /// Manage registered equipment.
    Equipment {
        #[command(subcommand)]
        action: EquipmentAction,
    },

    /// Ingest JSON segment files for an equipment.
    ///
    /// `path` is a segment file or a directory of `*.json` segment files.
    Ingest {
        /// Equipment id.
        equipment: String,

        /// Segment file or directory.
        path: PathBuf,

        /// Source file name recorded on every chunk (single file only).
        #[arg(long)]
        source_file: Option<String>,

        /// Chunk and report without embedding or writing anything.
        #[arg(long)]
        dry_run: bool,
    },

    /// Retrieve the chunks of one equipment nearest to a question.
    Query {
        /// Equipment id.
        equipment: String,

        /// The question.
        question: String,

        /// Number of chunks to return (default: `retrieval.default_k`).
        #[arg(long, short)]
        k: Option<usize>,

        /// Only return chunks of these kinds (text, table, image_ocr, diagram_ocr).
        #[arg(long = "kind", value_parser = parse_kind, value_delimiter = ',')]
        kinds: Vec<ChunkKind>,

        /// Print the excerpt block handed to answer generation.
        #[arg(long, conflicts_with = "json")]
        context: bool,

        /// Print hits as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show storage statistics for all equipment or one of them.
    Stats {
        /// Equipment id.
        equipment: Option<String>,

        /// Print as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Delete every registered equipment and its collection.
    Reset {
        /// Confirm the deletion.
        #[arg(long)]
        yes: bool,
    },

    /// Print shell completions to stdout.
    Completions {
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand)]
enum EquipmentAction {
    /// Register a new equipment.
    Register {
        /// Stable equipment id (e.g. `main_engine_01`).
        id: String,
        /// Display name.
        name: String,
        #[arg(long, default_value = "")]
        description: String,
    },
    /// List registered equipment.
    List {
        #[arg(long)]
        json: bool,
    },
    /// Show one equipment.
    Show {
        id: String,
        #[arg(long)]
        json: bool,
    },
    /// Delete an equipment and its collection.
    Delete { id: String },
}

fn parse_kind(s: &str) -> Result<ChunkKind, String> {
    s.trim().parse()
}

fn resolve_config(path: Option<&Path>) -> anyhow::Result<Config> {
    match path {
        Some(path) => config::load_config(path),
        None if Path::new(DEFAULT_CONFIG).exists() => {
            config::load_config(Path::new(DEFAULT_CONFIG))
        }
        None => Ok(Config::default()),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Commands that don't require config
    if let Commands::Completions { shell } = cli.command {
        clap_complete::generate(shell, &mut Cli::command(), "mbase", &mut std::io::stdout());
        return Ok(());
    }

    let cfg = resolve_config(cli.config.as_deref())?;
    logging::init_with_config(&cfg.logging);

    match cli.command {
        Commands::Init => {
            store::init_storage(&cfg).await?;
            println!("Storage initialized at {}.", cfg.storage.dir.display());
        }
        Commands::Equipment { action } => match action {
            EquipmentAction::Register {
                id,
                name,
                description,
            } => equipment::run_register(&cfg, &id, &name, &description).await?,
            EquipmentAction::List { json } => equipment::run_list(&cfg, json).await?,
            EquipmentAction::Show { id, json } => equipment::run_show(&cfg, &id, json).await?,
            EquipmentAction::Delete { id } => equipment::run_delete(&cfg, &id).await?,
        },
        Commands::Ingest {
            equipment,
            path,
            source_file,
            dry_run,
        } => {
            ingest::run_ingest(&cfg, &equipment, &path, source_file.as_deref(), dry_run).await?;
        }
        Commands::Query {
            equipment,
            question,
            k,
            kinds,
            context,
            json,
        } => {
            let output = if json {
                QueryOutput::Json
            } else if context {
                QueryOutput::Context
            } else {
                QueryOutput::Listing
            };
            query::run_query(&cfg, &equipment, &question, k, &kinds, output).await?;
        }
        Commands::Stats { equipment, json } => {
            stats::run_stats(&cfg, equipment.as_deref(), json).await?;
        }
        Commands::Reset { yes } => {
            equipment::run_reset(&cfg, yes).await?;
        }
        Commands::Completions { .. } => {
            // Handled above (before config loading)
            unreachable!()
        }
    }

    Ok(())
}
