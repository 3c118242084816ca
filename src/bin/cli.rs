//! TileStore CLI
//!
//! Command-line interface for managing a TileStore namespace.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tilestore::session::codec::{coords_from_bytes, split_field};
use tilestore::session::Field;
use tilestore::{Config, Mode, StorageManager};
use tracing_subscriber::{fmt, EnvFilter};

/// TileStore CLI
#[derive(Parser, Debug)]
#[command(name = "tilestore-cli")]
#[command(about = "Manage workspaces, groups, arrays and metadata")]
#[command(version)]
struct Args {
    /// Config file (`<parameter> <value>` per line)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Home directory, overrides the config file
    #[arg(long)]
    home: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List the objects directly inside a path
    Ls {
        /// Parent object
        path: String,
    },

    /// List live workspaces from the master catalog
    LsWorkspaces,

    /// Create a workspace
    CreateWorkspace {
        /// Workspace path
        path: String,
    },

    /// Create a group inside a workspace or group
    CreateGroup {
        /// Group path
        path: String,
    },

    /// Remove an object's contents, keeping the object
    Clear {
        /// Object path
        path: String,
    },

    /// Remove an object and everything below it
    Delete {
        /// Object path
        path: String,
    },

    /// Rename an object
    Move {
        /// Current path
        old_path: String,

        /// New path
        new_path: String,

        /// Replace an existing object at the new path
        #[arg(short, long)]
        force: bool,
    },

    /// Print the schema of an array or metadata object
    Schema {
        /// Object path
        path: String,
    },

    /// Print every cell of an array or metadata object
    Dump {
        /// Object path
        path: String,

        /// Buffer size per field, in bytes
        #[arg(short, long, default_value = "65536")]
        buffer_size: usize,
    },
}

fn main() -> ExitCode {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tilestore=debug"));

    fmt().with_env_filter(filter).with_target(true).init();

    let args = Args::parse();

    let mut config = Config::load_or_default(args.config.as_deref());
    if let Some(home) = args.home {
        config.home_dir = home;
    }

    let manager = match StorageManager::init(config) {
        Ok(manager) => manager,
        Err(e) => {
            tracing::error!("Failed to open storage manager: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match run(&manager, args.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(manager: &StorageManager, command: Commands) -> tilestore::Result<()> {
    match command {
        Commands::Ls { path } => {
            for (name, kind) in manager.ls(&path)? {
                println!("{:<10} {}", kind, name);
            }
        }
        Commands::LsWorkspaces => {
            for workspace in manager.ls_workspaces()? {
                println!("{}", workspace.display());
            }
        }
        Commands::CreateWorkspace { path } => {
            let dir = manager.create_workspace(&path)?;
            println!("Created workspace {}", dir.display());
        }
        Commands::CreateGroup { path } => {
            let dir = manager.create_group(&path)?;
            println!("Created group {}", dir.display());
        }
        Commands::Clear { path } => {
            manager.clear(&path)?;
            println!("Cleared {}", path);
        }
        Commands::Delete { path } => {
            manager.delete(&path)?;
            println!("Deleted {}", path);
        }
        Commands::Move {
            old_path,
            new_path,
            force,
        } => {
            manager.move_object(&old_path, &new_path, force)?;
            println!("Moved {} -> {}", old_path, new_path);
        }
        Commands::Schema { path } => {
            println!("{:#?}", manager.load_schema(&path)?);
        }
        Commands::Dump { path, buffer_size } => dump(manager, &path, buffer_size)?,
    }
    Ok(())
}

fn dump(manager: &StorageManager, path: &str, buffer_size: usize) -> tilestore::Result<()> {
    let mut session = manager.open(path, Mode::Read, None, &[])?;
    let schema = session.schema().clone();
    let fields = session.fields().to_vec();
    let is_array = !schema.dimensions.is_empty();

    println!("{}", session.field_names().join("\t"));

    let capacities = vec![buffer_size; fields.len()];
    for batch in session.buffered(&capacities)? {
        let batch = batch?;
        let columns = fields
            .iter()
            .zip(&batch)
            .map(|(&field, buffer)| split_field(&schema, field, buffer))
            .collect::<tilestore::Result<Vec<_>>>()?;

        let rows = columns.first().map(Vec::len).unwrap_or(0);
        for row in 0..rows {
            let line = columns
                .iter()
                .zip(&fields)
                .map(|(column, field)| {
                    let raw = &column[row];
                    match field {
                        Field::Key if is_array => {
                            format!("{:?}", coords_from_bytes(raw))
                        }
                        _ => String::from_utf8_lossy(raw).into_owned(),
                    }
                })
                .collect::<Vec<_>>()
                .join("\t");
            println!("{}", line);
        }
    }

    session.finalize()
}
