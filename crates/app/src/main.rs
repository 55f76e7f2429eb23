//! Command-line front end for the project store.
//!
//! Usage:
//!   webdaw list                 - List saved projects
//!   webdaw show <name>          - Print a project's metadata (`autosave` for the autosave slot)
//!   webdaw new <name>           - Create and save a demo project
//!   webdaw open <name>          - Load a project into the autosave slot
//!   webdaw save-as <name>       - Save the autosaved project under a new name
//!   webdaw delete <name>        - Delete a saved project
//!   webdaw config               - Print the effective configuration

mod config;
mod demo;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use config::Config;
use webdaw_core::{
    AutosaveOutcome, FileStore, PersistenceController, ProjectSlot, StockSynths, Store,
    SystemClock, TickSource,
};
use webdaw_project::read_summary;
use webdaw_store::Partition;

#[derive(Parser)]
#[command(name = "webdaw", about = "Inspect and manage saved webdaw projects")]
struct Cli {
    /// Store directory, overriding the config file
    #[arg(long, global = true)]
    store_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List saved projects
    List,
    /// Print a project's metadata
    Show {
        /// Project name, or `autosave`
        name: String,
    },
    /// Create a demo project and save it
    New { name: String },
    /// Load a saved project so the next session recovers it
    Open { name: String },
    /// Save the autosaved project under a new name
    SaveAs { name: String },
    /// Delete a saved project
    Delete { name: String },
    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let mut config = Config::load();
    if cli.store_dir.is_some() {
        config.store_dir = cli.store_dir;
    }

    if let Commands::Config = cli.command {
        print!("{}", config.to_toml()?);
        return Ok(());
    }

    let dir = config
        .resolve_store_dir()
        .context("no data directory available, pass --store-dir")?;
    let store = Arc::new(FileStore::open(&dir).await?);
    log::debug!("using store at {}", store.root().display());

    match cli.command {
        Commands::List => list(store.as_ref()).await,
        Commands::Show { name } => show(store.as_ref(), &name).await,
        Commands::New { name } => {
            let mut session = Session::boot(store, &config).await;
            session.controller.new_project(&name)?;
            session
                .controller
                .edit(session.ticks.now(), |project, ids| demo::populate(project, ids))?;
            session.controller.save_as(&name).await?;
            session.flush().await?;
            println!("created '{name}'");
            Ok(())
        }
        Commands::Open { name } => {
            let mut session = Session::boot(store, &config).await;
            session.controller.load(ProjectSlot::parse(&name)).await?;
            session.flush().await?;
            println!("opened '{}'", session.controller.current_metadata().name);
            Ok(())
        }
        Commands::SaveAs { name } => {
            let mut session = Session::boot(store, &config).await;
            session.controller.save_as(&name).await?;
            println!("saved '{name}'");
            Ok(())
        }
        Commands::Delete { name } => {
            let names = store.list(Partition::Projects).await?;
            if !names.contains(&name) {
                bail!("no project named '{name}'");
            }
            store.delete(Partition::Projects, &name).await?;
            println!("deleted '{name}'");
            Ok(())
        }
        Commands::Config => Ok(()),
    }
}

/// A booted controller plus the tick source driving its debounce.
struct Session {
    controller: PersistenceController,
    ticks: TickSource,
}

impl Session {
    async fn boot(store: Arc<FileStore>, config: &Config) -> Self {
        let mut controller = PersistenceController::new(
            store,
            Arc::new(StockSynths),
            Arc::new(SystemClock),
            config.persistence_options(),
        );
        controller.boot().await;
        for warning in controller.take_warnings() {
            eprintln!("warning: {warning}");
        }
        Self {
            controller,
            ticks: TickSource::new(),
        }
    }

    /// Write the autosave before exiting.
    async fn flush(&mut self) -> Result<()> {
        let outcome = self.controller.flush(self.ticks.now()).await;
        if let Some(AutosaveOutcome::Failed) = outcome {
            let reasons: Vec<String> = self
                .controller
                .take_warnings()
                .iter()
                .map(ToString::to_string)
                .collect();
            bail!("autosave failed: {}", reasons.join("; "));
        }
        Ok(())
    }
}

async fn list(store: &dyn Store) -> Result<()> {
    let names = store.list(Partition::Projects).await?;
    if names.is_empty() {
        println!("no saved projects");
    }
    for name in names {
        println!("{name}");
    }
    Ok(())
}

async fn show(store: &dyn Store, name: &str) -> Result<()> {
    let slot = ProjectSlot::parse(name);
    let (partition, key) = slot.location();
    let Some(bytes) = store.read(partition, key).await? else {
        bail!("nothing saved in {slot}");
    };

    let summary = read_summary(&bytes)?;
    println!("name:          {}", summary.metadata.name);
    println!("version:       {}", summary.version);
    println!("created:       {}", summary.metadata.created_at.to_rfc3339());
    println!("last modified: {}", summary.metadata.last_modified.to_rfc3339());
    println!("patterns:      {}", summary.pattern_count);
    println!("channels:      {}", summary.channel_count);
    println!("clips:         {}", summary.clip_count);
    Ok(())
}
