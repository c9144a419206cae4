// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Terminal client for the Atrium sync engine.
//!
//! `atrium watch` subscribes to a workspace's task list, re-renders it as
//! changes arrive, and applies typed edits optimistically. `atrium prefs`
//! shows (and optionally saves) the effective sync preferences.

use anyhow::{Context, Result};
use atrium_app_core::config::ConfigService;
use atrium_app_core::config_port::ConfigPort;
use atrium_app_core::prefs::SyncPrefs;
use atrium_app_core::render_port::Region;
use atrium_client::{HttpPersistence, UnixRealtimeTransport};
use atrium_config_fs::FsConfigStore;
use atrium_store::Entity;
use atrium_sync::{RealtimeChannel, RenderScheduler, Session, SyncEngine};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod model;
mod repl;
mod view;

use model::Task;

#[derive(Parser, Debug)]
#[command(author, version, about = "Atrium terminal client")]
struct Args {
    /// Config directory (defaults to the platform config dir)
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,
    /// Persistence API base URL (e.g. http://localhost:4000/api)
    #[arg(long, global = true)]
    api_url: Option<String>,
    /// Unix socket of the realtime host
    #[arg(long, global = true)]
    socket: Option<String>,
    /// Per-transaction network timeout in milliseconds
    #[arg(long, global = true)]
    timeout_ms: Option<u64>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Live task list for a workspace, with optimistic edits from stdin
    Watch {
        /// Workspace to open
        #[arg(long)]
        workspace: String,
    },
    /// Print effective preferences as JSON
    Prefs {
        /// Persist the effective preferences (flags included)
        #[arg(long)]
        save: bool,
    },
}

impl Args {
    /// Loaded prefs with command-line overrides applied.
    fn effective_prefs(&self, loaded: Option<SyncPrefs>) -> SyncPrefs {
        let mut prefs = loaded.unwrap_or_default();
        if let Some(url) = &self.api_url {
            prefs.api_base_url = Some(url.clone());
        }
        if let Some(socket) = &self.socket {
            prefs.realtime_socket = Some(socket.clone());
        }
        if let Some(ms) = self.timeout_ms {
            prefs.transaction_timeout_ms = ms;
        }
        prefs
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let store = match &args.config_dir {
        Some(dir) => FsConfigStore::at(dir),
        None => FsConfigStore::new(),
    }
    .context("opening config directory")?;
    let config = ConfigService::new(store);
    let prefs = args.effective_prefs(config.load_prefs());

    match &args.command {
        Command::Prefs { save } => {
            println!("{}", serde_json::to_string_pretty(&prefs)?);
            if *save {
                config.save_prefs(&prefs);
                info!(dir = %config.store().base().display(), "prefs saved");
            }
            Ok(())
        }
        Command::Watch { workspace } => watch_workspace(workspace, prefs).await,
    }
}

async fn watch_workspace(workspace: &str, prefs: SyncPrefs) -> Result<()> {
    let api_url = prefs
        .api_base_url
        .clone()
        .context("no API base URL; pass --api-url or save one with `atrium prefs --save`")?;
    let socket = prefs
        .realtime_socket
        .clone()
        .context("no realtime socket; pass --socket or save one with `atrium prefs --save`")?;

    let session = Session::new(workspace.into(), prefs);
    session.register::<Task>([Region::Page]);
    let engine = SyncEngine::new(session.clone(), HttpPersistence::new(&api_url)?);
    let scheduler = RenderScheduler::new(session.clone(), view::project, view::TerminalRenderPort);
    let channel = RealtimeChannel::new(&session, Task::KIND, UnixRealtimeTransport::new(&socket));

    let (stop, shutdown) = watch::channel(false);
    info!(workspace, %api_url, %socket, "watching");
    session.mark_dirty([Region::Page]);

    let (stats, (), repl) = tokio::join!(
        channel.run(shutdown.clone()),
        scheduler.run(shutdown),
        repl::run(&engine, stop),
    );
    info!(
        applied = stats.applied,
        dropped = stats.dropped,
        resubscribes = stats.resubscribes,
        renders = scheduler.passes(),
        "stopped"
    );
    repl
}
