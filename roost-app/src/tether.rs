//! Wires the actor set together: store, runner, TUI, and the feeders that
//! bridge terminal input and runner progress into the TUI mailbox.
use anyhow::{Context as _, Result};
use roost_actors::system::ActorSystem;
use roost_batch::{CredentialGate, RunnerActor};
use roost_batch::runner::RunnerSettings;
use roost_config::RoostConfig;
use roost_store::{ensure_schema, StoreActor};
use roost_tui::{spawn_tui_feeders, TuiActor};
use sqlx::SqlitePool;
use tokio::sync::mpsc;
use tracing::info;

const DEFAULT_MAILBOX: usize = 1024;
const EVENT_CHANNEL: usize = 256;

pub async fn build_and_run(cfg: RoostConfig) -> Result<()> {
    let mut system = ActorSystem::new();
    let shutdown = system.shutdown_handle();

    let pool = SqlitePool::connect(&cfg.database.url)
        .await
        .with_context(|| format!("opening database {}", cfg.database.url))?;
    ensure_schema(&pool).await?;
    info!(url = %cfg.database.url, "app.database_ready");

    let store_addr = system.spawn(StoreActor::new(pool), DEFAULT_MAILBOX);

    let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL);
    let runner = RunnerActor::new(
        RunnerSettings::from_config(&cfg),
        store_addr.clone(),
        events_tx,
    );
    let runner_addr = system.spawn(runner, DEFAULT_MAILBOX);

    let gate = CredentialGate::new(&cfg.gate);
    let tui = TuiActor::new(
        store_addr,
        runner_addr,
        gate,
        cfg.batch.proxy.clone(),
        shutdown.clone(),
    )?;
    let tui_addr = system.spawn(tui, 256);
    spawn_tui_feeders(tui_addr, events_rx, shutdown);

    system.run_until_ctrl_c().await
}
