//! Task tracking and shutdown signaling for the actor set.
//!
//! Actors subscribe to the broadcast channel for cooperative shutdown, while
//! the `JoinSet` ensures spawned tasks are awaited during teardown.
use crate::actor::{spawn_actor, Actor, ActorHandle, Addr};
use anyhow::Result;
use tokio::{sync::broadcast, task::JoinSet};

#[derive(Clone)]
pub struct ShutdownHandle {
    tx: broadcast::Sender<()>,
}

impl ShutdownHandle {
    pub fn signal(&self) {
        let _ = self.tx.send(());
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }
}

pub struct ActorSystem {
    joinset: JoinSet<Result<()>>,
    shutdown_tx: broadcast::Sender<()>,
}

impl Default for ActorSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl ActorSystem {
    pub fn new() -> Self {
        let (shutdown_tx, _) = broadcast::channel(32);
        Self {
            joinset: JoinSet::new(),
            shutdown_tx,
        }
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            tx: self.shutdown_tx.clone(),
        }
    }

    /// Spawn an actor wired to the system shutdown channel and track its task.
    pub fn spawn<A: Actor>(&mut self, actor: A, mailbox: usize) -> Addr<A> {
        let shutdown_rx = self.shutdown_tx.subscribe();
        let ActorHandle { addr, task } = spawn_actor(actor, mailbox, Some(shutdown_rx));
        self.joinset.spawn(async move {
            task.await??;
            Ok(())
        });
        addr
    }

    pub async fn graceful_shutdown(mut self) -> Result<()> {
        let _ = self.shutdown_tx.send(());
        while let Some(res) = self.joinset.join_next().await {
            res??;
        }
        Ok(())
    }

    /// Block until CTRL-C or an internal shutdown signal, then tear down.
    pub async fn run_until_ctrl_c(self) -> Result<()> {
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = async {
                let _ = shutdown_rx.recv().await;
            } => {}
        }
        self.graceful_shutdown().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::{Actor, Context};
    use async_trait::async_trait;

    struct Quiet;

    #[async_trait]
    impl Actor for Quiet {
        type Msg = ();

        async fn handle(&mut self, _msg: Self::Msg, _ctx: &mut Context<Self>) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn graceful_shutdown_joins_all_tasks() {
        let mut sys = ActorSystem::new();
        let addr = sys.spawn(Quiet, 4);
        addr.send(()).await.unwrap();
        drop(addr);
        sys.graceful_shutdown().await.unwrap();
    }
}
