use anyhow::Result;
use tokio::{
    sync::{broadcast, mpsc},
    task::JoinHandle,
};

/// Minimal actor trait. `Self: Sized` avoids object-safety issues when using `Context<Self>`.
#[async_trait::async_trait]
pub trait Actor: Send + Sized + 'static {
    type Msg: Send + 'static;

    /// Handle a single message. Return `Err` to stop the actor.
    async fn handle(&mut self, msg: Self::Msg, ctx: &mut Context<Self>) -> Result<()>;
}

/// Runtime context for an actor instance.
///
/// Holds only a weak handle to the actor's own mailbox; a strong handle here
/// would keep the channel open forever and an idle actor could never observe
/// "all senders dropped".
pub struct Context<A: Actor> {
    addr: mpsc::WeakSender<A::Msg>,
    stop: bool,
}

impl<A: Actor> Context<A> {
    /// Upgrade to a strong `Addr` for self-sends. `None` once every external
    /// `Addr` has been dropped and the mailbox is closing.
    pub fn addr(&self) -> Option<Addr<A>> {
        self.addr.upgrade().map(Addr)
    }

    /// Request a graceful stop after processing the current message.
    pub fn stop(&mut self) {
        self.stop = true;
    }
}

/// Address for sending messages to an actor.
pub struct Addr<A: Actor>(mpsc::Sender<A::Msg>);

/// Manual Clone to avoid unnecessary bounds on `A`/`A::Msg`.
impl<A: Actor> Clone for Addr<A> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<A: Actor> Addr<A> {
    /// Async send; awaits backpressure. Returns the message if the receiver is dropped.
    pub async fn send(&self, msg: A::Msg) -> std::result::Result<(), A::Msg> {
        self.0.send(msg).await.map_err(|e| e.0)
    }

    /// Try to send without waiting. Returns the message if the mailbox is full or closed.
    pub fn try_send(&self, msg: A::Msg) -> std::result::Result<(), A::Msg> {
        self.0.try_send(msg).map_err(|e| e.into_inner())
    }
}

/// Handle to a running actor task.
pub struct ActorHandle<A: Actor> {
    pub addr: Addr<A>,
    pub task: JoinHandle<anyhow::Result<()>>,
}

/// Spawn an actor with a bounded mailbox.
///
/// Stop conditions:
/// - `handle` returns `Err`
/// - all senders are dropped
/// - `ctx.stop()` is called
/// - the shutdown broadcast fires (when one was supplied)
///
/// ```
/// # use anyhow::Result;
/// # use async_trait::async_trait;
/// # use roost_actors::actor::{self, Actor, Context};
/// # struct Accumulator(u8);
/// # #[async_trait]
/// # impl Actor for Accumulator {
/// #     type Msg = u8;
/// #     async fn handle(&mut self, msg: Self::Msg, ctx: &mut Context<Self>) -> Result<()> {
/// #         self.0 += msg;
/// #         if self.0 >= 5 {
/// #             ctx.stop();
/// #         }
/// #         Ok(())
/// #     }
/// # }
/// let rt = tokio::runtime::Runtime::new().unwrap();
/// rt.block_on(async {
///     let actor::ActorHandle { addr, task } = actor::spawn_actor(Accumulator(0), 8, None);
///     addr.send(2).await.unwrap();
///     addr.send(3).await.unwrap();
///     drop(addr);
///     task.await.unwrap().unwrap();
/// });
/// ```
pub fn spawn_actor<A: Actor>(
    mut actor: A,
    capacity: usize,
    shutdown: Option<broadcast::Receiver<()>>,
) -> ActorHandle<A> {
    let (tx, mut rx) = mpsc::channel::<A::Msg>(capacity);
    let addr = Addr(tx);
    let weak_addr = addr.0.downgrade();

    let task = tokio::spawn(async move {
        let mut ctx = Context {
            addr: weak_addr,
            stop: false,
        };

        match shutdown {
            Some(mut shutdown_rx) => loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => break,
                    maybe_msg = rx.recv() => match maybe_msg {
                        Some(msg) => {
                            if let Err(e) = actor.handle(msg, &mut ctx).await {
                                tracing::error!(target = "roost-actors", error = ?e, "actor returned error; stopping");
                                return Err(e);
                            }
                            if ctx.stop {
                                break;
                            }
                        }
                        None => break,
                    },
                }
            },
            None => {
                while let Some(msg) = rx.recv().await {
                    if let Err(e) = actor.handle(msg, &mut ctx).await {
                        tracing::error!(target = "roost-actors", error = ?e, "actor returned error; stopping");
                        return Err(e);
                    }
                    if ctx.stop {
                        break;
                    }
                }
            }
        }
        Ok(())
    });

    ActorHandle { addr, task }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use async_trait::async_trait;

    struct Echo {
        seen: Vec<String>,
    }

    #[async_trait]
    impl Actor for Echo {
        type Msg = String;

        async fn handle(&mut self, msg: Self::Msg, ctx: &mut Context<Self>) -> Result<()> {
            if msg == "stop" {
                ctx.stop();
            } else {
                self.seen.push(msg);
            }
            Ok(())
        }
    }

    struct Countdown;

    #[async_trait]
    impl Actor for Countdown {
        type Msg = u32;

        async fn handle(&mut self, msg: Self::Msg, ctx: &mut Context<Self>) -> Result<()> {
            if msg == 0 {
                ctx.stop();
            } else if let Some(me) = ctx.addr() {
                let _ = me.try_send(msg - 1);
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn drains_mailbox_until_stop() {
        let ActorHandle { addr, task } = spawn_actor(Echo { seen: vec![] }, 4, None);
        addr.send("a".into()).await.unwrap();
        addr.send("stop".into()).await.unwrap();
        drop(addr);
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn dropping_every_address_stops_an_idle_actor() {
        // No ctx.stop(), no shutdown channel: the mailbox closing is the only
        // way out, so the context must not hold the channel open.
        let ActorHandle { addr, task } = spawn_actor(Echo { seen: vec![] }, 4, None);
        addr.send("a".into()).await.unwrap();
        drop(addr);
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn self_sends_flow_through_the_context_address() {
        let ActorHandle { addr, task } = spawn_actor(Countdown, 8, None);
        addr.send(3).await.unwrap();
        // Completes only if the countdown self-sends reach zero and stop.
        task.await.unwrap().unwrap();
        drop(addr);
    }

    #[tokio::test]
    async fn shutdown_broadcast_stops_actor() {
        let (tx, rx) = broadcast::channel(1);
        let ActorHandle { addr, task } = spawn_actor(Echo { seen: vec![] }, 4, Some(rx));
        addr.send("a".into()).await.unwrap();
        tx.send(()).unwrap();
        task.await.unwrap().unwrap();
        drop(addr);
    }
}
