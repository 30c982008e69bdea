use crate::tui::{TuiActor, TuiMsg};
use roost_actors::actor::Addr;
use roost_actors::system::ShutdownHandle;
use roost_batch::RunnerEvent;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::{self, time};

/// Spawn the tasks that feed the TUI mailbox: terminal input, the render
/// tick, and runner progress events.
pub fn spawn_tui_feeders(
    tui: Addr<TuiActor>,
    mut runner_events: mpsc::Receiver<RunnerEvent>,
    shutdown: ShutdownHandle,
) {
    let tui_in = tui.clone();
    let mut shutdown_input = shutdown.subscribe();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = shutdown_input.recv() => break,
                ev = tokio::task::spawn_blocking(crossterm::event::read) => {
                    match ev {
                        Ok(Ok(e)) => {
                            let _ = tui_in.send(TuiMsg::InputEvent(e)).await;
                        }
                        Ok(Err(e)) => {
                            let _ = tui_in.send(TuiMsg::OpError(format!("input: {e}"))).await;
                        }
                        Err(_) => break,
                    }
                }
            }
        }
    });

    let tui_tick = tui.clone();
    let mut shutdown_tick = shutdown.subscribe();
    tokio::spawn(async move {
        let mut interval = time::interval(Duration::from_millis(80));
        loop {
            tokio::select! {
                _ = shutdown_tick.recv() => break,
                _ = interval.tick() => {
                    let _ = tui_tick.try_send(TuiMsg::Tick);
                }
            }
        }
    });

    let tui_runner = tui;
    let mut shutdown_runner = shutdown.subscribe();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = shutdown_runner.recv() => break,
                ev = runner_events.recv() => match ev {
                    Some(event) => {
                        let _ = tui_runner.send(TuiMsg::Runner(event)).await;
                    }
                    None => break,
                },
            }
        }
    });
}
