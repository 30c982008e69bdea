//! The actor that walks a roster, one browser session at a time.
//!
//! Each profile is processed in sequence: the previous session is captured
//! and saved, stray browser processes are killed, then the next profile's
//! browser comes up with its pinned identity and saved cookie jar. A profile
//! whose browser refuses to launch after the configured number of attempts
//! is skipped and the batch moves on.
use crate::roster::Roster;
use roost_actors::actor::{Actor, Addr, Context};
use roost_common::StealthLevel;
use roost_config::RoostConfig;
use roost_drivers::roost_browser::{
    driver::{LaunchSpec, RoostDriver},
    fingerprint::SyntheticIdentity,
    process::kill_stray_browsers,
};
use roost_store::{SessionUpdate, StoreActor, StoreMsg};
use anyhow::{anyhow, Result};
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{error, info, warn};

/// Pause between launch attempts for the same profile.
const LAUNCH_RETRY_PAUSE: Duration = Duration::from_secs(3);

/// Runtime knobs the runner needs, flattened out of the config tree.
#[derive(Debug, Clone)]
pub struct RunnerSettings {
    pub webdriver_url: String,
    pub headless: bool,
    pub stealth: StealthLevel,
    pub profiles_dir: PathBuf,
    pub launch_attempts: u32,
    pub login_url: String,
    pub resume_origin: String,
    pub mailbox_url: String,
}

impl RunnerSettings {
    pub fn from_config(config: &RoostConfig) -> Self {
        Self {
            webdriver_url: config.browser.webdriver_url.clone(),
            headless: config.browser.headless,
            stealth: config.browser.stealth,
            profiles_dir: PathBuf::from(&config.browser.profiles_dir),
            launch_attempts: config.browser.launch_attempts.max(1),
            login_url: config.batch.login_url.clone(),
            resume_origin: config.batch.resume_origin.clone(),
            mailbox_url: config.batch.mailbox_url.clone(),
        }
    }
}

pub enum RunnerMsg {
    /// Replace the roster. Clears any batch in progress.
    Configure { roster: Roster },
    /// Start (or restart) the batch from the first profile.
    Start,
    /// Save the active session and move to the next profile.
    Next,
    /// Save the active session, close the browser, and stop the actor.
    Stop,
}

/// Progress notifications, consumed by the UI layer.
#[derive(Debug, Clone)]
pub enum RunnerEvent {
    RosterLoaded {
        profiles: usize,
    },
    ProfileStarting {
        index: usize,
        total: usize,
        profile: String,
        proxy: Option<String>,
    },
    SessionRestored {
        profile: String,
        cookies: usize,
        login_count: i64,
    },
    /// No saved cookies; the browser is parked on the login page for a
    /// manual sign-in.
    AwaitingLogin {
        profile: String,
    },
    LaunchRetry {
        profile: String,
        attempt: u32,
        attempts: u32,
    },
    ProfileSkipped {
        profile: String,
        reason: String,
    },
    SessionSaved {
        profile: String,
    },
    /// An advance arrived while no batch was in progress.
    NoBatch,
    BatchFinished {
        processed: usize,
        skipped: usize,
    },
}

struct ActiveSession {
    profile: String,
    driver: RoostDriver,
    login_domain: Option<String>,
}

pub struct RunnerActor {
    settings: RunnerSettings,
    store: Addr<StoreActor>,
    events: mpsc::Sender<RunnerEvent>,
    roster: Roster,
    /// Index of the profile currently on screen; `None` before `Start`.
    cursor: Option<usize>,
    active: Option<ActiveSession>,
    processed: usize,
    skipped: usize,
}

impl RunnerActor {
    pub fn new(
        settings: RunnerSettings,
        store: Addr<StoreActor>,
        events: mpsc::Sender<RunnerEvent>,
    ) -> Self {
        Self {
            settings,
            store,
            events,
            roster: Roster::default(),
            cursor: None,
            active: None,
            processed: 0,
            skipped: 0,
        }
    }

    async fn emit(&self, event: RunnerEvent) {
        if self.events.send(event).await.is_err() {
            warn!("runner.events_closed");
        }
    }

    /// Capture and persist the on-screen session, then close its browser.
    async fn save_and_close_active(&mut self) {
        let Some(active) = self.active.take() else {
            return;
        };
        let profile = active.profile.clone();

        match active.driver.capture_session().await {
            Ok(captured) => {
                let identity = active.driver.identity();
                let mut update = SessionUpdate::new(&profile);
                update.user_agent = captured.user_agent.or(Some(identity.user_agent.clone()));
                update.cookies = captured.cookies;
                update.login_domain = active.login_domain.clone();
                update.hardware_profile = Some(identity.hardware.clone());
                update.fingerprint_settings = Some(identity.fingerprint.clone());
                update.timezone = Some(identity.timezone.clone());
                update.screen_resolution = captured
                    .screen_resolution
                    .or(Some(identity.screen_resolution.clone()));
                update.platform = Some(identity.platform.clone());
                update.language = Some(identity.language.clone());

                if self.store.send(StoreMsg::SaveSession(update)).await.is_err() {
                    error!(profile = %profile, "runner.store_unreachable");
                } else {
                    self.emit(RunnerEvent::SessionSaved {
                        profile: profile.clone(),
                    })
                    .await;
                }
            }
            Err(e) => {
                warn!(profile = %profile, error = %e, "runner.capture_failed");
            }
        }

        if let Err(e) = active.driver.close().await {
            warn!(profile = %profile, error = %e, "runner.close_failed");
        }
        self.reap_strays().await;
    }

    async fn reap_strays(&self) {
        let dir = self.settings.profiles_dir.clone();
        // `ps`/`kill` are blocking process spawns.
        let _ = tokio::task::spawn_blocking(move || kill_stray_browsers(&dir)).await;
    }

    async fn load_record(&self, profile: &str) -> Result<Option<roost_store::SessionRecord>> {
        let (tx, rx) = oneshot::channel();
        self.store
            .send(StoreMsg::GetSession {
                profile: profile.to_string(),
                reply: tx,
            })
            .await
            .map_err(|_| anyhow!("store actor mailbox dropped"))?;
        rx.await.map_err(|_| anyhow!("store reply dropped"))?
    }

    async fn launch_with_retries(&self, spec: &LaunchSpec) -> Result<RoostDriver> {
        let attempts = self.settings.launch_attempts;
        let mut last_err = None;
        for attempt in 1..=attempts {
            match RoostDriver::launch(spec).await {
                Ok(driver) => return Ok(driver),
                Err(e) => {
                    warn!(
                        profile = %spec.profile,
                        attempt,
                        attempts,
                        error = %e,
                        "runner.launch_failed"
                    );
                    last_err = Some(e);
                    if attempt < attempts {
                        self.emit(RunnerEvent::LaunchRetry {
                            profile: spec.profile.clone(),
                            attempt,
                            attempts,
                        })
                        .await;
                        tokio::time::sleep(LAUNCH_RETRY_PAUSE).await;
                        self.reap_strays().await;
                    }
                }
            }
        }
        Err(last_err.unwrap_or_else(|| anyhow!("no launch attempts configured")))
    }

    /// Bring up the browser for the profile under the cursor. On failure the
    /// profile is skipped and the actor advances itself via its own mailbox.
    async fn start_current(&mut self, ctx: &mut Context<Self>) -> Result<()> {
        let Some(index) = self.cursor else {
            return Ok(());
        };
        let Some(entry) = self.roster.get(index).cloned() else {
            info!(
                processed = self.processed,
                skipped = self.skipped,
                "runner.batch_finished"
            );
            self.emit(RunnerEvent::BatchFinished {
                processed: self.processed,
                skipped: self.skipped,
            })
            .await;
            self.cursor = None;
            return Ok(());
        };

        self.emit(RunnerEvent::ProfileStarting {
            index,
            total: self.roster.len(),
            profile: entry.profile.clone(),
            proxy: entry.proxy.clone(),
        })
        .await;

        let record = match self.load_record(&entry.profile).await {
            Ok(r) => r,
            Err(e) => {
                error!(profile = %entry.profile, error = %e, "runner.store_lookup_failed");
                None
            }
        };
        let identity = SyntheticIdentity::for_record(record.as_ref());

        let spec = LaunchSpec {
            profile: entry.profile.clone(),
            identity,
            user_data_dir: self.settings.profiles_dir.join(&entry.profile),
            proxy: entry.proxy.clone(),
            headless: self.settings.headless,
            stealth: self.settings.stealth,
            webdriver_url: self.settings.webdriver_url.clone(),
        };

        let driver = match self.launch_with_retries(&spec).await {
            Ok(d) => d,
            Err(e) => {
                self.skipped += 1;
                self.emit(RunnerEvent::ProfileSkipped {
                    profile: entry.profile.clone(),
                    reason: e.to_string(),
                })
                .await;
                self.cursor = Some(index + 1);
                // Advance through the mailbox so skips cannot starve other messages.
                if let Some(me) = ctx.addr() {
                    let _ = me.try_send(RunnerMsg::Next);
                }
                return Ok(());
            }
        };

        let login_domain = record
            .as_ref()
            .and_then(|r| r.login_domain.clone())
            .or_else(|| infer_login_domain(&entry.profile));

        let saved_cookies = record.map(|r| (r.cookies, r.login_count));
        match saved_cookies {
            Some((cookies, login_count)) if !cookies.is_empty() => {
                match driver
                    .restore_session(
                        &cookies,
                        &self.settings.resume_origin,
                        &self.settings.mailbox_url,
                    )
                    .await
                {
                    Ok(restored) => {
                        self.emit(RunnerEvent::SessionRestored {
                            profile: entry.profile.clone(),
                            cookies: restored,
                            login_count,
                        })
                        .await;
                    }
                    Err(e) => {
                        warn!(profile = %entry.profile, error = %e, "runner.restore_failed");
                    }
                }
            }
            _ => {
                if let Err(e) = driver.goto(&self.settings.login_url).await {
                    warn!(profile = %entry.profile, error = %e, "runner.login_page_failed");
                }
                self.emit(RunnerEvent::AwaitingLogin {
                    profile: entry.profile.clone(),
                })
                .await;
            }
        }

        self.processed += 1;
        self.active = Some(ActiveSession {
            profile: entry.profile,
            driver,
            login_domain,
        });
        Ok(())
    }
}

#[async_trait::async_trait]
impl Actor for RunnerActor {
    type Msg = RunnerMsg;

    async fn handle(&mut self, msg: Self::Msg, ctx: &mut Context<Self>) -> Result<()> {
        match msg {
            RunnerMsg::Configure { roster } => {
                self.save_and_close_active().await;
                self.cursor = None;
                self.processed = 0;
                self.skipped = 0;
                self.emit(RunnerEvent::RosterLoaded {
                    profiles: roster.len(),
                })
                .await;
                self.roster = roster;
            }
            RunnerMsg::Start => {
                self.save_and_close_active().await;
                self.processed = 0;
                self.skipped = 0;
                if self.roster.is_empty() {
                    self.emit(RunnerEvent::BatchFinished {
                        processed: 0,
                        skipped: 0,
                    })
                    .await;
                    return Ok(());
                }
                self.reap_strays().await;
                self.cursor = Some(0);
                self.start_current(ctx).await?;
            }
            RunnerMsg::Next => {
                if self.cursor.is_none() {
                    warn!("runner.next_without_batch");
                    self.emit(RunnerEvent::NoBatch).await;
                    return Ok(());
                }
                self.save_and_close_active().await;
                self.cursor = self.cursor.map(|i| i + 1);
                self.start_current(ctx).await?;
            }
            RunnerMsg::Stop => {
                self.save_and_close_active().await;
                ctx.stop();
            }
        }
        Ok(())
    }
}

/// Best-effort webmail domain from a profile name. Stored domains always win
/// over this guess.
fn infer_login_domain(profile: &str) -> Option<String> {
    let p = profile.to_lowercase();
    if p.contains("gmail") || p.contains("google") {
        Some("google.com".to_string())
    } else if p.contains("yahoo") {
        Some("yahoo.com".to_string())
    } else if p.contains("outlook") || p.contains("hotmail") {
        Some("outlook.com".to_string())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roost_actors::actor::{spawn_actor, ActorHandle};
    use roost_store::{ensure_schema, StoreActor};
    use sqlx::sqlite::SqlitePoolOptions;

    fn settings() -> RunnerSettings {
        RunnerSettings {
            webdriver_url: "http://localhost:9515".into(),
            headless: true,
            stealth: StealthLevel::Balanced,
            profiles_dir: PathBuf::from("roost-test-profiles-nonexistent"),
            launch_attempts: 1,
            login_url: "https://accounts.google.com/signup".into(),
            resume_origin: "https://accounts.google.com/".into(),
            mailbox_url: "https://mail.google.com/".into(),
        }
    }

    async fn store_addr() -> Addr<StoreActor> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        ensure_schema(&pool).await.unwrap();
        spawn_actor(StoreActor::new(pool), 8, None).addr
    }

    #[tokio::test]
    async fn configure_reports_roster_size() {
        let (events_tx, mut events_rx) = mpsc::channel(8);
        let runner = RunnerActor::new(settings(), store_addr().await, events_tx);
        let ActorHandle { addr, task } = spawn_actor(runner, 8, None);

        addr.send(RunnerMsg::Configure {
            roster: Roster::default(),
        })
        .await
        .map_err(|_| ())
        .unwrap();
        drop(addr);
        task.await.unwrap().unwrap();

        match events_rx.recv().await {
            Some(RunnerEvent::RosterLoaded { profiles }) => assert_eq!(profiles, 0),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn starting_an_empty_roster_finishes_immediately() {
        let (events_tx, mut events_rx) = mpsc::channel(8);
        let runner = RunnerActor::new(settings(), store_addr().await, events_tx);
        let ActorHandle { addr, task } = spawn_actor(runner, 8, None);

        addr.send(RunnerMsg::Start).await.map_err(|_| ()).unwrap();
        drop(addr);
        task.await.unwrap().unwrap();

        match events_rx.recv().await {
            Some(RunnerEvent::BatchFinished { processed, skipped }) => {
                assert_eq!((processed, skipped), (0, 0));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn next_without_a_batch_reports_no_batch() {
        let (events_tx, mut events_rx) = mpsc::channel(8);
        let runner = RunnerActor::new(settings(), store_addr().await, events_tx);
        let ActorHandle { addr, task } = spawn_actor(runner, 8, None);

        addr.send(RunnerMsg::Next).await.map_err(|_| ()).unwrap();
        drop(addr);
        task.await.unwrap().unwrap();

        match events_rx.recv().await {
            Some(RunnerEvent::NoBatch) => {}
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn login_domain_guesses_common_webmail_hosts() {
        assert_eq!(infer_login_domain("gmail_batch_07").as_deref(), Some("google.com"));
        assert_eq!(infer_login_domain("YAHOO-main").as_deref(), Some("yahoo.com"));
        assert_eq!(infer_login_domain("hotmail-x").as_deref(), Some("outlook.com"));
        assert_eq!(infer_login_domain("profile1"), None);
    }

    #[test]
    fn launch_attempts_never_drop_below_one() {
        let mut config = RoostConfig::default();
        config.browser.launch_attempts = 0;
        assert_eq!(RunnerSettings::from_config(&config).launch_attempts, 1);
    }
}
