use crate::{
    command::{parse_command, Command},
    styles,
    transcript::TranscriptLine,
    view::{self, ViewSnap},
};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use crossterm::{
    event::{Event as CtEvent, KeyCode, KeyEvent, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, style::Style, Terminal};
use roost_actors::{
    actor::{Actor, Addr, Context},
    system::ShutdownHandle,
};
use roost_batch::{CredentialGate, Roster, RunnerActor, RunnerEvent, RunnerMsg};
use roost_store::{ProfileSummary, StoreActor, StoreMsg};
use std::{
    io::{self, Stdout},
    time::{Duration, Instant},
};
use tokio::sync::oneshot;

const BRAILLE_FRAMES: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

pub enum TuiMsg {
    InputEvent(CtEvent),
    Tick,
    Submit(String),
    Runner(RunnerEvent),
    LoginDone(std::result::Result<(), String>),
    ProfilesListed(std::result::Result<Vec<ProfileSummary>, String>),
    DeleteDone {
        profile: String,
        result: std::result::Result<bool, String>,
    },
    RenameDone {
        old: String,
        new: String,
        result: std::result::Result<(), String>,
    },
    OpError(String),
    Shutdown,
}

pub struct TuiActor {
    // deps
    store: Addr<StoreActor>,
    runner: Addr<RunnerActor>,
    gate: CredentialGate,

    // operator state
    verified: bool,
    proxy_override: Option<String>,
    roster_size: Option<usize>,
    batch_status: String,

    // terminal
    term: Terminal<CrosstermBackend<Stdout>>,
    tick_rate: Duration,
    last_tick: Instant,

    // ui state
    input: String,
    input_cursor: usize,
    lines: Vec<TranscriptLine>,
    scroll: usize,
    dirty: bool,

    // busy/spinner
    busy: u32,
    spin_idx: usize,

    // shutdown coordination
    shutdown: ShutdownHandle,
}

impl TuiActor {
    pub fn new(
        store: Addr<StoreActor>,
        runner: Addr<RunnerActor>,
        gate: CredentialGate,
        proxy_default: Option<String>,
        shutdown: ShutdownHandle,
    ) -> Result<Self> {
        let mut stdout = io::stdout();
        enable_raw_mode()?;
        execute!(stdout, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let mut term = Terminal::new(backend)?;
        term.clear()?;

        Ok(Self {
            store,
            runner,
            gate,
            verified: false,
            proxy_override: proxy_default,
            roster_size: None,
            batch_status: "no roster".to_string(),
            term,
            tick_rate: Duration::from_millis(80),
            last_tick: Instant::now(),
            input: String::new(),
            input_cursor: 0,
            lines: vec![TranscriptLine::new(
                "Unlock with '/login <user-id> <key-id>', then '/load <roster.csv>' and '/start'. '/help' lists commands.".into(),
                styles::system(),
            )],
            scroll: 0,
            dirty: true,
            busy: 0,
            spin_idx: 0,
            shutdown,
        })
    }

    fn cursor_left(&mut self) {
        if self.input_cursor == 0 {
            return;
        }
        self.input_cursor -= 1;
        while self.input_cursor > 0 && !self.input.is_char_boundary(self.input_cursor) {
            self.input_cursor -= 1;
        }
    }

    fn cursor_right(&mut self) {
        if self.input_cursor >= self.input.len() {
            return;
        }
        self.input_cursor += 1;
        while self.input_cursor < self.input.len()
            && !self.input.is_char_boundary(self.input_cursor)
        {
            self.input_cursor += 1;
        }
    }

    fn insert_char(&mut self, ch: char) {
        self.input.insert(self.input_cursor, ch);
        self.input_cursor += ch.len_utf8();
    }

    fn backspace(&mut self) {
        if self.input_cursor == 0 {
            return;
        }
        let mut prev = self.input_cursor.saturating_sub(1);
        while prev > 0 && !self.input.is_char_boundary(prev) {
            prev -= 1;
        }
        self.input.drain(prev..self.input_cursor);
        self.input_cursor = prev;
    }

    fn delete(&mut self) {
        if self.input_cursor >= self.input.len() {
            return;
        }
        let start = self.input_cursor;
        let mut end = start + 1;
        while end < self.input.len() && !self.input.is_char_boundary(end) {
            end += 1;
        }
        self.input.drain(start..end);
    }

    fn push<S: Into<String>>(&mut self, s: S) {
        self.push_styled(s, Style::default());
    }

    fn push_styled<S: Into<String>>(&mut self, s: S, style: Style) {
        self.lines.push(TranscriptLine::new(s.into(), style));
        self.dirty = true;
    }

    fn push_blank(&mut self) {
        self.push(String::new());
    }

    fn spinner(&self) -> &'static str {
        if self.busy > 0 {
            BRAILLE_FRAMES[self.spin_idx % BRAILLE_FRAMES.len()]
        } else {
            " "
        }
    }

    fn set_busy(&mut self, on: bool) {
        if on {
            self.busy = self.busy.saturating_add(1)
        } else {
            self.busy = self.busy.saturating_sub(1)
        }
        self.dirty = true;
    }

    fn step_spinner(&mut self) {
        if self.busy > 0 {
            self.spin_idx = (self.spin_idx + 1) % BRAILLE_FRAMES.len();
            self.dirty = true;
        }
    }

    fn draw(&mut self) -> Result<()> {
        let snap = ViewSnap::new(
            self.input.clone(),
            self.input_cursor,
            self.lines.clone(),
            self.scroll,
            self.busy,
            self.spinner(),
            self.batch_status.clone(),
        );

        view::draw(&mut self.term, &snap)
    }

    fn handle_key(&mut self, key: KeyEvent) -> Option<TuiMsg> {
        match (key.code, key.modifiers) {
            (KeyCode::Char('c'), KeyModifiers::CONTROL)
            | (KeyCode::Char('q'), KeyModifiers::CONTROL) => return Some(TuiMsg::Shutdown),
            (KeyCode::PageUp, _) => {
                self.scroll = self.scroll.saturating_add(5);
                self.dirty = true;
            }
            (KeyCode::PageDown, _) => {
                self.scroll = self.scroll.saturating_sub(5);
                self.dirty = true;
            }
            (KeyCode::Up, _) => {
                self.scroll = self.scroll.saturating_add(1);
                self.dirty = true;
            }
            (KeyCode::Down, _) => {
                self.scroll = self.scroll.saturating_sub(1);
                self.dirty = true;
            }
            (KeyCode::Enter, _) => {
                let line = std::mem::take(&mut self.input);
                self.input_cursor = 0;
                self.dirty = true;
                return Some(TuiMsg::Submit(line));
            }
            (KeyCode::Left, _) => {
                self.cursor_left();
                self.dirty = true;
            }
            (KeyCode::Right, _) => {
                self.cursor_right();
                self.dirty = true;
            }
            (KeyCode::Home, _) => {
                self.input_cursor = 0;
                self.dirty = true;
            }
            (KeyCode::End, _) => {
                self.input_cursor = self.input.len();
                self.dirty = true;
            }
            (KeyCode::Backspace, _) => {
                self.backspace();
                self.dirty = true;
            }
            (KeyCode::Delete, _) => {
                self.delete();
                self.dirty = true;
            }
            (KeyCode::Esc, _) => {
                self.input.clear();
                self.input_cursor = 0;
                self.dirty = true;
            }
            (KeyCode::Char(ch), _) => {
                self.insert_char(ch);
                self.dirty = true;
            }
            _ => {}
        }
        None
    }

    fn route_submit(&mut self, line: String, me: Addr<TuiActor>) {
        let s = line.trim().to_string();
        if s.is_empty() {
            return;
        }

        if s.starts_with('/') {
            self.push_styled(format!("→ {s}"), styles::user_header());
            let cmd = parse_command(&s);
            self.handle_command(cmd, me);
            return;
        }

        self.push_styled("× Commands start with '/'. Try `/help`.", styles::dim());
        self.push_blank();
    }

    fn require_verified(&mut self) -> bool {
        if self.verified {
            return true;
        }
        self.push_styled(
            "× Locked. Verify first with `/login <user-id> <key-id>`.",
            styles::error(),
        );
        self.push_blank();
        false
    }

    fn load_roster(&mut self, path: &std::path::Path) {
        match Roster::from_csv_path(path, self.proxy_override.as_deref()) {
            Ok(roster) => {
                let n = roster.len();
                self.roster_size = Some(n);
                self.batch_status = format!("{n} profiles loaded");
                if self.runner.try_send(RunnerMsg::Configure { roster }).is_err() {
                    self.push_styled("× Runner unavailable.", styles::error());
                }
                self.push_styled(
                    format!("✓ Loaded {n} profile(s) from {}.", path.display()),
                    styles::system(),
                );
                if let Some(proxy) = &self.proxy_override {
                    self.push_styled(
                        format!("  Proxy override in effect: {proxy}"),
                        styles::dim(),
                    );
                }
            }
            Err(e) => {
                self.push_styled(format!("× {e}"), styles::error());
            }
        }
        self.push_blank();
    }

    fn list_profiles(&mut self, me: Addr<TuiActor>) {
        self.set_busy(true);
        let store = self.store.clone();
        tokio::spawn(async move {
            let (tx, rx) = oneshot::channel();
            let result = match store.send(StoreMsg::ListProfiles { reply: tx }).await {
                Ok(()) => match rx.await {
                    Ok(Ok(rows)) => Ok(rows),
                    Ok(Err(e)) => Err(format!("store query: {e}")),
                    Err(e) => Err(format!("store channel: {e}")),
                },
                Err(_) => Err("store mailbox dropped".into()),
            };
            let _ = me.send(TuiMsg::ProfilesListed(result)).await;
        });
    }

    fn render_profiles(&mut self, rows: Vec<ProfileSummary>) {
        if rows.is_empty() {
            self.push_styled("No saved profiles yet.", styles::dim());
            self.push_blank();
            return;
        }
        self.push_styled(format!("Profiles ({}):", rows.len()), styles::label());
        for row in rows {
            let domain = row.login_domain.as_deref().unwrap_or("-");
            let seen = row
                .last_login_time
                .map(format_ts)
                .unwrap_or_else(|| "never".to_string());
            self.push_styled(
                format!(
                    "  • {}  logins:{}  domain:{}  last:{}",
                    row.profile, row.login_count, domain, seen
                ),
                styles::value(),
            );
        }
        self.push_blank();
    }

    fn handle_command(&mut self, cmd: Command, me: Addr<TuiActor>) {
        match cmd {
            Command::Quit => {
                let _ = me.try_send(TuiMsg::Shutdown);
            }
            Command::Help => {
                self.push_styled("Commands:", styles::label());
                self.push_styled("  /login <user> <key>   verify operator credentials", styles::value());
                self.push_styled("  /load <roster.csv>    load a profile roster", styles::value());
                self.push_styled("  /proxy [addr|-]       show, set, or clear the proxy override", styles::value());
                self.push_styled("  /start                start the batch from the first profile", styles::value());
                self.push_styled("  /next                 save the open session and advance", styles::value());
                self.push_styled("  /profiles             list saved profiles", styles::value());
                self.push_styled("  /rename <old> <new>   rename a saved profile", styles::value());
                self.push_styled("  /delete <profile>     delete a saved profile", styles::value());
                self.push_styled("  /quit                 exit", styles::value());
                self.push_blank();
            }
            Command::Login { user_id, key_id } => {
                self.set_busy(true);
                let gate = self.gate.clone();
                tokio::spawn(async move {
                    let result = gate
                        .verify(&user_id, &key_id)
                        .await
                        .map_err(|e| e.to_string());
                    let _ = me.send(TuiMsg::LoginDone(result)).await;
                });
            }
            Command::Load(path) => {
                if self.require_verified() {
                    self.load_roster(&path);
                }
            }
            Command::Proxy(None) => {
                match &self.proxy_override {
                    Some(p) => self.push_styled(format!("Proxy override: {p}"), styles::value()),
                    None => self.push_styled("No proxy override; roster proxies apply.", styles::dim()),
                }
                self.push_blank();
            }
            Command::Proxy(Some(addr)) => {
                if addr.is_empty() {
                    self.proxy_override = None;
                    self.push_styled("✓ Proxy override cleared.", styles::system());
                } else {
                    self.proxy_override = Some(addr.clone());
                    self.push_styled(format!("✓ Proxy override set: {addr}"), styles::system());
                }
                self.push_styled("  Applies the next time a roster is loaded.", styles::dim());
                self.push_blank();
            }
            Command::Start => {
                if !self.require_verified() {
                    return;
                }
                if self.roster_size.is_none() {
                    self.push_styled("× No roster loaded. Use `/load <roster.csv>`.", styles::error());
                    self.push_blank();
                    return;
                }
                if self.runner.try_send(RunnerMsg::Start).is_err() {
                    self.push_styled("× Runner unavailable.", styles::error());
                    self.push_blank();
                }
            }
            Command::Next => {
                if self.runner.try_send(RunnerMsg::Next).is_err() {
                    self.push_styled("× Runner unavailable.", styles::error());
                    self.push_blank();
                }
            }
            Command::Profiles => self.list_profiles(me),
            Command::Rename { old, new } => {
                self.set_busy(true);
                let store = self.store.clone();
                tokio::spawn(async move {
                    let (tx, rx) = oneshot::channel();
                    let result = match store
                        .send(StoreMsg::RenameProfile {
                            old: old.clone(),
                            new: new.clone(),
                            reply: tx,
                        })
                        .await
                    {
                        Ok(()) => match rx.await {
                            Ok(r) => r.map_err(|e| e.to_string()),
                            Err(e) => Err(format!("store channel: {e}")),
                        },
                        Err(_) => Err("store mailbox dropped".into()),
                    };
                    let _ = me.send(TuiMsg::RenameDone { old, new, result }).await;
                });
            }
            Command::Delete(profile) => {
                self.set_busy(true);
                let store = self.store.clone();
                tokio::spawn(async move {
                    let (tx, rx) = oneshot::channel();
                    let result = match store
                        .send(StoreMsg::DeleteProfile {
                            profile: profile.clone(),
                            reply: tx,
                        })
                        .await
                    {
                        Ok(()) => match rx.await {
                            Ok(r) => r.map_err(|e| e.to_string()),
                            Err(e) => Err(format!("store channel: {e}")),
                        },
                        Err(_) => Err("store mailbox dropped".into()),
                    };
                    let _ = me.send(TuiMsg::DeleteDone { profile, result }).await;
                });
            }
            Command::Usage(usage) => {
                self.push_styled(format!("Usage: {usage}"), styles::dim());
                self.push_blank();
            }
            Command::Unknown(s) => {
                self.push_styled(format!("× Unknown command: {s}"), styles::error());
                self.push_styled("Try `/help`.", styles::dim());
                self.push_blank();
            }
        }
    }

    fn render_runner_event(&mut self, event: RunnerEvent) {
        match event {
            RunnerEvent::RosterLoaded { profiles } => {
                self.roster_size = Some(profiles);
                self.batch_status = format!("{profiles} profiles loaded");
            }
            RunnerEvent::ProfileStarting {
                index,
                total,
                profile,
                proxy,
            } => {
                self.batch_status = format!("{}/{} {}", index + 1, total, profile);
                self.push_styled(
                    format!("← Launching {}/{}: {}", index + 1, total, profile),
                    styles::runner_header(),
                );
                match proxy {
                    Some(p) => self.push_styled(format!("  proxy: {p}"), styles::runner_text()),
                    None => self.push_styled("  no proxy", styles::dim()),
                }
            }
            RunnerEvent::SessionRestored {
                profile,
                cookies,
                login_count,
            } => {
                self.push_styled(
                    format!("  ✓ {profile}: {cookies} cookie(s) restored, login #{login_count}"),
                    styles::runner_text(),
                );
                self.push_blank();
            }
            RunnerEvent::AwaitingLogin { profile } => {
                self.push_styled(
                    format!("  {profile}: no saved session. Log in manually, then `/next`."),
                    styles::warn(),
                );
                self.push_blank();
            }
            RunnerEvent::LaunchRetry {
                profile,
                attempt,
                attempts,
            } => {
                self.push_styled(
                    format!("  retrying {profile} ({attempt}/{attempts})"),
                    styles::warn(),
                );
            }
            RunnerEvent::ProfileSkipped { profile, reason } => {
                self.push_styled(format!("× Skipped {profile}: {reason}"), styles::error());
                self.push_blank();
            }
            RunnerEvent::SessionSaved { profile } => {
                self.push_styled(format!("  ✓ Session saved: {profile}"), styles::system());
            }
            RunnerEvent::NoBatch => {
                self.push_styled(
                    "× No batch in progress. `/load` a roster and `/start` first.",
                    styles::error(),
                );
                self.push_blank();
            }
            RunnerEvent::BatchFinished { processed, skipped } => {
                self.batch_status = "batch finished".to_string();
                self.push_styled(
                    format!("✓ Batch finished: {processed} processed, {skipped} skipped."),
                    styles::runner_header(),
                );
                self.push_blank();
            }
        }
    }
}

fn format_ts(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M").to_string()
}

#[async_trait]
impl Actor for TuiActor {
    type Msg = TuiMsg;

    async fn handle(&mut self, msg: Self::Msg, ctx: &mut Context<Self>) -> Result<()> {
        match msg {
            TuiMsg::InputEvent(ev) => {
                if let CtEvent::Key(k) = ev {
                    if let Some(next) = self.handle_key(k) {
                        if let Some(me) = ctx.addr() {
                            let _ = me.try_send(next);
                        }
                    }
                }
            }
            TuiMsg::Submit(line) => {
                if let Some(me) = ctx.addr() {
                    self.route_submit(line, me);
                }
            }
            TuiMsg::Runner(event) => {
                self.render_runner_event(event);
                self.dirty = true;
            }
            TuiMsg::LoginDone(result) => {
                match result {
                    Ok(()) => {
                        self.verified = true;
                        self.push_styled("✓ Credentials verified.", styles::system());
                    }
                    Err(e) => {
                        self.push_styled(format!("× {e}"), styles::error());
                    }
                }
                self.push_blank();
                self.set_busy(false);
            }
            TuiMsg::ProfilesListed(result) => {
                match result {
                    Ok(rows) => self.render_profiles(rows),
                    Err(e) => {
                        self.push_styled(format!("× Error listing profiles: {e}"), styles::error());
                        self.push_blank();
                    }
                }
                self.set_busy(false);
            }
            TuiMsg::DeleteDone { profile, result } => {
                match result {
                    Ok(true) => {
                        self.push_styled(format!("✓ Deleted profile '{profile}'."), styles::system())
                    }
                    Ok(false) => {
                        self.push_styled(format!("× No profile named '{profile}'."), styles::error())
                    }
                    Err(e) => self.push_styled(format!("× Delete failed: {e}"), styles::error()),
                }
                self.push_blank();
                self.set_busy(false);
            }
            TuiMsg::RenameDone { old, new, result } => {
                match result {
                    Ok(()) => self.push_styled(
                        format!("✓ Renamed '{old}' to '{new}'."),
                        styles::system(),
                    ),
                    Err(e) => self.push_styled(format!("× Rename failed: {e}"), styles::error()),
                }
                self.push_blank();
                self.set_busy(false);
            }
            TuiMsg::OpError(e) => {
                self.push_styled(format!("× Error: {e}"), styles::error());
                self.push_blank();
                self.set_busy(false);
            }
            TuiMsg::Tick => {
                self.step_spinner();
                if self.dirty || self.last_tick.elapsed() >= self.tick_rate {
                    self.draw()?;
                    self.last_tick = Instant::now();
                    self.dirty = false;
                }
            }
            TuiMsg::Shutdown => {
                // Flush the open browser session before the terminal goes back.
                let _ = self.runner.try_send(RunnerMsg::Stop);
                disable_raw_mode().ok();
                let _ = execute!(io::stdout(), LeaveAlternateScreen);
                self.shutdown.signal();
                ctx.stop();
            }
        }

        Ok(())
    }
}
