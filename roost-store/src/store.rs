//! SQLite-backed persistence for profile sessions.
//!
//! Writes are serialized through a single-permit semaphore; reads go straight
//! to the pool. The schema is upgraded in place on startup so databases
//! written by earlier generations of the tool keep working.
use crate::{
    FingerprintSettings, HardwareProfile, ProfileSummary, SessionCookie, SessionRecord,
    SessionUpdate, StoreMsg,
};
use anyhow::{bail, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use roost_actors::actor::{Actor, Context};
use sqlx::{Row, SqlitePool};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

/// Columns added after the original three-column table shipped. Opening an
/// old database adds whichever of these are missing.
const LATER_COLUMNS: &[(&str, &str)] = &[
    ("updated_at", "TEXT"),
    ("email", "TEXT"),
    ("login_domain", "TEXT"),
    ("hardware_profile", "TEXT"),
    ("fingerprint_settings", "TEXT"),
    ("timezone", "TEXT"),
    ("screen_resolution", "TEXT"),
    ("platform", "TEXT"),
    ("language", "TEXT"),
    ("login_status", "TEXT"),
    ("last_login_time", "TEXT"),
    ("login_count", "INTEGER NOT NULL DEFAULT 0"),
];

pub struct StoreActor {
    pool: SqlitePool,
    write_limit: Arc<Semaphore>,
}

impl StoreActor {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            write_limit: Arc::new(Semaphore::new(1)),
        }
    }
}

#[async_trait::async_trait]
impl Actor for StoreActor {
    type Msg = StoreMsg;

    async fn handle(&mut self, msg: Self::Msg, _ctx: &mut Context<Self>) -> Result<()> {
        match msg {
            StoreMsg::SaveSession(update) => {
                let pool = self.pool.clone();
                let permit_src = self.write_limit.clone();
                tokio::spawn(async move {
                    let permit = match permit_src.acquire_owned().await {
                        Ok(permit) => permit,
                        Err(err) => {
                            error!(error = ?err, "store.save_session.acquire_failed");
                            return;
                        }
                    };
                    if let Err(err) = upsert_session(&pool, update).await {
                        error!(error = ?err, "store.save_session.failed");
                    }
                    drop(permit);
                });
            }
            StoreMsg::GetSession { profile, reply } => {
                let pool = self.pool.clone();
                tokio::spawn(async move {
                    let res = get_session(&pool, &profile).await;
                    if reply.send(res).is_err() {
                        debug!("store.get_session.reply_dropped");
                    }
                });
            }
            StoreMsg::ListProfiles { reply } => {
                let pool = self.pool.clone();
                tokio::spawn(async move {
                    let res = list_profiles(&pool).await;
                    if reply.send(res).is_err() {
                        debug!("store.list_profiles.reply_dropped");
                    }
                });
            }
            StoreMsg::DeleteProfile { profile, reply } => {
                let pool = self.pool.clone();
                let permit_src = self.write_limit.clone();
                tokio::spawn(async move {
                    let res = match permit_src.acquire_owned().await {
                        Ok(permit) => {
                            let res = delete_profile(&pool, &profile).await;
                            drop(permit);
                            res
                        }
                        Err(err) => Err(err.into()),
                    };
                    if reply.send(res).is_err() {
                        debug!("store.delete_profile.reply_dropped");
                    }
                });
            }
            StoreMsg::RenameProfile { old, new, reply } => {
                let pool = self.pool.clone();
                let permit_src = self.write_limit.clone();
                tokio::spawn(async move {
                    let res = match permit_src.acquire_owned().await {
                        Ok(permit) => {
                            let res = rename_profile(&pool, &old, &new).await;
                            drop(permit);
                            res
                        }
                        Err(err) => Err(err.into()),
                    };
                    if reply.send(res).is_err() {
                        debug!("store.rename_profile.reply_dropped");
                    }
                });
            }
        }
        Ok(())
    }
}

/// Create the table if needed and add any columns this build expects that the
/// on-disk database predates.
pub async fn ensure_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"CREATE TABLE IF NOT EXISTS sessions (
            profile TEXT PRIMARY KEY,
            user_agent TEXT,
            cookies TEXT
        )"#,
    )
    .execute(pool)
    .await?;

    let rows = sqlx::query("PRAGMA table_info(sessions)")
        .fetch_all(pool)
        .await?;
    let existing: Vec<String> = rows
        .iter()
        .filter_map(|r| r.try_get::<String, _>("name").ok())
        .collect();

    for (name, decl) in LATER_COLUMNS {
        if existing.iter().any(|c| c == name) {
            continue;
        }
        // Column names come from the static list above, never from input.
        sqlx::query(&format!("ALTER TABLE sessions ADD COLUMN {name} {decl}"))
            .execute(pool)
            .await?;
        info!(column = name, "store.schema.column_added");
    }

    Ok(())
}

/// Insert or update a profile row. `login_count` starts at 1 and climbs by
/// one on every save of an existing profile; `updated_at` and
/// `last_login_time` are always overwritten.
pub async fn upsert_session(pool: &SqlitePool, update: SessionUpdate) -> Result<()> {
    let mut tx = pool.begin().await?;

    let prior: Option<i64> = sqlx::query("SELECT login_count FROM sessions WHERE profile = ?")
        .bind(&update.profile)
        .fetch_optional(&mut *tx)
        .await?
        .and_then(|r| r.try_get::<i64, _>("login_count").ok());
    let login_count = prior.map_or(1, |n| n.max(0) + 1);

    let now = now_ts();
    let cookies_json = serde_json::to_string(&update.cookies)?;
    let hardware_json = update
        .hardware_profile
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;
    let fingerprint_json = update
        .fingerprint_settings
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;

    let res = sqlx::query(
        r#"INSERT INTO sessions
           (profile, user_agent, cookies, email, login_domain,
            hardware_profile, fingerprint_settings, timezone, screen_resolution,
            platform, language, login_status, last_login_time, login_count, updated_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
           ON CONFLICT(profile) DO UPDATE SET
             user_agent=excluded.user_agent,
             cookies=excluded.cookies,
             email=excluded.email,
             login_domain=excluded.login_domain,
             hardware_profile=excluded.hardware_profile,
             fingerprint_settings=excluded.fingerprint_settings,
             timezone=excluded.timezone,
             screen_resolution=excluded.screen_resolution,
             platform=excluded.platform,
             language=excluded.language,
             login_status=excluded.login_status,
             last_login_time=excluded.last_login_time,
             login_count=excluded.login_count,
             updated_at=excluded.updated_at"#,
    )
    .bind(&update.profile)
    .bind(&update.user_agent)
    .bind(&cookies_json)
    .bind(&update.email)
    .bind(&update.login_domain)
    .bind(&hardware_json)
    .bind(&fingerprint_json)
    .bind(&update.timezone)
    .bind(&update.screen_resolution)
    .bind(&update.platform)
    .bind(&update.language)
    .bind(&update.login_status)
    .bind(&now)
    .bind(login_count)
    .bind(&now)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    info!(
        profile=%update.profile,
        login_count,
        rows=res.rows_affected(),
        "store.upsert_session"
    );
    Ok(())
}

pub async fn get_session(pool: &SqlitePool, profile: &str) -> Result<Option<SessionRecord>> {
    let row = sqlx::query(
        r#"SELECT profile, user_agent, cookies, email, login_domain,
                  hardware_profile, fingerprint_settings, timezone, screen_resolution,
                  platform, language, login_status, last_login_time, login_count, updated_at
           FROM sessions WHERE profile = ?"#,
    )
    .bind(profile)
    .fetch_optional(pool)
    .await?;

    let Some(r) = row else {
        debug!(profile, "store.get_session.missing");
        return Ok(None);
    };

    let cookies: Vec<SessionCookie> = match r.try_get::<Option<String>, _>("cookies")? {
        Some(raw) if !raw.is_empty() => serde_json::from_str(&raw).unwrap_or_else(|e| {
            warn!(profile, error=%e, "store.get_session.cookies_unreadable");
            Vec::new()
        }),
        _ => Vec::new(),
    };
    let hardware_profile: Option<HardwareProfile> = r
        .try_get::<Option<String>, _>("hardware_profile")?
        .and_then(|raw| serde_json::from_str(&raw).ok());
    let fingerprint_settings: Option<FingerprintSettings> = r
        .try_get::<Option<String>, _>("fingerprint_settings")?
        .and_then(|raw| serde_json::from_str(&raw).ok());

    Ok(Some(SessionRecord {
        profile: r.try_get("profile")?,
        user_agent: r.try_get("user_agent")?,
        cookies,
        email: r.try_get("email")?,
        login_domain: r.try_get("login_domain")?,
        hardware_profile,
        fingerprint_settings,
        timezone: r.try_get("timezone")?,
        screen_resolution: r.try_get("screen_resolution")?,
        platform: r.try_get("platform")?,
        language: r.try_get("language")?,
        login_status: r.try_get("login_status")?,
        last_login_time: parse_ts(r.try_get("last_login_time")?),
        login_count: r.try_get::<Option<i64>, _>("login_count")?.unwrap_or(0),
        updated_at: parse_ts(r.try_get("updated_at")?),
    }))
}

pub async fn list_profiles(pool: &SqlitePool) -> Result<Vec<ProfileSummary>> {
    let rows = sqlx::query(
        r#"SELECT profile, updated_at, email, login_domain, login_count, last_login_time
           FROM sessions ORDER BY updated_at DESC"#,
    )
    .fetch_all(pool)
    .await?;
    info!(rows = rows.len(), "store.list_profiles");

    Ok(rows
        .into_iter()
        .map(|r| ProfileSummary {
            profile: r.try_get::<String, _>("profile").unwrap_or_default(),
            updated_at: parse_ts(r.try_get("updated_at").unwrap_or(None)),
            email: r.try_get("email").unwrap_or(None),
            login_domain: r.try_get("login_domain").unwrap_or(None),
            login_count: r.try_get::<Option<i64>, _>("login_count").ok().flatten().unwrap_or(0),
            last_login_time: parse_ts(r.try_get("last_login_time").unwrap_or(None)),
        })
        .collect())
}

/// Returns false when the profile did not exist.
pub async fn delete_profile(pool: &SqlitePool, profile: &str) -> Result<bool> {
    let res = sqlx::query("DELETE FROM sessions WHERE profile = ?")
        .bind(profile)
        .execute(pool)
        .await?;
    info!(profile, rows = res.rows_affected(), "store.delete_profile");
    Ok(res.rows_affected() > 0)
}

/// Rename a profile. Fails when `new` is taken or `old` does not exist; the
/// identity and all bookkeeping move with the row.
pub async fn rename_profile(pool: &SqlitePool, old: &str, new: &str) -> Result<()> {
    if old == new {
        bail!("new name matches the current name");
    }

    let mut tx = pool.begin().await?;

    let taken = sqlx::query("SELECT 1 FROM sessions WHERE profile = ?")
        .bind(new)
        .fetch_optional(&mut *tx)
        .await?
        .is_some();
    if taken {
        bail!("a profile named '{new}' already exists");
    }

    let res = sqlx::query("UPDATE sessions SET profile = ?1 WHERE profile = ?2")
        .bind(new)
        .bind(old)
        .execute(&mut *tx)
        .await?;
    if res.rows_affected() == 0 {
        bail!("no profile named '{old}'");
    }

    tx.commit().await?;
    info!(old, new, "store.rename_profile");
    Ok(())
}

fn now_ts() -> String {
    // Fixed-width fractional seconds keep TEXT ordering chronological.
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(raw: Option<String>) -> Option<DateTime<Utc>> {
    raw.as_deref()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn memory_pool() -> SqlitePool {
        // One connection so the in-memory database survives between queries.
        SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("in-memory sqlite")
    }

    fn update_with_cookies(profile: &str) -> SessionUpdate {
        let mut u = SessionUpdate::new(profile);
        u.user_agent = Some("Mozilla/5.0 test".into());
        u.cookies = vec![SessionCookie {
            name: "SID".into(),
            value: "abc123".into(),
            domain: Some(".example.com".into()),
            path: Some("/".into()),
            secure: true,
            http_only: true,
            expiry: Some(1_900_000_000),
        }];
        u
    }

    #[tokio::test]
    async fn schema_upgrade_adds_missing_columns() {
        let pool = memory_pool().await;
        // Simulate a first-generation database.
        sqlx::query("CREATE TABLE sessions (profile TEXT PRIMARY KEY, user_agent TEXT, cookies TEXT)")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query("INSERT INTO sessions (profile, user_agent, cookies) VALUES ('legacy', 'ua', '[]')")
            .execute(&pool)
            .await
            .unwrap();

        ensure_schema(&pool).await.unwrap();

        let rows = sqlx::query("PRAGMA table_info(sessions)")
            .fetch_all(&pool)
            .await
            .unwrap();
        let names: Vec<String> = rows
            .iter()
            .map(|r| r.try_get::<String, _>("name").unwrap())
            .collect();
        for (col, _) in LATER_COLUMNS {
            assert!(names.iter().any(|n| n == col), "missing column {col}");
        }

        // The legacy row is readable through the upgraded schema.
        let rec = get_session(&pool, "legacy").await.unwrap().unwrap();
        assert_eq!(rec.user_agent.as_deref(), Some("ua"));
        assert_eq!(rec.login_count, 0);
    }

    #[tokio::test]
    async fn ensure_schema_is_idempotent() {
        let pool = memory_pool().await;
        ensure_schema(&pool).await.unwrap();
        ensure_schema(&pool).await.unwrap();
    }

    #[tokio::test]
    async fn upsert_initializes_then_increments_login_count() {
        let pool = memory_pool().await;
        ensure_schema(&pool).await.unwrap();

        upsert_session(&pool, update_with_cookies("inbox-a")).await.unwrap();
        let first = get_session(&pool, "inbox-a").await.unwrap().unwrap();
        assert_eq!(first.login_count, 1);
        assert!(first.updated_at.is_some());
        assert!(first.last_login_time.is_some());

        let mut second = update_with_cookies("inbox-a");
        second.user_agent = Some("Mozilla/5.0 newer".into());
        upsert_session(&pool, second).await.unwrap();

        let rec = get_session(&pool, "inbox-a").await.unwrap().unwrap();
        assert_eq!(rec.login_count, 2);
        assert_eq!(rec.user_agent.as_deref(), Some("Mozilla/5.0 newer"));
        assert_eq!(rec.cookies.len(), 1);
        assert_eq!(rec.cookies[0].name, "SID");
    }

    #[tokio::test]
    async fn identity_blobs_round_trip() {
        let pool = memory_pool().await;
        ensure_schema(&pool).await.unwrap();

        let mut u = update_with_cookies("inbox-b");
        u.hardware_profile = Some(HardwareProfile {
            cpu_cores: 8,
            memory_gb: 16,
            gpu_vendor: "NVIDIA Corporation".into(),
            gpu_renderer: "NVIDIA GeForce RTX 3060".into(),
            device_id: "0123456789abcdef0123456789abcdef".into(),
            machine_id: "0123456789ABCDEF".into(),
        });
        u.fingerprint_settings = Some(FingerprintSettings {
            canvas_noise: 0.7,
            webgl_noise: 0.4,
            audio_noise: 0.5,
            timezone_offset_minutes: -300,
            webrtc_enabled: false,
            do_not_track: true,
            touch_enabled: false,
        });
        upsert_session(&pool, u.clone()).await.unwrap();

        let rec = get_session(&pool, "inbox-b").await.unwrap().unwrap();
        assert_eq!(rec.hardware_profile, u.hardware_profile);
        assert_eq!(rec.fingerprint_settings, u.fingerprint_settings);
    }

    #[tokio::test]
    async fn get_missing_profile_is_none() {
        let pool = memory_pool().await;
        ensure_schema(&pool).await.unwrap();
        assert!(get_session(&pool, "ghost").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn list_orders_by_most_recent_update() {
        let pool = memory_pool().await;
        ensure_schema(&pool).await.unwrap();

        upsert_session(&pool, update_with_cookies("older")).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        upsert_session(&pool, update_with_cookies("newer")).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        // Re-saving bumps "older" back to the top.
        upsert_session(&pool, update_with_cookies("older")).await.unwrap();

        let listed = list_profiles(&pool).await.unwrap();
        let names: Vec<&str> = listed.iter().map(|p| p.profile.as_str()).collect();
        assert_eq!(names, vec!["older", "newer"]);
        assert_eq!(listed[0].login_count, 2);
    }

    #[tokio::test]
    async fn delete_reports_existence() {
        let pool = memory_pool().await;
        ensure_schema(&pool).await.unwrap();
        upsert_session(&pool, update_with_cookies("doomed")).await.unwrap();

        assert!(delete_profile(&pool, "doomed").await.unwrap());
        assert!(!delete_profile(&pool, "doomed").await.unwrap());
        assert!(get_session(&pool, "doomed").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn rename_moves_row_and_bookkeeping() {
        let pool = memory_pool().await;
        ensure_schema(&pool).await.unwrap();
        upsert_session(&pool, update_with_cookies("before")).await.unwrap();
        upsert_session(&pool, update_with_cookies("before")).await.unwrap();

        rename_profile(&pool, "before", "after").await.unwrap();

        assert!(get_session(&pool, "before").await.unwrap().is_none());
        let rec = get_session(&pool, "after").await.unwrap().unwrap();
        assert_eq!(rec.login_count, 2);
    }

    #[tokio::test]
    async fn rename_rejects_conflicts_and_missing_rows() {
        let pool = memory_pool().await;
        ensure_schema(&pool).await.unwrap();
        upsert_session(&pool, update_with_cookies("a")).await.unwrap();
        upsert_session(&pool, update_with_cookies("b")).await.unwrap();

        assert!(rename_profile(&pool, "a", "b").await.is_err());
        assert!(rename_profile(&pool, "ghost", "c").await.is_err());
        assert!(rename_profile(&pool, "a", "a").await.is_err());

        // Failed renames leave both rows untouched.
        assert!(get_session(&pool, "a").await.unwrap().is_some());
        assert!(get_session(&pool, "b").await.unwrap().is_some());
    }
}
