//! Profile store: the mapping from a profile name to the browser identity
//! that resumes it.
//!
//! A profile row carries everything a later run needs to look like the same
//! browser again: user agent, cookies, the synthesized hardware identity and
//! fingerprint knobs, plus login bookkeeping (`login_count`,
//! `last_login_time`). Rows are only ever deleted by the operator.

pub mod store;

pub use store::{ensure_schema, StoreActor};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

/// One cookie captured from (or injected into) a live browser session.
///
/// `expiry` is seconds since the unix epoch; session cookies carry `None`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SessionCookie {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub secure: bool,
    #[serde(default)]
    pub http_only: bool,
    #[serde(default)]
    pub expiry: Option<i64>,
}

/// Synthesized hardware identity pinned to a profile.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct HardwareProfile {
    pub cpu_cores: u32,
    pub memory_gb: u32,
    pub gpu_vendor: String,
    pub gpu_renderer: String,
    /// 32 lowercase hex chars.
    pub device_id: String,
    /// 16 uppercase hex chars.
    pub machine_id: String,
}

/// Fingerprint noise/toggle settings pinned to a profile.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct FingerprintSettings {
    pub canvas_noise: f64,
    pub webgl_noise: f64,
    pub audio_noise: f64,
    pub timezone_offset_minutes: i32,
    pub webrtc_enabled: bool,
    pub do_not_track: bool,
    pub touch_enabled: bool,
}

/// Full stored state for one profile.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionRecord {
    pub profile: String,
    pub user_agent: Option<String>,
    pub cookies: Vec<SessionCookie>,
    pub email: Option<String>,
    pub login_domain: Option<String>,
    pub hardware_profile: Option<HardwareProfile>,
    pub fingerprint_settings: Option<FingerprintSettings>,
    pub timezone: Option<String>,
    pub screen_resolution: Option<String>,
    pub platform: Option<String>,
    pub language: Option<String>,
    pub login_status: Option<String>,
    pub last_login_time: Option<DateTime<Utc>>,
    pub login_count: i64,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Fields a caller supplies on save. Bookkeeping columns (`login_count`,
/// `last_login_time`, `updated_at`) are owned by the store.
#[derive(Clone, Debug, Default)]
pub struct SessionUpdate {
    pub profile: String,
    pub user_agent: Option<String>,
    pub cookies: Vec<SessionCookie>,
    pub email: Option<String>,
    pub login_domain: Option<String>,
    pub hardware_profile: Option<HardwareProfile>,
    pub fingerprint_settings: Option<FingerprintSettings>,
    pub timezone: Option<String>,
    pub screen_resolution: Option<String>,
    pub platform: Option<String>,
    pub language: Option<String>,
    pub login_status: Option<String>,
}

impl SessionUpdate {
    pub fn new(profile: impl Into<String>) -> Self {
        Self {
            profile: profile.into(),
            login_status: Some("active".to_string()),
            ..Default::default()
        }
    }
}

/// Row shape for `/profiles` listings, most recently updated first.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProfileSummary {
    pub profile: String,
    pub updated_at: Option<DateTime<Utc>>,
    pub email: Option<String>,
    pub login_domain: Option<String>,
    pub login_count: i64,
    pub last_login_time: Option<DateTime<Utc>>,
}

pub enum StoreMsg {
    SaveSession(SessionUpdate),
    GetSession {
        profile: String,
        reply: oneshot::Sender<anyhow::Result<Option<SessionRecord>>>,
    },
    ListProfiles {
        reply: oneshot::Sender<anyhow::Result<Vec<ProfileSummary>>>,
    },
    DeleteProfile {
        profile: String,
        reply: oneshot::Sender<anyhow::Result<bool>>,
    },
    RenameProfile {
        old: String,
        new: String,
        reply: oneshot::Sender<anyhow::Result<()>>,
    },
}
