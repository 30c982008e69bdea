//! Synthesized browser identities.
//!
//! Values are drawn from literal pools of plausible desktop hardware; there
//! is no correctness requirement beyond internal consistency. An identity is
//! generated once when a profile is first seen and pinned in the store, so a
//! profile presents the same machine on every later run.
use rand::prelude::SliceRandom;
use rand::Rng;
use roost_store::{FingerprintSettings, HardwareProfile, SessionRecord};
use serde::{Deserialize, Serialize};

const DESKTOP_USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/130.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/129.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36",
];

const GPU_PAIRS: &[(&str, &str)] = &[
    ("Intel Inc.", "Intel Iris Xe Graphics"),
    ("Intel Inc.", "Intel UHD Graphics 630"),
    ("Intel Inc.", "Intel HD Graphics 520"),
    ("Intel Inc.", "Intel Iris Plus Graphics 655"),
    ("Intel Inc.", "Intel UHD Graphics 620"),
    ("NVIDIA Corporation", "NVIDIA GeForce GTX 1050"),
    ("NVIDIA Corporation", "NVIDIA GeForce GTX 1660 Ti"),
    ("NVIDIA Corporation", "NVIDIA GeForce RTX 2060"),
    ("NVIDIA Corporation", "NVIDIA GeForce RTX 3060"),
    ("NVIDIA Corporation", "NVIDIA GeForce RTX 3080"),
    ("NVIDIA Corporation", "NVIDIA GeForce MX250"),
    ("NVIDIA Corporation", "NVIDIA GeForce GT 1030"),
    ("NVIDIA Corporation", "NVIDIA Quadro P2000"),
    ("NVIDIA Corporation", "NVIDIA RTX A2000"),
    ("AMD", "AMD Radeon RX 580"),
    ("AMD", "AMD Radeon RX 5700 XT"),
    ("AMD", "AMD Radeon RX 6600 XT"),
    ("AMD", "AMD Radeon Pro 5500M"),
    ("AMD", "AMD Radeon Vega 8"),
    ("AMD", "AMD Radeon R9 M370X"),
    ("Apple Inc.", "Apple M1"),
    ("Apple Inc.", "Apple M2"),
    ("Apple Inc.", "Apple M1 Pro"),
    ("Apple Inc.", "Apple M1 Max"),
    ("Apple Inc.", "Apple M2 Max"),
];

const CPU_CORES: &[u32] = &[2, 4, 6, 8, 12, 16];
const MEMORY_GB: &[u32] = &[4, 8, 16, 32, 64];

const SCREEN_RESOLUTIONS: &[&str] = &[
    "1920x1080", "2560x1440", "1366x768", "1440x900", "3840x2160", "1536x864", "1280x720",
];

const PLATFORMS: &[&str] = &[
    "Windows NT 10.0",
    "Windows NT 11.0",
    "Macintosh; Intel Mac OS X 10_15",
    "Macintosh; Intel Mac OS X 11_0",
    "X11; Linux x86_64",
];

const LANGUAGES: &[&str] = &[
    "en-US,en;q=0.9",
    "en-GB,en;q=0.8,fr;q=0.6",
    "es-ES,es;q=0.9,en;q=0.8",
    "fr-FR,fr;q=0.9,en;q=0.8",
];

const TIMEZONES: &[&str] = &[
    "America/New_York",
    "America/Chicago",
    "America/Denver",
    "America/Los_Angeles",
    "Europe/London",
    "Europe/Paris",
    "Asia/Tokyo",
    "Australia/Sydney",
];

const TIMEZONE_OFFSETS: &[i32] = &[
    -480, -420, -360, -300, -240, -180, 0, 60, 120, 180, 240, 300, 360, 480,
];

/// Everything a launched browser presents as "the machine": user agent,
/// hardware, fingerprint noise settings, screen, platform, language,
/// timezone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyntheticIdentity {
    pub user_agent: String,
    pub hardware: HardwareProfile,
    pub fingerprint: FingerprintSettings,
    pub screen_resolution: String,
    pub platform: String,
    pub language: String,
    pub timezone: String,
}

impl SyntheticIdentity {
    /// Fabricate a fresh identity from the literal pools.
    pub fn generate() -> Self {
        Self::generate_with(&mut rand::thread_rng())
    }

    pub fn generate_with<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let (gpu_vendor, gpu_renderer) = *GPU_PAIRS.choose(rng).expect("non-empty pool");
        Self {
            user_agent: DESKTOP_USER_AGENTS.choose(rng).expect("non-empty pool").to_string(),
            hardware: HardwareProfile {
                cpu_cores: *CPU_CORES.choose(rng).expect("non-empty pool"),
                memory_gb: *MEMORY_GB.choose(rng).expect("non-empty pool"),
                gpu_vendor: gpu_vendor.to_string(),
                gpu_renderer: gpu_renderer.to_string(),
                device_id: hex_string(rng, 32, false),
                machine_id: hex_string(rng, 16, true),
            },
            fingerprint: FingerprintSettings {
                canvas_noise: rng.gen_range(0.1..=2.0),
                webgl_noise: rng.gen_range(0.1..=1.5),
                audio_noise: rng.gen_range(0.2..=1.0),
                timezone_offset_minutes: *TIMEZONE_OFFSETS.choose(rng).expect("non-empty pool"),
                webrtc_enabled: rng.gen_bool(0.5),
                do_not_track: rng.gen_bool(0.5),
                touch_enabled: rng.gen_bool(0.5),
            },
            screen_resolution: SCREEN_RESOLUTIONS.choose(rng).expect("non-empty pool").to_string(),
            platform: PLATFORMS.choose(rng).expect("non-empty pool").to_string(),
            language: LANGUAGES.choose(rng).expect("non-empty pool").to_string(),
            timezone: TIMEZONES.choose(rng).expect("non-empty pool").to_string(),
        }
    }

    /// Rebuild the identity a stored record was captured with, synthesizing
    /// only the pieces the record is missing. A record written by an older
    /// schema generation may carry cookies but no identity columns.
    pub fn for_record(record: Option<&SessionRecord>) -> Self {
        let fresh = Self::generate();
        let Some(rec) = record else {
            return fresh;
        };
        Self {
            user_agent: rec.user_agent.clone().unwrap_or(fresh.user_agent),
            hardware: rec.hardware_profile.clone().unwrap_or(fresh.hardware),
            fingerprint: rec.fingerprint_settings.clone().unwrap_or(fresh.fingerprint),
            screen_resolution: rec
                .screen_resolution
                .clone()
                .unwrap_or(fresh.screen_resolution),
            platform: rec.platform.clone().unwrap_or(fresh.platform),
            language: rec.language.clone().unwrap_or(fresh.language),
            timezone: rec.timezone.clone().unwrap_or(fresh.timezone),
        }
    }

    /// Window size parsed from the screen resolution, `1920x1080` fallback.
    pub fn viewport(&self) -> (u32, u32) {
        parse_resolution(&self.screen_resolution).unwrap_or((1920, 1080))
    }

    /// Languages in `--lang` form (`en-US,en`), quality weights stripped.
    pub fn lang_arg(&self) -> String {
        self.language
            .split(',')
            .map(|part| part.split(';').next().unwrap_or(part).trim())
            .collect::<Vec<_>>()
            .join(",")
    }
}

fn parse_resolution(s: &str) -> Option<(u32, u32)> {
    let (w, h) = s.split_once('x')?;
    Some((w.trim().parse().ok()?, h.trim().parse().ok()?))
}

fn hex_string<R: Rng + ?Sized>(rng: &mut R, len: usize, uppercase: bool) -> String {
    let digits: &[u8] = if uppercase {
        b"0123456789ABCDEF"
    } else {
        b"0123456789abcdef"
    };
    (0..len)
        .map(|_| digits[rng.gen_range(0..digits.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn generated_identity_is_internally_plausible() {
        let mut rng = StdRng::seed_from_u64(7);
        let id = SyntheticIdentity::generate_with(&mut rng);

        assert!(!id.user_agent.to_lowercase().contains("mobile"));
        assert_eq!(id.hardware.device_id.len(), 32);
        assert!(id.hardware.device_id.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(id.hardware.machine_id.len(), 16);
        assert!(id
            .hardware
            .machine_id
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
        assert!((0.1..=2.0).contains(&id.fingerprint.canvas_noise));
        assert!(id.viewport().0 >= 1280);
    }

    #[test]
    fn seeded_generation_is_reproducible() {
        let a = SyntheticIdentity::generate_with(&mut StdRng::seed_from_u64(42));
        let b = SyntheticIdentity::generate_with(&mut StdRng::seed_from_u64(42));
        assert_eq!(a.user_agent, b.user_agent);
        assert_eq!(a.hardware, b.hardware);
        assert_eq!(a.screen_resolution, b.screen_resolution);
    }

    #[test]
    fn stored_identity_wins_over_synthesis() {
        let mut rec = roost_store::SessionRecord {
            profile: "p".into(),
            user_agent: Some("ua-stored".into()),
            cookies: vec![],
            email: None,
            login_domain: None,
            hardware_profile: None,
            fingerprint_settings: None,
            timezone: Some("Europe/London".into()),
            screen_resolution: Some("2560x1440".into()),
            platform: None,
            language: None,
            login_status: None,
            last_login_time: None,
            login_count: 3,
            updated_at: None,
        };
        let id = SyntheticIdentity::for_record(Some(&rec));
        assert_eq!(id.user_agent, "ua-stored");
        assert_eq!(id.timezone, "Europe/London");
        assert_eq!(id.viewport(), (2560, 1440));
        // Missing pieces were filled in.
        assert!(!id.platform.is_empty());

        rec.user_agent = None;
        let id = SyntheticIdentity::for_record(Some(&rec));
        assert!(id.user_agent.starts_with("Mozilla/5.0"));
    }

    #[test]
    fn lang_arg_strips_quality_weights() {
        let mut id = SyntheticIdentity::generate();
        id.language = "en-GB,en;q=0.8,fr;q=0.6".into();
        assert_eq!(id.lang_arg(), "en-GB,en,fr");
    }
}
