use crate::roost_browser::{
    fingerprint::SyntheticIdentity,
    stealth::{build_stealth_arguments, scripts_for},
};
use anyhow::{anyhow, Result};
use fantoccini::cookies::Cookie;
use fantoccini::{Client, ClientBuilder};
use roost_common::StealthLevel;
use roost_store::SessionCookie;
use serde_json::json;
use std::collections::HashMap;
use std::path::PathBuf;
use time::OffsetDateTime;
use tracing::{debug, info, warn};
use webdriver::capabilities::Capabilities;

/// Everything needed to bring up one profile's browser.
#[derive(Debug, Clone)]
pub struct LaunchSpec {
    pub profile: String,
    pub identity: SyntheticIdentity,
    pub user_data_dir: PathBuf,
    pub proxy: Option<String>,
    pub headless: bool,
    pub stealth: StealthLevel,
    pub webdriver_url: String,
}

/// Thin wrapper around a `fantoccini` WebDriver client carrying the
/// identity the session was launched with.
pub struct RoostDriver {
    pub client: Client,
    identity: SyntheticIdentity,
    stealth: StealthLevel,
}

impl RoostDriver {
    /// Launch a browser for one profile via a running WebDriver service.
    ///
    /// The Chrome process is started with the profile's pinned identity
    /// (user agent, window size, language) and its own `--user-data-dir`,
    /// so concurrent launches never share on-disk browser state.
    pub async fn launch(spec: &LaunchSpec) -> Result<Self> {
        let mut caps = Capabilities::new();
        let mut chrome_opts = HashMap::new();

        let args = build_stealth_arguments(
            &spec.identity,
            &spec.user_data_dir,
            spec.proxy.as_deref(),
            spec.headless,
        );
        chrome_opts.insert("args".to_string(), json!(args));
        caps.insert("goog:chromeOptions".to_string(), json!(chrome_opts));

        info!(
            profile = %spec.profile,
            headless = spec.headless,
            proxied = spec.proxy.is_some(),
            "driver.launch"
        );

        let client = ClientBuilder::native()
            .capabilities(caps)
            .connect(&spec.webdriver_url)
            .await
            .map_err(|e| anyhow!("webdriver connect to {} failed: {e}", spec.webdriver_url))?;

        Ok(Self {
            client,
            identity: spec.identity.clone(),
            stealth: spec.stealth,
        })
    }

    /// Navigate to `url`, then re-apply the evasion scripts. Scripts do not
    /// survive navigation, so every page load goes through here.
    pub async fn goto(&self, url: &str) -> Result<()> {
        self.client.goto(url).await?;
        for script in scripts_for(self.stealth, &self.identity) {
            if let Err(e) = self.client.execute(&script, vec![]).await {
                debug!(error = %e, "driver.script_rejected");
            }
        }
        Ok(())
    }

    /// Restore a saved cookie jar and land on the mailbox.
    ///
    /// Cookies can only be set for the origin currently loaded, so this
    /// first navigates to `resume_origin`, injects the jar (skipping any
    /// cookie the browser rejects), then navigates to `mailbox_url`.
    pub async fn restore_session(
        &self,
        cookies: &[SessionCookie],
        resume_origin: &str,
        mailbox_url: &str,
    ) -> Result<usize> {
        self.goto(resume_origin).await?;

        let mut restored = 0usize;
        for cookie in cookies {
            match self.client.add_cookie(to_wire_cookie(cookie)).await {
                Ok(()) => restored += 1,
                Err(e) => {
                    warn!(name = %cookie.name, error = %e, "driver.cookie_rejected");
                }
            }
        }
        info!(restored, total = cookies.len(), "driver.cookies_restored");

        self.goto(mailbox_url).await?;
        Ok(restored)
    }

    /// Read back what the live browser actually presents: effective user
    /// agent, reported screen, and the full cookie jar.
    pub async fn capture_session(&self) -> Result<CapturedSession> {
        let ua = self
            .client
            .execute("return navigator.userAgent;", vec![])
            .await?;
        let screen = self
            .client
            .execute(
                "return window.screen.width + 'x' + window.screen.height;",
                vec![],
            )
            .await?;

        let cookies = self
            .client
            .get_all_cookies()
            .await?
            .iter()
            .map(from_wire_cookie)
            .collect();

        Ok(CapturedSession {
            user_agent: ua.as_str().map(str::to_string),
            screen_resolution: screen.as_str().map(str::to_string),
            cookies,
        })
    }

    pub fn identity(&self) -> &SyntheticIdentity {
        &self.identity
    }

    /// Close the underlying browser session.
    pub async fn close(self) -> Result<()> {
        self.client.close().await?;
        Ok(())
    }
}

/// Live-session state read back from the browser before persisting.
#[derive(Debug, Clone)]
pub struct CapturedSession {
    pub user_agent: Option<String>,
    pub screen_resolution: Option<String>,
    pub cookies: Vec<SessionCookie>,
}

fn to_wire_cookie(c: &SessionCookie) -> Cookie<'static> {
    let mut cookie = Cookie::new(c.name.clone(), c.value.clone());
    if let Some(domain) = &c.domain {
        cookie.set_domain(domain.clone());
    }
    if let Some(path) = &c.path {
        cookie.set_path(path.clone());
    }
    cookie.set_secure(c.secure);
    cookie.set_http_only(c.http_only);
    if let Some(expiry) = c.expiry {
        if let Ok(at) = OffsetDateTime::from_unix_timestamp(expiry) {
            cookie.set_expires(at);
        }
    }
    cookie
}

fn from_wire_cookie(c: &Cookie<'_>) -> SessionCookie {
    SessionCookie {
        name: c.name().to_string(),
        value: c.value().to_string(),
        domain: c.domain().map(str::to_string),
        path: c.path().map(str::to_string),
        secure: c.secure().unwrap_or(false),
        http_only: c.http_only().unwrap_or(false),
        expiry: c.expires_datetime().map(|t| t.unix_timestamp()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_cookie_round_trip_preserves_fields() {
        let original = SessionCookie {
            name: "SID".into(),
            value: "abc123".into(),
            domain: Some(".example.com".into()),
            path: Some("/".into()),
            secure: true,
            http_only: true,
            expiry: Some(1_893_456_000),
        };
        let wire = to_wire_cookie(&original);
        let back = from_wire_cookie(&wire);
        assert_eq!(back, original);
    }

    #[test]
    fn wire_cookie_without_expiry_is_session_scoped() {
        let c = SessionCookie {
            name: "tmp".into(),
            value: "v".into(),
            domain: None,
            path: None,
            secure: false,
            http_only: false,
            expiry: None,
        };
        let back = from_wire_cookie(&to_wire_cookie(&c));
        assert_eq!(back.expiry, None);
        assert_eq!(back.domain, None);
    }
}
