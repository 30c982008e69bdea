//! Operator credential verification.
//!
//! A batch will not start until the operator's user/key pair passes the
//! verification endpoint, which answers the literal body `1` for a valid
//! pair. In demo mode any non-empty pair passes without a network call.
use roost_common::{Result, RoostError};
use roost_config::GateConfig;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Clone)]
pub struct CredentialGate {
    endpoint: String,
    demo_mode: bool,
    http: reqwest::Client,
}

impl CredentialGate {
    pub fn new(config: &GateConfig) -> Self {
        Self {
            endpoint: config.endpoint.clone(),
            demo_mode: config.demo_mode,
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_default(),
        }
    }

    /// Check an operator credential pair. Empty components always fail.
    pub async fn verify(&self, user_id: &str, key_id: &str) -> Result<()> {
        if user_id.trim().is_empty() || key_id.trim().is_empty() {
            return Err(RoostError::CredentialsRejected);
        }

        if self.demo_mode {
            info!("gate.demo_accept");
            return Ok(());
        }

        let response = self
            .http
            .get(&self.endpoint)
            .query(&[
                ("menuname", "seeding"),
                ("userid", user_id),
                ("keyid", key_id),
            ])
            .send()
            .await
            .map_err(|e| RoostError::Config(format!("verification endpoint unreachable: {e}")))?;

        let body = response
            .text()
            .await
            .map_err(|e| RoostError::Config(format!("verification response unreadable: {e}")))?;

        if body.trim() == "1" {
            info!("gate.accepted");
            Ok(())
        } else {
            warn!("gate.rejected");
            Err(RoostError::CredentialsRejected)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn demo_gate() -> CredentialGate {
        CredentialGate::new(&GateConfig {
            endpoint: "https://gate.invalid".into(),
            demo_mode: true,
        })
    }

    #[tokio::test]
    async fn demo_mode_accepts_any_non_empty_pair() {
        demo_gate().verify("operator", "key-123").await.unwrap();
    }

    #[tokio::test]
    async fn empty_components_fail_even_in_demo_mode() {
        let gate = demo_gate();
        assert!(matches!(
            gate.verify("", "key").await,
            Err(RoostError::CredentialsRejected)
        ));
        assert!(matches!(
            gate.verify("user", "   ").await,
            Err(RoostError::CredentialsRejected)
        ));
    }
}
