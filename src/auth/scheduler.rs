//! Proactive renewal ahead of access token expiry.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::renewal::RenewalCoordinator;
use super::store::{CredentialChange, CredentialStore};

/// Minimum gap after a proactive renewal, for servers that issue tokens
/// shorter-lived than the lead time.
const RENEWAL_COOLDOWN: Duration = Duration::from_secs(30);

/// Renews the credential `lead` before its access token expires.
///
/// Re-arms whenever the credential is replaced and idles while signed out.
/// The background task stops when the scheduler is dropped.
pub struct RenewalScheduler {
    task: JoinHandle<()>,
}

impl RenewalScheduler {
    pub fn spawn(
        store: Arc<CredentialStore>,
        renewal: Arc<RenewalCoordinator>,
        lead: Duration,
    ) -> Self {
        let task = tokio::spawn(run(store, renewal, lead));
        Self { task }
    }
}

impl Drop for RenewalScheduler {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run(store: Arc<CredentialStore>, renewal: Arc<RenewalCoordinator>, lead: Duration) {
    let mut changes = store.subscribe();
    let mut just_renewed = false;
    // Access token our own last renewal stored; its broadcast keeps the cooldown.
    let mut renewed_token: Option<String> = None;

    loop {
        let expiry = store.get().and_then(|c| c.claims().ok()).map(|claims| claims.exp);
        let Some(exp) = expiry else {
            // Signed out or undecodable token: nothing to schedule
            if let Err(RecvError::Closed) = changes.recv().await {
                return;
            }
            just_renewed = false;
            renewed_token = None;
            continue;
        };

        let floor = if just_renewed {
            RENEWAL_COOLDOWN
        } else {
            Duration::ZERO
        };
        let wait = delay_until_renewal(exp, lead, Utc::now().timestamp_millis()).max(floor);
        debug!("Next proactive renewal in {}s", wait.as_secs());

        tokio::select! {
            _ = tokio::time::sleep(wait) => {
                info!("Access token nearing expiry; renewing proactively");
                renewed_token = match renewal.renew().await {
                    Ok(credential) => Some(credential.access_token),
                    Err(e) => {
                        debug!("Proactive renewal failed: {}", e);
                        None
                    }
                };
                just_renewed = true;
            }
            change = changes.recv() => match change {
                Ok(CredentialChange::Replaced(credential))
                    if renewed_token.as_deref() == Some(credential.access_token.as_str()) => {}
                Err(RecvError::Closed) => return,
                _ => {
                    just_renewed = false;
                    renewed_token = None;
                }
            }
        }
    }
}

/// Time from `now_millis` until `lead` before `exp` (seconds since epoch).
fn delay_until_renewal(exp: i64, lead: Duration, now_millis: i64) -> Duration {
    let lead_millis = i64::try_from(lead.as_millis()).unwrap_or(i64::MAX);
    let due = exp.saturating_mul(1000).saturating_sub(lead_millis);
    let remaining = due.saturating_sub(now_millis);
    Duration::from_millis(u64::try_from(remaining).unwrap_or(0))
}
