//! `teamnotify listen`: stay connected and log every notification.

use color_eyre::eyre::eyre;
use color_eyre::Result;
use tokio::sync::broadcast::error::RecvError;

use crate::auth::{ClearReason, CredentialChange};
use crate::events::{handler, EventEnvelope, NotificationCounts, NotificationEventType};
use crate::hub::NotificationHub;

/// One log line per envelope.
pub fn describe(envelope: &EventEnvelope) -> String {
    let title = envelope
        .data
        .get("title")
        .or_else(|| envelope.data.get("message"))
        .and_then(|v| v.as_str())
        .unwrap_or("");
    format!(
        "[{}] {} {}",
        envelope.timestamp.format("%H:%M:%S"),
        envelope.event_type,
        title
    )
    .trim_end()
    .to_string()
}

/// Connect and print notifications until Ctrl-C or the session ends.
pub async fn run_listen(hub: &NotificationHub) -> Result<()> {
    if !hub.is_signed_in() {
        return Err(eyre!("not signed in; run `teamnotify sign-in <access> <refresh>` first"));
    }

    let counts = NotificationCounts::new();
    counts.attach(hub.dispatcher());
    for event_type in NotificationEventType::ALL {
        hub.on(
            event_type,
            handler(|envelope| {
                println!("{}", describe(envelope));
                Ok(())
            }),
        );
    }

    let mut status = hub.status_receiver();
    let mut session = hub.session_events();
    hub.connect();

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    let outcome = loop {
        tokio::select! {
            _ = &mut shutdown => break Ok(()),
            changed = status.changed() => {
                if changed.is_err() {
                    break Ok(());
                }
                let state = *status.borrow_and_update();
                tracing::info!(state = %state, "Stream state changed");
            }
            change = session.recv() => match change {
                Ok(CredentialChange::Cleared(ClearReason::SessionInvalid)) => {
                    break Err(eyre!("session expired; sign in again"));
                }
                Ok(CredentialChange::Cleared(ClearReason::SignedOut)) => break Ok(()),
                Ok(CredentialChange::Replaced(_)) | Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => break Ok(()),
            },
        }
    };

    hub.disconnect();
    let snapshot = counts.snapshot();
    println!(
        "received {} notifications ({} personal, {} team)",
        snapshot.total, snapshot.personal, snapshot.team
    );
    outcome
}
