//! Result type alias for crate operations.

use super::notify_error::NotifyError;

/// Type alias for Results using [`NotifyError`].
///
/// ```ignore
/// use teamnotify::error::NotifyResult;
///
/// async fn trigger(hub: &NotificationHub) -> NotifyResult<()> {
///     hub.send_test_notification().await
/// }
/// ```
pub type NotifyResult<T> = Result<T, NotifyError>;
