//! Irreversible account and data teardown.

use std::sync::Arc;

use log::{info, warn};

use crate::errors::{Error, Result};
use crate::sync::{
    IdentityStore, LocalBillStore, NotificationScheduler, RemoteBillStore, SettingsStore,
};

/// Deletes every trace of a user across the notification scheduler, the
/// remote store, the identity record, local storage, and process settings.
///
/// The order is load-bearing: side-effecting schedules are cancelled before
/// the data they refer to disappears; remote data is deleted before the
/// identity record, since deleting the identity may revoke the credentials
/// needed to delete the data; local state is cleared last because it is
/// cheap to retry relative to the remote operations.
pub struct AccountTeardown {
    notifications: Arc<dyn NotificationScheduler>,
    remote: Arc<dyn RemoteBillStore>,
    identity: Arc<dyn IdentityStore>,
    local: Arc<dyn LocalBillStore>,
    settings: Arc<dyn SettingsStore>,
}

impl AccountTeardown {
    pub fn new(
        notifications: Arc<dyn NotificationScheduler>,
        remote: Arc<dyn RemoteBillStore>,
        identity: Arc<dyn IdentityStore>,
        local: Arc<dyn LocalBillStore>,
        settings: Arc<dyn SettingsStore>,
    ) -> Self {
        Self {
            notifications,
            remote,
            identity,
            local,
            settings,
        }
    }

    /// Run the five teardown steps in strict order. A notification
    /// cancellation failure is logged and swallowed; any later failure
    /// aborts the remaining steps and surfaces which step broke.
    pub async fn delete_account(&self, user_id: &str) -> Result<()> {
        if let Err(err) = self.notifications.cancel_all().await {
            warn!("[AccountTeardown] Failed to cancel scheduled notifications: {err}");
        }

        self.remote
            .delete_all(user_id)
            .await
            .map_err(|err| Self::step_error("remote_data", err))?;

        self.identity
            .delete_account(user_id)
            .await
            .map_err(|err| Self::step_error("remote_identity", err))?;

        self.local
            .clear_user_data()
            .await
            .map_err(|err| Self::step_error("local_storage", err))?;

        self.settings
            .clear()
            .await
            .map_err(|err| Self::step_error("settings", err))?;

        info!("[AccountTeardown] All account data removed");
        Ok(())
    }

    fn step_error(step: &'static str, err: Error) -> Error {
        let message = match &err {
            Error::Remote(remote) if remote.needs_reauth() => {
                format!("{err}. Re-authenticate and retry.")
            }
            _ => err.to_string(),
        };
        Error::AccountDeletion { step, message }
    }
}
