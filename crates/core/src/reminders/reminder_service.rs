//! Arms platform alarms from reminder-engine output.

use std::sync::Arc;

use chrono::Utc;
use log::debug;

use crate::bills::display::{notification_body, notification_title};
use crate::bills::{Bill, ReminderPreference};
use crate::errors::Result;
use crate::sync::NotificationScheduler;

use super::reminder_engine::{describe_lead_time, ReminderEngine};

/// Keeps at most one pending platform alarm per bill.
pub struct ReminderService {
    engine: ReminderEngine,
    notifications: Arc<dyn NotificationScheduler>,
}

impl ReminderService {
    pub fn new(engine: ReminderEngine, notifications: Arc<dyn NotificationScheduler>) -> Self {
        Self {
            engine,
            notifications,
        }
    }

    /// Re-arm the reminder for a bill. Any existing alarm for the same bill
    /// id is cancelled first; a new one is scheduled only when the bill is
    /// unpaid and has a reminder preference set.
    pub async fn refresh_reminder(&self, bill: &Bill) -> Result<()> {
        self.notifications.cancel(&bill.id).await?;

        if bill.paid || bill.reminder_preference == ReminderPreference::None {
            return Ok(());
        }

        let now = Utc::now();
        let Some(fire_at) = self.engine.notification_time_with_fallback(
            bill.due_date,
            bill.reminder_preference,
            bill.reminder_hour,
            bill.reminder_minute,
            bill.updated_at,
            now,
        ) else {
            return Ok(());
        };

        let timing = describe_lead_time(fire_at, now);
        debug!("[Reminders] Scheduling reminder for {} at {fire_at}", bill.id);
        self.notifications
            .schedule(
                &bill.id,
                fire_at,
                &notification_title(bill),
                &notification_body(bill, &timing),
            )
            .await
    }

    /// Drop any pending alarm for a bill (e.g. on delete or pay).
    pub async fn cancel_reminder(&self, bill_id: &str) -> Result<()> {
        self.notifications.cancel(bill_id).await
    }
}
