//! Pure mapping tables from domain enums to user-facing strings, plus the
//! notification text builders. Kept out of the data model so the core types
//! carry no UI-string coupling.

use super::{Bill, BillStatus, ReminderPreference, RepeatMode};

pub fn repeat_mode_label(mode: RepeatMode) -> &'static str {
    match mode {
        RepeatMode::OneTime => "One-time",
        RepeatMode::Monthly => "Monthly",
    }
}

pub fn reminder_preference_label(preference: ReminderPreference) -> &'static str {
    match preference {
        ReminderPreference::None => "No reminder",
        ReminderPreference::OneDayBefore => "1 day before",
        ReminderPreference::SameDay => "On the due day",
    }
}

pub fn bill_status_label(status: BillStatus) -> &'static str {
    match status {
        BillStatus::Paid => "Paid",
        BillStatus::Overdue => "Overdue",
        BillStatus::Upcoming => "Upcoming",
    }
}

/// Title for a due-date notification.
pub fn notification_title(bill: &Bill) -> String {
    format!("Bill due: {}", bill.name)
}

/// Body for a due-date notification. `timing` is the humanized lead time
/// produced by the reminder engine (e.g. "In 1 day").
pub fn notification_body(bill: &Bill, timing: &str) -> String {
    format!("{} {} is due. {}.", bill.amount, bill.currency, timing)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;

    #[test]
    fn labels_cover_every_variant() {
        assert_eq!(repeat_mode_label(RepeatMode::Monthly), "Monthly");
        assert_eq!(
            reminder_preference_label(ReminderPreference::OneDayBefore),
            "1 day before"
        );
        assert_eq!(bill_status_label(BillStatus::Overdue), "Overdue");
    }

    #[test]
    fn notification_text_includes_amount_and_timing() {
        let bill = Bill::new(
            "Internet",
            dec!(49.99),
            "USD",
            Utc.with_ymd_and_hms(2024, 12, 24, 0, 0, 0).unwrap(),
            RepeatMode::Monthly,
        );
        assert_eq!(notification_title(&bill), "Bill due: Internet");
        assert_eq!(
            notification_body(&bill, "In 1 day"),
            "49.99 USD is due. In 1 day."
        );
    }
}
