//! Diesel table definitions for the per-user bill database.

diesel::table! {
    bills (id) {
        id -> Text,
        name -> Text,
        amount -> Text,
        currency -> Text,
        due_date -> Text,
        repeat_mode -> Text,
        paid -> Integer,
        reminder_preference -> Text,
        reminder_hour -> Integer,
        reminder_minute -> Integer,
        sync_status -> Text,
        version -> BigInt,
        last_modified -> Text,
        updated_at -> Text,
    }
}

diesel::table! {
    sync_checkpoint (id) {
        id -> Integer,
        last_sync_at -> Nullable<Text>,
        updated_at -> Text,
    }
}

diesel::table! {
    sync_retry_queue (bill_id) {
        bill_id -> Text,
        action -> Text,
        attempts -> Integer,
        last_error -> Nullable<Text>,
        last_attempt_at -> Text,
    }
}

diesel::allow_tables_to_appear_in_same_query!(bills, sync_checkpoint, sync_retry_queue);
