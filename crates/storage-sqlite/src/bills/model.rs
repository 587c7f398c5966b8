//! Database models for bill rows and sync bookkeeping tables.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use billfolio_core::bills::Bill;
use billfolio_core::errors::Result;
use billfolio_core::sync::RetryQueueEntry;

use crate::errors::StorageError;

/// Persist an enum through its serde snake_case code.
pub(crate) fn enum_to_db<T: serde::Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string(value)?.trim_matches('"').to_string())
}

pub(crate) fn enum_from_db<T: serde::de::DeserializeOwned>(value: &str) -> Result<T> {
    Ok(serde_json::from_str(&format!("\"{}\"", value))?)
}

fn parse_timestamp(value: &str, column: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StorageError::CorruptRow(format!("{column}: {e}")).into())
}

fn parse_clock_component(value: i32, column: &str) -> Result<u32> {
    u32::try_from(value)
        .map_err(|_| StorageError::CorruptRow(format!("{column}: {value}")).into())
}

#[derive(
    Queryable,
    Identifiable,
    Insertable,
    AsChangeset,
    Selectable,
    Debug,
    Clone,
    Serialize,
    Deserialize,
)]
#[diesel(table_name = crate::schema::bills)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct BillDB {
    pub id: String,
    pub name: String,
    pub amount: String,
    pub currency: String,
    pub due_date: String,
    pub repeat_mode: String,
    pub paid: i32,
    pub reminder_preference: String,
    pub reminder_hour: i32,
    pub reminder_minute: i32,
    pub sync_status: String,
    pub version: i64,
    pub last_modified: String,
    pub updated_at: String,
}

impl BillDB {
    pub fn from_domain(bill: &Bill) -> Result<Self> {
        Ok(Self {
            id: bill.id.clone(),
            name: bill.name.clone(),
            amount: bill.amount.to_string(),
            currency: bill.currency.clone(),
            due_date: bill.due_date.to_rfc3339(),
            repeat_mode: enum_to_db(&bill.repeat_mode)?,
            paid: i32::from(bill.paid),
            reminder_preference: enum_to_db(&bill.reminder_preference)?,
            reminder_hour: bill.reminder_hour as i32,
            reminder_minute: bill.reminder_minute as i32,
            sync_status: enum_to_db(&bill.sync_status)?,
            version: bill.version,
            last_modified: bill.last_modified.to_rfc3339(),
            updated_at: bill.updated_at.to_rfc3339(),
        })
    }

    pub fn into_domain(self) -> Result<Bill> {
        Ok(Bill {
            amount: Decimal::from_str(&self.amount)
                .map_err(|e| StorageError::CorruptRow(format!("amount: {e}")))?,
            due_date: parse_timestamp(&self.due_date, "due_date")?,
            repeat_mode: enum_from_db(&self.repeat_mode)?,
            paid: self.paid != 0,
            reminder_preference: enum_from_db(&self.reminder_preference)?,
            reminder_hour: parse_clock_component(self.reminder_hour, "reminder_hour")?,
            reminder_minute: parse_clock_component(self.reminder_minute, "reminder_minute")?,
            sync_status: enum_from_db(&self.sync_status)?,
            version: self.version,
            last_modified: parse_timestamp(&self.last_modified, "last_modified")?,
            updated_at: parse_timestamp(&self.updated_at, "updated_at")?,
            id: self.id,
            name: self.name,
            currency: self.currency,
        })
    }
}

#[derive(
    Queryable,
    Identifiable,
    Insertable,
    AsChangeset,
    Selectable,
    Debug,
    Clone,
    Serialize,
    Deserialize,
)]
#[diesel(table_name = crate::schema::sync_checkpoint)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct SyncCheckpointDB {
    pub id: i32,
    pub last_sync_at: Option<String>,
    pub updated_at: String,
}

#[derive(
    Queryable,
    Identifiable,
    Insertable,
    AsChangeset,
    Selectable,
    Debug,
    Clone,
    Serialize,
    Deserialize,
)]
#[diesel(primary_key(bill_id))]
#[diesel(table_name = crate::schema::sync_retry_queue)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct RetryQueueEntryDB {
    pub bill_id: String,
    pub action: String,
    pub attempts: i32,
    pub last_error: Option<String>,
    pub last_attempt_at: String,
}

impl RetryQueueEntryDB {
    pub fn into_domain(self) -> Result<RetryQueueEntry> {
        Ok(RetryQueueEntry {
            action: enum_from_db(&self.action)?,
            attempts: self.attempts,
            last_attempt_at: parse_timestamp(&self.last_attempt_at, "last_attempt_at")?,
            bill_id: self.bill_id,
            last_error: self.last_error,
        })
    }
}
