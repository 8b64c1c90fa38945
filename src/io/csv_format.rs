//! CSV format handling for the replay pipeline
//!
//! This module centralizes all CSV format concerns, providing:
//! - CsvRecord structure for deserialization
//! - Conversion from CSV records to transactions
//! - Balance and settlement output serialization
//!
//! All functions are pure (no I/O beyond the passed writer) for easy testing.

use crate::core::netting::Settlement;
use crate::types::error::LedgerError;
use crate::types::group::{GroupMember, MemberStatus};
use crate::types::money::{parse_amount, to_display, Amount, Currency};
use crate::types::transaction::{Transaction, TransactionCategory};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::io::Write;

/// CSV record structure for deserialization
///
/// Matches the input CSV format with columns: title, category, from, to,
/// date. The `to` column encodes the beneficiary map as
/// `user:amount;user:amount` with display amounts (e.g. `bob:5.00`). The
/// date column is optional RFC 3339; an empty value means "now".
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct CsvRecord {
    pub title: String,
    pub category: String,
    pub from: String,
    pub to: String,
    pub date: Option<String>,
}

/// Convert a CsvRecord to a Transaction
///
/// Amounts in the `to` column are parsed as display values of the given
/// currency and converted to minor units.
///
/// # Errors
///
/// Returns [`LedgerError::ParseError`] for an unknown category, a malformed
/// `to` column or a malformed date, and [`LedgerError::InvalidAmount`] for
/// an unparseable amount.
pub fn convert_csv_record(
    record: CsvRecord,
    currency: Currency,
) -> Result<Transaction, LedgerError> {
    let category = parse_category(&record.category)?;
    let to = parse_to_column(&record.to, currency)?;

    let date = match record.date.as_deref().map(str::trim) {
        Some(raw) if !raw.is_empty() => DateTime::parse_from_rfc3339(raw)
            .map(|date| date.with_timezone(&Utc))
            .map_err(|e| LedgerError::ParseError {
                line: None,
                message: format!("invalid date '{raw}': {e}"),
            })?,
        _ => Utc::now(),
    };

    Ok(Transaction {
        title: record.title,
        category,
        from: record.from,
        to,
        date,
    })
}

fn parse_category(raw: &str) -> Result<TransactionCategory, LedgerError> {
    match raw.trim().to_lowercase().as_str() {
        "expense" => Ok(TransactionCategory::Expense),
        "food" => Ok(TransactionCategory::Food),
        "transport" => Ok(TransactionCategory::Transport),
        "fuel" => Ok(TransactionCategory::Fuel),
        "event" => Ok(TransactionCategory::Event),
        "bill" => Ok(TransactionCategory::Bill),
        "payment" => Ok(TransactionCategory::Payment),
        other => Err(LedgerError::ParseError {
            line: None,
            message: format!("invalid category '{other}'"),
        }),
    }
}

fn parse_to_column(
    raw: &str,
    currency: Currency,
) -> Result<BTreeMap<String, Amount>, LedgerError> {
    let mut to = BTreeMap::new();

    for part in raw.split(';').map(str::trim).filter(|part| !part.is_empty()) {
        let (user, amount) = part.split_once(':').ok_or_else(|| LedgerError::ParseError {
            line: None,
            message: format!("invalid beneficiary entry '{part}', expected user:amount"),
        })?;
        to.insert(user.trim().to_string(), parse_amount(amount, currency)?);
    }

    if to.is_empty() {
        return Err(LedgerError::ParseError {
            line: None,
            message: "transaction requires at least one beneficiary".to_string(),
        });
    }
    Ok(to)
}

fn status_label(status: MemberStatus) -> &'static str {
    match status {
        MemberStatus::Active => "active",
        MemberStatus::Left => "left",
        MemberStatus::History => "history",
    }
}

/// Write member balances to CSV format
///
/// Columns: user, name, status, balance, formatted. Members arrive already
/// sorted by user id, which keeps output deterministic.
///
/// # Errors
///
/// Returns [`LedgerError::IoError`] if a write fails.
pub fn write_balances_csv(
    members: &[GroupMember],
    currency: Currency,
    output: &mut dyn Write,
) -> Result<(), LedgerError> {
    let mut writer = csv::Writer::from_writer(output);

    writer.write_record(["user", "name", "status", "balance", "formatted"])?;

    for member in members {
        writer.write_record(&[
            member.user_id.clone(),
            member.display_name.clone(),
            status_label(member.status).to_string(),
            member.balance.to_string(),
            to_display(member.balance, currency),
        ])?;
    }

    writer.flush()?;
    Ok(())
}

/// Write settling payments to CSV format
///
/// Columns: from, to, amount, formatted.
///
/// # Errors
///
/// Returns [`LedgerError::IoError`] if a write fails.
pub fn write_settlements_csv(
    settlements: &[Settlement],
    currency: Currency,
    output: &mut dyn Write,
) -> Result<(), LedgerError> {
    let mut writer = csv::Writer::from_writer(output);

    writer.write_record(["from", "to", "amount", "formatted"])?;

    for settlement in settlements {
        writer.write_record(&[
            settlement.from.clone(),
            settlement.to.clone(),
            settlement.amount.to_string(),
            to_display(settlement.amount, currency),
        ])?;
    }

    writer.flush()?;
    Ok(())
}
