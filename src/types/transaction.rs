//! Transaction types for the group ledger engine
//!
//! A transaction is the ground truth of who owes what to whom for one event.
//! There is no separate "total" field: the `to` map fully describes the
//! effect on balances.

use crate::types::group::UserId;
use crate::types::money::Amount;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Transaction document identifier
pub type TransactionId = String;

/// Category tag for a transaction, used for display grouping only
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionCategory {
    /// Generic expense
    Expense,
    /// Food and drink
    Food,
    /// Public transport, taxis
    Transport,
    /// Fuel
    Fuel,
    /// Tickets and events
    Event,
    /// Recurring bills
    Bill,
    /// A direct settling payment between members
    Payment,
}

/// Persisted transaction record
///
/// `from` is the single payer. `to` maps each beneficiary to the amount in
/// minor units they owe the payer for this event. An entry keyed by the payer
/// itself contributes nothing to any balance.
///
/// `to` is a `BTreeMap` so that iteration order is stable; everything
/// downstream that walks the map (delta computation, netting input, CSV
/// output) inherits that determinism.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Short human-readable label
    pub title: String,

    /// Display category
    pub category: TransactionCategory,

    /// The user who paid
    pub from: UserId,

    /// Amount owed to the payer, per beneficiary, in minor units
    pub to: BTreeMap<UserId, Amount>,

    /// When the event happened
    pub date: DateTime<Utc>,
}

impl Transaction {
    /// Sum of all amounts owed by beneficiaries other than the payer
    ///
    /// This is the net credit the payer gains when the transaction is
    /// applied. Returns `None` on overflow.
    pub fn credit_to_payer(&self) -> Option<Amount> {
        self.to
            .iter()
            .filter(|(user, _)| **user != self.from)
            .try_fold(0_i64, |acc, (_, amount)| acc.checked_add(*amount))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transaction(from: &str, to: &[(&str, Amount)]) -> Transaction {
        Transaction {
            title: "Dinner".to_string(),
            category: TransactionCategory::Food,
            from: from.to_string(),
            to: to
                .iter()
                .map(|(user, amount)| (user.to_string(), *amount))
                .collect(),
            date: Utc::now(),
        }
    }

    #[test]
    fn test_credit_to_payer_sums_other_entries() {
        let tx = transaction("a", &[("b", 500), ("c", 300)]);
        assert_eq!(tx.credit_to_payer(), Some(800));
    }

    #[test]
    fn test_credit_to_payer_ignores_self_entry() {
        let tx = transaction("a", &[("a", 400), ("b", 500)]);
        assert_eq!(tx.credit_to_payer(), Some(500));
    }

    #[test]
    fn test_credit_to_payer_detects_overflow() {
        let tx = transaction("a", &[("b", i64::MAX), ("c", 1)]);
        assert_eq!(tx.credit_to_payer(), None);
    }

    #[test]
    fn test_wire_field_names() {
        let tx = transaction("a", &[("b", 500)]);
        let json = serde_json::to_value(&tx).unwrap();
        let object = json.as_object().unwrap();
        for field in ["title", "category", "from", "to", "date"] {
            assert!(object.contains_key(field), "missing wire field {field}");
        }
        assert_eq!(json["category"], "food");
        assert_eq!(json["to"]["b"], 500);
    }
}
