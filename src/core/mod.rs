//! Core ledger logic module
//!
//! This module contains the ledger components:
//! - `balance` - Balance delta arithmetic and member status rules
//! - `netting` - Greedy debt netting ("settle up")
//! - `split` - Even and ratio split calculators
//! - `service` - Transaction and membership operations over a document store

pub mod balance;
pub mod netting;
pub mod service;
pub mod split;

pub use balance::{inverse_deltas, left_status, net_balances, transaction_deltas};
pub use netting::{resolve_group_debts, Settlement};
pub use service::LedgerService;
pub use split::{split_by_ratio, split_even};
