//! Group Ledger Engine Library
//! # Overview
//!
//! This library implements a zero-sum group expense ledger: members of a
//! shared group record transactions, the ledger tracks each member's net
//! balance, and a netting engine reduces the balances to a short list of
//! settling payments.
//!
//! # Architecture
//!
//! The system is organized into several key components:
//!
//! - [`types`] - Core data types (Money/Currency, Group, Transaction, etc.)
//! - [`cli`] - CLI arguments parsing
//! - [`core`] - Business logic components:
//!   - [`core::balance`] - Balance delta arithmetic and member status rules
//!   - [`core::netting`] - Greedy debt netting ("settle up")
//!   - [`core::split`] - Even and ratio split calculators
//!   - [`core::service`] - Transaction and membership operations
//! - [`store`] - Persistence boundary (atomic batches, subscriptions) with
//!   an in-memory reference implementation
//! - [`live`] - Live group views over store subscriptions
//! - [`io`] - CSV parsing and report output for the replay CLI
//! - [`replay`] - The replay pipeline behind the CLI binary
//!
//! # Ledger Model
//!
//! All arithmetic runs on integer minor units. A transaction names a single
//! payer and a map of beneficiaries; applying it credits the payer and
//! debits the beneficiaries by the same total, so group balances always sum
//! to zero. Applying a transaction with negated amounts exactly reverses it,
//! which is how updates (reverse old, apply new) and deletes (reverse only)
//! work.
//!
//! # Membership Lifecycle
//!
//! Members are `active` while participating, `left` once departed with an
//! outstanding balance, and `history` once departed and settled. Departed
//! members' statuses are re-derived from their balance after every
//! transaction that touches them.

// Module declarations
pub mod cli;
pub mod core;
pub mod io;
pub mod live;
pub mod replay;
pub mod store;
pub mod types;

pub use crate::core::{
    left_status, resolve_group_debts, split_by_ratio, split_even, LedgerService, Settlement,
};
pub use live::{GroupView, GroupViewCache};
pub use store::{DocumentStore, IdentityProvider, MemoryStore, StaticIdentity};
pub use types::money::{parse_amount, to_display, to_minor_units};
pub use types::{
    Amount, Currency, Group, GroupMember, LedgerError, MemberStatus, Transaction,
    TransactionCategory, UserId,
};
