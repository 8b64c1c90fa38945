//! Types module
//!
//! Contains core data structures used throughout the application.
//! This module organizes types into logical submodules:
//! - `money`: Currency table, minor-unit amounts, display conversion
//! - `group`: Group, member and invite document shapes
//! - `transaction`: Transaction document shape and identifiers
//! - `error`: Error types for the ledger engine

pub mod error;
pub mod group;
pub mod money;
pub mod transaction;

pub use error::LedgerError;
pub use group::{Group, GroupId, GroupMember, Invite, InviteId, MemberStatus, UserId};
pub use money::{Amount, Currency, CurrencyInfo};
pub use transaction::{Transaction, TransactionCategory, TransactionId};
