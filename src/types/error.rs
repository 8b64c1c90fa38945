//! Error types for the group ledger engine
//!
//! All failures surface through [`LedgerError`]. Variants carry enough
//! context to be actionable at the call site without further lookups.
//!
//! # Error Categories
//!
//! - **Identity**: no signed-in user; fatal to any mutating operation.
//! - **Lookup**: a referenced group/transaction/member/invite is absent;
//!   non-retriable, surfaced as a user-visible "not found" outcome.
//! - **Write**: an atomic batch failed; safe to retry immediately since the
//!   store guarantees no partial state was committed.
//! - **Validation**: invalid split input or amount; rejected before any
//!   write is attempted.
//! - **I/O and parsing**: CSV replay input problems.

use crate::types::group::{GroupId, InviteId, UserId};
use crate::types::transaction::TransactionId;
use thiserror::Error;

/// Main error type for the group ledger engine
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// No user identity is available
    ///
    /// Fatal to every mutating operation; callers should redirect to sign-in.
    #[error("no user is signed in")]
    NotSignedIn,

    /// The referenced group does not exist
    #[error("group {group} not found")]
    GroupNotFound {
        /// The missing group id
        group: GroupId,
    },

    /// The referenced transaction does not exist in the group
    ///
    /// Raised by the fetch-before-update step of transaction update/delete.
    #[error("transaction {tx} not found in group {group}")]
    TransactionNotFound {
        /// Group that was searched
        group: GroupId,
        /// The missing transaction id
        tx: TransactionId,
    },

    /// The referenced member does not exist in the group
    #[error("member {user} not found in group {group}")]
    MemberNotFound {
        /// Group that was searched
        group: GroupId,
        /// The missing member id
        user: UserId,
    },

    /// The invite is missing or has expired
    #[error("invite {invite} for group {group} is missing or expired")]
    InviteInvalid {
        /// Group the invite belonged to
        group: GroupId,
        /// The invalid invite id
        invite: InviteId,
    },

    /// The member exists but is not active
    ///
    /// Raised when promoting a departed member to owner; ownership must
    /// always reference an active member.
    #[error("member {user} in group {group} is not active")]
    MemberNotActive {
        /// Group the member belongs to
        group: GroupId,
        /// The inactive member id
        user: UserId,
    },

    /// An atomic batch write failed
    ///
    /// No partial state was committed, so the operation is safe to retry.
    #[error("write conflict: {message}")]
    WriteConflict {
        /// Description of the conflict from the store
        message: String,
    },

    /// A split calculator was given input it cannot divide
    ///
    /// Zero participants or zero total weight. Rejected before any write.
    #[error("invalid split: {reason}")]
    InvalidSplit {
        /// Why the split was rejected
        reason: String,
    },

    /// An amount string could not be parsed or does not fit in minor units
    #[error("invalid amount '{amount}'")]
    InvalidAmount {
        /// The offending amount text
        amount: String,
    },

    /// Balance arithmetic would overflow
    ///
    /// The operation is rejected to keep the zero-sum invariant intact.
    #[error("arithmetic overflow in {operation} for user {user}")]
    ArithmeticOverflow {
        /// Operation that would overflow
        operation: String,
        /// Member whose balance was being updated
        user: UserId,
    },

    /// CSV parsing error
    ///
    /// Recoverable during replay: the malformed record is skipped and
    /// processing continues with the next row.
    #[error("CSV parse error{}: {message}", line.map(|l| format!(" at line {}", l)).unwrap_or_default())]
    ParseError {
        /// Line number where the error occurred (if available)
        line: Option<u64>,
        /// Description of the parsing error
        message: String,
    },

    /// I/O error while reading or writing files
    #[error("I/O error: {message}")]
    IoError {
        /// Description of the I/O error
        message: String,
    },
}

impl From<std::io::Error> for LedgerError {
    fn from(error: std::io::Error) -> Self {
        LedgerError::IoError {
            message: error.to_string(),
        }
    }
}

impl From<csv::Error> for LedgerError {
    fn from(error: csv::Error) -> Self {
        if let csv::ErrorKind::Io(io_error) = error.kind() {
            return LedgerError::IoError {
                message: io_error.to_string(),
            };
        }

        let line = error.position().map(|pos| pos.line());
        LedgerError::ParseError {
            line,
            message: error.to_string(),
        }
    }
}

// Helper constructors for the variants built in more than one place

impl LedgerError {
    /// Create a GroupNotFound error
    pub fn group_not_found(group: &str) -> Self {
        LedgerError::GroupNotFound {
            group: group.to_string(),
        }
    }

    /// Create a TransactionNotFound error
    pub fn transaction_not_found(group: &str, tx: &str) -> Self {
        LedgerError::TransactionNotFound {
            group: group.to_string(),
            tx: tx.to_string(),
        }
    }

    /// Create a MemberNotFound error
    pub fn member_not_found(group: &str, user: &str) -> Self {
        LedgerError::MemberNotFound {
            group: group.to_string(),
            user: user.to_string(),
        }
    }

    /// Create an InviteInvalid error
    pub fn invite_invalid(group: &str, invite: &str) -> Self {
        LedgerError::InviteInvalid {
            group: group.to_string(),
            invite: invite.to_string(),
        }
    }

    /// Create a MemberNotActive error
    pub fn member_not_active(group: &str, user: &str) -> Self {
        LedgerError::MemberNotActive {
            group: group.to_string(),
            user: user.to_string(),
        }
    }

    /// Create a WriteConflict error
    pub fn write_conflict(message: impl Into<String>) -> Self {
        LedgerError::WriteConflict {
            message: message.into(),
        }
    }

    /// Create an InvalidSplit error
    pub fn invalid_split(reason: impl Into<String>) -> Self {
        LedgerError::InvalidSplit {
            reason: reason.into(),
        }
    }

    /// Create an InvalidAmount error
    pub fn invalid_amount(amount: &str) -> Self {
        LedgerError::InvalidAmount {
            amount: amount.to_string(),
        }
    }

    /// Create an ArithmeticOverflow error
    pub fn arithmetic_overflow(operation: &str, user: &str) -> Self {
        LedgerError::ArithmeticOverflow {
            operation: operation.to_string(),
            user: user.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::not_signed_in(LedgerError::NotSignedIn, "no user is signed in")]
    #[case::group_not_found(
        LedgerError::group_not_found("g1"),
        "group g1 not found"
    )]
    #[case::transaction_not_found(
        LedgerError::transaction_not_found("g1", "t9"),
        "transaction t9 not found in group g1"
    )]
    #[case::member_not_found(
        LedgerError::member_not_found("g1", "alice"),
        "member alice not found in group g1"
    )]
    #[case::invite_invalid(
        LedgerError::invite_invalid("g1", "i3"),
        "invite i3 for group g1 is missing or expired"
    )]
    #[case::member_not_active(
        LedgerError::member_not_active("g1", "bob"),
        "member bob in group g1 is not active"
    )]
    #[case::write_conflict(
        LedgerError::write_conflict("update on missing doc"),
        "write conflict: update on missing doc"
    )]
    #[case::invalid_split(
        LedgerError::invalid_split("no participants"),
        "invalid split: no participants"
    )]
    #[case::arithmetic_overflow(
        LedgerError::arithmetic_overflow("balance credit", "alice"),
        "arithmetic overflow in balance credit for user alice"
    )]
    #[case::parse_error_with_line(
        LedgerError::ParseError { line: Some(7), message: "bad field".to_string() },
        "CSV parse error at line 7: bad field"
    )]
    #[case::parse_error_without_line(
        LedgerError::ParseError { line: None, message: "bad field".to_string() },
        "CSV parse error: bad field"
    )]
    fn test_error_display(#[case] error: LedgerError, #[case] expected: &str) {
        assert_eq!(error.to_string(), expected);
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error =
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "Permission denied");
        let error: LedgerError = io_error.into();
        assert!(matches!(error, LedgerError::IoError { .. }));
        assert_eq!(error.to_string(), "I/O error: Permission denied");
    }
}
