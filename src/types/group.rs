//! Group, membership and invite types
//!
//! These structs are the persisted document shapes. Field names on the wire
//! are fixed by the serde renames so that any store speaking this format
//! stays compatible with existing data.

use crate::types::money::{Amount, Currency};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Stable user identifier issued by the identity provider
pub type UserId = String;

/// Group document identifier
pub type GroupId = String;

/// Invite document identifier (doubles as the invite code)
pub type InviteId = String;

/// Membership lifecycle status
///
/// Transitions: `active` to `left` and back, `left` to `history`, and
/// `active` to `history` directly when a member departs with a zero balance.
/// No transition leaves `history`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberStatus {
    /// Currently a participant
    Active,
    /// Departed but still holding a non-zero balance; must settle before
    /// becoming `history`
    Left,
    /// Departed with a zero balance, kept for record display only
    History,
}

/// Per-group member record
///
/// `balance` is a signed amount in minor units. The sum of all members'
/// balances in a group is exactly zero after every committed write; the
/// ledger is the sole writer of `balance`, `status` and `last_update`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupMember {
    /// The member's user id
    pub user_id: UserId,

    /// Name shown in the group
    pub display_name: String,

    /// Avatar URL, if the identity provider supplied one
    pub photo_url: Option<String>,

    /// Membership lifecycle status
    pub status: MemberStatus,

    /// Net balance in minor units; positive means the group owes this member
    pub balance: Amount,

    /// When this member last wrote to the group
    pub last_update: DateTime<Utc>,
}

impl GroupMember {
    /// Create a freshly joined member: zero balance, active status
    pub fn new(user_id: UserId, display_name: String, photo_url: Option<String>) -> Self {
        GroupMember {
            user_id,
            display_name,
            photo_url,
            status: MemberStatus::Active,
            balance: 0,
            last_update: Utc::now(),
        }
    }
}

/// Group document
///
/// `owner_id` must always reference a currently active member; ownership
/// transfers automatically when the owner leaves and at least one other
/// active member exists, otherwise the group is deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    /// Group display name
    pub name: String,

    /// Optional free-text description
    pub description: Option<String>,

    /// Ledger currency, fixed at creation
    pub currency: Currency,

    /// User id of the current owner
    pub owner_id: UserId,

    /// When the group last changed
    pub last_update: DateTime<Utc>,
}

/// Ephemeral group invite
///
/// Not part of the ledger; expired invites are garbage-collected lazily the
/// next time someone creates an invite for the group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invite {
    /// Instant after which the invite can no longer be accepted
    pub expiry: DateTime<Utc>,
}

impl Invite {
    /// Create an invite valid for the given duration from now
    pub fn expiring_in(ttl: Duration) -> Self {
        Invite {
            expiry: Utc::now() + ttl,
        }
    }

    /// Whether the invite had expired at `now`
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiry < now
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_member_starts_active_with_zero_balance() {
        let member = GroupMember::new("alice".to_string(), "Alice".to_string(), None);

        assert_eq!(member.user_id, "alice");
        assert_eq!(member.status, MemberStatus::Active);
        assert_eq!(member.balance, 0);
        assert_eq!(member.photo_url, None);
    }

    #[test]
    fn test_invite_expiry_window() {
        let invite = Invite::expiring_in(Duration::days(3));

        assert!(!invite.is_expired(Utc::now()));
        assert!(invite.is_expired(Utc::now() + Duration::days(4)));
    }

    #[test]
    fn test_member_wire_field_names() {
        let member = GroupMember::new(
            "alice".to_string(),
            "Alice".to_string(),
            Some("https://example.com/a.png".to_string()),
        );

        let json = serde_json::to_value(&member).unwrap();
        let object = json.as_object().unwrap();
        for field in [
            "userId",
            "displayName",
            "photoUrl",
            "status",
            "balance",
            "lastUpdate",
        ] {
            assert!(object.contains_key(field), "missing wire field {field}");
        }
        assert_eq!(json["status"], "active");
        assert_eq!(json["balance"], 0);
    }

    #[test]
    fn test_group_wire_field_names() {
        let group = Group {
            name: "Trip".to_string(),
            description: None,
            currency: Currency::Gbp,
            owner_id: "alice".to_string(),
            last_update: Utc::now(),
        };

        let json = serde_json::to_value(&group).unwrap();
        let object = json.as_object().unwrap();
        for field in ["name", "description", "currency", "ownerId", "lastUpdate"] {
            assert!(object.contains_key(field), "missing wire field {field}");
        }
        assert_eq!(json["currency"], "gbp");
    }

    #[test]
    fn test_status_round_trips_through_wire_form() {
        for (status, wire) in [
            (MemberStatus::Active, "\"active\""),
            (MemberStatus::Left, "\"left\""),
            (MemberStatus::History, "\"history\""),
        ] {
            assert_eq!(serde_json::to_string(&status).unwrap(), wire);
            assert_eq!(serde_json::from_str::<MemberStatus>(wire).unwrap(), status);
        }
    }
}
