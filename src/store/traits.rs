//! Persistence and identity boundary traits
//!
//! The ledger core never talks to a concrete database. It is written against
//! [`DocumentStore`], a document store with atomic multi-document batches,
//! server-side numeric increments and live subscriptions, and
//! [`IdentityProvider`], which yields the signed-in user.
//!
//! Balance mutations are expressed exclusively as [`Write::Increment`]
//! deltas. Increments commute, so concurrent transactions from different
//! clients racing on the same member's balance converge to the same sum in
//! any order; there is no client-side read-modify-write of balances.

use crate::types::error::LedgerError;
use crate::types::group::{Group, GroupId, GroupMember, Invite, InviteId, MemberStatus, UserId};
use crate::types::money::Amount;
use crate::types::transaction::{Transaction, TransactionId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Reference to a single document in the store
///
/// The path layout mirrors the stored data: groups at the top level, with
/// members, transactions and invites as per-group subcollections.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DocRef {
    /// `groups/{group}`
    Group(GroupId),
    /// `groups/{group}/users/{user}`
    Member(GroupId, UserId),
    /// `groups/{group}/transactions/{tx}`
    Transaction(GroupId, TransactionId),
    /// `groups/{group}/invites/{invite}`
    Invite(GroupId, InviteId),
}

impl DocRef {
    /// Canonical slash-separated path for this document
    pub fn path(&self) -> String {
        match self {
            DocRef::Group(group) => format!("groups/{group}"),
            DocRef::Member(group, user) => format!("groups/{group}/users/{user}"),
            DocRef::Transaction(group, tx) => format!("groups/{group}/transactions/{tx}"),
            DocRef::Invite(group, invite) => format!("groups/{group}/invites/{invite}"),
        }
    }

    /// The document id (last path segment)
    pub fn id(&self) -> &str {
        match self {
            DocRef::Group(group) => group,
            DocRef::Member(_, user) => user,
            DocRef::Transaction(_, tx) => tx,
            DocRef::Invite(_, invite) => invite,
        }
    }
}

/// Reference to a collection of documents
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CollectionRef {
    /// All groups
    Groups,
    /// Members of one group
    Members(GroupId),
    /// Transactions of one group
    Transactions(GroupId),
    /// Invites of one group
    Invites(GroupId),
}

impl CollectionRef {
    /// Path prefix shared by every document in this collection
    pub fn prefix(&self) -> String {
        match self {
            CollectionRef::Groups => "groups/".to_string(),
            CollectionRef::Members(group) => format!("groups/{group}/users/"),
            CollectionRef::Transactions(group) => format!("groups/{group}/transactions/"),
            CollectionRef::Invites(group) => format!("groups/{group}/invites/"),
        }
    }

    /// If `path` names a direct child of this collection, return its id
    ///
    /// Documents of nested subcollections do not match: `groups/g1/users/u1`
    /// is not a child of the `Groups` collection.
    pub fn child_id<'a>(&self, path: &'a str) -> Option<&'a str> {
        let rest = path.strip_prefix(&self.prefix())?;
        (!rest.is_empty() && !rest.contains('/')).then_some(rest)
    }

    /// Build a [`DocRef`] for a child of this collection
    pub fn doc(&self, id: &str) -> DocRef {
        match self {
            CollectionRef::Groups => DocRef::Group(id.to_string()),
            CollectionRef::Members(group) => DocRef::Member(group.clone(), id.to_string()),
            CollectionRef::Transactions(group) => {
                DocRef::Transaction(group.clone(), id.to_string())
            }
            CollectionRef::Invites(group) => DocRef::Invite(group.clone(), id.to_string()),
        }
    }
}

/// A typed document snapshot
#[derive(Debug, Clone, PartialEq)]
pub enum Document {
    /// A group document
    Group(Group),
    /// A member document
    Member(GroupMember),
    /// A transaction document
    Transaction(Transaction),
    /// An invite document
    Invite(Invite),
}

impl Document {
    /// Borrow as a group document, if it is one
    pub fn as_group(&self) -> Option<&Group> {
        match self {
            Document::Group(group) => Some(group),
            _ => None,
        }
    }

    /// Borrow as a member document, if it is one
    pub fn as_member(&self) -> Option<&GroupMember> {
        match self {
            Document::Member(member) => Some(member),
            _ => None,
        }
    }

    /// Borrow as a transaction document, if it is one
    pub fn as_transaction(&self) -> Option<&Transaction> {
        match self {
            Document::Transaction(tx) => Some(tx),
            _ => None,
        }
    }

    /// Borrow as an invite document, if it is one
    pub fn as_invite(&self) -> Option<&Invite> {
        match self {
            Document::Invite(invite) => Some(invite),
            _ => None,
        }
    }
}

/// Partial update applied to an existing document
///
/// Only the fields the ledger actually patches are representable; everything
/// else is written with a full [`Write::Set`].
#[derive(Debug, Clone, PartialEq)]
pub enum Patch {
    /// Change a member's lifecycle status
    MemberStatus(MemberStatus),
    /// Change a member's display name
    MemberDisplayName(String),
    /// Touch a member's last-update time
    MemberLastUpdate(DateTime<Utc>),
    /// Change the group owner
    GroupOwner(UserId),
    /// Touch the group's last-update time
    GroupLastUpdate(DateTime<Utc>),
    /// Change the group's name and description
    GroupProfile {
        /// New group name
        name: String,
        /// New group description
        description: Option<String>,
    },
}

/// Numeric fields addressable by [`Write::Increment`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumericField {
    /// A member's net balance in minor units
    Balance,
}

/// One operation inside an atomic batch
#[derive(Debug, Clone, PartialEq)]
pub enum Write {
    /// Create or fully overwrite a document
    Set {
        /// Target document
        doc: DocRef,
        /// New document contents
        data: Document,
    },
    /// Patch fields of an existing document; fails if the document is absent
    Update {
        /// Target document
        doc: DocRef,
        /// Fields to change
        patch: Patch,
    },
    /// Delete a document; deleting an absent document is a no-op
    Delete {
        /// Target document
        doc: DocRef,
    },
    /// Add a signed delta to a numeric field of an existing document
    ///
    /// The store applies the delta server-side; deltas from concurrent
    /// batches commute.
    Increment {
        /// Target document
        doc: DocRef,
        /// Field to adjust
        field: NumericField,
        /// Signed delta in minor units
        delta: Amount,
    },
}

/// A single change delivered to a subscription callback
#[derive(Debug, Clone, PartialEq)]
pub enum DocChange {
    /// A document the listener had not seen before
    Added {
        /// Document id within its collection
        id: String,
        /// Document contents after the change
        data: Document,
    },
    /// An existing document changed
    Modified {
        /// Document id within its collection
        id: String,
        /// Document contents after the change
        data: Document,
    },
    /// A document was deleted
    Removed {
        /// Document id within its collection
        id: String,
    },
}

/// What a subscription observes
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SubscribeTarget {
    /// One document
    Doc(DocRef),
    /// Every document of a collection
    Collection(CollectionRef),
}

/// Callback invoked with each batch of changes for a subscription
///
/// The first invocation happens before `subscribe` returns and carries the
/// current snapshot as `Added` changes. Callbacks must not call back into
/// the store.
pub type ChangeCallback = Box<dyn Fn(&[DocChange]) + Send + Sync>;

/// Live-subscription handle
///
/// Dropping the handle unsubscribes the listener. Callers tearing down a
/// view must drop (or explicitly [`unsubscribe`](Self::unsubscribe)) every
/// handle they hold, otherwise the listener leaks and keeps firing.
pub struct ListenerHandle {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl ListenerHandle {
    /// Wrap a cancellation closure into a handle
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        ListenerHandle {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Explicitly cancel the subscription
    pub fn unsubscribe(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl std::fmt::Debug for ListenerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerHandle")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

/// Errors surfaced by the document store
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The batch could not be applied; nothing was committed
    #[error("write conflict: {message}")]
    Conflict {
        /// Which write failed and why
        message: String,
    },

    /// A numeric increment would overflow the stored value
    #[error("numeric overflow on {doc}")]
    Overflow {
        /// Path of the document whose field would overflow
        doc: String,
    },
}

impl StoreError {
    /// Create a Conflict error
    pub fn conflict(message: impl Into<String>) -> Self {
        StoreError::Conflict {
            message: message.into(),
        }
    }
}

impl From<StoreError> for LedgerError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::Conflict { message } => LedgerError::WriteConflict { message },
            StoreError::Overflow { doc } => LedgerError::arithmetic_overflow("increment", &doc),
        }
    }
}

/// Persistent document store with atomic batches and live subscriptions
///
/// Implementations must guarantee that [`commit`](Self::commit) is
/// all-or-nothing: either every write in the batch is applied or none is.
/// The ledger relies on this to keep the zero-sum balance invariant across
/// partial failures.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Mint a fresh document id, unique within this store
    fn new_doc_id(&self) -> String;

    /// Apply a batch of writes atomically
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if any write cannot be applied; in that case
    /// no write in the batch has taken effect.
    async fn commit(&self, batch: Vec<Write>) -> Result<(), StoreError>;

    /// Fetch a single document
    async fn get(&self, doc: &DocRef) -> Result<Option<Document>, StoreError>;

    /// Fetch every document of a collection, ordered by document id
    async fn list(&self, collection: &CollectionRef)
        -> Result<Vec<(String, Document)>, StoreError>;

    /// Register a live listener
    ///
    /// The callback receives the current snapshot (as `Added` changes)
    /// before this method returns, then one invocation per committed batch
    /// that touches the target. No ordering guarantee is made between
    /// listeners of different targets.
    fn subscribe(&self, target: SubscribeTarget, on_change: ChangeCallback) -> ListenerHandle;
}

/// Profile of the signed-in user, as reported by the identity provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserProfile {
    /// Stable user id
    pub user_id: UserId,
    /// Display name for new memberships
    pub display_name: String,
    /// Avatar URL, if any
    pub photo_url: Option<String>,
}

/// External identity provider
pub trait IdentityProvider: Send + Sync {
    /// The currently signed-in user
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::NotSignedIn`] when no identity is available.
    fn current_user(&self) -> Result<UserProfile, LedgerError>;
}
