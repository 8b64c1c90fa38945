//! In-memory document store
//!
//! `MemoryStore` is the reference implementation of [`DocumentStore`], used
//! by the test suite and the replay CLI. It provides the same guarantees the
//! ledger expects from a production store:
//!
//! - **Atomic batches**: every write in a batch is validated against a
//!   staged copy before anything becomes visible, so a failing batch leaves
//!   no trace.
//! - **Commutative increments**: balance deltas are applied to the stored
//!   value under the commit lock, never read-modify-written by callers.
//! - **Live subscriptions**: listeners receive the current snapshot during
//!   `subscribe` and a change list after each committed batch.
//!
//! Documents live in a `DashMap` keyed by canonical path. A single commit
//! lock serializes batch application and listener notification; subscription
//! callbacks therefore must not call back into the store.

use crate::store::traits::{
    ChangeCallback, CollectionRef, DocChange, DocRef, Document, DocumentStore, IdentityProvider,
    ListenerHandle, NumericField, Patch, StoreError, SubscribeTarget, UserProfile, Write,
};
use crate::types::error::LedgerError;
use crate::types::group::UserId;
use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

struct Listener {
    id: u64,
    target: SubscribeTarget,
    callback: Arc<ChangeCallback>,
}

/// In-memory [`DocumentStore`] with atomic batches and live listeners
pub struct MemoryStore {
    documents: DashMap<String, Document>,
    listeners: Arc<Mutex<Vec<Listener>>>,
    next_listener_id: AtomicU64,
    next_doc_id: AtomicU64,
    commit_lock: Mutex<()>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        MemoryStore {
            documents: DashMap::new(),
            listeners: Arc::new(Mutex::new(Vec::new())),
            next_listener_id: AtomicU64::new(0),
            next_doc_id: AtomicU64::new(0),
            commit_lock: Mutex::new(()),
        }
    }

    /// Number of documents currently stored
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// Whether the store holds no documents
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Number of live listeners, for leak checks
    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }

    fn staged_value(
        &self,
        overlay: &HashMap<String, Option<Document>>,
        path: &str,
    ) -> Option<Document> {
        match overlay.get(path) {
            Some(value) => value.clone(),
            None => self.documents.get(path).map(|entry| entry.value().clone()),
        }
    }

    /// Validate and stage a batch without touching stored state
    fn stage(&self, batch: &[Write]) -> Result<HashMap<String, Option<Document>>, StoreError> {
        let mut overlay: HashMap<String, Option<Document>> = HashMap::new();

        for write in batch {
            match write {
                Write::Set { doc, data } => {
                    let path = doc.path();
                    if !kind_matches(doc, data) {
                        return Err(StoreError::conflict(format!(
                            "document kind does not match reference at {path}"
                        )));
                    }
                    overlay.insert(path, Some(data.clone()));
                }
                Write::Update { doc, patch } => {
                    let path = doc.path();
                    let mut data = self.staged_value(&overlay, &path).ok_or_else(|| {
                        StoreError::conflict(format!("update on missing document {path}"))
                    })?;
                    apply_patch(&mut data, patch, &path)?;
                    overlay.insert(path, Some(data));
                }
                Write::Delete { doc } => {
                    overlay.insert(doc.path(), None);
                }
                Write::Increment { doc, field, delta } => {
                    let path = doc.path();
                    let data = self.staged_value(&overlay, &path).ok_or_else(|| {
                        StoreError::conflict(format!("increment on missing document {path}"))
                    })?;
                    let incremented = apply_increment(data, *field, *delta, &path)?;
                    overlay.insert(path, Some(incremented));
                }
            }
        }

        Ok(overlay)
    }

    fn notify(&self, changes: &[(String, DocChange)]) {
        // Snapshot matching callbacks first so user code runs without the
        // listener list locked.
        let matched: Vec<(Arc<ChangeCallback>, Vec<DocChange>)> = {
            let listeners = self.listeners.lock();
            listeners
                .iter()
                .filter_map(|listener| {
                    let relevant: Vec<DocChange> = changes
                        .iter()
                        .filter(|(path, _)| target_matches(&listener.target, path))
                        .map(|(_, change)| change.clone())
                        .collect();
                    (!relevant.is_empty()).then(|| (Arc::clone(&listener.callback), relevant))
                })
                .collect()
        };

        for (callback, relevant) in matched {
            callback(&relevant);
        }
    }

    fn snapshot(&self, target: &SubscribeTarget) -> Vec<DocChange> {
        let mut snapshot: Vec<(String, DocChange)> = self
            .documents
            .iter()
            .filter(|entry| target_matches(target, entry.key()))
            .map(|entry| {
                let id = last_segment(entry.key()).to_string();
                (
                    entry.key().clone(),
                    DocChange::Added {
                        id,
                        data: entry.value().clone(),
                    },
                )
            })
            .collect();
        snapshot.sort_by(|(a, _), (b, _)| a.cmp(b));
        snapshot.into_iter().map(|(_, change)| change).collect()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    fn new_doc_id(&self) -> String {
        let n = self.next_doc_id.fetch_add(1, Ordering::SeqCst) + 1;
        format!("d{n}")
    }

    async fn commit(&self, batch: Vec<Write>) -> Result<(), StoreError> {
        let _guard = self.commit_lock.lock();

        let overlay = self.stage(&batch)?;

        // Staging succeeded: apply everything and collect the change list.
        let mut changes: Vec<(String, DocChange)> = Vec::with_capacity(overlay.len());
        for (path, value) in overlay {
            let id = last_segment(&path).to_string();
            match value {
                Some(data) => {
                    let existed = self.documents.insert(path.clone(), data.clone()).is_some();
                    let change = if existed {
                        DocChange::Modified { id, data }
                    } else {
                        DocChange::Added { id, data }
                    };
                    changes.push((path, change));
                }
                None => {
                    if self.documents.remove(&path).is_some() {
                        changes.push((path, DocChange::Removed { id }));
                    }
                }
            }
        }

        changes.sort_by(|(a, _), (b, _)| a.cmp(b));
        self.notify(&changes);

        Ok(())
    }

    async fn get(&self, doc: &DocRef) -> Result<Option<Document>, StoreError> {
        Ok(self
            .documents
            .get(&doc.path())
            .map(|entry| entry.value().clone()))
    }

    async fn list(
        &self,
        collection: &CollectionRef,
    ) -> Result<Vec<(String, Document)>, StoreError> {
        let mut docs: Vec<(String, Document)> = self
            .documents
            .iter()
            .filter_map(|entry| {
                collection
                    .child_id(entry.key())
                    .map(|id| (id.to_string(), entry.value().clone()))
            })
            .collect();
        docs.sort_by(|(a, _), (b, _)| a.cmp(b));
        Ok(docs)
    }

    fn subscribe(&self, target: SubscribeTarget, on_change: ChangeCallback) -> ListenerHandle {
        // The commit lock keeps the snapshot and the registration consistent:
        // no batch can land between them.
        let _guard = self.commit_lock.lock();

        let callback: Arc<ChangeCallback> = Arc::new(on_change);
        let id = self.next_listener_id.fetch_add(1, Ordering::SeqCst);
        let snapshot = self.snapshot(&target);

        self.listeners.lock().push(Listener {
            id,
            target,
            callback: Arc::clone(&callback),
        });

        callback(&snapshot);

        let listeners = Arc::clone(&self.listeners);
        ListenerHandle::new(move || {
            listeners.lock().retain(|listener| listener.id != id);
        })
    }
}

fn last_segment(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

fn target_matches(target: &SubscribeTarget, path: &str) -> bool {
    match target {
        SubscribeTarget::Doc(doc) => doc.path() == path,
        SubscribeTarget::Collection(collection) => collection.child_id(path).is_some(),
    }
}

fn kind_matches(doc: &DocRef, data: &Document) -> bool {
    matches!(
        (doc, data),
        (DocRef::Group(_), Document::Group(_))
            | (DocRef::Member(_, _), Document::Member(_))
            | (DocRef::Transaction(_, _), Document::Transaction(_))
            | (DocRef::Invite(_, _), Document::Invite(_))
    )
}

fn apply_patch(data: &mut Document, patch: &Patch, path: &str) -> Result<(), StoreError> {
    match (data, patch) {
        (Document::Member(member), Patch::MemberStatus(status)) => {
            member.status = *status;
            Ok(())
        }
        (Document::Member(member), Patch::MemberDisplayName(name)) => {
            member.display_name = name.clone();
            Ok(())
        }
        (Document::Member(member), Patch::MemberLastUpdate(at)) => {
            member.last_update = *at;
            Ok(())
        }
        (Document::Group(group), Patch::GroupOwner(owner)) => {
            group.owner_id = owner.clone();
            Ok(())
        }
        (Document::Group(group), Patch::GroupLastUpdate(at)) => {
            group.last_update = *at;
            Ok(())
        }
        (Document::Group(group), Patch::GroupProfile { name, description }) => {
            group.name = name.clone();
            group.description = description.clone();
            Ok(())
        }
        _ => Err(StoreError::conflict(format!(
            "patch does not apply to document {path}"
        ))),
    }
}

fn apply_increment(
    data: Document,
    field: NumericField,
    delta: i64,
    path: &str,
) -> Result<Document, StoreError> {
    match (data, field) {
        (Document::Member(mut member), NumericField::Balance) => {
            member.balance = member
                .balance
                .checked_add(delta)
                .ok_or_else(|| StoreError::Overflow {
                    doc: path.to_string(),
                })?;
            Ok(Document::Member(member))
        }
        (_, NumericField::Balance) => Err(StoreError::conflict(format!(
            "no numeric field to increment on {path}"
        ))),
    }
}

/// Fixed identity provider for tests and the replay CLI
pub struct StaticIdentity {
    profile: Option<UserProfile>,
}

impl StaticIdentity {
    /// An identity provider with the given user signed in
    pub fn signed_in(user_id: &str, display_name: &str) -> Self {
        StaticIdentity {
            profile: Some(UserProfile {
                user_id: UserId::from(user_id),
                display_name: display_name.to_string(),
                photo_url: None,
            }),
        }
    }

    /// An identity provider with nobody signed in
    pub fn signed_out() -> Self {
        StaticIdentity { profile: None }
    }
}

impl IdentityProvider for StaticIdentity {
    fn current_user(&self) -> Result<UserProfile, LedgerError> {
        self.profile.clone().ok_or(LedgerError::NotSignedIn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::group::{GroupMember, MemberStatus};
    use crate::types::money::Currency;
    use crate::types::Group;
    use chrono::Utc;
    use std::sync::Mutex as StdMutex;

    fn member_doc(user: &str, balance: i64) -> Document {
        let mut member = GroupMember::new(user.to_string(), user.to_string(), None);
        member.balance = balance;
        Document::Member(member)
    }

    fn group_doc(owner: &str) -> Document {
        Document::Group(Group {
            name: "Trip".to_string(),
            description: None,
            currency: Currency::Gbp,
            owner_id: owner.to_string(),
            last_update: Utc::now(),
        })
    }

    fn member_ref(user: &str) -> DocRef {
        DocRef::Member("g1".to_string(), user.to_string())
    }

    #[tokio::test]
    async fn test_set_and_get_round_trip() {
        let store = MemoryStore::new();

        store
            .commit(vec![Write::Set {
                doc: member_ref("alice"),
                data: member_doc("alice", 0),
            }])
            .await
            .unwrap();

        let fetched = store.get(&member_ref("alice")).await.unwrap();
        assert_eq!(fetched, Some(member_doc("alice", 0)));
    }

    #[tokio::test]
    async fn test_increment_accumulates() {
        let store = MemoryStore::new();
        store
            .commit(vec![Write::Set {
                doc: member_ref("alice"),
                data: member_doc("alice", 0),
            }])
            .await
            .unwrap();

        for delta in [500, -200, 100] {
            store
                .commit(vec![Write::Increment {
                    doc: member_ref("alice"),
                    field: NumericField::Balance,
                    delta,
                }])
                .await
                .unwrap();
        }

        let fetched = store.get(&member_ref("alice")).await.unwrap().unwrap();
        assert_eq!(fetched.as_member().unwrap().balance, 400);
    }

    #[tokio::test]
    async fn test_failed_batch_applies_nothing() {
        let store = MemoryStore::new();
        store
            .commit(vec![Write::Set {
                doc: member_ref("alice"),
                data: member_doc("alice", 100),
            }])
            .await
            .unwrap();

        // Second write references a missing document, so the whole batch
        // must be rejected including the first increment.
        let result = store
            .commit(vec![
                Write::Increment {
                    doc: member_ref("alice"),
                    field: NumericField::Balance,
                    delta: 50,
                },
                Write::Increment {
                    doc: member_ref("ghost"),
                    field: NumericField::Balance,
                    delta: -50,
                },
            ])
            .await;

        assert!(matches!(result, Err(StoreError::Conflict { .. })));

        let fetched = store.get(&member_ref("alice")).await.unwrap().unwrap();
        assert_eq!(fetched.as_member().unwrap().balance, 100);
    }

    #[tokio::test]
    async fn test_increment_overflow_rejected() {
        let store = MemoryStore::new();
        store
            .commit(vec![Write::Set {
                doc: member_ref("alice"),
                data: member_doc("alice", i64::MAX),
            }])
            .await
            .unwrap();

        let result = store
            .commit(vec![Write::Increment {
                doc: member_ref("alice"),
                field: NumericField::Balance,
                delta: 1,
            }])
            .await;

        assert!(matches!(result, Err(StoreError::Overflow { .. })));
    }

    #[tokio::test]
    async fn test_update_on_missing_document_fails() {
        let store = MemoryStore::new();

        let result = store
            .commit(vec![Write::Update {
                doc: member_ref("alice"),
                patch: Patch::MemberStatus(MemberStatus::Left),
            }])
            .await;

        assert!(matches!(result, Err(StoreError::Conflict { .. })));
    }

    #[tokio::test]
    async fn test_delete_missing_document_is_noop() {
        let store = MemoryStore::new();
        store
            .commit(vec![Write::Delete {
                doc: member_ref("alice"),
            }])
            .await
            .unwrap();
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_patch_kind_mismatch_fails() {
        let store = MemoryStore::new();
        store
            .commit(vec![Write::Set {
                doc: DocRef::Group("g1".to_string()),
                data: group_doc("alice"),
            }])
            .await
            .unwrap();

        let result = store
            .commit(vec![Write::Update {
                doc: DocRef::Group("g1".to_string()),
                patch: Patch::MemberStatus(MemberStatus::Left),
            }])
            .await;

        assert!(matches!(result, Err(StoreError::Conflict { .. })));
    }

    #[tokio::test]
    async fn test_batch_is_applied_in_order() {
        let store = MemoryStore::new();

        // A batch may touch the same document more than once; later writes
        // see the staged effect of earlier ones.
        store
            .commit(vec![
                Write::Set {
                    doc: member_ref("alice"),
                    data: member_doc("alice", 0),
                },
                Write::Increment {
                    doc: member_ref("alice"),
                    field: NumericField::Balance,
                    delta: 250,
                },
                Write::Update {
                    doc: member_ref("alice"),
                    patch: Patch::MemberStatus(MemberStatus::Left),
                },
            ])
            .await
            .unwrap();

        let fetched = store.get(&member_ref("alice")).await.unwrap().unwrap();
        let member = fetched.as_member().unwrap();
        assert_eq!(member.balance, 250);
        assert_eq!(member.status, MemberStatus::Left);
    }

    #[tokio::test]
    async fn test_list_returns_children_sorted_by_id() {
        let store = MemoryStore::new();
        store
            .commit(vec![
                Write::Set {
                    doc: member_ref("carol"),
                    data: member_doc("carol", 0),
                },
                Write::Set {
                    doc: member_ref("alice"),
                    data: member_doc("alice", 0),
                },
                Write::Set {
                    doc: DocRef::Group("g1".to_string()),
                    data: group_doc("alice"),
                },
            ])
            .await
            .unwrap();

        let members = store
            .list(&CollectionRef::Members("g1".to_string()))
            .await
            .unwrap();
        let ids: Vec<&str> = members.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, vec!["alice", "carol"]);
    }

    #[tokio::test]
    async fn test_subscribe_delivers_snapshot_then_changes() {
        let store = MemoryStore::new();
        store
            .commit(vec![Write::Set {
                doc: member_ref("alice"),
                data: member_doc("alice", 0),
            }])
            .await
            .unwrap();

        let seen: Arc<StdMutex<Vec<Vec<DocChange>>>> = Arc::new(StdMutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let handle = store.subscribe(
            SubscribeTarget::Collection(CollectionRef::Members("g1".to_string())),
            Box::new(move |changes| sink.lock().unwrap().push(changes.to_vec())),
        );

        // Initial snapshot was delivered synchronously.
        assert_eq!(seen.lock().unwrap().len(), 1);
        assert!(matches!(
            seen.lock().unwrap()[0][0],
            DocChange::Added { .. }
        ));

        store
            .commit(vec![Write::Increment {
                doc: member_ref("alice"),
                field: NumericField::Balance,
                delta: 10,
            }])
            .await
            .unwrap();
        assert_eq!(seen.lock().unwrap().len(), 2);
        assert!(matches!(
            seen.lock().unwrap()[1][0],
            DocChange::Modified { .. }
        ));

        handle.unsubscribe();
        store
            .commit(vec![Write::Delete {
                doc: member_ref("alice"),
            }])
            .await
            .unwrap();
        assert_eq!(seen.lock().unwrap().len(), 2, "unsubscribed listener fired");
    }

    #[tokio::test]
    async fn test_doc_listener_ignores_sibling_documents() {
        let store = MemoryStore::new();
        let seen: Arc<StdMutex<usize>> = Arc::new(StdMutex::new(0));
        let sink = Arc::clone(&seen);

        let _handle = store.subscribe(
            SubscribeTarget::Doc(DocRef::Group("g1".to_string())),
            Box::new(move |_| *sink.lock().unwrap() += 1),
        );
        assert_eq!(*seen.lock().unwrap(), 1, "initial snapshot");

        store
            .commit(vec![Write::Set {
                doc: member_ref("alice"),
                data: member_doc("alice", 0),
            }])
            .await
            .unwrap();
        assert_eq!(*seen.lock().unwrap(), 1, "member change leaked to group doc");

        store
            .commit(vec![Write::Set {
                doc: DocRef::Group("g1".to_string()),
                data: group_doc("alice"),
            }])
            .await
            .unwrap();
        assert_eq!(*seen.lock().unwrap(), 2);
    }

    #[test]
    fn test_new_doc_ids_are_unique() {
        let store = MemoryStore::new();
        let a = store.new_doc_id();
        let b = store.new_doc_id();
        assert_ne!(a, b);
    }

    #[test]
    fn test_static_identity() {
        let signed_in = StaticIdentity::signed_in("alice", "Alice");
        assert_eq!(signed_in.current_user().unwrap().user_id, "alice");

        let signed_out = StaticIdentity::signed_out();
        assert_eq!(
            signed_out.current_user().unwrap_err(),
            LedgerError::NotSignedIn
        );
    }
}
