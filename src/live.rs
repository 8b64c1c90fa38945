//! Live group views
//!
//! A [`GroupView`] mirrors one group's document, member map and transaction
//! map through three store subscriptions. The store delivers each listener's
//! first snapshot before `subscribe` returns, so a constructed view is never
//! observable half-loaded: by the time [`GroupView::open`] hands it back,
//! every listener has synchronized.
//!
//! [`GroupViewCache`] is the caller-owned cache keyed by group id. Opening
//! the id it already holds is a no-op; opening a different id drops the old
//! view (which unsubscribes its listeners) before subscribing the new one.
//! There are no process-wide singletons: whoever owns the cache owns the
//! listeners.

use crate::core::balance::net_balances;
use crate::store::traits::{
    CollectionRef, DocChange, DocRef, Document, DocumentStore, ListenerHandle, SubscribeTarget,
};
use crate::types::error::LedgerError;
use crate::types::group::{Group, GroupId, GroupMember, UserId};
use crate::types::money::Amount;
use crate::types::transaction::{Transaction, TransactionId};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Default)]
struct ViewState {
    group: Option<Group>,
    members: BTreeMap<UserId, GroupMember>,
    transactions: BTreeMap<TransactionId, Transaction>,
}

/// Live snapshot of one group
///
/// Dropping the view unsubscribes all three listeners.
pub struct GroupView {
    group_id: GroupId,
    state: Arc<RwLock<ViewState>>,
    _listeners: Vec<ListenerHandle>,
}

impl GroupView {
    /// Open a live view of the group
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::GroupNotFound`] if the group document does not
    /// exist.
    pub async fn open(
        store: &Arc<dyn DocumentStore>,
        group_id: &str,
    ) -> Result<GroupView, LedgerError> {
        match store.get(&DocRef::Group(group_id.to_string())).await? {
            Some(Document::Group(_)) => {}
            _ => return Err(LedgerError::group_not_found(group_id)),
        }

        let state: Arc<RwLock<ViewState>> = Arc::new(RwLock::new(ViewState::default()));

        let group_state = Arc::clone(&state);
        let group_listener = store.subscribe(
            SubscribeTarget::Doc(DocRef::Group(group_id.to_string())),
            Box::new(move |changes| {
                let mut state = group_state.write();
                for change in changes {
                    match change {
                        DocChange::Added { data, .. } | DocChange::Modified { data, .. } => {
                            if let Document::Group(group) = data {
                                state.group = Some(group.clone());
                            }
                        }
                        DocChange::Removed { .. } => state.group = None,
                    }
                }
            }),
        );

        let member_state = Arc::clone(&state);
        let member_listener = store.subscribe(
            SubscribeTarget::Collection(CollectionRef::Members(group_id.to_string())),
            Box::new(move |changes| {
                let mut state = member_state.write();
                for change in changes {
                    match change {
                        DocChange::Added { id, data } | DocChange::Modified { id, data } => {
                            if let Document::Member(member) = data {
                                state.members.insert(id.clone(), member.clone());
                            }
                        }
                        DocChange::Removed { id } => {
                            state.members.remove(id);
                        }
                    }
                }
            }),
        );

        let transaction_state = Arc::clone(&state);
        let transaction_listener = store.subscribe(
            SubscribeTarget::Collection(CollectionRef::Transactions(group_id.to_string())),
            Box::new(move |changes| {
                let mut state = transaction_state.write();
                for change in changes {
                    match change {
                        DocChange::Added { id, data } | DocChange::Modified { id, data } => {
                            if let Document::Transaction(tx) = data {
                                state.transactions.insert(id.clone(), tx.clone());
                            }
                        }
                        DocChange::Removed { id } => {
                            state.transactions.remove(id);
                        }
                    }
                }
            }),
        );

        // Every listener has delivered its first snapshot by now; only a
        // fully loaded view ever becomes visible to the caller.
        Ok(GroupView {
            group_id: group_id.to_string(),
            state,
            _listeners: vec![group_listener, member_listener, transaction_listener],
        })
    }

    /// The id this view is bound to
    pub fn group_id(&self) -> &str {
        &self.group_id
    }

    /// Current group document, `None` if the group was deleted under us
    pub fn group(&self) -> Option<Group> {
        self.state.read().group.clone()
    }

    /// Current member map, keyed by user id
    pub fn members(&self) -> BTreeMap<UserId, GroupMember> {
        self.state.read().members.clone()
    }

    /// Current transaction map, keyed by transaction id
    pub fn transactions(&self) -> BTreeMap<TransactionId, Transaction> {
        self.state.read().transactions.clone()
    }

    /// Net balances derived from the current member map
    pub fn balances(&self) -> BTreeMap<UserId, Amount> {
        net_balances(self.state.read().members.values())
    }
}

/// Caller-owned cache of the currently viewed group
pub struct GroupViewCache {
    store: Arc<dyn DocumentStore>,
    current: Option<GroupView>,
}

impl GroupViewCache {
    /// Create an empty cache over the store
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        GroupViewCache {
            store,
            current: None,
        }
    }

    /// Open (or keep) the view for `group_id`
    ///
    /// If the cache already holds a view of this id it is returned as-is,
    /// without touching any subscription. Otherwise the previous view is
    /// dropped first, cancelling its listeners, and a fresh view is opened.
    pub async fn open(&mut self, group_id: &str) -> Result<&GroupView, LedgerError> {
        let cached = self
            .current
            .as_ref()
            .is_some_and(|view| view.group_id() == group_id);

        if !cached {
            // Unsubscribe the old view before subscribing the new one.
            self.current = None;
            let view = GroupView::open(&self.store, group_id).await?;
            self.current = Some(view);
        }

        self.current
            .as_ref()
            .ok_or_else(|| LedgerError::group_not_found(group_id))
    }

    /// The currently cached view, if any
    pub fn current(&self) -> Option<&GroupView> {
        self.current.as_ref()
    }

    /// Drop the cached view and its subscriptions
    pub fn invalidate(&mut self) {
        self.current = None;
    }

    /// Re-open the cached group from scratch
    ///
    /// No-op when nothing is cached.
    pub async fn refresh(&mut self) -> Result<(), LedgerError> {
        let Some(group_id) = self.current.as_ref().map(|view| view.group_id().to_string()) else {
            return Ok(());
        };
        self.invalidate();
        self.open(&group_id).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::service::LedgerService;
    use crate::store::memory::{MemoryStore, StaticIdentity};
    use crate::types::money::Currency;
    use crate::types::transaction::TransactionCategory;
    use chrono::Utc;

    fn fixtures() -> (Arc<MemoryStore>, LedgerService) {
        let store = Arc::new(MemoryStore::new());
        let service = LedgerService::new(
            Arc::clone(&store) as Arc<dyn DocumentStore>,
            Arc::new(StaticIdentity::signed_in("alice", "Alice")),
        );
        (store, service)
    }

    fn tx(from: &str, to: &[(&str, Amount)]) -> Transaction {
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

    #[tokio::test]
    async fn test_view_carries_first_snapshot_on_open() {
        let (store, service) = fixtures();
        let group_id = service
            .create_group("Trip", None, Currency::Gbp)
            .await
            .unwrap();

        let store_dyn: Arc<dyn DocumentStore> = store;
        let view = GroupView::open(&store_dyn, &group_id).await.unwrap();

        assert_eq!(view.group().unwrap().name, "Trip");
        assert!(view.members().contains_key("alice"));
        assert!(view.transactions().is_empty());
    }

    #[tokio::test]
    async fn test_view_tracks_transactions_and_balances() {
        let (store, service) = fixtures();
        let group_id = service
            .create_group("Trip", None, Currency::Gbp)
            .await
            .unwrap();
        service
            .store()
            .commit(vec![crate::store::traits::Write::Set {
                doc: DocRef::Member(group_id.clone(), "bob".to_string()),
                data: Document::Member(GroupMember::new(
                    "bob".to_string(),
                    "Bob".to_string(),
                    None,
                )),
            }])
            .await
            .unwrap();

        let store_dyn: Arc<dyn DocumentStore> = store;
        let view = GroupView::open(&store_dyn, &group_id).await.unwrap();

        let tx_id = service
            .create_transaction(&group_id, tx("alice", &[("bob", 400)]), &[])
            .await
            .unwrap();

        assert_eq!(view.transactions().len(), 1);
        assert_eq!(view.balances()["alice"], 400);
        assert_eq!(view.balances()["bob"], -400);

        service
            .delete_transaction(&group_id, &tx_id, &[])
            .await
            .unwrap();
        assert!(view.transactions().is_empty());
        assert_eq!(view.balances()["alice"], 0);
    }

    #[tokio::test]
    async fn test_open_missing_group_fails() {
        let (store, _service) = fixtures();
        let store_dyn: Arc<dyn DocumentStore> = store;
        let result = GroupView::open(&store_dyn, "ghost").await;
        assert!(matches!(result, Err(LedgerError::GroupNotFound { .. })));
    }

    #[tokio::test]
    async fn test_dropping_view_releases_listeners() {
        let (store, service) = fixtures();
        let group_id = service
            .create_group("Trip", None, Currency::Gbp)
            .await
            .unwrap();

        let store_dyn: Arc<dyn DocumentStore> = Arc::<MemoryStore>::clone(&store);
        let view = GroupView::open(&store_dyn, &group_id).await.unwrap();
        assert_eq!(store.listener_count(), 3);

        drop(view);
        assert_eq!(store.listener_count(), 0);
    }

    #[tokio::test]
    async fn test_cache_keeps_view_for_same_id() {
        let (store, service) = fixtures();
        let group_id = service
            .create_group("Trip", None, Currency::Gbp)
            .await
            .unwrap();

        let mut cache = GroupViewCache::new(Arc::clone(&store) as Arc<dyn DocumentStore>);
        cache.open(&group_id).await.unwrap();
        assert_eq!(store.listener_count(), 3);

        // Same id: no resubscription happens.
        cache.open(&group_id).await.unwrap();
        assert_eq!(store.listener_count(), 3);
    }

    #[tokio::test]
    async fn test_cache_switches_groups_and_unsubscribes_old_view() {
        let (store, service) = fixtures();
        let first = service
            .create_group("Trip", None, Currency::Gbp)
            .await
            .unwrap();
        let second = service
            .create_group("Flat", None, Currency::Eur)
            .await
            .unwrap();

        let mut cache = GroupViewCache::new(Arc::clone(&store) as Arc<dyn DocumentStore>);
        cache.open(&first).await.unwrap();
        cache.open(&second).await.unwrap();

        assert_eq!(store.listener_count(), 3, "old listeners must be released");
        assert_eq!(cache.current().unwrap().group().unwrap().name, "Flat");
    }

    #[tokio::test]
    async fn test_cache_invalidate_and_refresh() {
        let (store, service) = fixtures();
        let group_id = service
            .create_group("Trip", None, Currency::Gbp)
            .await
            .unwrap();

        let mut cache = GroupViewCache::new(Arc::clone(&store) as Arc<dyn DocumentStore>);
        cache.open(&group_id).await.unwrap();
        cache.refresh().await.unwrap();
        assert_eq!(store.listener_count(), 3);
        assert!(cache.current().is_some());

        cache.invalidate();
        assert_eq!(store.listener_count(), 0);
        assert!(cache.current().is_none());
    }
}
