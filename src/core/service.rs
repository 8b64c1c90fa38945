//! Ledger service: transaction and membership operations
//!
//! `LedgerService` orchestrates the balance arithmetic of
//! [`crate::core::balance`] against a [`DocumentStore`]. Every mutating
//! operation follows the same pattern:
//!
//! 1. Resolve the signed-in user (fails with `NotSignedIn`).
//! 2. Fetch whatever prior state the operation reverses or validates
//!    against (fails with the matching `NotFound` error).
//! 3. Commit one atomic batch containing the document write, the balance
//!    increments and the last-update touches. A failed batch changes
//!    nothing and surfaces as `WriteConflict`.
//! 4. For transaction writes, run the left-user status refresh as a second,
//!    separately committed, best-effort pass. A failure there is logged and
//!    swallowed: the status field self-heals on the next write touching the
//!    member.

use crate::core::balance::{inverse_deltas, left_status, net_balances, transaction_deltas};
use crate::core::netting::{resolve_group_debts, Settlement};
use crate::store::traits::{
    CollectionRef, DocRef, Document, DocumentStore, IdentityProvider, NumericField, Patch,
    UserProfile, Write,
};
use crate::types::error::LedgerError;
use crate::types::group::{
    Group, GroupId, GroupMember, Invite, InviteId, MemberStatus, UserId,
};
use crate::types::money::{Amount, Currency};
use crate::types::transaction::{Transaction, TransactionId};
use chrono::{Duration, Utc};
use futures::future::join_all;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Group ledger operations over a document store and identity provider
pub struct LedgerService {
    store: Arc<dyn DocumentStore>,
    identity: Arc<dyn IdentityProvider>,
}

impl LedgerService {
    /// Create a service over the given store and identity provider
    pub fn new(store: Arc<dyn DocumentStore>, identity: Arc<dyn IdentityProvider>) -> Self {
        LedgerService { store, identity }
    }

    /// Access the underlying document store
    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    // ---- lookups ----------------------------------------------------------

    async fn fetch_group(&self, group_id: &str) -> Result<Group, LedgerError> {
        match self.store.get(&DocRef::Group(group_id.to_string())).await? {
            Some(Document::Group(group)) => Ok(group),
            _ => Err(LedgerError::group_not_found(group_id)),
        }
    }

    async fn fetch_member(&self, group_id: &str, user_id: &str) -> Result<GroupMember, LedgerError> {
        let doc = DocRef::Member(group_id.to_string(), user_id.to_string());
        match self.store.get(&doc).await? {
            Some(Document::Member(member)) => Ok(member),
            _ => Err(LedgerError::member_not_found(group_id, user_id)),
        }
    }

    async fn fetch_transaction(
        &self,
        group_id: &str,
        tx_id: &str,
    ) -> Result<Transaction, LedgerError> {
        let doc = DocRef::Transaction(group_id.to_string(), tx_id.to_string());
        match self.store.get(&doc).await? {
            Some(Document::Transaction(tx)) => Ok(tx),
            _ => Err(LedgerError::transaction_not_found(group_id, tx_id)),
        }
    }

    /// The group document, surfaced for callers that only need a read
    pub async fn group(&self, group_id: &str) -> Result<Group, LedgerError> {
        self.fetch_group(group_id).await
    }

    /// One transaction document
    pub async fn transaction(
        &self,
        group_id: &str,
        tx_id: &str,
    ) -> Result<Transaction, LedgerError> {
        self.fetch_transaction(group_id, tx_id).await
    }

    /// All members of the group, in user-id order
    pub async fn members(&self, group_id: &str) -> Result<Vec<GroupMember>, LedgerError> {
        self.fetch_group(group_id).await?;
        let docs = self
            .store
            .list(&CollectionRef::Members(group_id.to_string()))
            .await?;
        Ok(docs
            .into_iter()
            .filter_map(|(_, doc)| match doc {
                Document::Member(member) => Some(member),
                _ => None,
            })
            .collect())
    }

    /// Net balance per member, in user-id order
    pub async fn balances(&self, group_id: &str) -> Result<BTreeMap<UserId, Amount>, LedgerError> {
        let members = self.members(group_id).await?;
        Ok(net_balances(members.iter()))
    }

    /// Settling payments that zero out the group's current balances
    pub async fn settle_up(&self, group_id: &str) -> Result<Vec<Settlement>, LedgerError> {
        let balances = self.balances(group_id).await?;
        Ok(resolve_group_debts(&balances))
    }

    // ---- transaction writes -----------------------------------------------

    /// Create a transaction and apply its balance effect atomically
    ///
    /// `affected_left_users` lists members who are `left`/`history` and
    /// might be touched by this transaction; their statuses are recomputed
    /// in a second best-effort pass after the primary batch commits.
    ///
    /// # Errors
    ///
    /// `NotSignedIn` without an identity, `GroupNotFound`/`MemberNotFound`
    /// if group or payer are absent, `WriteConflict` if the atomic batch
    /// fails (in which case no balance changed).
    pub async fn create_transaction(
        &self,
        group_id: &str,
        transaction: Transaction,
        affected_left_users: &[UserId],
    ) -> Result<TransactionId, LedgerError> {
        self.identity.current_user()?;
        self.fetch_group(group_id).await?;
        self.fetch_member(group_id, &transaction.from).await?;

        let tx_id = self.store.new_doc_id();
        let mut batch = Vec::new();

        batch.push(Write::Set {
            doc: DocRef::Transaction(group_id.to_string(), tx_id.clone()),
            data: Document::Transaction(transaction.clone()),
        });
        self.push_balance_writes(group_id, &transaction.from, &transaction.to, false, &mut batch)?;
        self.push_touch_writes(group_id, &transaction.from, &mut batch);

        self.store.commit(batch).await?;
        debug!(group = group_id, tx = %tx_id, "transaction created");

        self.best_effort_left_refresh(group_id, affected_left_users)
            .await;
        Ok(tx_id)
    }

    /// Replace a transaction, reversing its old effect and applying the new
    ///
    /// The reversal of the stored transaction and the application of the new
    /// one share a single atomic batch with the document overwrite, so no
    /// intermediate state is ever visible.
    ///
    /// # Errors
    ///
    /// `TransactionNotFound` if `tx_id` no longer exists; otherwise as
    /// [`create_transaction`](Self::create_transaction).
    pub async fn update_transaction(
        &self,
        group_id: &str,
        tx_id: &str,
        transaction: Transaction,
        affected_left_users: &[UserId],
    ) -> Result<(), LedgerError> {
        self.identity.current_user()?;
        let old = self.fetch_transaction(group_id, tx_id).await?;
        self.fetch_member(group_id, &transaction.from).await?;

        let mut batch = Vec::new();
        batch.push(Write::Set {
            doc: DocRef::Transaction(group_id.to_string(), tx_id.to_string()),
            data: Document::Transaction(transaction.clone()),
        });
        self.push_balance_writes(group_id, &old.from, &old.to, true, &mut batch)?;
        self.push_balance_writes(group_id, &transaction.from, &transaction.to, false, &mut batch)?;
        self.push_touch_writes(group_id, &transaction.from, &mut batch);

        self.store.commit(batch).await?;
        debug!(group = group_id, tx = tx_id, "transaction updated");

        self.best_effort_left_refresh(group_id, affected_left_users)
            .await;
        Ok(())
    }

    /// Delete a transaction, reversing its balance effect atomically
    ///
    /// # Errors
    ///
    /// `TransactionNotFound` if `tx_id` no longer exists; otherwise as
    /// [`create_transaction`](Self::create_transaction).
    pub async fn delete_transaction(
        &self,
        group_id: &str,
        tx_id: &str,
        affected_left_users: &[UserId],
    ) -> Result<(), LedgerError> {
        self.identity.current_user()?;
        let old = self.fetch_transaction(group_id, tx_id).await?;

        let mut batch = Vec::new();
        batch.push(Write::Delete {
            doc: DocRef::Transaction(group_id.to_string(), tx_id.to_string()),
        });
        self.push_balance_writes(group_id, &old.from, &old.to, true, &mut batch)?;
        self.push_touch_writes(group_id, &old.from, &mut batch);

        self.store.commit(batch).await?;
        debug!(group = group_id, tx = tx_id, "transaction deleted");

        self.best_effort_left_refresh(group_id, affected_left_users)
            .await;
        Ok(())
    }

    fn push_balance_writes(
        &self,
        group_id: &str,
        from: &UserId,
        to: &BTreeMap<UserId, Amount>,
        reverse: bool,
        batch: &mut Vec<Write>,
    ) -> Result<(), LedgerError> {
        let deltas = if reverse {
            inverse_deltas(from, to)?
        } else {
            transaction_deltas(from, to)?
        };

        for (user, delta) in deltas {
            batch.push(Write::Increment {
                doc: DocRef::Member(group_id.to_string(), user),
                field: NumericField::Balance,
                delta,
            });
        }
        Ok(())
    }

    fn push_touch_writes(&self, group_id: &str, payer: &UserId, batch: &mut Vec<Write>) {
        let now = Utc::now();
        batch.push(Write::Update {
            doc: DocRef::Member(group_id.to_string(), payer.clone()),
            patch: Patch::MemberLastUpdate(now),
        });
        batch.push(Write::Update {
            doc: DocRef::Group(group_id.to_string()),
            patch: Patch::GroupLastUpdate(now),
        });
    }

    // ---- left-user status refresh -----------------------------------------

    /// Recompute and persist statuses for departed members
    ///
    /// For each listed user, re-derives `left`/`history` from the current
    /// balance and writes the status only when it changed. The whole pass is
    /// committed as one batch.
    ///
    /// # Errors
    ///
    /// Propagates store failures; callers inside the transaction flow treat
    /// them as non-fatal.
    pub async fn refresh_left_statuses(
        &self,
        group_id: &str,
        users: &[UserId],
    ) -> Result<(), LedgerError> {
        if users.is_empty() {
            return Ok(());
        }

        let refs: Vec<DocRef> = users
            .iter()
            .map(|user| DocRef::Member(group_id.to_string(), user.clone()))
            .collect();

        let mut batch = Vec::new();
        for result in join_all(refs.iter().map(|doc| self.store.get(doc))).await {
            let Some(Document::Member(member)) = result? else {
                continue;
            };
            if let Some(status) = left_status(&member, false) {
                batch.push(Write::Update {
                    doc: DocRef::Member(group_id.to_string(), member.user_id.clone()),
                    patch: Patch::MemberStatus(status),
                });
            }
        }

        if batch.is_empty() {
            return Ok(());
        }
        self.store.commit(batch).await?;
        Ok(())
    }

    /// Run the status refresh, logging instead of failing
    ///
    /// A transient miss here is tolerated: the status field is re-derived on
    /// the next transaction touching the member or on group load.
    async fn best_effort_left_refresh(&self, group_id: &str, users: &[UserId]) {
        if let Err(error) = self.refresh_left_statuses(group_id, users).await {
            warn!(
                group = group_id,
                %error,
                "left-user status refresh failed; will self-heal on a later write"
            );
        }
    }

    // ---- group lifecycle --------------------------------------------------

    /// Create a group owned by the signed-in user, who joins immediately
    pub async fn create_group(
        &self,
        name: &str,
        description: Option<String>,
        currency: Currency,
    ) -> Result<GroupId, LedgerError> {
        let profile = self.identity.current_user()?;
        let group_id = self.store.new_doc_id();

        let group = Group {
            name: name.to_string(),
            description,
            currency,
            owner_id: profile.user_id.clone(),
            last_update: Utc::now(),
        };

        self.store
            .commit(vec![
                Write::Set {
                    doc: DocRef::Group(group_id.clone()),
                    data: Document::Group(group),
                },
                Write::Set {
                    doc: DocRef::Member(group_id.clone(), profile.user_id.clone()),
                    data: Document::Member(new_member(&profile)),
                },
            ])
            .await?;

        Ok(group_id)
    }

    /// Update the group's name and description
    pub async fn update_group(
        &self,
        group_id: &str,
        name: &str,
        description: Option<String>,
    ) -> Result<(), LedgerError> {
        self.identity.current_user()?;
        self.fetch_group(group_id).await?;

        self.store
            .commit(vec![Write::Update {
                doc: DocRef::Group(group_id.to_string()),
                patch: Patch::GroupProfile {
                    name: name.to_string(),
                    description,
                },
            }])
            .await?;
        Ok(())
    }

    /// Delete the group and everything under it
    pub async fn delete_group(&self, group_id: &str) -> Result<(), LedgerError> {
        self.identity.current_user()?;
        self.fetch_group(group_id).await?;

        let mut batch = vec![Write::Delete {
            doc: DocRef::Group(group_id.to_string()),
        }];
        for collection in [
            CollectionRef::Members(group_id.to_string()),
            CollectionRef::Transactions(group_id.to_string()),
            CollectionRef::Invites(group_id.to_string()),
        ] {
            for (id, _) in self.store.list(&collection).await? {
                batch.push(Write::Delete {
                    doc: collection.doc(&id),
                });
            }
        }

        self.store.commit(batch).await?;
        Ok(())
    }

    // ---- invites ----------------------------------------------------------

    /// Create an invite valid for `ttl`, garbage-collecting expired ones
    ///
    /// Expired invites are deleted in the same batch that creates the new
    /// one; nobody else cleans them up.
    pub async fn create_invite(
        &self,
        group_id: &str,
        ttl: Duration,
    ) -> Result<InviteId, LedgerError> {
        self.identity.current_user()?;
        self.fetch_group(group_id).await?;

        let mut batch = self.expired_invite_deletes(group_id).await?;
        let invite_id = self.store.new_doc_id();
        batch.push(Write::Set {
            doc: DocRef::Invite(group_id.to_string(), invite_id.clone()),
            data: Document::Invite(Invite::expiring_in(ttl)),
        });

        self.store.commit(batch).await?;
        Ok(invite_id)
    }

    /// Delete every expired invite of the group
    pub async fn cleanup_invites(&self, group_id: &str) -> Result<(), LedgerError> {
        let batch = self.expired_invite_deletes(group_id).await?;
        if batch.is_empty() {
            return Ok(());
        }
        debug!(group = group_id, count = batch.len(), "removing expired invites");
        self.store.commit(batch).await?;
        Ok(())
    }

    async fn expired_invite_deletes(&self, group_id: &str) -> Result<Vec<Write>, LedgerError> {
        let now = Utc::now();
        let invites = self
            .store
            .list(&CollectionRef::Invites(group_id.to_string()))
            .await?;

        Ok(invites
            .into_iter()
            .filter(|(_, doc)| matches!(doc, Document::Invite(invite) if invite.is_expired(now)))
            .map(|(id, _)| Write::Delete {
                doc: DocRef::Invite(group_id.to_string(), id),
            })
            .collect())
    }

    // ---- membership -------------------------------------------------------

    /// Join a group through an invite
    ///
    /// A returning member (status `left` or `history`) is re-activated with
    /// their old balance intact; a new member starts at zero.
    ///
    /// # Errors
    ///
    /// `InviteInvalid` if the invite is missing or expired, `GroupNotFound`
    /// if the group is gone.
    pub async fn join_group(&self, group_id: &str, invite_id: &str) -> Result<(), LedgerError> {
        let profile = self.identity.current_user()?;
        self.fetch_group(group_id).await?;

        let invite_ref = DocRef::Invite(group_id.to_string(), invite_id.to_string());
        let invite = match self.store.get(&invite_ref).await? {
            Some(Document::Invite(invite)) => invite,
            _ => return Err(LedgerError::invite_invalid(group_id, invite_id)),
        };
        if invite.is_expired(Utc::now()) {
            return Err(LedgerError::invite_invalid(group_id, invite_id));
        }

        let member_ref = DocRef::Member(group_id.to_string(), profile.user_id.clone());
        match self.store.get(&member_ref).await? {
            Some(Document::Member(member)) => {
                if member.status != MemberStatus::Active {
                    self.store
                        .commit(vec![Write::Update {
                            doc: member_ref,
                            patch: Patch::MemberStatus(MemberStatus::Active),
                        }])
                        .await?;
                }
                Ok(())
            }
            _ => {
                self.store
                    .commit(vec![Write::Set {
                        doc: member_ref,
                        data: Document::Member(new_member(&profile)),
                    }])
                    .await?;
                Ok(())
            }
        }
    }

    /// The signed-in user leaves the group
    ///
    /// Ownership passes to another active member when the leaver owns the
    /// group; if no other active member remains the group is deleted.
    pub async fn leave_group(&self, group_id: &str) -> Result<(), LedgerError> {
        let profile = self.identity.current_user()?;
        self.depart(group_id, &profile.user_id).await
    }

    /// Remove a member from the group
    ///
    /// Same departure rules as [`leave_group`](Self::leave_group), applied
    /// to an arbitrary member.
    pub async fn remove_member(&self, group_id: &str, user_id: &str) -> Result<(), LedgerError> {
        self.identity.current_user()?;
        self.depart(group_id, user_id).await
    }

    /// Departure shared by leave and removal: transfer ownership if needed,
    /// then force the member out of `active`.
    async fn depart(&self, group_id: &str, user_id: &str) -> Result<(), LedgerError> {
        let group = self.fetch_group(group_id).await?;
        let member = self.fetch_member(group_id, user_id).await?;

        let mut batch = Vec::new();

        if group.owner_id == user_id {
            let members = self.members(group_id).await?;
            let successor = members
                .iter()
                .find(|m| m.status == MemberStatus::Active && m.user_id != user_id);

            match successor {
                Some(successor) => batch.push(Write::Update {
                    doc: DocRef::Group(group_id.to_string()),
                    patch: Patch::GroupOwner(successor.user_id.clone()),
                }),
                None => return self.delete_group(group_id).await,
            }
        }

        if let Some(status) = left_status(&member, true) {
            batch.push(Write::Update {
                doc: DocRef::Member(group_id.to_string(), user_id.to_string()),
                patch: Patch::MemberStatus(status),
            });
        }

        if batch.is_empty() {
            return Ok(());
        }
        self.store.commit(batch).await?;
        Ok(())
    }

    /// Make another active member the group owner
    ///
    /// # Errors
    ///
    /// `MemberNotFound` if the target is not in the group, `MemberNotActive`
    /// if they have departed.
    pub async fn promote_member(&self, group_id: &str, user_id: &str) -> Result<(), LedgerError> {
        self.identity.current_user()?;
        self.fetch_group(group_id).await?;

        let member = self.fetch_member(group_id, user_id).await?;
        if member.status != MemberStatus::Active {
            return Err(LedgerError::member_not_active(group_id, user_id));
        }

        self.store
            .commit(vec![Write::Update {
                doc: DocRef::Group(group_id.to_string()),
                patch: Patch::GroupOwner(user_id.to_string()),
            }])
            .await?;
        Ok(())
    }

    /// Change a member's display name within the group
    pub async fn rename_member(
        &self,
        group_id: &str,
        user_id: &str,
        name: &str,
    ) -> Result<(), LedgerError> {
        self.identity.current_user()?;
        self.fetch_member(group_id, user_id).await?;

        self.store
            .commit(vec![Write::Update {
                doc: DocRef::Member(group_id.to_string(), user_id.to_string()),
                patch: Patch::MemberDisplayName(name.to_string()),
            }])
            .await?;
        Ok(())
    }
}

fn new_member(profile: &UserProfile) -> GroupMember {
    GroupMember::new(
        profile.user_id.clone(),
        profile.display_name.clone(),
        profile.photo_url.clone(),
    )
}
