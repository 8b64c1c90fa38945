//! Persistence boundary module
//!
//! The ledger consumes an external document store with atomic batch writes
//! and live subscriptions, and an external identity provider. This module
//! defines those interfaces and ships an in-memory reference implementation:
//! - `traits` - Store and identity traits, write model, subscription types
//! - `memory` - DashMap-backed store with atomic batches and listeners

pub mod memory;
pub mod traits;

pub use memory::{MemoryStore, StaticIdentity};
pub use traits::{
    ChangeCallback, CollectionRef, DocChange, DocRef, Document, DocumentStore, IdentityProvider,
    ListenerHandle, NumericField, Patch, StoreError, SubscribeTarget, UserProfile, Write,
};
