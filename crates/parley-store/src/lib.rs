mod etcd;
pub mod kv;

use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use parley_types::{Message, User};

pub use etcd::EtcdKv;
pub use kv::{Kv, KvError, MemoryKv};

pub const USER_PREFIX: &str = "user.";
pub const MESSAGE_PREFIX: &str = "message.";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Unavailable(#[from] KvError),

    #[error("cannot decode stored record {key}: {source}")]
    Decode {
        key: String,
        source: serde_json::Error,
    },
}

/// Durable mailbox repository over a sorted key-value service.
///
/// Two disjoint key prefixes partition the flat keyspace: `user.<login>` for
/// users and `message.<login_to><login_from><created_at>` for undelivered
/// messages. Values are field-tagged JSON; the store never interprets them.
///
/// Known sharp edges, kept for compatibility with the deployed layout:
/// message keys collide for same-pair sends within one second
/// (last-write-wins), and a login that is a prefix of another login
/// over-matches on `messages()`.
#[derive(Clone)]
pub struct MailboxStore {
    kv: Arc<dyn Kv>,
}

fn user_key(login: &str) -> String {
    format!("{USER_PREFIX}{login}")
}

fn message_key(m: &Message) -> String {
    // Decimal timestamp rather than the raw int32 bytes: keys stay printable,
    // collision semantics are identical.
    format!("{MESSAGE_PREFIX}{}{}{}", m.login_to, m.login_from, m.created_at)
}

impl MailboxStore {
    pub fn new(kv: Arc<dyn Kv>) -> Self {
        Self { kv }
    }

    /// Write `u` under its user key. Unconditional: a second create with the
    /// same login replaces the first (no uniqueness check at this layer).
    pub async fn create_user(&self, u: &User) -> Result<(), StoreError> {
        let key = user_key(&u.login);
        // Plain string fields; serialization cannot fail.
        let value = serde_json::to_vec(u).expect("user record serializes");
        self.kv.put(&key, value).await?;
        debug!("stored user {}", u.login);
        Ok(())
    }

    /// All users, in store scan order. A single corrupt record fails the
    /// whole listing.
    pub async fn users(&self) -> Result<Vec<User>, StoreError> {
        let pairs = self.kv.get_prefix(USER_PREFIX).await?;
        pairs
            .into_iter()
            .map(|(key, value)| {
                serde_json::from_slice(&value).map_err(|source| StoreError::Decode { key, source })
            })
            .collect()
    }

    /// Write `m` under the key derived from `(login_to, login_from,
    /// created_at)`. Last-write-wins on key collision.
    pub async fn create_message(&self, m: &Message) -> Result<(), StoreError> {
        let key = message_key(m);
        let value = serde_json::to_vec(m).expect("message record serializes");
        self.kv.put(&key, value).await?;
        debug!("stored message {} -> {}", m.login_from, m.login_to);
        Ok(())
    }

    /// Pending messages for `login`, in store scan order. Scans everything
    /// under `"message." + login`, so a login that prefixes another login
    /// also picks up that user's mail.
    pub async fn messages(&self, login: &str) -> Result<Vec<Message>, StoreError> {
        let prefix = format!("{MESSAGE_PREFIX}{login}");
        let pairs = self.kv.get_prefix(&prefix).await?;
        pairs
            .into_iter()
            .map(|(key, value)| {
                serde_json::from_slice(&value).map_err(|source| StoreError::Decode { key, source })
            })
            .collect()
    }

    /// Delete the key derived from `m`. Deleting an already-absent message
    /// succeeds, so two subscribers draining the same mailbox can race on
    /// the delete safely.
    pub async fn delete_message(&self, m: &Message) -> Result<(), StoreError> {
        self.kv.delete(&message_key(m)).await?;
        Ok(())
    }
}
