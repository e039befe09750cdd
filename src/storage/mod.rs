//! # Storage Module - Moderation Store
//!
//! Durable record of chat participants, the messages they sent, the forbidden-word list,
//! and named counters. The rest of the pipeline only talks to the [`ModerationStore`]
//! trait; [`SledModerationStore`] is the production backend.
//!
//! ## Layout
//!
//! ```text
//! printbot.db/
//! ├── users         ← id (u64 BE) → UserRecord
//! ├── user_names    ← name → id (u64 BE)
//! ├── messages      ← id (u64 BE) → MessageRecord
//! ├── badwords      ← lower-cased word → BadWordRecord
//! └── statistics    ← counter name → StatisticRecord
//! ```
//!
//! Values are `bincode`-encoded and carry a schema version byte. Ids come from
//! [`sled::Db::generate_id`], so they are monotonic and never handed out twice.
//!
//! ## Moderation
//!
//! [`ModerationStore::is_blocked`] lower-cases the text and tests every stored word as a
//! plain substring. There is no word-boundary logic, so `"class"` is blocked by `"ass"`.

pub mod errors;
pub mod types;

use std::path::Path;

use chrono::Utc;
use log::debug;
use sled::transaction::{ConflictableTransactionError, TransactionError};
use sled::{IVec, Transactional};

pub use errors::StoreError;
pub use types::{
    BadWordRecord, MessageId, MessageRecord, StatisticRecord, UserId, UserRecord,
    BAD_WORD_SCHEMA_VERSION, MESSAGE_SCHEMA_VERSION, STATISTIC_SCHEMA_VERSION,
    USER_SCHEMA_VERSION,
};

use crate::validation::{
    normalize_bad_word, strip_control_chars, truncate_chars, validate_user_name,
    MAX_MESSAGE_CHARS,
};

const TREE_USERS: &str = "users";
const TREE_USER_NAMES: &str = "user_names";
const TREE_MESSAGES: &str = "messages";
const TREE_BAD_WORDS: &str = "badwords";
const TREE_STATISTICS: &str = "statistics";

/// Counter names maintained by the pipeline.
pub mod stats {
    pub const MESSAGES_RECEIVED: &str = "messages_received";
    pub const MESSAGES_BLOCKED: &str = "messages_blocked";
    pub const PRINT_REQUESTS: &str = "print_requests";
    pub const MESSAGES_PRINTED: &str = "messages_printed";
    pub const PRINT_FAILURES: &str = "print_failures";
    pub const PINGS_ANSWERED: &str = "pings_answered";
}

/// Persistence and moderation contract used by the chat pipeline.
pub trait ModerationStore {
    /// Return the id for `name`, creating the user on first sight.
    fn ensure_user(&self, name: &str) -> Result<UserId, StoreError>;

    /// Persist a new message with `printed = false` and `blocked` computed by
    /// [`is_blocked`](Self::is_blocked). `user_id` must refer to an existing user.
    fn record_message(&self, user_id: UserId, text: &str) -> Result<MessageRecord, StoreError>;

    /// Case-insensitive substring test against every forbidden word.
    fn is_blocked(&self, text: &str) -> Result<bool, StoreError>;

    /// Flag a message as delivered to the rendering sink.
    fn mark_printed(&self, message_id: MessageId) -> Result<(), StoreError>;

    /// Add `delta` to the named counter, creating it at zero first if needed.
    fn increment_statistic(&self, name: &str, delta: i64) -> Result<i64, StoreError>;
}

/// Sled-backed moderation store.
pub struct SledModerationStore {
    db: sled::Db,
    users: sled::Tree,
    user_names: sled::Tree,
    messages: sled::Tree,
    bad_words: sled::Tree,
    statistics: sled::Tree,
}

impl SledModerationStore {
    /// Open (or create) the store rooted at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path_ref = path.as_ref();
        std::fs::create_dir_all(path_ref)?;
        let db = sled::open(path_ref)?;
        let users = db.open_tree(TREE_USERS)?;
        let user_names = db.open_tree(TREE_USER_NAMES)?;
        let messages = db.open_tree(TREE_MESSAGES)?;
        let bad_words = db.open_tree(TREE_BAD_WORDS)?;
        let statistics = db.open_tree(TREE_STATISTICS)?;
        debug!("opened moderation store at {}", path_ref.display());
        Ok(Self {
            db,
            users,
            user_names,
            messages,
            bad_words,
            statistics,
        })
    }

    fn id_key(id: u64) -> [u8; 8] {
        id.to_be_bytes()
    }

    fn id_from_bytes(bytes: &[u8]) -> Result<u64, StoreError> {
        let raw: [u8; 8] = bytes
            .try_into()
            .map_err(|_| StoreError::NotFound("malformed id in user_names".to_string()))?;
        Ok(u64::from_be_bytes(raw))
    }

    fn serialize<T: serde::Serialize>(value: &T) -> Result<Vec<u8>, StoreError> {
        Ok(bincode::serialize(value)?)
    }

    fn deserialize<T: serde::de::DeserializeOwned>(bytes: IVec) -> Result<T, StoreError> {
        Ok(bincode::deserialize::<T>(&bytes)?)
    }

    fn check_schema(entity: &'static str, expected: u8, found: u8) -> Result<(), StoreError> {
        if expected != found {
            return Err(StoreError::SchemaMismatch {
                entity,
                expected,
                found,
            });
        }
        Ok(())
    }

    /// Fetch a user record by id.
    pub fn get_user(&self, user_id: UserId) -> Result<UserRecord, StoreError> {
        let Some(bytes) = self.users.get(Self::id_key(user_id))? else {
            return Err(StoreError::NotFound(format!("user: {}", user_id)));
        };
        let record: UserRecord = Self::deserialize(bytes)?;
        Self::check_schema("user", USER_SCHEMA_VERSION, record.schema_version)?;
        Ok(record)
    }

    /// Look up a user id by exact name without creating anything.
    pub fn find_user(&self, name: &str) -> Result<Option<UserId>, StoreError> {
        match self.user_names.get(name.as_bytes())? {
            Some(bytes) => Ok(Some(Self::id_from_bytes(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Fetch a message record by id.
    pub fn get_message(&self, message_id: MessageId) -> Result<MessageRecord, StoreError> {
        let Some(bytes) = self.messages.get(Self::id_key(message_id))? else {
            return Err(StoreError::NotFound(format!("message: {}", message_id)));
        };
        let record: MessageRecord = Self::deserialize(bytes)?;
        Self::check_schema("message", MESSAGE_SCHEMA_VERSION, record.schema_version)?;
        Ok(record)
    }

    /// All messages in arrival order.
    pub fn list_messages(&self) -> Result<Vec<MessageRecord>, StoreError> {
        self.messages
            .iter()
            .map(|entry| {
                entry
                    .map_err(StoreError::from)
                    .and_then(|(_key, value)| Self::deserialize(value))
            })
            .collect()
    }

    /// Number of stored messages.
    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    /// Number of stored users.
    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    /// Add a forbidden word. Returns false if the word was already present.
    pub fn add_bad_word(&self, word: &str) -> Result<bool, StoreError> {
        let word = normalize_bad_word(word)?;
        if self.bad_words.contains_key(word.as_bytes())? {
            return Ok(false);
        }
        let record = BadWordRecord {
            id: self.db.generate_id()?,
            word: word.clone(),
            schema_version: BAD_WORD_SCHEMA_VERSION,
        };
        self.bad_words
            .insert(word.as_bytes(), Self::serialize(&record)?)?;
        self.bad_words.flush()?;
        Ok(true)
    }

    /// Remove a forbidden word. Returns false if it was not present.
    pub fn remove_bad_word(&self, word: &str) -> Result<bool, StoreError> {
        let word = normalize_bad_word(word)?;
        let removed = self.bad_words.remove(word.as_bytes())?.is_some();
        self.bad_words.flush()?;
        Ok(removed)
    }

    /// All forbidden words in key order.
    pub fn list_bad_words(&self) -> Result<Vec<BadWordRecord>, StoreError> {
        self.bad_words
            .iter()
            .map(|entry| {
                entry
                    .map_err(StoreError::from)
                    .and_then(|(_key, value)| Self::deserialize(value))
            })
            .collect()
    }

    /// Current value of a counter, if it was ever incremented.
    pub fn get_statistic(&self, name: &str) -> Result<Option<i64>, StoreError> {
        match self.statistics.get(name.as_bytes())? {
            Some(bytes) => {
                let record: StatisticRecord = Self::deserialize(bytes)?;
                Ok(Some(record.value))
            }
            None => Ok(None),
        }
    }

    /// All counters in name order.
    pub fn list_statistics(&self) -> Result<Vec<StatisticRecord>, StoreError> {
        self.statistics
            .iter()
            .map(|entry| {
                entry
                    .map_err(StoreError::from)
                    .and_then(|(_key, value)| Self::deserialize(value))
            })
            .collect()
    }
}

impl ModerationStore for SledModerationStore {
    fn ensure_user(&self, name: &str) -> Result<UserId, StoreError> {
        let name = validate_user_name(name)?;
        if let Some(id) = self.find_user(&name)? {
            if self.users.contains_key(Self::id_key(id))? {
                return Ok(id);
            }
        }

        let fresh_id = self.db.generate_id()?;
        let fresh = Self::serialize(&UserRecord::new(fresh_id, &name))?;
        // The name claim and the user record commit together. A claim left without a
        // record is completed here instead of being handed out dangling.
        let outcome: Result<(UserId, bool), TransactionError<StoreError>> =
            (&self.user_names, &self.users).transaction(|(names, users)| {
                let id = match names.get(name.as_bytes())? {
                    Some(bytes) => {
                        Self::id_from_bytes(&bytes).map_err(ConflictableTransactionError::Abort)?
                    }
                    None => {
                        names.insert(name.as_bytes(), &Self::id_key(fresh_id)[..])?;
                        fresh_id
                    }
                };
                let key = Self::id_key(id);
                if users.get(&key[..])?.is_some() {
                    return Ok((id, false));
                }
                let value = if id == fresh_id {
                    fresh.clone()
                } else {
                    Self::serialize(&UserRecord::new(id, &name))
                        .map_err(ConflictableTransactionError::Abort)?
                };
                users.insert(&key[..], value)?;
                Ok((id, true))
            });
        let (id, created) = outcome.map_err(|e| match e {
            TransactionError::Abort(e) => e,
            TransactionError::Storage(e) => StoreError::Sled(e),
        })?;

        if created {
            self.db.flush()?;
            debug!("created user {} ({})", id, name);
        }
        Ok(id)
    }

    fn record_message(&self, user_id: UserId, text: &str) -> Result<MessageRecord, StoreError> {
        if !self.users.contains_key(Self::id_key(user_id))? {
            return Err(StoreError::NotFound(format!("user: {}", user_id)));
        }
        // Moderate the whole text; only the stored copy is bounded.
        let cleaned = strip_control_chars(text);
        let blocked = self.is_blocked(&cleaned)?;
        let text = truncate_chars(&cleaned, MAX_MESSAGE_CHARS);
        let id = self.db.generate_id()?;
        let record = MessageRecord::new(id, user_id, text, blocked);
        self.messages
            .insert(Self::id_key(id), Self::serialize(&record)?)?;
        self.messages.flush()?;
        Ok(record)
    }

    fn is_blocked(&self, text: &str) -> Result<bool, StoreError> {
        let lowered = text.to_lowercase();
        for entry in self.bad_words.iter() {
            let (_key, value) = entry?;
            let record: BadWordRecord = Self::deserialize(value)?;
            let word = record.word.to_lowercase();
            if !word.is_empty() && lowered.contains(&word) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn mark_printed(&self, message_id: MessageId) -> Result<(), StoreError> {
        let mut record = self.get_message(message_id)?;
        record.printed = true;
        self.messages
            .insert(Self::id_key(message_id), Self::serialize(&record)?)?;
        self.messages.flush()?;
        Ok(())
    }

    fn increment_statistic(&self, name: &str, delta: i64) -> Result<i64, StoreError> {
        let mut record = match self.statistics.get(name.as_bytes())? {
            Some(bytes) => {
                let record: StatisticRecord = Self::deserialize(bytes)?;
                Self::check_schema("statistic", STATISTIC_SCHEMA_VERSION, record.schema_version)?;
                record
            }
            None => StatisticRecord {
                name: name.to_string(),
                value: 0,
                updated_at: Utc::now(),
                schema_version: STATISTIC_SCHEMA_VERSION,
            },
        };
        record.value = record.value.saturating_add(delta);
        record.updated_at = Utc::now();
        self.statistics
            .insert(name.as_bytes(), Self::serialize(&record)?)?;
        self.statistics.flush()?;
        Ok(record.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open_store() -> (TempDir, SledModerationStore) {
        let dir = TempDir::new().expect("tempdir");
        let store = SledModerationStore::open(dir.path().join("db")).expect("store");
        (dir, store)
    }

    #[test]
    fn ensure_user_is_idempotent() {
        let (_dir, store) = open_store();
        let first = store.ensure_user("alice").expect("create");
        let second = store.ensure_user("alice").expect("lookup");
        assert_eq!(first, second);
        assert_eq!(store.user_count(), 1);

        let bob = store.ensure_user("bob").expect("create bob");
        assert_ne!(bob, first);
        assert_eq!(store.get_user(bob).unwrap().name, "bob");
    }

    #[test]
    fn dangling_name_claim_is_completed() {
        let (_dir, store) = open_store();
        store
            .user_names
            .insert("ghost", &SledModerationStore::id_key(77)[..])
            .unwrap();

        let id = store.ensure_user("ghost").expect("repair");
        assert_eq!(id, 77);
        assert_eq!(store.get_user(77).unwrap().name, "ghost");
        assert_eq!(store.record_message(id, "boo").unwrap().user_id, 77);
        assert_eq!(store.ensure_user("ghost").unwrap(), 77);
        assert_eq!(store.user_count(), 1);
    }

    #[test]
    fn blocked_word_past_storage_bound_still_blocks() {
        let (_dir, store) = open_store();
        store.add_bad_word("darn").unwrap();
        let uid = store.ensure_user("gina").unwrap();

        let tail = format!("{} darn", "a".repeat(600));
        let record = store.record_message(uid, &tail).unwrap();
        assert!(record.blocked);
        assert_eq!(record.text.chars().count(), MAX_MESSAGE_CHARS);

        let split = store.record_message(uid, "da\u{1}rn").unwrap();
        assert!(split.blocked);
        assert_eq!(split.text, "darn");
    }

    #[test]
    fn ensure_user_rejects_empty_name() {
        let (_dir, store) = open_store();
        assert!(matches!(
            store.ensure_user("  "),
            Err(StoreError::InvalidInput(_))
        ));
    }

    #[test]
    fn record_message_requires_existing_user() {
        let (_dir, store) = open_store();
        assert!(matches!(
            store.record_message(9999, "hello"),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn message_round_trip() {
        let (_dir, store) = open_store();
        let uid = store.ensure_user("carol").unwrap();
        let written = store.record_message(uid, "hello there").unwrap();
        let read = store.get_message(written.id).unwrap();
        assert_eq!(read.user_id, uid);
        assert_eq!(read.text, "hello there");
        assert!(!read.printed);
        assert!(!read.blocked);
        assert_eq!(read, written);
    }

    #[test]
    fn blocked_is_case_insensitive_substring() {
        let (_dir, store) = open_store();
        store.add_bad_word("Heck").unwrap();
        assert!(store.is_blocked("what the HECK").unwrap());
        assert!(store.is_blocked("checking heckle").unwrap());
        assert!(!store.is_blocked("all good here").unwrap());

        let uid = store.ensure_user("dave").unwrap();
        assert!(store.record_message(uid, "oh heck").unwrap().blocked);
        assert!(!store.record_message(uid, "oh well").unwrap().blocked);
    }

    #[test]
    fn mark_printed_sets_flag() {
        let (_dir, store) = open_store();
        let uid = store.ensure_user("erin").unwrap();
        let msg = store.record_message(uid, "print me").unwrap();
        store.mark_printed(msg.id).unwrap();
        assert!(store.get_message(msg.id).unwrap().printed);
        assert!(matches!(
            store.mark_printed(msg.id + 1000),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn statistics_upsert() {
        let (_dir, store) = open_store();
        assert_eq!(store.get_statistic("x").unwrap(), None);
        assert_eq!(store.increment_statistic("x", 1).unwrap(), 1);
        assert_eq!(store.increment_statistic("x", 4).unwrap(), 5);
        assert_eq!(store.get_statistic("x").unwrap(), Some(5));
        assert_eq!(store.list_statistics().unwrap().len(), 1);
    }

    #[test]
    fn bad_word_admin() {
        let (_dir, store) = open_store();
        assert!(store.add_bad_word("spam").unwrap());
        assert!(!store.add_bad_word("SPAM").unwrap());
        assert_eq!(store.list_bad_words().unwrap().len(), 1);
        assert!(store.remove_bad_word("Spam").unwrap());
        assert!(!store.remove_bad_word("spam").unwrap());
        assert!(store.list_bad_words().unwrap().is_empty());
    }

    #[test]
    fn data_survives_reopen() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("db");
        let (uid, mid) = {
            let store = SledModerationStore::open(&path).unwrap();
            let uid = store.ensure_user("frank").unwrap();
            let mid = store.record_message(uid, "persist").unwrap().id;
            (uid, mid)
        };
        let store = SledModerationStore::open(&path).unwrap();
        assert_eq!(store.ensure_user("frank").unwrap(), uid);
        assert_eq!(store.get_message(mid).unwrap().text, "persist");
    }
}
