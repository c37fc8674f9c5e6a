//! Cache-aside storage for user projections.
//!
//! Entries are opaque JSON strings. Three key shapes exist, see [`CacheKey`].
//! Every backend honours a per-entry time-to-live and nothing else: no
//! sliding expiration, no refresh on read.

mod memory;
mod redis;

pub use memory::MemoryCache;
pub use self::redis::RedisCache;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;

/// Expiry applied to every entry.
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

const ALL_USERS: &str = "all_users";
const USER_ID_PREFIX: &str = "user_id:";
const USER_EMAIL_PREFIX: &str = "user_email:";

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error(transparent)]
    Redis(#[from] ::redis::RedisError),
}

/// Deterministic cache keys. Kinds never collide: `all_users` carries no
/// separator and the two single-user kinds use distinct prefixes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// Unfiltered listing of every live user.
    AllUsers,
    /// One user by id.
    UserId(String),
    /// One user by email.
    UserEmail(String),
}

impl CacheKey {
    /// Short label used in metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            CacheKey::AllUsers => "all_users",
            CacheKey::UserId(_) => "user_id",
            CacheKey::UserEmail(_) => "user_email",
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheKey::AllUsers => f.write_str(ALL_USERS),
            CacheKey::UserId(id) => write!(f, "{USER_ID_PREFIX}{id}"),
            CacheKey::UserEmail(email) => {
                write!(f, "{USER_EMAIL_PREFIX}{email}")
            },
        }
    }
}

/// Best-effort key/value cache.
///
/// Callers treat every error as a miss; implementations only report them.
#[async_trait]
pub trait Cache: Send + Sync {
    /// Fetch a live entry.
    async fn get(&self, key: &CacheKey) -> Result<Option<String>, CacheError>;

    /// Store an entry that expires after `ttl`.
    async fn set(
        &self,
        key: &CacheKey,
        value: String,
        ttl: Duration,
    ) -> Result<(), CacheError>;

    /// Remove entries. Missing keys are not an error.
    async fn delete(&self, keys: &[CacheKey]) -> Result<(), CacheError>;
}

/// Cache used when none is configured or reachable: every lookup misses and
/// every write is dropped.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCache;

#[async_trait]
impl Cache for NoCache {
    async fn get(&self, _key: &CacheKey) -> Result<Option<String>, CacheError> {
        Ok(None)
    }

    async fn set(
        &self,
        _key: &CacheKey,
        _value: String,
        _ttl: Duration,
    ) -> Result<(), CacheError> {
        Ok(())
    }

    async fn delete(&self, _keys: &[CacheKey]) -> Result<(), CacheError> {
        Ok(())
    }
}
