//! Storage-agnostic contract for user records.

use async_trait::async_trait;

use crate::error::Result;
use crate::user::{User, UserFilter, UserPatch};

/// Port for user persistence.
///
/// Soft-deleted records are invisible to every read. Failures are
/// [`ServerError::NotFound`](crate::error::ServerError::NotFound),
/// [`ServerError::Conflict`](crate::error::ServerError::Conflict) on a
/// duplicate email, or [`ServerError::Store`](crate::error::ServerError::Store).
///
/// Dropping a returned future aborts the underlying I/O.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a user whose id is already assigned.
    async fn create(&self, user: &User) -> Result<()>;

    /// Find a live user by id.
    async fn read_one(&self, id: &str) -> Result<User>;

    /// Find a live user by email.
    async fn read_by_email(&self, email: &str) -> Result<User>;

    /// Find the live users among `ids`. Missing ids are skipped.
    async fn read_many(&self, ids: &[String]) -> Result<Vec<User>>;

    /// List live users matching `filter`, oldest first.
    async fn read_all(&self, filter: &UserFilter) -> Result<Vec<User>>;

    /// Apply `patch` and bump `updated_at`. Returns the updated record.
    async fn update(&self, id: &str, patch: &UserPatch) -> Result<User>;

    /// Soft-delete a live user.
    async fn delete(&self, id: &str) -> Result<()>;
}
