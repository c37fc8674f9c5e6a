//! Cached access to users.
//!
//! Reads go through the cache first and populate it on a miss. Writes go to
//! the store first, then drop every key the change can affect. The cache is
//! best-effort: its failures are logged and treated as misses, never
//! reported to the caller.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::cache::{Cache, CacheKey, DEFAULT_TTL};
use crate::crypto::PasswordManager;
use crate::error::{Result, ServerError};
use crate::user::{
    NewUser, User, UserFilter, UserPatch, UserRepository, UserResponse,
    UserUpdate, non_blank, normalize_email,
};

/// User manager.
#[derive(Clone)]
pub struct UserService {
    repo: Arc<dyn UserRepository>,
    cache: Arc<dyn Cache>,
    pwd: Arc<PasswordManager>,
    ttl: Duration,
}

impl UserService {
    /// Create a new [`UserService`]. Pass [`NoCache`](crate::cache::NoCache)
    /// to disable caching.
    pub fn new(
        repo: Arc<dyn UserRepository>,
        cache: Arc<dyn Cache>,
        pwd: Arc<PasswordManager>,
    ) -> Self {
        Self {
            repo,
            cache,
            pwd,
            ttl: DEFAULT_TTL,
        }
    }

    /// Update time-to-live of written cache entries.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Every path that ends up reading the store counts as a miss.
    async fn cached<T: DeserializeOwned>(&self, key: &CacheKey) -> Option<T> {
        let raw = match self.cache.get(key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                Self::miss(key);
                return None;
            },
            Err(err) => {
                tracing::warn!(%key, error = %err, "cache lookup failed");
                Self::miss(key);
                return None;
            },
        };

        match serde_json::from_str(&raw) {
            Ok(value) => {
                metrics::counter!("cache_hits_total", "kind" => key.kind())
                    .increment(1);
                tracing::debug!(%key, "cache hit");
                Some(value)
            },
            Err(err) => {
                tracing::warn!(%key, error = %err, "cache entry is corrupted");
                Self::miss(key);
                None
            },
        }
    }

    fn miss(key: &CacheKey) {
        metrics::counter!("cache_misses_total", "kind" => key.kind())
            .increment(1);
    }

    async fn populate<T: Serialize>(&self, key: CacheKey, value: &T) {
        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(err) => {
                tracing::warn!(%key, error = %err, "cannot serialize cache entry");
                return;
            },
        };

        if let Err(err) = self.cache.set(&key, raw, self.ttl).await {
            tracing::warn!(%key, error = %err, "cache write failed");
        }
    }

    async fn invalidate(&self, keys: &[CacheKey]) {
        if let Err(err) = self.cache.delete(keys).await {
            tracing::warn!(?keys, error = %err, "cache invalidation failed");
        }
    }

    fn invalidation_set(user: &User) -> Vec<CacheKey> {
        vec![
            CacheKey::AllUsers,
            CacheKey::UserId(user.id.clone()),
            CacheKey::UserEmail(user.email.clone()),
        ]
    }

    /// Find a user by id.
    pub async fn get_by_id(&self, id: &str) -> Result<UserResponse> {
        let key = CacheKey::UserId(id.to_owned());
        if let Some(user) = self.cached(&key).await {
            return Ok(user);
        }

        let user = UserResponse::from(&self.repo.read_one(id).await?);
        self.populate(key, &user).await;
        Ok(user)
    }

    /// Find a user by email.
    pub async fn get_by_email(&self, email: &str) -> Result<UserResponse> {
        let email = normalize_email(email);
        let key = CacheKey::UserEmail(email.clone());
        if let Some(user) = self.cached(&key).await {
            return Ok(user);
        }

        let user = UserResponse::from(&self.repo.read_by_email(&email).await?);
        self.populate(key, &user).await;
        Ok(user)
    }

    /// List users. Only the unfiltered listing is cached.
    pub async fn get_all(
        &self,
        filter: &UserFilter,
    ) -> Result<Vec<UserResponse>> {
        if !filter.is_empty() {
            let users = self.repo.read_all(filter).await?;
            return Ok(users.iter().map(UserResponse::from).collect());
        }

        let key = CacheKey::AllUsers;
        if let Some(users) = self.cached(&key).await {
            return Ok(users);
        }

        let users: Vec<UserResponse> = self
            .repo
            .read_all(filter)
            .await?
            .iter()
            .map(UserResponse::from)
            .collect();
        self.populate(key, &users).await;
        Ok(users)
    }

    /// Find every user in `ids`, in the requested order.
    ///
    /// All or nothing: a single unknown id fails the whole lookup with
    /// [`ServerError::NotFound`]. Never cached.
    pub async fn get_many(&self, ids: &[String]) -> Result<Vec<UserResponse>> {
        let mut seen = HashSet::with_capacity(ids.len());
        let ids: Vec<String> =
            ids.iter().filter(|id| seen.insert(*id)).cloned().collect();
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut found: HashMap<String, User> = self
            .repo
            .read_many(&ids)
            .await?
            .into_iter()
            .map(|user| (user.id.clone(), user))
            .collect();

        ids.iter()
            .map(|id| {
                found
                    .remove(id)
                    .map(|user| UserResponse::from(&user))
                    .ok_or(ServerError::NotFound)
            })
            .collect()
    }

    /// Create a user. The password is hashed before reaching the store.
    pub async fn create(&self, new_user: NewUser) -> Result<UserResponse> {
        let hash = self.pwd.hash_password(&new_user.password)?;

        let user = User::builder()
            .email(normalize_email(&new_user.email))
            .password(hash)
            .name(new_user.name.trim())
            .lastname(new_user.lastname.trim())
            .birthdate(new_user.birthdate)
            .role(new_user.role)
            .avatar(new_user.avatar)
            .build();

        self.repo.create(&user).await?;
        tracing::info!(user_id = %user.id, "user created");

        self.invalidate(&Self::invalidation_set(&user)).await;
        Ok(UserResponse::from(&user))
    }

    /// Apply a partial update. Absent or blank fields are left unchanged; a
    /// new password is hashed, otherwise the stored hash is kept.
    pub async fn update(
        &self,
        id: &str,
        update: UserUpdate,
    ) -> Result<UserResponse> {
        let current = self.repo.read_one(id).await?;

        let password = match update.password.filter(|p| !p.is_empty()) {
            Some(password) => Some(self.pwd.hash_password(password)?),
            None => None,
        };
        let patch = UserPatch {
            name: non_blank(update.name),
            lastname: non_blank(update.lastname),
            birthdate: update.birthdate,
            role: non_blank(update.role),
            email: non_blank(update.email).map(|e| normalize_email(&e)),
            password,
            avatar: non_blank(update.avatar),
        };

        if patch.is_empty() {
            return Ok(UserResponse::from(&current));
        }

        let updated = self.repo.update(id, &patch).await?;
        tracing::info!(user_id = %id, "user updated");

        let mut keys = Self::invalidation_set(&current);
        if updated.email != current.email {
            keys.push(CacheKey::UserEmail(updated.email.clone()));
        }
        self.invalidate(&keys).await;

        Ok(UserResponse::from(&updated))
    }

    /// Soft-delete a user.
    pub async fn delete(&self, id: &str) -> Result<()> {
        let current = self.repo.read_one(id).await?;

        self.repo.delete(id).await?;
        tracing::info!(user_id = %id, "user deleted");

        self.invalidate(&Self::invalidation_set(&current)).await;
        Ok(())
    }

    /// Check credentials and return the matching user.
    ///
    /// Always reads the stored hash from the store: cache entries never carry
    /// a password. An unknown email fails like a wrong password.
    pub async fn login(
        &self,
        email: &str,
        password: &str,
    ) -> Result<UserResponse> {
        let email = normalize_email(email);

        let user = match self.repo.read_by_email(&email).await {
            Ok(user) => user,
            Err(ServerError::NotFound) => {
                return Err(ServerError::InvalidCredentials);
            },
            Err(err) => return Err(err),
        };

        if !self.pwd.verify_password(password, &user.password) {
            tracing::debug!(user_id = %user.id, "wrong password");
            return Err(ServerError::InvalidCredentials);
        }

        let response = UserResponse::from(&user);
        self.populate(CacheKey::UserEmail(email), &response).await;
        Ok(response)
    }
}
