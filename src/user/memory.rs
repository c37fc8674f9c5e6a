//! In-process document store.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::error::{Result, ServerError};
use crate::user::{User, UserFilter, UserPatch, UserRepository};

/// Users kept in memory, keyed by id. Soft-deleted documents stay in the map.
#[derive(Debug, Default)]
pub struct MemoryUserRepository {
    users: RwLock<HashMap<String, User>>,
}

impl MemoryUserRepository {
    /// Create a new, empty [`MemoryUserRepository`].
    pub fn new() -> Self {
        Self::default()
    }
}

fn email_taken(
    users: &HashMap<String, User>,
    email: &str,
    except: Option<&str>,
) -> bool {
    users
        .values()
        .any(|u| u.email == email && Some(u.id.as_str()) != except)
}

#[async_trait]
impl UserRepository for MemoryUserRepository {
    async fn create(&self, user: &User) -> Result<()> {
        let mut users = self.users.write().await;

        if users.contains_key(&user.id) {
            return Err(ServerError::Store(
                format!("id `{}` already exists", user.id).into(),
            ));
        }
        if email_taken(&users, &user.email, None) {
            return Err(ServerError::Conflict);
        }

        users.insert(user.id.clone(), user.clone());
        Ok(())
    }

    async fn read_one(&self, id: &str) -> Result<User> {
        self.users
            .read()
            .await
            .get(id)
            .filter(|u| u.deleted_at.is_none())
            .cloned()
            .ok_or(ServerError::NotFound)
    }

    async fn read_by_email(&self, email: &str) -> Result<User> {
        self.users
            .read()
            .await
            .values()
            .find(|u| u.email == email && u.deleted_at.is_none())
            .cloned()
            .ok_or(ServerError::NotFound)
    }

    async fn read_many(&self, ids: &[String]) -> Result<Vec<User>> {
        let users = self.users.read().await;

        Ok(ids
            .iter()
            .filter_map(|id| users.get(id))
            .filter(|u| u.deleted_at.is_none())
            .cloned()
            .collect())
    }

    async fn read_all(&self, filter: &UserFilter) -> Result<Vec<User>> {
        let mut users: Vec<User> = self
            .users
            .read()
            .await
            .values()
            .filter(|u| u.deleted_at.is_none() && filter.matches(u))
            .cloned()
            .collect();
        users.sort_by(|a, b| {
            a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id))
        });

        Ok(users)
    }

    async fn update(&self, id: &str, patch: &UserPatch) -> Result<User> {
        let mut users = self.users.write().await;

        if let Some(email) = &patch.email {
            if email_taken(&users, email, Some(id)) {
                return Err(ServerError::Conflict);
            }
        }

        let user = users
            .get_mut(id)
            .filter(|u| u.deleted_at.is_none())
            .ok_or(ServerError::NotFound)?;
        patch.apply(user);
        user.updated_at = Utc::now();

        Ok(user.clone())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let mut users = self.users.write().await;

        let user = users
            .get_mut(id)
            .filter(|u| u.deleted_at.is_none())
            .ok_or(ServerError::NotFound)?;
        let now = Utc::now();
        user.deleted_at = Some(now);
        user.updated_at = now;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::user::FilterField;
    use crate::user::tests::sample_user;

    #[tokio::test]
    async fn test_create_and_read() {
        let repo = MemoryUserRepository::new();
        let user = sample_user("1", "ana@x.com");
        repo.create(&user).await.unwrap();

        assert_eq!(repo.read_one("1").await.unwrap(), user);
        assert_eq!(repo.read_by_email("ana@x.com").await.unwrap(), user);
        assert!(matches!(
            repo.read_one("2").await,
            Err(ServerError::NotFound)
        ));
        assert!(matches!(
            repo.read_by_email("bob@x.com").await,
            Err(ServerError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_duplicate_email_conflicts() {
        let repo = MemoryUserRepository::new();
        repo.create(&sample_user("1", "ana@x.com")).await.unwrap();

        assert!(matches!(
            repo.create(&sample_user("2", "ana@x.com")).await,
            Err(ServerError::Conflict)
        ));

        repo.create(&sample_user("3", "bob@x.com")).await.unwrap();
        let patch = UserPatch {
            email: Some("ana@x.com".into()),
            ..Default::default()
        };
        assert!(matches!(
            repo.update("3", &patch).await,
            Err(ServerError::Conflict)
        ));
    }

    #[tokio::test]
    async fn test_update_bumps_timestamp() {
        let repo = MemoryUserRepository::new();
        let user = sample_user("1", "ana@x.com");
        repo.create(&user).await.unwrap();

        let patch = UserPatch {
            role: Some("admin".into()),
            ..Default::default()
        };
        let updated = repo.update("1", &patch).await.unwrap();
        assert_eq!(updated.role, "admin");
        assert_eq!(updated.name, user.name);
        assert_eq!(updated.created_at, user.created_at);
        assert!(updated.updated_at >= user.updated_at);

        assert!(matches!(
            repo.update("missing", &patch).await,
            Err(ServerError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_soft_delete() {
        let repo = MemoryUserRepository::new();
        repo.create(&sample_user("1", "ana@x.com")).await.unwrap();
        repo.create(&sample_user("2", "bob@x.com")).await.unwrap();

        repo.delete("1").await.unwrap();

        assert!(matches!(repo.read_one("1").await, Err(ServerError::NotFound)));
        assert!(matches!(
            repo.read_by_email("ana@x.com").await,
            Err(ServerError::NotFound)
        ));
        assert!(matches!(repo.delete("1").await, Err(ServerError::NotFound)));
        assert_eq!(repo.read_all(&UserFilter::all()).await.unwrap().len(), 1);
        assert_eq!(
            repo.read_many(&["1".into(), "2".into()]).await.unwrap().len(),
            1
        );
        // Still physically present: the email stays reserved.
        assert!(matches!(
            repo.create(&sample_user("3", "ana@x.com")).await,
            Err(ServerError::Conflict)
        ));
    }

    #[tokio::test]
    async fn test_read_many_and_filter() {
        let repo = MemoryUserRepository::new();
        repo.create(&sample_user("a", "a@x.com")).await.unwrap();
        repo.create(&sample_user("b", "b@x.com")).await.unwrap();

        let found = repo
            .read_many(&["a".into(), "b".into(), "c".into()])
            .await
            .unwrap();
        assert_eq!(found.len(), 2);

        let filter = UserFilter::all().with(FilterField::Email, "b@x.com");
        let users = repo.read_all(&filter).await.unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].id, "b");
    }
}
