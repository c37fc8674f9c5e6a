//! PostgreSQL implementation for user repository.

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::error::{Result, ServerError, ToStoreError};
use crate::user::{User, UserFilter, UserPatch, UserRepository};

const COLUMNS: &str = "id, name, lastname, birthdate, role, email, password, \
                       avatar, created_at, updated_at, deleted_at";

/// PostgreSQL user repository. Deletion sets `deleted_at`.
#[derive(Clone)]
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    /// Create a new [`PgUserRepository`].
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn create(&self, user: &User) -> Result<()> {
        sqlx::query(
            r#"INSERT INTO users (
                id, name, lastname, birthdate, role, email, password,
                avatar, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)"#,
        )
        .bind(&user.id)
        .bind(&user.name)
        .bind(&user.lastname)
        .bind(user.birthdate)
        .bind(&user.role)
        .bind(&user.email)
        .bind(&user.password)
        .bind(&user.avatar)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await
        .catch()?;

        Ok(())
    }

    async fn read_one(&self, id: &str) -> Result<User> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {COLUMNS} FROM users WHERE id = $1 AND deleted_at IS NULL"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .catch()?
        .ok_or(ServerError::NotFound)
    }

    async fn read_by_email(&self, email: &str) -> Result<User> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {COLUMNS} FROM users WHERE email = $1 AND deleted_at IS NULL"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .catch()?
        .ok_or(ServerError::NotFound)
    }

    async fn read_many(&self, ids: &[String]) -> Result<Vec<User>> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {COLUMNS} FROM users
            WHERE id = ANY($1) AND deleted_at IS NULL
            ORDER BY created_at, id"
        ))
        .bind(ids)
        .fetch_all(&self.pool)
        .await
        .catch()
    }

    async fn read_all(&self, filter: &UserFilter) -> Result<Vec<User>> {
        let mut query: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "SELECT {COLUMNS} FROM users WHERE deleted_at IS NULL"
        ));
        for (field, value) in filter.predicates() {
            // Column names come from a closed enum, values are bound.
            query
                .push(format!(" AND {}::TEXT = ", field.column()))
                .push_bind(value.clone());
        }
        query.push(" ORDER BY created_at, id");

        query
            .build_query_as::<User>()
            .fetch_all(&self.pool)
            .await
            .catch()
    }

    async fn update(&self, id: &str, patch: &UserPatch) -> Result<User> {
        sqlx::query_as::<_, User>(&format!(
            r#"UPDATE users
            SET
                name = COALESCE($2, name),
                lastname = COALESCE($3, lastname),
                birthdate = COALESCE($4, birthdate),
                role = COALESCE($5, role),
                email = COALESCE($6, email),
                password = COALESCE($7, password),
                avatar = COALESCE($8, avatar),
                updated_at = NOW()
            WHERE id = $1 AND deleted_at IS NULL
            RETURNING {COLUMNS}"#
        ))
        .bind(id)
        .bind(&patch.name)
        .bind(&patch.lastname)
        .bind(patch.birthdate)
        .bind(&patch.role)
        .bind(&patch.email)
        .bind(&patch.password)
        .bind(&patch.avatar)
        .fetch_optional(&self.pool)
        .await
        .catch()?
        .ok_or(ServerError::NotFound)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let result = sqlx::query(
            r#"UPDATE users SET deleted_at = NOW(), updated_at = NOW()
            WHERE id = $1 AND deleted_at IS NULL"#,
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .catch()?;

        if result.rows_affected() == 0 {
            return Err(ServerError::NotFound);
        }

        Ok(())
    }
}
