//! Typed builder for User.

use chrono::{NaiveDate, Utc};

use crate::user::{DEFAULT_AVATAR, DEFAULT_ROLE, User, non_blank};

/// [`User`] builder. A user cannot be built without an email and a password
/// hash.
#[derive(Debug, Clone)]
pub struct UserBuilder<Email, Password> {
    id: Option<String>,
    name: String,
    lastname: String,
    birthdate: NaiveDate,
    role: String,
    email: Email,
    password: Password,
    avatar: String,
}

/// Value is missing on [`UserBuilder`].
#[derive(Debug, Clone)]
pub struct Missing;

/// Value is present on [`UserBuilder`].
#[derive(Debug, Clone)]
pub struct Present<T>(pub T);

impl Default for UserBuilder<Missing, Missing> {
    fn default() -> Self {
        Self::new()
    }
}

impl UserBuilder<Missing, Missing> {
    /// Create a new [`UserBuilder`].
    pub fn new() -> Self {
        Self {
            id: None,
            name: String::default(),
            lastname: String::default(),
            birthdate: NaiveDate::default(),
            role: DEFAULT_ROLE.to_owned(),
            email: Missing,
            password: Missing,
            avatar: DEFAULT_AVATAR.to_owned(),
        }
    }
}

impl<Password> UserBuilder<Missing, Password> {
    /// Update `email` field on [`UserBuilder`].
    pub fn email(
        self,
        email: impl Into<String>,
    ) -> UserBuilder<Present<String>, Password> {
        UserBuilder {
            id: self.id,
            name: self.name,
            lastname: self.lastname,
            birthdate: self.birthdate,
            role: self.role,
            email: Present(email.into()),
            password: self.password,
            avatar: self.avatar,
        }
    }
}

impl<Email> UserBuilder<Email, Missing> {
    /// Update `password` field on [`UserBuilder`]. Expects a hash.
    pub fn password(
        self,
        hash: impl Into<String>,
    ) -> UserBuilder<Email, Present<String>> {
        UserBuilder {
            id: self.id,
            name: self.name,
            lastname: self.lastname,
            birthdate: self.birthdate,
            role: self.role,
            email: self.email,
            password: Present(hash.into()),
            avatar: self.avatar,
        }
    }
}

impl<Email, Password> UserBuilder<Email, Password> {
    /// Force `id` instead of generating one.
    pub fn id(mut self, id: impl ToString) -> Self {
        self.id = Some(id.to_string());
        self
    }

    /// Update `name` field on [`UserBuilder`].
    pub fn name(mut self, name: impl ToString) -> Self {
        self.name = name.to_string();
        self
    }

    /// Update `lastname` field on [`UserBuilder`].
    pub fn lastname(mut self, lastname: impl ToString) -> Self {
        self.lastname = lastname.to_string();
        self
    }

    /// Update `birthdate` field on [`UserBuilder`].
    pub fn birthdate(mut self, birthdate: NaiveDate) -> Self {
        self.birthdate = birthdate;
        self
    }

    /// Update `role` field on [`UserBuilder`]. Blank keeps the default.
    pub fn role(mut self, role: Option<String>) -> Self {
        if let Some(role) = non_blank(role) {
            self.role = role;
        }
        self
    }

    /// Update `avatar` field on [`UserBuilder`]. Blank keeps the default.
    pub fn avatar(mut self, avatar: Option<String>) -> Self {
        if let Some(avatar) = non_blank(avatar) {
            self.avatar = avatar;
        }
        self
    }
}

impl UserBuilder<Present<String>, Present<String>> {
    /// Build a [`User`], assigning a fresh id unless one was forced.
    pub fn build(self) -> User {
        let now = Utc::now();

        User {
            id: self
                .id
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            name: self.name,
            lastname: self.lastname,
            birthdate: self.birthdate,
            role: self.role,
            email: self.email.0,
            password: self.password.0,
            avatar: self.avatar,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let user = UserBuilder::new()
            .email("ana@x.com")
            .password("hash")
            .role(Some("  ".into()))
            .avatar(None)
            .build();

        assert_eq!(user.role, DEFAULT_ROLE);
        assert_eq!(user.avatar, DEFAULT_AVATAR);
        assert_eq!(user.created_at, user.updated_at);
        assert!(user.deleted_at.is_none());
        assert!(uuid::Uuid::parse_str(&user.id).is_ok());
    }

    #[test]
    fn test_ids_are_unique() {
        let build = || {
            UserBuilder::new()
                .password("hash")
                .email("ana@x.com")
                .build()
        };
        assert_ne!(build().id, build().id);
    }

    #[test]
    fn test_forced_values() {
        let user = User::builder()
            .id("fixed")
            .email("ana@x.com")
            .password("hash")
            .role(Some("admin".into()))
            .avatar(Some("https://cdn.x.com/a.png".into()))
            .build();

        assert_eq!(user.id, "fixed");
        assert_eq!(user.role, "admin");
        assert_eq!(user.avatar, "https://cdn.x.com/a.png");
    }
}
