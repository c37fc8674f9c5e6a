mod builder;
pub mod memory;
pub mod postgres;
mod repository;
mod service;

pub use builder::*;
pub use repository::*;
pub use service::*;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ServerError;

/// Role given to users created without one.
pub const DEFAULT_ROLE: &str = "user";
/// Avatar given to users created without one.
pub const DEFAULT_AVATAR: &str = "https://i.postimg.cc/wTgNFWhR/profile.png";

/// User as saved on database.
///
/// Deliberately not `Serialize`: the password hash must only leave the store
/// through [`UserResponse`], which drops it.
#[derive(Clone, Debug, PartialEq, sqlx::FromRow)]
pub struct User {
    pub id: String,
    pub name: String,
    pub lastname: String,
    pub birthdate: NaiveDate,
    pub role: String,
    pub email: String,
    /// Argon2 PHC string.
    pub password: String,
    pub avatar: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl User {
    /// Start a typed [`UserBuilder`].
    pub fn builder() -> UserBuilder<Missing, Missing> {
        UserBuilder::new()
    }
}

/// Public projection of a [`User`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: String,
    pub name: String,
    pub lastname: String,
    pub birthdate: NaiveDate,
    pub role: String,
    pub email: String,
    pub avatar: String,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            name: user.name.clone(),
            lastname: user.lastname.clone(),
            birthdate: user.birthdate,
            role: user.role.clone(),
            email: user.email.clone(),
            avatar: user.avatar.clone(),
        }
    }
}

/// Data required to create a user. `password` is plaintext.
#[derive(Clone, Debug, Default)]
pub struct NewUser {
    pub name: String,
    pub lastname: String,
    pub birthdate: NaiveDate,
    pub role: Option<String>,
    pub email: String,
    pub password: String,
    pub avatar: Option<String>,
}

/// Partial update requested by a caller. `password` is plaintext.
///
/// Absent and blank fields both mean "unchanged".
#[derive(Clone, Debug, Default)]
pub struct UserUpdate {
    pub name: Option<String>,
    pub lastname: Option<String>,
    pub birthdate: Option<NaiveDate>,
    pub role: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub avatar: Option<String>,
}

/// Partial update as applied by a [`UserRepository`]. `password` is already
/// hashed.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct UserPatch {
    pub name: Option<String>,
    pub lastname: Option<String>,
    pub birthdate: Option<NaiveDate>,
    pub role: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub avatar: Option<String>,
}

impl UserPatch {
    /// Whether the patch changes nothing.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Apply present fields on `user`.
    pub fn apply(&self, user: &mut User) {
        if let Some(name) = &self.name {
            user.name.clone_from(name);
        }
        if let Some(lastname) = &self.lastname {
            user.lastname.clone_from(lastname);
        }
        if let Some(birthdate) = self.birthdate {
            user.birthdate = birthdate;
        }
        if let Some(role) = &self.role {
            user.role.clone_from(role);
        }
        if let Some(email) = &self.email {
            user.email.clone_from(email);
        }
        if let Some(password) = &self.password {
            user.password.clone_from(password);
        }
        if let Some(avatar) = &self.avatar {
            user.avatar.clone_from(avatar);
        }
    }
}

/// Trim a string field, mapping blank values to `None`.
pub(crate) fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

/// Canonical form of an email, used for storage, lookups and cache keys.
pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Field of a [`User`] that listings may be filtered on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FilterField {
    Id,
    Name,
    Lastname,
    Birthdate,
    Role,
    Email,
    Avatar,
}

impl FilterField {
    fn parse(name: &str) -> Option<Self> {
        Some(match name {
            "id" => Self::Id,
            "name" => Self::Name,
            "lastname" => Self::Lastname,
            "birthdate" => Self::Birthdate,
            "role" => Self::Role,
            "email" => Self::Email,
            "avatar" => Self::Avatar,
            _ => return None,
        })
    }

    /// Column holding the field.
    pub fn column(&self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Name => "name",
            Self::Lastname => "lastname",
            Self::Birthdate => "birthdate",
            Self::Role => "role",
            Self::Email => "email",
            Self::Avatar => "avatar",
        }
    }

    /// Text value of the field on `user`, as compared by filters.
    pub fn value_of(&self, user: &User) -> String {
        match self {
            Self::Id => user.id.clone(),
            Self::Name => user.name.clone(),
            Self::Lastname => user.lastname.clone(),
            Self::Birthdate => user.birthdate.format("%Y-%m-%d").to_string(),
            Self::Role => user.role.clone(),
            Self::Email => user.email.clone(),
            Self::Avatar => user.avatar.clone(),
        }
    }
}

/// Field-equality predicates for listings. An empty filter matches every
/// live user.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct UserFilter {
    predicates: Vec<(FilterField, String)>,
}

impl UserFilter {
    /// Filter matching every live user.
    pub fn all() -> Self {
        Self::default()
    }

    /// Add an equality predicate.
    pub fn with(mut self, field: FilterField, value: impl Into<String>) -> Self {
        let value = value.into();
        let value = if field == FilterField::Email {
            normalize_email(&value)
        } else {
            value
        };
        self.predicates.push((field, value));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    pub fn predicates(&self) -> &[(FilterField, String)] {
        &self.predicates
    }

    /// Whether `user` satisfies every predicate.
    pub fn matches(&self, user: &User) -> bool {
        self.predicates
            .iter()
            .all(|(field, value)| field.value_of(user) == *value)
    }
}

impl TryFrom<serde_json::Map<String, serde_json::Value>> for UserFilter {
    type Error = ServerError;

    fn try_from(
        map: serde_json::Map<String, serde_json::Value>,
    ) -> Result<Self, Self::Error> {
        map.into_iter().try_fold(Self::all(), |filter, (name, value)| {
            let field = FilterField::parse(&name).ok_or_else(|| {
                ServerError::InvalidFilter(format!("unknown field `{name}`"))
            })?;
            let serde_json::Value::String(value) = value else {
                return Err(ServerError::InvalidFilter(format!(
                    "field `{name}` must be a string"
                )));
            };
            Ok(filter.with(field, value))
        })
    }
}

/// Lenient (de)serialization for birth dates: `YYYY-MM-DD` or any RFC 3339
/// timestamp, of which only the date is kept.
pub mod birthdate {
    use chrono::{DateTime, NaiveDate};
    use serde::{Deserialize, Deserializer, de};

    fn parse<E: de::Error>(value: &str) -> Result<NaiveDate, E> {
        NaiveDate::parse_from_str(value, "%Y-%m-%d")
            .or_else(|_| {
                DateTime::parse_from_rfc3339(value).map(|dt| dt.date_naive())
            })
            .map_err(|_| {
                E::custom(format!(
                    "invalid date `{value}`, expected YYYY-MM-DD"
                ))
            })
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveDate, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        parse(&value)
    }

    pub mod option {
        use super::*;

        pub fn deserialize<'de, D>(
            deserializer: D,
        ) -> Result<Option<NaiveDate>, D::Error>
        where
            D: Deserializer<'de>,
        {
            match Option::<String>::deserialize(deserializer)? {
                Some(value) if !value.trim().is_empty() => {
                    parse(&value).map(Some)
                },
                _ => Ok(None),
            }
        }
    }
}
