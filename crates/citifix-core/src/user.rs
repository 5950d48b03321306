//! Users, roles and the authenticated actor

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type UserId = u64;

pub const MIN_PASSWORD_LEN: usize = 8;

/// Role held by a user
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[default]
    Citizen,
    Officer,
    Admin,
}

impl Role {
    /// May triage issues (status and assignment)
    pub fn is_staff(&self) -> bool {
        matches!(self, Role::Officer | Role::Admin)
    }
}

impl std::str::FromStr for Role {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "citizen" => Ok(Role::Citizen),
            "officer" => Ok(Role::Officer),
            "admin" => Ok(Role::Admin),
            _ => Err(crate::Error::InvalidRole(s.to_string())),
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Citizen => write!(f, "citizen"),
            Role::Officer => write!(f, "officer"),
            Role::Admin => write!(f, "admin"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
    /// argon2 PHC string
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub password_hash: String,
    /// Gamification balance, may dip below zero after deductions
    pub points: i64,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(id: UserId, name: String, email: String, password_hash: String, role: Role) -> Self {
        Self {
            id,
            name,
            email: email.to_lowercase(),
            password_hash,
            points: 0,
            role,
            created_at: Utc::now(),
        }
    }

    pub fn actor(&self) -> Actor {
        Actor {
            user_id: self.id,
            role: self.role,
        }
    }

    /// Copy without credentials, for responses
    pub fn public(&self) -> PublicUser {
        PublicUser {
            id: self.id,
            name: self.name.clone(),
            email: self.email.clone(),
            points: self.points,
            role: self.role,
        }
    }
}

/// User as exposed over the API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicUser {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub points: i64,
    pub role: Role,
}

/// Identity and role of whoever performs an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: UserId,
    pub role: Role,
}

impl Actor {
    pub fn new(user_id: UserId, role: Role) -> Self {
        Self { user_id, role }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn is_staff(&self) -> bool {
        self.role.is_staff()
    }
}

/// Active login, keyed by the SHA-256 of the bearer token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub token_hash: String,
    pub user_id: UserId,
    pub created_at: DateTime<Utc>,
}

pub(crate) fn validate_name(name: &str) -> crate::Result<String> {
    let name = name.trim();
    if name.is_empty() || name.chars().count() > 255 {
        return Err(crate::Error::Validation(
            "name must be between 1 and 255 characters".into(),
        ));
    }
    Ok(name.to_string())
}

pub(crate) fn validate_email(email: &str) -> crate::Result<String> {
    let email = email.trim().to_lowercase();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
        }
        None => false,
    };
    if !valid || email.contains(char::is_whitespace) {
        return Err(crate::Error::Validation(format!("invalid email: {email}")));
    }
    Ok(email)
}

pub(crate) fn validate_password(password: &str) -> crate::Result<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(crate::Error::Validation(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}
