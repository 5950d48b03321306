//! Registration, sessions and roles

use super::Service;
use crate::token::{generate_token, hash_password, token_digest, verify_password};
use crate::user::{
    validate_email, validate_name, validate_password, Actor, PublicUser, Role, Session, User,
    UserId,
};
use crate::policy;
use crate::store::Tables;
use crate::{Error, Result};
use chrono::Utc;
use serde::Serialize;

/// Issued on register and login. The token is only ever shown here.
#[derive(Debug, Clone, Serialize)]
pub struct AuthSession {
    pub user: PublicUser,
    pub token: String,
}

/// Validated sign-up with the password already hashed.
///
/// Hashing is the slow part of registration, so build this before taking
/// any lock on the service.
#[derive(Debug, Clone)]
pub struct NewAccount {
    name: String,
    email: String,
    password_hash: String,
}

impl NewAccount {
    pub fn new(name: &str, email: &str, password: &str) -> Result<Self> {
        let name = validate_name(name)?;
        let email = validate_email(email)?;
        validate_password(password)?;
        Ok(Self {
            name,
            email,
            password_hash: hash_password(password)?,
        })
    }
}

fn insert_user(tx: &mut Tables, account: NewAccount, role: Role) -> Result<User> {
    if tx.user_by_email(&account.email).is_some() {
        return Err(Error::Validation("email has already been taken".into()));
    }
    let user = User::new(
        tx.next_user_id(),
        account.name,
        account.email,
        account.password_hash,
        role,
    );
    tx.users.insert(user.id, user.clone());
    Ok(user)
}

fn insert_session(tx: &mut Tables, user_id: UserId) -> String {
    let token = generate_token();
    let session = Session {
        token_hash: token_digest(&token),
        user_id,
        created_at: Utc::now(),
    };
    tx.sessions.insert(session.token_hash.clone(), session);
    token
}

impl Service {
    /// Create an account with any role. Operator path, no session issued.
    pub fn create_user(
        &mut self,
        name: &str,
        email: &str,
        password: &str,
        role: Role,
    ) -> Result<PublicUser> {
        let account = NewAccount::new(name, email, password)?;
        let user = self.commit(|tx| insert_user(tx, account, role))?;

        tracing::info!(user = user.id, role = %user.role, "user created");
        Ok(user.public())
    }

    /// Self-service sign-up as a citizen
    pub fn register(&mut self, name: &str, email: &str, password: &str) -> Result<AuthSession> {
        self.register_account(NewAccount::new(name, email, password)?)
    }

    /// Store a citizen account and its first session together
    pub fn register_account(&mut self, account: NewAccount) -> Result<AuthSession> {
        let (user, token) = self.commit(|tx| {
            let user = insert_user(tx, account, Role::Citizen)?;
            let token = insert_session(tx, user.id);
            Ok((user, token))
        })?;

        tracing::info!(user = user.id, "user registered");
        Ok(AuthSession {
            user: user.public(),
            token,
        })
    }

    pub fn login(&mut self, email: &str, password: &str) -> Result<AuthSession> {
        let user = self.check_credentials(email, password)?;
        self.start_session(user.id)
    }

    /// Account matching the email and password. Read-only.
    pub fn check_credentials(&self, email: &str, password: &str) -> Result<PublicUser> {
        self.tables()
            .user_by_email(email)
            .filter(|u| verify_password(password, &u.password_hash))
            .map(User::public)
            .ok_or(Error::Unauthenticated)
    }

    /// Issue a bearer token for an existing account
    pub fn start_session(&mut self, user_id: UserId) -> Result<AuthSession> {
        let (user, token) = self.commit(|tx| {
            let user = tx.user(user_id)?.public();
            Ok((user, insert_session(tx, user_id)))
        })?;
        tracing::info!(user = user.id, "login");
        Ok(AuthSession { user, token })
    }

    /// Resolve a bearer token to the acting user
    pub fn authenticate(&self, token: &str) -> Result<Actor> {
        let tables = self.tables();
        let session = tables
            .sessions
            .get(&token_digest(token))
            .ok_or(Error::Unauthenticated)?;
        tables
            .users
            .get(&session.user_id)
            .map(User::actor)
            .ok_or(Error::Unauthenticated)
    }

    /// Revoke the session, then tidy the user's read notifications.
    /// Failing to tidy does not fail the logout.
    pub fn logout(&mut self, token: &str) -> Result<()> {
        let actor = self.authenticate(token)?;
        let digest = token_digest(token);
        self.commit(|tx| {
            tx.sessions.remove(&digest);
            Ok(())
        })?;

        match self.purge_read_notifications(&actor) {
            Ok(purged) => {
                tracing::debug!(user = actor.user_id, purged, "read notifications purged")
            }
            Err(e) => tracing::warn!(
                user = actor.user_id,
                error = %e,
                "failed to purge read notifications on logout"
            ),
        }
        tracing::info!(user = actor.user_id, "logout");
        Ok(())
    }

    pub fn me(&self, actor: &Actor) -> Result<PublicUser> {
        Ok(self.tables().user(actor.user_id)?.public())
    }

    /// Change a user's role. Admin only.
    pub fn set_role(&mut self, actor: &Actor, user_id: UserId, role: Role) -> Result<PublicUser> {
        policy::can_manage_roles(actor).into_result()?;
        self.assign_role(user_id, role)
    }

    /// Change a user's role without a policy check, for operator tooling
    pub fn assign_role(&mut self, user_id: UserId, role: Role) -> Result<PublicUser> {
        let user = self.commit(|tx| {
            let user = tx.user_mut(user_id)?;
            user.role = role;
            Ok(user.public())
        })?;
        tracing::info!(user = user_id, role = %role, "role changed");
        Ok(user)
    }
}
