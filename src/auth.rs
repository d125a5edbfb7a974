//! Local identity provider: password hashing, login sessions and the
//! first-operator bootstrap.
//!
//! Passwords are stored as `pbkdf2-sha256$<iterations>$<salt>$<hash>` so the
//! work factor can change without invalidating existing accounts. Sessions
//! are opaque bearer tokens; only their SHA-256 hash is kept in memory.

use base64::engine::general_purpose::{STANDARD_NO_PAD, URL_SAFE_NO_PAD};
use base64::Engine;
use chrono::Utc;
use pbkdf2::pbkdf2_hmac;
use rusqlite::Connection;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use uuid::Uuid;

use crate::config::BootstrapOperator;
use crate::core_state::{CoreError, CoreState};
use crate::db::{self, DatabaseError};
use crate::models::enums::Role;
use crate::models::User;

const HASH_SCHEME: &str = "pbkdf2-sha256";
const SALT_LENGTH: usize = 16;
const KEY_LENGTH: usize = 32;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error("Password must not be empty")]
    EmptyPassword,
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
    #[error(transparent)]
    Core(#[from] CoreError),
}

/// Hash a password with a fresh random salt.
pub fn hash_password(password: &str, iterations: u32) -> String {
    let salt: [u8; SALT_LENGTH] = rand::random();
    let key = derive(password, &salt, iterations);
    format!(
        "{HASH_SCHEME}${iterations}${}${}",
        STANDARD_NO_PAD.encode(salt),
        STANDARD_NO_PAD.encode(key)
    )
}

/// Check a password against a stored hash. Malformed hashes never verify.
pub fn verify_password(password: &str, stored: &str) -> bool {
    let parts: Vec<&str> = stored.split('$').collect();
    let [scheme, iterations, salt, expected] = parts.as_slice() else {
        return false;
    };
    if *scheme != HASH_SCHEME {
        return false;
    }
    let (Ok(iterations), Ok(salt), Ok(expected)) = (
        iterations.parse::<u32>(),
        STANDARD_NO_PAD.decode(salt),
        STANDARD_NO_PAD.decode(expected),
    ) else {
        return false;
    };
    if iterations == 0 || expected.len() != KEY_LENGTH {
        return false;
    }

    let actual = derive(password, &salt, iterations);
    actual.as_slice().ct_eq(expected.as_slice()).into()
}

fn derive(password: &str, salt: &[u8], iterations: u32) -> [u8; KEY_LENGTH] {
    let mut key = [0u8; KEY_LENGTH];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, iterations, &mut key);
    key
}

/// Random bearer token (URL-safe base64, 32 bytes of entropy).
pub fn generate_token() -> String {
    let bytes: [u8; 32] = rand::random();
    URL_SAFE_NO_PAD.encode(bytes)
}

pub fn hash_token(token: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hasher.finalize().into()
}

/// Create a user row with a hashed password. `id` lets a doctor profile
/// share its id with the login.
pub fn register_user(
    conn: &Connection,
    id: Option<Uuid>,
    email: &str,
    name: &str,
    role: Role,
    password: &str,
    iterations: u32,
) -> Result<User, AuthError> {
    if password.is_empty() {
        return Err(AuthError::EmptyPassword);
    }
    let now = Utc::now();
    let user = User {
        id: id.unwrap_or_else(Uuid::new_v4),
        email: email.trim().to_string(),
        name: name.trim().to_string(),
        role,
        created_at: now,
        updated_at: now,
    };
    db::insert_user(conn, &user, &hash_password(password, iterations))?;
    Ok(user)
}

#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub token: String,
    pub user: User,
}

/// Verify credentials and open a session.
pub fn login(
    core: &CoreState,
    conn: &Connection,
    email: &str,
    password: &str,
) -> Result<LoginOutcome, AuthError> {
    let Some((user, stored)) = db::get_user_credentials(conn, email)? else {
        tracing::info!("Login rejected: unknown email");
        return Err(AuthError::InvalidCredentials);
    };
    if !verify_password(password, &stored) {
        tracing::info!(user_id = %user.id, "Login rejected: wrong password");
        return Err(AuthError::InvalidCredentials);
    }

    let token = generate_token();
    core.write_sessions()?.insert(hash_token(&token), user.clone());
    tracing::info!(user_id = %user.id, role = %user.role, "User logged in");
    Ok(LoginOutcome { token, user })
}

/// End a session. Returns whether the token was live.
pub fn logout(core: &CoreState, token: &str) -> Result<bool, AuthError> {
    let removed = core.write_sessions()?.remove(&hash_token(token));
    if let Some(user) = &removed {
        tracing::info!(user_id = %user.id, "User logged out");
    }
    Ok(removed.is_some())
}

/// The user behind a bearer token, if the session is live.
pub fn current_user(core: &CoreState, token: &str) -> Result<Option<User>, AuthError> {
    Ok(core.read_sessions()?.get(&hash_token(token)).cloned())
}

/// Drop every session of a user (account deleted or renamed).
pub fn end_sessions_for(core: &CoreState, user_id: &Uuid) -> Result<usize, AuthError> {
    let mut sessions = core.write_sessions()?;
    let before = sessions.len();
    sessions.retain(|_, user| &user.id != user_id);
    Ok(before - sessions.len())
}

/// Seed the first operator account when none exists yet.
pub fn bootstrap_operator(
    conn: &Connection,
    operator: &BootstrapOperator,
    iterations: u32,
) -> Result<Option<User>, AuthError> {
    if db::count_users_with_role(conn, Role::Operator)? > 0 {
        return Ok(None);
    }
    let user = register_user(
        conn,
        None,
        &operator.email,
        &operator.name,
        Role::Operator,
        &operator.password,
        iterations,
    )?;
    tracing::info!(user_id = %user.id, email = %user.email, "Bootstrapped operator account");
    Ok(Some(user))
}
