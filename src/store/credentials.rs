//! User registration and login.

use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use vidforge_common::{Error, Result};
use vidforge_db::{get_conn, queries, DbPool};

use super::run_blocking;

const MAX_USERNAME_LEN: usize = 64;

/// Hash a password with bcrypt at the given cost.
pub fn hash_password(password: &str, cost: u32) -> Result<String> {
    bcrypt::hash(password, cost).map_err(|e| Error::internal(format!("bcrypt: {e}")))
}

/// Credential store backed by the `users` table.
///
/// Passwords are stored only as salted bcrypt hashes.
#[derive(Clone)]
pub struct CredentialStore {
    inner: Arc<Inner>,
}

struct Inner {
    pool: DbPool,
    lock: Mutex<()>,
    bcrypt_cost: u32,
}

impl CredentialStore {
    pub fn new(pool: DbPool, bcrypt_cost: u32) -> Self {
        Self {
            inner: Arc::new(Inner {
                pool,
                lock: Mutex::new(()),
                bcrypt_cost,
            }),
        }
    }

    /// Create an account.
    ///
    /// # Errors
    ///
    /// [`Error::DuplicateUser`] if the username is taken,
    /// [`Error::InvalidInput`] for an empty username or password.
    pub async fn register(&self, username: &str, password: &str) -> Result<()> {
        let store = self.clone();
        let (username, password) = (username.to_string(), password.to_string());
        run_blocking(move || store.register_blocking(&username, &password)).await
    }

    /// Check a username and password.
    ///
    /// Succeeds without a value; any mismatch, including an unknown user,
    /// is [`Error::InvalidCredentials`]. Records the login time on success.
    pub async fn login(&self, username: &str, password: &str) -> Result<()> {
        let store = self.clone();
        let (username, password) = (username.to_string(), password.to_string());
        run_blocking(move || store.login_blocking(&username, &password)).await
    }

    fn register_blocking(&self, username: &str, password: &str) -> Result<()> {
        validate_username(username)?;
        if password.is_empty() {
            return Err(Error::invalid_input("password must not be empty"));
        }

        // Hash outside the lock.
        let hash = hash_password(password, self.inner.bcrypt_cost)?;

        let _guard = self.inner.lock.lock();
        let conn = get_conn(&self.inner.pool)?;
        queries::create_user(&conn, username, &hash)?;

        tracing::info!(username = %username, "Registered user");
        Ok(())
    }

    fn login_blocking(&self, username: &str, password: &str) -> Result<()> {
        let user = {
            let _guard = self.inner.lock.lock();
            let conn = get_conn(&self.inner.pool)?;
            queries::get_user_by_username(&conn, username)?
        }
        .ok_or(Error::InvalidCredentials)?;

        if !bcrypt::verify(password, &user.password_hash).unwrap_or(false) {
            tracing::debug!(username = %username, "Password mismatch");
            return Err(Error::InvalidCredentials);
        }

        let _guard = self.inner.lock.lock();
        let conn = get_conn(&self.inner.pool)?;
        queries::touch_last_login(&conn, username, Utc::now())?;

        Ok(())
    }
}

fn validate_username(username: &str) -> Result<()> {
    if username.trim().is_empty() {
        return Err(Error::invalid_input("username must not be empty"));
    }
    if username.len() > MAX_USERNAME_LEN {
        return Err(Error::invalid_input(format!(
            "username longer than {MAX_USERNAME_LEN} bytes"
        )));
    }
    if username.chars().any(char::is_control) {
        return Err(Error::invalid_input("username contains control characters"));
    }
    Ok(())
}
