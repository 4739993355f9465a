//! User account queries.

use chrono::{DateTime, Utc};
use rusqlite::{Connection, ErrorCode};
use vidforge_common::{Error, Result};

use super::parse_timestamp;
use crate::models::{User, UserSummary};

/// Create a new user.
///
/// # Errors
///
/// * [`Error::DuplicateUser`] if the username is taken
/// * [`Error::Database`] for any other database failure
pub fn create_user(conn: &Connection, username: &str, password_hash: &str) -> Result<User> {
    let joined_at = Utc::now();

    conn.execute(
        "INSERT INTO users (username, password_hash, joined_at)
         VALUES (:username, :password_hash, :joined_at)",
        rusqlite::named_params! {
            ":username": username,
            ":password_hash": password_hash,
            ":joined_at": joined_at.to_rfc3339(),
        },
    )
    .map_err(|e| match e {
        rusqlite::Error::SqliteFailure(ref f, _) if f.code == ErrorCode::ConstraintViolation => {
            Error::DuplicateUser(username.to_string())
        }
        other => Error::database(other.to_string()),
    })?;

    Ok(User {
        username: username.to_string(),
        password_hash: password_hash.to_string(),
        joined_at,
        last_login: None,
    })
}

/// Get a user by username.
///
/// Returns `Ok(None)` if no such user exists.
pub fn get_user_by_username(conn: &Connection, username: &str) -> Result<Option<User>> {
    let result = conn.query_row(
        "SELECT username, password_hash, joined_at, last_login
         FROM users WHERE username = :username",
        rusqlite::named_params! { ":username": username },
        |row| {
            Ok(User {
                username: row.get(0)?,
                password_hash: row.get(1)?,
                joined_at: parse_timestamp(2, &row.get::<_, String>(2)?)?,
                last_login: row
                    .get::<_, Option<String>>(3)?
                    .map(|s| parse_timestamp(3, &s))
                    .transpose()?,
            })
        },
    );

    match result {
        Ok(user) => Ok(Some(user)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(Error::database(e.to_string())),
    }
}

/// Record a successful login.
pub fn touch_last_login(conn: &Connection, username: &str, at: DateTime<Utc>) -> Result<()> {
    let rows_affected = conn
        .execute(
            "UPDATE users SET last_login = :at WHERE username = :username",
            rusqlite::named_params! {
                ":at": at.to_rfc3339(),
                ":username": username,
            },
        )
        .map_err(|e| Error::database(e.to_string()))?;

    if rows_affected == 0 {
        return Err(Error::not_found("user", username));
    }

    Ok(())
}

/// Total number of users.
pub fn count_users(conn: &Connection) -> Result<u64> {
    conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get::<_, i64>(0))
        .map(|n| n.max(0) as u64)
        .map_err(|e| Error::database(e.to_string()))
}

/// One slice of users in registration order, without password material.
pub fn list_users(conn: &Connection, limit: u32, offset: u64) -> Result<Vec<UserSummary>> {
    let mut stmt = conn
        .prepare(
            "SELECT username, joined_at, last_login FROM users
             ORDER BY id LIMIT :limit OFFSET :offset",
        )
        .map_err(|e| Error::database(e.to_string()))?;

    let users = stmt
        .query_map(
            rusqlite::named_params! {
                ":limit": limit,
                ":offset": offset as i64,
            },
            |row| {
                Ok(UserSummary {
                    username: row.get(0)?,
                    joined_at: parse_timestamp(1, &row.get::<_, String>(1)?)?,
                    last_login: row
                        .get::<_, Option<String>>(2)?
                        .map(|s| parse_timestamp(2, &s))
                        .transpose()?,
                })
            },
        )
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::database(e.to_string()))?;

    Ok(users)
}
