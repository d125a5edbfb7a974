use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::{expect_changed, parse_enum, parse_id};
use crate::db::DatabaseError;
use crate::models::enums::Role;
use crate::models::User;

const USER_COLUMNS: &str = "id, email, name, role, created_at, updated_at";

pub fn insert_user(conn: &Connection, user: &User, password_hash: &str) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO users (id, email, name, role, password_hash, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            user.id.to_string(),
            user.email,
            user.name,
            user.role.as_str(),
            password_hash,
            user.created_at,
            user.updated_at,
        ],
    )
    .map_err(|e| email_conflict(e, &user.email))?;
    Ok(())
}

pub fn get_user(conn: &Connection, id: &Uuid) -> Result<Option<User>, DatabaseError> {
    let row = conn
        .query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
            params![id.to_string()],
            user_row_from_rusqlite,
        )
        .optional()?;
    row.map(user_from_row).transpose()
}

/// User plus stored password hash, for login.
pub fn get_user_credentials(
    conn: &Connection,
    email: &str,
) -> Result<Option<(User, String)>, DatabaseError> {
    let row = conn
        .query_row(
            &format!("SELECT {USER_COLUMNS}, password_hash FROM users WHERE email = ?1"),
            params![email.trim()],
            |row| Ok((user_row_from_rusqlite(row)?, row.get::<_, String>(6)?)),
        )
        .optional()?;
    match row {
        Some((user_row, hash)) => Ok(Some((user_from_row(user_row)?, hash))),
        None => Ok(None),
    }
}

pub fn update_user_profile(
    conn: &Connection,
    id: &Uuid,
    name: &str,
    email: &str,
    now: DateTime<Utc>,
) -> Result<(), DatabaseError> {
    let changed = conn
        .execute(
            "UPDATE users SET name = ?2, email = ?3, updated_at = ?4 WHERE id = ?1",
            params![id.to_string(), name, email, now],
        )
        .map_err(|e| email_conflict(e, email))?;
    expect_changed(changed, "user", id)
}

pub fn delete_user(conn: &Connection, id: &Uuid) -> Result<(), DatabaseError> {
    let changed = conn.execute("DELETE FROM users WHERE id = ?1", params![id.to_string()])?;
    expect_changed(changed, "user", id)
}

pub fn count_users_with_role(conn: &Connection, role: Role) -> Result<u32, DatabaseError> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM users WHERE role = ?1",
        params![role.as_str()],
        |row| row.get(0),
    )?;
    Ok(count)
}

fn email_conflict(err: rusqlite::Error, email: &str) -> DatabaseError {
    match err {
        rusqlite::Error::SqliteFailure(f, _)
            if f.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            DatabaseError::ConstraintViolation(format!("email already registered: {email}"))
        }
        other => DatabaseError::Sqlite(other),
    }
}

struct UserRow {
    id: String,
    email: String,
    name: String,
    role: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

fn user_row_from_rusqlite(row: &rusqlite::Row<'_>) -> Result<UserRow, rusqlite::Error> {
    Ok(UserRow {
        id: row.get(0)?,
        email: row.get(1)?,
        name: row.get(2)?,
        role: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

fn user_from_row(row: UserRow) -> Result<User, DatabaseError> {
    Ok(User {
        id: parse_id(&row.id)?,
        email: row.email,
        name: row.name,
        role: parse_enum(&row.role)?,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}
