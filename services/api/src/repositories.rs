//! Repositories for database operations

use common::error::sqlstate;
use common::password::{generate_email, generate_password, hash_password, random_suffix};
use common::role::Role;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::{error, info};
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::user::{CreatedUser, User, UserChanges};

pub mod cart;
pub mod catalog;
pub mod order;
pub mod retry;
pub mod stats;

/// Domain used for admin-issued login emails
const ISSUED_EMAIL_DOMAIN: &str = "example.com";

/// Length of admin-issued passwords
const ISSUED_PASSWORD_LENGTH: usize = 8;

/// Attempts at finding a free email for an admin-issued account
const ISSUED_EMAIL_ATTEMPTS: usize = 5;

const USER_COLUMNS: &str = "id, name, email, role, created_at, updated_at";

/// Parse a stored role, surfacing bad data as a decode error
pub(crate) fn role_from_row(row: &PgRow, column: &str) -> Result<Role, sqlx::Error> {
    let role: String = row.try_get(column)?;
    role.parse::<Role>().map_err(|e| sqlx::Error::Decode(Box::new(e)))
}

fn user_from_row(row: &PgRow) -> Result<User, sqlx::Error> {
    Ok(User {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        role: role_from_row(row, "role")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

/// User repository for database operations
#[derive(Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    /// Create a new user repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get all users, newest first
    pub async fn list(&self) -> Result<Vec<User>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY created_at DESC"
        ))
        .fetch_all(&self.pool)
        .await?;

        let users = rows
            .iter()
            .map(user_from_row)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(users)
    }

    /// Find a user by ID
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(user_from_row(&row)?)),
            None => Ok(None),
        }
    }

    /// Create an account on behalf of an admin.
    ///
    /// The login email is derived from the name; a random numeric suffix is
    /// added when that address is already taken. The generated password is
    /// returned once and only its hash is stored.
    pub async fn create_issued(&self, name: &str, role: Role) -> Result<CreatedUser, StoreError> {
        let password = generate_password(ISSUED_PASSWORD_LENGTH);
        let password_hash = hash_password(&password).map_err(|e| {
            error!("Failed to hash issued password: {}", e);
            StoreError::Internal("Failed to hash password".to_string())
        })?;

        let name = name.trim();
        let base_email = generate_email(name, ISSUED_EMAIL_DOMAIN);

        for attempt in 0..ISSUED_EMAIL_ATTEMPTS {
            let email = if attempt == 0 {
                base_email.clone()
            } else {
                suffixed_email(&base_email, &random_suffix())
            };

            let result = sqlx::query(&format!(
                r#"
                INSERT INTO users (name, email, password_hash, role)
                VALUES ($1, $2, $3, $4)
                RETURNING {USER_COLUMNS}
                "#
            ))
            .bind(name)
            .bind(&email)
            .bind(&password_hash)
            .bind(role.as_str())
            .fetch_one(&self.pool)
            .await;

            match result {
                Ok(row) => {
                    let user = user_from_row(&row)?;
                    info!(user_id = %user.id, email = %user.email, role = %user.role, "Issued account created");
                    return Ok(CreatedUser { user, password });
                }
                Err(err) if common::error::is_unique_violation(&err) => continue,
                Err(err) => return Err(err.into()),
            }
        }

        Err(StoreError::Conflict(format!(
            "Could not find a free email address for {name}"
        )))
    }

    /// Update name, email and role; untouched fields keep their value
    pub async fn update(&self, id: Uuid, changes: &UserChanges) -> Result<Option<User>, StoreError> {
        let result = sqlx::query(&format!(
            r#"
            UPDATE users
            SET name = COALESCE($2, name),
                email = COALESCE($3, email),
                role = COALESCE($4, role),
                updated_at = now()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(changes.name.as_deref())
        .bind(changes.email.as_deref())
        .bind(changes.role.map(|role| role.as_str()))
        .fetch_optional(&self.pool)
        .await;

        match result {
            Ok(Some(row)) => Ok(Some(user_from_row(&row)?)),
            Ok(None) => Ok(None),
            Err(err) if common::error::is_unique_violation(&err) => Err(StoreError::Conflict(
                "Email is already in use".to_string(),
            )),
            Err(err) => Err(err.into()),
        }
    }

    /// Delete a user. Accounts with orders are kept.
    pub async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await;

        match result {
            Ok(done) => Ok(done.rows_affected() > 0),
            Err(err)
                if common::error::sqlstate_of(&err).as_deref()
                    == Some(sqlstate::FOREIGN_KEY_VIOLATION) =>
            {
                Err(StoreError::Conflict(
                    "User has orders and cannot be deleted".to_string(),
                ))
            }
            Err(err) => Err(err.into()),
        }
    }
}

fn suffixed_email(email: &str, suffix: &str) -> String {
    match email.split_once('@') {
        Some((local, domain)) => format!("{local}{suffix}@{domain}"),
        None => format!("{email}{suffix}"),
    }
}

/// Pool for database-backed tests, migrated on first use
#[cfg(test)]
pub(crate) async fn test_pool() -> PgPool {
    let config = common::database::DatabaseConfig::from_env().unwrap();
    let pool = common::database::init_pool(&config).await.unwrap();
    common::database::run_migrations(&pool).await.unwrap();
    pool
}
