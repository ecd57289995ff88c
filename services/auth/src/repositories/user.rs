//! Account storage for sign-up and sign-in

use common::role::Role;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::info;

use crate::error::AuthError;
use crate::models::User;

const USER_COLUMNS: &str = "id, name, email, password_hash, role, created_at, updated_at";

/// Validated account data with an already hashed password
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
}

fn user_from_row(row: &PgRow) -> Result<User, sqlx::Error> {
    let role: String = row.try_get("role")?;

    Ok(User {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        password_hash: row.try_get("password_hash")?,
        role: role
            .parse::<Role>()
            .map_err(|e| sqlx::Error::Decode(Box::new(e)))?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

/// User repository
#[derive(Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create an account. Names and emails are unique, case-insensitively.
    ///
    /// Names carry no unique index, so concurrent sign-ups for the same name
    /// are serialized with a transaction-scoped advisory lock.
    pub async fn create(&self, account: &NewAccount) -> Result<User, AuthError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("SELECT pg_advisory_xact_lock(hashtext('users:name:' || lower($1)))")
            .bind(&account.name)
            .execute(&mut *tx)
            .await?;

        let name_taken: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM users WHERE lower(name) = lower($1))")
                .bind(&account.name)
                .fetch_one(&mut *tx)
                .await?;
        if name_taken {
            return Err(AuthError::Conflict("Name is already taken".to_string()));
        }

        let email_taken: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM users WHERE lower(email) = lower($1))",
        )
        .bind(&account.email)
        .fetch_one(&mut *tx)
        .await?;
        if email_taken {
            return Err(AuthError::Conflict(
                "Email is already registered".to_string(),
            ));
        }

        let row = sqlx::query(&format!(
            "INSERT INTO users (name, email, password_hash, role) \
             VALUES ($1, $2, $3, $4) RETURNING {USER_COLUMNS}"
        ))
        .bind(&account.name)
        .bind(&account.email)
        .bind(&account.password_hash)
        .bind(account.role.as_str())
        .fetch_one(&mut *tx)
        .await?;
        let user = user_from_row(&row)?;

        tx.commit().await?;

        info!(user_id = %user.id, role = %user.role, "Account created");
        Ok(user)
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>, AuthError> {
        let row = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE lower(email) = lower($1)"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(user_from_row).transpose()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::database::{DatabaseConfig, init_pool, run_migrations};
    use common::password::{hash_password, random_suffix};

    async fn test_pool() -> PgPool {
        let config = DatabaseConfig::from_env().unwrap();
        let pool = init_pool(&config).await.unwrap();
        run_migrations(&pool).await.unwrap();
        pool
    }

    fn account(name: &str, email: &str) -> NewAccount {
        NewAccount {
            name: name.to_string(),
            email: email.to_string(),
            password_hash: hash_password("secret-password").unwrap(),
            role: Role::Customer,
        }
    }

    #[tokio::test]
    #[ignore = "requires a running PostgreSQL (DATABASE_URL)"]
    async fn test_create_and_find() {
        let repository = UserRepository::new(test_pool().await);
        let suffix = random_suffix();
        let email = format!("jane.{suffix}@example.com");

        let user = repository
            .create(&account(&format!("Jane {suffix}"), &email))
            .await
            .unwrap();
        assert_eq!(user.role, Role::Customer);

        let found = repository
            .find_by_email(&email.to_uppercase())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, user.id);
    }

    #[tokio::test]
    #[ignore = "requires a running PostgreSQL (DATABASE_URL)"]
    async fn test_duplicate_name_and_email_conflict() {
        let repository = UserRepository::new(test_pool().await);
        let suffix = random_suffix();
        let name = format!("John {suffix}");
        let email = format!("john.{suffix}@example.com");

        repository.create(&account(&name, &email)).await.unwrap();

        let same_name = repository
            .create(&account(&name.to_lowercase(), &format!("other.{suffix}@example.com")))
            .await;
        assert!(matches!(same_name, Err(AuthError::Conflict(_))));

        let same_email = repository
            .create(&account(&format!("Other {suffix}"), &email))
            .await;
        assert!(matches!(same_email, Err(AuthError::Conflict(_))));
    }
}
