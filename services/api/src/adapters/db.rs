//! services/api/src/adapters/db.rs
//!
//! This module contains the shared database adapter plus the concrete
//! implementation of the `IdentityStore` port from the core crate. The
//! schedule and logbook port implementations live in their own modules
//! but hang off the same `DbAdapter`. All queries run through `sqlx`
//! against PostgreSQL, checked at runtime so the crate builds without a
//! live database.

use async_trait::async_trait;
use echolog_core::domain::{AuthSession, User, UserCredentials};
use echolog_core::ports::{IdentityStore, StoreError, StoreResult};
use sqlx::{FromRow, PgPool};

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter implementing all of the core's store ports.
#[derive(Clone)]
pub struct DbAdapter {
    pub(crate) pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct UserRecord {
    email: String,
    name: String,
}
impl UserRecord {
    fn to_domain(self) -> User {
        User { email: self.email, name: self.name }
    }
}

#[derive(FromRow)]
struct CredentialsRecord {
    email: String,
    name: String,
    hashed_password: String,
}
impl CredentialsRecord {
    fn to_domain(self) -> UserCredentials {
        UserCredentials {
            email: self.email,
            name: self.name,
            hashed_password: self.hashed_password,
        }
    }
}

//=========================================================================================
// `IdentityStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl IdentityStore for DbAdapter {
    async fn create_user(
        &self,
        email: &str,
        name: &str,
        hashed_password: &str,
    ) -> StoreResult<User> {
        let record = sqlx::query_as::<_, UserRecord>(
            "INSERT INTO users (email, name, hashed_password) VALUES ($1, $2, $3) \
             RETURNING email, name",
        )
        .bind(email)
        .bind(name)
        .bind(hashed_password)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db)
                if matches!(db.kind(), sqlx::error::ErrorKind::UniqueViolation) =>
            {
                StoreError::Conflict(format!("User {} already exists", email))
            }
            _ => StoreError::Unexpected(e.to_string()),
        })?;
        Ok(record.to_domain())
    }

    async fn credentials(&self, email: &str) -> StoreResult<Option<UserCredentials>> {
        let record = sqlx::query_as::<_, CredentialsRecord>(
            "SELECT email, name, hashed_password FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Unexpected(e.to_string()))?;
        Ok(record.map(CredentialsRecord::to_domain))
    }

    async fn create_auth_session(&self, session: &AuthSession) -> StoreResult<()> {
        sqlx::query("INSERT INTO auth_sessions (id, user_email, expires_at) VALUES ($1, $2, $3)")
            .bind(&session.id)
            .bind(&session.user_email)
            .bind(session.expires_at)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Unexpected(e.to_string()))?;
        Ok(())
    }

    async fn resolve_auth_session(&self, session_id: &str) -> StoreResult<Option<String>> {
        // Expired sessions are filtered here rather than in the caller, so
        // expiry is enforced everywhere the port is used.
        let email = sqlx::query_scalar::<_, String>(
            "SELECT user_email FROM auth_sessions WHERE id = $1 AND expires_at > NOW()",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Unexpected(e.to_string()))?;
        Ok(email)
    }

    async fn delete_auth_session(&self, session_id: &str) -> StoreResult<()> {
        sqlx::query("DELETE FROM auth_sessions WHERE id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Unexpected(e.to_string()))?;
        Ok(())
    }
}
