use axum::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::accounts::repo_types::{AccountStatus, NewUser, ProfileChanges, User, UserRow};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("no matching row")]
    NotFound,

    #[error("unique constraint violated")]
    DuplicateKey,

    #[error("store unavailable: {0}")]
    Unavailable(#[source] anyhow::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => StoreError::NotFound,
            sqlx::Error::Database(ref db) if db.is_unique_violation() => StoreError::DuplicateKey,
            other => StoreError::Unavailable(other.into()),
        }
    }
}

/// Persistence port for user accounts. Every write touches a single row.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;
    async fn insert(&self, user: &NewUser) -> Result<User, StoreError>;
    /// Updates an active account. `profile_image` of `None` keeps the stored one.
    async fn update_profile(
        &self,
        id: Uuid,
        changes: &ProfileChanges,
        profile_image: Option<&str>,
    ) -> Result<User, StoreError>;
    async fn update_status(&self, id: Uuid, status: AccountStatus) -> Result<User, StoreError>;
}

const USER_COLUMNS: &str = "id, name, email, password_hash, contact_number, address, \
     profile_image, role, status, created_at, updated_at, deleted_at";

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

fn to_user(row: UserRow) -> Result<User, StoreError> {
    User::try_from(row).map_err(StoreError::Unavailable)
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE lower(email) = $1");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(email)
            .fetch_optional(&self.db)
            .await?;
        row.map(to_user).transpose()
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await?;
        row.map(to_user).transpose()
    }

    async fn insert(&self, user: &NewUser) -> Result<User, StoreError> {
        let sql = format!(
            r#"
            INSERT INTO users (id, name, email, password_hash, role, contact_number, address)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {USER_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(Uuid::new_v4())
            .bind(&user.name)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(user.role.as_str())
            .bind(&user.contact_number)
            .bind(&user.address)
            .fetch_one(&self.db)
            .await?;
        to_user(row)
    }

    async fn update_profile(
        &self,
        id: Uuid,
        changes: &ProfileChanges,
        profile_image: Option<&str>,
    ) -> Result<User, StoreError> {
        let sql = format!(
            r#"
            UPDATE users
               SET name = $2,
                   email = $3,
                   contact_number = $4,
                   address = $5,
                   profile_image = COALESCE($6, profile_image),
                   updated_at = now()
             WHERE id = $1 AND status = 'active'
            RETURNING {USER_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .bind(&changes.name)
            .bind(&changes.email)
            .bind(&changes.contact_number)
            .bind(&changes.address)
            .bind(profile_image)
            .fetch_optional(&self.db)
            .await?
            .ok_or(StoreError::NotFound)?;
        to_user(row)
    }

    async fn update_status(&self, id: Uuid, status: AccountStatus) -> Result<User, StoreError> {
        // first deactivation time survives repeated calls; reactivation clears it
        let sql = format!(
            r#"
            UPDATE users
               SET status = $2,
                   deleted_at = CASE WHEN $2 = 'inactive' THEN COALESCE(deleted_at, now())
                                     ELSE NULL END,
                   updated_at = now()
             WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .bind(status.as_str())
            .fetch_optional(&self.db)
            .await?
            .ok_or(StoreError::NotFound)?;
        to_user(row)
    }
}
