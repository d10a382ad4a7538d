use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Mutex,
    },
};

use axum::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::accounts::{
    repo::{StoreError, UserStore},
    repo_types::{AccountStatus, NewUser, ProfileChanges, User},
};

/// In-process `UserStore` with the same uniqueness and status rules as Postgres.
#[derive(Default)]
pub struct InMemoryUserStore {
    users: Mutex<HashMap<Uuid, User>>,
    unavailable: AtomicBool,
}

impl InMemoryUserStore {
    /// Makes every subsequent call fail with `StoreError::Unavailable`.
    pub fn set_unavailable(&self, down: bool) {
        self.unavailable.store(down, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.users.lock().unwrap().len()
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(anyhow::anyhow!("connection refused")));
        }
        Ok(())
    }

    fn email_taken(users: &HashMap<Uuid, User>, email: &str, except: Option<Uuid>) -> bool {
        users
            .values()
            .any(|u| Some(u.id) != except && u.email.to_lowercase() == email.to_lowercase())
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        self.check()?;
        let users = self.users.lock().unwrap();
        Ok(users
            .values()
            .find(|u| u.email.to_lowercase() == email)
            .cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        self.check()?;
        Ok(self.users.lock().unwrap().get(&id).cloned())
    }

    async fn insert(&self, new: &NewUser) -> Result<User, StoreError> {
        self.check()?;
        let mut users = self.users.lock().unwrap();
        if Self::email_taken(&users, &new.email, None) {
            return Err(StoreError::DuplicateKey);
        }
        let now = OffsetDateTime::now_utc();
        let user = User {
            id: Uuid::new_v4(),
            name: new.name.clone(),
            email: new.email.clone(),
            password_hash: new.password_hash.clone(),
            contact_number: new.contact_number.clone(),
            address: new.address.clone(),
            profile_image: None,
            role: new.role,
            status: AccountStatus::Active,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn update_profile(
        &self,
        id: Uuid,
        changes: &ProfileChanges,
        profile_image: Option<&str>,
    ) -> Result<User, StoreError> {
        self.check()?;
        let mut users = self.users.lock().unwrap();
        if !users.get(&id).is_some_and(User::is_active) {
            return Err(StoreError::NotFound);
        }
        if Self::email_taken(&users, &changes.email, Some(id)) {
            return Err(StoreError::DuplicateKey);
        }
        let user = users.get_mut(&id).ok_or(StoreError::NotFound)?;
        user.name = changes.name.clone();
        user.email = changes.email.clone();
        user.contact_number = changes.contact_number.clone();
        user.address = changes.address.clone();
        if let Some(path) = profile_image {
            user.profile_image = Some(path.to_string());
        }
        user.updated_at = OffsetDateTime::now_utc();
        Ok(user.clone())
    }

    async fn update_status(&self, id: Uuid, status: AccountStatus) -> Result<User, StoreError> {
        self.check()?;
        let mut users = self.users.lock().unwrap();
        let user = users.get_mut(&id).ok_or(StoreError::NotFound)?;
        let now = OffsetDateTime::now_utc();
        user.status = status;
        user.deleted_at = match status {
            AccountStatus::Inactive => user.deleted_at.or(Some(now)),
            AccountStatus::Active => None,
        };
        user.updated_at = now;
        Ok(user.clone())
    }
}
