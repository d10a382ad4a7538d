use std::sync::Arc;

use axum::extract::FromRef;
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    accounts::{
        dto::{LoginRequest, PublicUser, RegisterRequest},
        errors::AccountError,
        repo::UserStore,
        repo_types::{AccountStatus, NewUser, ProfileChanges, Role},
    },
    auth::{jwt::JwtKeys, password},
    state::AppState,
};

const MIN_PASSWORD_LEN: usize = 8;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Trims an optional text field; blank means absent.
fn optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn valid_name(name: &str) -> Result<String, AccountError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AccountError::invalid("Name is required"));
    }
    Ok(name.to_string())
}

fn valid_email(email: &str) -> Result<String, AccountError> {
    let email = normalize_email(email);
    if !is_valid_email(&email) {
        return Err(AccountError::invalid("Invalid email"));
    }
    Ok(email)
}

impl ProfileChanges {
    /// Validates and normalizes the editable profile fields.
    pub fn new(
        name: &str,
        email: &str,
        contact_number: Option<String>,
        address: Option<String>,
    ) -> Result<Self, AccountError> {
        Ok(Self {
            name: valid_name(name)?,
            email: valid_email(email)?,
            contact_number: optional_text(contact_number),
            address: optional_text(address),
        })
    }
}

/// Result of a successful login.
#[derive(Debug)]
pub struct LoginOutcome {
    pub user: PublicUser,
    pub token: String,
}

/// Result of a successful profile update.
#[derive(Debug)]
pub struct ProfileUpdate {
    pub user: PublicUser,
    /// Image reference that the update replaced, if any.
    pub replaced_image: Option<String>,
}

/// Register, authenticate, read, update and deactivate accounts.
#[derive(Clone)]
pub struct AccountService {
    store: Arc<dyn UserStore>,
    keys: JwtKeys,
}

impl FromRef<AppState> for AccountService {
    fn from_ref(state: &AppState) -> Self {
        Self::new(state.users.clone(), state.keys.clone())
    }
}

impl AccountService {
    pub fn new(store: Arc<dyn UserStore>, keys: JwtKeys) -> Self {
        Self { store, keys }
    }

    #[instrument(skip_all, fields(email = %req.email.trim()))]
    pub async fn register(&self, req: RegisterRequest) -> Result<Uuid, AccountError> {
        let name = valid_name(&req.name)?;
        let email = valid_email(&req.email)?;
        let role = match req.role.as_deref().map(str::trim) {
            None | Some("") => Role::default(),
            Some(r) => Role::parse(r).ok_or_else(|| AccountError::invalid("Invalid role specified"))?,
        };
        if req.password.chars().count() < MIN_PASSWORD_LEN {
            warn!("password too short");
            return Err(AccountError::invalid("Password too short"));
        }

        let password_hash = password::hash_password_blocking(req.password).await?;
        let new_user = NewUser {
            name,
            email,
            password_hash,
            role,
            contact_number: optional_text(req.contact_number),
            address: optional_text(req.address),
        };

        let user = self.store.insert(&new_user).await.map_err(|e| {
            let err = AccountError::from(e);
            if matches!(err, AccountError::DuplicateEmail) {
                warn!(email = %new_user.email, "email already registered");
            }
            err
        })?;

        info!(user_id = %user.id, role = %user.role, "user registered");
        Ok(user.id)
    }

    /// Every failure mode answers `InvalidCredentials`; only the log says why.
    #[instrument(skip_all, fields(email = %req.email.trim()))]
    pub async fn login(&self, req: LoginRequest) -> Result<LoginOutcome, AccountError> {
        let email = normalize_email(&req.email);
        if !is_valid_email(&email) {
            warn!("login with malformed email");
            return Err(AccountError::InvalidCredentials);
        }

        let Some(user) = self.store.find_by_email(&email).await? else {
            password::verify_dummy(req.password).await;
            warn!("login unknown email");
            return Err(AccountError::InvalidCredentials);
        };

        let ok = password::verify_password_blocking(req.password, user.password_hash.clone())
            .await?;
        if !ok {
            warn!(user_id = %user.id, "login invalid password");
            return Err(AccountError::InvalidCredentials);
        }
        if !user.is_active() {
            warn!(user_id = %user.id, "login on inactive account");
            return Err(AccountError::InvalidCredentials);
        }

        let token = self.keys.sign(user.id, user.role)?;
        info!(user_id = %user.id, "user logged in");
        Ok(LoginOutcome {
            user: user.into(),
            token,
        })
    }

    #[instrument(skip(self))]
    pub async fn profile(&self, user_id: Uuid) -> Result<PublicUser, AccountError> {
        match self.store.find_by_id(user_id).await? {
            Some(user) if user.is_active() => Ok(user.into()),
            _ => Err(AccountError::NotFound),
        }
    }

    /// Applies `changes`; `profile_image` replaces the stored image only when present.
    #[instrument(skip(self, changes))]
    pub async fn update_profile(
        &self,
        user_id: Uuid,
        changes: ProfileChanges,
        profile_image: Option<String>,
    ) -> Result<ProfileUpdate, AccountError> {
        let current = match self.store.find_by_id(user_id).await? {
            Some(user) if user.is_active() => user,
            _ => return Err(AccountError::NotFound),
        };

        let user = self
            .store
            .update_profile(user_id, &changes, profile_image.as_deref())
            .await?;

        let replaced_image = match (&profile_image, current.profile_image) {
            (Some(new), Some(old)) if *new != old => Some(old),
            _ => None,
        };

        info!(user_id = %user.id, image_replaced = profile_image.is_some(), "profile updated");
        Ok(ProfileUpdate {
            user: user.into(),
            replaced_image,
        })
    }

    /// Soft delete: the row stays, marked inactive. Repeating it is not an error.
    #[instrument(skip(self))]
    pub async fn deactivate(&self, user_id: Uuid) -> Result<Uuid, AccountError> {
        let user = self
            .store
            .update_status(user_id, AccountStatus::Inactive)
            .await?;
        info!(user_id = %user.id, "user deactivated");
        Ok(user.id)
    }
}
