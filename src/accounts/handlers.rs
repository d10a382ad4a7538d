use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, DefaultBodyLimit, FromRef, FromRequest, Multipart, Request, State},
    http::{header::CONTENT_TYPE, StatusCode},
    routing::{get, post},
    Json, Router,
};
use tracing::{instrument, warn};
use uuid::Uuid;

use crate::{
    accounts::{
        dto::{
            DeactivateRequest, DeactivateResponse, LoginRequest, LoginResponse, ProfileResponse,
            RegisterRequest, RegisterResponse, UpdateRequest, UpdateResponse,
        },
        errors::AccountError,
        repo_types::ProfileChanges,
        services::AccountService,
    },
    auth::extractors::AuthUser,
    images::services::{discard_image, ext_from_mime, store_profile_image, ImageUpload},
    state::AppState,
};

/// Room for the text fields that travel with an image.
const FORM_OVERHEAD_BYTES: usize = 64 * 1024;

pub fn account_routes(max_image_bytes: usize) -> Router<AppState> {
    let profile_writes = Router::new()
        .route("/update", post(update_profile))
        .route("/update-profile", post(update_profile))
        .layer(DefaultBodyLimit::max(max_image_bytes + FORM_OVERHEAD_BYTES));

    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/profile", get(profile))
        .route("/deactivate", post(deactivate).delete(deactivate))
        .merge(profile_writes)
}

fn bad_body(rejection: JsonRejection) -> AccountError {
    AccountError::invalid(rejection.body_text())
}

#[instrument(skip_all)]
pub async fn register(
    State(svc): State<AccountService>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<RegisterResponse>), AccountError> {
    let Json(payload) = payload.map_err(bad_body)?;
    let user_id = svc.register(payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            success: true,
            message: "User registered successfully".into(),
            user_id,
        }),
    ))
}

#[instrument(skip_all)]
pub async fn login(
    State(svc): State<AccountService>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>, AccountError> {
    let Json(payload) = payload.map_err(bad_body)?;
    let outcome = svc.login(payload).await?;
    Ok(Json(LoginResponse {
        success: true,
        message: "Login successful".into(),
        user: outcome.user,
        token: outcome.token,
    }))
}

#[instrument(skip(svc))]
pub async fn profile(
    State(svc): State<AccountService>,
    auth: AuthUser,
) -> Result<Json<ProfileResponse>, AccountError> {
    let user = svc.profile(auth.id).await?;
    Ok(Json(ProfileResponse {
        success: true,
        user,
    }))
}

/// Profile fields from either a JSON or a multipart body.
struct UpdateForm {
    user_id: Option<Uuid>,
    name: String,
    email: String,
    contact_number: Option<String>,
    address: Option<String>,
    image: Option<ImageUpload>,
}

impl From<UpdateRequest> for UpdateForm {
    fn from(r: UpdateRequest) -> Self {
        Self {
            user_id: r.user_id,
            name: r.name,
            email: r.email,
            contact_number: r.contact_number,
            address: r.address,
            image: None,
        }
    }
}

async fn read_update_form(request: Request, max_image_bytes: usize) -> Result<UpdateForm, AccountError> {
    let is_multipart = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("multipart/form-data"));

    if !is_multipart {
        let Json(body) = Json::<UpdateRequest>::from_request(request, &())
            .await
            .map_err(bad_body)?;
        return Ok(body.into());
    }

    let mut mp = Multipart::from_request(request, &())
        .await
        .map_err(|e| AccountError::invalid(e.body_text()))?;

    let mut user_id = None;
    let mut name = None;
    let mut email = None;
    let mut contact_number = None;
    let mut address = None;
    let mut image = None;

    while let Some(field) = mp
        .next_field()
        .await
        .map_err(|e| AccountError::invalid(e.body_text()))?
    {
        let field_name = field.name().unwrap_or_default().to_string();
        match field_name.as_str() {
            "image" | "profile_image" => {
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let body = field
                    .bytes()
                    .await
                    .map_err(|e| AccountError::invalid(e.body_text()))?;
                // browsers send an empty part when no file was picked
                if body.is_empty() {
                    continue;
                }
                if body.len() > max_image_bytes {
                    return Err(AccountError::invalid(format!(
                        "Image size should be at most {} bytes",
                        max_image_bytes
                    )));
                }
                if ext_from_mime(&content_type).is_none() {
                    return Err(AccountError::invalid("Unsupported image type"));
                }
                image = Some(ImageUpload { body, content_type });
            }
            other => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| AccountError::invalid(e.body_text()))?;
                match other {
                    "userId" | "id" => {
                        let value = value.trim();
                        if !value.is_empty() {
                            let id = Uuid::parse_str(value)
                                .map_err(|_| AccountError::invalid("Invalid userId"))?;
                            user_id = Some(id);
                        }
                    }
                    "name" => name = Some(value),
                    "email" => email = Some(value),
                    "contact_number" => contact_number = Some(value),
                    "address" => address = Some(value),
                    _ => {}
                }
            }
        }
    }

    Ok(UpdateForm {
        user_id,
        name: name.ok_or_else(|| AccountError::invalid("Name is required"))?,
        email: email.ok_or_else(|| AccountError::invalid("Invalid email"))?,
        contact_number,
        address,
        image,
    })
}

#[instrument(skip(state, request))]
pub async fn update_profile(
    State(state): State<AppState>,
    auth: AuthUser,
    request: Request,
) -> Result<Json<UpdateResponse>, AccountError> {
    let form = read_update_form(request, state.config.max_image_bytes).await?;
    let target = auth.target(form.user_id)?;
    let changes = ProfileChanges::new(&form.name, &form.email, form.contact_number, form.address)?;

    let storage = state.storage.as_ref();
    let uploaded = match form.image {
        Some(img) => Some(store_profile_image(storage, target, img).await?),
        None => None,
    };

    let svc = AccountService::from_ref(&state);
    let outcome = match svc.update_profile(target, changes, uploaded.clone()).await {
        Ok(outcome) => outcome,
        Err(e) => {
            if let Some(path) = &uploaded {
                warn!(%path, "update failed; dropping fresh upload");
                discard_image(storage, path).await;
            }
            return Err(e);
        }
    };
    if let Some(old) = &outcome.replaced_image {
        discard_image(storage, old).await;
    }

    Ok(Json(UpdateResponse {
        success: true,
        message: "User updated successfully".into(),
        user: outcome.user,
    }))
}

#[instrument(skip(svc, body))]
pub async fn deactivate(
    State(svc): State<AccountService>,
    auth: AuthUser,
    body: Bytes,
) -> Result<Json<DeactivateResponse>, AccountError> {
    // no body, whatever the content type, acts on the caller
    let requested = if body.iter().all(u8::is_ascii_whitespace) {
        None
    } else {
        let Json(req) = Json::<DeactivateRequest>::from_bytes(&body).map_err(bad_body)?;
        req.user_id
    };
    let target = auth.target(requested)?;
    let user_id = svc.deactivate(target).await?;
    Ok(Json(DeactivateResponse {
        success: true,
        message: "User deactivated successfully".into(),
        user_id,
    }))
}
