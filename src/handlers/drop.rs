//! Drop CRUD handlers: create, preview, list, mutations, delete,
//! and the slug-availability check.
//!
//! Handlers translate HTTP shapes into engine calls and nothing more;
//! validation, access control, and the consistency protocol live in
//! [`crate::engine`].

use std::sync::Arc;

use axum::extract::{Multipart, Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Form, Json};
use serde::Deserialize;
use serde_json::json;

use crate::auth::Caller;
use crate::engine::{CreateDrop, DetailPatch, StagedFile, UploadMeta};
use crate::errors::DropError;
use crate::metadata::store::{ListParams, SortKey, SortOrder, ANONYMOUS_OWNER};
use crate::metrics;
use crate::AppState;

/// Optional passphrase carried as a query parameter.
#[derive(Debug, Deserialize)]
pub struct PasswordQuery {
    pub password: Option<String>,
}

// -- Create -------------------------------------------------------------------

/// `POST /api/content/` -- create a drop from a multipart form.
///
/// Fields: `file` (required), `slug?`, `title?`, `description?`,
/// `password?`, `private?`, `favorite?`.  Unknown fields are rejected.
#[utoipa::path(
    post,
    path = "/api/content/",
    tag = "Drops",
    operation_id = "CreateDrop",
    responses(
        (status = 201, description = "Drop created", body = crate::engine::DropSnapshot),
        (status = 400, description = "Invalid field"),
        (status = 401, description = "Credentials presented but invalid"),
        (status = 409, description = "Slug already taken"),
        (status = 413, description = "Upload exceeds the size cap"),
        (status = 500, description = "Storage failure"),
    )
)]
pub async fn create_drop(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<Response, DropError> {
    let owner_id = match state.verifier.resolve(&headers) {
        Caller::Owner => state.config.auth.operator_id.clone(),
        Caller::Anonymous => ANONYMOUS_OWNER.to_string(),
        // Bad credentials on an upload are a client mistake worth surfacing,
        // not an anonymous fallback.
        Caller::Other => return Err(DropError::AuthRequired),
    };

    let create = consume_create(&state, owner_id, multipart);
    let snapshot = match state.engine.operation_deadline() {
        Some(deadline) => tokio::time::timeout(deadline, create)
            .await
            .map_err(|_| DropError::validation("operation deadline exceeded"))??,
        None => create.await?,
    };

    metrics::record_drop_created(snapshot.file_size);
    Ok((StatusCode::CREATED, Json(snapshot)).into_response())
}

/// Walk the multipart fields, streaming the payload as it arrives.
///
/// Clients may order fields freely, so the blob can be committed before
/// all metadata is known; every error after that point compensates by
/// deleting the staged blob.
async fn consume_create(
    state: &AppState,
    owner_id: String,
    mut multipart: Multipart,
) -> Result<crate::engine::DropSnapshot, DropError> {
    let mut input = CreateDrop {
        owner_id,
        ..Default::default()
    };
    let mut staged: Option<(StagedFile, UploadMeta)> = None;

    let result = async {
        while let Some(mut field) = multipart
            .next_field()
            .await
            .map_err(|e| DropError::validation(format!("multipart error: {e}")))?
        {
            match field.name() {
                Some("file") => {
                    if staged.is_some() {
                        return Err(DropError::validation("duplicate file field"));
                    }
                    // Reject obviously bad metadata before streaming bytes.
                    state.engine.validate_create(&input)?;

                    let meta = UploadMeta {
                        filename: field.file_name().unwrap_or("file").to_string(),
                        media_type: field.content_type().map(String::from),
                        declared_size: field
                            .headers()
                            .get("content-length")
                            .and_then(|v| v.to_str().ok())
                            .and_then(|v| v.parse().ok()),
                    };

                    let mut sink = state.engine.begin_upload().await?;
                    loop {
                        match field.chunk().await {
                            Ok(Some(chunk)) => {
                                if let Err(e) = sink.push(chunk).await {
                                    sink.abort().await;
                                    return Err(e);
                                }
                            }
                            Ok(None) => break,
                            // Covers client disconnects mid-upload: the
                            // truncated stream is an error and the temp
                            // blob is discarded.
                            Err(e) => {
                                sink.abort().await;
                                return Err(DropError::validation(format!(
                                    "upload read error: {e}"
                                )));
                            }
                        }
                    }
                    staged = Some((sink.finish().await?, meta));
                }
                Some("slug") => input.slug = non_empty(read_text(field).await?),
                Some("title") => input.title = Some(read_text(field).await?),
                Some("description") => input.description = Some(read_text(field).await?),
                Some("password") => input.passphrase = non_empty(read_text(field).await?),
                Some("private") => input.private = parse_bool("private", &read_text(field).await?)?,
                Some("favorite") => {
                    input.favorite = parse_bool("favorite", &read_text(field).await?)?
                }
                Some(other) => {
                    return Err(DropError::validation(format!("unknown field {other:?}")))
                }
                None => return Err(DropError::validation("multipart field without a name")),
            }
        }
        Ok(())
    }
    .await;

    if let Err(e) = result {
        if let Some((staged_file, _)) = staged {
            state.engine.discard_blob(&staged_file.storage_key).await;
        }
        return Err(e);
    }

    let Some((staged_file, meta)) = staged else {
        return Err(DropError::validation("file field is required"));
    };
    state.engine.create(input, meta, staged_file).await
}

async fn read_text(field: axum::extract::multipart::Field<'_>) -> Result<String, DropError> {
    field
        .text()
        .await
        .map_err(|e| DropError::validation(format!("failed to read field: {e}")))
}

fn non_empty(s: String) -> Option<String> {
    (!s.trim().is_empty()).then(|| s.trim().to_string())
}

fn parse_bool(field: &str, value: &str) -> Result<bool, DropError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Ok(true),
        "false" | "0" | "" => Ok(false),
        other => Err(DropError::validation(format!(
            "{field} must be a boolean, got {other:?}"
        ))),
    }
}

// -- Preview ------------------------------------------------------------------

/// `GET /api/content/{slug}/preview` -- public projection of a drop.
#[utoipa::path(
    get,
    path = "/api/content/{slug}/preview",
    tag = "Drops",
    operation_id = "PreviewDrop",
    params(
        ("slug" = String, Path, description = "Drop slug"),
        ("password" = Option<String>, Query, description = "Drop passphrase"),
    ),
    responses(
        (status = 200, description = "Drop snapshot", body = crate::engine::DropSnapshot),
        (status = 401, description = "Passphrase or authentication required"),
        (status = 403, description = "Access denied"),
        (status = 404, description = "Drop not found"),
    )
)]
pub async fn preview_drop(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
    Query(query): Query<PasswordQuery>,
    headers: HeaderMap,
) -> Result<Response, DropError> {
    let caller = state.verifier.resolve(&headers);
    let snapshot = state
        .engine
        .preview(&caller, &slug, query.password.as_deref())
        .await?;
    Ok(Json(snapshot).into_response())
}

// -- List ---------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
    pub sortby: Option<String>,
    pub orderby: Option<String>,
    pub favorite: Option<bool>,
}

/// `GET /api/content/` -- owner-only listing.
#[utoipa::path(
    get,
    path = "/api/content/",
    tag = "Drops",
    operation_id = "ListDrops",
    responses(
        (status = 200, description = "One page of drops", body = crate::engine::DropPage),
        (status = 400, description = "Bad sort parameters"),
        (status = 401, description = "Authentication required"),
        (status = 403, description = "Access denied"),
    )
)]
pub async fn list_drops(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
    headers: HeaderMap,
) -> Result<Response, DropError> {
    let caller = state.verifier.resolve(&headers);

    let sort = match query.sortby.as_deref() {
        None => SortKey::default(),
        Some(s) => SortKey::parse(s)
            .ok_or_else(|| DropError::validation(format!("unknown sort key {s:?}")))?,
    };
    let order = match query.orderby.as_deref() {
        None => SortOrder::default(),
        Some(s) => SortOrder::parse(s)
            .ok_or_else(|| DropError::validation(format!("unknown sort order {s:?}")))?,
    };

    let params = ListParams {
        sort,
        order,
        page: query.page.unwrap_or(1).max(1),
        page_size: query.page_size.unwrap_or(10).clamp(1, 100),
        favorite: query.favorite,
    };

    let page = state.engine.list(&caller, params).await?;
    Ok(Json(page).into_response())
}

// -- Mutations ----------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DetailBody {
    pub title: Option<String>,
    pub description: Option<String>,
}

/// `PATCH /api/content/{slug}/detail` -- partial title/description update.
///
/// An empty string clears a field; an absent one leaves it untouched.
#[utoipa::path(
    patch,
    path = "/api/content/{slug}/detail",
    tag = "Drops",
    operation_id = "UpdateDropDetail",
    params(("slug" = String, Path, description = "Drop slug")),
    responses(
        (status = 200, description = "Updated snapshot", body = crate::engine::DropSnapshot),
        (status = 401, description = "Authentication required"),
        (status = 403, description = "Access denied"),
        (status = 404, description = "Drop not found"),
    )
)]
pub async fn update_detail(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
    headers: HeaderMap,
    Json(body): Json<DetailBody>,
) -> Result<Response, DropError> {
    let caller = state.verifier.resolve(&headers);
    let snapshot = state
        .engine
        .update_detail(
            &caller,
            &slug,
            DetailPatch {
                title: body.title,
                description: body.description,
            },
        )
        .await?;
    Ok(Json(snapshot).into_response())
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PermissionForm {
    pub private: bool,
}

/// `PATCH /api/content/{slug}/permission` -- toggle private visibility.
#[utoipa::path(
    patch,
    path = "/api/content/{slug}/permission",
    tag = "Drops",
    operation_id = "UpdateDropPermission",
    params(("slug" = String, Path, description = "Drop slug")),
    responses(
        (status = 200, description = "Updated snapshot", body = crate::engine::DropSnapshot),
        (status = 401, description = "Authentication required"),
        (status = 403, description = "Access denied"),
        (status = 404, description = "Drop not found"),
    )
)]
pub async fn update_permission(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
    headers: HeaderMap,
    Form(form): Form<PermissionForm>,
) -> Result<Response, DropError> {
    let caller = state.verifier.resolve(&headers);
    let snapshot = state
        .engine
        .update_permission(&caller, &slug, form.private)
        .await?;
    Ok(Json(snapshot).into_response())
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FavoriteForm {
    pub favorite: bool,
}

/// `PATCH /api/content/{slug}/favorite` -- toggle the favorite marker.
#[utoipa::path(
    patch,
    path = "/api/content/{slug}/favorite",
    tag = "Drops",
    operation_id = "UpdateDropFavorite",
    params(("slug" = String, Path, description = "Drop slug")),
    responses(
        (status = 200, description = "Updated snapshot", body = crate::engine::DropSnapshot),
        (status = 401, description = "Authentication required"),
        (status = 403, description = "Access denied"),
        (status = 404, description = "Drop not found"),
    )
)]
pub async fn update_favorite(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
    headers: HeaderMap,
    Form(form): Form<FavoriteForm>,
) -> Result<Response, DropError> {
    let caller = state.verifier.resolve(&headers);
    let snapshot = state
        .engine
        .update_favorite(&caller, &slug, form.favorite)
        .await?;
    Ok(Json(snapshot).into_response())
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PasswordForm {
    pub new_password: String,
}

/// `PATCH /api/content/{slug}/password` -- set or rotate the passphrase.
#[utoipa::path(
    patch,
    path = "/api/content/{slug}/password",
    tag = "Drops",
    operation_id = "SetDropPassword",
    params(("slug" = String, Path, description = "Drop slug")),
    responses(
        (status = 200, description = "Updated snapshot", body = crate::engine::DropSnapshot),
        (status = 401, description = "Authentication required"),
        (status = 403, description = "Access denied"),
        (status = 404, description = "Drop not found"),
    )
)]
pub async fn set_password(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
    headers: HeaderMap,
    Form(form): Form<PasswordForm>,
) -> Result<Response, DropError> {
    let caller = state.verifier.resolve(&headers);
    let snapshot = state
        .engine
        .set_passphrase(&caller, &slug, &form.new_password)
        .await?;
    Ok(Json(snapshot).into_response())
}

/// `PATCH /api/content/{slug}/reset` -- remove the passphrase.
#[utoipa::path(
    patch,
    path = "/api/content/{slug}/reset",
    tag = "Drops",
    operation_id = "ResetDropPassword",
    params(("slug" = String, Path, description = "Drop slug")),
    responses(
        (status = 200, description = "Updated snapshot", body = crate::engine::DropSnapshot),
        (status = 401, description = "Authentication required"),
        (status = 403, description = "Access denied"),
        (status = 404, description = "Drop not found"),
    )
)]
pub async fn reset_password(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
    headers: HeaderMap,
) -> Result<Response, DropError> {
    let caller = state.verifier.resolve(&headers);
    let snapshot = state.engine.remove_passphrase(&caller, &slug).await?;
    Ok(Json(snapshot).into_response())
}

// -- Delete -------------------------------------------------------------------

/// `DELETE /api/content/{slug}` -- delete a drop and its blob.
#[utoipa::path(
    delete,
    path = "/api/content/{slug}",
    tag = "Drops",
    operation_id = "DeleteDrop",
    params(
        ("slug" = String, Path, description = "Drop slug"),
        ("password" = Option<String>, Query, description = "Accepted but not required for the owner"),
    ),
    responses(
        (status = 204, description = "Drop deleted"),
        (status = 401, description = "Authentication required"),
        (status = 403, description = "Access denied"),
        (status = 404, description = "Drop not found"),
    )
)]
pub async fn delete_drop(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
    Query(_query): Query<PasswordQuery>,
    headers: HeaderMap,
) -> Result<Response, DropError> {
    let caller = state.verifier.resolve(&headers);
    state.engine.delete(&caller, &slug).await?;
    metrics::record_drop_deleted();
    Ok(StatusCode::NO_CONTENT.into_response())
}

// -- Keycheck -----------------------------------------------------------------

/// `GET /api/content/keycheck/{slug}` -- advisory slug-availability check.
#[utoipa::path(
    get,
    path = "/api/content/keycheck/{slug}",
    tag = "Drops",
    operation_id = "CheckSlug",
    params(("slug" = String, Path, description = "Candidate slug")),
    responses(
        (status = 200, description = "Whether the slug is already taken"),
    )
)]
pub async fn keycheck(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
) -> Result<Response, DropError> {
    let available = state.engine.slug_available(&slug).await?;
    Ok(Json(json!({ "exists": !available })).into_response())
}
