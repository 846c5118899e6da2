//! Range & stream gateway: `GET /api/content/{slug}`.
//!
//! Serves 200 full-content or 206 partial-content responses by pulling
//! chunks from the blob store one at a time.  A stalled or disconnected
//! client suspends and then drops the stream, which closes the blob
//! handle promptly -- no request ever holds more than one chunk in
//! memory.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use tokio_util::io::ReaderStream;
use tracing::error;

use crate::engine::DownloadTicket;
use crate::errors::DropError;
use crate::metrics;
use crate::range::{self, RangeDirective};
use crate::storage::backend::{BlobReader, StorageError};
use crate::AppState;

/// Query parameters of a download request.
#[derive(Debug, Deserialize)]
pub struct DownloadQuery {
    pub password: Option<String>,
    /// `attachment` disposition when true (the default), `inline` when false.
    pub as_attachment: Option<bool>,
}

/// `GET /api/content/{slug}` -- stream the drop's file.
///
/// Honors a single `bytes=` range; multi-range requests are answered
/// with the full content, malformed or unsatisfiable ranges with 416.
#[utoipa::path(
    get,
    path = "/api/content/{slug}",
    tag = "Drops",
    operation_id = "DownloadDrop",
    params(
        ("slug" = String, Path, description = "Drop slug"),
        ("password" = Option<String>, Query, description = "Drop passphrase"),
        ("as_attachment" = Option<bool>, Query, description = "attachment vs inline disposition"),
    ),
    responses(
        (status = 200, description = "Full content"),
        (status = 206, description = "Partial content (range request)"),
        (status = 401, description = "Passphrase or authentication required"),
        (status = 403, description = "Access denied"),
        (status = 404, description = "Drop not found"),
        (status = 416, description = "Range not satisfiable"),
    )
)]
pub async fn download_drop(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
    Query(query): Query<DownloadQuery>,
    headers: HeaderMap,
) -> Result<Response, DropError> {
    let caller = state.verifier.resolve(&headers);
    let ticket = state
        .engine
        .open_download(&caller, &slug, query.password.as_deref())
        .await?;

    let range_header = headers
        .get(header::RANGE)
        .and_then(|v| v.to_str().ok());

    let (status, reader, content_length, content_range) =
        match range::interpret(range_header, ticket.size) {
            RangeDirective::NotSatisfiable => {
                return Ok(range_not_satisfiable(ticket.size));
            }
            RangeDirective::Full => {
                let reader = state
                    .storage
                    .read(&ticket.storage_key)
                    .await
                    .map_err(|e| map_blob_error(&slug, &ticket, e))?;
                (StatusCode::OK, reader, ticket.size, None)
            }
            RangeDirective::Partial { start, end } => {
                let reader = state
                    .storage
                    .read_range(&ticket.storage_key, start, end)
                    .await
                    .map_err(|e| map_blob_error(&slug, &ticket, e))?;
                let content_range = format!("bytes {start}-{end}/{}", ticket.size);
                (
                    StatusCode::PARTIAL_CONTENT,
                    reader,
                    end - start + 1,
                    Some(content_range),
                )
            }
        };

    metrics::record_bytes_sent(content_length);
    Ok(stream_response(
        status,
        reader,
        &ticket,
        content_length,
        content_range,
        query.as_attachment.unwrap_or(true),
        state.engine.chunk_size(),
    ))
}

/// A 416 with the `Content-Range: bytes */size` the client needs to retry.
fn range_not_satisfiable(size: u64) -> Response {
    (
        StatusCode::RANGE_NOT_SATISFIABLE,
        [
            (header::CONTENT_RANGE, format!("bytes */{size}")),
            (header::ACCEPT_RANGES, "bytes".to_string()),
        ],
    )
        .into_response()
}

/// A live file row pointing at missing bytes is corruption; it surfaces
/// as 404 after logging.
fn map_blob_error(slug: &str, ticket: &DownloadTicket, err: StorageError) -> DropError {
    if matches!(err, StorageError::NotFound(_)) {
        error!(
            slug,
            storage_key = %ticket.storage_key,
            "live drop references a missing blob"
        );
        return DropError::NotFound;
    }
    err.into()
}

/// Assemble the streaming response with the download header set.
fn stream_response(
    status: StatusCode,
    reader: BlobReader,
    ticket: &DownloadTicket,
    content_length: u64,
    content_range: Option<String>,
    as_attachment: bool,
    chunk_size: usize,
) -> Response {
    let body = Body::from_stream(ReaderStream::with_capacity(reader, chunk_size));
    let mut response = (status, body).into_response();
    let hdrs = response.headers_mut();

    hdrs.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(&ticket.media_type)
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
    );
    hdrs.insert(
        header::CONTENT_LENGTH,
        HeaderValue::from_str(&content_length.to_string()).expect("numeric header"),
    );
    if let Some(ref range) = content_range {
        if let Ok(value) = HeaderValue::from_str(range) {
            hdrs.insert(header::CONTENT_RANGE, value);
        }
    }
    hdrs.insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));
    if let Ok(value) =
        HeaderValue::from_str(&range::content_disposition(&ticket.file_name, as_attachment))
    {
        hdrs.insert(header::CONTENT_DISPOSITION, value);
    }
    if let Ok(value) = HeaderValue::from_str(&format!("\"{}\"", ticket.content_hash)) {
        hdrs.insert(header::ETAG, value);
    }
    hdrs.insert(
        header::CONTENT_ENCODING,
        HeaderValue::from_static("identity"),
    );
    hdrs.insert(
        header::ACCESS_CONTROL_EXPOSE_HEADERS,
        HeaderValue::from_static(
            "content-type, accept-ranges, content-length, content-range, content-encoding",
        ),
    );

    response
}
