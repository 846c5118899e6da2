//! End-to-end API tests: the full router over a tempdir blob store and
//! a file-backed SQLite metadata store.

use std::path::Path;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use teledrop::auth::StaticTokenVerifier;
use teledrop::config::Config;
use teledrop::engine::DropEngine;
use teledrop::metadata::sqlite::SqliteStore;
use teledrop::passphrase::PassphraseHasher;
use teledrop::storage::backend::BlobStore;
use teledrop::storage::local::LocalBlobStore;

const OPERATOR_TOKEN: &str = "test-operator-token";
const BOUNDARY: &str = "teledrop-test-boundary";

struct TestApp {
    app: Router,
    /// Holds the blob root and sqlite file alive for the test's duration.
    dir: tempfile::TempDir,
}

impl TestApp {
    fn blob_root(&self) -> std::path::PathBuf {
        self.dir.path().join("blobs")
    }
}

fn build_app(configure: impl FnOnce(&mut Config)) -> TestApp {
    let dir = tempfile::tempdir().unwrap();

    let mut config = Config::default();
    config.auth.operator_token = OPERATOR_TOKEN.to_string();
    config.storage.local.root_dir = dir.path().join("blobs").display().to_string();
    config.metadata.sqlite.path = dir.path().join("meta.db").display().to_string();
    // Cheap argon2 so the suite stays fast.
    config.argon2.memory_kib = 8;
    config.argon2.iterations = 1;
    configure(&mut config);

    let meta = Arc::new(SqliteStore::new(&config.metadata.sqlite.path).unwrap());
    let storage: Arc<dyn BlobStore> =
        Arc::new(LocalBlobStore::new(&config.storage.local.root_dir).unwrap());
    let hasher = Arc::new(PassphraseHasher::new(&config.argon2).unwrap());
    let verifier = Arc::new(StaticTokenVerifier::new(&config.auth));
    let engine = DropEngine::new(
        meta,
        storage.clone(),
        hasher,
        config.limits.clone(),
        config.slugs.clone(),
    );

    let state = Arc::new(teledrop::AppState {
        config,
        engine,
        storage,
        verifier,
    });

    TestApp {
        app: teledrop::server::app(state),
        dir,
    }
}

// -- Request helpers ----------------------------------------------------------

#[derive(Clone, Copy)]
enum Part<'a> {
    Text(&'a str, &'a str),
    File {
        filename: &'a str,
        content_type: &'a str,
        data: &'a [u8],
    },
}

fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match part {
            Part::Text(name, value) => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
                );
                body.extend_from_slice(value.as_bytes());
            }
            Part::File {
                filename,
                content_type,
                data,
            } => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\n"
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(format!("Content-Type: {content_type}\r\n\r\n").as_bytes());
                body.extend_from_slice(data);
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    (status, headers, body.to_vec())
}

fn post_create(parts: &[Part<'_>], token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/api/content/")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        );
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(multipart_body(parts))).unwrap()
}

fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::empty()).unwrap()
}

fn json(body: &[u8]) -> Value {
    serde_json::from_slice(body).unwrap()
}

async fn create_simple<'a>(
    app: &Router,
    slug: &'a str,
    data: &'a [u8],
    extra: &[Part<'a>],
) -> Value {
    let mut parts = vec![
        Part::Text("slug", slug),
        Part::File {
            filename: "payload.txt",
            content_type: "text/plain",
            data,
        },
    ];
    parts.extend_from_slice(extra);
    let (status, _, body) = send(app, post_create(&parts, Some(OPERATOR_TOKEN))).await;
    assert_eq!(
        status,
        StatusCode::CREATED,
        "{}",
        String::from_utf8_lossy(&body)
    );
    json(&body)
}

/// Count regular files under a directory, flagging any `.tmp` leftovers.
fn scan_blobs(root: &Path) -> (usize, usize) {
    let mut files = 0;
    let mut temps = 0;
    let mut stack = vec![root.to_path_buf()];
    while let Some(current) = stack.pop() {
        let Ok(entries) = std::fs::read_dir(&current) else {
            continue;
        };
        for entry in entries {
            let entry = entry.unwrap();
            if entry.file_type().unwrap().is_dir() {
                stack.push(entry.path());
            } else {
                files += 1;
                if entry.path().to_string_lossy().ends_with(".tmp") {
                    temps += 1;
                }
            }
        }
    }
    (files, temps)
}

// -- Scenarios ----------------------------------------------------------------

#[tokio::test]
async fn create_preview_download_roundtrip() {
    let t = build_app(|_| {});

    let snapshot = create_simple(&t.app, "greet", b"hello\n", &[]).await;
    assert_eq!(snapshot["slug"], "greet");
    assert_eq!(snapshot["has_passphrase"], false);
    assert_eq!(snapshot["file_size"], 6);
    assert_eq!(snapshot["file_type"], "text/plain");

    let (status, _, body) = send(&t.app, get("/api/content/greet/preview", None)).await;
    assert_eq!(status, StatusCode::OK);
    let preview = json(&body);
    assert_eq!(preview["slug"], "greet");
    assert_eq!(preview["file_size"], 6);
    assert_eq!(preview["file_name"], "payload.txt");

    let (status, headers, body) = send(&t.app, get("/api/content/greet", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"hello\n");
    assert_eq!(headers[header::CONTENT_LENGTH], "6");
    assert_eq!(headers[header::ACCEPT_RANGES], "bytes");
    assert_eq!(headers[header::CONTENT_TYPE], "text/plain");
    let disposition = headers[header::CONTENT_DISPOSITION].to_str().unwrap();
    assert!(disposition.starts_with("attachment"));
    assert!(disposition.contains("filename*=UTF-8''payload.txt"));
}

#[tokio::test]
async fn download_inline_when_not_attachment() {
    let t = build_app(|_| {});
    create_simple(&t.app, "shown", b"data", &[]).await;

    let (status, headers, _) =
        send(&t.app, get("/api/content/shown?as_attachment=false", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(headers[header::CONTENT_DISPOSITION]
        .to_str()
        .unwrap()
        .starts_with("inline"));
}

#[tokio::test]
async fn range_fetch() {
    let t = build_app(|_| {});
    create_simple(&t.app, "ranged", b"hello\n", &[]).await;

    let req = Request::builder()
        .method("GET")
        .uri("/api/content/ranged")
        .header(header::RANGE, "bytes=1-3")
        .body(Body::empty())
        .unwrap();
    let (status, headers, body) = send(&t.app, req).await;
    assert_eq!(status, StatusCode::PARTIAL_CONTENT);
    assert_eq!(body, b"ell");
    assert_eq!(headers[header::CONTENT_RANGE], "bytes 1-3/6");
    assert_eq!(headers[header::CONTENT_LENGTH], "3");
}

#[tokio::test]
async fn open_and_suffix_ranges_return_whole_payload() {
    let t = build_app(|_| {});
    create_simple(&t.app, "whole", b"hello\n", &[]).await;

    for range in ["bytes=0-", "bytes=-6"] {
        let req = Request::builder()
            .method("GET")
            .uri("/api/content/whole")
            .header(header::RANGE, range)
            .body(Body::empty())
            .unwrap();
        let (status, headers, body) = send(&t.app, req).await;
        assert_eq!(status, StatusCode::PARTIAL_CONTENT, "range {range}");
        assert_eq!(body, b"hello\n");
        assert_eq!(headers[header::CONTENT_RANGE], "bytes 0-5/6");
    }
}

#[tokio::test]
async fn unsatisfiable_and_malformed_ranges_get_416() {
    let t = build_app(|_| {});
    create_simple(&t.app, "badrng", b"hello\n", &[]).await;

    for range in ["bytes=6-", "bytes=6-9", "bytes=abc", "bits=0-1", "bytes=-0"] {
        let req = Request::builder()
            .method("GET")
            .uri("/api/content/badrng")
            .header(header::RANGE, range)
            .body(Body::empty())
            .unwrap();
        let (status, headers, _) = send(&t.app, req).await;
        assert_eq!(status, StatusCode::RANGE_NOT_SATISFIABLE, "range {range}");
        assert_eq!(headers[header::CONTENT_RANGE], "bytes */6");
    }

    // Multi-range falls back to the full content instead.
    let req = Request::builder()
        .method("GET")
        .uri("/api/content/badrng")
        .header(header::RANGE, "bytes=0-1,3-4")
        .body(Body::empty())
        .unwrap();
    let (status, _, body) = send(&t.app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"hello\n");
}

#[tokio::test]
async fn password_protected_anonymous_access() {
    let t = build_app(|_| {});
    create_simple(&t.app, "sec1", b"secret", &[Part::Text("password", "open")]).await;

    let (status, _, body) = send(&t.app, get("/api/content/sec1/preview", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json(&body)["code"], "PASSWORD_REQUIRED");

    let (status, _, body) =
        send(&t.app, get("/api/content/sec1/preview?password=shut", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json(&body)["code"], "PASSWORD_INVALID");

    let (status, _, body) =
        send(&t.app, get("/api/content/sec1/preview?password=open", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&body)["has_passphrase"], true);

    // The download path enforces the same gate.
    let (status, _, _) = send(&t.app, get("/api/content/sec1", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _, body) = send(&t.app, get("/api/content/sec1?password=open", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"secret");
}

#[tokio::test]
async fn owner_bypasses_passphrase() {
    let t = build_app(|_| {});
    create_simple(&t.app, "sec2", b"x", &[Part::Text("password", "open")]).await;

    let (status, _, _) = send(
        &t.app,
        get("/api/content/sec2/preview", Some(OPERATOR_TOKEN)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn private_drop_visibility() {
    let t = build_app(|_| {});
    create_simple(&t.app, "priv1", b"x", &[Part::Text("private", "true")]).await;

    let (status, _, body) = send(&t.app, get("/api/content/priv1/preview", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json(&body)["code"], "AUTH_REQUIRED");

    let (status, _, body) = send(
        &t.app,
        get("/api/content/priv1/preview", Some("not-the-operator")),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json(&body)["code"], "FORBIDDEN");

    let (status, _, _) = send(
        &t.app,
        get("/api/content/priv1/preview", Some(OPERATOR_TOKEN)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn slug_conflict_leaves_no_blob_behind() {
    let t = build_app(|_| {});
    create_simple(&t.app, "dup1", b"winner", &[]).await;
    assert_eq!(scan_blobs(&t.blob_root()), (1, 0));

    let parts = [
        Part::Text("slug", "dup1"),
        Part::File {
            filename: "loser.bin",
            content_type: "application/octet-stream",
            data: b"loser",
        },
    ];
    let (status, _, body) = send(&t.app, post_create(&parts, Some(OPERATOR_TOKEN))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json(&body)["code"], "SLUG_TAKEN");

    // The losing upload's blob was compensated away; no temp files either.
    assert_eq!(scan_blobs(&t.blob_root()), (1, 0));

    // The winner still serves its original bytes.
    let (status, _, body) = send(&t.app, get("/api/content/dup1", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"winner");
}

#[tokio::test]
async fn invalid_slugs_are_rejected() {
    let t = build_app(|_| {});
    for slug in ["ab", "has space", "keycheck"] {
        let parts = [
            Part::Text("slug", slug),
            Part::File {
                filename: "f.bin",
                content_type: "application/octet-stream",
                data: b"x",
            },
        ];
        let (status, _, body) = send(&t.app, post_create(&parts, None)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "slug {slug:?}");
        assert_eq!(json(&body)["code"], "SLUG_INVALID");
    }
    assert_eq!(scan_blobs(&t.blob_root()), (0, 0));
}

#[tokio::test]
async fn auto_generated_slug() {
    let t = build_app(|_| {});
    let parts = [Part::File {
        filename: "auto.bin",
        content_type: "application/octet-stream",
        data: b"auto",
    }];
    let (status, _, body) = send(&t.app, post_create(&parts, None)).await;
    assert_eq!(status, StatusCode::CREATED);
    let slug = json(&body)["slug"].as_str().unwrap().to_string();
    assert_eq!(slug.len(), 8);

    // Anonymous drops are readable by everyone.
    let (status, _, body) = send(&t.app, get(&format!("/api/content/{slug}"), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"auto");
}

#[tokio::test]
async fn size_cap_boundary() {
    let t = build_app(|c| c.limits.max_upload_size = 4);

    // Exactly at the cap: accepted, size recorded.
    let snapshot = create_simple(&t.app, "capok", b"1234", &[]).await;
    assert_eq!(snapshot["file_size"], 4);

    // One byte over: rejected, no blob, no row.
    let parts = [
        Part::Text("slug", "capno"),
        Part::File {
            filename: "big.bin",
            content_type: "application/octet-stream",
            data: b"12345",
        },
    ];
    let (status, _, body) = send(&t.app, post_create(&parts, Some(OPERATOR_TOKEN))).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(json(&body)["code"], "SIZE_LIMIT_EXCEEDED");

    assert_eq!(scan_blobs(&t.blob_root()), (1, 0));
    let (status, _, _) = send(&t.app, get("/api/content/capno/preview", None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn delete_is_idempotent_and_clears_storage() {
    let t = build_app(|_| {});
    create_simple(&t.app, "gone2", b"bye", &[]).await;
    assert_eq!(scan_blobs(&t.blob_root()), (1, 0));

    let req = Request::builder()
        .method("DELETE")
        .uri("/api/content/gone2")
        .header(header::AUTHORIZATION, format!("Bearer {OPERATOR_TOKEN}"))
        .body(Body::empty())
        .unwrap();
    let (status, _, _) = send(&t.app, req).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(scan_blobs(&t.blob_root()), (0, 0));

    // Deleting again is NotFound, not an internal error.
    let req = Request::builder()
        .method("DELETE")
        .uri("/api/content/gone2")
        .header(header::AUTHORIZATION, format!("Bearer {OPERATOR_TOKEN}"))
        .body(Body::empty())
        .unwrap();
    let (status, _, body) = send(&t.app, req).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json(&body)["code"], "NOT_FOUND");

    let (status, _, _) = send(&t.app, get("/api/content/gone2", None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn delete_requires_owner() {
    let t = build_app(|_| {});
    create_simple(&t.app, "keep2", b"x", &[]).await;

    let req = Request::builder()
        .method("DELETE")
        .uri("/api/content/keep2")
        .body(Body::empty())
        .unwrap();
    let (status, _, _) = send(&t.app, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let req = Request::builder()
        .method("DELETE")
        .uri("/api/content/keep2")
        .header(header::AUTHORIZATION, "Bearer wrong")
        .body(Body::empty())
        .unwrap();
    let (status, _, _) = send(&t.app, req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn keycheck_reports_existence() {
    let t = build_app(|_| {});
    create_simple(&t.app, "taken2", b"x", &[]).await;

    let (status, _, body) = send(&t.app, get("/api/content/keycheck/taken2", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&body)["exists"], true);

    let (_, _, body) = send(&t.app, get("/api/content/keycheck/freeee", None)).await;
    assert_eq!(json(&body)["exists"], false);

    // Reserved route segments read as taken.
    let (_, _, body) = send(&t.app, get("/api/content/keycheck/metrics", None)).await;
    assert_eq!(json(&body)["exists"], true);
}

#[tokio::test]
async fn list_is_owner_only_with_paging_metadata() {
    let t = build_app(|_| {});
    create_simple(&t.app, "itemA", b"aa", &[]).await;
    create_simple(&t.app, "itemB", b"bbbb", &[]).await;

    let (status, _, _) = send(&t.app, get("/api/content/", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _, _) = send(&t.app, get("/api/content/", Some("wrong"))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _, body) = send(
        &t.app,
        get(
            "/api/content/?sortby=size&orderby=desc&page=1&page_size=1",
            Some(OPERATOR_TOKEN),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let page = json(&body);
    assert_eq!(page["total"], 2);
    assert_eq!(page["page"], 1);
    assert_eq!(page["page_size"], 1);
    assert_eq!(page["contents"].as_array().unwrap().len(), 1);
    assert_eq!(page["contents"][0]["slug"], "itemB");

    let (status, _, body) = send(
        &t.app,
        get("/api/content/?sortby=bogus", Some(OPERATOR_TOKEN)),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json(&body)["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn detail_patch_touches_updated_at_favorite_does_not() {
    let t = build_app(|_| {});
    let created = create_simple(&t.app, "stamp", b"x", &[]).await;
    let original_updated = created["updated_at"].as_str().unwrap().to_string();

    // Favorite toggle: updated_at unchanged.
    let req = Request::builder()
        .method("PATCH")
        .uri("/api/content/stamp/favorite")
        .header(header::AUTHORIZATION, format!("Bearer {OPERATOR_TOKEN}"))
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from("favorite=true"))
        .unwrap();
    let (status, _, body) = send(&t.app, req).await;
    assert_eq!(status, StatusCode::OK);
    let favorited = json(&body);
    assert_eq!(favorited["favorite"], true);
    assert_eq!(favorited["updated_at"], original_updated.as_str());

    // Detail patch: title changes and the response reflects it.
    let req = Request::builder()
        .method("PATCH")
        .uri("/api/content/stamp/detail")
        .header(header::AUTHORIZATION, format!("Bearer {OPERATOR_TOKEN}"))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"title":"renamed"}"#))
        .unwrap();
    let (status, _, body) = send(&t.app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&body)["title"], "renamed");
}

#[tokio::test]
async fn permission_and_password_patches() {
    let t = build_app(|_| {});
    create_simple(&t.app, "flip1", b"x", &[]).await;

    // Make it private; anonymous preview starts failing.
    let req = Request::builder()
        .method("PATCH")
        .uri("/api/content/flip1/permission")
        .header(header::AUTHORIZATION, format!("Bearer {OPERATOR_TOKEN}"))
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from("private=true"))
        .unwrap();
    let (status, _, body) = send(&t.app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&body)["private"], true);

    let (status, _, _) = send(&t.app, get("/api/content/flip1/preview", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Open it back up and set a passphrase instead.
    let req = Request::builder()
        .method("PATCH")
        .uri("/api/content/flip1/permission")
        .header(header::AUTHORIZATION, format!("Bearer {OPERATOR_TOKEN}"))
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from("private=false"))
        .unwrap();
    let (status, _, _) = send(&t.app, req).await;
    assert_eq!(status, StatusCode::OK);

    let req = Request::builder()
        .method("PATCH")
        .uri("/api/content/flip1/password")
        .header(header::AUTHORIZATION, format!("Bearer {OPERATOR_TOKEN}"))
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from("new_password=hunter2"))
        .unwrap();
    let (status, _, body) = send(&t.app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&body)["has_passphrase"], true);

    let (status, _, body) = send(&t.app, get("/api/content/flip1/preview", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json(&body)["code"], "PASSWORD_REQUIRED");

    let (status, _, _) = send(
        &t.app,
        get("/api/content/flip1/preview?password=hunter2", None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // Reset clears the passphrase.
    let req = Request::builder()
        .method("PATCH")
        .uri("/api/content/flip1/reset")
        .header(header::AUTHORIZATION, format!("Bearer {OPERATOR_TOKEN}"))
        .body(Body::empty())
        .unwrap();
    let (status, _, body) = send(&t.app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&body)["has_passphrase"], false);

    let (status, _, _) = send(&t.app, get("/api/content/flip1/preview", None)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn create_with_bad_credentials_is_unauthorized() {
    let t = build_app(|_| {});
    let parts = [Part::File {
        filename: "f.bin",
        content_type: "application/octet-stream",
        data: b"x",
    }];
    let (status, _, body) = send(&t.app, post_create(&parts, Some("wrong-token"))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json(&body)["code"], "AUTH_REQUIRED");
    assert_eq!(scan_blobs(&t.blob_root()), (0, 0));
}

#[tokio::test]
async fn unknown_multipart_field_is_rejected_and_compensated() {
    let t = build_app(|_| {});
    let parts = [
        Part::File {
            filename: "f.bin",
            content_type: "application/octet-stream",
            data: b"x",
        },
        Part::Text("surprise", "nope"),
    ];
    let (status, _, body) = send(&t.app, post_create(&parts, None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json(&body)["code"], "VALIDATION_ERROR");

    // The already-streamed blob was cleaned up.
    assert_eq!(scan_blobs(&t.blob_root()), (0, 0));
}

#[tokio::test]
async fn missing_file_field_is_rejected() {
    let t = build_app(|_| {});
    let parts = [Part::Text("slug", "nofile")];
    let (status, _, body) = send(&t.app, post_create(&parts, None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json(&body)["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn health_and_common_headers() {
    let t = build_app(|_| {});
    let (status, headers, body) = send(&t.app, get("/health", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, br#"{"status":"ok"}"#);
    assert_eq!(headers["server"], "Teledrop");
    assert!(headers.contains_key("x-request-id"));
    assert!(headers.contains_key("date"));
}

#[tokio::test]
async fn empty_file_round_trips() {
    let t = build_app(|_| {});
    let snapshot = create_simple(&t.app, "empty", b"", &[]).await;
    assert_eq!(snapshot["file_size"], 0);

    let (status, headers, body) = send(&t.app, get("/api/content/empty", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::CONTENT_LENGTH], "0");
    assert!(body.is_empty());

    // Any range on an empty blob is unsatisfiable.
    let req = Request::builder()
        .method("GET")
        .uri("/api/content/empty")
        .header(header::RANGE, "bytes=0-")
        .body(Body::empty())
        .unwrap();
    let (status, headers, _) = send(&t.app, req).await;
    assert_eq!(status, StatusCode::RANGE_NOT_SATISFIABLE);
    assert_eq!(headers[header::CONTENT_RANGE], "bytes */0");
}

#[tokio::test]
async fn content_hash_matches_payload() {
    use sha2::{Digest, Sha256};

    let t = build_app(|_| {});
    let payload = b"integrity check payload";
    let snapshot = create_simple(&t.app, "hashd", payload, &[]).await;
    assert_eq!(
        snapshot["content_hash"].as_str().unwrap(),
        hex::encode(Sha256::digest(payload))
    );

    // The download carries the hash as its ETag.
    let (_, headers, body) = send(&t.app, get("/api/content/hashd", None)).await;
    assert_eq!(body, payload);
    assert_eq!(
        headers[header::ETAG].to_str().unwrap(),
        format!("\"{}\"", hex::encode(Sha256::digest(payload)))
    );
}
