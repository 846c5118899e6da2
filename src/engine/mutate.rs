//! Owner-only mutations: detail, visibility, favorite, and passphrase.
//!
//! `updated_at` policy: detail, visibility, and passphrase changes touch
//! it; the favorite toggle does not (it is a UI marker, not a content
//! change).

use tracing::info;

use super::{validate_description, validate_passphrase, validate_title, DropEngine, DropSnapshot};
use crate::auth::Caller;
use crate::errors::DropError;
use crate::metadata::store::now_utc;

/// Partial update over `{title, description}`.
#[derive(Debug, Clone, Default)]
pub struct DetailPatch {
    pub title: Option<String>,
    pub description: Option<String>,
}

impl DropEngine {
    /// Update title and/or description.  An empty string clears a field;
    /// an absent one leaves it untouched.
    pub async fn update_detail(
        &self,
        caller: &Caller,
        slug: &str,
        patch: DetailPatch,
    ) -> Result<DropSnapshot, DropError> {
        self.require_owner(caller, slug)?;

        if let Some(ref title) = patch.title {
            validate_title(title)?;
        }
        if let Some(ref description) = patch.description {
            validate_description(description)?;
        }

        let title = patch.title.map(|t| (!t.is_empty()).then_some(t));
        let description = patch.description.map(|d| (!d.is_empty()).then_some(d));

        let record = self
            .meta
            .update_detail(slug, title, description, now_utc())?;
        Ok(DropSnapshot::from(&record))
    }

    /// Set the `private` flag.
    pub async fn update_permission(
        &self,
        caller: &Caller,
        slug: &str,
        private: bool,
    ) -> Result<DropSnapshot, DropError> {
        self.require_owner(caller, slug)?;
        let record = self.meta.set_private(slug, private, now_utc())?;
        info!(slug, private, "drop visibility changed");
        Ok(DropSnapshot::from(&record))
    }

    /// Set the `favorite` flag.
    pub async fn update_favorite(
        &self,
        caller: &Caller,
        slug: &str,
        favorite: bool,
    ) -> Result<DropSnapshot, DropError> {
        self.require_owner(caller, slug)?;
        let record = self.meta.set_favorite(slug, favorite)?;
        Ok(DropSnapshot::from(&record))
    }

    /// Set or rotate the passphrase.  Rotation over an existing
    /// passphrase is silent.
    pub async fn set_passphrase(
        &self,
        caller: &Caller,
        slug: &str,
        passphrase: &str,
    ) -> Result<DropSnapshot, DropError> {
        self.require_owner(caller, slug)?;
        validate_passphrase(passphrase)?;

        let verifier = self.hasher.hash(passphrase)?;
        let record = self
            .meta
            .set_passphrase_hash(slug, Some(verifier), now_utc())?;
        info!(slug, "drop passphrase set");
        Ok(DropSnapshot::from(&record))
    }

    /// Remove the passphrase.
    pub async fn remove_passphrase(
        &self,
        caller: &Caller,
        slug: &str,
    ) -> Result<DropSnapshot, DropError> {
        self.require_owner(caller, slug)?;
        let record = self.meta.set_passphrase_hash(slug, None, now_utc())?;
        info!(slug, "drop passphrase removed");
        Ok(DropSnapshot::from(&record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::create::{CreateDrop, UploadMeta};
    use crate::engine::testutil::test_engine;
    use bytes::Bytes;

    async fn seed(engine: &DropEngine, slug: &str) {
        let mut sink = engine.begin_upload().await.unwrap();
        sink.push(Bytes::from_static(b"x")).await.unwrap();
        let staged = sink.finish().await.unwrap();
        engine
            .create(
                CreateDrop {
                    slug: Some(slug.to_string()),
                    title: Some("original".to_string()),
                    owner_id: "operator".to_string(),
                    ..Default::default()
                },
                UploadMeta {
                    filename: "f.bin".to_string(),
                    media_type: None,
                    declared_size: None,
                },
                staged,
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn detail_patch_is_partial() {
        let (_dir, engine) = test_engine(0);
        seed(&engine, "edit1").await;

        let snapshot = engine
            .update_detail(
                &Caller::Owner,
                "edit1",
                DetailPatch {
                    title: None,
                    description: Some("notes".to_string()),
                },
            )
            .await
            .unwrap();
        assert_eq!(snapshot.title.as_deref(), Some("original"));
        assert_eq!(snapshot.description.as_deref(), Some("notes"));

        // Empty string clears.
        let snapshot = engine
            .update_detail(
                &Caller::Owner,
                "edit1",
                DetailPatch {
                    title: Some(String::new()),
                    description: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(snapshot.title, None);
        assert_eq!(snapshot.description.as_deref(), Some("notes"));
    }

    #[tokio::test]
    async fn mutations_are_owner_only() {
        let (_dir, engine) = test_engine(0);
        seed(&engine, "mine1").await;

        assert!(matches!(
            engine
                .update_detail(&Caller::Anonymous, "mine1", DetailPatch::default())
                .await,
            Err(DropError::AuthRequired)
        ));
        assert!(matches!(
            engine
                .update_permission(&Caller::Other, "mine1", true)
                .await,
            Err(DropError::Forbidden)
        ));
        assert!(matches!(
            engine
                .set_passphrase(&Caller::Anonymous, "mine1", "pw")
                .await,
            Err(DropError::AuthRequired)
        ));
    }

    #[tokio::test]
    async fn mutating_unknown_slug_is_not_found() {
        let (_dir, engine) = test_engine(0);
        assert!(matches!(
            engine.update_favorite(&Caller::Owner, "ghost", true).await,
            Err(DropError::NotFound)
        ));
    }

    #[tokio::test]
    async fn passphrase_set_rotate_remove() {
        let (_dir, engine) = test_engine(0);
        seed(&engine, "lock2").await;

        let snapshot = engine
            .set_passphrase(&Caller::Owner, "lock2", "first")
            .await
            .unwrap();
        assert!(snapshot.has_passphrase);
        assert!(matches!(
            engine.preview(&Caller::Anonymous, "lock2", Some("wrong")).await,
            Err(DropError::PasswordInvalid)
        ));
        engine
            .preview(&Caller::Anonymous, "lock2", Some("first"))
            .await
            .unwrap();

        // Rotation: the old passphrase stops verifying.
        engine
            .set_passphrase(&Caller::Owner, "lock2", "second")
            .await
            .unwrap();
        assert!(matches!(
            engine.preview(&Caller::Anonymous, "lock2", Some("first")).await,
            Err(DropError::PasswordInvalid)
        ));
        engine
            .preview(&Caller::Anonymous, "lock2", Some("second"))
            .await
            .unwrap();

        // Removal: open to anonymous again.
        let snapshot = engine
            .remove_passphrase(&Caller::Owner, "lock2")
            .await
            .unwrap();
        assert!(!snapshot.has_passphrase);
        engine
            .preview(&Caller::Anonymous, "lock2", None)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn empty_passphrase_is_rejected() {
        let (_dir, engine) = test_engine(0);
        seed(&engine, "lock3").await;
        assert!(matches!(
            engine.set_passphrase(&Caller::Owner, "lock3", "").await,
            Err(DropError::Validation { .. })
        ));
    }

    #[tokio::test]
    async fn favorite_does_not_touch_updated_at() {
        let (_dir, engine) = test_engine(0);
        seed(&engine, "star1").await;
        let before = engine.preview(&Caller::Owner, "star1", None).await.unwrap();

        let after = engine
            .update_favorite(&Caller::Owner, "star1", true)
            .await
            .unwrap();
        assert!(after.favorite);
        assert_eq!(after.updated_at, before.updated_at);
    }
}
