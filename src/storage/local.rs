use async_trait::async_trait;
use std::io;
use std::path::{Component, Path, PathBuf};

use super::BlobStore;
use crate::api::{AppError, AppResult};

/// Blobs guardados en disco bajo `STORAGE_DIR` y servidos por `actix-files`
/// en `/media`.
#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    root: PathBuf,
    public_base: String,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>, public_base: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_base: public_base.into(),
        }
    }

    #[cfg(test)]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Ruta absoluta en disco; rechaza rutas que escapen de la raíz
    fn resolve(&self, path: &str) -> AppResult<PathBuf> {
        let relative = Path::new(path);
        let safe = !path.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));

        if !safe {
            return Err(AppError::validation_field("path", "Ruta de imagen inválida"));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn put(&self, path: &str, bytes: &[u8], _content_type: &str) -> AppResult<()> {
        let full = self.resolve(path)?;
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| AppError::storage("create_dir", e))?;
        }
        tokio::fs::write(&full, bytes)
            .await
            .map_err(|e| AppError::storage("write_blob", e))
    }

    async fn delete(&self, path: &str) -> AppResult<()> {
        let full = self.resolve(path)?;
        match tokio::fs::remove_file(&full).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(path = %path, "El blob ya no existía");
                Ok(())
            }
            Err(e) => Err(AppError::storage("delete_blob", e)),
        }
    }

    fn public_url(&self, path: &str) -> String {
        format!("{}/{}", self.public_base.trim_end_matches('/'), path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{upload_image, ImageOwner};

    #[tokio::test]
    async fn writes_and_deletes_files_under_root() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path(), "http://localhost:8080/media/");

        let owner = ImageOwner::RestaurantCover {
            restaurant_id: "abc".to_string(),
        };
        let image = upload_image(&store, &owner, "image/webp", b"RIFF....WEBP")
            .await
            .unwrap();

        let path = image.path.clone().unwrap();
        assert!(image
            .url
            .starts_with("http://localhost:8080/media/restaurants/abc/cover/"));
        assert!(store.root().join(&path).exists());

        store.delete(&path).await.unwrap();
        assert!(!store.root().join(&path).exists());

        // borrar dos veces no es un error
        store.delete(&path).await.unwrap();
    }

    #[test]
    fn rejects_paths_outside_root() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path(), "http://localhost/media");

        tokio_test::block_on(async {
            assert!(store.put("../fuera.png", b"x", "image/png").await.is_err());
            assert!(store.delete("/etc/passwd").await.is_err());
        });
    }
}
