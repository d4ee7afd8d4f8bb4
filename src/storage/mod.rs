//! # Almacenamiento de imágenes
//!
//! Valida y guarda las imágenes de restaurantes y platos. La validación
//! (tipo MIME y tamaño) ocurre antes de cualquier llamada al almacenamiento.
//!
//! ## Rutas
//!
//! ```text
//! restaurants/{restaurantId}/cover/{timestamp}.{ext}
//! restaurants/{restaurantId}/gallery/{timestamp}.{ext}
//! restaurants/{restaurantId}/dishes/{dishId}/{timestamp}.{ext}
//! ```
//!
//! La ruta canónica se guarda junto a la URL en [`ImageRef`], así que borrar
//! una imagen nunca necesita interpretar la URL.

pub mod local;

pub use local::LocalBlobStore;

use async_trait::async_trait;

use crate::api::middleware::ErrorLogExt;
use crate::api::{AppError, AppResult};
use crate::db::models::ImageRef;

/// Tipos de archivo permitidos
pub const ALLOWED_CONTENT_TYPES: &[&str] = &["image/jpeg", "image/png", "image/webp"];

/// Tamaño máximo de archivo (5MB)
pub const MAX_FILE_SIZE: usize = 5 * 1024 * 1024;

/// Almacén de blobs direccionado por ruta
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(&self, path: &str, bytes: &[u8], content_type: &str) -> AppResult<()>;

    async fn delete(&self, path: &str) -> AppResult<()>;

    /// URL pública bajo la que se sirve `path`
    fn public_url(&self, path: &str) -> String;
}

/// Entidad dueña de una imagen; decide el directorio donde se guarda
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageOwner {
    RestaurantCover { restaurant_id: String },
    RestaurantGallery { restaurant_id: String },
    Dish { restaurant_id: String, dish_id: String },
}

impl ImageOwner {
    pub fn directory(&self) -> String {
        match self {
            ImageOwner::RestaurantCover { restaurant_id } => {
                format!("restaurants/{}/cover", restaurant_id)
            }
            ImageOwner::RestaurantGallery { restaurant_id } => {
                format!("restaurants/{}/gallery", restaurant_id)
            }
            ImageOwner::Dish {
                restaurant_id,
                dish_id,
            } => format!("restaurants/{}/dishes/{}", restaurant_id, dish_id),
        }
    }

    /// Indica si una ruta almacenada pertenece a este dueño
    pub fn owns(&self, path: &str) -> bool {
        path.strip_prefix(&self.directory())
            .and_then(|rest| rest.strip_prefix('/'))
            .is_some_and(|name| !name.is_empty() && !name.contains('/') && !name.contains(".."))
    }
}

/// Comprueba tipo y tamaño del archivo.
///
/// # Errores
/// - `ValidationWithField`: tipo no permitido, archivo vacío o demasiado grande
pub fn validate_image(content_type: &str, size: usize) -> AppResult<()> {
    if !ALLOWED_CONTENT_TYPES.contains(&content_type) {
        return Err(AppError::validation_field(
            "file",
            &format!(
                "Tipo de archivo no permitido. Tipos permitidos: {}",
                ALLOWED_CONTENT_TYPES.join(", ")
            ),
        ));
    }

    if size == 0 {
        return Err(AppError::validation_field("file", "El archivo está vacío"));
    }

    if size > MAX_FILE_SIZE {
        return Err(AppError::validation_field(
            "file",
            &format!(
                "El archivo es demasiado grande. Tamaño máximo: {}MB",
                MAX_FILE_SIZE / (1024 * 1024)
            ),
        ));
    }

    Ok(())
}

/// Normaliza el `Content-Type` recibido (sin parámetros, en minúsculas).
///
/// Si no llega o es genérico se deduce de la extensión del nombre de archivo.
pub fn resolve_content_type(header: Option<&str>, file_name: Option<&str>) -> String {
    let declared = header
        .and_then(|h| h.split(';').next())
        .map(|h| h.trim().to_ascii_lowercase())
        .filter(|h| !h.is_empty() && h != "application/octet-stream");

    if let Some(declared) = declared {
        return declared;
    }

    let ext = file_name
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg".to_string(),
        "png" => "image/png".to_string(),
        "webp" => "image/webp".to_string(),
        "gif" => "image/gif".to_string(),
        _ => "application/octet-stream".to_string(),
    }
}

fn extension_for(content_type: &str) -> &'static str {
    match content_type {
        "image/png" => "png",
        "image/webp" => "webp",
        _ => "jpg",
    }
}

/// Valida y sube una imagen; devuelve su URL pública y su ruta canónica.
pub async fn upload_image(
    blobs: &dyn BlobStore,
    owner: &ImageOwner,
    content_type: &str,
    bytes: &[u8],
) -> AppResult<ImageRef> {
    validate_image(content_type, bytes.len())?;

    let timestamp = chrono::Utc::now().timestamp_micros();
    let path = format!(
        "{}/{}.{}",
        owner.directory(),
        timestamp,
        extension_for(content_type)
    );

    tracing::debug!(path = %path, size = bytes.len(), content_type = %content_type, "Subiendo imagen");

    blobs
        .put(&path, bytes, content_type)
        .await
        .log_error_context("uploading image")?;

    let url = blobs.public_url(&path);
    tracing::info!(path = %path, url = %url, "Imagen subida");

    Ok(ImageRef {
        url,
        path: Some(path),
    })
}

/// Borra la imagen del almacenamiento usando su ruta guardada.
///
/// Las imágenes externas (sin ruta) se ignoran.
pub async fn delete_image(blobs: &dyn BlobStore, image: &ImageRef) -> AppResult<()> {
    match &image.path {
        Some(path) => {
            blobs
                .delete(path)
                .await
                .log_error_context("deleting image")?;
            tracing::info!(path = %path, "Imagen eliminada");
            Ok(())
        }
        None => {
            tracing::debug!(url = %image.url, "Imagen externa, nada que borrar");
            Ok(())
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Almacén de blobs en memoria que cuenta las llamadas recibidas
    #[derive(Default)]
    pub struct RecordingBlobStore {
        pub blobs: Mutex<HashMap<String, Vec<u8>>>,
        pub calls: Mutex<usize>,
    }

    impl RecordingBlobStore {
        pub fn calls(&self) -> usize {
            *self.calls.lock().unwrap()
        }

        pub fn contains(&self, path: &str) -> bool {
            self.blobs.lock().unwrap().contains_key(path)
        }
    }

    #[async_trait]
    impl BlobStore for RecordingBlobStore {
        async fn put(&self, path: &str, bytes: &[u8], _content_type: &str) -> AppResult<()> {
            *self.calls.lock().unwrap() += 1;
            self.blobs
                .lock()
                .unwrap()
                .insert(path.to_string(), bytes.to_vec());
            Ok(())
        }

        async fn delete(&self, path: &str) -> AppResult<()> {
            *self.calls.lock().unwrap() += 1;
            self.blobs.lock().unwrap().remove(path);
            Ok(())
        }

        fn public_url(&self, path: &str) -> String {
            format!("https://storage.test/media/{}", path)
        }
    }
}
