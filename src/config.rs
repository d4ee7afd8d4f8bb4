//! # Configuración
//!
//! Lee la configuración del servidor desde variables de entorno (archivo `.env`
//! incluido). Las variables requeridas que faltan se registran como error y se
//! sustituyen por su valor por defecto: el arranque nunca se detiene por eso.

use std::env;
use std::path::PathBuf;

/// Backend de almacenamiento de documentos
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    /// MongoDB (producción)
    Mongo,
    /// Almacén en memoria, útil en desarrollo sin base de datos
    Memory,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub mongodb_uri: String,
    pub mongodb_database: String,
    pub store_backend: StoreBackend,
    /// Directorio raíz donde se guardan las imágenes subidas
    pub storage_dir: PathBuf,
    /// URL pública bajo la que se sirven las imágenes (`/media`)
    pub storage_public_url: String,
    pub bind_address: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Construye la configuración a partir de una función de búsqueda.
    ///
    /// Separado de [`AppConfig::from_env`] para poder probarlo sin tocar el
    /// entorno del proceso.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let store_backend = match lookup("STORE_BACKEND").as_deref() {
            Some("memory") => StoreBackend::Memory,
            Some("mongodb") | None => StoreBackend::Mongo,
            Some(other) => {
                tracing::warn!(value = %other, "STORE_BACKEND desconocido, usando mongodb");
                StoreBackend::Mongo
            }
        };

        Self {
            mongodb_uri: required(&lookup, "MONGODB_URI", "mongodb://localhost:27017"),
            mongodb_database: required(&lookup, "MONGODB_DATABASE", "menu_pro"),
            store_backend,
            storage_dir: PathBuf::from(required(&lookup, "STORAGE_DIR", "./media")),
            storage_public_url: required(
                &lookup,
                "STORAGE_PUBLIC_URL",
                "http://localhost:8080/media",
            )
            .trim_end_matches('/')
            .to_string(),
            bind_address: lookup("BIND_ADDRESS").unwrap_or_else(|| "0.0.0.0:8080".to_string()),
        }
    }
}

fn required<F>(lookup: &F, key: &str, default: &str) -> String
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key).filter(|v| !v.trim().is_empty()) {
        Some(value) => value,
        None => {
            tracing::error!(
                variable = %key,
                default = %default,
                "Variable de entorno requerida no definida, usando valor por defecto"
            );
            default.to_string()
        }
    }
}
