//! # Módulo API
//!
//! Este módulo contiene todas las rutas y controladores de la API REST.
//!
//! ## Módulos principales
//!
//! - [`auth`] - Registro, login y sesión de administradores
//! - [`restaurant`] - Gestión de restaurantes (listado, alta, edición, borrado)
//! - [`dish`] - Platos de cada restaurante, búsqueda global y menú agrupado
//! - [`comment`] - Comentarios y calificaciones
//! - [`image`] - Subida y borrado de portada, galería y fotos de platos
//! - [`health`] - Diagnóstico del backend
//! - [`errors`] - Manejo de errores de la aplicación

pub mod auth;
pub mod comment;
pub mod dish;
pub mod errors;
pub mod health;
pub mod image;
pub mod restaurant;
pub(crate) mod middleware;

// Re-exportar tipos comunes para facilitar su uso
pub use errors::{AppError, AppResult, ErrorResponse, ResultExt};

use actix_web::web;

use crate::storage::MAX_FILE_SIZE;

/// Configura todas las rutas de la API
///
/// ## Rutas configuradas
///
/// - `/auth/*` - Ver [`auth::routes`]
/// - `/restaurants/*` - Ver [`restaurant::routes`]
/// - `/restaurants/{id}/dishes/*`, `/dishes/search`, `/restaurants/{id}/menu` - Ver [`dish::routes`]
/// - `/restaurants/{id}/comments` - Ver [`comment::routes`]
/// - `/restaurants/{id}/cover`, `/images`, `/dishes/{dish_id}/photos` - Ver [`image::routes`]
/// - `/health` - Ver [`health::routes`]
///
/// El límite de cuerpo se amplía por encima de [`MAX_FILE_SIZE`] para que un
/// archivo demasiado grande llegue a la validación y reciba un mensaje claro.
pub fn init_routes(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::PayloadConfig::new(2 * MAX_FILE_SIZE));

    auth::routes(cfg);
    restaurant::routes(cfg);
    dish::routes(cfg);
    comment::routes(cfg);
    image::routes(cfg);
    health::routes(cfg);
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;

    use crate::db::{InMemoryStore, MenuStore};
    use crate::storage::testing::RecordingBlobStore;

    /// Estado compartido de una aplicación de prueba
    pub struct TestContext {
        pub memory: Arc<InMemoryStore>,
        pub blobs: Arc<RecordingBlobStore>,
    }

    impl TestContext {
        pub fn new() -> Self {
            Self {
                memory: Arc::new(InMemoryStore::new()),
                blobs: Arc::new(RecordingBlobStore::default()),
            }
        }

        /// Crea un administrador con sesión abierta y devuelve su token
        pub async fn session(&self) -> String {
            let user = self
                .memory
                .create_user(
                    &format!("{}@menu.pe", uuid::Uuid::new_v4().simple()),
                    "sin-hash",
                )
                .await
                .unwrap();
            let token = uuid::Uuid::new_v4().to_string();
            self.memory
                .set_access_token(&user.id, Some(&token))
                .await
                .unwrap();
            token
        }
    }

    /// Inicializa la aplicación con el almacén en memoria del contexto
    macro_rules! test_app {
        ($ctx:expr) => {{
            let store: std::sync::Arc<dyn $crate::db::MenuStore> = $ctx.memory.clone();
            let blobs: std::sync::Arc<dyn $crate::storage::BlobStore> = $ctx.blobs.clone();
            actix_web::test::init_service(
                actix_web::App::new()
                    .app_data(actix_web::web::Data::from(store))
                    .app_data(actix_web::web::Data::from(blobs))
                    .configure($crate::api::init_routes),
            )
            .await
        }};
    }

    pub(crate) use test_app;
}
