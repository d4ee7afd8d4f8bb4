//! # Menu Pro Server
//!
//! Servidor web para publicar y administrar los menús de restaurantes,
//! construido con Rust, Actix Web y MongoDB.
//!
//! ## Características principales
//!
//! - **Restaurantes**: listado con filtro por tipo y búsqueda, ficha con galería
//! - **Menú**: platos agrupados por categoría con precios en soles
//! - **Comentarios**: calificaciones de 1 a 5 de usuarios con sesión
//! - **Administración**: alta, edición y borrado protegidos con token Bearer
//! - **Imágenes**: portada, galería y fotos de platos guardadas en disco y
//!   servidas bajo `/media`
//!
//! ## Configuración
//!
//! El servidor se configura mediante variables de entorno (archivo `.env`):
//!
//! ```env
//! # Base de datos
//! MONGODB_URI=mongodb://localhost:27017
//! MONGODB_DATABASE=menu_pro
//! STORE_BACKEND=mongodb   # o "memory" para desarrollar sin MongoDB
//!
//! # Imágenes
//! STORAGE_DIR=./media
//! STORAGE_PUBLIC_URL=http://localhost:8080/media
//!
//! # Servidor
//! BIND_ADDRESS=0.0.0.0:8080
//!
//! # Logging
//! RUST_LOG=menu_pro=debug,mongodb=info
//! ```
//!
//! ## Arquitectura
//!
//! ```text
//! Cliente web
//!     ↓ HTTP/JSON
//! API REST (Actix Web)
//!     ↓ MenuStore                ↓ BlobStore
//! MongoDB / memoria           Disco local (/media)
//! ```

use actix_files::Files;
use actix_web::{middleware::Logger, web, App, HttpServer};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

mod api;
mod config;
mod db;
mod menu;
mod storage;

use config::{AppConfig, StoreBackend};
use db::{InMemoryStore, MenuStore, MongoRepo};
use storage::{BlobStore, LocalBlobStore};

/// Crea el almacén de documentos elegido en la configuración
///
/// Con MongoDB se comprueba la conexión y se crean los índices; un fallo al
/// crear índices no detiene el arranque.
async fn init_store(config: &AppConfig) -> std::io::Result<Arc<dyn MenuStore>> {
    match config.store_backend {
        StoreBackend::Memory => {
            tracing::warn!("Usando almacén en memoria: los datos se pierden al reiniciar");
            Ok(Arc::new(InMemoryStore::new()))
        }
        StoreBackend::Mongo => {
            let repo = MongoRepo::init(config).await.map_err(|e| {
                tracing::error!("Error conectando a MongoDB: {}", e);
                std::io::Error::other(format!("Error de MongoDB: {}", e))
            })?;

            if let Err(e) = repo.create_indexes().await {
                tracing::warn!("Advertencia creando índices: {}", e);
            }

            Ok(Arc::new(repo))
        }
    }
}

/// Función principal que inicia el servidor web
///
/// 1. Carga variables de entorno desde `.env`
/// 2. Configura el sistema de logging con tracing
/// 3. Inicializa el almacén de documentos y el de imágenes
/// 4. Configura el servidor HTTP con logging, rutas de la API y `/media`
/// 5. Inicia el servidor en la dirección especificada
#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("menu_pro=debug,mongodb=info")),
        )
        .init();

    tracing::info!("Iniciando Menu Pro Server...");

    let config = AppConfig::from_env();
    let store = init_store(&config).await?;

    tokio::fs::create_dir_all(&config.storage_dir).await?;
    let blobs: Arc<dyn BlobStore> = Arc::new(LocalBlobStore::new(
        &config.storage_dir,
        &config.storage_public_url,
    ));

    tracing::info!(
        storage_dir = %config.storage_dir.display(),
        "Servidor iniciando en {}",
        config.bind_address
    );

    let storage_dir = config.storage_dir.clone();
    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::from(store.clone()))
            .app_data(web::Data::from(blobs.clone()))
            .wrap(Logger::default())
            .configure(api::init_routes)
            .service(Files::new("/media", storage_dir.clone()))
    })
    .bind(&config.bind_address)?
    .run()
    .await
}
