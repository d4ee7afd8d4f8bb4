//! # API de Imágenes
//!
//! Portada y galería de restaurantes, fotos de platos.
//!
//! El cuerpo de la petición es el archivo en crudo; el tipo se toma del
//! header `Content-Type` o, si falta, de `?filename=`. Cada subida valida,
//! guarda el blob y después actualiza el registro. Los dos pasos no son
//! atómicos: si falla el segundo el blob queda subido y el registro sin
//! cambios.

use actix_web::http::header;
use actix_web::{delete, post, web, HttpRequest, HttpResponse, Responder};
use serde::Deserialize;
use serde_json::json;

use super::auth::authenticate;
use super::dish::require_dish;
use super::middleware::ErrorLogExt;
use super::restaurant::require_restaurant;
use super::{AppError, AppResult};
use crate::db::models::{DishPatch, ImageRef, RestaurantPatch, MAX_DISH_PHOTOS, MAX_GALLERY_IMAGES};
use crate::db::MenuStore;
use crate::storage::{self, BlobStore, ImageOwner};

#[derive(Deserialize)]
struct UploadQuery {
    filename: Option<String>,
}

/// Imagen a borrar, por ruta de almacenamiento o por URL
#[derive(Deserialize)]
struct ImageQuery {
    path: Option<String>,
    url: Option<String>,
}

fn content_type(req: &HttpRequest, query: &UploadQuery) -> String {
    let declared = req
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok());
    storage::resolve_content_type(declared, query.filename.as_deref())
}

fn find_image(images: &[ImageRef], query: &ImageQuery) -> AppResult<usize> {
    if query.path.is_none() && query.url.is_none() {
        return Err(AppError::Validation(
            "Indica la imagen con 'path' o 'url'".to_string(),
        ));
    }

    images
        .iter()
        .position(|image| {
            (query.path.is_some() && image.path == query.path)
                || query.url.as_deref() == Some(image.url.as_str())
        })
        .ok_or_else(|| AppError::NotFound("La imagen no existe".to_string()))
}

/// Borra el blob si pertenece al dueño; las rutas ajenas solo se desvinculan
pub(crate) async fn remove_blob(blobs: &dyn BlobStore, owner: &ImageOwner, image: &ImageRef) -> AppResult<()> {
    match &image.path {
        Some(path) if !owner.owns(path) => {
            tracing::warn!(path = %path, owner = %owner.directory(), "Ruta fuera del dueño, no se borra");
            Ok(())
        }
        _ => storage::delete_image(blobs, image).await,
    }
}

/// Sube una nueva portada y reemplaza la anterior
#[post("/restaurants/{id}/cover")]
async fn upload_cover(
    store: web::Data<dyn MenuStore>,
    blobs: web::Data<dyn BlobStore>,
    path: web::Path<String>,
    query: web::Query<UploadQuery>,
    body: web::Bytes,
    req: HttpRequest,
) -> AppResult<impl Responder> {
    authenticate(store.get_ref(), &req, "upload_cover").await?;

    let restaurant = require_restaurant(store.get_ref(), &path).await?;
    let owner = ImageOwner::RestaurantCover {
        restaurant_id: restaurant.id.clone(),
    };

    let image = storage::upload_image(
        blobs.get_ref(),
        &owner,
        &content_type(&req, &query),
        &body,
    )
    .await?;

    let patch = RestaurantPatch {
        cover_image: Some(Some(image.clone())),
        ..Default::default()
    };
    store.update_restaurant(&restaurant.id, patch).await?;

    if let Some(previous) = &restaurant.cover_image {
        // la portada nueva ya está guardada; la anterior es solo limpieza
        remove_blob(blobs.get_ref(), &owner, previous)
            .await
            .log_warn_context("removing previous cover")
            .ok();
    }

    Ok(HttpResponse::Created().json(image))
}

#[delete("/restaurants/{id}/cover")]
async fn delete_cover(
    store: web::Data<dyn MenuStore>,
    blobs: web::Data<dyn BlobStore>,
    path: web::Path<String>,
    req: HttpRequest,
) -> AppResult<impl Responder> {
    authenticate(store.get_ref(), &req, "delete_cover").await?;

    let restaurant = require_restaurant(store.get_ref(), &path).await?;
    let cover = restaurant
        .cover_image
        .ok_or_else(|| AppError::NotFound("El restaurante no tiene portada".to_string()))?;

    let owner = ImageOwner::RestaurantCover {
        restaurant_id: restaurant.id.clone(),
    };
    remove_blob(blobs.get_ref(), &owner, &cover).await?;

    let patch = RestaurantPatch {
        cover_image: Some(None),
        ..Default::default()
    };
    store.update_restaurant(&restaurant.id, patch).await?;

    Ok(HttpResponse::Ok().json(json!({ "message": "Portada eliminada" })))
}

/// Añade una imagen al final de la galería
#[post("/restaurants/{id}/images")]
async fn upload_gallery_image(
    store: web::Data<dyn MenuStore>,
    blobs: web::Data<dyn BlobStore>,
    path: web::Path<String>,
    query: web::Query<UploadQuery>,
    body: web::Bytes,
    req: HttpRequest,
) -> AppResult<impl Responder> {
    authenticate(store.get_ref(), &req, "upload_gallery_image").await?;

    let restaurant = require_restaurant(store.get_ref(), &path).await?;
    if restaurant.images.len() >= MAX_GALLERY_IMAGES {
        return Err(AppError::validation_field(
            "images",
            &format!("Máximo {} imágenes en la galería", MAX_GALLERY_IMAGES),
        ));
    }

    let owner = ImageOwner::RestaurantGallery {
        restaurant_id: restaurant.id.clone(),
    };
    let image = storage::upload_image(
        blobs.get_ref(),
        &owner,
        &content_type(&req, &query),
        &body,
    )
    .await?;

    let mut images = restaurant.images;
    images.push(image.clone());
    let patch = RestaurantPatch {
        images: Some(images),
        ..Default::default()
    };
    store.update_restaurant(&restaurant.id, patch).await?;

    Ok(HttpResponse::Created().json(image))
}

#[delete("/restaurants/{id}/images")]
async fn delete_gallery_image(
    store: web::Data<dyn MenuStore>,
    blobs: web::Data<dyn BlobStore>,
    path: web::Path<String>,
    query: web::Query<ImageQuery>,
    req: HttpRequest,
) -> AppResult<impl Responder> {
    authenticate(store.get_ref(), &req, "delete_gallery_image").await?;

    let restaurant = require_restaurant(store.get_ref(), &path).await?;
    let mut images = restaurant.images;
    let index = find_image(&images, &query)?;

    let owner = ImageOwner::RestaurantGallery {
        restaurant_id: restaurant.id.clone(),
    };
    let removed = images.remove(index);
    remove_blob(blobs.get_ref(), &owner, &removed).await?;

    let patch = RestaurantPatch {
        images: Some(images),
        ..Default::default()
    };
    store.update_restaurant(&restaurant.id, patch).await?;

    Ok(HttpResponse::Ok().json(json!({ "message": "Imagen eliminada" })))
}

#[post("/restaurants/{id}/dishes/{dish_id}/photos")]
async fn upload_dish_photo(
    store: web::Data<dyn MenuStore>,
    blobs: web::Data<dyn BlobStore>,
    path: web::Path<(String, String)>,
    query: web::Query<UploadQuery>,
    body: web::Bytes,
    req: HttpRequest,
) -> AppResult<impl Responder> {
    authenticate(store.get_ref(), &req, "upload_dish_photo").await?;

    let (restaurant_id, dish_id) = path.into_inner();
    let dish = require_dish(store.get_ref(), &restaurant_id, &dish_id).await?;
    if dish.photos.len() >= MAX_DISH_PHOTOS {
        return Err(AppError::validation_field(
            "photos",
            &format!("Máximo {} fotos por plato", MAX_DISH_PHOTOS),
        ));
    }

    let owner = ImageOwner::Dish {
        restaurant_id: restaurant_id.clone(),
        dish_id: dish_id.clone(),
    };
    let image = storage::upload_image(
        blobs.get_ref(),
        &owner,
        &content_type(&req, &query),
        &body,
    )
    .await?;

    let mut photos = dish.photos;
    photos.push(image.clone());
    let patch = DishPatch {
        photos: Some(photos),
        ..Default::default()
    };
    store.update_dish(&restaurant_id, &dish_id, patch).await?;

    Ok(HttpResponse::Created().json(image))
}

#[delete("/restaurants/{id}/dishes/{dish_id}/photos")]
async fn delete_dish_photo(
    store: web::Data<dyn MenuStore>,
    blobs: web::Data<dyn BlobStore>,
    path: web::Path<(String, String)>,
    query: web::Query<ImageQuery>,
    req: HttpRequest,
) -> AppResult<impl Responder> {
    authenticate(store.get_ref(), &req, "delete_dish_photo").await?;

    let (restaurant_id, dish_id) = path.into_inner();
    let dish = require_dish(store.get_ref(), &restaurant_id, &dish_id).await?;
    let mut photos = dish.photos;
    let index = find_image(&photos, &query)?;

    let owner = ImageOwner::Dish {
        restaurant_id: restaurant_id.clone(),
        dish_id: dish_id.clone(),
    };
    let removed = photos.remove(index);
    remove_blob(blobs.get_ref(), &owner, &removed).await?;

    let patch = DishPatch {
        photos: Some(photos),
        ..Default::default()
    };
    store.update_dish(&restaurant_id, &dish_id, patch).await?;

    Ok(HttpResponse::Ok().json(json!({ "message": "Foto eliminada" })))
}

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(upload_cover);
    cfg.service(delete_cover);
    cfg.service(upload_gallery_image);
    cfg.service(delete_gallery_image);
    cfg.service(upload_dish_photo);
    cfg.service(delete_dish_photo);
}
