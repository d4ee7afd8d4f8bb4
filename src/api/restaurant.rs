//! # API de Restaurantes
//!
//! - Listado con filtro por tipo y búsqueda por texto
//! - Detalle de un restaurante
//! - Alta (opcionalmente con sus platos iniciales en un solo lote), edición
//!   parcial y borrado desde el panel de administración

use actix_web::{delete, get, patch, post, web, HttpRequest, HttpResponse, Responder};
use serde::Deserialize;
use serde_json::json;

use super::auth::authenticate;
use super::dish::{ensure_category, DishForm};
use super::{AppError, AppResult};
use crate::db::models::{NewRestaurant, Restaurant, RestaurantPatch, RestaurantType};
use crate::db::MenuStore;
use crate::menu;

#[derive(Deserialize)]
struct ListQuery {
    #[serde(rename = "type")]
    kind: Option<RestaurantType>,
    search: Option<String>,
    limit: Option<i64>,
}

#[derive(Deserialize)]
struct CreateRestaurant {
    #[serde(flatten)]
    restaurant: NewRestaurant,
    /// Platos que se crean junto al restaurante, de forma atómica
    #[serde(default)]
    initial_dishes: Vec<DishForm>,
}

/// Carga el restaurante o responde 404
pub(crate) async fn require_restaurant(store: &dyn MenuStore, id: &str) -> AppResult<Restaurant> {
    store
        .get_restaurant(id)
        .await?
        .ok_or_else(|| AppError::not_found_id("Restaurante", id))
}

pub(crate) fn validate_limit(limit: Option<i64>) -> AppResult<Option<i64>> {
    match limit {
        Some(n) if n <= 0 => Err(AppError::validation_field("limit", "Debe ser mayor a 0")),
        other => Ok(other),
    }
}

/// Lista restaurantes ordenados por nombre
///
/// # Parámetros de consulta
/// - `type`: tipo de restaurante (`pollería`, `chifa`, ...)
/// - `search`: texto que debe aparecer en el nombre o el tipo
/// - `limit`: máximo de resultados
#[get("/restaurants")]
async fn list_restaurants(
    store: web::Data<dyn MenuStore>,
    query: web::Query<ListQuery>,
) -> AppResult<impl Responder> {
    let limit = validate_limit(query.limit)?;

    let restaurants = match query.kind {
        Some(kind) => store.list_restaurants_by_type(kind, limit).await?,
        None => store.list_restaurants(limit).await?,
    };

    let restaurants = match &query.search {
        Some(term) => menu::search_restaurants(restaurants, term),
        None => restaurants,
    };

    Ok(HttpResponse::Ok().json(restaurants))
}

#[get("/restaurants/{id}")]
async fn get_restaurant(
    store: web::Data<dyn MenuStore>,
    path: web::Path<String>,
) -> AppResult<impl Responder> {
    let restaurant = require_restaurant(store.get_ref(), &path).await?;
    Ok(HttpResponse::Ok().json(restaurant))
}

/// Crea un restaurante
///
/// Si llegan `initial_dishes` el restaurante y todos sus platos se escriben
/// en un único lote: o se crean todos o ninguno.
///
/// # Respuesta
/// ```json
/// { "id": "665f1f77bcf86cd799439011", "message": "Restaurante creado correctamente" }
/// ```
#[post("/restaurants")]
async fn create_restaurant(
    store: web::Data<dyn MenuStore>,
    data: web::Json<CreateRestaurant>,
    req: HttpRequest,
) -> AppResult<impl Responder> {
    authenticate(store.get_ref(), &req, "create_restaurant").await?;

    let CreateRestaurant {
        restaurant,
        initial_dishes,
    } = data.into_inner();
    restaurant.validate()?;

    let dishes = initial_dishes
        .into_iter()
        .map(|form| {
            let dish = form.into_new_dish()?;
            ensure_category(&restaurant.categories, &dish.category)?;
            Ok(dish)
        })
        .collect::<AppResult<Vec<_>>>()?;

    let id = if dishes.is_empty() {
        store.create_restaurant(restaurant).await?
    } else {
        store.create_restaurant_with_dishes(restaurant, dishes).await?
    };

    tracing::info!(restaurant_id = %id, "Restaurante creado");

    Ok(HttpResponse::Created().json(json!({
        "id": id,
        "message": "Restaurante creado correctamente"
    })))
}

/// Actualiza solo los campos presentes en el cuerpo
#[patch("/restaurants/{id}")]
async fn update_restaurant(
    store: web::Data<dyn MenuStore>,
    path: web::Path<String>,
    data: web::Json<RestaurantPatch>,
    req: HttpRequest,
) -> AppResult<impl Responder> {
    authenticate(store.get_ref(), &req, "update_restaurant").await?;

    let patch = data.into_inner();
    patch.validate()?;
    store.update_restaurant(&path, patch).await?;

    Ok(HttpResponse::Ok().json(json!({
        "id": path.into_inner(),
        "message": "Restaurante actualizado correctamente"
    })))
}

/// Borrado definitivo. Los platos del restaurante no se eliminan.
#[delete("/restaurants/{id}")]
async fn delete_restaurant(
    store: web::Data<dyn MenuStore>,
    path: web::Path<String>,
    req: HttpRequest,
) -> AppResult<impl Responder> {
    authenticate(store.get_ref(), &req, "delete_restaurant").await?;

    require_restaurant(store.get_ref(), &path).await?;
    store.delete_restaurant(&path).await?;

    tracing::info!(restaurant_id = %path, "Restaurante eliminado");

    Ok(HttpResponse::Ok().json(json!({
        "id": path.into_inner(),
        "message": "Restaurante eliminado correctamente"
    })))
}

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(list_restaurants);
    cfg.service(get_restaurant);
    cfg.service(create_restaurant);
    cfg.service(update_restaurant);
    cfg.service(delete_restaurant);
}
