//! # API de Platos
//!
//! Platos anidados bajo su restaurante, la búsqueda de platos por categoría
//! en todos los restaurantes y el menú agrupado por pestañas.
//!
//! Los formularios envían el precio como texto decimal (`"25.00"`); aquí se
//! convierte a céntimos antes de tocar el almacén.

use actix_web::{delete, get, patch, post, web, HttpRequest, HttpResponse, Responder};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::auth::authenticate;
use super::image::remove_blob;
use super::restaurant::{require_restaurant, validate_limit};
use super::{AppError, AppResult};
use crate::db::models::{Dish, DishPatch, ImageRef, NewDish, Restaurant};
use crate::db::MenuStore;
use crate::menu::{self, MenuItem, MenuSection, ALL_CATEGORY};
use crate::storage::{BlobStore, ImageOwner};

/// Precio tal como llega del formulario: texto o número JSON
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum PriceInput {
    Text(String),
    Number(serde_json::Number),
}

impl PriceInput {
    fn cents(&self) -> AppResult<i64> {
        match self {
            PriceInput::Text(text) => menu::parse_price(text),
            PriceInput::Number(number) => menu::parse_price(&number.to_string()),
        }
    }
}

/// Formulario de alta de un plato
#[derive(Debug, Deserialize)]
pub(crate) struct DishForm {
    name: String,
    category: String,
    price: PriceInput,
    #[serde(default)]
    description: String,
    #[serde(default)]
    photos: Vec<ImageRef>,
    #[serde(default)]
    allergens: Option<Vec<String>>,
    #[serde(default)]
    is_featured: Option<bool>,
}

impl DishForm {
    pub(crate) fn into_new_dish(self) -> AppResult<NewDish> {
        let dish = NewDish {
            price: self.price.cents()?,
            name: self.name,
            category: self.category,
            description: self.description,
            photos: self.photos,
            allergens: self.allergens,
            is_featured: self.is_featured,
        };
        dish.validate()?;
        Ok(dish)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DishFormPatch {
    name: Option<String>,
    category: Option<String>,
    price: Option<PriceInput>,
    description: Option<String>,
    photos: Option<Vec<ImageRef>>,
    allergens: Option<Vec<String>>,
    is_featured: Option<bool>,
}

impl DishFormPatch {
    fn into_patch(self) -> AppResult<DishPatch> {
        let patch = DishPatch {
            price: self.price.as_ref().map(PriceInput::cents).transpose()?,
            name: self.name,
            category: self.category,
            description: self.description,
            photos: self.photos,
            allergens: self.allergens,
            is_featured: self.is_featured,
        };
        patch.validate()?;
        Ok(patch)
    }
}

/// La categoría del plato debe estar declarada en el restaurante
pub(crate) fn ensure_category(categories: &[String], category: &str) -> AppResult<()> {
    if categories.iter().any(|c| c == category) {
        return Ok(());
    }
    Err(AppError::validation_field(
        "category",
        &format!(
            "La categoría '{}' no existe en el restaurante. Disponibles: {}",
            category,
            categories.join(", ")
        ),
    ))
}

/// Carga el plato o responde 404
pub(crate) async fn require_dish(
    store: &dyn MenuStore,
    restaurant_id: &str,
    dish_id: &str,
) -> AppResult<Dish> {
    store
        .get_dish(restaurant_id, dish_id)
        .await?
        .ok_or_else(|| AppError::not_found_id("Plato", dish_id))
}

#[derive(Deserialize)]
struct DishQuery {
    category: Option<String>,
    featured: Option<bool>,
    limit: Option<i64>,
}

#[derive(Deserialize)]
struct SearchQuery {
    category: Option<String>,
    limit: Option<i64>,
}

#[derive(Deserialize)]
struct MenuQuery {
    category: Option<String>,
}

#[derive(Serialize)]
struct MenuView {
    restaurant: Restaurant,
    /// Pestañas: la sintética "Todos" primero y luego las del restaurante
    categories: Vec<String>,
    selected: String,
    sections: Vec<MenuSection>,
}

/// Lista los platos de un restaurante ordenados por nombre
///
/// # Parámetros de consulta
/// - `category`: solo platos de esa categoría
/// - `featured`: `true` para los destacados
/// - `limit`: máximo de resultados
#[get("/restaurants/{id}/dishes")]
async fn list_dishes(
    store: web::Data<dyn MenuStore>,
    path: web::Path<String>,
    query: web::Query<DishQuery>,
) -> AppResult<impl Responder> {
    let limit = validate_limit(query.limit)?;
    require_restaurant(store.get_ref(), &path).await?;

    let dishes = match (&query.category, query.featured) {
        (Some(category), Some(true)) => store
            .list_dishes_by_category(&path, category, None)
            .await?
            .into_iter()
            .filter(|d| d.is_featured == Some(true))
            .take(limit.map_or(usize::MAX, |n| n as usize))
            .collect(),
        (Some(category), _) => store.list_dishes_by_category(&path, category, limit).await?,
        (None, Some(true)) => store.list_featured_dishes(&path, limit).await?,
        (None, _) => store.list_dishes(&path, limit).await?,
    };

    Ok(HttpResponse::Ok().json(dishes))
}

#[get("/restaurants/{id}/dishes/{dish_id}")]
async fn get_dish(
    store: web::Data<dyn MenuStore>,
    path: web::Path<(String, String)>,
) -> AppResult<impl Responder> {
    let (restaurant_id, dish_id) = path.into_inner();
    let dish = require_dish(store.get_ref(), &restaurant_id, &dish_id).await?;
    Ok(HttpResponse::Ok().json(dish))
}

/// Crea un plato en un restaurante existente
///
/// # Cuerpo
/// ```json
/// { "name": "Ceviche", "category": "Entradas", "price": "25.00" }
/// ```
#[post("/restaurants/{id}/dishes")]
async fn create_dish(
    store: web::Data<dyn MenuStore>,
    path: web::Path<String>,
    data: web::Json<DishForm>,
    req: HttpRequest,
) -> AppResult<impl Responder> {
    authenticate(store.get_ref(), &req, "create_dish").await?;

    let restaurant = require_restaurant(store.get_ref(), &path).await?;
    let dish = data.into_inner().into_new_dish()?;
    ensure_category(&restaurant.categories, &dish.category)?;

    let id = store.create_dish(&restaurant.id, dish).await?;
    tracing::info!(restaurant_id = %restaurant.id, dish_id = %id, "Plato creado");

    Ok(HttpResponse::Created().json(json!({
        "id": id,
        "message": "Plato creado correctamente"
    })))
}

#[patch("/restaurants/{id}/dishes/{dish_id}")]
async fn update_dish(
    store: web::Data<dyn MenuStore>,
    path: web::Path<(String, String)>,
    data: web::Json<DishFormPatch>,
    req: HttpRequest,
) -> AppResult<impl Responder> {
    authenticate(store.get_ref(), &req, "update_dish").await?;

    let (restaurant_id, dish_id) = path.into_inner();
    let restaurant = require_restaurant(store.get_ref(), &restaurant_id).await?;
    let patch = data.into_inner().into_patch()?;
    if let Some(category) = &patch.category {
        ensure_category(&restaurant.categories, category)?;
    }

    store.update_dish(&restaurant_id, &dish_id, patch).await?;

    Ok(HttpResponse::Ok().json(json!({
        "id": dish_id,
        "message": "Plato actualizado correctamente"
    })))
}

/// Borra el plato y después, sin bloquear la respuesta, sus fotos subidas
#[delete("/restaurants/{id}/dishes/{dish_id}")]
async fn delete_dish(
    store: web::Data<dyn MenuStore>,
    blobs: web::Data<dyn BlobStore>,
    path: web::Path<(String, String)>,
    req: HttpRequest,
) -> AppResult<impl Responder> {
    authenticate(store.get_ref(), &req, "delete_dish").await?;

    let (restaurant_id, dish_id) = path.into_inner();
    let dish = require_dish(store.get_ref(), &restaurant_id, &dish_id).await?;
    store.delete_dish(&restaurant_id, &dish_id).await?;

    let owner = ImageOwner::Dish {
        restaurant_id: restaurant_id.clone(),
        dish_id: dish_id.clone(),
    };
    for photo in &dish.photos {
        // el plato ya no existe: un blob huérfano no revierte el borrado
        remove_blob(blobs.get_ref(), &owner, photo).await.ok();
    }

    tracing::info!(restaurant_id = %restaurant_id, dish_id = %dish_id, "Plato eliminado");

    Ok(HttpResponse::Ok().json(json!({
        "id": dish_id,
        "message": "Plato eliminado correctamente"
    })))
}

/// Platos de una categoría en todos los restaurantes
#[get("/dishes/search")]
async fn search_dishes(
    store: web::Data<dyn MenuStore>,
    query: web::Query<SearchQuery>,
) -> AppResult<impl Responder> {
    let limit = validate_limit(query.limit)?;
    let category = query
        .category
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .ok_or_else(|| AppError::validation_field("category", "Este campo es requerido"))?;

    let dishes = store.search_dishes_by_category(category, limit).await?;
    Ok(HttpResponse::Ok().json(dishes))
}

/// Menú del restaurante agrupado por categoría, con precios ya formateados
///
/// Sin `category` (o con `Todos`) devuelve una sección por categoría; con
/// otra categoría devuelve solo esa sección, sin distinguir mayúsculas.
#[get("/restaurants/{id}/menu")]
async fn get_menu(
    store: web::Data<dyn MenuStore>,
    path: web::Path<String>,
    query: web::Query<MenuQuery>,
) -> AppResult<impl Responder> {
    let restaurant = require_restaurant(store.get_ref(), &path).await?;
    let dishes = store.list_dishes(&restaurant.id, None).await?;

    let selected = query
        .category
        .clone()
        .unwrap_or_else(|| ALL_CATEGORY.to_string());

    let sections = if selected.eq_ignore_ascii_case(ALL_CATEGORY) {
        menu::group_menu(&restaurant.categories, &dishes)
    } else {
        let items: Vec<MenuItem> = menu::filter_by_category(&dishes, &selected)
            .into_iter()
            .map(MenuItem::from)
            .collect();
        vec![MenuSection {
            category: selected.clone(),
            items,
        }]
    };

    let categories = std::iter::once(ALL_CATEGORY.to_string())
        .chain(restaurant.categories.iter().cloned())
        .collect();

    Ok(HttpResponse::Ok().json(MenuView {
        restaurant,
        categories,
        selected,
        sections,
    }))
}

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(list_dishes);
    cfg.service(get_dish);
    cfg.service(create_dish);
    cfg.service(update_dish);
    cfg.service(delete_dish);
    cfg.service(search_dishes);
    cfg.service(get_menu);
}
