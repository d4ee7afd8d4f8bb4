//! # Modelo de datos
//!
//! Restaurantes, platos, comentarios y usuarios tal como los ve el resto de la
//! aplicación. Los identificadores son cadenas (hex de ObjectId en MongoDB) y
//! las fechas `DateTime<Utc>`; cada backend convierte a su propia
//! representación.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

use crate::api::{AppError, AppResult};

/// Máximo de imágenes en la galería de un restaurante
pub const MAX_GALLERY_IMAGES: usize = 15;

/// Máximo de fotos por plato
pub const MAX_DISH_PHOTOS: usize = 5;

/// Tipos de restaurante disponibles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RestaurantType {
    #[serde(rename = "pollería")]
    Polleria,
    #[serde(rename = "café")]
    Cafe,
    #[serde(rename = "chifa")]
    Chifa,
    #[serde(rename = "cevichería")]
    Cevicheria,
    #[serde(rename = "otro")]
    Otro,
    Nikkei,
    Criollo,
    #[serde(rename = "pizzería")]
    Pizzeria,
}

impl RestaurantType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RestaurantType::Polleria => "pollería",
            RestaurantType::Cafe => "café",
            RestaurantType::Chifa => "chifa",
            RestaurantType::Cevicheria => "cevichería",
            RestaurantType::Otro => "otro",
            RestaurantType::Nikkei => "Nikkei",
            RestaurantType::Criollo => "Criollo",
            RestaurantType::Pizzeria => "pizzería",
        }
    }
}

impl fmt::Display for RestaurantType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ubicación geográfica del restaurante
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub lat: f64,
    pub lng: f64,
    pub city: String,
    /// Enlace a un servicio de mapas, alternativo a las coordenadas
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub map_url: Option<String>,
}

/// Referencia a una imagen: URL pública más la ruta canónica en el
/// almacenamiento de blobs.
///
/// Las imágenes externas (URL pegada a mano) no tienen ruta y nunca se borran
/// del almacenamiento.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl ImageRef {
    #[cfg(test)]
    pub fn external(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            path: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Restaurant {
    pub id: String,
    pub name: String,
    pub description: String,
    #[serde(rename = "type")]
    pub kind: RestaurantType,
    /// Categorías de platos, en el orden en que se muestran
    pub categories: Vec<String>,
    pub cover_image: Option<ImageRef>,
    pub images: Vec<ImageRef>,
    pub location: Location,
    pub rating: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dish {
    pub id: String,
    pub restaurant_id: String,
    pub name: String,
    pub category: String,
    /// Precio en céntimos de sol (PEN)
    pub price: i64,
    pub description: String,
    pub photos: Vec<ImageRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allergens: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_featured: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    pub restaurant_id: String,
    pub user_id: String,
    pub comment: String,
    pub rating: i32,
    pub created_at: DateTime<Utc>,
}

/// Usuario con acceso al panel de administración.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: String,
    pub email: String,
    pub password_hash: String,
    pub access_token: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Datos para crear un restaurante (sin id ni fechas)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewRestaurant {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type")]
    pub kind: RestaurantType,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub cover_image: Option<ImageRef>,
    #[serde(default)]
    pub images: Vec<ImageRef>,
    pub location: Location,
    pub rating: f64,
}

impl NewRestaurant {
    pub fn validate(&self) -> AppResult<()> {
        validate_name("name", &self.name)?;
        validate_rating(self.rating)?;
        validate_gallery(&self.images)?;
        validate_categories(&self.categories)
    }
}

/// Cambios parciales de un restaurante.
///
/// Un campo ausente (`None`) no se toca. En `cover_image` un `null` explícito
/// borra la portada.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RestaurantPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<RestaurantType>,
    pub categories: Option<Vec<String>>,
    #[serde(deserialize_with = "present")]
    pub cover_image: Option<Option<ImageRef>>,
    pub images: Option<Vec<ImageRef>>,
    pub location: Option<Location>,
    pub rating: Option<f64>,
}

impl RestaurantPatch {
    pub fn validate(&self) -> AppResult<()> {
        if let Some(name) = &self.name {
            validate_name("name", name)?;
        }
        if let Some(rating) = self.rating {
            validate_rating(rating)?;
        }
        if let Some(images) = &self.images {
            validate_gallery(images)?;
        }
        if let Some(categories) = &self.categories {
            validate_categories(categories)?;
        }
        Ok(())
    }

    /// Aplica el parche sobre un restaurante ya cargado
    pub fn apply(self, restaurant: &mut Restaurant) {
        if let Some(name) = self.name {
            restaurant.name = name;
        }
        if let Some(description) = self.description {
            restaurant.description = description;
        }
        if let Some(kind) = self.kind {
            restaurant.kind = kind;
        }
        if let Some(categories) = self.categories {
            restaurant.categories = categories;
        }
        if let Some(cover) = self.cover_image {
            restaurant.cover_image = cover;
        }
        if let Some(images) = self.images {
            restaurant.images = images;
        }
        if let Some(location) = self.location {
            restaurant.location = location;
        }
        if let Some(rating) = self.rating {
            restaurant.rating = rating;
        }
    }
}

/// Datos para crear un plato. El precio ya viene en céntimos.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewDish {
    pub name: String,
    pub category: String,
    pub price: i64,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub photos: Vec<ImageRef>,
    #[serde(default)]
    pub allergens: Option<Vec<String>>,
    #[serde(default)]
    pub is_featured: Option<bool>,
}

impl NewDish {
    pub fn validate(&self) -> AppResult<()> {
        validate_name("name", &self.name)?;
        validate_name("category", &self.category)?;
        validate_price(self.price)?;
        validate_photos(&self.photos)
    }

    pub fn into_dish(self, id: String, restaurant_id: String) -> Dish {
        Dish {
            id,
            restaurant_id,
            name: self.name,
            category: self.category,
            price: self.price,
            description: self.description,
            photos: self.photos,
            allergens: self.allergens,
            is_featured: self.is_featured,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DishPatch {
    pub name: Option<String>,
    pub category: Option<String>,
    pub price: Option<i64>,
    pub description: Option<String>,
    pub photos: Option<Vec<ImageRef>>,
    pub allergens: Option<Vec<String>>,
    pub is_featured: Option<bool>,
}

impl DishPatch {
    pub fn validate(&self) -> AppResult<()> {
        if let Some(name) = &self.name {
            validate_name("name", name)?;
        }
        if let Some(category) = &self.category {
            validate_name("category", category)?;
        }
        if let Some(price) = self.price {
            validate_price(price)?;
        }
        if let Some(photos) = &self.photos {
            validate_photos(photos)?;
        }
        Ok(())
    }

    pub fn apply(self, dish: &mut Dish) {
        if let Some(name) = self.name {
            dish.name = name;
        }
        if let Some(category) = self.category {
            dish.category = category;
        }
        if let Some(price) = self.price {
            dish.price = price;
        }
        if let Some(description) = self.description {
            dish.description = description;
        }
        if let Some(photos) = self.photos {
            dish.photos = photos;
        }
        if let Some(allergens) = self.allergens {
            dish.allergens = Some(allergens);
        }
        if let Some(is_featured) = self.is_featured {
            dish.is_featured = Some(is_featured);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewComment {
    pub comment: String,
    pub rating: i32,
}

impl NewComment {
    pub fn validate(&self) -> AppResult<()> {
        if self.comment.trim().is_empty() {
            return Err(AppError::validation_field("comment", "El comentario es requerido"));
        }
        if !(1..=5).contains(&self.rating) {
            return Err(AppError::validation_field(
                "rating",
                "La calificación debe estar entre 1 y 5",
            ));
        }
        Ok(())
    }
}

/// Distingue "campo ausente" de "campo a null": solo se llama cuando el campo
/// está presente, así que siempre devuelve `Some`.
fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

fn validate_name(field: &str, value: &str) -> AppResult<()> {
    if value.trim().is_empty() {
        return Err(AppError::validation_field(field, "Este campo es requerido"));
    }
    Ok(())
}

fn validate_rating(rating: f64) -> AppResult<()> {
    if !(1.0..=5.0).contains(&rating) {
        return Err(AppError::validation_field(
            "rating",
            "La calificación debe estar entre 1 y 5",
        ));
    }
    Ok(())
}

fn validate_price(price: i64) -> AppResult<()> {
    if price < 0 {
        return Err(AppError::validation_field("price", "El precio no puede ser negativo"));
    }
    Ok(())
}

fn validate_gallery(images: &[ImageRef]) -> AppResult<()> {
    if images.len() > MAX_GALLERY_IMAGES {
        return Err(AppError::validation_field(
            "images",
            &format!("Máximo {} imágenes en la galería", MAX_GALLERY_IMAGES),
        ));
    }
    Ok(())
}

fn validate_photos(photos: &[ImageRef]) -> AppResult<()> {
    if photos.len() > MAX_DISH_PHOTOS {
        return Err(AppError::validation_field(
            "photos",
            &format!("Máximo {} fotos por plato", MAX_DISH_PHOTOS),
        ));
    }
    Ok(())
}

fn validate_categories(categories: &[String]) -> AppResult<()> {
    let mut seen: Vec<String> = Vec::with_capacity(categories.len());
    for category in categories {
        if category.trim().is_empty() {
            return Err(AppError::validation_field("categories", "Categoría vacía"));
        }
        let key = category.trim().to_lowercase();
        if seen.contains(&key) {
            return Err(AppError::validation_field(
                "categories",
                &format!("Categoría repetida: '{}'", category),
            ));
        }
        seen.push(key);
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn new_restaurant(name: &str, kind: RestaurantType) -> NewRestaurant {
        NewRestaurant {
            name: name.to_string(),
            description: "La mejor de la ciudad".to_string(),
            kind,
            categories: vec!["Entradas".to_string(), "Postres".to_string()],
            cover_image: None,
            images: Vec::new(),
            location: Location {
                lat: -12.046374,
                lng: -77.042793,
                city: "Lima".to_string(),
                map_url: None,
            },
            rating: 4.5,
        }
    }

    pub fn new_dish(name: &str, category: &str, price: i64) -> NewDish {
        NewDish {
            name: name.to_string(),
            category: category.to_string(),
            price,
            description: String::new(),
            photos: Vec::new(),
            allergens: None,
            is_featured: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn restaurant_type_uses_display_names() {
        let json = serde_json::to_string(&RestaurantType::Polleria).unwrap();
        assert_eq!(json, "\"pollería\"");

        let kind: RestaurantType = serde_json::from_str("\"Nikkei\"").unwrap();
        assert_eq!(kind, RestaurantType::Nikkei);
    }

    #[test]
    fn rejects_out_of_range_rating_and_oversized_gallery() {
        let mut data = new_restaurant("El Pollo Sabroso", RestaurantType::Polleria);
        data.rating = 5.5;
        assert!(data.validate().is_err());

        data.rating = 3.0;
        data.images = (0..16).map(|i| ImageRef::external(format!("https://img/{i}.jpg"))).collect();
        assert!(data.validate().is_err());

        data.images.truncate(15);
        assert!(data.validate().is_ok());
    }

    #[test]
    fn dish_validation_checks_price_and_photos() {
        let mut dish = new_dish("Ceviche", "Entradas", -1);
        assert!(dish.validate().is_err());

        dish.price = 2500;
        dish.photos = (0..6).map(|i| ImageRef::external(format!("https://img/{i}.jpg"))).collect();
        assert!(dish.validate().is_err());

        dish.photos.truncate(5);
        assert!(dish.validate().is_ok());
    }

    #[test]
    fn categories_differing_only_in_case_are_rejected() {
        let mut data = new_restaurant("Panchita", RestaurantType::Criollo);
        data.categories = vec!["Entradas".to_string(), "entradas".to_string()];
        assert!(data.validate().is_err());

        let patch = RestaurantPatch {
            categories: Some(vec!["Postres".to_string(), " POSTRES".to_string()]),
            ..Default::default()
        };
        assert!(patch.validate().is_err());

        data.categories = vec!["Entradas".to_string(), "Postres".to_string()];
        assert!(data.validate().is_ok());
    }

    #[test]
    fn comment_rating_is_bounded() {
        let comment = NewComment {
            comment: "Muy rico".to_string(),
            rating: 0,
        };
        assert!(comment.validate().is_err());

        let comment = NewComment { rating: 5, ..comment };
        assert!(comment.validate().is_ok());
    }

    #[test]
    fn patch_distinguishes_missing_from_null_cover() {
        let patch: RestaurantPatch = serde_json::from_str(r#"{"name": "Nuevo"}"#).unwrap();
        assert_eq!(patch.cover_image, None);

        let patch: RestaurantPatch = serde_json::from_str(r#"{"cover_image": null}"#).unwrap();
        assert_eq!(patch.cover_image, Some(None));
    }

    #[test]
    fn patch_only_overwrites_present_fields() {
        let now = Utc::now();
        let data = new_restaurant("Chifa Lung Fung", RestaurantType::Chifa);
        let mut restaurant = Restaurant {
            id: "r1".to_string(),
            name: data.name,
            description: data.description.clone(),
            kind: data.kind,
            categories: data.categories.clone(),
            cover_image: Some(ImageRef::external("https://img/cover.jpg")),
            images: Vec::new(),
            location: data.location.clone(),
            rating: data.rating,
            created_at: now,
            updated_at: now,
        };

        RestaurantPatch {
            rating: Some(3.0),
            ..Default::default()
        }
        .apply(&mut restaurant);

        assert_eq!(restaurant.rating, 3.0);
        assert_eq!(restaurant.name, "Chifa Lung Fung");
        assert_eq!(restaurant.description, data.description);
        assert!(restaurant.cover_image.is_some());
    }
}
