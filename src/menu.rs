//! # Presentación del menú
//!
//! Lógica pura sobre datos ya cargados: precios en soles, pestañas de
//! categoría y búsqueda de restaurantes. Nada de esto consulta la base de
//! datos.

use serde::Serialize;

use crate::api::{AppError, AppResult};
use crate::db::models::{Dish, Restaurant};

/// Categoría sintética que muestra todos los platos
pub const ALL_CATEGORY: &str = "Todos";

/// Convierte un precio escrito en el formulario ("25.00") a céntimos.
///
/// Acepta punto o coma decimal y redondea a dos decimales (mitad hacia
/// arriba).
///
/// # Errores
/// - `ValidationWithField`: texto vacío, negativo o no numérico
pub fn parse_price(input: &str) -> AppResult<i64> {
    let invalid = || AppError::validation_field("price", "Precio inválido");

    let text = input.trim().replace(',', ".");
    let (whole, fraction) = match text.split_once('.') {
        Some((whole, fraction)) => (whole, fraction),
        None => (text.as_str(), ""),
    };

    let digits = |s: &str| s.chars().all(|c| c.is_ascii_digit());
    if (whole.is_empty() && fraction.is_empty()) || !digits(whole) || !digits(fraction) {
        return Err(invalid());
    }

    let soles: i64 = if whole.is_empty() {
        0
    } else {
        whole.parse().map_err(|_| invalid())?
    };

    let mut fraction_digits = fraction.bytes().map(|b| i64::from(b - b'0'));
    let tenths = fraction_digits.next().unwrap_or(0);
    let hundredths = fraction_digits.next().unwrap_or(0);
    let round_up = fraction_digits.next().is_some_and(|d| d >= 5);

    soles
        .checked_mul(100)
        .and_then(|c| c.checked_add(tenths * 10 + hundredths + i64::from(round_up)))
        .ok_or_else(invalid)
}

/// Formatea céntimos como soles peruanos: `2500` → `"S/ 25.00"`.
pub fn format_price(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let cents = cents.unsigned_abs();
    let whole = (cents / 100).to_string();

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, c) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    format!("{}S/ {}.{:02}", sign, grouped, cents % 100)
}

/// Platos de la pestaña seleccionada.
///
/// La comparación ignora mayúsculas; [`ALL_CATEGORY`] devuelve todo.
pub fn filter_by_category<'a>(dishes: &'a [Dish], selected: &str) -> Vec<&'a Dish> {
    if selected.eq_ignore_ascii_case(ALL_CATEGORY) {
        return dishes.iter().collect();
    }
    let selected = selected.to_lowercase();
    dishes
        .iter()
        .filter(|d| d.category.to_lowercase() == selected)
        .collect()
}

/// Búsqueda del listado principal: nombre o tipo contienen el término
pub fn search_restaurants(restaurants: Vec<Restaurant>, term: &str) -> Vec<Restaurant> {
    let term = term.trim().to_lowercase();
    if term.is_empty() {
        return restaurants;
    }
    restaurants
        .into_iter()
        .filter(|r| {
            r.name.to_lowercase().contains(&term) || r.kind.as_str().to_lowercase().contains(&term)
        })
        .collect()
}

#[derive(Debug, Serialize)]
pub struct MenuItem {
    pub id: String,
    pub name: String,
    pub description: String,
    pub price: i64,
    pub price_label: String,
    pub photos: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allergens: Option<Vec<String>>,
    pub featured: bool,
}

impl From<&Dish> for MenuItem {
    fn from(dish: &Dish) -> Self {
        MenuItem {
            id: dish.id.clone(),
            name: dish.name.clone(),
            description: dish.description.clone(),
            price: dish.price,
            price_label: format_price(dish.price),
            photos: dish.photos.iter().map(|p| p.url.clone()).collect(),
            allergens: dish.allergens.clone(),
            featured: dish.is_featured.unwrap_or(false),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MenuSection {
    pub category: String,
    pub items: Vec<MenuItem>,
}

/// Sección para platos cuya categoría ya no está declarada en el restaurante
pub const UNLISTED_CATEGORY: &str = "Otros";

/// Agrupa los platos en secciones, en el orden de categorías del restaurante.
///
/// Es la vista de [`ALL_CATEGORY`]: cada plato aparece exactamente una vez.
/// Las categorías repetidas (sin distinguir mayúsculas) se funden en la
/// primera, los platos sin categoría declarada van a una sección final
/// [`UNLISTED_CATEGORY`] y las secciones vacías se omiten.
pub fn group_menu(categories: &[String], dishes: &[Dish]) -> Vec<MenuSection> {
    let mut seen: Vec<String> = Vec::with_capacity(categories.len());
    let mut sections = Vec::new();

    for category in categories {
        let key = category.trim().to_lowercase();
        if seen.contains(&key) {
            continue;
        }

        let items: Vec<MenuItem> = dishes
            .iter()
            .filter(|d| d.category.trim().to_lowercase() == key)
            .map(MenuItem::from)
            .collect();
        seen.push(key);

        if !items.is_empty() {
            sections.push(MenuSection {
                category: category.clone(),
                items,
            });
        }
    }

    let unlisted: Vec<MenuItem> = dishes
        .iter()
        .filter(|d| !seen.contains(&d.category.trim().to_lowercase()))
        .map(MenuItem::from)
        .collect();
    if !unlisted.is_empty() {
        sections.push(MenuSection {
            category: UNLISTED_CATEGORY.to_string(),
            items: unlisted,
        });
    }

    sections
}
