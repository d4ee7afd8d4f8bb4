//! # Acceso a datos
//!
//! Contrato común de los backends de documentos. El servidor recibe un
//! `Arc<dyn MenuStore>` creado una vez en `main` y compartido por todas las
//! peticiones.
//!
//! ## Colecciones
//!
//! - `restaurants`
//! - `restaurants/{id}/dishes` (los platos viven bajo su restaurante)
//! - `comments` (referencia al restaurante por id)
//! - `users`
//!
//! Ninguna operación reintenta. Un error del backend sube tal cual al handler.

use async_trait::async_trait;

use super::models::{
    Comment, Dish, DishPatch, NewComment, NewDish, NewRestaurant, Restaurant, RestaurantPatch,
    RestaurantType, User,
};
use crate::api::AppResult;

#[async_trait]
pub trait MenuStore: Send + Sync {
    /// Comprueba que el backend responde
    async fn ping(&self) -> AppResult<()>;

    /// Devuelve `None` si el restaurante no existe
    async fn get_restaurant(&self, id: &str) -> AppResult<Option<Restaurant>>;

    /// Todos los restaurantes ordenados por nombre ascendente
    async fn list_restaurants(&self, limit: Option<i64>) -> AppResult<Vec<Restaurant>>;

    async fn list_restaurants_by_type(
        &self,
        kind: RestaurantType,
        limit: Option<i64>,
    ) -> AppResult<Vec<Restaurant>>;

    /// Crea el restaurante con fechas de creación/actualización del servidor
    /// y devuelve el id asignado
    async fn create_restaurant(&self, data: NewRestaurant) -> AppResult<String>;

    /// Aplica un parche parcial y renueva `updated_at`
    ///
    /// # Errores
    /// - `NotFound`: el restaurante no existe
    async fn update_restaurant(&self, id: &str, patch: RestaurantPatch) -> AppResult<()>;

    /// Borrado definitivo. Los platos del restaurante no se tocan.
    async fn delete_restaurant(&self, id: &str) -> AppResult<()>;

    /// Crea el restaurante y sus platos iniciales en una única escritura
    /// atómica: o se guardan todos o ninguno.
    async fn create_restaurant_with_dishes(
        &self,
        data: NewRestaurant,
        dishes: Vec<NewDish>,
    ) -> AppResult<String>;

    async fn get_dish(&self, restaurant_id: &str, dish_id: &str) -> AppResult<Option<Dish>>;

    async fn list_dishes(&self, restaurant_id: &str, limit: Option<i64>) -> AppResult<Vec<Dish>>;

    async fn list_dishes_by_category(
        &self,
        restaurant_id: &str,
        category: &str,
        limit: Option<i64>,
    ) -> AppResult<Vec<Dish>>;

    async fn list_featured_dishes(
        &self,
        restaurant_id: &str,
        limit: Option<i64>,
    ) -> AppResult<Vec<Dish>>;

    /// Busca platos de una categoría en todos los restaurantes
    async fn search_dishes_by_category(
        &self,
        category: &str,
        limit: Option<i64>,
    ) -> AppResult<Vec<Dish>>;

    async fn create_dish(&self, restaurant_id: &str, data: NewDish) -> AppResult<String>;

    async fn update_dish(&self, restaurant_id: &str, dish_id: &str, patch: DishPatch)
        -> AppResult<()>;

    async fn delete_dish(&self, restaurant_id: &str, dish_id: &str) -> AppResult<()>;

    /// Comentarios de un restaurante, los más recientes primero
    async fn list_comments(&self, restaurant_id: &str) -> AppResult<Vec<Comment>>;

    async fn add_comment(
        &self,
        restaurant_id: &str,
        user_id: &str,
        data: NewComment,
    ) -> AppResult<Comment>;

    /// # Errores
    /// - `Conflict`: ya existe un usuario con ese email
    async fn create_user(&self, email: &str, password_hash: &str) -> AppResult<User>;

    async fn find_user_by_email(&self, email: &str) -> AppResult<Option<User>>;

    async fn find_user_by_token(&self, token: &str) -> AppResult<Option<User>>;

    /// Guarda o elimina (`None`) el token de sesión del usuario
    async fn set_access_token(&self, user_id: &str, token: Option<&str>) -> AppResult<()>;
}
