//! Almacén de documentos en memoria.
//!
//! Mismo contrato que [`MongoRepo`](super::MongoRepo): orden por nombre,
//! filtros por igualdad y escritura por lotes todo-o-nada. Se usa en las
//! pruebas y con `STORE_BACKEND=memory` para desarrollar sin base de datos.

use async_trait::async_trait;
use chrono::Utc;
use mongodb::bson::oid::ObjectId;
use std::collections::HashMap;
use std::sync::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::models::{
    Comment, Dish, DishPatch, NewComment, NewDish, NewRestaurant, Restaurant, RestaurantPatch,
    RestaurantType, User,
};
use super::store::MenuStore;
use crate::api::{AppError, AppResult};

#[derive(Default)]
struct Tables {
    restaurants: HashMap<String, Restaurant>,
    dishes: HashMap<String, Dish>,
    /// En orden de inserción
    comments: Vec<Comment>,
    users: HashMap<String, User>,
}

#[derive(Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
    /// Escrituras que se permiten antes de fallar (simulación de errores)
    writes_left: Mutex<Option<usize>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hace fallar toda escritura a partir de la número `n + 1`
    #[cfg(test)]
    pub fn fail_writes_after(&self, n: usize) {
        if let Ok(mut left) = self.writes_left.lock() {
            *left = Some(n);
        }
    }

    fn read(&self) -> AppResult<RwLockReadGuard<'_, Tables>> {
        self.tables
            .read()
            .map_err(|_| AppError::Internal("Almacén en memoria envenenado".to_string()))
    }

    fn write(&self) -> AppResult<RwLockWriteGuard<'_, Tables>> {
        self.tables
            .write()
            .map_err(|_| AppError::Internal("Almacén en memoria envenenado".to_string()))
    }

    /// Reserva una escritura; falla si se agotó el cupo simulado
    fn check_write(&self, operation: &str) -> AppResult<()> {
        let mut left = self
            .writes_left
            .lock()
            .map_err(|_| AppError::Internal("Almacén en memoria envenenado".to_string()))?;

        match left.as_mut() {
            Some(0) => Err(AppError::internal_trace(
                &format!("Fallo de escritura simulado en '{}'", operation),
                None,
            )),
            Some(n) => {
                *n -= 1;
                Ok(())
            }
            None => Ok(()),
        }
    }

    fn new_id() -> String {
        ObjectId::new().to_hex()
    }

    fn build_restaurant(id: String, data: NewRestaurant) -> Restaurant {
        let now = Utc::now();
        Restaurant {
            id,
            name: data.name,
            description: data.description,
            kind: data.kind,
            categories: data.categories,
            cover_image: data.cover_image,
            images: data.images,
            location: data.location,
            rating: data.rating,
            created_at: now,
            updated_at: now,
        }
    }

    fn sorted_restaurants<F>(&self, filter: F, limit: Option<i64>) -> AppResult<Vec<Restaurant>>
    where
        F: Fn(&Restaurant) -> bool,
    {
        let tables = self.read()?;
        let mut list: Vec<Restaurant> = tables
            .restaurants
            .values()
            .filter(|r| filter(r))
            .cloned()
            .collect();
        list.sort_by(|a, b| a.name.cmp(&b.name));
        truncate(&mut list, limit);
        Ok(list)
    }

    fn sorted_dishes<F>(&self, filter: F, limit: Option<i64>) -> AppResult<Vec<Dish>>
    where
        F: Fn(&Dish) -> bool,
    {
        let tables = self.read()?;
        let mut list: Vec<Dish> = tables.dishes.values().filter(|d| filter(d)).cloned().collect();
        list.sort_by(|a, b| a.name.cmp(&b.name));
        truncate(&mut list, limit);
        Ok(list)
    }
}

fn truncate<T>(list: &mut Vec<T>, limit: Option<i64>) {
    if let Some(limit) = limit {
        list.truncate(usize::try_from(limit).unwrap_or(0));
    }
}

#[async_trait]
impl MenuStore for InMemoryStore {
    async fn ping(&self) -> AppResult<()> {
        self.read().map(|_| ())
    }

    async fn get_restaurant(&self, id: &str) -> AppResult<Option<Restaurant>> {
        Ok(self.read()?.restaurants.get(id).cloned())
    }

    async fn list_restaurants(&self, limit: Option<i64>) -> AppResult<Vec<Restaurant>> {
        self.sorted_restaurants(|_| true, limit)
    }

    async fn list_restaurants_by_type(
        &self,
        kind: RestaurantType,
        limit: Option<i64>,
    ) -> AppResult<Vec<Restaurant>> {
        self.sorted_restaurants(|r| r.kind == kind, limit)
    }

    async fn create_restaurant(&self, data: NewRestaurant) -> AppResult<String> {
        self.check_write("create_restaurant")?;
        let id = Self::new_id();
        let restaurant = Self::build_restaurant(id.clone(), data);
        self.write()?.restaurants.insert(id.clone(), restaurant);
        Ok(id)
    }

    async fn update_restaurant(&self, id: &str, patch: RestaurantPatch) -> AppResult<()> {
        self.check_write("update_restaurant")?;
        let mut tables = self.write()?;
        let restaurant = tables
            .restaurants
            .get_mut(id)
            .ok_or_else(|| AppError::not_found_id("Restaurante", id))?;
        patch.apply(restaurant);
        restaurant.updated_at = Utc::now();
        Ok(())
    }

    async fn delete_restaurant(&self, id: &str) -> AppResult<()> {
        self.check_write("delete_restaurant")?;
        self.write()?.restaurants.remove(id);
        Ok(())
    }

    async fn create_restaurant_with_dishes(
        &self,
        data: NewRestaurant,
        dishes: Vec<NewDish>,
    ) -> AppResult<String> {
        let restaurant_id = Self::new_id();

        // preparar el lote completo antes de tocar las tablas
        self.check_write("create_restaurant_with_dishes")?;
        let restaurant = Self::build_restaurant(restaurant_id.clone(), data);
        let mut staged = Vec::with_capacity(dishes.len());
        for dish in dishes {
            self.check_write("create_restaurant_with_dishes")?;
            staged.push(dish.into_dish(Self::new_id(), restaurant_id.clone()));
        }

        let mut tables = self.write()?;
        tables.restaurants.insert(restaurant_id.clone(), restaurant);
        for dish in staged {
            tables.dishes.insert(dish.id.clone(), dish);
        }
        Ok(restaurant_id)
    }

    async fn get_dish(&self, restaurant_id: &str, dish_id: &str) -> AppResult<Option<Dish>> {
        Ok(self
            .read()?
            .dishes
            .get(dish_id)
            .filter(|d| d.restaurant_id == restaurant_id)
            .cloned())
    }

    async fn list_dishes(&self, restaurant_id: &str, limit: Option<i64>) -> AppResult<Vec<Dish>> {
        self.sorted_dishes(|d| d.restaurant_id == restaurant_id, limit)
    }

    async fn list_dishes_by_category(
        &self,
        restaurant_id: &str,
        category: &str,
        limit: Option<i64>,
    ) -> AppResult<Vec<Dish>> {
        self.sorted_dishes(
            |d| d.restaurant_id == restaurant_id && d.category == category,
            limit,
        )
    }

    async fn list_featured_dishes(
        &self,
        restaurant_id: &str,
        limit: Option<i64>,
    ) -> AppResult<Vec<Dish>> {
        self.sorted_dishes(
            |d| d.restaurant_id == restaurant_id && d.is_featured == Some(true),
            limit,
        )
    }

    async fn search_dishes_by_category(
        &self,
        category: &str,
        limit: Option<i64>,
    ) -> AppResult<Vec<Dish>> {
        self.sorted_dishes(|d| d.category == category, limit)
    }

    async fn create_dish(&self, restaurant_id: &str, data: NewDish) -> AppResult<String> {
        self.check_write("create_dish")?;
        let id = Self::new_id();
        let dish = data.into_dish(id.clone(), restaurant_id.to_string());
        self.write()?.dishes.insert(id.clone(), dish);
        Ok(id)
    }

    async fn update_dish(
        &self,
        restaurant_id: &str,
        dish_id: &str,
        patch: DishPatch,
    ) -> AppResult<()> {
        self.check_write("update_dish")?;
        let mut tables = self.write()?;
        let dish = tables
            .dishes
            .get_mut(dish_id)
            .filter(|d| d.restaurant_id == restaurant_id)
            .ok_or_else(|| AppError::not_found_id("Plato", dish_id))?;
        patch.apply(dish);
        Ok(())
    }

    async fn delete_dish(&self, restaurant_id: &str, dish_id: &str) -> AppResult<()> {
        self.check_write("delete_dish")?;
        let mut tables = self.write()?;
        if tables
            .dishes
            .get(dish_id)
            .is_some_and(|d| d.restaurant_id == restaurant_id)
        {
            tables.dishes.remove(dish_id);
        }
        Ok(())
    }

    async fn list_comments(&self, restaurant_id: &str) -> AppResult<Vec<Comment>> {
        let tables = self.read()?;
        // el más reciente gana en caso de empate de fecha
        let mut list: Vec<Comment> = tables
            .comments
            .iter()
            .rev()
            .filter(|c| c.restaurant_id == restaurant_id)
            .cloned()
            .collect();
        list.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(list)
    }

    async fn add_comment(
        &self,
        restaurant_id: &str,
        user_id: &str,
        data: NewComment,
    ) -> AppResult<Comment> {
        self.check_write("add_comment")?;
        let comment = Comment {
            id: Self::new_id(),
            restaurant_id: restaurant_id.to_string(),
            user_id: user_id.to_string(),
            comment: data.comment,
            rating: data.rating,
            created_at: Utc::now(),
        };
        self.write()?.comments.push(comment.clone());
        Ok(comment)
    }

    async fn create_user(&self, email: &str, password_hash: &str) -> AppResult<User> {
        self.check_write("create_user")?;
        let mut tables = self.write()?;
        if tables.users.values().any(|u| u.email == email) {
            return Err(AppError::Conflict("El usuario ya existe".to_string()));
        }

        let user = User {
            id: Self::new_id(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            access_token: None,
            created_at: Utc::now(),
        };
        tables.users.insert(user.id.clone(), user.clone());
        Ok(user)
    }

    async fn find_user_by_email(&self, email: &str) -> AppResult<Option<User>> {
        Ok(self
            .read()?
            .users
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn find_user_by_token(&self, token: &str) -> AppResult<Option<User>> {
        Ok(self
            .read()?
            .users
            .values()
            .find(|u| u.access_token.as_deref() == Some(token))
            .cloned())
    }

    async fn set_access_token(&self, user_id: &str, token: Option<&str>) -> AppResult<()> {
        self.check_write("set_access_token")?;
        let mut tables = self.write()?;
        let user = tables
            .users
            .get_mut(user_id)
            .ok_or_else(|| AppError::not_found_id("Usuario", user_id))?;
        user.access_token = token.map(str::to_string);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::fixtures::{new_dish, new_restaurant};

    #[tokio::test]
    async fn create_then_get_returns_input_plus_server_fields() {
        let store = InMemoryStore::new();
        let data = new_restaurant("El Pollo Sabroso", RestaurantType::Polleria);

        let id = store.create_restaurant(data.clone()).await.unwrap();
        let restaurant = store.get_restaurant(&id).await.unwrap().unwrap();

        assert_eq!(restaurant.id, id);
        assert_eq!(restaurant.name, data.name);
        assert_eq!(restaurant.description, data.description);
        assert_eq!(restaurant.kind, data.kind);
        assert_eq!(restaurant.categories, data.categories);
        assert_eq!(restaurant.location, data.location);
        assert_eq!(restaurant.rating, data.rating);
        assert_eq!(restaurant.created_at, restaurant.updated_at);
    }

    #[tokio::test]
    async fn partial_update_keeps_missing_fields() {
        let store = InMemoryStore::new();
        let id = store
            .create_restaurant(new_restaurant("Chifa Lung Fung", RestaurantType::Chifa))
            .await
            .unwrap();
        let before = store.get_restaurant(&id).await.unwrap().unwrap();

        let patch = RestaurantPatch {
            name: Some("Chifa Titi".to_string()),
            rating: Some(4.0),
            ..Default::default()
        };
        store.update_restaurant(&id, patch).await.unwrap();

        let after = store.get_restaurant(&id).await.unwrap().unwrap();
        assert_eq!(after.name, "Chifa Titi");
        assert_eq!(after.rating, 4.0);
        assert_eq!(after.description, before.description);
        assert_eq!(after.categories, before.categories);
        assert_eq!(after.created_at, before.created_at);
        assert!(after.updated_at >= before.updated_at);
    }

    #[tokio::test]
    async fn update_of_missing_restaurant_is_not_found() {
        let store = InMemoryStore::new();
        let result = store
            .update_restaurant("missing", RestaurantPatch::default())
            .await;
        assert!(matches!(result, Err(AppError::NotFoundWithId { .. })));
    }

    #[tokio::test]
    async fn deleted_restaurant_disappears_but_dishes_stay() {
        let store = InMemoryStore::new();
        let id = store
            .create_restaurant(new_restaurant("Nikkei 51", RestaurantType::Nikkei))
            .await
            .unwrap();
        store
            .create_dish(&id, new_dish("Tiradito", "Entradas", 3800))
            .await
            .unwrap();

        store.delete_restaurant(&id).await.unwrap();

        assert!(store.get_restaurant(&id).await.unwrap().is_none());
        assert!(store.list_restaurants(None).await.unwrap().is_empty());
        // sin borrado en cascada
        assert_eq!(store.list_dishes(&id, None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn lists_are_sorted_by_name_filtered_and_capped() {
        let store = InMemoryStore::new();
        for (name, kind) in [
            ("Zeta Café", RestaurantType::Cafe),
            ("Alfa Pollos", RestaurantType::Polleria),
            ("Beta Pollos", RestaurantType::Polleria),
        ] {
            store.create_restaurant(new_restaurant(name, kind)).await.unwrap();
        }

        let all: Vec<String> = store
            .list_restaurants(None)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.name)
            .collect();
        assert_eq!(all, ["Alfa Pollos", "Beta Pollos", "Zeta Café"]);

        let capped = store.list_restaurants(Some(2)).await.unwrap();
        assert_eq!(capped.len(), 2);

        let pollerias = store
            .list_restaurants_by_type(RestaurantType::Polleria, None)
            .await
            .unwrap();
        assert_eq!(pollerias.len(), 2);
        assert!(pollerias.iter().all(|r| r.kind == RestaurantType::Polleria));
    }

    #[tokio::test]
    async fn batch_creation_is_all_or_nothing() {
        let store = InMemoryStore::new();
        let dishes = vec![
            new_dish("Causa", "Entradas", 1800),
            new_dish("Suspiro", "Postres", 1200),
        ];

        let id = store
            .create_restaurant_with_dishes(
                new_restaurant("La Mar", RestaurantType::Cevicheria),
                dishes.clone(),
            )
            .await
            .unwrap();
        assert!(store.get_restaurant(&id).await.unwrap().is_some());
        assert_eq!(store.list_dishes(&id, None).await.unwrap().len(), 2);

        // el restaurante y el primer plato pasan, el segundo falla
        store.fail_writes_after(2);
        let result = store
            .create_restaurant_with_dishes(
                new_restaurant("Punto Azul", RestaurantType::Cevicheria),
                dishes,
            )
            .await;
        assert!(result.is_err());

        let names: Vec<String> = store
            .list_restaurants(None)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.name)
            .collect();
        assert_eq!(names, ["La Mar"]);
        assert!(store
            .search_dishes_by_category("Entradas", None)
            .await
            .unwrap()
            .iter()
            .all(|d| d.restaurant_id == id));
    }

    #[tokio::test]
    async fn dish_queries_are_scoped_to_their_restaurant() {
        let store = InMemoryStore::new();
        let a = store
            .create_restaurant(new_restaurant("A", RestaurantType::Criollo))
            .await
            .unwrap();
        let b = store
            .create_restaurant(new_restaurant("B", RestaurantType::Criollo))
            .await
            .unwrap();

        let mut featured = new_dish("Lomo Saltado", "Platos a la carta", 4200);
        featured.is_featured = Some(true);
        let lomo = store.create_dish(&a, featured).await.unwrap();
        store.create_dish(&a, new_dish("Ají de Gallina", "Platos a la carta", 3500)).await.unwrap();
        store.create_dish(&b, new_dish("Arroz con Pato", "Platos a la carta", 4000)).await.unwrap();

        let names: Vec<String> = store
            .list_dishes_by_category(&a, "Platos a la carta", None)
            .await
            .unwrap()
            .into_iter()
            .map(|d| d.name)
            .collect();
        assert_eq!(names, ["Ají de Gallina", "Lomo Saltado"]);

        let featured = store.list_featured_dishes(&a, None).await.unwrap();
        assert_eq!(featured.len(), 1);
        assert_eq!(featured[0].id, lomo);

        assert!(store.get_dish(&b, &lomo).await.unwrap().is_none());
        assert_eq!(
            store
                .search_dishes_by_category("Platos a la carta", None)
                .await
                .unwrap()
                .len(),
            3
        );
    }

    #[tokio::test]
    async fn dish_patch_and_delete() {
        let store = InMemoryStore::new();
        let rid = store
            .create_restaurant(new_restaurant("A", RestaurantType::Otro))
            .await
            .unwrap();
        let did = store
            .create_dish(&rid, new_dish("Chicha", "Bebidas", 600))
            .await
            .unwrap();

        store
            .update_dish(
                &rid,
                &did,
                DishPatch {
                    price: Some(700),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let dish = store.get_dish(&rid, &did).await.unwrap().unwrap();
        assert_eq!(dish.price, 700);
        assert_eq!(dish.name, "Chicha");

        store.delete_dish(&rid, &did).await.unwrap();
        assert!(store.get_dish(&rid, &did).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn comments_come_newest_first() {
        let store = InMemoryStore::new();
        for text in ["primero", "segundo", "tercero"] {
            store
                .add_comment(
                    "r1",
                    "u1",
                    NewComment {
                        comment: text.to_string(),
                        rating: 5,
                    },
                )
                .await
                .unwrap();
        }
        store
            .add_comment(
                "r2",
                "u1",
                NewComment {
                    comment: "otro".to_string(),
                    rating: 3,
                },
            )
            .await
            .unwrap();

        let texts: Vec<String> = store
            .list_comments("r1")
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.comment)
            .collect();
        assert_eq!(texts, ["tercero", "segundo", "primero"]);
    }

    #[tokio::test]
    async fn users_are_unique_by_email_and_found_by_token() {
        let store = InMemoryStore::new();
        let user = store.create_user("admin@menu.pe", "hash").await.unwrap();
        assert!(matches!(
            store.create_user("admin@menu.pe", "hash").await,
            Err(AppError::Conflict(_))
        ));

        store.set_access_token(&user.id, Some("token-1")).await.unwrap();
        let found = store.find_user_by_token("token-1").await.unwrap().unwrap();
        assert_eq!(found.id, user.id);

        store.set_access_token(&user.id, None).await.unwrap();
        assert!(store.find_user_by_token("token-1").await.unwrap().is_none());
    }
}
