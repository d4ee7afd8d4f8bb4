use async_trait::async_trait;
use mongodb::bson::{doc, oid::ObjectId, to_bson, Bson, Document};
use mongodb::error::{ErrorKind, WriteError, WriteFailure};
use mongodb::{Client, Collection, Cursor, Database};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::models::{
    Comment, Dish, DishPatch, ImageRef, Location, NewComment, NewDish, NewRestaurant, Restaurant,
    RestaurantPatch, RestaurantType, User,
};
use super::store::MenuStore;
use crate::api::middleware::{log_error_chain, ErrorLogExt};
use crate::api::{AppError, AppResult};
use crate::config::AppConfig;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Serialize, Deserialize, Clone)]
struct RestaurantDoc {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    id: Option<ObjectId>,
    name: String,
    description: String,
    #[serde(rename = "type")]
    kind: RestaurantType,
    categories: Vec<String>,
    cover_image: Option<ImageRef>,
    images: Vec<ImageRef>,
    location: Location,
    rating: f64,
    created_at: i64, // timestamp unix en milisegundos
    updated_at: i64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
struct DishDoc {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    id: Option<ObjectId>,
    restaurant_id: ObjectId,
    name: String,
    category: String,
    price: i64,
    description: String,
    photos: Vec<ImageRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    allergens: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    is_featured: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
struct CommentDoc {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    id: Option<ObjectId>,
    restaurant_id: ObjectId,
    user_id: String,
    comment: String,
    rating: i32,
    created_at: i64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
struct UserDoc {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    id: Option<ObjectId>,
    email: String,
    password_hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    access_token: Option<String>,
    created_at: i64,
}

impl RestaurantDoc {
    fn new(id: Option<ObjectId>, data: NewRestaurant, now: i64) -> Self {
        Self {
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
}

impl From<RestaurantDoc> for Restaurant {
    fn from(doc: RestaurantDoc) -> Self {
        Restaurant {
            id: hex(doc.id),
            name: doc.name,
            description: doc.description,
            kind: doc.kind,
            categories: doc.categories,
            cover_image: doc.cover_image,
            images: doc.images,
            location: doc.location,
            rating: doc.rating,
            created_at: from_millis(doc.created_at),
            updated_at: from_millis(doc.updated_at),
        }
    }
}

impl DishDoc {
    fn new(restaurant_id: ObjectId, data: NewDish) -> Self {
        Self {
            id: None,
            restaurant_id,
            name: data.name,
            category: data.category,
            price: data.price,
            description: data.description,
            photos: data.photos,
            allergens: data.allergens,
            is_featured: data.is_featured,
        }
    }
}

impl From<DishDoc> for Dish {
    fn from(doc: DishDoc) -> Self {
        Dish {
            id: hex(doc.id),
            restaurant_id: doc.restaurant_id.to_hex(),
            name: doc.name,
            category: doc.category,
            price: doc.price,
            description: doc.description,
            photos: doc.photos,
            allergens: doc.allergens,
            is_featured: doc.is_featured,
        }
    }
}

impl From<CommentDoc> for Comment {
    fn from(doc: CommentDoc) -> Self {
        Comment {
            id: hex(doc.id),
            restaurant_id: doc.restaurant_id.to_hex(),
            user_id: doc.user_id,
            comment: doc.comment,
            rating: doc.rating,
            created_at: from_millis(doc.created_at),
        }
    }
}

impl From<UserDoc> for User {
    fn from(doc: UserDoc) -> Self {
        User {
            id: hex(doc.id),
            email: doc.email,
            password_hash: doc.password_hash,
            access_token: doc.access_token,
            created_at: from_millis(doc.created_at),
        }
    }
}

fn hex(id: Option<ObjectId>) -> String {
    id.map(|oid| oid.to_hex()).unwrap_or_default()
}

fn from_millis(ms: i64) -> chrono::DateTime<chrono::Utc> {
    chrono::DateTime::from_timestamp_millis(ms).unwrap_or_default()
}

/// Un id que no es un ObjectId válido nunca puede existir en la base de datos
/// Violación de índice único (código 11000)
fn is_duplicate_key(error: &mongodb::error::Error) -> bool {
    matches!(
        error.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(WriteError { code: 11000, .. }))
    )
}

fn parse_id(id: &str) -> Option<ObjectId> {
    ObjectId::parse_str(id).ok()
}

fn bson_value<T: Serialize>(field: &str, value: &T) -> Result<Bson> {
    to_bson(value).map_err(|e| AppError::Internal(format!("Error serializando '{}': {}", field, e)))
}

fn restaurant_set(patch: RestaurantPatch, now: i64) -> Result<Document> {
    let mut set = Document::new();
    if let Some(name) = patch.name {
        set.insert("name", name);
    }
    if let Some(description) = patch.description {
        set.insert("description", description);
    }
    if let Some(kind) = patch.kind {
        set.insert("type", kind.as_str());
    }
    if let Some(categories) = patch.categories {
        set.insert("categories", categories);
    }
    if let Some(cover) = patch.cover_image {
        set.insert("cover_image", bson_value("cover_image", &cover)?);
    }
    if let Some(images) = patch.images {
        set.insert("images", bson_value("images", &images)?);
    }
    if let Some(location) = patch.location {
        set.insert("location", bson_value("location", &location)?);
    }
    if let Some(rating) = patch.rating {
        set.insert("rating", rating);
    }
    set.insert("updated_at", now);
    Ok(set)
}

fn dish_set(patch: DishPatch) -> Result<Document> {
    let mut set = Document::new();
    if let Some(name) = patch.name {
        set.insert("name", name);
    }
    if let Some(category) = patch.category {
        set.insert("category", category);
    }
    if let Some(price) = patch.price {
        set.insert("price", price);
    }
    if let Some(description) = patch.description {
        set.insert("description", description);
    }
    if let Some(photos) = patch.photos {
        set.insert("photos", bson_value("photos", &photos)?);
    }
    if let Some(allergens) = patch.allergens {
        set.insert("allergens", allergens);
    }
    if let Some(is_featured) = patch.is_featured {
        set.insert("is_featured", is_featured);
    }
    Ok(set)
}

async fn collect<T>(mut cursor: Cursor<T>, operation: &str) -> Result<Vec<T>>
where
    T: DeserializeOwned + Send + Sync,
{
    let mut results = Vec::new();
    while cursor
        .advance()
        .await
        .map_err(|e| AppError::database(operation, e))?
    {
        let item = cursor
            .deserialize_current()
            .map_err(|e| AppError::database(operation, e))?;
        results.push(item);
    }
    Ok(results)
}

#[derive(Debug, Clone)]
pub struct MongoRepo {
    pub client: Client,
    pub database: Database,
}

impl MongoRepo {
    pub async fn init(config: &AppConfig) -> Result<MongoRepo> {
        let client = Client::with_uri_str(&config.mongodb_uri)
            .await
            .map_err(|e| AppError::Internal(format!("Error conectando a MongoDB: {}", e)))?;

        let database = client.database(&config.mongodb_database);

        // Test connection
        database
            .run_command(doc! {"ping": 1})
            .await
            .map_err(|e| AppError::Internal(format!("Error validando conexión MongoDB: {}", e)))?;

        tracing::info!(database = %config.mongodb_database, "Conexión a MongoDB establecida exitosamente");

        Ok(MongoRepo { client, database })
    }

    fn restaurants(&self) -> Collection<RestaurantDoc> {
        self.database.collection("restaurants")
    }

    fn dishes(&self) -> Collection<DishDoc> {
        self.database.collection("dishes")
    }

    fn comments(&self) -> Collection<CommentDoc> {
        self.database.collection("comments")
    }

    fn users(&self) -> Collection<UserDoc> {
        self.database.collection("users")
    }

    pub async fn create_indexes(&self) -> Result<()> {
        use mongodb::{options::IndexOptions, IndexModel};

        let restaurant_indexes = vec![
            IndexModel::builder().keys(doc! { "name": 1 }).build(),
            IndexModel::builder()
                .keys(doc! { "type": 1, "name": 1 })
                .build(),
        ];

        self.restaurants()
            .create_indexes(restaurant_indexes)
            .await
            .map_err(|e| AppError::database("create_indexes_restaurants", e))?;

        let dish_indexes = vec![
            IndexModel::builder()
                .keys(doc! { "restaurant_id": 1, "name": 1 })
                .build(),
            IndexModel::builder()
                .keys(doc! { "restaurant_id": 1, "category": 1 })
                .build(),
            IndexModel::builder()
                .keys(doc! { "category": 1, "name": 1 })
                .build(),
        ];

        self.dishes()
            .create_indexes(dish_indexes)
            .await
            .map_err(|e| AppError::database("create_indexes_dishes", e))?;

        self.comments()
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "restaurant_id": 1, "created_at": -1 })
                    .build(),
            )
            .await
            .map_err(|e| AppError::database("create_indexes_comments", e))?;

        let user_indexes = vec![
            IndexModel::builder()
                .keys(doc! { "email": 1 })
                .options(IndexOptions::builder().unique(true).build())
                .build(),
            // solo los usuarios con sesión abierta tienen token
            IndexModel::builder()
                .keys(doc! { "access_token": 1 })
                .options(
                    IndexOptions::builder()
                        .unique(true)
                        .partial_filter_expression(doc! { "access_token": { "$exists": true } })
                        .build(),
                )
                .build(),
        ];

        self.users()
            .create_indexes(user_indexes)
            .await
            .map_err(|e| AppError::database("create_indexes_users", e))?;

        tracing::info!("Índices MongoDB creados exitosamente");
        Ok(())
    }

    /// Timestamp actual en milisegundos
    pub fn current_timestamp() -> i64 {
        chrono::Utc::now().timestamp_millis()
    }

    async fn find_restaurants(
        &self,
        filter: Document,
        limit: Option<i64>,
        operation: &str,
    ) -> Result<Vec<Restaurant>> {
        let collection = self.restaurants();
        let mut find = collection.find(filter).sort(doc! { "name": 1 });
        if let Some(limit) = limit {
            find = find.limit(limit);
        }
        let cursor = find
            .await
            .log_error_context(operation)
            .map_err(|e| AppError::database(operation, e))?;

        let docs = collect(cursor, operation).await?;
        Ok(docs.into_iter().map(Restaurant::from).collect())
    }

    async fn find_dishes(
        &self,
        filter: Document,
        limit: Option<i64>,
        operation: &str,
    ) -> Result<Vec<Dish>> {
        let collection = self.dishes();
        let mut find = collection.find(filter).sort(doc! { "name": 1 });
        if let Some(limit) = limit {
            find = find.limit(limit);
        }
        let cursor = find
            .await
            .log_error_context(operation)
            .map_err(|e| AppError::database(operation, e))?;

        let docs = collect(cursor, operation).await?;
        Ok(docs.into_iter().map(Dish::from).collect())
    }
}

#[async_trait]
impl MenuStore for MongoRepo {
    async fn ping(&self) -> AppResult<()> {
        self.database
            .run_command(doc! {"ping": 1})
            .await
            .map_err(|e| AppError::database("ping", e))?;
        Ok(())
    }

    async fn get_restaurant(&self, id: &str) -> AppResult<Option<Restaurant>> {
        let Some(oid) = parse_id(id) else {
            return Ok(None);
        };

        let restaurant = self
            .restaurants()
            .find_one(doc! { "_id": oid })
            .await
            .log_error_context("getting restaurant")
            .map_err(|e| AppError::database("get_restaurant", e))?;

        Ok(restaurant.map(Restaurant::from))
    }

    async fn list_restaurants(&self, limit: Option<i64>) -> AppResult<Vec<Restaurant>> {
        self.find_restaurants(doc! {}, limit, "list_restaurants").await
    }

    async fn list_restaurants_by_type(
        &self,
        kind: RestaurantType,
        limit: Option<i64>,
    ) -> AppResult<Vec<Restaurant>> {
        self.find_restaurants(doc! { "type": kind.as_str() }, limit, "list_restaurants_by_type")
            .await
    }

    async fn create_restaurant(&self, data: NewRestaurant) -> AppResult<String> {
        let restaurant = RestaurantDoc::new(None, data, Self::current_timestamp());

        let result = self
            .restaurants()
            .insert_one(restaurant)
            .await
            .log_error_context("inserting new restaurant")
            .map_err(|e| AppError::database("create_restaurant", e))?;

        result
            .inserted_id
            .as_object_id()
            .map(|oid| oid.to_hex())
            .ok_or_else(|| AppError::Internal("Id de restaurante inesperado".to_string()))
    }

    async fn update_restaurant(&self, id: &str, patch: RestaurantPatch) -> AppResult<()> {
        let oid = parse_id(id).ok_or_else(|| AppError::not_found_id("Restaurante", id))?;
        let set = restaurant_set(patch, Self::current_timestamp())?;

        let result = self
            .restaurants()
            .update_one(doc! { "_id": oid }, doc! { "$set": set })
            .await
            .log_error_context("updating restaurant")
            .map_err(|e| AppError::database("update_restaurant", e))?;

        if result.matched_count == 0 {
            return Err(AppError::not_found_id("Restaurante", id));
        }
        Ok(())
    }

    async fn delete_restaurant(&self, id: &str) -> AppResult<()> {
        let Some(oid) = parse_id(id) else {
            return Ok(());
        };

        self.restaurants()
            .delete_one(doc! { "_id": oid })
            .await
            .log_error_context("deleting restaurant")
            .map_err(|e| AppError::database("delete_restaurant", e))?;
        Ok(())
    }

    async fn create_restaurant_with_dishes(
        &self,
        data: NewRestaurant,
        dishes: Vec<NewDish>,
    ) -> AppResult<String> {
        let restaurant_id = ObjectId::new();
        let restaurant = RestaurantDoc::new(Some(restaurant_id), data, Self::current_timestamp());
        let dish_docs: Vec<DishDoc> = dishes
            .into_iter()
            .map(|dish| DishDoc::new(restaurant_id, dish))
            .collect();

        let mut session = self
            .client
            .start_session()
            .await
            .map_err(|e| AppError::database("start_session", e))?;
        session
            .start_transaction()
            .await
            .map_err(|e| AppError::database("start_transaction", e))?;

        let written = async {
            self.restaurants()
                .insert_one(restaurant)
                .session(&mut session)
                .await?;
            if !dish_docs.is_empty() {
                self.dishes()
                    .insert_many(dish_docs)
                    .session(&mut session)
                    .await?;
            }
            Ok::<(), mongodb::error::Error>(())
        }
        .await;

        match written {
            Ok(()) => {
                session
                    .commit_transaction()
                    .await
                    .log_error_context("committing restaurant batch")
                    .map_err(|e| AppError::database("create_restaurant_with_dishes", e))?;
                Ok(restaurant_id.to_hex())
            }
            Err(e) => {
                if let Err(abort) = session.abort_transaction().await {
                    tracing::warn!(error = %abort, "No se pudo abortar la transacción");
                }
                Err(AppError::database("create_restaurant_with_dishes", e))
            }
        }
    }

    async fn get_dish(&self, restaurant_id: &str, dish_id: &str) -> AppResult<Option<Dish>> {
        let (Some(rid), Some(did)) = (parse_id(restaurant_id), parse_id(dish_id)) else {
            return Ok(None);
        };

        let dish = self
            .dishes()
            .find_one(doc! { "_id": did, "restaurant_id": rid })
            .await
            .log_error_context("getting dish")
            .map_err(|e| AppError::database("get_dish", e))?;

        Ok(dish.map(Dish::from))
    }

    async fn list_dishes(&self, restaurant_id: &str, limit: Option<i64>) -> AppResult<Vec<Dish>> {
        let Some(rid) = parse_id(restaurant_id) else {
            return Ok(Vec::new());
        };
        self.find_dishes(doc! { "restaurant_id": rid }, limit, "list_dishes")
            .await
    }

    async fn list_dishes_by_category(
        &self,
        restaurant_id: &str,
        category: &str,
        limit: Option<i64>,
    ) -> AppResult<Vec<Dish>> {
        let Some(rid) = parse_id(restaurant_id) else {
            return Ok(Vec::new());
        };
        self.find_dishes(
            doc! { "restaurant_id": rid, "category": category },
            limit,
            "list_dishes_by_category",
        )
        .await
    }

    async fn list_featured_dishes(
        &self,
        restaurant_id: &str,
        limit: Option<i64>,
    ) -> AppResult<Vec<Dish>> {
        let Some(rid) = parse_id(restaurant_id) else {
            return Ok(Vec::new());
        };
        self.find_dishes(
            doc! { "restaurant_id": rid, "is_featured": true },
            limit,
            "list_featured_dishes",
        )
        .await
    }

    async fn search_dishes_by_category(
        &self,
        category: &str,
        limit: Option<i64>,
    ) -> AppResult<Vec<Dish>> {
        self.find_dishes(doc! { "category": category }, limit, "search_dishes_by_category")
            .await
    }

    async fn create_dish(&self, restaurant_id: &str, data: NewDish) -> AppResult<String> {
        let rid = parse_id(restaurant_id)
            .ok_or_else(|| AppError::not_found_id("Restaurante", restaurant_id))?;

        let result = self
            .dishes()
            .insert_one(DishDoc::new(rid, data))
            .await
            .log_error_context("inserting new dish")
            .map_err(|e| AppError::database("create_dish", e))?;

        result
            .inserted_id
            .as_object_id()
            .map(|oid| oid.to_hex())
            .ok_or_else(|| AppError::Internal("Id de plato inesperado".to_string()))
    }

    async fn update_dish(
        &self,
        restaurant_id: &str,
        dish_id: &str,
        patch: DishPatch,
    ) -> AppResult<()> {
        let (Some(rid), Some(did)) = (parse_id(restaurant_id), parse_id(dish_id)) else {
            return Err(AppError::not_found_id("Plato", dish_id));
        };
        let set = dish_set(patch)?;
        if set.is_empty() {
            return match self.get_dish(restaurant_id, dish_id).await? {
                Some(_) => Ok(()),
                None => Err(AppError::not_found_id("Plato", dish_id)),
            };
        }

        let result = self
            .dishes()
            .update_one(doc! { "_id": did, "restaurant_id": rid }, doc! { "$set": set })
            .await
            .log_error_context("updating dish")
            .map_err(|e| AppError::database("update_dish", e))?;

        if result.matched_count == 0 {
            return Err(AppError::not_found_id("Plato", dish_id));
        }
        Ok(())
    }

    async fn delete_dish(&self, restaurant_id: &str, dish_id: &str) -> AppResult<()> {
        let (Some(rid), Some(did)) = (parse_id(restaurant_id), parse_id(dish_id)) else {
            return Ok(());
        };

        self.dishes()
            .delete_one(doc! { "_id": did, "restaurant_id": rid })
            .await
            .log_error_context("deleting dish")
            .map_err(|e| AppError::database("delete_dish", e))?;
        Ok(())
    }

    async fn list_comments(&self, restaurant_id: &str) -> AppResult<Vec<Comment>> {
        let Some(rid) = parse_id(restaurant_id) else {
            return Ok(Vec::new());
        };

        let cursor = self
            .comments()
            .find(doc! { "restaurant_id": rid })
            .sort(doc! { "created_at": -1 })
            .await
            .log_error_context("listing comments")
            .map_err(|e| AppError::database("list_comments", e))?;

        let docs = collect(cursor, "list_comments").await?;
        Ok(docs.into_iter().map(Comment::from).collect())
    }

    async fn add_comment(
        &self,
        restaurant_id: &str,
        user_id: &str,
        data: NewComment,
    ) -> AppResult<Comment> {
        let rid = parse_id(restaurant_id)
            .ok_or_else(|| AppError::not_found_id("Restaurante", restaurant_id))?;

        let mut comment = CommentDoc {
            id: None,
            restaurant_id: rid,
            user_id: user_id.to_string(),
            comment: data.comment,
            rating: data.rating,
            created_at: Self::current_timestamp(),
        };

        let result = self
            .comments()
            .insert_one(&comment)
            .await
            .log_error_context("inserting comment")
            .map_err(|e| AppError::database("add_comment", e))?;

        comment.id = result.inserted_id.as_object_id();
        Ok(Comment::from(comment))
    }

    async fn create_user(&self, email: &str, password_hash: &str) -> AppResult<User> {
        if self.find_user_by_email(email).await?.is_some() {
            return Err(AppError::Conflict("El usuario ya existe".to_string()));
        }

        let mut user = UserDoc {
            id: None,
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            access_token: None,
            created_at: Self::current_timestamp(),
        };

        let result = self
            .users()
            .insert_one(&user)
            .await
            .map_err(|e| {
                // dos registros simultáneos: el índice único decide
                if is_duplicate_key(&e) {
                    return AppError::Conflict("El usuario ya existe".to_string());
                }
                log_error_chain(&e, "inserting new user");
                AppError::database("create_user", e)
            })?;

        user.id = result.inserted_id.as_object_id();
        Ok(User::from(user))
    }

    async fn find_user_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let user = self
            .users()
            .find_one(doc! { "email": email })
            .await
            .log_error_context("finding user by email")
            .map_err(|e| AppError::database("find_user_by_email", e))?;
        Ok(user.map(User::from))
    }

    async fn find_user_by_token(&self, token: &str) -> AppResult<Option<User>> {
        let user = self
            .users()
            .find_one(doc! { "access_token": token })
            .await
            .log_error_context("validating access token")
            .map_err(|e| AppError::database("validate_token", e))?;
        Ok(user.map(User::from))
    }

    async fn set_access_token(&self, user_id: &str, token: Option<&str>) -> AppResult<()> {
        let oid = parse_id(user_id).ok_or_else(|| AppError::not_found_id("Usuario", user_id))?;

        let update = match token {
            Some(token) => doc! { "$set": { "access_token": token } },
            None => doc! { "$unset": { "access_token": "" } },
        };

        let result = self
            .users()
            .update_one(doc! { "_id": oid }, update)
            .await
            .log_error_context("updating access token")
            .map_err(|e| AppError::database("set_access_token", e))?;

        if result.matched_count == 0 {
            return Err(AppError::not_found_id("Usuario", user_id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_error(code: i32) -> mongodb::error::Error {
        let failure: WriteError = mongodb::bson::from_document(doc! {
            "code": code,
            "errmsg": "E11000 duplicate key error collection: menu_pro.users index: email_1",
        })
        .unwrap();
        mongodb::error::Error::from(ErrorKind::Write(WriteFailure::WriteError(failure)))
    }

    #[test]
    fn duplicate_email_insert_is_a_conflict() {
        assert!(is_duplicate_key(&write_error(11000)));
        assert!(!is_duplicate_key(&write_error(121)));
    }

    #[test]
    fn malformed_ids_are_absent() {
        assert!(parse_id("no-es-un-id").is_none());
        assert!(parse_id(&ObjectId::new().to_hex()).is_some());
    }
}
