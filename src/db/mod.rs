// src/db/mod.rs
pub mod memory;
pub mod models;
pub mod mongodb;
pub mod store;

pub use memory::InMemoryStore;
pub use self::mongodb::MongoRepo;
pub use store::MenuStore;
