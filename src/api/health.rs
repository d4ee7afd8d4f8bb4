use actix_web::{get, web, HttpResponse, Responder};
use serde_json::json;

use super::AppResult;
use crate::db::MenuStore;

/// Comprueba que el almacén de documentos responde
#[get("/health")]
async fn health(store: web::Data<dyn MenuStore>) -> AppResult<impl Responder> {
    store.ping().await?;
    Ok(HttpResponse::Ok().json(json!({ "status": "ok" })))
}

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(health);
}
