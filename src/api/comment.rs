//! # API de Comentarios
//!
//! Cualquiera puede leer los comentarios de un restaurante; publicar uno
//! exige sesión.

use actix_web::{get, post, web, HttpRequest, HttpResponse, Responder};

use super::auth::authenticate;
use super::restaurant::require_restaurant;
use super::AppResult;
use crate::db::models::NewComment;
use crate::db::MenuStore;

/// Comentarios del restaurante, los más recientes primero
#[get("/restaurants/{id}/comments")]
async fn list_comments(
    store: web::Data<dyn MenuStore>,
    path: web::Path<String>,
) -> AppResult<impl Responder> {
    let comments = store.list_comments(&path).await?;
    Ok(HttpResponse::Ok().json(comments))
}

/// Publica un comentario a nombre del usuario de la sesión
///
/// # Cuerpo
/// ```json
/// { "comment": "Excelente atención", "rating": 5 }
/// ```
#[post("/restaurants/{id}/comments")]
async fn add_comment(
    store: web::Data<dyn MenuStore>,
    path: web::Path<String>,
    data: web::Json<NewComment>,
    req: HttpRequest,
) -> AppResult<impl Responder> {
    let user = authenticate(store.get_ref(), &req, "add_comment").await?;

    let data = data.into_inner();
    data.validate()?;
    require_restaurant(store.get_ref(), &path).await?;

    let comment = store.add_comment(&path, &user.id, data).await?;
    tracing::info!(restaurant_id = %path, comment_id = %comment.id, "Comentario publicado");

    Ok(HttpResponse::Created().json(comment))
}

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(list_comments);
    cfg.service(add_comment);
}

#[cfg(test)]
mod tests {
    use crate::api::testing::{test_app, TestContext};
    use crate::db::models::fixtures::new_restaurant;
    use crate::db::models::RestaurantType;
    use crate::db::MenuStore;
    use actix_web::http::StatusCode;
    use actix_web::test as actix_test;
    use serde_json::{json, Value};

    #[actix_web::test]
    async fn newest_comment_comes_first() {
        let ctx = TestContext::new();
        let token = ctx.session().await;
        let rid = ctx
            .memory
            .create_restaurant(new_restaurant("Tanta", RestaurantType::Criollo))
            .await
            .unwrap();
        let app = test_app!(ctx);

        for (text, rating) in [("Buen lomo saltado", 4), ("Volveremos", 5)] {
            let req = actix_test::TestRequest::post()
                .uri(&format!("/restaurants/{}/comments", rid))
                .insert_header(("Authorization", format!("Bearer {}", token)))
                .set_json(json!({ "comment": text, "rating": rating }))
                .to_request();
            assert_eq!(actix_test::call_service(&app, req).await.status(), StatusCode::CREATED);
        }

        let req = actix_test::TestRequest::get()
            .uri(&format!("/restaurants/{}/comments", rid))
            .to_request();
        let comments: Vec<Value> = actix_test::call_and_read_body_json(&app, req).await;
        assert_eq!(comments.len(), 2);
        assert_eq!(comments[0]["comment"], "Volveremos");
        assert_eq!(comments[1]["rating"], 4);
    }

    #[actix_web::test]
    async fn anonymous_or_invalid_comments_are_rejected() {
        let ctx = TestContext::new();
        let token = ctx.session().await;
        let rid = ctx
            .memory
            .create_restaurant(new_restaurant("Tanta", RestaurantType::Criollo))
            .await
            .unwrap();
        let app = test_app!(ctx);

        let req = actix_test::TestRequest::post()
            .uri(&format!("/restaurants/{}/comments", rid))
            .set_json(json!({ "comment": "Sin sesión", "rating": 3 }))
            .to_request();
        assert_eq!(
            actix_test::call_service(&app, req).await.status(),
            StatusCode::UNAUTHORIZED
        );

        let req = actix_test::TestRequest::post()
            .uri(&format!("/restaurants/{}/comments", rid))
            .insert_header(("Authorization", format!("Bearer {}", token)))
            .set_json(json!({ "comment": "Fuera de rango", "rating": 6 }))
            .to_request();
        assert_eq!(
            actix_test::call_service(&app, req).await.status(),
            StatusCode::BAD_REQUEST
        );

        let req = actix_test::TestRequest::post()
            .uri("/restaurants/no-existe/comments")
            .insert_header(("Authorization", format!("Bearer {}", token)))
            .set_json(json!({ "comment": "Hola", "rating": 3 }))
            .to_request();
        assert_eq!(
            actix_test::call_service(&app, req).await.status(),
            StatusCode::NOT_FOUND
        );

        assert!(ctx.memory.list_comments(&rid).await.unwrap().is_empty());
    }
}
