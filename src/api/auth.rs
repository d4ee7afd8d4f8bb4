//! # API de Autenticación
//!
//! Registro, login y logout de los usuarios que administran restaurantes.
//! El login entrega un token Bearer que se guarda en el usuario; las rutas de
//! administración y los comentarios lo exigen antes de escribir nada.

use actix_web::{get, post, web, HttpRequest, HttpResponse, Responder};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use super::{AppError, AppResult, ResultExt};
use crate::db::models::User;
use crate::db::MenuStore;

#[derive(Deserialize)]
struct Credentials {
    email: String,
    password: String,
}

#[derive(Serialize)]
struct UserInfo {
    id: String,
    email: String,
}

fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    use argon2::password_hash::rand_core::OsRng;
    use argon2::password_hash::SaltString;
    use argon2::{Argon2, PasswordHasher};

    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default().hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

fn verify_password(password: &str, hash: &str) -> bool {
    use argon2::{Argon2, PasswordHash, PasswordVerifier};
    let Ok(parsed) = PasswordHash::new(hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

/// Validación básica de email
fn validate_email(email: &str) -> bool {
    email.contains('@') && email.contains('.')
}

/// Extrae el token Bearer del header Authorization
///
/// # Errores
/// - `Unauthorized`: falta el header o no tiene el formato `Bearer <token>`
pub fn extract_token(req: &HttpRequest) -> AppResult<String> {
    let auth_header = req
        .headers()
        .get("authorization")
        .ok_or(AppError::Unauthorized("Falta header Authorization".to_string()))?;

    let auth_str = auth_header
        .to_str()
        .map_err(|_| AppError::Unauthorized("Header Authorization inválido".to_string()))?;

    match auth_str.strip_prefix("Bearer ") {
        Some(token) if !token.trim().is_empty() => Ok(token.trim().to_string()),
        _ => Err(AppError::Unauthorized("Formato de token inválido".to_string())),
    }
}

/// Resuelve el usuario de la sesión actual.
///
/// Se llama al principio de cada operación protegida, antes de cualquier
/// escritura.
pub async fn authenticate(store: &dyn MenuStore, req: &HttpRequest, operation: &str) -> AppResult<User> {
    let token = extract_token(req)
        .map_err(|e| AppError::unauthorized_operation(operation, &e.to_string()))?;

    store
        .find_user_by_token(&token)
        .await?
        .ok_or_else(|| AppError::unauthorized_operation(operation, "Sesión inválida o expirada"))
}

#[post("/auth/register")]
async fn register(
    store: web::Data<dyn MenuStore>,
    data: web::Json<Credentials>,
) -> AppResult<impl Responder> {
    let email = data.email.trim().to_lowercase();
    if !validate_email(&email) {
        return Err(AppError::validation_field("email", "Email inválido"));
    }
    if data.password.len() < 6 {
        return Err(AppError::validation_field(
            "password",
            "La contraseña debe tener al menos 6 caracteres",
        ));
    }

    let password_hash = hash_password(&data.password).map_err_internal("hashing password")?;
    let user = store.create_user(&email, &password_hash).await?;

    tracing::info!(user_id = %user.id, "Usuario registrado");

    Ok(HttpResponse::Created().json(json!({
        "id": user.id,
        "message": "Usuario registrado correctamente"
    })))
}

#[post("/auth/login")]
async fn login(
    store: web::Data<dyn MenuStore>,
    data: web::Json<Credentials>,
) -> AppResult<impl Responder> {
    if data.email.is_empty() || data.password.is_empty() {
        return Err(AppError::Validation("Email y contraseña son requeridos".to_string()));
    }

    let email = data.email.trim().to_lowercase();
    let user = store
        .find_user_by_email(&email)
        .await?
        .filter(|user| verify_password(&data.password, &user.password_hash))
        .ok_or_else(|| AppError::Unauthorized("Credenciales incorrectas".to_string()))?;

    let access_token = Uuid::new_v4().to_string();
    store.set_access_token(&user.id, Some(&access_token)).await?;

    tracing::info!(user_id = %user.id, "Sesión iniciada");

    Ok(HttpResponse::Ok().json(json!({
        "access_token": access_token,
        "user_id": user.id,
        "message": "Login exitoso"
    })))
}

#[post("/auth/logout")]
async fn logout(store: web::Data<dyn MenuStore>, req: HttpRequest) -> AppResult<impl Responder> {
    let user = authenticate(store.get_ref(), &req, "logout").await?;
    store.set_access_token(&user.id, None).await?;

    Ok(HttpResponse::Ok().json(json!({ "message": "Sesión cerrada" })))
}

#[get("/auth/me")]
async fn me(store: web::Data<dyn MenuStore>, req: HttpRequest) -> AppResult<impl Responder> {
    let user = authenticate(store.get_ref(), &req, "me").await?;

    Ok(HttpResponse::Ok().json(UserInfo {
        id: user.id,
        email: user.email,
    }))
}

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(register);
    cfg.service(login);
    cfg.service(logout);
    cfg.service(me);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::{test_app, TestContext};
    use actix_web::http::StatusCode;
    use actix_web::test as actix_test;

    #[test]
    fn password_hashes_verify() {
        let hash = hash_password("secreto123").unwrap();
        assert!(verify_password("secreto123", &hash));
        assert!(!verify_password("otra", &hash));
        assert!(!verify_password("secreto123", "no-es-un-hash"));
    }

    #[actix_web::test]
    async fn register_login_me_logout() {
        let ctx = TestContext::new();
        let app = test_app!(ctx);

        let req = actix_test::TestRequest::post()
            .uri("/auth/register")
            .set_json(json!({ "email": "Admin@Menu.pe", "password": "secreto123" }))
            .to_request();
        assert_eq!(actix_test::call_service(&app, req).await.status(), StatusCode::CREATED);

        let req = actix_test::TestRequest::post()
            .uri("/auth/login")
            .set_json(json!({ "email": "admin@menu.pe", "password": "secreto123" }))
            .to_request();
        let body: serde_json::Value = actix_test::call_and_read_body_json(&app, req).await;
        let token = body["access_token"].as_str().unwrap().to_string();

        let req = actix_test::TestRequest::get()
            .uri("/auth/me")
            .insert_header(("Authorization", format!("Bearer {}", token)))
            .to_request();
        let body: serde_json::Value = actix_test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["email"], "admin@menu.pe");

        let req = actix_test::TestRequest::post()
            .uri("/auth/logout")
            .insert_header(("Authorization", format!("Bearer {}", token)))
            .to_request();
        assert_eq!(actix_test::call_service(&app, req).await.status(), StatusCode::OK);

        let req = actix_test::TestRequest::get()
            .uri("/auth/me")
            .insert_header(("Authorization", format!("Bearer {}", token)))
            .to_request();
        assert_eq!(
            actix_test::call_service(&app, req).await.status(),
            StatusCode::UNAUTHORIZED
        );
    }

    #[actix_web::test]
    async fn wrong_password_is_rejected() {
        let ctx = TestContext::new();
        let app = test_app!(ctx);

        let req = actix_test::TestRequest::post()
            .uri("/auth/register")
            .set_json(json!({ "email": "admin@menu.pe", "password": "secreto123" }))
            .to_request();
        actix_test::call_service(&app, req).await;

        let req = actix_test::TestRequest::post()
            .uri("/auth/login")
            .set_json(json!({ "email": "admin@menu.pe", "password": "incorrecta" }))
            .to_request();
        assert_eq!(
            actix_test::call_service(&app, req).await.status(),
            StatusCode::UNAUTHORIZED
        );
    }

    #[actix_web::test]
    async fn missing_header_short_circuits() {
        let req = actix_test::TestRequest::get().to_http_request();
        assert!(matches!(extract_token(&req), Err(AppError::Unauthorized(_))));

        let req = actix_test::TestRequest::get()
            .insert_header(("Authorization", "Basic abc"))
            .to_http_request();
        assert!(extract_token(&req).is_err());
    }
}
