//! Shared helpers for the integration tests run under `#[backend_test]`.

use rocket::http::{ContentType, Header, Status};
use rocket::local::asynchronous::Client;
use rocket::serde::json::serde_json::{self, json};

use crate::config::Config;
use crate::model::api::auth::{AuthResponse, RegisterRequest};
use crate::model::db::user::DEFAULT_ADMIN_EMAIL;

/// Build a bearer `Authorization` header for the given token.
pub fn bearer(token: &str) -> Header<'static> {
    Header::new("Authorization", format!("Bearer {token}"))
}

/// Log in with the given credentials, expecting success.
pub async fn login_as(client: &Client, email: &str, password: &str) -> AuthResponse {
    let response = client
        .post("/api/auth/login")
        .header(ContentType::JSON)
        .body(json!({ "email": email, "password": password }).to_string())
        .dispatch()
        .await;
    assert_eq!(Status::Ok, response.status());
    serde_json::from_str(&response.into_string().await.unwrap()).unwrap()
}

/// Log in as the admin account seeded at startup.
pub async fn login_admin(client: &Client) -> AuthResponse {
    let config = client.rocket().state::<Config>().unwrap();
    login_as(client, DEFAULT_ADMIN_EMAIL, config.default_admin_password()).await
}

/// Register the example voter and return their credentials.
pub async fn register_voter(client: &Client) -> AuthResponse {
    register(client, &RegisterRequest::example()).await
}

/// Register the second example voter and return their credentials.
pub async fn register_voter2(client: &Client) -> AuthResponse {
    register(client, &RegisterRequest::example2()).await
}

async fn register(client: &Client, request: &RegisterRequest) -> AuthResponse {
    let response = client
        .post("/api/auth/register")
        .header(ContentType::JSON)
        .body(serde_json::to_string(request).unwrap())
        .dispatch()
        .await;
    assert_eq!(Status::Created, response.status());
    serde_json::from_str(&response.into_string().await.unwrap()).unwrap()
}
