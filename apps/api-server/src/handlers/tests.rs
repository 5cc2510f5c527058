//! Route-level tests against in-memory backends.

use std::collections::BTreeMap;
use std::sync::Arc;

use actix_web::http::{StatusCode, header};
use actix_web::{App, test, web};
use async_trait::async_trait;
use serde_json::{Value, json};

use postrate_core::ports::{RateFetchError, RateSource};

use super::configure_routes;
use crate::config::AdminBootstrap;
use crate::state::AppState;

struct FixedRates;

#[async_trait]
impl RateSource for FixedRates {
    async fn fetch_base_rates(&self) -> Result<BTreeMap<String, f64>, RateFetchError> {
        Ok(BTreeMap::from([
            ("USD".to_string(), 1.0),
            ("EUR".to_string(), 0.9),
            ("JPY".to_string(), 150.0),
        ]))
    }
}

macro_rules! init_app {
    ($state:expr) => {
        test::init_service(
            App::new()
                .app_data(web::Data::new($state.clone()))
                .configure(configure_routes),
        )
        .await
    };
}

fn bearer(token: &str) -> (header::HeaderName, String) {
    (header::AUTHORIZATION, format!("Bearer {token}"))
}

async fn admin_state() -> (AppState, tokio::sync::watch::Sender<bool>) {
    let (state, shutdown) = AppState::in_memory(Arc::new(FixedRates));
    state
        .ensure_admin(&AdminBootstrap {
            username: "root".to_string(),
            password: "correct horse".to_string(),
        })
        .await
        .unwrap();
    (state, shutdown)
}

#[actix_web::test]
async fn health_reports_backends() {
    let (state, _shutdown) = AppState::in_memory(Arc::new(FixedRates));
    let app = init_app!(state);

    let req = test::TestRequest::get().uri("/api/health").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(body["status"], "ok");
    assert_eq!(body["durable_store"], "memory");
    assert_eq!(body["fast_store"], "memory");
}

#[actix_web::test]
async fn register_login_and_me() {
    let (state, _shutdown) = AppState::in_memory(Arc::new(FixedRates));
    let app = init_app!(state);

    let req = test::TestRequest::post()
        .uri("/api/auth/register")
        .set_json(json!({"username": "reader", "password": "long enough", "nickname": "Rea"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["data"]["user"]["role"], "user");

    let req = test::TestRequest::post()
        .uri("/api/auth/register")
        .set_json(json!({"username": "reader", "password": "long enough"}))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CONFLICT);

    let req = test::TestRequest::post()
        .uri("/api/auth/register")
        .set_json(json!({"username": "short", "password": "short"}))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);

    let req = test::TestRequest::post()
        .uri("/api/auth/login")
        .set_json(json!({"username": "reader", "password": "wrong password"}))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::UNAUTHORIZED);

    let req = test::TestRequest::post()
        .uri("/api/auth/login")
        .set_json(json!({"username": "reader", "password": "long enough"}))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    let token = body["data"]["access_token"].as_str().unwrap().to_string();

    let req = test::TestRequest::get()
        .uri("/api/auth/me")
        .insert_header(bearer(&token))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["username"], "reader");
    assert_eq!(body["data"]["nickname"], "Rea");
}

macro_rules! login {
    ($app:expr, $username:expr, $password:expr) => {{
        let req = test::TestRequest::post()
            .uri("/api/auth/login")
            .set_json(json!({"username": $username, "password": $password}))
            .to_request();
        let body: Value = test::call_and_read_body_json(&$app, req).await;
        body["data"]["access_token"].as_str().unwrap().to_string()
    }};
}

#[actix_web::test]
async fn article_lifecycle_through_admin_routes() {
    let (state, _shutdown) = admin_state().await;
    let app = init_app!(state);
    let admin = login!(app, "root", "correct horse");

    let article = json!({"title": "Hello", "content": "Body", "preview": "Intro"});

    let req = test::TestRequest::post()
        .uri("/api/admin/articles")
        .set_json(&article)
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::UNAUTHORIZED);

    let req = test::TestRequest::post()
        .uri("/api/admin/articles")
        .insert_header(bearer(&admin))
        .set_json(&article)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let created: Value = test::read_body_json(resp).await;
    let id = created["data"]["id"].as_i64().unwrap();

    let req = test::TestRequest::get().uri("/api/articles?page=0&limit=500").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["total"], 1);
    assert_eq!(body["data"]["page"], 1);
    assert_eq!(body["data"]["limit"], 100);

    let req = test::TestRequest::get().uri(&format!("/api/articles/{id}")).to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["views_count"], 1);

    let req = test::TestRequest::put()
        .uri(&format!("/api/admin/articles/{id}"))
        .insert_header(bearer(&admin))
        .set_json(json!({"title": "Hello again", "content": "Body", "preview": "Intro", "status": "draft"}))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["status"], "draft");

    let req = test::TestRequest::delete()
        .uri(&format!("/api/admin/articles/{id}"))
        .insert_header(bearer(&admin))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NO_CONTENT);

    let req = test::TestRequest::get().uri(&format!("/api/articles/{id}")).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let problem: Value = test::read_body_json(resp).await;
    assert_eq!(problem["status"], 404);
    assert_eq!(problem["title"], "Not Found");
}

#[actix_web::test]
async fn readers_cannot_manage_content() {
    let (state, _shutdown) = AppState::in_memory(Arc::new(FixedRates));
    let app = init_app!(state);

    let req = test::TestRequest::post()
        .uri("/api/auth/register")
        .set_json(json!({"username": "reader", "password": "long enough"}))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    let token = body["data"]["access_token"].as_str().unwrap().to_string();

    let req = test::TestRequest::post()
        .uri("/api/admin/categories")
        .insert_header(bearer(&token))
        .set_json(json!({"name": "News"}))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);

    let req = test::TestRequest::post()
        .uri("/api/admin/exchange-rates/refresh")
        .insert_header(bearer(&token))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn likes_need_a_token_and_report_status() {
    let (state, _shutdown) = admin_state().await;
    let app = init_app!(state);
    let admin = login!(app, "root", "correct horse");

    let req = test::TestRequest::post()
        .uri("/api/admin/articles")
        .insert_header(bearer(&admin))
        .set_json(json!({"title": "Liked", "content": "Body", "preview": "Intro"}))
        .to_request();
    let created: Value = test::call_and_read_body_json(&app, req).await;
    let id = created["data"]["id"].as_i64().unwrap();

    let req = test::TestRequest::post()
        .uri(&format!("/api/articles/{id}/like"))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::UNAUTHORIZED);

    let req = test::TestRequest::post()
        .uri(&format!("/api/articles/{id}/like"))
        .insert_header(bearer(&admin))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["liked"], true);
    assert_eq!(body["data"]["likes_count"], 1);

    let req = test::TestRequest::get()
        .uri(&format!("/api/articles/{id}/like"))
        .insert_header(bearer(&admin))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["likes_count"], 1);
    assert_eq!(body["data"]["user_liked"], true);

    let req = test::TestRequest::get()
        .uri(&format!("/api/articles/{id}/like"))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["user_liked"], false);
}

#[actix_web::test]
async fn rates_are_served_after_a_manual_refresh() {
    let (state, _shutdown) = admin_state().await;
    let app = init_app!(state);
    let admin = login!(app, "root", "correct horse");

    let req = test::TestRequest::get()
        .uri("/api/exchange-rates/latest?from=EUR&to=JPY")
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);

    let req = test::TestRequest::post()
        .uri("/api/admin/exchange-rates/refresh")
        .insert_header(bearer(&admin))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["currencies"], 3);

    let req = test::TestRequest::get()
        .uri("/api/exchange-rates/latest?from=eur&to=jpy")
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    let rate = body["data"]["rate"].as_f64().unwrap();
    assert!((rate - 150.0 / 0.9).abs() < 1e-9);

    let req = test::TestRequest::get()
        .uri("/api/exchange-rates/latest?from=EURO&to=JPY")
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);

    let req = test::TestRequest::get().uri("/api/exchange-rates/base").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["base"], "USD");
    assert_eq!(body["data"]["rates"]["USD"], 1.0);
}

#[actix_web::test]
async fn malformed_input_gets_a_problem_document() {
    let (state, _shutdown) = AppState::in_memory(Arc::new(FixedRates));
    let app = init_app!(state);

    let req = test::TestRequest::post()
        .uri("/api/auth/login")
        .insert_header(header::ContentType::json())
        .set_payload("{not json")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let problem: Value = test::read_body_json(resp).await;
    assert_eq!(problem["instance"], "/api/auth/login");

    let req = test::TestRequest::get().uri("/api/articles/abc").to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);
}
