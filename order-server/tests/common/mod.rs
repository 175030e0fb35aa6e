//! Shared integration-test harness

#![allow(dead_code)]

use axum::Router;
use axum::body::Body;
use http::{Request, StatusCode, header};
use http_body_util::BodyExt;
use order_server::auth::{JwtConfig, hash_password};
use order_server::core::config::AdminAccount;
use order_server::services::http::build_router;
use order_server::{Config, ServerState};
use rust_decimal::Decimal;
use serde_json::{Value, json};
use shared::models::MenuItemCreate;
use tower::ServiceExt;

pub const ADMIN_EMAIL: &str = "admin@example.com";
pub const ADMIN_PASSWORD: &str = "correct horse battery";

pub fn test_config() -> Config {
    let mut config = Config::with_overrides(std::env::temp_dir().to_string_lossy(), 0);
    config.assistant_api_key = None;
    config.staff_webhook_url = None;
    config.jwt = JwtConfig::with_secret("integration-test-secret-0123456789abcdef");
    config.admin = AdminAccount {
        email: ADMIN_EMAIL.to_string(),
        password_hash: Some(hash_password(ADMIN_PASSWORD).unwrap()),
    };
    config
}

pub struct TestApp {
    pub state: ServerState,
    pub router: Router,
}

impl TestApp {
    /// In-memory app with the given tables and a single Mojito (id 1, 9.50)
    pub async fn with_tables(tables: &[i32]) -> Self {
        let state = ServerState::in_memory(test_config());
        state
            .store
            .insert_menu_item(MenuItemCreate {
                name: "Mojito".into(),
                price: Decimal::new(950, 2),
                category: "Drinks".into(),
                available: None,
            })
            .await
            .unwrap();
        for n in tables {
            state.store.insert_table(*n).await.unwrap();
        }
        state.menu_cache.refresh().await.unwrap();

        let router = build_router(state.clone());
        Self { state, router }
    }

    pub async fn send(
        &self,
        method: &str,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    pub async fn login(&self) -> String {
        let (status, body) = self
            .send(
                "POST",
                "/api/auth/login",
                Some(json!({ "email": ADMIN_EMAIL, "password": ADMIN_PASSWORD })),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::OK, "login failed: {body}");
        body["token"].as_str().unwrap().to_string()
    }

    /// Walk a session from welcome to done with two Mojitos, no tip
    pub async fn place_pay_later_order(&self, table_number: i32) -> Value {
        let (status, session) = self
            .send("POST", "/api/sessions", Some(json!({ "table_number": table_number })), None)
            .await;
        assert_eq!(status, StatusCode::OK, "{session}");
        let id = session["id"].as_str().unwrap().to_string();
        let actions = format!("/api/sessions/{id}/actions");

        for action in [
            json!({ "type": "start" }),
            json!({ "type": "add_item", "menu_item_id": 1 }),
            json!({ "type": "add_item", "menu_item_id": 1 }),
            json!({ "type": "proceed_to_tip" }),
            json!({ "type": "skip_tip" }),
        ] {
            let (status, body) = self.send("POST", &actions, Some(action), None).await;
            assert_eq!(status, StatusCode::OK, "{body}");
        }

        let (status, view) = self
            .send(
                "POST",
                &actions,
                Some(json!({ "type": "choose_payment", "path": "pay_later" })),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{view}");
        view
    }
}

pub fn money(value: &Value) -> f64 {
    value.as_f64().unwrap()
}
