#![allow(dead_code)]

use platform_service::config::PlatformConfig;
use platform_service::startup::Application;
use platform_service::AppState;
use reqwest::{Client, Response};
use serde_json::{json, Value};
use uuid::Uuid;

pub const TEST_USER_ID: &str = "test_user_123";

pub struct TestApp {
    pub address: String,
    pub port: u16,
    pub state: AppState,
    pub client: Client,
}

impl TestApp {
    /// In-memory backend with built-ins seeded, on a random port.
    pub async fn spawn() -> Self {
        Self::spawn_with(PlatformConfig::in_memory()).await
    }

    pub async fn spawn_with(config: PlatformConfig) -> Self {
        let app = Application::build(config)
            .await
            .expect("Failed to build test application");

        let port = app.port();
        let state = app.state().clone();
        let address = format!("http://127.0.0.1:{}", port);

        tokio::spawn(async move {
            app.run_until_stopped().await.ok();
        });

        let client = Client::new();
        let health_url = format!("{}/health", address);
        for _ in 0..50 {
            if client.get(&health_url).send().await.is_ok() {
                break;
            }
            tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
        }

        TestApp {
            address,
            port,
            state,
            client,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    pub async fn get(&self, path: &str) -> Response {
        self.client
            .get(self.url(path))
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn post(&self, path: &str, body: &Value) -> Response {
        self.client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn patch(&self, path: &str, body: &Value) -> Response {
        self.client
            .patch(self.url(path))
            .json(body)
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn put(&self, path: &str, body: &Value) -> Response {
        self.client
            .put(self.url(path))
            .json(body)
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn delete(&self, path: &str) -> Response {
        self.client
            .delete(self.url(path))
            .send()
            .await
            .expect("Failed to execute request")
    }

    /// Create a tenant with unique code and domain and return its id.
    pub async fn create_tenant(&self) -> String {
        let suffix = &Uuid::new_v4().simple().to_string()[..8];
        let response = self
            .post(
                "/tenants",
                &json!({
                    "code": format!("t{}", suffix),
                    "name": "Test Stories",
                    "domain": format!("{}.example.com", suffix),
                    "contact_email": "ops@example.com",
                    "contact_phone": "+15550100",
                }),
            )
            .await;
        assert_eq!(response.status().as_u16(), 201);
        let body: Value = response.json().await.expect("Failed to parse JSON");
        body["tenant"]["id"]
            .as_str()
            .expect("tenant id missing")
            .to_string()
    }

    pub async fn assign_tenant_role(&self, user_id: &str, tenant_id: &str, role: &str) {
        let response = self
            .put(
                &format!("/users/{}/assignments", user_id),
                &json!({ "tenant_roles": { tenant_id: format!("{}:{}", tenant_id, role) } }),
            )
            .await;
        assert_eq!(response.status().as_u16(), 200);
    }

    pub async fn check(
        &self,
        user_id: &str,
        tenant_id: Option<&str>,
        body: &Value,
    ) -> Response {
        let mut request = self
            .client
            .post(self.url("/authz/check"))
            .header("X-User-ID", user_id)
            .json(body);
        if let Some(tenant_id) = tenant_id {
            request = request.header("X-Tenant-ID", tenant_id);
        }
        request.send().await.expect("Failed to execute request")
    }

    /// Decision string for a check that must succeed.
    pub async fn decision(&self, user_id: &str, tenant_id: Option<&str>, body: &Value) -> String {
        let response = self.check(user_id, tenant_id, body).await;
        assert_eq!(response.status().as_u16(), 200);
        let body: Value = response.json().await.expect("Failed to parse JSON");
        body["decision"].as_str().unwrap_or_default().to_string()
    }
}
