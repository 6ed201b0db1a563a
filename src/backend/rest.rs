//! Hosted backend client over its REST and RPC interface.
//!
//! # Responsibilities
//! - Call the counter RPCs (`check_rate_limit`, `check_auth_rate_limit`)
//! - Introspect bearer tokens against the auth endpoint
//! - Read single principal rows from the admins and vendors tables
//!
//! # Design Decisions
//! - Every call has a deadline; a timeout is an ordinary backend error
//! - Empty result sets are `Ok(None)`, never errors
//! - The service key is sent on every call except introspection's bearer

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::json;
use tokio::time::timeout;
use url::Url;

use crate::backend::{
    AdminRecord, AuthProvider, AuthUser, BackendError, BackendResult, CounterReply, CounterStore,
    PrincipalDirectory, VendorRecord,
};
use crate::config::{BackendConfig, TimeoutConfig};
use crate::observability::metrics;

const ADMINS_TABLE: &str = "admins";
const VENDORS_TABLE: &str = "vendors";

/// REST client for the hosted backend.
#[derive(Clone)]
pub struct RestBackend {
    client: Client,
    base_url: Url,
    service_key: String,
    timeout_secs: u64,
}

impl RestBackend {
    pub fn new(config: &BackendConfig, timeouts: &TimeoutConfig) -> BackendResult<Self> {
        let base_url = Url::parse(&config.url)
            .map_err(|e| BackendError::Transport(format!("invalid backend URL '{}': {}", config.url, e)))?;

        let client = Client::builder()
            .build()
            .map_err(|e| BackendError::Transport(e.to_string()))?;

        tracing::info!(backend_url = %base_url, timeout_secs = timeouts.backend_secs, "REST backend initialized");

        Ok(Self {
            client,
            base_url,
            service_key: config.service_key.clone(),
            timeout_secs: timeouts.backend_secs,
        })
    }

    fn endpoint(&self, path: &str) -> BackendResult<Url> {
        self.base_url
            .join(path)
            .map_err(|e| BackendError::Transport(format!("invalid endpoint '{}': {}", path, e)))
    }

    fn with_service_key(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
    }

    /// Run `fut` under the configured deadline, recording failures by operation.
    async fn bounded<T, F>(&self, op: &'static str, fut: F) -> BackendResult<T>
    where
        F: Future<Output = BackendResult<T>>,
    {
        let result = match timeout(Duration::from_secs(self.timeout_secs), fut).await {
            Ok(result) => result,
            Err(_) => Err(BackendError::Timeout(self.timeout_secs)),
        };
        if let Err(e) = &result {
            if !matches!(e, BackendError::Unauthorized) {
                metrics::record_backend_error(op);
            }
        }
        result
    }

    async fn rpc(&self, function: &str, args: serde_json::Value) -> BackendResult<CounterReply> {
        let url = self.endpoint(&format!("rest/v1/rpc/{}", function))?;
        let response = self
            .with_service_key(self.client.post(url))
            .json(&args)
            .send()
            .await
            .map_err(|e| BackendError::Transport(e.to_string()))?;
        decode(response).await
    }

    async fn fetch_user(&self, token: &str) -> BackendResult<AuthUser> {
        let url = self.endpoint("auth/v1/user")?;
        let response = self
            .client
            .get(url)
            .header("apikey", &self.service_key)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| BackendError::Transport(e.to_string()))?;

        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(BackendError::Unauthorized),
            _ => decode(response).await,
        }
    }

    async fn single_row<T: DeserializeOwned>(
        &self,
        table: &str,
        filters: &[(&str, &str)],
    ) -> BackendResult<Option<T>> {
        let url = self.endpoint(&format!("rest/v1/{}", table))?;
        let mut query: Vec<(String, String)> = vec![
            ("select".to_string(), "*".to_string()),
            ("limit".to_string(), "1".to_string()),
        ];
        for (column, value) in filters {
            query.push((column.to_string(), format!("eq.{}", value)));
        }

        let response = self
            .with_service_key(self.client.get(url))
            .query(&query)
            .send()
            .await
            .map_err(|e| BackendError::Transport(e.to_string()))?;

        let rows: Vec<T> = decode(response).await?;
        Ok(rows.into_iter().next())
    }
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> BackendResult<T> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(BackendError::Status {
            status: status.as_u16(),
            body,
        });
    }
    response
        .json::<T>()
        .await
        .map_err(|e| BackendError::Decode(e.to_string()))
}

#[async_trait]
impl CounterStore for RestBackend {
    async fn check_rate_limit(
        &self,
        identifier: &str,
        endpoint: &str,
        max_requests: u32,
        window_minutes: u32,
    ) -> BackendResult<CounterReply> {
        let args = json!({
            "p_identifier": identifier,
            "p_endpoint": endpoint,
            "p_max_requests": max_requests,
            "p_window_minutes": window_minutes,
        });
        self.bounded("check_rate_limit", self.rpc("check_rate_limit", args))
            .await
    }

    async fn check_auth_rate_limit(&self, identifier: &str) -> BackendResult<CounterReply> {
        let args = json!({ "p_identifier": identifier });
        self.bounded("check_auth_rate_limit", self.rpc("check_auth_rate_limit", args))
            .await
    }
}

#[async_trait]
impl AuthProvider for RestBackend {
    async fn introspect(&self, token: &str) -> BackendResult<AuthUser> {
        self.bounded("introspect", self.fetch_user(token)).await
    }
}

#[async_trait]
impl PrincipalDirectory for RestBackend {
    async fn admin_by_user_id(&self, user_id: &str) -> BackendResult<Option<AdminRecord>> {
        self.bounded(
            "admin_lookup",
            self.single_row(ADMINS_TABLE, &[("user_id", user_id)]),
        )
        .await
    }

    async fn admin_by_id(&self, admin_id: &str) -> BackendResult<Option<AdminRecord>> {
        self.bounded("admin_lookup", self.single_row(ADMINS_TABLE, &[("id", admin_id)]))
            .await
    }

    async fn admin_by_id_and_email(
        &self,
        admin_id: &str,
        email: &str,
    ) -> BackendResult<Option<AdminRecord>> {
        self.bounded(
            "admin_lookup",
            self.single_row(ADMINS_TABLE, &[("id", admin_id), ("email", email)]),
        )
        .await
    }

    async fn vendor_by_user_id(&self, user_id: &str) -> BackendResult<Option<VendorRecord>> {
        self.bounded(
            "vendor_lookup",
            self.single_row(VENDORS_TABLE, &[("user_id", user_id)]),
        )
        .await
    }
}

impl std::fmt::Debug for RestBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestBackend")
            .field("base_url", &self.base_url.as_str())
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}
