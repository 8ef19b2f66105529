//! Appliance status API client.
//!
//! This module provides the HTTP client for the appliance's out-of-band REST
//! interface, with bounded retries for transient network failures.

use async_trait::async_trait;
use reqwest::{header, Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, trace};

use crate::error::{ModGuardError, RestError, Result};
use crate::spec::NodeConfig;

use super::types::{ImageStatus, SysInfo, SystemImage, VersionInfo};

/// Default request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Maximum number of retries for transient failures.
const MAX_RETRIES: u32 = 3;

/// Delay between retries in milliseconds.
const RETRY_DELAY_MS: u64 = 1000;

/// Contract of the appliance status API.
///
/// Enforcers depend on this trait so tests can substitute a mock for the
/// live appliance.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StatusApi: Send + Sync {
    /// Authenticates against the appliance.
    async fn login(&self) -> Result<()>;

    /// Retrieves system information, including the license list.
    async fn sys_info(&self) -> Result<SysInfo>;

    /// Retrieves the currently booted version.
    async fn version(&self) -> Result<VersionInfo>;

    /// Asks the appliance to fetch an image from the given URL.
    async fn retrieve_image(&self, url: &str) -> Result<()>;

    /// Retrieves the status of an in-progress image fetch.
    async fn retrieve_image_status(&self) -> Result<ImageStatus>;

    /// Lists the system images installed on the appliance.
    async fn system_images(&self) -> Result<Vec<SystemImage>>;
}

/// HTTP client for the appliance status API.
#[derive(Debug)]
pub struct RestClient {
    /// HTTP client.
    client: Client,
    /// Base URL of the appliance API.
    base_url: String,
    /// Login user name.
    username: String,
    /// Enable password.
    password: String,
    /// Session token obtained by `login`.
    token: Mutex<Option<String>>,
}

/// Login request body.
#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

/// Login response body.
#[derive(Debug, Deserialize)]
struct LoginResponse {
    token: String,
}

/// Image retrieval request body.
#[derive(Debug, Serialize)]
struct RetrieveRequest<'a> {
    url: &'a str,
}

impl RestClient {
    /// Creates a new client for the given base URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(
        base_url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
        verify_tls: bool,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .danger_accept_invalid_certs(!verify_tls)
            .build()
            .map_err(|e| RestError::network(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            username: username.into(),
            password: password.into(),
            token: Mutex::new(None),
        })
    }

    /// Creates a client from node configuration.
    ///
    /// The REST interface authenticates with the enable password.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn from_node(node: &NodeConfig) -> Result<Self> {
        Self::new(
            node.rest_base_url(),
            &node.deploy.user_name,
            &node.deploy.enable_password,
            node.rest.verify_tls,
        )
    }

    /// Executes a GET request with bounded retries and parses the JSON body.
    async fn get_json<T: for<'de> Deserialize<'de>>(&self, path: &str) -> Result<T> {
        let mut last_error = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                debug!("Retry attempt {attempt} of {MAX_RETRIES}");
                tokio::time::sleep(Duration::from_millis(RETRY_DELAY_MS * u64::from(attempt)))
                    .await;
            }

            match self.get_json_once::<T>(path).await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    if e.is_retryable() {
                        last_error = Some(e);
                        continue;
                    }
                    return Err(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            ModGuardError::Rest(RestError::network("Max retries exceeded"))
        }))
    }

    /// Executes a single GET request.
    async fn get_json_once<T: for<'de> Deserialize<'de>>(&self, path: &str) -> Result<T> {
        let url = format!("{}{path}", self.base_url);
        trace!("GET {url}");

        let mut request = self.client.get(&url);
        if let Some(token) = self.token.lock().await.as_deref() {
            request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }

        let response = request.send().await.map_err(|e| {
            ModGuardError::Rest(RestError::network(format!("Request failed: {e}")))
        })?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(ModGuardError::Rest(RestError::AuthenticationFailed {
                message: String::from("Session expired or credentials rejected"),
            }));
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ModGuardError::Rest(RestError::api_error(
                status.as_u16(),
                body,
            )));
        }

        response.json().await.map_err(|e| {
            ModGuardError::Rest(RestError::invalid(format!("Failed to parse response: {e}")))
        })
    }

    /// Executes a POST request with a JSON body.
    async fn post_json<B: Serialize + Sync>(&self, path: &str, body: &B) -> Result<reqwest::Response> {
        let url = format!("{}{path}", self.base_url);
        trace!("POST {url}");

        let mut request = self.client.post(&url).json(body);
        if let Some(token) = self.token.lock().await.as_deref() {
            request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }

        let response = request.send().await.map_err(|e| {
            ModGuardError::Rest(RestError::network(format!("Request failed: {e}")))
        })?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(ModGuardError::Rest(RestError::AuthenticationFailed {
                message: String::from("Session expired or credentials rejected"),
            }));
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ModGuardError::Rest(RestError::api_error(
                status.as_u16(),
                body,
            )));
        }

        Ok(response)
    }
}

#[async_trait]
impl StatusApi for RestClient {
    async fn login(&self) -> Result<()> {
        let body = LoginRequest {
            username: &self.username,
            password: &self.password,
        };

        let response = self.post_json("/api/login", &body).await?;
        let login: LoginResponse = response.json().await.map_err(|e| {
            ModGuardError::Rest(RestError::invalid(format!("Failed to parse login response: {e}")))
        })?;

        *self.token.lock().await = Some(login.token);
        debug!("Authenticated against appliance API");
        Ok(())
    }

    async fn sys_info(&self) -> Result<SysInfo> {
        self.get_json("/api/system/info").await
    }

    async fn version(&self) -> Result<VersionInfo> {
        self.get_json("/api/system/version").await
    }

    async fn retrieve_image(&self, url: &str) -> Result<()> {
        let body = RetrieveRequest { url };
        self.post_json("/api/system/images/retrieve", &body).await?;
        Ok(())
    }

    async fn retrieve_image_status(&self) -> Result<ImageStatus> {
        self.get_json("/api/system/images/retrieve/status").await
    }

    async fn system_images(&self) -> Result<Vec<SystemImage>> {
        self.get_json("/api/system/images").await
    }
}
