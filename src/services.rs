use crate::config::Config;
use crate::errors::UpstreamError;
use crate::models::TaxpayerId;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::time::Duration;

const USER_AGENT: &str = "SENGE-MG-Consulta/1.0";

fn build_client(timeout: Duration) -> Result<Client, UpstreamError> {
    Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| {
            UpstreamError::UpstreamFailure(format!("Failed to create HTTP client: {}", e))
        })
}

/// Truthiness of a JSON flag field: null, false, 0 and "" are all unset.
fn is_set(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Upstream-provided error code, when the body carries a non-empty one.
fn upstream_code(data: &Value) -> Option<String> {
    match data.get("code")? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Company registry API (ReceitaWS-style): `GET {base}/{cnpj}`.
#[derive(Clone)]
pub struct RegistryApiService {
    client: Client,
    base_url: String,
}

impl RegistryApiService {
    pub fn new(config: &Config) -> Result<Self, UpstreamError> {
        Self::with_base_url(
            config.cnpj_api_base_url.clone(),
            Duration::from_secs(config.cnpj_api_timeout_secs),
        )
    }

    pub fn with_base_url(base_url: String, timeout: Duration) -> Result<Self, UpstreamError> {
        Ok(Self {
            client: build_client(timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Fetch the registry record for a CNPJ.
    ///
    /// Returns the upstream body unmodified. HTTP 404 or a body with
    /// `status: "ERROR"` is `NotFound`; any other non-success status is
    /// `UpstreamFailure`.
    pub async fn lookup_company(&self, cnpj: &TaxpayerId) -> Result<Value, UpstreamError> {
        let url = format!("{}/{}", self.base_url, cnpj.digits());
        tracing::info!("Fetching registry record for {}", cnpj);

        let response = self
            .client
            .get(&url)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Registry API request failed: {}", e);
                UpstreamError::from(e)
            })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            tracing::info!("Registry API has no record for {}", cnpj);
            return Err(UpstreamError::not_found("CNPJ não encontrado"));
        }
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            tracing::error!("Registry API returned error {}: {}", status, error_text);
            return Err(UpstreamError::UpstreamFailure(format!(
                "Registry API returned status {}",
                status
            )));
        }

        let data: Value = response.json().await.map_err(|e| {
            UpstreamError::UpstreamFailure(format!("Failed to parse registry response: {}", e))
        })?;

        if data.get("status").and_then(Value::as_str) == Some("ERROR") {
            let message = data
                .get("message")
                .and_then(Value::as_str)
                .filter(|m| !m.is_empty())
                .unwrap_or("CNPJ não encontrado")
                .to_string();
            tracing::info!("Registry API reported error for {}: {}", cnpj, message);
            return Err(UpstreamError::NotFound {
                message,
                code: upstream_code(&data),
            });
        }

        tracing::info!("Successfully fetched registry record for {}", cnpj);
        Ok(data)
    }
}

/// Third-party person API: `GET {base}?cpf=...` with an `X-API-KEY` header.
#[derive(Clone)]
pub struct PersonApiService {
    client: Client,
    base_url: String,
    api_key: String,
}

impl PersonApiService {
    pub fn new(config: &Config) -> Result<Self, UpstreamError> {
        Self::with_base_url(
            config.external_api_base_url.clone(),
            config.external_api_key.clone(),
            Duration::from_secs(config.person_api_timeout_secs),
        )
    }

    pub fn with_base_url(
        base_url: String,
        api_key: String,
        timeout: Duration,
    ) -> Result<Self, UpstreamError> {
        Ok(Self {
            client: build_client(timeout)?,
            base_url,
            api_key,
        })
    }

    /// Fetch person data for a CPF.
    ///
    /// Transport failures (including the timeout) surface as `Timeout`,
    /// non-success statuses as `UpstreamFailure`, and a body with a set
    /// `error` field as `NotFound`. `null`, `false`, `0` and `""` leave it unset.
    pub async fn lookup_person(&self, cpf: &TaxpayerId) -> Result<Value, UpstreamError> {
        // Build URL with proper parameter encoding
        let url = reqwest::Url::parse_with_params(&self.base_url, &[("cpf", cpf.digits())])
            .map_err(|e| UpstreamError::UpstreamFailure(format!("Failed to build URL: {}", e)))?;

        tracing::info!("[EXTERNAL API] Consultando {}", cpf);

        let response = self
            .client
            .get(url)
            .header("X-API-KEY", &self.api_key)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| {
                tracing::error!("[EXTERNAL API] Request failed: {}", e);
                UpstreamError::Timeout(format!("Person API request failed: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            tracing::error!("[EXTERNAL API] Returned status {}", status);
            return Err(UpstreamError::UpstreamFailure(format!(
                "API externa retornou status: {}",
                status.as_u16()
            )));
        }

        let data: Value = response.json().await.map_err(|e| {
            UpstreamError::UpstreamFailure(format!("Failed to parse person API response: {}", e))
        })?;

        if let Some(error) = data.get("error").filter(|e| is_set(e)) {
            let message = error
                .as_str()
                .map(str::to_string)
                .unwrap_or_else(|| "CPF não encontrado".to_string());
            tracing::info!("[EXTERNAL API] No record for {}: {}", cpf, message);
            return Err(UpstreamError::NotFound {
                message,
                code: upstream_code(&data),
            });
        }

        tracing::info!("[EXTERNAL API] Sucesso na consulta do {}", cpf);
        Ok(data)
    }
}
