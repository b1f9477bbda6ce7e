pub(crate) mod pagination;

use std::time::Duration;

use reqwest::Client as HttpClient;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use crate::cast::cast;
use crate::cli::error::LwError;
use crate::context::AuthContext;

/// Something that can invoke a named remote method.
#[allow(async_fn_in_trait)]
pub(crate) trait Transport {
    async fn call(&self, method: &str, args: Value) -> Result<Value, LwError>;

    async fn call_into<T: DeserializeOwned>(&self, method: &str, args: Value) -> Result<T, LwError> {
        let result = self.call(method, args).await?;
        cast(&result)
    }
}

/// An authenticated client bound to a single context.
pub(crate) struct LwClient {
    client: HttpClient,
    api_addr: String,
    username: String,
    password: String,
    timeout: u64,
}

impl LwClient {
    pub(crate) fn new(context: &AuthContext) -> Result<Self, LwError> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            "Accept",
            reqwest::header::HeaderValue::from_static("application/json"),
        );

        let client = reqwest::Client::builder()
            .user_agent(crate::APP_USER_AGENT)
            .default_headers(headers)
            .timeout(Duration::from_secs(context.timeout))
            .danger_accept_invalid_certs(context.insecure)
            .build()
            .map_err(|source| LwError::Transport {
                method: String::from("<client setup>"),
                source,
            })?;

        if context.insecure {
            tracing::warn!(
                context = %context.context_name,
                "TLS certificate verification is disabled for this context"
            );
        }

        Ok(Self {
            client,
            api_addr: context.url.trim_end_matches('/').to_string(),
            username: context.username.clone(),
            password: context.password.clone(),
            timeout: context.timeout,
        })
    }

    fn endpoint(&self, method: &str) -> String {
        format!("{}/{}", self.api_addr, method.trim_matches('/'))
    }
}

impl Transport for LwClient {
    #[tracing::instrument(skip(self, args), fields(endpoint = %self.endpoint(method)))]
    async fn call(&self, method: &str, args: Value) -> Result<Value, LwError> {
        let transport_err = |source: reqwest::Error| {
            if source.is_timeout() {
                LwError::Timeout {
                    method: method.to_string(),
                    seconds: self.timeout,
                }
            } else {
                LwError::Transport {
                    method: method.to_string(),
                    source,
                }
            }
        };

        let response = self
            .client
            .post(self.endpoint(method))
            .basic_auth(&self.username, Some(&self.password))
            .json(&json!({ "params": args }))
            .send()
            .await
            .map_err(transport_err)?;

        let status = response.status();
        let body = response.bytes().await.map_err(transport_err)?;
        tracing::trace!(%status, bytes = body.len(), "received response");

        let malformed = || LwError::MalformedResponse {
            method: method.to_string(),
            status: status.as_u16(),
        };

        let result: Value = serde_json::from_slice(&body).map_err(|_| malformed())?;

        if let Some(fault) = as_fault(&result) {
            tracing::debug!(%status, "remote fault");
            return Err(fault);
        }

        if !status.is_success() {
            return Err(malformed());
        }

        Ok(result)
    }
}

/// Recognizes the `{ "error_class": ..., "error": ..., "full_message": ... }` shape.
fn as_fault(result: &Value) -> Option<LwError> {
    let object = result.as_object()?;
    let class = object.get("error_class")?;

    let text = |key: &str| object.get(key).and_then(Value::as_str).map(String::from);

    Some(LwError::RemoteFault {
        class: class
            .as_str()
            .map(String::from)
            .unwrap_or_else(|| class.to_string()),
        message: text("error").unwrap_or_default(),
        detail: text("full_message"),
    })
}
