// 请求网关
// 真正发网络请求的地方，负责拼接地址、附带令牌、区分断网和业务错误

use std::future::Future;
use std::time::Duration;

use serde_json::Value;

use super::action::Method;
use super::error::GatewayError;
use crate::config::ClientConfig;

#[derive(Debug, Clone, PartialEq)]
pub struct GatewayRequest {
    pub endpoint: String,
    pub method: Method,
    pub body: Option<Value>,
    pub token: Option<String>,
}

impl GatewayRequest {
    pub fn new(endpoint: impl Into<String>, method: Method) -> Self {
        Self {
            endpoint: endpoint.into(),
            method,
            body: None,
            token: None,
        }
    }

    pub fn with_body(mut self, body: Option<Value>) -> Self {
        self.body = body;
        self
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }
}

pub trait RequestGateway: Send + Sync {
    fn call(
        &self,
        request: &GatewayRequest,
    ) -> impl Future<Output = Result<Value, GatewayError>> + Send;
}

/// 基于 reqwest 的网关，超时按断网处理
#[derive(Debug, Clone)]
pub struct HttpGateway {
    client: reqwest::Client,
    base_url: String,
}

impl HttpGateway {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Network(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self, GatewayError> {
        Self::new(config.api_base.clone(), config.request_timeout())
    }
}

/// 从错误响应体中取出提示信息
fn error_message(text: &str) -> String {
    serde_json::from_str::<Value>(text)
        .ok()
        .and_then(|body| {
            ["msg", "error", "error_message"]
                .iter()
                .find_map(|field| body.get(*field).and_then(Value::as_str).map(str::to_string))
        })
        .unwrap_or_else(|| text.to_string())
}

impl RequestGateway for HttpGateway {
    async fn call(&self, request: &GatewayRequest) -> Result<Value, GatewayError> {
        let url = format!("{}{}", self.base_url, request.endpoint);
        let mut builder = self.client.request(request.method.into(), &url);
        if let Some(token) = &request.token {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if status.is_client_error() {
            return Err(GatewayError::Client {
                status,
                message: error_message(&text),
            });
        }
        if !status.is_success() {
            return Err(GatewayError::Server {
                status,
                message: error_message(&text),
            });
        }

        tracing::debug!("{} {} -> {}", request.method, request.endpoint, status);
        serde_json::from_str(&text).map_err(|e| GatewayError::Decode(e.to_string()))
    }
}
