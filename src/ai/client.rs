use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::config::Config;

/// 外部调用超时
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum AiClientError {
    #[error("上游限流 (HTTP 429)")]
    RateLimited,
    #[error("上游返回状态 {0}")]
    Status(u16),
    #[error("请求失败: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("响应中没有 generated_text 字段")]
    Malformed,
}

/// 推理客户端抽象，工作流通过它发起外部调用，
/// 测试中可替换为脚本化实现
#[async_trait]
pub trait InferenceClient: Send + Sync {
    /// 是否配置了可用的 API 密钥
    fn configured(&self) -> bool;

    /// 发起一次文本生成调用，返回生成的文本
    async fn generate(&self, prompt: &str) -> Result<String, AiClientError>;
}

/// HuggingFace 推理接口客户端
pub struct HuggingFaceClient {
    http: reqwest::Client,
    api_url: String,
    api_key: Option<String>,
}

impl HuggingFaceClient {
    pub fn new(config: &Config) -> Self {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("Failed to build HTTP client");
        Self {
            http,
            api_url: config.huggingface_api_url.clone(),
            api_key: config.huggingface_api_key.clone(),
        }
    }
}

#[async_trait]
impl InferenceClient for HuggingFaceClient {
    fn configured(&self) -> bool {
        self.api_key.is_some()
    }

    // 超时按传输错误处理，429 单独区分以便上层记录
    async fn generate(&self, prompt: &str) -> Result<String, AiClientError> {
        let mut request = self.http.post(&self.api_url).json(&serde_json::json!({
            "inputs": prompt,
            "parameters": { "max_length": 500, "temperature": 0.7 }
        }));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        if status.as_u16() == 429 {
            return Err(AiClientError::RateLimited);
        }
        if !status.is_success() {
            return Err(AiClientError::Status(status.as_u16()));
        }

        let body: Value = response.json().await?;
        extract_generated_text(&body).ok_or(AiClientError::Malformed)
    }
}

// 推理接口的响应可能是数组也可能是单个对象
fn extract_generated_text(body: &Value) -> Option<String> {
    let entry = match body {
        Value::Array(items) => items.first()?,
        other => other,
    };
    entry
        .get("generated_text")
        .and_then(Value::as_str)
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_text_from_array_response() {
        let body = serde_json::json!([{"generated_text": "Expand the sales team"}]);
        assert_eq!(
            extract_generated_text(&body).as_deref(),
            Some("Expand the sales team")
        );
    }

    #[test]
    fn extracts_text_from_object_response() {
        let body = serde_json::json!({"generated_text": "Invest in retention"});
        assert_eq!(
            extract_generated_text(&body).as_deref(),
            Some("Invest in retention")
        );
    }

    #[test]
    fn rejects_unexpected_shapes() {
        assert!(extract_generated_text(&serde_json::json!({"error": "loading"})).is_none());
        assert!(extract_generated_text(&serde_json::json!([])).is_none());
    }
}
