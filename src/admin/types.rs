use serde::{Deserialize, Serialize};
use tracing::{debug, error};

/// 日志中响应 body 的最大打印长度
const BODY_LOG_LIMIT: usize = 512;

/// BaaS 错误响应体
///
/// 表接口（PostgREST）返回 `{code, message, details, hint}`，
/// 认证接口（GoTrue）返回 `{error, error_description}` 或 `{code, msg}`，
/// 这里统一成一个结构体，缺失字段为 None。
#[derive(Debug, Default, Clone, Deserialize)]
pub struct BaasError {
    #[serde(default)]
    pub code: Option<serde_json::Value>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub details: Option<String>,
    #[serde(default)]
    pub hint: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_description: Option<String>,
    #[serde(default)]
    pub msg: Option<String>,
}

impl BaasError {
    /// 拼接一条可读的错误信息
    pub fn summary(&self) -> String {
        let main = self
            .message
            .as_deref()
            .or(self.error_description.as_deref())
            .or(self.msg.as_deref())
            .or(self.error.as_deref())
            .unwrap_or("未知错误");
        let mut text = main.to_string();
        if let Some(code) = &self.code {
            text = format!("[{}] {}", code.to_string().trim_matches('"'), text);
        }
        if let Some(details) = self.details.as_deref().filter(|d| !d.is_empty()) {
            text.push_str(&format!(" (详情: {})", details));
        }
        if let Some(hint) = self.hint.as_deref().filter(|h| !h.is_empty()) {
            text.push_str(&format!(" (提示: {})", hint));
        }
        text
    }
}

/// 分页参数（页码从 1 开始）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub number: u32,
    pub size: u32,
}

impl Page {
    pub fn new(number: u32, size: u32) -> Self {
        Self {
            number: number.max(1),
            size: size.max(1),
        }
    }

    pub fn offset(&self) -> u64 {
        (self.number.max(1) as u64 - 1) * self.size as u64
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new(1, 50)
    }
}

pub(crate) fn truncate_for_log(body: &str) -> String {
    if body.chars().count() <= BODY_LOG_LIMIT {
        body.to_string()
    } else {
        let head: String = body.chars().take(BODY_LOG_LIMIT).collect();
        format!("{}…(共 {} 字节)", head, body.len())
    }
}

/// 把 HTTP 错误响应转换为 anyhow 错误（带 BaaS 错误信息）
fn http_error(status: reqwest::StatusCode, body_str: &str) -> anyhow::Error {
    match serde_json::from_str::<BaasError>(body_str) {
        Ok(err) => anyhow::anyhow!("HTTP 错误 {}: {}", status, err.summary()),
        Err(_) => anyhow::anyhow!("HTTP 错误 {}: {}", status, body_str),
    }
}

/// 通用 HTTP 响应处理函数：检查状态码并反序列化 JSON body
///
/// 所有返回 JSON 的 BaaS 接口共用此方法
pub async fn handle_http_response<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
    operation_name: &str,
) -> anyhow::Result<T> {
    use anyhow::Context;

    let status = response.status();

    // 读取 body bytes（只能读取一次）
    let body_bytes = response.bytes().await.context("读取响应 body 失败")?;
    let body_str = String::from_utf8_lossy(&body_bytes);
    debug!(
        "[HTTP] {}响应 Body: {}",
        operation_name,
        truncate_for_log(&body_str)
    );

    if !status.is_success() {
        error!(
            "[HTTP] {}请求失败，HTTP状态: {}, 响应: {}",
            operation_name,
            status,
            truncate_for_log(&body_str)
        );
        return Err(http_error(status, &body_str));
    }
    debug!("[HTTP] {}请求成功，HTTP状态: {}", operation_name, status);

    serde_json::from_slice::<T>(&body_bytes).map_err(|e| {
        error!(
            "[HTTP] {}反序列化失败: {:?}\n原始响应: {}",
            operation_name,
            e,
            truncate_for_log(&body_str)
        );
        anyhow::anyhow!("反序列化响应失败: {:?}", e)
    })
}

/// 只检查状态码、不关心 body 的响应处理（如 `return=minimal`、204）
pub async fn ensure_success(
    response: reqwest::Response,
    operation_name: &str,
) -> anyhow::Result<reqwest::header::HeaderMap> {
    use anyhow::Context;

    let status = response.status();
    let headers = response.headers().clone();
    if status.is_success() {
        debug!("[HTTP] {}请求成功，HTTP状态: {}", operation_name, status);
        return Ok(headers);
    }
    let body = response.text().await.context("读取响应 body 失败")?;
    error!(
        "[HTTP] {}请求失败，HTTP状态: {}, 响应: {}",
        operation_name,
        status,
        truncate_for_log(&body)
    );
    Err(http_error(status, &body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_prefers_rest_message_with_details() {
        let err: BaasError = serde_json::from_str(
            r#"{"code":"23505","message":"duplicate key value","details":"Key (id)=(1) already exists.","hint":null}"#,
        )
        .unwrap();
        assert_eq!(
            err.summary(),
            "[23505] duplicate key value (详情: Key (id)=(1) already exists.)"
        );
    }

    #[test]
    fn summary_handles_auth_errors() {
        let err: BaasError = serde_json::from_str(
            r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#,
        )
        .unwrap();
        assert_eq!(err.summary(), "Invalid login credentials");
    }

    #[test]
    fn page_offset_is_zero_based() {
        assert_eq!(Page::new(1, 50).offset(), 0);
        assert_eq!(Page::new(3, 50).offset(), 100);
        // 页码 0 视为第 1 页
        assert_eq!(Page::new(0, 20).offset(), 0);
    }

    #[test]
    fn long_bodies_are_truncated_in_logs() {
        let body = "x".repeat(2000);
        let logged = truncate_for_log(&body);
        assert!(logged.len() < body.len());
        assert!(logged.contains("2000"));
    }
}
