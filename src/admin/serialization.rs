//! 序列化辅助函数
//!
//! BaaS 表里的历史数据类型并不统一（布尔值有 `true` / `"true"` / `1` 混用，
//! 数字列偶尔以字符串返回），这里集中放置宽松的反序列化函数，
//! 以及 JWT 载荷解析和各类 ID 生成。

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use uuid::Uuid;

/// 宽松布尔反序列化（支持 bool / 数字 / 字符串 / null）
pub fn deserialize_flexible_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    match value {
        Value::Null => Ok(false),
        Value::Bool(b) => Ok(b),
        Value::Number(n) => Ok(n.as_f64().map(|f| f != 0.0).unwrap_or(false)),
        Value::String(s) => Ok(matches!(
            s.trim().to_ascii_lowercase().as_str(),
            "true" | "t" | "1" | "sim" | "s" | "yes"
        )),
        other => Err(serde::de::Error::custom(format!(
            "无法解析为布尔值: {}",
            other
        ))),
    }
}

/// 宽松字符串反序列化：数字、布尔转为字符串，null 转为空串
pub fn deserialize_lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Null => String::new(),
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => other.to_string(),
    })
}

/// JWT 载荷中我们关心的字段
#[derive(Debug, Clone, Deserialize)]
pub struct JwtClaims {
    /// 用户 ID
    #[serde(default)]
    pub sub: Option<String>,
    /// 过期时间（unix 秒）
    #[serde(default)]
    pub exp: Option<i64>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}

/// 解析 JWT 载荷（不校验签名，签名由 BaaS 服务端负责）
pub fn decode_jwt_claims(token: &str) -> Result<JwtClaims> {
    use base64::Engine;

    let payload = token
        .split('.')
        .nth(1)
        .ok_or_else(|| anyhow!("JWT 格式错误：缺少载荷段"))?;
    let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .context("JWT 载荷 base64 解码失败")?;
    serde_json::from_slice(&bytes).context("JWT 载荷 JSON 解析失败")
}

/// 生成分组 ID（模板集合共享的 grupo 标识）
///
/// 形如 `conj_1718000000000_a1b2c3`
pub fn generate_group_id(prefix: &str) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!(
        "{}_{}_{}",
        prefix,
        Utc::now().timestamp_millis(),
        &suffix[..6]
    )
}

/// 生成活动 ID
pub fn generate_campaign_id() -> String {
    Uuid::new_v4().to_string()
}
