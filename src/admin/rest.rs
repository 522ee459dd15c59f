//! BaaS 表接口（PostgREST 风格）HTTP 客户端
//!
//! 所有数据表的增删改查都经过这里：`/rest/v1/<table>?<filters>`。
//! 过滤条件通过 [`Query`] 构建，例如 `status=eq.ativa&order=id.asc`。

use crate::admin::types::{ensure_success, handle_http_response, Page};
use anyhow::{anyhow, Context, Result};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Display;
use std::sync::{Arc, RwLock};
use tracing::{debug, info, warn};

/// 不属于过滤条件的保留参数
const RESERVED_PARAMS: [&str; 4] = ["select", "order", "limit", "offset"];

/// PostgREST 查询参数构建器
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    params: Vec<(String, String)>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    fn set(mut self, key: &str, value: String) -> Self {
        self.params.retain(|(k, _)| k != key);
        self.params.push((key.to_string(), value));
        self
    }

    fn filter(mut self, column: &str, expr: String) -> Self {
        self.params.push((column.to_string(), expr));
        self
    }

    /// 指定返回列，例如 `"id,status"`
    pub fn select(self, columns: &str) -> Self {
        self.set("select", columns.to_string())
    }

    pub fn eq(self, column: &str, value: impl Display) -> Self {
        self.filter(column, format!("eq.{}", value))
    }

    pub fn neq(self, column: &str, value: impl Display) -> Self {
        self.filter(column, format!("neq.{}", value))
    }

    /// `column=in.(a,b,c)`；含保留字符的值加双引号
    pub fn in_<V: Display>(self, column: &str, values: &[V]) -> Self {
        let list = values
            .iter()
            .map(|v| {
                let s = v.to_string();
                if s.contains([',', '(', ')', '"', ' ']) {
                    format!("\"{}\"", s.replace('"', "\\\""))
                } else {
                    s
                }
            })
            .collect::<Vec<_>>()
            .join(",");
        self.filter(column, format!("in.({})", list))
    }

    pub fn is_null(self, column: &str) -> Self {
        self.filter(column, "is.null".to_string())
    }

    pub fn not_null(self, column: &str) -> Self {
        self.filter(column, "not.is.null".to_string())
    }

    /// 不区分大小写的模糊匹配，`*` 为通配符
    pub fn ilike(self, column: &str, pattern: &str) -> Self {
        self.filter(column, format!("ilike.{}", pattern))
    }

    /// 排序，可多次调用追加排序列
    pub fn order(mut self, column: &str, ascending: bool) -> Self {
        let item = format!("{}.{}", column, if ascending { "asc" } else { "desc" });
        if let Some((_, existing)) = self.params.iter_mut().find(|(k, _)| k == "order") {
            existing.push(',');
            existing.push_str(&item);
            return self;
        }
        self.params.push(("order".to_string(), item));
        self
    }

    pub fn limit(self, limit: u64) -> Self {
        self.set("limit", limit.to_string())
    }

    pub fn offset(self, offset: u64) -> Self {
        self.set("offset", offset.to_string())
    }

    pub fn page(self, page: Page) -> Self {
        self.limit(page.size as u64).offset(page.offset())
    }

    /// 是否包含至少一个过滤条件（update / delete 必须有过滤条件）
    pub fn has_filters(&self) -> bool {
        self.params
            .iter()
            .any(|(k, _)| !RESERVED_PARAMS.contains(&k.as_str()))
    }

    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }
}

/// 解析 `Content-Range: 0-24/3573` 或 `*/0` 中的总数
pub(crate) fn parse_content_range_total(value: &str) -> Option<u64> {
    value.rsplit('/').next()?.trim().parse().ok()
}

/// 表接口客户端
///
/// 访问令牌在登录/退出后原地替换，所有克隆共享同一个令牌
#[derive(Clone)]
pub struct RestClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    access_token: Arc<RwLock<Option<String>>>,
}

impl RestClient {
    pub fn new(client: reqwest::Client, base_url: String, api_key: String) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            access_token: Arc::new(RwLock::new(None)),
        }
    }

    /// 设置（或清除）用户访问令牌；未设置时使用匿名 key
    pub fn set_access_token(&self, token: Option<String>) {
        match self.access_token.write() {
            Ok(mut guard) => *guard = token,
            Err(_) => warn!("[REST] ⚠️ 访问令牌锁已损坏，忽略令牌更新"),
        }
    }

    pub fn has_access_token(&self) -> bool {
        self.access_token
            .read()
            .map(|g| g.is_some())
            .unwrap_or(false)
    }

    fn bearer(&self) -> String {
        self.access_token
            .read()
            .ok()
            .and_then(|g| g.clone())
            .unwrap_or_else(|| self.api_key.clone())
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn request(&self, method: Method, table: &str, query: &Query) -> reqwest::RequestBuilder {
        let url = self.table_url(table);
        debug!("[REST] {} {} {:?}", method, url, query.params());
        self.client
            .request(method, url)
            .query(query.params())
            .header("apikey", &self.api_key)
            .bearer_auth(self.bearer())
    }

    /// 查询表数据
    pub async fn select<T: DeserializeOwned>(&self, table: &str, query: &Query) -> Result<Vec<T>> {
        let response = self
            .request(Method::GET, table, query)
            .header("Accept", "application/json")
            .send()
            .await
            .context(format!("查询 {} 请求失败", table))?;
        let rows: Vec<T> = handle_http_response(response, &format!("查询 {} ", table)).await?;
        debug!("[REST] 查询 {} 返回 {} 行", table, rows.len());
        Ok(rows)
    }

    /// 插入数据并返回插入后的行
    pub async fn insert<T: Serialize, R: DeserializeOwned>(
        &self,
        table: &str,
        rows: &[T],
    ) -> Result<Vec<R>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let response = self
            .request(Method::POST, table, &Query::new())
            .header("Prefer", "return=representation")
            .json(rows)
            .send()
            .await
            .context(format!("插入 {} 请求失败", table))?;
        let inserted: Vec<R> =
            handle_http_response(response, &format!("插入 {} ", table)).await?;
        info!("[REST] ✅ 插入 {}，共 {} 行", table, inserted.len());
        Ok(inserted)
    }

    /// 插入数据，不要求返回内容（批量写入用）
    pub async fn insert_silent<T: Serialize>(&self, table: &str, rows: &[T]) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let response = self
            .request(Method::POST, table, &Query::new())
            .header("Prefer", "return=minimal")
            .json(rows)
            .send()
            .await
            .context(format!("插入 {} 请求失败", table))?;
        ensure_success(response, &format!("插入 {} ", table)).await?;
        debug!("[REST] 插入 {}，共 {} 行", table, rows.len());
        Ok(())
    }

    /// 按过滤条件更新
    pub async fn update<P: Serialize, R: DeserializeOwned>(
        &self,
        table: &str,
        query: &Query,
        patch: &P,
    ) -> Result<Vec<R>> {
        if !query.has_filters() {
            return Err(anyhow!("拒绝无过滤条件的更新: {}", table));
        }
        let response = self
            .request(Method::PATCH, table, query)
            .header("Prefer", "return=representation")
            .json(patch)
            .send()
            .await
            .context(format!("更新 {} 请求失败", table))?;
        let updated: Vec<R> = handle_http_response(response, &format!("更新 {} ", table)).await?;
        info!("[REST] ✅ 更新 {}，影响 {} 行", table, updated.len());
        Ok(updated)
    }

    /// 按过滤条件删除
    pub async fn delete(&self, table: &str, query: &Query) -> Result<()> {
        if !query.has_filters() {
            return Err(anyhow!("拒绝无过滤条件的删除: {}", table));
        }
        let response = self
            .request(Method::DELETE, table, query)
            .header("Prefer", "return=minimal")
            .send()
            .await
            .context(format!("删除 {} 请求失败", table))?;
        ensure_success(response, &format!("删除 {} ", table)).await?;
        info!("[REST] 🗑️ 删除 {} 完成", table);
        Ok(())
    }

    /// 统计行数（`Prefer: count=exact`，从 Content-Range 读取总数）
    pub async fn count(&self, table: &str, query: &Query) -> Result<u64> {
        let response = self
            .request(Method::HEAD, table, query)
            .header("Prefer", "count=exact")
            .send()
            .await
            .context(format!("统计 {} 请求失败", table))?;
        let headers = ensure_success(response, &format!("统计 {} ", table)).await?;
        let range = headers
            .get("content-range")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| anyhow!("统计 {} 响应中缺少 Content-Range", table))?;
        parse_content_range_total(range)
            .ok_or_else(|| anyhow!("无法解析 Content-Range: {}", range))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Row {
        id: i64,
        status: String,
    }

    fn client(url: &str) -> RestClient {
        RestClient::new(reqwest::Client::new(), url.to_string(), "anon".to_string())
    }

    #[test]
    fn builds_postgrest_params() {
        let q = Query::new()
            .select("id,status")
            .eq("status", "ativa")
            .in_("instancia", &["a", "b c"])
            .not_null("grupo")
            .order("id", true)
            .order("nome", false)
            .page(Page::new(2, 25));
        assert_eq!(
            q.params(),
            &[
                ("select".to_string(), "id,status".to_string()),
                ("status".to_string(), "eq.ativa".to_string()),
                ("instancia".to_string(), "in.(a,\"b c\")".to_string()),
                ("grupo".to_string(), "not.is.null".to_string()),
                ("order".to_string(), "id.asc,nome.desc".to_string()),
                ("limit".to_string(), "25".to_string()),
                ("offset".to_string(), "25".to_string()),
            ]
        );
        assert!(q.has_filters());
        assert!(!Query::new().select("*").limit(10).has_filters());
    }

    #[test]
    fn parses_content_range() {
        assert_eq!(parse_content_range_total("0-24/3573"), Some(3573));
        assert_eq!(parse_content_range_total("*/0"), Some(0));
        assert_eq!(parse_content_range_total("0-24/*"), None);
    }

    #[tokio::test]
    async fn select_sends_filters_and_auth_headers() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/rest/v1/Campanhas")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("status".into(), "eq.ativa".into()),
                Matcher::UrlEncoded("select".into(), "id,status".into()),
            ]))
            .match_header("apikey", "anon")
            .match_header("authorization", "Bearer user-token")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"[{"id":1,"status":"ativa"}]"#)
            .create_async()
            .await;

        let rest = client(&server.url());
        rest.set_access_token(Some("user-token".to_string()));
        let rows: Vec<Row> = rest
            .select(
                "Campanhas",
                &Query::new().select("id,status").eq("status", "ativa"),
            )
            .await
            .unwrap();

        assert_eq!(
            rows,
            vec![Row {
                id: 1,
                status: "ativa".to_string()
            }]
        );
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn error_body_is_reported() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/rest/v1/Disparador")
            .with_status(409)
            .with_header("content-type", "application/json")
            .with_body(r#"{"code":"23505","message":"duplicate key value","details":null,"hint":null}"#)
            .create_async()
            .await;

        let rest = client(&server.url());
        let err = rest
            .insert::<_, Row>("Disparador", &[serde_json::json!({"id": 1})])
            .await
            .unwrap_err();
        let text = err.to_string();
        assert!(text.contains("409"), "{}", text);
        assert!(text.contains("duplicate key value"), "{}", text);
    }

    #[tokio::test]
    async fn delete_without_filter_is_refused() {
        let rest = client("http://127.0.0.1:9");
        assert!(rest.delete("Campanhas", &Query::new()).await.is_err());
        assert!(rest
            .update::<_, Row>("Campanhas", &Query::new(), &serde_json::json!({"status": "x"}))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn count_reads_content_range() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("HEAD", "/rest/v1/Disparador")
            .match_query(Matcher::UrlEncoded("enviado".into(), "eq.true".into()))
            .match_header("prefer", "count=exact")
            .with_status(200)
            .with_header("content-range", "0-0/1601")
            .create_async()
            .await;

        let total = client(&server.url())
            .count("Disparador", &Query::new().eq("enviado", true))
            .await
            .unwrap();
        assert_eq!(total, 1601);
        mock.assert_async().await;
    }
}
