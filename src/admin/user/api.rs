//! 用户管理 HTTP API

use crate::admin::rest::{Query, RestClient};
use crate::admin::user::models::{UserPatch, UserProfile};
use anyhow::{anyhow, Result};
use tracing::info;

#[derive(Clone)]
pub struct UserApi {
    rest: RestClient,
    table: String,
}

impl UserApi {
    pub fn new(rest: RestClient, table: String) -> Self {
        Self { rest, table }
    }

    pub async fn list_users(&self) -> Result<Vec<UserProfile>> {
        let users: Vec<UserProfile> = self
            .rest
            .select(&self.table, &Query::new().select("*").order("nome", true))
            .await?;
        info!("[UserAPI] 👥 用户 {} 个", users.len());
        Ok(users)
    }

    pub async fn update_user(&self, id: &str, patch: &UserPatch) -> Result<UserProfile> {
        if patch.is_empty() {
            return Err(anyhow!("没有需要更新的字段"));
        }
        let updated: Vec<UserProfile> = self
            .rest
            .update(&self.table, &Query::new().eq("id", id), patch)
            .await?;
        updated
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("用户不存在: {}", id))
    }

    pub async fn delete_user(&self, id: &str) -> Result<()> {
        self.rest
            .delete(&self.table, &Query::new().eq("id", id))
            .await?;
        info!("[UserAPI] 🗑️ 用户已删除: {}", id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    #[tokio::test]
    async fn deactivate_user() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("PATCH", "/rest/v1/profiles")
            .match_query(Matcher::UrlEncoded("id".into(), "eq.u1".into()))
            .match_body(Matcher::Json(serde_json::json!({"ativo": false})))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"[{"id":"u1","nome":"Ana","ativo":false}]"#)
            .create_async()
            .await;

        let rest = RestClient::new(reqwest::Client::new(), server.url(), "anon".into());
        let api = UserApi::new(rest, "profiles".into());
        let user = api
            .update_user(
                "u1",
                &UserPatch {
                    ativo: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(!user.ativo);
        assert!(api.update_user("u1", &UserPatch::default()).await.is_err());
        mock.assert_async().await;
    }
}
