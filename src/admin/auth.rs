//! 认证上下文
//!
//! 封装 BaaS 认证接口（`/auth/v1`）：登录、注册、退出、找回密码、刷新令牌。
//! 会话保存到本地 [`SessionStore`]，并同步到 [`RestClient`] 的访问令牌。

use crate::admin::rest::RestClient;
use crate::admin::serialization::decode_jwt_claims;
use crate::admin::session::{AuthUser, Session, SessionStore};
use crate::admin::types::{ensure_success, handle_http_response};
use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

/// 令牌有效期缺失时的兜底值（秒）
const DEFAULT_TOKEN_TTL_SECS: i64 = 3600;

#[derive(Debug, Serialize)]
struct PasswordCredentials<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
    #[serde(default)]
    user: Option<AuthApiUser>,
}

#[derive(Debug, Deserialize)]
struct AuthApiUser {
    id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    user_metadata: Option<Value>,
}

impl AuthApiUser {
    fn into_auth_user(self) -> AuthUser {
        let nome = self
            .user_metadata
            .as_ref()
            .and_then(|m| m.get("nome").or_else(|| m.get("name")))
            .and_then(|v| v.as_str())
            .map(str::to_string);
        AuthUser {
            id: self.id,
            email: self.email,
            nome,
        }
    }
}

impl TokenResponse {
    fn into_session(self) -> Result<Session> {
        let now = Utc::now().timestamp();
        let claims = decode_jwt_claims(&self.access_token).ok();

        let expires_at = self
            .expires_at
            .or(self.expires_in.map(|s| now + s))
            .or(claims.as_ref().and_then(|c| c.exp))
            .unwrap_or(now + DEFAULT_TOKEN_TTL_SECS);

        let user = match self.user {
            Some(u) => u.into_auth_user(),
            None => {
                let claims = claims.ok_or_else(|| anyhow!("登录响应缺少用户信息"))?;
                AuthUser {
                    id: claims.sub.unwrap_or_default(),
                    email: claims.email,
                    nome: None,
                }
            }
        };

        Ok(Session {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at,
            user,
        })
    }
}

/// 注册结果：开启邮箱确认时不会直接返回会话
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignUpOutcome {
    SignedIn(Session),
    ConfirmationPending { user_id: String, email: Option<String> },
}

/// 认证 HTTP API 客户端
#[derive(Clone)]
pub struct AuthApi {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl AuthApi {
    pub fn new(client: reqwest::Client, base_url: String, api_key: String) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.base_url, path)
    }

    /// 邮箱密码登录
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Session> {
        info!("[AuthAPI] 🔐 正在登录: {}", email);
        let response = self
            .client
            .post(self.url("token"))
            .query(&[("grant_type", "password")])
            .header("apikey", &self.api_key)
            .json(&PasswordCredentials { email, password })
            .send()
            .await
            .context("登录请求失败")?;
        let token: TokenResponse = handle_http_response(response, "登录").await?;
        token.into_session()
    }

    /// 注册新用户
    pub async fn sign_up(&self, email: &str, password: &str, nome: &str) -> Result<SignUpOutcome> {
        info!("[AuthAPI] 📝 注册新用户: {}", email);
        let response = self
            .client
            .post(self.url("signup"))
            .header("apikey", &self.api_key)
            .json(&serde_json::json!({
                "email": email,
                "password": password,
                "data": { "nome": nome },
            }))
            .send()
            .await
            .context("注册请求失败")?;
        let body: Value = handle_http_response(response, "注册").await?;

        if body.get("access_token").is_some() {
            let token: TokenResponse =
                serde_json::from_value(body).context("解析注册会话失败")?;
            return Ok(SignUpOutcome::SignedIn(token.into_session()?));
        }

        // 需要邮箱确认时，响应是用户对象本身（部分版本包在 user 字段里）
        let user_value = body.get("user").cloned().unwrap_or(body);
        let user: AuthApiUser =
            serde_json::from_value(user_value).context("解析注册用户失败")?;
        Ok(SignUpOutcome::ConfirmationPending {
            user_id: user.id,
            email: user.email,
        })
    }

    /// 使用 refresh token 换取新会话
    pub async fn refresh(&self, refresh_token: &str) -> Result<Session> {
        debug!("[AuthAPI] 🔄 刷新会话");
        let response = self
            .client
            .post(self.url("token"))
            .query(&[("grant_type", "refresh_token")])
            .header("apikey", &self.api_key)
            .json(&serde_json::json!({ "refresh_token": refresh_token }))
            .send()
            .await
            .context("刷新会话请求失败")?;
        let token: TokenResponse = handle_http_response(response, "刷新会话").await?;
        token.into_session()
    }

    /// 服务端注销
    pub async fn sign_out(&self, access_token: &str) -> Result<()> {
        let response = self
            .client
            .post(self.url("logout"))
            .header("apikey", &self.api_key)
            .bearer_auth(access_token)
            .send()
            .await
            .context("退出请求失败")?;
        ensure_success(response, "退出").await?;
        Ok(())
    }

    /// 发送找回密码邮件
    pub async fn recover_password(&self, email: &str) -> Result<()> {
        info!("[AuthAPI] 📧 发送找回密码邮件: {}", email);
        let response = self
            .client
            .post(self.url("recover"))
            .header("apikey", &self.api_key)
            .json(&serde_json::json!({ "email": email }))
            .send()
            .await
            .context("找回密码请求失败")?;
        ensure_success(response, "找回密码").await?;
        Ok(())
    }
}

/// 认证上下文：API + 本地会话 + REST 令牌同步
#[derive(Clone)]
pub struct AuthContext {
    api: AuthApi,
    store: SessionStore,
    rest: RestClient,
}

impl AuthContext {
    pub fn new(api: AuthApi, store: SessionStore, rest: RestClient) -> Self {
        Self { api, store, rest }
    }

    async fn activate(&self, session: &Session) -> Result<()> {
        self.store.save(session).await?;
        self.rest.set_access_token(Some(session.access_token.clone()));
        Ok(())
    }

    async fn deactivate(&self) -> Result<()> {
        self.rest.set_access_token(None);
        self.store.clear().await
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Session> {
        let session = self.api.sign_in(email, password).await?;
        self.activate(&session).await?;
        info!("[Auth] ✅ 登录成功，用户ID: {}", session.user.id);
        Ok(session)
    }

    pub async fn sign_up(&self, email: &str, password: &str, nome: &str) -> Result<SignUpOutcome> {
        let outcome = self.api.sign_up(email, password, nome).await?;
        match &outcome {
            SignUpOutcome::SignedIn(session) => {
                self.activate(session).await?;
                info!("[Auth] ✅ 注册并登录成功，用户ID: {}", session.user.id);
            }
            SignUpOutcome::ConfirmationPending { user_id, .. } => {
                info!("[Auth] 📧 注册成功，等待邮箱确认，用户ID: {}", user_id);
            }
        }
        Ok(outcome)
    }

    /// 退出：服务端注销失败只记录日志，本地会话总是清除
    pub async fn sign_out(&self) -> Result<()> {
        if let Some(session) = self.store.load().await? {
            if let Err(e) = self.api.sign_out(&session.access_token).await {
                warn!("[Auth] ⚠️ 服务端注销失败（继续清除本地会话）: {e:#}");
            }
        }
        self.deactivate().await?;
        info!("[Auth] 👋 已退出");
        Ok(())
    }

    pub async fn recover_password(&self, email: &str) -> Result<()> {
        self.api.recover_password(email).await
    }

    /// 用保存的 refresh token 刷新会话
    pub async fn refresh(&self) -> Result<Session> {
        let current = self
            .store
            .load()
            .await?
            .ok_or_else(|| anyhow!("没有可刷新的会话"))?;
        if current.refresh_token.is_empty() {
            return Err(anyhow!("会话缺少 refresh token"));
        }
        let session = self.api.refresh(&current.refresh_token).await?;
        self.activate(&session).await?;
        Ok(session)
    }

    /// 恢复本地会话；过期则尝试刷新，刷新失败时清除
    pub async fn current_session(&self) -> Result<Option<Session>> {
        let Some(session) = self.store.load().await? else {
            return Ok(None);
        };

        if !session.is_expired() {
            self.rest.set_access_token(Some(session.access_token.clone()));
            return Ok(Some(session));
        }

        if !session.refresh_token.is_empty() {
            match self.refresh().await {
                Ok(refreshed) => return Ok(Some(refreshed)),
                Err(e) => warn!("[Auth] ⚠️ 会话刷新失败: {e:#}"),
            }
        }

        info!("[Auth] ⌛ 本地会话已过期，清除");
        self.deactivate().await?;
        Ok(None)
    }
}
