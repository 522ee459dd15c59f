//! 登录会话的本地持久化（Sea-ORM）
//!
//! 浏览器端 BaaS 客户端把会话存在 localStorage，这里存到本地 SQLite 的
//! `local_session` 表，只保留一行（id = "current"）。

use anyhow::{Context, Result};
use chrono::Utc;
use sea_orm::{
    sea_query::OnConflict, ActiveValue::Set, ConnectOptions, ConnectionTrait, Database,
    DatabaseConnection, EntityTrait,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// 会话提前刷新的余量（秒）
const EXPIRY_MARGIN_SECS: i64 = 30;

const CURRENT_SESSION_ID: &str = "current";

pub mod local_session {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
    #[sea_orm(table_name = "local_session")]
    pub struct Model {
        #[sea_orm(primary_key, auto_increment = false)]
        pub id: String,
        pub user_id: String,
        pub email: Option<String>,
        pub nome: Option<String>,
        pub access_token: String,
        pub refresh_token: String,
        /// 过期时间（unix 秒）
        pub expires_at: i64,
        pub updated_at: i64,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

/// 已登录用户
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub nome: Option<String>,
}

/// 登录会话
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    /// 过期时间（unix 秒）
    pub expires_at: i64,
    pub user: AuthUser,
}

impl Session {
    /// 在 `now`（unix 秒）时是否已过期（含提前量）
    pub fn is_expired_at(&self, now: i64) -> bool {
        now + EXPIRY_MARGIN_SECS >= self.expires_at
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now().timestamp())
    }
}

/// 会话存储
#[derive(Clone)]
pub struct SessionStore {
    db: DatabaseConnection,
}

impl SessionStore {
    /// 打开本地数据库并确保会话表存在
    pub async fn connect(db_url: &str) -> Result<Self> {
        let mut opt = ConnectOptions::new(db_url.to_string());
        opt.sqlx_logging(false);
        let db = Database::connect(opt)
            .await
            .context(format!("连接SQLite数据库失败: {}", db_url))?;
        let store = Self { db };
        store.init_db().await?;
        Ok(store)
    }

    async fn init_db(&self) -> Result<()> {
        let sql = r#"
            CREATE TABLE IF NOT EXISTS local_session (
                id TEXT PRIMARY KEY NOT NULL,
                user_id TEXT NOT NULL,
                email TEXT,
                nome TEXT,
                access_token TEXT NOT NULL,
                refresh_token TEXT NOT NULL DEFAULT '',
                expires_at INTEGER NOT NULL DEFAULT 0,
                updated_at INTEGER NOT NULL DEFAULT 0
            )
        "#;
        self.db
            .execute_unprepared(sql)
            .await
            .context("创建会话表失败")?;
        debug!("[Session/DB] 会话表就绪");
        Ok(())
    }

    /// 读取已保存的会话
    pub async fn load(&self) -> Result<Option<Session>> {
        let model = local_session::Entity::find_by_id(CURRENT_SESSION_ID.to_string())
            .one(&self.db)
            .await
            .context("查询本地会话失败")?;

        Ok(model.map(|m| Session {
            access_token: m.access_token,
            refresh_token: m.refresh_token,
            expires_at: m.expires_at,
            user: AuthUser {
                id: m.user_id,
                email: m.email,
                nome: m.nome,
            },
        }))
    }

    /// 保存（覆盖）当前会话
    pub async fn save(&self, session: &Session) -> Result<()> {
        use local_session::{ActiveModel, Column, Entity};

        let active = ActiveModel {
            id: Set(CURRENT_SESSION_ID.to_string()),
            user_id: Set(session.user.id.clone()),
            email: Set(session.user.email.clone()),
            nome: Set(session.user.nome.clone()),
            access_token: Set(session.access_token.clone()),
            refresh_token: Set(session.refresh_token.clone()),
            expires_at: Set(session.expires_at),
            updated_at: Set(Utc::now().timestamp()),
        };

        Entity::insert(active)
            .on_conflict(
                OnConflict::column(Column::Id)
                    .update_columns([
                        Column::UserId,
                        Column::Email,
                        Column::Nome,
                        Column::AccessToken,
                        Column::RefreshToken,
                        Column::ExpiresAt,
                        Column::UpdatedAt,
                    ])
                    .to_owned(),
            )
            .exec(&self.db)
            .await
            .context("保存本地会话失败")?;
        info!("[Session/DB] 💾 会话已保存，用户: {}", session.user.id);
        Ok(())
    }

    /// 清除本地会话
    pub async fn clear(&self) -> Result<()> {
        local_session::Entity::delete_by_id(CURRENT_SESSION_ID.to_string())
            .exec(&self.db)
            .await
            .context("清除本地会话失败")?;
        info!("[Session/DB] 🧹 本地会话已清除");
        Ok(())
    }
}
