//! SQLite 数据库工具：统一创建连接池并执行 sqlx 迁移
//!
//! 约定：本 crate 根目录下存在 `migrations/` 目录，存放所有迁移 SQL 文件。
//! 本地库只保存浏览器端原本放在 localStorage 里的东西（webhook 发件箱、会话）。

use anyhow::{Context, Result};
use sqlx::{sqlite::SqlitePoolOptions, Pool, Sqlite};
use tracing::info;

/// 创建 SQLite 连接池并执行所有未执行的迁移
pub async fn create_sqlite_pool_with_migration(db_url: &str) -> Result<Pool<Sqlite>> {
    info!("[DB] 🔗 打开本地 SQLite: {}", db_url);
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(db_url)
        .await
        .context(format!("连接SQLite数据库失败: {}", db_url))?;

    sqlx::migrate!()
        .run(&pool)
        .await
        .context("执行本地数据库迁移失败")?;
    info!("[DB] ✅ 本地数据库迁移完成");

    Ok(pool)
}

/// 把文件路径规范成 sqlite URL（已经是 URL 的原样返回）
pub fn sqlite_url_for(path_or_url: &str) -> String {
    if path_or_url.starts_with("sqlite:") {
        path_or_url.to_string()
    } else {
        format!("sqlite://{}?mode=rwc", path_or_url)
    }
}
