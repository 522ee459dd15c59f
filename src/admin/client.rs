//! 管理端客户端入口
//!
//! 负责打开本地存储、构建 HTTP 客户端、恢复会话，并对外提供各业务服务。

use crate::admin::agent::AgentApi;
use crate::admin::auth::{AuthApi, AuthContext, SignUpOutcome};
use crate::admin::campaign::{
    CampaignApi, CampaignCreationReport, CampaignListener, CampaignService, NewCampaign,
    DEFAULT_BLOCK_SIZE, DEFAULT_INSERT_BATCH_SIZE,
};
use crate::admin::db::create_sqlite_pool_with_migration;
use crate::admin::ingest::{parse_contacts, Contact, ContactFile};
use crate::admin::instance::InstanceApi;
use crate::admin::mailing::MailingApi;
use crate::admin::report::ReportService;
use crate::admin::rest::RestClient;
use crate::admin::session::{Session, SessionStore};
use crate::admin::template::TemplateApi;
use crate::admin::user::UserApi;
use crate::admin::webhook::{WebhookConfig, WebhookNotifier, WebhookOutboxDao};
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// BaaS 表名
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TableNames {
    /// 模板集合与发送实例共用的表
    pub templates: String,
    pub campaigns: String,
    /// 每个联系人一行的发送跟踪表
    pub sends: String,
    pub mailing: String,
    pub agent: String,
    pub profiles: String,
}

impl Default for TableNames {
    fn default() -> Self {
        Self {
            templates: "GupTp".to_string(),
            campaigns: "Campanhas".to_string(),
            sends: "Disparador".to_string(),
            mailing: "Global".to_string(),
            agent: "IAAgente".to_string(),
            profiles: "profiles".to_string(),
        }
    }
}

/// 客户端配置
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// BaaS 基础地址，例如 `https://xyz.supabase.co`
    pub baas_url: String,
    /// 匿名 API key
    pub anon_key: String,
    /// 本地 SQLite 数据库 URL（会话、webhook 发件箱）
    ///
    /// 例如：`sqlite://disparador.db?mode=rwc`
    pub local_db_url: String,
    /// webhook 同源代理地址
    pub webhook_proxy_url: Option<String>,
    /// webhook 外部端点（直连兜底）
    pub webhook_url: Option<String>,
    /// 每个实例一次分到的联系人数
    pub block_size: usize,
    /// 写入发送行的批大小
    pub insert_batch_size: usize,
    /// mailing 导入的批大小
    pub mailing_batch_size: usize,
    /// 没有任何实例时使用的兜底实例
    pub default_instance: String,
    pub request_timeout: Duration,
    pub tables: TableNames,
}

impl ClientConfig {
    pub fn new(baas_url: String, anon_key: String) -> Self {
        Self {
            baas_url,
            anon_key,
            local_db_url: "sqlite://disparador.db?mode=rwc".to_string(),
            webhook_proxy_url: None,
            webhook_url: None,
            block_size: DEFAULT_BLOCK_SIZE,
            insert_batch_size: DEFAULT_INSERT_BATCH_SIZE,
            mailing_batch_size: 500,
            default_instance: "padrao".to_string(),
            request_timeout: Duration::from_secs(30),
            tables: TableNames::default(),
        }
    }

    fn webhook_config(&self) -> WebhookConfig {
        WebhookConfig {
            proxy_url: self.webhook_proxy_url.clone(),
            direct_url: self.webhook_url.clone(),
            ..Default::default()
        }
    }
}

/// 管理端客户端
#[derive(Clone)]
pub struct AdminClient {
    config: ClientConfig,
    rest: RestClient,
    auth: AuthContext,
    notifier: Arc<WebhookNotifier>,
    templates: TemplateApi,
    instances: InstanceApi,
    campaigns: CampaignService,
    reports: ReportService,
    mailing: MailingApi,
    agent: AgentApi,
    users: UserApi,
}

impl AdminClient {
    /// 打开本地存储并恢复会话
    pub async fn connect(config: ClientConfig) -> Result<Self> {
        info!("[Client] 🔗 连接 BaaS: {}", config.baas_url);

        let pool = create_sqlite_pool_with_migration(&config.local_db_url).await?;
        let store = SessionStore::connect(&config.local_db_url).await?;
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .context("创建 HTTP 客户端失败")?;

        let rest = RestClient::new(http.clone(), config.baas_url.clone(), config.anon_key.clone());
        let auth = AuthContext::new(
            AuthApi::new(http.clone(), config.baas_url.clone(), config.anon_key.clone()),
            store,
            rest.clone(),
        );
        let notifier = Arc::new(WebhookNotifier::new(
            http,
            config.webhook_config(),
            WebhookOutboxDao::new(pool),
        ));

        let tables = &config.tables;
        let instances = InstanceApi::new(
            rest.clone(),
            tables.templates.clone(),
            config.default_instance.clone(),
        );
        let campaign_api =
            CampaignApi::new(rest.clone(), tables.campaigns.clone(), tables.sends.clone());
        let client = Self {
            templates: TemplateApi::new(rest.clone(), tables.templates.clone(), notifier.clone()),
            campaigns: CampaignService::new(
                campaign_api.clone(),
                instances.clone(),
                config.block_size,
                config.insert_batch_size,
            ),
            reports: ReportService::new(campaign_api),
            mailing: MailingApi::new(
                rest.clone(),
                tables.mailing.clone(),
                config.mailing_batch_size,
            ),
            agent: AgentApi::new(rest.clone(), tables.agent.clone()),
            users: UserApi::new(rest.clone(), tables.profiles.clone()),
            instances,
            notifier,
            auth,
            rest,
            config,
        };

        match client.auth.current_session().await {
            Ok(Some(session)) => info!("[Client] ♻️ 已恢复会话，用户ID: {}", session.user.id),
            Ok(None) => info!("[Client] 未登录（使用匿名 key）"),
            Err(e) => warn!("[Client] ⚠️ 恢复会话失败: {e:#}"),
        }
        Ok(client)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn is_authenticated(&self) -> bool {
        self.rest.has_access_token()
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<Session> {
        self.auth.sign_in(email, password).await
    }

    pub async fn sign_up(&self, email: &str, password: &str, nome: &str) -> Result<SignUpOutcome> {
        self.auth.sign_up(email, password, nome).await
    }

    pub async fn logout(&self) -> Result<()> {
        self.auth.sign_out().await
    }

    pub fn auth(&self) -> &AuthContext {
        &self.auth
    }

    pub fn rest(&self) -> &RestClient {
        &self.rest
    }

    pub fn webhook(&self) -> &Arc<WebhookNotifier> {
        &self.notifier
    }

    pub fn templates(&self) -> &TemplateApi {
        &self.templates
    }

    pub fn instances(&self) -> &InstanceApi {
        &self.instances
    }

    pub fn campaigns(&self) -> &CampaignService {
        &self.campaigns
    }

    pub fn reports(&self) -> &ReportService {
        &self.reports
    }

    pub fn mailing(&self) -> &MailingApi {
        &self.mailing
    }

    pub fn agent(&self) -> &AgentApi {
        &self.agent
    }

    pub fn users(&self) -> &UserApi {
        &self.users
    }

    /// 解析联系人文件
    pub fn ingest(&self, file: &ContactFile) -> Result<Vec<Contact>> {
        Ok(parse_contacts(file)?)
    }

    /// 解析联系人文件并创建活动
    pub async fn create_campaign_from_file(
        &self,
        input: &NewCampaign,
        file: &ContactFile,
        listener: &dyn CampaignListener,
    ) -> Result<CampaignCreationReport> {
        let contacts = self.ingest(file)?;
        self.campaigns
            .create_campaign(input, &contacts, listener)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admin::webhook::OutboxState;
    use mockito::Matcher;
    use std::sync::Once;

    static INIT_LOGGER: Once = Once::new();

    fn init_test_logger() {
        INIT_LOGGER.call_once(|| {
            use tracing_subscriber::prelude::*;
            use tracing_subscriber::EnvFilter;

            // 关闭底层 HTTP 客户端的 debug 噪音
            let filter_layer = EnvFilter::new(
                "info,disparador_sdk_core=debug,sqlx=warn,hyper_util::client=info,reqwest=info",
            );

            let fmt_layer = tracing_subscriber::fmt::layer()
                .with_file(true)
                .with_line_number(true)
                .with_target(false)
                .with_test_writer();

            tracing_subscriber::registry()
                .with(filter_layer)
                .with(fmt_layer)
                .init();
        });
    }

    fn config(server_url: String, dir: &tempfile::TempDir) -> ClientConfig {
        let mut config = ClientConfig::new(server_url, "anon".to_string());
        config.local_db_url =
            format!("sqlite://{}?mode=rwc", dir.path().join("client.db").display());
        config
    }

    #[tokio::test]
    async fn login_survives_reconnect() {
        init_test_logger();
        let mut server = mockito::Server::new_async().await;
        let _token = server
            .mock("POST", "/auth/v1/token")
            .match_query(Matcher::UrlEncoded("grant_type".into(), "password".into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                serde_json::json!({
                    "access_token": "tok-1",
                    "refresh_token": "ref-1",
                    "expires_in": 3600,
                    "user": {"id": "user-1", "email": "a@b.c"}
                })
                .to_string(),
            )
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let client = AdminClient::connect(config(server.url(), &dir)).await.unwrap();
        assert!(!client.is_authenticated());
        client.login("a@b.c", "x").await.unwrap();
        assert!(client.is_authenticated());

        let reopened = AdminClient::connect(config(server.url(), &dir)).await.unwrap();
        assert!(reopened.is_authenticated());
    }

    #[tokio::test]
    async fn failed_webhook_is_visible_through_client_outbox() {
        init_test_logger();
        let server = mockito::Server::new_async().await;
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config(server.url(), &dir);
        cfg.webhook_url = Some("http://127.0.0.1:9/hook".to_string());
        let client = AdminClient::connect(cfg).await.unwrap();

        assert!(!client.webhook().notify_activation().await);
        assert_eq!(
            client
                .webhook()
                .outbox()
                .count(OutboxState::Pending)
                .await
                .unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn ingest_rejects_files_without_contacts() {
        let server = mockito::Server::new_async().await;
        let dir = tempfile::tempdir().unwrap();
        let client = AdminClient::connect(config(server.url(), &dir)).await.unwrap();
        let file = ContactFile::new("vazio.csv", b"nome,cpf\nAna,123\n".to_vec());
        assert!(client.ingest(&file).is_err());
    }
}
