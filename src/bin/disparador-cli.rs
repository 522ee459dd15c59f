//! Disparador 管理端 CLI
//!
//! 非交互式命令行，覆盖登录、模板、实例、活动、报表、mailing 和 webhook 发件箱。
//! 连接参数可由环境变量提供（DISPARADOR_BAAS_URL / DISPARADOR_ANON_KEY 等）。

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use disparador_sdk_core::admin::campaign::{CampaignListener, CampaignStatus, NewCampaign};
use disparador_sdk_core::admin::db::sqlite_url_for;
use disparador_sdk_core::admin::template::NewTemplateSet;
use disparador_sdk_core::admin::types::Page;
use disparador_sdk_core::admin::webhook::WebhookPayload;
use disparador_sdk_core::{parse_contacts, AdminClient, ClientConfig, ContactFile};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{error, info};

/// Disparador CLI
#[derive(Parser, Debug)]
#[command(name = "disparador-cli")]
#[command(about = "Disparador 管理端 CLI - WhatsApp 群发活动管理", long_about = None)]
struct Args {
    /// BaaS 基础地址
    #[arg(long, env = "DISPARADOR_BAAS_URL")]
    baas_url: Option<String>,

    /// 匿名 API key
    #[arg(long, env = "DISPARADOR_ANON_KEY")]
    anon_key: Option<String>,

    /// 本地 SQLite 数据库（会话与 webhook 发件箱），可以是文件路径或 sqlite URL
    #[arg(long, env = "DISPARADOR_DB_URL", default_value = "sqlite://disparador.db?mode=rwc")]
    db_url: String,

    /// webhook 同源代理地址
    #[arg(long, env = "DISPARADOR_WEBHOOK_PROXY_URL")]
    webhook_proxy_url: Option<String>,

    /// webhook 外部端点（直连兜底）
    #[arg(long, env = "DISPARADOR_WEBHOOK_URL")]
    webhook_url: Option<String>,

    /// 没有任何实例时使用的兜底实例
    #[arg(long, env = "DISPARADOR_DEFAULT_INSTANCE")]
    default_instance: Option<String>,

    /// 日志级别（默认: info,disparador_sdk_core=debug）
    #[arg(long, default_value = "info,disparador_sdk_core=debug")]
    log_level: String,

    /// 日志文件
    #[arg(long, default_value = "disparador.log")]
    log_file: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 登录并保存会话
    Login {
        email: String,
        #[arg(long, env = "DISPARADOR_PASSWORD")]
        password: String,
    },
    /// 退出并清除本地会话
    Logout,
    /// 模板集合
    Templates {
        #[command(subcommand)]
        action: TemplateCommand,
    },
    /// 发送实例
    Instances {
        #[command(subcommand)]
        action: InstanceCommand,
    },
    /// 解析联系人文件（不写入任何数据）
    Ingest { file: PathBuf },
    /// 活动
    Campaign {
        #[command(subcommand)]
        action: CampaignCommand,
    },
    /// 首页统计
    Dashboard,
    /// Mailing 联系人库
    Mailing {
        #[command(subcommand)]
        action: MailingCommand,
    },
    /// Webhook 发件箱
    Webhook {
        #[command(subcommand)]
        action: WebhookCommand,
    },
}

#[derive(Subcommand, Debug)]
enum TemplateCommand {
    List {
        #[arg(long)]
        active: bool,
    },
    Create {
        nome: String,
        #[arg(required = true, num_args = 1..=3)]
        textos: Vec<String>,
    },
    Activate { grupo: String },
    Deactivate { grupo: String },
}

#[derive(Subcommand, Debug)]
enum InstanceCommand {
    List,
}

#[derive(Subcommand, Debug)]
enum CampaignCommand {
    Create {
        nome: String,
        file: PathBuf,
        #[arg(long)]
        dia: String,
        #[arg(long)]
        periodo: String,
        /// 关联的模板集合
        #[arg(long)]
        grupo: Option<String>,
    },
    List {
        #[arg(long)]
        status: Option<String>,
        #[arg(long, default_value = "1")]
        page: u32,
        #[arg(long, default_value = "50")]
        size: u32,
    },
    Status { id: String, status: String },
    Report { id: String },
}

#[derive(Subcommand, Debug)]
enum MailingCommand {
    Import { file: PathBuf, origem: String },
    Origins,
}

#[derive(Subcommand, Debug)]
enum WebhookCommand {
    /// 发送通知（默认 "ativar"）
    Notify { message: Option<String> },
    /// 列出待发送记录
    Pending,
    /// 列出已发送记录
    Sent,
    /// 清空已发送记录
    ClearSent,
    /// 重发全部待发送记录
    Sync,
}

/// 初始化日志（同时输出到 stdout 和文件）
fn init_logger(log_level: &str, log_path: &Path) -> Result<()> {
    use std::fs::OpenOptions;
    use std::io;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    // 优先使用环境变量 RUST_LOG
    let filter_layer =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)
        .with_context(|| format!("无法创建日志文件 {}", log_path.display()))?;

    let stdout_layer = tracing_subscriber::fmt::layer()
        .with_writer(io::stdout)
        .with_file(true)
        .with_line_number(true)
        .with_target(false)
        .with_ansi(true);

    // 文件不需要颜色
    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(log_file)
        .with_file(true)
        .with_line_number(true)
        .with_target(false)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(stdout_layer)
        .with(file_layer)
        .init();

    info!("[CLI] 📝 日志已同时输出到控制台和文件: {}", log_path.display());
    Ok(())
}

/// 活动创建进度输出
struct CliCampaignListener;

#[async_trait::async_trait]
impl CampaignListener for CliCampaignListener {
    async fn on_batch_inserted(&self, inserted: usize, total: usize) {
        info!("[CLI/Campaign] 📊 已写入 {}/{}", inserted, total);
    }

    async fn on_batch_failed(&self, batch_index: usize, error: String) {
        error!("[CLI/Campaign] ❌ 第 {} 批失败: {}", batch_index + 1, error);
    }

    async fn on_finished(&self, report_json: String) {
        info!("[CLI/Campaign] ✅ 完成: {}", report_json);
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn build_config(args: &Args) -> Result<ClientConfig> {
    let baas_url = args
        .baas_url
        .clone()
        .ok_or_else(|| anyhow!("缺少 BaaS 地址（--baas-url 或 DISPARADOR_BAAS_URL）"))?;
    let anon_key = args
        .anon_key
        .clone()
        .ok_or_else(|| anyhow!("缺少 API key（--anon-key 或 DISPARADOR_ANON_KEY）"))?;

    let mut config = ClientConfig::new(baas_url, anon_key);
    config.local_db_url = sqlite_url_for(&args.db_url);
    config.webhook_proxy_url = args.webhook_proxy_url.clone();
    config.webhook_url = args.webhook_url.clone();
    if let Some(instance) = &args.default_instance {
        config.default_instance = instance.clone();
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logger(&args.log_level, &args.log_file)?;

    // 解析文件不需要连接
    if let Command::Ingest { file } = &args.command {
        let contacts = parse_contacts(&ContactFile::read(file).await?)?;
        info!("[CLI] ✅ 有效联系人: {}", contacts.len());
        return print_json(&contacts);
    }

    let client = AdminClient::connect(build_config(&args)?).await?;

    match args.command {
        Command::Login { email, password } => {
            let session = client.login(&email, &password).await?;
            info!("[CLI] ✅ 登录成功！用户ID: {}", session.user.id);
        }
        Command::Logout => client.logout().await?,
        Command::Templates { action } => match action {
            TemplateCommand::List { active } => {
                print_json(&client.templates().list_template_sets(active).await?)?
            }
            TemplateCommand::Create { nome, textos } => {
                let set = client
                    .templates()
                    .create_template_set(&NewTemplateSet { nome, textos })
                    .await?;
                print_json(&set)?
            }
            TemplateCommand::Activate { grupo } => {
                print_json(&client.templates().set_active(&grupo, true).await?)?
            }
            TemplateCommand::Deactivate { grupo } => {
                print_json(&client.templates().set_active(&grupo, false).await?)?
            }
        },
        Command::Instances {
            action: InstanceCommand::List,
        } => print_json(&client.instances().list_instances().await?)?,
        Command::Ingest { .. } => {}
        Command::Campaign { action } => match action {
            CampaignCommand::Create {
                nome,
                file,
                dia,
                periodo,
                grupo,
            } => {
                let input = NewCampaign {
                    nome,
                    grupo,
                    dia,
                    periodo,
                };
                let file = ContactFile::read(&file).await?;
                let report = client
                    .create_campaign_from_file(&input, &file, &CliCampaignListener)
                    .await?;
                print_json(&report)?
            }
            CampaignCommand::List { status, page, size } => {
                let status = status
                    .map(|s| s.parse::<CampaignStatus>())
                    .transpose()?;
                let list = client
                    .campaigns()
                    .api()
                    .list_campaigns(status, Page::new(page, size))
                    .await?;
                print_json(&list)?
            }
            CampaignCommand::Status { id, status } => {
                let campaign = client.campaigns().set_status(&id, status.parse()?).await?;
                print_json(&campaign)?
            }
            CampaignCommand::Report { id } => {
                print_json(&client.reports().campaign_report(&id).await?)?
            }
        },
        Command::Dashboard => print_json(&client.reports().dashboard_summary().await?)?,
        Command::Mailing { action } => match action {
            MailingCommand::Import { file, origem } => {
                let file = ContactFile::read(&file).await?;
                print_json(&client.mailing().import_mailing(&file, &origem).await?)?
            }
            MailingCommand::Origins => print_json(&client.mailing().list_origins().await?)?,
        },
        Command::Webhook { action } => match action {
            WebhookCommand::Notify { message } => {
                let payload = message
                    .map(WebhookPayload::Text)
                    .unwrap_or_else(WebhookPayload::activation);
                let delivered = client.webhook().notify(payload).await;
                info!("[CLI] webhook 送达: {}", delivered);
            }
            WebhookCommand::Pending => {
                let pending = client.webhook().list_pending().await?;
                info!("[CLI] 📬 待发送 {} 条", pending.len());
                for entry in pending {
                    println!(
                        "{}\t尝试 {} 次\t{}",
                        entry.id,
                        entry.attempts,
                        entry.last_error.unwrap_or_default()
                    );
                }
            }
            WebhookCommand::Sent => {
                print_json(&client.webhook().list_sent().await?)?
            }
            WebhookCommand::ClearSent => {
                let removed = client.webhook().clear_sent().await?;
                info!("[CLI] 🧹 已清空已发送记录 {} 条", removed);
            }
            WebhookCommand::Sync => {
                let report = client.webhook().sync_pending().await?;
                info!(
                    "[CLI] 🔄 同步完成：送达 {}，仍待发送 {}",
                    report.delivered, report.still_pending
                );
            }
        },
    }

    Ok(())
}
