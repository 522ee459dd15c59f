//! 活动模型定义

use crate::admin::campaign::fanout::BlockAssignment;
use crate::admin::serialization::{deserialize_flexible_bool, deserialize_lenient_string};
use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 活动状态
///
/// 允许的流转：
/// - pendente → ativa / concluida
/// - ativa ⇄ pausada
/// - ativa / pausada → concluida
///
/// concluida 为终态；设置为当前状态视为无操作。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CampaignStatus {
    #[serde(alias = "pending")]
    Pendente,
    #[serde(alias = "active")]
    Ativa,
    #[serde(alias = "paused")]
    Pausada,
    #[serde(alias = "done", alias = "concluída")]
    Concluida,
}

impl CampaignStatus {
    pub const ALL: [CampaignStatus; 4] = [
        CampaignStatus::Pendente,
        CampaignStatus::Ativa,
        CampaignStatus::Pausada,
        CampaignStatus::Concluida,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CampaignStatus::Pendente => "pendente",
            CampaignStatus::Ativa => "ativa",
            CampaignStatus::Pausada => "pausada",
            CampaignStatus::Concluida => "concluida",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, CampaignStatus::Concluida)
    }

    pub fn can_transition_to(&self, next: CampaignStatus) -> bool {
        use CampaignStatus::*;
        match (self, next) {
            (a, b) if *a == b => true,
            (Concluida, _) => false,
            (Pendente, Ativa) | (Pendente, Concluida) => true,
            (Ativa, Pausada) | (Ativa, Concluida) => true,
            (Pausada, Ativa) | (Pausada, Concluida) => true,
            _ => false,
        }
    }
}

impl fmt::Display for CampaignStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CampaignStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "pendente" | "pending" => Ok(CampaignStatus::Pendente),
            "ativa" | "active" => Ok(CampaignStatus::Ativa),
            "pausada" | "paused" => Ok(CampaignStatus::Pausada),
            "concluida" | "concluída" | "done" => Ok(CampaignStatus::Concluida),
            other => Err(anyhow!("未知的活动状态: {}", other)),
        }
    }
}

/// 活动（Campanhas 行）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Campaign {
    pub id: String,
    pub nome: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_criacao: Option<String>,
    pub status: CampaignStatus,
    /// 关联的模板集合
    #[serde(default)]
    pub grupo: Option<String>,
    #[serde(default)]
    pub dia: Option<String>,
    #[serde(default)]
    pub periodo: Option<String>,
    #[serde(default)]
    pub total_contatos: Option<i64>,
}

/// 新建活动的输入
#[derive(Debug, Clone, Default)]
pub struct NewCampaign {
    pub nome: String,
    pub grupo: Option<String>,
    pub dia: String,
    pub periodo: String,
}

/// 发送行（Disparador 行，每个联系人一行）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendRow {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub campanha_id: String,
    #[serde(default, deserialize_with = "deserialize_lenient_string")]
    pub nome: String,
    /// 数字列在部分历史数据里以数字返回
    #[serde(deserialize_with = "deserialize_lenient_string")]
    pub whatsapp: String,
    #[serde(default, deserialize_with = "deserialize_lenient_string")]
    pub cpf: String,
    pub instancia: String,
    #[serde(default, deserialize_with = "deserialize_flexible_bool")]
    pub enviado: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

/// 统计用的精简发送行（只取 instancia / enviado）
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SendStatusRow {
    #[serde(default)]
    pub instancia: Option<String>,
    #[serde(default, deserialize_with = "deserialize_flexible_bool")]
    pub enviado: bool,
}

/// 活动创建结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CampaignCreationReport {
    pub campaign_id: String,
    pub total_contacts: usize,
    pub inserted_rows: usize,
    pub failed_batches: usize,
    pub failed_rows: usize,
    pub instances: Vec<String>,
    pub blocks: Vec<BlockAssignment>,
}

impl CampaignCreationReport {
    pub fn is_complete(&self) -> bool {
        self.failed_batches == 0 && self.inserted_rows == self.total_contacts
    }
}
