//! 发送实例模型定义

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// 发送实例（GupTp 行，`instancia` 非空）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instance {
    pub id: i64,
    /// 发送账号标识
    pub instancia: String,
    #[serde(default)]
    pub grupo: Option<String>,
    /// 星期分类，如 "segunda"
    #[serde(default)]
    pub dia: Option<String>,
    /// 时段分类，如 "manha" / "tarde"
    #[serde(default)]
    pub periodo: Option<String>,
    /// 容量（每日可发送数）
    #[serde(default)]
    pub capacidade: Option<i64>,
    /// 连接状态，如 "conectado"
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, skip_serializing)]
    pub token: Option<String>,
}

impl Instance {
    /// 兜底实例（没有任何实例时使用）
    pub fn fallback(instancia: &str) -> Self {
        Self {
            id: 0,
            instancia: instancia.to_string(),
            grupo: None,
            dia: None,
            periodo: None,
            capacidade: None,
            status: None,
            token: None,
        }
    }

    fn matches(&self, dia: &str, periodo: &str) -> bool {
        fn same(a: &Option<String>, b: &str) -> bool {
            a.as_deref()
                .map(|a| a.trim().eq_ignore_ascii_case(b.trim()))
                .unwrap_or(false)
        }
        same(&self.dia, dia) && same(&self.periodo, periodo)
    }
}

/// 新建实例
#[derive(Debug, Clone, Serialize)]
pub struct NewInstance {
    pub instancia: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grupo: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dia: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub periodo: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capacidade: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

/// 实例更新（只序列化有值的字段）
#[derive(Debug, Clone, Default, Serialize)]
pub struct InstancePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grupo: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dia: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub periodo: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capacidade: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

/// 为活动挑选实例，结果按 id 升序：
/// 1. 与活动 dia + periodo 都匹配的实例；
/// 2. 没有匹配时使用全部实例；
/// 3. 一个实例都没有时使用兜底实例。
pub fn choose_instances(
    all: Vec<Instance>,
    dia: &str,
    periodo: &str,
    fallback_instance: &str,
) -> Vec<Instance> {
    let mut chosen: Vec<Instance> = all
        .iter()
        .filter(|i| i.matches(dia, periodo))
        .cloned()
        .collect();

    if chosen.is_empty() {
        if all.is_empty() {
            warn!(
                "[Instance] ⚠️ 没有任何实例，使用兜底实例: {}",
                fallback_instance
            );
            return vec![Instance::fallback(fallback_instance)];
        }
        info!(
            "[Instance] 没有匹配 {}/{} 的实例，使用全部 {} 个实例",
            dia,
            periodo,
            all.len()
        );
        chosen = all;
    }

    chosen.sort_by_key(|i| i.id);
    chosen
}
