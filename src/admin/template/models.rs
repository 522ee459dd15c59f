//! 模板集合模型定义

use crate::admin::serialization::deserialize_flexible_bool;
use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

/// 每个集合最多的模板数
pub const MAX_TEMPLATES_PER_SET: usize = 3;

/// 模板集合（GupTp 行）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateSet {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    /// 分组标识
    pub grupo: String,
    /// 集合名称
    #[serde(rename = "nome_conjunto")]
    pub nome: String,
    #[serde(default)]
    pub template_1: Option<String>,
    #[serde(default)]
    pub template_2: Option<String>,
    #[serde(default)]
    pub template_3: Option<String>,
    #[serde(default)]
    pub data_criacao: Option<String>,
    #[serde(default, deserialize_with = "deserialize_flexible_bool")]
    pub ativo: bool,
}

impl TemplateSet {
    /// 非空模板文本
    pub fn templates(&self) -> Vec<&str> {
        [&self.template_1, &self.template_2, &self.template_3]
            .into_iter()
            .filter_map(|t| t.as_deref())
            .filter(|t| !t.trim().is_empty())
            .collect()
    }
}

/// 新建集合的输入
#[derive(Debug, Clone)]
pub struct NewTemplateSet {
    pub nome: String,
    pub textos: Vec<String>,
}

impl NewTemplateSet {
    /// 校验并返回去空白后的模板文本（1~3 条）
    pub fn validated_texts(&self) -> Result<Vec<String>> {
        if self.nome.trim().is_empty() {
            return Err(anyhow!("集合名称不能为空"));
        }
        let texts: Vec<String> = self
            .textos
            .iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
        if texts.is_empty() {
            return Err(anyhow!("至少需要一条模板"));
        }
        if texts.len() > MAX_TEMPLATES_PER_SET {
            return Err(anyhow!(
                "每个集合最多 {} 条模板，实际 {} 条",
                MAX_TEMPLATES_PER_SET,
                texts.len()
            ));
        }
        Ok(texts)
    }
}

/// 集合更新（只序列化有值的字段）
#[derive(Debug, Clone, Default, Serialize)]
pub struct TemplateSetPatch {
    #[serde(rename = "nome_conjunto", skip_serializing_if = "Option::is_none")]
    pub nome: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template_1: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template_2: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template_3: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ativo: Option<bool>,
}
