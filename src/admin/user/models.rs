//! 用户模型

use crate::admin::serialization::deserialize_flexible_bool;
use serde::{Deserialize, Serialize};

pub const ROLE_ADMIN: &str = "admin";
pub const ROLE_OPERATOR: &str = "operador";

fn default_active() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub nome: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default = "default_active", deserialize_with = "deserialize_flexible_bool")]
    pub ativo: bool,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl UserProfile {
    pub fn is_admin(&self) -> bool {
        self.role.as_deref() == Some(ROLE_ADMIN)
    }
}

/// 用户更新（只序列化有值的字段）
#[derive(Debug, Clone, Default, Serialize)]
pub struct UserPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nome: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ativo: Option<bool>,
}

impl UserPatch {
    pub fn is_empty(&self) -> bool {
        self.nome.is_none() && self.role.is_none() && self.ativo.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_active_flag_defaults_to_true() {
        let u: UserProfile =
            serde_json::from_str(r#"{"id":"u1","email":"a@b.c","role":"admin"}"#).unwrap();
        assert!(u.ativo);
        assert!(u.is_admin());

        let u: UserProfile = serde_json::from_str(r#"{"id":"u2","ativo":0}"#).unwrap();
        assert!(!u.ativo);
    }

    #[test]
    fn patch_serializes_only_set_fields() {
        let patch = UserPatch {
            ativo: Some(false),
            ..Default::default()
        };
        assert_eq!(serde_json::to_string(&patch).unwrap(), r#"{"ativo":false}"#);
        assert!(UserPatch::default().is_empty());
    }
}
