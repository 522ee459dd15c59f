//! Mailing 模型定义

use crate::admin::ingest::{digits_only, phone_digits, RawRow};
use serde::{Deserialize, Serialize};

const BENEFIT_KEYS: [&str; 4] = ["nb", "beneficio", "numero_beneficio", "nb_beneficio"];
const DOCUMENT_KEYS: [&str; 4] = ["cpf", "documento", "doc", "cpf_cnpj"];
const NAME_KEYS: [&str; 4] = ["nome", "name", "nome_completo", "cliente"];
const ADDRESS_KEYS: [&str; 3] = ["endereco", "logradouro", "rua"];
const DISTRICT_KEYS: [&str; 1] = ["bairro"];
const CITY_KEYS: [&str; 3] = ["cidade", "municipio", "city"];
const STATE_KEYS: [&str; 3] = ["uf", "estado", "state"];
const ZIP_KEYS: [&str; 2] = ["cep", "zip"];
const PHONE_KEYS: [&str; 10] = [
    "telefone_1", "telefone_2", "telefone_3", "telefone1", "telefone2", "telefone3", "whatsapp",
    "celular", "telefone", "fone",
];
const EMAIL_KEYS: [&str; 6] = ["email_1", "email_2", "email1", "email2", "email", "e_mail"];

/// 每条记录最多保存的手机号 / 邮箱数量
const MAX_PHONES: usize = 3;
const MAX_EMAILS: usize = 2;

/// Global 表中的一条联系人记录
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailingContact {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    /// 福利编号
    #[serde(default)]
    pub nb: Option<String>,
    #[serde(default)]
    pub cpf: Option<String>,
    #[serde(default)]
    pub nome: Option<String>,
    #[serde(default)]
    pub endereco: Option<String>,
    #[serde(default)]
    pub bairro: Option<String>,
    #[serde(default)]
    pub cidade: Option<String>,
    #[serde(default)]
    pub uf: Option<String>,
    #[serde(default)]
    pub cep: Option<String>,
    #[serde(default)]
    pub telefone_1: Option<String>,
    #[serde(default)]
    pub telefone_2: Option<String>,
    #[serde(default)]
    pub telefone_3: Option<String>,
    #[serde(default)]
    pub email_1: Option<String>,
    #[serde(default)]
    pub email_2: Option<String>,
    /// 来源标签（一次导入一个标签）
    #[serde(default)]
    pub origem: String,
}

impl MailingContact {
    /// 表格行 → 记录；没有姓名、证件号和手机号的行返回 None
    pub fn from_row(row: &RawRow, origem: &str) -> Option<Self> {
        let text = |keys: &[&str]| row.get(keys).map(str::to_string);

        let mut phones: Vec<String> = Vec::new();
        for key in PHONE_KEYS {
            if let Some(phone) = row.get(&[key]).and_then(phone_digits) {
                if !phones.contains(&phone) {
                    phones.push(phone);
                }
            }
        }
        phones.truncate(MAX_PHONES);

        let mut emails: Vec<String> = Vec::new();
        for key in EMAIL_KEYS {
            if let Some(email) = row.get(&[key]).filter(|e| e.contains('@')) {
                let email = email.to_lowercase();
                if !emails.contains(&email) {
                    emails.push(email);
                }
            }
        }
        emails.truncate(MAX_EMAILS);

        let contact = Self {
            id: None,
            nb: text(&BENEFIT_KEYS),
            cpf: row
                .get(&DOCUMENT_KEYS)
                .map(digits_only)
                .filter(|d| !d.is_empty()),
            nome: text(&NAME_KEYS),
            endereco: text(&ADDRESS_KEYS),
            bairro: text(&DISTRICT_KEYS),
            cidade: text(&CITY_KEYS),
            uf: text(&STATE_KEYS).map(|uf| uf.to_uppercase()),
            cep: row.get(&ZIP_KEYS).map(digits_only).filter(|d| !d.is_empty()),
            telefone_1: phones.first().cloned(),
            telefone_2: phones.get(1).cloned(),
            telefone_3: phones.get(2).cloned(),
            email_1: emails.first().cloned(),
            email_2: emails.get(1).cloned(),
            origem: origem.to_string(),
        };

        if contact.nome.is_none() && contact.cpf.is_none() && contact.telefone_1.is_none() {
            return None;
        }
        Some(contact)
    }

    /// 裸行（只有手机号）→ 记录
    pub fn from_phone_line(line: &str, origem: &str) -> Option<Self> {
        phone_digits(line).map(|phone| Self {
            telefone_1: Some(phone),
            origem: origem.to_string(),
            ..Default::default()
        })
    }

    pub fn phones(&self) -> Vec<&str> {
        [&self.telefone_1, &self.telefone_2, &self.telefone_3]
            .into_iter()
            .filter_map(|p| p.as_deref())
            .collect()
    }
}

/// 导入结果
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MailingImportReport {
    pub origem: String,
    pub total_rows: usize,
    pub skipped_rows: usize,
    pub inserted: usize,
    pub failed_batches: usize,
    pub failed_rows: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct OriginRow {
    #[serde(default)]
    pub origem: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(fields: &[(&str, &str)]) -> RawRow {
        RawRow::new(
            fields
                .iter()
                .map(|(h, v)| (h.to_string(), v.to_string()))
                .collect(),
        )
    }

    #[test]
    fn maps_wide_spreadsheet_row() {
        let r = row(&[
            ("NB", "1234567890"),
            ("CPF", "123.456.789-09"),
            ("Nome", "Maria Souza"),
            ("Endereço", "Rua A, 10"),
            ("Cidade", "Recife"),
            ("UF", "pe"),
            ("CEP", "50000-000"),
            ("Telefone 1", "(81) 99999-0000"),
            ("Telefone 2", "81 99999-0000"),
            ("Celular", "81 98888-1111"),
            ("E-mail", "MARIA@EXEMPLO.COM"),
        ]);
        let c = MailingContact::from_row(&r, "lote-janeiro").unwrap();
        assert_eq!(c.nb.as_deref(), Some("1234567890"));
        assert_eq!(c.cpf.as_deref(), Some("12345678909"));
        assert_eq!(c.endereco.as_deref(), Some("Rua A, 10"));
        assert_eq!(c.uf.as_deref(), Some("PE"));
        assert_eq!(c.cep.as_deref(), Some("50000000"));
        assert_eq!(c.phones(), vec!["81999990000", "81988881111"]);
        assert_eq!(c.email_1.as_deref(), Some("maria@exemplo.com"));
        assert_eq!(c.origem, "lote-janeiro");
    }

    #[test]
    fn row_without_identity_is_skipped() {
        let r = row(&[("Cidade", "Recife"), ("Telefone", "123")]);
        assert!(MailingContact::from_row(&r, "x").is_none());
    }

    #[test]
    fn bare_phone_line() {
        let c = MailingContact::from_phone_line("+55 (11) 91234-5678", "txt").unwrap();
        assert_eq!(c.telefone_1.as_deref(), Some("5511912345678"));
        assert!(MailingContact::from_phone_line("abc", "txt").is_none());
    }
}
