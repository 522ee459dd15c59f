//! Mailing HTTP API（Global 表）

use crate::admin::ingest::{parse_rows, ContactFile, IngestError, ParsedRows};
use crate::admin::mailing::models::{MailingContact, MailingImportReport, OriginRow};
use crate::admin::rest::{Query, RestClient};
use crate::admin::types::Page;
use anyhow::{anyhow, Result};
use std::collections::BTreeSet;
use tracing::{error, info};

/// 拉取来源标签时的分页大小
const ORIGIN_PAGE_SIZE: u64 = 1000;

#[derive(Clone)]
pub struct MailingApi {
    rest: RestClient,
    table: String,
    batch_size: usize,
}

impl MailingApi {
    pub fn new(rest: RestClient, table: String, batch_size: usize) -> Self {
        Self {
            rest,
            table,
            batch_size: batch_size.max(1),
        }
    }

    /// 文件 → 记录列表（不访问网络）
    pub fn parse_file(
        file: &ContactFile,
        origem: &str,
    ) -> Result<(Vec<MailingContact>, usize), IngestError> {
        let (records, total): (Vec<MailingContact>, usize) = match parse_rows(file)? {
            ParsedRows::Table(rows) => (
                rows.iter()
                    .filter_map(|r| MailingContact::from_row(r, origem))
                    .collect(),
                rows.len(),
            ),
            ParsedRows::BareLines(lines) => (
                lines
                    .iter()
                    .filter_map(|l| MailingContact::from_phone_line(l, origem))
                    .collect(),
                lines.len(),
            ),
        };
        if records.is_empty() {
            return Err(IngestError::NoValidContacts);
        }
        Ok((records, total))
    }

    /// 导入文件到 Global 表，分批写入；失败批次计数后继续
    pub async fn import_mailing(
        &self,
        file: &ContactFile,
        origem: &str,
    ) -> Result<MailingImportReport> {
        let origem = origem.trim();
        if origem.is_empty() {
            return Err(anyhow!("来源标签不能为空"));
        }
        let (records, total_rows) = Self::parse_file(file, origem)?;

        let mut report = MailingImportReport {
            origem: origem.to_string(),
            total_rows,
            skipped_rows: total_rows - records.len(),
            ..Default::default()
        };
        for (index, batch) in records.chunks(self.batch_size).enumerate() {
            match self.rest.insert_silent(&self.table, batch).await {
                Ok(()) => report.inserted += batch.len(),
                Err(e) => {
                    report.failed_batches += 1;
                    report.failed_rows += batch.len();
                    error!("[Mailing] ❌ 第 {} 批导入失败: {e:#}", index + 1);
                }
            }
        }

        info!(
            "[Mailing] ✅ 导入 {} 完成：写入 {}，跳过 {}，失败 {}",
            origem, report.inserted, report.skipped_rows, report.failed_rows
        );
        Ok(report)
    }

    pub async fn list_by_origin(&self, origem: &str, page: Page) -> Result<Vec<MailingContact>> {
        self.rest
            .select(
                &self.table,
                &Query::new()
                    .select("*")
                    .eq("origem", origem)
                    .order("id", true)
                    .page(page),
            )
            .await
    }

    /// 所有来源标签（去重、排序）
    pub async fn list_origins(&self) -> Result<Vec<String>> {
        let mut origins = BTreeSet::new();
        let mut offset = 0u64;
        loop {
            let rows: Vec<OriginRow> = self
                .rest
                .select(
                    &self.table,
                    &Query::new()
                        .select("origem")
                        .order("origem", true)
                        .offset(offset)
                        .limit(ORIGIN_PAGE_SIZE),
                )
                .await?;
            let fetched = rows.len() as u64;
            origins.extend(rows.into_iter().filter_map(|r| r.origem));
            if fetched < ORIGIN_PAGE_SIZE {
                break;
            }
            offset += ORIGIN_PAGE_SIZE;
        }
        Ok(origins.into_iter().collect())
    }

    pub async fn count_by_origin(&self, origem: &str) -> Result<u64> {
        self.rest
            .count(&self.table, &Query::new().eq("origem", origem))
            .await
    }

    pub async fn delete_by_origin(&self, origem: &str) -> Result<()> {
        if origem.trim().is_empty() {
            return Err(anyhow!("来源标签不能为空"));
        }
        self.rest
            .delete(&self.table, &Query::new().eq("origem", origem))
            .await?;
        info!("[Mailing] 🗑️ 来源 {} 已删除", origem);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn api(url: String) -> MailingApi {
        let rest = RestClient::new(reqwest::Client::new(), url, "anon".into());
        MailingApi::new(rest, "Global".into(), 2)
    }

    #[tokio::test]
    async fn import_inserts_in_batches_and_skips_empty_rows() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/rest/v1/Global")
            .match_body(Matcher::Regex(r#""origem":"lote-1""#.into()))
            .with_status(201)
            .expect(2)
            .create_async()
            .await;

        let csv = "nome,cpf,telefone\nAna,111.222.333-44,11 91234-5678\nBia,,11 99876-5432\n,,\nCaio,555,\n";
        let file = ContactFile::new("base.csv", csv.as_bytes().to_vec());
        let report = api(server.url()).import_mailing(&file, "lote-1").await.unwrap();

        assert_eq!(report.inserted, 3);
        assert_eq!(report.failed_batches, 0);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn unreadable_file_fails_before_any_request() {
        let server = mockito::Server::new_async().await;
        let file = ContactFile::new("base.pdf", vec![1, 2, 3]);
        assert!(api(server.url()).import_mailing(&file, "x").await.is_err());
    }

    #[tokio::test]
    async fn origins_are_deduplicated() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/rest/v1/Global")
            .match_query(Matcher::UrlEncoded("select".into(), "origem".into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"[{"origem":"a"},{"origem":"a"},{"origem":null},{"origem":"b"}]"#)
            .create_async()
            .await;

        assert_eq!(api(server.url()).list_origins().await.unwrap(), vec!["a", "b"]);
        mock.assert_async().await;
    }
}
