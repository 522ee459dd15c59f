//! 联系人文件解析（CSV / TXT / XLSX → 标准化联系人列表）
//!
//! 规则：
//! - XLSX：取第一个工作表，首行为表头，其余每行一条记录。
//! - CSV / TXT：按行切分。首行含逗号且不止一行时按"表头 + 数据"解析，
//!   否则每个非空行都当作一个裸手机号。
//! - 手机号：去掉非数字字符后位数 ≥ 8 即视为手机号。
//! - 缺省值：没有姓名用 `Contato {n}`，没有证件号用 `-`。
//!
//! 解析是字节输入的纯函数，同一文件重复解析结果一致。

use serde::{Deserialize, Serialize};
use std::io::Cursor;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info, warn};

/// 手机号最少位数
pub const MIN_PHONE_DIGITS: usize = 8;

/// 缺少证件号时的占位符
pub const MISSING_DOCUMENT: &str = "-";

/// 识别为姓名列的表头（已规范化）
const NAME_KEYS: [&str; 6] = ["nome", "name", "nome_completo", "contato", "cliente", "razao_social"];

/// 识别为手机号列的表头，按优先级排列
const PHONE_KEYS: [&str; 9] = [
    "whatsapp", "celular", "telefone", "phone", "fone", "numero", "tel", "telefone1", "celular1",
];

/// 识别为证件号列的表头
const DOCUMENT_KEYS: [&str; 5] = ["cpf", "documento", "doc", "cpf_cnpj", "cnpj"];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IngestError {
    #[error("不支持的文件格式: {0}（仅支持 .csv / .txt / .xlsx）")]
    UnsupportedFormat(String),
    #[error("无法读取工作簿: {0}")]
    Workbook(String),
    #[error("工作表为空")]
    EmptySheet,
    #[error("文件中没有有效的联系人")]
    NoValidContacts,
}

/// 文件容器格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Xlsx,
    Delimited,
}

/// 待解析的上传文件
#[derive(Debug, Clone)]
pub struct ContactFile {
    pub file_name: String,
    pub mime_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl ContactFile {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            mime_type: None,
            bytes,
        }
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    /// 从磁盘读取
    pub async fn read(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        use anyhow::Context;
        let path = path.as_ref();
        let bytes = tokio::fs::read(path)
            .await
            .context(format!("读取文件失败: {}", path.display()))?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self::new(file_name, bytes))
    }
}

/// 标准化联系人
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    #[serde(rename = "Nome")]
    pub nome: String,
    #[serde(rename = "Whatsapp")]
    pub whatsapp: String,
    #[serde(rename = "Cpf")]
    pub cpf: String,
}

/// 保留列顺序的一行原始数据（表头 → 值）
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRow {
    fields: Vec<(String, String)>,
}

impl RawRow {
    pub fn new(fields: Vec<(String, String)>) -> Self {
        Self { fields }
    }

    pub fn fields(&self) -> &[(String, String)] {
        &self.fields
    }

    /// 按候选表头（规范化后比较）取第一个非空值
    pub fn get(&self, keys: &[&str]) -> Option<&str> {
        keys.iter().find_map(|key| {
            self.fields
                .iter()
                .find(|(h, v)| normalize_header(h) == *key && !v.trim().is_empty())
                .map(|(_, v)| v.trim())
        })
    }

    fn is_empty(&self) -> bool {
        self.fields.iter().all(|(_, v)| v.trim().is_empty())
    }
}

/// 解析结果：带表头的表格，或裸行
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedRows {
    Table(Vec<RawRow>),
    BareLines(Vec<String>),
}

/// 表头规范化：去空白、小写、去葡语重音，空格/连字符/点转下划线
pub fn normalize_header(header: &str) -> String {
    header
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| match c {
            'á' | 'à' | 'â' | 'ã' | 'ä' => 'a',
            'é' | 'è' | 'ê' | 'ë' => 'e',
            'í' | 'ì' | 'î' | 'ï' => 'i',
            'ó' | 'ò' | 'ô' | 'õ' | 'ö' => 'o',
            'ú' | 'ù' | 'û' | 'ü' => 'u',
            'ç' => 'c',
            ' ' | '-' | '.' => '_',
            other => other,
        })
        .collect()
}

/// 只保留数字
pub fn digits_only(value: &str) -> String {
    value.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// 若字段像手机号则返回其数字串
pub fn phone_digits(value: &str) -> Option<String> {
    let digits = digits_only(value);
    (digits.len() >= MIN_PHONE_DIGITS).then_some(digits)
}

/// 判断容器格式：扩展名优先，扩展名未知时才看 MIME
///
/// Windows 浏览器上传 .csv 时 MIME 常是 `application/vnd.ms-excel`，不能据此当作工作簿。
pub fn detect_format(file_name: &str, mime_type: Option<&str>) -> Result<FileFormat, IngestError> {
    let extension = Path::new(file_name)
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase());
    match extension.as_deref() {
        Some("xlsx") => return Ok(FileFormat::Xlsx),
        Some("csv") | Some("txt") => return Ok(FileFormat::Delimited),
        _ => {}
    }

    let mime = mime_type.unwrap_or_default().to_ascii_lowercase();
    if mime.contains("spreadsheetml") {
        return Ok(FileFormat::Xlsx);
    }
    if mime.starts_with("text/") || mime == "application/csv" {
        return Ok(FileFormat::Delimited);
    }
    Err(IngestError::UnsupportedFormat(file_name.to_string()))
}

/// 解析文件为原始行（联系人与 mailing 导入共用）
pub fn parse_rows(file: &ContactFile) -> Result<ParsedRows, IngestError> {
    match detect_format(&file.file_name, file.mime_type.as_deref())? {
        FileFormat::Xlsx => read_xlsx_rows(&file.bytes).map(ParsedRows::Table),
        FileFormat::Delimited => Ok(read_delimited(&file.bytes)),
    }
}

/// 解析文件为联系人列表
pub fn parse_contacts(file: &ContactFile) -> Result<Vec<Contact>, IngestError> {
    let contacts = match parse_rows(file)? {
        ParsedRows::Table(rows) => contacts_from_rows(&rows),
        ParsedRows::BareLines(lines) => contacts_from_lines(&lines),
    };
    if contacts.is_empty() {
        warn!("[Ingest] ⚠️ 文件 {} 中没有有效联系人", file.file_name);
        return Err(IngestError::NoValidContacts);
    }
    info!(
        "[Ingest] ✅ 文件 {} 解析完成，有效联系人: {}",
        file.file_name,
        contacts.len()
    );
    Ok(contacts)
}

/// 表格行 → 联系人；没有手机号的行跳过
pub fn contacts_from_rows(rows: &[RawRow]) -> Vec<Contact> {
    let mut contacts = Vec::with_capacity(rows.len());
    for (line, row) in rows.iter().enumerate() {
        let Some(whatsapp) = find_phone(row) else {
            debug!("[Ingest] 第 {} 行没有手机号，跳过", line + 2);
            continue;
        };
        let nome = row
            .get(&NAME_KEYS)
            .map(str::to_string)
            .unwrap_or_else(|| format!("Contato {}", contacts.len() + 1));
        let cpf = row
            .get(&DOCUMENT_KEYS)
            .map(str::to_string)
            .unwrap_or_else(|| MISSING_DOCUMENT.to_string());
        contacts.push(Contact {
            nome,
            whatsapp,
            cpf,
        });
    }
    contacts
}

/// 裸行 → 联系人
pub fn contacts_from_lines(lines: &[String]) -> Vec<Contact> {
    let mut contacts = Vec::with_capacity(lines.len());
    for line in lines {
        if let Some(whatsapp) = phone_digits(line) {
            contacts.push(Contact {
                nome: format!("Contato {}", contacts.len() + 1),
                whatsapp,
                cpf: MISSING_DOCUMENT.to_string(),
            });
        }
    }
    contacts
}

/// 先查已知手机号列，再按列顺序扫描其它非证件、非姓名列
fn find_phone(row: &RawRow) -> Option<String> {
    for key in PHONE_KEYS {
        if let Some(phone) = row.get(&[key]).and_then(phone_digits) {
            return Some(phone);
        }
    }
    row.fields()
        .iter()
        .filter(|(h, _)| {
            let h = normalize_header(h);
            !DOCUMENT_KEYS.contains(&h.as_str()) && !NAME_KEYS.contains(&h.as_str())
        })
        .find_map(|(_, v)| phone_digits(v))
}

fn read_delimited(bytes: &[u8]) -> ParsedRows {
    let text = String::from_utf8_lossy(bytes);
    let text = text.trim_start_matches('\u{feff}');
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();

    let header_mode = lines.len() > 1 && lines[0].contains(',');
    if !header_mode {
        debug!("[Ingest] 纯文本模式，共 {} 行", lines.len());
        return ParsedRows::BareLines(lines.into_iter().map(str::to_string).collect());
    }

    let joined = lines.join("\n");
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(joined.as_bytes());

    let headers: Vec<String> = match reader.headers() {
        Ok(h) => h
            .iter()
            .enumerate()
            .map(|(i, name)| header_or_placeholder(name, i))
            .collect(),
        Err(e) => {
            warn!("[Ingest] ⚠️ 表头解析失败，按纯文本处理: {}", e);
            return ParsedRows::BareLines(lines.into_iter().map(str::to_string).collect());
        }
    };

    let mut rows = Vec::new();
    for (index, record) in reader.records().enumerate() {
        match record {
            Ok(record) => {
                let row = RawRow::new(
                    headers
                        .iter()
                        .cloned()
                        .zip(record.iter().map(str::to_string))
                        .collect(),
                );
                if !row.is_empty() {
                    rows.push(row);
                }
            }
            Err(e) => warn!("[Ingest] ⚠️ 第 {} 行解析失败，跳过: {}", index + 2, e),
        }
    }
    debug!("[Ingest] 表格模式，表头: {:?}，数据行: {}", headers, rows.len());
    ParsedRows::Table(rows)
}

fn header_or_placeholder(name: &str, index: usize) -> String {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        format!("coluna_{}", index + 1)
    } else {
        trimmed.to_string()
    }
}

fn cell_to_string(cell: &calamine::Data) -> String {
    use calamine::Data;
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        // 手机号在表格里常被存成浮点数，整数值去掉小数部分
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        Data::Float(f) => f.to_string(),
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}

fn read_xlsx_rows(bytes: &[u8]) -> Result<Vec<RawRow>, IngestError> {
    use calamine::{Reader, Xlsx};

    let mut workbook: Xlsx<_> = Xlsx::new(Cursor::new(bytes.to_vec()))
        .map_err(|e| IngestError::Workbook(e.to_string()))?;
    let first_sheet = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or(IngestError::EmptySheet)?;
    let range = workbook
        .worksheet_range(&first_sheet)
        .map_err(|e| IngestError::Workbook(e.to_string()))?;

    let mut sheet_rows = range.rows();
    let headers: Vec<String> = sheet_rows
        .next()
        .ok_or(IngestError::EmptySheet)?
        .iter()
        .enumerate()
        .map(|(i, cell)| header_or_placeholder(&cell_to_string(cell), i))
        .collect();

    let rows: Vec<RawRow> = sheet_rows
        .map(|cells| {
            RawRow::new(
                headers
                    .iter()
                    .cloned()
                    .zip(cells.iter().map(cell_to_string))
                    .collect(),
            )
        })
        .filter(|row| !row.is_empty())
        .collect();

    debug!(
        "[Ingest] 工作表 {} 表头: {:?}，数据行: {}",
        first_sheet,
        headers,
        rows.len()
    );
    Ok(rows)
}
