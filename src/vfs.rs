//! 虚拟文件集合：由目录条目合成 `.strm` 指针文件。

use chrono::{DateTime, Utc};
use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

use crate::provider::catalog::{LinkRecord, UNRESOLVED_URL};

pub const POINTER_EXTENSION: &str = ".strm";
pub const POINTER_CONTENT_TYPE: &str = "text/plain; charset=utf-8";

static POINTER_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{hash-([^}]+)\}\{imdb-([^}]+)\}\.strm$").expect("valid pointer filename pattern")
});

/// 指针文件内容：直链或待解析。
#[derive(Clone, Debug, PartialEq)]
pub enum PointerContent {
    Direct(String),
    Deferred,
}

/// 一个虚拟 `.strm` 文件。
#[derive(Clone, Debug, PartialEq)]
pub struct VirtualFile {
    pub name: String,
    pub content: PointerContent,
    pub last_modified: DateTime<Utc>,
    pub hash: String,
    pub imdb_id: String,
    pub original_filename: String,
}

impl VirtualFile {
    /// 列表阶段可见的内容；待解析文件返回占位符。
    pub fn payload(&self) -> &str {
        match &self.content {
            PointerContent::Direct(url) => url,
            PointerContent::Deferred => UNRESOLVED_URL,
        }
    }

    pub fn content_length(&self) -> u64 {
        self.payload().len() as u64
    }

    pub fn content_type(&self) -> &'static str {
        POINTER_CONTENT_TYPE
    }
}

impl From<&LinkRecord> for VirtualFile {
    fn from(record: &LinkRecord) -> Self {
        let content = match &record.url {
            Some(url) => PointerContent::Direct(url.clone()),
            None => PointerContent::Deferred,
        };
        Self {
            name: record.strm_filename.clone(),
            content,
            last_modified: record.updated_at,
            hash: record.hash.clone(),
            imdb_id: record.imdb_id.clone(),
            original_filename: record.filename.clone(),
        }
    }
}

#[derive(PartialEq, Eq, Hash)]
enum DedupKey<'a> {
    Identity(&'a str, &'a str),
    Name(&'a str),
}

/// 文件名编码的是 (hash, imdb)，有 hash 时按该身份去重，否则按文件名。
fn dedup_key(record: &LinkRecord) -> DedupKey<'_> {
    if record.hash.is_empty() {
        DedupKey::Name(&record.strm_filename)
    } else {
        DedupKey::Identity(&record.hash, &record.imdb_id)
    }
}

/// 合成去重后的虚拟文件，冲突时保留更新时间较新的条目；输出保持首次出现的顺序。
pub fn synthesize(records: &[LinkRecord]) -> Vec<VirtualFile> {
    let mut files: Vec<VirtualFile> = Vec::with_capacity(records.len());
    let mut index: HashMap<DedupKey<'_>, usize> = HashMap::with_capacity(records.len());

    for record in records {
        match index.get(&dedup_key(record)) {
            Some(&slot) => {
                if record.updated_at > files[slot].last_modified {
                    files[slot] = VirtualFile::from(record);
                }
            }
            None => {
                index.insert(dedup_key(record), files.len());
                files.push(VirtualFile::from(record));
            }
        }
    }

    files
}

/// `<文件名>{hash-<hash>}{imdb-<id>}.strm`
pub fn pointer_filename(filename: &str, hash: &str, imdb_id: &str) -> String {
    format!("{filename}{{hash-{hash}}}{{imdb-{imdb_id}}}{POINTER_EXTENSION}")
}

/// 从已解码的指针文件名中取出 (hash, imdb)。
pub fn parse_pointer_filename(name: &str) -> Option<(String, String)> {
    let captures = POINTER_PATTERN.captures(name)?;
    Some((captures[1].to_string(), captures[2].to_string()))
}

pub fn is_pointer_filename(name: &str) -> bool {
    name.ends_with(POINTER_EXTENSION)
}

/// 百分号编码文件名，但保留字面量 `{` 与 `}`。
pub fn encode_href_name(name: &str) -> String {
    urlencoding::encode(name)
        .replace("%7B", "{")
        .replace("%7D", "}")
}
