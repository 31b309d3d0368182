//! 水位线存储 - 记录每个来源最后处理过的条目 ID 及其创建时间
//!
//! 只保存在进程内存中，重启后会重新播报每个来源最多一页的近期条目。

use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// 最后见过的条目
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Watermark {
    pub id: String,
    /// 条目被删除、ID 不再出现在 listing 里时，用时间判断新旧
    pub created_at: Option<DateTime<Utc>>,
}

impl Watermark {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            created_at: None,
        }
    }

    pub fn at(id: impl Into<String>, created_at: Option<DateTime<Utc>>) -> Self {
        Self {
            id: id.into(),
            created_at,
        }
    }
}

/// 来源 ID -> 最后见过的条目
#[derive(Debug, Default)]
pub struct WatermarkStore {
    cursors: HashMap<String, Watermark>,
}

impl WatermarkStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// `None` 表示该来源从未成功轮询过
    pub fn get(&self, source_id: &str) -> Option<&str> {
        self.cursors.get(source_id).map(|mark| mark.id.as_str())
    }

    pub fn mark(&self, source_id: &str) -> Option<&Watermark> {
        self.cursors.get(source_id)
    }

    /// 只记录 ID，不带时间
    pub fn set(&mut self, source_id: &str, last_seen_id: impl Into<String>) {
        self.advance(source_id, Watermark::new(last_seen_id));
    }

    pub fn advance(&mut self, source_id: &str, mark: Watermark) {
        self.cursors.insert(source_id.to_string(), mark);
    }

    pub fn len(&self) -> usize {
        self.cursors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cursors.is_empty()
    }
}

/// 组合来源类型和实例标识，得到稳定的来源 ID
pub fn source_key(kind: &str, instance: &str) -> String {
    if instance.is_empty() {
        kind.to_string()
    } else {
        format!("{}:{}", kind, instance)
    }
}
