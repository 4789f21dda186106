use serde::{Deserialize, Serialize};

use crate::error::TrackerError;

/// 一本追更的小说
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NovelEntry {
    pub label: String,      // 显示名称，与网址无关
    pub check_url: String,  // 检查更新用的发布页
    pub read_url: String,   // 阅读用的章节列表页
    #[serde(default)]
    pub last_seen: u64, // 已阅章节数
}

/// 按登记顺序排列的追更列表
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registry {
    pub name: String,
    pub novels: Vec<NovelEntry>,
}

impl Registry {
    pub fn new(name: impl Into<String>, novels: Vec<NovelEntry>) -> Self {
        Self {
            name: name.into(),
            novels,
        }
    }

    pub fn last_seen(&self) -> Vec<u64> {
        self.novels.iter().map(|n| n.last_seen).collect()
    }

    /// 生成一份新的快照，已阅章节数替换为 `last_seen`
    ///
    /// 长度不一致时返回 `None`
    pub fn with_last_seen(&self, last_seen: &[u64]) -> Option<Registry> {
        if last_seen.len() != self.novels.len() {
            return None;
        }
        let novels = self
            .novels
            .iter()
            .zip(last_seen)
            .map(|(novel, &chapter)| NovelEntry {
                last_seen: chapter,
                ..novel.clone()
            })
            .collect();
        Some(Registry {
            name: self.name.clone(),
            novels,
        })
    }
}

/// 章节列表中的一项
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterRef {
    pub title: String,
    pub url: String, // 绝对网址
}

/// 检查模式下单本小说的结果
#[derive(Debug, Clone)]
pub struct NovelCheck {
    pub label: String,
    pub outcome: Result<i64, TrackerError>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedChapter {
    pub number: u64,
    pub title: String,
    pub url: String,
}

/// 阅读模式下单本小说的结果
#[derive(Debug, Clone, Default)]
pub struct NovelRead {
    pub label: String,
    pub previous_last_seen: u64,
    pub last_seen: u64,
    pub fetched: Vec<FetchedChapter>,
    pub skipped_titles: Vec<String>, // 非正文章节
    pub failed_chapters: Vec<FetchedChapter>,
    pub error: Option<TrackerError>,
}

/// 一次阅读的完整结果
#[derive(Debug, Clone)]
pub struct ReadReport {
    pub text: String,
    pub registry: Registry,
    pub novels: Vec<NovelRead>,
}
