pub mod downloader;
pub mod extractor;

pub use downloader::{Page, PageFetcher, PageSource, UserAgentProfile};
pub use extractor::{
    ChapterExtractor, ExtractMode, Extraction, IndicatorRule, LayoutError, SiteLayout,
    find_chapter_numeral, parse_title_number,
};

use std::collections::HashSet;

use tokio::time::{Instant, timeout_at};
use tracing::{debug, info, warn};

use crate::config::AppConfig;
use crate::error::TrackerError;
use crate::models::{FetchedChapter, NovelCheck, NovelEntry, NovelRead, ReadReport, Registry};
use crate::numeral;
use crate::storage::{RegistryStore, StoreError};

#[derive(Debug, Clone)]
pub struct ReconcilerOptions {
    pub check_encoding: String,
    pub read_encoding: String,
    pub reverse_chapter_list: bool,
}

impl Default for ReconcilerOptions {
    fn default() -> Self {
        Self {
            check_encoding: "utf-8".to_string(),
            read_encoding: "utf-8".to_string(),
            reverse_chapter_list: true,
        }
    }
}

impl From<&AppConfig> for ReconcilerOptions {
    fn from(config: &AppConfig) -> Self {
        Self {
            check_encoding: config.check_encoding.clone(),
            read_encoding: config.read_encoding.clone(),
            reverse_chapter_list: config.reverse_chapter_list,
        }
    }
}

/// 逐本对比最新章节与已阅章节
pub struct UpdateReconciler<P, S> {
    source: P,
    store: S,
    extractor: ChapterExtractor,
    options: ReconcilerOptions,
}

impl<P: PageSource, S: RegistryStore> UpdateReconciler<P, S> {
    pub fn new(
        source: P,
        store: S,
        extractor: ChapterExtractor,
        options: ReconcilerOptions,
    ) -> Self {
        Self {
            source,
            store,
            extractor,
            options,
        }
    }

    pub fn source(&self) -> &P {
        &self.source
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn load_registry(&self, name: &str) -> Result<Registry, StoreError> {
        self.store.load_registry(name)
    }

    /// 新章节数 = 发布页最新章节数 - 已阅章节数，可能为负
    pub async fn check_novel(&self, novel: &NovelEntry) -> Result<i64, TrackerError> {
        let page = self
            .source
            .fetch(
                &novel.check_url,
                UserAgentProfile::Mobile,
                &self.options.check_encoding,
            )
            .await;

        let numeral = self
            .extractor
            .chapter_numeral(&page, &novel.check_url)
            .map_err(|e| TrackerError::from_extract(e, &novel.check_url))?;
        let newest = numeral::convert(&numeral)?;

        let newest = i64::try_from(newest).unwrap_or(i64::MAX);
        let last_seen = i64::try_from(novel.last_seen).unwrap_or(i64::MAX);
        Ok(newest.saturating_sub(last_seen))
    }

    /// 检查更新，不修改已阅章节数
    pub async fn check_updates(&self, registry: &Registry) -> Vec<NovelCheck> {
        self.check_each(registry, None).await
    }

    /// 同 [`check_updates`](Self::check_updates)，超过 `deadline` 后其余小说记为超时
    pub async fn check_updates_until(
        &self,
        registry: &Registry,
        deadline: Instant,
    ) -> Vec<NovelCheck> {
        self.check_each(registry, Some(deadline)).await
    }

    async fn check_each(&self, registry: &Registry, deadline: Option<Instant>) -> Vec<NovelCheck> {
        let mut checks = Vec::with_capacity(registry.novels.len());

        for novel in &registry.novels {
            let outcome = match deadline {
                Some(deadline) => timeout_at(deadline, self.check_novel(novel))
                    .await
                    .unwrap_or(Err(TrackerError::Timeout)),
                None => self.check_novel(novel).await,
            };
            match &outcome {
                Ok(delta) => info!("{}: {} 个新章节", novel.label, delta),
                Err(e) => warn!("{} 检查失败: {}", novel.label, e),
            }
            checks.push(NovelCheck {
                label: novel.label.clone(),
                outcome,
            });
        }

        checks
    }

    /// 下载单本小说的未阅章节，返回处理结果和拼好的正文
    async fn read_novel(&self, novel: &NovelEntry) -> (NovelRead, String) {
        let baseline = novel.last_seen;
        let mut read = NovelRead {
            label: novel.label.clone(),
            previous_last_seen: baseline,
            last_seen: baseline,
            ..NovelRead::default()
        };
        let mut text = format!("----{}----\n", novel.label);

        let page = self
            .source
            .fetch(
                &novel.read_url,
                UserAgentProfile::Mobile,
                &self.options.read_encoding,
            )
            .await;
        let mut chapters = match self.extractor.chapter_links(&page) {
            Ok(chapters) => chapters,
            Err(e) => {
                let err = TrackerError::from_extract(e, &novel.read_url);
                warn!("{} 获取章节列表失败: {}", novel.label, err);
                read.error = Some(err);
                return (read, text);
            }
        };

        if self.options.reverse_chapter_list {
            chapters.reverse();
        }

        let mut seen = HashSet::new();
        let mut lowest_failure: Option<u64> = None;

        for chapter in chapters {
            let Some(number) = parse_title_number(&chapter.title) else {
                debug!("{}: '{}' 非正文章节", novel.label, chapter.title);
                read.skipped_titles.push(chapter.title);
                continue;
            };
            if number <= baseline || !seen.insert(number) {
                continue;
            }

            // 正文页用桌面版页面
            let page = self
                .source
                .fetch(
                    &chapter.url,
                    UserAgentProfile::Desktop,
                    &self.options.read_encoding,
                )
                .await;
            let fetched = FetchedChapter {
                number,
                title: chapter.title,
                url: chapter.url,
            };

            match self.extractor.article_text(&page) {
                Ok(body) => {
                    text.push_str(&fetched.title);
                    text.push_str("\n\n");
                    text.push_str(&body);
                    text.push_str("\n\n");
                    info!("{}: 已获取 {}", novel.label, fetched.title);
                    read.fetched.push(fetched);
                }
                Err(e) => {
                    warn!("{}: 获取 '{}' 正文失败: {}", novel.label, fetched.title, e);
                    lowest_failure = Some(lowest_failure.map_or(number, |n| n.min(number)));
                    read.failed_chapters.push(fetched);
                }
            }
        }

        // 不越过获取失败的章节
        read.last_seen = read
            .fetched
            .iter()
            .map(|c| c.number)
            .filter(|&n| lowest_failure.is_none_or(|failed| n < failed))
            .max()
            .map_or(baseline, |n| n.max(baseline));

        (read, text)
    }

    /// 获取所有小说的未阅章节，不写回已阅章节数
    pub async fn gather_unread(&self, registry: &Registry) -> Result<ReadReport, StoreError> {
        let mut text = String::new();
        let mut novels = Vec::with_capacity(registry.novels.len());

        for novel in &registry.novels {
            let (read, block) = self.read_novel(novel).await;
            text.push_str(&block);
            novels.push(read);
        }

        let last_seen: Vec<u64> = novels.iter().map(|r| r.last_seen).collect();
        let snapshot = registry
            .with_last_seen(&last_seen)
            .ok_or(StoreError::Misaligned {
                expected: registry.novels.len(),
                actual: last_seen.len(),
            })?;

        Ok(ReadReport {
            text,
            registry: snapshot,
            novels,
        })
    }

    /// 整批写回 `report` 中的已阅章节数
    pub fn commit(&self, report: &ReadReport) -> Result<(), StoreError> {
        let last_seen = report.registry.last_seen();
        self.store.save_last_seen(&report.registry.name, &last_seen)?;
        info!("已阅章节数已更新: {:?}", last_seen);
        Ok(())
    }

    /// [`gather_unread`](Self::gather_unread) 后立即 [`commit`](Self::commit)
    pub async fn collect_unread(&self, registry: &Registry) -> Result<ReadReport, StoreError> {
        let report = self.gather_unread(registry).await?;
        self.commit(&report)?;
        Ok(report)
    }
}
