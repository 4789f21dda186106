//! 两个入口：后台检查（只算新章节数，需尽快返回）与前台阅读（下载未阅正文）。

use anyhow::{Context, Result};
use tokio::time::Instant;
use tracing::info;

use crate::config::AppConfig;
use crate::crawler::{
    ChapterExtractor, PageFetcher, PageSource, ReconcilerOptions, UpdateReconciler,
};
use crate::models::{NovelCheck, ReadReport, Registry};
use crate::presenter::{Presenter, format_summary};
use crate::storage::{RegistryStore, YamlRegistryStore};

pub type DefaultReconciler = UpdateReconciler<PageFetcher, YamlRegistryStore>;

pub fn build_reconciler(config: &AppConfig) -> Result<DefaultReconciler> {
    let fetcher = PageFetcher::new(config.request_timeout()).context("init http client")?;
    let store = YamlRegistryStore::new(&config.registry_path);
    let extractor = ChapterExtractor::new(&config.layout).context("invalid layout config")?;
    Ok(UpdateReconciler::new(
        fetcher,
        store,
        extractor,
        ReconcilerOptions::from(config),
    ))
}

/// 后台检查：返回更新提示
pub async fn passive_check<P: PageSource, S: RegistryStore>(
    reconciler: &UpdateReconciler<P, S>,
    config: &AppConfig,
) -> Result<(String, Vec<NovelCheck>)> {
    let registry = reconciler
        .load_registry(&config.registry_name)
        .context("load registry")?;
    let deadline = Instant::now() + config.check_deadline();
    let checks = reconciler.check_updates_until(&registry, deadline).await;
    Ok((format_summary(&checks), checks))
}

/// 前台阅读：下载未阅章节，交给 `presenter` 显示，显示成功后才写回已阅章节数
pub async fn active_read<P: PageSource, S: RegistryStore>(
    reconciler: &UpdateReconciler<P, S>,
    config: &AppConfig,
    presenter: &dyn Presenter,
) -> Result<ReadReport> {
    let registry = reconciler
        .load_registry(&config.registry_name)
        .context("load registry")?;
    let report = reconciler
        .gather_unread(&registry)
        .await
        .context("collect unread chapters")?;

    for novel in &report.novels {
        info!(
            "{}: 新增 {} 章, 跳过 {} 个非正文章节, 已阅 {} -> {}",
            novel.label,
            novel.fetched.len(),
            novel.skipped_titles.len(),
            novel.previous_last_seen,
            novel.last_seen
        );
    }

    presenter
        .show_reading(&report.text)
        .context("show unread chapters")?;
    reconciler
        .commit(&report)
        .context("save last seen chapters")?;
    Ok(report)
}

/// 列出追更列表
pub fn format_status(registry: &Registry) -> String {
    let mut lines = vec![format!("追更列表: {}", registry.name)];
    if registry.novels.is_empty() {
        lines.push("  (空)".to_string());
    }
    for (i, novel) in registry.novels.iter().enumerate() {
        lines.push(format!("  ├── {} (已阅 {} 章)", novel.label, novel.last_seen));
        lines.push(format!("  │   ├── 发布页: {}", novel.check_url));
        lines.push(format!("  │   └── 阅读页: {}", novel.read_url));
        if i < registry.novels.len() - 1 {
            lines.push("  │".to_string());
        }
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NovelEntry;

    #[test]
    fn test_format_status() {
        let registry = Registry::new(
            "Novels",
            vec![NovelEntry {
                label: "元尊".to_string(),
                check_url: "https://a.example/1".to_string(),
                read_url: "https://m.a.example/1".to_string(),
                last_seen: 88,
            }],
        );
        let status = format_status(&registry);
        assert!(status.starts_with("追更列表: Novels"));
        assert!(status.contains("元尊 (已阅 88 章)"));
        assert!(status.contains("阅读页: https://m.a.example/1"));

        let empty = format_status(&Registry::new("Novels", Vec::new()));
        assert!(empty.contains("(空)"));
    }
}
