use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::info;

use crate::models::NovelCheck;

pub const SUMMARY_HEADER: &str = "小说更新情况";

/// 生成更新提示：标题行加每本小说一行
pub fn format_summary(checks: &[NovelCheck]) -> String {
    let mut lines = vec![SUMMARY_HEADER.to_string()];
    for check in checks {
        let line = match &check.outcome {
            Ok(delta) => format!("{}：{}", check.label, delta),
            Err(e) => format!("{}：未知（{}）", check.label, e.short_reason()),
        };
        lines.push(line);
    }
    lines.join("\n")
}

pub trait Presenter {
    /// 常驻的简短提示
    fn show_summary(&self, summary: &str) -> Result<()>;
    /// 可滚动的阅读内容
    fn show_reading(&self, text: &str) -> Result<()>;
}

pub struct ConsolePresenter {
    reading_output: Option<PathBuf>,
}

impl ConsolePresenter {
    pub fn new(reading_output: Option<PathBuf>) -> Self {
        Self { reading_output }
    }
}

impl Presenter for ConsolePresenter {
    fn show_summary(&self, summary: &str) -> Result<()> {
        let mut stdout = io::stdout().lock();
        writeln!(stdout, "{}", summary)?;
        stdout.flush()?;
        Ok(())
    }

    fn show_reading(&self, text: &str) -> Result<()> {
        match &self.reading_output {
            Some(path) => {
                if let Some(parent) = path.parent() {
                    fs::create_dir_all(parent)
                        .with_context(|| format!("create dir {}", parent.display()))?;
                }
                fs::write(path, text).with_context(|| format!("write {}", path.display()))?;
                info!("阅读内容已保存到: {}", path.display());
            }
            None => {
                let mut stdout = io::stdout().lock();
                stdout.write_all(text.as_bytes())?;
                stdout.flush()?;
            }
        }
        Ok(())
    }
}
