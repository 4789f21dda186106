//! 配置文件读写。
//!
//! 配置文件不存在时按默认值生成（带注释）；已有配置中缺少的字段用默认值补齐。

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use thiserror::Error;

use crate::crawler::SiteLayout;

pub const CONFIG_FILE_NAME: &str = "novel-watch.yml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error at {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("invalid yaml at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },
    #[error("validation error: {0}")]
    Validation(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub registry_name: String,
    pub registry_path: PathBuf,
    pub request_timeout_secs: u64,
    pub check_deadline_secs: u64,
    pub check_encoding: String,
    pub read_encoding: String,
    pub reverse_chapter_list: bool,
    pub read_output: Option<PathBuf>,
    pub log_to_file: bool,
    pub layout: SiteLayout,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            registry_name: "Novels".to_string(),
            registry_path: PathBuf::from("novels.yml"),
            request_timeout_secs: 15,
            check_deadline_secs: 60,
            check_encoding: "utf-8".to_string(),
            read_encoding: "utf-8".to_string(),
            reverse_chapter_list: true,
            read_output: None,
            log_to_file: false,
            layout: SiteLayout::default(),
        }
    }
}

impl AppConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn check_deadline(&self) -> Duration {
        Duration::from_secs(self.check_deadline_secs)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.registry_name.trim().is_empty() {
            return Err(ConfigError::Validation("registry_name 不能为空".to_string()));
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "request_timeout_secs 必须大于 0".to_string(),
            ));
        }
        if self.check_deadline_secs == 0 {
            return Err(ConfigError::Validation(
                "check_deadline_secs 必须大于 0".to_string(),
            ));
        }
        Ok(())
    }
}

const FIELD_DESCRIPTIONS: &[(&str, &str)] = &[
    ("registry_name", "追更列表名称"),
    ("registry_path", "追更列表文件（网址与已阅章节数）"),
    ("request_timeout_secs", "单次请求超时（秒）"),
    ("check_deadline_secs", "检查更新的总时限（秒）"),
    ("check_encoding", "发布页编码"),
    ("read_encoding", "章节列表页与正文页编码"),
    (
        "reverse_chapter_list",
        "是否倒序遍历章节列表（列表按新到旧排列时保持 true）",
    ),
    ("read_output", "阅读内容输出文件，留空则输出到终端"),
    ("log_to_file", "是否写入 logs/latest.log"),
    ("layout", "页面结构：最新章节、章节列表、正文的位置"),
];

pub fn load_or_create(config_path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let path = config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME));

    if !path.exists() {
        let config = AppConfig::default();
        write_with_comments(&config, &path)?;
        return Ok(config);
    }

    let raw = fs::read_to_string(&path).map_err(|source| ConfigError::Io {
        path: path.clone(),
        source,
    })?;
    let user_yaml: Value = serde_yaml::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.clone(),
        source,
    })?;

    let mut merged = serde_yaml::to_value(AppConfig::default())
        .map_err(|err| ConfigError::Validation(err.to_string()))?;
    if !user_yaml.is_null() {
        merge_values(&mut merged, user_yaml);
    }

    let config: AppConfig =
        serde_yaml::from_value(merged).map_err(|err| ConfigError::Validation(err.to_string()))?;
    config.validate()?;
    Ok(config)
}

pub fn write_with_comments(config: &AppConfig, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let yaml = generate_yaml_with_comments(config)?;
    fs::write(path, yaml).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

pub fn generate_yaml_with_comments(config: &AppConfig) -> Result<String, ConfigError> {
    let value =
        serde_yaml::to_value(config).map_err(|err| ConfigError::Validation(err.to_string()))?;
    let Value::Mapping(mapping) = value else {
        return Err(ConfigError::Validation(
            "config must serialize to a mapping".to_string(),
        ));
    };

    let mut blocks = Vec::new();
    for (name, description) in FIELD_DESCRIPTIONS {
        let key = Value::String(name.to_string());
        let val = mapping.get(&key).cloned().unwrap_or(Value::Null);
        let yaml = serde_yaml::to_string(&serde_yaml::Mapping::from_iter([(key, val)]))
            .map_err(|err| ConfigError::Validation(err.to_string()))?;
        blocks.push(format!("# {}\n{}", description, yaml.trim_end()));
    }

    Ok(blocks.join("\n") + "\n")
}

fn merge_values(default: &mut Value, user: Value) {
    match (default, user) {
        (Value::Mapping(dest), Value::Mapping(src)) => {
            for (key, user_val) in src {
                if let Some(dest_val) = dest.get_mut(&key) {
                    merge_values(dest_val, user_val);
                } else {
                    dest.insert(key, user_val);
                }
            }
        }
        (dest, other) => {
            *dest = other;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_is_created_with_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);

        let config = load_or_create(Some(&path)).unwrap();
        assert_eq!(config, AppConfig::default());

        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.contains("# 追更列表名称"));
        assert!(raw.contains("registry_name: Novels"));
        // 生成的文件可以原样读回
        assert_eq!(load_or_create(Some(&path)).unwrap(), AppConfig::default());
    }

    #[test]
    fn test_partial_file_is_merged_over_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(
            &path,
            "read_encoding: gbk\nlayout:\n  article_selector: div.txt\n",
        )
        .unwrap();

        let config = load_or_create(Some(&path)).unwrap();
        assert_eq!(config.read_encoding, "gbk");
        assert_eq!(config.layout.article_selector, "div.txt");
        assert_eq!(config.layout.chapter_list_selector, "ul.chapter");
        assert_eq!(config.request_timeout_secs, 15);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(&path, "request_timeout_secs: 0\n").unwrap();
        assert!(matches!(
            load_or_create(Some(&path)),
            Err(ConfigError::Validation(_))
        ));

        fs::write(&path, "registry_name: [unclosed\n").unwrap();
        assert!(matches!(
            load_or_create(Some(&path)),
            Err(ConfigError::Parse { .. })
        ));
    }
}
