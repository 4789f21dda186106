//! 追更列表的存取。
//!
//! 默认实现是一个 YAML 文件，按名称保存多份列表：
//!
//! ```yaml
//! updated_at: 2024-05-01T08:00:00Z
//! registries:
//!   Novels:
//!     - label: 凡人修仙
//!       check_url: https://book.example/info/1
//!       read_url: https://m.example/1/
//!       last_seen: 1203
//! ```

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::info;

use crate::models::{NovelEntry, Registry};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error at {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("invalid yaml at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },
    #[error("找不到追更列表 '{0}'")]
    UnknownRegistry(String),
    #[error("已阅章节数与小说数量不一致: 需要 {expected} 项, 实际 {actual} 项")]
    Misaligned { expected: usize, actual: usize },
}

pub trait RegistryStore: Send + Sync {
    fn load_registry(&self, name: &str) -> Result<Registry, StoreError>;

    /// 整批写回已阅章节数，顺序与 `load_registry` 返回的小说一致
    fn save_last_seen(&self, name: &str, last_seen: &[u64]) -> Result<(), StoreError>;
}

fn apply_last_seen(novels: &mut [NovelEntry], last_seen: &[u64]) -> Result<(), StoreError> {
    if novels.len() != last_seen.len() {
        return Err(StoreError::Misaligned {
            expected: novels.len(),
            actual: last_seen.len(),
        });
    }
    for (novel, &chapter) in novels.iter_mut().zip(last_seen) {
        novel.last_seen = chapter;
    }
    Ok(())
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct RegistryFile {
    #[serde(default)]
    updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    registries: BTreeMap<String, Vec<NovelEntry>>,
}

pub struct YamlRegistryStore {
    path: PathBuf,
}

impl YamlRegistryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn read_file(&self) -> Result<RegistryFile, StoreError> {
        let raw = fs::read_to_string(&self.path).map_err(|source| StoreError::Io {
            path: self.path.clone(),
            source,
        })?;
        serde_yaml::from_str(&raw).map_err(|source| StoreError::Parse {
            path: self.path.clone(),
            source,
        })
    }

    /// 先写临时文件再替换，避免写到一半的列表
    fn write_file(&self, file: &RegistryFile) -> Result<(), StoreError> {
        let io_err = |source| StoreError::Io {
            path: self.path.clone(),
            source,
        };

        let yaml = serde_yaml::to_string(file).map_err(|source| StoreError::Parse {
            path: self.path.clone(),
            source,
        })?;

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir).map_err(io_err)?;

        let mut tmp = NamedTempFile::new_in(dir).map_err(io_err)?;
        tmp.write_all(yaml.as_bytes()).map_err(io_err)?;
        tmp.persist(&self.path).map_err(|e| io_err(e.error))?;
        Ok(())
    }
}

impl RegistryStore for YamlRegistryStore {
    fn load_registry(&self, name: &str) -> Result<Registry, StoreError> {
        if !self.path.exists() {
            // 首次运行，生成一份空列表供手动填写
            let mut file = RegistryFile::default();
            file.registries.insert(name.to_string(), Vec::new());
            self.write_file(&file)?;
            info!("已创建追更列表文件: {}", self.path.display());
            return Ok(Registry::new(name, Vec::new()));
        }

        let file = self.read_file()?;
        let novels = file
            .registries
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::UnknownRegistry(name.to_string()))?;
        Ok(Registry::new(name, novels))
    }

    fn save_last_seen(&self, name: &str, last_seen: &[u64]) -> Result<(), StoreError> {
        let mut file = self.read_file()?;
        let novels = file
            .registries
            .get_mut(name)
            .ok_or_else(|| StoreError::UnknownRegistry(name.to_string()))?;
        apply_last_seen(novels, last_seen)?;
        file.updated_at = Some(Utc::now());
        self.write_file(&file)
    }
}

/// 内存中的追更列表，记录写回次数
#[derive(Default)]
pub struct MemoryRegistryStore {
    registries: Mutex<HashMap<String, Vec<NovelEntry>>>,
    saves: Mutex<usize>,
}

impl MemoryRegistryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_registry(registry: Registry) -> Self {
        let store = Self::new();
        store.insert(registry);
        store
    }

    pub fn insert(&self, registry: Registry) {
        self.registries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(registry.name, registry.novels);
    }

    pub fn save_count(&self) -> usize {
        *self.saves.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl RegistryStore for MemoryRegistryStore {
    fn load_registry(&self, name: &str) -> Result<Registry, StoreError> {
        let registries = self.registries.lock().unwrap_or_else(|e| e.into_inner());
        registries
            .get(name)
            .map(|novels| Registry::new(name, novels.clone()))
            .ok_or_else(|| StoreError::UnknownRegistry(name.to_string()))
    }

    fn save_last_seen(&self, name: &str, last_seen: &[u64]) -> Result<(), StoreError> {
        let mut registries = self.registries.lock().unwrap_or_else(|e| e.into_inner());
        let novels = registries
            .get_mut(name)
            .ok_or_else(|| StoreError::UnknownRegistry(name.to_string()))?;
        apply_last_seen(novels, last_seen)?;
        *self.saves.lock().unwrap_or_else(|e| e.into_inner()) += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn entry(label: &str, last_seen: u64) -> NovelEntry {
        NovelEntry {
            label: label.to_string(),
            check_url: format!("https://check.example/{label}"),
            read_url: format!("https://read.example/{label}"),
            last_seen,
        }
    }

    #[test]
    fn test_yaml_store_creates_empty_registry() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data").join("novels.yml");
        let store = YamlRegistryStore::new(&path);

        let registry = store.load_registry("Novels").unwrap();
        assert!(registry.novels.is_empty());
        assert!(path.exists());
        // 再次读取走文件
        assert_eq!(store.load_registry("Novels").unwrap().name, "Novels");
    }

    #[test]
    fn test_yaml_store_save_last_seen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("novels.yml");
        fs::write(
            &path,
            "registries:\n  Novels:\n    - label: 凡人修仙\n      check_url: https://a.example/1\n      read_url: https://m.a.example/1\n      last_seen: 10\n    - label: 元尊\n      check_url: https://b.example/2\n      read_url: https://m.b.example/2\n",
        )
        .unwrap();
        let store = YamlRegistryStore::new(&path);

        let registry = store.load_registry("Novels").unwrap();
        assert_eq!(registry.last_seen(), vec![10, 0]);
        assert_eq!(registry.novels[0].label, "凡人修仙");

        store.save_last_seen("Novels", &[12, 3]).unwrap();
        let reloaded = store.load_registry("Novels").unwrap();
        assert_eq!(reloaded.last_seen(), vec![12, 3]);
        assert_eq!(reloaded.novels[1].read_url, "https://m.b.example/2");

        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.contains("updated_at"));
    }

    #[test]
    fn test_yaml_store_rejects_misaligned_and_unknown() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("novels.yml");
        let store = YamlRegistryStore::new(&path);
        store.load_registry("Novels").unwrap();

        assert!(matches!(
            store.save_last_seen("Novels", &[1]),
            Err(StoreError::Misaligned {
                expected: 0,
                actual: 1
            })
        ));
        assert!(matches!(
            store.load_registry("Other"),
            Err(StoreError::UnknownRegistry(_))
        ));
    }

    #[test]
    fn test_memory_store_counts_saves() {
        let store =
            MemoryRegistryStore::with_registry(Registry::new("Novels", vec![entry("a", 1)]));
        store.save_last_seen("Novels", &[4]).unwrap();
        assert_eq!(store.save_count(), 1);
        assert_eq!(store.load_registry("Novels").unwrap().last_seen(), vec![4]);
        assert!(store.save_last_seen("Novels", &[4, 5]).is_err());
        assert_eq!(store.save_count(), 1);
    }
}
