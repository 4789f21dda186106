pub mod app;
pub mod config;
pub mod crawler;
pub mod error;
pub mod logging;
pub mod models;
pub mod numeral;
pub mod presenter;
pub mod storage;
pub mod utils;

pub use crawler::{
    ChapterExtractor, Page, PageFetcher, PageSource, UpdateReconciler, UserAgentProfile,
};
pub use error::{ExtractError, TrackerError};
pub use models::{ChapterRef, NovelCheck, NovelEntry, NovelRead, ReadReport, Registry};
pub use storage::{MemoryRegistryStore, RegistryStore, YamlRegistryStore};
