use thiserror::Error;

use crate::numeral::NumeralError;

/// 页面提取错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractError {
    /// 页面获取失败，原样向下传递，不做解析
    #[error("页面获取失败")]
    FetchFailure,
    #[error("页面中找不到 '{selector}'")]
    LandmarkNotFound { selector: String },
    #[error("章节信息中找不到章节数: {text}")]
    PatternNotFound { text: String },
}

/// 单本小说一次处理中的错误，只影响该小说自己的结果
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TrackerError {
    #[error("页面获取失败: {url}")]
    FetchFailure { url: String },
    #[error("页面结构变化，找不到 '{selector}': {url}")]
    LandmarkNotFound { url: String, selector: String },
    #[error("找不到章节数: {text}")]
    PatternNotFound { text: String },
    #[error("章节数格式异常: {0}")]
    MalformedNumeral(#[from] NumeralError),
    #[error("检查超时")]
    Timeout,
}

impl TrackerError {
    pub fn from_extract(err: ExtractError, url: &str) -> Self {
        match err {
            ExtractError::FetchFailure => TrackerError::FetchFailure {
                url: url.to_string(),
            },
            ExtractError::LandmarkNotFound { selector } => TrackerError::LandmarkNotFound {
                url: url.to_string(),
                selector,
            },
            ExtractError::PatternNotFound { text } => TrackerError::PatternNotFound { text },
        }
    }

    /// 用于更新提示中的简短原因
    pub fn short_reason(&self) -> &'static str {
        match self {
            TrackerError::FetchFailure { .. } => "页面获取失败",
            TrackerError::LandmarkNotFound { .. } => "页面结构变化",
            TrackerError::PatternNotFound { .. } => "找不到章节数",
            TrackerError::MalformedNumeral(_) => "章节数格式异常",
            TrackerError::Timeout => "检查超时",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_error_keeps_kind() {
        let err = TrackerError::from_extract(ExtractError::FetchFailure, "https://a.example/1");
        assert_eq!(
            err,
            TrackerError::FetchFailure {
                url: "https://a.example/1".to_string()
            }
        );
        assert_eq!(err.short_reason(), "页面获取失败");

        let err = TrackerError::from_extract(
            ExtractError::LandmarkNotFound {
                selector: "p#ariaMuLu".to_string(),
            },
            "https://a.example/1",
        );
        assert_eq!(err.short_reason(), "页面结构变化");
    }

    #[test]
    fn test_malformed_numeral_is_distinct() {
        let err = TrackerError::from(NumeralError::Empty);
        assert_eq!(err.short_reason(), "章节数格式异常");
    }
}
