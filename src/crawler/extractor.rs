use std::sync::LazyLock;

use regex::Regex;
use reqwest::Url;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use super::downloader::Page;
use crate::error::ExtractError;
use crate::models::ChapterRef;
use crate::numeral;
use crate::utils::{join_text_nodes, snippet};

static CHAPTER_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("第([^第章]*)章").expect("chapter pattern"));
static RANGE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("至([^至章]*)章").expect("range pattern"));

/// 某一类站点的最新章节位置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndicatorRule {
    pub url_fragment: String,
    pub selector: String,
}

/// 各页面中需要定位的区域
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteLayout {
    pub indicator_rules: Vec<IndicatorRule>,
    pub default_indicator_selector: String,
    pub chapter_list_selector: String,
    pub article_selector: String,
    pub link_base_url: String,
}

impl Default for SiteLayout {
    fn default() -> Self {
        Self {
            indicator_rules: vec![IndicatorRule {
                url_fragment: "zongheng".to_string(),
                selector: "span.last_tit".to_string(),
            }],
            default_indicator_selector: "p#ariaMuLu".to_string(),
            chapter_list_selector: "ul.chapter".to_string(),
            article_selector: "div#content".to_string(),
            link_base_url: "https://www.biquge.com.cn".to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum LayoutError {
    #[error("无效的选择器 '{selector}': {reason}")]
    InvalidSelector { selector: String, reason: String },
    #[error("无效的链接基础网址 '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractMode {
    Chapter,
    Link,
    Article,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    ChapterNumeral(String),
    Links(Vec<ChapterRef>),
    Article(String),
}

struct Landmark {
    raw: String,
    selector: Selector,
}

impl Landmark {
    fn parse(raw: &str) -> Result<Self, LayoutError> {
        let selector = Selector::parse(raw).map_err(|e| LayoutError::InvalidSelector {
            selector: raw.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            raw: raw.to_string(),
            selector,
        })
    }

    fn find<'a>(&self, document: &'a Html) -> Result<ElementRef<'a>, ExtractError> {
        document
            .select(&self.selector)
            .next()
            .ok_or_else(|| ExtractError::LandmarkNotFound {
                selector: self.raw.clone(),
            })
    }
}

pub struct ChapterExtractor {
    indicators: Vec<(String, Landmark)>,
    default_indicator: Landmark,
    chapter_list: Landmark,
    article: Landmark,
    anchor: Selector,
    base_url: Url,
}

impl ChapterExtractor {
    pub fn new(layout: &SiteLayout) -> Result<Self, LayoutError> {
        let indicators = layout
            .indicator_rules
            .iter()
            .map(|rule| Ok((rule.url_fragment.clone(), Landmark::parse(&rule.selector)?)))
            .collect::<Result<Vec<_>, LayoutError>>()?;

        let base_url =
            Url::parse(&layout.link_base_url).map_err(|e| LayoutError::InvalidBaseUrl {
                url: layout.link_base_url.clone(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            indicators,
            default_indicator: Landmark::parse(&layout.default_indicator_selector)?,
            chapter_list: Landmark::parse(&layout.chapter_list_selector)?,
            article: Landmark::parse(&layout.article_selector)?,
            anchor: Landmark::parse("a")?.selector,
            base_url,
        })
    }

    /// 按网址选择最新章节信息所在的位置，未命中任何规则时使用默认位置
    fn locate_chapter_indicator(&self, source_url: &str) -> &Landmark {
        self.indicators
            .iter()
            .find(|(fragment, _)| source_url.contains(fragment.as_str()))
            .map(|(_, landmark)| landmark)
            .unwrap_or(&self.default_indicator)
    }

    pub fn extract(
        &self,
        page: &Page,
        source_url: &str,
        mode: ExtractMode,
    ) -> Result<Extraction, ExtractError> {
        match mode {
            ExtractMode::Chapter => self
                .chapter_numeral(page, source_url)
                .map(Extraction::ChapterNumeral),
            ExtractMode::Link => self.chapter_links(page).map(Extraction::Links),
            ExtractMode::Article => self.article_text(page).map(Extraction::Article),
        }
    }

    /// 提取最新章节的中文数字，如“第一千二百零三章”中的“一千二百零三”
    pub fn chapter_numeral(&self, page: &Page, source_url: &str) -> Result<String, ExtractError> {
        let html = loaded(page)?;
        let document = Html::parse_document(html);

        let landmark = self.locate_chapter_indicator(source_url);
        let text: String = landmark.find(&document)?.text().collect();

        find_chapter_numeral(&text)
            .map(str::to_string)
            .ok_or_else(|| ExtractError::PatternNotFound {
                text: snippet(&text, 60),
            })
    }

    /// 提取章节列表，并将相对链接转换成绝对链接
    pub fn chapter_links(&self, page: &Page) -> Result<Vec<ChapterRef>, ExtractError> {
        let html = loaded(page)?;
        let document = Html::parse_document(html);

        let container = self.chapter_list.find(&document)?;
        let mut chapters = Vec::new();

        for link in container.select(&self.anchor) {
            let title: String = link.text().collect();
            let title = title.trim().to_string();

            let Some(href) = link.value().attr("href") else {
                debug!("章节 '{}' 没有链接，跳过", title);
                continue;
            };
            match self.base_url.join(href) {
                Ok(url) => chapters.push(ChapterRef {
                    title,
                    url: url.to_string(),
                }),
                Err(e) => debug!("章节 '{}' 的链接 {} 无法解析: {}", title, href, e),
            }
        }

        Ok(chapters)
    }

    /// 提取正文
    pub fn article_text(&self, page: &Page) -> Result<String, ExtractError> {
        let html = loaded(page)?;
        let document = Html::parse_document(html);

        let content = self.article.find(&document)?;
        Ok(join_text_nodes(content.text()))
    }
}

fn loaded(page: &Page) -> Result<&str, ExtractError> {
    match page {
        Page::Loaded(html) => Ok(html),
        Page::Failed => Err(ExtractError::FetchFailure),
    }
}

/// 先找“第…章”，找不到再找“至…章”
pub fn find_chapter_numeral(text: &str) -> Option<&str> {
    CHAPTER_PATTERN
        .captures(text)
        .or_else(|| RANGE_PATTERN.captures(text))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
}

/// 从章节标题解析章节数，先找“第…章”，否则取“章”字之前的部分
///
/// 序言、作者的话等非正文章节返回 `None`
pub fn parse_title_number(title: &str) -> Option<u64> {
    let numeral = match CHAPTER_PATTERN.captures(title).and_then(|caps| caps.get(1)) {
        Some(m) => m.as_str(),
        None => title.split('章').next().unwrap_or(title),
    };
    numeral::convert(numeral).ok()
}
