//! Pipeline Context - Entities

use serde::{Deserialize, Serialize};

use super::relevance::{self, RelevanceBadge};
use super::{ChapterId, ExtractionStatus, PageRange};

/// 章节 - 最小提取单位
///
/// 不变量:
/// - id 在教材内唯一且跨轮询稳定
/// - 其它字段随流水线推进原地更新
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chapter {
    id: ChapterId,
    title: String,
    number: u32,
    pages: PageRange,
    status: ExtractionStatus,
    relevance_score: Option<f64>,
    matched_topics: Option<Vec<String>>,
}

impl Chapter {
    pub fn new(
        id: ChapterId,
        title: impl Into<String>,
        number: u32,
        pages: PageRange,
        status: ExtractionStatus,
    ) -> Self {
        Self {
            id,
            title: title.into(),
            number,
            pages,
            status,
            relevance_score: None,
            matched_topics: None,
        }
    }

    /// 附加相关度匹配结果
    pub fn with_relevance(mut self, score: f64, matched_topics: Vec<String>) -> Self {
        self.relevance_score = Some(score);
        self.matched_topics = Some(matched_topics);
        self
    }

    pub fn id(&self) -> &ChapterId {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn number(&self) -> u32 {
        self.number
    }

    pub fn pages(&self) -> PageRange {
        self.pages
    }

    pub fn status(&self) -> ExtractionStatus {
        self.status
    }

    pub fn relevance_score(&self) -> Option<f64> {
        self.relevance_score
    }

    pub fn matched_topics(&self) -> &[String] {
        self.matched_topics.as_deref().unwrap_or(&[])
    }

    pub fn relevance_badge(&self) -> Option<RelevanceBadge> {
        relevance::classify(self.relevance_score)
    }

    pub fn is_preselected(&self) -> bool {
        relevance::is_preselected(self.relevance_score)
    }

    pub fn is_extracted(&self) -> bool {
        self.status == ExtractionStatus::Extracted
    }

    pub fn is_deferred(&self) -> bool {
        self.status == ExtractionStatus::Deferred
    }
}
