//! Backend DTOs - 后端 JSON 载荷
//!
//! 与后端保持字段名一致，转换为领域对象时做完整校验

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::application::error::ClientError;
use crate::application::ports::{ChapterRef, ConfirmAck, ExtractAck};
use crate::domain::pipeline::{
    Chapter, ChapterId, ExtractionStatus, PageRange, PipelineSnapshot, PipelineStatus, TextbookId,
};

/// 章节
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChapterDto {
    pub id: String,
    pub title: String,
    pub chapter_number: u32,
    pub page_start: u32,
    pub page_end: u32,
    #[serde(default)]
    pub extraction_status: ExtractionStatus,
    #[serde(default)]
    pub relevance_score: Option<f64>,
    #[serde(default)]
    pub matched_topics: Option<Vec<String>>,
}

impl TryFrom<ChapterDto> for Chapter {
    type Error = ClientError;

    fn try_from(dto: ChapterDto) -> Result<Self, Self::Error> {
        let pages = PageRange::new(dto.page_start, dto.page_end).map_err(|e| {
            ClientError::protocol(format!("chapter {}: {}", dto.id, e))
        })?;
        let chapter = Chapter::new(
            ChapterId::new(dto.id),
            dto.title,
            dto.chapter_number,
            pages,
            dto.extraction_status,
        );
        Ok(match dto.relevance_score {
            Some(score) => chapter.with_relevance(score, dto.matched_topics.unwrap_or_default()),
            None => chapter,
        })
    }
}

/// 流水线状态 / 提取进度响应
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineStatusDto {
    pub pipeline_status: PipelineStatus,
    #[serde(default)]
    pub chapters: Vec<ChapterDto>,
}

impl PipelineStatusDto {
    pub fn into_snapshot(self, textbook_id: &TextbookId) -> Result<PipelineSnapshot, ClientError> {
        let chapters = self
            .chapters
            .into_iter()
            .map(Chapter::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(PipelineSnapshot::new(
            textbook_id.clone(),
            self.pipeline_status,
            chapters,
        ))
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VerifyChaptersRequest {
    pub selected_chapter_ids: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VerifyChaptersResponse {
    pub status: String,
    pub selected_count: usize,
}

impl From<VerifyChaptersResponse> for ConfirmAck {
    fn from(dto: VerifyChaptersResponse) -> Self {
        Self {
            status: dto.status,
            selected_count: dto.selected_count,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ExtractDeferredRequest {
    pub chapter_ids: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ExtractDeferredResponse {
    pub status: String,
}

impl From<ExtractDeferredResponse> for ExtractAck {
    fn from(dto: ExtractDeferredResponse) -> Self {
        Self { status: dto.status }
    }
}

/// 讲解请求中的章节引用（chapter_num 以字符串传输）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChapterRefDto {
    pub textbook_id: String,
    pub chapter_num: String,
    pub classification: String,
    #[serde(default)]
    pub textbook_title: String,
}

impl From<&ChapterRef> for ChapterRefDto {
    fn from(chapter: &ChapterRef) -> Self {
        Self {
            textbook_id: chapter.textbook_id.to_string(),
            chapter_num: chapter.chapter_number.to_string(),
            classification: chapter.classification.clone(),
            textbook_title: chapter.textbook_title.clone().unwrap_or_default(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ExplainRequestDto {
    pub chapters: Vec<ChapterRefDto>,
    pub query: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FollowupRequestDto {
    pub conversation_id: Uuid,
    pub message: String,
}

/// 从错误响应体中提取 `detail`
///
/// 字符串原样使用，其它 JSON 值序列化为文本，无法解析时返回 None
pub fn error_detail(body: &[u8]) -> Option<String> {
    let value: serde_json::Value = serde_json::from_slice(body).ok()?;
    match value.get("detail")? {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
