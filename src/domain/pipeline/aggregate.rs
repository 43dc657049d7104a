//! Pipeline Context - Aggregate Root

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::{Chapter, ChapterId, PipelineError, PipelineStatus, TextbookId};

/// 教材流水线快照
///
/// 后端返回的权威状态，每次成功读取整体替换，不做局部合并。
/// 派生视图（待提取章节、已提取数量）每次读取时重新计算。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineSnapshot {
    textbook_id: TextbookId,
    status: PipelineStatus,
    chapters: Vec<Chapter>,
}

impl PipelineSnapshot {
    pub fn new(textbook_id: TextbookId, status: PipelineStatus, chapters: Vec<Chapter>) -> Self {
        Self {
            textbook_id,
            status,
            chapters,
        }
    }

    pub fn textbook_id(&self) -> &TextbookId {
        &self.textbook_id
    }

    pub fn status(&self) -> PipelineStatus {
        self.status
    }

    pub fn chapters(&self) -> &[Chapter] {
        &self.chapters
    }

    pub fn chapter(&self, id: &ChapterId) -> Option<&Chapter> {
        self.chapters.iter().find(|c| c.id() == id)
    }

    /// 后端已接受新的提取任务，在下一次轮询前先反映为 extracting
    pub fn mark_extracting(&mut self) {
        self.status = PipelineStatus::Extracting;
    }

    /// 等待提取的章节（deferred）
    pub fn awaiting_extraction(&self) -> Vec<&Chapter> {
        self.chapters.iter().filter(|c| c.is_deferred()).collect()
    }

    pub fn deferred_ids(&self) -> Vec<ChapterId> {
        self.awaiting_extraction()
            .into_iter()
            .map(|c| c.id().clone())
            .collect()
    }

    pub fn extracted_count(&self) -> usize {
        self.chapters.iter().filter(|c| c.is_extracted()).count()
    }

    /// 默认预选集合（relevance_score > 0.5），按目录顺序
    pub fn preselected_ids(&self) -> Vec<ChapterId> {
        self.chapters
            .iter()
            .filter(|c| c.is_preselected())
            .map(|c| c.id().clone())
            .collect()
    }

    /// 校验暂缓提取请求：章节必须存在且尚未提取完成，返回按目录顺序去重后的 ID
    pub fn validate_extraction_targets(
        &self,
        ids: &[ChapterId],
    ) -> Result<Vec<ChapterId>, PipelineError> {
        if ids.is_empty() {
            return Err(PipelineError::EmptySelection);
        }

        let requested: HashSet<&ChapterId> = ids.iter().collect();
        for id in &requested {
            let chapter = self
                .chapter(id)
                .ok_or_else(|| PipelineError::UnknownChapter((*id).clone()))?;
            if chapter.is_extracted() {
                return Err(PipelineError::AlreadyExtracted((*id).clone()));
            }
        }

        Ok(self
            .chapters
            .iter()
            .filter(|c| requested.contains(c.id()))
            .map(|c| c.id().clone())
            .collect())
    }
}
