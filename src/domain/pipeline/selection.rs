//! 章节确认选择
//!
//! `SelectedChapters` 只能通过校验得到，保证非空且全部来自当前目录，
//! 因此空选择无法被提交。

use std::collections::HashSet;

use super::{ChapterId, PipelineError, PipelineSnapshot};

/// 用户正在编辑的选择集合
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChapterSelection {
    selected: HashSet<ChapterId>,
}

impl ChapterSelection {
    pub fn new() -> Self {
        Self::default()
    }

    /// 以默认预选（relevance_score > 0.5）初始化
    pub fn preselected(snapshot: &PipelineSnapshot) -> Self {
        Self {
            selected: snapshot.preselected_ids().into_iter().collect(),
        }
    }

    pub fn select(&mut self, id: ChapterId) {
        self.selected.insert(id);
    }

    /// 切换选中状态，返回切换后是否选中
    pub fn toggle(&mut self, id: ChapterId) -> bool {
        if self.selected.remove(&id) {
            false
        } else {
            self.selected.insert(id);
            true
        }
    }

    pub fn len(&self) -> usize {
        self.selected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    /// 确认按钮是否可用
    pub fn can_confirm(&self) -> bool {
        !self.is_empty()
    }

    /// 对照当前目录校验，得到可提交的选择（按目录顺序）
    pub fn confirm(&self, snapshot: &PipelineSnapshot) -> Result<SelectedChapters, PipelineError> {
        if self.selected.is_empty() {
            return Err(PipelineError::EmptySelection);
        }
        if let Some(unknown) = self
            .selected
            .iter()
            .find(|id| snapshot.chapter(id).is_none())
        {
            return Err(PipelineError::UnknownChapter(unknown.clone()));
        }

        let ids = snapshot
            .chapters()
            .iter()
            .filter(|c| self.selected.contains(c.id()))
            .map(|c| c.id().clone())
            .collect();
        Ok(SelectedChapters { ids })
    }
}

/// 已校验的非空章节选择
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedChapters {
    ids: Vec<ChapterId>,
}

impl SelectedChapters {
    pub fn ids(&self) -> &[ChapterId] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
