//! Pipeline Context - Value Objects

use serde::{Deserialize, Serialize};

/// 教材唯一标识（由后端分配，客户端视为不透明字符串）
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TextbookId(String);

impl TextbookId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TextbookId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for TextbookId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// 章节唯一标识
///
/// 不变量: 在同一本教材内唯一，且在多次轮询之间保持稳定
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChapterId(String);

impl ChapterId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ChapterId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ChapterId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// 页码范围（闭区间）
///
/// 不变量: 1 <= start <= end
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRange {
    start: u32,
    end: u32,
}

impl PageRange {
    pub fn new(start: u32, end: u32) -> Result<Self, &'static str> {
        if start == 0 {
            return Err("起始页码必须为正整数");
        }
        if start > end {
            return Err("起始页码不能大于结束页码");
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> u32 {
        self.start
    }

    pub fn end(&self) -> u32 {
        self.end
    }
}

impl std::fmt::Display for PageRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "pp. {}-{}", self.start, self.end)
    }
}

/// 章节提取状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionStatus {
    /// 目录解析后尚未处理
    Pending,
    /// 已被用户选中
    Selected,
    /// 正在提取
    Extracting,
    /// 提取成功
    Extracted,
    /// 暂缓提取，之后可重新提交
    Deferred,
    /// 提取失败
    Error,
}

impl ExtractionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractionStatus::Pending => "pending",
            ExtractionStatus::Selected => "selected",
            ExtractionStatus::Extracting => "extracting",
            ExtractionStatus::Extracted => "extracted",
            ExtractionStatus::Deferred => "deferred",
            ExtractionStatus::Error => "error",
        }
    }
}

impl Default for ExtractionStatus {
    fn default() -> Self {
        ExtractionStatus::Pending
    }
}

impl std::fmt::Display for ExtractionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 教材整体流水线状态（由后端计算，客户端只做反映）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStatus {
    Uploaded,
    TocExtracted,
    AwaitingVerification,
    Extracting,
    PartiallyExtracted,
    FullyExtracted,
    Error,
}

impl PipelineStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStatus::Uploaded => "uploaded",
            PipelineStatus::TocExtracted => "toc_extracted",
            PipelineStatus::AwaitingVerification => "awaiting_verification",
            PipelineStatus::Extracting => "extracting",
            PipelineStatus::PartiallyExtracted => "partially_extracted",
            PipelineStatus::FullyExtracted => "fully_extracted",
            PipelineStatus::Error => "error",
        }
    }

    /// 后端是否仍在处理（只有此状态下才需要轮询）
    pub fn is_active(&self) -> bool {
        match self {
            PipelineStatus::Extracting => true,
            PipelineStatus::Uploaded
            | PipelineStatus::TocExtracted
            | PipelineStatus::AwaitingVerification
            | PipelineStatus::PartiallyExtracted
            | PipelineStatus::FullyExtracted
            | PipelineStatus::Error => false,
        }
    }

    /// 是否等待用户确认章节选择
    pub fn needs_verification(&self) -> bool {
        matches!(
            self,
            PipelineStatus::TocExtracted | PipelineStatus::AwaitingVerification
        )
    }
}

impl std::fmt::Display for PipelineStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
