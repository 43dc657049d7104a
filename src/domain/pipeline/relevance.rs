//! 相关度分级与默认预选策略
//!
//! 两个阈值互相独立：徽章分级使用 0.4 / 0.7 边界，预选使用 0.5。

use serde::{Deserialize, Serialize};

/// 预选阈值（严格大于）
pub const PRESELECT_THRESHOLD: f64 = 0.5;

/// High 徽章阈值（严格大于）
pub const HIGH_RELEVANCE_THRESHOLD: f64 = 0.7;

/// Medium 徽章下界（包含）
pub const MEDIUM_RELEVANCE_FLOOR: f64 = 0.4;

/// 相关度徽章
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RelevanceBadge {
    High,
    Medium,
    Low,
}

impl RelevanceBadge {
    pub fn label(&self) -> &'static str {
        match self {
            RelevanceBadge::High => "High",
            RelevanceBadge::Medium => "Medium",
            RelevanceBadge::Low => "Low",
        }
    }
}

impl std::fmt::Display for RelevanceBadge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// 根据相关度分数计算徽章；没有分数（或分数为 NaN）时不显示徽章
pub fn classify(score: Option<f64>) -> Option<RelevanceBadge> {
    let score = score.filter(|s| !s.is_nan())?;
    if score > HIGH_RELEVANCE_THRESHOLD {
        Some(RelevanceBadge::High)
    } else if score >= MEDIUM_RELEVANCE_FLOOR {
        Some(RelevanceBadge::Medium)
    } else {
        Some(RelevanceBadge::Low)
    }
}

/// 章节是否默认预选；没有分数的章节永远不预选
pub fn is_preselected(score: Option<f64>) -> bool {
    score.map_or(false, |s| s > PRESELECT_THRESHOLD)
}
