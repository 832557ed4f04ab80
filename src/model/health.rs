use ratatui::style::Color;
use serde::{Deserialize, Serialize};

/// 健康状态 - 由胁迫指数唯一决定
///
/// 阈值是策略常量：全部代码路径（初始加载、mock 兜底、远端刷新）
/// 都必须经过 `from_score` 统一判定，禁止在别处硬编码。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Warning,
    Critical,
}

impl HealthStatus {
    pub fn from_score(stress_score: f64) -> Self {
        if stress_score <= 30.0 {
            HealthStatus::Healthy
        } else if stress_score <= 60.0 {
            HealthStatus::Warning
        } else {
            HealthStatus::Critical
        }
    }

    /// 状态到颜色的唯一映射（地图与各面板共用）
    pub fn color(&self) -> Color {
        match self {
            HealthStatus::Healthy => Color::Green,
            HealthStatus::Warning => Color::Yellow,
            HealthStatus::Critical => Color::Red,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            HealthStatus::Healthy => "✓",
            HealthStatus::Warning => "⚠",
            HealthStatus::Critical => "✗",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            HealthStatus::Healthy => "健康",
            HealthStatus::Warning => "预警",
            HealthStatus::Critical => "危急",
        }
    }
}

/// 减产风险 - 同样只看胁迫指数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum YieldRisk {
    Low,
    Medium,
    High,
}

impl YieldRisk {
    pub fn from_score(stress_score: f64) -> Self {
        if stress_score <= 25.0 {
            YieldRisk::Low
        } else if stress_score <= 55.0 {
            YieldRisk::Medium
        } else {
            YieldRisk::High
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            YieldRisk::Low => "低",
            YieldRisk::Medium => "中",
            YieldRisk::High => "高",
        }
    }
}

/// 变化趋势 - 仅展示用，不参与健康/风险判定
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Stable,
    Improving,
    Worsening,
}

impl Trend {
    pub fn symbol(&self) -> &'static str {
        match self {
            Trend::Stable => "→",
            Trend::Improving => "↑",
            Trend::Worsening => "↓",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Trend::Stable => "平稳",
            Trend::Improving => "好转",
            Trend::Worsening => "恶化",
        }
    }
}
