pub mod run;

use crate::model::{AiInsights, Field, FieldSet, SatelliteStatus};
use crate::provider::ProviderError;
use log::{debug, warn};

pub use run::run;

/// 协调器状态机：Loading → Ready ⇄ Refreshing，终态 Unmounted。
/// Failed 只会出现在初次加载连 mock 兜底都拿不到数据的情形，
/// 可通过手动刷新重试。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Loading,
    Ready,
    Refreshing,
    Failed,
    Unmounted,
}

impl Phase {
    pub fn label(&self) -> &'static str {
        match self {
            Phase::Loading => "加载中",
            Phase::Ready => "就绪",
            Phase::Refreshing => "刷新中",
            Phase::Failed => "加载失败",
            Phase::Unmounted => "已停止",
        }
    }
}

/// 应用一次拉取结果的结局，run 循环据此决定日志与事件
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// 新数据代已生效
    Applied,
    /// 过期响应（序号落后），静默丢弃
    StaleDiscarded,
    /// 拉取失败但已有数据，继续显示上一代
    KeptLastGood,
    /// 初次加载失败且无兜底数据
    FatalFirstLoad,
    /// 已卸载，忽略
    Ignored,
}

/// 发给 UI 的一帧完整状态
#[derive(Debug, Clone)]
pub struct DashboardSnapshot {
    pub phase: Phase,
    pub fields: Vec<Field>,
    pub selected: Option<String>,
    pub insights: Option<AiInsights>,
    pub satellite: Option<SatelliteStatus>,
    pub generation: u64,
}

impl Default for DashboardSnapshot {
    fn default() -> Self {
        DashboardSnapshot {
            phase: Phase::Loading,
            fields: Vec::new(),
            selected: None,
            insights: None,
            satellite: None,
            generation: 0,
        }
    }
}

/// 刷新与选中协调器（纯状态核心，不做 IO）
///
/// "当前选中的田块 id" 只存在这一份：地图点击、列表导航最终都
/// 落到 `select`，其他组件只读快照。并发上按请求序号做
/// last-write-wins：只有最近一次发出的请求的结果会被采纳，
/// 慢的旧响应不可能覆盖快的新响应。
pub struct Coordinator {
    phase: Phase,
    fields: Vec<Field>,
    insights: Option<AiInsights>,
    satellite: Option<SatelliteStatus>,
    selected: Option<String>,
    issued_seq: u64,
    generation: u64,
}

impl Coordinator {
    pub fn new() -> Self {
        Self {
            phase: Phase::Loading,
            fields: Vec::new(),
            insights: None,
            satellite: None,
            selected: None,
            issued_seq: 0,
            generation: 0,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// 发出一次拉取请求，返回请求序号。
    /// Ready 状态进入 Refreshing；当前展示的数据保持不动，避免闪烁。
    pub fn begin_fetch(&mut self) -> Option<u64> {
        if self.phase == Phase::Unmounted {
            return None;
        }
        self.issued_seq += 1;
        if self.phase == Phase::Ready {
            self.phase = Phase::Refreshing;
        }
        Some(self.issued_seq)
    }

    /// 应用一次拉取结果。只认最近发出的序号，其余一律视为过期。
    pub fn apply_fetch(
        &mut self,
        seq: u64,
        result: Result<FieldSet, ProviderError>,
    ) -> FetchOutcome {
        if self.phase == Phase::Unmounted {
            return FetchOutcome::Ignored;
        }
        if seq != self.issued_seq {
            debug!("丢弃过期刷新结果 seq={} (最新 {})", seq, self.issued_seq);
            return FetchOutcome::StaleDiscarded;
        }

        match result {
            Ok(set) => {
                let first_load = self.generation == 0;
                self.generation += 1;

                // 选中延续策略：旧 id 还在就保留；不在了退到新集合第一个；
                // 空集合清空。初次加载默认选第一个。
                self.selected = match self.selected.take() {
                    Some(id) if set.fields.iter().any(|f| f.id == id) => Some(id),
                    Some(_) => set.fields.first().map(|f| f.id.clone()),
                    None if first_load => set.fields.first().map(|f| f.id.clone()),
                    None => None,
                };

                self.fields = set.fields;
                self.insights = Some(set.ai_insights);
                self.satellite = set.satellite_status;
                self.phase = Phase::Ready;
                FetchOutcome::Applied
            }
            Err(e) => {
                if self.generation == 0 {
                    warn!("初次加载失败且无兜底数据: {}", e);
                    self.phase = Phase::Failed;
                    FetchOutcome::FatalFirstLoad
                } else {
                    // 刷新失败不致命：继续显示上一代数据
                    warn!("刷新失败，保留上一代数据: {}", e);
                    self.phase = Phase::Ready;
                    FetchOutcome::KeptLastGood
                }
            }
        }
    }

    /// 唯一的选中入口。id 不在当前集合里则忽略。
    pub fn select(&mut self, id: &str) -> bool {
        if self.phase == Phase::Unmounted {
            return false;
        }
        if self.fields.iter().any(|f| f.id == id) {
            self.selected = Some(id.to_string());
            true
        } else {
            debug!("忽略对未知田块的选中请求: {}", id);
            false
        }
    }

    /// Failed 状态下重新回到 Loading（随后由 run 循环重新发起拉取）
    pub fn retry(&mut self) -> bool {
        if self.phase == Phase::Failed {
            self.phase = Phase::Loading;
            true
        } else {
            false
        }
    }

    /// 终态。之后任何拉取结果与状态变更都被忽略。
    pub fn unmount(&mut self) {
        self.phase = Phase::Unmounted;
    }

    pub fn snapshot(&self) -> DashboardSnapshot {
        DashboardSnapshot {
            phase: self.phase,
            fields: self.fields.clone(),
            selected: self.selected.clone(),
            insights: self.insights.clone(),
            satellite: self.satellite.clone(),
            generation: self.generation,
        }
    }
}

impl Default for Coordinator {
    fn default() -> Self {
        Self::new()
    }
}
