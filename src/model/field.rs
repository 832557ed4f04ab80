use crate::model::health::{HealthStatus, Trend, YieldRisk};
use chrono::{DateTime, Utc};
use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// 经纬度点，线上格式为 [lat, lng] 数组
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "(f64, f64)", into = "(f64, f64)")]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

impl From<(f64, f64)> for LatLng {
    fn from((lat, lng): (f64, f64)) -> Self {
        Self { lat, lng }
    }
}

impl From<LatLng> for (f64, f64) {
    fn from(p: LatLng) -> Self {
        (p.lat, p.lng)
    }
}

/// Sentinel 次级指数，仅展示用，不参与判定
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SentinelData {
    pub ndvi: f64,
    pub ndwi: f64,
    pub sentinel1_date: String,
    pub sentinel2_date: String,
}

/// 田块记录 - 一个被监测的橄榄园地块
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Field {
    pub id: String,
    pub name: String,
    pub region: String,
    pub coordinates: Vec<LatLng>,
    pub center: LatLng,
    pub area_hectares: f64,
    pub trees_count: u32,
    pub stress_score: f64,
    pub moisture_level: f64,
    pub temperature_anomaly: f64,
    pub health_status: HealthStatus,
    pub yield_risk: YieldRisk,
    pub trend: Trend,
    pub last_updated: DateTime<Utc>,
    pub sentinel_data: SentinelData,
}

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum FieldError {
    #[error("字段 id 为空")]
    EmptyId,
    #[error("多边形顶点不足 3 个: {0}")]
    TooFewPoints(usize),
    #[error("重复的字段 id: {0}")]
    DuplicateId(String),
}

impl Field {
    /// 校验单条记录是否满足渲染前提
    pub fn validate(&self) -> Result<(), FieldError> {
        if self.id.trim().is_empty() {
            return Err(FieldError::EmptyId);
        }
        // 去掉闭合点后统计有效顶点
        let distinct: HashSet<_> = self
            .coordinates
            .iter()
            .map(|p| (p.lat.to_bits(), p.lng.to_bits()))
            .collect();
        if distinct.len() < 3 {
            return Err(FieldError::TooFewPoints(distinct.len()));
        }
        Ok(())
    }

    /// 归一化：胁迫指数钳位到 [0,100]，再统一重推导衍生标签。
    /// 不管数据来自远端还是 mock，标签只由这里的分类器说了算。
    pub fn normalize(&mut self) {
        self.stress_score = self.stress_score.clamp(0.0, 100.0);
        self.health_status = HealthStatus::from_score(self.stress_score);
        self.yield_risk = YieldRisk::from_score(self.stress_score);
    }
}

/// 聚合建议块（原始 dashboard 接口的 aiInsights）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiInsights {
    pub summary: String,
    pub recommendations: Vec<String>,
    pub confidence: u8,
    pub analysis_method: String,
    pub last_analysis: DateTime<Utc>,
}

/// 卫星过境状态，仅展示用
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SatelliteStatus {
    pub last_sentinel1_pass: String,
    pub last_sentinel2_pass: String,
    pub next_update: DateTime<Utc>,
    pub coverage_area: String,
}

/// 一次刷新返回的完整数据代
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldSet {
    pub fields: Vec<Field>,
    pub ai_insights: AiInsights,
    #[serde(default)]
    pub satellite_status: Option<SatelliteStatus>,
    pub generated_at: DateTime<Utc>,
}

impl FieldSet {
    /// 清洗整套数据：钳位并重推导每条记录，丢弃非法记录与重复 id。
    /// 丢弃只记日志，不让地图崩溃。
    pub fn sanitize(mut self) -> Self {
        let mut seen: HashSet<String> = HashSet::new();
        self.fields.retain_mut(|field| {
            field.normalize();
            if let Err(e) = field.validate() {
                warn!("丢弃非法田块记录 [{}]: {}", field.id, e);
                return false;
            }
            if !seen.insert(field.id.clone()) {
                warn!("丢弃非法田块记录 [{}]: {}", field.id, FieldError::DuplicateId(field.id.clone()));
                return false;
            }
            true
        });
        self
    }
}
