pub mod field;
pub mod health;

pub use field::{AiInsights, Field, FieldError, FieldSet, LatLng, SatelliteStatus, SentinelData};
pub use health::{HealthStatus, Trend, YieldRisk};
