pub mod insight;
pub mod mock;
pub mod remote;

use crate::model::FieldSet;
use async_trait::async_trait;

#[derive(thiserror::Error, Debug)]
pub enum ProviderError {
    #[error("missing env {0}")]
    MissingEnv(&'static str),
    #[error("http error: {0}")]
    Http(String),
    #[error("bad status: {0}")]
    Status(u16),
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// 田块数据提供方。每次调用都返回一套全新、独立的数据代，
/// 不得复用或修改之前返回过的结构（地图按 id 做 diff）。
#[async_trait]
pub trait FieldProvider: Send + Sync {
    async fn fetch_field_set(&self) -> Result<FieldSet, ProviderError>;
}

pub use mock::MockProvider;
pub use remote::RemoteProvider;
