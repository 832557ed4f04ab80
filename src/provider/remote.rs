use crate::model::FieldSet;
use crate::provider::{FieldProvider, ProviderError};
use async_trait::async_trait;
use log::info;
use std::time::Duration;

/// 远端 dashboard 数据源
///
/// 拉取 JSON 格式的完整田块集合。返回前统一走 `FieldSet::sanitize`，
/// 远端自带的状态标签一律不信，按本地阈值重推导。
pub struct RemoteProvider {
    client: reqwest::Client,
    url: String,
}

impl RemoteProvider {
    pub fn new(url: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self { client, url }
    }

    /// 从 OLIVEMAP_DATA_URL 环境变量构造
    pub fn from_env() -> Result<Self, ProviderError> {
        let url = std::env::var("OLIVEMAP_DATA_URL")
            .map_err(|_| ProviderError::MissingEnv("OLIVEMAP_DATA_URL"))?;
        Ok(Self::new(url))
    }
}

#[async_trait]
impl FieldProvider for RemoteProvider {
    async fn fetch_field_set(&self) -> Result<FieldSet, ProviderError> {
        let resp = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| ProviderError::Http(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ProviderError::Status(status.as_u16()));
        }

        let set: FieldSet = resp
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;
        info!("{} fetch_field_set(...) [{}]", self, self.url);
        Ok(set.sanitize())
    }
}

impl std::fmt::Display for RemoteProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<RemoteProvider [{}]>", self.url)
    }
}
