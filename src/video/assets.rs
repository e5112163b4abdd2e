use crate::error::{Result, VideoError};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use reqwest::Client;
use tracing::{debug, info};

/// 把场景的图片或配音地址解析为原始字节
///
/// `data:` 地址本地解码，其余地址通过 HTTP 下载。失败立即返回，不重试。
#[derive(Debug, Clone, Default)]
pub struct AssetResolver {
    client: Client,
}

impl AssetResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    pub async fn resolve(&self, reference: &str) -> Result<Vec<u8>> {
        if reference.starts_with("data:") {
            return decode_data_url(reference);
        }
        if reference.trim().is_empty() {
            return Err(VideoError::asset(reference, "empty asset reference"));
        }

        info!("Fetching asset: {}", reference);
        let response = self
            .client
            .get(reference)
            .send()
            .await
            .map_err(|e| VideoError::asset(reference, format!("fetch failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(VideoError::asset(reference, format!("HTTP {}", status)));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| VideoError::asset(reference, format!("failed to read body: {}", e)))?;
        debug!("Fetched {} bytes", bytes.len());
        Ok(bytes.to_vec())
    }
}

/// 解码 `data:[<media type>][;base64],<payload>` 地址
pub fn decode_data_url(reference: &str) -> Result<Vec<u8>> {
    let rest = reference
        .strip_prefix("data:")
        .ok_or_else(|| VideoError::asset(reference, "not a data payload"))?;
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| VideoError::asset(reference, "data payload has no ',' separator"))?;

    if !header.ends_with(";base64") {
        return Ok(payload.as_bytes().to_vec());
    }

    let compact: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
    STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| VideoError::asset(reference, format!("malformed base64 payload: {}", e)))
}
