use super::{to_data_url, ClientConfig};
use crate::error::{Result, VideoError};
use reqwest::Client;
use tracing::info;
use url::Url;

/// 文生图服务，请求形式为 `GET <endpoint>/<prompt>`
#[derive(Debug, Clone)]
pub struct ImageClient {
    endpoint: String,
    client: Client,
}

impl ImageClient {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        Ok(Self {
            endpoint: config.image_endpoint.clone(),
            client: config.http_client()?,
        })
    }

    /// 生成图片，返回内嵌的 `data:` 数据
    pub async fn generate_image(&self, prompt: &str) -> Result<String> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(VideoError::ApiError("Prompt is required.".to_string()));
        }
        info!("Generating image for prompt: {}", prompt);

        let url = prompt_url(&self.endpoint, prompt)?;
        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(VideoError::ApiError(format!(
                "Image generation API error ({}): {}",
                status, error_text
            )));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("image/jpeg")
            .to_string();
        let bytes = response.bytes().await?;

        info!("Received image ({} bytes, {})", bytes.len(), content_type);
        Ok(to_data_url(&content_type, &bytes))
    }
}

fn prompt_url(endpoint: &str, prompt: &str) -> Result<Url> {
    let mut url = Url::parse(endpoint).map_err(|e| {
        VideoError::ConfigError(format!("invalid image endpoint {}: {}", endpoint, e))
    })?;
    url.path_segments_mut()
        .map_err(|_| {
            VideoError::ConfigError(format!("image endpoint {} cannot take a path", endpoint))
        })?
        .pop_if_empty()
        .push(prompt);
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::serve_once;

    fn client(endpoint: String) -> ImageClient {
        let config = ClientConfig {
            image_endpoint: endpoint,
            ..ClientConfig::default()
        };
        ImageClient::new(&config).unwrap()
    }

    #[test]
    fn prompt_is_percent_encoded_as_path_segment() {
        let url = prompt_url("https://image.example/prompt", "a red fox / night").unwrap();
        assert_eq!(url.as_str(), "https://image.example/prompt/a%20red%20fox%20%2F%20night");
    }

    #[tokio::test]
    async fn returns_embedded_payload() {
        let endpoint = serve_once(200, "image/png", vec![1, 2, 3]).await;
        let data_url = client(endpoint).generate_image("a fox").await.unwrap();
        assert_eq!(data_url, "data:image/png;base64,AQID");
    }

    #[tokio::test]
    async fn empty_prompt_is_rejected() {
        let err = client(crate::api::DEFAULT_IMAGE_ENDPOINT.into())
            .generate_image("   ")
            .await
            .unwrap_err();
        assert!(matches!(err, VideoError::ApiError(_)));
    }

    #[tokio::test]
    async fn service_error_is_reported() {
        let endpoint = serve_once(500, "text/plain", b"busy".to_vec()).await;
        let err = client(endpoint).generate_image("a fox").await.unwrap_err();
        assert!(err.to_string().contains("busy"), "{err}");
    }
}
