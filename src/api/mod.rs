pub mod images;
pub mod social;
pub mod voice;

use crate::error::{Result, VideoError};
use reqwest::Client;
use std::time::Duration;

pub use images::ImageClient;
pub use social::{PostQueue, PostStatus, SocialClient, SocialNetwork, SocialPost};
pub use voice::{VoiceClient, VoiceTrack};

pub const DEFAULT_IMAGE_ENDPOINT: &str = "https://image.pollinations.ai/prompt";
pub const DEFAULT_VOICE_ENDPOINT: &str = "https://translate.google.com/translate_tts";
pub const DEFAULT_TWITTER_ENDPOINT: &str = "https://api.twitter.com/2/tweets";

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub image_endpoint: String,
    pub voice_endpoint: String,
    /// 配音语言代码，例如 `en`
    pub voice_lang: String,
    pub twitter_endpoint: String,
    pub timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            image_endpoint: DEFAULT_IMAGE_ENDPOINT.to_string(),
            voice_endpoint: DEFAULT_VOICE_ENDPOINT.to_string(),
            voice_lang: "en".to_string(),
            twitter_endpoint: DEFAULT_TWITTER_ENDPOINT.to_string(),
            timeout: Duration::from_secs(300),
        }
    }
}

impl ClientConfig {
    pub fn http_client(&self) -> Result<Client> {
        Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| VideoError::ConfigError(format!("failed to create HTTP client: {}", e)))
    }
}

/// 把字节编码为 `data:` 地址
pub(crate) fn to_data_url(media_type: &str, bytes: &[u8]) -> String {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;

    format!("data:{};base64,{}", media_type, STANDARD.encode(bytes))
}
