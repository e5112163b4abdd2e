use super::{to_data_url, ClientConfig};
use crate::error::{Result, VideoError};
use crate::scene::{estimate_duration, SceneAudio};
use reqwest::Client;
use tracing::{debug, info};
use url::Url;

/// 语音接口单次请求的最大字符数
const MAX_CHUNK_CHARS: usize = 200;

/// 一个场景的配音
#[derive(Debug, Clone, PartialEq)]
pub struct VoiceTrack {
    pub data_url: String,
    /// 估算时长（秒）
    pub duration: u32,
}

impl VoiceTrack {
    pub fn into_audio(self) -> SceneAudio {
        SceneAudio {
            url: self.data_url,
            format: "mp3".to_string(),
            duration: self.duration,
        }
    }
}

/// 文字转语音服务，返回 MP3
#[derive(Debug, Clone)]
pub struct VoiceClient {
    endpoint: String,
    lang: String,
    client: Client,
}

impl VoiceClient {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        Ok(Self {
            endpoint: config.voice_endpoint.clone(),
            lang: config.voice_lang.to_lowercase(),
            client: config.http_client()?,
        })
    }

    /// 生成语音，长文本分段请求后拼接
    pub async fn synthesize(&self, text: &str) -> Result<VoiceTrack> {
        let text = text.trim();
        if text.is_empty() {
            return Err(VideoError::ApiError("Text prompt is required.".to_string()));
        }
        info!("Generating speech for text: {}", text);

        let chunks = split_text(text, MAX_CHUNK_CHARS);
        let mut audio = Vec::new();
        for (idx, chunk) in chunks.iter().enumerate() {
            let url = self.chunk_url(chunk, idx, chunks.len())?;
            let response = self.client.get(url).send().await?;

            if !response.status().is_success() {
                let status = response.status();
                let error_text = response.text().await.unwrap_or_default();
                return Err(VideoError::ApiError(format!(
                    "TTS API error ({}): {}",
                    status, error_text
                )));
            }

            let bytes = response.bytes().await?;
            debug!("Speech chunk {}/{}: {} bytes", idx + 1, chunks.len(), bytes.len());
            audio.extend_from_slice(&bytes);
        }

        let duration = estimate_duration(text);
        info!("Speech ready ({} bytes, ~{}s)", audio.len(), duration);
        Ok(VoiceTrack {
            data_url: to_data_url("audio/mp3", &audio),
            duration,
        })
    }

    fn chunk_url(&self, chunk: &str, idx: usize, total: usize) -> Result<Url> {
        let idx = idx.to_string();
        let total = total.to_string();
        let textlen = chunk.chars().count().to_string();
        Url::parse_with_params(
            &self.endpoint,
            [
                ("ie", "UTF-8"),
                ("q", chunk),
                ("tl", self.lang.as_str()),
                ("total", total.as_str()),
                ("idx", idx.as_str()),
                ("textlen", textlen.as_str()),
                ("client", "tw-ob"),
                ("prompt", ""),
                ("ttsspeed", "1"),
            ],
        )
        .map_err(|e| {
            VideoError::ConfigError(format!("invalid voice endpoint {}: {}", self.endpoint, e))
        })
    }
}

/// 按空白切分为不超过 `max` 个字符的片段
///
/// 超长的单词直接截断
fn split_text(text: &str, max: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        let mut word = word.to_string();
        while word.chars().count() > max {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
            }
            let head: String = word.chars().take(max).collect();
            word = word.chars().skip(max).collect();
            chunks.push(head);
        }
        let separator = usize::from(!current.is_empty());
        let needed = current.chars().count() + separator + word.chars().count();
        if needed > max && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(&word);
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::serve_once;

    fn client(endpoint: String) -> VoiceClient {
        let config = ClientConfig {
            voice_endpoint: endpoint,
            voice_lang: "EN-US".into(),
            ..ClientConfig::default()
        };
        VoiceClient::new(&config).unwrap()
    }

    #[test]
    fn splits_at_word_boundaries() {
        let chunks = split_text("aaa bbb ccc dddd", 7);
        assert_eq!(chunks, vec!["aaa bbb", "ccc", "dddd"]);
        assert!(chunks.iter().all(|c| c.chars().count() <= 7));
    }

    #[test]
    fn overlong_word_is_cut() {
        assert_eq!(split_text("abcdefghij k", 4), vec!["abcd", "efgh", "ij k"]);
    }

    #[test]
    fn chunk_url_carries_text_and_language() {
        let url = client(crate::api::DEFAULT_VOICE_ENDPOINT.into())
            .chunk_url("hello world", 0, 1)
            .unwrap();
        let query: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(query.contains(&("q".into(), "hello world".into())));
        assert!(query.contains(&("tl".into(), "en-us".into())));
        assert!(query.contains(&("textlen".into(), "11".into())));
    }

    #[tokio::test]
    async fn returns_audio_payload_with_estimate() {
        let endpoint = serve_once(200, "audio/mpeg", vec![0x49, 0x44, 0x33]).await;
        let track = client(endpoint).synthesize("  a short line  ").await.unwrap();

        assert_eq!(track.data_url, "data:audio/mp3;base64,SUQz");
        assert_eq!(track.duration, 4);
        assert_eq!(track.into_audio().format, "mp3");
    }

    #[tokio::test]
    async fn blank_text_is_rejected() {
        let err = client(crate::api::DEFAULT_VOICE_ENDPOINT.into())
            .synthesize(" \n ")
            .await
            .unwrap_err();
        assert!(matches!(err, VideoError::ApiError(_)));
    }
}
