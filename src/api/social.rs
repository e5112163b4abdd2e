use super::ClientConfig;
use crate::error::{Result, VideoError};
use crate::scene::Scene;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use tokio::time::{sleep_until, Instant};
use tracing::{info, warn};
use uuid::Uuid;

/// 可以投递成片的社交平台
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SocialNetwork {
    Twitter,
    Youtube,
    Tiktok,
    Linkedin,
}

impl SocialNetwork {
    pub const ALL: [SocialNetwork; 4] = [
        SocialNetwork::Twitter,
        SocialNetwork::Youtube,
        SocialNetwork::Tiktok,
        SocialNetwork::Linkedin,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            SocialNetwork::Twitter => "twitter",
            SocialNetwork::Youtube => "youtube",
            SocialNetwork::Tiktok => "tiktok",
            SocialNetwork::Linkedin => "linkedin",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SocialNetwork::Twitter => "X / Twitter",
            SocialNetwork::Youtube => "YouTube Shorts",
            SocialNetwork::Tiktok => "TikTok",
            SocialNetwork::Linkedin => "LinkedIn",
        }
    }
}

impl fmt::Display for SocialNetwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for SocialNetwork {
    type Err = VideoError;

    fn from_str(s: &str) -> Result<Self> {
        let name = s.trim().to_lowercase();
        if name == "x" {
            return Ok(SocialNetwork::Twitter);
        }
        SocialNetwork::ALL
            .into_iter()
            .find(|network| network.id() == name)
            .ok_or_else(|| VideoError::ConfigError(format!("unknown social network: {}", s)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    Pending,
    Posting,
    Posted,
    Failed,
}

/// 队列里的一条投递
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SocialPost {
    pub id: String,
    pub network: SocialNetwork,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduled_for: Option<DateTime<Utc>>,
    pub status: PostStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// 默认文案：取第一个场景旁白的前 80 个字符
pub fn default_caption(scenes: &[Scene]) -> String {
    match scenes.first() {
        Some(scene) => {
            let excerpt: String = scene.script.chars().take(80).collect();
            format!("🎬 New drop: {}…", excerpt)
        }
        None => "New video dropping today!".to_string(),
    }
}

#[derive(Serialize)]
struct TweetRequest {
    text: String,
}

#[derive(Deserialize)]
struct TwitterErrorBody {
    error: Option<TwitterErrorDetail>,
    title: Option<String>,
}

#[derive(Deserialize)]
struct TwitterErrorDetail {
    message: Option<String>,
}

/// 直接调用平台接口发帖，目前只有 X / Twitter 可用
#[derive(Debug, Clone)]
pub struct SocialClient {
    twitter_endpoint: String,
    client: Client,
}

impl SocialClient {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        Ok(Self {
            twitter_endpoint: config.twitter_endpoint.clone(),
            client: config.http_client()?,
        })
    }

    pub async fn publish(
        &self,
        network: SocialNetwork,
        token: &str,
        message: &str,
        asset_url: Option<&str>,
    ) -> Result<()> {
        if token.trim().is_empty() {
            return Err(VideoError::ApiError("Access token is required.".to_string()));
        }
        if message.trim().is_empty() {
            return Err(VideoError::ApiError("Message is required.".to_string()));
        }

        match network {
            SocialNetwork::Twitter => self.post_tweet(token, message, asset_url).await,
            other => Err(VideoError::ApiError(format!(
                "Direct posting for {} is not implemented. \
                 Provide a custom webhook or extend the posting client.",
                other
            ))),
        }
    }

    async fn post_tweet(&self, token: &str, message: &str, asset_url: Option<&str>) -> Result<()> {
        let text = match asset_url {
            Some(url) if !url.is_empty() => format!("{}\n{}", message, url),
            _ => message.to_string(),
        };
        info!("Posting to X / Twitter ({} characters)", text.chars().count());

        let response = self
            .client
            .post(&self.twitter_endpoint)
            .bearer_auth(token)
            .json(&TweetRequest { text })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response
                .json::<TwitterErrorBody>()
                .await
                .ok()
                .and_then(|body| body.error.and_then(|e| e.message).or(body.title))
                .unwrap_or_else(|| "Twitter API rejected the request.".to_string());
            return Err(VideoError::ApiError(format!("{} ({})", detail, status)));
        }

        info!("Tweet published");
        Ok(())
    }
}

/// 待发布队列：按计划时间依次投递，并记录每条的状态
pub struct PostQueue {
    client: SocialClient,
    credentials: HashMap<SocialNetwork, String>,
    posts: Vec<SocialPost>,
}

impl PostQueue {
    pub fn new(client: SocialClient) -> Self {
        Self {
            client,
            credentials: HashMap::new(),
            posts: Vec::new(),
        }
    }

    /// 设置平台令牌；空字符串会移除已有令牌
    pub fn set_credential(&mut self, network: SocialNetwork, token: impl Into<String>) {
        let token = token.into();
        if token.trim().is_empty() {
            self.credentials.remove(&network);
        } else {
            self.credentials.insert(network, token.trim().to_string());
        }
    }

    pub fn enqueue(
        &mut self,
        network: SocialNetwork,
        message: impl Into<String>,
        asset_url: Option<String>,
        scheduled_for: Option<DateTime<Utc>>,
    ) -> String {
        let id = Uuid::new_v4().to_string();
        self.posts.push(SocialPost {
            id: id.clone(),
            network,
            message: message.into(),
            asset_url,
            scheduled_for,
            status: PostStatus::Pending,
            error: None,
        });
        id
    }

    pub fn posts(&self) -> &[SocialPost] {
        &self.posts
    }

    pub fn post(&self, id: &str) -> Option<&SocialPost> {
        self.posts.iter().find(|post| post.id == id)
    }

    /// 投递所有待发布的条目，未到时间的先等待。返回按投递顺序排列的 id。
    pub async fn dispatch(&mut self) -> Vec<String> {
        let mut order: Vec<usize> = (0..self.posts.len())
            .filter(|&index| self.posts[index].status == PostStatus::Pending)
            .collect();
        // 立即发布的排在前面，其余按计划时间
        order.sort_by_key(|&index| self.posts[index].scheduled_for);

        let mut dispatched = Vec::with_capacity(order.len());
        for index in order {
            if let Some(at) = self.posts[index].scheduled_for {
                wait_until(at).await;
            }
            self.posts[index].status = PostStatus::Posting;

            let post = &self.posts[index];
            let outcome = match self.credentials.get(&post.network) {
                Some(token) => {
                    self.client
                        .publish(post.network, token, &post.message, post.asset_url.as_deref())
                        .await
                }
                None => Err(VideoError::ApiError(format!(
                    "Missing access token for {}",
                    post.network.label()
                ))),
            };

            let post = &mut self.posts[index];
            match outcome {
                Ok(()) => {
                    info!("Posted to {}", post.network.label());
                    post.status = PostStatus::Posted;
                    post.error = None;
                }
                Err(e) => {
                    warn!("Posting to {} failed: {}", post.network.label(), e);
                    post.status = PostStatus::Failed;
                    post.error = Some(e.to_string());
                }
            }
            dispatched.push(post.id.clone());
        }
        dispatched
    }
}

async fn wait_until(at: DateTime<Utc>) {
    // 已经过去的时间点换算为零延迟
    let delay = (at - Utc::now()).to_std().unwrap_or_default();
    if !delay.is_zero() {
        info!("Waiting until {} to post", at.to_rfc3339());
        sleep_until(Instant::now() + delay).await;
    }
}
