use anyhow::{bail, Context};
use chrono::{DateTime, Utc};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use storyreel::api::social::default_caption;
use storyreel::api::{
    ClientConfig, ImageClient, PostQueue, PostStatus, SocialClient, SocialNetwork, VoiceClient,
    DEFAULT_IMAGE_ENDPOINT, DEFAULT_TWITTER_ENDPOINT, DEFAULT_VOICE_ENDPOINT,
};
use storyreel::scene::{derive_scenes, format_runtime, Storyboard};
use storyreel::video::{AssetResolver, EngineSession, RenderOrchestrator, SUGGESTED_FILENAME};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "storyreel")]
#[command(about = "Turn a narrative script into a narrated slideshow video", long_about = None)]
struct Args {
    /// Script text
    #[arg(short, long)]
    text: Option<String>,

    /// Script file path
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Storyboard JSON to render instead of deriving scenes from a script
    #[arg(short, long, conflicts_with_all = ["text", "file"])]
    storyboard: Option<PathBuf>,

    /// Write the storyboard, with generated assets, to this JSON file
    #[arg(long)]
    save_storyboard: Option<PathBuf>,

    /// Output video file path
    #[arg(short, long, default_value = SUGGESTED_FILENAME)]
    output: PathBuf,

    /// ffmpeg binary used for transcoding
    #[arg(long, env = "STORYREEL_FFMPEG", default_value = "ffmpeg")]
    ffmpeg: PathBuf,

    /// Text-to-image endpoint
    #[arg(long, env = "STORYREEL_IMAGE_ENDPOINT", default_value = DEFAULT_IMAGE_ENDPOINT)]
    image_endpoint: String,

    /// Text-to-speech endpoint
    #[arg(long, env = "STORYREEL_VOICE_ENDPOINT", default_value = DEFAULT_VOICE_ENDPOINT)]
    voice_endpoint: String,

    /// Narration language
    #[arg(long, env = "STORYREEL_VOICE_LANG", default_value = "en")]
    voice_lang: String,

    /// Post the finished video to these networks (twitter, youtube, tiktok, linkedin)
    #[arg(long, value_delimiter = ',')]
    post_to: Vec<SocialNetwork>,

    /// Post text; defaults to an excerpt of the first scene
    #[arg(long)]
    caption: Option<String>,

    /// Publish at this RFC 3339 time instead of right away
    #[arg(long)]
    schedule: Option<DateTime<Utc>>,

    /// Public link to the video, appended to the post text
    #[arg(long)]
    asset_url: Option<String>,

    /// Access token used for every network in --post-to
    #[arg(long, env = "STORYREEL_SOCIAL_TOKEN", hide_env_values = true)]
    social_token: Option<String>,

    /// Endpoint for X / Twitter posts
    #[arg(long, env = "STORYREEL_TWITTER_ENDPOINT", default_value = DEFAULT_TWITTER_ENDPOINT)]
    twitter_endpoint: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 加载环境变量
    dotenvy::dotenv().ok();

    // 初始化日志
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_level(true)
        .init();

    // 解析命令行参数
    let args = Args::parse();

    let mut storyboard = load_storyboard(&args).await?;
    info!(
        "Storyboard has {} scenes, {} total runtime",
        storyboard.len(),
        format_runtime(storyboard.total_duration())
    );
    let tags = storyboard.keyword_tags();
    if !tags.is_empty() {
        let hashtags: Vec<String> = tags.iter().map(|t| format!("#{}", t)).collect();
        info!("Tags: {}", hashtags.join(" "));
    }

    let config = ClientConfig {
        image_endpoint: args.image_endpoint.clone(),
        voice_endpoint: args.voice_endpoint.clone(),
        voice_lang: args.voice_lang.clone(),
        twitter_endpoint: args.twitter_endpoint.clone(),
        ..ClientConfig::default()
    };
    // 补齐缺失的图片和配音
    generate_assets(&mut storyboard, &config).await?;

    if let Some(path) = &args.save_storyboard {
        let json = serde_json::to_string_pretty(&storyboard)?;
        tokio::fs::write(path, json)
            .await
            .with_context(|| format!("Failed to write storyboard: {}", path.display()))?;
        info!("Storyboard saved to {}", path.display());
    }

    // 合成最终视频
    let session = Arc::new(EngineSession::ffmpeg(args.ffmpeg.clone()));
    let mut orchestrator = RenderOrchestrator::new(session, AssetResolver::new());

    let url = match orchestrator.render(storyboard.scenes()).await {
        Ok(url) => url,
        Err(e) => {
            error!("Video generation failed: {}", e);
            std::process::exit(1);
        }
    };

    let blob = orchestrator
        .registry()
        .resolve(&url)
        .context("Rendered video is no longer available")?;
    tokio::fs::write(&args.output, &blob.bytes)
        .await
        .with_context(|| format!("Failed to write video: {}", args.output.display()))?;

    info!("Video saved to {} ({} bytes)", args.output.display(), blob.bytes.len());

    if !args.post_to.is_empty() {
        publish(&args, &config, &storyboard).await?;
    }
    Ok(())
}

/// 把成片发布到选定的社交平台
async fn publish(
    args: &Args,
    config: &ClientConfig,
    storyboard: &Storyboard,
) -> anyhow::Result<()> {
    let mut queue = PostQueue::new(SocialClient::new(config)?);
    let caption = args
        .caption
        .clone()
        .unwrap_or_else(|| default_caption(storyboard.scenes()));

    for network in &args.post_to {
        if let Some(token) = &args.social_token {
            queue.set_credential(*network, token.clone());
        }
        queue.enqueue(*network, caption.clone(), args.asset_url.clone(), args.schedule);
    }
    queue.dispatch().await;

    let failed: Vec<&str> = queue
        .posts()
        .iter()
        .filter(|post| post.status == PostStatus::Failed)
        .map(|post| post.network.label())
        .collect();
    if !failed.is_empty() {
        bail!("Posting failed for {}", failed.join(", "));
    }
    Ok(())
}

async fn load_storyboard(args: &Args) -> anyhow::Result<Storyboard> {
    if let Some(path) = &args.storyboard {
        let json = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read storyboard: {}", path.display()))?;
        return serde_json::from_str(&json)
            .with_context(|| format!("Invalid storyboard JSON: {}", path.display()));
    }

    let script = if let Some(text) = &args.text {
        text.clone()
    } else if let Some(path) = &args.file {
        tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read file: {}", path.display()))?
    } else {
        bail!("Either --text, --file or --storyboard must be provided");
    };

    info!("Deriving scenes from script ({} characters)", script.len());
    let scenes = derive_scenes(&script);
    if scenes.is_empty() {
        bail!("The script produced no scenes");
    }
    Ok(Storyboard::new("Untitled story", scenes))
}

/// 只为缺少图片或配音的场景生成素材
async fn generate_assets(
    storyboard: &mut Storyboard,
    config: &ClientConfig,
) -> anyhow::Result<()> {
    let images = ImageClient::new(config)?;
    let voice = VoiceClient::new(config)?;
    let total = storyboard.len();

    for (idx, scene) in storyboard.scenes.iter_mut().enumerate() {
        if scene.image_url.is_none() {
            match images.generate_image(&scene.image_prompt).await {
                Ok(data_url) => {
                    scene.image_url = Some(data_url);
                    info!("Generated image for scene {}/{}", idx + 1, total);
                }
                Err(e) => warn!("Image for scene {} failed: {}", idx + 1, e),
            }
        }
        if scene.audio.is_none() {
            match voice.synthesize(&scene.script).await {
                Ok(track) => {
                    scene.audio = Some(track.into_audio());
                    info!("Generated narration for scene {}/{}", idx + 1, total);
                }
                Err(e) => warn!("Narration for scene {} failed: {}", idx + 1, e),
            }
        }
    }
    Ok(())
}
