use super::assets::AssetResolver;
use super::engine::EngineHandle;
use crate::error::{Result, VideoError};
use crate::scene::Scene;
use futures::future::try_join_all;
use tracing::info;

/// 所有片段统一的帧率
pub const FRAME_RATE: u32 = 30;
pub const AUDIO_SAMPLE_RATE: u32 = 44_100;

/// 所有片段统一输出的画布尺寸
pub const CANVAS_WIDTH: u32 = 1280;
pub const CANVAS_HEIGHT: u32 = 720;

/// 第 n 个场景（从 1 开始）在引擎中的文件名
///
/// 文件名只取决于位置，与场景 id 无关。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SceneFiles {
    pub image: String,
    pub audio: String,
    pub segment: String,
}

impl SceneFiles {
    pub fn for_position(position: usize) -> Self {
        Self {
            image: format!("image_{:02}.jpg", position),
            audio: format!("audio_{:02}.mp3", position),
            segment: format!("segment_{:02}.mp4", position),
        }
    }
}

/// 生成单个片段的编码命令
///
/// 图片循环作为视频输入，配音末尾补静音，片段长度只由 `-t` 决定。
pub fn segment_command(files: &SceneFiles, duration: u32) -> Vec<String> {
    let fps = FRAME_RATE.to_string();
    let sample_rate = AUDIO_SAMPLE_RATE.to_string();
    let duration = duration.to_string();
    // 等比缩放后居中补边，所有片段的分辨率一致，才能直接 -c copy 拼接
    let video_filter = format!(
        "scale={w}:{h}:force_original_aspect_ratio=decrease,\
         pad={w}:{h}:(ow-iw)/2:(oh-ih)/2,setsar=1",
        w = CANVAS_WIDTH,
        h = CANVAS_HEIGHT
    );
    [
        "-loop",
        "1",
        "-framerate",
        fps.as_str(),
        "-i",
        files.image.as_str(),
        "-i",
        files.audio.as_str(),
        "-map",
        "0:v:0",
        "-map",
        "1:a:0",
        "-vf",
        video_filter.as_str(),
        "-af",
        "apad",
        "-c:v",
        "libx264",
        "-tune",
        "stillimage",
        "-r",
        fps.as_str(),
        "-pix_fmt",
        "yuv420p",
        "-c:a",
        "aac",
        "-ar",
        sample_rate.as_str(),
        "-ac",
        "2",
        "-t",
        duration.as_str(),
        files.segment.as_str(),
    ]
    .iter()
    .map(|arg| arg.to_string())
    .collect()
}

struct ResolvedScene {
    position: usize,
    files: SceneFiles,
    image: Vec<u8>,
    audio: Vec<u8>,
    duration: u32,
}

/// 为每个场景编码一个独立片段
pub struct SegmentRenderer<'a> {
    engine: &'a EngineHandle,
    resolver: &'a AssetResolver,
}

impl<'a> SegmentRenderer<'a> {
    pub fn new(engine: &'a EngineHandle, resolver: &'a AssetResolver) -> Self {
        Self { engine, resolver }
    }

    /// 渲染所有场景，按场景顺序返回片段文件名
    ///
    /// 先并发获取全部素材，全部成功后才写入引擎，然后逐个写入并编码。
    pub async fn render<F>(&self, scenes: &[Scene], mut on_status: F) -> Result<Vec<String>>
    where
        F: FnMut(String),
    {
        let resolved = try_join_all(
            scenes
                .iter()
                .enumerate()
                .map(|(index, scene)| self.resolve_scene(index + 1, scene)),
        )
        .await?;

        let total = resolved.len();
        let mut segments = Vec::with_capacity(total);
        for scene in resolved {
            on_status(format!("Rendering segment {} of {}", scene.position, total));

            self.engine.write_file(&scene.files.image, &scene.image).await?;
            self.engine.write_file(&scene.files.audio, &scene.audio).await?;
            self.engine
                .exec(segment_command(&scene.files, scene.duration))
                .await?;

            info!("Created segment: {}", scene.files.segment);
            segments.push(scene.files.segment);
        }
        Ok(segments)
    }

    async fn resolve_scene(&self, position: usize, scene: &Scene) -> Result<ResolvedScene> {
        let image_ref = scene.image_url.as_deref().ok_or_else(|| {
            VideoError::asset(&scene.id, "scene has no image").for_scene(position)
        })?;
        let audio_ref = scene.audio.as_ref().map(|a| a.url.as_str()).ok_or_else(|| {
            VideoError::asset(&scene.id, "scene has no narration audio").for_scene(position)
        })?;

        let (image, audio) = futures::try_join!(
            self.resolver.resolve(image_ref),
            self.resolver.resolve(audio_ref)
        )
        .map_err(|e| e.for_scene(position))?;

        Ok(ResolvedScene {
            position,
            files: SceneFiles::for_position(position),
            image,
            audio,
            duration: scene.duration,
        })
    }
}
