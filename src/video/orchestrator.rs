use super::assets::AssetResolver;
use super::concat;
use super::output::{ObjectUrlRegistry, OutputMaterializer};
use super::segment::SegmentRenderer;
use super::session::EngineSession;
use crate::error::{Result, VideoError};
use crate::scene::Scene;
use std::fmt;
use std::sync::Arc;
use tracing::{error, info, warn};

pub const STATUS_READY: &str = "Ready";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderStage {
    BootingEngine,
    PreparingAssets,
    RenderingSegments,
    Merging,
    Materializing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderState {
    Idle,
    Checking,
    Rendering(RenderStage),
    Ready,
    Failed,
}

impl fmt::Display for RenderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderState::Idle => write!(f, "idle"),
            RenderState::Checking => write!(f, "checking"),
            RenderState::Rendering(stage) => write!(f, "rendering ({:?})", stage),
            RenderState::Ready => write!(f, "ready"),
            RenderState::Failed => write!(f, "failed"),
        }
    }
}

type StatusListener = Box<dyn Fn(&str) + Send + Sync>;

/// 当前渲染的进度文本
#[derive(Default)]
struct StatusLog {
    history: Vec<String>,
    listener: Option<StatusListener>,
}

impl StatusLog {
    fn push(&mut self, message: String) {
        info!("Status: {}", message);
        if let Some(listener) = &self.listener {
            listener(&message);
        }
        self.history.push(message);
    }
}

/// 依次执行检查、启动引擎、渲染片段、拼接、输出
///
/// 同一时间只能有一次渲染，不支持取消和超时。
pub struct RenderOrchestrator {
    session: Arc<EngineSession>,
    resolver: AssetResolver,
    output: OutputMaterializer,
    state: RenderState,
    status: StatusLog,
    error: Option<String>,
    manifest: Option<String>,
}

impl RenderOrchestrator {
    pub fn new(session: Arc<EngineSession>, resolver: AssetResolver) -> Self {
        Self {
            session,
            resolver,
            output: OutputMaterializer::new(Arc::new(ObjectUrlRegistry::new())),
            state: RenderState::Idle,
            status: StatusLog::default(),
            error: None,
            manifest: None,
        }
    }

    /// 使用共享的 URL 注册表
    pub fn with_registry(mut self, registry: Arc<ObjectUrlRegistry>) -> Self {
        self.output = OutputMaterializer::new(registry);
        self
    }

    /// 每产生一条状态文本就回调一次
    pub fn on_status<F>(&mut self, listener: F)
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.status.listener = Some(Box::new(listener));
    }

    pub fn state(&self) -> RenderState {
        self.state
    }

    pub fn status(&self) -> Option<&str> {
        self.status.history.last().map(String::as_str)
    }

    /// 最近一次渲染的状态文本，按时间顺序
    pub fn status_history(&self) -> &[String] {
        &self.status.history
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn output_url(&self) -> Option<&str> {
        self.output.current_url()
    }

    /// 最近一次进入拼接阶段时使用的清单
    pub fn manifest(&self) -> Option<&str> {
        self.manifest.as_deref()
    }

    pub fn registry(&self) -> &Arc<ObjectUrlRegistry> {
        self.output.registry()
    }

    /// 场景列表变化后丢弃过期的视频地址
    ///
    /// 状态保持不变，需要重新调用渲染。
    pub fn invalidate(&mut self) {
        if self.output.current_url().is_some() {
            info!("Scenes changed, discarding rendered video");
            self.output.revoke_current();
        }
    }

    /// 把场景渲染成一个视频，返回其地址
    pub async fn render(&mut self, scenes: &[Scene]) -> Result<String> {
        self.output.revoke_current();
        self.status.history.clear();
        self.error = None;
        self.manifest = None;

        self.state = RenderState::Checking;
        // 检查阶段失败时不触碰引擎
        if let Err(e) = check_prerequisites(scenes) {
            return Err(self.fail(e));
        }

        match self.run_stages(scenes).await {
            Ok(url) => {
                self.state = RenderState::Ready;
                self.status.push(STATUS_READY.to_string());
                Ok(url)
            }
            Err(e) => {
                self.discard_partial_files().await;
                Err(self.fail(e))
            }
        }
    }

    async fn run_stages(&mut self, scenes: &[Scene]) -> Result<String> {
        self.enter(RenderStage::BootingEngine, "Booting ffmpeg core");
        let engine = self.session.get_engine().await?;

        self.enter(RenderStage::PreparingAssets, "Preparing scene assets");
        engine.clear().await?;

        self.state = RenderState::Rendering(RenderStage::RenderingSegments);
        let status = &mut self.status;
        let segments = SegmentRenderer::new(&engine, &self.resolver)
            .render(scenes, |message| status.push(message))
            .await?;

        self.enter(RenderStage::Merging, "Merging segments");
        let manifest = concat::concatenate(&engine, &segments).await?;
        self.manifest = Some(manifest);

        self.enter(RenderStage::Materializing, "Packaging video");
        self.output.materialize(&engine).await
    }

    fn enter(&mut self, stage: RenderStage, message: &str) {
        self.state = RenderState::Rendering(stage);
        self.status.push(message.to_string());
    }

    fn fail(&mut self, err: VideoError) -> VideoError {
        error!("Render failed: {}", err);
        self.state = RenderState::Failed;
        self.error = Some(err.to_string());
        err
    }

    async fn discard_partial_files(&self) {
        if let Some(engine) = self.session.cached() {
            if let Err(cleanup) = engine.clear().await {
                warn!("Failed to discard partial engine files: {}", cleanup);
            }
        }
    }
}

fn check_prerequisites(scenes: &[Scene]) -> Result<()> {
    if scenes.is_empty() {
        return Err(VideoError::IncompletePrerequisites(
            "Add at least one scene before rendering.".to_string(),
        ));
    }
    let zero_length: Vec<String> = scenes
        .iter()
        .enumerate()
        .filter(|(_, scene)| scene.duration == 0)
        .map(|(index, _)| (index + 1).to_string())
        .collect();
    if !zero_length.is_empty() {
        return Err(VideoError::IncompletePrerequisites(format!(
            "Every scene needs a positive duration (zero: scene {}).",
            zero_length.join(", ")
        )));
    }
    let incomplete: Vec<String> = scenes
        .iter()
        .enumerate()
        .filter(|(_, scene)| !scene.has_assets())
        .map(|(index, _)| (index + 1).to_string())
        .collect();
    if !incomplete.is_empty() {
        return Err(VideoError::IncompletePrerequisites(format!(
            "Every scene needs an image and voiceover before rendering (missing: scene {}).",
            incomplete.join(", ")
        )));
    }
    Ok(())
}
