use super::engine::{EngineHandle, FfmpegEngine, TranscodeEngine};
use crate::error::Result;
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::info;

/// 加载可用的引擎，可能较慢
#[async_trait]
pub trait EngineLoader: Send + Sync {
    async fn load(&self) -> Result<Box<dyn TranscodeEngine>>;
}

pub struct FfmpegLoader {
    program: PathBuf,
}

impl FfmpegLoader {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

#[async_trait]
impl EngineLoader for FfmpegLoader {
    async fn load(&self) -> Result<Box<dyn TranscodeEngine>> {
        let engine = FfmpegEngine::load(self.program.clone()).await?;
        info!("Engine scratch dir: {}", engine.workspace().display());
        Ok(Box::new(engine))
    }
}

/// 首次使用时加载引擎，之后的渲染复用同一个实例
///
/// 加载失败不会被缓存，下次调用 `get_engine` 会重试。
pub struct EngineSession {
    loader: Box<dyn EngineLoader>,
    engine: OnceCell<Arc<EngineHandle>>,
}

impl EngineSession {
    pub fn new(loader: impl EngineLoader + 'static) -> Self {
        Self {
            loader: Box::new(loader),
            engine: OnceCell::new(),
        }
    }

    pub fn ffmpeg(program: impl Into<PathBuf>) -> Self {
        Self::new(FfmpegLoader::new(program))
    }

    pub async fn get_engine(&self) -> Result<Arc<EngineHandle>> {
        let handle = self
            .engine
            .get_or_try_init(|| async {
                info!("Booting transcoding engine...");
                let engine = self.loader.load().await?;
                Ok::<_, crate::error::VideoError>(Arc::new(EngineHandle::new(engine)))
            })
            .await?;
        Ok(handle.clone())
    }

    /// 已加载的引擎
    pub fn cached(&self) -> Option<Arc<EngineHandle>> {
        self.engine.get().cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::VideoError;
    use crate::testing::MemoryEngine;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingLoader {
        loads: Arc<AtomicUsize>,
        failures_left: AtomicUsize,
    }

    #[async_trait]
    impl EngineLoader for CountingLoader {
        async fn load(&self) -> Result<Box<dyn TranscodeEngine>> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            let failing = self
                .failures_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if failing {
                return Err(VideoError::EngineInitialization("core missing".into()));
            }
            Ok(Box::new(MemoryEngine::default()))
        }
    }

    fn session(failures: usize) -> (EngineSession, Arc<AtomicUsize>) {
        let loads = Arc::new(AtomicUsize::new(0));
        let loader = CountingLoader {
            loads: loads.clone(),
            failures_left: AtomicUsize::new(failures),
        };
        (EngineSession::new(loader), loads)
    }

    #[tokio::test]
    async fn get_engine_loads_once() {
        let (session, loads) = session(0);
        assert!(session.cached().is_none());

        let first = session.get_engine().await.unwrap();
        let second = session.get_engine().await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(loads.load(Ordering::SeqCst), 1);
        assert!(session.cached().is_some());
    }

    #[tokio::test]
    async fn failed_load_is_retried() {
        let (session, loads) = session(1);

        let err = session.get_engine().await.err().expect("first load fails");
        assert!(matches!(err, VideoError::EngineInitialization(_)));
        assert!(session.cached().is_none());

        session.get_engine().await.unwrap();
        assert_eq!(loads.load(Ordering::SeqCst), 2);
    }
}
