use super::concat::OUTPUT_FILE;
use super::engine::EngineHandle;
use crate::error::Result;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info};
use uuid::Uuid;

pub const VIDEO_MEDIA_TYPE: &str = "video/mp4";
pub const SUGGESTED_FILENAME: &str = "agentic-story.mp4";

/// 带媒体类型的不可变二进制对象
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    pub media_type: String,
    pub bytes: Vec<u8>,
}

impl Blob {
    pub fn new(media_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            media_type: media_type.into(),
            bytes,
        }
    }
}

/// 进程内的 blob 存储，通过可撤销的 `blob:` 地址访问
#[derive(Debug, Default)]
pub struct ObjectUrlRegistry {
    objects: Mutex<HashMap<String, Arc<Blob>>>,
}

impl ObjectUrlRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_object_url(&self, blob: Blob) -> String {
        let url = format!("blob:storyreel/{}", Uuid::new_v4());
        self.objects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(url.clone(), Arc::new(blob));
        url
    }

    /// 地址不存在或已撤销时返回 false
    pub fn revoke_object_url(&self, url: &str) -> bool {
        self.objects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(url)
            .is_some()
    }

    pub fn resolve(&self, url: &str) -> Option<Arc<Blob>> {
        self.objects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(url)
            .cloned()
    }

    pub fn is_live(&self, url: &str) -> bool {
        self.resolve(url).is_some()
    }

    pub fn live_count(&self) -> usize {
        self.objects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// 把引擎输出文件发布为地址，最多保留一个有效地址
pub struct OutputMaterializer {
    registry: Arc<ObjectUrlRegistry>,
    current: Option<String>,
}

impl OutputMaterializer {
    pub fn new(registry: Arc<ObjectUrlRegistry>) -> Self {
        Self {
            registry,
            current: None,
        }
    }

    pub fn registry(&self) -> &Arc<ObjectUrlRegistry> {
        &self.registry
    }

    pub fn current_url(&self) -> Option<&str> {
        self.current.as_deref()
    }

    /// 读取输出文件并发布，同时撤销上一个地址
    ///
    /// 输出文件留在引擎里，下次渲染时覆盖。
    pub async fn materialize(&mut self, engine: &EngineHandle) -> Result<String> {
        let bytes = engine.read_file(OUTPUT_FILE).await?;
        let size = bytes.len();

        self.revoke_current();
        let url = self
            .registry
            .create_object_url(Blob::new(VIDEO_MEDIA_TYPE, bytes));
        info!("Output ready: {} ({} bytes)", url, size);
        self.current = Some(url.clone());
        Ok(url)
    }

    pub fn revoke_current(&mut self) {
        if let Some(url) = self.current.take() {
            self.registry.revoke_object_url(&url);
            debug!("Revoked {}", url);
        }
    }
}
