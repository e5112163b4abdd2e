use crate::error::{Result, VideoError};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tokio::process::Command;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// 拥有独立文件空间的转码引擎
///
/// 文件名是扁平的，不含目录和路径分隔符。
#[async_trait]
pub trait TranscodeEngine: Send + Sync {
    async fn write_file(&self, name: &str, bytes: &[u8]) -> Result<()>;

    async fn read_file(&self, name: &str) -> Result<Vec<u8>>;

    /// 删除不存在的文件不算错误
    async fn delete_file(&self, name: &str) -> Result<()>;

    async fn list_files(&self) -> Result<Vec<String>>;

    /// 执行一条命令直到结束，`args` 不含程序名
    async fn exec(&self, args: &[String]) -> Result<()>;
}

/// 已加载引擎的共享句柄
///
/// 文件操作直接转发；`exec` 串行执行，上一条命令结束后才开始下一条。
pub struct EngineHandle {
    engine: Box<dyn TranscodeEngine>,
    exec_lock: Mutex<()>,
}

impl EngineHandle {
    pub fn new(engine: Box<dyn TranscodeEngine>) -> Self {
        Self {
            engine,
            exec_lock: Mutex::new(()),
        }
    }

    pub async fn write_file(&self, name: &str, bytes: &[u8]) -> Result<()> {
        debug!("Writing {} ({} bytes)", name, bytes.len());
        self.engine.write_file(name, bytes).await
    }

    pub async fn read_file(&self, name: &str) -> Result<Vec<u8>> {
        self.engine.read_file(name).await
    }

    pub async fn delete_file(&self, name: &str) -> Result<()> {
        self.engine.delete_file(name).await
    }

    pub async fn list_files(&self) -> Result<Vec<String>> {
        self.engine.list_files().await
    }

    pub async fn exec(&self, args: Vec<String>) -> Result<()> {
        let _guard = self.exec_lock.lock().await;
        info!("Running transcode: {}", args.join(" "));
        self.engine.exec(&args).await
    }

    /// 清理上一次渲染留下的所有文件
    pub async fn clear(&self) -> Result<()> {
        let files = self.engine.list_files().await?;
        for name in &files {
            self.engine.delete_file(name).await?;
        }
        if !files.is_empty() {
            debug!("Cleared {} engine files", files.len());
        }
        Ok(())
    }
}

/// 基于系统 `ffmpeg` 和私有临时目录的引擎
pub struct FfmpegEngine {
    program: PathBuf,
    workspace: TempDir,
}

impl FfmpegEngine {
    /// 检查可执行文件并创建临时目录
    pub async fn load(program: impl Into<PathBuf>) -> Result<Self> {
        let program = program.into();
        info!("Loading ffmpeg from {}", program.display());

        let output = Command::new(&program)
            .arg("-version")
            .output()
            .await
            .map_err(|e| {
                VideoError::EngineInitialization(format!(
                    "failed to run {} (is it installed and on PATH?): {}",
                    program.display(),
                    e
                ))
            })?;
        if !output.status.success() {
            return Err(VideoError::EngineInitialization(format!(
                "{} -version exited with {}",
                program.display(),
                output.status
            )));
        }
        if let Some(banner) = String::from_utf8_lossy(&output.stdout).lines().next() {
            info!("{}", banner);
        }

        let workspace = tempfile::Builder::new()
            .prefix("storyreel-")
            .tempdir()
            .map_err(|e| {
                VideoError::EngineInitialization(format!("failed to create scratch dir: {}", e))
            })?;

        Ok(Self { program, workspace })
    }

    pub fn workspace(&self) -> &Path {
        self.workspace.path()
    }

    fn path_of(&self, name: &str) -> Result<PathBuf> {
        if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
            return Err(VideoError::ConfigError(format!(
                "invalid engine file name: {:?}",
                name
            )));
        }
        Ok(self.workspace.path().join(name))
    }
}

#[async_trait]
impl TranscodeEngine for FfmpegEngine {
    async fn write_file(&self, name: &str, bytes: &[u8]) -> Result<()> {
        tokio::fs::write(self.path_of(name)?, bytes).await?;
        Ok(())
    }

    async fn read_file(&self, name: &str) -> Result<Vec<u8>> {
        Ok(tokio::fs::read(self.path_of(name)?).await?)
    }

    async fn delete_file(&self, name: &str) -> Result<()> {
        match tokio::fs::remove_file(self.path_of(name)?).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn list_files(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        let mut entries = tokio::fs::read_dir(self.workspace.path()).await?;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }

    async fn exec(&self, args: &[String]) -> Result<()> {
        // 覆盖已有文件时不询问
        let output = Command::new(&self.program)
            .args(["-hide_banner", "-nostdin", "-loglevel", "error", "-y"])
            .args(args)
            .current_dir(self.workspace.path())
            .output()
            .await
            .map_err(|e| VideoError::engine_exec(args, format!("failed to run ffmpeg: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let diagnostic = match stderr.trim() {
                "" => format!("ffmpeg exited with {}", output.status),
                text => text.to_string(),
            };
            warn!("ffmpeg failed: {}", diagnostic);
            return Err(VideoError::engine_exec(args, diagnostic));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryEngine;
    use std::sync::Arc;

    #[tokio::test]
    async fn clear_removes_all_files() {
        let engine = MemoryEngine::default();
        let handle = EngineHandle::new(Box::new(engine.clone()));
        handle.write_file("a.jpg", b"a").await.unwrap();
        handle.write_file("segment_05.mp4", b"b").await.unwrap();

        handle.clear().await.unwrap();

        assert!(handle.list_files().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn exec_calls_do_not_overlap() {
        let engine = MemoryEngine::default().with_exec_delay(20);
        let handle = Arc::new(EngineHandle::new(Box::new(engine.clone())));

        let tasks: Vec<_> = (0..4)
            .map(|i| {
                let handle = handle.clone();
                tokio::spawn(async move { handle.exec(vec![format!("cmd{i}")]).await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert_eq!(engine.commands().len(), 4);
        assert_eq!(engine.max_concurrent_exec(), 1);
    }

    #[tokio::test]
    async fn ffmpeg_load_fails_for_missing_binary() {
        let err = FfmpegEngine::load("/nonexistent/storyreel-ffmpeg")
            .await
            .err()
            .expect("load should fail");
        assert!(matches!(err, VideoError::EngineInitialization(_)), "{err:?}");
    }
}
