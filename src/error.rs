use thiserror::Error;

#[derive(Error, Debug)]
pub enum VideoError {
    #[error("{}", asset_message(.scene, .reference, .reason))]
    AssetUnavailable {
        /// 素材所属场景的序号（从 1 开始）
        scene: Option<usize>,
        reference: String,
        reason: String,
    },

    #[error("Transcoding engine failed to initialize: {0}")]
    EngineInitialization(String),

    #[error("Transcoding command `{}` failed: {}", .command.join(" "), .diagnostic)]
    EngineExecution {
        command: Vec<String>,
        diagnostic: String,
    },

    #[error("{0}")]
    IncompletePrerequisites(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("HTTP request error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl VideoError {
    pub fn asset(reference: &str, reason: impl Into<String>) -> Self {
        VideoError::AssetUnavailable {
            scene: None,
            reference: abbreviate(reference),
            reason: reason.into(),
        }
    }

    pub fn engine_exec(command: &[String], diagnostic: impl Into<String>) -> Self {
        VideoError::EngineExecution {
            command: command.to_vec(),
            diagnostic: diagnostic.into(),
        }
    }

    /// 给素材错误补上场景序号，其他错误原样返回
    pub fn for_scene(self, position: usize) -> Self {
        match self {
            VideoError::AssetUnavailable {
                reference, reason, ..
            } => VideoError::AssetUnavailable {
                scene: Some(position),
                reference,
                reason,
            },
            other => other,
        }
    }
}

fn asset_message(scene: &Option<usize>, reference: &str, reason: &str) -> String {
    match scene {
        Some(position) => format!(
            "Asset unavailable for scene {}: {} ({})",
            position, reason, reference
        ),
        None => format!("Asset unavailable: {} ({})", reason, reference),
    }
}

// data 地址可能有几 MB，错误信息里只保留开头
fn abbreviate(reference: &str) -> String {
    const MAX: usize = 64;
    if reference.chars().count() <= MAX {
        reference.to_string()
    } else {
        let head: String = reference.chars().take(MAX).collect();
        format!("{}…", head)
    }
}

pub type Result<T> = std::result::Result<T, VideoError>;
