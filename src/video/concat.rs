use super::engine::EngineHandle;
use crate::error::{Result, VideoError};
use tracing::info;

pub const MANIFEST_FILE: &str = "concat.txt";
pub const OUTPUT_FILE: &str = "output.mp4";

/// 每个片段一行 `file '<name>'`，保持给定顺序
pub fn build_manifest(segments: &[String]) -> String {
    segments
        .iter()
        .map(|segment| format!("file '{}'", segment))
        .collect::<Vec<_>>()
        .join("\n")
}

/// concat 分离器命令，直接复制各片段的流
pub fn concat_command() -> Vec<String> {
    [
        "-f",
        "concat",
        "-safe",
        "0",
        "-i",
        MANIFEST_FILE,
        "-c",
        "copy",
        OUTPUT_FILE,
    ]
    .iter()
    .map(|arg| arg.to_string())
    .collect()
}

/// 合成最终视频，返回使用的拼接清单
///
/// 各片段的编码参数必须一致，不会重新编码。
pub async fn concatenate(engine: &EngineHandle, segments: &[String]) -> Result<String> {
    let command = concat_command();
    if segments.is_empty() {
        return Err(VideoError::engine_exec(&command, "concat manifest lists no segments"));
    }

    let present = engine.list_files().await?;
    if let Some(missing) = segments.iter().find(|s| !present.contains(s)) {
        return Err(VideoError::engine_exec(
            &command,
            format!("segment {} is missing", missing),
        ));
    }

    info!("Concatenating {} video segments...", segments.len());
    let manifest = build_manifest(segments);
    engine.write_file(MANIFEST_FILE, manifest.as_bytes()).await?;
    engine.exec(command).await?;

    info!("Concatenated video: {}", OUTPUT_FILE);
    Ok(manifest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryEngine;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn manifest_lists_segments_in_order() {
        let manifest = build_manifest(&names(&["segment_02.mp4", "segment_01.mp4"]));
        assert_eq!(manifest, "file 'segment_02.mp4'\nfile 'segment_01.mp4'");
    }

    #[tokio::test]
    async fn empty_segment_list_is_rejected() {
        let engine = MemoryEngine::default();
        let handle = EngineHandle::new(Box::new(engine.clone()));

        let err = concatenate(&handle, &[]).await.unwrap_err();

        assert!(matches!(err, VideoError::EngineExecution { .. }));
        assert!(engine.commands().is_empty());
    }

    #[tokio::test]
    async fn missing_segment_is_rejected() {
        let engine = MemoryEngine::default();
        let handle = EngineHandle::new(Box::new(engine.clone()));
        handle.write_file("segment_01.mp4", b"one").await.unwrap();

        let err = concatenate(&handle, &names(&["segment_01.mp4", "segment_02.mp4"]))
            .await
            .unwrap_err();

        assert!(err.to_string().contains("segment_02.mp4"), "{err}");
        assert!(engine.commands().is_empty());
    }

    #[tokio::test]
    async fn writes_manifest_and_output() {
        let engine = MemoryEngine::default();
        let handle = EngineHandle::new(Box::new(engine.clone()));
        handle.write_file("segment_01.mp4", b"one,").await.unwrap();
        handle.write_file("segment_02.mp4", b"two").await.unwrap();

        let manifest = concatenate(&handle, &names(&["segment_01.mp4", "segment_02.mp4"]))
            .await
            .unwrap();

        assert_eq!(manifest, "file 'segment_01.mp4'\nfile 'segment_02.mp4'");
        assert_eq!(engine.read(MANIFEST_FILE).unwrap(), manifest.as_bytes());
        assert_eq!(engine.read(OUTPUT_FILE).unwrap(), b"one,two");
        assert_eq!(engine.commands(), vec![concat_command()]);
    }
}
