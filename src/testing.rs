use crate::error::{Result, VideoError};
use crate::scene::{Scene, SceneAudio};
use crate::video::TranscodeEngine;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;

#[derive(Default)]
struct Inner {
    files: BTreeMap<String, Vec<u8>>,
    commands: Vec<Vec<String>>,
    in_flight: usize,
    max_in_flight: usize,
}

/// 内存引擎：记录命令并模拟输出
///
/// 每个 `-i` 输入必须存在。输出文件（最后一个参数）是输入内容的拼接，
/// 拼接清单则按清单列出的文件拼接。
#[derive(Clone, Default)]
pub struct MemoryEngine {
    inner: Arc<Mutex<Inner>>,
    exec_delay: Duration,
}

impl MemoryEngine {
    pub fn with_exec_delay(mut self, millis: u64) -> Self {
        self.exec_delay = Duration::from_millis(millis);
        self
    }

    pub fn commands(&self) -> Vec<Vec<String>> {
        self.inner.lock().unwrap().commands.clone()
    }

    pub fn max_concurrent_exec(&self) -> usize {
        self.inner.lock().unwrap().max_in_flight
    }

    pub fn files(&self) -> Vec<String> {
        self.inner.lock().unwrap().files.keys().cloned().collect()
    }

    pub fn has_file(&self, name: &str) -> bool {
        self.inner.lock().unwrap().files.contains_key(name)
    }

    pub fn read(&self, name: &str) -> Option<Vec<u8>> {
        self.inner.lock().unwrap().files.get(name).cloned()
    }

    fn produce(&self, args: &[String]) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        let concat = args.windows(2).any(|w| w[0] == "-f" && w[1] == "concat");
        let inputs: Vec<&String> = args
            .windows(2)
            .filter(|w| w[0] == "-i")
            .map(|w| &w[1])
            .collect();

        let mut sources = Vec::new();
        for input in inputs {
            let bytes = inner.files.get(input.as_str()).ok_or_else(|| {
                VideoError::engine_exec(args, format!("{}: No such file or directory", input))
            })?;
            if concat {
                for line in String::from_utf8_lossy(bytes).lines() {
                    let name = line.trim_start_matches("file '").trim_end_matches('\'');
                    sources.push(name.to_string());
                }
            } else {
                sources.push(input.clone());
            }
        }

        let mut output = Vec::new();
        for source in &sources {
            let bytes = inner.files.get(source).ok_or_else(|| {
                VideoError::engine_exec(args, format!("{}: No such file or directory", source))
            })?;
            output.extend_from_slice(bytes);
        }
        if let Some(target) = args.last() {
            inner.files.insert(target.clone(), output);
        }
        Ok(())
    }
}

#[async_trait]
impl TranscodeEngine for MemoryEngine {
    async fn write_file(&self, name: &str, bytes: &[u8]) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.files.insert(name.to_string(), bytes.to_vec());
        Ok(())
    }

    async fn read_file(&self, name: &str) -> Result<Vec<u8>> {
        self.read(name).ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::NotFound, name.to_string()).into()
        })
    }

    async fn delete_file(&self, name: &str) -> Result<()> {
        self.inner.lock().unwrap().files.remove(name);
        Ok(())
    }

    async fn list_files(&self) -> Result<Vec<String>> {
        Ok(self.files())
    }

    async fn exec(&self, args: &[String]) -> Result<()> {
        {
            let mut inner = self.inner.lock().unwrap();
            inner.commands.push(args.to_vec());
            inner.in_flight += 1;
            inner.max_in_flight = inner.max_in_flight.max(inner.in_flight);
        }
        if !self.exec_delay.is_zero() {
            tokio::time::sleep(self.exec_delay).await;
        }
        let result = self.produce(args);
        self.inner.lock().unwrap().in_flight -= 1;
        result
    }
}

/// 带内嵌图片和配音的场景
pub fn ready_scene(title: &str, duration: u32) -> Scene {
    let mut scene = Scene::new(title.into(), format!("{title} narration"), title.into(), duration);
    scene.image_url = Some("data:image/jpeg;base64,/9j/AA==".into());
    scene.audio = Some(SceneAudio {
        url: "data:audio/mp3;base64,SUQz".into(),
        format: "mp3".into(),
        duration,
    });
    scene
}

/// 在本地端口上返回一次固定的 HTTP 响应，返回服务地址
pub async fn serve_once(status: u16, content_type: &str, body: Vec<u8>) -> String {
    serve_capture(status, content_type, body).await.0
}

/// 同 `serve_once`，另外交回收到的原始请求
pub async fn serve_capture(
    status: u16,
    content_type: &str,
    body: Vec<u8>,
) -> (String, oneshot::Receiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let head = format!(
        "HTTP/1.1 {} X\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        status,
        content_type,
        body.len()
    );
    let (tx, rx) = oneshot::channel();
    tokio::spawn(async move {
        if let Ok((mut socket, _)) = listener.accept().await {
            let request = read_request(&mut socket).await;
            let _ = socket.write_all(head.as_bytes()).await;
            let _ = socket.write_all(&body).await;
            let _ = socket.shutdown().await;
            let _ = tx.send(request);
        }
    });
    (format!("http://{}/asset", addr), rx)
}

// 读完请求头，再按 Content-Length 读完请求体
async fn read_request(socket: &mut TcpStream) -> String {
    let mut raw = Vec::new();
    let mut buf = [0u8; 4096];
    loop {
        let n = match socket.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => n,
        };
        raw.extend_from_slice(&buf[..n]);
        let text = String::from_utf8_lossy(&raw);
        if let Some(end) = text.find("\r\n\r\n") {
            let length = text[..end]
                .lines()
                .filter_map(|line| line.split_once(':'))
                .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
                .and_then(|(_, value)| value.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if raw.len() >= end + 4 + length {
                break;
            }
        }
    }
    String::from_utf8_lossy(&raw).into_owned()
}
