use serde::{Deserialize, Serialize};
use uuid::Uuid;

mod script;

pub use script::{derive_scenes, estimate_duration};

/// 场景时长的上下限（秒）
pub const MIN_SCENE_SECONDS: u32 = 4;
pub const MAX_SCENE_SECONDS: u32 = 18;

/// 场景的配音
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneAudio {
    /// 内嵌的 `data:` 数据或远程地址
    pub url: String,
    #[serde(default = "default_audio_format")]
    pub format: String,
    /// 配音时长（秒）
    pub duration: u32,
}

fn default_audio_format() -> String {
    "mp3".to_string()
}

/// 表示一个场景/分镜
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scene {
    pub id: String,
    pub title: String,
    /// 旁白文本
    pub script: String,
    /// 生成图片用的画面描述
    pub image_prompt: String,
    /// 内嵌的 `data:` 数据或远程地址
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio: Option<SceneAudio>,
    /// 该场景的时长（秒）
    pub duration: u32,
}

impl Scene {
    pub fn new(title: String, script: String, image_prompt: String, duration: u32) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            title,
            script,
            image_prompt,
            image_url: None,
            audio: None,
            duration: duration.clamp(MIN_SCENE_SECONDS, MAX_SCENE_SECONDS),
        }
    }

    /// 图片和配音都已就绪
    pub fn has_assets(&self) -> bool {
        self.image_url.as_deref().is_some_and(|url| !url.is_empty())
            && self.audio.as_ref().is_some_and(|audio| !audio.url.is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

/// 有序的分镜列表，顺序即渲染和拼接顺序
///
/// 修改方法都返回列表是否发生了变化，调用方据此判断已渲染的视频是否过期。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Storyboard {
    pub title: String,
    pub scenes: Vec<Scene>,
}

impl Storyboard {
    pub fn new(title: impl Into<String>, scenes: Vec<Scene>) -> Self {
        Self {
            title: title.into(),
            scenes,
        }
    }

    pub fn scenes(&self) -> &[Scene] {
        &self.scenes
    }

    pub fn len(&self) -> usize {
        self.scenes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenes.is_empty()
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.scenes.iter().position(|scene| scene.id == id)
    }

    /// 修改指定 id 的场景
    pub fn update<F>(&mut self, id: &str, edit: F) -> bool
    where
        F: FnOnce(&mut Scene),
    {
        match self.position(id) {
            Some(index) => {
                edit(&mut self.scenes[index]);
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, id: &str) -> bool {
        match self.position(id) {
            Some(index) => {
                self.scenes.remove(index);
                true
            }
            None => false,
        }
    }

    /// 在原场景后插入副本，返回新 id
    pub fn duplicate(&mut self, id: &str) -> Option<String> {
        let index = self.position(id)?;
        let mut clone = self.scenes[index].clone();
        clone.id = Uuid::new_v4().to_string();
        clone.title = format!("{} (copy)", clone.title);
        let new_id = clone.id.clone();
        self.scenes.insert(index + 1, clone);
        Some(new_id)
    }

    pub fn reorder(&mut self, id: &str, direction: Direction) -> bool {
        let Some(index) = self.position(id) else {
            return false;
        };
        let target = match direction {
            Direction::Up if index > 0 => index - 1,
            Direction::Down if index + 1 < self.scenes.len() => index + 1,
            _ => return false,
        };
        self.scenes.swap(index, target);
        true
    }

    pub fn total_duration(&self) -> u32 {
        self.scenes.iter().map(|scene| scene.duration).sum()
    }

    pub fn can_render(&self) -> bool {
        !self.scenes.is_empty() && self.scenes.iter().all(Scene::has_assets)
    }

    /// 从画面描述中取前 12 个词作为标签，按顺序去重
    pub fn keyword_tags(&self) -> Vec<String> {
        let mut tags: Vec<String> = Vec::new();
        let tokens = self
            .scenes
            .iter()
            .flat_map(|scene| scene.image_prompt.split_whitespace())
            .map(|token| {
                token
                    .chars()
                    .filter(|c| c.is_ascii_alphanumeric())
                    .collect::<String>()
                    .to_lowercase()
            })
            .filter(|token| !token.is_empty())
            .take(12);
        for token in tokens {
            if !tags.contains(&token) {
                tags.push(token);
            }
        }
        tags
    }
}

/// 把秒数格式化为 `m:ss`
pub fn format_runtime(total_seconds: u32) -> String {
    format!("{}:{:02}", total_seconds / 60, total_seconds % 60)
}
