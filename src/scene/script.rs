use super::{Scene, MAX_SCENE_SECONDS, MIN_SCENE_SECONDS};

/// 每个词的朗读时长（秒）
const SECONDS_PER_WORD: f64 = 0.45;

/// 估算朗读时长，不低于场景最短时长
pub fn estimate_duration(text: &str) -> u32 {
    let words = text.split_whitespace().count() as f64;
    ((words * SECONDS_PER_WORD).round() as u32).max(MIN_SCENE_SECONDS)
}

/// 把脚本拆分为分镜
///
/// 以空行分隔的段落各成一个场景；只有一段时改为每两句一个场景。
pub fn derive_scenes(script: &str) -> Vec<Scene> {
    let paragraphs: Vec<String> = script
        .split("\n\n")
        .map(|p| p.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|p| !p.is_empty())
        .collect();

    let beats = if paragraphs.len() == 1 {
        sentences(&paragraphs[0])
            .chunks(2)
            .map(|pair| pair.join(" "))
            .collect()
    } else {
        paragraphs
    };

    beats
        .into_iter()
        .enumerate()
        .map(|(i, text)| {
            let prompt = sentences(&text)
                .into_iter()
                .next()
                .unwrap_or_else(|| text.clone());
            let duration = estimate_duration(&text).min(MAX_SCENE_SECONDS);
            Scene::new(format!("Scene {}", i + 1), text, prompt, duration)
        })
        .collect()
}

fn sentences(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    for ch in text.chars() {
        current.push(ch);
        if matches!(ch, '.' | '!' | '?') {
            let sentence = current.trim();
            if !sentence.is_empty() {
                out.push(sentence.to_string());
            }
            current.clear();
        }
    }
    let rest = current.trim();
    if !rest.is_empty() {
        out.push(rest.to_string());
    }
    out
}
