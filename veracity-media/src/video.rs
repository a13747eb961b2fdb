//! Video analysis over already-decoded frames.
//!
//! Container demuxing is outside this crate; callers hand over grayscale
//! frames, the frame rate and an optional audio track.

use crate::MediaError;
use crate::audio::{AudioAnalysis, AudioContentType};
use crate::image::{GrayImage, ImageAnalysis};
use serde::{Deserialize, Serialize};
use veracity_common::AnalysisLength;

const SCENE_WIDTH: u32 = 160;
const SCENE_HEIGHT: u32 = 90;
const SCENE_CUT_THRESHOLD: f64 = 30.0;
const MIN_SCENE_SECS: f64 = 1.5;
const MIN_DETECTION_CHARS: usize = 5;

#[derive(Debug, Clone, PartialEq)]
pub struct VideoInput {
    pub fps: f64,
    pub frames: Vec<GrayImage>,
    pub audio: Option<crate::audio::AudioClip>,
}

impl VideoInput {
    pub fn new(fps: f64, frames: Vec<GrayImage>) -> Self {
        Self {
            fps,
            frames,
            audio: None,
        }
    }

    pub fn with_audio(mut self, clip: crate::audio::AudioClip) -> Self {
        self.audio = Some(clip);
        self
    }

    pub fn validate(&self) -> Result<(), MediaError> {
        if self.fps.is_nan() || self.fps <= 0.0 {
            return Err(MediaError::Decode(format!("invalid frame rate {}", self.fps)));
        }
        let Some(first) = self.frames.first() else {
            return Err(MediaError::Decode("video has no frames".to_string()));
        };
        let size = (first.width(), first.height());
        if self
            .frames
            .iter()
            .any(|f| (f.width(), f.height()) != size)
        {
            return Err(MediaError::Decode("frames differ in size".to_string()));
        }
        Ok(())
    }

    pub fn duration_secs(&self) -> f64 {
        if self.fps > 0.0 {
            self.frames.len() as f64 / self.fps
        } else {
            0.0
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyFrame {
    pub timestamp: f64,
    pub frame_index: usize,
    pub analysis: ImageAnalysis,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub timestamp: f64,
    pub magnitude: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    pub start_time: f64,
    pub end_time: f64,
    pub change_events: Vec<ChangeEvent>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextDetection {
    pub timestamp: f64,
    pub frame_index: usize,
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VideoAnalysis {
    pub duration_secs: f64,
    pub width: u32,
    pub height: u32,
    pub key_frames: Vec<KeyFrame>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_analysis: Option<AudioAnalysis>,
    pub scenes: Vec<Scene>,
    pub text_detections: Vec<TextDetection>,
    pub summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl VideoAnalysis {
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::default()
        }
    }
}

/// `(frame index, timestamp)` of evenly spaced key frames.
pub fn key_frame_indices(input: &VideoInput, length: AnalysisLength) -> Vec<(usize, f64)> {
    let count = input.frames.len();
    if count == 0 || input.fps <= 0.0 {
        return Vec::new();
    }
    let mut n = length.claim_limit();
    if count < n * 2 {
        n = (count / 2).max(1);
    }
    let interval = if n > 1 {
        count as f64 / (n - 1) as f64
    } else {
        count as f64
    };

    let mut out: Vec<(usize, f64)> = Vec::with_capacity(n);
    for i in 0..n {
        let idx = ((i as f64 * interval) as usize).min(count - 1);
        if out.last().is_some_and(|&(prev, _)| prev == idx) {
            continue;
        }
        out.push((idx, idx as f64 / input.fps));
    }
    out
}

/// Scene boundaries from downsampled frame differences.
pub fn detect_scenes(input: &VideoInput) -> Vec<Scene> {
    let count = input.frames.len();
    if count == 0 || input.fps <= 0.0 {
        return Vec::new();
    }
    let fps = input.fps;
    let step = ((fps / 2.0) as usize).max(1);
    let min_scene_frames = fps * MIN_SCENE_SECS;

    let mut scenes = Vec::new();
    let mut start = 0usize;
    let mut changes = Vec::new();
    let mut prev: Option<GrayImage> = None;

    for idx in (0..count).step_by(step) {
        let small = input.frames[idx].resize_nearest(SCENE_WIDTH, SCENE_HEIGHT);
        if let Some(p) = &prev {
            let diff = small.mean_abs_diff(p);
            if diff > SCENE_CUT_THRESHOLD && (idx - start) as f64 > min_scene_frames {
                scenes.push(Scene {
                    start_time: start as f64 / fps,
                    end_time: idx as f64 / fps,
                    change_events: std::mem::take(&mut changes),
                });
                start = idx;
            }
            if diff > SCENE_CUT_THRESHOLD / 2.0 {
                changes.push(ChangeEvent {
                    timestamp: idx as f64 / fps,
                    magnitude: diff,
                });
            }
        }
        prev = Some(small);
    }

    if start < count - 1 {
        scenes.push(Scene {
            start_time: start as f64 / fps,
            end_time: (count - 1) as f64 / fps,
            change_events: changes,
        });
    }
    scenes
}

pub fn text_detections(key_frames: &[KeyFrame]) -> Vec<TextDetection> {
    key_frames
        .iter()
        .filter(|kf| kf.analysis.extracted_text.trim().chars().count() > MIN_DETECTION_CHARS)
        .map(|kf| TextDetection {
            timestamp: kf.timestamp,
            frame_index: kf.frame_index,
            text: kf.analysis.extracted_text.trim().to_string(),
        })
        .collect()
}

pub fn summarize(
    input: &VideoInput,
    audio: Option<&AudioAnalysis>,
    scenes: &[Scene],
    detections: &[TextDetection],
) -> String {
    let mut parts = Vec::new();

    let duration = input.duration_secs();
    let (minutes, seconds) = ((duration / 60.0) as u64, (duration % 60.0) as u64);
    parts.push(format!("Video o délce {minutes}:{seconds:02} minut."));

    if let Some(first) = input.frames.first() {
        let (w, h) = (first.width(), first.height());
        let category = if w >= 1920 || h >= 1080 {
            "vysoké (HD)"
        } else if w >= 1280 || h >= 720 {
            "střední (HD)"
        } else {
            "nízké"
        };
        parts.push(format!("Video má {category} rozlišení ({w}x{h})."));
    }

    if !scenes.is_empty() {
        parts.push(format!("Video obsahuje {} různých scén.", scenes.len()));
    }
    if !detections.is_empty() {
        parts.push(format!(
            "Ve videu byl detekován text v {} snímcích.",
            detections.len()
        ));
    }

    if let Some(audio) = audio.filter(|a| a.error.is_none()) {
        let words = audio.transcript.split_whitespace().count();
        if words > 0 {
            parts.push(format!("Audio stopa obsahuje přibližně {words} slov."));
        }
        match audio.features.as_ref().map(|f| f.content_type) {
            Some(AudioContentType::Speech) => parts.push("Audio stopa obsahuje převážně řeč.".into()),
            Some(AudioContentType::Music) => parts.push("Audio stopa obsahuje převážně hudbu.".into()),
            Some(AudioContentType::Mixed) => {
                parts.push("Audio stopa obsahuje kombinaci řeči a hudby.".into())
            }
            Some(AudioContentType::Noise) | None => {}
        }
    }

    if parts.is_empty() {
        "Video neobsahuje žádné významné prvky k analýze.".to_string()
    } else {
        parts.join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frames(values: &[u8], width: u32, height: u32) -> Vec<GrayImage> {
        values
            .iter()
            .map(|&v| GrayImage::filled(width, height, v).unwrap())
            .collect()
    }

    #[test]
    fn key_frames_follow_length_profile() {
        let input = VideoInput::new(10.0, frames(&[0; 100], 4, 4));
        let idx = key_frame_indices(&input, AnalysisLength::Standard);
        assert_eq!(idx.len(), 5);
        assert_eq!(idx[0], (0, 0.0));
        assert_eq!(idx[1].0, 25);
        assert_eq!(idx.last().map(|k| k.0), Some(99));
        assert_eq!(key_frame_indices(&input, AnalysisLength::Exhaustive).len(), 12);
    }

    #[test]
    fn short_videos_get_fewer_key_frames() {
        let input = VideoInput::new(10.0, frames(&[0; 6], 4, 4));
        // 6 < 2 * 5, so n = 6 / 2.
        let idx = key_frame_indices(&input, AnalysisLength::Standard);
        assert_eq!(idx.iter().map(|k| k.0).collect::<Vec<_>>(), vec![0, 3, 5]);

        let single = VideoInput::new(10.0, frames(&[0], 4, 4));
        assert_eq!(key_frame_indices(&single, AnalysisLength::Brief), vec![(0, 0.0)]);
    }

    #[test]
    fn hard_cut_splits_scenes() {
        // 4 s at 4 fps: two seconds dark, two seconds bright.
        let mut values = vec![10u8; 8];
        values.extend(vec![200u8; 8]);
        let input = VideoInput::new(4.0, frames(&values, 320, 180));

        let scenes = detect_scenes(&input);
        assert_eq!(scenes.len(), 2);
        assert_eq!(scenes[0].start_time, 0.0);
        assert_eq!(scenes[0].end_time, 2.0);
        assert!(scenes[0].change_events.is_empty());
        assert_eq!(scenes[1].start_time, 2.0);
        assert_eq!(scenes[1].change_events.len(), 1);
        assert_eq!(scenes[1].end_time, 15.0 / 4.0);
    }

    #[test]
    fn early_flicker_does_not_cut() {
        // The flash lands before the minimum scene length.
        let values = [10u8, 10, 200, 10, 10, 10, 10, 10];
        let input = VideoInput::new(4.0, frames(&values, 16, 9));
        let scenes = detect_scenes(&input);
        assert_eq!(scenes.len(), 1);
        assert_eq!(scenes[0].change_events.len(), 2);
    }

    #[test]
    fn invalid_input_is_rejected() {
        assert!(VideoInput::new(0.0, frames(&[0], 4, 4)).validate().is_err());
        assert!(VideoInput::new(25.0, Vec::new()).validate().is_err());
        let mut mixed = frames(&[0], 4, 4);
        mixed.push(GrayImage::filled(8, 8, 0).unwrap());
        assert!(VideoInput::new(25.0, mixed).validate().is_err());
    }

    #[test]
    fn summary_reports_duration_and_resolution() {
        let input = VideoInput::new(1.0, frames(&[0; 75], 1280, 720));
        let scenes = vec![Scene {
            start_time: 0.0,
            end_time: 74.0,
            change_events: Vec::new(),
        }];
        assert_eq!(
            summarize(&input, None, &scenes, &[]),
            "Video o délce 1:15 minut. Video má střední (HD) rozlišení (1280x720). Video obsahuje 1 různých scén."
        );
    }

    #[test]
    fn short_text_is_not_a_detection() {
        let kf = |text: &str| KeyFrame {
            timestamp: 1.0,
            frame_index: 10,
            analysis: ImageAnalysis {
                extracted_text: text.to_string(),
                ..ImageAnalysis::default()
            },
        };
        let found = text_detections(&[kf("OK"), kf("Inflace 12 %")]);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].text, "Inflace 12 %");
        assert_eq!(found[0].timestamp, 1.0);
    }
}
