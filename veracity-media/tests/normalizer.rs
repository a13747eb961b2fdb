mod common;

use std::io::Cursor;
use std::sync::Arc;
use veracity_common::AnalysisLength;
use veracity_media::audio::{AudioClip, AudioContentType};
use veracity_media::image::GrayImage;
use veracity_media::recognize::{NoRecognizer, PresetText};
use veracity_media::video::VideoInput;
use veracity_media::MediaNormalizer;

fn wav(rate: u32, samples: &[f32]) -> Vec<u8> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        for s in samples {
            writer.write_sample((s * f32::from(i16::MAX)) as i16).unwrap();
        }
        writer.finalize().unwrap();
    }
    cursor.into_inner()
}

fn tone(secs: f64, rate: u32) -> Vec<f32> {
    (0..(secs * f64::from(rate)) as usize)
        .map(|i| 0.3 * (2.0 * std::f64::consts::PI * 440.0 * i as f64 / f64::from(rate)).sin() as f32)
        .collect()
}

#[tokio::test]
async fn wav_audio_gets_transcript_features_and_segments() -> anyhow::Result<()> {
    common::init_test_tracing();

    let clip = AudioClip::from_wav_bytes(&wav(8_000, &tone(2.0, 8_000)))?;
    let normalizer = MediaNormalizer::new(
        Arc::new(NoRecognizer),
        Arc::new(PresetText("Inflace loni dosáhla 15 procent.".into())),
    );
    let analysis = normalizer.normalize_audio(&clip, "cs").await;

    assert!(analysis.error.is_none());
    assert_eq!(analysis.transcript, "Inflace loni dosáhla 15 procent.");
    let features = analysis.features.expect("features");
    assert!((features.loudness_rms - 0.3 / 2f64.sqrt()).abs() < 0.01);
    assert_ne!(features.content_type, AudioContentType::Speech);
    assert_eq!(analysis.speaker_segments.len(), 1);
    assert_eq!(analysis.dominant_emotion, "neutral");
    assert!(analysis.summary.contains("Transkripce obsahuje 5 slov."));
    Ok(())
}

#[tokio::test]
async fn video_combines_key_frames_scenes_and_audio() -> anyhow::Result<()> {
    common::init_test_tracing();

    // 8 s at 2 fps; the picture changes after 4 s.
    let mut frames = Vec::new();
    for i in 0..16 {
        let value = if i < 8 { 20 } else { 220 };
        frames.push(GrayImage::filled(64, 36, value)?);
    }
    let video = VideoInput::new(2.0, frames).with_audio(AudioClip::new(8_000, tone(8.0, 8_000))?);

    let normalizer = MediaNormalizer::new(
        Arc::new(PresetText("Titulek: HDP vzrostlo o 3 %".into())),
        Arc::new(NoRecognizer),
    );
    let analysis = normalizer
        .normalize_video(&video, "cs", AnalysisLength::Brief)
        .await;

    assert!(analysis.error.is_none());
    assert_eq!(analysis.key_frames.len(), 3);
    assert_eq!(analysis.scenes.len(), 2);
    assert_eq!(analysis.scenes[1].start_time, 4.0);
    assert_eq!(analysis.text_detections.len(), 3);
    assert!(analysis.audio_analysis.is_some());
    assert!(analysis.summary.starts_with("Video o délce 0:08 minut."));
    assert!(analysis.summary.contains("Video obsahuje 2 různých scén."));
    Ok(())
}

#[tokio::test]
async fn broken_video_reports_error_with_empty_content() {
    common::init_test_tracing();

    let video = VideoInput::new(0.0, Vec::new());
    let analysis = MediaNormalizer::offline()
        .normalize_video(&video, "cs", AnalysisLength::Standard)
        .await;
    assert!(analysis.error.is_some());
    assert!(analysis.key_frames.is_empty());
    assert!(analysis.scenes.is_empty());
}
