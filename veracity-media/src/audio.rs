//! Audio feature extraction over mono PCM samples.
//!
//! Features extracted:
//! - loudness (RMS amplitude)
//! - zero-crossing rate (sign changes per sample)
//! - spectral centroid and contrast from a handful of DFT frames
//! - tempo from the autocorrelation of the onset envelope
//!
//! These are coarse signal statistics used to classify the clip as speech,
//! music, noise or mixed content; they are not a recogniser.

use crate::MediaError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::f64::consts::PI;
use std::io::Cursor;

const SPECTRAL_FRAME: usize = 512;
const MAX_SPECTRAL_FRAMES: usize = 48;
const CONTRAST_BANDS: usize = 6;
const ONSET_FRAME: usize = 1024;
const ONSET_HOP: usize = 512;
const MIN_BPM: f64 = 60.0;
const MAX_BPM: f64 = 200.0;
/// Autocorrelation peak, relative to lag 0, needed to report a tempo.
const MIN_PERIODICITY: f64 = 0.3;
const VAD_FRAME_SECS: f64 = 0.03;
const VAD_MIN_THRESHOLD: f64 = 0.01;
const VAD_MAX_GAP_SECS: f64 = 0.3;
const VAD_MIN_SEGMENT_SECS: f64 = 0.2;
pub const SPEAKER_LABEL: &str = "Mluvčí 1";

#[derive(Debug, Clone, PartialEq)]
pub struct AudioClip {
    sample_rate: u32,
    samples: Vec<f32>,
}

impl AudioClip {
    pub fn new(sample_rate: u32, samples: Vec<f32>) -> Result<Self, MediaError> {
        if sample_rate == 0 {
            return Err(MediaError::Decode("sample rate is zero".to_string()));
        }
        Ok(Self {
            sample_rate,
            samples,
        })
    }

    /// Decode a WAV file, downmixing every channel to mono.
    pub fn from_wav_bytes(bytes: &[u8]) -> Result<Self, MediaError> {
        let mut reader = hound::WavReader::new(Cursor::new(bytes))
            .map_err(|e| MediaError::Decode(format!("invalid WAV: {e}")))?;
        let spec = reader.spec();
        let channels = usize::from(spec.channels.max(1));

        let interleaved: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Float => reader
                .samples::<f32>()
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| MediaError::Decode(format!("invalid WAV samples: {e}")))?,
            hound::SampleFormat::Int => {
                let full_scale = (1i64 << (spec.bits_per_sample.clamp(1, 32) - 1)) as f32;
                reader
                    .samples::<i32>()
                    .map(|s| s.map(|v| v as f32 / full_scale))
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(|e| MediaError::Decode(format!("invalid WAV samples: {e}")))?
            }
        };

        let samples = interleaved
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
            .collect();
        Self::new(spec.sample_rate, samples)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / f64::from(self.sample_rate)
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioContentType {
    Speech,
    Music,
    Noise,
    Mixed,
}

impl AudioContentType {
    pub fn classify(rms: f64, zcr: f64, tempo: f64) -> Self {
        if zcr > 0.1 && rms < 0.05 {
            Self::Speech
        } else if tempo > 100.0 && rms > 0.1 {
            Self::Music
        } else if rms > 0.2 {
            Self::Noise
        } else {
            Self::Mixed
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioFeatures {
    pub loudness_rms: f64,
    pub zero_crossing_rate: f64,
    /// Hz.
    pub spectral_centroid: f64,
    /// dB.
    pub spectral_contrast: f64,
    /// Beats per minute, 0 when no beat was found.
    pub tempo: f64,
    pub content_type: AudioContentType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeakerSegment {
    pub speaker: String,
    pub start: f64,
    pub end: f64,
}

/// Everything learned from one clip. Empty with `error` set on failure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AudioAnalysis {
    pub transcript: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub features: Option<AudioFeatures>,
    pub speaker_segments: Vec<SpeakerSegment>,
    pub dominant_emotion: String,
    pub emotion_scores: BTreeMap<String, f64>,
    pub summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AudioAnalysis {
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::default()
        }
    }
}

pub fn extract_features(clip: &AudioClip) -> AudioFeatures {
    let samples = clip.samples();
    let rms = rms(samples);
    let zcr = zero_crossing_rate(samples);
    let (centroid, contrast) = spectral_shape(samples, clip.sample_rate());
    let tempo = estimate_tempo(samples, clip.sample_rate());
    AudioFeatures {
        loudness_rms: rms,
        zero_crossing_rate: zcr,
        spectral_centroid: centroid,
        spectral_contrast: contrast,
        tempo,
        content_type: AudioContentType::classify(rms, zcr, tempo),
    }
}

fn rms(samples: &[f32]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_squares: f64 = samples.iter().map(|&s| f64::from(s).powi(2)).sum();
    (sum_squares / samples.len() as f64).sqrt()
}

fn zero_crossing_rate(samples: &[f32]) -> f64 {
    if samples.len() < 2 {
        return 0.0;
    }
    let crossings = samples
        .windows(2)
        .filter(|w| (w[0] >= 0.0) != (w[1] >= 0.0))
        .count();
    crossings as f64 / samples.len() as f64
}

/// Magnitude spectrum (bins `0..n/2`) of a Hann-windowed frame.
fn magnitude_spectrum(frame: &[f32]) -> Vec<f64> {
    let n = frame.len();
    let windowed: Vec<f64> = frame
        .iter()
        .enumerate()
        .map(|(i, &s)| {
            let w = 0.5 - 0.5 * (2.0 * PI * i as f64 / (n - 1) as f64).cos();
            f64::from(s) * w
        })
        .collect();
    (0..n / 2)
        .map(|k| {
            let (mut re, mut im) = (0.0, 0.0);
            for (i, x) in windowed.iter().enumerate() {
                let angle = 2.0 * PI * (k * i) as f64 / n as f64;
                re += x * angle.cos();
                im -= x * angle.sin();
            }
            (re * re + im * im).sqrt()
        })
        .collect()
}

/// Mean spectral centroid (Hz) and contrast (dB) over evenly spaced frames.
fn spectral_shape(samples: &[f32], sample_rate: u32) -> (f64, f64) {
    if samples.len() < SPECTRAL_FRAME {
        return (0.0, 0.0);
    }
    let available = samples.len() / SPECTRAL_FRAME;
    let frames = available.min(MAX_SPECTRAL_FRAMES);
    let stride = available / frames;
    let bin_hz = f64::from(sample_rate) / SPECTRAL_FRAME as f64;

    let (mut centroid_sum, mut contrast_sum, mut counted) = (0.0, 0.0, 0usize);
    for f in 0..frames {
        let start = f * stride * SPECTRAL_FRAME;
        let spectrum = magnitude_spectrum(&samples[start..start + SPECTRAL_FRAME]);
        let total: f64 = spectrum.iter().sum();
        if total < 1e-9 {
            continue;
        }
        let weighted: f64 = spectrum
            .iter()
            .enumerate()
            .map(|(k, m)| k as f64 * bin_hz * m)
            .sum();
        centroid_sum += weighted / total;
        contrast_sum += band_contrast(&spectrum);
        counted += 1;
    }
    if counted == 0 {
        return (0.0, 0.0);
    }
    (centroid_sum / counted as f64, contrast_sum / counted as f64)
}

/// Mean peak/valley difference in dB over octave-like bands.
fn band_contrast(spectrum: &[f64]) -> f64 {
    let mut edges = vec![1usize];
    let mut edge = spectrum.len() >> CONTRAST_BANDS;
    for _ in 0..CONTRAST_BANDS {
        edge = (edge * 2).max(edges[edges.len() - 1] + 1);
        edges.push(edge.min(spectrum.len()));
    }

    let mut diffs = Vec::new();
    for pair in edges.windows(2) {
        let (lo, hi) = (pair[0], pair[1]);
        if hi <= lo {
            continue;
        }
        let mut band: Vec<f64> = spectrum[lo..hi].to_vec();
        band.sort_by(|a, b| a.total_cmp(b));
        let take = (band.len() / 5).max(1);
        let valley = band[..take].iter().sum::<f64>() / take as f64;
        let peak = band[band.len() - take..].iter().sum::<f64>() / take as f64;
        diffs.push(20.0 * ((peak + 1e-9) / (valley + 1e-9)).log10());
    }
    if diffs.is_empty() {
        0.0
    } else {
        diffs.iter().sum::<f64>() / diffs.len() as f64
    }
}

/// Tempo in BPM from the onset-strength autocorrelation, 0 if aperiodic.
fn estimate_tempo(samples: &[f32], sample_rate: u32) -> f64 {
    if samples.len() < ONSET_FRAME * 2 {
        return 0.0;
    }
    let energies: Vec<f64> = samples
        .windows(ONSET_FRAME)
        .step_by(ONSET_HOP)
        .map(|w| w.iter().map(|&s| f64::from(s).powi(2)).sum::<f64>())
        .collect();
    let onsets: Vec<f64> = energies
        .windows(2)
        .map(|w| (w[1] - w[0]).max(0.0))
        .collect();

    let frames_per_sec = f64::from(sample_rate) / ONSET_HOP as f64;
    let min_lag = ((60.0 / MAX_BPM) * frames_per_sec).floor().max(1.0) as usize;
    let max_lag = ((60.0 / MIN_BPM) * frames_per_sec).ceil() as usize;
    if onsets.len() <= max_lag {
        return 0.0;
    }

    let autocorr = |lag: usize| -> f64 {
        onsets
            .iter()
            .zip(&onsets[lag..])
            .map(|(a, b)| a * b)
            .sum::<f64>()
    };
    let zero = autocorr(0);
    if zero <= 1e-12 {
        return 0.0;
    }

    let (best_lag, best) = (min_lag..=max_lag)
        .map(|lag| (lag, autocorr(lag)))
        .fold((0, f64::MIN), |acc, cur| if cur.1 > acc.1 { cur } else { acc });
    if best_lag == 0 || best / zero < MIN_PERIODICITY {
        return 0.0;
    }
    (60.0 * frames_per_sec / best_lag as f64).clamp(MIN_BPM, MAX_BPM)
}

/// Energy-gated voice activity, merged into segments of one speaker.
pub fn speaker_segments(clip: &AudioClip) -> Vec<SpeakerSegment> {
    let frame = ((f64::from(clip.sample_rate()) * VAD_FRAME_SECS) as usize).max(1);
    let energies: Vec<f64> = clip.samples().chunks(frame).map(rms).collect();
    if energies.is_empty() {
        return Vec::new();
    }
    let mean = energies.iter().sum::<f64>() / energies.len() as f64;
    let threshold = (mean * 0.5).max(VAD_MIN_THRESHOLD);
    let frame_secs = frame as f64 / f64::from(clip.sample_rate());

    let mut spans: Vec<(f64, f64)> = Vec::new();
    for (i, e) in energies.iter().enumerate() {
        if *e < threshold {
            continue;
        }
        let (start, end) = (i as f64 * frame_secs, (i + 1) as f64 * frame_secs);
        match spans.last_mut() {
            Some(last) if start - last.1 <= VAD_MAX_GAP_SECS => last.1 = end,
            _ => spans.push((start, end)),
        }
    }

    let duration = clip.duration_secs();
    spans
        .into_iter()
        .filter(|(s, e)| e - s >= VAD_MIN_SEGMENT_SECS)
        .map(|(start, end)| SpeakerSegment {
            speaker: SPEAKER_LABEL.to_string(),
            start,
            end: end.min(duration),
        })
        .collect()
}

/// Emotion recognition is not attempted; every clip reads as neutral.
pub fn neutral_emotions() -> (String, BTreeMap<String, f64>) {
    let scores = [
        ("neutral", 0.7),
        ("happy", 0.1),
        ("sad", 0.05),
        ("angry", 0.05),
        ("fearful", 0.05),
        ("disgusted", 0.05),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect();
    ("neutral".to_string(), scores)
}

fn emotion_name(key: &str) -> &str {
    match key {
        "neutral" => "neutrální",
        "happy" => "pozitivní",
        "sad" => "smutný",
        "angry" => "rozhněvaný",
        "fearful" => "vystrašený",
        "disgusted" => "znechucený",
        other => other,
    }
}

pub fn summarize(
    transcript: &str,
    features: &AudioFeatures,
    segments: &[SpeakerSegment],
    dominant_emotion: &str,
) -> String {
    let mut parts = vec![match features.content_type {
        AudioContentType::Speech => "Audio obsahuje převážně řeč.",
        AudioContentType::Music => "Audio obsahuje převážně hudbu.",
        AudioContentType::Noise => "Audio obsahuje převážně hluk nebo zvuky prostředí.",
        AudioContentType::Mixed => "Audio obsahuje smíšený obsah (řeč, hudba, zvuky).",
    }
    .to_string()];

    let words = transcript.split_whitespace().count();
    if words > 0 {
        parts.push(format!("Transkripce obsahuje {words} slov."));
    } else {
        parts.push("Audio neobsahuje rozpoznatelnou řeč.".to_string());
    }

    // Segments all belong to one voice until diarisation exists.
    if !segments.is_empty() {
        parts.push("V nahrávce byl identifikován jeden mluvčí.".to_string());
    }

    if !dominant_emotion.is_empty() {
        parts.push(format!(
            "Převládající emocionální tón je {}.",
            emotion_name(dominant_emotion)
        ));
    }
    parts.join(" ")
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn sine(freq: f64, amplitude: f32, secs: f64, rate: u32) -> Vec<f32> {
        let n = (secs * f64::from(rate)) as usize;
        (0..n)
            .map(|i| amplitude * (2.0 * PI * freq * i as f64 / f64::from(rate)).sin() as f32)
            .collect()
    }

    /// Short loud clicks every `period` samples over silence.
    fn click_track(period: usize, secs: f64, rate: u32) -> Vec<f32> {
        let mut out = vec![0.0f32; (secs * f64::from(rate)) as usize];
        let click = (rate / 50) as usize;
        for start in (0..out.len()).step_by(period) {
            for (j, s) in out.iter_mut().skip(start).take(click).enumerate() {
                *s = if j % 2 == 0 { 0.9 } else { -0.9 };
            }
        }
        out
    }

    #[test]
    fn classification_rules() {
        assert_eq!(AudioContentType::classify(0.03, 0.2, 0.0), AudioContentType::Speech);
        assert_eq!(AudioContentType::classify(0.15, 0.05, 120.0), AudioContentType::Music);
        assert_eq!(AudioContentType::classify(0.3, 0.05, 0.0), AudioContentType::Noise);
        assert_eq!(AudioContentType::classify(0.08, 0.05, 80.0), AudioContentType::Mixed);
    }

    #[test]
    fn sine_features() {
        let clip = AudioClip::new(8_000, sine(1_000.0, 0.5, 1.0, 8_000)).unwrap();
        let f = extract_features(&clip);
        assert!((f.loudness_rms - 0.5 / 2f64.sqrt()).abs() < 0.01);
        // 1 kHz crosses zero 2000 times per second.
        assert!((f.zero_crossing_rate - 0.25).abs() < 0.01);
        assert!((f.spectral_centroid - 1_000.0).abs() < 100.0);
        assert!(f.spectral_contrast > 10.0);
    }

    #[test]
    fn click_track_tempo() {
        // 4096 samples at 8 kHz is 117.1875 BPM.
        let clip = AudioClip::new(8_000, click_track(4_096, 8.0, 8_000)).unwrap();
        let tempo = estimate_tempo(clip.samples(), clip.sample_rate());
        assert!((tempo - 117.1875).abs() < 1.0, "tempo {tempo}");
    }

    #[test]
    fn silence_has_no_tempo_or_segments() {
        let clip = AudioClip::new(8_000, vec![0.0; 16_000]).unwrap();
        let f = extract_features(&clip);
        assert_eq!(f.tempo, 0.0);
        assert_eq!(f.loudness_rms, 0.0);
        assert!(speaker_segments(&clip).is_empty());
    }

    #[test]
    fn voice_activity_segments() {
        let rate = 8_000;
        let mut samples = vec![0.0f32; rate as usize];
        samples.extend(sine(200.0, 0.4, 1.0, rate));
        samples.extend(vec![0.0f32; rate as usize]);
        let clip = AudioClip::new(rate, samples).unwrap();

        let segs = speaker_segments(&clip);
        assert_eq!(segs.len(), 1);
        assert_eq!(segs[0].speaker, "Mluvčí 1");
        assert!((segs[0].start - 1.0).abs() < 0.05);
        assert!((segs[0].end - 2.0).abs() < 0.05);
    }

    #[test]
    fn decodes_stereo_wav() {
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 16_000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            for _ in 0..100 {
                writer.write_sample(i16::MAX / 2).unwrap();
                writer.write_sample(0i16).unwrap();
            }
            writer.finalize().unwrap();
        }
        let clip = AudioClip::from_wav_bytes(&cursor.into_inner()).unwrap();
        assert_eq!(clip.sample_rate(), 16_000);
        assert_eq!(clip.samples().len(), 100);
        assert!((clip.samples()[0] - 0.25).abs() < 0.01);

        assert!(matches!(
            AudioClip::from_wav_bytes(b"not a wav"),
            Err(MediaError::Decode(_))
        ));
    }

    #[test]
    fn summary_in_czech() {
        let features = AudioFeatures {
            loudness_rms: 0.03,
            zero_crossing_rate: 0.2,
            spectral_centroid: 900.0,
            spectral_contrast: 20.0,
            tempo: 0.0,
            content_type: AudioContentType::Speech,
        };
        let seg = SpeakerSegment {
            speaker: SPEAKER_LABEL.into(),
            start: 0.0,
            end: 1.0,
        };
        assert_eq!(
            summarize("Dobrý den všem", &features, &[seg], "neutral"),
            "Audio obsahuje převážně řeč. Transkripce obsahuje 3 slov. V nahrávce byl identifikován jeden mluvčí. Převládající emocionální tón je neutrální."
        );
    }
}
