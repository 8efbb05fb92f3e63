// Unit tests for the audio sample and channel conversion helpers.

use voicetake::audio::{convert_channels, to_i16_samples, AudioFrame, CaptureConfig};

#[test]
fn test_f32_to_i16_scales_and_clamps() {
    let samples = to_i16_samples(&[0.0, 1.0, -1.0, 2.0, -2.0, 0.5]);

    assert_eq!(samples[0], 0);
    assert_eq!(samples[1], i16::MAX);
    assert_eq!(samples[2], -i16::MAX);
    assert_eq!(samples[3], i16::MAX, "above full scale clamps");
    assert_eq!(samples[4], -i16::MAX, "below full scale clamps");
    assert_eq!(samples[5], i16::MAX / 2);
}

#[test]
fn test_convert_channels_identity() {
    let samples = vec![1, 2, 3, 4];
    assert_eq!(convert_channels(samples.clone(), 2, 2), samples);
}

#[test]
fn test_convert_stereo_to_mono_averages() {
    let samples = vec![100, 200, -100, 100];
    assert_eq!(convert_channels(samples, 2, 1), vec![150, 0]);
}

#[test]
fn test_convert_quad_to_mono_averages() {
    let samples = vec![100, 200, 300, 400];
    assert_eq!(convert_channels(samples, 4, 1), vec![250]);
}

#[test]
fn test_convert_mono_to_stereo_duplicates() {
    let samples = vec![7, -7];
    assert_eq!(convert_channels(samples, 1, 2), vec![7, 7, -7, -7]);
}

#[test]
fn test_capture_config_default() {
    let config = CaptureConfig::default();

    assert_eq!(config.sample_rate, 44100);
    assert_eq!(config.channels, 2);
    assert_eq!(config.device_index, None);
}

#[test]
fn test_audio_frame_clone() {
    let frame = AudioFrame {
        samples: vec![1, 2, 3, 4, 5],
        sample_rate: 44100,
        channels: 2,
        timestamp_ms: 500,
    };

    let cloned = frame.clone();

    assert_eq!(frame.samples, cloned.samples);
    assert_eq!(frame.sample_rate, cloned.sample_rate);
    assert_eq!(frame.channels, cloned.channels);
    assert_eq!(frame.timestamp_ms, cloned.timestamp_ms);
}
