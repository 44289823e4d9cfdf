//! Clip decoding via Symphonia
//!
//! Soundboard clips are short, so the whole file is decoded to interleaved
//! f32 PCM up front. The audio callback then only copies frames and applies
//! the volume factor, which keeps it allocation- and lock-free.

use crate::error::{EngineError, Result};
use std::fs::File;
use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

/// A fully decoded clip
#[derive(Debug, Clone)]
pub struct DecodedClip {
    /// Interleaved f32 samples
    pub samples: Vec<f32>,

    /// Channel count
    pub channels: u16,

    /// Sample rate (Hz)
    pub sample_rate: u32,
}

impl DecodedClip {
    /// Clip length in frames
    pub fn frames(&self) -> u64 {
        if self.channels == 0 {
            return 0;
        }
        (self.samples.len() / self.channels as usize) as u64
    }
}

/// Decode an audio file to interleaved f32 PCM
///
/// Supports every container/codec Symphonia's `all` feature covers (MP3,
/// FLAC, WAV, OGG, AAC, ...).
pub fn decode_file(path: &Path) -> Result<DecodedClip> {
    let display = path.display().to_string();
    let fail = |e: String| EngineError::DecodeFailed(display.clone(), e);

    let file = File::open(path)?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| fail(e.to_string()))?;

    let mut format = probed.format;
    let track = format
        .default_track()
        .ok_or_else(|| fail("no audio track".to_string()))?;
    let track_id = track.id;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| fail(e.to_string()))?;

    let mut samples = Vec::new();
    let mut channels: u16 = 0;
    let mut sample_rate: u32 = 0;
    let mut sample_buf: Option<SampleBuffer<f32>> = None;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            // End of stream
            Err(SymphoniaError::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(fail(e.to_string())),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            // Skip over recoverable decode errors (corrupt frame)
            Err(SymphoniaError::DecodeError(_)) => continue,
            Err(e) => return Err(fail(e.to_string())),
        };

        let spec = *decoded.spec();
        channels = spec.channels.count() as u16;
        sample_rate = spec.rate;

        let buf = sample_buf.get_or_insert_with(|| {
            SampleBuffer::<f32>::new(decoded.capacity() as u64, spec)
        });
        buf.copy_interleaved_ref(decoded);
        samples.extend_from_slice(buf.samples());
    }

    if samples.is_empty() || channels == 0 || sample_rate == 0 {
        return Err(fail("file contains no decodable audio".to_string()));
    }

    Ok(DecodedClip {
        samples,
        channels,
        sample_rate,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_test_wav(dir: &tempfile::TempDir, seconds: f32) -> std::path::PathBuf {
        let path = dir.path().join("clip.wav");
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 44_100,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        let frames = (44_100.0 * seconds) as u32;
        for n in 0..frames {
            let t = n as f32 / 44_100.0;
            let sample = (t * 440.0 * 2.0 * std::f32::consts::PI).sin();
            let value = (sample * i16::MAX as f32 * 0.5) as i16;
            writer.write_sample(value).unwrap();
            writer.write_sample(value).unwrap();
        }
        writer.finalize().unwrap();
        path
    }

    #[test]
    fn decodes_wav_to_interleaved_f32() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_test_wav(&dir, 0.25);

        let clip = decode_file(&path).unwrap();
        assert_eq!(clip.channels, 2);
        assert_eq!(clip.sample_rate, 44_100);
        // 0.25s at 44100 Hz
        assert_eq!(clip.frames(), 11_025);
        assert!(clip.samples.iter().any(|s| s.abs() > 0.1));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = decode_file(Path::new("/nonexistent/clip.mp3")).unwrap_err();
        assert!(matches!(err, EngineError::Io(_)));
    }

    #[test]
    fn garbage_file_fails_to_probe() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("junk.mp3");
        let mut file = File::create(&path).unwrap();
        file.write_all(b"this is not audio data at all").unwrap();

        let err = decode_file(&path).unwrap_err();
        assert!(matches!(err, EngineError::DecodeFailed(_, _)));
    }
}
