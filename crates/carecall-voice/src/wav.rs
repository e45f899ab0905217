//! Canonical 44-byte PCM WAV framing for captured utterances.
//!
//! The STT collaborator expects a complete RIFF/WAVE file, so the raw
//! little-endian PCM collected by the capture loop is wrapped here before upload.

use std::path::Path;

/// Size of the canonical PCM header (RIFF + fmt + data chunk headers).
pub const WAV_HEADER_LEN: usize = 44;

const PCM_FORMAT_TAG: u16 = 1;
const FMT_CHUNK_LEN: u32 = 16;

/// An encoded WAV file: fixed header followed by the utterance PCM.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WavAsset {
    bytes: Vec<u8>,
}

impl WavAsset {
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// PCM payload after the header.
    pub fn pcm(&self) -> &[u8] {
        &self.bytes[WAV_HEADER_LEN..]
    }

    pub fn header(&self) -> WavHeader {
        // Always present: every WavAsset is built by `encode_wav`.
        WavHeader::parse(&self.bytes).unwrap_or_default()
    }

    /// Playback length implied by the header.
    pub fn duration(&self) -> std::time::Duration {
        let header = self.header();
        if header.byte_rate == 0 {
            return std::time::Duration::ZERO;
        }
        std::time::Duration::from_nanos(header.data_len as u64 * 1_000_000_000 / header.byte_rate as u64)
    }

    /// Write the asset as a standalone `.wav` file (overwrites).
    pub fn save(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        std::fs::write(path, &self.bytes)
    }
}

/// Decoded view of the 44-byte header.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WavHeader {
    pub riff_chunk_size: u32,
    pub format_tag: u16,
    pub channels: u16,
    pub sample_rate: u32,
    pub byte_rate: u32,
    pub block_align: u16,
    pub bits_per_sample: u16,
    pub data_len: u32,
}

impl WavHeader {
    /// Parse a canonical header. Returns `None` for anything that is not a
    /// 44-byte-header PCM WAV.
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < WAV_HEADER_LEN
            || &bytes[0..4] != b"RIFF"
            || &bytes[8..12] != b"WAVE"
            || &bytes[12..16] != b"fmt "
            || &bytes[36..40] != b"data"
        {
            return None;
        }
        let u16_at = |i: usize| u16::from_le_bytes([bytes[i], bytes[i + 1]]);
        let u32_at = |i: usize| u32::from_le_bytes([bytes[i], bytes[i + 1], bytes[i + 2], bytes[i + 3]]);
        Some(Self {
            riff_chunk_size: u32_at(4),
            format_tag: u16_at(20),
            channels: u16_at(22),
            sample_rate: u32_at(24),
            byte_rate: u32_at(28),
            block_align: u16_at(32),
            bits_per_sample: u16_at(34),
            data_len: u32_at(40),
        })
    }
}

/// Wrap little-endian PCM bytes in a canonical WAV header.
///
/// `block_align = channels * bit_depth / 8`, `byte_rate = sample_rate * block_align`,
/// RIFF chunk size is `36 + pcm.len()`. All integer fields are little-endian.
/// Fields that would not fit their header width are clamped to the field maximum.
pub fn encode_wav(pcm: &[u8], sample_rate: u32, channels: u16, bit_depth: u16) -> WavAsset {
    let data_len = u32::try_from(pcm.len()).unwrap_or(u32::MAX);
    let block_align = u16::try_from(u32::from(channels) * u32::from(bit_depth / 8)).unwrap_or(u16::MAX);
    let byte_rate = u32::try_from(u64::from(sample_rate) * u64::from(block_align)).unwrap_or(u32::MAX);
    let riff_chunk_size = data_len.saturating_add(36);

    let mut buf = Vec::with_capacity(WAV_HEADER_LEN + pcm.len());
    // RIFF header
    buf.extend_from_slice(b"RIFF");
    buf.extend_from_slice(&riff_chunk_size.to_le_bytes());
    buf.extend_from_slice(b"WAVE");
    // fmt subchunk
    buf.extend_from_slice(b"fmt ");
    buf.extend_from_slice(&FMT_CHUNK_LEN.to_le_bytes());
    buf.extend_from_slice(&PCM_FORMAT_TAG.to_le_bytes());
    buf.extend_from_slice(&channels.to_le_bytes());
    buf.extend_from_slice(&sample_rate.to_le_bytes());
    buf.extend_from_slice(&byte_rate.to_le_bytes());
    buf.extend_from_slice(&block_align.to_le_bytes());
    buf.extend_from_slice(&bit_depth.to_le_bytes());
    // data subchunk
    buf.extend_from_slice(b"data");
    buf.extend_from_slice(&data_len.to_le_bytes());
    buf.extend_from_slice(pcm);

    WavAsset { bytes: buf }
}

/// Append i16 samples to a PCM byte buffer, little-endian.
pub fn extend_pcm_i16(buffer: &mut Vec<u8>, samples: &[i16]) {
    buffer.reserve(samples.len() * 2);
    for s in samples {
        buffer.extend_from_slice(&s.to_le_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn speech_like_pcm() -> Vec<u8> {
        let samples: Vec<i16> = (0..1600).map(|i| ((i % 64) as i16 - 32) * 400).collect();
        let mut pcm = Vec::new();
        extend_pcm_i16(&mut pcm, &samples);
        pcm
    }

    #[test]
    fn header_fields_match_inputs() {
        let pcm = speech_like_pcm();
        let wav = encode_wav(&pcm, 16000, 1, 16);
        let header = wav.header();

        assert_eq!(wav.as_bytes().len(), WAV_HEADER_LEN + pcm.len());
        assert_eq!(header.riff_chunk_size, 36 + pcm.len() as u32);
        assert_eq!(header.format_tag, 1);
        assert_eq!(header.channels, 1);
        assert_eq!(header.sample_rate, 16000);
        assert_eq!(header.byte_rate, 32000);
        assert_eq!(header.block_align, 2);
        assert_eq!(header.bits_per_sample, 16);
        assert_eq!(header.data_len, pcm.len() as u32);
        assert_eq!(wav.pcm(), pcm.as_slice());
    }

    #[test]
    fn stereo_block_align_and_byte_rate() {
        let wav = encode_wav(&[0u8; 8], 44100, 2, 16);
        let header = wav.header();
        assert_eq!(header.block_align, 4);
        assert_eq!(header.byte_rate, 44100 * 4);
    }

    #[test]
    fn empty_payload_is_still_a_valid_file() {
        let wav = encode_wav(&[], 16000, 1, 16);
        assert_eq!(wav.as_bytes().len(), WAV_HEADER_LEN);
        assert_eq!(wav.header().riff_chunk_size, 36);
        assert_eq!(wav.header().data_len, 0);
        assert_eq!(wav.duration(), std::time::Duration::ZERO);
    }

    #[test]
    fn hound_reads_back_samples_and_spec() {
        let samples: Vec<i16> = vec![0, 1, -1, 500, -500, i16::MAX, i16::MIN, 1234];
        let mut pcm = Vec::new();
        extend_pcm_i16(&mut pcm, &samples);
        let wav = encode_wav(&pcm, 16000, 1, 16);

        let reader = hound::WavReader::new(Cursor::new(wav.into_bytes())).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.channels, 1);
        assert_eq!(spec.sample_rate, 16000);
        assert_eq!(spec.bits_per_sample, 16);
        assert_eq!(spec.sample_format, hound::SampleFormat::Int);

        let decoded: Vec<i16> = reader.into_samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(decoded, samples);
    }

    #[test]
    fn duration_follows_byte_rate() {
        let wav = encode_wav(&speech_like_pcm(), 16000, 1, 16);
        assert_eq!(wav.duration(), std::time::Duration::from_millis(100));
    }

    #[test]
    fn oversized_parameters_clamp_instead_of_overflowing() {
        let wide = encode_wav(&[], u32::MAX, 2, 16);
        let header = wide.header();
        assert_eq!(header.sample_rate, u32::MAX);
        assert_eq!(header.block_align, 4);
        assert_eq!(header.byte_rate, u32::MAX);

        let many_channels = encode_wav(&[1, 2], 16000, u16::MAX, 16);
        let header = many_channels.header();
        assert_eq!(header.channels, u16::MAX);
        assert_eq!(header.block_align, u16::MAX);
        assert_eq!(header.byte_rate, 16000 * u16::MAX as u32);
        assert_eq!(header.riff_chunk_size, 38);
        assert_eq!(many_channels.pcm(), &[1, 2]);

        let silent_depth = encode_wav(&[0; 4], 16000, 1, 0);
        assert_eq!(silent_depth.header().byte_rate, 0);
        assert_eq!(silent_depth.duration(), std::time::Duration::ZERO);
    }

    #[test]
    fn parse_rejects_non_wav() {
        assert!(WavHeader::parse(b"not a wav file at all, definitely not 44 bytes").is_none());
        assert!(WavHeader::parse(&[0u8; 10]).is_none());
    }

    #[test]
    fn save_writes_identical_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("output.wav");
        let wav = encode_wav(&speech_like_pcm(), 16000, 1, 16);
        wav.save(&path).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), wav.as_bytes());
    }
}
