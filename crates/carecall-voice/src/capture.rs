//! Endpointed microphone capture using CPAL
//!
//! One call to [`AudioCapture::capture`] opens the selected input device at
//! 16 kHz mono, pulls fixed-size frames until the endpoint detector says stop,
//! releases the stream, and returns the utterance as a WAV file.

use crate::device::AudioDeviceHandle;
use crate::endpoint::{EndpointConfig, EndpointDetector, EndpointReason};
use crate::error::{VoiceError, VoiceResult};
use crate::wav::{encode_wav, extend_pcm_i16, WavAsset};
use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{Stream, StreamConfig};
use std::path::PathBuf;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

const BITS_PER_SAMPLE: u16 = 16;
const CHANNELS: u16 = 1;

/// Capture configuration
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Sample rate in Hz (default: 16000)
    pub sample_rate: u32,

    /// Samples per frame handed to the detector (default: 1024)
    pub frames_per_buffer: usize,

    /// Endpointing thresholds and timers
    pub endpoint: EndpointConfig,

    /// If set, every completed capture is also written here (overwritten)
    pub save_path: Option<PathBuf>,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16000,
            frames_per_buffer: 1024,
            endpoint: EndpointConfig::default(),
            save_path: None,
        }
    }
}

impl CaptureConfig {
    /// Reject settings under which capture time could never advance.
    pub fn validate(&self) -> VoiceResult<()> {
        if self.sample_rate == 0 {
            return Err(VoiceError::Capture("sample rate must be positive".to_string()));
        }
        if self.frames_per_buffer == 0 {
            return Err(VoiceError::Capture("frames per buffer must be positive".to_string()));
        }
        Ok(())
    }
}

/// Something that blocks until the next mono i16 frame is available.
pub trait FrameSource {
    fn read_frame(&mut self) -> VoiceResult<Vec<i16>>;
}

/// Produces one complete utterance per call. Implemented by [`AudioCapture`].
pub trait UtteranceSource {
    fn capture(&mut self) -> VoiceResult<WavAsset>;
}

/// Pull frames from `source` into `buffer` until the detector reports an endpoint.
///
/// Read errors abort immediately without retry. A zero sample rate or an empty
/// frame is a capture error, since neither moves the detector's clock.
pub fn record_utterance<S: FrameSource + ?Sized>(
    source: &mut S,
    detector: &mut EndpointDetector,
    buffer: &mut Vec<u8>,
) -> VoiceResult<EndpointReason> {
    if detector.sample_rate() == 0 {
        return Err(VoiceError::Capture("sample rate must be positive".to_string()));
    }
    loop {
        let frame = source.read_frame()?;
        if frame.is_empty() {
            return Err(VoiceError::Capture("input produced an empty frame".to_string()));
        }
        extend_pcm_i16(buffer, &frame);
        let state = detector.observe(&frame);
        if let Some(reason) = state.reason {
            match reason {
                EndpointReason::SilenceTimeout => info!("녹음을 종료합니다. 무음 시간: {:?}", state.silence),
                EndpointReason::MaxDuration => info!("녹음을 종료합니다. 녹음 시간 초과"),
            }
            return Ok(reason);
        }
    }
}

/// Live CPAL input stream delivering fixed-size frames.
///
/// The stream is paused and dropped on `stop` or when this value is dropped,
/// whichever comes first, so every exit path releases the device.
pub struct CpalFrameSource {
    stream: Option<Stream>,
    frame_rx: mpsc::UnboundedReceiver<VoiceResult<Vec<i16>>>,
}

impl CpalFrameSource {
    /// Open and start an input stream on `device`.
    pub fn open(device: &AudioDeviceHandle, sample_rate: u32, frames_per_buffer: usize) -> VoiceResult<Self> {
        if sample_rate == 0 || frames_per_buffer == 0 {
            return Err(VoiceError::Capture(format!(
                "invalid stream settings: {}Hz, {} samples/frame",
                sample_rate, frames_per_buffer
            )));
        }
        let stream_config = StreamConfig {
            channels: CHANNELS,
            sample_rate: cpal::SampleRate(sample_rate),
            buffer_size: cpal::BufferSize::Fixed(frames_per_buffer as u32),
        };

        let (frame_tx, frame_rx) = mpsc::unbounded_channel();
        let error_tx = frame_tx.clone();
        let mut pending: Vec<i16> = Vec::with_capacity(frames_per_buffer);

        let stream = device.device().build_input_stream(
            &stream_config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                for &sample in data {
                    pending.push((sample.clamp(-1.0, 1.0) * 32767.0) as i16);

                    if pending.len() >= frames_per_buffer {
                        let frame = std::mem::replace(&mut pending, Vec::with_capacity(frames_per_buffer));
                        if frame_tx.send(Ok(frame)).is_err() {
                            // Reader is gone; the stream is about to be dropped.
                            return;
                        }
                    }
                }
            },
            move |err| {
                warn!("Audio stream error: {}", err);
                let _ = error_tx.send(Err(VoiceError::from(err)));
            },
            None,
        )?;

        stream.play()?;
        debug!("▶️ Input stream started ({}Hz, {} samples/frame)", sample_rate, frames_per_buffer);

        Ok(Self {
            stream: Some(stream),
            frame_rx,
        })
    }

    /// Stop and release the stream. Idempotent.
    pub fn stop(&mut self) {
        if let Some(stream) = self.stream.take() {
            if let Err(e) = stream.pause() {
                warn!("Failed to pause input stream: {}", e);
            }
            drop(stream);
            debug!("⏹️ Input stream released");
        }
    }
}

impl FrameSource for CpalFrameSource {
    fn read_frame(&mut self) -> VoiceResult<Vec<i16>> {
        if self.stream.is_none() {
            return Err(VoiceError::Capture("Input stream already stopped".to_string()));
        }
        match self.frame_rx.blocking_recv() {
            Some(frame) => frame,
            None => Err(VoiceError::Capture("Input stream closed".to_string())),
        }
    }
}

impl Drop for CpalFrameSource {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Endpointed capture from an explicitly selected device
pub struct AudioCapture {
    config: CaptureConfig,
    device: Option<AudioDeviceHandle>,
}

impl AudioCapture {
    pub fn new(config: CaptureConfig) -> Self {
        Self { config, device: None }
    }

    pub fn with_device(mut self, device: AudioDeviceHandle) -> Self {
        self.device = Some(device);
        self
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    pub fn device(&self) -> Option<&AudioDeviceHandle> {
        self.device.as_ref()
    }

    /// Run the endpointing loop over any frame source and frame the result as WAV.
    pub fn capture_from<S: FrameSource + ?Sized>(&self, source: &mut S) -> VoiceResult<WavAsset> {
        self.config.validate()?;
        let mut detector = EndpointDetector::new(self.config.endpoint.clone(), self.config.sample_rate);
        let mut buffer = Vec::new();
        record_utterance(source, &mut detector, &mut buffer)?;

        let wav = encode_wav(&buffer, self.config.sample_rate, CHANNELS, BITS_PER_SAMPLE);
        debug!("Captured {} PCM bytes ({:?})", buffer.len(), wav.duration());

        if let Some(ref path) = self.config.save_path {
            if let Err(e) = wav.save(path) {
                warn!("Failed to write {}: {}", path.display(), e);
            }
        }
        Ok(wav)
    }
}

impl UtteranceSource for AudioCapture {
    fn capture(&mut self) -> VoiceResult<WavAsset> {
        let device = self.device.as_ref().ok_or(VoiceError::DeviceNotSelected)?;
        self.config.validate()?;
        debug!(device = %device.name(), "opening input stream");

        let mut source = CpalFrameSource::open(device, self.config.sample_rate, self.config.frames_per_buffer)?;
        let result = self.capture_from(&mut source);
        source.stop();
        result
    }
}
