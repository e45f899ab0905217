//! Input device enumeration and the one-time selection step.
//!
//! Selection yields an explicit [`AudioDeviceHandle`] that is handed to
//! [`crate::capture::AudioCapture`]; nothing is kept in process-wide state.

use crate::error::{VoiceError, VoiceResult};
use cpal::traits::{DeviceTrait, HostTrait};
use std::fmt;
use std::io::{BufRead, Write};
use tracing::info;

/// One entry of the input device listing
#[derive(Debug, Clone, PartialEq)]
pub struct InputDeviceInfo {
    pub index: usize,
    pub name: String,
    /// Default sample rate reported by the host, if it could be queried
    pub default_sample_rate: Option<u32>,
}

/// A chosen input device, threaded explicitly into the capture loop
#[derive(Clone)]
pub struct AudioDeviceHandle {
    index: usize,
    name: String,
    device: cpal::Device,
}

impl AudioDeviceHandle {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn device(&self) -> &cpal::Device {
        &self.device
    }
}

impl fmt::Debug for AudioDeviceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioDeviceHandle")
            .field("index", &self.index)
            .field("name", &self.name)
            .finish()
    }
}

/// List input-capable devices of the default host.
pub fn list_input_devices() -> VoiceResult<Vec<InputDeviceInfo>> {
    let host = cpal::default_host();
    let mut out = Vec::new();
    for (index, device) in host.input_devices()?.enumerate() {
        let name = device.name().unwrap_or_else(|_| "Unknown".to_string());
        let default_sample_rate = device.default_input_config().ok().map(|c| c.sample_rate().0);
        out.push(InputDeviceInfo {
            index,
            name,
            default_sample_rate,
        });
    }
    Ok(out)
}

/// Select the input device at `index` (as numbered by [`list_input_devices`]).
pub fn select_input_device(index: usize) -> VoiceResult<AudioDeviceHandle> {
    let host = cpal::default_host();
    let device = host
        .input_devices()?
        .nth(index)
        .ok_or_else(|| VoiceError::AudioDevice(format!("Invalid device number: {}", index)))?;
    let name = device.name().unwrap_or_else(|_| "Unknown".to_string());
    info!("📱 Using input device {}: {}", index, name);
    Ok(AudioDeviceHandle {
        index,
        name,
        device,
    })
}

/// Default input device of the host.
pub fn default_input_device() -> VoiceResult<AudioDeviceHandle> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or_else(|| VoiceError::AudioDevice("No input device available".to_string()))?;
    let name = device.name().unwrap_or_else(|_| "Unknown".to_string());
    let index = host
        .input_devices()?
        .position(|d| d.name().map(|n| n == name).unwrap_or(false))
        .unwrap_or(0);
    Ok(AudioDeviceHandle {
        index,
        name,
        device,
    })
}

/// Print the device listing to `output`.
pub fn print_device_list(devices: &[InputDeviceInfo], output: &mut impl Write) -> VoiceResult<()> {
    writeln!(output, "사용 가능한 입력 장치 목록:")?;
    for d in devices {
        match d.default_sample_rate {
            Some(rate) => writeln!(output, "{}: {} (기본 샘플 레이트: {})", d.index, d.name, rate)?,
            None => writeln!(output, "{}: {}", d.index, d.name)?,
        }
    }
    Ok(())
}

/// Validate a user-typed device number against the listing.
pub fn parse_device_choice(line: &str, devices: &[InputDeviceInfo]) -> VoiceResult<usize> {
    let index: usize = line
        .trim()
        .parse()
        .map_err(|_| VoiceError::AudioDevice(format!("Invalid device number: {:?}", line.trim())))?;
    if devices.iter().any(|d| d.index == index) {
        Ok(index)
    } else {
        Err(VoiceError::AudioDevice(format!("Invalid device number: {}", index)))
    }
}

/// List devices, ask for a number on `input`, and select it.
pub fn prompt_device_selection(input: &mut impl BufRead, output: &mut impl Write) -> VoiceResult<AudioDeviceHandle> {
    let devices = list_input_devices()?;
    if devices.is_empty() {
        return Err(VoiceError::AudioDevice("No input device available".to_string()));
    }
    print_device_list(&devices, output)?;
    write!(output, "사용할 입력 장치 번호를 입력하세요: ")?;
    output.flush()?;

    let mut line = String::new();
    input.read_line(&mut line)?;
    let index = parse_device_choice(&line, &devices)?;
    select_input_device(index)
}
