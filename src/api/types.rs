use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, PipelineResult};

// ============================================================================
// Wire types
// ============================================================================

/// Device record as served by the configuration API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub name: String,
    /// Center frequency in Hz, as a decimal string
    pub freq: String,
    /// Capture rate, e.g. "250k"
    pub sample_rate: String,
    /// Rate carried on the audio subject, e.g. "32k"
    pub resample_rate: String,
    #[serde(default)]
    pub register_ts: Option<f64>,
    #[serde(default)]
    pub specpipe_version: Option<String>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub latitude: Option<f64>,
}

/// Entry in the device list
pub type DeviceSummary = DeviceRecord;

#[derive(Debug, Deserialize)]
pub struct DeviceListResponse {
    pub devices: Vec<DeviceSummary>,
}

#[derive(Debug, Deserialize)]
pub struct DeviceResponse {
    pub device: DeviceRecord,
}

/// PUT body for a device update; absent fields are left unchanged upstream
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DeviceUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub freq: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_rate: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resample_rate: Option<String>,
}

impl DeviceUpdate {
    pub fn is_empty(&self) -> bool {
        self.freq.is_none() && self.sample_rate.is_none() && self.resample_rate.is_none()
    }
}

// ============================================================================
// Domain types
// ============================================================================

/// A physical or mock RF front-end, with all rates in Hz
#[derive(Debug, Clone, PartialEq)]
pub struct Device {
    pub name: String,
    pub frequency: f64,
    pub sample_rate: u32,
    pub resample_rate: u32,
}

impl TryFrom<&DeviceRecord> for Device {
    type Error = PipelineError;

    fn try_from(record: &DeviceRecord) -> PipelineResult<Self> {
        let frequency = record.freq.trim().parse::<f64>().map_err(|_| {
            PipelineError::ConfigApi(format!(
                "device {} reports unparseable frequency '{}'",
                record.name, record.freq
            ))
        })?;

        Ok(Self {
            name: record.name.clone(),
            frequency,
            sample_rate: parse_rate(&record.sample_rate)
                .ok_or_else(|| bad_rate(record, &record.sample_rate))?,
            resample_rate: parse_rate(&record.resample_rate)
                .ok_or_else(|| bad_rate(record, &record.resample_rate))?,
        })
    }
}

fn bad_rate(record: &DeviceRecord, value: &str) -> PipelineError {
    PipelineError::ConfigApi(format!(
        "device {} reports unparseable rate '{}'",
        record.name, value
    ))
}

/// Parse a rate string in Hz; a trailing `k` means kHz ("32k" -> 32000)
pub fn parse_rate(value: &str) -> Option<u32> {
    let value = value.trim();
    let kilo = value.strip_suffix('k').or_else(|| value.strip_suffix('K'));
    let (number, scale) = match kilo {
        Some(number) => (number, 1000.0),
        None => (value, 1.0),
    };

    let hz = number.trim().parse::<f64>().ok()? * scale;
    if !hz.is_finite() || hz <= 0.0 || hz > u32::MAX as f64 {
        return None;
    }
    Some(hz.round() as u32)
}

/// Format a kHz value the way the API expects ("32k", "2.4k")
pub fn format_khz(khz: f64) -> String {
    let rounded = (khz * 10.0).round() / 10.0;
    if rounded.fract() == 0.0 {
        format!("{}k", rounded as i64)
    } else {
        format!("{:.1}k", rounded)
    }
}

// ============================================================================
// Displayed settings
// ============================================================================

pub const FREQ_RANGE_MHZ: (f64, f64) = (88.0, 108.0);
pub const SAMPLE_RATE_RANGE_KHZ: (f64, f64) = (10.0, 500.0);
pub const RESAMPLE_RATE_RANGE_KHZ: (f64, f64) = (10.0, 50.0);

/// The configuration fields shown to the user
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DeviceSettings {
    pub freq_mhz: f64,
    pub sample_rate_khz: f64,
    pub resample_rate_khz: f64,
}

impl DeviceSettings {
    pub fn from_device(device: &Device) -> Self {
        Self {
            freq_mhz: device.frequency / 1_000_000.0,
            sample_rate_khz: device.sample_rate as f64 / 1000.0,
            resample_rate_khz: device.resample_rate as f64 / 1000.0,
        }
    }

    /// Reject values outside the ranges the tuner accepts
    pub fn validate(&self) -> PipelineResult<()> {
        check_range("frequency", "MHz", self.freq_mhz, FREQ_RANGE_MHZ)?;
        check_range("sample rate", "kHz", self.sample_rate_khz, SAMPLE_RATE_RANGE_KHZ)?;
        check_range("resample rate", "kHz", self.resample_rate_khz, RESAMPLE_RATE_RANGE_KHZ)?;
        Ok(())
    }

    /// Request body carrying every field
    pub fn to_update(&self) -> DeviceUpdate {
        DeviceUpdate {
            freq: Some(format!("{}", (self.freq_mhz * 1_000_000.0).round() as u64)),
            sample_rate: Some(format_khz(self.sample_rate_khz)),
            resample_rate: Some(format_khz(self.resample_rate_khz)),
        }
    }
}

fn check_range(field: &str, unit: &str, value: f64, (min, max): (f64, f64)) -> PipelineResult<()> {
    if !value.is_finite() || value < min || value > max {
        return Err(PipelineError::InvalidSettings(format!(
            "{} {} {} outside {}..={} {}",
            field, value, unit, min, max, unit
        )));
    }
    Ok(())
}
