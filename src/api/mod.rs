//! Client for the device configuration REST API
//!
//! - GET /fm/devices - List registered FM devices
//! - GET /fm/devices/{name} - Read one device
//! - PUT /fm/devices/{name} - Update frequency and rates

mod client;
mod types;

pub use client::{DeviceApi, HttpDeviceApi};
pub use types::{
    format_khz, parse_rate, Device, DeviceListResponse, DeviceRecord, DeviceResponse,
    DeviceSettings, DeviceSummary, DeviceUpdate, FREQ_RANGE_MHZ, RESAMPLE_RATE_RANGE_KHZ,
    SAMPLE_RATE_RANGE_KHZ,
};
