use reqwest::{StatusCode, Url};
use std::time::Duration;
use tracing::{debug, info};

use super::types::{DeviceListResponse, DeviceRecord, DeviceResponse, DeviceSummary, DeviceUpdate};
use crate::error::{PipelineError, PipelineResult};

/// Device configuration REST API
///
/// Implementations:
/// - HTTP: the pipeline's configuration service
/// - In-memory: tests
#[async_trait::async_trait]
pub trait DeviceApi: Send + Sync {
    /// GET /fm/devices
    async fn list_devices(&self) -> PipelineResult<Vec<DeviceSummary>>;

    /// GET /fm/devices/{name}; `Ok(None)` when the device does not exist
    async fn get_device(&self, name: &str) -> PipelineResult<Option<DeviceRecord>>;

    /// PUT /fm/devices/{name}; `DeviceNotFound` when the device does not exist
    async fn update_device(&self, name: &str, update: &DeviceUpdate) -> PipelineResult<()>;
}

pub struct HttpDeviceApi {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpDeviceApi {
    pub fn new(base_url: &str, timeout: Duration) -> PipelineResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PipelineError::ConfigApi(format!("Failed to build HTTP client: {}", e)))?;

        let base_url = Url::parse(base_url)
            .ok()
            .filter(|url| !url.cannot_be_a_base())
            .ok_or_else(|| PipelineError::ConfigApi(format!("Invalid base URL {}", base_url)))?;

        info!("Configuration API at {}", base_url);

        Ok(Self { client, base_url })
    }

    /// `<base>/fm/devices[/<name>]`, with the device name as one encoded segment
    fn devices_url(&self, name: Option<&str>) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().extend(["fm", "devices"]);
            if let Some(name) = name {
                segments.push(name);
            }
        }
        url
    }
}

fn transport_error(action: &str, e: reqwest::Error) -> PipelineError {
    PipelineError::ConfigApi(format!("{} failed: {}", action, e))
}

fn status_error(action: &str, status: StatusCode) -> PipelineError {
    PipelineError::ConfigApi(format!("{} returned HTTP {}", action, status))
}

#[async_trait::async_trait]
impl DeviceApi for HttpDeviceApi {
    async fn list_devices(&self) -> PipelineResult<Vec<DeviceSummary>> {
        let url = self.devices_url(None);
        debug!("GET {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| transport_error("Listing devices", e))?;

        if !response.status().is_success() {
            return Err(status_error("Listing devices", response.status()));
        }

        let body: DeviceListResponse = response
            .json()
            .await
            .map_err(|e| transport_error("Decoding device list", e))?;

        Ok(body.devices)
    }

    async fn get_device(&self, name: &str) -> PipelineResult<Option<DeviceRecord>> {
        let url = self.devices_url(Some(name));
        debug!("GET {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| transport_error("Reading device", e))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(status_error("Reading device", response.status()));
        }

        let body: DeviceResponse = response
            .json()
            .await
            .map_err(|e| transport_error("Decoding device", e))?;

        Ok(Some(body.device))
    }

    async fn update_device(&self, name: &str, update: &DeviceUpdate) -> PipelineResult<()> {
        if update.is_empty() {
            return Err(PipelineError::InvalidSettings(
                "at least one parameter is required".to_string(),
            ));
        }

        let url = self.devices_url(Some(name));
        debug!("PUT {} {:?}", url, update);

        let response = self
            .client
            .put(url)
            .json(update)
            .send()
            .await
            .map_err(|e| transport_error("Updating device", e))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(PipelineError::DeviceNotFound(name.to_string()));
        }
        if !response.status().is_success() {
            return Err(status_error("Updating device", response.status()));
        }

        info!("Device {} updated", name);
        Ok(())
    }
}
