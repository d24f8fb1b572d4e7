//! HTTP client for the analysis backend.

use std::io::Read;
use std::time::Duration;

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::RemoteError;

use super::AnalysisStore;
use super::wire::{AnalysisPayload, CalibrationPayload, ImageEntry, SaveRoiRequest, ScaleBarCoords};

/// Upper bound on downloaded image bodies.
const MAX_IMAGE_BYTES: u64 = 512 * 1024 * 1024;

/// Blocking client for the backend's REST API.
#[derive(Debug, Clone)]
pub struct HttpStore {
    agent: ureq::Agent,
    base_url: String,
}

impl HttpStore {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(timeout)
            .user_agent(concat!("poreroi/", env!("CARGO_PKG_VERSION")))
            .build();
        Self {
            agent,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn image_url(&self, filename: &str, suffix: &str) -> String {
        format!(
            "{}/api/images/{}{}",
            self.base_url,
            encode_path_segment(filename),
            suffix
        )
    }

    fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, RemoteError> {
        log::debug!("GET {}", url);
        let body = self
            .agent
            .get(url)
            .call()
            .map_err(map_ureq_error)?
            .into_string()
            .map_err(|e| RemoteError::invalid_response(e.to_string()))?;
        Ok(serde_json::from_str(&body)?)
    }

    fn get_bytes(&self, request: ureq::Request) -> Result<Vec<u8>, RemoteError> {
        let response = request.call().map_err(map_ureq_error)?;
        let mut bytes = Vec::new();
        response
            .into_reader()
            .take(MAX_IMAGE_BYTES)
            .read_to_end(&mut bytes)
            .map_err(|e| RemoteError::Network(e.to_string()))?;
        Ok(bytes)
    }

    fn post_json<T: Serialize>(&self, url: &str, body: &T) -> Result<(), RemoteError> {
        log::debug!("POST {}", url);
        let json = serde_json::to_string(body)?;
        self.agent
            .post(url)
            .set("Content-Type", "application/json")
            .send_string(&json)
            .map_err(map_ureq_error)?;
        Ok(())
    }
}

fn map_ureq_error(error: ureq::Error) -> RemoteError {
    match error {
        ureq::Error::Status(404, _) => RemoteError::NotFound,
        ureq::Error::Status(code, response) => RemoteError::Status {
            code,
            message: response
                .into_string()
                .unwrap_or_else(|_| "unreadable body".to_string()),
        },
        ureq::Error::Transport(transport) => RemoteError::Network(transport.to_string()),
    }
}

/// Bytes escaped in a path segment: everything but RFC 3986 unreserved characters.
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Percent-encode a filename for use as one URL path segment.
fn encode_path_segment(segment: &str) -> String {
    utf8_percent_encode(segment, PATH_SEGMENT).to_string()
}

impl AnalysisStore for HttpStore {
    fn list_images(&mut self) -> Result<Vec<ImageEntry>, RemoteError> {
        self.get_json(&format!("{}/api/images", self.base_url))
    }

    fn fetch_image(&mut self, filename: &str) -> Result<Vec<u8>, RemoteError> {
        let url = self.image_url(filename, "");
        self.get_bytes(self.agent.get(&url))
    }

    fn fetch_thumbnail(&mut self, filename: &str, size: u32) -> Result<Vec<u8>, RemoteError> {
        let url = self.image_url(filename, "/thumbnail");
        self.get_bytes(self.agent.get(&url).query("size", &size.to_string()))
    }

    fn detect_scale_bar(&mut self, filename: &str) -> Result<ScaleBarCoords, RemoteError> {
        self.get_json(&self.image_url(filename, "/scale-bar"))
    }

    fn save_calibration(
        &mut self,
        filename: &str,
        payload: &CalibrationPayload,
    ) -> Result<(), RemoteError> {
        self.post_json(&self.image_url(filename, "/scale-bar-save"), payload)
    }

    fn load_analysis(&mut self, filename: &str) -> Result<AnalysisPayload, RemoteError> {
        self.get_json(&self.image_url(filename, "/analysis"))
    }

    fn save_roi(&mut self, filename: &str, payload: &SaveRoiRequest) -> Result<(), RemoteError> {
        self.post_json(&self.image_url(filename, "/roi"), payload)
    }

    fn delete_analysis(&mut self, filename: &str) -> Result<(), RemoteError> {
        let url = self.image_url(filename, "/analysis");
        log::debug!("DELETE {}", url);
        self.agent.delete(&url).call().map_err(map_ureq_error)?;
        Ok(())
    }
}
