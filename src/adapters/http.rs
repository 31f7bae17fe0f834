//! HTTP client adapter: posts upload requests to the collector.
//!
//! Implements [`UploadPort`]. A fresh connection is opened per request;
//! uploads are rare and the radio goes down between sync cycles, so there
//! is no session worth keeping.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: `esp_idf_svc::http::client` with the
//!   configured timeout. `https://` URLs verify against the built-in
//!   certificate bundle.
//! - **all other targets**: records requests and answers from a script
//!   (default `200`).

use log::{debug, warn};

use crate::app::ports::UploadPort;
use crate::error::UploadError;
use crate::sync::upload::UploadRequest;

pub struct HttpUploader {
    timeout_ms: u32,
    #[cfg(not(target_os = "espidf"))]
    sim: SimCollector,
}

#[cfg(not(target_os = "espidf"))]
#[derive(Debug, Default)]
struct SimCollector {
    script: std::collections::VecDeque<Result<u16, UploadError>>,
    received: Vec<UploadRequest>,
}

impl HttpUploader {
    pub fn new(timeout_ms: u32) -> Self {
        Self {
            timeout_ms,
            #[cfg(not(target_os = "espidf"))]
            sim: SimCollector::default(),
        }
    }

    pub fn timeout_ms(&self) -> u32 {
        self.timeout_ms
    }

    #[cfg(target_os = "espidf")]
    fn platform_post(&mut self, request: &UploadRequest) -> Result<u16, UploadError> {
        use core::time::Duration;
        use embedded_svc::http::client::Client;
        use embedded_svc::io::Write;
        use esp_idf_svc::http::client::{Configuration, EspHttpConnection};

        let config = Configuration {
            timeout: Some(Duration::from_millis(u64::from(self.timeout_ms))),
            crt_bundle_attach: Some(esp_idf_svc::sys::esp_crt_bundle_attach),
            ..Default::default()
        };
        let conn = EspHttpConnection::new(&config).map_err(|e| {
            warn!("HTTP: connection setup failed: {}", e);
            UploadError::Transport
        })?;
        let mut client = Client::wrap(conn);

        let length = request.body.len().to_string();
        let headers = [
            ("Content-Type", request.content_type.as_str()),
            ("Content-Length", length.as_str()),
        ];
        let mut req = client
            .post(&request.url, &headers)
            .map_err(|_| UploadError::Transport)?;
        req.write_all(&request.body)
            .map_err(|_| UploadError::Transport)?;
        req.flush().map_err(|_| UploadError::Transport)?;
        let response = req.submit().map_err(|_| UploadError::Transport)?;
        Ok(response.status())
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_post(&mut self, request: &UploadRequest) -> Result<u16, UploadError> {
        self.sim.received.push(request.clone());
        self.sim.script.pop_front().unwrap_or(Ok(200))
    }

    // ── Simulation hooks ──────────────────────────────────────

    /// Simulation: outcomes for the next requests, in order.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_script(&mut self, outcomes: &[Result<u16, UploadError>]) {
        self.sim.script.extend(outcomes.iter().copied());
    }

    /// Simulation: every request posted so far.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_received(&self) -> &[UploadRequest] {
        &self.sim.received
    }
}

impl UploadPort for HttpUploader {
    fn post(&mut self, request: &UploadRequest) -> Result<u16, UploadError> {
        debug!("HTTP: POST {} ({} bytes)", request.url, request.body.len());
        let result = self.platform_post(request);
        if let Err(e) = &result {
            warn!("HTTP: POST {} failed: {}", request.url, e);
        }
        result
    }
}
