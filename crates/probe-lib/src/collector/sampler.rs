//! Conversion of raw host readings into snapshot percentages

use super::{HostProbe, SampleError};
use crate::models::{HostReading, HostSample};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;

/// Round to two decimals, halves away from zero
pub fn round_percent(value: f64) -> f64 {
    (value.clamp(0.0, 100.0) * 100.0).round() / 100.0
}

/// Reads the host through a probe and produces a timestamped sample
#[derive(Clone)]
pub struct Sampler {
    probe: Arc<dyn HostProbe>,
    timeout: Duration,
}

impl Sampler {
    pub fn new(probe: Arc<dyn HostProbe>, timeout: Duration) -> Self {
        Self { probe, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Take one sample; a hung probe counts as a failed sample
    pub async fn sample(&self) -> Result<HostSample, SampleError> {
        let reading = tokio::time::timeout(self.timeout, self.probe.read())
            .await
            .map_err(|_| SampleError::Timeout(self.timeout))??;

        Self::convert(reading)
    }

    fn convert(reading: HostReading) -> Result<HostSample, SampleError> {
        if reading.memory_total_bytes == 0 || !reading.cpu_percent.is_finite() {
            return Err(SampleError::InvalidReading {
                used: reading.memory_used_bytes,
                total: reading.memory_total_bytes,
            });
        }

        let memory =
            reading.memory_used_bytes as f64 / reading.memory_total_bytes as f64 * 100.0;

        Ok(HostSample {
            cpu_percent: round_percent(reading.cpu_percent),
            memory_percent: round_percent(memory),
            sampled_at: Utc::now(),
        })
    }
}
