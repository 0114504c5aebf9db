//! Host metrics collection
//!
//! A [`HostProbe`] reads raw CPU and memory figures from the host, the
//! [`Sampler`] turns them into rounded percentages under a timeout, and the
//! [`CollectionLoop`] applies a fresh sample to the snapshot store on a
//! fixed interval.

mod r#loop;
mod sampler;
mod sysinfo_probe;


pub use r#loop::{CollectionConfig, CollectionLoop, CollectionLoopBuilder};
pub use sampler::{round_percent, Sampler};
pub use sysinfo_probe::SysinfoProbe;

use crate::models::HostReading;
use std::time::Duration;
use thiserror::Error;

pub use async_trait::async_trait;

/// Errors from a single sampling pass
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SampleError {
    #[error("host metrics unavailable: {0}")]
    Unavailable(String),

    #[error("invalid host reading (memory used {used} of {total} bytes)")]
    InvalidReading { used: u64, total: u64 },

    #[error("host metrics read timed out after {0:?}")]
    Timeout(Duration),
}

/// Source of raw host resource figures
#[async_trait]
pub trait HostProbe: Send + Sync {
    async fn read(&self) -> Result<HostReading, SampleError>;
}
