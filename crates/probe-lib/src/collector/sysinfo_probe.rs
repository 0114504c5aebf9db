//! Host probe backed by the `sysinfo` crate

use super::{async_trait, HostProbe, SampleError};
use crate::models::HostReading;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use sysinfo::System;

/// Reads whole-host CPU load and memory usage
///
/// CPU usage is a delta between two refreshes, so every read blocks for
/// `sysinfo::MINIMUM_CPU_UPDATE_INTERVAL`. Reads run on the blocking pool.
/// A blocking read cannot be cancelled: when the caller gives up on one,
/// later reads fail fast until it has finished instead of queueing.
pub struct SysinfoProbe {
    system: Arc<Mutex<System>>,
    in_flight: Arc<AtomicBool>,
}

/// Marks a blocking read as running; cleared when the read finishes
struct InFlightRead(Arc<AtomicBool>);

impl InFlightRead {
    fn acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(Arc::clone(flag)))
    }
}

impl Drop for InFlightRead {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Default for SysinfoProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl SysinfoProbe {
    pub fn new() -> Self {
        Self {
            system: Arc::new(Mutex::new(System::new())),
            in_flight: Arc::new(AtomicBool::new(false)),
        }
    }

    fn read_blocking(system: &Mutex<System>) -> Result<HostReading, SampleError> {
        if !sysinfo::IS_SUPPORTED_SYSTEM {
            return Err(SampleError::Unavailable(
                "host resource accounting not supported on this platform".to_string(),
            ));
        }

        let mut sys = system
            .lock()
            .map_err(|_| SampleError::Unavailable("host probe state poisoned".to_string()))?;

        sys.refresh_cpu();
        std::thread::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL);
        sys.refresh_cpu();
        sys.refresh_memory();

        Ok(HostReading {
            cpu_percent: f64::from(sys.global_cpu_info().cpu_usage()),
            memory_used_bytes: sys.used_memory(),
            memory_total_bytes: sys.total_memory(),
        })
    }
}

#[async_trait]
impl HostProbe for SysinfoProbe {
    async fn read(&self) -> Result<HostReading, SampleError> {
        let guard = InFlightRead::acquire(&self.in_flight).ok_or_else(|| {
            SampleError::Unavailable("previous host read still in flight".to_string())
        })?;
        let system = Arc::clone(&self.system);

        tokio::task::spawn_blocking(move || {
            let _guard = guard;
            Self::read_blocking(&system)
        })
        .await
        .map_err(|e| SampleError::Unavailable(format!("host probe task failed: {e}")))?
    }
}
