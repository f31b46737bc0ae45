//! Latency probing for pool members
//!
//! Dials every candidate concurrently, times the TCP connect, and ranks the results. The
//! probe never speaks the proxy protocol; the connection is dropped right after connect.

mod dialer;

pub use dialer::{Dialer, TcpDialer};

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use thiserror::Error;
use tokio::time::{timeout, Instant};
use tracing::{debug, info, instrument};

use crate::models::ProxyDescriptor;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProbeError {
    #[error("connect timed out")]
    Timeout,
    #[error("connect failed: {0}")]
    Connect(String),
}

/// Prober configuration
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    /// Timeout for each connect attempt
    pub timeout: Duration,
    /// Maximum probes in flight; 0 means one per descriptor
    pub max_concurrency: usize,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            max_concurrency: 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProbeSuccess {
    pub descriptor: Arc<ProxyDescriptor>,
    pub latency: Duration,
}

impl ProbeSuccess {
    pub fn latency_ms(&self) -> f64 {
        self.latency.as_secs_f64() * 1000.0
    }
}

#[derive(Debug, Clone)]
pub struct ProbeFailure {
    pub descriptor: Arc<ProxyDescriptor>,
    pub error: ProbeError,
}

/// Outcome of one probe round
#[derive(Debug, Clone, Default)]
pub struct ProbeReport {
    /// Successful probes, fastest first; equal latencies ordered by id
    pub ranked: Vec<ProbeSuccess>,
    /// Probes that failed, ordered by id
    pub failed: Vec<ProbeFailure>,
}

impl ProbeReport {
    /// Fastest reachable descriptor, `None` when nothing answered
    pub fn winner(&self) -> Option<&ProbeSuccess> {
        self.ranked.first()
    }
}

/// Concurrent TCP connect prober
pub struct LatencyProber {
    dialer: Arc<dyn Dialer>,
    config: ProbeConfig,
}

impl LatencyProber {
    pub fn new(dialer: Arc<dyn Dialer>, config: ProbeConfig) -> Self {
        Self { dialer, config }
    }

    pub fn config(&self) -> &ProbeConfig {
        &self.config
    }

    /// Probe every descriptor and wait for all of them before ranking
    #[instrument(skip_all, fields(candidates = descriptors.len()))]
    pub async fn probe(&self, descriptors: Vec<Arc<ProxyDescriptor>>) -> ProbeReport {
        let workers = match self.config.max_concurrency {
            0 => descriptors.len().max(1),
            n => n,
        };

        let outcomes = futures::stream::iter(descriptors)
            .map(|descriptor| self.probe_one(descriptor))
            .buffer_unordered(workers)
            .collect::<Vec<_>>()
            .await;

        let mut report = ProbeReport::default();
        for outcome in outcomes {
            match outcome {
                Ok(success) => report.ranked.push(success),
                Err(failure) => report.failed.push(failure),
            }
        }
        report.ranked.sort_by(|a, b| {
            a.latency
                .cmp(&b.latency)
                .then_with(|| a.descriptor.id().cmp(b.descriptor.id()))
        });
        report
            .failed
            .sort_by(|a, b| a.descriptor.id().cmp(b.descriptor.id()));

        info!(
            "Probe complete: {} reachable, {} failed",
            report.ranked.len(),
            report.failed.len()
        );
        report
    }

    async fn probe_one(
        &self,
        descriptor: Arc<ProxyDescriptor>,
    ) -> Result<ProbeSuccess, ProbeFailure> {
        let started = Instant::now();
        let result = timeout(
            self.config.timeout,
            self.dialer.dial(descriptor.address(), descriptor.port()),
        )
        .await;

        match result {
            Ok(Ok(())) => {
                let latency = started.elapsed();
                debug!(
                    "Probe {} reachable in {:.1}ms",
                    descriptor.id(),
                    latency.as_secs_f64() * 1000.0
                );
                Ok(ProbeSuccess {
                    descriptor,
                    latency,
                })
            }
            Ok(Err(e)) => {
                debug!("Probe {} failed: {}", descriptor.id(), e);
                Err(ProbeFailure {
                    descriptor,
                    error: ProbeError::Connect(e.to_string()),
                })
            }
            Err(_) => {
                debug!("Probe {} timed out", descriptor.id());
                Err(ProbeFailure {
                    descriptor,
                    error: ProbeError::Timeout,
                })
            }
        }
    }
}
