//! Batch operations across many devices.
//!
//! A batch job (configuring every amplifier of a line, or sweeping all of
//! them for telemetry) must keep going when one shelf is unreachable: the
//! remaining devices are still processed and the report names every failed
//! device with its typed error. Nothing is swallowed and nothing aborts
//! the whole run.
//!
//! Iteration over the network topology and credential lookup belong to the
//! external controller; these helpers only run the per-device operation.

use log::{info, warn};
use std::collections::HashMap;

use crate::drivers::LineDevice;
use crate::error::HalError;
use crate::params::{OperationalTarget, ReadingDocument};

/// One failed device in a batch run.
#[derive(Debug)]
pub struct BatchFailure {
    pub device_uid: String,
    pub error: HalError,
}

/// Outcome of a batch run.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub succeeded: Vec<String>,
    pub failed: Vec<BatchFailure>,
}

impl BatchReport {
    pub fn all_succeeded(&self) -> bool {
        self.failed.is_empty()
    }

    fn record<T>(&mut self, uid: &str, outcome: crate::error::Result<T>) -> Option<T> {
        match outcome {
            Ok(value) => {
                self.succeeded.push(uid.to_string());
                Some(value)
            }
            Err(error) => {
                warn!("{uid}: {error}");
                self.failed.push(BatchFailure {
                    device_uid: uid.to_string(),
                    error,
                });
                None
            }
        }
    }
}

/// Readings collected by [`read_batch`], alongside the run report.
#[derive(Debug, Default)]
pub struct BatchReadings {
    pub documents: Vec<ReadingDocument>,
    pub report: BatchReport,
}

/// Apply operational targets, keyed by device uid, across a batch of
/// devices. Devices without a target and devices that fail are reported;
/// the rest of the batch still runs.
pub async fn configure_batch<D: LineDevice>(
    devices: &mut [D],
    targets: &HashMap<String, OperationalTarget>,
) -> BatchReport {
    let mut report = BatchReport::default();

    for device in devices.iter_mut() {
        let uid = device.identity().uid.clone();
        let outcome = match targets.get(&uid) {
            Some(target) => {
                let run = async {
                    device.login().await?;
                    let applied = device.configure_operational(target).await;
                    // Close even after a failure; the session must not leak.
                    let closed = device.close().await;
                    applied?;
                    closed
                };
                run.await
            }
            None => Err(HalError::InvalidParameter(format!(
                "{uid} has no operational target"
            ))),
        };
        let _ = report.record(&uid, outcome);
    }

    info!(
        "batch configure: {} ok, {} failed",
        report.succeeded.len(),
        report.failed.len()
    );
    report
}

/// Read a telemetry snapshot from every device in the batch.
pub async fn read_batch<D: LineDevice>(devices: &mut [D]) -> BatchReadings {
    let mut readings = BatchReadings::default();

    for device in devices.iter_mut() {
        let uid = device.identity().uid.clone();
        let run = async {
            device.login().await?;
            let snapshot = device.snapshot().await;
            let closed = device.close().await;
            let document = snapshot?;
            closed?;
            Ok(document)
        };
        if let Some(document) = readings.report.record(&uid, run.await) {
            readings.documents.push(document);
        }
    }

    info!(
        "batch read: {} ok, {} failed",
        readings.report.succeeded.len(),
        readings.report.failed.len()
    );
    readings
}
