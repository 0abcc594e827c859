//! World struct for Cucumber BDD tests
//!
//! Holds the batch being assembled and the outcome of the last query.

use chrono::NaiveDate;
use cucumber::World;
use std::fmt;
use vigenza_engine::{
    Anomaly, Batch, BatchReport, NormId, StatusReport, VigenzaError, VigenzaService,
};

/// Test world that holds state across steps in a Cucumber scenario.
#[derive(World)]
#[world(init = Self::new)]
pub struct VigenzaWorld {
    pub service: VigenzaService,
    /// Acts and clauses declared by Given steps
    pub batch: Batch,
    pub ingest_report: Option<BatchReport>,
    /// Last status report (if the query succeeded)
    pub report: Option<StatusReport>,
    /// Last error (if the query failed)
    pub error: Option<VigenzaError>,
    pub anomalies: Vec<Anomaly>,
}

impl fmt::Debug for VigenzaWorld {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VigenzaWorld")
            .field("batch", &self.batch)
            .field("ingest_report", &self.ingest_report)
            .field("report", &self.report)
            .field("error", &self.error.as_ref().map(|e| e.to_string()))
            .field("anomalies", &self.anomalies)
            .field(
                "service",
                &format!("<{} norms>", self.service.snapshot().node_count()),
            )
            .finish()
    }
}

impl Default for VigenzaWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl VigenzaWorld {
    pub fn new() -> Self {
        Self {
            service: VigenzaService::new(),
            batch: Batch::default(),
            ingest_report: None,
            report: None,
            error: None,
            anomalies: Vec::new(),
        }
    }

    /// Ingest everything declared so far and start a fresh batch.
    pub fn ingest(&mut self) {
        let batch = std::mem::take(&mut self.batch);
        self.ingest_report = Some(self.service.ingest_batch(&batch));
    }

    /// Query a status and store the result or error
    pub fn query(&mut self, norm: &str, date: &str) {
        let outcome = norm
            .parse::<NormId>()
            .and_then(|id| Ok((id, vigenza_engine::config::parse_date(date)?)))
            .and_then(|(id, on): (NormId, NaiveDate)| self.service.get_status(&id, on));
        match outcome {
            Ok(report) => {
                self.report = Some(report);
                self.error = None;
            }
            Err(e) => {
                self.report = None;
                self.error = Some(e);
            }
        }
    }

    /// The last report, failing the step if the query did not succeed.
    pub fn report(&self) -> &StatusReport {
        match &self.report {
            Some(report) => report,
            None => panic!(
                "Expected a status report, got error: {:?}",
                self.error.as_ref().map(|e| e.to_string())
            ),
        }
    }
}
