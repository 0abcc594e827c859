//! Then step definitions
//!
//! Steps that verify statuses, provenance and anomalies.

use cucumber::then;
use vigenza_engine::VigenzaError;

use crate::world::VigenzaWorld;

// =============================================================================
// Status
// =============================================================================

#[then(expr = "the status is {string}")]
fn assert_status(world: &mut VigenzaWorld, expected: String) {
    let report = world.report();
    assert_eq!(
        report.status.as_str(),
        expected,
        "Unexpected status for {}:\n{}",
        report.norm_id,
        report.explain()
    );
}

#[then(expr = "the confidence is {string}")]
fn assert_confidence(world: &mut VigenzaWorld, expected: String) {
    assert_eq!(world.report().confidence.as_str(), expected);
}

#[then(expr = "the active text is {string}")]
fn assert_active_text(world: &mut VigenzaWorld, expected: String) {
    let active = world.report().active_text.as_ref().map(|id| id.to_string());
    assert_eq!(active.as_deref(), Some(expected.as_str()));
}

#[then("the query fails because the norm does not exist")]
fn assert_not_found(world: &mut VigenzaWorld) {
    assert!(
        matches!(world.error, Some(VigenzaError::NormNotFound(_))),
        "Expected NormNotFound, got {:?}",
        world.error.as_ref().map(|e| e.to_string())
    );
}

// =============================================================================
// Provenance
// =============================================================================

#[then(expr = "there is/are {int} contributing amendment(s)")]
fn assert_contribution_count(world: &mut VigenzaWorld, expected: usize) {
    assert_eq!(world.report().contributing.len(), expected);
}

#[then(expr = "the contributing amendments include {string} on {string} as {string}")]
fn assert_contribution(world: &mut VigenzaWorld, kind: String, target: String, scope: String) {
    let report = world.report();
    let found = report.contributing.iter().any(|c| {
        c.edge.kind.as_str() == kind
            && c.edge.target.to_string() == target
            && c.scope.as_str() == scope
    });
    assert!(
        found,
        "No {kind} on {target} as {scope} in:\n{}",
        report.explain()
    );
}

// =============================================================================
// Anomalies
// =============================================================================

#[then(expr = "the report flags {string}")]
fn assert_report_anomaly(world: &mut VigenzaWorld, reason: String) {
    let report = world.report();
    assert!(
        report.anomalies.iter().any(|a| a.reason.as_str() == reason),
        "Expected anomaly {reason} in:\n{}",
        report.explain()
    );
}

#[then(expr = "the anomalies include {string}")]
fn assert_anomaly_listed(world: &mut VigenzaWorld, reason: String) {
    assert!(
        world.anomalies.iter().any(|a| a.reason.as_str() == reason),
        "Expected anomaly {reason} in {:?}",
        world.anomalies
    );
}

#[then(expr = "the anomalies include {string} for {string}")]
fn assert_anomaly_for(world: &mut VigenzaWorld, reason: String, norm: String) {
    assert!(
        world.anomalies.iter().any(|a| a.reason.as_str() == reason
            && a.norm_id.as_ref().map(|id| id.to_string()).as_deref() == Some(norm.as_str())),
        "Expected anomaly {reason} for {norm} in {:?}",
        world.anomalies
    );
}

#[then(expr = "the batch rejected {int} entry/entries")]
fn assert_rejected(world: &mut VigenzaWorld, expected: usize) {
    let report = world.ingest_report.as_ref().expect("batch was ingested");
    assert_eq!(report.rejected, expected);
}
