//! When step definitions
//!
//! Steps that ingest the batch and run queries.

use cucumber::when;

use crate::world::VigenzaWorld;

#[when("the batch is ingested")]
fn ingest_batch(world: &mut VigenzaWorld) {
    world.ingest();
}

#[when(expr = "I ask the status of {string} on {string}")]
fn ask_status(world: &mut VigenzaWorld, norm: String, date: String) {
    world.query(&norm, &date);
}

#[when("I list the anomalies")]
fn list_anomalies(world: &mut VigenzaWorld) {
    world.anomalies = world.service.list_anomalies();
}
