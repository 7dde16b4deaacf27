//! Integrity-scan report entry point.
//!
//! Opens the document store snapshot read-only, enumerates attested documents
//! with missing or incomplete attestation data, and prints a report. Repair
//! itself stays an explicit library call (`reset_to_pending`); this tool never
//! mutates the store.

use tracing_subscriber::EnvFilter;

use carbon_workflow::engine::scan_attestation_integrity;
use carbon_workflow::store::{DocumentStore, JsonFilePersistence};
use carbon_workflow::types::DocumentStatus;
use carbon_workflow::Config;

fn main() -> anyhow::Result<()> {
    // Initialise structured logging (RUST_LOG controls verbosity).
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // Load optional .env file (ignored if missing).
    let _ = dotenvy::dotenv();

    let config = Config::from_env()?;

    let store = DocumentStore::open(Box::new(JsonFilePersistence::new(
        &config.document_store_path,
    )));

    let total = store.len();
    let attested = store
        .iter()
        .filter(|d| d.status == DocumentStatus::Attested)
        .count();
    let findings = scan_attestation_integrity(store.iter());

    println!("documents: {total} total, {attested} attested");
    if findings.is_empty() {
        println!("no corrupted attestations found");
        return Ok(());
    }

    println!(
        "{} attested document(s) with incomplete attestation data:",
        findings.len()
    );
    for finding in &findings {
        println!(
            "  {}  missing: {}",
            finding.document_id,
            finding.missing.join(", ")
        );
    }
    println!("run reset_to_pending on each document to discard the partial attestation");

    Ok(())
}
