//! Vigenza Engine
//!
//! Point-in-time status of amended Italian legal norms ("multivigenza").
//! This library provides functionality for:
//! - Parsing amendment clauses into structured destinations
//!   (`art. 2-bis, comma 3, lettera a)`) and classifying their operation
//! - Building a graph of acts, articles, paragraphs and lettered items with
//!   their amendment edges
//! - Deriving, for any norm and date, whether it is in force, superseded or
//!   repealed, together with the amendments that produced that status
//!
//! # Example
//!
//! ```
//! use chrono::NaiveDate;
//! use vigenza_engine::{Batch, NormStatus, VigenzaService};
//!
//! let batch = Batch::from_yaml_str(r#"
//! acts:
//!   - id: legge:1991;14
//!     enactment_date: 1991-02-10
//!     articles:
//!       - number: "2"
//! clauses:
//!   - source_act_id: legge:2020;77
//!     destination_text: "dopo l'articolo 2 è inserito il seguente: «Art. 2-bis»"
//!     effective_date: 2020-07-14
//!     target_act_id: legge:1991;14
//! "#).unwrap();
//!
//! let service = VigenzaService::new();
//! service.ingest_batch(&batch);
//!
//! let art_2bis = "urn:nir:stato:legge:1991;14~art2bis".parse().unwrap();
//! let before = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
//! let after = NaiveDate::from_ymd_opt(2021, 1, 1).unwrap();
//! assert_eq!(service.get_status(&art_2bis, before).unwrap().status, NormStatus::NotYetInForce);
//! assert_eq!(service.get_status(&art_2bis, after).unwrap().status, NormStatus::InForce);
//! ```

pub mod anomaly;
pub mod batch;
pub mod classifier;
pub mod config;
pub mod error;
pub mod graph;
pub mod identifier;
pub mod parser;
pub mod resolver;
pub mod service;
pub mod status;
pub mod types;

// Re-export commonly used items
pub use anomaly::{Anomaly, AnomalyReason};
pub use config::EngineConfig;
pub use error::{Result, VigenzaError};
pub use graph::{Amendment, AmendmentEdge, GraphSnapshot, MemoryStore, NormStore};
pub use identifier::{ActId, ItemLetter, LatinSuffix, NormId, ProvisionNumber};
pub use parser::{parse_destination, ActRef, DestinationRef};
pub use resolver::Resolution;
pub use service::{BatchReport, VigenzaService};
pub use status::{Contribution, Effect, Scope, StatusReport};
pub use types::{
    ActType, AmendmentKind, Batch, Confidence, Granularity, Norm, NormStatus, RawAct,
    RawAmendmentClause,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
