//! Papergraph science: metadata lookup, citation graph building and PDF acquisition.

pub mod acquire;
pub mod error;
pub mod expand;
pub mod graph;
pub mod harvest;
pub mod http;
pub mod pool;
pub mod sources;
pub mod transport;

pub use acquire::{Acquirer, AcquisitionReport, Candidate, candidates};
pub use error::{Result, ScienceError};
pub use expand::{EdgeFetch, MetadataExpander};
pub use graph::{GraphBuilder, GraphReport};
pub use harvest::{HarvestOptions, HarvestReport, Harvester};
pub use pool::WorkerPool;
pub use sources::MetadataApi;
pub use sources::semantic_scholar::SemanticScholarSource;
pub use transport::{FallbackTransport, HttpTransport, Transport};
