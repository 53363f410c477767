//! Image library: directory scan, corpus building, payload loading, and the
//! retrieval service exposed to the HTTP layer.

pub mod builder;
pub mod error;
pub mod materialize;
pub mod provider;
pub mod scan;
pub mod service;

pub use builder::{build_index, BuildReport, CorpusBuilder};
pub use error::{BuildFailure, CorpusBuildError, LibraryError, MaterializeError, Result};
pub use materialize::{materialize, MaterializedHit, Materializer};
pub use scan::{scan_library, LibraryFile};
pub use service::{BuildSummary, LibraryStats, RetrievalService, SearchHit, SearchOutcome};
