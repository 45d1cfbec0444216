//! Filesystem side of the engine: scanning, fingerprints, copy and remove.

pub mod metadata;
pub mod ops;
pub mod walker;

pub use metadata::Fingerprint;
pub use ops::{FileOps, LocalFs};
pub use walker::{scan_source, ScanResult, SkippedEntry, SourceFile, WalkOptions};
