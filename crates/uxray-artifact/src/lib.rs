//! UX-Ray Artifact Identity
//!
//! Keys, kinds and content hashes for every derived artifact the pipeline
//! persists (UI reports, behaviour reports, web metrics, formulations and
//! chart specs).
//!
//! # Core Concepts
//!
//! - [`ArtifactKey`]: `(tenant, subject, kind[, slug])`, maps 1:1 to a storage path
//! - [`ArtifactKind`]: the five derived-artifact kinds
//! - [`ContentHash`]: 32-byte Blake3 hash of a payload's compact JSON
//! - [`Artifact`]: key + payload + path + hash
//!
//! # Example
//!
//! ```rust,ignore
//! use uxray_artifact::{ArtifactKey, ArtifactKind, SubjectId, TenantId};
//!
//! let key = ArtifactKey::singleton(
//!     TenantId::new("17")?,
//!     SubjectId::new("204")?,
//!     ArtifactKind::UiReport,
//! )?;
//! assert_eq!(key.relative_path().to_str(), Some("ui-report/17/204/ui_report.json"));
//! ```

#![warn(unreachable_pub)]

mod artifact;
mod hash;
mod key;

pub use artifact::Artifact;
pub use hash::ContentHash;
pub use key::{
    subject_dir, ArtifactKey, ArtifactKind, KeyError, SubjectId, TenantId, ARTIFACT_EXTENSION,
    MAX_SEGMENT_LEN,
};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
