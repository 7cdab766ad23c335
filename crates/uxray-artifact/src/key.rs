//! Artifact keys and their storage paths
//!
//! An [`ArtifactKey`] is `(tenant, subject, kind[, slug])`. The key alone
//! determines where the artifact lives below the store root:
//!
//! ```text
//! <root>/<kind>/<tenant>/<subject>/<name>
//! ```
//!
//! `<name>` is a fixed file name for singleton kinds and `<slug>.json` for
//! chart specs. This layout is the persisted-state schema; changing it
//! orphans every artifact written before the change.

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::path::PathBuf;
use std::str::FromStr;

/// Longest accepted identifier or slug, in bytes
pub const MAX_SEGMENT_LEN: usize = 128;

/// Extension used for every persisted artifact file
pub const ARTIFACT_EXTENSION: &str = "json";

fn validate_segment(segment: &str) -> Result<(), KeyError> {
    if segment.is_empty() {
        return Err(KeyError::EmptySegment);
    }
    if segment.len() > MAX_SEGMENT_LEN {
        return Err(KeyError::TooLong(segment.len()));
    }
    if segment
        .chars()
        .any(|c| !(c.is_ascii_alphanumeric() || c == '-' || c == '_'))
    {
        return Err(KeyError::InvalidSegment(segment.to_string()));
    }
    Ok(())
}

/// Owning business of an artifact
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TenantId(String);

impl TenantId {
    /// Create a tenant id, validating it as a path segment
    ///
    /// # Errors
    /// Returns error if the id is empty, too long or contains characters
    /// outside `[A-Za-z0-9_-]`
    pub fn new(id: impl Into<String>) -> Result<Self, KeyError> {
        let id = id.into();
        validate_segment(&id)?;
        Ok(Self(id))
    }

    /// Borrow the raw id
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Page or upload an artifact is derived from
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SubjectId(String);

impl SubjectId {
    /// Create a subject id, validating it as a path segment
    ///
    /// # Errors
    /// Same rules as [`TenantId::new`]
    pub fn new(id: impl Into<String>) -> Result<Self, KeyError> {
        let id = id.into();
        validate_segment(&id)?;
        Ok(Self(id))
    }

    /// Borrow the raw id
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

macro_rules! id_conversions {
    ($ty:ident) => {
        impl Display for $ty {
            fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl FromStr for $ty {
            type Err = KeyError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s)
            }
        }

        impl TryFrom<String> for $ty {
            type Error = KeyError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$ty> for String {
            fn from(id: $ty) -> Self {
                id.0
            }
        }

        impl AsRef<str> for $ty {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

id_conversions!(TenantId);
id_conversions!(SubjectId);

/// Kind of derived artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArtifactKind {
    /// Structure + styling analysis of a page
    UiReport,
    /// Behaviour-analytics critique of an uploaded evidence file
    BehaviorReport,
    /// Page-speed metrics snapshot
    WebMetricsReport,
    /// Recommendations formulated from an evaluation
    Formulation,
    /// One chart configuration per finding
    ChartSpec,
}

impl ArtifactKind {
    /// Every kind, in directory order
    pub const ALL: [ArtifactKind; 5] = [
        ArtifactKind::UiReport,
        ArtifactKind::BehaviorReport,
        ArtifactKind::WebMetricsReport,
        ArtifactKind::Formulation,
        ArtifactKind::ChartSpec,
    ];

    /// Stable identifier, also the top-level directory name
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::UiReport => "ui-report",
            Self::BehaviorReport => "behavior-report",
            Self::WebMetricsReport => "web-metrics-report",
            Self::Formulation => "formulation",
            Self::ChartSpec => "chart-spec",
        }
    }

    /// Fixed file name for singleton kinds; `None` for chart specs
    #[inline]
    #[must_use]
    pub const fn singleton_file(self) -> Option<&'static str> {
        match self {
            Self::UiReport => Some("ui_report.json"),
            Self::BehaviorReport => Some("uba_report.json"),
            Self::WebMetricsReport => Some("web_metrics.json"),
            Self::Formulation => Some("formulation.json"),
            Self::ChartSpec => None,
        }
    }

    /// Whether one artifact of this kind exists per subject
    #[inline]
    #[must_use]
    pub const fn is_singleton(self) -> bool {
        self.singleton_file().is_some()
    }
}

impl Display for ArtifactKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArtifactKind {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| KeyError::UnknownKind(s.to_string()))
    }
}

/// Unique address of an artifact
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ArtifactKey {
    tenant: TenantId,
    subject: SubjectId,
    kind: ArtifactKind,
    slug: Option<String>,
}

impl ArtifactKey {
    /// Key for a singleton kind (one artifact per subject)
    ///
    /// # Errors
    /// Returns [`KeyError::SlugRequired`] for [`ArtifactKind::ChartSpec`]
    pub fn singleton(
        tenant: TenantId,
        subject: SubjectId,
        kind: ArtifactKind,
    ) -> Result<Self, KeyError> {
        if !kind.is_singleton() {
            return Err(KeyError::SlugRequired(kind));
        }
        Ok(Self {
            tenant,
            subject,
            kind,
            slug: None,
        })
    }

    /// Key for one chart spec of a subject
    ///
    /// # Errors
    /// Returns error if the slug is not a valid path segment
    pub fn chart_spec(
        tenant: TenantId,
        subject: SubjectId,
        slug: impl Into<String>,
    ) -> Result<Self, KeyError> {
        let slug = slug.into();
        validate_segment(&slug)?;
        Ok(Self {
            tenant,
            subject,
            kind: ArtifactKind::ChartSpec,
            slug: Some(slug),
        })
    }

    /// Owning tenant
    #[inline]
    #[must_use]
    pub fn tenant(&self) -> &TenantId {
        &self.tenant
    }

    /// Subject the artifact is derived from
    #[inline]
    #[must_use]
    pub fn subject(&self) -> &SubjectId {
        &self.subject
    }

    /// Artifact kind
    #[inline]
    #[must_use]
    pub fn kind(&self) -> ArtifactKind {
        self.kind
    }

    /// Chart slug, if any
    #[inline]
    #[must_use]
    pub fn slug(&self) -> Option<&str> {
        self.slug.as_deref()
    }

    /// File name under the subject directory
    #[must_use]
    pub fn file_name(&self) -> String {
        match (self.kind.singleton_file(), &self.slug) {
            (Some(name), _) => name.to_string(),
            (None, Some(slug)) => format!("{slug}.{ARTIFACT_EXTENSION}"),
            // Constructors guarantee chart specs carry a slug.
            (None, None) => format!("unnamed.{ARTIFACT_EXTENSION}"),
        }
    }

    /// Path relative to the store root
    #[must_use]
    pub fn relative_path(&self) -> PathBuf {
        subject_dir(self.kind, &self.tenant, &self.subject).join(self.file_name())
    }
}

impl Display for ArtifactKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.kind, self.tenant, self.subject)?;
        if let Some(slug) = &self.slug {
            write!(f, "/{slug}")?;
        }
        Ok(())
    }
}

/// Directory holding every artifact of `kind` for one subject
#[must_use]
pub fn subject_dir(kind: ArtifactKind, tenant: &TenantId, subject: &SubjectId) -> PathBuf {
    PathBuf::from(kind.as_str())
        .join(tenant.as_str())
        .join(subject.as_str())
}

/// Errors related to artifact keys
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeyError {
    /// Empty identifier
    #[error("identifier is empty")]
    EmptySegment,

    /// Identifier longer than [`MAX_SEGMENT_LEN`]
    #[error("identifier too long: {0} bytes (max {max})", max = MAX_SEGMENT_LEN)]
    TooLong(usize),

    /// Identifier with characters unsafe in a path
    #[error("invalid identifier: {0:?} (allowed: ASCII alphanumeric, '-', '_')")]
    InvalidSegment(String),

    /// Unrecognised kind name
    #[error("unknown artifact kind: {0}")]
    UnknownKind(String),

    /// Chart specs are addressed by slug
    #[error("artifact kind {0} requires a slug")]
    SlugRequired(ArtifactKind),
}
