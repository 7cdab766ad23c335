//! Deterministic chart names derived from finding text

use crate::extract::Finding;
use serde::{Deserialize, Serialize};

/// Words of finding text that contribute to a slug
pub const SLUG_WORDS: usize = 6;

/// Maximum slug length in bytes
pub const MAX_SLUG_LEN: usize = 64;

/// Slugify the first [`SLUG_WORDS`] words of `text`
///
/// Lowercases, collapses every run of non-ASCII-alphanumerics into one `-`,
/// trims leading and trailing dashes and caps the result at
/// [`MAX_SLUG_LEN`] bytes. May return an empty string.
#[must_use]
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(MAX_SLUG_LEN);
    let mut pending_dash = false;

    for ch in text
        .split_whitespace()
        .take(SLUG_WORDS)
        .collect::<Vec<_>>()
        .join(" ")
        .chars()
    {
        if ch.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(ch.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
        if slug.len() >= MAX_SLUG_LEN {
            break;
        }
    }

    slug.truncate(MAX_SLUG_LEN);
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

/// Slug for a finding, falling back to `finding-<index>` when empty
#[must_use]
pub fn finding_slug(finding: &Finding) -> String {
    let slug = slugify(&finding.text);
    if slug.is_empty() {
        format!("finding-{}", finding.index)
    } else {
        slug
    }
}

/// Naming scheme for persisted chart specs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChartNaming {
    /// Plain slug; findings sharing their first words overwrite each other
    #[default]
    Slug,
    /// Slug prefixed with the zero-padded finding index
    Indexed,
}

impl ChartNaming {
    /// Chart name for a finding under this scheme
    #[must_use]
    pub fn name(self, finding: &Finding) -> String {
        match self {
            Self::Slug => finding_slug(finding),
            Self::Indexed => format!("{:02}-{}", finding.index, finding_slug(finding)),
        }
    }
}
