//! UX-Ray Findings
//!
//! Structural parsing of generative critiques and of the chart-spec
//! responses synthesized from them.
//!
//! # Pipeline
//!
//! ```text
//! critique text ──extract──▶ [Finding] ──┐
//!                                        ├──correlate──▶ [(Finding, VisualizationSpec)]
//! `$`-prefixed response ──parse_response─┘
//! ```
//!
//! Nothing here understands natural language; everything is pattern
//! matching on numbered lines, annotation markers and sentinel prefixes.
//!
//! # Example
//!
//! ```rust
//! use uxray_findings::{correlate, extract};
//!
//! let findings = extract("findings:\n1. Drop-off at checkout.\n2. Slow page load.").unwrap();
//! let pairs = correlate(&findings, "$ {\"type\":\"bar\"}\n$ERROR: finding 2 - no data").unwrap();
//! assert_eq!(pairs.len(), 1);
//! assert_eq!(pairs[0].0.index, 1);
//! ```

#![warn(unreachable_pub)]

mod correlate;
mod error;
mod extract;
mod slug;

pub use correlate::{
    correlate, correlate_with, parse_response, CorrelationPolicy, SpecLine, SpecPair,
    VisualizationSpec, SENTINEL,
};
pub use error::{CorrelationError, ExtractError};
pub use extract::{
    extract, ExtractorOptions, Finding, FindingExtractor, ANNOTATION_MARKER, FINDINGS_HEADER,
};
pub use slug::{finding_slug, slugify, ChartNaming, MAX_SLUG_LEN, SLUG_WORDS};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Common imports
pub mod prelude {
    pub use crate::{
        correlate_with, extract, ChartNaming, CorrelationError, CorrelationPolicy, ExtractError,
        Finding, FindingExtractor, VisualizationSpec,
    };
}

#[cfg(test)]
mod integration_tests {
    use super::*;

    #[test]
    fn extract_correlate_and_name() {
        let findings = extract(
            "findings:\n1. Drop-off at checkout. Users abandon after step 2.\n2. Slow page load on mobile.",
        )
        .unwrap();
        let raw = "Sure!\n$ {\"type\":\"bar\"}\n$ {\"type\":\"line\"}\n";
        let pairs = correlate_with(CorrelationPolicy::IndexEchoing, &findings, raw).unwrap();

        let names: Vec<String> = pairs
            .iter()
            .map(|(finding, _)| ChartNaming::Indexed.name(finding))
            .collect();
        assert_eq!(
            names,
            vec![
                "01-drop-off-at-checkout-users-abandon-after",
                "02-slow-page-load-on-mobile"
            ]
        );
    }
}
