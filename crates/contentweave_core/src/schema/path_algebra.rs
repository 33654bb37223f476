//! Path redirection used to derive referenced content paths.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

static PLACEHOLDER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{(\*|\d+)\}").expect("valid placeholder regex"));

/// Derives a referenced path from a primary path and a rule descriptor.
///
/// Implementations must be pure: the same inputs always give the same path.
pub trait PathAlgebra: Send + Sync {
    fn redirect(&self, path: &str, descriptor: &str) -> String;
}

/// Descriptor interpreter over `/`-separated pattern parts.
///
/// Each part is literal text in which `{n}` expands to the n-th segment of
/// the primary path and `{*}` to the whole primary path. Parts that expand to
/// nothing are dropped. An empty descriptor redirects a path to itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct PatternRedirect;

impl PathAlgebra for PatternRedirect {
    fn redirect(&self, path: &str, descriptor: &str) -> String {
        let trimmed_path = path.trim().trim_matches('/');
        let descriptor = descriptor.trim();
        if descriptor.is_empty() {
            return format!("/{trimmed_path}");
        }

        let segments: Vec<&str> = trimmed_path
            .split('/')
            .filter(|segment| !segment.is_empty())
            .collect();

        let parts: Vec<String> = descriptor
            .trim_matches('/')
            .split('/')
            .map(|part| {
                PLACEHOLDER_RE
                    .replace_all(part.trim(), |caps: &Captures<'_>| match &caps[1] {
                        "*" => trimmed_path.to_string(),
                        index => index
                            .parse::<usize>()
                            .ok()
                            .and_then(|idx| segments.get(idx))
                            .map(|segment| segment.to_string())
                            .unwrap_or_default(),
                    })
                    .trim_matches('/')
                    .to_string()
            })
            .filter(|part| !part.is_empty())
            .collect();

        format!("/{}", parts.join("/"))
    }
}
