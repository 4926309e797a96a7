use regex::{Regex, RegexBuilder};

use crate::error::SyncError;

/// Pattern applied to asset names when no override is configured.
pub const DEFAULT_CODE_PATTERN: &str = r"^CS\d+";

/// Compile a code pattern for matching, always case-insensitive.
///
/// The pattern comes straight from operator configuration, so a broken one is
/// reported as a configuration problem before any network traffic happens.
pub fn compile_code_pattern(pattern: &str) -> Result<Regex, SyncError> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map_err(|e| SyncError::config(format!("invalid code pattern {pattern:?}: {e}")))
}

/// First pattern match in `text`, uppercased.
///
/// `None` means the text carries no product code; the asset it came from
/// simply does not participate in the sync.
pub fn extract_code(text: &str, pattern: &Regex) -> Option<String> {
    pattern.find(text).map(|m| m.as_str().to_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uppercases_first_match() {
        let re = compile_code_pattern(DEFAULT_CODE_PATTERN).unwrap();
        assert_eq!(extract_code("cs12_front.jpg", &re), Some("CS12".into()));
        assert_eq!(extract_code("CS7.png", &re), Some("CS7".into()));
    }

    #[test]
    fn non_matching_text_yields_none() {
        let re = compile_code_pattern(DEFAULT_CODE_PATTERN).unwrap();
        assert_eq!(extract_code("widget.png", &re), None);
        assert_eq!(extract_code("", &re), None);
        // Anchored default: the code has to open the name.
        assert_eq!(extract_code("front_CS12.jpg", &re), None);
    }

    #[test]
    fn unanchored_patterns_match_inside_urls() {
        let re = compile_code_pattern(r"sku-[a-z]+").unwrap();
        assert_eq!(
            extract_code("https://cdn.example.com/files/SKU-alpha/main.mp4", &re),
            Some("SKU-ALPHA".into())
        );
    }

    #[test]
    fn invalid_pattern_is_a_configuration_error() {
        let err = compile_code_pattern("(unclosed").unwrap_err();
        assert!(matches!(err, SyncError::Configuration { .. }));
    }
}
