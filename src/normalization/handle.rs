/// Template used when no override is configured: the lowercased code alone.
pub const DEFAULT_HANDLE_TEMPLATE: &str = "${codeLower}";

/// Build a catalog lookup handle from a product code via literal placeholder
/// substitution. Supported placeholders:
/// - `${codeLower}` — the code, lowercased
/// - `${codeUpper}` — the code, uppercased
/// - `${codeNum}` — the code's digits only (empty for digitless codes)
pub fn derive_handle(code: &str, template: &str) -> String {
    let digits: String = code.chars().filter(|c| c.is_ascii_digit()).collect();
    template
        .replace("${codeLower}", &code.to_lowercase())
        .replace("${codeUpper}", &code.to_uppercase())
        .replace("${codeNum}", &digits)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_template_is_the_lowercased_code() {
        assert_eq!(derive_handle("CS12", DEFAULT_HANDLE_TEMPLATE), "cs12");
    }

    #[test]
    fn substitutes_all_placeholders() {
        assert_eq!(
            derive_handle("CS12", "item-${codeNum}-${codeLower}-${codeUpper}"),
            "item-12-cs12-CS12"
        );
    }

    #[test]
    fn digitless_code_yields_empty_num() {
        assert_eq!(derive_handle("PROMO", "p-${codeNum}"), "p-");
        assert_eq!(derive_handle("PROMO", "${codeLower}"), "promo");
    }

    #[test]
    fn template_without_placeholders_passes_through() {
        assert_eq!(derive_handle("CS1", "fixed-handle"), "fixed-handle");
    }
}
