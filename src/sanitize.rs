/// Maximum number of characters kept in a single subject component.
pub const MAX_COMPONENT_LEN: usize = 256;

/// Turns an untrusted device string into a safe certificate subject component.
///
/// Every character outside printable ASCII (`0x20..=0x7E`), and each of
/// `/ \ " \r \n`, is replaced with `_`. The output is truncated to
/// [`MAX_COMPONENT_LEN`] characters. The function is total and idempotent.
///
/// # Example
/// ```
/// use usbcert::sanitize::sanitize_component;
/// assert_eq!(sanitize_component("SN/12\"3"), "SN_12_3");
/// ```
pub fn sanitize_component(input: &str) -> String {
    input
        .chars()
        .take(MAX_COMPONENT_LEN)
        .map(|c| if is_safe(c) { c } else { '_' })
        .collect()
}

fn is_safe(c: char) -> bool {
    matches!(c, ' '..='~') && !matches!(c, '/' | '\\' | '"')
}

/// Sanitizes an optional component, yielding `None` when the input is absent or empty.
pub fn sanitize_optional(input: Option<&str>) -> Option<String> {
    input
        .filter(|s| !s.is_empty())
        .map(sanitize_component)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_clean(s: &str) -> bool {
        s.bytes()
            .all(|b| (0x20..=0x7e).contains(&b) && !b"/\\\"\r\n".contains(&b))
    }

    #[test]
    fn test_replaces_forbidden_characters() {
        assert_eq!(sanitize_component("a/b\\c\"d\re\nf"), "a_b_c_d_e_f");
        assert_eq!(sanitize_component("tab\there"), "tab_here");
        assert_eq!(sanitize_component("\u{7f}\u{0}"), "__");
    }

    #[test]
    fn test_non_ascii_becomes_single_placeholder_per_char() {
        assert_eq!(sanitize_component("Flash–Drive ü"), "Flash_Drive _");
    }

    #[test]
    fn test_printable_ascii_passes_through() {
        let printable: String = (0x20u8..=0x7e)
            .map(char::from)
            .filter(|c| !matches!(c, '/' | '\\' | '"'))
            .collect();
        assert_eq!(sanitize_component(&printable), printable);
        assert_eq!(sanitize_component("1d6b:0002@#$"), "1d6b:0002@#$");
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(sanitize_component(""), "");
        assert_eq!(sanitize_optional(None), None);
        assert_eq!(sanitize_optional(Some("")), None);
        assert_eq!(sanitize_optional(Some("x\n")), Some("x_".to_string()));
    }

    #[test]
    fn test_truncates_to_max_length() {
        let long = "A".repeat(MAX_COMPONENT_LEN + 50);
        let out = sanitize_component(&long);
        assert_eq!(out.len(), MAX_COMPONENT_LEN);

        let short = "B".repeat(MAX_COMPONENT_LEN);
        assert_eq!(sanitize_component(&short), short);
    }

    #[test]
    fn test_output_clean_and_idempotent() {
        let samples = [
            "",
            "plain",
            "SN 123 456*(&",
            "../../etc/passwd",
            "'; rm -rf / #",
            "quote\"back\\slash",
            "line\r\nbreak",
            "\u{1b}[31mred\u{1b}[0m",
            "日本語のデバイス",
            "emoji 🚀 drive",
        ];
        for s in samples {
            let once = sanitize_component(s);
            assert!(is_clean(&once), "unclean output for {s:?}: {once:?}");
            assert!(once.chars().count() <= s.chars().count());
            assert_eq!(sanitize_component(&once), once);
        }
    }
}
