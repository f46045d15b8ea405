//! Scientific name helpers

/// Replace typed `x` hybrid notation with the multiplication sign
///
/// `"x beadlei"` becomes `"× beadlei"` and `"alba x macrocarpa"` becomes
/// `"alba × macrocarpa"`. Names already using `×` are returned unchanged.
pub fn normalize_hybrid_name(name: &str) -> String {
    let name = match name.strip_prefix("x ") {
        Some(rest) => format!("× {}", rest),
        None => name.to_string(),
    };
    name.replace(" x ", " × ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leading_x_is_converted() {
        assert_eq!(normalize_hybrid_name("x beadlei"), "× beadlei");
    }

    #[test]
    fn test_infix_x_is_converted() {
        assert_eq!(normalize_hybrid_name("alba x macrocarpa"), "alba × macrocarpa");
    }

    #[test]
    fn test_already_normalized_and_plain_names_unchanged() {
        assert_eq!(normalize_hybrid_name("× beadlei"), "× beadlei");
        assert_eq!(normalize_hybrid_name("alba"), "alba");
        // "x" inside a word is not hybrid notation
        assert_eq!(normalize_hybrid_name("xalapensis"), "xalapensis");
    }
}
