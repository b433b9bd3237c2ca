//! Postcode grammar for the target jurisdiction.
//!
//! A full code is an outward code (one or two area letters, a district digit,
//! an optional second digit or sub-district letter), an optional single space,
//! and an inward code (a sector digit and two unit letters). Each position only
//! admits the letters Royal Mail issues there, so `ZZ99 9ZZ` is rejected even
//! though its shape looks right. Codes that fail the grammar never should have
//! existed; codes that pass it but are missing from the registry have been
//! retired.

use std::sync::LazyLock;

use regex::Regex;

static POSTCODE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"^(?:GIR ?0AA|(?:",
        r"[A-PR-UWYZ][0-9][0-9]?",
        r"|[A-PR-UWYZ][A-HK-Y][0-9][0-9]?",
        r"|[A-PR-UWYZ][0-9][A-HJKPSTUW]",
        r"|[A-PR-UWYZ][A-HK-Y][0-9][ABEHMNPRVWXY]",
        r") ?[0-9][ABD-HJLNP-UW-Z]{2})$",
    ))
    .expect("static postcode regex")
});

/// Inward codes are always three characters.
const INWARD_LEN: usize = 3;

/// True when `code` is a syntactically complete postcode.
pub fn is_valid(code: &str) -> bool {
    POSTCODE_RE.is_match(code)
}

/// The outward code: everything before the internal space, or everything but
/// the inward code when the code is written without one.
pub fn outward_code(code: &str) -> &str {
    let code = code.trim();
    if let Some((outward, _)) = code.split_once(' ') {
        return outward;
    }
    if code.len() > INWARD_LEN && code.is_char_boundary(code.len() - INWARD_LEN) {
        return &code[..code.len() - INWARD_LEN];
    }
    code
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_every_outward_shape() {
        for code in [
            "M1 1AE", "B33 8TH", "CR2 6XH", "DN55 1PT", "W1A 0AX", "EC1A 1BB", "SW1A 1AA",
            "SW1A1AA", "BT7 1NN", "GIR 0AA",
        ] {
            assert!(is_valid(code), "rejected '{code}'");
        }
    }

    #[test]
    fn rejects_wrong_arity_and_missing_unit() {
        for code in [
            "", "ZZ99 9ZZ9", "ABC1 1AA", "1A 1AA", "SW1A 1A", "SW1A 11A", "SW1A  1AA",
            "sw1a 1aa", "SW1A", "EC1A 1B", "EC1A-1BB", "ZZ99 9ZZ", "QA1 1AA", "SW1A 1AC",
        ] {
            assert!(!is_valid(code), "accepted '{code}'");
        }
    }

    #[test]
    fn outward_code_with_and_without_space() {
        assert_eq!(outward_code("SW1A 1AA"), "SW1A");
        assert_eq!(outward_code("SW1A1AA"), "SW1A");
        assert_eq!(outward_code("M1 1AE"), "M1");
        assert_eq!(outward_code("AB"), "AB");
    }
}
