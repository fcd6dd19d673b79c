//! Text normalization for company records.
//!
//! Canonical forms for the noisy free-text fields the dataset carries:
//! - Unicode NFKC normalization
//! - Lowercase conversion
//! - Punctuation stripping and whitespace collapsing
//! - Optional legal suffix removal (matching only, never stored)
//! - Postcode and CRN formatting
//!
//! All functions are pure and idempotent; empty or whitespace-only input
//! yields an empty canonical form.

use unicode_normalization::UnicodeNormalization;

/// UK legal suffixes stripped when building a matching key
const LEGAL_SUFFIXES: &[&str] = &[
    "ltd",
    "limited",
    "plc",
    "llp",
    "lp",
    "cic",
    "co",
    "company",
    "uk",
];

/// Company type keyed by the name tokens that indicate it, checked in order
const TYPE_INDICATORS: &[(&str, &[&str])] = &[
    ("ltd", &["ltd", "limited"]),
    ("plc", &["plc"]),
    ("llp", &["llp"]),
    ("community-interest-company", &["cic"]),
];

/// Dataset values that mean "no value here"
const ABSENT_VALUES: &[&str] = &[
    "n/a",
    "na",
    "nan",
    "none",
    "sole trader",
    "freelancer",
    "self employed",
];

/// Clean display text: trim, drop embedded newlines/carriage returns/tabs,
/// collapse whitespace runs to a single space. Preserves case and
/// punctuation; this is the form safe to store.
pub fn clean_text(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Whether a dataset cell should be treated as having no value.
pub fn is_absent(s: &str) -> bool {
    let v = s.trim().to_lowercase();
    v.is_empty() || ABSENT_VALUES.contains(&v.as_str())
}

/// Lowercased comparison form: NFKC fold, punctuation replaced with
/// spaces, whitespace collapsed. Used for equality checks and similarity
/// scoring, never stored back to the record.
pub fn comparison_key(s: &str) -> String {
    let folded: String = s.nfkc().collect();
    let stripped: String = folded
        .chars()
        .map(|c| {
            if c.is_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                ' '
            }
        })
        .collect();
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Comparison key with legal suffix tokens removed. "Example Trading Ltd."
/// and "EXAMPLE TRADING LIMITED" share a matching key.
pub fn matching_key(s: &str) -> String {
    comparison_key(s)
        .split_whitespace()
        .filter(|t| !LEGAL_SUFFIXES.contains(t))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Infer a company type from indicators in the name, for records where the
/// registry reports none. "Acme Widgets Limited" is a "ltd"; a name that
/// carries no indicator yields `None`.
pub fn infer_company_type(name: &str) -> Option<&'static str> {
    let key = comparison_key(name);
    let tokens: Vec<&str> = key.split_whitespace().collect();

    for &(company_type, indicators) in TYPE_INDICATORS {
        if tokens.iter().any(|t| indicators.contains(t)) {
            return Some(company_type);
        }
    }

    if key.contains("sole trader") || key.contains("freelancer") {
        return Some("sole trader");
    }

    None
}

/// Normalize a UK postcode: uppercase, single space before the three-char
/// inward code. Inputs that are not plausibly a postcode are returned
/// uppercased and squashed, unchanged otherwise.
pub fn normalize_postcode(s: &str) -> String {
    let squashed: String = s
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| c.to_ascii_uppercase())
        .collect();

    // Outward code is 2-4 chars, inward code is always 3
    if squashed.is_ascii() && (5..=7).contains(&squashed.len()) {
        let split = squashed.len() - 3;
        format!("{} {}", &squashed[..split], &squashed[split..])
    } else {
        squashed
    }
}

/// Prefixes used by Companies House for non-English-registered companies
const CRN_PREFIXES: &[&str] = &[
    "SC", "NI", "NC", "NF", "OC", "SO", "LP", "SL", "FC", "SF", "NL", "GE", "IP", "SP", "IC",
    "SI", "NP", "NO", "RC", "SR", "AC", "SA", "NA", "NZ", "CE", "CS", "PC", "RS",
];

/// Normalize a company registration number to the 8-character registry
/// form: strip whitespace, uppercase, zero-pad the numeric part
/// (prefix-aware for Scottish/Northern Irish/LLP numbers).
pub fn normalize_crn(crn: &str) -> String {
    let crn: String = crn
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| c.to_ascii_uppercase())
        .collect();

    if !crn.is_ascii() {
        return crn;
    }

    if crn.len() >= 2 {
        let prefix = &crn[..2];
        if CRN_PREFIXES.contains(&prefix) {
            let digits = &crn[2..];
            if crn.len() < 8 && digits.chars().all(|c| c.is_ascii_digit()) {
                return format!("{}{:0>6}", prefix, digits);
            }
            return crn;
        }
    }

    if crn.chars().all(|c| c.is_ascii_digit()) && !crn.is_empty() {
        return format!("{:0>8}", crn);
    }

    crn
}

/// Whether a dataset value looks like a valid CRN worth looking up:
/// all digits, or a known two-letter prefix followed by digits, at most
/// 8 characters once squashed.
pub fn is_valid_crn(crn: &str) -> bool {
    let crn: String = crn
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| c.to_ascii_uppercase())
        .collect();

    if !crn.is_ascii() || crn.is_empty() || crn.len() > 8 || is_absent(&crn) {
        return false;
    }

    if crn.len() >= 2 {
        let prefix = &crn[..2];
        if CRN_PREFIXES.contains(&prefix) {
            return crn.len() > 2 && crn[2..].chars().all(|c| c.is_ascii_digit());
        }
    }

    crn.chars().all(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_text() {
        assert_eq!(clean_text("  Example   Co  "), "Example Co");
        assert_eq!(clean_text("Example Co.\n"), "Example Co.");
        assert_eq!(clean_text("Example\r\nCo\tLtd"), "Example Co Ltd");
        assert_eq!(clean_text("   \n\t "), "");
    }

    #[test]
    fn test_clean_text_idempotent() {
        for s in ["  Example   Co.\n", "ACME\tLTD\r", "", "one"] {
            let once = clean_text(s);
            assert_eq!(clean_text(&once), once);
        }
    }

    #[test]
    fn test_comparison_key() {
        assert_eq!(comparison_key("Example Co.\n"), "example co");
        assert_eq!(comparison_key("AT&T Inc."), "at t inc");
        assert_eq!(comparison_key("  Apple   Inc  "), "apple inc");
        // Full-width characters fold to ASCII under NFKC
        assert_eq!(comparison_key("Ａｐｐｌｅ"), "apple");
    }

    #[test]
    fn test_comparison_key_idempotent() {
        for s in ["Example Co.\n", "AT&T Inc.", "Société Générale"] {
            let once = comparison_key(s);
            assert_eq!(comparison_key(&once), once);
        }
    }

    #[test]
    fn test_matching_key_strips_suffixes() {
        assert_eq!(matching_key("Example Trading Ltd."), "example trading");
        assert_eq!(matching_key("EXAMPLE TRADING LIMITED"), "example trading");
        assert_eq!(matching_key("Acme PLC"), "acme");
        assert_eq!(matching_key("Northgate Systems LLP"), "northgate systems");
    }

    #[test]
    fn test_is_absent() {
        assert!(is_absent(""));
        assert!(is_absent("  "));
        assert!(is_absent("N/A"));
        assert!(is_absent("nan"));
        assert!(is_absent("Sole Trader"));
        assert!(!is_absent("Example Co"));
        assert!(!is_absent("12345678"));
    }

    #[test]
    fn test_infer_company_type() {
        assert_eq!(infer_company_type("Acme Widgets Limited"), Some("ltd"));
        assert_eq!(infer_company_type("ACME LTD."), Some("ltd"));
        assert_eq!(infer_company_type("Northgate Holdings PLC"), Some("plc"));
        assert_eq!(infer_company_type("Smith & Jones LLP"), Some("llp"));
        assert_eq!(
            infer_company_type("Greenfield CIC"),
            Some("community-interest-company")
        );
        assert_eq!(infer_company_type("Jane Doe (Sole Trader)"), Some("sole trader"));
        assert_eq!(infer_company_type("Northgate Systems"), None);
        // "Co" alone is not a type indicator
        assert_eq!(infer_company_type("Example Co"), None);
    }

    #[test]
    fn test_normalize_postcode() {
        assert_eq!(normalize_postcode("sw1a 1aa"), "SW1A 1AA");
        assert_eq!(normalize_postcode("sw1a1aa"), "SW1A 1AA");
        assert_eq!(normalize_postcode("  m1  1ae "), "M1 1AE");
        assert_eq!(normalize_postcode("EC1A 1BB"), "EC1A 1BB");
        // Too short to be a postcode, passed through squashed
        assert_eq!(normalize_postcode("x1"), "X1");
    }

    #[test]
    fn test_normalize_postcode_idempotent() {
        for s in ["sw1a1aa", "M1 1AE", "EC1A1BB"] {
            let once = normalize_postcode(s);
            assert_eq!(normalize_postcode(&once), once);
        }
    }

    #[test]
    fn test_normalize_crn() {
        assert_eq!(normalize_crn("12345678"), "12345678");
        assert_eq!(normalize_crn("1234567"), "01234567");
        assert_eq!(normalize_crn(" 123456 "), "00123456");
        assert_eq!(normalize_crn("sc123456"), "SC123456");
        assert_eq!(normalize_crn("SC12345"), "SC012345");
        assert_eq!(normalize_crn("NI1234"), "NI001234");
        assert_eq!(normalize_crn("OC123456"), "OC123456");
    }

    #[test]
    fn test_is_valid_crn() {
        assert!(is_valid_crn("12345678"));
        assert!(is_valid_crn("1234567"));
        assert!(is_valid_crn("SC123456"));
        assert!(is_valid_crn("ni 123456"));
        assert!(!is_valid_crn(""));
        assert!(!is_valid_crn("n/a"));
        assert!(!is_valid_crn("123456789"));
        assert!(!is_valid_crn("XX123456"));
        assert!(!is_valid_crn("SC12345X"));
        assert!(!is_valid_crn("SC"));
    }

    #[test]
    fn test_leading_zero_equivalence() {
        assert_eq!(normalize_crn("01234567"), normalize_crn("1234567"));
    }
}
