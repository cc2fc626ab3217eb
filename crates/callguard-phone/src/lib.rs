//! Phone number normalization and classification.
//!
//! [`PhoneNumberNormalizer`] turns whatever the platform hands us
//! (national format, spaces, dots, `+` prefix, garbage) into the
//! [`CanonicalNumber`] every store is keyed by. Normalization is total:
//! it only returns `None` for input with no digits at all, so a
//! malformed number degrades to a best-effort key instead of stalling
//! the screening pipeline.
//!
//! Parsing and validation use libphonenumber metadata for the
//! configured region. When the metadata is not conclusive the
//! per-region [`RegionRules`] heuristics apply.

pub mod rules;

use callguard_types::config::DEFAULT_REGION;
use callguard_types::CanonicalNumber;
use phonenumber::{country, Mode, PhoneNumber, Type};

pub use crate::rules::RegionRules;

/// Display text for a caller that withheld its number.
pub const HIDDEN_NUMBER_LABEL: &str = "Numéro masqué";

// ---------------------------------------------------------------------------
// PhoneNumberNormalizer
// ---------------------------------------------------------------------------

/// Region-aware normalizer and classifier.
#[derive(Clone, Debug)]
pub struct PhoneNumberNormalizer {
    region: String,
    country: Option<country::Id>,
    rules: RegionRules,
}

impl Default for PhoneNumberNormalizer {
    fn default() -> Self {
        Self::new(DEFAULT_REGION)
    }
}

impl PhoneNumberNormalizer {
    /// Creates a normalizer for an ISO 3166 region code such as `"FR"`.
    ///
    /// An unknown region code still yields a working normalizer: only
    /// numbers written in international format will validate.
    pub fn new(region: &str) -> Self {
        let region = region.trim().to_ascii_uppercase();
        let country = region.parse::<country::Id>().ok();
        let rules = RegionRules::for_region(&region);
        Self {
            region,
            country,
            rules,
        }
    }

    /// The configured region code.
    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn rules(&self) -> &RegionRules {
        &self.rules
    }

    /// Canonicalizes `raw`.
    ///
    /// 1. A number that validates for the region becomes E.164.
    /// 2. Otherwise every character except a leading `+` and digits is
    ///    dropped, and the stripped form is validated once more.
    /// 3. If that still fails, the stripped form is the key.
    ///
    /// Blank input, or input without a single digit, yields `None`.
    /// The result is a fixed point: normalizing it again returns it
    /// unchanged.
    pub fn normalize(&self, raw: &str) -> Option<CanonicalNumber> {
        if raw.trim().is_empty() {
            return None;
        }
        if let Some(parsed) = self.parse_valid(raw) {
            return Some(CanonicalNumber::new(e164(&parsed)));
        }

        let stripped = strip_to_dialable(raw);
        if !stripped.chars().any(|c| c.is_ascii_digit()) {
            return None;
        }
        match self.parse_valid(&stripped) {
            Some(parsed) => Some(CanonicalNumber::new(e164(&parsed))),
            None => Some(CanonicalNumber::new(stripped)),
        }
    }

    /// Returns `true` if `raw` is a valid number for the region.
    pub fn is_valid(&self, raw: &str) -> bool {
        self.parse_valid(raw).is_some()
    }

    /// Returns `true` if `raw` is (probably) a mobile line.
    ///
    /// Uses the number type from metadata for valid numbers, and the
    /// region's mobile prefixes otherwise.
    pub fn is_mobile(&self, raw: &str) -> bool {
        if raw.trim().is_empty() {
            return false;
        }
        match self.parse_valid(raw) {
            Some(parsed) => matches!(
                parsed.number_type(&phonenumber::metadata::DATABASE),
                Type::Mobile | Type::FixedLineOrMobile
            ),
            None => self.rules.looks_mobile(&digits_only(raw)),
        }
    }

    pub fn is_emergency(&self, raw: &str) -> bool {
        if raw.trim().is_empty() {
            return false;
        }
        self.rules.is_emergency(&digits_only(raw))
    }

    /// Service and premium short codes (e.g. `3639`, `08 99 ...`).
    ///
    /// Prefix rules are applied to the national form so that
    /// `+33 6 ...` is not mistaken for a `3...` service number. Numbers
    /// dialed into another country only fail on length: the region's
    /// prefixes say nothing about a foreign numbering plan.
    pub fn is_short_code(&self, raw: &str) -> bool {
        if raw.trim().is_empty() {
            return false;
        }
        let digits = digits_only(raw);
        let international = raw.trim_start().starts_with('+');
        if self.rules.is_foreign(&digits, international) {
            return digits.len() < self.rules.min_subscriber_len;
        }
        let national = self.rules.national_digits(&digits, international);
        self.rules.is_short_code(&national)
    }

    /// Blank, withheld, all-zero, or otherwise malformed input.
    pub fn is_hidden_or_invalid(&self, raw: &str) -> bool {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.starts_with('-') {
            return true;
        }
        let digits = digits_only(trimmed);
        digits.is_empty() || digits.chars().all(|c| c == '0')
    }

    /// Numbers that must never receive an automatic message.
    pub fn should_exclude_from_messaging(&self, raw: &str) -> bool {
        self.is_hidden_or_invalid(raw) || self.is_emergency(raw) || self.is_short_code(raw)
    }

    /// National-format presentation string, or [`HIDDEN_NUMBER_LABEL`]
    /// for blank input. Unparseable input is returned trimmed.
    pub fn format_for_display(&self, raw: &str) -> String {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return HIDDEN_NUMBER_LABEL.to_string();
        }
        match phonenumber::parse(self.country, trimmed) {
            Ok(parsed) => parsed.format().mode(Mode::National).to_string(),
            Err(_) => trimmed.to_string(),
        }
    }

    fn parse_valid(&self, raw: &str) -> Option<PhoneNumber> {
        phonenumber::parse(self.country, raw.trim())
            .ok()
            .filter(|parsed| phonenumber::is_valid(parsed))
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn e164(parsed: &PhoneNumber) -> String {
    parsed.format().mode(Mode::E164).to_string()
}

fn digits_only(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Keeps a leading `+` (if the input starts with one) and all digits.
fn strip_to_dialable(raw: &str) -> String {
    let trimmed = raw.trim_start();
    let mut out = String::with_capacity(trimmed.len());
    if trimmed.starts_with('+') {
        out.push('+');
    }
    out.extend(trimmed.chars().filter(|c| c.is_ascii_digit()));
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn fr() -> PhoneNumberNormalizer {
        PhoneNumberNormalizer::new("FR")
    }

    fn canonical(n: &PhoneNumberNormalizer, raw: &str) -> String {
        n.normalize(raw)
            .map(|c| c.as_str().to_string())
            .unwrap_or_default()
    }

    #[test]
    fn national_formats_become_e164() {
        let n = fr();
        assert_eq!(canonical(&n, "0612345678"), "+33612345678");
        assert_eq!(canonical(&n, "06 12 34 56 78"), "+33612345678");
        assert_eq!(canonical(&n, "06.12.34.56.78"), "+33612345678");
        assert_eq!(canonical(&n, "+33 6 12 34 56 78"), "+33612345678");
        assert_eq!(canonical(&n, "+33612345678"), "+33612345678");
    }

    #[test]
    fn unparseable_numbers_fall_back_to_digits() {
        let n = fr();
        assert_eq!(canonical(&n, "3639"), "3639");
        assert_eq!(canonical(&n, "+1-2"), "+12");
    }

    #[test]
    fn blank_or_digitless_input_is_none() {
        let n = fr();
        assert!(n.normalize("").is_none());
        assert!(n.normalize("   ").is_none());
        assert!(n.normalize("unknown").is_none());
        assert!(n.normalize("+").is_none());
    }

    #[test]
    fn normalize_is_idempotent() {
        let n = fr();
        let samples = [
            "0612345678",
            "06-12-34-56-78",
            "+33 1 45 67 89 01",
            "3639",
            "0899 12 34 56",
            "+1 (415) 555-2671",
            "12",
            "0033612345678",
            "abc 06 12 xyz",
        ];
        for raw in samples {
            let Some(once) = n.normalize(raw) else {
                continue;
            };
            let twice = n.normalize(once.as_str());
            assert_eq!(twice.as_ref(), Some(&once), "not idempotent for {raw:?}");
        }
    }

    #[test]
    fn mobile_classification() {
        let n = fr();
        assert!(n.is_mobile("0612345678"));
        assert!(n.is_mobile("+33 7 56 12 34 56"));
        assert!(!n.is_mobile("0145678901"));
        assert!(!n.is_mobile(""));
    }

    #[test]
    fn mobile_heuristic_applies_to_invalid_numbers() {
        let n = fr();
        // Too short to validate, but carries a mobile prefix.
        assert!(n.is_mobile("06123"));
        assert!(!n.is_mobile("05123"));
    }

    #[test]
    fn emergency_numbers() {
        let n = fr();
        for raw in ["15", "17", "18", "112", "114", "115", "119"] {
            assert!(n.is_emergency(raw), "{raw} should be emergency");
        }
        assert!(!n.is_emergency("0612345678"));
        assert!(!n.is_emergency(""));
    }

    #[test]
    fn short_codes_use_national_form() {
        let n = fr();
        assert!(n.is_short_code("3639"));
        assert!(n.is_short_code("08 99 12 34 56"));
        assert!(n.is_short_code("+33 8 99 12 34 56"));
        assert!(!n.is_short_code("+33612345678"));
        assert!(!n.is_short_code("0612345678"));
    }

    #[test]
    fn foreign_numbers_are_not_short_codes() {
        let n = fr();
        for raw in ["+34 612 34 56 78", "+39 312 345 6789", "+32 470 12 34 56", "0034612345678"] {
            assert!(!n.is_short_code(raw), "{raw} is not a short code");
            assert!(!n.should_exclude_from_messaging(raw), "{raw} should be messageable");
        }
        assert!(n.should_exclude_from_messaging("+33 8 99 12 34 56"));
        assert!(n.should_exclude_from_messaging("+33 3639"));
    }

    #[test]
    fn hidden_or_invalid() {
        let n = fr();
        assert!(n.is_hidden_or_invalid(""));
        assert!(n.is_hidden_or_invalid("  "));
        assert!(n.is_hidden_or_invalid("0"));
        assert!(n.is_hidden_or_invalid("000"));
        assert!(n.is_hidden_or_invalid("-1"));
        assert!(n.is_hidden_or_invalid("private"));
        assert!(!n.is_hidden_or_invalid("0612345678"));
    }

    #[test]
    fn messaging_exclusions() {
        let n = fr();
        assert!(n.should_exclude_from_messaging(""));
        assert!(n.should_exclude_from_messaging("112"));
        assert!(n.should_exclude_from_messaging("3639"));
        assert!(!n.should_exclude_from_messaging("0612345678"));
        assert!(!n.should_exclude_from_messaging("+33612345678"));
    }

    #[test]
    fn display_format() {
        let n = fr();
        assert_eq!(n.format_for_display(""), HIDDEN_NUMBER_LABEL);
        assert_eq!(n.format_for_display("+33612345678"), "06 12 34 56 78");
    }

    #[test]
    fn region_code_is_case_insensitive() {
        let n = PhoneNumberNormalizer::new(" fr ");
        assert_eq!(n.region(), "FR");
        assert_eq!(canonical(&n, "0612345678"), "+33612345678");
    }
}
