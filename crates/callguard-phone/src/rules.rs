//! Per-region dialing rules used when metadata-based parsing is not
//! conclusive.

/// Fixed facts about a numbering plan that the heuristics rely on.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RegionRules {
    /// Country calling code without `+`.
    pub country_code: &'static str,
    /// National trunk prefix replacing the country code in national form.
    pub trunk_prefix: &'static str,
    /// Emergency numbers, digits only.
    pub emergency: &'static [&'static str],
    /// National-form prefixes of service and premium short codes.
    pub short_code_prefixes: &'static [&'static str],
    /// Numbers with fewer digits than this are short codes.
    pub min_subscriber_len: usize,
    /// Digit prefixes (international and national) of mobile ranges.
    pub mobile_prefixes: &'static [&'static str],
}

const FRANCE: RegionRules = RegionRules {
    country_code: "33",
    trunk_prefix: "0",
    emergency: &["15", "17", "18", "112", "114", "115", "119"],
    short_code_prefixes: &["3", "08"],
    min_subscriber_len: 6,
    mobile_prefixes: &["336", "337", "06", "07"],
};

const GENERIC: RegionRules = RegionRules {
    country_code: "",
    trunk_prefix: "",
    emergency: &["112", "911"],
    short_code_prefixes: &[],
    min_subscriber_len: 6,
    mobile_prefixes: &[],
};

impl RegionRules {
    /// Rules for an ISO 3166 region code. Unknown regions get a
    /// conservative generic set (only 112/911 are emergency numbers and
    /// nothing is guessed to be mobile).
    pub fn for_region(region: &str) -> Self {
        match region.trim().to_ascii_uppercase().as_str() {
            "FR" | "GP" | "MQ" | "RE" | "GF" | "YT" | "PM" | "BL" | "MF" => FRANCE,
            _ => GENERIC,
        }
    }

    /// Converts a digit string to national form.
    ///
    /// `international` tells whether the raw input was written with a
    /// leading `+`; `00` followed by the country code is treated the
    /// same way.
    pub fn national_digits(&self, digits: &str, international: bool) -> String {
        if self.country_code.is_empty() {
            return digits.to_string();
        }
        let rest = if international {
            digits.strip_prefix(self.country_code)
        } else {
            digits
                .strip_prefix("00")
                .and_then(|d| d.strip_prefix(self.country_code))
        };
        match rest {
            Some(subscriber) => format!("{}{}", self.trunk_prefix, subscriber),
            None => digits.to_string(),
        }
    }

    /// `true` when the digits carry an international prefix for a
    /// country other than this region's.
    pub fn is_foreign(&self, digits: &str, international: bool) -> bool {
        if self.country_code.is_empty() {
            return false;
        }
        let dialed = if international {
            Some(digits)
        } else {
            digits.strip_prefix("00")
        };
        dialed.is_some_and(|d| !d.starts_with(self.country_code))
    }

    pub fn is_emergency(&self, digits: &str) -> bool {
        self.emergency.contains(&digits)
    }

    pub fn is_short_code(&self, national: &str) -> bool {
        national.len() < self.min_subscriber_len
            || self
                .short_code_prefixes
                .iter()
                .any(|prefix| national.starts_with(prefix))
    }

    pub fn looks_mobile(&self, digits: &str) -> bool {
        self.mobile_prefixes
            .iter()
            .any(|prefix| digits.starts_with(prefix))
    }
}
