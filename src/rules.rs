//! # Rule Engine
//!
//! Static Sacred Harp style tables and the progression checks built on them.
//!
//! Four desirability tiers per mode (common, quite common, rare, forbidden);
//! a Roman numeral in none of them is unclassified and flagged for manual
//! review. The tables are immutable configuration loaded once into
//! read-only statics, never re-derived per call.
//!
//! ## Related Modules
//! - `chord` - produces the Roman numerals assessed here
//! - `analyzer` - renders the realized progression and runs the scans

use serde::Serialize;
use std::fmt;

use crate::score::Mode;

/// Assessment outcome for one chord.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Status {
    Good,
    Ok,
    Warning,
    Forbidden,
    Unknown,
}

impl Status {
    /// Whether this status is worth a line in the harmony log.
    pub fn is_problem(self) -> bool {
        !matches!(self, Status::Good | Status::Ok)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Status::Good => "GOOD",
            Status::Ok => "OK",
            Status::Warning => "WARNING",
            Status::Forbidden => "FORBIDDEN",
            Status::Unknown => "UNKNOWN",
        };
        f.write_str(text)
    }
}

/// One chord's assessment: status tier plus the log message body.
#[derive(Debug, Clone, PartialEq)]
pub struct Assessment {
    pub status: Status,
    pub message: String,
}

/// Desirability tiers for one mode.
#[derive(Debug)]
pub struct ModeRules {
    pub common: &'static [&'static str],
    pub quite_common: &'static [&'static str],
    pub rare: &'static [&'static str],
    pub forbidden: &'static [&'static str],
}

/// The full style table: per-mode tiers plus canonical progressions.
#[derive(Debug)]
pub struct StyleRules {
    pub major: ModeRules,
    pub minor: ModeRules,
    pub progressions: &'static [&'static [&'static str]],
}

/// Sacred Harp conventions, as documented in the style guide the original
/// rule set was extracted from.
pub static SACRED_HARP_RULES: StyleRules = StyleRules {
    major: ModeRules {
        common: &["I", "vi", "V"],
        quite_common: &["ii", "IV"],
        rare: &["iii"],
        forbidden: &["vii°"],
    },
    minor: ModeRules {
        common: &["i", "VII", "III"],
        quite_common: &["v", "iv"],
        rare: &[],
        forbidden: &["ii°", "VI"],
    },
    progressions: &[
        &["I", "vi", "V", "I"],
        &["I", "IV", "V", "I"],
        &["I", "vi", "ii", "V", "I"],
        &["i", "VII", "III", "i"],
        &["i", "iv", "v", "i"],
        &["i", "VII", "iv", "i"],
    ],
};

impl StyleRules {
    fn for_mode(&self, mode: Mode) -> &ModeRules {
        match mode {
            Mode::Major => &self.major,
            Mode::Minor => &self.minor,
        }
    }

    /// Assess one Roman numeral against the style tiers.
    ///
    /// First match by tier; anything unlisted is UNKNOWN.
    ///
    /// # Example
    /// ```
    /// use fasola::rules::{Status, SACRED_HARP_RULES};
    /// use fasola::score::Mode;
    ///
    /// let a = SACRED_HARP_RULES.assess("I", Mode::Major);
    /// assert_eq!(a.status, Status::Good);
    ///
    /// let a = SACRED_HARP_RULES.assess("vii°", Mode::Major);
    /// assert_eq!(a.status, Status::Forbidden);
    /// ```
    pub fn assess(&self, roman: &str, mode: Mode) -> Assessment {
        let rules = self.for_mode(mode);
        if rules.forbidden.contains(&roman) {
            Assessment {
                status: Status::Forbidden,
                message: format!("{roman} chord FORBIDDEN in Sacred Harp style"),
            }
        } else if rules.common.contains(&roman) {
            Assessment {
                status: Status::Good,
                message: format!("{roman} chord - excellent choice for Sacred Harp"),
            }
        } else if rules.quite_common.contains(&roman) {
            Assessment {
                status: Status::Ok,
                message: format!("{roman} chord - good Sacred Harp choice"),
            }
        } else if rules.rare.contains(&roman) {
            Assessment {
                status: Status::Warning,
                message: format!("{roman} chord - use sparingly in Sacred Harp"),
            }
        } else {
            Assessment {
                status: Status::Unknown,
                message: format!("{roman} chord - check Sacred Harp style guide"),
            }
        }
    }

    /// Replacement advice for the forbidden chords, in solmization spelling.
    pub fn fix_suggestion(&self, roman: &str, mode: Mode) -> Option<&'static str> {
        match roman {
            "vii°" => Some("Replace with V chord (sol-si-re) or vi chord (la-do-mi)"),
            "ii°" => Some("Replace with iv chord (fa-la-do) or ii chord (re-fa-la)"),
            "VI" if mode == Mode::Minor => {
                Some("Use III chord (do-mi-sol) or iv chord (fa-la-do) instead")
            }
            _ => None,
        }
    }

    /// Canonical progressions contained in the realized progression.
    ///
    /// Containment is substring matching over the `" - "`-joined strings;
    /// any contained match is a positive signal, not an error.
    pub fn matched_progressions(&self, progression: &[&str]) -> Vec<String> {
        let realized = progression.join(" - ");
        self.progressions
            .iter()
            .map(|p| p.join(" - "))
            .filter(|candidate| realized.contains(candidate.as_str()))
            .collect()
    }

    /// Scan consecutive progression pairs for genre-illegal chords.
    ///
    /// Flags vii° in any mode, and ii° and the raised-submediant VI triad in
    /// minor. Returns one message per occurrence.
    pub fn forbidden_in_sequence(&self, progression: &[&str], mode: Mode) -> Vec<String> {
        let mut errors = Vec::new();
        if progression.len() < 2 {
            return errors;
        }
        for &chord in &progression[..progression.len() - 1] {
            if chord == "vii°" {
                errors.push("Forbidden vii° chord found in progression".to_string());
            }
            if mode == Mode::Minor && chord == "ii°" {
                errors.push("Forbidden ii° chord found in minor key".to_string());
            }
            if mode == Mode::Minor && chord == "VI" {
                errors.push("Forbidden VI chord found in minor key".to_string());
            }
        }
        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_major_tiers() {
        let rules = &SACRED_HARP_RULES;
        assert_eq!(rules.assess("I", Mode::Major).status, Status::Good);
        assert_eq!(rules.assess("vi", Mode::Major).status, Status::Good);
        assert_eq!(rules.assess("IV", Mode::Major).status, Status::Ok);
        assert_eq!(rules.assess("iii", Mode::Major).status, Status::Warning);
        assert_eq!(rules.assess("vii°", Mode::Major).status, Status::Forbidden);
    }

    #[test]
    fn test_minor_tiers() {
        let rules = &SACRED_HARP_RULES;
        assert_eq!(rules.assess("i", Mode::Minor).status, Status::Good);
        assert_eq!(rules.assess("VII", Mode::Minor).status, Status::Good);
        assert_eq!(rules.assess("iv", Mode::Minor).status, Status::Ok);
        assert_eq!(rules.assess("ii°", Mode::Minor).status, Status::Forbidden);
        assert_eq!(rules.assess("VI", Mode::Minor).status, Status::Forbidden);
    }

    #[test]
    fn test_unlisted_roman_is_unknown() {
        let a = SACRED_HARP_RULES.assess("Unknown", Mode::Major);
        assert_eq!(a.status, Status::Unknown);
        assert!(a.message.contains("check Sacred Harp style guide"));
    }

    #[test]
    fn test_forbidden_message_and_fix() {
        let a = SACRED_HARP_RULES.assess("vii°", Mode::Major);
        assert_eq!(a.message, "vii° chord FORBIDDEN in Sacred Harp style");
        assert!(SACRED_HARP_RULES
            .fix_suggestion("vii°", Mode::Major)
            .unwrap()
            .contains("sol-si-re"));
        // VI advice only applies in minor.
        assert!(SACRED_HARP_RULES.fix_suggestion("VI", Mode::Major).is_none());
        assert!(SACRED_HARP_RULES.fix_suggestion("VI", Mode::Minor).is_some());
    }

    #[test]
    fn test_progression_containment() {
        let matched =
            SACRED_HARP_RULES.matched_progressions(&["I", "vi", "V", "I", "IV", "V", "I"]);
        assert!(matched.contains(&"I - vi - V - I".to_string()));
        assert!(matched.contains(&"I - IV - V - I".to_string()));

        let none = SACRED_HARP_RULES.matched_progressions(&["I", "iii", "I"]);
        assert!(none.is_empty());
    }

    #[test]
    fn test_forbidden_sequence_scan() {
        let errors = SACRED_HARP_RULES.forbidden_in_sequence(&["vii°", "I"], Mode::Major);
        assert_eq!(errors, vec!["Forbidden vii° chord found in progression"]);

        let errors =
            SACRED_HARP_RULES.forbidden_in_sequence(&["i", "ii°", "VI", "i"], Mode::Minor);
        assert_eq!(
            errors,
            vec![
                "Forbidden ii° chord found in minor key",
                "Forbidden VI chord found in minor key",
            ]
        );

        // ii° is only illegal in minor.
        assert!(SACRED_HARP_RULES
            .forbidden_in_sequence(&["ii°", "I"], Mode::Major)
            .is_empty());
        assert!(SACRED_HARP_RULES
            .forbidden_in_sequence(&["I", "vi"], Mode::Major)
            .is_empty());
    }
}
