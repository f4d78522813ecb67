//! Release version comparison.
//!
//! Release tags look like `v1.4.2`. Parsing is lenient: a missing component
//! counts as 0 and each component uses only its leading digits, so
//! `1.5` == `1.5.0` and `2.0.1-beta` reads as `2.0.1`.

use std::fmt;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

impl Version {
    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self { major, minor, patch }
    }

    /// Parse a version string, tolerating a leading `v` and short forms.
    pub fn parse(text: &str) -> Self {
        let text = text.trim();
        let text = text
            .strip_prefix('v')
            .or_else(|| text.strip_prefix('V'))
            .unwrap_or(text);

        let mut parts = text.split('.').map(leading_number);
        Self {
            major: parts.next().unwrap_or(0),
            minor: parts.next().unwrap_or(0),
            patch: parts.next().unwrap_or(0),
        }
    }

    /// Whether `self` is a newer release than `other`.
    pub fn is_newer_than(&self, other: &Version) -> bool {
        self > other
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

fn leading_number(component: &str) -> u64 {
    let digits = component
        .bytes()
        .take_while(|b| b.is_ascii_digit())
        .count();
    component[..digits].parse().unwrap_or(0)
}
