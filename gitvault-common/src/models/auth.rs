// File: gitvault-common/src/models/auth.rs

use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign};
use std::str::FromStr;

/// Bit-flag set of the authentication mechanisms a host supports.
///
/// `NONE` is only ever a valid *result* of capability negotiation; asking a
/// prompt to offer zero modes is a caller bug and is rejected at the prompt
/// layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AuthenticationModes(u8);

impl AuthenticationModes {
    pub const NONE: Self = Self(0);
    pub const BASIC: Self = Self(1);
    pub const BROWSER: Self = Self(1 << 1);
    pub const PAT: Self = Self(1 << 2);
    pub const DEVICE: Self = Self(1 << 3);

    pub const OAUTH: Self = Self(Self::BROWSER.0 | Self::DEVICE.0);
    pub const ALL: Self = Self(Self::BASIC.0 | Self::BROWSER.0 | Self::PAT.0 | Self::DEVICE.0);

    pub fn is_none(self) -> bool {
        self.0 == 0
    }

    /// True if every bit of `other` is set in `self`. `contains(NONE)` is
    /// false by definition.
    pub fn contains(self, other: Self) -> bool {
        other.0 != 0 && self.0 & other.0 == other.0
    }

    pub fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    /// Number of individual mode bits set.
    pub fn count(self) -> u32 {
        self.0.count_ones()
    }
}

impl BitOr for AuthenticationModes {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for AuthenticationModes {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for AuthenticationModes {
    type Output = Self;
    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

impl fmt::Display for AuthenticationModes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            return write!(f, "none");
        }
        let mut parts = Vec::new();
        if self.contains(Self::BASIC) {
            parts.push("basic");
        }
        if self.contains(Self::BROWSER) {
            parts.push("browser");
        }
        if self.contains(Self::PAT) {
            parts.push("pat");
        }
        if self.contains(Self::DEVICE) {
            parts.push("device");
        }
        write!(f, "{}", parts.join(","))
    }
}

impl FromStr for AuthenticationModes {
    type Err = String;

    /// Parses a comma- or space-separated list: `"basic,pat"`, `"oauth"`,
    /// `"all"`, `"none"`. Unknown names are an error so that a typo in an
    /// override setting does not silently disable modes.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut modes = Self::NONE;
        for part in s.split([',', ' ']).filter(|p| !p.is_empty()) {
            modes |= match part.to_lowercase().as_str() {
                "none" => Self::NONE,
                "basic" => Self::BASIC,
                "browser" => Self::BROWSER,
                "pat" => Self::PAT,
                "device" => Self::DEVICE,
                "oauth" => Self::OAUTH,
                "all" => Self::ALL,
                other => return Err(format!("Unknown authentication mode: {}", other)),
            };
        }
        Ok(modes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_contains_every_mode() {
        assert!(AuthenticationModes::ALL.contains(AuthenticationModes::BASIC));
        assert!(AuthenticationModes::ALL.contains(AuthenticationModes::BROWSER));
        assert!(AuthenticationModes::ALL.contains(AuthenticationModes::PAT));
        assert!(AuthenticationModes::ALL.contains(AuthenticationModes::DEVICE));
        assert_eq!(AuthenticationModes::ALL.count(), 4);
    }

    #[test]
    fn oauth_is_browser_and_device() {
        assert_eq!(
            AuthenticationModes::OAUTH,
            AuthenticationModes::BROWSER | AuthenticationModes::DEVICE
        );
    }

    #[test]
    fn parse_roundtrip() {
        let modes: AuthenticationModes = "basic,pat".parse().unwrap();
        assert_eq!(modes, AuthenticationModes::BASIC | AuthenticationModes::PAT);
        assert_eq!(modes.to_string(), "basic,pat");
    }

    #[test]
    fn parse_rejects_unknown() {
        assert!("basic,frobnicate".parse::<AuthenticationModes>().is_err());
    }

    #[test]
    fn none_contains_nothing() {
        assert!(!AuthenticationModes::NONE.contains(AuthenticationModes::BASIC));
        assert!(!AuthenticationModes::ALL.contains(AuthenticationModes::NONE));
    }
}
