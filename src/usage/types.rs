use std::fmt;

use serde::{Deserialize, Deserializer, de};

/// Free runs granted to an anonymous party before the server demands a
/// login. Mirrors the server's quota; the client never decrements this
/// locally — the server is authoritative.
pub const MAX_ANONYMOUS_RUNS: u32 = 3;

/// How many pipeline runs the acting party has left.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Remaining {
    Count(u32),
    Unlimited,
}

impl Remaining {
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        matches!(self, Self::Count(0))
    }
}

impl fmt::Display for Remaining {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Count(n) => write!(f, "{n}"),
            Self::Unlimited => write!(f, "unlimited"),
        }
    }
}

// The wire carries either a number or the literal string "unlimited".
impl<'de> Deserialize<'de> for Remaining {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Wire {
            Count(u32),
            Text(String),
        }

        match Wire::deserialize(deserializer)? {
            Wire::Count(n) => Ok(Self::Count(n)),
            Wire::Text(s) if s == "unlimited" => Ok(Self::Unlimited),
            Wire::Text(other) => Err(de::Error::custom(format!(
                "unexpected remaining value: {other}"
            ))),
        }
    }
}

/// Whether the acting party may start a pipeline run, as last confirmed by
/// the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsageState {
    pub authenticated: bool,
    pub remaining: Remaining,
}

impl UsageState {
    /// State assumed before the first server round-trip: anonymous with the
    /// full free quota.
    #[must_use]
    pub fn assumed_anonymous() -> Self {
        Self {
            authenticated: false,
            remaining: Remaining::Count(MAX_ANONYMOUS_RUNS),
        }
    }

    #[must_use]
    pub fn authenticated_unlimited() -> Self {
        Self {
            authenticated: true,
            remaining: Remaining::Unlimited,
        }
    }

    /// Pipeline entry rule: authenticated users always pass, anonymous users
    /// need quota left.
    #[must_use]
    pub fn can_start(&self) -> bool {
        self.authenticated || !self.remaining.is_exhausted()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remaining_deserializes_numbers_and_unlimited() {
        let count: Remaining = serde_json::from_str("2").unwrap();
        assert_eq!(count, Remaining::Count(2));

        let unlimited: Remaining = serde_json::from_str("\"unlimited\"").unwrap();
        assert_eq!(unlimited, Remaining::Unlimited);
    }

    #[test]
    fn remaining_rejects_unknown_strings() {
        assert!(serde_json::from_str::<Remaining>("\"lots\"").is_err());
    }

    #[test]
    fn can_start_rules() {
        assert!(UsageState::authenticated_unlimited().can_start());
        assert!(UsageState::assumed_anonymous().can_start());

        let exhausted = UsageState {
            authenticated: false,
            remaining: Remaining::Count(0),
        };
        assert!(!exhausted.can_start());

        // Authenticated always passes, whatever the count says.
        let authed_zero = UsageState {
            authenticated: true,
            remaining: Remaining::Count(0),
        };
        assert!(authed_zero.can_start());
    }

    #[test]
    fn remaining_displays_for_status_output() {
        assert_eq!(Remaining::Count(3).to_string(), "3");
        assert_eq!(Remaining::Unlimited.to_string(), "unlimited");
    }
}
