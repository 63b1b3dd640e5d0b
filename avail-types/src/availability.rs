//! Up/down availability derived from a status code.

use core::fmt;

/// Highest status code still considered available.
///
/// Everything up to and including the 3xx range counts as `UP`.
pub const MAX_UP_STATUS_CODE: i64 = 399;

/// Binary availability of a monitored resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "UPPERCASE"))]
#[cfg_attr(feature = "minicbor", derive(minicbor::Encode, minicbor::Decode))]
#[cfg_attr(feature = "minicbor", cbor(index_only))]
pub enum Availability {
    /// The resource answered with a non-error status.
    #[cfg_attr(feature = "minicbor", n(0))]
    Up,

    /// The resource answered with a 4xx/5xx (or any higher) status.
    #[cfg_attr(feature = "minicbor", n(1))]
    Down,
}

impl Availability {
    /// Derive availability from a status code.
    ///
    /// A single threshold applies to every integer: codes `<= 399` are `Up`,
    /// everything else is `Down`. Negative and out-of-range codes are not
    /// special-cased.
    pub const fn from_status_code(code: i64) -> Self {
        if code <= MAX_UP_STATUS_CODE {
            Availability::Up
        } else {
            Availability::Down
        }
    }

    /// The wire name (`"UP"` or `"DOWN"`).
    pub const fn as_str(&self) -> &'static str {
        match self {
            Availability::Up => "UP",
            Availability::Down => "DOWN",
        }
    }

    pub const fn is_up(&self) -> bool {
        matches!(self, Availability::Up)
    }
}

impl fmt::Display for Availability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;

    #[test]
    fn test_threshold_boundary() {
        assert_eq!(Availability::from_status_code(399), Availability::Up);
        assert_eq!(Availability::from_status_code(400), Availability::Down);
    }

    #[test]
    fn test_threshold_is_total() {
        assert_eq!(Availability::from_status_code(-1), Availability::Up);
        assert_eq!(Availability::from_status_code(0), Availability::Up);
        assert_eq!(Availability::from_status_code(200), Availability::Up);
        assert_eq!(Availability::from_status_code(503), Availability::Down);
        assert_eq!(Availability::from_status_code(i64::MAX), Availability::Down);
        assert_eq!(Availability::from_status_code(i64::MIN), Availability::Up);
    }

    #[test]
    fn test_display() {
        assert_eq!(Availability::Up.to_string(), "UP");
        assert_eq!(Availability::Down.to_string(), "DOWN");
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_serde_wire_names() {
        assert_eq!(serde_json::to_string(&Availability::Up).unwrap(), "\"UP\"");
        assert_eq!(serde_json::to_string(&Availability::Down).unwrap(), "\"DOWN\"");

        let parsed: Availability = serde_json::from_str("\"DOWN\"").unwrap();
        assert_eq!(parsed, Availability::Down);
    }
}
