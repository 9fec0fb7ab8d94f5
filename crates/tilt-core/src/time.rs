//! Microsecond-precision timestamps, the unit every watermark in this crate is compared in.

use chrono::{DateTime, Utc};
use std::fmt;

/// A point in time truncated to microsecond precision.
///
/// Mirrors the Kubernetes `metav1.MicroTime` convention: comparisons and
/// ordering work exactly like `DateTime<Utc>`, but values round-trip through
/// JSON without picking up sub-microsecond jitter from serialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub struct MicroTime(DateTime<Utc>);

impl Default for MicroTime {
    fn default() -> Self {
        Self::zero()
    }
}

impl MicroTime {
    #[must_use]
    pub fn now() -> Self {
        Self::from(Utc::now())
    }

    #[must_use]
    pub fn zero() -> Self {
        Self(DateTime::<Utc>::from_timestamp(0, 0).expect("epoch is representable"))
    }

    #[must_use]
    pub fn is_zero(&self) -> bool {
        *self == Self::zero()
    }

    #[must_use]
    pub fn inner(&self) -> DateTime<Utc> {
        self.0
    }
}

impl From<DateTime<Utc>> for MicroTime {
    fn from(t: DateTime<Utc>) -> Self {
        let micros = t.timestamp_micros();
        Self(DateTime::from_timestamp_micros(micros).unwrap_or(t))
    }
}

impl fmt::Display for MicroTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_is_less_than_now() {
        assert!(MicroTime::zero() < MicroTime::now());
    }

    #[test]
    fn truncates_to_microseconds() {
        let t = Utc::now();
        let mt = MicroTime::from(t);
        assert_eq!(mt.inner().timestamp_micros(), t.timestamp_micros());
    }
}
