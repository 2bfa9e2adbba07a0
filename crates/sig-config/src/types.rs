use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::de;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A duration written as `"<n><unit>"` with unit `ms`, `s`, `m`, `h` or `d`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct HumanDuration(Duration);

impl HumanDuration {
    pub const fn from_secs(secs: u64) -> Self {
        Self(Duration::from_secs(secs))
    }

    pub fn as_duration(&self) -> Duration {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }
}

impl From<HumanDuration> for Duration {
    fn from(hd: HumanDuration) -> Self {
        hd.0
    }
}

impl From<Duration> for HumanDuration {
    fn from(d: Duration) -> Self {
        Self(d)
    }
}

const UNITS: [(&str, u64); 5] = [
    ("ms", 1),
    ("s", 1_000),
    ("m", 60_000),
    ("h", 3_600_000),
    ("d", 86_400_000),
];

impl FromStr for HumanDuration {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        let s = s.trim();
        let split = s
            .find(|c: char| !c.is_ascii_digit())
            .ok_or_else(|| anyhow::anyhow!("missing unit in duration {s:?}"))?;
        let (digits, unit) = s.split_at(split);
        if digits.is_empty() {
            anyhow::bail!("missing number in duration {s:?}");
        }
        let value: u64 = digits
            .parse()
            .map_err(|_| anyhow::anyhow!("invalid number in duration {s:?}"))?;
        let (_, scale) = UNITS
            .iter()
            .find(|(u, _)| *u == unit)
            .ok_or_else(|| anyhow::anyhow!("unknown duration unit {unit:?} in {s:?} (ms/s/m/h/d)"))?;
        let millis = value
            .checked_mul(*scale)
            .ok_or_else(|| anyhow::anyhow!("duration {s:?} out of range"))?;
        Ok(Self(Duration::from_millis(millis)))
    }
}

impl fmt::Display for HumanDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let millis = self.0.as_millis() as u64;
        if millis == 0 {
            return f.write_str("0s");
        }
        let (unit, scale) = UNITS
            .iter()
            .rev()
            .find(|(_, scale)| millis.is_multiple_of(*scale))
            .copied()
            .unwrap_or(("ms", 1));
        write!(f, "{}{unit}", millis / scale)
    }
}

impl Serialize for HumanDuration {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for HumanDuration {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(s: &str) -> Duration {
        s.parse::<HumanDuration>().unwrap().as_duration()
    }

    #[test]
    fn units() {
        assert_eq!(parse("250ms"), Duration::from_millis(250));
        assert_eq!(parse("60s"), Duration::from_secs(60));
        assert_eq!(parse("5m"), Duration::from_secs(300));
        assert_eq!(parse("2h"), Duration::from_secs(7200));
        assert_eq!(parse("1d"), Duration::from_secs(86_400));
        assert_eq!(parse(" 15s "), Duration::from_secs(15));
    }

    #[test]
    fn display_picks_largest_exact_unit() {
        assert_eq!(HumanDuration::from_secs(120).to_string(), "2m");
        assert_eq!(HumanDuration::from_secs(90).to_string(), "90s");
        assert_eq!(HumanDuration::from_secs(48 * 3600).to_string(), "2d");
        assert_eq!(HumanDuration::from(Duration::from_millis(1500)).to_string(), "1500ms");
        assert_eq!(HumanDuration::from_secs(0).to_string(), "0s");
    }

    #[test]
    fn rejects_malformed() {
        for bad in ["", "60", "s", "10x", "-5s", "1.5m", "99999999999999999999d"] {
            assert!(bad.parse::<HumanDuration>().is_err(), "{bad:?} should fail");
        }
    }

    #[test]
    fn serde_as_string() {
        let d: HumanDuration = serde_json::from_str("\"30s\"").unwrap();
        assert_eq!(d, HumanDuration::from_secs(30));
        assert_eq!(serde_json::to_string(&d).unwrap(), "\"30s\"");
    }
}
