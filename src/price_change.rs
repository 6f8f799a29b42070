use serde::Deserializer;
use serde::de::{self, Visitor};
use std::fmt;

/// Open and close of the most recent candle for one instrument and timeframe.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CandleSample {
    pub open: f64,
    pub close: f64,
}

impl CandleSample {
    pub fn new(open: f64, close: f64) -> Self {
        Self { open, close }
    }

    pub fn change_pct(&self) -> f64 {
        percent_change(self.open, self.close)
    }
}

/// `(close - open) / open * 100`, or exactly `0.0` when `open` is zero.
pub fn percent_change(open: f64, close: f64) -> f64 {
    if open == 0.0 {
        return 0.0;
    }
    ((close - open) / open) * 100.0
}

// --- Lenient number parsing ---
// The venue encodes decimals as strings; accept plain numbers as well.

struct LenientF64Visitor;

impl<'de> Visitor<'de> for LenientF64Visitor {
    type Value = Option<f64>;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a float, an integer, or a string representing a number")
    }

    fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E> {
        Ok(Some(v))
    }

    fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E> {
        Ok(Some(v as f64))
    }

    fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E> {
        Ok(Some(v as f64))
    }

    fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        if v.trim().is_empty() {
            Ok(None)
        } else {
            v.trim().parse::<f64>().map(Some).map_err(E::custom)
        }
    }

    fn visit_unit<E>(self) -> Result<Self::Value, E> {
        Ok(None)
    }
}

pub fn deserialize_f64_lenient<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    deserializer.deserialize_any(LenientF64Visitor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_percent_change() {
        assert!((percent_change(100.0, 103.5) - 3.5).abs() < 1e-9);
        assert!((percent_change(200.0, 197.6) - -1.2).abs() < 1e-9);
        assert_eq!(CandleSample::new(50.0, 50.0).change_pct(), 0.0);
    }

    #[test]
    fn test_zero_open_is_exactly_zero() {
        let pct = CandleSample::new(0.0, 12.0).change_pct();
        assert_eq!(pct, 0.0);
        assert!(!pct.is_nan());
        assert_eq!(percent_change(0.0, 0.0), 0.0);
    }

    #[test]
    fn test_lenient_parsing() {
        let v = json!("64123.5");
        assert_eq!(deserialize_f64_lenient(&v).unwrap(), Some(64123.5));
        let v = json!(42);
        assert_eq!(deserialize_f64_lenient(&v).unwrap(), Some(42.0));
        let v = json!(0.25);
        assert_eq!(deserialize_f64_lenient(&v).unwrap(), Some(0.25));
        let v = json!("");
        assert_eq!(deserialize_f64_lenient(&v).unwrap(), None);
        let v = json!(null);
        assert_eq!(deserialize_f64_lenient(&v).unwrap(), None);
        let v = json!("not-a-number");
        assert!(deserialize_f64_lenient(&v).is_err());
    }
}
