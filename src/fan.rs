use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer};
use std::fmt;

use crate::errors::{FanControlError, Result};

/// One breakpoint of the threshold table
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Threshold {
    /// Lower bound in degrees Celsius, inclusive
    pub temp: f32,
    /// Duty cycle percentage (0-100)
    pub duty: u8,
}

impl Threshold {
    pub fn new(temp: f32, duty: u8) -> Self {
        Self { temp, duty }
    }
}

/// Step function from temperature to duty cycle.
///
/// Entries keep the order they were written in the configuration; lookups
/// go through a copy sorted by temperature.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ThresholdTable {
    entries: Vec<Threshold>,
    sorted: Vec<Threshold>,
}

impl ThresholdTable {
    /// Build a table without validating it
    pub fn new(entries: Vec<Threshold>) -> Self {
        let mut sorted = entries.clone();
        sorted.sort_by(|a, b| a.temp.total_cmp(&b.temp));
        Self { entries, sorted }
    }

    pub fn from_pairs(pairs: &[(f32, u8)]) -> Self {
        Self::new(pairs.iter().map(|&(t, d)| Threshold::new(t, d)).collect())
    }

    /// Entries in configuration order
    pub fn entries(&self) -> &[Threshold] {
        &self.entries
    }

    /// Duty cycles in configuration order
    pub fn duty_cycles(&self) -> impl Iterator<Item = u8> + '_ {
        self.entries.iter().map(|t| t.duty)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The lowest threshold, if it covers 0°C
    pub fn baseline(&self) -> Option<&Threshold> {
        self.sorted.first().filter(|t| t.temp <= 0.0)
    }

    /// True when duty cycles never decrease as the threshold rises
    pub fn is_monotonic(&self) -> bool {
        self.sorted.windows(2).all(|w| w[0].duty <= w[1].duty)
    }

    /// Check the invariants the resolver relies on
    pub fn validate(&self) -> Result<()> {
        if self.entries.is_empty() {
            return Err(FanControlError::Config(
                "temp_to_duty_cycle_thresholds must not be empty".to_string(),
            ));
        }

        for t in &self.entries {
            if !t.temp.is_finite() {
                return Err(FanControlError::Config(format!(
                    "Threshold {} is not a finite temperature",
                    t.temp
                )));
            }
            if t.duty > 100 {
                return Err(FanControlError::Config(format!(
                    "Duty cycle {}% for threshold {}°C exceeds 100%",
                    t.duty, t.temp
                )));
            }
        }

        if let Some(w) = self.sorted.windows(2).find(|w| w[0].temp == w[1].temp) {
            return Err(FanControlError::Config(format!(
                "Threshold {}°C is listed more than once",
                w[0].temp
            )));
        }

        if self.baseline().is_none() {
            return Err(FanControlError::Config(format!(
                "Missing baseline threshold: the lowest threshold is {}°C, expected one at or below 0°C",
                self.sorted[0].temp
            )));
        }

        Ok(())
    }

    /// Duty cycle of the greatest threshold at or below `temperature`.
    ///
    /// Temperatures below every threshold fall back to the baseline entry.
    pub fn resolve(&self, temperature: f32) -> Result<u8> {
        if temperature.is_nan() {
            return Err(FanControlError::Resolution { temperature });
        }

        match self.sorted.partition_point(|t| t.temp <= temperature) {
            0 => self
                .baseline()
                .map(|t| t.duty)
                .ok_or(FanControlError::Resolution { temperature }),
            n => Ok(self.sorted[n - 1].duty),
        }
    }
}

impl<'de> Deserialize<'de> for ThresholdTable {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct TableVisitor;

        impl<'de> Visitor<'de> for TableVisitor {
            type Value = ThresholdTable;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a mapping from temperature to duty cycle percentage")
            }

            fn visit_map<A>(self, mut map: A) -> std::result::Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some((temp, duty)) = map.next_entry::<f32, u8>()? {
                    entries.push(Threshold::new(temp, duty));
                }
                Ok(ThresholdTable::new(entries))
            }
        }

        deserializer.deserialize_map(TableVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn standard() -> ThresholdTable {
        ThresholdTable::from_pairs(&[(0.0, 0), (40.0, 30), (60.0, 60), (80.0, 100)])
    }

    #[test]
    fn test_threshold_lookup() {
        let table = standard();

        assert_eq!(table.resolve(45.0).unwrap(), 30);
        assert_eq!(table.resolve(95.0).unwrap(), 100);
        assert_eq!(table.resolve(60.0).unwrap(), 60);
        assert_eq!(table.resolve(59.999).unwrap(), 30);
        assert_eq!(table.resolve(0.0).unwrap(), 0);
        assert_eq!(table.resolve(39.9).unwrap(), 0);
    }

    #[test]
    fn below_every_threshold_uses_baseline() {
        let table = standard();
        assert_eq!(table.resolve(-20.0).unwrap(), 0);
        assert_eq!(table.resolve(f32::NEG_INFINITY).unwrap(), 0);

        let table = ThresholdTable::from_pairs(&[(50.0, 80), (-10.0, 25)]);
        assert_eq!(table.resolve(-40.0).unwrap(), 25);
    }

    #[test]
    fn every_threshold_is_a_closed_lower_bound() {
        let table = standard();
        for t in table.entries() {
            assert_eq!(table.resolve(t.temp).unwrap(), t.duty);
        }
    }

    #[test]
    fn resolve_is_monotonic_for_a_monotonic_table() {
        let table = standard();
        let mut last = 0;
        for step in -100..=1200 {
            let duty = table.resolve(step as f32 / 10.0).unwrap();
            assert!(duty >= last, "duty dropped to {} at {}", duty, step);
            last = duty;
        }
    }

    #[test]
    fn insertion_order_does_not_affect_lookup() {
        let table = ThresholdTable::from_pairs(&[(80.0, 100), (0.0, 0), (60.0, 60), (40.0, 30)]);
        assert_eq!(table.resolve(45.0).unwrap(), 30);
        assert_eq!(table.duty_cycles().collect::<Vec<_>>(), vec![100, 0, 60, 30]);
    }

    #[test]
    fn missing_baseline_fails_lookup_and_validation() {
        let table = ThresholdTable::from_pairs(&[(40.0, 30), (60.0, 60)]);
        assert!(matches!(
            table.resolve(20.0),
            Err(FanControlError::Resolution { .. })
        ));
        assert_eq!(table.resolve(50.0).unwrap(), 30);
        assert!(matches!(table.validate(), Err(FanControlError::Config(_))));
    }

    #[test]
    fn nan_and_empty_tables_fail_resolution() {
        assert!(matches!(
            standard().resolve(f32::NAN),
            Err(FanControlError::Resolution { .. })
        ));
        assert!(matches!(
            ThresholdTable::default().resolve(50.0),
            Err(FanControlError::Resolution { .. })
        ));
    }

    #[test]
    fn validation_rejects_bad_tables() {
        assert!(standard().validate().is_ok());
        assert!(ThresholdTable::default().validate().is_err());
        assert!(ThresholdTable::from_pairs(&[(0.0, 0), (50.0, 101)]).validate().is_err());
        assert!(ThresholdTable::from_pairs(&[(0.0, 0), (50.0, 20), (50.0, 40)])
            .validate()
            .is_err());
        assert!(ThresholdTable::from_pairs(&[(0.0, 0), (f32::INFINITY, 40)])
            .validate()
            .is_err());
    }

    #[test]
    fn monotonicity_check() {
        assert!(standard().is_monotonic());
        let table = ThresholdTable::from_pairs(&[(0.0, 50), (40.0, 30)]);
        assert!(!table.is_monotonic());
        assert!(table.validate().is_ok());
    }
}
