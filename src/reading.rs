use crate::device::DeviceIdentity;
use crate::register::{Decoded, Quantity, Unit};

use chrono::{DateTime, NaiveDate, Utc};
use num_enum::FromPrimitive;
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, FromPrimitive)]
#[repr(u16)]
pub enum OperatingMode {
    Wait = 0,
    Normal = 1,
    Fault = 2,
    PermanentFault = 3,
    Check = 4,
    #[num_enum(catch_all)]
    Unknown(u16),
}

// PVReading {{{
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PVReading {
    pub quantity: Quantity,
    pub value: f64,
    pub unit: Unit,
    pub raw: u16,
    /// False when the guarding validity register rejected this value.
    pub valid: bool,
    pub time: DateTime<Utc>,
}

impl PVReading {
    pub fn new(quantity: Quantity, unit: Unit, decoded: Decoded, time: DateTime<Utc>) -> Self {
        Self {
            quantity,
            value: decoded.value,
            unit,
            raw: decoded.raw,
            valid: decoded.valid,
            time,
        }
    }

    pub fn mode(&self) -> Option<OperatingMode> {
        (self.quantity == Quantity::Mode).then(|| OperatingMode::from_primitive(self.raw))
    }

    pub fn is_fault(&self) -> bool {
        self.quantity.is_fault() && self.raw != 0
    }
} // }}}

// PVReadingSet {{{
/// Readings for one device in the order they were appended. Nothing is
/// deduplicated or reordered here.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PVReadingSet {
    device: Arc<DeviceIdentity>,
    readings: Vec<PVReading>,
}

impl PVReadingSet {
    /// `capacity` is a hint only; the set grows past it as needed.
    pub fn with_capacity(device: Arc<DeviceIdentity>, capacity: usize) -> Self {
        Self {
            device,
            readings: Vec::with_capacity(capacity),
        }
    }

    pub fn append(&mut self, reading: PVReading) {
        self.readings.push(reading);
    }

    pub fn device(&self) -> &Arc<DeviceIdentity> {
        &self.device
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PVReading> {
        self.readings.iter()
    }

    pub fn of(&self, quantity: Quantity) -> impl Iterator<Item = &PVReading> {
        self.readings.iter().filter(move |r| r.quantity == quantity)
    }
}

impl<'a> IntoIterator for &'a PVReadingSet {
    type Item = &'a PVReading;
    type IntoIter = std::slice::Iter<'a, PVReading>;

    fn into_iter(self) -> Self::IntoIter {
        self.readings.iter()
    }
} // }}}

/// Row count of a day compared to the family's normal day size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DayCountMismatch {
    /// Fewer rows than expected; samples were probably missed.
    Short { expected: usize, actual: usize },
    /// More rows than expected; extraction windows probably overlapped.
    Over { expected: usize, actual: usize },
}

impl DayCountMismatch {
    pub fn check(expected: usize, actual: usize) -> Option<Self> {
        use std::cmp::Ordering::*;
        match actual.cmp(&expected) {
            Less => Some(Self::Short { expected, actual }),
            Greater => Some(Self::Over { expected, actual }),
            Equal => None,
        }
    }
}

// EnergyReadingSet {{{
/// One device's energy-relevant readings for one calendar day.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnergyReadingSet {
    pub day: NaiveDate,
    /// Rows that contributed to this day.
    pub rows: usize,
    pub expected_rows: usize,
    pub mismatch: Option<DayCountMismatch>,
    /// Last trusted lifetime energy counter of the day, in kWh.
    pub energy_total: Option<f64>,
    /// Last trusted operating hours counter of the day.
    pub hours: Option<f64>,
    pub readings: PVReadingSet,
}

impl EnergyReadingSet {
    pub fn new(day: NaiveDate, rows: usize, expected_rows: usize, readings: PVReadingSet) -> Self {
        Self {
            day,
            rows,
            expected_rows,
            mismatch: DayCountMismatch::check(expected_rows, rows),
            energy_total: None,
            hours: None,
            readings,
        }
    }

    /// Counters joined from their high/low register words.
    pub fn with_totals(mut self, energy_total: Option<f64>, hours: Option<f64>) -> Self {
        self.energy_total = energy_total;
        self.hours = hours;
        self
    }

    pub fn device(&self) -> &Arc<DeviceIdentity> {
        self.readings.device()
    }

    pub fn is_complete(&self) -> bool {
        self.mismatch.is_none()
    }

    /// Last trusted daily energy counter of the day, in kWh.
    pub fn energy_today(&self) -> Option<f64> {
        self.readings
            .of(Quantity::EnergyToday)
            .filter(|r| r.valid)
            .last()
            .map(|r| r.value)
    }

    pub fn peak_power(&self) -> Option<f64> {
        self.readings
            .of(Quantity::PowerAC)
            .filter(|r| r.valid)
            .map(|r| r.value)
            .reduce(f64::max)
    }
} // }}}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{identify, IdentityCandidate};
    use chrono::TimeZone;

    fn device() -> Arc<DeviceIdentity> {
        Arc::new(identify(IdentityCandidate::with_id(1)).unwrap())
    }

    fn reading(quantity: Quantity, raw: u16, scale: f64, minute: u32) -> PVReading {
        let decoded = Decoded {
            value: f64::from(raw) * scale,
            raw,
            valid: true,
        };
        let time = Utc.with_ymd_and_hms(2024, 6, 1, 12, minute, 0).unwrap();
        PVReading::new(quantity, Unit::Energy, decoded, time)
    }

    #[test]
    fn append_grows_past_capacity() {
        let mut set = PVReadingSet::with_capacity(device(), 2);
        for minute in 0..5 {
            set.append(reading(Quantity::EnergyToday, minute as u16, 0.01, minute));
        }
        assert_eq!(set.len(), 5);

        let order: Vec<u16> = set.iter().map(|r| r.raw).collect();
        assert_eq!(order, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn duplicates_are_kept() {
        let mut set = PVReadingSet::with_capacity(device(), 1);
        set.append(reading(Quantity::PowerAC, 10, 1.0, 0));
        set.append(reading(Quantity::PowerAC, 10, 1.0, 0));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn day_count_check() {
        assert_eq!(DayCountMismatch::check(144, 144), None);
        assert_eq!(
            DayCountMismatch::check(144, 100),
            Some(DayCountMismatch::Short { expected: 144, actual: 100 })
        );
        assert_eq!(
            DayCountMismatch::check(144, 150),
            Some(DayCountMismatch::Over { expected: 144, actual: 150 })
        );
    }

    #[test]
    fn daily_figures() {
        let mut set = PVReadingSet::with_capacity(device(), 4);
        set.append(reading(Quantity::EnergyToday, 100, 0.01, 0));
        set.append(reading(Quantity::PowerAC, 800, 1.0, 0));
        set.append(reading(Quantity::EnergyToday, 250, 0.01, 10));
        set.append(reading(Quantity::PowerAC, 1200, 1.0, 10));

        let mut untrusted = reading(Quantity::PowerAC, 9000, 1.0, 20);
        untrusted.valid = false;
        set.append(untrusted);

        let day = EnergyReadingSet::new(NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(), 2, 2, set);
        assert!(day.is_complete());
        assert_eq!(day.energy_today(), Some(2.5));
        assert_eq!(day.peak_power(), Some(1200.0));
    }

    #[test]
    fn mode_and_faults() {
        let mode = reading(Quantity::Mode, 1, 1.0, 0);
        assert_eq!(mode.mode(), Some(OperatingMode::Normal));
        assert_eq!(reading(Quantity::Mode, 42, 1.0, 0).mode(), Some(OperatingMode::Unknown(42)));
        assert_eq!(reading(Quantity::PowerAC, 1, 1.0, 0).mode(), None);

        assert!(reading(Quantity::ErrorGV, 3, 1.0, 0).is_fault());
        assert!(!reading(Quantity::ErrorGV, 0, 1.0, 0).is_fault());
        assert!(!reading(Quantity::PowerAC, 3, 1.0, 0).is_fault());
    }
}
