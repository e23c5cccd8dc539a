use crate::error::Error;

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Logical quantities an inverter family may expose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Quantity {
    Temp,
    EnergyToday,
    VoltsPV,
    CurrentAC,
    VoltsAC,
    FreqAC,
    PowerAC,
    ImpedanceAC,
    EnergyTotalHigh,
    EnergyTotalLow,
    HoursHigh,
    HoursLow,
    Mode,
    VoltsPV1,
    VoltsPV2,
    VoltsPV3,
    CurrentPV1,
    CurrentPV2,
    CurrentPV3,
    ErrorGV,
    ErrorGF,
    ErrorGZ,
    ErrorTemp,
    ErrorPV1,
    ErrorGFC1,
    ErrorModeLow,
}

impl Quantity {
    pub const FAULTS: [Quantity; 7] = [
        Quantity::ErrorGV,
        Quantity::ErrorGF,
        Quantity::ErrorGZ,
        Quantity::ErrorTemp,
        Quantity::ErrorPV1,
        Quantity::ErrorGFC1,
        Quantity::ErrorModeLow,
    ];

    /// Quantities that end up in a day's [`crate::reading::EnergyReadingSet`].
    pub fn is_energy_relevant(&self) -> bool {
        use Quantity::*;
        matches!(
            self,
            EnergyToday | EnergyTotalHigh | EnergyTotalLow | PowerAC | HoursHigh | HoursLow | Mode
        )
    }

    pub fn is_fault(&self) -> bool {
        Self::FAULTS.contains(self)
    }
}

impl std::fmt::Display for Quantity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Unit {
    Temperature,
    Energy,
    Voltage,
    Current,
    Frequency,
    Power,
    /// milliohm
    Impedance,
    Hours,
    Identifier,
}

// DataInfo {{{
/// How to turn one register into a physical value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DataInfo {
    pub address: u8,
    pub unit: Unit,
    pub scale: f64,
    /// Register whose value decides whether this reading can be trusted.
    pub validity: Option<u8>,
}

impl DataInfo {
    pub const fn new(address: u8, unit: Unit) -> Self {
        Self {
            address,
            unit,
            scale: 1.0,
            validity: None,
        }
    }

    pub const fn scaled(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }

    pub const fn validated_by(mut self, register: u8) -> Self {
        self.validity = Some(register);
        self
    }

    pub fn decode(&self, raw: u16) -> f64 {
        f64::from(raw) * self.scale
    }
} // }}}

/// Family convention for the value of a validity register that marks the
/// guarded reading as trustworthy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidMarker {
    NonZero,
    Equals(u16),
    BitsSet(u16),
}

impl ValidMarker {
    pub fn accepts(&self, raw: u16) -> bool {
        match *self {
            ValidMarker::NonZero => raw != 0,
            ValidMarker::Equals(v) => raw == v,
            ValidMarker::BitsSet(mask) => raw & mask == mask,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Decoded {
    pub value: f64,
    pub raw: u16,
    pub valid: bool,
}

// DataIds {{{
/// The register catalog of one inverter family. Built once and only read
/// afterwards, so it can be shared between extraction calls freely.
#[derive(Debug, Clone, PartialEq)]
pub struct DataIds {
    family: &'static str,
    marker: ValidMarker,
    entries: BTreeMap<Quantity, DataInfo>,
}

impl DataIds {
    pub fn new(family: &'static str, marker: ValidMarker) -> Self {
        Self {
            family,
            marker,
            entries: BTreeMap::new(),
        }
    }

    pub fn with(mut self, quantity: Quantity, info: DataInfo) -> Self {
        self.entries.insert(quantity, info);
        self
    }

    pub fn family(&self) -> &'static str {
        self.family
    }

    pub fn marker(&self) -> ValidMarker {
        self.marker
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Quantity, &DataInfo)> {
        self.entries.iter().map(|(q, i)| (*q, i))
    }

    pub fn supports(&self, quantity: Quantity) -> bool {
        self.entries.contains_key(&quantity)
    }

    pub fn describe(&self, quantity: Quantity) -> Result<&DataInfo, Error> {
        self.entries
            .get(&quantity)
            .ok_or(Error::UnsupportedQuantity {
                family: self.family,
                quantity,
            })
    }

    /// Every register a raw row must carry for this catalog to decode it,
    /// validity registers included.
    pub fn required_addresses(&self) -> BTreeSet<u8> {
        self.entries
            .values()
            .flat_map(|info| std::iter::once(info.address).chain(info.validity))
            .collect()
    }

    /// Scales `raw`, and marks it invalid if the descriptor is guarded by a
    /// validity register whose value the family does not accept. A missing
    /// validity value counts as invalid.
    pub fn decode(&self, info: &DataInfo, raw: u16, validity_raw: Option<u16>) -> Decoded {
        let valid = match info.validity {
            None => true,
            Some(_) => validity_raw.is_some_and(|v| self.marker.accepts(v)),
        };

        Decoded {
            value: info.decode(raw),
            raw,
            valid,
        }
    }

    /// Looks the quantity up and decodes it from a register buffer.
    pub fn decode_from(
        &self,
        quantity: Quantity,
        registers: &HashMap<u8, u16>,
    ) -> Result<Option<Decoded>, Error> {
        let info = self.describe(quantity)?;
        let Some(raw) = registers.get(&info.address) else {
            return Ok(None);
        };
        let validity_raw = info.validity.and_then(|r| registers.get(&r).copied());

        Ok(Some(self.decode(info, *raw, validity_raw)))
    }

    /// Joins a high/low register pair into one value, scaled by the low
    /// word's descriptor.
    pub fn combined(
        &self,
        high: Quantity,
        low: Quantity,
        registers: &HashMap<u8, u16>,
    ) -> Result<Option<Decoded>, Error> {
        let (Some(h), Some(l)) = (
            self.decode_from(high, registers)?,
            self.decode_from(low, registers)?,
        ) else {
            return Ok(None);
        };
        let info = self.describe(low)?;
        let raw = (u32::from(h.raw) << 16) | u32::from(l.raw);

        Ok(Some(Decoded {
            value: f64::from(raw) * info.scale,
            raw: l.raw,
            valid: h.valid && l.valid,
        }))
    }

    /// Applies descriptor overrides from a JSON register file.
    pub fn with_register_file(self, path: &str) -> Result<Self, Error> {
        let content = std::fs::read_to_string(path)
            .map_err(|err| Error::Catalog(format!("error reading register file {}: {}", path, err)))?;
        self.with_register_json(&content)
    }

    pub fn with_register_json(mut self, content: &str) -> Result<Self, Error> {
        let file: RegisterFile = serde_json::from_str(content)
            .map_err(|err| Error::Catalog(format!("error parsing register file: {}", err)))?;

        for register in file.registers {
            let info = DataInfo {
                address: register.address,
                unit: register.unit,
                scale: register.scale,
                validity: register.validity,
            };
            if !info.scale.is_finite() {
                return Err(Error::Catalog(format!(
                    "{}: scale must be finite",
                    register.quantity
                )));
            }
            self.entries.insert(register.quantity, info);
        }

        Ok(self)
    }
} // }}}

#[derive(Debug, Clone, Deserialize)]
struct RegisterFile {
    registers: Vec<RegisterEntry>,
}

#[derive(Debug, Clone, Deserialize)]
struct RegisterEntry {
    quantity: Quantity,
    address: u8,
    unit: Unit,
    #[serde(default = "default_scale")]
    scale: f64,
    #[serde(default)]
    validity: Option<u8>,
}

fn default_scale() -> f64 {
    1.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> DataIds {
        DataIds::new("test", ValidMarker::NonZero)
            .with(
                Quantity::EnergyToday,
                DataInfo::new(0x0D, Unit::Energy).scaled(0.01),
            )
            .with(
                Quantity::FreqAC,
                DataInfo::new(0x43, Unit::Frequency)
                    .scaled(0.01)
                    .validated_by(0x0B),
            )
            .with(
                Quantity::EnergyTotalHigh,
                DataInfo::new(0x47, Unit::Energy).scaled(0.1),
            )
            .with(
                Quantity::EnergyTotalLow,
                DataInfo::new(0x48, Unit::Energy).scaled(0.1),
            )
    }

    #[test]
    fn decode_applies_scale() {
        let ids = catalog();
        let info = ids.describe(Quantity::EnergyToday).unwrap();
        let d = ids.decode(info, 1234, None);
        assert_eq!(d.value, 12.34);
        assert!(d.valid);

        for raw in [0u16, 1, 999, 40000, u16::MAX] {
            assert_eq!(ids.decode(info, raw, None).value, f64::from(raw) * 0.01);
        }
    }

    #[test]
    fn describe_unknown_quantity() {
        let err = catalog().describe(Quantity::VoltsPV3).unwrap_err();
        assert!(matches!(
            err,
            Error::UnsupportedQuantity {
                quantity: Quantity::VoltsPV3,
                ..
            }
        ));
    }

    #[test]
    fn validity_register_gates_reading() {
        let ids = catalog();
        let info = ids.describe(Quantity::FreqAC).unwrap();
        assert!(ids.decode(info, 5000, Some(1)).valid);
        assert!(!ids.decode(info, 5000, Some(0)).valid);
        assert!(!ids.decode(info, 5000, None).valid);
        assert_eq!(ids.decode(info, 5000, Some(0)).value, 50.0);
    }

    #[test]
    fn markers() {
        assert!(ValidMarker::Equals(1).accepts(1));
        assert!(!ValidMarker::Equals(1).accepts(3));
        assert!(ValidMarker::BitsSet(0x81).accepts(0x83));
        assert!(!ValidMarker::BitsSet(0x81).accepts(0x01));
    }

    #[test]
    fn required_addresses_include_validity() {
        let addrs = catalog().required_addresses();
        assert!(addrs.contains(&0x43));
        assert!(addrs.contains(&0x0B));
        assert_eq!(addrs.len(), 5);
    }

    #[test]
    fn combined_words() {
        let ids = catalog();
        let registers = HashMap::from([(0x47, 1), (0x48, 10)]);
        let d = ids
            .combined(Quantity::EnergyTotalHigh, Quantity::EnergyTotalLow, &registers)
            .unwrap()
            .unwrap();
        assert_eq!(d.value, f64::from(65546u32) * 0.1);

        let partial = HashMap::from([(0x47, 1)]);
        assert!(ids
            .combined(Quantity::EnergyTotalHigh, Quantity::EnergyTotalLow, &partial)
            .unwrap()
            .is_none());
    }

    #[test]
    fn register_json_overrides() {
        let ids = catalog()
            .with_register_json(
                r#"{"registers": [
                    {"quantity": "EnergyToday", "address": 17, "unit": "energy", "scale": 0.1},
                    {"quantity": "Temp", "address": 0, "unit": "temperature"}
                ]}"#,
            )
            .unwrap();

        let info = ids.describe(Quantity::EnergyToday).unwrap();
        assert_eq!(info.address, 17);
        assert_eq!(info.scale, 0.1);
        assert_eq!(ids.describe(Quantity::Temp).unwrap().scale, 1.0);
    }

    #[test]
    fn register_json_rejects_garbage() {
        assert!(matches!(
            catalog().with_register_json("{\"registers\": 4}"),
            Err(Error::Catalog(_))
        ));
    }
}
