use super::InverterFamily;
use crate::register::{DataIds, DataInfo, Quantity, Unit, ValidMarker};

/// Three-string inverters. One row every ten minutes around the clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Standard;

impl InverterFamily for Standard {
    fn name(&self) -> &'static str {
        "standard"
    }

    fn catalog(&self) -> DataIds {
        use Quantity::*;
        use Unit::*;

        // a guarded reading is good when its flag register is non-zero
        let ids = DataIds::new(self.name(), ValidMarker::NonZero)
            .with(Temp, DataInfo::new(0x00, Temperature).scaled(0.1))
            .with(EnergyToday, DataInfo::new(0x0D, Energy).scaled(0.01))
            .with(VoltsPV, DataInfo::new(0x40, Voltage).scaled(0.1))
            .with(CurrentAC, DataInfo::new(0x41, Current).scaled(0.1))
            .with(VoltsAC, DataInfo::new(0x42, Voltage).scaled(0.1))
            .with(FreqAC, DataInfo::new(0x43, Frequency).scaled(0.01).validated_by(0x0B))
            .with(PowerAC, DataInfo::new(0x44, Power))
            .with(ImpedanceAC, DataInfo::new(0x45, Impedance))
            .with(EnergyTotalHigh, DataInfo::new(0x47, Energy).scaled(0.1).validated_by(0x07))
            .with(EnergyTotalLow, DataInfo::new(0x48, Energy).scaled(0.1).validated_by(0x08))
            .with(HoursHigh, DataInfo::new(0x49, Hours).validated_by(0x09))
            .with(HoursLow, DataInfo::new(0x4A, Hours).validated_by(0x0A))
            .with(Mode, DataInfo::new(0x4C, Identifier).validated_by(0x0C))
            .with(VoltsPV1, DataInfo::new(0x01, Voltage).scaled(0.1))
            .with(VoltsPV2, DataInfo::new(0x02, Voltage).scaled(0.1))
            .with(VoltsPV3, DataInfo::new(0x03, Voltage).scaled(0.1))
            .with(CurrentPV1, DataInfo::new(0x04, Current).scaled(0.1))
            .with(CurrentPV2, DataInfo::new(0x05, Current).scaled(0.1))
            .with(CurrentPV3, DataInfo::new(0x06, Current).scaled(0.1));

        fault_codes(ids, 0x78)
    }

    fn normal_day_size(&self) -> usize {
        144
    }
}

/// The seven fault identifiers sit in consecutive registers from `first`.
pub(crate) fn fault_codes(ids: DataIds, first: u8) -> DataIds {
    Quantity::FAULTS
        .iter()
        .zip(first..)
        .fold(ids, |ids, (q, address)| {
            ids.with(*q, DataInfo::new(address, Unit::Identifier))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_table() {
        let ids = Standard.catalog();

        let freq = ids.describe(Quantity::FreqAC).unwrap();
        assert_eq!((freq.address, freq.scale, freq.validity), (0x43, 0.01, Some(0x0B)));

        let high = ids.describe(Quantity::EnergyTotalHigh).unwrap();
        assert_eq!((high.address, high.scale, high.validity), (0x47, 0.1, Some(0x07)));

        assert_eq!(ids.describe(Quantity::ImpedanceAC).unwrap().unit, Unit::Impedance);
        assert_eq!(ids.describe(Quantity::VoltsPV3).unwrap().address, 0x03);
        assert_eq!(ids.describe(Quantity::ErrorGV).unwrap().address, 0x78);
        assert_eq!(ids.describe(Quantity::ErrorModeLow).unwrap().address, 0x7E);
        assert_eq!(ids.len(), 26);
    }
}
