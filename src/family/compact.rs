use super::{standard::fault_codes, InverterFamily};
use crate::register::{DataIds, DataInfo, Quantity, Unit, ValidMarker};

/// Single-string inverters. Logs every five minutes, keeps a coarser daily
/// energy counter and only has validity flags on frequency and mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Compact;

impl InverterFamily for Compact {
    fn name(&self) -> &'static str {
        "compact"
    }

    fn catalog(&self) -> DataIds {
        use Quantity::*;
        use Unit::*;

        // flag registers carry a status word, bit 0 means "measured"
        let ids = DataIds::new(self.name(), ValidMarker::BitsSet(0x0001))
            .with(Temp, DataInfo::new(0x00, Temperature).scaled(0.1))
            .with(EnergyToday, DataInfo::new(0x11, Energy).scaled(0.1))
            .with(VoltsPV, DataInfo::new(0x20, Voltage).scaled(0.1))
            .with(CurrentAC, DataInfo::new(0x21, Current).scaled(0.01))
            .with(VoltsAC, DataInfo::new(0x22, Voltage).scaled(0.1))
            .with(FreqAC, DataInfo::new(0x23, Frequency).scaled(0.01).validated_by(0x0B))
            .with(PowerAC, DataInfo::new(0x24, Power))
            .with(ImpedanceAC, DataInfo::new(0x25, Impedance))
            .with(EnergyTotalHigh, DataInfo::new(0x27, Energy).scaled(0.1))
            .with(EnergyTotalLow, DataInfo::new(0x28, Energy).scaled(0.1))
            .with(HoursHigh, DataInfo::new(0x29, Hours))
            .with(HoursLow, DataInfo::new(0x2A, Hours))
            .with(Mode, DataInfo::new(0x2C, Identifier).validated_by(0x0C))
            .with(VoltsPV1, DataInfo::new(0x01, Voltage).scaled(0.1))
            .with(CurrentPV1, DataInfo::new(0x04, Current).scaled(0.1));

        fault_codes(ids, 0x78)
    }

    fn normal_day_size(&self) -> usize {
        288
    }
}
