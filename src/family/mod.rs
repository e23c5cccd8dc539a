use crate::register::DataIds;

use enum_dispatch::enum_dispatch;

pub mod compact;
pub mod standard;

pub use compact::Compact;
pub use standard::Standard;

/// What a protocol family has to supply for its telemetry to be decoded
/// and checked.
#[enum_dispatch]
pub trait InverterFamily {
    fn name(&self) -> &'static str;

    /// Builds the family's register catalog. Pure; call once and share.
    fn catalog(&self) -> DataIds;

    /// Expected rows for one inverter over one calendar day. Only used to
    /// annotate data quality, never to cap a day.
    fn normal_day_size(&self) -> usize;
}

#[enum_dispatch(InverterFamily)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Family {
    Standard,
    Compact,
}

impl Family {
    pub const ALL: [Family; 2] = [Family::Standard(Standard), Family::Compact(Compact)];
}

impl std::fmt::Display for Family {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for Family {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|f| f.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| anyhow::anyhow!("unknown inverter family {}", s))
    }
}
