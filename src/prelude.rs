pub use anyhow::{anyhow, bail, Result};
pub use log::{debug, error, info, trace, warn};
pub use std::str::FromStr;

pub use crate::config::{self, Config, ConfigWrapper};
pub use crate::device::{DeviceIdentity, DeviceManager, IdentityCandidate};
pub use crate::error::{ConnectionError, Error};
pub use crate::extract::{
    Connection, DiagnosticSink, Extraction, ExtractionEvent, ExtractYieldRecords, LogSink,
    RawRow,
};
pub use crate::family::{Family, InverterFamily};
pub use crate::reading::{DayCountMismatch, EnergyReadingSet, PVReading, PVReadingSet};
pub use crate::register::{DataIds, DataInfo, Decoded, Quantity, Unit};
