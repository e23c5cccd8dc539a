use crate::error::Error;
use crate::family::{Family, InverterFamily};
use crate::register::DataIds;

use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

/// Unvalidated identity fields as they arrive from a row or a config file.
/// Blank strings count as absent.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct IdentityCandidate {
    #[serde(default)]
    pub inverter_id: Option<u32>,
    #[serde(default)]
    pub make: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub serial: Option<String>,
    #[serde(default)]
    pub site_id: Option<String>,
}

impl IdentityCandidate {
    pub fn with_id(inverter_id: u32) -> Self {
        Self {
            inverter_id: Some(inverter_id),
            ..Default::default()
        }
    }

    pub fn with_triple(make: &str, model: &str, serial: &str) -> Self {
        Self {
            make: Some(make.to_string()),
            model: Some(model.to_string()),
            serial: Some(serial.to_string()),
            ..Default::default()
        }
    }
}

impl std::fmt::Display for IdentityCandidate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "id={} make={} model={} serial={}",
            self.inverter_id.map(|i| i.to_string()).unwrap_or_default(),
            self.make.as_deref().unwrap_or_default(),
            self.model.as_deref().unwrap_or_default(),
            self.serial.as_deref().unwrap_or_default()
        )
    }
}

// DeviceIdentity {{{
/// One physical inverter. Only obtainable through [`identify`], so every
/// value carries either an inverter id or a full make/model/serial triple.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct DeviceIdentity {
    inverter_id: Option<u32>,
    make: Option<String>,
    model: Option<String>,
    serial: Option<String>,
    site_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityMatch {
    Same,
    Different,
    /// Neither the ids nor the triples are present on both sides.
    Undecidable,
}

pub fn identify(candidate: IdentityCandidate) -> Result<DeviceIdentity, Error> {
    fn present(s: Option<String>) -> Option<String> {
        s.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
    }

    let identity = DeviceIdentity {
        inverter_id: candidate.inverter_id,
        make: present(candidate.make),
        model: present(candidate.model),
        serial: present(candidate.serial),
        site_id: present(candidate.site_id),
    };

    if identity.inverter_id.is_none() && identity.triple().is_none() {
        return Err(Error::IncompleteIdentity(format!(
            "make={} model={} serial={}",
            identity.make().unwrap_or("-"),
            identity.model().unwrap_or("-"),
            identity.serial().unwrap_or("-")
        )));
    }

    Ok(identity)
}

impl DeviceIdentity {
    pub fn inverter_id(&self) -> Option<u32> {
        self.inverter_id
    }

    pub fn make(&self) -> Option<&str> {
        self.make.as_deref()
    }

    pub fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    pub fn serial(&self) -> Option<&str> {
        self.serial.as_deref()
    }

    pub fn site_id(&self) -> Option<&str> {
        self.site_id.as_deref()
    }

    pub fn triple(&self) -> Option<(&str, &str, &str)> {
        Some((self.make()?, self.model()?, self.serial()?))
    }

    pub fn matches(&self, other: &DeviceIdentity) -> IdentityMatch {
        if let (Some(a), Some(b)) = (self.inverter_id, other.inverter_id) {
            return if a == b {
                IdentityMatch::Same
            } else {
                IdentityMatch::Different
            };
        }

        match (self.triple(), other.triple()) {
            (Some(a), Some(b)) if a == b => IdentityMatch::Same,
            (Some(_), Some(_)) => IdentityMatch::Different,
            _ => IdentityMatch::Undecidable,
        }
    }
}

impl std::fmt::Display for DeviceIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.inverter_id, self.triple()) {
            (Some(id), _) => write!(f, "inverter {}", id),
            (None, Some((make, model, serial))) => write!(f, "{} {} {}", make, model, serial),
            (None, None) => write!(f, "<unidentified>"),
        }
    }
} // }}}

// DeviceManager {{{
/// Owns the register catalog of one family and the set of known devices.
/// Safe to share between threads; only the device list is mutable.
#[derive(Debug)]
pub struct DeviceManager {
    family: Family,
    catalog: Arc<DataIds>,
    normal_day_size: usize,
    auto_register: bool,
    devices: Mutex<Vec<Arc<DeviceIdentity>>>,
}

impl DeviceManager {
    pub fn new(family: Family) -> Self {
        Self::with_catalog(family, family.catalog())
    }

    /// For catalogs adjusted after construction, e.g. by a register file.
    pub fn with_catalog(family: Family, catalog: DataIds) -> Self {
        info!(
            "device manager for {} family: {} registers, {} rows per day",
            family,
            catalog.len(),
            family.normal_day_size()
        );

        Self {
            family,
            catalog: Arc::new(catalog),
            normal_day_size: family.normal_day_size(),
            auto_register: true,
            devices: Mutex::new(Vec::new()),
        }
    }

    pub fn auto_register(mut self, enabled: bool) -> Self {
        self.auto_register = enabled;
        self
    }

    pub fn normal_day_size_override(mut self, size: Option<usize>) -> Self {
        if let Some(size) = size {
            info!("{} family: expecting {} rows per day", self.family, size);
            self.normal_day_size = size;
        }
        self
    }

    pub fn family(&self) -> Family {
        self.family
    }

    pub fn catalog(&self) -> Arc<DataIds> {
        self.catalog.clone()
    }

    pub fn normal_day_size(&self) -> usize {
        self.normal_day_size
    }

    pub fn devices(&self) -> Vec<Arc<DeviceIdentity>> {
        self.lock().clone()
    }

    /// Registers a device up front. Registering an identity that matches a
    /// known one returns the known one.
    pub fn register(&self, candidate: IdentityCandidate) -> Result<Arc<DeviceIdentity>, Error> {
        let identity = identify(candidate)?;
        let mut devices = self.lock();

        if let Some(known) = devices
            .iter()
            .find(|d| d.matches(&identity) == IdentityMatch::Same)
        {
            return Ok(known.clone());
        }

        debug!("registering {}", identity);
        let identity = Arc::new(identity);
        devices.push(identity.clone());
        Ok(identity)
    }

    /// Maps an incoming candidate onto exactly one known device, registering
    /// it when unseen and auto-registration is on.
    pub fn resolve(&self, candidate: IdentityCandidate) -> Result<Arc<DeviceIdentity>, Error> {
        self.resolve_tracked(candidate).map(|(device, _)| device)
    }

    /// Like [`DeviceManager::resolve`], also telling whether the device was
    /// registered by this call.
    pub fn resolve_tracked(
        &self,
        candidate: IdentityCandidate,
    ) -> Result<(Arc<DeviceIdentity>, bool), Error> {
        let identity = identify(candidate)?;
        let mut devices = self.lock();

        let mut same = Vec::new();
        let mut undecidable = 0;
        for known in devices.iter() {
            match known.matches(&identity) {
                IdentityMatch::Same => same.push(known.clone()),
                IdentityMatch::Undecidable => undecidable += 1,
                IdentityMatch::Different => (),
            }
        }

        match (same.len(), undecidable) {
            (1, _) => Ok((same.remove(0), false)),
            (0, 0) if self.auto_register => {
                let identity = Arc::new(identity);
                devices.push(identity.clone());
                Ok((identity, true))
            }
            (n, u) => Err(Error::AmbiguousIdentity {
                candidate: identity.to_string(),
                matches: n + u,
            }),
        }
    }

    /// Administrative correction of a known device's identity fields.
    pub fn correct(
        &self,
        old: &DeviceIdentity,
        new: IdentityCandidate,
    ) -> Result<Arc<DeviceIdentity>, Error> {
        let new = Arc::new(identify(new)?);
        let mut devices = self.lock();

        let slot = devices
            .iter_mut()
            .find(|d| d.as_ref() == old)
            .ok_or_else(|| Error::AmbiguousIdentity {
                candidate: old.to_string(),
                matches: 0,
            })?;

        info!("correcting device {} to {}", old, new);
        *slot = new.clone();
        Ok(new)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Arc<DeviceIdentity>>> {
        self.devices.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
} // }}}
