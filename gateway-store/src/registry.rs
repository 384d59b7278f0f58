//! Device registry with a monotonic identifier allocator.

use crate::error::{RecordKind, StoreError};
use crate::models::{Device, DeviceId};
use log::debug;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct Inner {
    devices: HashMap<DeviceId, Device>,
    high_water: DeviceId,
}

impl Inner {
    fn allocate(&mut self, mut device: Device) -> DeviceId {
        self.high_water += 1;
        device.id = self.high_water;
        self.devices.insert(device.id, device);
        self.high_water
    }
}

/// In-memory device registry.
///
/// Every operation takes the same lock for its whole duration, so each call is
/// atomic on its own. A sequence of calls is not: a `find` followed by an
/// `update` can interleave with another caller's `delete`, and the `update`
/// then fails with `NotFound`. Callers doing check-then-act must tolerate that.
#[derive(Debug, Default)]
pub struct DeviceRegistry {
    inner: Mutex<Inner>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-populated with the fixture devices served at startup.
    pub fn seeded() -> Self {
        let registry = Self::new();
        {
            let mut inner = registry.lock();
            inner.allocate(Device::new("arduino-flame", "active", 30).with_actions(["shoot"]));
            for (n, reading) in (1..=6).zip((40..=90).step_by(10)) {
                inner.allocate(Device::new(format!("amd-temp{n}"), "active", reading));
            }
        }
        registry
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // Every mutation completes before anything can panic, so a poisoned
        // guard still protects consistent maps.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store a device and return its identifier.
    ///
    /// A zero id allocates the next identifier. A non-zero id must name a live
    /// device, which is then replaced; ids beyond the high-water mark and ids
    /// of deleted devices are rejected with [`StoreError::Integrity`].
    pub fn create(&self, device: Device) -> Result<DeviceId, StoreError> {
        let mut inner = self.lock();

        if device.id > inner.high_water {
            return Err(StoreError::Integrity {
                id: device.id,
                high_water: inner.high_water,
            });
        }

        if device.id == 0 {
            let id = inner.allocate(device);
            debug!("Created device {id}");
            return Ok(id);
        }

        let id = device.id;
        match inner.devices.get_mut(&id) {
            Some(existing) => {
                *existing = device;
                debug!("Replaced device {id}");
                Ok(id)
            }
            // retired identifier
            None => Err(StoreError::Integrity {
                id,
                high_water: inner.high_water,
            }),
        }
    }

    /// Overwrite an existing device in full.
    pub fn update(&self, device: Device) -> Result<(), StoreError> {
        let mut inner = self.lock();
        let slot = inner
            .devices
            .get_mut(&device.id)
            .ok_or_else(|| StoreError::not_found(RecordKind::Device, device.id))?;
        debug!("Updated device {}", device.id);
        *slot = device;
        Ok(())
    }

    pub fn delete(&self, id: DeviceId) -> Result<(), StoreError> {
        let mut inner = self.lock();
        inner
            .devices
            .remove(&id)
            .map(|_| debug!("Deleted device {id}"))
            .ok_or_else(|| StoreError::not_found(RecordKind::Device, id))
    }

    pub fn find(&self, id: DeviceId) -> Result<Device, StoreError> {
        self.lock()
            .devices
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found(RecordKind::Device, id))
    }

    /// Snapshot of all live devices in ascending identifier order.
    pub fn list(&self) -> Vec<Device> {
        let inner = self.lock();
        (1..=inner.high_water)
            .filter_map(|id| inner.devices.get(&id).cloned())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lock().devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().devices.is_empty()
    }

    /// Largest identifier ever assigned.
    pub fn high_water(&self) -> DeviceId {
        self.lock().high_water
    }
}
