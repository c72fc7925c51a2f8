//! Signature device storage
//!
//! The service talks to storage only through [`DeviceStore`]; the in-memory
//! implementation keeps every device in one map behind a single lock.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;

use signet_core::SignatureDevice;

use crate::error::StoreError;

/// Result type alias for store operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Keyed collection of signature devices
///
/// Each call is atomic with respect to every other call. A read followed by
/// an update is two calls and is not atomic as a whole.
#[async_trait]
pub trait DeviceStore: Send + Sync {
    /// Insert a new device, failing if the id is taken
    async fn create(&self, device: SignatureDevice) -> StoreResult<()>;

    /// Fetch a snapshot of a device
    async fn get(&self, id: &str) -> StoreResult<SignatureDevice>;

    /// Replace an existing device record
    async fn update(&self, device: SignatureDevice) -> StoreResult<()>;

    /// Snapshot of every stored device
    async fn list_all(&self) -> StoreResult<Vec<SignatureDevice>>;

    /// Signatures produced by a device, in counter order
    async fn list_signatures(&self, id: &str) -> StoreResult<Vec<Vec<u8>>>;
}

/// In-memory device store guarded by one coarse lock
#[derive(Default)]
pub struct InMemoryDeviceStore {
    devices: Mutex<HashMap<String, SignatureDevice>>,
}

impl InMemoryDeviceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored devices
    pub async fn len(&self) -> usize {
        self.devices.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.devices.lock().await.is_empty()
    }
}

#[async_trait]
impl DeviceStore for InMemoryDeviceStore {
    async fn create(&self, device: SignatureDevice) -> StoreResult<()> {
        let mut devices = self.devices.lock().await;
        if devices.contains_key(&device.id) {
            return Err(StoreError::DeviceAlreadyExists(device.id));
        }
        devices.insert(device.id.clone(), device);
        Ok(())
    }

    async fn get(&self, id: &str) -> StoreResult<SignatureDevice> {
        self.devices
            .lock()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::DeviceNotFound(id.to_string()))
    }

    async fn update(&self, device: SignatureDevice) -> StoreResult<()> {
        let mut devices = self.devices.lock().await;
        match devices.get_mut(&device.id) {
            Some(existing) => {
                *existing = device;
                Ok(())
            }
            None => Err(StoreError::DeviceNotFound(device.id)),
        }
    }

    async fn list_all(&self) -> StoreResult<Vec<SignatureDevice>> {
        Ok(self.devices.lock().await.values().cloned().collect())
    }

    async fn list_signatures(&self, id: &str) -> StoreResult<Vec<Vec<u8>>> {
        self.devices
            .lock()
            .await
            .get(id)
            .map(SignatureDevice::signatures)
            .ok_or_else(|| StoreError::DeviceNotFound(id.to_string()))
    }
}
