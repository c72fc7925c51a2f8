//! Device service: device creation and chained signing

use std::collections::HashMap;
use std::sync::{Arc, PoisonError};
use tokio::sync::Mutex;
use tracing::{debug, info};

use signet_core::{
    build_payload, chain_anchor,
    keygen::{generate_key_pair, generate_rsa_key_pair},
    resolve_signer, DeviceSummary, NewSignatureDeviceRequest, SignatureDevice, SignedData,
    SigningAlgorithm, RSA_KEY_BITS,
};

use crate::error::{DaemonError, Result, StoreError};
use crate::store::DeviceStore;

/// Source of fresh device identifiers
pub type IdGenerator = Arc<dyn Fn() -> String + Send + Sync>;

/// Orchestrates device creation and the signature chaining protocol
pub struct DeviceService {
    /// Device storage
    store: Arc<dyn DeviceStore>,

    /// Per-device exclusive sections for the read-sign-write sequence
    locks: DeviceLocks,

    /// Identifier source for new devices
    id_generator: IdGenerator,

    /// Modulus size for new RSA keys
    rsa_key_bits: usize,
}

impl DeviceService {
    /// Create a service over the given store with random UUID identifiers
    pub fn new(store: Arc<dyn DeviceStore>) -> Self {
        Self {
            store,
            locks: DeviceLocks::default(),
            id_generator: Arc::new(|| uuid::Uuid::new_v4().to_string()),
            rsa_key_bits: RSA_KEY_BITS,
        }
    }

    /// Replace the identifier source
    pub fn with_id_generator(mut self, id_generator: IdGenerator) -> Self {
        self.id_generator = id_generator;
        self
    }

    /// Set the modulus size for new RSA keys
    pub fn with_rsa_key_bits(mut self, bits: usize) -> Self {
        self.rsa_key_bits = bits;
        self
    }

    /// Create a new signature device
    ///
    /// The algorithm is validated before anything else happens; an unknown tag
    /// leaves the store untouched. Id collisions are reported, not retried.
    pub async fn create(&self, request: NewSignatureDeviceRequest) -> Result<SignatureDevice> {
        let algorithm: SigningAlgorithm = request
            .algorithm
            .parse()
            .map_err(|_| DaemonError::UnknownSigningAlgorithm(request.algorithm.clone()))?;

        let id = (self.id_generator)();

        let rsa_key_bits = self.rsa_key_bits;
        let key_pair = tokio::task::spawn_blocking(move || match algorithm {
            SigningAlgorithm::Rsa => generate_rsa_key_pair(rsa_key_bits),
            SigningAlgorithm::Ecc => generate_key_pair(algorithm),
        })
        .await??;

        let device = SignatureDevice::new(id, algorithm, request.label, key_pair.private_key);

        self.store
            .create(device.clone())
            .await
            .map_err(|e| match e {
                StoreError::DeviceAlreadyExists(id) => DaemonError::DeviceAlreadyExists(id),
                other => DaemonError::DeviceCreationFailed(other),
            })?;

        self.locks.register(&device.id);

        info!("Created {} device {}", device.algorithm, device.id);

        Ok(device)
    }

    /// Sign `data` with a device, chaining onto its previous signature
    ///
    /// The whole read-sign-write sequence runs inside the device's exclusive
    /// section, so concurrent calls on one device are applied one after the
    /// other and never overwrite each other's history entry.
    pub async fn sign_using_device(&self, device_id: &str, data: &[u8]) -> Result<SignedData> {
        let section = self.device_section(device_id).await?;
        let _guard = section.lock().await;

        let mut device = self.store.get(device_id).await?;

        let next_counter = device
            .counter
            .checked_add(1)
            .ok_or_else(|| DaemonError::CounterExhausted(device.id.clone()))?;

        let signed_payload = build_payload(device.counter, data, chain_anchor(&device)?);

        let algorithm = device.algorithm;
        let private_key = device.private_key.clone();
        let (signature, signed_payload) = tokio::task::spawn_blocking(move || {
            let signer = resolve_signer(algorithm, &private_key)?;
            let signature = signer.sign(&signed_payload)?;
            Ok::<_, signet_core::Error>((signature, signed_payload))
        })
        .await??;

        device
            .signature_history
            .insert(device.counter, signature.clone());
        device.counter = next_counter;

        debug!("Device {} signed at counter {}", device.id, next_counter - 1);

        self.store.update(device).await?;

        Ok(SignedData {
            signature,
            signed_payload,
        })
    }

    /// Fetch a device
    pub async fn get(&self, device_id: &str) -> Result<SignatureDevice> {
        Ok(self.store.get(device_id).await?)
    }

    /// Fetch every device
    pub async fn get_all(&self) -> Result<Vec<SignatureDevice>> {
        Ok(self.store.list_all().await?)
    }

    /// Public view of every device
    pub async fn summaries(&self) -> Result<Vec<DeviceSummary>> {
        let devices = self.get_all().await?;
        Ok(devices.iter().map(DeviceSummary::from).collect())
    }

    /// Signatures produced by a device, oldest first
    pub async fn get_device_signatures(&self, device_id: &str) -> Result<Vec<Vec<u8>>> {
        Ok(self.store.list_signatures(device_id).await?)
    }

    /// Exclusive section for a device that is known to exist
    async fn device_section(&self, device_id: &str) -> Result<Arc<Mutex<()>>> {
        if let Some(section) = self.locks.get(device_id) {
            return Ok(section);
        }

        // Devices created outside this service get a section on first use;
        // unknown ids never allocate one.
        self.store.get(device_id).await?;
        Ok(self.locks.register(device_id))
    }
}

/// Registry of per-device locks
#[derive(Default)]
struct DeviceLocks {
    sections: std::sync::Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl DeviceLocks {
    fn get(&self, device_id: &str) -> Option<Arc<Mutex<()>>> {
        self.sections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(device_id)
            .cloned()
    }

    fn register(&self, device_id: &str) -> Arc<Mutex<()>> {
        self.sections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(device_id.to_string())
            .or_default()
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{InMemoryDeviceStore, StoreResult};
    use async_trait::async_trait;
    use signet_core::{verify_chain, PrivateKeyPem, SignedPayload};
    use std::sync::atomic::{AtomicBool, Ordering};

    fn service() -> (Arc<InMemoryDeviceStore>, DeviceService) {
        let store = Arc::new(InMemoryDeviceStore::new());
        let service = DeviceService::new(store.clone());
        (store, service)
    }

    fn ecc_key() -> PrivateKeyPem {
        generate_key_pair(SigningAlgorithm::Ecc).unwrap().private_key
    }

    /// Store whose create always fails with a backend error
    struct BrokenStore;

    #[async_trait]
    impl DeviceStore for BrokenStore {
        async fn create(&self, _device: SignatureDevice) -> StoreResult<()> {
            Err(StoreError::Storage("backend offline".to_string()))
        }

        async fn get(&self, id: &str) -> StoreResult<SignatureDevice> {
            Err(StoreError::DeviceNotFound(id.to_string()))
        }

        async fn update(&self, device: SignatureDevice) -> StoreResult<()> {
            Err(StoreError::DeviceNotFound(device.id))
        }

        async fn list_all(&self) -> StoreResult<Vec<SignatureDevice>> {
            Ok(Vec::new())
        }

        async fn list_signatures(&self, id: &str) -> StoreResult<Vec<Vec<u8>>> {
            Err(StoreError::DeviceNotFound(id.to_string()))
        }
    }

    /// Store that loses its device between the read and the write of a sign
    struct VanishingStore {
        inner: InMemoryDeviceStore,
        vanished: AtomicBool,
    }

    #[async_trait]
    impl DeviceStore for VanishingStore {
        async fn create(&self, device: SignatureDevice) -> StoreResult<()> {
            self.inner.create(device).await
        }

        async fn get(&self, id: &str) -> StoreResult<SignatureDevice> {
            self.inner.get(id).await
        }

        async fn update(&self, device: SignatureDevice) -> StoreResult<()> {
            self.vanished.store(true, Ordering::SeqCst);
            Err(StoreError::DeviceNotFound(device.id))
        }

        async fn list_all(&self) -> StoreResult<Vec<SignatureDevice>> {
            self.inner.list_all().await
        }

        async fn list_signatures(&self, id: &str) -> StoreResult<Vec<Vec<u8>>> {
            self.inner.list_signatures(id).await
        }
    }

    #[tokio::test]
    async fn test_create_each_algorithm() {
        let (store, service) = service();

        for tag in ["RSA", "ECC"] {
            let device = service
                .create(NewSignatureDeviceRequest::new(tag, "Label"))
                .await
                .unwrap();
            assert_eq!(device.algorithm.as_str(), tag);
            assert_eq!(device.label, "Label");
            assert_eq!(device.counter, 0);
            assert!(device.signature_history.is_empty());
            assert!(resolve_signer(device.algorithm, &device.private_key).is_ok());
        }

        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn test_create_unknown_algorithm_leaves_store_untouched() {
        let (store, service) = service();

        let result = service
            .create(NewSignatureDeviceRequest::new("Unknown", "Label"))
            .await;

        assert!(matches!(
            result,
            Err(DaemonError::UnknownSigningAlgorithm(tag)) if tag == "Unknown"
        ));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_create_store_failure() {
        let service = DeviceService::new(Arc::new(BrokenStore));

        let result = service
            .create(NewSignatureDeviceRequest::new("ECC", "Label"))
            .await;

        assert!(matches!(
            result,
            Err(DaemonError::DeviceCreationFailed(StoreError::Storage(_)))
        ));
    }

    #[tokio::test]
    async fn test_create_id_collision() {
        let store = Arc::new(InMemoryDeviceStore::new());
        let service = DeviceService::new(store.clone())
            .with_id_generator(Arc::new(|| "fixed-id".to_string()));

        let original = service
            .create(NewSignatureDeviceRequest::new("ECC", "original"))
            .await
            .unwrap();

        let result = service
            .create(NewSignatureDeviceRequest::new("ECC", "intruder"))
            .await;

        assert!(matches!(result, Err(DaemonError::DeviceAlreadyExists(id)) if id == "fixed-id"));

        let stored = store.get("fixed-id").await.unwrap();
        assert_eq!(stored.label, "original");
        assert_eq!(stored.private_key, original.private_key);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_sign_zero_counter() {
        let (store, service) = service();
        store
            .create(SignatureDevice::new(
                "valid-id",
                SigningAlgorithm::Ecc,
                "",
                ecc_key(),
            ))
            .await
            .unwrap();

        let signed = service
            .sign_using_device("valid-id", b"test data")
            .await
            .unwrap();

        assert_eq!(signed.signed_payload, b"0_test data_dmFsaWQtaWQ=".to_vec());
        assert!(!signed.signature.is_empty());

        let device = store.get("valid-id").await.unwrap();
        assert_eq!(device.counter, 1);
        assert_eq!(device.signature_history.get(&0), Some(&signed.signature));
    }

    #[tokio::test]
    async fn test_sign_non_zero_counter() {
        let (store, service) = service();
        let mut device = SignatureDevice::new("valid-id", SigningAlgorithm::Ecc, "", ecc_key());
        device
            .signature_history
            .insert(0, b"previous-signature".to_vec());
        device.counter = 1;
        store.create(device).await.unwrap();

        let signed = service
            .sign_using_device("valid-id", b"test data")
            .await
            .unwrap();

        assert_eq!(
            signed.signed_payload,
            b"1_test data_cHJldmlvdXMtc2lnbmF0dXJl".to_vec()
        );
        assert_eq!(store.get("valid-id").await.unwrap().counter, 2);
    }

    #[tokio::test]
    async fn test_sign_unknown_device() {
        let (_, service) = service();
        let result = service.sign_using_device("nonexistent", b"data").await;
        assert!(matches!(result, Err(DaemonError::DeviceNotFound(id)) if id == "nonexistent"));
        assert!(service.locks.get("nonexistent").is_none());
    }

    #[tokio::test]
    async fn test_sign_device_vanishes_before_update() {
        let store = Arc::new(VanishingStore {
            inner: InMemoryDeviceStore::new(),
            vanished: AtomicBool::new(false),
        });
        store
            .create(SignatureDevice::new("d", SigningAlgorithm::Ecc, "", ecc_key()))
            .await
            .unwrap();
        let service = DeviceService::new(store.clone());

        let result = service.sign_using_device("d", b"data").await;

        assert!(matches!(result, Err(DaemonError::DeviceNotFound(id)) if id == "d"));
        assert!(store.vanished.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_sign_counter_exhausted() {
        let (store, service) = service();
        let mut device = SignatureDevice::new("full", SigningAlgorithm::Ecc, "", ecc_key());
        device.signature_history.insert(u32::MAX - 1, vec![1]);
        device.counter = u32::MAX;
        store.create(device).await.unwrap();

        let result = service.sign_using_device("full", b"data").await;

        assert!(matches!(result, Err(DaemonError::CounterExhausted(id)) if id == "full"));
        assert_eq!(store.get("full").await.unwrap().signature_history.len(), 1);
    }

    #[tokio::test]
    async fn test_sequential_signs_form_chain() {
        let (_, service) = service();
        let device = service
            .create(NewSignatureDeviceRequest::new("ECC", "chain"))
            .await
            .unwrap();

        let mut links = Vec::new();
        for i in 0..5 {
            let data = format!("transaction {}", i);
            let signed = service
                .sign_using_device(&device.id, data.as_bytes())
                .await
                .unwrap();
            links.push((signed.signature, signed.signed_payload));
        }

        let stored = service.get(&device.id).await.unwrap();
        assert_eq!(stored.counter, 5);
        assert_eq!(stored.signature_history.len(), 5);
        assert!(stored.is_consistent());

        let history = service.get_device_signatures(&device.id).await.unwrap();
        let signatures: Vec<Vec<u8>> = links.iter().map(|(sig, _)| sig.clone()).collect();
        assert_eq!(history, signatures);

        let signer = resolve_signer(stored.algorithm, &stored.private_key).unwrap();
        verify_chain(signer.as_ref(), &device.id, &links).unwrap();
    }

    #[tokio::test]
    async fn test_device_signatures_lookup() {
        let (_, service) = service();
        assert!(matches!(
            service.get_device_signatures("missing").await,
            Err(DaemonError::DeviceNotFound(_))
        ));

        let device = service
            .create(NewSignatureDeviceRequest::new("ECC", ""))
            .await
            .unwrap();
        assert!(service
            .get_device_signatures(&device.id)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_summaries_follow_counters() {
        let (_, service) = service();
        assert!(service.summaries().await.unwrap().is_empty());

        let device = service
            .create(NewSignatureDeviceRequest::new("ECC", "kiosk"))
            .await
            .unwrap();
        service.sign_using_device(&device.id, b"one").await.unwrap();

        let summaries = service.summaries().await.unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].id, device.id);
        assert_eq!(summaries[0].label, "kiosk");
        assert_eq!(summaries[0].counter, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_signs_keep_chain_consistent() {
        let (_, service) = service();
        let service = Arc::new(service);
        let device = service
            .create(NewSignatureDeviceRequest::new("ECC", "busy"))
            .await
            .unwrap();

        let handles: Vec<_> = (0..24)
            .map(|i| {
                let service = Arc::clone(&service);
                let id = device.id.clone();
                tokio::spawn(async move {
                    service
                        .sign_using_device(&id, format!("tx-{}", i).as_bytes())
                        .await
                })
            })
            .collect();

        let mut links = Vec::new();
        for handle in handles {
            let signed = handle.await.unwrap().unwrap();
            let counter = SignedPayload::parse(&signed.signed_payload).unwrap().counter;
            links.push((counter, signed.signature, signed.signed_payload));
        }
        links.sort_by_key(|(counter, _, _)| *counter);

        let stored = service.get(&device.id).await.unwrap();
        assert_eq!(stored.counter, 24);
        assert_eq!(stored.signature_history.len(), 24);
        assert!(stored.is_consistent());

        let links: Vec<_> = links
            .into_iter()
            .map(|(_, signature, payload)| (signature, payload))
            .collect();
        let signer = resolve_signer(stored.algorithm, &stored.private_key).unwrap();
        verify_chain(signer.as_ref(), &device.id, &links).unwrap();
    }
}
