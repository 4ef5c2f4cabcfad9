//! Fault-injecting [`DurableStore`] wrapper for unit tests.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use super::traits::{DurableStore, Namespace, StorageError};

pub(crate) struct FailingStore<S: DurableStore> {
    inner: S,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    writes: AtomicU64,
    /// Millis each operation sleeps before reaching the inner store
    put_delay_ms: AtomicU64,
    scan_delay_ms: AtomicU64,
    delete_delay_ms: AtomicU64,
}

impl<S: DurableStore> FailingStore<S> {
    pub(crate) fn new(inner: S) -> Self {
        Self {
            inner,
            fail_reads: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
            writes: AtomicU64::new(0),
            put_delay_ms: AtomicU64::new(0),
            scan_delay_ms: AtomicU64::new(0),
            delete_delay_ms: AtomicU64::new(0),
        }
    }

    pub(crate) fn inner(&self) -> &S {
        &self.inner
    }

    pub(crate) fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn set_put_delay(&self, delay: Duration) {
        self.put_delay_ms.store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub(crate) fn set_scan_delay(&self, delay: Duration) {
        self.scan_delay_ms.store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub(crate) fn set_delete_delay(&self, delay: Duration) {
        self.delete_delay_ms.store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub(crate) fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    async fn stall(delay_ms: &AtomicU64) {
        let ms = delay_ms.load(Ordering::SeqCst);
        if ms > 0 {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
    }

    fn check_read(&self) -> Result<(), StorageError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StorageError::Backend("injected read failure".into()));
        }
        Ok(())
    }

    fn check_write(&self) -> Result<(), StorageError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Backend("injected write failure".into()));
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl<S: DurableStore> DurableStore for FailingStore<S> {
    async fn get(&self, ns: Namespace, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        self.check_read()?;
        self.inner.get(ns, key).await
    }

    async fn put(&self, ns: Namespace, key: &str, value: &[u8]) -> Result<(), StorageError> {
        self.check_write()?;
        Self::stall(&self.put_delay_ms).await;
        self.inner.put(ns, key, value).await
    }

    async fn delete(&self, ns: Namespace, key: &str) -> Result<(), StorageError> {
        self.check_write()?;
        self.inner.delete(ns, key).await
    }

    async fn scan_prefix(
        &self,
        ns: Namespace,
        prefix: &str,
    ) -> Result<Vec<(String, Vec<u8>)>, StorageError> {
        self.check_read()?;
        Self::stall(&self.scan_delay_ms).await;
        self.inner.scan_prefix(ns, prefix).await
    }

    async fn clear(&self, ns: Namespace) -> Result<(), StorageError> {
        self.check_write()?;
        self.inner.clear(ns).await
    }

    async fn delete_batch(&self, ns: Namespace, keys: &[String]) -> Result<usize, StorageError> {
        self.check_write()?;
        Self::stall(&self.delete_delay_ms).await;
        self.inner.delete_batch(ns, keys).await
    }
}
