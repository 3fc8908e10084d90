//! Per-key single-flight gate.
//!
//! Serializes work on the same key: while one task holds the gate for a key,
//! other tasks asking for that key wait. Different keys never block each
//! other. The hydrator uses this so that concurrent requests mentioning the
//! same link trigger one provider call; the waiters find the cached value
//! once they get through.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type Gate = Arc<AsyncMutex<()>>;

/// A set of per-key async locks. Entries are dropped when no task holds or
/// awaits them.
#[derive(Debug, Default)]
pub struct SingleFlight {
    gates: Arc<Mutex<HashMap<String, Gate>>>,
}

/// Held while a task owns a key. Releases the key on drop.
#[derive(Debug)]
pub struct FlightGuard {
    key: String,
    gate: Gate,
    guard: Option<OwnedMutexGuard<()>>,
    gates: Arc<Mutex<HashMap<String, Gate>>>,
}

impl SingleFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until no other task holds `key`, then hold it.
    pub async fn acquire(&self, key: &str) -> FlightGuard {
        let gate = {
            let mut gates = lock_map(&self.gates);
            gates.entry(key.to_string()).or_default().clone()
        };
        let guard = gate.clone().lock_owned().await;
        FlightGuard {
            key: key.to_string(),
            gate,
            guard: Some(guard),
            gates: self.gates.clone(),
        }
    }

    /// Number of keys currently held or awaited.
    pub fn in_flight(&self) -> usize {
        lock_map(&self.gates).len()
    }
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        self.guard.take();
        let mut gates = lock_map(&self.gates);
        // Two references left: the map's and ours. Nobody else is waiting.
        if Arc::strong_count(&self.gate) == 2 {
            gates.remove(&self.key);
        }
    }
}

fn lock_map(
    gates: &Mutex<HashMap<String, Gate>>,
) -> std::sync::MutexGuard<'_, HashMap<String, Gate>> {
    match gates.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_guard_releases_entry() {
        let flight = SingleFlight::new();
        {
            let _guard = flight.acquire("k").await;
            assert_eq!(flight.in_flight(), 1);
        }
        assert_eq!(flight.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_same_key_is_serialized() {
        let flight = Arc::new(SingleFlight::new());
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let flight = flight.clone();
            let active = active.clone();
            let peak = peak.clone();
            tasks.push(tokio::spawn(async move {
                let _guard = flight.acquire("https://same.example").await;
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                active.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(peak.load(Ordering::SeqCst), 1);
        assert_eq!(flight.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_different_keys_do_not_block() {
        let flight = SingleFlight::new();
        let _a = flight.acquire("a").await;
        let b = tokio::time::timeout(Duration::from_millis(200), flight.acquire("b")).await;
        assert!(b.is_ok());
        assert_eq!(flight.in_flight(), 2);
    }
}
