//! The key-value store: a byte-safe map with lazy, per-key expiry. Mirrors
//! the teacher's `ExpiringHashMap` — a coarse `RwLock` over a `HashMap`, plus
//! a background sweep thread woken on a `Condvar` so it can be shut down
//! promptly instead of sleeping out a full interval.

use std::{
    collections::HashMap,
    sync::{Arc, Condvar, Mutex, RwLock},
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use crate::logging::log_info;

type BinaryData = Vec<u8>;
type KeyType = BinaryData;
type Expiry = Option<Instant>;
type ValueType = (BinaryData, Expiry);
type Table = RwLock<HashMap<KeyType, ValueType>>;
type StopSignal = (Mutex<bool>, Condvar);

const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

pub struct KvStore {
    table: Arc<Table>,
    stop: Arc<StopSignal>,
    sweeper: Option<JoinHandle<()>>,
}

impl Default for KvStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for KvStore {
    fn drop(&mut self) {
        if let Some(handle) = self.sweeper.take() {
            let (stop_requested, stop_cv) = &*self.stop;
            *stop_requested.lock().unwrap() = true;
            stop_cv.notify_all();
            let _ = handle.join();
        }
    }
}

impl KvStore {
    pub fn new() -> Self {
        let mut store = KvStore {
            table: Arc::new(RwLock::new(HashMap::new())),
            stop: Arc::new((Mutex::new(false), Condvar::new())),
            sweeper: None,
        };
        store.spawn_sweeper();
        store
    }

    fn spawn_sweeper(&mut self) {
        let table = self.table.clone();
        let stop = self.stop.clone();
        self.sweeper = Some(thread::spawn(move || Self::sweep_loop(table, stop)));
    }

    fn sweep_loop(table: Arc<Table>, stop: Arc<StopSignal>) {
        loop {
            let (stop_requested, stop_cv) = &*stop;
            if *stop_requested.lock().unwrap() {
                break;
            }

            let expired = Self::sweep_expired(&table);
            if expired > 0 {
                log_info!("expiry sweep removed {expired} keys");
            }

            let guard = stop_requested.lock().unwrap();
            let _ = stop_cv.wait_timeout(guard, SWEEP_INTERVAL);
        }
    }

    fn sweep_expired(table: &Table) -> usize {
        let mut table = table.write().unwrap();
        let now = Instant::now();
        let before = table.len();
        table.retain(|_, (_, expiry)| !matches!(expiry, Some(at) if *at <= now));
        before - table.len()
    }

    pub fn get(&self, key: &[u8]) -> Option<BinaryData> {
        {
            let table = self.table.read().unwrap();
            match table.get(key) {
                Some((_, Some(at))) if *at <= Instant::now() => {}
                Some((value, _)) => return Some(value.clone()),
                None => return None,
            }
        }
        // Expired: drop it lazily and report absence.
        self.table.write().unwrap().remove(key);
        None
    }

    pub fn set(&self, key: &[u8], value: &[u8], ttl: Option<Duration>) {
        let expires_at = ttl.and_then(|d| Instant::now().checked_add(d));
        self.table
            .write()
            .unwrap()
            .insert(key.to_vec(), (value.to_vec(), expires_at));
    }
}
