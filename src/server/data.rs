use std::net::SocketAddr;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use crate::replication::replica_manager::ReplicaRegistry;
use crate::store::expiring_map::KvStore;

use super::metadata::{ReplicaInfo, ServerMetadata};

pub struct MasterLiveData {
    pub replication_offset: u64,
    pub replicas: ReplicaRegistry,
}

pub struct SlaveLiveData {
    pub offset: u64,
}

pub enum LiveData {
    Master(MasterLiveData),
    Slave(SlaveLiveData),
}

impl LiveData {
    fn new(info: &ReplicaInfo) -> LiveData {
        match info {
            ReplicaInfo::Master(..) => LiveData::Master(MasterLiveData {
                replication_offset: 0,
                replicas: ReplicaRegistry::new(),
            }),
            ReplicaInfo::Slave(..) => LiveData::Slave(SlaveLiveData { offset: 0 }),
        }
    }
}

/// Shared server state, handed to every connection's handler behind an `Arc`.
pub struct Server {
    pub metadata: ServerMetadata,
    pub live_data: RwLock<LiveData>,
    pub store: KvStore,
}

impl Server {
    pub fn new(metadata: ServerMetadata) -> Server {
        let live_data = RwLock::new(LiveData::new(&metadata.replica_info));
        Server {
            metadata,
            live_data,
            store: KvStore::new(),
        }
    }

    pub fn set(&self, key: &[u8], value: &[u8], expiry: Option<Duration>) {
        self.store.set(key, value, expiry);
    }

    pub fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.store.get(key)
    }

    /// Bytes of write traffic propagated so far. Zero for a server that has
    /// never been a master or has sent nothing yet.
    pub fn master_offset(&self) -> u64 {
        match &*self.live_data.read().unwrap() {
            LiveData::Master(data) => data.replication_offset,
            LiveData::Slave(_) => 0,
        }
    }

    pub fn advance_master_offset(&self, bytes: u64) {
        if let LiveData::Master(data) = &mut *self.live_data.write().unwrap() {
            data.replication_offset += bytes;
        }
    }

    pub fn slave_offset(&self) -> u64 {
        match &*self.live_data.read().unwrap() {
            LiveData::Slave(data) => data.offset,
            LiveData::Master(_) => 0,
        }
    }

    pub fn advance_slave_offset(&self, bytes: u64) {
        if let LiveData::Slave(data) = &mut *self.live_data.write().unwrap() {
            data.offset += bytes;
        }
    }

    pub fn propagate(&self, frame: &[u8]) {
        if let LiveData::Master(data) = &*self.live_data.read().unwrap() {
            data.replicas.broadcast(frame);
        }
    }

    pub fn attach_replica(&self, addr: SocketAddr, stream: std::net::TcpStream) {
        if let LiveData::Master(data) = &*self.live_data.read().unwrap() {
            data.replicas.attach(addr, stream);
        }
    }

    pub fn detach_replica(&self, addr: SocketAddr) {
        if let LiveData::Master(data) = &*self.live_data.read().unwrap() {
            data.replicas.detach(addr);
        }
    }

    pub fn replica_count(&self) -> usize {
        match &*self.live_data.read().unwrap() {
            LiveData::Master(data) => data.replicas.replica_count(),
            LiveData::Slave(_) => 0,
        }
    }

    pub fn reset_acks(&self) {
        if let LiveData::Master(data) = &*self.live_data.read().unwrap() {
            data.replicas.reset_acks();
        }
    }

    pub fn bump_acks(&self) {
        if let LiveData::Master(data) = &*self.live_data.read().unwrap() {
            data.replicas.bump_acks();
        }
    }

    pub fn wait_for_acks(&self, target: u64, deadline: Instant, tick: Duration) -> u64 {
        match &*self.live_data.read().unwrap() {
            LiveData::Master(data) => data.replicas.wait_for_acks(target, deadline, tick),
            LiveData::Slave(_) => 0,
        }
    }
}
