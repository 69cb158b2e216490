//! Per-vehicle state registry.
//!
//! Vehicles are spread over a fixed set of shards. A shard's map is only
//! held for lookup or insertion; the state itself sits behind a per-vehicle
//! `tokio::sync::Mutex`, so updates for one vehicle are serialized while
//! different vehicles proceed independently.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

use crate::telemetry::{Geography, MessageType, SignalSnapshot};

const SHARD_COUNT: usize = 16;

/// Latest observed state of a single vehicle.
#[derive(Debug, Clone)]
pub struct VehicleState {
    pub vehicle_id: String,
    pub last_update: DateTime<Utc>,
    pub last_values: HashMap<MessageType, SignalSnapshot>,
    pub geography: Geography,
}

impl VehicleState {
    fn new(vehicle_id: &str, geography: Geography, now: DateTime<Utc>) -> Self {
        Self {
            vehicle_id: vehicle_id.to_string(),
            last_update: now,
            last_values: HashMap::new(),
            geography,
        }
    }
}

/// Outcome of recording a snapshot.
#[derive(Debug, Clone, PartialEq)]
pub enum StateUpdate {
    /// First snapshot of this type for the vehicle; nothing to diff against.
    First,
    /// The snapshot that was replaced.
    Previous(SignalSnapshot),
}

type Shard = RwLock<HashMap<String, Arc<Mutex<VehicleState>>>>;

pub struct VehicleStateStore {
    shards: Vec<Shard>,
}

impl Default for VehicleStateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl VehicleStateStore {
    pub fn new() -> Self {
        Self {
            shards: (0..SHARD_COUNT).map(|_| RwLock::new(HashMap::new())).collect(),
        }
    }

    fn shard(&self, vehicle_id: &str) -> &Shard {
        let mut hasher = DefaultHasher::new();
        vehicle_id.hash(&mut hasher);
        &self.shards[(hasher.finish() as usize) % SHARD_COUNT]
    }

    async fn entry(&self, vehicle_id: &str, geography: Geography) -> Arc<Mutex<VehicleState>> {
        let shard = self.shard(vehicle_id);
        if let Some(slot) = shard.read().await.get(vehicle_id) {
            return slot.clone();
        }

        let mut map = shard.write().await;
        map.entry(vehicle_id.to_string())
            .or_insert_with(|| {
                debug!(vehicle_id, "tracking new vehicle");
                Arc::new(Mutex::new(VehicleState::new(vehicle_id, geography, Utc::now())))
            })
            .clone()
    }

    /// Return the state for `vehicle_id`, creating an empty one if needed.
    ///
    /// A vehicle created here starts in `Urban` until its first message says otherwise.
    pub async fn get_or_create(&self, vehicle_id: &str) -> VehicleState {
        let slot = self.entry(vehicle_id, Geography::Urban).await;
        let state = slot.lock().await;
        state.clone()
    }

    pub async fn get(&self, vehicle_id: &str) -> Option<VehicleState> {
        let slot = self.shard(vehicle_id).read().await.get(vehicle_id).cloned()?;
        let state = slot.lock().await;
        Some(state.clone())
    }

    /// Record `snapshot` as the latest value of `message_type` for the vehicle.
    pub async fn update(
        &self,
        vehicle_id: &str,
        message_type: MessageType,
        snapshot: SignalSnapshot,
        geography: Geography,
        now: DateTime<Utc>,
    ) -> StateUpdate {
        let slot = self.entry(vehicle_id, geography).await;
        let mut state = slot.lock().await;

        state.geography = geography;

        match state.last_values.insert(message_type, snapshot) {
            None => StateUpdate::First,
            Some(previous) => {
                // Concurrent callers may arrive with slightly older clocks.
                if now > state.last_update {
                    state.last_update = now;
                }
                StateUpdate::Previous(previous)
            }
        }
    }

    /// Number of vehicles tracked.
    pub async fn len(&self) -> usize {
        let mut total = 0;
        for shard in &self.shards {
            total += shard.read().await.len();
        }
        total
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
