use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use log::{debug, info};
use parking_lot::Mutex;
use uuid::Uuid;

use crate::models::{ExamType, ExerciseResponse};

/// How long a generated exercise set stays retrievable.
pub const EXERCISE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// How often the background sweep removes expired entries.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// One generated exercise set, cached until its answers are graded or it
/// expires. Write-once, read-many.
#[derive(Debug, Clone)]
pub struct CachedExercise {
    pub id: Uuid,
    pub exam_type: ExamType,
    pub exercises: ExerciseResponse,
    pub created_at: DateTime<Utc>,
    stored_at: Instant,
}

/// In-memory map from exercise id to exercise set with a 24h TTL. Entries
/// expire lazily on read and are additionally swept every hour. Process-local
/// by design; a multi-instance deployment would need an external store.
pub struct ExerciseStore {
    entries: Mutex<HashMap<Uuid, CachedExercise>>,
    ttl: Duration,
}

impl Default for ExerciseStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ExerciseStore {
    pub fn new() -> Self {
        Self::with_ttl(EXERCISE_TTL)
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    pub fn put(&self, id: Uuid, exam_type: ExamType, exercises: ExerciseResponse) {
        let entry = CachedExercise {
            id,
            exam_type,
            exercises,
            created_at: Utc::now(),
            stored_at: Instant::now(),
        };
        self.entries.lock().insert(id, entry);
        debug!("Stored exercise set {id} ({exam_type})");
    }

    /// Look up an exercise set. Returns `None` for unknown ids and for
    /// entries past their TTL; an expired entry is deleted on this read.
    pub fn get(&self, id: Uuid) -> Option<CachedExercise> {
        self.get_at(id, Instant::now())
    }

    fn get_at(&self, id: Uuid, now: Instant) -> Option<CachedExercise> {
        let mut entries = self.entries.lock();
        match entries.get(&id) {
            Some(entry) if now.duration_since(entry.stored_at) > self.ttl => {
                entries.remove(&id);
                debug!("Exercise set {id} expired on read");
                None
            }
            Some(entry) => Some(entry.clone()),
            None => None,
        }
    }

    /// Remove every expired entry, returning how many were removed.
    pub fn sweep(&self) -> usize {
        self.sweep_at(Instant::now())
    }

    fn sweep_at(&self, now: Instant) -> usize {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, entry| now.duration_since(entry.stored_at) <= self.ttl);
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

/// Spawn the hourly cleanup task for a shared store.
pub fn spawn_sweeper(store: Arc<ExerciseStore>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SWEEP_INTERVAL);
        // The first tick fires immediately; skip it so a fresh store is not
        // swept right after startup.
        interval.tick().await;
        loop {
            interval.tick().await;
            let removed = store.sweep();
            if removed > 0 {
                info!("Cleaned up {removed} expired exercise set(s)");
            }
        }
    })
}
