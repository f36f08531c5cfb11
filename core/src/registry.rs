//! Run Registry (C1): a process-local set of runs this instance currently
//! owns, plus a shared record keyed by `(instance_id, run_id)` that external
//! observers (shutdown hooks, the distributed stop broadcast) can enumerate.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use dashmap::DashMap;

/// The shared, externally-visible record for one live run.
#[derive(Clone, Debug)]
pub struct ActiveRunRecord {
    pub instance_id: String,
    pub run_id: String,
    pub thread_id: String,
    pub registered_at: DateTime<Utc>,
    pub ttl_seconds: u64,
}

impl ActiveRunRecord {
    pub fn key(instance_id: &str, run_id: &str) -> String {
        format!("active_run:{instance_id}:{run_id}")
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        (now - self.registered_at).num_seconds() as u64 > self.ttl_seconds
    }
}

/// Process-local live-run set plus the shared keyed record.
#[derive(Clone, Default)]
pub struct RunRegistry {
    local: Arc<Mutex<HashSet<String>>>,
    shared: Arc<DashMap<String, ActiveRunRecord>>,
}

impl RunRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, instance_id: &str, run_id: &str, thread_id: &str, ttl_seconds: u64) {
        self.local.lock().unwrap().insert(run_id.to_string());
        self.shared.insert(
            ActiveRunRecord::key(instance_id, run_id),
            ActiveRunRecord {
                instance_id: instance_id.to_string(),
                run_id: run_id.to_string(),
                thread_id: thread_id.to_string(),
                registered_at: Utc::now(),
                ttl_seconds,
            },
        );
    }

    pub fn deregister(&self, instance_id: &str, run_id: &str) {
        self.local.lock().unwrap().remove(run_id);
        self.shared.remove(&ActiveRunRecord::key(instance_id, run_id));
    }

    pub fn is_live_locally(&self, run_id: &str) -> bool {
        self.local.lock().unwrap().contains(run_id)
    }

    /// Runs this instance currently owns, for shutdown enumeration.
    pub fn local_runs(&self) -> Vec<String> {
        self.local.lock().unwrap().iter().cloned().collect()
    }

    /// All live (non-expired) shared records, for the cross-instance stop broadcast.
    pub fn live_shared_records(&self) -> Vec<ActiveRunRecord> {
        let now = Utc::now();
        self.shared.iter().filter(|entry| !entry.is_expired(now)).map(|entry| entry.value().clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_then_local_runs_contains_it() {
        let registry = RunRegistry::new();
        registry.register("instance-a", "run-1", "thread-1", 300);
        assert!(registry.is_live_locally("run-1"));
        assert_eq!(registry.local_runs(), vec!["run-1".to_string()]);
    }

    #[test]
    fn deregister_removes_both_local_and_shared() {
        let registry = RunRegistry::new();
        registry.register("instance-a", "run-1", "thread-1", 300);
        registry.deregister("instance-a", "run-1");
        assert!(!registry.is_live_locally("run-1"));
        assert!(registry.live_shared_records().is_empty());
    }

    #[test]
    fn key_format_matches_instance_and_run() {
        assert_eq!(ActiveRunRecord::key("instance-a", "run-1"), "active_run:instance-a:run-1");
    }

    #[test]
    fn expired_record_excluded_from_live_list() {
        let registry = RunRegistry::new();
        registry.register("instance-a", "run-1", "thread-1", 300);
        {
            let key = ActiveRunRecord::key("instance-a", "run-1");
            let mut record = registry.shared.get_mut(&key).unwrap();
            record.registered_at = Utc::now() - chrono::Duration::seconds(3600);
        }
        assert!(registry.live_shared_records().is_empty());
    }
}
