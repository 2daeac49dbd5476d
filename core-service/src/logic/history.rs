//! Session History
//!
//! `Session` is the explicit per-user context: created by the caller, passed
//! into every inference call, dropped at session end. Its `HistoryLedger` is
//! append-only and never persisted.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use uuid::Uuid;

use super::record::{HistoryEntry, InferenceRecord};

// ============================================================================
// LEDGER
// ============================================================================

#[derive(Debug, Default)]
pub struct HistoryLedger {
    records: Mutex<Vec<Arc<InferenceRecord>>>,
}

impl HistoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends are serialized; order is completion order
    pub fn append(&self, record: Arc<InferenceRecord>) -> usize {
        let mut records = self.records.lock();
        records.push(record);
        records.len()
    }

    /// Consistent copy of every fully appended record
    pub fn snapshot(&self) -> Vec<Arc<InferenceRecord>> {
        self.records.lock().clone()
    }

    pub fn get(&self, index: usize) -> Option<Arc<InferenceRecord>> {
        self.records.lock().get(index).cloned()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    pub fn entries(&self) -> Vec<HistoryEntry> {
        self.records.lock().iter().map(|r| HistoryEntry::from(r.as_ref())).collect()
    }
}

// ============================================================================
// SESSION
// ============================================================================

#[derive(Debug)]
pub struct Session {
    id: Uuid,
    started_at: DateTime<Utc>,
    ledger: HistoryLedger,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        let session = Self {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
            ledger: HistoryLedger::new(),
        };
        log::debug!("Session {} started", session.id);
        session
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn ledger(&self) -> &HistoryLedger {
        &self.ledger
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::model::{ConfidenceThresholds, Prediction, ProbabilityDistribution};

    fn record(name: &str) -> Arc<InferenceRecord> {
        let prediction = Prediction::from_distribution(ProbabilityDistribution::new([0.1, 0.1, 0.1, 0.1, 0.6]).unwrap());
        Arc::new(
            InferenceRecord::new(name, &prediction, &ConfidenceThresholds::default(), Utc::now().naive_local()).unwrap(),
        )
    }

    #[test]
    fn test_append_preserves_order() {
        let ledger = HistoryLedger::new();
        assert!(ledger.is_empty());

        for i in 0..5 {
            assert_eq!(ledger.append(record(&format!("img_{}.png", i))), i + 1);
        }

        let names: Vec<String> = ledger.snapshot().iter().map(|r| r.image_identifier().to_string()).collect();
        assert_eq!(names, vec!["img_0.png", "img_1.png", "img_2.png", "img_3.png", "img_4.png"]);
    }

    #[test]
    fn test_snapshot_is_detached() {
        let ledger = HistoryLedger::new();
        ledger.append(record("a.png"));
        let snapshot = ledger.snapshot();
        ledger.append(record("b.png"));
        assert_eq!(snapshot.len(), 1);
        assert_eq!(ledger.len(), 2);
    }

    #[test]
    fn test_get_by_position() {
        let ledger = HistoryLedger::new();
        let r = record("a.png");
        ledger.append(r.clone());
        assert_eq!(ledger.get(0).unwrap().id(), r.id());
        assert!(ledger.get(1).is_none());
    }

    #[test]
    fn test_concurrent_appends_are_all_kept() {
        let session = Arc::new(Session::new());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let session = session.clone();
                std::thread::spawn(move || {
                    for i in 0..25 {
                        session.ledger().append(record(&format!("t{}_{}.png", t, i)));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(session.ledger().len(), 200);
        // Per-writer order survives interleaving
        let snapshot = session.ledger().snapshot();
        for t in 0..8 {
            let prefix = format!("t{}_", t);
            let seq: Vec<usize> = snapshot
                .iter()
                .filter_map(|r| r.image_identifier().strip_prefix(prefix.as_str()))
                .map(|rest| rest.trim_end_matches(".png").parse().unwrap())
                .collect();
            assert_eq!(seq, (0..25).collect::<Vec<_>>());
        }
    }

    #[test]
    fn test_sessions_are_isolated() {
        let a = Session::new();
        let b = Session::new();
        a.ledger().append(record("a.png"));
        assert_ne!(a.id(), b.id());
        assert_eq!(a.ledger().len(), 1);
        assert!(b.ledger().is_empty());
    }
}
