use std::sync::{Arc, PoisonError, RwLock};

use anyhow::anyhow;
use cedict_db::IndexSource;
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::snapshot::{DictionarySnapshot, DictionarySources};

/// Lifecycle of the dictionary behind the service.
#[derive(Clone)]
pub enum EngineState {
    /// No dictionary; nothing is loading.
    Disabled,
    Loading,
    Ready(Arc<DictionarySnapshot>),
    /// The last load failed; queries miss until a reload succeeds.
    Unavailable(String),
}

impl EngineState {
    fn name(&self) -> &'static str {
        match self {
            EngineState::Disabled => "disabled",
            EngineState::Loading => "loading",
            EngineState::Ready(_) => "ready",
            EngineState::Unavailable(_) => "unavailable",
        }
    }
}

struct Slot {
    generation: u64,
    state: EngineState,
    /// A load is in flight while `state` keeps serving the previous snapshot.
    reloading: bool,
}

/// Holds the current snapshot and discards loads that were superseded.
///
/// Every load or disable bumps the generation; a finishing load installs its
/// result only if its generation is still current. A ready snapshot keeps
/// answering queries until its replacement is installed.
pub struct SnapshotStore {
    slot: RwLock<Slot>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EngineStatus {
    pub state: &'static str,
    pub reloading: bool,
    pub entries: usize,
    pub headwords: usize,
    pub index_source: Option<&'static str>,
    pub skipped_lines: usize,
    pub skipped_index_lines: usize,
    pub toneless_syllables: usize,
    pub grammar_keywords: usize,
    pub error: Option<String>,
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self {
            slot: RwLock::new(Slot {
                generation: 0,
                state: EngineState::Disabled,
                reloading: false,
            }),
        }
    }

    /// Store that starts out ready with an already built snapshot.
    pub fn with_snapshot(snapshot: DictionarySnapshot) -> Self {
        let store = Self::new();
        let generation = store.begin_load();
        store.finish_load(generation, Ok(snapshot));
        store
    }

    pub fn state(&self) -> EngineState {
        self.read_slot().state.clone()
    }

    /// The ready snapshot, if any.
    pub fn snapshot(&self) -> Option<Arc<DictionarySnapshot>> {
        match &self.read_slot().state {
            EngineState::Ready(snapshot) => Some(Arc::clone(snapshot)),
            _ => None,
        }
    }

    /// Mark a load as started and return its generation.
    ///
    /// A ready snapshot stays installed until the load finishes; otherwise
    /// the state becomes `Loading`.
    pub fn begin_load(&self) -> u64 {
        Self::advance(&mut self.write_slot())
    }

    fn advance(slot: &mut Slot) -> u64 {
        slot.generation += 1;
        if matches!(slot.state, EngineState::Ready(_)) {
            slot.reloading = true;
        } else {
            slot.state = EngineState::Loading;
        }
        slot.generation
    }

    /// Install a finished load unless a newer load or a disable superseded it.
    pub fn finish_load(&self, generation: u64, result: anyhow::Result<DictionarySnapshot>) -> bool {
        let mut slot = self.write_slot();
        if slot.generation != generation {
            debug!(
                "dropping stale dictionary load {generation} (current {})",
                slot.generation
            );
            return false;
        }
        slot.reloading = false;
        slot.state = match result {
            Ok(snapshot) => EngineState::Ready(Arc::new(snapshot)),
            Err(err) => {
                warn!("dictionary unavailable: {err:#}");
                EngineState::Unavailable(format!("{err:#}"))
            }
        };
        true
    }

    /// Drop the snapshot and invalidate any load in flight.
    pub fn disable(&self) {
        let mut slot = self.write_slot();
        slot.generation += 1;
        slot.state = EngineState::Disabled;
        slot.reloading = false;
        info!("dictionary disabled");
    }

    /// Load `sources` on the blocking pool and install the result when done.
    pub fn spawn_load(self: &Arc<Self>, sources: DictionarySources) -> JoinHandle<bool> {
        let generation = self.begin_load();
        self.load_in_background(generation, sources)
    }

    /// Start a load only when no dictionary is ready or loading.
    pub fn enable(self: &Arc<Self>, sources: DictionarySources) -> Option<JoinHandle<bool>> {
        let generation = {
            let mut slot = self.write_slot();
            if matches!(slot.state, EngineState::Ready(_) | EngineState::Loading) {
                return None;
            }
            Self::advance(&mut slot)
        };
        Some(self.load_in_background(generation, sources))
    }

    fn load_in_background(
        self: &Arc<Self>,
        generation: u64,
        sources: DictionarySources,
    ) -> JoinHandle<bool> {
        info!(
            "loading dictionary {} (generation {generation})",
            sources.lexicon.display()
        );
        let store = Arc::clone(self);
        tokio::spawn(async move {
            let result = tokio::task::spawn_blocking(move || DictionarySnapshot::load(&sources))
                .await
                .unwrap_or_else(|err| Err(anyhow!("dictionary load task failed: {err}")));
            store.finish_load(generation, result)
        })
    }

    pub fn status(&self) -> EngineStatus {
        let slot = self.read_slot();
        let mut status = EngineStatus {
            state: slot.state.name(),
            reloading: slot.reloading,
            entries: 0,
            headwords: 0,
            index_source: None,
            skipped_lines: 0,
            skipped_index_lines: 0,
            toneless_syllables: 0,
            grammar_keywords: 0,
            error: None,
        };
        match &slot.state {
            EngineState::Ready(snapshot) => {
                let db = snapshot.db();
                let stats = db.stats();
                status.entries = stats.entries;
                status.headwords = db.headword_count();
                status.index_source = Some(match db.index_source() {
                    IndexSource::Prebuilt => "prebuilt",
                    IndexSource::Derived => "derived",
                });
                status.skipped_lines = stats.skipped_lines;
                status.skipped_index_lines = stats.skipped_index_lines;
                status.toneless_syllables = stats.toneless_syllables;
                status.grammar_keywords = snapshot.keywords().len();
            }
            EngineState::Unavailable(err) => status.error = Some(err.clone()),
            EngineState::Disabled | EngineState::Loading => {}
        }
        status
    }

    fn read_slot(&self) -> std::sync::RwLockReadGuard<'_, Slot> {
        self.slot.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_slot(&self) -> std::sync::RwLockWriteGuard<'_, Slot> {
        self.slot.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cedict_db::CedictDb;
    use cedict_segment::GrammarKeywords;

    fn snapshot(line: &str) -> DictionarySnapshot {
        let db = CedictDb::from_text(line, None).unwrap();
        DictionarySnapshot::new(db, GrammarKeywords::new())
    }

    #[test]
    fn installs_current_load() {
        let store = SnapshotStore::new();
        assert!(store.snapshot().is_none());
        let generation = store.begin_load();
        assert!(matches!(store.state(), EngineState::Loading));
        assert!(store.finish_load(generation, Ok(snapshot("你 你 [ni3] /you/\n"))));
        assert!(store.snapshot().is_some());
        assert_eq!(store.status().state, "ready");
        assert_eq!(store.status().entries, 1);
    }

    #[test]
    fn latest_load_wins() {
        let store = SnapshotStore::new();
        let first = store.begin_load();
        let second = store.begin_load();

        assert!(store.finish_load(second, Ok(snapshot("好 好 [hao3] /good/\n"))));
        assert!(!store.finish_load(first, Ok(snapshot("你 你 [ni3] /you/\n"))));

        let snap = store.snapshot().expect("second load installed");
        assert!(snap.db().headword_exists("好"));
        assert!(!snap.db().headword_exists("你"));
    }

    #[test]
    fn reload_keeps_serving_the_ready_snapshot() {
        let store = SnapshotStore::with_snapshot(snapshot("你 你 [ni3] /you/\n"));
        let generation = store.begin_load();
        assert!(matches!(store.state(), EngineState::Ready(_)));
        assert!(store.status().reloading);
        assert!(store.snapshot().is_some_and(|s| s.db().headword_exists("你")));

        assert!(store.finish_load(generation, Ok(snapshot("好 好 [hao3] /good/\n"))));
        assert!(!store.status().reloading);
        assert!(store.snapshot().is_some_and(|s| s.db().headword_exists("好")));
    }

    #[tokio::test]
    async fn enable_is_a_no_op_when_ready_or_loading() {
        let store = Arc::new(SnapshotStore::with_snapshot(snapshot("你 你 [ni3] /you/\n")));
        let sources = DictionarySources::in_dir("/nonexistent");
        assert!(store.enable(sources.clone()).is_none());
        assert!(!store.status().reloading);

        store.disable();
        store.begin_load();
        assert!(store.enable(sources).is_none());
    }

    #[tokio::test]
    async fn enable_loads_when_disabled() {
        let store = Arc::new(SnapshotStore::new());
        let handle = store
            .enable(DictionarySources::in_dir("/nonexistent"))
            .expect("load started");
        assert!(matches!(store.state(), EngineState::Loading));
        assert!(handle.await.unwrap());
        assert_eq!(store.status().state, "unavailable");
    }

    #[test]
    fn disable_discards_in_flight_load() {
        let store = SnapshotStore::new();
        let generation = store.begin_load();
        store.disable();
        assert!(!store.finish_load(generation, Ok(snapshot("你 你 [ni3] /you/\n"))));
        assert!(matches!(store.state(), EngineState::Disabled));
        assert!(store.snapshot().is_none());
    }

    #[test]
    fn failed_load_reports_unavailable() {
        let store = SnapshotStore::new();
        let generation = store.begin_load();
        assert!(store.finish_load(generation, Err(anyhow!("missing lexicon file"))));
        let status = store.status();
        assert_eq!(status.state, "unavailable");
        assert!(status.error.unwrap().contains("missing lexicon"));
    }
}
