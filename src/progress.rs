// Per-(device, day) progress and guess adjudication.
//
// NEW (no row) -> IN_PROGRESS (row, completed_at = None) -> COMPLETE (completed_at set).
// A COMPLETE row is frozen: found_sets and mistakes never change again.

use spacetimedb::Timestamp;

use crate::cards::{is_set, set_signature};
use crate::store::{progress_key, DailyStore, InsertOutcome};
use crate::{DailyProgress, Device};

/// Result of adjudicating one guess
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GuessOutcome {
    pub is_set: bool,
    pub already_found: bool,
    pub found_count: u32,
    pub total_sets: u32,
    pub completed: bool,
}

/// Record a device's first contact; no-op if already known
pub fn ensure_device(store: &dyn DailyStore, device_id: &str, now: Timestamp) {
    if store.find_device(device_id).is_some() {
        return;
    }
    let device = Device {
        device_id: device_id.to_string(),
        first_seen: now,
    };
    if store.try_insert_device(device) == InsertOutcome::Inserted {
        log::info!("[DEVICE] first seen {}", device_id);
    }
}

/// Existing progress for (device, day), or a fresh empty record
pub fn get_or_create_progress(
    store: &dyn DailyStore,
    device_id: &str,
    day_key: &str,
    now: Timestamp,
) -> DailyProgress {
    let key = progress_key(device_id, day_key);
    if let Some(existing) = store.find_progress(&key) {
        return existing;
    }

    let fresh = DailyProgress {
        progress_key: key.clone(),
        device_id: device_id.to_string(),
        day_key: day_key.to_string(),
        found_sets: Vec::new(),
        mistakes: 0,
        started_at: now,
        completed_at: None,
        revision: 0,
    };

    match store.try_insert_progress(fresh.clone()) {
        InsertOutcome::Inserted => {
            log::debug!("[PROGRESS] started {} on {}", device_id, day_key);
            fresh
        }
        // A concurrent request created it first
        InsertOutcome::AlreadyExists => store.find_progress(&key).unwrap_or(fresh),
    }
}

/// Guesses must be three distinct cards that are all on the board
fn is_well_formed_guess(board: &[String], cards: &[String; 3]) -> bool {
    let distinct = cards[0] != cards[1] && cards[1] != cards[2] && cards[0] != cards[2];
    distinct && cards.iter().all(|c| board.contains(c))
}

/// Pure adjudication of an on-board guess against a progress snapshot.
/// Returns the outcome and, if state changes, the row to persist.
fn adjudicate(
    progress: &DailyProgress,
    total_sets: u32,
    cards: &[String; 3],
    now: Timestamp,
) -> (GuessOutcome, Option<DailyProgress>) {
    let found_count = progress.found_sets.len() as u32;

    if progress.completed_at.is_some() {
        let outcome = GuessOutcome {
            is_set: false,
            already_found: false,
            found_count,
            total_sets,
            completed: true,
        };
        return (outcome, None);
    }

    if !is_set(&cards[0], &cards[1], &cards[2]) {
        let mut next = progress.clone();
        next.mistakes = next.mistakes.saturating_add(1);
        next.revision += 1;
        let outcome = GuessOutcome {
            is_set: false,
            already_found: false,
            found_count,
            total_sets,
            completed: false,
        };
        return (outcome, Some(next));
    }

    let signature = set_signature(cards);
    if progress.found_sets.contains(&signature) {
        let outcome = GuessOutcome {
            is_set: true,
            already_found: true,
            found_count,
            total_sets,
            completed: false,
        };
        return (outcome, None);
    }

    let mut next = progress.clone();
    next.found_sets.push(signature);
    let found_count = next.found_sets.len() as u32;
    let completed = found_count >= total_sets;
    if completed {
        next.completed_at = Some(now);
    }
    next.revision += 1;

    let outcome = GuessOutcome {
        is_set: true,
        already_found: false,
        found_count,
        total_sets,
        completed,
    };
    (outcome, Some(next))
}

/// Adjudicate a guess and persist any state change.
///
/// Off-board (or repeated-card) guesses never touch the store. Everything else is a
/// read-modify-write guarded by a revision compare-and-swap; a failed swap means
/// another guess for the same (device, day) committed first, so we re-read and
/// adjudicate again. Each retry implies someone else made progress.
pub fn record_guess(
    store: &dyn DailyStore,
    device_id: &str,
    day_key: &str,
    board: &[String],
    total_sets: u32,
    cards: &[String; 3],
    now: Timestamp,
) -> GuessOutcome {
    if !is_well_formed_guess(board, cards) {
        log::warn!("[GUESS] {} off-board guess on {}: {:?}", device_id, day_key, cards);
        return GuessOutcome {
            is_set: false,
            already_found: false,
            found_count: 0,
            total_sets,
            completed: false,
        };
    }

    loop {
        let progress = get_or_create_progress(store, device_id, day_key, now);
        let (outcome, update) = adjudicate(&progress, total_sets, cards, now);

        let next = match update {
            Some(next) => next,
            None => {
                log::debug!(
                    "[GUESS] {} no change on {} (already_found:{} completed:{})",
                    device_id, day_key, outcome.already_found, outcome.completed
                );
                return outcome;
            }
        };

        let mistakes = next.mistakes;
        if !store.swap_progress(progress.revision, next) {
            log::warn!("[GUESS] {} concurrent update on {}, retrying", device_id, day_key);
            continue;
        }

        if !outcome.is_set {
            log::info!("[GUESS] {} miss on {} mistakes:{}", device_id, day_key, mistakes);
        } else if outcome.completed {
            log::info!(
                "[GUESS] {} completed {} with {}/{} sets",
                device_id, day_key, outcome.found_count, total_sets
            );
        } else {
            log::info!(
                "[GUESS] {} found set on {} ({}/{})",
                device_id, day_key, outcome.found_count, total_sets
            );
        }
        return outcome;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;

    const DAY: &str = "2025-01-01";
    const DEVICE: &str = "device-1";

    fn ts(micros: i64) -> Timestamp {
        Timestamp::from_micros_since_unix_epoch(micros)
    }

    fn cards(a: &str, b: &str, c: &str) -> [String; 3] {
        [a.to_string(), b.to_string(), c.to_string()]
    }

    /// Exactly one set on this board: 0000/1111/2222
    fn single_set_board() -> Vec<String> {
        ["0000", "1111", "2222", "0001", "0012"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    /// Several sets: the whole 00xx plane plus a few extras
    fn rich_board() -> Vec<String> {
        crate::cards::all_cards()
            .iter()
            .take(12)
            .map(|c| c.code())
            .collect()
    }

    fn progress(store: &MemoryStore) -> DailyProgress {
        store.find_progress(&progress_key(DEVICE, DAY)).unwrap()
    }

    #[test]
    fn test_single_set_board_fixture() {
        assert_eq!(crate::cards::count_sets_on_board(&single_set_board()).0, 1);
    }

    #[test]
    fn test_ensure_device_idempotent() {
        let store = MemoryStore::new();
        ensure_device(&store, DEVICE, ts(10));
        ensure_device(&store, DEVICE, ts(20));
        assert_eq!(store.device_count(), 1);
        assert_eq!(store.find_device(DEVICE).unwrap().first_seen, ts(10));
    }

    #[test]
    fn test_get_or_create_progress_idempotent() {
        let store = MemoryStore::new();
        let first = get_or_create_progress(&store, DEVICE, DAY, ts(10));
        assert!(first.found_sets.is_empty());
        assert_eq!(first.mistakes, 0);
        assert_eq!(first.started_at, ts(10));
        assert!(first.completed_at.is_none());

        let second = get_or_create_progress(&store, DEVICE, DAY, ts(20));
        assert_eq!(first, second);
    }

    #[test]
    fn test_get_or_create_progress_lost_race() {
        let store = MemoryStore::new();
        let mut rival = get_or_create_progress(&MemoryStore::new(), DEVICE, DAY, ts(5));
        rival.mistakes = 2;
        rival.revision = 2;
        store.race_next_progress_insert(rival.clone());

        let got = get_or_create_progress(&store, DEVICE, DAY, ts(10));
        assert_eq!(got, rival);
    }

    #[test]
    fn test_single_set_scenario() {
        let store = MemoryStore::new();
        let board = single_set_board();
        get_or_create_progress(&store, DEVICE, DAY, ts(1));

        // Find the only set: completes
        let outcome = record_guess(&store, DEVICE, DAY, &board, 1, &cards("2222", "0000", "1111"), ts(2));
        assert_eq!(
            outcome,
            GuessOutcome { is_set: true, already_found: false, found_count: 1, total_sets: 1, completed: true }
        );
        let after = progress(&store);
        assert_eq!(after.found_sets, vec!["0000|1111|2222"]);
        assert_eq!(after.completed_at, Some(ts(2)));

        // The record is now frozen; the completed lockout wins over already-found
        let again = record_guess(&store, DEVICE, DAY, &board, 1, &cards("0000", "1111", "2222"), ts(3));
        assert_eq!(
            again,
            GuessOutcome { is_set: false, already_found: false, found_count: 1, total_sets: 1, completed: true }
        );

        // An invalid on-board triple is inert too: no mistake
        let miss = record_guess(&store, DEVICE, DAY, &board, 1, &cards("0000", "0001", "0012"), ts(4));
        assert!(miss.completed);
        assert!(!miss.is_set);

        let frozen = progress(&store);
        assert_eq!(frozen.mistakes, 0);
        assert_eq!(frozen.completed_at, Some(ts(2)));
        assert_eq!(frozen.found_sets.len(), 1);
    }

    #[test]
    fn test_already_found_before_completion() {
        let store = MemoryStore::new();
        let board = rich_board();

        let first = record_guess(&store, DEVICE, DAY, &board, 13, &cards("0000", "0001", "0002"), ts(1));
        assert_eq!(
            first,
            GuessOutcome { is_set: true, already_found: false, found_count: 1, total_sets: 13, completed: false }
        );

        let repeat = record_guess(&store, DEVICE, DAY, &board, 13, &cards("0002", "0000", "0001"), ts(2));
        assert_eq!(
            repeat,
            GuessOutcome { is_set: true, already_found: true, found_count: 1, total_sets: 13, completed: false }
        );
        assert_eq!(progress(&store).found_sets.len(), 1);
    }

    #[test]
    fn test_discovery_order_preserved() {
        let store = MemoryStore::new();
        let board = rich_board();
        record_guess(&store, DEVICE, DAY, &board, 13, &cards("0100", "0101", "0102"), ts(1));
        record_guess(&store, DEVICE, DAY, &board, 13, &cards("0000", "0011", "0022"), ts(2));
        record_guess(&store, DEVICE, DAY, &board, 13, &cards("0000", "0001", "0002"), ts(3));

        assert_eq!(
            progress(&store).found_sets,
            vec!["0100|0101|0102", "0000|0011|0022", "0000|0001|0002"]
        );
    }

    #[test]
    fn test_mistake_accounting() {
        let store = MemoryStore::new();
        let board = rich_board();
        get_or_create_progress(&store, DEVICE, DAY, ts(1));

        for i in 0..3 {
            let outcome = record_guess(&store, DEVICE, DAY, &board, 13, &cards("0000", "0001", "0100"), ts(2 + i));
            assert_eq!(
                outcome,
                GuessOutcome { is_set: false, already_found: false, found_count: 0, total_sets: 13, completed: false }
            );
        }

        let after = progress(&store);
        assert_eq!(after.mistakes, 3);
        assert!(after.found_sets.is_empty());
    }

    #[test]
    fn test_miss_reports_current_found_count() {
        let store = MemoryStore::new();
        let board = rich_board();
        record_guess(&store, DEVICE, DAY, &board, 13, &cards("0000", "0001", "0002"), ts(1));
        let miss = record_guess(&store, DEVICE, DAY, &board, 13, &cards("0000", "0001", "0100"), ts(2));
        assert_eq!(miss.found_count, 1);
        assert!(!miss.is_set);
    }

    #[test]
    fn test_off_board_guess_is_inert() {
        let store = MemoryStore::new();
        let board = single_set_board();

        // No progress row yet: an off-board guess must not even create one
        let outcome = record_guess(&store, DEVICE, DAY, &board, 1, &cards("0000", "1111", "2221"), ts(1));
        assert_eq!(
            outcome,
            GuessOutcome { is_set: false, already_found: false, found_count: 0, total_sets: 1, completed: false }
        );
        assert!(store.find_progress(&progress_key(DEVICE, DAY)).is_none());

        // With progress, and after completion, still inert
        record_guess(&store, DEVICE, DAY, &board, 1, &cards("0000", "1111", "2222"), ts(2));
        let before = progress(&store);
        let outcome = record_guess(&store, DEVICE, DAY, &board, 1, &cards("0000", "1111", "2021"), ts(3));
        assert!(!outcome.completed);
        assert_eq!(outcome.found_count, 0);
        assert_eq!(progress(&store), before);
    }

    #[test]
    fn test_repeated_card_guess_is_inert() {
        let store = MemoryStore::new();
        let board = single_set_board();
        get_or_create_progress(&store, DEVICE, DAY, ts(1));

        // Same card three times satisfies the predicate but is not a triple
        let outcome = record_guess(&store, DEVICE, DAY, &board, 1, &cards("0000", "0000", "0000"), ts(2));
        assert!(!outcome.is_set);
        let after = progress(&store);
        assert!(after.found_sets.is_empty());
        assert_eq!(after.mistakes, 0);
    }

    #[test]
    fn test_guess_without_progress_creates_it() {
        let store = MemoryStore::new();
        let board = rich_board();
        let outcome = record_guess(&store, DEVICE, DAY, &board, 13, &cards("0000", "0001", "0100"), ts(7));
        assert!(!outcome.is_set);

        let created = progress(&store);
        assert_eq!(created.mistakes, 1);
        assert_eq!(created.started_at, ts(7));
    }

    #[test]
    fn test_completion_stamped_once() {
        let store = MemoryStore::new();
        let board = rich_board();
        record_guess(&store, DEVICE, DAY, &board, 2, &cards("0000", "0001", "0002"), ts(1));
        assert!(progress(&store).completed_at.is_none());

        let done = record_guess(&store, DEVICE, DAY, &board, 2, &cards("0010", "0011", "0012"), ts(2));
        assert!(done.completed);
        assert_eq!(progress(&store).completed_at, Some(ts(2)));

        // A third set would exist on the board, but the record is frozen
        let late = record_guess(&store, DEVICE, DAY, &board, 2, &cards("0020", "0021", "0022"), ts(3));
        assert_eq!(late.found_count, 2);
        assert!(late.completed);
        assert_eq!(progress(&store).completed_at, Some(ts(2)));
        assert_eq!(progress(&store).found_sets.len(), 2);
    }

    #[test]
    fn test_swap_conflict_readjudicates() {
        let store = MemoryStore::new();
        let board = rich_board();
        let start = get_or_create_progress(&store, DEVICE, DAY, ts(1));

        // A concurrent guess for the same set commits between our read and our swap
        let mut rival = start.clone();
        rival.found_sets.push("0000|0001|0002".to_string());
        rival.revision = 1;
        store.race_next_swap(rival);

        let outcome = record_guess(&store, DEVICE, DAY, &board, 13, &cards("0000", "0001", "0002"), ts(2));
        assert_eq!(
            outcome,
            GuessOutcome { is_set: true, already_found: true, found_count: 1, total_sets: 13, completed: false }
        );
        assert_eq!(progress(&store).found_sets, vec!["0000|0001|0002"]);
    }

    #[test]
    fn test_concurrent_duplicate_guesses_append_once() {
        let store = MemoryStore::new();
        let board = rich_board();
        get_or_create_progress(&store, DEVICE, DAY, ts(1));

        let outcomes: Vec<GuessOutcome> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|i| {
                    let store = &store;
                    let board = &board;
                    scope.spawn(move || {
                        record_guess(store, DEVICE, DAY, board, 13, &cards("0000", "0011", "0022"), ts(2 + i))
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let fresh = outcomes.iter().filter(|o| o.is_set && !o.already_found).count();
        let repeats = outcomes.iter().filter(|o| o.is_set && o.already_found).count();
        assert_eq!(fresh, 1);
        assert_eq!(repeats, 7);
        assert_eq!(progress(&store).found_sets, vec!["0000|0011|0022"]);
    }

    #[test]
    fn test_concurrent_misses_all_counted() {
        let store = MemoryStore::new();
        let board = rich_board();

        std::thread::scope(|scope| {
            for i in 0..6 {
                let store = &store;
                let board = &board;
                scope.spawn(move || {
                    record_guess(store, DEVICE, DAY, board, 13, &cards("0000", "0001", "0101"), ts(i))
                });
            }
        });

        assert_eq!(progress(&store).mistakes, 6);
    }
}
