use spacetimedb::Timestamp;

use crate::generator::generate_daily_puzzle;
use crate::store::{DailyStore, InsertOutcome};
use crate::DailyPuzzle;

/// Board and set count for a day, generating and persisting it on first request.
///
/// The day key is a uniqueness constraint at the store: if a concurrent request
/// inserts first, ours is discarded and the winner's row is returned.
pub fn get_or_create_daily_puzzle(
    store: &dyn DailyStore,
    day_key: &str,
    now: Timestamp,
) -> (Vec<String>, u32) {
    if let Some(existing) = store.find_puzzle(day_key) {
        return (existing.board, existing.total_sets);
    }

    let generated = generate_daily_puzzle(day_key);
    let row = DailyPuzzle {
        day_key: generated.day_key,
        seed: generated.seed,
        board: generated.board,
        total_sets: generated.total_sets,
        created_at: now,
    };

    match store.try_insert_puzzle(row.clone()) {
        InsertOutcome::Inserted => {
            log::info!(
                "[PUZZLE] created {} cards:{} sets:{}",
                day_key,
                row.board.len(),
                row.total_sets
            );
            (row.board, row.total_sets)
        }
        InsertOutcome::AlreadyExists => match store.find_puzzle(day_key) {
            Some(winner) => {
                log::warn!("[PUZZLE] lost creation race for {}, using stored board", day_key);
                (winner.board, winner.total_sets)
            }
            None => {
                // Store broke its uniqueness contract. The board is a pure function
                // of the day key, so the next request regenerates the same one.
                log::error!("[PUZZLE] {} insert rejected but no row stored, serving unsaved board", day_key);
                (row.board, row.total_sets)
            }
        },
    }
}
