// Persistence seam for the daily puzzle core.
//
// Core operations take a `&dyn DailyStore` instead of reaching for tables
// directly. The module's database handle implements it; tests use MemoryStore.

use spacetimedb::{Local, Table};

use crate::{daily_progress, daily_puzzle, device, entitlement};
use crate::{DailyProgress, DailyPuzzle, Device, Entitlement};

/// Result of an insert-if-absent
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// The key was taken (possibly by a concurrent creator); nothing was written
    AlreadyExists,
}

pub trait DailyStore {
    fn find_puzzle(&self, day_key: &str) -> Option<DailyPuzzle>;

    /// Insert unless a puzzle for this day key already exists
    fn try_insert_puzzle(&self, puzzle: DailyPuzzle) -> InsertOutcome;

    fn find_device(&self, device_id: &str) -> Option<Device>;

    fn try_insert_device(&self, device: Device) -> InsertOutcome;

    fn find_progress(&self, progress_key: &str) -> Option<DailyProgress>;

    fn try_insert_progress(&self, progress: DailyProgress) -> InsertOutcome;

    /// Replace the stored progress row only if its revision is still
    /// `expected_revision`. Returns false if another writer got there first.
    fn swap_progress(&self, expected_revision: u64, progress: DailyProgress) -> bool;

    fn find_entitlement(&self, device_id: &str) -> Option<Entitlement>;
}

/// Primary key of a (device, day) progress row.
/// Length-prefixed so no pair of ids can collide.
pub fn progress_key(device_id: &str, day_key: &str) -> String {
    format!("{}:{}:{}", day_key.len(), day_key, device_id)
}

// Reducers run as serializable transactions, so find + update below is atomic
// and a swap only fails if the row changed earlier in the same reducer.
impl DailyStore for Local {
    fn find_puzzle(&self, day_key: &str) -> Option<DailyPuzzle> {
        self.daily_puzzle().day_key().find(&day_key.to_string())
    }

    fn try_insert_puzzle(&self, puzzle: DailyPuzzle) -> InsertOutcome {
        match self.daily_puzzle().try_insert(puzzle) {
            Ok(_) => InsertOutcome::Inserted,
            Err(_) => InsertOutcome::AlreadyExists,
        }
    }

    fn find_device(&self, device_id: &str) -> Option<Device> {
        self.device().device_id().find(&device_id.to_string())
    }

    fn try_insert_device(&self, device: Device) -> InsertOutcome {
        match self.device().try_insert(device) {
            Ok(_) => InsertOutcome::Inserted,
            Err(_) => InsertOutcome::AlreadyExists,
        }
    }

    fn find_progress(&self, progress_key: &str) -> Option<DailyProgress> {
        self.daily_progress().progress_key().find(&progress_key.to_string())
    }

    fn try_insert_progress(&self, progress: DailyProgress) -> InsertOutcome {
        match self.daily_progress().try_insert(progress) {
            Ok(_) => InsertOutcome::Inserted,
            Err(_) => InsertOutcome::AlreadyExists,
        }
    }

    fn swap_progress(&self, expected_revision: u64, progress: DailyProgress) -> bool {
        match self.daily_progress().progress_key().find(&progress.progress_key) {
            Some(current) if current.revision == expected_revision => {
                self.daily_progress().progress_key().update(progress);
                true
            }
            _ => false,
        }
    }

    fn find_entitlement(&self, device_id: &str) -> Option<Entitlement> {
        self.entitlement().device_id().find(&device_id.to_string())
    }
}
