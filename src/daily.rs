// "Today's puzzle" and "guess" flows composed from the core pieces.

use serde_json::{json, Value};
use spacetimedb::Timestamp;

use crate::cards::{describe_set, signature_cards};
use crate::progress::{ensure_device, get_or_create_progress, record_guess, GuessOutcome};
use crate::puzzle_store::get_or_create_daily_puzzle;
use crate::store::DailyStore;
use crate::{DailyProgress, Entitlement};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProgressSummary {
    pub found_count: u32,
    pub mistakes: u32,
    pub completed: bool,
}

/// A found set as the client lists it
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FoundSet {
    pub signature: String,
    pub cards: Vec<String>,
    pub label: String,
}

#[derive(Clone, Debug)]
pub struct DailySummary {
    pub day_key: String,
    pub board: Vec<String>,
    pub total_sets: u32,
    pub progress: ProgressSummary,
    pub found_sets: Vec<FoundSet>,
    pub entitlement: Entitlement,
}

impl DailySummary {
    /// Wire shape (snake_case keys)
    pub fn to_json(&self) -> Value {
        let found_sets: Vec<Value> = self
            .found_sets
            .iter()
            .map(|f| json!({"id": f.signature, "cards": f.cards, "type_label": f.label}))
            .collect();

        json!({
            "date": self.day_key,
            "board": self.board,
            "total_sets": self.total_sets,
            "progress": {
                "found_count": self.progress.found_count,
                "mistakes": self.progress.mistakes,
                "completed": self.progress.completed,
            },
            "found_sets": found_sets,
            "entitlement": {
                "is_paid": self.entitlement.is_paid,
                "plan": self.entitlement.plan,
                "expires_at": self.entitlement.expires_at,
            },
        })
    }
}

/// Entitlement for a device, or the free default
pub fn get_entitlement(store: &dyn DailyStore, device_id: &str) -> Entitlement {
    store.find_entitlement(device_id).unwrap_or_else(|| Entitlement {
        device_id: device_id.to_string(),
        is_paid: false,
        plan: None,
        expires_at: None,
    })
}

fn found_sets(progress: &DailyProgress) -> Vec<FoundSet> {
    progress
        .found_sets
        .iter()
        .map(|signature| {
            let cards = signature_cards(signature);
            FoundSet {
                signature: signature.clone(),
                label: describe_set(&cards),
                cards,
            }
        })
        .collect()
}

/// Resolve (or create) everything a device needs to play a day
pub fn open_daily(
    store: &dyn DailyStore,
    device_id: &str,
    day_key: &str,
    now: Timestamp,
) -> DailySummary {
    ensure_device(store, device_id, now);

    let (board, total_sets) = get_or_create_daily_puzzle(store, day_key, now);
    let progress = get_or_create_progress(store, device_id, day_key, now);
    let entitlement = get_entitlement(store, device_id);

    DailySummary {
        day_key: day_key.to_string(),
        board,
        total_sets,
        progress: ProgressSummary {
            found_count: progress.found_sets.len() as u32,
            mistakes: progress.mistakes,
            completed: progress.completed_at.is_some(),
        },
        found_sets: found_sets(&progress),
        entitlement,
    }
}

/// Adjudicate a guess against a day's board
pub fn guess_daily(
    store: &dyn DailyStore,
    device_id: &str,
    day_key: &str,
    cards: &[String; 3],
    now: Timestamp,
) -> GuessOutcome {
    ensure_device(store, device_id, now);

    let (board, total_sets) = get_or_create_daily_puzzle(store, day_key, now);
    get_or_create_progress(store, device_id, day_key, now);

    record_guess(store, device_id, day_key, &board, total_sets, cards, now)
}
