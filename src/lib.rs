use spacetimedb::{reducer, table, Identity, ReducerContext, Table, Timestamp};

pub mod cards;
pub mod daily;
pub mod day;
pub mod generator;
pub mod progress;
pub mod puzzle_store;
pub mod store;

// Import bulk restore reducers for disaster recovery
mod restore;

use daily::{get_entitlement, guess_daily, open_daily};
use day::day_key_for;
use store::progress_key;

// ==================== CONSTANTS ====================

/// Hours after UTC midnight that a new puzzle day begins (0 = UTC date)
pub const PUZZLE_DAY_OFFSET_HOURS: i64 = 0;

/// Device ids are opaque client strings; cap them so rows stay small
pub const MAX_DEVICE_ID_LEN: usize = 128;

/// Target range for valid sets on a daily board
pub const MIN_SETS: usize = 6;
pub const MAX_SETS: usize = 12;

/// Board sizes tried in order
pub const BOARD_SIZES: [usize; 3] = [12, 15, 18];

/// Shuffles per board size before giving up on the target range
pub const MAX_ATTEMPTS_PER_SIZE: u32 = 2000;

/// Shuffles per board size in the closest-to-range fallback
pub const FALLBACK_ATTEMPTS_PER_SIZE: u32 = 300;

/// Baseline board size for the fallback search
pub const FALLBACK_BOARD_SIZE: usize = 12;

// ==================== TABLES ====================

/// One board per puzzle day, immutable once created
#[table(name = daily_puzzle, public)]
#[derive(Clone, Debug)]
pub struct DailyPuzzle {
    /// "YYYY-MM-DD"; uniqueness here is what serializes first-request creation
    #[primary_key]
    pub day_key: String,

    /// RNG seed input (always the day key)
    pub seed: String,

    /// Ordered card codes, 12/15/18 cards
    pub board: Vec<String>,

    /// Exact number of valid sets on `board`; the completion denominator
    pub total_sets: u32,

    pub created_at: Timestamp,
}

/// Devices seen so far. Created lazily, never deleted
#[table(name = device)]
#[derive(Clone, Debug)]
pub struct Device {
    #[primary_key]
    pub device_id: String,

    pub first_seen: Timestamp,
}

/// Per-device, per-day discovery state
///
/// Public so clients can subscribe with `WHERE device_id = '...'`. Every
/// subscriber can read every row, and a device id is all a caller needs to
/// guess as that device: device ids are unauthenticated bearer tokens.
#[table(name = daily_progress, public)]
#[derive(Clone, Debug, PartialEq)]
pub struct DailyProgress {
    /// See store::progress_key
    #[primary_key]
    pub progress_key: String,

    #[index(btree)]
    pub device_id: String,

    #[index(btree)]
    pub day_key: String,

    /// Set signatures in discovery order
    pub found_sets: Vec<String>,

    /// Wrong on-board guesses (monotonic)
    pub mistakes: u32,

    pub started_at: Timestamp,

    /// Set once when found_sets reaches total_sets; the row is frozen after
    pub completed_at: Option<Timestamp>,

    /// Bumped on every write; updates compare-and-swap on it
    pub revision: u64,
}

/// Paid status per device. Read-only from the game's point of view
#[table(name = entitlement)]
#[derive(Clone, Debug, PartialEq)]
pub struct Entitlement {
    #[primary_key]
    pub device_id: String,

    pub is_paid: bool,

    pub plan: Option<String>,

    pub expires_at: Option<String>,
}

/// Latest guess outcome per (device, day)
/// Reducers can't return values, so clients subscribe to this
/// (filtered by device_id; same visibility caveat as daily_progress)
#[table(name = last_guess, public)]
#[derive(Clone, Debug)]
pub struct LastGuess {
    #[primary_key]
    pub progress_key: String,

    #[index(btree)]
    pub device_id: String,

    pub day_key: String,

    pub cards: Vec<String>,

    pub is_set: bool,

    pub already_found: bool,

    pub found_count: u32,

    pub total_sets: u32,

    pub completed: bool,

    pub submitted_at: Timestamp,
}

/// Authorized identities that can call admin reducers
#[table(name = authorized_worker)]
pub struct AuthorizedWorker {
    #[primary_key]
    pub identity: Identity,
}

// ==================== HELPER FUNCTIONS ====================

fn validate_device_id(device_id: &str) -> Result<(), String> {
    if device_id.is_empty() {
        return Err("Missing device id".to_string());
    }
    if device_id.len() > MAX_DEVICE_ID_LEN {
        return Err(format!("Device id longer than {} bytes", MAX_DEVICE_ID_LEN));
    }
    Ok(())
}

fn is_authorized(ctx: &ReducerContext) -> bool {
    ctx.db.authorized_worker().identity().find(&ctx.sender).is_some()
}

// ==================== REDUCERS ====================

/// Initialize module
#[reducer(init)]
pub fn init(ctx: &ReducerContext) {
    // In init, ctx.sender is the module owner identity
    if !is_authorized(ctx) {
        ctx.db.authorized_worker().insert(AuthorizedWorker {
            identity: ctx.sender,
        });
    }

    log::info!("Daily SET module initialized (day key {})", day_key_for(ctx.timestamp));
}

/// Make sure today's board and this device's progress exist.
/// Clients then read daily_puzzle / daily_progress through their subscription.
#[reducer]
pub fn open_daily_puzzle(ctx: &ReducerContext, device_id: String) -> Result<(), String> {
    validate_device_id(&device_id)?;

    let day_key = day_key_for(ctx.timestamp);
    let summary = open_daily(&ctx.db, &device_id, &day_key, ctx.timestamp);

    log::info!(
        "[DAILY] {} opened {} found:{}/{} mistakes:{} completed:{}",
        device_id,
        day_key,
        summary.progress.found_count,
        summary.total_sets,
        summary.progress.mistakes,
        summary.progress.completed
    );
    log::debug!("[DAILY] summary {}", summary.to_json());
    Ok(())
}

/// Adjudicate a guess of exactly three card codes against today's board
#[reducer]
pub fn submit_guess(ctx: &ReducerContext, device_id: String, cards: Vec<String>) -> Result<(), String> {
    validate_device_id(&device_id)?;

    let cards: [String; 3] = cards
        .try_into()
        .map_err(|c: Vec<String>| format!("Expected 3 cards, got {}", c.len()))?;

    let day_key = day_key_for(ctx.timestamp);
    let outcome = guess_daily(&ctx.db, &device_id, &day_key, &cards, ctx.timestamp);

    let row = LastGuess {
        progress_key: progress_key(&device_id, &day_key),
        device_id,
        day_key,
        cards: cards.to_vec(),
        is_set: outcome.is_set,
        already_found: outcome.already_found,
        found_count: outcome.found_count,
        total_sets: outcome.total_sets,
        completed: outcome.completed,
        submitted_at: ctx.timestamp,
    };

    if ctx.db.last_guess().progress_key().find(&row.progress_key).is_some() {
        ctx.db.last_guess().progress_key().update(row);
    } else {
        ctx.db.last_guess().insert(row);
    }
    Ok(())
}

/// Write a device's entitlement (billing happens elsewhere; this only records it)
/// Protected by authorization check - only authorized workers can call this
#[reducer]
pub fn grant_entitlement(
    ctx: &ReducerContext,
    device_id: String,
    is_paid: bool,
    plan: Option<String>,
    expires_at: Option<String>,
) -> Result<(), String> {
    if !is_authorized(ctx) {
        log::warn!("Unauthorized grant_entitlement attempt by {}", ctx.sender);
        return Err("Unauthorized".to_string());
    }
    validate_device_id(&device_id)?;

    let previous = get_entitlement(&ctx.db, &device_id);
    let row = Entitlement {
        device_id: device_id.clone(),
        is_paid,
        plan,
        expires_at,
    };

    if ctx.db.entitlement().device_id().find(&device_id).is_some() {
        ctx.db.entitlement().device_id().update(row);
    } else {
        ctx.db.entitlement().insert(row);
    }

    log::info!(
        "[ENTITLEMENT] {} paid:{} → {}",
        device_id,
        previous.is_paid,
        is_paid
    );
    Ok(())
}
