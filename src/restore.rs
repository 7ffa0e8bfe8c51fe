// Bulk restore reducers for disaster recovery
// Accept JSON arrays exported from admin panel (TypeScript SDK format)
// Existing rows always win: puzzles are immutable and live progress is newer than a backup

use spacetimedb::{reducer, ReducerContext, Timestamp};
use serde_json::Value;

use crate::cards::{count_sets_on_board, is_set, set_signature, signature_cards, Card};
use crate::day::is_valid_day_key;
use crate::{is_authorized, validate_device_id, BOARD_SIZES};
use crate::store::{progress_key, DailyStore, InsertOutcome};
use crate::{DailyProgress, DailyPuzzle, Device};

/// Parse Timestamp from SDK JSON format: {"__timestamp_micros_since_unix_epoch__": "123456"}
fn parse_timestamp_json(val: &Value) -> Result<Timestamp, String> {
    let micros_str = val.get("__timestamp_micros_since_unix_epoch__")
        .and_then(|v| v.as_str())
        .ok_or("Missing or invalid timestamp field")?;

    let micros: i64 = micros_str.parse()
        .map_err(|e| format!("Invalid timestamp micros: {}", e))?;

    Ok(Timestamp::from_micros_since_unix_epoch(micros))
}

fn parse_string_array(val: Option<&Value>, what: &str) -> Result<Vec<String>, String> {
    val.and_then(|v| v.as_array())
        .ok_or(format!("missing {}", what))?
        .iter()
        .map(|v| v.as_str().map(|s| s.to_string()).ok_or(format!("non-string in {}", what)))
        .collect()
}

fn parse_u32(val: Option<&Value>, what: &str) -> Result<u32, String> {
    let n = val.and_then(|v| v.as_u64()).ok_or(format!("missing {}", what))?;
    u32::try_from(n).map_err(|_| format!("{} out of range: {}", what, n))
}

/// A found-set signature must be three distinct card codes, sorted, forming a set
fn is_canonical_signature(signature: &str) -> bool {
    let cards = signature_cards(signature);
    match cards.as_slice() {
        [a, b, c] => a < b && b < c && is_set(a, b, c) && set_signature(cards.as_slice()) == signature,
        _ => false,
    }
}

/// Parse one daily_puzzle record. The board must be distinct, valid card codes of
/// a generator size, and totalSets must match the board's actual set count.
fn parse_puzzle_record(val: &Value) -> Result<DailyPuzzle, String> {
    let day_key = val.get("dayKey").and_then(|v| v.as_str()).ok_or("missing dayKey")?.to_string();
    if !is_valid_day_key(&day_key) {
        return Err(format!("invalid dayKey {}", day_key));
    }

    let board = parse_string_array(val.get("board"), "board")?;
    let mut seen = Vec::with_capacity(board.len());
    for code in &board {
        let card = Card::parse(code).ok_or(format!("invalid card {}", code))?;
        if seen.contains(&card) {
            return Err(format!("duplicate card {}", code));
        }
        seen.push(card);
    }
    if !BOARD_SIZES.contains(&board.len()) {
        return Err(format!("board has {} cards, expected one of {:?}", board.len(), BOARD_SIZES));
    }

    let total_sets = parse_u32(val.get("totalSets"), "totalSets")?;
    let (recount, _) = count_sets_on_board(&board);
    if recount != total_sets as usize {
        return Err(format!("totalSets {} but board has {} sets", total_sets, recount));
    }

    Ok(DailyPuzzle {
        seed: val.get("seed").and_then(|v| v.as_str()).unwrap_or(day_key.as_str()).to_string(),
        total_sets,
        created_at: parse_timestamp_json(val.get("createdAt").ok_or("missing createdAt")?)?,
        day_key,
        board,
    })
}

/// Parse one daily_progress record; the key is rebuilt from deviceId + dayKey
fn parse_progress_record(val: &Value) -> Result<DailyProgress, String> {
    let device_id = val.get("deviceId").and_then(|v| v.as_str()).ok_or("missing deviceId")?.to_string();
    validate_device_id(&device_id)?;
    let day_key = val.get("dayKey").and_then(|v| v.as_str()).ok_or("missing dayKey")?.to_string();
    if !is_valid_day_key(&day_key) {
        return Err(format!("invalid dayKey {}", day_key));
    }

    let found_sets = parse_string_array(val.get("foundSets"), "foundSets")?;
    for (i, signature) in found_sets.iter().enumerate() {
        if !is_canonical_signature(signature) {
            return Err(format!("invalid set signature {}", signature));
        }
        if found_sets[..i].contains(signature) {
            return Err(format!("duplicate set signature {}", signature));
        }
    }

    let completed_at = match val.get("completedAt") {
        None | Some(Value::Null) => None,
        Some(ts) => Some(parse_timestamp_json(ts)?),
    };

    Ok(DailyProgress {
        progress_key: progress_key(&device_id, &day_key),
        found_sets,
        mistakes: parse_u32(val.get("mistakes"), "mistakes")?,
        started_at: parse_timestamp_json(val.get("startedAt").ok_or("missing startedAt")?)?,
        completed_at,
        // Revisions are local to this database; restored rows start over
        revision: 0,
        device_id,
        day_key,
    })
}

fn parse_array(json_data: &str) -> Result<Vec<Value>, String> {
    let data: Value = serde_json::from_str(json_data)
        .map_err(|e| format!("Invalid JSON: {}", e))?;

    match data {
        Value::Array(items) => Ok(items),
        _ => Err("Expected JSON array".to_string()),
    }
}

/// Bulk restore daily_puzzle table from JSON array
/// Protected by authorization check - only authorized workers can call this
#[reducer]
pub fn bulk_restore_daily_puzzle(ctx: &ReducerContext, json_data: String) -> Result<(), String> {
    if !is_authorized(ctx) {
        log::warn!("Unauthorized bulk_restore_daily_puzzle attempt by {}", ctx.sender);
        return Err("Unauthorized".to_string());
    }

    let mut restored = 0;
    let mut skipped = 0;
    for (i, item) in parse_array(&json_data)?.iter().enumerate() {
        let puzzle = parse_puzzle_record(item).map_err(|e| format!("Puzzle {}: {}", i, e))?;

        match ctx.db.try_insert_puzzle(puzzle) {
            InsertOutcome::Inserted => restored += 1,
            InsertOutcome::AlreadyExists => skipped += 1,
        }
    }

    log::info!("[RESTORE] ✅ Restored {} daily_puzzle records ({} already present)", restored, skipped);
    Ok(())
}

/// Bulk restore daily_progress table from JSON array
/// Protected by authorization check - only authorized workers can call this
#[reducer]
pub fn bulk_restore_daily_progress(ctx: &ReducerContext, json_data: String) -> Result<(), String> {
    if !is_authorized(ctx) {
        log::warn!("Unauthorized bulk_restore_daily_progress attempt by {}", ctx.sender);
        return Err("Unauthorized".to_string());
    }

    let mut restored = 0;
    let mut skipped = 0;
    for (i, item) in parse_array(&json_data)?.iter().enumerate() {
        let progress = parse_progress_record(item).map_err(|e| format!("Progress {}: {}", i, e))?;

        // Progress implies the device was seen no later than it started
        let _ = ctx.db.try_insert_device(Device {
            device_id: progress.device_id.clone(),
            first_seen: progress.started_at,
        });

        match ctx.db.try_insert_progress(progress) {
            InsertOutcome::Inserted => restored += 1,
            InsertOutcome::AlreadyExists => skipped += 1,
        }
    }

    log::info!("[RESTORE] ✅ Restored {} daily_progress records ({} already present)", restored, skipped);
    Ok(())
}
