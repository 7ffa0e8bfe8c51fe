// Deterministic daily board generator.
//
// The day key is the only seed input. The RNG and shuffle are pinned so any
// other implementation can reproduce a board bit-for-bit:
//   seed    = FNV-1a 64 over the day key's UTF-8 bytes
//   rng     = SplitMix64
//   draw    = (next_u64 as u128 * bound) >> 64
//   shuffle = Fisher-Yates from the last index down to 1, applied cumulatively
//             to one 81-card deck across all attempts
// Boards are persisted at first creation, so this only matters for
// regenerating a lost row or auditing one.

use crate::cards::{all_cards, count_sets, Card};
use crate::{
    BOARD_SIZES, FALLBACK_ATTEMPTS_PER_SIZE, FALLBACK_BOARD_SIZE, MAX_ATTEMPTS_PER_SIZE,
    MAX_SETS, MIN_SETS,
};

/// Search bounds for board generation
#[derive(Clone, Debug)]
pub struct GeneratorParams {
    pub min_sets: usize,
    pub max_sets: usize,
    pub board_sizes: Vec<usize>,
    pub max_attempts_per_size: u32,
    pub fallback_attempts_per_size: u32,
}

impl Default for GeneratorParams {
    fn default() -> Self {
        Self {
            min_sets: MIN_SETS,
            max_sets: MAX_SETS,
            board_sizes: BOARD_SIZES.to_vec(),
            max_attempts_per_size: MAX_ATTEMPTS_PER_SIZE,
            fallback_attempts_per_size: FALLBACK_ATTEMPTS_PER_SIZE,
        }
    }
}

impl GeneratorParams {
    /// How far a set count is from the target range (0 = inside)
    fn distance(&self, total: usize) -> usize {
        if total < self.min_sets {
            self.min_sets - total
        } else if total > self.max_sets {
            total - self.max_sets
        } else {
            0
        }
    }
}

/// A freshly generated board, not yet persisted
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GeneratedPuzzle {
    pub day_key: String,
    pub seed: String,
    pub board: Vec<String>,
    pub total_sets: u32,
}

/// SplitMix64 seeded from the day key
pub struct DayRng {
    state: u64,
}

impl DayRng {
    pub fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    pub fn from_day_key(day_key: &str) -> Self {
        Self::new(fnv1a_64(day_key.as_bytes()))
    }

    pub fn next_u64(&mut self) -> u64 {
        self.state = self.state.wrapping_add(0x9E37_79B9_7F4A_7C15);
        let mut z = self.state;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^ (z >> 31)
    }

    /// Uniform-ish value in 0..bound (multiply-shift, no rejection)
    pub fn below(&mut self, bound: usize) -> usize {
        ((self.next_u64() as u128 * bound as u128) >> 64) as usize
    }

    pub fn shuffle<T>(&mut self, items: &mut [T]) {
        for i in (1..items.len()).rev() {
            let j = self.below(i + 1);
            items.swap(i, j);
        }
    }
}

fn fnv1a_64(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for b in bytes {
        hash ^= *b as u64;
        hash = hash.wrapping_mul(0x0000_0100_0000_01B3);
    }
    hash
}

fn finish(day_key: &str, board: &[Card], total: usize) -> GeneratedPuzzle {
    GeneratedPuzzle {
        day_key: day_key.to_string(),
        seed: day_key.to_string(),
        board: board.iter().map(|c| c.code()).collect(),
        total_sets: total as u32,
    }
}

/// Generate the board for a day with default bounds
pub fn generate_daily_puzzle(day_key: &str) -> GeneratedPuzzle {
    generate_daily_puzzle_with(day_key, &GeneratorParams::default())
}

/// Generate a board whose set count lies in [min_sets, max_sets].
/// Never fails: if no candidate hits the range, returns the closest one found.
pub fn generate_daily_puzzle_with(day_key: &str, params: &GeneratorParams) -> GeneratedPuzzle {
    let mut rng = DayRng::from_day_key(day_key);
    let mut deck = all_cards();
    let mut attempts = 0u32;

    for &size in &params.board_sizes {
        let size = size.min(deck.len());
        for _ in 0..params.max_attempts_per_size {
            rng.shuffle(&mut deck);
            attempts += 1;
            let total = count_sets(&deck[..size]);
            if params.distance(total) == 0 {
                log::debug!("[PUZZLE] {} size:{} sets:{} attempts:{}", day_key, size, total, attempts);
                return finish(day_key, &deck[..size], total);
            }
        }
    }

    // Fallback: closest-to-range, starting from the current deck's first cards.
    // Only strictly better candidates replace the baseline, so ties keep the earliest.
    let base_size = FALLBACK_BOARD_SIZE.min(deck.len());
    let mut best_board: Vec<Card> = deck[..base_size].to_vec();
    let mut best_total = count_sets(&best_board);
    let mut best_distance = params.distance(best_total);

    log::warn!(
        "[PUZZLE] {} no board in [{}, {}] after {} attempts, searching closest",
        day_key, params.min_sets, params.max_sets, attempts
    );

    if best_distance > 0 {
        'search: for &size in &params.board_sizes {
            let size = size.min(deck.len());
            for _ in 0..params.fallback_attempts_per_size {
                rng.shuffle(&mut deck);
                let total = count_sets(&deck[..size]);
                let distance = params.distance(total);
                if distance < best_distance {
                    best_board = deck[..size].to_vec();
                    best_total = total;
                    best_distance = distance;
                    if distance == 0 {
                        break 'search;
                    }
                }
            }
        }
    }

    finish(day_key, &best_board, best_total)
}
