// Card and set algebra for the 81-card deck.
//
// A card is a 4-tuple over {0,1,2}: shape, color, shading, count.
// Its wire/storage form is a 4-digit code like "0121".

use std::collections::BTreeSet;
use std::fmt;

/// Number of attributes on a card
pub const DIMENSIONS: usize = 4;

/// Separator used in set signatures (never a card-code character)
pub const SIGNATURE_SEPARATOR: &str = "|";

/// A single card, one value in 0..3 per dimension
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Card([u8; DIMENSIONS]);

impl Card {
    /// Parse a 4-digit card code; `None` for anything malformed
    pub fn parse(code: &str) -> Option<Card> {
        let bytes = code.as_bytes();
        if bytes.len() != DIMENSIONS {
            return None;
        }
        let mut values = [0u8; DIMENSIONS];
        for (slot, b) in values.iter_mut().zip(bytes) {
            match b {
                b'0'..=b'2' => *slot = b - b'0',
                _ => return None,
            }
        }
        Some(Card(values))
    }

    pub fn values(&self) -> [u8; DIMENSIONS] {
        self.0
    }

    /// Canonical storage form
    pub fn code(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for v in self.0 {
            write!(f, "{}", v)?;
        }
        Ok(())
    }
}

/// All 81 cards, most-significant dimension outermost (0000, 0001, ... 2222)
pub fn all_cards() -> Vec<Card> {
    let mut cards = Vec::with_capacity(81);
    for a in 0..3 {
        for b in 0..3 {
            for c in 0..3 {
                for d in 0..3 {
                    cards.push(Card([a, b, c, d]));
                }
            }
        }
    }
    cards
}

/// Typed set predicate: every dimension all-equal or all-distinct
pub fn is_set_cards(a: Card, b: Card, c: Card) -> bool {
    (0..DIMENSIONS).all(|i| {
        let (x, y, z) = (a.0[i], b.0[i], c.0[i]);
        let all_same = x == y && y == z;
        let all_different = x != y && y != z && x != z;
        all_same || all_different
    })
}

/// Set predicate over card codes. Fails closed on malformed codes.
pub fn is_set(a: &str, b: &str, c: &str) -> bool {
    match (Card::parse(a), Card::parse(b), Card::parse(c)) {
        (Some(a), Some(b), Some(c)) => is_set_cards(a, b, c),
        _ => false,
    }
}

/// Order-independent identity of a triple: sorted codes joined by `|`
pub fn set_signature<S: AsRef<str>>(cards: &[S]) -> String {
    let mut codes: Vec<&str> = cards.iter().map(|c| c.as_ref()).collect();
    codes.sort_unstable();
    codes.join(SIGNATURE_SEPARATOR)
}

/// Split a signature back into its card codes
pub fn signature_cards(signature: &str) -> Vec<String> {
    signature
        .split(SIGNATURE_SEPARATOR)
        .map(|s| s.to_string())
        .collect()
}

/// Count valid sets on a board, returning (count, signatures)
/// Cubic in board size; boards are at most 18 cards (816 triples)
pub fn count_sets_on_board<S: AsRef<str>>(board: &[S]) -> (usize, BTreeSet<String>) {
    let mut signatures = BTreeSet::new();
    let n = board.len();
    for i in 0..n {
        for j in (i + 1)..n {
            for k in (j + 1)..n {
                let (a, b, c) = (board[i].as_ref(), board[j].as_ref(), board[k].as_ref());
                if is_set(a, b, c) {
                    signatures.insert(set_signature(&[a, b, c]));
                }
            }
        }
    }
    (signatures.len(), signatures)
}

/// Fast count over typed cards, used by the generator's inner loop
pub fn count_sets(board: &[Card]) -> usize {
    let n = board.len();
    let mut count = 0;
    for i in 0..n {
        for j in (i + 1)..n {
            for k in (j + 1)..n {
                if is_set_cards(board[i], board[j], board[k]) {
                    count += 1;
                }
            }
        }
    }
    count
}

const ATTRIBUTE_LABELS: [(&str, [&str; 3]); DIMENSIONS] = [
    ("Shape", ["oval", "squiggle", "diamond"]),
    ("Color", ["red", "green", "purple"]),
    ("Shading", ["solid", "striped", "open"]),
    ("Count", ["one", "two", "three"]),
];

/// Human-readable description of a triple, e.g.
/// "Shape: oval • Color: all different • Shading: solid • Count: all different"
/// Falls back to "SET" for anything that isn't three parseable cards.
pub fn describe_set<S: AsRef<str>>(cards: &[S]) -> String {
    let parsed: Option<Vec<Card>> = cards.iter().map(|c| Card::parse(c.as_ref())).collect();
    let parsed = match parsed {
        Some(p) if p.len() == 3 => p,
        _ => return "SET".to_string(),
    };

    ATTRIBUTE_LABELS
        .iter()
        .enumerate()
        .map(|(i, (name, labels))| {
            let v = parsed[0].0[i];
            if parsed.iter().all(|c| c.0[i] == v) {
                format!("{}: {}", name, labels[v as usize])
            } else {
                format!("{}: all different", name)
            }
        })
        .collect::<Vec<_>>()
        .join(" • ")
}
