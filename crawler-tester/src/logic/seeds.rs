use std::collections::HashSet;
use thiserror::Error;

/// Default seed when the command line names none.
pub const DEFAULT_SEED: u64 = 1337;

/// Longest range a single `a..b` token may expand to.
const MAX_RANGE: u64 = 100_000;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SeedError {
    #[error("unrecognized seed token: {0}")]
    Unrecognized(String),
    #[error("seed range {start}..{end} is empty")]
    EmptyRange { start: u64, end: u64 },
    #[error("seed range {token} expands to more than {max} seeds")]
    RangeTooLarge { token: String, max: u64 },
}

/// Resolve CLI seed tokens into a deduplicated list, in first-seen order.
///
/// Tokens are integers (negative values use their magnitude), half-open
/// ranges `a..b`, or inclusive ranges `a..=b`.
pub fn resolve_seed_inputs(tokens: &[String]) -> Result<Vec<u64>, SeedError> {
    let mut seeds = Vec::new();
    let mut seen = HashSet::new();

    for token in tokens {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }
        for seed in expand_token(token)? {
            if seen.insert(seed) {
                seeds.push(seed);
            }
        }
    }

    if seeds.is_empty() {
        seeds.push(DEFAULT_SEED);
    }
    Ok(seeds)
}

fn expand_token(token: &str) -> Result<Vec<u64>, SeedError> {
    if let Some((start, end)) = token.split_once("..") {
        let (end, inclusive) = match end.strip_prefix('=') {
            Some(end) => (end, true),
            None => (end, false),
        };
        let start = parse_seed(start).ok_or_else(|| SeedError::Unrecognized(token.to_string()))?;
        let end = parse_seed(end).ok_or_else(|| SeedError::Unrecognized(token.to_string()))?;
        let end = if inclusive { end.saturating_add(1) } else { end };
        if end <= start {
            return Err(SeedError::EmptyRange { start, end });
        }
        if end - start > MAX_RANGE {
            return Err(SeedError::RangeTooLarge {
                token: token.to_string(),
                max: MAX_RANGE,
            });
        }
        return Ok((start..end).collect());
    }
    parse_seed(token)
        .map(|seed| vec![seed])
        .ok_or_else(|| SeedError::Unrecognized(token.to_string()))
}

fn parse_seed(raw: &str) -> Option<u64> {
    let raw = raw.trim();
    if let Ok(value) = raw.parse::<u64>() {
        return Some(value);
    }
    raw.parse::<i64>().ok().map(i64::unsigned_abs)
}
