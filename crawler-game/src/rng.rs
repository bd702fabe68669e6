//! Deterministic, splittable random streams.
//!
//! Every stateful entity (actor, encounter, the game itself) owns one
//! `XorShift` stream. Child streams are seeded from their parent's next
//! output, and root streams are derived from the user seed with HMAC domain
//! separation, so a saved stream state replays the exact same sequence.
use hmac::{Hmac, Mac};
use rand::{Rng, RngCore, SeedableRng};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::error::SimError;
use crate::numbers::u64_to_f64;

/// Poisson draws larger than this are summed from independent chunks so the
/// multiplicative method never underflows.
const POISSON_CHUNK: f64 = 30.0;
const XORSHIFT_MULTIPLIER: u64 = 0x2545_F491_4F6C_DD1D;

/// xorshift64* generator. The state is never zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u64", into = "u64")]
pub struct XorShift {
    state: u64,
}

impl XorShift {
    /// Restore a stream from a previously saved state.
    ///
    /// # Errors
    ///
    /// Returns `SimError::CorruptRng` for the all-zero state, which xorshift cannot leave.
    pub const fn from_state(state: u64) -> Result<Self, SimError> {
        if state == 0 {
            return Err(SimError::CorruptRng);
        }
        Ok(Self { state })
    }

    /// Raw internal state, for persistence.
    #[must_use]
    pub const fn state(&self) -> u64 {
        self.state
    }

    /// Derive an independent child stream, advancing this one by a single draw.
    #[must_use]
    pub fn split(&mut self) -> Self {
        Self::seed_from_u64(self.next_u64())
    }

    /// Uniform float in `[0, 1)` with 53 bits of precision.
    pub fn next_f64(&mut self) -> f64 {
        u64_to_f64(self.next_u64() >> 11) / u64_to_f64(1_u64 << 53)
    }

    /// Bernoulli trial with probability `p` (clamped to `[0, 1]`).
    pub fn chance(&mut self, p: f64) -> bool {
        if p <= 0.0 {
            return false;
        }
        self.next_f64() < p
    }

    /// Poisson-distributed count with mean `lambda`. Non-positive or
    /// non-finite means yield zero without consuming randomness.
    pub fn poisson(&mut self, lambda: f64) -> u64 {
        if !lambda.is_finite() || lambda <= 0.0 {
            return 0;
        }
        let mut remaining = lambda;
        let mut total = 0_u64;
        while remaining > POISSON_CHUNK {
            total += self.poisson_small(POISSON_CHUNK);
            remaining -= POISSON_CHUNK;
        }
        total + self.poisson_small(remaining)
    }

    fn poisson_small(&mut self, lambda: f64) -> u64 {
        let limit = (-lambda).exp();
        let mut product = 1.0;
        let mut count = 0_u64;
        loop {
            product *= self.next_f64();
            if product <= limit {
                return count;
            }
            count += 1;
        }
    }
}

impl TryFrom<u64> for XorShift {
    type Error = SimError;

    fn try_from(state: u64) -> Result<Self, Self::Error> {
        Self::from_state(state)
    }
}

impl From<XorShift> for u64 {
    fn from(rng: XorShift) -> Self {
        rng.state
    }
}

impl RngCore for XorShift {
    fn next_u32(&mut self) -> u32 {
        (self.next_u64() >> 32) as u32
    }

    fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.state = x;
        x.wrapping_mul(XORSHIFT_MULTIPLIER)
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        for chunk in dest.chunks_mut(8) {
            let bytes = self.next_u64().to_le_bytes();
            chunk.copy_from_slice(&bytes[..chunk.len()]);
        }
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}

impl SeedableRng for XorShift {
    type Seed = [u8; 8];

    fn from_seed(seed: Self::Seed) -> Self {
        Self::seed_from_u64(u64::from_le_bytes(seed))
    }

    fn seed_from_u64(seed: u64) -> Self {
        let mut mixed = splitmix64(seed);
        if mixed == 0 {
            mixed = XORSHIFT_MULTIPLIER;
        }
        Self { state: mixed }
    }
}

fn splitmix64(seed: u64) -> u64 {
    let mut z = seed.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Derive a root stream seed for one simulation domain from the user seed.
#[must_use]
pub fn derive_stream_seed(user_seed: u64, domain_tag: &[u8]) -> u64 {
    let mut mac =
        Hmac::<Sha256>::new_from_slice(&user_seed.to_le_bytes()).expect("64-bit seed is valid key");
    mac.update(domain_tag);
    let digest = mac.finalize().into_bytes();
    let seed_bytes: [u8; 8] = digest[..8].try_into().expect("digest slice length");
    u64::from_le_bytes(seed_bytes)
}

/// Weighted random selection from a list of options.
pub fn weighted_pick<T, R>(options: &[(T, u32)], rng: &mut R) -> Option<T>
where
    R: Rng,
    T: Clone,
{
    let total_weight: u32 = options.iter().map(|(_, weight)| *weight).sum();
    if total_weight == 0 {
        return None;
    }

    let roll = rng.gen_range(0..total_weight);
    let mut current_weight = 0;
    for (item, weight) in options {
        current_weight += weight;
        if roll < current_weight {
            return Some(item.clone());
        }
    }
    options.first().map(|(item, _)| item.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::seq::SliceRandom;

    #[test]
    fn same_seed_same_sequence() {
        let mut a = XorShift::seed_from_u64(42);
        let mut b = XorShift::seed_from_u64(42);
        for _ in 0..64 {
            assert_eq!(a.next_u64(), b.next_u64());
        }
        let mut c = XorShift::seed_from_u64(43);
        assert_ne!(a.next_u64(), c.next_u64());
    }

    #[test]
    fn zero_seed_still_produces_a_valid_state() {
        let rng = XorShift::seed_from_u64(0);
        assert_ne!(rng.state(), 0);
        assert!(matches!(
            XorShift::from_state(0),
            Err(SimError::CorruptRng)
        ));
    }

    #[test]
    fn saved_state_resumes_exactly() {
        let mut rng = XorShift::seed_from_u64(7);
        let _ = rng.next_u64();
        let json = serde_json::to_string(&rng).unwrap();
        let mut restored: XorShift = serde_json::from_str(&json).unwrap();
        assert_eq!(rng.next_u64(), restored.next_u64());
        assert!(serde_json::from_str::<XorShift>("0").is_err());
    }

    #[test]
    fn split_streams_diverge_from_parent() {
        let mut parent = XorShift::seed_from_u64(99);
        let mut child = parent.split();
        let mut replay = XorShift::seed_from_u64(99);
        let mut replay_child = replay.split();
        assert_eq!(child.next_u64(), replay_child.next_u64());
        assert_ne!(child.next_u64(), parent.next_u64());
    }

    #[test]
    fn next_f64_stays_in_unit_interval() {
        let mut rng = XorShift::seed_from_u64(5);
        for _ in 0..10_000 {
            let v = rng.next_f64();
            assert!((0.0..1.0).contains(&v));
        }
    }

    #[test]
    fn poisson_mean_tracks_lambda() {
        let mut rng = XorShift::seed_from_u64(2024);
        for lambda in [0.5, 4.0, 75.0] {
            let trials = 4_000;
            let total: u64 = (0..trials).map(|_| rng.poisson(lambda)).sum();
            let mean = u64_to_f64(total) / f64::from(trials);
            assert!(
                (mean - lambda).abs() < lambda.sqrt() * 0.15 + 0.05,
                "lambda {lambda} mean {mean}"
            );
        }
        assert_eq!(rng.poisson(0.0), 0);
        assert_eq!(rng.poisson(f64::NAN), 0);
    }

    #[test]
    fn rand_extensions_work_on_the_stream() {
        let mut rng = XorShift::seed_from_u64(11);
        let mut items = [1, 2, 3, 4, 5];
        items.shuffle(&mut rng);
        items.sort_unstable();
        assert_eq!(items, [1, 2, 3, 4, 5]);
        let roll = rng.gen_range(10..20);
        assert!((10..20).contains(&roll));
    }

    #[test]
    fn stream_seeds_are_domain_separated() {
        assert_ne!(
            derive_stream_seed(1, b"world"),
            derive_stream_seed(1, b"spawn")
        );
        assert_eq!(derive_stream_seed(1, b"map"), derive_stream_seed(1, b"map"));
    }

    #[test]
    fn weighted_pick_respects_zero_weights() {
        let mut rng = XorShift::seed_from_u64(3);
        let options = [("never", 0), ("always", 5)];
        for _ in 0..50 {
            assert_eq!(weighted_pick(&options, &mut rng), Some("always"));
        }
        let empty: [(u8, u32); 0] = [];
        assert_eq!(weighted_pick(&empty, &mut rng), None);
    }
}
