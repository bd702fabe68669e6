//! Power distribution across reactor storage.
//!
//! Generation is fed into reactors in proportion to their free capacity, and
//! draws come out in proportion to their current charge. Together the two
//! rules pull the pool toward an even fill without explicit rebalancing.

use crate::segment::{Segment, SegmentKind};

fn storage(segments: &[Segment]) -> impl Iterator<Item = (f64, f64)> + '_ {
    segments
        .iter()
        .filter(|segment| segment.is_active())
        .filter_map(|segment| match segment.kind {
            SegmentKind::Reactor {
                capacity, charge, ..
            } => Some((capacity, charge)),
            _ => None,
        })
}

fn storage_mut(segments: &mut [Segment]) -> impl Iterator<Item = (f64, &mut f64)> + '_ {
    segments
        .iter_mut()
        .filter(|segment| segment.is_active())
        .filter_map(|segment| match &mut segment.kind {
            SegmentKind::Reactor {
                capacity, charge, ..
            } => Some((*capacity, charge)),
            _ => None,
        })
}

/// Sum of hourly generation from active reactors and chargers.
#[must_use]
pub fn total_generation(segments: &[Segment]) -> f64 {
    segments.iter().map(Segment::generation).sum()
}

/// Sum of hourly fuel burn from active generators.
#[must_use]
pub fn fuel_demand(segments: &[Segment]) -> f64 {
    segments.iter().map(Segment::fuel_per_hour).sum()
}

/// Charge held by active reactors.
#[must_use]
pub fn total_charge(segments: &[Segment]) -> f64 {
    storage(segments).map(|(_, charge)| charge).sum()
}

/// Capacity of active reactors.
#[must_use]
pub fn total_capacity(segments: &[Segment]) -> f64 {
    storage(segments).map(|(capacity, _)| capacity).sum()
}

/// Feed `amount` into storage by free capacity. Returns the wasted excess.
pub fn feed(segments: &mut [Segment], amount: f64) -> f64 {
    if amount <= 0.0 {
        return 0.0;
    }
    let free: f64 = storage(segments)
        .map(|(capacity, charge)| (capacity - charge).max(0.0))
        .sum();
    if free <= 0.0 {
        return amount;
    }
    if amount >= free {
        for (capacity, charge) in storage_mut(segments) {
            *charge = capacity.max(*charge);
        }
        return amount - free;
    }
    for (capacity, charge) in storage_mut(segments) {
        let headroom = (capacity - *charge).max(0.0);
        *charge = (*charge + amount * headroom / free).min(capacity);
    }
    0.0
}

/// Draw up to `amount` from storage by current charge. Returns what was drawn.
pub fn draw(segments: &mut [Segment], amount: f64) -> f64 {
    if amount <= 0.0 {
        return 0.0;
    }
    let held = total_charge(segments);
    if held <= 0.0 {
        return 0.0;
    }
    if amount >= held {
        for (_, charge) in storage_mut(segments) {
            *charge = 0.0;
        }
        return held;
    }
    for (_, charge) in storage_mut(segments) {
        *charge = (*charge - amount * *charge / held).max(0.0);
    }
    amount
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reactor(capacity: f64, charge: f64) -> Segment {
        let mut segment = Segment::reactor("r", capacity, 1.0, 1.0, 4);
        if let SegmentKind::Reactor { charge: c, .. } = &mut segment.kind {
            *c = charge;
        }
        segment
    }

    fn charges(segments: &[Segment]) -> Vec<f64> {
        storage(segments).map(|(_, charge)| charge).collect()
    }

    #[test]
    fn feed_favours_headroom() {
        let mut pool = vec![reactor(10.0, 8.0), reactor(10.0, 2.0)];
        let excess = feed(&mut pool, 5.0);
        assert!(excess.abs() < 1e-9);
        let after = charges(&pool);
        // 2 and 8 free: the emptier reactor takes four fifths.
        assert!((after[0] - 9.0).abs() < 1e-9);
        assert!((after[1] - 6.0).abs() < 1e-9);
    }

    #[test]
    fn feed_returns_exact_excess_when_full() {
        let mut pool = vec![reactor(10.0, 7.0), reactor(5.0, 5.0)];
        let excess = feed(&mut pool, 10.0);
        assert!((excess - 7.0).abs() < 1e-9);
        assert!((total_charge(&pool) - total_capacity(&pool)).abs() < 1e-9);
        assert!((feed(&mut pool, 3.0) - 3.0).abs() < 1e-9);
    }

    #[test]
    fn draw_favours_charge() {
        let mut pool = vec![reactor(10.0, 6.0), reactor(10.0, 2.0)];
        let drawn = draw(&mut pool, 4.0);
        assert!((drawn - 4.0).abs() < 1e-9);
        let after = charges(&pool);
        assert!((after[0] - 3.0).abs() < 1e-9);
        assert!((after[1] - 1.0).abs() < 1e-9);
    }

    #[test]
    fn draw_never_goes_negative() {
        let mut pool = vec![reactor(10.0, 1.0), reactor(10.0, 0.5)];
        let drawn = draw(&mut pool, 100.0);
        assert!((drawn - 1.5).abs() < 1e-9);
        assert!(charges(&pool).iter().all(|charge| *charge >= 0.0));
        assert!(draw(&mut pool, 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn conservation_over_repeated_cycles() {
        let mut pool = vec![reactor(12.0, 0.0), reactor(3.0, 3.0), reactor(7.0, 1.0)];
        for step in 0..50 {
            let amount = f64::from(step % 7) * 1.5;
            let before = total_charge(&pool);
            let excess = feed(&mut pool, amount);
            let after = total_charge(&pool);
            assert!(after <= total_capacity(&pool) + 1e-9);
            assert!((after - before + excess - amount).abs() < 1e-9);
            let drawn = draw(&mut pool, f64::from(step % 5));
            assert!(total_charge(&pool) >= -1e-12);
            assert!((after - drawn - total_charge(&pool)).abs() < 1e-9);
        }
    }

    #[test]
    fn inactive_reactors_are_ignored() {
        let mut off = reactor(10.0, 0.0);
        off.switched_on = false;
        let mut pool = vec![off, reactor(10.0, 5.0)];
        assert!((feed(&mut pool, 8.0) - 3.0).abs() < 1e-9);
        assert!((total_capacity(&pool) - 10.0).abs() < f64::EPSILON);
    }
}
