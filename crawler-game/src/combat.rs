//! Combat resolution for a single attack round.
//!
//! An attack budgets the attacker's reactor charge across its weapons, turns
//! every affordable shot into a `HitRecord`, rolls each record from its own
//! seed, and pushes landed damage through shields, armor, hull segments and
//! finally crew. The returned delay is when the attacker may fire again.

use rand::SeedableRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::actor::{Actor, EndState};
use crate::config::CombatConfig;
use crate::inventory::Commodity;
use crate::numbers::u64_to_f64;
use crate::power;
use crate::relations::ActorToActor;
use crate::rng::XorShift;
use crate::segment::{Segment, SegmentKind, SegmentState};
use crate::time::{TimeDuration, TimePoint};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HitOutcome {
    Miss,
    Hit,
    /// Bypasses armor; shields still absorb.
    Pierce,
}

/// One shot, pending resolution. The roll is reproducible from `seed`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HitRecord {
    /// Index of the firing segment in the attacker's loadout.
    pub weapon: usize,
    pub damage: u32,
    pub aim: f64,
    pub seed: u64,
}

impl HitRecord {
    #[must_use]
    pub fn roll(&self, combat: &CombatConfig) -> HitOutcome {
        let roll = XorShift::seed_from_u64(self.seed).next_f64() + self.aim;
        if roll < combat.miss_threshold {
            HitOutcome::Miss
        } else if roll >= combat.pierce_threshold {
            HitOutcome::Pierce
        } else {
            HitOutcome::Hit
        }
    }
}

pub type HitBatch = SmallVec<[HitRecord; 8]>;

/// Shots produced by one round of power budgeting.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Volley {
    pub hits: HitBatch,
    /// Longest cooldown among the weapons that fired.
    pub delay: TimeDuration,
    pub power_drawn: f64,
}

/// Where one attack's damage went.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DamageReport {
    pub shielded: u32,
    pub soaked: u32,
    pub hull: u32,
    pub overflow: u32,
    pub segments_destroyed: u32,
}

impl DamageReport {
    /// Damage stopped or taken anywhere on the target.
    #[must_use]
    pub const fn total(&self) -> u32 {
        self.shielded + self.soaked + self.hull + self.overflow
    }

    fn absorb(&mut self, other: &Self) {
        self.shielded += other.shielded;
        self.soaked += other.soaked;
        self.hull += other.hull;
        self.overflow += other.overflow;
        self.segments_destroyed += other.segments_destroyed;
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttackReport {
    /// False when nothing could fire this round.
    pub fired: bool,
    pub shots: u32,
    pub misses: u32,
    pub hits: u32,
    pub pierces: u32,
    /// Damage from shots that did not miss.
    pub landed: u64,
    pub damage: DamageReport,
    pub crew_lost: f64,
    pub delay: TimeDuration,
    pub target_ended: Option<EndState>,
    pub target_surrendered: bool,
}

fn pick(rng: &mut XorShift, candidates: &[usize]) -> Option<usize> {
    candidates.choose(rng).copied()
}

fn indices<F>(actor: &Actor, filter: F) -> Vec<usize>
where
    F: Fn(&Segment) -> bool,
{
    actor.crawler().map_or_else(Vec::new, |crawler| {
        crawler
            .segments
            .iter()
            .enumerate()
            .filter(|(_, segment)| filter(segment))
            .map(|(index, _)| index)
            .collect()
    })
}

fn segment_mut(actor: &mut Actor, index: usize) -> Option<&mut Segment> {
    actor
        .crawler_mut()
        .and_then(|crawler| crawler.segments.get_mut(index))
}

/// Steps 1 and 2: spend reactor charge on weapons in random order, then emit
/// one record per shot of every weapon that could be powered.
pub fn fire_volley(attacker: &mut Actor) -> Volley {
    let mut weapons = indices(attacker, |segment| segment.is_weapon() && segment.is_active());
    weapons.shuffle(attacker.rng_mut());

    let Some(crawler) = attacker.crawler() else {
        return Volley::default();
    };
    let mut budget = power::total_charge(&crawler.segments);
    let mut chosen = Vec::new();
    for index in weapons {
        if let SegmentKind::Weapon {
            damage,
            shots,
            aim,
            drain,
            delay,
        } = crawler.segments[index].kind
        {
            if drain <= budget {
                budget -= drain;
                chosen.push((index, damage, shots, aim, drain, delay));
            }
        }
    }

    let mut volley = Volley::default();
    for (index, damage, shots, aim, drain, delay) in chosen {
        volley.power_drawn += drain;
        volley.delay = volley.delay.max(delay);
        for _ in 0..shots {
            volley.hits.push(HitRecord {
                weapon: index,
                damage,
                aim,
                seed: rand::RngCore::next_u64(attacker.rng_mut()),
            });
        }
    }
    if let Some(crawler) = attacker.crawler_mut() {
        power::draw(&mut crawler.segments, volley.power_drawn);
    }
    volley
}

/// Step 4: push `damage` through the phases in order and return where it went.
/// Pierces skip the armor phase. Overflow past every hull segment kills crew.
pub fn apply_damage(
    target: &mut Actor,
    damage: u32,
    outcome: HitOutcome,
    combat: &CombatConfig,
) -> (DamageReport, f64) {
    let mut report = DamageReport::default();
    let mut remaining = damage;
    if outcome == HitOutcome::Miss {
        return (report, 0.0);
    }

    let shields = indices(target, |segment| {
        segment.is_active() && matches!(segment.kind, SegmentKind::Shield { pool, .. } if pool > 0)
    });
    if let Some(index) = pick(target.rng_mut(), &shields) {
        if let Some(shield) = segment_mut(target, index) {
            let after = shield.shield_absorb(remaining);
            report.shielded = remaining - after;
            remaining = after;
        }
    }

    if remaining > 0 && outcome != HitOutcome::Pierce {
        let armor = indices(target, |segment| {
            segment.is_armor_class()
                && matches!(
                    segment.state(),
                    SegmentState::Active | SegmentState::Disabled
                )
        });
        if let Some(index) = pick(target.rng_mut(), &armor) {
            if let Some(plate) = segment_mut(target, index) {
                let after = plate.soak(remaining);
                report.soaked = remaining - after;
                remaining = after;
            }
        }
    }

    while remaining > 0 {
        let hull = indices(target, |segment| {
            !segment.is_defense() && !segment.is_destroyed()
        });
        let Some(index) = pick(target.rng_mut(), &hull) else {
            break;
        };
        let Some(segment) = segment_mut(target, index) else {
            break;
        };
        let after = segment.absorb_hits(remaining);
        report.hull += remaining - after;
        if segment.is_destroyed() {
            report.segments_destroyed += 1;
        }
        remaining = after;
    }

    let mut crew_lost = 0.0;
    if remaining > 0 {
        report.overflow = remaining;
        let crew = target.crew();
        crew_lost = (f64::from(remaining) * combat.crew_per_damage).min(crew);
        target.inventory.set(Commodity::Crew, crew - crew_lost);
        target.adjust_morale(-crew_lost * combat.morale_per_crew_lost);
    }
    (report, crew_lost)
}

/// Whether `actor` would fire on `other`: a hostile stance or drawn blood, or
/// a notorious record that `other` has not offset with earned trust.
#[must_use]
pub fn regards_as_hostile(actor: &Actor, other: &Actor, combat: &CombatConfig) -> bool {
    if actor.is_hostile_to(other) {
        return true;
    }
    let trust = actor.relation(other.id).map_or(0.0, ActorToActor::trust);
    other.evil_points >= combat.evil_hostility_threshold && trust <= 0.0
}

/// Cause for opening fire, judged without the attacker's own declared stance.
fn has_cause(attacker: &Actor, target: &Actor, combat: &CombatConfig) -> bool {
    attacker.faction.default_hostility(target.faction)
        || attacker
            .relation(target.id)
            .is_some_and(|rel| rel.damage_taken > 0 || rel.betrayed)
        || target.is_hostile_to(attacker)
        || target.evil_points >= combat.evil_hostility_threshold
}

/// Resolve one attack round of `attacker` against `target` at `now`.
///
/// A round in which nothing could fire, or whose target can no longer be
/// damaged, reports `fired == false` and costs the short fallback delay.
pub fn resolve_attack(
    attacker: &mut Actor,
    target: &mut Actor,
    now: TimePoint,
    combat: &CombatConfig,
) -> AttackReport {
    let no_fire = AttackReport {
        delay: combat.no_fire_delay(),
        ..AttackReport::default()
    };
    if attacker.has_ended() || target.has_ended() || target.crawler().is_none() {
        return no_fire;
    }
    let volley = fire_volley(attacker);
    if volley.hits.is_empty() {
        attacker.message(now, format!("No weapon could be powered against {}.", target.name));
        return no_fire;
    }

    let opening = attacker
        .relation(target.id)
        .is_none_or(|rel| rel.damage_created == 0);
    if opening {
        let cause = has_cause(attacker, target, combat);
        attacker.relation_mut(target.id, target.faction).aggressor = !cause;
    }
    let betrayal = attacker
        .relation(target.id)
        .is_some_and(|rel| rel.spared);
    if betrayal {
        attacker.relation_mut(target.id, target.faction).spared = false;
        let rel = target.relation_mut(attacker.id, attacker.faction);
        rel.betrayed = true;
        rel.worsen(combat.spare_reputation);
        attacker.evil_points += combat.betrayal_evil_points;
        target.message(now, format!("{} has betrayed our surrender.", attacker.name));
    }

    let mut report = AttackReport {
        fired: true,
        delay: volley.delay,
        ..AttackReport::default()
    };
    let mut created = 0_u64;
    for hit in &volley.hits {
        report.shots += 1;
        created += u64::from(hit.damage);
        let outcome = hit.roll(combat);
        match outcome {
            HitOutcome::Miss => {
                report.misses += 1;
                continue;
            }
            HitOutcome::Hit => report.hits += 1,
            HitOutcome::Pierce => report.pierces += 1,
        }
        report.landed += u64::from(hit.damage);
        let (damage, crew_lost) = apply_damage(target, hit.damage, outcome, combat);
        report.damage.absorb(&damage);
        report.crew_lost += crew_lost;
    }

    {
        let rel = attacker.relation_mut(target.id, target.faction);
        rel.damage_created += created;
        rel.damage_inflicted += report.landed;
    }
    let first_blood = {
        let rel = target.relation_mut(attacker.id, attacker.faction);
        rel.damage_taken += report.landed;
        rel.worsen(u64_to_f64(report.landed) * combat.reputation_per_damage);
        let first = report.landed > 0 && !rel.blooded;
        if first {
            rel.blooded = true;
        }
        first
    };
    if first_blood {
        target.adjust_morale(-combat.first_blood_morale_penalty);
    }

    attacker.message(
        now,
        format!(
            "Fired {} shots at {}: {} landed for {} damage.",
            report.shots,
            target.name,
            report.hits + report.pierces,
            report.landed
        ),
    );
    target.message(
        now,
        format!(
            "{} fired on us: {} damage, {:.0} crew lost.",
            attacker.name, report.landed, report.crew_lost
        ),
    );

    if target.crawler().is_some_and(crate::actor::Crawler::all_destroyed) {
        target.end(EndState::Destroyed, now, "Our crawler has been torn apart.");
    } else if target.crew() <= 0.0 {
        target.end(EndState::Killed, now, "The last of our crew has fallen.");
    }
    report.target_ended = target.end_state();

    if report.target_ended.is_some() {
        let unprovoked = attacker
            .relation(target.id)
            .is_some_and(|rel| rel.aggressor);
        if unprovoked {
            let penalty =
                combat.friendly_fire_morale_penalty / (1.0 + f64::from(attacker.evil_points));
            attacker.adjust_morale(-penalty);
            attacker.evil_points += 1;
            attacker.message(
                now,
                format!("{} never wronged us. The crew is uneasy.", target.name),
            );
        } else {
            attacker.adjust_morale(combat.hostile_kill_morale_bonus);
            attacker.message(now, format!("{} is finished. The crew cheers.", target.name));
        }
        log::debug!(
            "{} finished {} ({:?})",
            attacker.name,
            target.name,
            report.target_ended
        );
    } else if !target.player
        && target.morale() < combat.surrender_morale
        && !target.has_surrendered_to(attacker.id)
    {
        target.relation_mut(attacker.id, attacker.faction).surrendered = true;
        target.message(now, format!("We surrender to {}.", attacker.name));
        attacker.message(now, format!("{} has surrendered.", target.name));
        report.target_surrendered = true;
    }
    report
}
