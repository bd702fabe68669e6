use crawler_game::{
    Actor, ActorId, ActorKind, Archetype, CombatConfig, Commodity, Crawler, EndState, Faction,
    HitOutcome, Inventory, LocationId, Segment, SegmentKind, TimeDuration, TimePoint, XorShift,
    apply_damage, resolve_attack,
};
use rand::SeedableRng;

fn hulk(id: u64, segments: Vec<Segment>) -> Actor {
    let inventory = Inventory::new()
        .with(Commodity::Crew, 10.0)
        .with(Commodity::Morale, 30.0)
        .with(Commodity::Fuel, 100.0);
    Actor::new(
        ActorId(id),
        format!("Hulk {id}"),
        Faction::Independent,
        LocationId(0),
        ActorKind::Crawler(Crawler::new(Archetype::Traveler, segments)),
        inventory,
        TimePoint::ZERO,
        XorShift::seed_from_u64(id),
    )
}

fn defended() -> Actor {
    hulk(
        1,
        vec![
            Segment::shield("screen", 5, 1, 3),
            Segment::armor("armor", 2, 6),
            Segment::traction("treads", 30.0, 0.05, 20),
        ],
    )
}

fn shield_pool(actor: &Actor) -> u32 {
    actor
        .crawler()
        .unwrap()
        .segments
        .iter()
        .find_map(|segment| match segment.kind {
            SegmentKind::Shield { pool, .. } => Some(pool),
            _ => None,
        })
        .unwrap()
}

#[test]
fn shields_then_armor_then_hull() {
    let combat = CombatConfig::default();
    let mut target = defended();
    let (report, crew_lost) = apply_damage(&mut target, 10, HitOutcome::Hit, &combat);
    assert_eq!(report.shielded, 5);
    assert_eq!(report.soaked, 2);
    assert_eq!(report.hull, 3);
    assert_eq!(report.overflow, 0);
    assert!(crew_lost.abs() < f64::EPSILON);
    assert_eq!(shield_pool(&target), 0);
    assert_eq!(target.crawler().unwrap().segments[2].hits, 3);
    assert!((target.crew() - 10.0).abs() < f64::EPSILON);
}

#[test]
fn pierces_skip_the_armor() {
    let combat = CombatConfig::default();
    let mut target = defended();
    let (report, _) = apply_damage(&mut target, 10, HitOutcome::Pierce, &combat);
    assert_eq!(report.shielded, 5);
    assert_eq!(report.soaked, 0);
    assert_eq!(report.hull, 5);
}

#[test]
fn misses_do_nothing() {
    let combat = CombatConfig::default();
    let mut target = defended();
    let before = target.clone();
    let (report, crew_lost) = apply_damage(&mut target, 50, HitOutcome::Miss, &combat);
    assert_eq!(report.total(), 0);
    assert!(crew_lost.abs() < f64::EPSILON);
    assert_eq!(target, before);
}

#[test]
fn overflow_kills_crew_only_after_the_hull_is_gone() {
    let combat = CombatConfig::default();
    let mut target = hulk(2, vec![Segment::traction("treads", 30.0, 0.05, 4)]);
    let (report, crew_lost) = apply_damage(&mut target, 7, HitOutcome::Hit, &combat);
    assert_eq!(report.hull, 4);
    assert_eq!(report.segments_destroyed, 1);
    assert_eq!(report.overflow, 3);
    assert!((crew_lost - 3.0 * combat.crew_per_damage).abs() < 1e-9);
    assert!((target.crew() - (10.0 - crew_lost)).abs() < 1e-9);
    assert!((target.morale() - (30.0 - crew_lost * combat.morale_per_crew_lost)).abs() < 1e-9);
}

#[test]
fn attacks_without_power_are_no_fire() {
    let combat = CombatConfig::default();
    let mut attacker = hulk(
        3,
        vec![
            Segment::reactor("reactor", 10.0, 1.0, 0.1, 4),
            Segment::weapon("cannon", 4, 1, 0.0, 50.0, TimeDuration::from_minutes(5), 3),
        ],
    );
    let mut target = defended();
    let report = resolve_attack(&mut attacker, &mut target, TimePoint::ZERO, &combat);
    assert!(!report.fired);
    assert_eq!(report.shots, 0);
    assert_eq!(report.delay, combat.no_fire_delay());
    assert_eq!(target.relation(attacker.id), None);
}

#[test]
fn a_sustained_attack_finishes_the_target() {
    let combat = CombatConfig::default();
    let mut attacker = hulk(
        4,
        vec![
            Segment::reactor("reactor", 1_000.0, 100.0, 0.1, 4),
            Segment::weapon("cannon", 6, 3, 0.5, 5.0, TimeDuration::from_minutes(5), 3),
        ],
    );
    attacker.faction = Faction::Bandit;
    let mut target = hulk(
        5,
        vec![
            Segment::traction("treads", 30.0, 0.05, 6),
            Segment::armor("armor", 1, 6),
        ],
    );
    target.player = true;

    let mut now = TimePoint::ZERO;
    let mut rounds = 0;
    while !target.has_ended() && rounds < 200 {
        let report = resolve_attack(&mut attacker, &mut target, now, &combat);
        assert!(report.fired);
        now += report.delay;
        rounds += 1;
    }
    assert_eq!(target.end_state(), Some(EndState::Killed));
    let relation = target.relation(attacker.id).unwrap();
    assert!(relation.blooded);
    assert!(relation.is_hostile());
    assert_eq!(
        attacker.relation(target.id).unwrap().damage_inflicted,
        relation.damage_taken
    );
}
