use crawler_game::{
    Actor, ActorId, ActorKind, Archetype, Commodity, Crawler, Faction, Inventory, LocationId,
    Segment, TimeDuration, TimePoint, UpkeepConfig, XorShift,
};
use rand::SeedableRng;

fn convoy(fuel: f64) -> Actor {
    let segments = vec![
        Segment::reactor("reactor", 30.0, 3.0, 0.5, 4),
        Segment::charger("solar skin", 1.0, 0.0, 2),
        Segment::traction("treads", 30.0, 0.05, 4),
        Segment::shield("screen", 6, 2, 3),
    ];
    let inventory = Inventory::new()
        .with(Commodity::Fuel, fuel)
        .with(Commodity::Crew, 6.0)
        .with(Commodity::Morale, 40.0)
        .with(Commodity::Scrap, 20_000.0)
        .with(Commodity::Rations, 2_000.0)
        .with(Commodity::Water, 2_000.0)
        .with(Commodity::Air, 2_000.0);
    Actor::new(
        ActorId(1),
        "Convoy",
        Faction::Merchant,
        LocationId(0),
        ActorKind::Crawler(Crawler::new(Archetype::Trader, segments)),
        inventory,
        TimePoint::ZERO,
        XorShift::seed_from_u64(3),
    )
}

#[test]
fn multi_year_gap_equals_hourly_steps() {
    let upkeep = UpkeepConfig::default();
    let target = TimePoint::ZERO + TimeDuration::from_years(3);

    let mut long = convoy(3_000.0);
    let ticks = long.simulate_to(target, &upkeep).unwrap();
    assert!(ticks > 0);

    let mut stepped = convoy(3_000.0);
    let mut now = TimePoint::ZERO;
    while now < target {
        now += TimeDuration::from_hours(1);
        stepped.simulate_to(now, &upkeep).unwrap();
    }
    assert_eq!(long, stepped);
}

#[test]
fn ragged_steps_equal_one_jump() {
    let upkeep = UpkeepConfig::default();
    let target = TimePoint::ZERO + TimeDuration::from_days(40);
    let mut jump = convoy(50.0);
    jump.simulate_to(target, &upkeep).unwrap();

    let mut ragged = convoy(50.0);
    let mut now = TimePoint::ZERO;
    let steps = [1, 7_000, 13, 45_000, 9_999, 10_001];
    let mut i = 0;
    while now < target {
        now = (now + TimeDuration::from_seconds(steps[i % steps.len()])).min(target);
        ragged.simulate_to(now, &upkeep).unwrap();
        // Repeating a target changes nothing.
        let before = ragged.clone();
        assert_eq!(ragged.simulate_to(now, &upkeep).unwrap(), 0);
        assert_eq!(ragged, before);
        i += 1;
    }
    assert_eq!(jump, ragged);
    assert!(jump.crawler().unwrap().depowered);
}

#[test]
fn backwards_requests_leave_state_alone() {
    let upkeep = UpkeepConfig::default();
    let mut actor = convoy(100.0);
    let later = TimePoint::ZERO + TimeDuration::from_hours(10);
    actor.simulate_to(later, &upkeep).unwrap();
    let before = actor.clone();
    let err = actor
        .simulate_to(later - TimeDuration::from_seconds(1), &upkeep)
        .unwrap_err();
    assert!(err.is_retrocausal());
    assert_eq!(actor, before);
}
