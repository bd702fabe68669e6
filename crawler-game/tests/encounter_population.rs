use crawler_game::{
    Encounter, EncounterConfig, Location, LocationId, LocationKind, Terrain, TimeDuration,
    TimePoint, XorShift,
};
use rand::SeedableRng;

fn settlement(population: f64) -> Location {
    Location {
        id: LocationId(2),
        name: "Saltworks".to_string(),
        kind: LocationKind::Settlement,
        terrain: Terrain::Flat,
        x: 10.0,
        y: 10.0,
        wealth: 200.0,
        population,
    }
}

#[test]
fn mean_arrivals_converge_to_the_rate() {
    let config = EncounterConfig {
        mean_lifetime_hours: 5_000.0,
        ..EncounterConfig::default()
    };
    let location = settlement(2_000.0);
    let elapsed = TimeDuration::from_hours(3);
    let lambda = Encounter::arrival_rate(&location, &config) * elapsed.as_hours_f64();
    assert!((lambda - 3.0).abs() < 1e-9);

    let mut parent = XorShift::seed_from_u64(2_024);
    let trials = 5_000;
    let mut total = 0_usize;
    for _ in 0..trials {
        let mut encounter = Encounter::new(location.id, TimePoint::ZERO, parent.split(), true);
        let arrivals = encounter
            .sample_arrivals(TimePoint::ZERO + elapsed, &location, &config)
            .unwrap();
        assert_eq!(encounter.discarded_arrivals(), 0);
        total += arrivals.len();
    }
    let mean = total as f64 / f64::from(trials);
    assert!((mean - lambda).abs() < 0.1, "mean {mean} vs lambda {lambda}");
}

#[test]
fn zero_elapsed_never_admits_anyone() {
    let config = EncounterConfig::default();
    let location = settlement(1_000_000.0);
    let mut parent = XorShift::seed_from_u64(1);
    for hour in 0..50 {
        let at = TimePoint::ZERO + TimeDuration::from_hours(hour);
        let mut encounter = Encounter::new(location.id, at, parent.split(), true);
        assert!(encounter.sample_arrivals(at, &location, &config).unwrap().is_empty());
    }
}

#[test]
fn split_updates_cover_the_same_interval() {
    let config = EncounterConfig::default();
    let location = settlement(5_000.0);
    let mut encounter = Encounter::new(location.id, TimePoint::ZERO, XorShift::seed_from_u64(8), true);
    let mut last = TimePoint::ZERO;
    for hour in 1..=24 {
        let now = TimePoint::ZERO + TimeDuration::from_hours(hour);
        let arrivals = encounter.sample_arrivals(now, &location, &config).unwrap();
        for arrival in &arrivals {
            assert!(arrival.at > last && arrival.at <= now);
        }
        encounter.close_update(now).unwrap();
        last = now;
    }
    assert_eq!(encounter.time(), last);
}
