use crawler_game::{Scheduler, TimeDuration, TimePoint};

fn at(minutes: i64) -> TimePoint {
    TimePoint::ZERO + TimeDuration::from_minutes(minutes)
}

#[test]
fn earlier_events_fire_first_regardless_of_insertion() {
    let mut scheduler = Scheduler::new();
    scheduler.schedule(at(20), 0, "B");
    scheduler.schedule(at(10), 0, "A");
    let mut fired = Vec::new();
    scheduler
        .process_until(at(30), || false, |_, scheduled| {
            fired.push(scheduled.event);
            Ok::<(), ()>(())
        })
        .unwrap();
    assert_eq!(fired, ["A", "B"]);
}

#[test]
fn ties_break_on_priority_then_insertion() {
    let mut scheduler = Scheduler::new();
    scheduler.schedule(at(5), 3, "late-low");
    scheduler.schedule(at(5), 1, "first-high");
    scheduler.schedule(at(5), 1, "second-high");
    scheduler.schedule(at(5), 3, "later-low");
    let mut fired = Vec::new();
    while let Some(scheduled) = scheduler.pop_due(at(5)) {
        fired.push(scheduled.event);
    }
    assert_eq!(fired, ["first-high", "second-high", "late-low", "later-low"]);
}

#[test]
fn handlers_can_schedule_follow_ups_inside_the_window() {
    let mut scheduler = Scheduler::new();
    scheduler.schedule(at(0), 0, 0_u32);
    let mut seen = Vec::new();
    let fired = scheduler
        .process_until(at(60), || false, |queue, scheduled| {
            seen.push((scheduled.time, scheduled.event));
            if scheduled.event < 10 {
                queue.schedule(scheduled.time + TimeDuration::from_minutes(10), 0, scheduled.event + 1);
            }
            Ok::<(), ()>(())
        })
        .unwrap();
    assert_eq!(fired, 7);
    assert_eq!(seen.last(), Some(&(at(60), 6)));
    assert_eq!(scheduler.next_time(), Some(at(70)));
}

#[test]
fn stop_predicate_and_empty_queue_end_cleanly() {
    let mut empty: Scheduler<u8> = Scheduler::new();
    assert_eq!(empty.process_until(at(100), || false, |_, _| Ok::<(), ()>(())), Ok(0));
    assert!(empty.peek_next().is_none());

    let mut scheduler = Scheduler::new();
    for minute in 0..10 {
        scheduler.schedule(at(minute), 0, minute);
    }
    let mut budget = 4;
    let fired = scheduler
        .process_until(
            at(100),
            || {
                if budget == 0 {
                    return true;
                }
                budget -= 1;
                false
            },
            |_, _| Ok::<(), ()>(()),
        )
        .unwrap();
    assert_eq!(fired, 4);
    assert_eq!(scheduler.len(), 6);
    assert_eq!(scheduler.peek_next().map(|s| s.event), Some(4));
}

#[test]
fn handler_errors_stop_processing() {
    let mut scheduler = Scheduler::new();
    scheduler.schedule(at(1), 0, 1);
    scheduler.schedule(at(2), 0, 2);
    let result = scheduler.process_until(at(10), || false, |_, scheduled| {
        if scheduled.event == 1 { Err("boom") } else { Ok(()) }
    });
    assert_eq!(result, Err("boom"));
    assert_eq!(scheduler.len(), 1);
}
