#![allow(non_snake_case)]

use khanate_client::{
    test_helpers::{
        TestContext,
        count_outcomes,
        drain_events,
    },
    tracker::{
        MovementPhase,
        TrackerEvent,
    },
};
use tokio::time::{
    self,
    Duration,
    Instant,
};

#[tokio::test(start_paused = true)]
async fn tick__retires_the_movement_exactly_at_the_deadline() {
    // given
    let ctx = TestContext::new();
    ctx.contract().set_travel_time(5);
    let (mut tracker, mut events) = ctx.tracker();
    let movement = tracker.initiate(ctx.bob()).await.unwrap();

    // when: one tick just before the deadline
    time::advance(Duration::from_millis(4_999)).await;
    let early = tracker.tick().await;

    // then
    assert!(early.is_empty());
    let live = tracker.movement(movement.id).unwrap();
    assert_eq!(live.phase, MovementPhase::Traveling);
    assert!(!live.remaining(Instant::now()).is_zero());

    // when: the countdown reaches zero and the chain deadline has passed
    ctx.contract().advance_time(5);
    time::advance(Duration::from_millis(1)).await;
    let outcomes = tracker.tick().await;

    // then
    assert_eq!(outcomes.len(), 1);
    assert!(tracker.movement(movement.id).is_none());
    let events = drain_events(&mut events);
    assert!(events
        .iter()
        .any(|ev| matches!(ev, TrackerEvent::MovementRemoved { .. })));
    assert_eq!(count_outcomes(&events), 1);
    assert_eq!(ctx.contract().execute_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn remaining__counts_down_monotonically_to_zero() {
    // given
    let ctx = TestContext::new();
    ctx.contract().set_travel_time(10);
    let (mut tracker, _events) = ctx.tracker();
    let movement = tracker.initiate(ctx.bob()).await.unwrap();

    // when / then
    let mut last = movement.duration;
    for _ in 0..12 {
        time::advance(Duration::from_secs(1)).await;
        let remaining = tracker
            .movement(movement.id)
            .unwrap()
            .remaining(Instant::now());
        assert!(remaining <= last);
        last = remaining;
    }
    assert!(last.is_zero());
}

#[tokio::test(start_paused = true)]
async fn tick__retires_the_movement_even_when_resolution_fails() {
    // given: the local countdown runs ahead of chain time
    let ctx = TestContext::new();
    ctx.contract().set_travel_time(5);
    let (mut tracker, mut events) = ctx.tracker();
    let movement = tracker.initiate(ctx.bob()).await.unwrap();
    ctx.contract().advance_time(3);
    time::advance(Duration::from_secs(5)).await;

    // when
    let outcomes = tracker.tick().await;

    // then: gone locally, unresolved remotely
    assert!(outcomes.is_empty());
    assert!(tracker.movement(movement.id).is_none());
    assert!(!ctx.contract().record_of(movement.battle_id).resolved);
    assert_eq!(count_outcomes(&drain_events(&mut events)), 0);

    // when: the chain catches up and the sweep retries
    ctx.contract().advance_time(3);
    time::advance(Duration::from_millis(5_100)).await;
    let listing = tracker.list_active().await.unwrap();

    // then
    assert!(listing.is_empty());
    assert!(ctx.contract().record_of(movement.battle_id).resolved);
    assert_eq!(count_outcomes(&drain_events(&mut events)), 1);
}

#[tokio::test(start_paused = true)]
async fn tick__is_idempotent_after_the_movement_is_gone() {
    // given
    let ctx = TestContext::new();
    ctx.contract().set_travel_time(5);
    let (mut tracker, _events) = ctx.tracker();
    tracker.initiate(ctx.bob()).await.unwrap();
    ctx.contract().advance_time(5);
    time::advance(Duration::from_secs(5)).await;
    let first = tracker.tick().await;
    assert_eq!(first.len(), 1);

    // when
    time::advance(Duration::from_secs(5)).await;
    let second = tracker.tick().await;

    // then
    assert!(second.is_empty());
    assert_eq!(ctx.contract().execute_calls(), 1);
}
