#![allow(non_snake_case)]

use khanate_client::{
    GameError,
    test_helpers::{
        TestContext,
        count_outcomes,
        drain_events,
    },
    tracker::{
        BattleResolution,
        MovementId,
        TrackerEvent,
    },
};
use tokio::time::{
    self,
    Duration,
};

#[tokio::test(start_paused = true)]
async fn speed_up__retires_the_movement_and_resolves_immediately() {
    // given: one second into a ten second march
    let ctx = TestContext::new();
    ctx.contract().set_travel_time(10);
    let (mut tracker, mut events) = ctx.tracker();
    let movement = tracker.initiate(ctx.bob()).await.unwrap();
    ctx.contract().advance_time(1);
    time::advance(Duration::from_secs(1)).await;

    // when
    let resolution = tracker.speed_up(movement.id).await.unwrap();

    // then
    assert!(matches!(resolution, BattleResolution::Executed(_)));
    assert!(tracker.movement(movement.id).is_none());
    assert_eq!(ctx.contract().speed_up_calls(), 1);
    assert_eq!(ctx.contract().execute_calls(), 1);
    let events = drain_events(&mut events);
    assert!(events
        .iter()
        .any(|ev| matches!(ev, TrackerEvent::MovementRemoved { .. })));
    assert_eq!(count_outcomes(&events), 1);
}

#[tokio::test(start_paused = true)]
async fn speed_up__unknown_movement_fails_not_found_and_submits_nothing() {
    // given
    let ctx = TestContext::new();
    let (mut tracker, _events) = ctx.tracker();

    // when
    let result = tracker.speed_up(MovementId(42)).await;

    // then
    assert!(matches!(result, Err(GameError::NotFound)));
    assert_eq!(ctx.contract().speed_up_calls(), 0);
    assert_eq!(ctx.contract().execute_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn speed_up__stale_movement_over_a_settled_battle_fails_not_found() {
    // given: the defender resolved the battle while our countdown ran
    let ctx = TestContext::new();
    ctx.contract().set_travel_time(5);
    let (mut tracker, mut events) = ctx.tracker();
    let movement = tracker.initiate(ctx.bob()).await.unwrap();
    ctx.contract().advance_time(6);
    let (mut defender, _defender_events) = ctx.tracker_for(ctx.bob());
    defender.resolve(movement.battle_id).await.unwrap();
    drain_events(&mut events);

    // when
    let result = tracker.speed_up(movement.id).await;

    // then: no payment, and the dead countdown is dropped
    assert!(matches!(result, Err(GameError::NotFound)));
    assert_eq!(ctx.contract().speed_up_calls(), 0);
    assert!(tracker.movement(movement.id).is_none());
    assert!(drain_events(&mut events)
        .iter()
        .any(|ev| matches!(ev, TrackerEvent::MovementRemoved { .. })));
}

#[tokio::test(start_paused = true)]
async fn speed_up__later_sweeps_never_re_execute_the_battle() {
    // given: sped up one second into a ten second march
    let ctx = TestContext::new();
    ctx.contract().set_travel_time(10);
    let (mut tracker, _events) = ctx.tracker();
    let movement = tracker.initiate(ctx.bob()).await.unwrap();
    ctx.contract().advance_time(1);
    time::advance(Duration::from_secs(1)).await;
    tracker.speed_up(movement.id).await.unwrap();
    assert_eq!(ctx.contract().execute_calls(), 1);

    // when: the original deadline passes and both schedulers run again
    ctx.contract().advance_time(20);
    time::advance(Duration::from_secs(11)).await;
    let outcomes = tracker.tick().await;
    let listing = tracker.list_active().await.unwrap();

    // then
    assert!(outcomes.is_empty());
    assert!(listing.is_empty());
    assert_eq!(ctx.contract().execute_calls(), 1);
}
