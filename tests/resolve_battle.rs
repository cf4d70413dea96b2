#![allow(non_snake_case)]

use khanate_client::{
    GameError,
    error::REVERT_ALREADY_RESOLVED,
    test_helpers::{
        TestContext,
        count_outcomes,
        drain_events,
    },
    tracker::{
        BattleResolution,
        TrackerEvent,
    },
};

#[tokio::test(start_paused = true)]
async fn resolve__before_the_deadline_fails_too_early_with_remaining_seconds() {
    // given
    let ctx = TestContext::new();
    ctx.contract().set_travel_time(10);
    let (mut tracker, _events) = ctx.tracker();
    let movement = tracker.initiate(ctx.bob()).await.unwrap();
    ctx.contract().advance_time(4);

    // when
    let result = tracker.resolve(movement.battle_id).await;

    // then
    match result {
        Err(GameError::TooEarly { remaining_secs }) => assert_eq!(remaining_secs, 6),
        other => panic!("expected TooEarly, got {other:?}"),
    }
    assert_eq!(ctx.contract().execute_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn resolve__after_the_deadline_executes_and_reports_the_outcome() {
    // given
    let ctx = TestContext::new();
    ctx.contract().set_travel_time(10);
    let (mut tracker, mut events) = ctx.tracker();
    let movement = tracker.initiate(ctx.bob()).await.unwrap();
    ctx.contract().advance_time(10);

    // when
    let resolution = tracker.resolve(movement.battle_id).await.unwrap();

    // then: Alice fields the stronger army in the seeded context
    let outcome = match resolution {
        BattleResolution::Executed(outcome) => outcome,
        BattleResolution::AlreadyResolved => panic!("expected an executed battle"),
    };
    assert_eq!(outcome.winner, ctx.alice());
    assert_eq!(outcome.loser, ctx.bob());
    assert!(outcome.experience_gained > 0);
    assert_eq!(ctx.contract().execute_calls(), 1);
    let events = drain_events(&mut events);
    assert_eq!(count_outcomes(&events), 1);
    assert!(events.iter().any(|ev| matches!(
        ev,
        TrackerEvent::BattleConcluded {
            victorious: true,
            ..
        }
    )));
}

#[tokio::test(start_paused = true)]
async fn resolve__second_attempt_reports_already_resolved_without_error() {
    // given
    let ctx = TestContext::new();
    ctx.contract().set_travel_time(10);
    let (mut tracker, mut events) = ctx.tracker();
    let movement = tracker.initiate(ctx.bob()).await.unwrap();
    ctx.contract().advance_time(10);
    tracker.resolve(movement.battle_id).await.unwrap();
    drain_events(&mut events);

    // when
    let second = tracker.resolve(movement.battle_id).await.unwrap();

    // then: exactly one execution happened and nothing new was emitted
    assert!(matches!(second, BattleResolution::AlreadyResolved));
    assert_eq!(ctx.contract().execute_calls(), 1);
    assert_eq!(count_outcomes(&drain_events(&mut events)), 0);
}

#[tokio::test(start_paused = true)]
async fn resolve__resolution_by_the_defender_is_terminal_for_the_attacker() {
    // given
    let ctx = TestContext::new();
    ctx.contract().set_travel_time(5);
    let (mut attacker, _attacker_events) = ctx.tracker();
    let movement = attacker.initiate(ctx.bob()).await.unwrap();
    ctx.contract().advance_time(5);

    // when: the defender executes first
    let (mut defender, mut defender_events) = ctx.tracker_for(ctx.bob());
    defender.resolve(movement.battle_id).await.unwrap();
    let attacker_result = attacker.resolve(movement.battle_id).await.unwrap();

    // then
    assert!(matches!(
        attacker_result,
        BattleResolution::AlreadyResolved
    ));
    assert_eq!(ctx.contract().execute_calls(), 1);
    let defender_view = drain_events(&mut defender_events);
    assert!(defender_view.iter().any(|ev| matches!(
        ev,
        TrackerEvent::BattleConcluded {
            victorious: false,
            ..
        }
    )));
}

#[tokio::test(start_paused = true)]
async fn resolve__already_resolved_revert_mid_flight_is_swallowed() {
    // given: the record read says open, but the execution reverts because a
    // competing resolution landed in between
    let ctx = TestContext::new();
    ctx.contract().set_travel_time(5);
    let (mut tracker, mut events) = ctx.tracker();
    let movement = tracker.initiate(ctx.bob()).await.unwrap();
    ctx.contract().advance_time(5);
    ctx.contract().fail_next_execute(REVERT_ALREADY_RESOLVED);
    drain_events(&mut events);

    // when
    let resolution = tracker.resolve(movement.battle_id).await.unwrap();

    // then: terminal success, no outcome notification
    assert!(matches!(resolution, BattleResolution::AlreadyResolved));
    assert_eq!(count_outcomes(&drain_events(&mut events)), 0);
}

#[tokio::test(start_paused = true)]
async fn resolve__unknown_battle_id_fails_not_found() {
    // given
    let ctx = TestContext::new();
    let (mut tracker, _events) = ctx.tracker();

    // when
    let result = tracker.resolve(99).await;

    // then
    assert!(matches!(result, Err(GameError::NotFound)));
    assert_eq!(ctx.contract().execute_calls(), 0);
}
