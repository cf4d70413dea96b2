#![allow(non_snake_case)]

use ethers::types::Address;
use khanate_client::{
    map::REGIONS,
    test_helpers::{
        TestContext,
        count_outcomes,
        drain_events,
    },
};
use tokio::time::{
    self,
    Duration,
};

#[tokio::test(start_paused = true)]
async fn list_active__returns_unresolved_battles_for_both_parties() {
    // given
    let ctx = TestContext::new();
    ctx.contract().set_travel_time(30);
    let (mut attacker, _events) = ctx.tracker();
    let movement = attacker.initiate(ctx.bob()).await.unwrap();

    // when
    let attacker_view = attacker.list_active().await.unwrap();
    let (mut defender, _defender_events) = ctx.tracker_for(ctx.bob());
    let defender_view = defender.list_active().await.unwrap();

    // then
    assert_eq!(attacker_view.len(), 1);
    assert_eq!(attacker_view[0].battle_id, movement.battle_id);
    assert!(attacker_view[0].record.involves(ctx.alice()));
    assert_eq!(defender_view.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn list_active__ignores_battles_between_other_players() {
    // given
    let ctx = TestContext::new();
    let carol = Address::repeat_byte(0xC0);
    ctx.contract()
        .register_khanate(carol, "Grey Horde", REGIONS[7], 4, 4);
    let (mut bob_tracker, _bob_events) = ctx.tracker_for(ctx.bob());
    bob_tracker.initiate(carol).await.unwrap();

    // when
    let (mut alice_tracker, _alice_events) = ctx.tracker();
    let visible = alice_tracker.list_active().await.unwrap();

    // then
    assert!(visible.is_empty());
}

#[tokio::test(start_paused = true)]
async fn list_active__serves_the_cached_listing_inside_the_window() {
    // given
    let ctx = TestContext::new();
    ctx.contract().set_travel_time(30);
    let (mut tracker, _events) = ctx.tracker();
    let movement = tracker.initiate(ctx.bob()).await.unwrap();
    let first = tracker.list_active().await.unwrap();
    assert_eq!(first.len(), 1);

    // when: the defender settles the battle, but the window has not expired
    ctx.contract().advance_time(30);
    let (mut defender, _defender_events) = ctx.tracker_for(ctx.bob());
    defender.resolve(movement.battle_id).await.unwrap();
    let cached = tracker.list_active().await.unwrap();

    // then: stale by design until the cache window passes
    assert_eq!(cached.len(), 1);

    // when
    time::advance(Duration::from_millis(5_100)).await;
    let refreshed = tracker.list_active().await.unwrap();

    // then
    assert!(refreshed.is_empty());
}

#[tokio::test(start_paused = true)]
async fn list_active__lazily_resolves_overdue_battles() {
    // given: a five second travel time, checked just after the deadline
    let ctx = TestContext::new();
    ctx.contract().set_travel_time(5);
    let (mut tracker, mut events) = ctx.tracker();
    tracker.initiate(ctx.bob()).await.unwrap();
    ctx.contract().advance_time(6);
    time::advance(Duration::from_millis(5_001)).await;

    // when
    let listing = tracker.list_active().await.unwrap();

    // then: the battle is settled as a side effect, not reported
    assert!(listing.is_empty());
    assert_eq!(ctx.contract().execute_calls(), 1);
    assert_eq!(count_outcomes(&drain_events(&mut events)), 1);
}

#[tokio::test(start_paused = true)]
async fn list_active__keeps_reporting_a_battle_whose_resolution_failed() {
    // given
    let ctx = TestContext::new();
    ctx.contract().set_travel_time(5);
    let (mut tracker, mut events) = ctx.tracker();
    let movement = tracker.initiate(ctx.bob()).await.unwrap();
    ctx.contract().advance_time(6);
    ctx.contract().fail_next_execute("out of gas");

    // when
    let listing = tracker.list_active().await.unwrap();

    // then: the UI must not claim the battle settled when it is not
    assert_eq!(listing.len(), 1);
    assert_eq!(listing[0].battle_id, movement.battle_id);
    assert_eq!(ctx.contract().execute_calls(), 1);
    assert_eq!(count_outcomes(&drain_events(&mut events)), 0);

    // when: the next sweep retries and succeeds
    time::advance(Duration::from_millis(5_100)).await;
    let retried = tracker.list_active().await.unwrap();

    // then
    assert!(retried.is_empty());
    assert_eq!(ctx.contract().execute_calls(), 2);
    assert_eq!(count_outcomes(&drain_events(&mut events)), 1);
}
