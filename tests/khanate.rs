#![allow(non_snake_case)]

use khanate_client::{
    batyrs::BatyrRoster,
    facade::{
        KhanateContract,
        KhanateStatus,
        khanate_status,
    },
    map::REGIONS,
    test_helpers::TestContext,
    types::{
        Achievement,
        BatyrAward,
    },
};

#[tokio::test]
async fn khanate_status__fresh_account_routes_to_creation() {
    // given
    let ctx = TestContext::new_without_khanates();

    // when
    let status = khanate_status(&ctx.contract()).await.unwrap();

    // then: "not initialized" is a creation prompt, not an error
    assert_eq!(status, KhanateStatus::NotCreated);
}

#[tokio::test]
async fn khanate_status__existing_account_reports_its_stats() {
    // given
    let ctx = TestContext::new();

    // when
    let status = khanate_status(&ctx.contract()).await.unwrap();

    // then
    match status {
        KhanateStatus::Ready(stats) => {
            assert_eq!(stats.name, "Golden Horde");
            assert!(stats.has_troops());
        }
        KhanateStatus::NotCreated => panic!("expected an existing Khanate"),
    }
}

#[tokio::test]
async fn create_khanate__registers_and_emits_a_founding_event() {
    // given
    let ctx = TestContext::new_without_khanates();
    let contract = ctx.contract();

    // when
    contract
        .create_khanate("Nomad Horde", REGIONS[2].position())
        .await
        .unwrap();

    // then
    let status = khanate_status(&contract).await.unwrap();
    assert!(matches!(status, KhanateStatus::Ready(stats) if stats.name == "Nomad Horde"));
    let (foundings, _tip) = contract.khanates_created_since(0).await.unwrap();
    assert!(foundings
        .iter()
        .any(|f| f.owner == ctx.alice() && f.name == "Nomad Horde"));
}

#[tokio::test]
async fn create_khanate__rejects_a_duplicate() {
    // given
    let ctx = TestContext::new();

    // when
    let result = ctx
        .contract()
        .create_khanate("Second Horde", REGIONS[1].position())
        .await;

    // then
    let err = result.unwrap_err();
    assert!(err.is_khanate_exists());
}

#[tokio::test]
async fn khanates_created_since__cursor_skips_already_seen_events() {
    // given
    let ctx = TestContext::new();
    let contract = ctx.contract();

    // when
    let (all, tip) = contract.khanates_created_since(0).await.unwrap();
    let (none, _tip) = contract.khanates_created_since(tip + 1).await.unwrap();

    // then
    assert_eq!(all.len(), 2);
    assert!(none.is_empty());
}

#[tokio::test]
async fn purchase_troops__adds_to_the_khanate() {
    // given
    let ctx = TestContext::new();
    let contract = ctx.contract();

    // when
    contract.purchase_troops(3, 2).await.unwrap();

    // then
    let stats = contract.khanate_stats(ctx.alice()).await.unwrap();
    assert_eq!(stats.archers, 13);
    assert_eq!(stats.cavalry, 7);
}

#[tokio::test]
async fn purchase_troops__requires_a_khanate() {
    // given
    let ctx = TestContext::new_without_khanates();

    // when
    let result = ctx.contract().purchase_troops(1, 0).await;

    // then
    assert!(result.unwrap_err().is_not_initialized());
}

#[tokio::test]
async fn lucky_box__returns_the_awarded_batyr() {
    // given
    let ctx = TestContext::new();
    ctx.contract().queue_lucky_box(Some(BatyrAward {
        batyr_id: 2,
        name: "Bogenbay Batyr".to_string(),
    }));
    let mut roster = BatyrRoster::new(ctx.contract());

    // when
    let award = roster.open_lucky_box().await.unwrap();

    // then
    assert_eq!(award.unwrap().batyr_id, 2);
    let owned = roster.owned_batyrs().await.unwrap();
    assert!(owned.iter().any(|(id, _)| *id == 2));
}

#[tokio::test]
async fn lucky_box__can_come_up_empty() {
    // given
    let ctx = TestContext::new();
    let mut roster = BatyrRoster::new(ctx.contract());

    // when: nothing queued means the contract granted nothing
    let award = roster.open_lucky_box().await.unwrap();

    // then
    assert!(award.is_none());
    assert!(roster.owned_batyrs().await.unwrap().is_empty());
}

#[tokio::test]
async fn achievements__collecting_every_batyr_unlocks_the_collector_badge() {
    // given
    let ctx = TestContext::new();
    for batyr_id in 1..=4 {
        ctx.contract().grant_batyr(ctx.alice(), batyr_id);
    }
    ctx.contract().queue_lucky_box(Some(BatyrAward {
        batyr_id: 5,
        name: "Raiymbek Batyr".to_string(),
    }));
    let mut roster = BatyrRoster::new(ctx.contract());
    roster.refresh_achievements().await.unwrap();

    // when
    roster.open_lucky_box().await.unwrap();
    let newly = roster.refresh_achievements().await.unwrap();

    // then
    assert!(newly.contains(&Achievement::Collector));
    assert!(roster.achievements().collector);
}

#[tokio::test]
async fn total_power__applies_batyr_bonuses_over_the_base_army() {
    // given: 10 archers and 5 cavalry, plus a hero at +20%/+10%
    let ctx = TestContext::new();
    ctx.contract().grant_batyr(ctx.alice(), 1);
    let roster = BatyrRoster::new(ctx.contract());

    // when
    let bonuses = roster.batyr_bonuses(ctx.alice()).await.unwrap();
    let power = roster.total_power(ctx.alice()).await.unwrap();

    // then: 200 base scaled by (1 + 30/200)
    assert_eq!(bonuses.archer_pct, 20);
    assert_eq!(bonuses.cavalry_pct, 10);
    assert_eq!(power, 230);
}

#[tokio::test]
async fn achievements__refresh_tolerates_a_missing_khanate() {
    // given
    let ctx = TestContext::new_without_khanates();
    let mut roster = BatyrRoster::new(ctx.contract());

    // when
    let newly = roster.refresh_achievements().await.unwrap();

    // then
    assert!(newly.is_empty());
    assert!(!roster.achievements().first_blood);
}
