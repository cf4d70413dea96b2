//! In-memory stand-in for the remote ledger, plus a ready-made context for
//! integration tests. The fake mirrors the contract's observable behavior:
//! revert strings, zeroed records for unknown ids, one mined block per
//! transaction.

use crate::{
    error::{
        GameError,
        REVERT_ALREADY_RESOLVED,
        REVERT_KHANATE_EXISTS,
        REVERT_NOT_INITIALIZED,
        REVERT_STILL_TRAVELING,
        Result,
    },
    facade::KhanateContract,
    map::{
        REGIONS,
        Region,
    },
    tracker::{
        BattleTracker,
        TrackerEvent,
    },
    types::{
        AchievementSet,
        BattleId,
        BattleOutcome,
        BattleRecord,
        BattleSighting,
        BatyrAward,
        BatyrStats,
        KhanateFounding,
        KhanateStats,
        Position,
    },
};
use ethers::types::Address;
use std::{
    collections::{
        HashMap,
        VecDeque,
    },
    sync::{
        Arc,
        Mutex,
    },
};
use tokio::sync::mpsc::UnboundedReceiver;

pub const DEFAULT_TRAVEL_TIME: u64 = 10;
const BATTLE_EXPERIENCE: u64 = 50;

struct ChainState {
    now: u64,
    block: u64,
    travel_time: u64,
    roster: Vec<Address>,
    khanates: HashMap<Address, KhanateStats>,
    batyrs: HashMap<Address, Vec<u8>>,
    batyr_stats: HashMap<u8, BatyrStats>,
    achievements: HashMap<Address, AchievementSet>,
    battles: Vec<BattleRecord>,
    sightings: Vec<(u64, BattleSighting)>,
    foundings: Vec<(u64, KhanateFounding)>,
    lucky_box_queue: VecDeque<Option<BatyrAward>>,
    execute_calls: u64,
    speed_up_calls: u64,
    fail_next_execute: Option<String>,
}

impl ChainState {
    fn new() -> Self {
        let batyr_stats = default_batyrs()
            .into_iter()
            .enumerate()
            .map(|(i, stats)| (i as u8 + 1, stats))
            .collect();
        Self {
            now: 1_700_000_000,
            block: 1,
            travel_time: DEFAULT_TRAVEL_TIME,
            roster: Vec::new(),
            khanates: HashMap::new(),
            batyrs: HashMap::new(),
            batyr_stats,
            achievements: HashMap::new(),
            battles: Vec::new(),
            sightings: Vec::new(),
            foundings: Vec::new(),
            lucky_box_queue: VecDeque::new(),
            execute_calls: 0,
            speed_up_calls: 0,
            fail_next_execute: None,
        }
    }

    fn mine_block(&mut self) {
        self.block += 1;
    }

    fn last_mined_block(&self) -> u64 {
        self.block.saturating_sub(1)
    }

    fn power_of(&self, account: Address) -> u64 {
        self.khanates
            .get(&account)
            .map(|k| k.archers * 10 + k.cavalry * 20)
            .unwrap_or(0)
    }
}

fn default_batyrs() -> Vec<BatyrStats> {
    let raw: [(&str, &str, u64, u64, u64); 5] = [
        ("Kabanbay Batyr", "Master Strategist", 80, 120, 110),
        ("Bogenbay Batyr", "Cavalry Commander", 75, 100, 130),
        ("Nauryzbay Batyr", "Archer Captain", 70, 130, 100),
        ("Karasai Batyr", "Steppe Guardian", 85, 110, 115),
        ("Raiymbek Batyr", "Fearless Vanguard", 90, 115, 120),
    ];
    raw.into_iter()
        .map(
            |(name, ability, power, archer_bonus, cavalry_bonus)| BatyrStats {
                name: name.to_string(),
                ability: ability.to_string(),
                description: format!("{name}, {ability}"),
                power,
                archer_bonus,
                cavalry_bonus,
                can_battle: true,
            },
        )
        .collect()
}

/// Facade implementation over the shared in-memory ledger, bound to one
/// account. Clones share the same chain.
#[derive(Clone)]
pub struct FakeKhanate {
    state: Arc<Mutex<ChainState>>,
    account: Address,
}

impl FakeKhanate {
    pub fn new(account: Address) -> Self {
        Self {
            state: Arc::new(Mutex::new(ChainState::new())),
            account,
        }
    }

    /// A handle to the same chain acting as a different account.
    pub fn for_account(&self, account: Address) -> Self {
        Self {
            state: self.state.clone(),
            account,
        }
    }

    pub fn advance_time(&self, secs: u64) {
        let mut state = self.state.lock().unwrap();
        state.now += secs;
        state.mine_block();
    }

    pub fn set_travel_time(&self, secs: u64) {
        self.state.lock().unwrap().travel_time = secs;
    }

    pub fn register_khanate(
        &self,
        account: Address,
        name: &str,
        region: Region,
        archers: u64,
        cavalry: u64,
    ) {
        let mut state = self.state.lock().unwrap();
        state.khanates.insert(
            account,
            KhanateStats {
                name: name.to_string(),
                level: 1,
                experience: 0,
                archers,
                cavalry,
                location: region.position(),
            },
        );
        state.roster.push(account);
        let block = state.block;
        state.foundings.push((
            block,
            KhanateFounding {
                owner: account,
                name: name.to_string(),
            },
        ));
        state.mine_block();
    }

    pub fn grant_batyr(&self, account: Address, batyr_id: u8) {
        self.state
            .lock()
            .unwrap()
            .batyrs
            .entry(account)
            .or_default()
            .push(batyr_id);
    }

    pub fn set_achievements(&self, account: Address, achievements: AchievementSet) {
        self.state
            .lock()
            .unwrap()
            .achievements
            .insert(account, achievements);
    }

    pub fn queue_lucky_box(&self, award: Option<BatyrAward>) {
        self.state.lock().unwrap().lucky_box_queue.push_back(award);
    }

    /// The next `executeBattle` reverts with the given reason.
    pub fn fail_next_execute(&self, reason: &str) {
        self.state.lock().unwrap().fail_next_execute = Some(reason.to_string());
    }

    pub fn execute_calls(&self) -> u64 {
        self.state.lock().unwrap().execute_calls
    }

    pub fn speed_up_calls(&self) -> u64 {
        self.state.lock().unwrap().speed_up_calls
    }

    pub fn record_of(&self, battle_id: BattleId) -> BattleRecord {
        let state = self.state.lock().unwrap();
        battle_at(&state, battle_id)
    }
}

fn battle_at(state: &ChainState, battle_id: BattleId) -> BattleRecord {
    // the contract returns the zeroed struct for unknown ids
    if battle_id == 0 {
        return BattleRecord::default();
    }
    state
        .battles
        .get(battle_id as usize - 1)
        .copied()
        .unwrap_or_default()
}

impl KhanateContract for FakeKhanate {
    fn account(&self) -> Address {
        self.account
    }

    async fn chain_time(&self) -> Result<u64> {
        Ok(self.state.lock().unwrap().now)
    }

    async fn khanate_stats(&self, player: Address) -> Result<KhanateStats> {
        let state = self.state.lock().unwrap();
        state
            .khanates
            .get(&player)
            .cloned()
            .ok_or_else(|| GameError::remote(REVERT_NOT_INITIALIZED))
    }

    async fn create_khanate(&self, name: &str, location: Position) -> Result<()> {
        {
            let state = self.state.lock().unwrap();
            if state.khanates.contains_key(&self.account) {
                return Err(GameError::remote(REVERT_KHANATE_EXISTS));
            }
        }
        let region = REGIONS
            .iter()
            .find(|r| r.position() == location)
            .copied()
            .unwrap_or(REGIONS[0]);
        self.register_khanate(self.account, name, region, 0, 0);
        Ok(())
    }

    async fn purchase_troops(&self, archers: u64, cavalry: u64) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let khanate = state
            .khanates
            .get_mut(&self.account)
            .ok_or_else(|| GameError::remote(REVERT_NOT_INITIALIZED))?;
        khanate.archers += archers;
        khanate.cavalry += cavalry;
        state.mine_block();
        Ok(())
    }

    async fn active_khanates(&self) -> Result<Vec<Address>> {
        Ok(self.state.lock().unwrap().roster.clone())
    }

    async fn batyr_stats(&self, batyr_id: u8) -> Result<BatyrStats> {
        self.state
            .lock()
            .unwrap()
            .batyr_stats
            .get(&batyr_id)
            .cloned()
            .ok_or_else(|| GameError::remote("Invalid Batyr ID"))
    }

    async fn has_batyr(&self, player: Address, batyr_id: u8) -> Result<bool> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .batyrs
            .get(&player)
            .is_some_and(|owned| owned.contains(&batyr_id)))
    }

    async fn player_stats(&self, player: Address) -> Result<AchievementSet> {
        let state = self.state.lock().unwrap();
        if !state.khanates.contains_key(&player) {
            return Err(GameError::remote(REVERT_NOT_INITIALIZED));
        }
        Ok(state.achievements.get(&player).copied().unwrap_or_default())
    }

    async fn purchase_lucky_box(&self) -> Result<Option<BatyrAward>> {
        let mut state = self.state.lock().unwrap();
        if !state.khanates.contains_key(&self.account) {
            return Err(GameError::remote(REVERT_NOT_INITIALIZED));
        }
        let award = state.lucky_box_queue.pop_front().flatten();
        if let Some(award) = &award {
            state
                .batyrs
                .entry(self.account)
                .or_default()
                .push(award.batyr_id);
            let owned = state.batyrs[&self.account].len();
            if owned >= state.batyr_stats.len() {
                state.achievements.entry(self.account).or_default().collector = true;
            }
        }
        state.mine_block();
        Ok(award)
    }

    async fn battle_record(&self, battle_id: BattleId) -> Result<BattleRecord> {
        let state = self.state.lock().unwrap();
        Ok(battle_at(&state, battle_id))
    }

    async fn initiate_battle(&self, opponent: Address) -> Result<BattleId> {
        let mut state = self.state.lock().unwrap();
        if !state.khanates.contains_key(&self.account)
            || !state.khanates.contains_key(&opponent)
        {
            return Err(GameError::remote(REVERT_NOT_INITIALIZED));
        }
        let record = BattleRecord {
            attacker: self.account,
            defender: opponent,
            start_time: state.now,
            travel_time: state.travel_time,
            resolved: false,
        };
        state.battles.push(record);
        let battle_id = state.battles.len() as BattleId;
        let block = state.block;
        state.sightings.push((
            block,
            BattleSighting {
                battle_id,
                attacker: record.attacker,
                defender: record.defender,
            },
        ));
        state.mine_block();
        Ok(battle_id)
    }

    async fn execute_battle(&self, battle_id: BattleId) -> Result<BattleOutcome> {
        let mut state = self.state.lock().unwrap();
        state.execute_calls += 1;
        if let Some(reason) = state.fail_next_execute.take() {
            return Err(GameError::remote(reason));
        }
        let record = battle_at(&state, battle_id);
        if !record.exists() {
            return Err(GameError::remote("Battle does not exist"));
        }
        if record.resolved {
            return Err(GameError::remote(REVERT_ALREADY_RESOLVED));
        }
        if state.now < record.deadline() {
            return Err(GameError::remote(REVERT_STILL_TRAVELING));
        }

        let (winner, loser) = if state.power_of(record.attacker)
            >= state.power_of(record.defender)
        {
            (record.attacker, record.defender)
        } else {
            (record.defender, record.attacker)
        };
        state.battles[battle_id as usize - 1].resolved = true;
        if let Some(khanate) = state.khanates.get_mut(&winner) {
            khanate.experience += BATTLE_EXPERIENCE;
        }
        state.achievements.entry(winner).or_default().first_blood = true;
        state.mine_block();
        Ok(BattleOutcome {
            battle_id,
            winner,
            loser,
            experience_gained: BATTLE_EXPERIENCE,
        })
    }

    async fn speed_up_battle(&self, battle_id: BattleId) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.speed_up_calls += 1;
        let record = battle_at(&state, battle_id);
        if !record.is_open() {
            return Err(GameError::remote(REVERT_ALREADY_RESOLVED));
        }
        // collapse the remaining travel time so the battle is executable now
        let collapsed = state.now.saturating_sub(record.start_time);
        state.battles[battle_id as usize - 1].travel_time = collapsed;
        state.mine_block();
        Ok(())
    }

    async fn battles_initiated_since(
        &self,
        from_block: u64,
    ) -> Result<(Vec<BattleSighting>, u64)> {
        let state = self.state.lock().unwrap();
        let sightings = state
            .sightings
            .iter()
            .filter(|(block, _)| *block >= from_block)
            .map(|(_, sighting)| *sighting)
            .collect();
        Ok((sightings, state.last_mined_block()))
    }

    async fn khanates_created_since(
        &self,
        from_block: u64,
    ) -> Result<(Vec<KhanateFounding>, u64)> {
        let state = self.state.lock().unwrap();
        let foundings = state
            .foundings
            .iter()
            .filter(|(block, _)| *block >= from_block)
            .map(|(_, founding)| founding.clone())
            .collect();
        Ok((foundings, state.last_mined_block()))
    }
}

/// Two seeded Khanates on a shared fake chain, mirroring the usual local
/// test setup: Alice in the west with the stronger army, Bob in the south.
pub struct TestContext {
    contract: FakeKhanate,
    alice: Address,
    bob: Address,
}

impl TestContext {
    pub fn new() -> Self {
        let ctx = Self::new_without_khanates();
        ctx.contract
            .register_khanate(ctx.alice, "Golden Horde", REGIONS[0], 10, 5);
        ctx.contract
            .register_khanate(ctx.bob, "White Horde", REGIONS[4], 8, 3);
        ctx
    }

    pub fn new_without_khanates() -> Self {
        let alice = Address::repeat_byte(0xA1);
        let bob = Address::repeat_byte(0xB0);
        let contract = FakeKhanate::new(alice);
        Self {
            contract,
            alice,
            bob,
        }
    }

    pub fn alice(&self) -> Address {
        self.alice
    }

    pub fn bob(&self) -> Address {
        self.bob
    }

    /// Handle bound to Alice.
    pub fn contract(&self) -> FakeKhanate {
        self.contract.clone()
    }

    pub fn contract_for(&self, account: Address) -> FakeKhanate {
        self.contract.for_account(account)
    }

    pub fn tracker(
        &self,
    ) -> (
        BattleTracker<FakeKhanate>,
        UnboundedReceiver<TrackerEvent>,
    ) {
        BattleTracker::new(self.contract())
    }

    pub fn tracker_for(
        &self,
        account: Address,
    ) -> (
        BattleTracker<FakeKhanate>,
        UnboundedReceiver<TrackerEvent>,
    ) {
        BattleTracker::new(self.contract_for(account))
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Collects everything currently queued on a tracker event channel.
pub fn drain_events(receiver: &mut UnboundedReceiver<TrackerEvent>) -> Vec<TrackerEvent> {
    let mut events = Vec::new();
    while let Ok(event) = receiver.try_recv() {
        events.push(event);
    }
    events
}

pub fn count_outcomes(events: &[TrackerEvent]) -> usize {
    events
        .iter()
        .filter(|event| matches!(event, TrackerEvent::BattleConcluded { .. }))
        .count()
}
