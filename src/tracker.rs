use crate::{
    error::{
        GameError,
        Result,
    },
    facade::KhanateContract,
    types::{
        ActiveBattle,
        BattleId,
        BattleOutcome,
        Position,
    },
};
use ethers::types::Address;
use std::collections::{
    BTreeSet,
    HashMap,
};
use tokio::{
    sync::mpsc::{
        UnboundedReceiver,
        UnboundedSender,
        unbounded_channel,
    },
    time::{
        Duration,
        Instant,
    },
};
use tracing::{
    debug,
    warn,
};

/// How long an active-battle listing stays valid before the chain is asked
/// again. Bounds request volume; callers inside the window get the cached
/// sequence.
pub const ACTIVE_CACHE_WINDOW: Duration = Duration::from_secs(5);

/// Client-local handle for an in-flight troop movement. Ids come from a
/// monotonic counter, so two battles started in the same instant still get
/// distinct ids.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct MovementId(pub u64);

impl std::fmt::Display for MovementId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Local presentation states laid over the remote battle lifecycle. "Done"
/// has no variant: a finished movement is simply absent from the registry.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MovementPhase {
    /// Countdown still running.
    Traveling,
    /// Deadline reached locally; resolution is about to be scheduled.
    Arriving,
    /// The resolution call is in flight.
    Resolving,
}

#[derive(Clone, Debug)]
pub struct Movement {
    pub id: MovementId,
    /// Correlation key into the on-chain battle record, stored at creation.
    /// Never re-derived by matching timings against the active list.
    pub battle_id: BattleId,
    pub origin: Position,
    pub destination: Position,
    pub started_at: Instant,
    /// Travel time sourced from the contract record, converted to a client
    /// duration. Local distance formulas never feed this field.
    pub duration: Duration,
    pub phase: MovementPhase,
}

impl Movement {
    pub fn remaining(&self, now: Instant) -> Duration {
        remaining_after(self.duration, now.duration_since(self.started_at))
    }

    pub fn is_due(&self, now: Instant) -> bool {
        self.remaining(now).is_zero()
    }

    /// Fraction of the journey completed, for marker interpolation.
    pub fn progress(&self, now: Instant) -> f64 {
        if self.duration.is_zero() {
            return 1.0;
        }
        let elapsed = now.duration_since(self.started_at).as_secs_f64();
        (elapsed / self.duration.as_secs_f64()).clamp(0.0, 1.0)
    }
}

fn remaining_after(duration: Duration, elapsed: Duration) -> Duration {
    duration.saturating_sub(elapsed)
}

/// Notifications for the presentation layer.
#[derive(Clone, Debug)]
pub enum TrackerEvent {
    MovementAdded { movement: Movement },
    /// Emitted when a movement leaves the registry, whether by arrival,
    /// speed-up or staleness. `destination` is where the battle animation
    /// belongs.
    MovementRemoved {
        movement_id: MovementId,
        battle_id: BattleId,
        destination: Position,
    },
    BattleConcluded {
        outcome: BattleOutcome,
        victorious: bool,
    },
}

/// How a resolution attempt ended. A battle somebody else already executed
/// is a terminal success, not an error.
#[derive(Clone, Debug)]
pub enum BattleResolution {
    Executed(BattleOutcome),
    AlreadyResolved,
}

struct ActiveCache {
    fetched_at: Instant,
    battles: Vec<ActiveBattle>,
}

/// Client-side mirror of "which battles are currently traveling".
///
/// Owns the movement registry and the active-battle cache outright; both are
/// reachable only through the operations below. All chain interaction is
/// caller-awaited, and the authoritative clock for every deadline decision
/// is the ledger's, never the local one.
pub struct BattleTracker<C> {
    contract: C,
    account: Address,
    movements: HashMap<MovementId, Movement>,
    next_movement_id: u64,
    /// Battle ids seen in the event history, not yet known to be resolved.
    known_battles: BTreeSet<BattleId>,
    /// First block the next event scan starts from.
    scan_cursor: u64,
    cache: Option<ActiveCache>,
    events: UnboundedSender<TrackerEvent>,
}

impl<C: KhanateContract> BattleTracker<C> {
    pub fn new(contract: C) -> (Self, UnboundedReceiver<TrackerEvent>) {
        let (events, receiver) = unbounded_channel();
        let account = contract.account();
        let tracker = Self {
            contract,
            account,
            movements: HashMap::new(),
            next_movement_id: 0,
            known_battles: BTreeSet::new(),
            scan_cursor: 0,
            cache: None,
            events,
        };
        (tracker, receiver)
    }

    pub fn account(&self) -> Address {
        self.account
    }

    pub fn movements(&self) -> impl Iterator<Item = &Movement> {
        self.movements.values()
    }

    pub fn movement(&self, movement_id: MovementId) -> Option<&Movement> {
        self.movements.get(&movement_id)
    }

    /// Starts a battle against `opponent` and registers the countdown for
    /// it. Preconditions are checked against a fresh (cache-bypassed)
    /// active-battle listing and the live Khanate stats.
    pub async fn initiate(&mut self, opponent: Address) -> Result<Movement> {
        let active = self.refresh_active().await?;
        if !active.is_empty() {
            return Err(GameError::Conflict);
        }

        let opponent_stats =
            self.contract.khanate_stats(opponent).await.map_err(|err| {
                if err.is_not_initialized() {
                    GameError::validation("invalid opponent or opponent has no Khanate")
                } else {
                    err
                }
            })?;
        let my_stats =
            self.contract
                .khanate_stats(self.account)
                .await
                .map_err(|err| {
                    if err.is_not_initialized() {
                        GameError::validation("create a Khanate before going to battle")
                    } else {
                        err
                    }
                })?;
        if !my_stats.has_troops() {
            return Err(GameError::validation("you have no troops to battle with"));
        }

        let battle_id = self.contract.initiate_battle(opponent).await?;
        // The travel time on the confirmed record is the only duration the
        // countdown may use.
        let record = self.contract.battle_record(battle_id).await?;
        let movement = self.register_movement(
            battle_id,
            my_stats.location,
            opponent_stats.location,
            Duration::from_secs(record.travel_time),
        );
        self.known_battles.insert(battle_id);
        self.cache = None;
        Ok(movement)
    }

    /// Unresolved battles involving this account, cached for
    /// [`ACTIVE_CACHE_WINDOW`]. Records past their deadline are resolved as
    /// a side effect rather than listed; a record whose resolution attempt
    /// fails is still reported active so the UI never claims a settled
    /// battle that is not.
    pub async fn list_active(&mut self) -> Result<Vec<ActiveBattle>> {
        if let Some(cache) = &self.cache {
            if cache.fetched_at.elapsed() < ACTIVE_CACHE_WINDOW {
                return Ok(cache.battles.clone());
            }
        }
        self.refresh_active().await
    }

    /// Executes a battle once its on-chain deadline has passed.
    ///
    /// Gated on chain time only. Returns `AlreadyResolved` when the record
    /// turned out settled or another party's execution landed first; that
    /// outcome must never surface as a user-facing failure.
    pub async fn resolve(&mut self, battle_id: BattleId) -> Result<BattleResolution> {
        let record = self.contract.battle_record(battle_id).await?;
        if !record.exists() {
            return Err(GameError::NotFound);
        }
        if record.resolved {
            self.forget_battle(battle_id);
            return Ok(BattleResolution::AlreadyResolved);
        }
        let now = self.contract.chain_time().await?;
        let deadline = record.deadline();
        if now < deadline {
            return Err(GameError::TooEarly {
                remaining_secs: deadline - now,
            });
        }
        match self.contract.execute_battle(battle_id).await {
            Ok(outcome) => {
                self.forget_battle(battle_id);
                let victorious = outcome.won_by(self.account);
                let _ = self.events.send(TrackerEvent::BattleConcluded {
                    outcome: outcome.clone(),
                    victorious,
                });
                Ok(BattleResolution::Executed(outcome))
            }
            Err(err) if err.is_already_resolved() => {
                self.forget_battle(battle_id);
                Ok(BattleResolution::AlreadyResolved)
            }
            Err(err) => Err(err),
        }
    }

    /// Pays the fixed fee to collapse a movement's remaining travel time,
    /// then resolves the battle without waiting for the natural deadline.
    ///
    /// Fails with `NotFound` before submitting anything when the movement is
    /// unknown or no open battle record backs it anymore.
    pub async fn speed_up(&mut self, movement_id: MovementId) -> Result<BattleResolution> {
        let battle_id = self
            .movements
            .get(&movement_id)
            .map(|m| m.battle_id)
            .ok_or(GameError::NotFound)?;
        let record = self.contract.battle_record(battle_id).await?;
        if !record.is_open() {
            // stale countdown over a settled battle: drop it, pay nothing
            self.retire_movement(movement_id);
            self.forget_battle(battle_id);
            return Err(GameError::NotFound);
        }
        self.contract.speed_up_battle(battle_id).await?;
        self.retire_movement(movement_id);
        self.cache = None;
        self.resolve(battle_id).await
    }

    /// Scheduling pass, run once per animation frame while movements are
    /// live. Retires movements whose countdown hit zero and attempts their
    /// resolution. Failures are logged and swallowed so nothing escapes into
    /// the render loop; the next active-battle sweep retries them.
    pub async fn tick(&mut self) -> Vec<BattleOutcome> {
        let now = Instant::now();
        let mut arriving: Vec<(MovementId, BattleId)> = Vec::new();
        for movement in self.movements.values_mut() {
            if movement.phase == MovementPhase::Traveling && movement.is_due(now) {
                movement.phase = MovementPhase::Arriving;
                arriving.push((movement.id, movement.battle_id));
            }
        }
        arriving.sort();

        let mut outcomes = Vec::new();
        for (movement_id, battle_id) in arriving {
            if let Some(movement) = self.movements.get_mut(&movement_id) {
                movement.phase = MovementPhase::Resolving;
            }
            let resolution = self.resolve(battle_id).await;
            // The movement is done locally either way; the remote record
            // stays the source of truth for the battle itself.
            self.retire_movement(movement_id);
            match resolution {
                Ok(BattleResolution::Executed(outcome)) => outcomes.push(outcome),
                Ok(BattleResolution::AlreadyResolved) => {}
                Err(err) => {
                    warn!(
                        %battle_id,
                        error = %err,
                        "resolution at deadline failed; the active-battle sweep will retry"
                    );
                }
            }
        }
        outcomes
    }

    /// Cache-bypassing listing used by `initiate` preconditions and cache
    /// misses. Performs the lazy sweep described on [`Self::list_active`].
    async fn refresh_active(&mut self) -> Result<Vec<ActiveBattle>> {
        self.scan_new_battles().await?;
        let now = self.contract.chain_time().await?;

        let mut active = Vec::new();
        let mut settled = Vec::new();
        let candidates: Vec<BattleId> = self.known_battles.iter().copied().collect();
        for battle_id in candidates {
            let record = self.contract.battle_record(battle_id).await?;
            if !record.is_open() {
                settled.push(battle_id);
                continue;
            }
            if now < record.deadline() {
                active.push(ActiveBattle { battle_id, record });
                continue;
            }
            match self.resolve(battle_id).await {
                Ok(_) => {
                    debug!(%battle_id, "resolved overdue battle during sweep");
                    settled.push(battle_id);
                }
                Err(err) => {
                    warn!(
                        %battle_id,
                        error = %err,
                        "lazy resolution failed; reporting battle as still active"
                    );
                    active.push(ActiveBattle { battle_id, record });
                }
            }
        }
        for battle_id in settled {
            self.known_battles.remove(&battle_id);
        }

        self.cache = Some(ActiveCache {
            fetched_at: Instant::now(),
            battles: active.clone(),
        });
        Ok(active)
    }

    /// Advances the event-scan cursor and records fresh battle ids that
    /// involve this account. Only blocks past the cursor are fetched.
    async fn scan_new_battles(&mut self) -> Result<()> {
        let (sightings, tip) = self
            .contract
            .battles_initiated_since(self.scan_cursor)
            .await?;
        for sighting in sightings {
            if sighting.attacker == self.account || sighting.defender == self.account {
                self.known_battles.insert(sighting.battle_id);
            }
        }
        self.scan_cursor = self.scan_cursor.max(tip.saturating_add(1));
        Ok(())
    }

    fn register_movement(
        &mut self,
        battle_id: BattleId,
        origin: Position,
        destination: Position,
        duration: Duration,
    ) -> Movement {
        self.next_movement_id += 1;
        let movement = Movement {
            id: MovementId(self.next_movement_id),
            battle_id,
            origin,
            destination,
            started_at: Instant::now(),
            duration,
            phase: MovementPhase::Traveling,
        };
        self.movements.insert(movement.id, movement.clone());
        let _ = self.events.send(TrackerEvent::MovementAdded {
            movement: movement.clone(),
        });
        movement
    }

    fn retire_movement(&mut self, movement_id: MovementId) {
        if let Some(movement) = self.movements.remove(&movement_id) {
            let _ = self.events.send(TrackerEvent::MovementRemoved {
                movement_id,
                battle_id: movement.battle_id,
                destination: movement.destination,
            });
        }
    }

    fn forget_battle(&mut self, battle_id: BattleId) {
        self.known_battles.remove(&battle_id);
        self.cache = None;
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn movement_ids__order_by_counter_value() {
        let mut ids = vec![MovementId(3), MovementId(1), MovementId(2)];
        ids.sort();
        assert_eq!(ids, vec![MovementId(1), MovementId(2), MovementId(3)]);
    }

    proptest! {
        #[test]
        fn remaining__never_increases_as_elapsed_grows(
            duration_ms in 0u64..120_000,
            offsets_ms in proptest::collection::vec(0u64..240_000, 1..32),
        ) {
            let mut offsets_ms = offsets_ms;
            offsets_ms.sort_unstable();
            let duration = Duration::from_millis(duration_ms);
            let mut last = duration;
            for offset in offsets_ms {
                let remaining = remaining_after(duration, Duration::from_millis(offset));
                prop_assert!(remaining <= last);
                last = remaining;
            }
        }

        #[test]
        fn remaining__is_zero_at_and_after_the_deadline(
            duration_ms in 0u64..120_000,
            past_ms in 0u64..120_000,
        ) {
            let duration = Duration::from_millis(duration_ms);
            let elapsed = duration + Duration::from_millis(past_ms);
            prop_assert!(remaining_after(duration, elapsed).is_zero());
        }
    }
}
