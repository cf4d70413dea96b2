use crate::{
    error::{
        GameError,
        Result,
        revert_reason,
    },
    khanate_types::{
        BattleInitiatedFilter,
        BattleResultFilter,
        BatyrAcquiredFilter,
        KazakhKhanate,
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
use ethers::{
    abi::RawLog,
    contract::{
        ContractError,
        EthLogDecode,
        builders::ContractCall,
    },
    providers::Middleware,
    types::{
        Address,
        BlockNumber,
        TransactionReceipt,
        U64,
        U256,
    },
};
use std::{
    fmt::Display,
    sync::Arc,
};
use tracing::debug;

/// Fixed fees in wei, matching the contract's pricing.
pub const ARCHER_COST_WEI: u64 = 10_000_000_000_000_000; // 0.01 ether
pub const CAVALRY_COST_WEI: u64 = 20_000_000_000_000_000; // 0.02 ether
pub const LUCKY_BOX_FEE_WEI: u64 = 100_000_000_000_000_000; // 0.1 ether
pub const SPEED_UP_FEE_WEI: u64 = 300_000_000_000_000_000; // 0.3 ether

/// Number of collectible Batyr heroes the contract defines.
pub const BATYR_COUNT: u8 = 5;

/// Typed surface over the six game calls plus the view and event-history
/// queries the client depends on. The remote ledger owns every state
/// transition; implementations only relay.
pub trait KhanateContract {
    /// The account this handle signs and filters for.
    fn account(&self) -> Address;

    /// Latest block timestamp in seconds. This is the authoritative clock
    /// for every deadline decision.
    async fn chain_time(&self) -> Result<u64>;

    async fn khanate_stats(&self, player: Address) -> Result<KhanateStats>;
    async fn create_khanate(&self, name: &str, location: Position) -> Result<()>;
    async fn purchase_troops(&self, archers: u64, cavalry: u64) -> Result<()>;
    async fn active_khanates(&self) -> Result<Vec<Address>>;

    async fn batyr_stats(&self, batyr_id: u8) -> Result<BatyrStats>;
    async fn has_batyr(&self, player: Address, batyr_id: u8) -> Result<bool>;
    async fn player_stats(&self, player: Address) -> Result<AchievementSet>;
    async fn purchase_lucky_box(&self) -> Result<Option<BatyrAward>>;

    async fn battle_record(&self, battle_id: BattleId) -> Result<BattleRecord>;
    async fn initiate_battle(&self, opponent: Address) -> Result<BattleId>;
    async fn execute_battle(&self, battle_id: BattleId) -> Result<BattleOutcome>;
    async fn speed_up_battle(&self, battle_id: BattleId) -> Result<()>;

    /// `BattleInitiated` sightings at or after `from_block`, plus the tip
    /// block the scan covered. Callers keep the tip as an incremental
    /// cursor instead of re-reading history from genesis.
    async fn battles_initiated_since(
        &self,
        from_block: u64,
    ) -> Result<(Vec<BattleSighting>, u64)>;

    /// `KhanateCreated` events at or after `from_block`, plus the scanned
    /// tip block.
    async fn khanates_created_since(
        &self,
        from_block: u64,
    ) -> Result<(Vec<KhanateFounding>, u64)>;
}

#[derive(Clone, Debug, PartialEq)]
pub enum KhanateStatus {
    Ready(KhanateStats),
    NotCreated,
}

/// Routes the contract's "not initialized" revert into the creation flow;
/// any other failure propagates.
pub async fn khanate_status<C: KhanateContract>(contract: &C) -> Result<KhanateStatus> {
    match contract.khanate_stats(contract.account()).await {
        Ok(stats) => Ok(KhanateStatus::Ready(stats)),
        Err(err) if err.is_not_initialized() => Ok(KhanateStatus::NotCreated),
        Err(err) => Err(err),
    }
}

/// The production implementation: an abigen binding over JSON-RPC. Every
/// mutating call sets `from`, awaits the receipt and checks its status.
pub struct EvmKhanate<M> {
    contract: KazakhKhanate<M>,
    account: Address,
}

impl<M> Clone for EvmKhanate<M> {
    fn clone(&self) -> Self {
        Self {
            contract: self.contract.clone(),
            account: self.account,
        }
    }
}

impl<M: Middleware + 'static> EvmKhanate<M> {
    pub fn new(contract_address: Address, client: Arc<M>, account: Address) -> Self {
        Self {
            contract: KazakhKhanate::new(contract_address, client),
            account,
        }
    }

    pub fn contract_address(&self) -> Address {
        self.contract.address()
    }

    async fn send(&self, call: ContractCall<M, ()>) -> Result<TransactionReceipt> {
        let call = call.from(self.account);
        let pending = call
            .send()
            .await
            .map_err(into_game_error)?;
        let receipt = pending
            .await
            .map_err(remote_from)?
            .ok_or_else(|| GameError::remote("transaction dropped before it was mined"))?;
        if receipt.status == Some(U64::zero()) {
            return Err(GameError::remote_opaque());
        }
        Ok(receipt)
    }
}

impl<M: Middleware + 'static> KhanateContract for EvmKhanate<M> {
    fn account(&self) -> Address {
        self.account
    }

    async fn chain_time(&self) -> Result<u64> {
        let block = self
            .contract
            .client()
            .get_block(BlockNumber::Latest)
            .await
            .map_err(remote_from)?
            .ok_or_else(|| GameError::remote("provider returned no latest block"))?;
        Ok(sat_u64(block.timestamp))
    }

    async fn khanate_stats(&self, player: Address) -> Result<KhanateStats> {
        let (name, level, experience, archers, cavalry, x, y) = self
            .contract
            .get_khanate_stats(player)
            .call()
            .await
            .map_err(into_game_error)?;
        Ok(KhanateStats {
            name,
            level: sat_u64(level),
            experience: sat_u64(experience),
            archers: sat_u64(archers),
            cavalry: sat_u64(cavalry),
            location: Position::new(x, y),
        })
    }

    async fn create_khanate(&self, name: &str, location: Position) -> Result<()> {
        let call = self
            .contract
            .create_khanate(name.to_string(), location.x, location.y);
        self.send(call).await?;
        Ok(())
    }

    async fn purchase_troops(&self, archers: u64, cavalry: u64) -> Result<()> {
        let cost = U256::from(archers) * U256::from(ARCHER_COST_WEI)
            + U256::from(cavalry) * U256::from(CAVALRY_COST_WEI);
        let call = self
            .contract
            .purchase_troops(U256::from(archers), U256::from(cavalry))
            .value(cost);
        self.send(call).await?;
        Ok(())
    }

    async fn active_khanates(&self) -> Result<Vec<Address>> {
        self.contract
            .get_active_khanates()
            .call()
            .await
            .map_err(into_game_error)
    }

    async fn batyr_stats(&self, batyr_id: u8) -> Result<BatyrStats> {
        let (name, ability, description, power, archer_bonus, cavalry_bonus, can_battle) =
            self.contract
                .get_batyr_stats(batyr_id)
                .call()
                .await
                .map_err(into_game_error)?;
        Ok(BatyrStats {
            name,
            ability,
            description,
            power: sat_u64(power),
            archer_bonus: sat_u64(archer_bonus),
            cavalry_bonus: sat_u64(cavalry_bonus),
            can_battle,
        })
    }

    async fn has_batyr(&self, player: Address, batyr_id: u8) -> Result<bool> {
        self.contract
            .has_batyr(player, batyr_id)
            .call()
            .await
            .map_err(into_game_error)
    }

    async fn player_stats(&self, player: Address) -> Result<AchievementSet> {
        let (first_blood, veteran, warlord, defender, collector) = self
            .contract
            .get_player_stats(player)
            .call()
            .await
            .map_err(into_game_error)?;
        Ok(AchievementSet {
            first_blood,
            veteran,
            warlord,
            defender,
            collector,
        })
    }

    async fn purchase_lucky_box(&self) -> Result<Option<BatyrAward>> {
        let call = self.contract.purchase_lucky_box().value(LUCKY_BOX_FEE_WEI);
        let receipt = self.send(call).await?;
        Ok(
            decode_receipt_event::<BatyrAcquiredFilter>(&receipt).map(|ev| BatyrAward {
                batyr_id: ev.batyr_id,
                name: ev.name,
            }),
        )
    }

    async fn battle_record(&self, battle_id: BattleId) -> Result<BattleRecord> {
        let (attacker, defender, start_time, travel_time, resolved) = self
            .contract
            .active_battles(U256::from(battle_id))
            .call()
            .await
            .map_err(into_game_error)?;
        Ok(BattleRecord {
            attacker,
            defender,
            start_time: sat_u64(start_time),
            travel_time: sat_u64(travel_time),
            resolved,
        })
    }

    async fn initiate_battle(&self, opponent: Address) -> Result<BattleId> {
        let receipt = self.send(self.contract.initiate_battle(opponent)).await?;
        let event = decode_receipt_event::<BattleInitiatedFilter>(&receipt)
            .ok_or_else(|| GameError::remote("no BattleInitiated event in receipt"))?;
        Ok(sat_u64(event.battle_id))
    }

    async fn execute_battle(&self, battle_id: BattleId) -> Result<BattleOutcome> {
        let receipt = self
            .send(self.contract.execute_battle(U256::from(battle_id)))
            .await?;
        let event = decode_receipt_event::<BattleResultFilter>(&receipt)
            .ok_or_else(|| GameError::remote("no BattleResult event in receipt"))?;
        Ok(BattleOutcome {
            battle_id,
            winner: event.winner,
            loser: event.loser,
            experience_gained: sat_u64(event.experience_gained),
        })
    }

    async fn speed_up_battle(&self, battle_id: BattleId) -> Result<()> {
        let call = self
            .contract
            .speed_up_battle(U256::from(battle_id))
            .value(SPEED_UP_FEE_WEI);
        self.send(call).await?;
        Ok(())
    }

    async fn battles_initiated_since(
        &self,
        from_block: u64,
    ) -> Result<(Vec<BattleSighting>, u64)> {
        let tip = self
            .contract
            .client()
            .get_block_number()
            .await
            .map_err(remote_from)?
            .as_u64();
        if tip < from_block {
            return Ok((Vec::new(), tip));
        }
        let events = self
            .contract
            .battle_initiated_filter()
            .from_block(from_block)
            .to_block(tip)
            .query()
            .await
            .map_err(into_game_error)?;
        let sightings = events
            .into_iter()
            .map(|ev| BattleSighting {
                battle_id: sat_u64(ev.battle_id),
                attacker: ev.attacker,
                defender: ev.defender,
            })
            .collect();
        Ok((sightings, tip))
    }

    async fn khanates_created_since(
        &self,
        from_block: u64,
    ) -> Result<(Vec<KhanateFounding>, u64)> {
        let tip = self
            .contract
            .client()
            .get_block_number()
            .await
            .map_err(remote_from)?
            .as_u64();
        if tip < from_block {
            return Ok((Vec::new(), tip));
        }
        let events = self
            .contract
            .khanate_created_filter()
            .from_block(from_block)
            .to_block(tip)
            .query()
            .await
            .map_err(into_game_error)?;
        let foundings = events
            .into_iter()
            .map(|ev| KhanateFounding {
                owner: ev.owner,
                name: ev.name,
            })
            .collect();
        Ok((foundings, tip))
    }
}

fn into_game_error<M: Middleware>(err: ContractError<M>) -> GameError {
    if let Some(reason) = err.decode_revert::<String>() {
        return GameError::remote(reason);
    }
    match revert_reason(&err.to_string()) {
        Some(reason) => GameError::remote(reason),
        None => {
            debug!(error = %err, "unclassified contract error");
            GameError::remote_opaque()
        }
    }
}

fn remote_from<E: Display>(err: E) -> GameError {
    let message = err.to_string();
    match revert_reason(&message) {
        Some(reason) => GameError::remote(reason),
        None => GameError::remote(message),
    }
}

fn decode_receipt_event<E: EthLogDecode>(receipt: &TransactionReceipt) -> Option<E> {
    receipt.logs.iter().find_map(|log| {
        let raw = RawLog {
            topics: log.topics.clone(),
            data: log.data.to_vec(),
        };
        E::decode_log(&raw).ok()
    })
}

fn sat_u64(value: U256) -> u64 {
    if value > U256::from(u64::MAX) {
        u64::MAX
    } else {
        value.as_u64()
    }
}
