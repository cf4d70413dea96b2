use crate::{
    error::Result,
    facade::{
        BATYR_COUNT,
        KhanateContract,
    },
    types::{
        Achievement,
        AchievementSet,
        BatyrAward,
        BatyrStats,
    },
};
use ethers::types::Address;
use futures::future::join_all;
use tracing::debug;

pub const ARCHER_POWER: u64 = 10;
pub const CAVALRY_POWER: u64 = 20;

/// Net percentage bonuses over the 100 baseline, summed across owned heroes.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct TroopBonuses {
    pub archer_pct: i64,
    pub cavalry_pct: i64,
}

/// Hero collection and achievement cache for one account. Achievements are
/// only ever read wholesale; a fresh set replaces the cached one.
pub struct BatyrRoster<C> {
    contract: C,
    achievements: AchievementSet,
}

impl<C: KhanateContract> BatyrRoster<C> {
    pub fn new(contract: C) -> Self {
        Self {
            contract,
            achievements: AchievementSet::default(),
        }
    }

    pub fn achievements(&self) -> &AchievementSet {
        &self.achievements
    }

    /// Re-reads the full achievement set and returns the badges earned since
    /// the previous read. An account without a Khanate simply has none yet.
    pub async fn refresh_achievements(&mut self) -> Result<Vec<Achievement>> {
        let account = self.contract.account();
        match self.contract.player_stats(account).await {
            Ok(fresh) => {
                let newly = fresh.newly_earned(&self.achievements);
                self.achievements = fresh;
                Ok(newly)
            }
            Err(err) if err.is_not_initialized() => {
                debug!("no achievements yet; Khanate not created");
                Ok(Vec::new())
            }
            Err(err) => Err(err),
        }
    }

    pub async fn owned_batyrs(&self) -> Result<Vec<(u8, BatyrStats)>> {
        let account = self.contract.account();
        let checks =
            join_all((1..=BATYR_COUNT).map(|id| self.contract.has_batyr(account, id)))
                .await;
        let mut owned = Vec::new();
        for (index, check) in checks.into_iter().enumerate() {
            let batyr_id = index as u8 + 1;
            if check? {
                owned.push((batyr_id, self.contract.batyr_stats(batyr_id).await?));
            }
        }
        Ok(owned)
    }

    pub async fn batyr_bonuses(&self, account: Address) -> Result<TroopBonuses> {
        let mut bonuses = TroopBonuses::default();
        for batyr_id in 1..=BATYR_COUNT {
            if self.contract.has_batyr(account, batyr_id).await? {
                let stats = self.contract.batyr_stats(batyr_id).await?;
                bonuses.archer_pct += stats.archer_bonus as i64 - 100;
                bonuses.cavalry_pct += stats.cavalry_bonus as i64 - 100;
            }
        }
        Ok(bonuses)
    }

    /// Display-only strength estimate. The contract runs its own battle
    /// math; this mirrors it for opponent previews.
    pub async fn total_power(&self, account: Address) -> Result<u64> {
        let stats = self.contract.khanate_stats(account).await?;
        let base = stats.archers * ARCHER_POWER + stats.cavalry * CAVALRY_POWER;
        let bonuses = self.batyr_bonuses(account).await?;
        let scaled = base as f64
            * (1.0 + (bonuses.archer_pct + bonuses.cavalry_pct) as f64 / 200.0);
        Ok(scaled.round().max(0.0) as u64)
    }

    /// Pays the fixed fee for a lucky box. The contract rolls the dice; an
    /// empty receipt means an empty box.
    pub async fn open_lucky_box(&mut self) -> Result<Option<BatyrAward>> {
        self.contract.purchase_lucky_box().await
    }
}
