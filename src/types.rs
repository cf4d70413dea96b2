use ethers::types::Address;

pub type BattleId = u64;

/// Map coordinates in percent-of-map units, as stored on chain.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Position {
    pub x: u8,
    pub y: u8,
}

impl Position {
    pub fn new(x: u8, y: u8) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: Position) -> f64 {
        let dx = f64::from(self.x) - f64::from(other.x);
        let dy = f64::from(self.y) - f64::from(other.y);
        (dx * dx + dy * dy).sqrt()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct KhanateStats {
    pub name: String,
    pub level: u64,
    pub experience: u64,
    pub archers: u64,
    pub cavalry: u64,
    pub location: Position,
}

impl KhanateStats {
    pub fn has_troops(&self) -> bool {
        self.archers > 0 || self.cavalry > 0
    }
}

/// Mirror of the on-chain battle record. Read-only on this side; the ledger
/// owns every transition.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct BattleRecord {
    pub attacker: Address,
    pub defender: Address,
    /// Chain timestamp (seconds) when the battle was initiated.
    pub start_time: u64,
    /// Travel duration in seconds, decided by the contract.
    pub travel_time: u64,
    pub resolved: bool,
}

impl BattleRecord {
    /// Chain time at which `executeBattle` becomes legal.
    pub fn deadline(&self) -> u64 {
        self.start_time.saturating_add(self.travel_time)
    }

    pub fn involves(&self, account: Address) -> bool {
        self.attacker == account || self.defender == account
    }

    /// A zeroed record means the id was never assigned; the contract returns
    /// the default struct for unknown ids rather than reverting.
    pub fn exists(&self) -> bool {
        self.attacker != Address::zero()
    }

    pub fn is_open(&self) -> bool {
        self.exists() && !self.resolved
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ActiveBattle {
    pub battle_id: BattleId,
    pub record: BattleRecord,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BattleOutcome {
    pub battle_id: BattleId,
    pub winner: Address,
    pub loser: Address,
    pub experience_gained: u64,
}

impl BattleOutcome {
    pub fn won_by(&self, account: Address) -> bool {
        self.winner == account
    }
}

/// A battle id sighted in the `BattleInitiated` event history.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct BattleSighting {
    pub battle_id: BattleId,
    pub attacker: Address,
    pub defender: Address,
}

/// A `KhanateCreated` event from the history scan.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct KhanateFounding {
    pub owner: Address,
    pub name: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct BatyrStats {
    pub name: String,
    pub ability: String,
    pub description: String,
    pub power: u64,
    /// Percentage with a 100 baseline: 120 means +20% to archers.
    pub archer_bonus: u64,
    pub cavalry_bonus: u64,
    pub can_battle: bool,
}

/// Emitted by the contract when a lucky box grants a hero.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BatyrAward {
    pub batyr_id: u8,
    pub name: String,
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Achievement {
    FirstBlood,
    Veteran,
    Warlord,
    Defender,
    Collector,
}

impl Achievement {
    pub const ALL: [Achievement; 5] = [
        Achievement::FirstBlood,
        Achievement::Veteran,
        Achievement::Warlord,
        Achievement::Defender,
        Achievement::Collector,
    ];

    pub fn title(&self) -> &'static str {
        match self {
            Achievement::FirstBlood => "First Blood",
            Achievement::Veteran => "Veteran",
            Achievement::Warlord => "Warlord",
            Achievement::Defender => "Stalwart Defender",
            Achievement::Collector => "Batyr Collector",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Achievement::FirstBlood => "Win your first battle",
            Achievement::Veteran => "Win 10 battles",
            Achievement::Warlord => "Win 50 battles",
            Achievement::Defender => "Successfully defend 5 times",
            Achievement::Collector => "Collect all Batyrs",
        }
    }
}

/// Achievement flags, always read wholesale from the contract. There are no
/// partial updates; a fresh set replaces the previous one.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct AchievementSet {
    pub first_blood: bool,
    pub veteran: bool,
    pub warlord: bool,
    pub defender: bool,
    pub collector: bool,
}

impl AchievementSet {
    pub fn earned(&self, achievement: Achievement) -> bool {
        match achievement {
            Achievement::FirstBlood => self.first_blood,
            Achievement::Veteran => self.veteran,
            Achievement::Warlord => self.warlord,
            Achievement::Defender => self.defender,
            Achievement::Collector => self.collector,
        }
    }

    pub fn entries(&self) -> Vec<(Achievement, bool)> {
        Achievement::ALL
            .into_iter()
            .map(|a| (a, self.earned(a)))
            .collect()
    }

    /// Achievements present in `self` but not in `previous`.
    pub fn newly_earned(&self, previous: &AchievementSet) -> Vec<Achievement> {
        Achievement::ALL
            .into_iter()
            .filter(|a| self.earned(*a) && !previous.earned(*a))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;

    #[test]
    fn deadline__saturates_instead_of_overflowing() {
        // given
        let record = BattleRecord {
            attacker: Address::repeat_byte(1),
            defender: Address::repeat_byte(2),
            start_time: u64::MAX - 1,
            travel_time: 10,
            resolved: false,
        };

        // then
        assert_eq!(record.deadline(), u64::MAX);
    }

    #[test]
    fn exists__is_false_for_the_zeroed_record() {
        assert!(!BattleRecord::default().exists());
        assert!(!BattleRecord::default().is_open());
    }

    #[test]
    fn newly_earned__reports_only_fresh_flags() {
        // given
        let previous = AchievementSet {
            first_blood: true,
            ..Default::default()
        };
        let current = AchievementSet {
            first_blood: true,
            veteran: true,
            ..Default::default()
        };

        // when
        let fresh = current.newly_earned(&previous);

        // then
        assert_eq!(fresh, vec![Achievement::Veteran]);
    }
}
