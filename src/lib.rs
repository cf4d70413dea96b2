pub mod batyrs;
pub mod deployment;
pub mod error;
pub mod facade;
pub mod gateway;
pub mod map;
pub mod quotes;
pub mod test_helpers;
pub mod tracker;
pub mod types;
pub mod wallets;

pub use error::{
    GameError,
    Result,
};

pub mod khanate_types {
    use ethers::prelude::abigen;

    abigen!(
        KazakhKhanate,
        r#"[
            function createKhanate(string name, uint8 locationX, uint8 locationY)
            function purchaseTroops(uint256 archers, uint256 cavalry) payable
            function purchaseLuckyBox() payable
            function initiateBattle(address opponent)
            function executeBattle(uint256 battleId)
            function speedUpBattle(uint256 battleId) payable
            function getKhanateStats(address player) view returns (string, uint256, uint256, uint256, uint256, uint8, uint8)
            function getBatyrStats(uint8 batyrId) view returns (string, string, string, uint256, uint256, uint256, bool)
            function hasBatyr(address player, uint8 batyrId) view returns (bool)
            function getPlayerStats(address player) view returns (bool, bool, bool, bool, bool)
            function getActiveKhanates() view returns (address[])
            function activeBattles(uint256 battleId) view returns (address, address, uint256, uint256, bool)
            event KhanateCreated(address indexed owner, string name)
            event BattleInitiated(uint256 indexed battleId, address indexed attacker, address indexed defender)
            event BattleResult(uint256 indexed battleId, address winner, address loser, uint256 experienceGained)
            event BatyrAcquired(address indexed owner, uint8 batyrId, string name)
        ]"#
    );
}
