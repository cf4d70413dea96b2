use crate::{
    deployment::{
        NetworkConfig,
        compute_code_hash,
    },
    facade::EvmKhanate,
};
use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use ethers::{
    middleware::SignerMiddleware,
    providers::{
        Http,
        Middleware,
        Provider,
    },
    signers::{
        LocalWallet,
        Signer,
    },
    types::{
        Address,
        U256,
    },
    utils::format_ether,
};
use std::{
    sync::Arc,
    time::Duration,
};
use tracing::info;

/// Connection to the remote ledger: provider setup, network validation,
/// account discovery and balance queries. Everything else goes through a
/// facade built from here.
pub struct ChainGateway {
    provider: Arc<Provider<Http>>,
    network: NetworkConfig,
    contract_address: Address,
}

impl ChainGateway {
    /// Builds the provider and checks the node actually serves the
    /// configured chain before anything signs a transaction for it.
    pub async fn connect(network: NetworkConfig) -> Result<Self> {
        let provider = Provider::<Http>::try_from(network.rpc_url.as_str())
            .wrap_err_with(|| format!("Invalid RPC URL {}", network.rpc_url))?
            .interval(Duration::from_millis(500));
        let chain_id = provider
            .get_chainid()
            .await
            .wrap_err_with(|| format!("Failed to reach node at {}", network.rpc_url))?;
        if chain_id != U256::from(network.chain_id) {
            return Err(eyre!(
                "Node at {} reports chain id {chain_id}, expected {}",
                network.rpc_url,
                network.chain_id
            ));
        }
        let contract_address: Address = network
            .contract_address
            .parse()
            .map_err(|_| eyre!("Invalid contract address {}", network.contract_address))?;
        info!(
            rpc_url = %network.rpc_url,
            chain_id = network.chain_id,
            contract = %network.contract_address,
            "connected to chain"
        );
        Ok(Self {
            provider: Arc::new(provider),
            network,
            contract_address,
        })
    }

    pub fn network(&self) -> &NetworkConfig {
        &self.network
    }

    pub fn contract_address(&self) -> Address {
        self.contract_address
    }

    /// Confirms there is code at the configured address and returns its
    /// hash, comparable against deployment records.
    pub async fn verify_contract(&self) -> Result<String> {
        let code = self
            .provider
            .get_code(self.contract_address, None)
            .await
            .wrap_err("Failed to fetch contract code")?;
        if code.is_empty() {
            return Err(eyre!(
                "No contract code at {:?} on chain {}",
                self.contract_address,
                self.network.chain_id
            ));
        }
        Ok(compute_code_hash(&code))
    }

    /// Accounts the node manages. Local development chains keep these
    /// unlocked, which is what the node-signed facade relies on.
    pub async fn accounts(&self) -> Result<Vec<Address>> {
        self.provider
            .get_accounts()
            .await
            .wrap_err("Failed to list node accounts")
    }

    pub async fn balance_eth(&self, account: Address) -> Result<String> {
        let wei = self
            .provider
            .get_balance(account, None)
            .await
            .wrap_err("Failed to fetch balance")?;
        Ok(trim_ether(format_ether(wei)))
    }

    /// Facade whose transactions the node signs (`from`-based submission
    /// against unlocked accounts).
    pub fn node_account_facade(&self, account: Address) -> EvmKhanate<Provider<Http>> {
        EvmKhanate::new(self.contract_address, self.provider.clone(), account)
    }

    /// Facade signing locally with a decrypted keystore wallet.
    pub fn wallet_facade(
        &self,
        wallet: LocalWallet,
    ) -> EvmKhanate<SignerMiddleware<Provider<Http>, LocalWallet>> {
        let wallet = wallet.with_chain_id(self.network.chain_id);
        let account = wallet.address();
        let middleware = SignerMiddleware::new(self.provider.as_ref().clone(), wallet);
        EvmKhanate::new(self.contract_address, Arc::new(middleware), account)
    }
}

/// Four decimal places is plenty for a status bar.
fn trim_ether(value: String) -> String {
    match value.split_once('.') {
        Some((whole, frac)) => {
            let frac = &frac[..frac.len().min(4)];
            format!("{whole}.{frac:0<4}")
        }
        None => format!("{value}.0000"),
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;

    #[test]
    fn trim_ether__keeps_four_decimals() {
        assert_eq!(
            trim_ether("1.500000000000000000".to_string()),
            "1.5000".to_string()
        );
        assert_eq!(trim_ether("0.123456789".to_string()), "0.1234".to_string());
        assert_eq!(trim_ether("12".to_string()), "12.0000".to_string());
        assert_eq!(trim_ether("3.1".to_string()), "3.1000".to_string());
    }
}
