use color_eyre::eyre::{
    Result,
    eyre,
};
use khanate_client::{
    deployment,
    wallets,
};
use tracing_subscriber::EnvFilter;

mod client;
mod ui;

fn print_usage_and_exit() -> ! {
    println!(
        "Usage: khanate-client [--local | --testnet] [--rpc-url <url>] [--contract <address>]\n\
         [--account <index>] [--wallet <name>] [--wallet-dir <path>]\n\
         \n\
         Flags:\n\
           --local             Connect to a local dev chain (default RPC {})\n\
           --testnet           Connect to the public test network (default RPC {})\n\
           --rpc-url <url>     Override the RPC URL for the selected network\n\
           --contract <addr>   Override the game contract address\n\
           --account <index>   Node-managed account to play as (local chains)\n\
           --wallet <name>     Keystore wallet to unlock for signing\n\
           --wallet-dir <path> Override keystore directory (defaults to ~/.khanate/wallets)",
        deployment::DEFAULT_LOCAL_RPC_URL,
        deployment::DEFAULT_TESTNET_RPC_URL,
    );
    std::process::exit(0);
}

fn parse_cli_args() -> Result<client::AppConfig> {
    #[derive(Clone, Copy)]
    enum NetworkFlag {
        Local,
        Testnet,
    }

    let mut args = std::env::args().skip(1);
    let mut network_flag: Option<NetworkFlag> = None;
    let mut custom_url: Option<String> = None;
    let mut contract_address: Option<String> = None;
    let mut account_index: Option<usize> = None;
    let mut wallet_dir: Option<String> = None;
    let mut wallet_name: Option<String> = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--local" => {
                if network_flag.is_some() {
                    return Err(eyre!(
                        "Multiple network flags provided; choose one of --local/--testnet"
                    ));
                }
                network_flag = Some(NetworkFlag::Local);
            }
            "--testnet" => {
                if network_flag.is_some() {
                    return Err(eyre!(
                        "Multiple network flags provided; choose one of --local/--testnet"
                    ));
                }
                network_flag = Some(NetworkFlag::Testnet);
            }
            "--rpc-url" => {
                let url = args
                    .next()
                    .ok_or_else(|| eyre!("--rpc-url requires a URL argument"))?;
                if custom_url.is_some() {
                    return Err(eyre!("--rpc-url may only be specified once"));
                }
                if network_flag.is_none() {
                    return Err(eyre!(
                        "--rpc-url must follow a network flag (--local/--testnet)"
                    ));
                }
                custom_url = Some(url);
            }
            "--contract" => {
                let address = args
                    .next()
                    .ok_or_else(|| eyre!("--contract requires an address argument"))?;
                if contract_address.is_some() {
                    return Err(eyre!("--contract may only be specified once"));
                }
                contract_address = Some(address);
            }
            "--account" => {
                let index = args
                    .next()
                    .ok_or_else(|| eyre!("--account requires an index argument"))?;
                account_index = Some(
                    index
                        .parse()
                        .map_err(|_| eyre!("--account index must be a number"))?,
                );
            }
            "--wallet-dir" => {
                let dir = args
                    .next()
                    .ok_or_else(|| eyre!("--wallet-dir requires a path argument"))?;
                if wallet_dir.is_some() {
                    return Err(eyre!("--wallet-dir may only be specified once"));
                }
                wallet_dir = Some(dir);
            }
            "--wallet" => {
                let name = args
                    .next()
                    .ok_or_else(|| eyre!("--wallet requires a wallet name"))?;
                if wallet_name.is_some() {
                    return Err(eyre!("--wallet may only be specified once"));
                }
                wallet_name = Some(name);
            }
            "--help" | "-h" => print_usage_and_exit(),
            other => return Err(eyre!("Unknown argument: {other}")),
        }
    }

    let env = match network_flag {
        None => {
            return Err(eyre!("Select a network with --local or --testnet"));
        }
        Some(NetworkFlag::Local) => deployment::DeploymentEnv::Local,
        Some(NetworkFlag::Testnet) => deployment::DeploymentEnv::Testnet,
    };

    let wallet = match wallet_name {
        Some(name) => {
            if account_index.is_some() {
                return Err(eyre!("--account and --wallet are mutually exclusive"));
            }
            let dir = wallets::resolve_wallet_dir(wallet_dir.as_deref())?;
            client::WalletSource::Keystore { name, dir }
        }
        None => client::WalletSource::NodeAccount {
            index: account_index.unwrap_or(0),
        },
    };

    Ok(client::AppConfig {
        env,
        rpc_url: custom_url,
        contract_address,
        wallet,
    })
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    color_eyre::install()?;
    // The terminal belongs to the UI; logs go to a rolling file instead.
    let file_appender = tracing_appender::rolling::daily("logs", "khanate-client.log");
    let (writer, _guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(writer)
        .with_ansi(false)
        .init();
    tracing::info!("starting khanate client");

    deployment::ensure_structure()?;
    let app_config = parse_cli_args()?;
    client::run_app(app_config).await
}
