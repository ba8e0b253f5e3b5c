use color_eyre::eyre::{
    Result,
    eyre,
};
use mural_contest::{
    client::{
        self,
        AppConfig,
        WalletConfig,
    },
    deployment::DeploymentEnv,
    wallets,
};
use tracing_subscriber::EnvFilter;

fn print_usage_and_exit() -> ! {
    println!(
        "Usage: mural [--testnet | --local] [--rpc-url <url>]\n\
         [--wallet <name>] [--wallet-dir <path>] [--contract <address>]\n\
         \n\
         Flags:\n\
           --testnet           Use the recorded testnet deployment (default)\n\
           --local             Use the recorded local deployment\n\
           --rpc-url <url>     Override the RPC URL for the selected deployment\n\
           --wallet <name>     Keystore wallet to unlock for signing\n\
           --wallet-dir <path> Override the wallet directory (defaults to ~/.mural/wallets)\n\
           --contract <addr>   Override the recorded contract address\n\
         \n\
         Without --wallet the client runs read-only behind the connect card."
    );
    std::process::exit(0);
}

fn parse_cli_args() -> Result<AppConfig> {
    let mut args = std::env::args().skip(1);
    let mut env: Option<DeploymentEnv> = None;
    let mut rpc_url: Option<String> = None;
    let mut wallet_dir: Option<String> = None;
    let mut wallet_name: Option<String> = None;
    let mut contract: Option<String> = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--testnet" => {
                if env.is_some() {
                    return Err(eyre!(
                        "Multiple network flags provided; choose one of --testnet/--local"
                    ));
                }
                env = Some(DeploymentEnv::Testnet);
            }
            "--local" => {
                if env.is_some() {
                    return Err(eyre!(
                        "Multiple network flags provided; choose one of --testnet/--local"
                    ));
                }
                env = Some(DeploymentEnv::Local);
            }
            "--rpc-url" => {
                let url = args
                    .next()
                    .ok_or_else(|| eyre!("--rpc-url requires a URL argument"))?;
                if rpc_url.is_some() {
                    return Err(eyre!("--rpc-url may only be specified once"));
                }
                rpc_url = Some(url);
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
            "--wallet-dir" => {
                let dir = args
                    .next()
                    .ok_or_else(|| eyre!("--wallet-dir requires a path argument"))?;
                if wallet_dir.is_some() {
                    return Err(eyre!("--wallet-dir may only be specified once"));
                }
                wallet_dir = Some(dir);
            }
            "--contract" => {
                let address = args
                    .next()
                    .ok_or_else(|| eyre!("--contract requires an address argument"))?;
                if contract.is_some() {
                    return Err(eyre!("--contract may only be specified once"));
                }
                contract = Some(address);
            }
            "--help" | "-h" => print_usage_and_exit(),
            other => return Err(eyre!("Unknown argument: {other}")),
        }
    }

    let wallet = match wallet_name {
        Some(name) => {
            let dir = wallets::resolve_wallet_dir(wallet_dir.as_deref())?;
            Some(WalletConfig::Keystore { name, dir })
        }
        None => None,
    };

    Ok(AppConfig {
        env: env.unwrap_or(DeploymentEnv::Testnet),
        rpc_url,
        wallet,
        contract,
    })
}

fn init_tracing() -> tracing_appender::non_blocking::WorkerGuard {
    // The terminal owns stdout, so logs go to a file next to the binary.
    let file_appender = tracing_appender::rolling::never(".", "mural.log");
    let (writer, guard) = tracing_appender::non_blocking(file_appender);
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(writer)
        .with_ansi(false)
        .try_init();
    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let _guard = init_tracing();
    tracing::info!("starting mural contest client");
    let app_config = parse_cli_args()?;
    client::run_app(app_config).await
}
