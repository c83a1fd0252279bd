use anyhow::{anyhow, Result};
use crossed_markets::{
    arbitrage::BundleBuilder,
    blockchain::{parse_address, BlockchainClient},
    bot::{ArbitrageBot, SubmissionPipeline},
    config::{ArbitrageParams, Config},
    dex::{group_by_token, load_uniswap_v2_markets, PairPriceSource},
    errors::ArbitrageError,
    relay::FlashbotsRelay,
};
use ethers::signers::{LocalWallet, Signer};
use std::sync::Arc;
use tracing::{error, info, Level};

fn wallet_from_env(var: &str, chain_id: u64) -> Result<LocalWallet> {
    let key = std::env::var(var).map_err(|_| anyhow!("{} is not set", var))?;
    let wallet = key
        .trim_start_matches("0x")
        .parse::<LocalWallet>()
        .map_err(|e| anyhow!("Invalid {}: {}", var, e))?;
    Ok(wallet.with_chain_id(chain_id))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    info!("Starting crossed-markets arbitrage pass");

    let config = Config::load().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;
    let params = ArbitrageParams::try_from(&config.arbitrage)?;

    let client = Arc::new(BlockchainClient::new(&config).await?);
    client.health_check().await?;

    let reference_token = parse_address(&config.tokens.reference)?;
    let native_token = parse_address(&config.tokens.native)?;
    let executor = parse_address(&config.executor.contract_address)?;

    let searcher = wallet_from_env("PRIVATE_KEY", client.chain_id())?;
    let auth_signer = wallet_from_env("FLASHBOTS_SIGNING_KEY", client.chain_id())?;
    let searcher_address = searcher.address();

    let pair_addresses = config
        .markets
        .uniswap_v2_pairs
        .iter()
        .map(|address| parse_address(address))
        .collect::<Result<Vec<_>>>()?;

    let markets = load_uniswap_v2_markets(client.provider(), &pair_addresses, params.network_timeout).await;
    let markets_by_token = group_by_token(markets, reference_token);
    info!(
        "Loaded {} tokens across {} configured pairs",
        markets_by_token.len(),
        pair_addresses.len()
    );

    let price_source = Arc::new(PairPriceSource::new(
        client.provider(),
        parse_address(&config.tokens.native_price_pair)?,
        reference_token,
        native_token,
    ));
    let relay = Arc::new(FlashbotsRelay::new(
        &config.relay.url,
        searcher,
        auth_signer,
        client.provider(),
        params.network_timeout,
    )?);

    let builder = BundleBuilder::new(executor, searcher_address, reference_token, price_source, &params)?;
    let pipeline = SubmissionPipeline::new(client.clone(), relay, &params);
    let bot = ArbitrageBot::new(&params, reference_token, builder, pipeline);

    let block_number = client.get_block_number().await?;
    info!("Evaluating markets at block {}", block_number);

    match bot.run_once(&markets_by_token, block_number).await {
        Ok(report) => {
            info!("Run report:\n{}", report.export_json()?);
            Ok(())
        }
        Err(ArbitrageError::ExhaustedCandidates(report)) => {
            info!("Run report:\n{}", report.export_json()?);
            error!("No arbitrage submitted to relay");
            Err(ArbitrageError::ExhaustedCandidates(report).into())
        }
        Err(e) => Err(e.into()),
    }
}
