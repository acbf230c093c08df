use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "vigil",
    about = "Vigil Server - resilient RPC, gas and database access",
    version = env!("CARGO_PKG_VERSION"),
    author,
    propagate_version = true
)]
pub struct Cli {
    #[arg(short, long, env = "VIGIL_PORT", default_value = "8046")]
    pub port: u16,

    #[arg(long, env = "VIGIL_BIND", default_value = "127.0.0.1")]
    pub bind: String,

    #[arg(short, long, env = "RUST_LOG", default_value = "info")]
    pub log_level: String,

    #[arg(long, env = "VIGIL_CHAIN_ID", default_value = "1")]
    pub chain_id: u64,

    /// RPC node URLs in priority order
    #[arg(long, env = "VIGIL_RPC_URLS", value_delimiter = ',')]
    pub rpc_urls: Vec<String>,

    /// Etherscan-compatible API base URL (gastracker/gasoracle)
    #[arg(long, env = "VIGIL_GAS_API_URL")]
    pub gas_api_url: Option<String>,

    #[arg(long, env = "VIGIL_GAS_API_KEY", hide_env_values = true)]
    pub gas_api_key: Option<String>,

    /// On-chain fast-gas aggregator address
    #[arg(long, env = "VIGIL_GAS_ORACLE_ADDRESS")]
    pub gas_oracle_address: Option<String>,

    /// CoinGecko-compatible price API base URL
    #[arg(long, env = "VIGIL_PRICE_FEED_URL")]
    pub price_feed_url: Option<String>,

    #[arg(long, env = "VIGIL_NATIVE_ASSET_ID", default_value = "ethereum")]
    pub native_asset_id: String,

    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    pub database_url: Option<String>,

    #[arg(long, env = "DATABASE_REPLICA_URL", hide_env_values = true)]
    pub database_replica_url: Option<String>,

    /// Mirror the gas quote cache into PostgreSQL
    #[arg(long, env = "VIGIL_CACHE_PERSIST", default_value_t = false)]
    pub persist_cache: bool,
}
