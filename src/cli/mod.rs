use clap::{Parser, Subcommand};
use crate::giver::{
    CancelToken, MineOutcome, MinerConfig, MiningData, MiningSearch, NftGiverConfig, SystemClock,
    OperationCode, build_nft_giver_state_init, mine, parse_biguint, parse_mine, peek_operation,
    to_nano, transfer_link,
};
use crate::tvm::{
    Address, AddressFlags, Cell, base64_to_boc, boc_to_base64, boc_to_hex, hex_to_boc,
};
use crate::utils::read_to_string;
use anyhow::Result;
use num_bigint::BigUint;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

/// nft-giver-miner CLI
#[derive(Parser, Debug)]
#[command(name = "nft-giver-miner")]
#[command(about = "Mines proof-of-work messages for the NFT giver contract", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Search for a Mine message that satisfies the giver's complexity
    Mine {
        /// Wallet that receives the minted item
        #[arg(short = 'w', long)]
        wallet: String,
        /// Giver contract address, used for the transfer link
        #[arg(short = 'g', long)]
        giver: String,
        /// JSON file with the output of get_mining_data (object or stack array)
        #[arg(short = 'd', long)]
        mining_data: Option<PathBuf>,
        /// Seed override (decimal or 0x-hex)
        #[arg(long)]
        seed: Option<String>,
        /// Complexity override (decimal or 0x-hex)
        #[arg(long)]
        complexity: Option<String>,
        /// Seconds a mined message stays valid
        #[arg(long, default_value_t = crate::giver::miner::DEFAULT_EXPIRE_WINDOW)]
        expire_window: u32,
        /// First nonce to try (decimal or 0x-hex)
        #[arg(long, default_value = "0")]
        start_nonce: String,
        /// Amount of TON attached to the transfer
        #[arg(short = 'a', long, default_value = "0.05")]
        amount: String,
        /// Attempts between progress reports
        #[arg(long, default_value_t = 100_000)]
        progress_interval: u64,
        /// Produce a testnet transfer link
        #[arg(long)]
        testnet: bool,
    },
    /// Show an address in all of its textual forms
    Address {
        address: String,
    },
    /// Decode a Mine message body (base64 or hex BoC)
    DecodeMine {
        boc: String,
    },
    /// Compute the giver contract address from its storage and item code
    GiverAddress {
        /// JSON file with the giver storage
        #[arg(short = 'c', long)]
        config: PathBuf,
        /// File with the NFT item code BoC (base64 or hex)
        #[arg(short = 'i', long)]
        item_code: PathBuf,
        /// File with the collection code BoC (base64 or hex)
        #[arg(short = 'k', long)]
        code: PathBuf,
    },
}

fn parse_big(name: &str, value: &str) -> Result<BigUint> {
    parse_biguint(value).ok_or_else(|| anyhow::anyhow!("Invalid {}: {:?}", name, value))
}

/// Accepts hex or base64 (standard or url-safe)
fn parse_boc_text(text: &str) -> Result<Arc<Cell>> {
    let text = text.trim();
    let cell = if text.len() % 2 == 0 && text.bytes().all(|b| b.is_ascii_hexdigit()) {
        hex_to_boc(text)?
    } else {
        base64_to_boc(text)?
    };
    Ok(cell)
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }

    pub async fn execute(&self) -> Result<()> {
        match &self.command {
            Commands::Mine {
                wallet,
                giver,
                mining_data,
                seed,
                complexity,
                expire_window,
                start_nonce,
                amount,
                progress_interval,
                testnet,
            } => {
                let (seed, complexity) = self.resolve_mining_params(
                    mining_data.as_deref(),
                    seed.as_deref(),
                    complexity.as_deref(),
                )?;
                let config = MinerConfig {
                    expire_window: *expire_window,
                    start_nonce: parse_big("start nonce", start_nonce)?,
                    progress_interval: *progress_interval,
                };
                self.execute_mine(wallet, giver, seed, complexity, config, amount, *testnet)
                    .await
            }
            Commands::Address { address } => self.execute_address(address),
            Commands::DecodeMine { boc } => self.execute_decode_mine(boc),
            Commands::GiverAddress {
                config,
                item_code,
                code,
            } => self.execute_giver_address(config, item_code, code),
        }
    }

    fn resolve_mining_params(
        &self,
        mining_data: Option<&Path>,
        seed: Option<&str>,
        complexity: Option<&str>,
    ) -> Result<(BigUint, BigUint)> {
        let snapshot = match mining_data {
            Some(path) => {
                let data: MiningData = read_to_string(path)?.parse()?;
                log::info!(
                    "Loaded mining data: last success {}, target delta {}, complexity range {}..={}",
                    data.last_success,
                    data.target_delta,
                    data.min_complexity,
                    data.max_complexity
                );
                Some(data)
            }
            None => None,
        };

        let seed = match (seed, &snapshot) {
            (Some(seed), _) => parse_big("seed", seed)?,
            (None, Some(data)) => data.seed.clone(),
            (None, None) => anyhow::bail!("Either --mining-data or --seed is required"),
        };
        let complexity = match (complexity, &snapshot) {
            (Some(complexity), _) => parse_big("complexity", complexity)?,
            (None, Some(data)) => data.pow_complexity.clone(),
            (None, None) => anyhow::bail!("Either --mining-data or --complexity is required"),
        };
        Ok((seed, complexity))
    }

    #[allow(clippy::too_many_arguments)]
    async fn execute_mine(
        &self,
        wallet: &str,
        giver: &str,
        seed: BigUint,
        complexity: BigUint,
        config: MinerConfig,
        amount: &str,
        testnet: bool,
    ) -> Result<()> {
        let wallet: Address = wallet.parse()?;
        let giver: Address = giver.parse()?;
        let amount = to_nano(amount)?;

        let cancel = CancelToken::new();
        let worker_cancel = cancel.clone();
        let progress_interval = config.progress_interval;
        let mut search = MiningSearch::new(wallet, seed, complexity, &config, SystemClock);

        let started = Instant::now();
        let mut worker = tokio::task::spawn_blocking(move || {
            mine(&mut search, &worker_cancel, progress_interval)
        });

        let outcome = tokio::select! {
            result = &mut worker => result??,
            _ = tokio::signal::ctrl_c() => {
                log::warn!("Interrupted, stopping the search");
                cancel.cancel();
                worker.await??
            }
        };

        match outcome {
            MineOutcome::Found(mined) => {
                log::info!("✓ Message mined in {:.3}s", started.elapsed().as_secs_f64());
                log::info!("  Attempts: {}", mined.attempts);
                log::info!("  Nonce: {}", mined.params.data1);
                log::info!("  Expire: {}", mined.params.expire);
                log::info!("  Hash: {}", hex::encode(mined.hash));
                log::info!("  BoC: {}", boc_to_base64(&mined.cell, true)?);
                log::info!("  Link: {}", transfer_link(&giver, amount, &mined.cell, testnet)?);
            }
            MineOutcome::Cancelled {
                attempts,
                last_nonce,
            } => {
                log::warn!(
                    "Search cancelled after {} attempts; resume with --start-nonce {}",
                    attempts,
                    last_nonce
                );
            }
        }
        Ok(())
    }

    fn execute_address(&self, address: &str) -> Result<()> {
        let address: Address = address.parse()?;
        let form = |bounceable, test_only| {
            address.to_user_friendly(AddressFlags {
                url_safe: true,
                bounceable,
                test_only,
            })
        };
        log::info!("Raw: {}", address.to_raw());
        log::info!("Bounceable: {}", form(true, false));
        log::info!("Non-bounceable: {}", form(false, false));
        log::info!("Testnet bounceable: {}", form(true, true));
        log::info!("Testnet non-bounceable: {}", form(false, true));
        Ok(())
    }

    fn execute_decode_mine(&self, boc: &str) -> Result<()> {
        let cell = parse_boc_text(boc)?;
        match peek_operation(&cell)? {
            Ok(OperationCode::Mine) => {}
            Ok(other) => anyhow::bail!("Body is a {:?} message, not Mine", other),
            Err(code) => anyhow::bail!("Unknown operation code {:#010x}", code),
        }
        let hash = cell.hash_hex();
        let params = parse_mine(cell)?;
        log::info!("Mine message {}", hash);
        log::info!("  Expire: {}", params.expire);
        log::info!("  Mint to: {}", params.mint_to);
        log::info!("  Data1: {:#x}", params.data1);
        log::info!("  Seed: {:#x}", params.seed);
        match params.data2 {
            Some(data2) => log::info!("  Data2: {:#x}", data2),
            None => log::info!("  Data2: same as data1"),
        }
        Ok(())
    }

    fn execute_giver_address(
        &self,
        config: &Path,
        item_code: &Path,
        code: &Path,
    ) -> Result<()> {
        let config: NftGiverConfig = serde_json::from_str(&read_to_string(config)?)?;
        let item_code = parse_boc_text(&read_to_string(item_code)?)?;
        let code = parse_boc_text(&read_to_string(code)?)?;

        let data = config.into_data(item_code);
        let (state_init, address) = build_nft_giver_state_init(&data, code)?;
        log::info!("Giver address: {}", address);
        log::info!("Raw: {}", address.to_raw());
        log::info!("State init: {}", boc_to_hex(&state_init.to_cell()?, true)?);
        Ok(())
    }
}
