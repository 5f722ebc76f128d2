use alloy_primitives::U256;
use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tierswap_config::ConfigLoader;
use tierswap_core::{PipelineBuilder, SwapPipeline};
use tierswap_types::{Address, SwapIntent};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;

#[derive(Parser)]
#[command(name = "tierswap")]
#[command(about = "Risk-tiered swap execution agent", long_about = None)]
struct Cli {
	#[command(subcommand)]
	command: Commands,

	#[arg(short, long, value_name = "FILE", default_value = "config/local.toml")]
	config: PathBuf,

	#[arg(long, env = "TIERSWAP_LOG_LEVEL", default_value = "info")]
	log_level: String,
}

#[derive(Subcommand)]
enum Commands {
	/// Execute one swap through the pipeline
	Swap {
		/// Input amount in the token's smallest unit
		#[arg(long)]
		amount: String,
		/// Input token address (zero address for the native asset)
		#[arg(long)]
		token_in: String,
		/// Output token address
		#[arg(long)]
		token_out: String,
		/// Agent identity forwarded to the hook
		#[arg(long, default_value = "0")]
		agent_id: String,
		/// Hex-encoded eligibility proof
		#[arg(long, default_value = "")]
		proof: String,
		/// Slippage tolerance in basis points
		#[arg(long, default_value_t = 50)]
		slippage_bps: u16,
		/// Deadline window in seconds (0 uses the configured default)
		#[arg(long, default_value_t = 0)]
		deadline_secs: u64,
	},
	/// Execute a sweep of swap sizes against the same pair
	Sweep {
		/// Comma-separated input amounts in the token's smallest unit
		#[arg(long)]
		amounts: String,
		#[arg(long)]
		token_in: String,
		#[arg(long)]
		token_out: String,
		#[arg(long, default_value = "0")]
		agent_id: String,
	},
	/// Run (or replay) the deferred markout check for a swap
	Markout {
		/// Hex swap id from a previous swap's report
		#[arg(long)]
		swap_id: String,
	},
	/// Initialize the configured pool for a token pair if absent
	InitPool {
		#[arg(long)]
		token_a: String,
		#[arg(long)]
		token_b: String,
		/// Initial sqrt price in X96 form (default is a 1:1 price)
		#[arg(long)]
		sqrt_price_x96: Option<String>,
	},
	/// Validate the configuration file
	Validate,
	/// Serve the HTTP API
	Serve,
}

#[tokio::main]
async fn main() -> Result<()> {
	let cli = Cli::parse();

	setup_tracing(&cli.log_level)?;

	if let Commands::Validate = cli.command {
		return validate_config(&cli).await;
	}

	info!("Loading configuration from: {:?}", cli.config);
	let config = ConfigLoader::new()
		.with_file(&cli.config)
		.load()
		.await
		.context("Failed to load configuration")?;

	let http_port = config.api.http_port;
	let pipeline = Arc::new(
		PipelineBuilder::new(config)
			.build()
			.await
			.context("Failed to build pipeline")?,
	);

	match cli.command {
		Commands::Swap {
			amount,
			token_in,
			token_out,
			agent_id,
			proof,
			slippage_bps,
			deadline_secs,
		} => {
			let intent = build_intent(
				&amount,
				&token_in,
				&token_out,
				&agent_id,
				&proof,
				slippage_bps,
				deadline_secs,
			)?;
			run_swap(&pipeline, intent).await
		}
		Commands::Sweep {
			amounts,
			token_in,
			token_out,
			agent_id,
		} => {
			for amount in amounts.split(',') {
				let intent =
					build_intent(amount.trim(), &token_in, &token_out, &agent_id, "", 50, 0)?;
				if let Err(e) = run_swap(&pipeline, intent).await {
					warn!("Sweep entry {} failed: {}", amount, e);
				}
			}
			Ok(())
		}
		Commands::Markout { swap_id } => {
			let swap_id = parse_swap_id(&swap_id)?;
			let verification = pipeline
				.markout_status(swap_id)
				.await
				.context("Markout check failed")?;
			println!("{}", serde_json::to_string_pretty(&verification)?);
			Ok(())
		}
		Commands::InitPool {
			token_a,
			token_b,
			sqrt_price_x96,
		} => {
			let token_a = parse_address(&token_a)?;
			let token_b = parse_address(&token_b)?;
			let sqrt_price = match sqrt_price_x96 {
				Some(s) => parse_u256(&s)?,
				None => U256::from(1u64) << 96,
			};
			let created = pipeline
				.initialize_pool(&token_a, &token_b, sqrt_price)
				.await
				.context("Pool initialization failed")?;
			if created {
				println!("pool initialized");
			} else {
				println!("pool already initialized");
			}
			Ok(())
		}
		Commands::Serve => serve(pipeline, http_port).await,
		Commands::Validate => unreachable!("handled above"),
	}
}

async fn run_swap(pipeline: &Arc<SwapPipeline>, intent: SwapIntent) -> Result<()> {
	match pipeline.execute(intent).await {
		Ok(report) => {
			println!("{}", serde_json::to_string_pretty(&report)?);
			Ok(())
		}
		Err(e) if e.is_transient() => {
			Err(anyhow!("swap unresolved (transient, retry may succeed): {}", e))
		}
		Err(e) => Err(anyhow!("swap failed: {}", e)),
	}
}

async fn serve(pipeline: Arc<SwapPipeline>, port: u16) -> Result<()> {
	let server = tokio::spawn(api::start_http_server(pipeline, port));

	shutdown_signal().await;
	info!("Shutdown signal received, stopping");
	server.abort();

	Ok(())
}

async fn validate_config(cli: &Cli) -> Result<()> {
	let config = ConfigLoader::new()
		.with_file(&cli.config)
		.load()
		.await
		.context("Failed to load configuration")?;

	info!("Configuration is valid");
	info!("Chain id: {}", config.chain.chain_id);
	info!("Router: {}", config.contracts.router);
	info!("Hook: {}", config.contracts.hook);
	info!(
		"Risk curve: k={} weights={}/{}",
		config.risk.k, config.risk.weight_impact, config.risk.weight_stress
	);
	Ok(())
}

fn build_intent(
	amount: &str,
	token_in: &str,
	token_out: &str,
	agent_id: &str,
	proof: &str,
	slippage_bps: u16,
	deadline_secs: u64,
) -> Result<SwapIntent> {
	let proof = if proof.is_empty() {
		Vec::new()
	} else {
		hex::decode(proof.trim_start_matches("0x")).context("proof must be hex")?
	};

	Ok(SwapIntent {
		amount_in: parse_u256(amount)?,
		token_in: parse_address(token_in)?,
		token_out: parse_address(token_out)?,
		agent_id: parse_u256(agent_id)?,
		proof,
		slippage_bps,
		deadline_secs,
	})
}

fn parse_address(s: &str) -> Result<Address> {
	Address::from_hex(s).map_err(|e| anyhow!("{}", e))
}

fn parse_u256(s: &str) -> Result<U256> {
	U256::from_str_radix(s.trim(), 10).map_err(|e| anyhow!("invalid amount '{}': {}", s, e))
}

fn parse_swap_id(s: &str) -> Result<[u8; 32]> {
	let bytes = hex::decode(s.trim_start_matches("0x")).context("swap id must be hex")?;
	bytes
		.try_into()
		.map_err(|_| anyhow!("swap id must be 32 bytes"))
}

fn setup_tracing(log_level: &str) -> Result<()> {
	let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
		.unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

	tracing_subscriber::registry()
		.with(env_filter)
		.with(tracing_subscriber::fmt::layer())
		.init();

	Ok(())
}

async fn shutdown_signal() {
	let ctrl_c = async {
		signal::ctrl_c()
			.await
			.expect("failed to install Ctrl+C handler");
	};

	#[cfg(unix)]
	let terminate = async {
		signal::unix::signal(signal::unix::SignalKind::terminate())
			.expect("failed to install signal handler")
			.recv()
			.await;
	};

	#[cfg(not(unix))]
	let terminate = std::future::pending::<()>();

	tokio::select! {
		_ = ctrl_c => {},
		_ = terminate => {},
	}
}
