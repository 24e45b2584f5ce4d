//! Command-line entry point for the bundle uploader.
//!
//! Each invocation drives one session: select a currency, select a provider,
//! connect the wallet, establish a relay session, and run the requested
//! operation. Wallet and relay backends are assembled from the configuration
//! file through the implementation registries.

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use uploader_cli::build_coordinator;
use uploader_config::Config;
use uploader_core::{ConnectOutcome, Coordinator};
use uploader_types::ProviderKind;

/// Command-line arguments for the uploader.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
	/// Path to configuration file
	///
	/// When omitted, built-in defaults are used: the public relay endpoint
	/// and the standard currency table.
	#[arg(short, long)]
	config: Option<PathBuf>,

	/// Relay endpoint override
	#[arg(short, long)]
	endpoint: Option<String>,

	/// Log level (trace, debug, info, warn, error)
	#[arg(short, long, default_value = "info")]
	log_level: String,

	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// List the providers compatible with a currency
	Providers {
		/// Currency name (e.g. matic, solana)
		currency: String,
	},
	/// Show the relay-side balance for the connected account
	Balance {
		currency: String,
		/// Provider to connect through; defaults to the currency's first
		#[arg(short, long)]
		provider: Option<ProviderKind>,
	},
	/// Quote the upload price for a file
	Price {
		currency: String,
		file: PathBuf,
		#[arg(short, long)]
		provider: Option<ProviderKind>,
	},
	/// Upload a file and print its gateway URL
	Upload {
		currency: String,
		file: PathBuf,
		#[arg(short, long)]
		provider: Option<ProviderKind>,
		/// MIME type sent with the upload
		#[arg(long, default_value = "application/octet-stream")]
		content_type: String,
	},
	/// Fund the relay-side balance
	Fund {
		currency: String,
		/// Amount in atomic units
		amount: String,
		#[arg(short, long)]
		provider: Option<ProviderKind>,
	},
	/// Withdraw from the relay-side balance
	Withdraw {
		currency: String,
		/// Amount in atomic units
		amount: String,
		#[arg(short, long)]
		provider: Option<ProviderKind>,
	},
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	let args = Args::parse();

	// Initialize tracing with env filter
	use tracing_subscriber::{fmt, EnvFilter};

	let default_directive = args.log_level.to_string();
	let env_filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

	fmt().with_env_filter(env_filter).with_target(true).init();

	let mut config = load_config(&args).await?;
	if let Some(endpoint) = &args.endpoint {
		config.relay.endpoint = endpoint.clone();
	}
	tracing::info!(endpoint = %config.relay.endpoint, "loaded configuration");

	let coordinator = build_coordinator(&config)?;

	match args.command {
		Command::Providers { currency } => {
			coordinator.select_currency(&currency)?;
			for provider in coordinator.available_providers()? {
				println!("{provider}");
			}
		},
		Command::Balance { currency, provider } => {
			establish(&coordinator, &currency, provider).await?;
			let balance = coordinator.fetch_balance().await?;
			println!("{balance}");
			coordinator.disconnect().await?;
		},
		Command::Price {
			currency,
			file,
			provider,
		} => {
			establish(&coordinator, &currency, provider).await?;
			stage_file(&coordinator, &file, "application/octet-stream")?;
			let price = coordinator.quote_price().await?;
			println!("{price}");
			coordinator.disconnect().await?;
		},
		Command::Upload {
			currency,
			file,
			provider,
			content_type,
		} => {
			establish(&coordinator, &currency, provider).await?;
			stage_file(&coordinator, &file, &content_type)?;
			let receipt = coordinator.upload().await?;
			tracing::info!(id = %receipt.id, status = receipt.status, "upload accepted");
			println!("{}", receipt.gateway_url());
			coordinator.disconnect().await?;
		},
		Command::Fund {
			currency,
			amount,
			provider,
		} => {
			establish(&coordinator, &currency, provider).await?;
			let receipt = coordinator.fund(&amount).await?;
			println!("funded {} via {} (tx {})", amount, receipt.target, receipt.id);
			coordinator.disconnect().await?;
		},
		Command::Withdraw {
			currency,
			amount,
			provider,
		} => {
			establish(&coordinator, &currency, provider).await?;
			let receipt = coordinator.withdraw(&amount).await?;
			println!("withdrew {} (tx {})", amount, receipt.tx_id);
			coordinator.disconnect().await?;
		},
	}

	Ok(())
}

/// Loads configuration from the given file, or built-in defaults.
async fn load_config(args: &Args) -> anyhow::Result<Config> {
	match &args.config {
		Some(path) => {
			let path = path
				.to_str()
				.with_context(|| format!("Invalid config path: {path:?}"))?;
			tracing::info!(path, "loading configuration from file");
			Config::from_file(path).await.map_err(Into::into)
		},
		None => "".parse().map_err(Into::into),
	}
}

/// Walks the session up to a live relay session for the given currency.
async fn establish(
	coordinator: &Coordinator,
	currency: &str,
	provider: Option<ProviderKind>,
) -> anyhow::Result<()> {
	coordinator.select_currency(currency)?;
	let provider = match provider {
		Some(provider) => provider,
		None => *coordinator
			.available_providers()?
			.first()
			.with_context(|| format!("Currency '{currency}' has no providers"))?,
	};
	coordinator.select_provider(provider)?;

	match coordinator.connect().await? {
		ConnectOutcome::Connected { address } => {
			tracing::info!(%address, %provider, "wallet connected");
		},
		outcome => anyhow::bail!("wallet connect did not complete: {outcome:?}"),
	}

	let endpoint = coordinator.endpoint().to_string();
	let session = coordinator.connect_relay(&endpoint).await?;
	tracing::info!(endpoint = %session.endpoint, bundler = %session.bundler_address, "relay session ready");
	Ok(())
}

/// Reads a file from disk and stages it on the coordinator.
fn stage_file(coordinator: &Coordinator, path: &PathBuf, content_type: &str) -> anyhow::Result<()> {
	let bytes =
		std::fs::read(path).with_context(|| format!("Failed to read file: {path:?}"))?;
	let name = path
		.file_name()
		.map(|n| n.to_string_lossy().into_owned())
		.unwrap_or_else(|| "file".to_string());
	tracing::info!(name, bytes = bytes.len(), "staged file");
	coordinator.select_file(name, content_type, bytes)?;
	Ok(())
}
