//! Tether broker daemon.
//!
//! Binds a module's front and back endpoints and relays frames between them
//! until interrupted. Runs from a module table in a config file, or from a
//! bare port for ad-hoc use.

use std::path::PathBuf;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Broker command line arguments.
#[derive(Parser, Debug)]
#[command(name = "tether-broker")]
#[command(about = "Standalone frame-relay broker for tether modules")]
struct Args {
	/// Configuration file with module tables
	#[arg(short, long, value_name = "PATH", requires = "module")]
	config: Option<PathBuf>,

	/// Module whose broker to host
	#[arg(short, long, value_name = "NAME", requires = "config")]
	module: Option<String>,

	/// Front port when running without a config file
	#[arg(short, long, value_name = "PORT", conflicts_with = "config")]
	port: Option<u16>,

	/// Verbose logging
	#[arg(short, long)]
	verbose: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	let subscriber = tracing_subscriber::fmt()
		.with_max_level(if args.verbose {
			tracing::Level::DEBUG
		} else {
			tracing::Level::INFO
		})
		.finish();
	tracing::subscriber::set_global_default(subscriber)?;

	let module_config = match (&args.config, &args.module, args.port) {
		(Some(path), Some(module), _) => tether_config::Config::load(path)?.module(module)?.clone(),
		(None, None, Some(port)) => tether_config::ModuleConfig::with_port(port),
		_ => return Err("pass either --config with --module, or --port".into()),
	};

	info!(
		front = %module_config.front_bind_endpoint(),
		back = %module_config.back_bind_endpoint(),
		"starting tether-broker"
	);

	// A failed bind is fatal here: the operator asked for a broker and must
	// know it did not start.
	let broker = tether_broker::Broker::bind(
		&module_config.front_bind_endpoint(),
		&module_config.back_bind_endpoint(),
	)
	.await?;

	let cancel = CancellationToken::new();
	let relay = tokio::spawn(broker.run(cancel.clone()));

	tokio::signal::ctrl_c().await?;
	info!("shutting down");
	cancel.cancel();
	let _ = relay.await;
	Ok(())
}
