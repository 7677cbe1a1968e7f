use clap::Parser as _;
use tracing::info;

use storage_initializer::{
    Storage, StorageConfig,
    models::args::AppArgs,
    utils::{cancel::CancelFlag, errors::EmptyResult, logger::LoggerUtils},
};

fn main() -> EmptyResult {
    let args = AppArgs::parse();

    LoggerUtils::init();

    let version = env!("CARGO_PKG_VERSION");
    info!("Storage initializer, version: {version}");

    let cancel = CancelFlag::new();
    cancel.register_signals()?;

    let storage = Storage::new(StorageConfig::from_env()).with_cancel_flag(cancel);
    let out_dir = storage.download(&args.src_uri, args.dest_dir.as_deref())?;

    println!("{}", out_dir.display());

    Ok(())
}
