//! Entry point: parse the command line (§4.G/§6), spawn the controller,
//! and hand the bridge to `fuse_mt`'s dispatcher.

use std::ffi::OsStr;
use std::sync::Arc;

use uxfs::bridge::{Bridge, BridgeConfig};
use uxfs::cli::Cli;
use uxfs::fs::UxfsFilesystem;

fn main() {
    let mut cli = Cli::parse();
    let dbg_level = cli.take_dbg_level();
    uxfs::logging::init("uxfs", cli.verbosity(), dbg_level, cli.debug);

    if cli.foreground {
        tracing::info!("-f given; this bridge never daemonizes on its own, ignoring");
    }

    if cli.controller.is_empty() {
        tracing::error!("no controller argv given; at least one element is required");
        std::process::exit(1);
    }

    let config = BridgeConfig {
        mount_point: cli.mount_point.clone(),
        controller_argv: cli.controller,
        other_users_level: cli.other_users_level(),
        debug: cli.debug,
    };

    let bridge = match Bridge::new(config) {
        Ok(bridge) => Arc::new(bridge),
        Err(err) => {
            tracing::error!("failed to start controller: {err}");
            std::process::exit(1);
        }
    };

    let filesystem = UxfsFilesystem::new(bridge);
    let num_threads = if cli.single_thread { 1 } else { 4 };
    let options: Vec<&OsStr> = vec![OsStr::new("-o"), OsStr::new("fsname=uxfs")];

    if let Err(err) =
        fuse_mt::mount(fuse_mt::FuseMT::new(filesystem, num_threads), &cli.mount_point, &options)
    {
        tracing::error!("mount failed: {err}");
        std::process::exit(1);
    }
}
