// SPDX-License-Identifier: BSD-3-Clause

//! Host-side companion: owns the serial link to the remote and dispatches
//! connections onto the PING, DATE, INPUT and FILESYSTEM handlers.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use log::error;

use handlers::{DateHandler, FsHandler, InputHandler, PingHandler};
use handlers::{HANDLER_DATE, HANDLER_FS, HANDLER_INPUT, HANDLER_PING};
use session::{HandlerFactory, Server};

#[derive(Debug, Parser)]
struct Cli {
    /// Serial device the remote is connected to.
    #[arg(long, default_value = "/dev/ttyAMA0")]
    device: String,

    /// Serial baud rate.
    #[arg(long, default_value_t = 115_200)]
    baud: u32,

    /// Root directory exposed as the default FILESYSTEM volume.
    #[arg(long, default_value = "/home/pi")]
    volume_root: PathBuf,

    /// Directory watched for removable media mounts.
    #[arg(long, default_value = "/media/pi")]
    media_root: PathBuf,
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    let transport = match transport::serial::open(&cli.device, cli.baud) {
        Ok(t) => t,
        Err(e) => {
            error!("could not open {}: {e}", cli.device);
            return ExitCode::FAILURE;
        }
    };

    let mut factory = HandlerFactory::new();
    factory.register(HANDLER_PING, "PING", || Box::new(PingHandler::new()));
    factory.register(HANDLER_DATE, "DATE", || Box::new(DateHandler::new()));
    factory.register(HANDLER_INPUT, "INPUT", || Box::new(InputHandler::new()));
    {
        let volume_root = cli.volume_root.clone();
        let media_root = cli.media_root.clone();
        factory.register(HANDLER_FS, "FS", move || {
            Box::new(FsHandler::new(volume_root.clone(), media_root.clone()))
        });
    }

    let mut server = Server::new(transport, factory);
    server.run();

    ExitCode::SUCCESS
}
