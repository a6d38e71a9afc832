mod archive;
mod backup;
mod cli;
mod error;
mod events;
mod fsops;
mod hash;
mod install;
mod manifest;
mod pal;
mod plan;
mod process;
mod rollback;
mod verify;

use anyhow::Result;

fn main() -> Result<()> {
    cli::run()
}
