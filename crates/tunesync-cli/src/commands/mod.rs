//! CLI command implementations.

pub mod run;
pub mod sample;
pub mod scan;

use anyhow::Result;
use tokio::runtime::Runtime;

/// Runtime shared by the commands that talk to players.
pub(crate) fn runtime() -> Result<Runtime> {
    Ok(tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?)
}
