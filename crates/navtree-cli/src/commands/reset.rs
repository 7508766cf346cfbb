//! `navtree reset` command.

use clap::Args;
use navtree::RouteTable;
use navtree_config::CacheBackend;

use super::{SourceArgs, open_navigator};
use crate::error::CliError;
use crate::output::Output;

/// Arguments for the reset command.
#[derive(Args)]
pub(crate) struct ResetArgs {
    #[command(flatten)]
    source: SourceArgs,
}

impl ResetArgs {
    pub(crate) fn execute(self, output: &Output) -> Result<(), CliError> {
        let config = self.source.load_config()?;
        if config.cache_resolved.backend != CacheBackend::File {
            output.warning("Only the file cache outlives a single run; nothing to reset");
            return Ok(());
        }

        let navigator = open_navigator(&config, RouteTable::new())?;
        navigator.reset();

        output.success(&format!(
            "Reset requested for {}",
            config.cache_resolved.dir.display()
        ));
        Ok(())
    }
}
