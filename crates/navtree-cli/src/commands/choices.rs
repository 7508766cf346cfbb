//! `navtree choices` command.

use clap::Args;
use navtree::RouteTable;

use super::{SourceArgs, open_navigator};
use crate::error::CliError;
use crate::output::Output;

/// Arguments for the choices command.
#[derive(Args)]
pub(crate) struct ChoicesArgs {
    /// Tree alias.
    alias: String,

    #[command(flatten)]
    source: SourceArgs,
}

impl ChoicesArgs {
    pub(crate) fn execute(self, output: &Output) -> Result<(), CliError> {
        let config = self.source.load_config()?;
        let navigator = open_navigator(&config, RouteTable::new())?;

        for (id, label) in navigator.item_choices(&self.alias)? {
            output.line(&format!("{id:>6}  {label}"));
        }
        Ok(())
    }
}
