//! `navtree dump` command.

use std::path::PathBuf;

use clap::Args;

use super::{SourceArgs, load_storage};
use crate::error::CliError;
use crate::output::Output;

/// Arguments for the dump command.
#[derive(Args)]
pub(crate) struct DumpArgs {
    /// Aliases of the trees to export (default: all trees).
    aliases: Vec<String>,

    /// Export items only, without tree rows.
    #[arg(long)]
    items_only: bool,

    /// Write to this file instead of stdout.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Print compact JSON.
    #[arg(long)]
    compact: bool,

    #[command(flatten)]
    source: SourceArgs,
}

impl DumpArgs {
    pub(crate) fn execute(self, output: &Output) -> Result<(), CliError> {
        let config = self.source.load_config()?;
        let storage = load_storage(&config)?;

        let fixture = storage.dump(&self.aliases, self.items_only);
        if fixture.items.is_empty() && !self.aliases.is_empty() {
            output.warning(&format!("No items found for {}", self.aliases.join(", ")));
        }

        match &self.output {
            Some(path) => {
                fixture.write(path, !self.compact)?;
                output.success(&format!(
                    "Exported {} items to {}",
                    fixture.items.len(),
                    path.display()
                ));
            }
            None => output.line(&fixture.to_json(!self.compact)?),
        }
        Ok(())
    }
}
