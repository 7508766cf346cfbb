//! `navtree page-title` and `navtree page-attr` commands.

use clap::Args;

use super::{PageArgs, SourceArgs, open_navigator};
use crate::error::CliError;
use crate::output::Output;

/// Arguments for the page-title command.
#[derive(Args)]
pub(crate) struct PageTitleArgs {
    /// Tree alias.
    alias: String,

    #[command(flatten)]
    source: SourceArgs,

    #[command(flatten)]
    page: PageArgs,
}

impl PageTitleArgs {
    pub(crate) fn execute(self, output: &Output) -> Result<(), CliError> {
        let config = self.source.load_config()?;
        let navigator = open_navigator(&config, self.page.routes())?;
        let ctx = self.page.context();

        let title = navigator.resolver(&ctx).get_current_page_title(&self.alias)?;
        output.line(&title);
        Ok(())
    }
}

/// Arguments for the page-attr command.
#[derive(Args)]
pub(crate) struct PageAttrArgs {
    /// Attribute name, e.g. `url_resolved`, `description` or a dynamic attribute.
    attr: String,

    /// Tree alias.
    alias: String,

    #[command(flatten)]
    source: SourceArgs,

    #[command(flatten)]
    page: PageArgs,
}

impl PageAttrArgs {
    pub(crate) fn execute(self, output: &Output) -> Result<(), CliError> {
        let config = self.source.load_config()?;
        let navigator = open_navigator(&config, self.page.routes())?;
        let ctx = self.page.context();

        let value = navigator
            .resolver(&ctx)
            .get_current_page_attr(&self.attr, &self.alias)?;
        output.line(&value);
        Ok(())
    }
}
