//! navtree CLI - Navigation tree engine.
//!
//! Provides commands for:
//! - `menu`, `breadcrumbs`, `sitetree`: Render navigation for a request
//! - `page-title`, `page-attr`: Look up the current page
//! - `choices`: List parent choices for a tree
//! - `dump`: Export trees as a JSON fixture
//! - `reset`: Ask every process sharing the cache to rebuild its trees

mod commands;
mod error;
mod output;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::{
    BreadcrumbsArgs, ChoicesArgs, DumpArgs, MenuArgs, PageAttrArgs, PageTitleArgs, ResetArgs,
    SitetreeArgs,
};
use output::Output;

/// navtree - Navigation tree engine.
#[derive(Parser)]
#[command(name = "navtree", version, about)]
struct Cli {
    /// Enable verbose output (cache rebuilds and invalidations).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a menu.
    Menu(MenuArgs),
    /// Render the breadcrumb trail to the current page.
    Breadcrumbs(BreadcrumbsArgs),
    /// Render a full site tree.
    Sitetree(SitetreeArgs),
    /// Print the title of the current page.
    PageTitle(PageTitleArgs),
    /// Print an attribute of the current page.
    PageAttr(PageAttrArgs),
    /// List a tree's items as parent choices.
    Choices(ChoicesArgs),
    /// Export trees as a JSON fixture.
    Dump(DumpArgs),
    /// Drop cached trees in every process sharing the cache.
    Reset(ResetArgs),
}

fn main() {
    let cli = Cli::parse();
    let output = Output::new();

    // --verbose enables INFO level, otherwise use RUST_LOG or default to WARN
    let filter = if cli.verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::from_default_env()
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Menu(args) => args.execute(&output),
        Commands::Breadcrumbs(args) => args.execute(&output),
        Commands::Sitetree(args) => args.execute(&output),
        Commands::PageTitle(args) => args.execute(&output),
        Commands::PageAttr(args) => args.execute(&output),
        Commands::Choices(args) => args.execute(&output),
        Commands::Dump(args) => args.execute(&output),
        Commands::Reset(args) => args.execute(&output),
    };

    if let Err(err) = result {
        output.error(&format!("Error: {err}"));
        std::process::exit(1);
    }
}
