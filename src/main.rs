mod cli;
mod commands;
mod config;
mod diff;
mod registry;
mod sync;
#[cfg(test)]
mod testutil;
mod ui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command, EnvCommand, RecordCommand};
use std::io;
use std::path::PathBuf;

/// Global context for the application
pub struct Context {
    pub silent: bool,
    pub root: PathBuf,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if cli.silent {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .format_timestamp(None)
        .init();

    let ctx = Context {
        silent: cli.silent,
        root: std::env::current_dir()?,
    };

    match cli.command {
        Command::Configure(args) => commands::configure::run(&ctx, &args),
        Command::Status => commands::status::run(&ctx),
        Command::Pull(args) => sync::pull::run(&ctx, args.kind.map(Into::into), args.dry_run),
        Command::Push(args) => sync::push::run(&ctx, args.kind.map(Into::into), args.dry_run),
        Command::Clear(args) => sync::clear::run(&ctx, args.yes),
        Command::Run(args) => commands::data::run_script(&ctx, &args.name, &args.arg),
        Command::Sql(args) => commands::data::sql(&ctx, &args.statement),
        Command::Env(cmd) => match cmd {
            EnvCommand::List => commands::data::env_list(&ctx),
            EnvCommand::Set { name, value } => commands::data::env_set(&ctx, &name, &value),
            EnvCommand::Unset { name } => commands::data::env_unset(&ctx, &name),
        },
        Command::Record(cmd) => match cmd {
            RecordCommand::Get { key } => commands::data::record_get(&ctx, &key),
            RecordCommand::Set { key, value } => commands::data::record_set(&ctx, &key, &value),
            RecordCommand::Rm { key } => commands::data::record_rm(&ctx, &key),
        },
        Command::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "quill", &mut io::stdout());
            Ok(())
        }
    }
}
