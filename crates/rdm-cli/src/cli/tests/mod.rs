//! CLI parsing and helper tests.

mod output;

use crate::cli::{Cli, CliCommand};
use clap::Parser;

fn parse(args: &[&str]) -> CliCommand {
    Cli::try_parse_from(args).unwrap().command
}

fn parse_err(args: &[&str]) -> clap::Error {
    Cli::try_parse_from(args).unwrap_err()
}
