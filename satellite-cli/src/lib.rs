//! Command-line front-end for Satellite: one-shot subcommands that call
//! straight into the engines built by [`satellite_server::AppState`], plus
//! a `serve` subcommand that runs the HTTP front-end.

pub mod commands;
pub mod output;
