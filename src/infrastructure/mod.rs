// Infrastructure: command line parsing, logging setup and JSON input/output

pub mod cli;

pub use cli::{configure_logging, run, Args};
