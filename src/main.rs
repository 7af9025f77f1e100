use clap::Parser;
use mosaicopt::infrastructure::{configure_logging, run, Args};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    configure_logging(args.verbose);

    let report = run(&args)?;
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}
