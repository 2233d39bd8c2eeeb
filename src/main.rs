use clap::Parser;
use ocrtex::cli;

fn main() {
    let args = cli::Args::parse();
    if let Err(err) = cli::dispatch(args) {
        tracing::error!("{:#}", err);
        eprintln!("error: {:#}", err);
        std::process::exit(1);
    }
}
