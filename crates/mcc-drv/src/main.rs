use clap::Parser;
use mcc_drv::{run, Cli};

fn main() {
    let cli = Cli::parse();
    std::process::exit(run(cli));
}
