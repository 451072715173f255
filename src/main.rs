use std::io;
use std::path::PathBuf;

use clap::Parser;
use log::info;

use pseudofs::shell::{self, Outcome};
use pseudofs::Session;

#[derive(Parser)]
#[command(name = "pseudofs")]
#[command(about = "Interactive shell over a single-file container filesystem")]
struct Args {
    /// Container file, created by the `format` command when missing
    container: PathBuf,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    let mut session = Session::open(&args.container);
    if !session.is_mounted() {
        println!("Container not formatted, use `format <size>MB`");
    }
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let outcome = shell::run(&mut session, stdin.lock(), &mut stdout, Some("pseudofs> "))?;
    if outcome == Outcome::Continue {
        println!();
    }
    session.unmount();
    info!("Session closed");
    Ok(())
}
