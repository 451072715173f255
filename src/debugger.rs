use std::io::Write;
use std::path::PathBuf;

use clap::Parser;

use pseudofs::Filesystem;

#[derive(Parser)]
#[command(name = "debugger")]
#[command(about = "Inspect the metadata and blocks of a container")]
struct Args {
    /// Container file to inspect
    container: PathBuf,
}

fn prompt(separator: &str) -> Option<Vec<String>> {
    let mut line = String::new();
    print!("{separator}");
    std::io::stdout().flush().ok()?;
    match std::io::stdin().read_line(&mut line) {
        Ok(0) | Err(_) => None,
        Ok(_) => Some(line.split_whitespace().map(str::to_string).collect()),
    }
}

fn execute(fs: &mut Filesystem, cmd: &[String]) -> Result<(), Box<dyn std::error::Error>> {
    let Some(name) = cmd.first() else {
        return Ok(());
    };
    match (name.as_str(), cmd.get(1)) {
        ("s", _) => println!["{}", fs.superblock()],
        ("b", Some(index)) => println!["{}", fs.read_block(index.parse()?)?],
        ("b", None) => println!["{}", fs.block_bitmap()],
        ("i", Some(index)) => println!["{}", fs.read_inode(index.parse()?)?],
        ("i", None) => println!["{}", fs.inode_bitmap()],
        _ => eprintln!("commands: s, i [n], b [n]"),
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();
    // Dropped without unmounting, so nothing is ever synced back
    let mut fs = Filesystem::mount(&args.container)?;
    while let Some(cmd) = prompt(">> ") {
        if let Err(e) = execute(&mut fs, &cmd) {
            eprintln!("{e}");
        }
    }
    Ok(())
}
