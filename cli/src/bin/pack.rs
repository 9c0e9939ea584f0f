use clap::Parser;
use hotlink::container::write_container;
use hotlink::*;
use std::error::Error;
use std::path::PathBuf;

/// Pack a .lir module into an object container that the hotpatcher loads.
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Target triple for modules that carry none
    #[arg(long)]
    triple: Option<String>,
    input: PathBuf,
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    let args = Args::parse();

    let text = std::fs::read_to_string(&args.input)?;
    let name = args
        .input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("patch");
    let mut module = parse_module(name, &text)?;
    if let Some(triple) = args.triple {
        if module.target.triple.is_empty() {
            module.target.triple = triple;
        }
    }

    let buf = write_container(&module)?;
    let output = args
        .output
        .unwrap_or_else(|| args.input.with_extension("o"));
    std::fs::write(&output, &buf)?;
    log::info!("{}: {} bytes", output.display(), buf.len());
    Ok(())
}
