use clap::Parser;
use hotlink::*;
use std::error::Error;
use std::path::{Path, PathBuf};

#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Semantics from a .lir file instead of the built-in linux/amd64 ones
    #[arg(long)]
    semantics: Option<PathBuf>,
    #[arg(long)]
    no_optimize: bool,
    #[arg(short, long)]
    verbose: bool,
    /// Patch module, IR text or object container
    patch: Option<PathBuf>,
}

const HELPER_PATCH: &str = "helpers/x86_64/hotpatch.lir";

/// The helper patch next to the executable, or in the source tree when the
/// binary runs from the build directory.
fn default_patch() -> Result<PathBuf, Box<dyn Error>> {
    let exe = std::env::current_exe()?;
    let beside = exe.parent().unwrap_or_else(|| Path::new(".")).join(HELPER_PATCH);
    if beside.exists() {
        return Ok(beside);
    }
    let source = Path::new(env!("CARGO_MANIFEST_DIR")).join(HELPER_PATCH);
    if source.exists() {
        log::debug!("no {} beside {}, using {}", HELPER_PATCH, exe.display(), source.display());
        return Ok(source);
    }
    Ok(beside)
}

fn lift_and_print(
    module: &mut Module,
    lifter: &Lifter,
    name: &str,
    address: u64,
    bytes: &[u8],
    args: &Args,
) -> Result<(), Box<dyn Error>> {
    if args.verbose {
        eprintln!("{}", pretty_hex::simple_hex(&bytes));
    }
    let id = lifter.lift(module, name, address, bytes)?;
    println!("[unoptimized]");
    print!("{}", module.display_symbol(id));

    if !args.no_optimize {
        let stats = optimize(module, &[id]);
        log::debug!("{}: {:?}", name, stats);
        println!("\n[optimized]");
        print!("{}", module.display_symbol(id));
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    let args = Args::parse();

    let mut config = LinkConfig::new();
    if args.verbose {
        config.debug_add(&DebugFlag::Symbols);
        config.debug_add(&DebugFlag::Classification);
        config.debug_add(&DebugFlag::Disassemble);
    }

    let mut semantics = match &args.semantics {
        Some(path) => load_semantics_file(path)?,
        None => load_semantics("linux", "amd64")?,
    };

    let path = match &args.patch {
        Some(p) => p.clone(),
        None => default_patch()?,
    };
    if path.exists() {
        println!("Applying hotpatch from: {}", path.display());
        match hotpatch_with(&mut semantics, &path, &config) {
            Ok(report) => println!("{}", report),
            Err(e) => {
                eprintln!("{}", e);
                println!("Warning: Failed to apply hotpatch");
            }
        }
    } else {
        println!("No hotpatch file found at: {}", path.display());
    }

    let lifter = Lifter::with_config(&semantics.target, config)?;

    println!("\n=== Lifting: mov rcx, 1337 ===");
    let mov = [0x48, 0xc7, 0xc1, 0x39, 0x05, 0x00, 0x00];
    lift_and_print(&mut semantics, &lifter, "lifted_mov", 0x1000, &mov, &args)?;

    println!("\n=== Lifting: cpuid ===");
    let cpuid = [0x0f, 0xa2];
    lift_and_print(&mut semantics, &lifter, "lifted_cpuid", 0x2000, &cpuid, &args)?;

    Ok(())
}
