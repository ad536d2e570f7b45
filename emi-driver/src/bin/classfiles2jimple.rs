// SPDX-License-Identifier: Apache-2.0

//! Converts a directory of classfiles (for example a mutant) to Soot's Jimple
//! format. A single `soot*.jar` must be present in the working directory.

use std::path::PathBuf;
use std::sync::atomic::AtomicBool;

use clap::Parser;

use emi_driver::jimple::{find_soot_jar, jimple_command};
use emi_driver::subprocess::run_tool;

#[derive(Parser, Debug)]
#[command(about = "Convert from classfiles to Soot's Jimple format")]
struct Args {
    /// Directory containing classfiles.
    directory: PathBuf,

    /// Java launcher.
    #[arg(long, default_value = "java")]
    java: String,
}

fn main() -> anyhow::Result<()> {
    let _ = env_logger::try_init();
    let args = Args::parse();

    let cwd = std::env::current_dir()?;
    let soot_jar = find_soot_jar(&cwd)?;
    log::info!("using {}", soot_jar.display());

    let output = run_tool(
        &mut jimple_command(&args.java, &soot_jar, &args.directory),
        &AtomicBool::new(false),
    )?;
    print!("{}", output.stdout);
    eprint!("{}", output.stderr);
    Ok(())
}
