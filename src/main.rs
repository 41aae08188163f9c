use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

use anyhow as ah;
use clap::{Parser, Subcommand};
use env_logger::{Builder, Env};

use har::writer::BinWriter;
use har::{harx, reader, validator};

#[derive(Parser)]
#[command(name = "har", about = "Reads, validates, and converts GEMPACK Header Array files")]
struct Opt {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Reads a .har/.sl4 file and prints each header name to stdout.
    Read {
        input: PathBuf,

        /// Print set-consistency validation messages.
        #[arg(short, long)]
        verbose: bool,
    },
    /// Converts between .har/.sl4 binary and .harx (JSON-in-ZIP) form.
    Convert { input: PathBuf, output: PathBuf },
}

fn init_logger() {
    let env = Env::default()
        .filter_or("HAR_LOG_LEVEL", "info")
        .write_style_or("HAR_LOG_STYLE", "auto");
    Builder::from_env(env).format_timestamp(None).init();
}

fn read_arrays(input: &PathBuf) -> ah::Result<Vec<har::HeaderArray>> {
    if is_harx(input) {
        Ok(harx::read_archive(File::open(input)?)?)
    } else {
        let file = BufReader::new(File::open(input)?);
        Ok(reader::read_all(file)?)
    }
}

fn run() -> ah::Result<()> {
    let opt = Opt::parse();

    match opt.command {
        Command::Read { input, verbose } => {
            let arrays = read_arrays(&input)?;

            for array in &arrays {
                println!("{}", array.header.trim());
            }

            if verbose {
                let (consistent, mismatches) = validator::validate_all(&arrays);
                for mismatch in &mismatches {
                    println!("{mismatch}");
                }
                if consistent {
                    println!("all sets consistent");
                }
            }
        }
        Command::Convert { input, output } => {
            let arrays = read_arrays(&input)?;

            if is_harx(&output) {
                let out = File::create(&output)?;
                harx::write_archive(out, &arrays)?;
            } else {
                let mut out = File::create(&output)?;
                let mut writer = BinWriter::new(&mut out);
                for array in &arrays {
                    writer.write(array)?;
                }
            }
        }
    }

    Ok(())
}

fn is_harx(path: &PathBuf) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some("harx")
}

fn main() {
    init_logger();

    if let Err(err) = run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
