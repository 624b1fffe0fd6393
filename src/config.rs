use crate::{Error, ErrorKind};
use clap::Parser;
use clap_num::maybe_hex;
use lazy_static::lazy_static;

#[derive(Parser, Debug)]
#[command(author,version,about,long_about=None)]
pub struct Args {
    /// Binary images and load addresses as <file> <address> pairs (hex ok with '0x').
    /// The first pair also becomes the cold-start entry point via the reset vector.
    pub images: Vec<String>,

    /// Path to the TOML system description
    #[arg(short, long, default_value_t = String::from("system.toml"))]
    pub config: String,

    /// Redirect pseudo-BDOS console output to a file
    #[arg(long)]
    pub print_file: Option<String>,

    /// Trace each machine instruction as it is executed
    #[arg(short, long)]
    pub trace: bool,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

lazy_static! {
    pub static ref ARGS: Args = if cfg!(test) {
        // manually set parameters for running tests
        Args::parse_from(["test"])
    } else {
        Args::parse()
    };
}

pub fn init() {}
pub fn trace() -> bool { ARGS.trace }

/// Pairs up the positional image arguments into (path, load address) tuples.
pub fn image_pairs() -> Result<Vec<(String, u16)>, Error> {
    if ARGS.images.len() % 2 != 0 {
        return Err(Error::new(
            ErrorKind::Config,
            None,
            "image arguments must come in <file> <address> pairs",
        ));
    }
    let mut pairs = Vec::new();
    for chunk in ARGS.images.chunks(2) {
        let addr = maybe_hex::<u16>(chunk[1].as_str())
            .map_err(|e| config_err!("bad load address '{}': {}", chunk[1], e))?;
        pairs.push((chunk[0].clone(), addr));
    }
    Ok(pairs)
}
