use crate::registers;
use std::{convert::From, fmt};

/// Simple custom Error for the emulator
pub struct Error {
    pub kind: ErrorKind,
    pub ctx: Option<registers::State>,
    pub msg: String,
}

#[derive(Debug, PartialEq)]
pub enum ErrorKind {
    /// error in the system configuration (CLI or TOML)
    Config,
    /// error accessing the emulated address space
    Memory,
    /// underlying host io error (file, pseudo-terminal)
    Io,
    /// error encountered due to the machine code program
    Runtime,
    /// catch-all for other errors
    General,
}

impl Error {
    pub fn new(kind: ErrorKind, ctx: Option<registers::State>, message: &str) -> Error {
        Error {
            kind,
            ctx,
            msg: String::from(message),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self { Error::new(ErrorKind::Io, None, e.to_string().as_str()) }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result { write!(f, "{}: {}", red!("emulator::Error"), self.msg) }
}
impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut res = write!(f, "{}", self.msg);
        if res.is_ok() {
            if let Some(ctx) = self.ctx {
                res = write!(f, "\nContext: {}", ctx);
            }
        }
        res
    }
}
impl std::error::Error for Error {}
