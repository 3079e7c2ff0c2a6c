use thiserror::Error;

/// Internal failure surface. Never crosses the TCP boundary directly —
/// handlers translate these into the wire-level `ERR ...` strings or a
/// stderr log line (see `spec.md` §7).
#[derive(Error, Debug)]
pub enum Error {
    #[error("channel doesn't exist")]
    ChannelNotFound,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
