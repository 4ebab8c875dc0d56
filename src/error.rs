use std::error::Error;
use std::fmt;
use std::io;

/// An error that occurs while loading a model or decoding an observation sequence.
#[derive(Debug)]
pub enum HmmError {
    /// An I/O error while reading a model file
    Io(io::Error),
    /// A model file that could not be parsed
    Malformed(String),
    /// A matrix or vector whose shape disagrees with the declared state count
    InvalidDimension(String),
    /// An observation symbol outside the emission alphabet
    InvalidObservation {
        /// Position of the offending symbol in the observation sequence
        position: usize,
        /// The symbol itself
        symbol: usize,
        /// Size of the emission alphabet, i.e. the number of columns of the emission matrix
        alphabet_size: usize,
    },
}

pub type Result<T> = ::std::result::Result<T, HmmError>;

impl fmt::Display for HmmError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            HmmError::Io(ref err) => write!(f, "IO error: {}", err),
            HmmError::Malformed(ref s) => write!(f, "malformed model file: {}", s),
            HmmError::InvalidDimension(ref s) => write!(f, "dimension mismatch: {}", s),
            HmmError::InvalidObservation {
                position,
                symbol,
                alphabet_size,
            } => write!(
                f,
                "observation {} at position {} is outside the emission alphabet [0, {})",
                symbol, position, alphabet_size
            ),
        }
    }
}

impl Error for HmmError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match *self {
            HmmError::Io(ref err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for HmmError {
    fn from(err: io::Error) -> HmmError {
        HmmError::Io(err)
    }
}
