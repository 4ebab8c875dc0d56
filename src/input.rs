//! Reading models and observation sequences from a flat text format.
//!
//! The format is line oriented, whitespace separated:
//!
//! 1. the state count `N` and the observation alphabet size `K`
//! 2. `N` integer state labels
//! 3. `N` initial probabilities
//! 4. the observation sequence, as symbols in `[0, K)`
//! 5. the `N` × `N` transition matrix, flattened row-major
//! 6. the `N` × `K` emission matrix, flattened row-major
//!
//! Reshaping the flat matrix lines is plain marshalling; no validation happens here beyond
//! token counts. Observation symbols are range-checked by the decoder, not the reader.
use crate::error::{HmmError, Result};
use crate::HMM;
use ndarray::{Array1, Array2};
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::str::Lines;

/// A model plus the observation sequence to decode, as read from one input file.
#[derive(Debug)]
pub struct ModelFile {
    pub hmm: HMM,
    pub observations: Array1<usize>,
}

impl ModelFile {
    /// Read and parse the file at `path`.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<ModelFile> {
        let text = fs::read_to_string(path)?;
        ModelFile::parse(&text)
    }

    /// Parse a model from the six-line text format. Trailing lines are ignored.
    pub fn parse(text: &str) -> Result<ModelFile> {
        let mut lines = text.lines();

        let counts: Vec<usize> = parse_tokens(next_line(&mut lines, 1)?, 1)?;
        if counts.len() != 2 {
            return Err(HmmError::Malformed(
                "line 1: expected a state count and an alphabet size".to_string(),
            ));
        }
        let (n, k) = (counts[0], counts[1]);

        let states: Vec<i64> = parse_tokens(next_line(&mut lines, 2)?, 2)?;
        expect_len("state labels", &states, n, 2)?;

        let pi: Vec<f64> = parse_tokens(next_line(&mut lines, 3)?, 3)?;
        expect_len("initial probabilities", &pi, n, 3)?;

        let observations: Vec<usize> = parse_tokens(next_line(&mut lines, 4)?, 4)?;

        let a: Vec<f64> = parse_tokens(next_line(&mut lines, 5)?, 5)?;
        expect_len("transition probabilities", &a, n * n, 5)?;

        let b: Vec<f64> = parse_tokens(next_line(&mut lines, 6)?, 6)?;
        expect_len("emission probabilities", &b, n * k, 6)?;

        let a = Array2::from_shape_vec((n, n), a)
            .map_err(|err| HmmError::InvalidDimension(format!("line 5: {}", err)))?;
        let b = Array2::from_shape_vec((n, k), b)
            .map_err(|err| HmmError::InvalidDimension(format!("line 6: {}", err)))?;

        Ok(ModelFile {
            hmm: HMM::new(Array1::from(states), Array1::from(pi), a, b)?,
            observations: Array1::from(observations),
        })
    }
}

fn next_line<'a>(lines: &mut Lines<'a>, number: usize) -> Result<&'a str> {
    lines
        .next()
        .ok_or_else(|| HmmError::Malformed(format!("line {}: missing", number)))
}

fn parse_tokens<T: FromStr>(line: &str, number: usize) -> Result<Vec<T>> {
    line.split_whitespace()
        .map(|token| {
            token
                .parse()
                .map_err(|_| HmmError::Malformed(format!("line {}: invalid token {:?}", number, token)))
        })
        .collect()
}

fn expect_len<T>(what: &str, values: &[T], expected: usize, number: usize) -> Result<()> {
    if values.len() != expected {
        return Err(HmmError::InvalidDimension(format!(
            "line {}: expected {} {}, found {}",
            number,
            expected,
            what,
            values.len()
        )));
    }
    Ok(())
}
