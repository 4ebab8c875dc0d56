//! This library contains a Rust implementation of Viterbi decoding for time-invariant Hidden
//! Markov models with discrete observations. Given a fully specified model and a sequence of
//! observed symbols, it recovers the single most likely sequence of hidden states.
//!
//! See [`trellis::HMM`](struct.HMM.html) for detailed documentation on how to work with this
//! library. The [`input`](input/index.html) module reads models and observation sequences from a
//! flat text format, and the `viterbi` binary wraps the two together into a command line tool.
//!
//! Below, the decoder recovers the hidden states behind three observations:
//!
//! ```
//! use ndarray::array;
//! use trellis::HMM;
//!
//! fn main() {
//!     let hmm = HMM::new(
//!         array![0, 1],
//!         array![0.6, 0.4],
//!         array![[0.7, 0.3], [0.4, 0.6]],
//!         array![[0.5, 0.5], [0.1, 0.9]],
//!     )
//!     .unwrap();
//!     let path = hmm.most_likely_sequence(&array![0, 1, 0]).unwrap();
//!     assert_eq!(array![0, 0, 0], path);
//! }
//! ```
//!
//! ## Notes
//!
//! *A Tutorial on Hidden Markov Models and Selected Applications in Speech Recognition* by
//! Lawrence Rabiner, 1989 was invaluable as a reference, as was section 13.2 of *Pattern
//! Recognition and Machine Learning* by Christopher Bishop, 2016.
//!
//! This crate only decodes. It does not train models, sample from them, or smooth over them;
//! parameters come in from the caller fully formed.
use self::ndarray_utils::*;
use ndarray::array;
use ndarray::prelude::*;
use std::f64;

mod error;
pub mod input;

pub use crate::error::{HmmError, Result};

/// This struct represents a fully specified HMM: values for each parameter, plus the label of
/// each hidden state.
///
/// # Math
///
/// The HMM explains a sequence of observations:
///
/// `Y = (Y_0 = y_0, Y_1 = y_1, ..., Y_{T-1} = y_{T-1})`
///
/// ...where each `y_t` is a symbol in `[0, K)`.
///
/// It accomplishes this with latent variables for hidden state `X = (X_0, ..., X_{T-1})` where
/// each `x_t` is in `[0, N)`.
///
/// A model has three parameters and a labelling:
/// * `a`, the N × N state transition matrix: `a[(i, j)] = P(X_t=j | X_{t-1}=i)`
/// * `b`, the N × K observation matrix: `b[(i, k)] = P(Y_t=k | X_t=i)`
/// * `pi`, the N-length initial state distribution: `pi[i] = P(X_0=i)`
/// * `states`, the N labels that decoded paths are reported in; labels are opaque identifiers
///   and are assumed distinct
#[derive(Debug)]
#[cfg_attr(feature = "serde-1", derive(serde::Serialize, serde::Deserialize))]
pub struct HMM {
    pub states: Array1<i64>,
    pub pi: Array1<f64>,
    pub a: Array2<f64>,
    pub b: Array2<f64>,
}

impl HMM {
    /// Create a new HMM with the given labels and parameters.
    ///
    /// Returns [`HmmError::InvalidDimension`](enum.HmmError.html) if any of:
    /// - `b` has no rows or no columns
    /// - `a` is not square
    /// - the row counts of `a` and `b`, the length of `pi`, and the length of `states` disagree
    ///
    /// Probability rows are used exactly as given. A row that does not sum to 1 is neither
    /// rejected nor rescaled; normalizing is the caller's responsibility.
    pub fn new(
        states: Array1<i64>,
        pi: Array1<f64>,
        a: Array2<f64>,
        b: Array2<f64>,
    ) -> Result<Self> {
        if b.rows() == 0 || b.cols() == 0 {
            return Err(HmmError::InvalidDimension(format!(
                "emission matrix must have positive dimensions, got {}x{}",
                b.rows(),
                b.cols()
            )));
        }
        if a.rows() != a.cols() {
            return Err(HmmError::InvalidDimension(format!(
                "transition matrix must be square, got {}x{}",
                a.rows(),
                a.cols()
            )));
        }
        if a.rows() != b.rows() {
            return Err(HmmError::InvalidDimension(format!(
                "transition and emission matrices disagree on the state count: {} vs {}",
                a.rows(),
                b.rows()
            )));
        }
        if pi.len() != b.rows() {
            return Err(HmmError::InvalidDimension(format!(
                "initial distribution must have length {}, got {}",
                b.rows(),
                pi.len()
            )));
        }
        if states.len() != b.rows() {
            return Err(HmmError::InvalidDimension(format!(
                "expected {} state labels, got {}",
                b.rows(),
                states.len()
            )));
        }
        Ok(Self { states, pi, a, b })
    }

    /// `N`, the number of states in this HMM
    pub fn n(&self) -> usize {
        self.b.rows()
    }

    /// `K`, the number of possible observations that this model can emit
    pub fn k(&self) -> usize {
        self.b.cols()
    }

    /// This is the Viterbi algorithm. Given a sequence of observations, return the most likely
    /// sequence of hidden states, reported as state labels.
    ///
    /// The recursion runs in log space, adding log probabilities instead of multiplying plain
    /// ones, so long observation sequences do not underflow to zero. A zero probability becomes
    /// negative infinity, which drops out of every `max` exactly like a zero factor drops out of
    /// a product; the decoded path is the same either way.
    ///
    /// Ties are broken towards the lowest state index, both when choosing a predecessor and
    /// when choosing the final state, so decoding is deterministic. An observation sequence
    /// that is impossible under the model (every path has probability zero) still decodes to
    /// the path the tie-break selects rather than failing.
    ///
    /// Returns [`HmmError::InvalidObservation`](enum.HmmError.html) if any observation is
    /// outside `[0, K)`. The check runs before any table is filled.
    pub fn most_likely_sequence(&self, ys: &Array1<usize>) -> Result<Array1<i64>> {
        for (position, &symbol) in ys.iter().enumerate() {
            if symbol >= self.k() {
                return Err(HmmError::InvalidObservation {
                    position,
                    symbol,
                    alphabet_size: self.k(),
                });
            }
        }

        // Special-case when the sequence of observations is empty
        if ys.is_empty() {
            return Ok(array![]);
        }

        let log_a = self.a.mapv(f64::ln);
        let log_b = self.b.mapv(f64::ln);

        // probs is a T × N matrix where probs[(t, i)] is the log probability that we are in
        // state i at time t given all observations up to time t and assuming the most likely
        // sequence of hidden states up to time t.
        let mut probs = Array2::from_elem((ys.len(), self.n()), f64::NEG_INFINITY);

        // x_to_prev_x is a (T - 1) × N matrix where each entry x_to_prev_x[(t, i)] is the most
        // likely state that would have occurred at time t given that we're in state i at time
        // t + 1.
        let mut x_to_prev_x = Array2::zeros((ys.len() - 1, self.n()));

        probs
            .row_mut(0)
            .assign(&(self.pi.mapv(f64::ln) + log_b.column(ys[0])));

        for t in 1..ys.len() {
            let y = ys[t];
            for i in 0..self.n() {
                for j in 0..self.n() {
                    let log_prob_i_j = probs[(t - 1, i)] + log_a[(i, j)] + log_b[(j, y)];
                    // A strict comparison keeps the lowest-indexed predecessor on ties. When
                    // every candidate is -inf the initial backpointer of 0 stands, which is
                    // the same tie-break.
                    if log_prob_i_j > probs[(t, j)] {
                        probs[(t, j)] = log_prob_i_j;
                        x_to_prev_x[(t - 1, j)] = i;
                    }
                }
            }
        }

        let (mut i, _log_p) = probs.row(ys.len() - 1).maxfx();
        let mut path = Array1::zeros(ys.len());
        path[ys.len() - 1] = i;
        for t in (0..ys.len() - 1).rev() {
            i = x_to_prev_x[(t, i)];
            path[t] = i;
        }
        Ok(path.mapv(|x| self.states[x]))
    }
}

mod ndarray_utils {
    use itertools::Itertools;
    use ndarray::{ArrayBase, Data, Ix1};
    use num_traits::Float;

    pub trait Array1Float<T: Float> {
        /// Along a 1D array, return the index of the maximum float value and the value itself.
        ///
        /// If there are multiple elements equal to the maximum, the lowest index is returned.
        ///
        /// The behavior of this function is unspecified if the array contains NaNs.
        ///
        /// See also `maxfx`
        fn maxf(&self) -> Option<(usize, T)>;

        /// The "expecting" version of `maxf`
        fn maxfx(&self) -> (usize, T);
    }

    impl<T, S> Array1Float<T> for ArrayBase<S, Ix1>
    where
        T: Float,
        S: Data<Elem = T>,
    {
        fn maxf(&self) -> Option<(usize, T)> {
            self.iter()
                .enumerate()
                .fold1(|(i0, v0), (i1, v1)| if v1 > v0 { (i1, v1) } else { (i0, v0) })
                .map(|(i, &v)| (i, v))
        }

        fn maxfx(&self) -> (usize, T) {
            self.maxf()
                .expect("maxfx failed because the input had length 0")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lazy_static::lazy_static;
    use spectral::prelude::*;

    lazy_static! {
        static ref HMM_WEATHER: HMM = {
            HMM::new(
                array![0, 1],
                array![0.6, 0.4],
                array![[0.7, 0.3], [0.4, 0.6]],
                array![[0.5, 0.5], [0.1, 0.9]],
            )
            .unwrap()
        };
    }

    // Every row is uniform, so every path is equally likely and every decision is a tie.
    lazy_static! {
        static ref HMM_UNIFORM: HMM = {
            HMM::new(
                array![0, 1],
                array![0.5, 0.5],
                array![[0.5, 0.5], [0.5, 0.5]],
                array![[0.5, 0.5], [0.5, 0.5]],
            )
            .unwrap()
        };
    }

    /// Each state strongly prefers to hand over to the other, and emissions carry no
    /// information. The two alternating paths tie for the maximum, and only the final argmax
    /// breaks the tie.
    lazy_static! {
        static ref HMM_CROSS: HMM = {
            HMM::new(
                array![7, 3],
                array![0.5, 0.5],
                array![[0.2, 0.8], [0.8, 0.2]],
                array![[0.5, 0.5], [0.5, 0.5]],
            )
            .unwrap()
        };
    }

    /// Hand-computed delta and backpointer tables for HMM_WEATHER on observations [0, 1, 0]:
    ///
    /// t = 0: delta = [0.6 * 0.5, 0.4 * 0.1] = [0.3, 0.04]
    /// t = 1: delta[0] = max(0.3 * 0.7, 0.04 * 0.4) * 0.5 = 0.105,   back[0] = 0
    ///        delta[1] = max(0.3 * 0.3, 0.04 * 0.6) * 0.9 = 0.081,   back[1] = 0
    /// t = 2: delta[0] = max(0.105 * 0.7, 0.081 * 0.4) * 0.5 = 0.03675, back[0] = 0
    ///        delta[1] = max(0.105 * 0.3, 0.081 * 0.6) * 0.1 = 0.00486, back[1] = 1
    ///
    /// The argmax at t = 2 is state 0 and backtracking stays on state 0 throughout.
    #[test]
    fn weather_path() {
        let path = HMM_WEATHER.most_likely_sequence(&array![0, 1, 0]).unwrap();
        assert_eq!(array![0, 0, 0], path);
    }

    #[test]
    fn path_has_one_state_per_observation() {
        for ys in &[array![0], array![1], array![0, 1], array![1, 1, 0, 1]] {
            let path = HMM_WEATHER.most_likely_sequence(ys).unwrap();
            asserting("path length matches observation count")
                .that(&path.len())
                .is_equal_to(ys.len());
            assert!(path
                .iter()
                .all(|label| HMM_WEATHER.states.iter().any(|s| s == label)));
        }
    }

    #[test]
    fn decoding_is_deterministic() {
        let ys = array![0, 1, 1, 0, 1];
        assert_eq!(
            HMM_WEATHER.most_likely_sequence(&ys).unwrap(),
            HMM_WEATHER.most_likely_sequence(&ys).unwrap()
        );
    }

    #[test]
    fn single_state_model_decodes_to_its_only_state() {
        let hmm = HMM::new(array![5], array![1.0], array![[1.0]], array![[0.5, 0.5]]).unwrap();
        let path = hmm.most_likely_sequence(&array![0, 1, 1, 0]).unwrap();
        assert_eq!(array![5, 5, 5, 5], path);
    }

    /// With identity transitions and a one-hot start there is only one reachable path, no
    /// matter how unlikely the emissions along it are.
    #[test]
    fn identity_transitions_pin_the_path_to_the_start_state() {
        let hmm = HMM::new(
            array![10, 20, 30],
            array![0.0, 1.0, 0.0],
            array![[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
            array![[0.9, 0.1], [0.9, 0.1], [0.9, 0.1]],
        )
        .unwrap();
        let path = hmm.most_likely_sequence(&array![1, 1, 1, 1]).unwrap();
        assert_eq!(array![20, 20, 20, 20], path);
    }

    #[test]
    fn uniform_model_ties_resolve_to_the_lowest_index() {
        let path = HMM_UNIFORM.most_likely_sequence(&array![0, 1, 0]).unwrap();
        assert_eq!(array![0, 0, 0], path);
    }

    /// For observations [0, 0, 0] every path probability is
    /// 0.5^4 * a(x0, x1) * a(x1, x2), maximized by taking the 0.8 transition twice. The
    /// alternating paths [7, 3, 7] and [3, 7, 3] tie; the terminal argmax picks index 0, and
    /// backtracking from there yields the alternating path that ends in state index 0.
    #[test]
    fn terminal_tie_resolves_to_the_lowest_index() {
        let path = HMM_CROSS.most_likely_sequence(&array![0, 0, 0]).unwrap();
        assert_eq!(array![7, 3, 7], path);
    }

    /// An observation that no state can emit zeroes out every path. The decoder still returns
    /// the tie-break path instead of failing.
    #[test]
    fn impossible_observations_still_decode() {
        let hmm = HMM::new(
            array![1, 2],
            array![0.5, 0.5],
            array![[0.5, 0.5], [0.5, 0.5]],
            array![[0.0, 1.0], [0.0, 1.0]],
        )
        .unwrap();
        let path = hmm.most_likely_sequence(&array![0, 0]).unwrap();
        assert_eq!(array![1, 1], path);
    }

    #[test]
    fn empty_observations_decode_to_an_empty_path() {
        let path = HMM_WEATHER.most_likely_sequence(&array![]).unwrap();
        assert_eq!(0, path.len());
    }

    /// A plain product of 2000 probabilities around 0.9 * 0.99 would underflow an f64 long
    /// before the end of the sequence; in log space the block structure survives.
    #[test]
    fn long_sequences_do_not_underflow() {
        let hmm = HMM::new(
            array![0, 1],
            array![0.5, 0.5],
            array![[0.99, 0.01], [0.01, 0.99]],
            array![[0.9, 0.1], [0.1, 0.9]],
        )
        .unwrap();
        let ys: Array1<usize> = (0..2000).map(|t| if t < 1000 { 0 } else { 1 }).collect();
        let expected: Array1<i64> = (0..2000).map(|t| if t < 1000 { 0 } else { 1 }).collect();
        assert_eq!(expected, hmm.most_likely_sequence(&ys).unwrap());
    }

    #[test]
    fn observation_out_of_range_is_rejected() {
        let err = HMM_WEATHER.most_likely_sequence(&array![0, 2]).unwrap_err();
        match err {
            HmmError::InvalidObservation {
                position,
                symbol,
                alphabet_size,
            } => {
                assert_eq!(1, position);
                assert_eq!(2, symbol);
                assert_eq!(2, alphabet_size);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn non_square_transition_matrix_is_rejected() {
        let result = HMM::new(
            array![0, 1],
            array![0.5, 0.5],
            array![[0.5, 0.5, 0.0], [0.5, 0.5, 0.0]],
            array![[0.5, 0.5], [0.5, 0.5]],
        );
        assert!(matches!(result, Err(HmmError::InvalidDimension(_))));
    }

    #[test]
    fn transition_matrix_of_the_wrong_size_is_rejected() {
        let result = HMM::new(
            array![0, 1],
            array![0.5, 0.5],
            array![[0.5, 0.3, 0.2], [0.5, 0.3, 0.2], [0.5, 0.3, 0.2]],
            array![[0.5, 0.5], [0.5, 0.5]],
        );
        assert!(matches!(result, Err(HmmError::InvalidDimension(_))));
    }

    #[test]
    fn initial_distribution_of_the_wrong_length_is_rejected() {
        let result = HMM::new(
            array![0, 1],
            array![0.5, 0.3, 0.2],
            array![[0.5, 0.5], [0.5, 0.5]],
            array![[0.5, 0.5], [0.5, 0.5]],
        );
        assert!(matches!(result, Err(HmmError::InvalidDimension(_))));
    }

    #[test]
    fn wrong_number_of_state_labels_is_rejected() {
        let result = HMM::new(
            array![0, 1, 2],
            array![0.5, 0.5],
            array![[0.5, 0.5], [0.5, 0.5]],
            array![[0.5, 0.5], [0.5, 0.5]],
        );
        assert!(matches!(result, Err(HmmError::InvalidDimension(_))));
    }
}
