//! Search space and concrete parameter sets.
//!
//! The space has four tunable integer parameters (two for the reducer, two
//! for the clusterer) and a `random_state` that stays fixed for every trial of
//! one search so that trials are comparable.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::constants::search_space as defaults;
use crate::error::{Result, TunerError};

/// Tunable parameter names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Param {
    /// Reducer neighbourhood size.
    NNeighbors,
    /// Reducer output dimension.
    NComponents,
    /// Smallest group the clusterer may call a cluster.
    MinClusterSize,
    /// Neighbours required for a core point.
    MinSamples,
}

impl Param {
    /// All parameters in a stable order.
    pub const ALL: [Param; 4] = [
        Param::NNeighbors,
        Param::NComponents,
        Param::MinClusterSize,
        Param::MinSamples,
    ];

    /// Snake-case name, as used in config files and reports.
    pub fn name(&self) -> &'static str {
        match self {
            Param::NNeighbors => "n_neighbors",
            Param::NComponents => "n_components",
            Param::MinClusterSize => "min_cluster_size",
            Param::MinSamples => "min_samples",
        }
    }
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Param {
    type Err = TunerError;

    fn from_str(s: &str) -> Result<Self> {
        Param::ALL
            .into_iter()
            .find(|p| p.name() == s)
            .ok_or_else(|| TunerError::invalid_configuration(format!("unknown parameter '{s}'")))
    }
}

/// Inclusive integer range `[lo, hi]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntRange {
    /// Lower bound, inclusive.
    pub lo: usize,
    /// Upper bound, inclusive.
    pub hi: usize,
}

impl IntRange {
    /// Create a range. Not validated; see [`SearchSpace::validate`].
    pub const fn new(lo: usize, hi: usize) -> Self {
        Self { lo, hi }
    }

    /// Number of values in the range (0 when inverted).
    #[inline]
    pub fn len(&self) -> usize {
        (self.hi + 1).saturating_sub(self.lo)
    }

    /// True for an inverted range.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `value` lies inside the range.
    #[inline]
    pub fn contains(&self, value: usize) -> bool {
        value >= self.lo && value <= self.hi
    }
}

/// Declares the legal range of every tunable parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchSpace {
    /// Reducer `n_neighbors` range.
    pub n_neighbors: IntRange,
    /// Reducer `n_components` range.
    pub n_components: IntRange,
    /// Clusterer `min_cluster_size` range.
    pub min_cluster_size: IntRange,
    /// Clusterer `min_samples` range.
    pub min_samples: IntRange,
    /// Seed held constant across all trials of one search.
    pub random_state: u64,
}

impl SearchSpace {
    /// Default ranges with the given `random_state`.
    pub fn new(random_state: u64) -> Self {
        Self {
            n_neighbors: defaults::N_NEIGHBORS,
            n_components: defaults::N_COMPONENTS,
            min_cluster_size: defaults::MIN_CLUSTER_SIZE,
            min_samples: defaults::MIN_SAMPLES,
            random_state,
        }
    }

    /// Range for one parameter.
    pub fn range(&self, param: Param) -> IntRange {
        match param {
            Param::NNeighbors => self.n_neighbors,
            Param::NComponents => self.n_components,
            Param::MinClusterSize => self.min_cluster_size,
            Param::MinSamples => self.min_samples,
        }
    }

    /// Replace the range for one parameter.
    #[must_use]
    pub fn with_range(mut self, param: Param, range: IntRange) -> Self {
        match param {
            Param::NNeighbors => self.n_neighbors = range,
            Param::NComponents => self.n_components = range,
            Param::MinClusterSize => self.min_cluster_size = range,
            Param::MinSamples => self.min_samples = range,
        }
        self
    }

    /// `(param, range)` pairs in [`Param::ALL`] order.
    pub fn iter(&self) -> impl Iterator<Item = (Param, IntRange)> + '_ {
        Param::ALL.into_iter().map(move |p| (p, self.range(p)))
    }

    /// Every range must be non-empty with a lower bound of at least 1.
    ///
    /// `min_cluster_size >= min_samples` is not checked here; the
    /// clusterer rejects such trials and the driver penalises them.
    pub fn validate(&self) -> Result<()> {
        for (param, range) in self.iter() {
            if range.lo > range.hi {
                return Err(TunerError::invalid_configuration(format!(
                    "{param} range is inverted: lo={} > hi={}",
                    range.lo, range.hi
                )));
            }
            if range.lo == 0 {
                return Err(TunerError::invalid_configuration(format!(
                    "{param} range must start at 1 or above, got lo=0"
                )));
            }
        }
        Ok(())
    }

    /// Whether every value of `params` is inside its range.
    pub fn contains(&self, params: &ParamSet) -> bool {
        self.iter().all(|(p, r)| r.contains(params.get(p)))
            && params.random_state == self.random_state
    }

    /// Parameter set at every lower bound.
    pub fn lower_corner(&self) -> ParamSet {
        ParamSet {
            n_neighbors: self.n_neighbors.lo,
            n_components: self.n_components.lo,
            min_cluster_size: self.min_cluster_size.lo,
            min_samples: self.min_samples.lo,
            random_state: self.random_state,
        }
    }
}

/// One concrete point of the search space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParamSet {
    /// Reducer neighbourhood size.
    pub n_neighbors: usize,
    /// Reducer output dimension.
    pub n_components: usize,
    /// Clusterer minimum cluster size.
    pub min_cluster_size: usize,
    /// Clusterer core-point sample count.
    pub min_samples: usize,
    /// Seed shared by every fit of the search.
    pub random_state: u64,
}

impl ParamSet {
    /// Value of one tunable parameter.
    pub fn get(&self, param: Param) -> usize {
        match param {
            Param::NNeighbors => self.n_neighbors,
            Param::NComponents => self.n_components,
            Param::MinClusterSize => self.min_cluster_size,
            Param::MinSamples => self.min_samples,
        }
    }

    /// Set one tunable parameter.
    pub fn set(&mut self, param: Param, value: usize) {
        match param {
            Param::NNeighbors => self.n_neighbors = value,
            Param::NComponents => self.n_components = value,
            Param::MinClusterSize => self.min_cluster_size = value,
            Param::MinSamples => self.min_samples = value,
        }
    }
}

impl fmt::Display for ParamSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "n_neighbors={} n_components={} min_cluster_size={} min_samples={} random_state={}",
            self.n_neighbors,
            self.n_components,
            self.min_cluster_size,
            self.min_samples,
            self.random_state
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_ranges() {
        let space = SearchSpace::new(7);
        assert_eq!(space.n_neighbors, IntRange::new(4, 12));
        assert_eq!(space.n_components, IntRange::new(3, 12));
        assert_eq!(space.min_cluster_size, IntRange::new(5, 15));
        assert_eq!(space.min_samples, IntRange::new(2, 4));
        assert_eq!(space.random_state, 7);
        assert!(space.validate().is_ok());
    }

    #[test]
    fn test_inverted_range_rejected() {
        let space = SearchSpace::new(1).with_range(Param::MinSamples, IntRange::new(5, 2));
        let err = space.validate().unwrap_err();
        assert!(err.to_string().contains("min_samples"), "{err}");
    }

    #[test]
    fn test_zero_lower_bound_rejected() {
        let space = SearchSpace::new(1).with_range(Param::NComponents, IntRange::new(0, 2));
        assert!(space.validate().is_err());
    }

    #[test]
    fn test_min_samples_above_cluster_size_is_not_a_space_error() {
        let space = SearchSpace::new(1)
            .with_range(Param::MinClusterSize, IntRange::new(2, 3))
            .with_range(Param::MinSamples, IntRange::new(4, 6));
        assert!(space.validate().is_ok());
    }

    #[test]
    fn test_param_set_get_set_and_contains() {
        let space = SearchSpace::new(3);
        let mut params = space.lower_corner();
        assert!(space.contains(&params));
        params.set(Param::NNeighbors, 12);
        assert_eq!(params.get(Param::NNeighbors), 12);
        assert!(space.contains(&params));
        params.set(Param::NNeighbors, 13);
        assert!(!space.contains(&params));
    }

    #[test]
    fn test_param_names_parse() {
        for p in Param::ALL {
            assert_eq!(p.name().parse::<Param>().unwrap(), p);
        }
        assert!("epsilon".parse::<Param>().is_err());
    }

    #[test]
    fn test_range_len() {
        assert_eq!(IntRange::new(4, 12).len(), 9);
        assert_eq!(IntRange::new(3, 3).len(), 1);
        assert!(IntRange::new(4, 3).is_empty());
    }
}
