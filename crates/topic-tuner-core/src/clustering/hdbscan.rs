//! HDBSCAN clustering parameters and clusterer implementation.
//!
//! # Algorithm
//!
//! HDBSCAN = Hierarchical Density-Based Spatial Clustering of Applications with Noise
//!
//! Steps:
//! 1. Compute core distances (distance to the `min_samples`-th nearest point, self included)
//! 2. Build mutual reachability graph: MR(a,b) = max(core_dist(a), core_dist(b), dist(a,b))
//! 3. Construct minimum spanning tree using Prim's algorithm
//! 4. Build the single-linkage hierarchy from the sorted MST edges
//! 5. Condense the hierarchy, dropping splits smaller than `min_cluster_size`
//! 6. Select clusters by excess of mass or leaves, then label rows
//!
//! Membership probability of a row is `lambda_row / lambda_max` of its
//! cluster, where `lambda = 1 / distance` at which the row left the cluster.

use std::cmp::Ordering;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::{ClusterAssignment, DensityClusterer, NOISE_LABEL};
use crate::distance::DistanceMetric;
use crate::error::{Result, TunerError};
use crate::matrix::EmbeddingMatrix;

/// Distances are floored here so `lambda = 1 / d` stays finite.
const MIN_DISTANCE: f32 = 1e-10;

/// Cluster selection method for HDBSCAN.
///
/// Determines how clusters are extracted from the condensed tree.
///
/// # Example
///
/// ```
/// use topic_tuner_core::clustering::ClusterSelectionMethod;
///
/// let method = ClusterSelectionMethod::default();
/// assert_eq!(method, ClusterSelectionMethod::EOM);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ClusterSelectionMethod {
    /// Excess of Mass - default, good general purpose.
    /// Selects clusters based on persistence in the hierarchy.
    #[default]
    EOM,
    /// Leaf clusters only - more granular clustering.
    /// Selects only the leaf nodes of the hierarchy tree.
    Leaf,
}

impl ClusterSelectionMethod {
    /// Get description of this method.
    pub fn description(&self) -> &'static str {
        match self {
            ClusterSelectionMethod::EOM => "Excess of Mass - good general purpose clustering",
            ClusterSelectionMethod::Leaf => "Leaf clusters only - more granular clustering",
        }
    }
}

/// Parameters for HDBSCAN clustering algorithm.
///
/// # Example
///
/// ```
/// use topic_tuner_core::clustering::HdbscanParams;
///
/// let params = HdbscanParams::new(5, 2);
/// assert!(params.validate().is_ok());
/// assert!(HdbscanParams::new(3, 4).validate().is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HdbscanParams {
    /// Minimum number of points to form a cluster.
    pub min_cluster_size: usize,

    /// Minimum samples for a point to be considered a core point.
    /// Must be <= min_cluster_size.
    pub min_samples: usize,

    /// Method for selecting clusters from hierarchy.
    pub cluster_selection_method: ClusterSelectionMethod,

    /// Distance metric in the (reduced) input space.
    pub metric: DistanceMetric,
}

impl Default for HdbscanParams {
    fn default() -> Self {
        Self {
            min_cluster_size: 5,
            min_samples: 2,
            cluster_selection_method: ClusterSelectionMethod::EOM,
            metric: DistanceMetric::Euclidean,
        }
    }
}

impl HdbscanParams {
    /// Params with the given sizes and defaults elsewhere.
    pub fn new(min_cluster_size: usize, min_samples: usize) -> Self {
        Self {
            min_cluster_size,
            min_samples,
            ..Self::default()
        }
    }

    /// Set cluster selection method.
    #[must_use]
    pub fn with_selection_method(mut self, method: ClusterSelectionMethod) -> Self {
        self.cluster_selection_method = method;
        self
    }

    /// Set distance metric.
    #[must_use]
    pub fn with_metric(mut self, metric: DistanceMetric) -> Self {
        self.metric = metric;
        self
    }

    /// Validate parameters.
    ///
    /// # Errors
    ///
    /// Returns `TunerError::InvalidConfiguration` if:
    /// - min_cluster_size < 2
    /// - min_samples < 1
    /// - min_samples > min_cluster_size
    pub fn validate(&self) -> Result<()> {
        if self.min_cluster_size < 2 {
            return Err(TunerError::invalid_configuration(format!(
                "min_cluster_size must be >= 2, got {}. HDBSCAN requires at least 2 points to form a cluster.",
                self.min_cluster_size
            )));
        }

        if self.min_samples < 1 {
            return Err(TunerError::invalid_configuration(format!(
                "min_samples must be >= 1, got {}",
                self.min_samples
            )));
        }

        if self.min_samples > self.min_cluster_size {
            return Err(TunerError::invalid_configuration(format!(
                "min_samples ({}) must be <= min_cluster_size ({}). A core point cannot require more samples than the minimum cluster size.",
                self.min_samples, self.min_cluster_size
            )));
        }

        Ok(())
    }

    /// Check if these params will work for a given data size.
    #[inline]
    pub fn is_viable_for_size(&self, n_points: usize) -> bool {
        n_points >= self.min_cluster_size
    }
}

// =============================================================================
// Condensed tree
// =============================================================================

/// One edge of the condensed tree. Cluster nodes are numbered from `n_points`
/// (the root) upwards; `child < n_points` is a single row leaving `parent`.
#[derive(Debug, Clone, Copy)]
struct CondensedEdge {
    parent: usize,
    child: usize,
    lambda: f32,
    size: usize,
}

/// Merge step of the single-linkage hierarchy.
#[derive(Debug, Clone, Copy)]
struct Merge {
    left: usize,
    right: usize,
    distance: f32,
    size: usize,
}

/// Union-find over leaves and merge nodes (`2n - 1` slots).
struct LinkageUnionFind {
    parent: Vec<usize>,
    size: Vec<usize>,
    next: usize,
}

impl LinkageUnionFind {
    fn new(n: usize) -> Self {
        let total = 2 * n - 1;
        let mut size = vec![0; total];
        size[..n].fill(1);
        Self {
            parent: (0..total).collect(),
            size,
            next: n,
        }
    }

    fn find(&mut self, mut x: usize) -> usize {
        let mut root = x;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        while self.parent[x] != root {
            let up = self.parent[x];
            self.parent[x] = root;
            x = up;
        }
        root
    }

    fn union(&mut self, a: usize, b: usize) -> usize {
        let node = self.next;
        self.parent[a] = node;
        self.parent[b] = node;
        self.size[node] = self.size[a] + self.size[b];
        self.next += 1;
        node
    }
}

#[derive(Debug, Clone)]
struct FittedModel {
    training: EmbeddingMatrix,
    core_distances: Vec<f32>,
    assignment: ClusterAssignment,
    /// Largest lambda inside each selected cluster, indexed by output label.
    label_max_lambda: Vec<f32>,
}

// =============================================================================
// HdbscanClusterer Implementation
// =============================================================================

/// HDBSCAN clusterer for batch density-based clustering.
///
/// # Example
///
/// ```
/// use topic_tuner_core::clustering::{DensityClusterer, HdbscanClusterer, HdbscanParams};
/// use topic_tuner_core::EmbeddingMatrix;
///
/// let mut rows = Vec::new();
/// for i in 0..6 {
///     rows.push(vec![0.0 + i as f32 * 0.01, 0.0]);
///     rows.push(vec![9.0 + i as f32 * 0.01, 9.0]);
/// }
/// let data = EmbeddingMatrix::from_rows(&rows).unwrap();
///
/// let mut clusterer = HdbscanClusterer::new(HdbscanParams::new(3, 2));
/// let assignment = clusterer.fit(&data).unwrap();
/// assert_eq!(assignment.label_count(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct HdbscanClusterer {
    params: HdbscanParams,
    fitted: Option<FittedModel>,
}

impl HdbscanClusterer {
    /// Create a new HDBSCAN clusterer with specified parameters.
    pub fn new(params: HdbscanParams) -> Self {
        Self {
            params,
            fitted: None,
        }
    }

    /// Create a clusterer with default parameters.
    pub fn with_defaults() -> Self {
        Self::new(HdbscanParams::default())
    }

    /// Parameters of this clusterer.
    pub fn params(&self) -> &HdbscanParams {
        &self.params
    }

    /// Dense pairwise distance matrix, rows computed in parallel.
    fn pairwise_distances(&self, data: &EmbeddingMatrix) -> Vec<f32> {
        let n = data.n_rows();
        let metric = self.params.metric;
        (0..n)
            .into_par_iter()
            .flat_map_iter(|i| {
                let row = data.row(i);
                (0..n).map(move |j| {
                    if i == j {
                        0.0
                    } else {
                        metric.distance(row, data.row(j)).max(0.0)
                    }
                })
            })
            .collect()
    }

    /// Core distances (distance to the `min_samples`-th nearest point, self included).
    fn compute_core_distances(&self, distances: &[f32], n: usize) -> Vec<f32> {
        (0..n)
            .into_par_iter()
            .map(|i| kth_smallest(&distances[i * n..(i + 1) * n], self.params.min_samples))
            .collect()
    }

    /// Minimum spanning tree of the mutual reachability graph using Prim's algorithm.
    ///
    /// Returns edges sorted by weight: (node_a, node_b, weight)
    fn build_mst(&self, distances: &[f32], core: &[f32]) -> Vec<(usize, usize, f32)> {
        let n = core.len();
        let mr = |i: usize, j: usize| distances[i * n + j].max(core[i]).max(core[j]);

        let mut in_tree = vec![false; n];
        let mut edges = Vec::with_capacity(n.saturating_sub(1));
        let mut min_dist = vec![f32::INFINITY; n];
        let mut min_edge = vec![0usize; n];

        in_tree[0] = true;
        for j in 1..n {
            min_dist[j] = mr(0, j);
        }

        for _ in 1..n {
            let mut min_val = f32::INFINITY;
            let mut min_idx = usize::MAX;
            for j in 0..n {
                if !in_tree[j] && (min_idx == usize::MAX || min_dist[j] < min_val) {
                    min_val = min_dist[j];
                    min_idx = j;
                }
            }

            in_tree[min_idx] = true;
            edges.push((min_edge[min_idx], min_idx, min_val));

            for j in 0..n {
                if !in_tree[j] {
                    let d = mr(min_idx, j);
                    if d < min_dist[j] {
                        min_dist[j] = d;
                        min_edge[j] = min_idx;
                    }
                }
            }
        }

        edges.sort_by(|a, b| {
            a.2.partial_cmp(&b.2)
                .unwrap_or(Ordering::Equal)
                .then(a.0.cmp(&b.0))
                .then(a.1.cmp(&b.1))
        });
        edges
    }

    /// Single-linkage merges from sorted MST edges.
    fn single_linkage(mst: &[(usize, usize, f32)], n: usize) -> Vec<Merge> {
        let mut uf = LinkageUnionFind::new(n);
        mst.iter()
            .map(|&(a, b, w)| {
                let ra = uf.find(a);
                let rb = uf.find(b);
                let node = uf.union(ra, rb);
                Merge {
                    left: ra,
                    right: rb,
                    distance: w,
                    size: uf.size[node],
                }
            })
            .collect()
    }

    /// Collapse the hierarchy into clusters of at least `min_cluster_size` rows.
    ///
    /// Returns the condensed edges and the number of condensed clusters.
    fn condense(&self, merges: &[Merge], n: usize) -> (Vec<CondensedEdge>, usize) {
        let mcs = self.params.min_cluster_size;
        let root = 2 * n - 2;
        let node_size = |node: usize| if node < n { 1 } else { merges[node - n].size };

        let mut relabel = vec![0usize; 2 * n - 1];
        relabel[root] = n;
        let mut next_label = n + 1;
        let mut ignore = vec![false; 2 * n - 1];
        let mut edges = Vec::new();

        let mut queue = std::collections::VecDeque::from([root]);
        while let Some(node) = queue.pop_front() {
            if node < n {
                continue;
            }
            let merge = merges[node - n];
            queue.push_back(merge.left);
            queue.push_back(merge.right);
            if ignore[node] {
                continue;
            }

            let lambda = 1.0 / merge.distance.max(MIN_DISTANCE);
            let parent = relabel[node];
            let (left_size, right_size) = (node_size(merge.left), node_size(merge.right));

            match (left_size >= mcs, right_size >= mcs) {
                (true, true) => {
                    for (child, size) in [(merge.left, left_size), (merge.right, right_size)] {
                        relabel[child] = next_label;
                        edges.push(CondensedEdge {
                            parent,
                            child: next_label,
                            lambda,
                            size,
                        });
                        next_label += 1;
                    }
                }
                (false, false) => {
                    for child in [merge.left, merge.right] {
                        Self::fall_out(merges, n, child, parent, lambda, &mut ignore, &mut edges);
                    }
                }
                (false, true) => {
                    relabel[merge.right] = parent;
                    Self::fall_out(merges, n, merge.left, parent, lambda, &mut ignore, &mut edges);
                }
                (true, false) => {
                    relabel[merge.left] = parent;
                    Self::fall_out(merges, n, merge.right, parent, lambda, &mut ignore, &mut edges);
                }
            }
        }

        (edges, next_label - n)
    }

    /// Every row under `node` leaves `parent` at `lambda`.
    fn fall_out(
        merges: &[Merge],
        n: usize,
        node: usize,
        parent: usize,
        lambda: f32,
        ignore: &mut [bool],
        edges: &mut Vec<CondensedEdge>,
    ) {
        let mut stack = vec![node];
        while let Some(sub) = stack.pop() {
            ignore[sub] = true;
            if sub < n {
                edges.push(CondensedEdge {
                    parent,
                    child: sub,
                    lambda,
                    size: 1,
                });
            } else {
                let m = merges[sub - n];
                stack.push(m.left);
                stack.push(m.right);
            }
        }
    }

    /// Pick clusters from the condensed tree; index 0 (the root) is never selected.
    fn select_clusters(&self, edges: &[CondensedEdge], n: usize, n_clusters: usize) -> Vec<bool> {
        let mut birth = vec![0.0f64; n_clusters];
        let mut children: Vec<Vec<usize>> = vec![Vec::new(); n_clusters];
        for e in edges.iter().filter(|e| e.child >= n) {
            birth[e.child - n] = f64::from(e.lambda);
            children[e.parent - n].push(e.child - n);
        }

        let mut stability = vec![0.0f64; n_clusters];
        for e in edges {
            let p = e.parent - n;
            stability[p] += (f64::from(e.lambda) - birth[p]) * e.size as f64;
        }

        let mut selected = vec![false; n_clusters];
        match self.params.cluster_selection_method {
            ClusterSelectionMethod::Leaf => {
                for c in 1..n_clusters {
                    selected[c] = children[c].is_empty();
                }
            }
            ClusterSelectionMethod::EOM => {
                selected[1..].fill(true);
                // Children always carry larger ids than their parent.
                for c in (1..n_clusters).rev() {
                    let child_stability: f64 = children[c].iter().map(|&ch| stability[ch]).sum();
                    if child_stability > stability[c] {
                        selected[c] = false;
                        stability[c] = child_stability;
                    } else {
                        let mut stack = children[c].clone();
                        while let Some(d) = stack.pop() {
                            selected[d] = false;
                            stack.extend_from_slice(&children[d]);
                        }
                    }
                }
            }
        }

        tracing::trace!(
            condensed_clusters = n_clusters,
            selected = selected.iter().filter(|&&s| s).count(),
            method = ?self.params.cluster_selection_method,
            "Cluster selection complete"
        );

        selected
    }

    /// Labels, probabilities and per-label lambda maxima.
    fn label_rows(
        edges: &[CondensedEdge],
        n: usize,
        n_clusters: usize,
        selected: &[bool],
    ) -> (ClusterAssignment, Vec<f32>) {
        let mut cluster_parent = vec![usize::MAX; n_clusters];
        let mut max_lambda = vec![0.0f32; n_clusters];
        for e in edges {
            let p = e.parent - n;
            max_lambda[p] = max_lambda[p].max(e.lambda);
            if e.child >= n {
                cluster_parent[e.child - n] = p;
            }
        }

        // Output labels in cluster-id order.
        let mut output_label = vec![NOISE_LABEL; n_clusters];
        let mut next = 0i32;
        for c in 0..n_clusters {
            if selected[c] {
                output_label[c] = next;
                next += 1;
            }
        }
        let label_max_lambda: Vec<f32> = (0..n_clusters)
            .filter(|&c| selected[c])
            .map(|c| max_lambda[c])
            .collect();

        let mut labels = vec![NOISE_LABEL; n];
        let mut probabilities = vec![0.0f32; n];
        for e in edges.iter().filter(|e| e.child < n) {
            let mut c = e.parent - n;
            let owner = loop {
                if selected[c] {
                    break Some(c);
                }
                if c == 0 {
                    break None;
                }
                c = cluster_parent[c];
            };

            if let Some(owner) = owner {
                labels[e.child] = output_label[owner];
                probabilities[e.child] = membership_probability(e.lambda, max_lambda[owner]);
            }
        }

        (
            ClusterAssignment {
                labels,
                probabilities,
            },
            label_max_lambda,
        )
    }
}

impl DensityClusterer for HdbscanClusterer {
    fn fit(&mut self, data: &EmbeddingMatrix) -> Result<ClusterAssignment> {
        self.params.validate()?;

        let n = data.n_rows();
        if !self.params.is_viable_for_size(n) {
            return Err(TunerError::insufficient_data(
                "min_cluster_size",
                self.params.min_cluster_size - 1,
                n,
            ));
        }

        // Step 1: core distances
        let distances = self.pairwise_distances(data);
        let core_distances = self.compute_core_distances(&distances, n);

        // Steps 2-3: mutual reachability MST
        let mst = self.build_mst(&distances, &core_distances);

        // Steps 4-6: hierarchy, condensed tree, selection, labels
        let merges = Self::single_linkage(&mst, n);
        let (edges, n_clusters) = self.condense(&merges, n);
        let selected = self.select_clusters(&edges, n, n_clusters);
        let (assignment, label_max_lambda) = Self::label_rows(&edges, n, n_clusters, &selected);

        let largest = {
            let mut sizes = vec![0usize; label_max_lambda.len()];
            for &l in assignment.labels.iter().filter(|&&l| l != NOISE_LABEL) {
                sizes[l as usize] += 1;
            }
            sizes.into_iter().max().unwrap_or(0)
        };
        tracing::debug!(
            points = n,
            min_cluster_size = self.params.min_cluster_size,
            min_samples = self.params.min_samples,
            clusters = label_max_lambda.len(),
            noise = assignment.noise_count(),
            largest_cluster = largest,
            "HDBSCAN fit complete"
        );

        self.fitted = Some(FittedModel {
            training: data.clone(),
            core_distances,
            assignment: assignment.clone(),
            label_max_lambda,
        });
        Ok(assignment)
    }

    fn assignment(&self) -> Result<&ClusterAssignment> {
        self.fitted
            .as_ref()
            .map(|f| &f.assignment)
            .ok_or_else(|| TunerError::not_ready("clusterer has not been fitted"))
    }

    /// Each row takes the label of its nearest training row under mutual
    /// reachability; probability follows from that reachability distance.
    fn predict(&self, data: &EmbeddingMatrix) -> Result<ClusterAssignment> {
        let fitted = self
            .fitted
            .as_ref()
            .ok_or_else(|| TunerError::not_ready("clusterer has not been fitted"))?;

        if data.n_cols() != fitted.training.n_cols() {
            return Err(TunerError::dimension_mismatch(
                fitted.training.n_cols(),
                data.n_cols(),
            ));
        }

        let metric = self.params.metric;
        let k = self.params.min_samples;
        let (labels, probabilities): (Vec<i32>, Vec<f32>) = (0..data.n_rows())
            .into_par_iter()
            .map(|i| {
                let row = data.row(i);
                let dists: Vec<f32> = fitted
                    .training
                    .rows()
                    .map(|t| metric.distance(row, t).max(0.0))
                    .collect();
                // The query itself is not in the training set, so its own zero is absent.
                let core = kth_smallest(&dists, k.saturating_sub(1).max(1));

                let (nearest, reach) = dists
                    .iter()
                    .enumerate()
                    .map(|(j, &d)| (j, d.max(core).max(fitted.core_distances[j])))
                    .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal))
                    .unwrap_or((0, f32::INFINITY));

                let label = fitted.assignment.labels[nearest];
                if label == NOISE_LABEL {
                    (NOISE_LABEL, 0.0)
                } else {
                    let lambda = 1.0 / reach.max(MIN_DISTANCE);
                    let max = fitted.label_max_lambda[label as usize];
                    (label, membership_probability(lambda, max))
                }
            })
            .unzip();

        Ok(ClusterAssignment {
            labels,
            probabilities,
        })
    }
}

/// `k`-th smallest value (1-based), clamped to the slice length.
fn kth_smallest(values: &[f32], k: usize) -> f32 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    let idx = k.max(1).min(sorted.len()) - 1;
    sorted.get(idx).copied().unwrap_or(0.0)
}

#[inline]
fn membership_probability(lambda: f32, max_lambda: f32) -> f32 {
    if max_lambda <= 0.0 || !max_lambda.is_finite() {
        1.0
    } else {
        (lambda.min(max_lambda) / max_lambda).clamp(0.0, 1.0)
    }
}
