use std::cmp::Ordering;
use std::collections::HashMap;

pub mod correction;
pub mod inference;

pub use correction::CorrectionMethod;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Alternative {
    TwoSided,
    Less,
    /// Upper tail, the activation direction
    #[default]
    Greater,
}

#[derive(Debug, Clone)]
pub struct MultipleTestResults {
    /// Test statistic for each voxel
    pub statistics: Vec<f64>,
    /// Raw (unadjusted) p-values, NaN where the statistic is undefined
    pub p_values: Vec<f64>,
    /// Adjusted p-values (after multiple testing correction)
    pub adjusted_p_values: Option<Vec<f64>>,
    /// Voxels accepted as significant by the correction
    pub significant: Vec<bool>,
    /// Degrees of freedom of the reference distribution
    pub degrees_of_freedom: Option<f64>,
    /// Global metadata about the test
    pub global_metadata: HashMap<String, String>,
}

impl MultipleTestResults {
    pub fn new(statistics: Vec<f64>, p_values: Vec<f64>, significant: Vec<bool>) -> Self {
        MultipleTestResults {
            statistics,
            p_values,
            adjusted_p_values: None,
            significant,
            degrees_of_freedom: None,
            global_metadata: HashMap::new(),
        }
    }

    /// Add adjusted p-values to the results
    pub fn with_adjusted_p_values(mut self, adjusted_p_values: Vec<f64>) -> Self {
        self.adjusted_p_values = Some(adjusted_p_values);
        self
    }

    pub fn with_degrees_of_freedom(mut self, df: f64) -> Self {
        self.degrees_of_freedom = Some(df);
        self
    }

    /// Add global metadata about the test
    pub fn with_global_metadata(mut self, key: &str, value: &str) -> Self {
        self.global_metadata
            .insert(key.to_string(), value.to_string());
        self
    }

    /// Indices of voxels accepted by the correction
    pub fn significant_indices(&self) -> Vec<usize> {
        self.significant
            .iter()
            .enumerate()
            .filter_map(|(i, &s)| if s { Some(i) } else { None })
            .collect()
    }

    pub fn num_significant(&self) -> usize {
        self.significant.iter().filter(|&&s| s).count()
    }

    /// Number of voxels left out of the correction because their p-value is undefined
    pub fn num_excluded(&self) -> usize {
        self.p_values.iter().filter(|p| p.is_nan()).count()
    }

    /// Get top n voxels by p-value; undefined p-values rank last
    pub fn top_features(&self, n: usize) -> Vec<usize> {
        let p_values = match &self.adjusted_p_values {
            Some(adj_p) => adj_p,
            None => &self.p_values,
        };

        let mut indices: Vec<usize> = (0..p_values.len()).collect();
        indices.sort_by(|&a, &b| {
            let (pa, pb) = (p_values[a], p_values[b]);
            match (pa.is_nan(), pb.is_nan()) {
                (true, true) => Ordering::Equal,
                (true, false) => Ordering::Greater,
                (false, true) => Ordering::Less,
                (false, false) => pa.partial_cmp(&pb).unwrap_or(Ordering::Equal),
            }
        });
        indices.truncate(n);
        indices
    }
}
