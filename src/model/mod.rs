pub mod isolation;
pub mod store;

use crate::core::OutlierVerdict;
use crate::error::Result;
use crate::features::{FeatureRow, TrainingMatrix};

/// An unsupervised outlier detector over fixed-width feature rows.
///
/// `score` must refuse rows whose width differs from what `fit` saw.
pub trait OutlierModel {
    fn name(&self) -> &str;

    fn fit(&mut self, matrix: &TrainingMatrix) -> Result<()>;

    /// Width of the rows the model was fit on, `None` before fitting.
    fn n_features(&self) -> Option<usize>;

    fn score(&self, row: &FeatureRow) -> Result<OutlierVerdict>;

    /// Score every row of a matrix, in row order.
    fn score_matrix(&self, matrix: &TrainingMatrix) -> Result<Vec<OutlierVerdict>> {
        matrix
            .data
            .rows()
            .into_iter()
            .map(|row| {
                self.score(&FeatureRow {
                    values: row.to_vec(),
                })
            })
            .collect()
    }
}
