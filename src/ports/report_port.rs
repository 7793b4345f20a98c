//! Report generation port trait.

use crate::domain::backtest::BacktestResult;
use crate::domain::metrics::Summary;
use crate::domain::error::CrosstrendError;
use std::path::{Path, PathBuf};

/// Port for writing backtest reports.
pub trait ReportPort {
    /// Writes the run's reports under `out_dir` and returns the files written.
    fn write(
        &self,
        result: &BacktestResult,
        summary: &Summary,
        out_dir: &Path,
    ) -> Result<Vec<PathBuf>, CrosstrendError>;
}
