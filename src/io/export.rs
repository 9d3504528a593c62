//! Export per-sample residuals to CSV.
//!
//! The export is meant to be easy to consume in spreadsheets or downstream scripts.

use std::path::Path;

use crate::error::AppError;
use crate::report::SampleResidual;

/// Write per-sample residuals to a CSV file.
///
/// Columns: `component,epoch,value,sigma,fitted,residual,normalized_residual`.
pub fn write_residuals_csv(path: &Path, residuals: &[SampleResidual]) -> Result<(), AppError> {
    let mut writer = csv::Writer::from_path(path)
        .map_err(|e| AppError::new(2, format!("Failed to create export CSV '{}': {e}", path.display())))?;

    for r in residuals {
        writer
            .serialize(r)
            .map_err(|e| AppError::new(2, format!("Failed to write export CSV row: {e}")))?;
    }

    writer
        .flush()
        .map_err(|e| AppError::new(2, format!("Failed to flush export CSV: {e}")))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Component;

    #[test]
    fn writes_header_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("residuals.csv");
        let rows = vec![SampleResidual {
            component: Component::Up,
            epoch: 2011.5,
            value: 0.01,
            sigma: 0.004,
            fitted: 0.008,
            residual: 0.002,
            normalized_residual: 0.5,
        }];

        write_residuals_csv(&path, &rows).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("component,epoch,value,sigma,fitted,residual,normalized_residual")
        );
        assert_eq!(lines.next(), Some("up,2011.5,0.01,0.004,0.008,0.002,0.5"));
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn unwritable_path_is_a_usage_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("residuals.csv");
        let err = write_residuals_csv(&path, &[]).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }
}
