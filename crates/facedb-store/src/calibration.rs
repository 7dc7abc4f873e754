use crate::error::StoreError;
use crate::record::LabelFilter;
use crate::store::RecordStore;
use facedb_core::{confidence_area, thresholds_from_areas};

impl RecordStore {
    /// Recompute every record's acceptance threshold from the spread of its
    /// own samples.
    ///
    /// Full-table and non-incremental. Each record update is atomic on its
    /// own; records deleted while calibration runs are skipped. Returns the
    /// `(global_id, threshold)` pairs that were written.
    pub fn calibrate(&self) -> Result<Vec<(String, f32)>, StoreError> {
        let records = self.list_records(LabelFilter::All)?;

        let areas = records
            .iter()
            .map(|r| confidence_area(&r.sample_embeddings()))
            .collect::<Result<Vec<f64>, _>>()?;
        let thresholds = thresholds_from_areas(&areas);

        let mut applied = Vec::with_capacity(records.len());
        for ((record, threshold), area) in records.iter().zip(thresholds).zip(&areas) {
            match self.update_threshold(&record.global_id, threshold) {
                Ok(_) => {
                    tracing::debug!(global_id = %record.global_id, area, threshold, "calibrated");
                    applied.push((record.global_id.clone(), threshold));
                }
                Err(e) if e.is_not_found() => {
                    tracing::debug!(global_id = %record.global_id, "record vanished during calibration");
                }
                Err(e) => return Err(e),
            }
        }

        tracing::info!(records = applied.len(), "thresholds calibrated");
        Ok(applied)
    }
}
