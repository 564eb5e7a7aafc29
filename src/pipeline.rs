use chrono::{DateTime, Utc};
use plist::Dictionary;

use crate::error::ReporterError;
use crate::metrics;
use crate::notion::{RecordId, ReportSink};
use crate::report::ReportRecord;
use crate::schema::REQUIRED_COLUMNS;

/// One reporting run: extract metrics from the registry node, reconcile the
/// remote schema, upload exactly one report row.
pub fn run_report(
    node: &Dictionary,
    sink: &dyn ReportSink,
    captured_at: DateTime<Utc>,
    skip_schema: bool,
) -> Result<RecordId, ReporterError> {
    let metrics = metrics::extract(node)?;
    tracing::info!(
        health_percent = ?metrics.health_percent,
        cycle_count = ?metrics.cycle_count,
        status = metrics.charging_status.as_str(),
        "extracted battery metrics"
    );

    if skip_schema {
        tracing::debug!("schema reconciliation skipped");
    } else {
        let diff = sink.ensure_schema(REQUIRED_COLUMNS)?;
        if diff.created.is_empty() {
            tracing::debug!("remote schema already satisfied");
        } else {
            tracing::info!(created = diff.created.len(), "created missing columns");
        }
    }

    let record = ReportRecord::new(metrics, captured_at);
    sink.upload(&record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{parse_registry_dump, SAMPLE_IOREG_XML};
    use crate::schema::{ColumnSpec, SchemaDiff};
    use chrono::TimeZone;
    use std::cell::RefCell;

    #[derive(Default)]
    struct RecordingSink {
        schema_calls: RefCell<usize>,
        uploads: RefCell<Vec<ReportRecord>>,
        fail_upload: bool,
    }

    impl ReportSink for RecordingSink {
        fn ensure_schema(&self, _required: &[ColumnSpec]) -> Result<SchemaDiff, ReporterError> {
            *self.schema_calls.borrow_mut() += 1;
            Ok(SchemaDiff::default())
        }

        fn upload(&self, record: &ReportRecord) -> Result<RecordId, ReporterError> {
            self.uploads.borrow_mut().push(record.clone());
            if self.fail_upload {
                return Err(ReporterError::UploadFailed("simulated 500".to_string()));
            }
            Ok(RecordId("page-xyz".to_string()))
        }
    }

    #[test]
    fn fixture_run_uploads_one_record_with_expected_health() {
        let node = parse_registry_dump(SAMPLE_IOREG_XML.as_bytes()).unwrap();
        let sink = RecordingSink::default();
        let captured_at = Utc.with_ymd_and_hms(2026, 2, 1, 6, 0, 0).unwrap();

        let id = run_report(&node, &sink, captured_at, false).unwrap();
        assert_eq!(id, RecordId("page-xyz".to_string()));
        assert_eq!(*sink.schema_calls.borrow(), 1);

        let uploads = sink.uploads.borrow();
        assert_eq!(uploads.len(), 1);
        let metrics = &uploads[0].metrics;
        assert_eq!(metrics.health_percent, Some(85.0));
        assert_eq!(metrics.cycle_count, Some(312));
        assert_eq!(metrics.voltage_v, Some(12.1));
        assert_eq!(metrics.amperage_ma, Some(-450));
        assert_eq!(uploads[0].captured_at, captured_at);
    }

    #[test]
    fn skip_schema_leaves_remote_schema_untouched() {
        let node = parse_registry_dump(SAMPLE_IOREG_XML.as_bytes()).unwrap();
        let sink = RecordingSink::default();
        run_report(&node, &sink, Utc::now(), true).unwrap();
        assert_eq!(*sink.schema_calls.borrow(), 0);
        assert_eq!(sink.uploads.borrow().len(), 1);
    }

    #[test]
    fn upload_failure_propagates() {
        let node = parse_registry_dump(SAMPLE_IOREG_XML.as_bytes()).unwrap();
        let sink = RecordingSink {
            fail_upload: true,
            ..RecordingSink::default()
        };
        let err = run_report(&node, &sink, Utc::now(), false).unwrap_err();
        assert!(matches!(err, ReporterError::UploadFailed(_)));
    }
}
