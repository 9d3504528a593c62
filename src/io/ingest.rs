//! Series ingest and event filtering.
//!
//! This module turns parsed `tenv3` rows into validated, epoch-ordered
//! `StationSeries` and trims event lists to the span of a series.
//!
//! Design goals:
//! - **Row-level validation** (skip bad readings, but count them per component)
//! - **Deterministic behavior** (stable sort, duplicates kept)
//! - **Separation of concerns**: no fitting logic here

use crate::data::tenv3::{RowError, Tenv3Document};
use crate::domain::{Component, Coordinate, Event, Sample, StationSeries, TimeSpan};
use crate::error::DataError;

/// What happened during ingest.
#[derive(Debug, Clone, Default)]
pub struct IngestReport {
    pub rows_read: usize,
    /// Rows that could not be parsed at all.
    pub row_errors: Vec<RowError>,
    /// Readings rejected by `Sample::new`, indexed by `Component::index`.
    pub dropped: [usize; 3],
}

impl IngestReport {
    pub fn dropped(&self, component: Component) -> usize {
        self.dropped[component.index()]
    }

    pub fn dropped_total(&self) -> usize {
        self.dropped.iter().sum()
    }
}

/// Ingest output: validated series + report.
#[derive(Debug, Clone)]
pub struct IngestedSeries {
    pub series: StationSeries,
    pub report: IngestReport,
}

/// Build a station series from a parsed `tenv3` document.
///
/// Displacements are `(integer − integer_first) + fraction`, i.e. metres
/// relative to the integer part of the first row. The reference coordinate is
/// taken from the first row with a finite position.
pub fn ingest_tenv3(station: &str, doc: Tenv3Document) -> Result<IngestedSeries, DataError> {
    let Some(first) = doc.records.first() else {
        return Err(DataError::NoUsableSamples {
            station: station.to_string(),
            dropped: doc.row_errors.len(),
        });
    };
    let base = [first.east.integer, first.north.integer, first.up.integer];

    let reference = doc
        .records
        .iter()
        .find(|r| r.latitude.is_finite() && r.longitude.is_finite())
        .map(|r| {
            let mut c = Coordinate::new(r.latitude, r.longitude);
            c.height = r.height.is_finite().then_some(r.height);
            c
        })
        .ok_or_else(|| DataError::Malformed {
            station: station.to_string(),
            cause: "no row carries a finite latitude/longitude".to_string(),
        })?;

    let mut components: [Vec<Sample>; 3] = Default::default();
    let mut dropped = [0usize; 3];

    for record in &doc.records {
        for component in Component::ALL {
            let i = component.index();
            let reading = record.reading(component);
            let value = (reading.integer - base[i]) + reading.fraction;
            match Sample::new(record.epoch, value, reading.sigma) {
                Ok(sample) => components[i].push(sample),
                Err(err) => {
                    log::debug!("{station} {}: {err}", component.display_name());
                    dropped[i] += 1;
                }
            }
        }
    }

    if !doc.row_errors.is_empty() {
        log::warn!(
            "{station}: skipped {} malformed rows of {}",
            doc.row_errors.len(),
            doc.rows_read
        );
    }
    for component in Component::ALL {
        let n = dropped[component.index()];
        if n > 0 {
            log::warn!("{station} {}: dropped {n} invalid samples", component.display_name());
        }
    }

    let report = IngestReport {
        rows_read: doc.rows_read,
        row_errors: doc.row_errors,
        dropped,
    };

    let series = StationSeries::new(station, reference, components).ok_or_else(|| {
        DataError::NoUsableSamples {
            station: station.to_string(),
            dropped: report.dropped_total() + report.row_errors.len(),
        }
    })?;

    log::info!(
        "{station}: {} samples over {:.4}..{:.4}",
        series.total_samples(),
        series.span.start,
        series.span.end
    );

    Ok(IngestedSeries { series, report })
}

/// Events split by whether they fall inside a span.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    /// In-span events, ascending by epoch.
    pub kept: Vec<Event>,
    pub dropped: usize,
}

/// Keep the events whose epoch lies in `span` (inclusive).
pub fn filter_events(events: &[Event], span: &TimeSpan) -> EventFilter {
    let mut kept: Vec<Event> = events
        .iter()
        .filter(|e| span.contains(e.epoch))
        .cloned()
        .collect();
    kept.sort_by(|a, b| a.epoch.total_cmp(&b.epoch));
    let dropped = events.len() - kept.len();
    if dropped > 0 {
        log::info!(
            "ignoring {dropped} events outside {:.4}..{:.4}",
            span.start,
            span.end
        );
    }
    EventFilter { kept, dropped }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::tenv3::parse_tenv3;

    const TEXT: &str = "\
site YYMMMDD yyyy.yyyy __MJD week d reflon _e0(m) __east(m) ____n0(m) _north(m) u0(m) ____up(m) _ant(m) sig_e(m) sig_n(m) sig_u(m) __corr_en __corr_eu __corr_nu _latitude(deg) _longitude(deg) __height(m)
J299 11MAR10 2011.1896 55630 1626 4 141.5 -2 0.500000 1 0.250000 0 0.030000 0.0 0.001200 0.001100 0.004000 0.0 0.0 0.0 38.30 -218.50 74.1
J299 11MAR09 2011.1869 55629 1626 3 141.5 -3 0.900000 1 0.260000 0 NaN 0.0 0.001200 0.001100 0.004000 0.0 0.0 0.0 38.30 -218.50 74.1
J299 11MAR11 2011.1923 55631 1626 5 141.5 -2 0.700000 1 0.200000 0 0.040000 0.0 0.001200 0.000000 0.004000 0.0 0.0 0.0 38.30 -218.50 74.1
J299 broken row
";

    #[test]
    fn ingest_builds_relative_sorted_components() {
        let ingested = ingest_tenv3("J299", parse_tenv3(TEXT)).unwrap();
        let series = &ingested.series;

        assert_eq!(series.station, "J299");
        assert!((series.reference.longitude - 141.5).abs() < 1e-12);
        assert_eq!(series.reference.height, Some(74.1));

        // East: (-3 - -2) + 0.9 = -0.1 at the earliest epoch.
        assert_eq!(series.east.len(), 3);
        assert_eq!(series.east[0].epoch(), 2011.1869);
        assert!((series.east[0].value() + 0.1).abs() < 1e-12);
        assert!((series.east[1].value() - 0.5).abs() < 1e-12);

        // Up: NaN value dropped. North: zero sigma dropped.
        assert_eq!(series.up.len(), 2);
        assert_eq!(series.north.len(), 2);
        assert_eq!(ingested.report.dropped(Component::Up), 1);
        assert_eq!(ingested.report.dropped(Component::North), 1);
        assert_eq!(ingested.report.dropped(Component::East), 0);
        assert_eq!(ingested.report.rows_read, 4);
        assert_eq!(ingested.report.row_errors.len(), 1);
        assert_eq!(series.span, TimeSpan { start: 2011.1869, end: 2011.1923 });
    }

    #[test]
    fn empty_document_has_no_usable_samples() {
        let err = ingest_tenv3("J299", parse_tenv3("site YYMMMDD yyyy.yyyy\nJ299 broken\n")).unwrap_err();
        assert_eq!(
            err,
            DataError::NoUsableSamples {
                station: "J299".to_string(),
                dropped: 1,
            }
        );
    }

    #[test]
    fn events_outside_span_are_dropped_and_counted() {
        let span = TimeSpan { start: 2010.0, end: 2015.0 };
        let events = vec![
            Event::new("b", 2013.8),
            Event::new("late", 2016.0),
            Event::new("a", 2011.19),
            Event::new("edge", 2015.0),
        ];
        let filtered = filter_events(&events, &span);
        assert_eq!(filtered.dropped, 1);
        let ids: Vec<&str> = filtered.kept.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "edge"]);
    }
}
