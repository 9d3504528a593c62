//! Nevada Geodetic Laboratory `tenv3` time series format.
//!
//! One whitespace-separated row per day, after a single header line:
//!
//! ```text
//! site YYMMMDD yyyy.yyyy __MJD week d reflon _e0(m) __east(m) ____n0(m) _north(m) u0(m) ____up(m) _ant(m) sig_e(m) sig_n(m) sig_u(m) __corr_en __corr_eu __corr_nu _latitude(deg) _longitude(deg) __height(m)
//! ```
//!
//! Each displacement is split into an integer metre part (`e0`, `n0`, `u0`)
//! and a fractional part. Rows that do not have the expected shape are
//! skipped and reported, never fatal.

use std::fmt::Write as _;

use chrono::NaiveDate;

use crate::domain::Component;

/// Number of columns in a `tenv3` row.
pub const TENV3_COLUMNS: usize = 23;

const DATE_FORMAT: &str = "%y%b%d";
const HEADER: &str = "site YYMMMDD yyyy.yyyy __MJD week d reflon _e0(m) __east(m) ____n0(m) _north(m) u0(m) ____up(m) _ant(m) sig_e(m) sig_n(m) sig_u(m) __corr_en __corr_eu __corr_nu _latitude(deg) _longitude(deg) __height(m)";

/// One component of a `tenv3` row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    /// Integer metres.
    pub integer: f64,
    /// Fractional metres.
    pub fraction: f64,
    pub sigma: f64,
}

/// One parsed `tenv3` row.
#[derive(Debug, Clone, PartialEq)]
pub struct Tenv3Record {
    pub station: String,
    pub date: NaiveDate,
    /// Decimal year as published.
    pub epoch: f64,
    pub east: Reading,
    pub north: Reading,
    pub up: Reading,
    pub latitude: f64,
    pub longitude: f64,
    pub height: f64,
}

impl Tenv3Record {
    pub fn reading(&self, component: Component) -> &Reading {
        match component {
            Component::East => &self.east,
            Component::North => &self.north,
            Component::Up => &self.up,
        }
    }
}

/// A row that could not be parsed.
#[derive(Debug, Clone, PartialEq)]
pub struct RowError {
    /// 1-based line number in the input.
    pub line: usize,
    pub message: String,
}

/// Parse output: records in file order plus the rows that were skipped.
#[derive(Debug, Clone, Default)]
pub struct Tenv3Document {
    pub records: Vec<Tenv3Record>,
    pub row_errors: Vec<RowError>,
    /// Data rows seen (header and blank lines excluded).
    pub rows_read: usize,
}

/// Parse `tenv3` text.
///
/// The header is recognised by a non-numeric decimal-year column, so
/// headerless files are accepted too.
pub fn parse_tenv3(text: &str) -> Tenv3Document {
    let mut doc = Tenv3Document::default();

    for (idx, raw) in text.lines().enumerate() {
        let line = idx + 1;
        let fields: Vec<&str> = raw.split_whitespace().collect();
        if fields.is_empty() {
            continue;
        }
        if doc.rows_read == 0 && is_header(&fields) {
            continue;
        }
        doc.rows_read += 1;

        match parse_row(&fields) {
            Ok(record) => doc.records.push(record),
            Err(message) => doc.row_errors.push(RowError { line, message }),
        }
    }

    doc
}

fn is_header(fields: &[&str]) -> bool {
    fields.get(2).is_none_or(|f| f.parse::<f64>().is_err())
}

fn parse_row(fields: &[&str]) -> Result<Tenv3Record, String> {
    if fields.len() < TENV3_COLUMNS {
        return Err(format!(
            "expected {TENV3_COLUMNS} columns, found {}",
            fields.len()
        ));
    }

    let date = parse_date(fields[1])?;
    let num = |i: usize, name: &str| -> Result<f64, String> {
        fields[i]
            .parse::<f64>()
            .map_err(|_| format!("invalid {name} '{}'", fields[i]))
    };
    let reading = |int_col: usize, frac_col: usize, sig_col: usize, name: &str| -> Result<Reading, String> {
        Ok(Reading {
            integer: num(int_col, name)?,
            fraction: num(frac_col, name)?,
            sigma: num(sig_col, "sigma")?,
        })
    };

    Ok(Tenv3Record {
        station: fields[0].to_string(),
        date,
        epoch: num(2, "decimal year")?,
        east: reading(7, 8, 14, "east")?,
        north: reading(9, 10, 15, "north")?,
        up: reading(11, 12, 16, "up")?,
        latitude: num(20, "latitude")?,
        longitude: num(21, "longitude")?,
        height: num(22, "height")?,
    })
}

fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw, DATE_FORMAT).map_err(|e| format!("invalid date '{raw}': {e}"))
}

/// Render records as `tenv3` text (header included).
///
/// Columns not carried by [`Tenv3Record`] (antenna height, correlations,
/// reference longitude) are written as zeros.
pub fn write_tenv3(records: &[Tenv3Record]) -> String {
    let mut out = String::with_capacity(records.len() * 200 + HEADER.len());
    out.push_str(HEADER);
    out.push('\n');

    for r in records {
        let (mjd, week, day) = gps_calendar(r.date);
        let _ = writeln!(
            out,
            "{} {} {:.4} {} {} {} {:.1} {} {:.6} {} {:.6} {} {:.6} {:.4} {:.6} {:.6} {:.6} {:.6} {:.6} {:.6} {:.10} {:.10} {:.5}",
            r.station,
            r.date.format(DATE_FORMAT).to_string().to_uppercase(),
            r.epoch,
            mjd,
            week,
            day,
            0.0,
            r.east.integer,
            r.east.fraction,
            r.north.integer,
            r.north.fraction,
            r.up.integer,
            r.up.fraction,
            0.0,
            r.east.sigma,
            r.north.sigma,
            r.up.sigma,
            0.0,
            0.0,
            0.0,
            r.latitude,
            r.longitude,
            r.height,
        );
    }
    out
}

/// Split a displacement into the integer/fraction pair used by `tenv3`.
pub fn split_metres(value: f64) -> (f64, f64) {
    let integer = value.floor();
    (integer, value - integer)
}

/// `(MJD, GPS week, day of week)` for a date.
fn gps_calendar(date: NaiveDate) -> (i64, i64, i64) {
    let mjd_zero = NaiveDate::from_ymd_opt(1858, 11, 17).unwrap_or(NaiveDate::MIN);
    let gps_zero = NaiveDate::from_ymd_opt(1980, 1, 6).unwrap_or(NaiveDate::MIN);
    let mjd = (date - mjd_zero).num_days();
    let gps_days = (date - gps_zero).num_days();
    (mjd, gps_days.div_euclid(7), gps_days.rem_euclid(7))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
site YYMMMDD yyyy.yyyy __MJD week d reflon _e0(m) __east(m) ____n0(m) _north(m) u0(m) ____up(m) _ant(m) sig_e(m) sig_n(m) sig_u(m) __corr_en __corr_eu __corr_nu _latitude(deg) _longitude(deg) __height(m)
J299 11MAR09 2011.1869 55629 1626 3 141.5 -2 0.512345 1 0.251000 0 0.033000 0.0 0.001200 0.001100 0.004000 0.012 -0.020 0.031 38.3012345678 -218.4987654321 74.12345
J299 11MAR10 2011.1896 55630 1626 4 141.5 -2 0.513100 1 0.250400 0 0.034200 0.0 0.001200 0.001100 0.004100 0.012 -0.020 0.031 38.3012345678 -218.4987654321 74.12345
J299 11MAR11 not-a-year 55631 1626 5 141.5 -2 0.513100
J299 11MAR12 2011.1951 55632 1626 6 141.5 0 0.912000 0 0.870000 -1 0.960000 0.0 0.001500 0.001300 0.005000 0.012 -0.020 0.031 38.3012345678 -218.4987654321 74.12345
";

    #[test]
    fn parses_rows_and_reports_malformed_ones() {
        let doc = parse_tenv3(SAMPLE);
        assert_eq!(doc.rows_read, 4);
        assert_eq!(doc.records.len(), 3);
        assert_eq!(doc.row_errors.len(), 1);
        assert_eq!(doc.row_errors[0].line, 4);

        let first = &doc.records[0];
        assert_eq!(first.station, "J299");
        assert_eq!(first.date, NaiveDate::from_ymd_opt(2011, 3, 9).unwrap());
        assert_eq!(first.epoch, 2011.1869);
        assert_eq!(first.east.integer, -2.0);
        assert_eq!(first.east.fraction, 0.512345);
        assert_eq!(first.up.sigma, 0.004);
        assert_eq!(first.longitude, -218.4987654321);
        assert_eq!(doc.records[2].reading(Component::Up).integer, -1.0);
    }

    #[test]
    fn headerless_input_is_accepted() {
        let body: String = SAMPLE.lines().skip(1).take(2).map(|l| format!("{l}\n")).collect();
        let doc = parse_tenv3(&body);
        assert_eq!(doc.records.len(), 2);
        assert!(doc.row_errors.is_empty());
    }

    #[test]
    fn bad_date_is_a_row_error() {
        let row = SAMPLE.lines().nth(1).unwrap().replace("11MAR09", "11XYZ09");
        let doc = parse_tenv3(&row);
        assert!(doc.records.is_empty());
        assert!(doc.row_errors[0].message.contains("invalid date"));
    }

    #[test]
    fn written_text_parses_back() {
        let doc = parse_tenv3(SAMPLE);
        let text = write_tenv3(&doc.records);
        let again = parse_tenv3(&text);
        assert_eq!(again.records.len(), 3);
        assert!(again.row_errors.is_empty());
        assert_eq!(again.records[0].date, doc.records[0].date);
        assert!(text.contains("J299 11MAR09 2011.1869 55629 1626 3"));
        assert!((again.records[2].north.fraction - 0.87).abs() < 1e-9);
    }

    #[test]
    fn split_metres_keeps_fraction_positive() {
        assert_eq!(split_metres(1.25), (1.0, 0.25));
        let (i, f) = split_metres(-0.25);
        assert_eq!(i, -1.0);
        assert!((f - 0.75).abs() < 1e-12);
    }
}
