use crate::error::{InputError, Result};
use anyhow::{Context, anyhow};
use chrono::NaiveDate;
use csv::ReaderBuilder;
use std::collections::HashSet;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info, warn};

pub const MIN_ASSETS: usize = 2;
pub const MIN_DATES: usize = 2;

/// Cleaned daily closing prices: one row per trading date, one column per symbol.
///
/// A `PriceMatrix` can only be built through [`PriceMatrix::new`], so every
/// instance satisfies the shape and positivity invariants the statistics
/// rely on.
#[derive(Clone, Debug, PartialEq)]
pub struct PriceMatrix {
    dates: Vec<NaiveDate>,
    symbols: Vec<String>,
    // Column-major: prices[asset][row]
    prices: Vec<Vec<f64>>,
}

impl PriceMatrix {
    pub fn new(dates: Vec<NaiveDate>, series: Vec<(String, Vec<f64>)>) -> Result<Self> {
        let (symbols, prices): (Vec<String>, Vec<Vec<f64>>) = series.into_iter().unzip();
        let matrix = Self {
            dates,
            symbols,
            prices,
        };
        matrix.validate()?;
        Ok(matrix)
    }

    /// Checks every invariant, in the order a caller would want to hear about them.
    pub fn validate(&self) -> Result<()> {
        if self.symbols.is_empty() || self.dates.is_empty() {
            return Err(InputError::EmptyMatrix.into());
        }
        if self.symbols.len() < MIN_ASSETS {
            return Err(InputError::TooFewAssets {
                required: MIN_ASSETS,
                found: self.symbols.len(),
            }
            .into());
        }
        if self.dates.len() < MIN_DATES {
            return Err(InputError::TooFewDates {
                required: MIN_DATES,
                found: self.dates.len(),
            }
            .into());
        }

        let mut seen = HashSet::with_capacity(self.symbols.len());
        for symbol in &self.symbols {
            if !seen.insert(symbol.as_str()) {
                return Err(InputError::DuplicateSymbol(symbol.clone()).into());
            }
        }

        if let Some(pos) = self.dates.windows(2).position(|w| w[1] <= w[0]) {
            return Err(InputError::DatesNotIncreasing { row: pos + 1 }.into());
        }

        let expected = self.dates.len();
        for (symbol, series) in self.symbols.iter().zip(&self.prices) {
            if series.len() != expected {
                return Err(InputError::SeriesLengthMismatch {
                    symbol: symbol.clone(),
                    expected,
                    found: series.len(),
                }
                .into());
            }
            for (row, &value) in series.iter().enumerate() {
                if !value.is_finite() {
                    return Err(InputError::NonFinitePrice {
                        symbol: symbol.clone(),
                        row,
                        value,
                    }
                    .into());
                }
                if value <= 0.0 {
                    return Err(InputError::NonPositivePrice {
                        symbol: symbol.clone(),
                        row,
                        value,
                    }
                    .into());
                }
            }
        }

        Ok(())
    }

    pub fn num_assets(&self) -> usize {
        self.symbols.len()
    }

    pub fn num_dates(&self) -> usize {
        self.dates.len()
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    pub fn series(&self, asset: usize) -> Option<&[f64]> {
        self.prices.get(asset).map(Vec::as_slice)
    }

    pub fn column(&self, symbol: &str) -> Option<&[f64]> {
        self.symbols
            .iter()
            .position(|s| s == symbol)
            .map(|idx| self.prices[idx].as_slice())
    }

    /// Daily log returns per asset. The first date has no prior observation,
    /// so each series is one shorter than the price history.
    pub fn log_returns(&self) -> Vec<Vec<f64>> {
        self.prices
            .iter()
            .map(|series| series.windows(2).map(|w| (w[1] / w[0]).ln()).collect())
            .collect()
    }
}

/// Inclusive date bounds applied to loaded rows. `None` leaves that side open.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DateWindow {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateWindow {
    pub fn new(start: Option<NaiveDate>, end: Option<NaiveDate>) -> anyhow::Result<Self> {
        if let (Some(s), Some(e)) = (start, end) {
            if s > e {
                return Err(anyhow!("Start date {} must not be after end date {}", s, e));
            }
        }
        Ok(Self { start, end })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start.is_none_or(|s| date >= s) && self.end.is_none_or(|e| date <= e)
    }
}

/// Loads a price matrix from a CSV file laid out as `Date,<SYM>,<SYM>,...`.
pub fn load_price_csv<P: AsRef<Path>>(path: P, window: DateWindow) -> anyhow::Result<PriceMatrix> {
    let file = std::fs::File::open(&path)
        .with_context(|| format!("Failed to open price file: {:?}", path.as_ref()))?;
    let matrix = read_price_csv(file, window)
        .with_context(|| format!("Failed to load prices from {:?}", path.as_ref()))?;
    info!(
        "Loaded {} assets x {} dates from {:?}",
        matrix.num_assets(),
        matrix.num_dates(),
        path.as_ref()
    );
    Ok(matrix)
}

/// Parses CSV price data from any reader.
///
/// Rows with a blank, non-numeric or NaN price are dropped, then rows
/// outside `window` are dropped, and the rest are sorted by date before the
/// matrix invariants are checked. An unparsable date is an error.
pub fn read_price_csv<R: Read>(reader: R, window: DateWindow) -> anyhow::Result<PriceMatrix> {
    let mut reader = ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);

    let headers = reader.headers().context("Failed to read CSV header")?.clone();
    if headers.len() < 2 {
        return Err(anyhow!(
            "CSV header must contain a date column and at least one symbol, got {} columns",
            headers.len()
        ));
    }
    let symbols: Vec<String> = headers.iter().skip(1).map(|s| s.to_string()).collect();

    let mut rows: Vec<(NaiveDate, Vec<f64>)> = Vec::new();
    let mut incomplete = 0usize;
    let mut outside = 0usize;
    for (line, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("Malformed CSV record {}", line + 1))?;
        let raw_date = record.get(0).unwrap_or_default();
        let date = NaiveDate::parse_from_str(raw_date, "%Y-%m-%d")
            .with_context(|| format!("Invalid date '{}' on record {}", raw_date, line + 1))?;

        let values: Option<Vec<f64>> = (0..symbols.len())
            .map(|col| {
                record
                    .get(col + 1)
                    .and_then(|raw| raw.parse::<f64>().ok())
                    .filter(|v| !v.is_nan())
            })
            .collect();

        let Some(values) = values else {
            debug!("Dropping incomplete price row for {}", date);
            incomplete += 1;
            continue;
        };
        if !window.contains(date) {
            outside += 1;
            continue;
        }
        rows.push((date, values));
    }

    if incomplete > 0 {
        warn!("Dropped {} rows with missing or non-numeric prices", incomplete);
    }
    if outside > 0 {
        debug!(
            "Dropped {} rows outside {:?}..={:?}",
            outside, window.start, window.end
        );
    }

    rows.sort_by_key(|(date, _)| *date);
    debug!("Parsed {} CSV price rows", rows.len());

    let dates: Vec<NaiveDate> = rows.iter().map(|(d, _)| *d).collect();
    let series: Vec<(String, Vec<f64>)> = symbols
        .into_iter()
        .enumerate()
        .map(|(col, symbol)| {
            let values: Vec<f64> = rows.iter().map(|(_, v)| v[col]).collect();
            (symbol, values)
        })
        .collect();

    Ok(PriceMatrix::new(dates, series)?)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::SimulationError;
    use std::io::Write;

    pub(crate) fn daily_dates(n: usize) -> Vec<NaiveDate> {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        (0..n)
            .map(|i| start + chrono::Duration::days(i as i64))
            .collect()
    }

    /// Two linearly increasing series: A = 100..109, B = 200..218.
    pub(crate) fn linear_two_asset_matrix() -> PriceMatrix {
        let a: Vec<f64> = (0..10).map(|i| 100.0 + i as f64).collect();
        let b: Vec<f64> = (0..10).map(|i| 200.0 + 2.0 * i as f64).collect();
        PriceMatrix::new(
            daily_dates(10),
            vec![("AAA".to_string(), a), ("BBB".to_string(), b)],
        )
        .unwrap()
    }

    fn expect_input_error(result: Result<PriceMatrix>) -> InputError {
        match result {
            Err(SimulationError::InvalidInput(e)) => e,
            other => panic!("expected invalid input, got {other:?}"),
        }
    }

    #[test]
    fn test_log_returns_drop_first_date() {
        let matrix = linear_two_asset_matrix();
        let returns = matrix.log_returns();
        assert_eq!(returns.len(), 2);
        assert_eq!(returns[0].len(), 9);
        assert!((returns[0][0] - (101.0f64 / 100.0).ln()).abs() < 1e-15);
        assert_eq!(matrix.series(1).unwrap()[0], 200.0);
        assert!(matrix.series(2).is_none());
        assert_eq!(matrix.dates().len(), 10);
    }

    #[test]
    fn test_rejects_single_date() {
        let err = expect_input_error(PriceMatrix::new(
            daily_dates(1),
            vec![("A".into(), vec![1.0]), ("B".into(), vec![2.0])],
        ));
        assert_eq!(err, InputError::TooFewDates { required: 2, found: 1 });
    }

    #[test]
    fn test_rejects_single_asset_and_empty() {
        let err = expect_input_error(PriceMatrix::new(
            daily_dates(3),
            vec![("A".into(), vec![1.0, 2.0, 3.0])],
        ));
        assert_eq!(err, InputError::TooFewAssets { required: 2, found: 1 });

        let err = expect_input_error(PriceMatrix::new(Vec::new(), Vec::new()));
        assert_eq!(err, InputError::EmptyMatrix);
    }

    #[test]
    fn test_rejects_bad_prices_and_shapes() {
        let err = expect_input_error(PriceMatrix::new(
            daily_dates(3),
            vec![("A".into(), vec![1.0, 0.0, 3.0]), ("B".into(), vec![1.0, 2.0, 3.0])],
        ));
        assert!(matches!(err, InputError::NonPositivePrice { row: 1, .. }));

        let err = expect_input_error(PriceMatrix::new(
            daily_dates(3),
            vec![("A".into(), vec![1.0, f64::NAN, 3.0]), ("B".into(), vec![1.0, 2.0, 3.0])],
        ));
        assert!(matches!(err, InputError::NonFinitePrice { row: 1, .. }));

        let err = expect_input_error(PriceMatrix::new(
            daily_dates(3),
            vec![("A".into(), vec![1.0, 2.0]), ("B".into(), vec![1.0, 2.0, 3.0])],
        ));
        assert_eq!(
            err,
            InputError::SeriesLengthMismatch {
                symbol: "A".into(),
                expected: 3,
                found: 2
            }
        );

        let err = expect_input_error(PriceMatrix::new(
            daily_dates(2),
            vec![("A".into(), vec![1.0, 2.0]), ("A".into(), vec![1.0, 2.0])],
        ));
        assert_eq!(err, InputError::DuplicateSymbol("A".into()));

        let mut dates = daily_dates(3);
        dates.swap(1, 2);
        let err = expect_input_error(PriceMatrix::new(
            dates,
            vec![("A".into(), vec![1.0, 2.0, 3.0]), ("B".into(), vec![1.0, 2.0, 3.0])],
        ));
        assert_eq!(err, InputError::DatesNotIncreasing { row: 2 });
    }

    #[test]
    fn test_read_price_csv_sorts_rows() {
        let csv = "Date,AAA,BBB\n2024-01-03,102,204\n2024-01-01,100,200\n2024-01-02,101,202\n";
        let matrix = read_price_csv(csv.as_bytes(), DateWindow::default()).unwrap();
        assert_eq!(matrix.symbols(), &["AAA".to_string(), "BBB".to_string()]);
        assert_eq!(matrix.column("AAA").unwrap(), &[100.0, 101.0, 102.0]);
        assert_eq!(matrix.column("BBB").unwrap(), &[200.0, 202.0, 204.0]);
        assert!(matrix.column("CCC").is_none());
    }

    #[test]
    fn test_read_price_csv_drops_incomplete_rows() {
        let csv = "Date,AAA,BBB\n2024-01-01,100,200\n2024-01-02,101,\n2024-01-03,102,204\n2024-01-04,n/a,206\n2024-01-05,104,NaN\n";
        let matrix = read_price_csv(csv.as_bytes(), DateWindow::default()).unwrap();
        assert_eq!(matrix.num_dates(), 2);
        assert_eq!(
            matrix.dates(),
            &[
                NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                NaiveDate::from_ymd_opt(2024, 1, 3).unwrap()
            ]
        );
        assert_eq!(matrix.column("BBB").unwrap(), &[200.0, 204.0]);
    }

    #[test]
    fn test_read_price_csv_too_few_rows_after_cleaning() {
        let csv = "Date,AAA,BBB\n2024-01-01,100,200\n2024-01-02,101,\n";
        let err = read_price_csv(csv.as_bytes(), DateWindow::default()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SimulationError>(),
            Some(SimulationError::InvalidInput(InputError::TooFewDates { found: 1, .. }))
        ));
    }

    #[test]
    fn test_read_price_csv_rejects_bad_date() {
        let csv = "Date,AAA,BBB\n01/02/2024,100,200\n";
        let err = read_price_csv(csv.as_bytes(), DateWindow::default()).unwrap_err();
        assert!(err.to_string().contains("Invalid date"));
    }

    #[test]
    fn test_read_price_csv_applies_date_window() {
        let dates = daily_dates(6);
        let mut csv = String::from("Date,AAA,BBB\n");
        for (i, d) in dates.iter().enumerate() {
            csv.push_str(&format!("{},{},{}\n", d, 100 + i, 200 + i));
        }

        let window = DateWindow::new(Some(dates[1]), Some(dates[3])).unwrap();
        let matrix = read_price_csv(csv.as_bytes(), window).unwrap();
        assert_eq!(matrix.dates(), &dates[1..=3]);
        assert_eq!(matrix.column("AAA").unwrap(), &[101.0, 102.0, 103.0]);

        let open_end = DateWindow::new(Some(dates[4]), None).unwrap();
        let matrix = read_price_csv(csv.as_bytes(), open_end).unwrap();
        assert_eq!(matrix.dates(), &dates[4..]);
    }

    #[test]
    fn test_date_window_bounds() {
        let dates = daily_dates(3);
        assert!(DateWindow::new(Some(dates[2]), Some(dates[0])).is_err());

        let window = DateWindow::new(None, Some(dates[1])).unwrap();
        assert!(window.contains(dates[0]));
        assert!(window.contains(dates[1]));
        assert!(!window.contains(dates[2]));
        assert!(DateWindow::default().contains(dates[2]));
    }

    #[test]
    fn test_load_price_csv_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "Date,AAA,BBB").unwrap();
        writeln!(file, "2024-01-01,100,200").unwrap();
        writeln!(file, "2024-01-02,101,201").unwrap();
        file.flush().unwrap();

        let matrix = load_price_csv(file.path(), DateWindow::default()).unwrap();
        assert_eq!(matrix.num_assets(), 2);
        assert_eq!(matrix.num_dates(), 2);
    }
}
