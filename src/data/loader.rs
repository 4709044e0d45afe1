use std::fs::File;
use std::io::{BufReader, ErrorKind, Read};
use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime};
use serde::Deserialize;

use super::error::LoadError;
use super::model::{Dataset, Record, COLUMN_HEADERS};

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Load a sales dataset from a file.  Dispatch by extension.
///
/// Supported formats:
/// * `.csv` / `.txt` – delimited text with one header row
/// * `.json`         – `[{ "Fecha": "2024-01-01", "Región": "Lima", ... }, ...]`
pub fn load_file(path: &Path) -> Result<Dataset, LoadError> {
    let file = File::open(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => LoadError::MissingSource {
            path: path.to_path_buf(),
        },
        _ => LoadError::malformed(format!("opening {}: {e}", path.display())),
    })?;

    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let dataset = match ext.as_str() {
        "csv" | "txt" => read_csv(file)?,
        "json" => read_json(BufReader::new(file))?,
        other => {
            return Err(LoadError::malformed(format!(
                "unsupported file extension: .{other}"
            )))
        }
    };

    log::info!(
        "Loaded {} records from {} spanning {:?}",
        dataset.len(),
        path.display(),
        dataset.date_span()
    );
    Ok(dataset)
}

// ---------------------------------------------------------------------------
// Raw rows
// ---------------------------------------------------------------------------

/// English attribute names accepted in place of the source headers.
const HEADER_ALIASES: [&str; 10] = [
    "date",
    "region",
    "product",
    "channel",
    "category",
    "lab",
    "salesperson",
    "sales_amount",
    "units",
    "inventory",
];

/// One row as it appears in the source, before validation.
#[derive(Debug, Deserialize)]
struct RawRecord {
    #[serde(rename = "Fecha", alias = "date")]
    date: String,
    #[serde(rename = "Región", alias = "region")]
    region: String,
    #[serde(rename = "Producto", alias = "product")]
    product: String,
    #[serde(rename = "Canal", alias = "channel")]
    channel: String,
    #[serde(rename = "Categoría", alias = "category")]
    category: String,
    #[serde(rename = "Laboratorio", alias = "lab")]
    lab: String,
    #[serde(rename = "Vendedor", alias = "salesperson")]
    salesperson: String,
    #[serde(rename = "Ventas", alias = "sales_amount")]
    sales_amount: f64,
    #[serde(rename = "Unidades", alias = "units")]
    units: f64,
    #[serde(rename = "Inventario", alias = "inventory")]
    inventory: f64,
}

impl RawRecord {
    fn into_record(self) -> Result<Record, String> {
        let date = parse_date(&self.date)
            .ok_or_else(|| format!("'{}' is not a calendar date", self.date))?;
        Ok(Record {
            date,
            region: self.region,
            product: self.product,
            channel: self.channel,
            category: self.category,
            lab: self.lab,
            salesperson: self.salesperson,
            sales_amount: non_negative("Ventas", self.sales_amount)?,
            units: whole_units(self.units)?,
            inventory: non_negative("Inventario", self.inventory)?,
        })
    }
}

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%Y/%m/%d", "%d/%m/%Y"];
const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
];

/// Parse a date cell, discarding any time component.
fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
                .map(|dt| dt.date())
        })
}

fn non_negative(column: &str, v: f64) -> Result<f64, String> {
    if v.is_finite() && v >= 0.0 {
        Ok(v)
    } else {
        Err(format!("{column} must be a non-negative number, got {v}"))
    }
}

/// 2^64, the first whole number a `u64` cannot hold.
const UNITS_LIMIT: f64 = 18_446_744_073_709_551_616.0;

fn whole_units(v: f64) -> Result<u64, String> {
    if v.is_finite() && v >= 0.0 && v.fract() == 0.0 && v < UNITS_LIMIT {
        Ok(v as u64)
    } else {
        Err(format!("Unidades must be a non-negative whole number, got {v}"))
    }
}

fn finish(raw: Vec<RawRecord>) -> Result<Dataset, LoadError> {
    let records = raw
        .into_iter()
        .enumerate()
        .map(|(i, r)| {
            r.into_record()
                .map_err(|msg| LoadError::malformed(format!("row {}: {msg}", i + 1)))
        })
        .collect::<Result<Vec<_>, _>>()?;
    Dataset::from_records(records)
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

/// CSV layout: header row with the source column names (or their English
/// aliases), one record per line. Extra columns are ignored.
pub fn read_csv<R: Read>(reader: R) -> Result<Dataset, LoadError> {
    let mut reader = csv::Reader::from_reader(reader);
    let headers = reader
        .headers()
        .map_err(|e| LoadError::malformed(format!("reading CSV headers: {e}")))?
        .clone();

    if headers.is_empty() {
        return Err(LoadError::EmptySource);
    }
    for (name, alias) in COLUMN_HEADERS.iter().zip(HEADER_ALIASES) {
        if !headers.iter().any(|h| h == *name || h == alias) {
            return Err(LoadError::malformed(format!("missing column '{name}'")));
        }
    }

    let raw = reader
        .deserialize::<RawRecord>()
        .enumerate()
        .map(|(i, row)| row.map_err(|e| LoadError::malformed(format!("row {}: {e}", i + 1))))
        .collect::<Result<Vec<_>, _>>()?;

    log::debug!("CSV source: {} rows, headers {:?}", raw.len(), headers);
    finish(raw)
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

/// Records-oriented JSON, the default `df.to_json(orient='records')` shape
/// with dates written as strings.
pub fn read_json<R: Read>(reader: R) -> Result<Dataset, LoadError> {
    let raw: Vec<RawRecord> = serde_json::from_reader(reader)
        .map_err(|e| LoadError::malformed(format!("parsing JSON: {e}")))?;
    finish(raw)
}
