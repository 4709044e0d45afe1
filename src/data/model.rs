use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::NaiveDate;

use super::error::LoadError;

/// Source column names, in record attribute order.
pub const COLUMN_HEADERS: [&str; 10] = [
    "Fecha",
    "Región",
    "Producto",
    "Canal",
    "Categoría",
    "Laboratorio",
    "Vendedor",
    "Ventas",
    "Unidades",
    "Inventario",
];

// ---------------------------------------------------------------------------
// Record – one row of the sales table
// ---------------------------------------------------------------------------

/// A single sales observation.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub date: NaiveDate,
    /// Trimmed and title-cased once the record enters a [`Dataset`].
    pub region: String,
    pub product: String,
    pub channel: String,
    pub category: String,
    pub lab: String,
    pub salesperson: String,
    pub sales_amount: f64,
    pub units: u64,
    /// Stock level at the time of the record.
    pub inventory: f64,
}

// ---------------------------------------------------------------------------
// Dimension – the categorical columns a user can filter on
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Dimension {
    Region,
    Product,
    Channel,
    Category,
    Lab,
    Salesperson,
}

impl Dimension {
    pub const ALL: [Dimension; 6] = [
        Dimension::Region,
        Dimension::Product,
        Dimension::Channel,
        Dimension::Category,
        Dimension::Lab,
        Dimension::Salesperson,
    ];

    /// Column name in the source file.
    pub fn header(self) -> &'static str {
        match self {
            Dimension::Region => "Región",
            Dimension::Product => "Producto",
            Dimension::Channel => "Canal",
            Dimension::Category => "Categoría",
            Dimension::Lab => "Laboratorio",
            Dimension::Salesperson => "Vendedor",
        }
    }

    pub fn value(self, record: &Record) -> &str {
        match self {
            Dimension::Region => &record.region,
            Dimension::Product => &record.product,
            Dimension::Channel => &record.channel,
            Dimension::Category => &record.category,
            Dimension::Lab => &record.lab,
            Dimension::Salesperson => &record.salesperson,
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Dimension::Region => "Region",
            Dimension::Product => "Product",
            Dimension::Channel => "Channel",
            Dimension::Category => "Category",
            Dimension::Lab => "Lab",
            Dimension::Salesperson => "Salesperson",
        };
        f.write_str(label)
    }
}

/// Title-case a region name: a letter is upper-cased when it does not follow
/// another letter and lower-cased otherwise. Surrounding whitespace is dropped.
/// Idempotent: a letter whose upper case expands ("ß" -> "SS") keeps only the
/// first char upper-cased.
pub fn normalize_region(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut prev_is_alpha = false;
    for ch in raw.trim().chars() {
        if ch.is_alphabetic() {
            if prev_is_alpha {
                out.extend(ch.to_lowercase());
            } else {
                let mut upper = ch.to_uppercase();
                out.extend(upper.next());
                out.extend(upper.flat_map(char::to_lowercase));
            }
            prev_is_alpha = true;
        } else {
            out.push(ch);
            prev_is_alpha = false;
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Dataset – the complete loaded table
// ---------------------------------------------------------------------------

/// The full parsed dataset with pre-computed option lists.
#[derive(Debug, Clone)]
pub struct Dataset {
    records: Vec<Record>,
    /// For each dimension the sorted set of distinct values.
    options: BTreeMap<Dimension, BTreeSet<String>>,
    first_date: NaiveDate,
    last_date: NaiveDate,
}

impl Dataset {
    /// Build a dataset, normalizing region names in place.
    pub fn from_records(mut records: Vec<Record>) -> Result<Self, LoadError> {
        let Some(first) = records.first() else {
            return Err(LoadError::EmptySource);
        };
        let mut first_date = first.date;
        let mut last_date = first.date;
        let mut options: BTreeMap<Dimension, BTreeSet<String>> = BTreeMap::new();

        for record in &mut records {
            record.region = normalize_region(&record.region);
            first_date = first_date.min(record.date);
            last_date = last_date.max(record.date);
            for dim in Dimension::ALL {
                options
                    .entry(dim)
                    .or_default()
                    .insert(dim.value(record).to_string());
            }
        }

        Ok(Dataset {
            records,
            options,
            first_date,
            last_date,
        })
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Distinct values of `dim`, sorted.
    pub fn options(&self, dim: Dimension) -> &BTreeSet<String> {
        static EMPTY: BTreeSet<String> = BTreeSet::new();
        self.options.get(&dim).unwrap_or(&EMPTY)
    }

    /// Earliest and latest record date (inclusive).
    pub fn date_span(&self) -> (NaiveDate, NaiveDate) {
        (self.first_date, self.last_date)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    pub(crate) fn record(d: &str, region: &str, sales: f64, units: u64) -> Record {
        Record {
            date: date(d),
            region: region.to_string(),
            product: "Paracetamol".to_string(),
            channel: "Farmacia".to_string(),
            category: "Analgésicos".to_string(),
            lab: "Genfar".to_string(),
            salesperson: "Ana".to_string(),
            sales_amount: sales,
            units,
            inventory: 50.0,
        }
    }

    /// The three-row Lima dataset used across the pipeline tests.
    pub(crate) fn lima_dataset() -> Dataset {
        Dataset::from_records(vec![
            record("2024-01-01", "lima", 100.0, 10),
            record("2024-01-02", "Lima ", 200.0, 20),
            record("2024-01-03", "LIMA", 300.0, 0),
        ])
        .unwrap()
    }

    #[test]
    fn normalize_region_title_cases_and_trims() {
        assert_eq!(normalize_region("  lima "), "Lima");
        assert_eq!(normalize_region("LIMA"), "Lima");
        assert_eq!(normalize_region("san juan de lurigancho"), "San Juan De Lurigancho");
        assert_eq!(normalize_region("o'higgins"), "O'Higgins");
        assert_eq!(normalize_region("ÁNCASH"), "Áncash");
        assert_eq!(normalize_region(""), "");
    }

    #[test]
    fn normalize_region_is_idempotent() {
        assert_eq!(normalize_region("ßa"), "Ssa");
        assert_eq!(normalize_region("straße"), "Straße");
        for raw in ["ßa", "ﬁnca", "lima ", "SAN MARTÍN", "o'higgins", "ǆemal", "straße"] {
            let once = normalize_region(raw);
            assert_eq!(normalize_region(&once), once, "{raw}");
        }
    }

    #[test]
    fn region_options_collapse_case_duplicates() {
        let ds = lima_dataset();
        let regions: Vec<&str> = ds.options(Dimension::Region).iter().map(|s| s.as_str()).collect();
        assert_eq!(regions, vec!["Lima"]);
        assert!(ds.records().iter().all(|r| r.region == "Lima"));
    }

    #[test]
    fn date_span_covers_unordered_rows() {
        let ds = Dataset::from_records(vec![
            record("2024-03-05", "Cusco", 1.0, 1),
            record("2024-01-10", "Cusco", 1.0, 1),
            record("2024-02-01", "Cusco", 1.0, 1),
        ])
        .unwrap();
        assert_eq!(ds.date_span(), (date("2024-01-10"), date("2024-03-05")));
        // original order is kept
        assert_eq!(ds.records()[0].date, date("2024-03-05"));
    }

    #[test]
    fn empty_dataset_is_rejected() {
        let err = Dataset::from_records(Vec::new()).unwrap_err();
        assert!(matches!(err, LoadError::EmptySource));
    }
}
