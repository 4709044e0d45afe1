use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{Datelike, Days, Months, NaiveDate};
use serde::{Deserialize, Serialize};

use super::filter::FilteredView;
use super::model::Dimension;

// ---------------------------------------------------------------------------
// KPIs
// ---------------------------------------------------------------------------

/// Scalar summary metrics over a filtered view.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Kpis {
    pub total_sales: f64,
    pub total_units: u64,
    /// Plain mean of the inventory column over rows.
    pub avg_inventory: f64,
    pub unit_price: f64,
    /// Mean over salespersons of each one's summed sales.
    pub avg_sales_per_salesperson: f64,
}

impl Kpis {
    pub fn compute(view: &FilteredView) -> Self {
        let mut total_sales = 0.0;
        let mut total_units = 0u64;
        let mut inventory_sum = 0.0;
        for r in view.records() {
            total_sales += r.sales_amount;
            total_units = total_units.saturating_add(r.units);
            inventory_sum += r.inventory;
        }

        let per_salesperson = sum_by(view, Dimension::Salesperson);
        Kpis {
            total_sales,
            total_units,
            avg_inventory: mean(inventory_sum, view.len()),
            unit_price: unit_price(total_sales, total_units),
            avg_sales_per_salesperson: mean(per_salesperson.values().sum(), per_salesperson.len()),
        }
    }
}

/// Average price per unit; zero when nothing was sold.
pub fn unit_price(total_sales: f64, total_units: u64) -> f64 {
    if total_units == 0 {
        0.0
    } else {
        total_sales / total_units as f64
    }
}

fn mean(sum: f64, n: usize) -> f64 {
    if n == 0 {
        0.0
    } else {
        sum / n as f64
    }
}

// ---------------------------------------------------------------------------
// Grouped sums
// ---------------------------------------------------------------------------

/// Summed sales amount per distinct value of `dim`.
pub fn sum_by(view: &FilteredView, dim: Dimension) -> BTreeMap<String, f64> {
    let mut sums: BTreeMap<String, f64> = BTreeMap::new();
    for r in view.records() {
        *sums.entry(dim.value(r).to_string()).or_default() += r.sales_amount;
    }
    sums
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct RegionSummary {
    pub sales: f64,
    pub units: u64,
    pub distinct_products: usize,
}

pub fn region_summary(view: &FilteredView) -> BTreeMap<String, RegionSummary> {
    let mut acc: BTreeMap<&str, (f64, u64, BTreeSet<&str>)> = BTreeMap::new();
    for r in view.records() {
        let entry = acc.entry(r.region.as_str()).or_default();
        entry.0 += r.sales_amount;
        entry.1 = entry.1.saturating_add(r.units);
        entry.2.insert(r.product.as_str());
    }
    acc.into_iter()
        .map(|(region, (sales, units, products))| {
            (
                region.to_string(),
                RegionSummary {
                    sales,
                    units,
                    distinct_products: products.len(),
                },
            )
        })
        .collect()
}

/// Percentage of the grand total held by each key. All zero when the total is.
pub fn shares(sums: &BTreeMap<String, f64>) -> BTreeMap<String, f64> {
    let total: f64 = sums.values().sum();
    sums.iter()
        .map(|(k, v)| {
            let pct = if total > 0.0 { v / total * 100.0 } else { 0.0 };
            (k.clone(), pct)
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Time buckets
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    #[default]
    Day,
    /// Weeks start on Monday.
    Week,
    Month,
    Quarter,
    Year,
}

impl Granularity {
    pub const ALL: [Granularity; 5] = [
        Granularity::Day,
        Granularity::Week,
        Granularity::Month,
        Granularity::Quarter,
        Granularity::Year,
    ];

    /// First day of the period containing `date`.
    pub fn bucket_start(self, date: NaiveDate) -> NaiveDate {
        match self {
            Granularity::Day => date,
            Granularity::Week => date
                .checked_sub_days(Days::new(date.weekday().num_days_from_monday() as u64))
                .unwrap_or(NaiveDate::MIN),
            Granularity::Month => month_start(date),
            Granularity::Quarter => month_start(date) - Months::new(date.month0() % 3),
            Granularity::Year => date - Days::new(date.ordinal0() as u64),
        }
    }

    /// First day of the period after the one starting at `start`, or `None`
    /// past the last representable date.
    pub fn next_start(self, start: NaiveDate) -> Option<NaiveDate> {
        match self {
            Granularity::Day => start.checked_add_days(Days::new(1)),
            Granularity::Week => start.checked_add_days(Days::new(7)),
            Granularity::Month => start.checked_add_months(Months::new(1)),
            Granularity::Quarter => start.checked_add_months(Months::new(3)),
            Granularity::Year => start.checked_add_months(Months::new(12)),
        }
    }

    /// Axis label for the bucket starting at `start`.
    pub fn label(self, start: NaiveDate) -> String {
        match self {
            Granularity::Day | Granularity::Week => start.format("%Y-%m-%d").to_string(),
            Granularity::Month => start.format("%Y-%m").to_string(),
            Granularity::Quarter => format!("{}-Q{}", start.year(), start.month0() / 3 + 1),
            Granularity::Year => start.year().to_string(),
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Granularity::Day => "Daily",
            Granularity::Week => "Weekly",
            Granularity::Month => "Monthly",
            Granularity::Quarter => "Quarterly",
            Granularity::Year => "Yearly",
        };
        f.write_str(name)
    }
}

fn month_start(date: NaiveDate) -> NaiveDate {
    date - Days::new(date.day0() as u64)
}

/// One period of the trend series.
#[derive(Debug, Clone, PartialEq)]
pub struct TrendBucket {
    pub start: NaiveDate,
    pub sales: f64,
    pub units: u64,
    /// `None` for a period without rows.
    pub avg_inventory: Option<f64>,
    pub rows: usize,
}

/// Bucket the view by calendar period, oldest first. Periods between the
/// first and last non-empty bucket are emitted with zero sales and units.
pub fn trend(view: &FilteredView, granularity: Granularity) -> Vec<TrendBucket> {
    #[derive(Default)]
    struct Acc {
        sales: f64,
        units: u64,
        inventory: f64,
        rows: usize,
    }

    let mut acc: BTreeMap<NaiveDate, Acc> = BTreeMap::new();
    for r in view.records() {
        let a = acc.entry(granularity.bucket_start(r.date)).or_default();
        a.sales += r.sales_amount;
        a.units = a.units.saturating_add(r.units);
        a.inventory += r.inventory;
        a.rows += 1;
    }

    let (Some(&first), Some(&last)) = (acc.keys().next(), acc.keys().next_back()) else {
        return Vec::new();
    };

    let mut out = Vec::new();
    let mut next = Some(first);
    while let Some(start) = next.filter(|s| *s <= last) {
        let bucket = match acc.get(&start) {
            Some(a) => TrendBucket {
                start,
                sales: a.sales,
                units: a.units,
                avg_inventory: Some(mean(a.inventory, a.rows)),
                rows: a.rows,
            },
            None => TrendBucket {
                start,
                sales: 0.0,
                units: 0,
                avg_inventory: None,
                rows: 0,
            },
        };
        out.push(bucket);
        next = granularity.next_start(start);
    }
    out
}

// ---------------------------------------------------------------------------
// Everything the dashboard shows for one view
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct AggregateResult {
    pub kpis: Kpis,
    pub by_category: BTreeMap<String, f64>,
    pub by_channel: BTreeMap<String, f64>,
    pub by_region: BTreeMap<String, f64>,
    pub by_product: BTreeMap<String, f64>,
    pub by_salesperson: BTreeMap<String, f64>,
    pub regions: BTreeMap<String, RegionSummary>,
    pub granularity: Granularity,
    pub trend: Vec<TrendBucket>,
    pub rows: usize,
    pub period: (NaiveDate, NaiveDate),
}

impl AggregateResult {
    pub fn compute(view: &FilteredView, granularity: Granularity) -> Self {
        AggregateResult {
            kpis: Kpis::compute(view),
            by_category: sum_by(view, Dimension::Category),
            by_channel: sum_by(view, Dimension::Channel),
            by_region: sum_by(view, Dimension::Region),
            by_product: sum_by(view, Dimension::Product),
            by_salesperson: sum_by(view, Dimension::Salesperson),
            regions: region_summary(view),
            granularity,
            trend: trend(view, granularity),
            rows: view.len(),
            period: view.date_span(),
        }
    }

    /// Swap the trend series for another granularity.
    pub fn regroup(&mut self, view: &FilteredView, granularity: Granularity) {
        self.granularity = granularity;
        self.trend = trend(view, granularity);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::filter::{apply, DateRange, FilterState};
    use crate::data::model::tests::{date, lima_dataset, record};
    use crate::data::model::Dataset;
    use std::sync::Arc;

    fn view_of(ds: Dataset) -> FilteredView {
        let ds = Arc::new(ds);
        apply(&ds, &FilterState::full(&ds)).view.unwrap()
    }

    fn view_in(ds: Dataset, start: &str, end: &str) -> FilteredView {
        let ds = Arc::new(ds);
        let mut state = FilterState::full(&ds);
        state.date_range = DateRange::new(date(start), date(end));
        apply(&ds, &state).view.unwrap()
    }

    #[test]
    fn lima_kpis_over_first_two_days() {
        let kpis = Kpis::compute(&view_in(lima_dataset(), "2024-01-01", "2024-01-02"));
        assert_eq!(kpis.total_sales, 300.0);
        assert_eq!(kpis.total_units, 30);
        assert_eq!(kpis.unit_price, 10.0);
        assert_eq!(kpis.avg_inventory, 50.0);
    }

    #[test]
    fn zero_units_gives_zero_unit_price() {
        let kpis = Kpis::compute(&view_in(lima_dataset(), "2024-01-03", "2024-01-03"));
        assert_eq!(kpis.total_units, 0);
        assert_eq!(kpis.unit_price, 0.0);
        assert_eq!(unit_price(12_345.0, 0), 0.0);
    }

    #[test]
    fn salesperson_average_groups_before_averaging() {
        let mut rows = vec![
            record("2024-01-01", "Lima", 100.0, 1),
            record("2024-01-02", "Lima", 200.0, 1),
            record("2024-01-03", "Lima", 600.0, 1),
        ];
        rows[2].salesperson = "Luis".to_string();
        let kpis = Kpis::compute(&view_of(Dataset::from_records(rows).unwrap()));
        // Ana 300, Luis 600 -> 450 (a flat row mean would be 300)
        assert_eq!(kpis.avg_sales_per_salesperson, 450.0);
    }

    #[test]
    fn region_summary_counts_distinct_products() {
        let mut rows = vec![
            record("2024-01-01", "Lima", 100.0, 1),
            record("2024-01-02", "lima", 50.0, 2),
            record("2024-01-03", "Cusco", 10.0, 3),
        ];
        rows[1].product = "Ibuprofeno".to_string();
        let view = view_of(Dataset::from_records(rows).unwrap());
        let regions = region_summary(&view);
        assert_eq!(
            regions["Lima"],
            RegionSummary { sales: 150.0, units: 3, distinct_products: 2 }
        );
        assert_eq!(regions["Cusco"].distinct_products, 1);

        let by_region = sum_by(&view, Dimension::Region);
        assert_eq!(by_region.len(), 2);
        assert_eq!(by_region["Cusco"], 10.0);
    }

    #[test]
    fn channel_shares_sum_to_hundred() {
        let sums: BTreeMap<String, f64> =
            [("Farmacia".to_string(), 75.0), ("Online".to_string(), 25.0)].into();
        let pct = shares(&sums);
        assert_eq!(pct["Farmacia"], 75.0);
        assert_eq!(pct["Online"], 25.0);

        let zero: BTreeMap<String, f64> = [("Farmacia".to_string(), 0.0)].into();
        assert_eq!(shares(&zero)["Farmacia"], 0.0);
    }

    #[test]
    fn bucket_starts() {
        // 2024-05-15 is a Wednesday
        let d = date("2024-05-15");
        assert_eq!(Granularity::Day.bucket_start(d), d);
        assert_eq!(Granularity::Week.bucket_start(d), date("2024-05-13"));
        assert_eq!(Granularity::Week.bucket_start(date("2024-05-13")), date("2024-05-13"));
        assert_eq!(Granularity::Week.bucket_start(date("2024-05-19")), date("2024-05-13"));
        assert_eq!(Granularity::Month.bucket_start(d), date("2024-05-01"));
        assert_eq!(Granularity::Quarter.bucket_start(d), date("2024-04-01"));
        assert_eq!(Granularity::Quarter.bucket_start(date("2024-12-31")), date("2024-10-01"));
        assert_eq!(Granularity::Year.bucket_start(d), date("2024-01-01"));
    }

    #[test]
    fn labels() {
        assert_eq!(Granularity::Quarter.label(date("2024-07-01")), "2024-Q3");
        assert_eq!(Granularity::Month.label(date("2024-07-01")), "2024-07");
        assert_eq!(Granularity::Year.label(date("2024-01-01")), "2024");
    }

    #[test]
    fn monthly_trend_fills_gaps_in_order() {
        let ds = Dataset::from_records(vec![
            record("2024-03-20", "Lima", 30.0, 3),
            record("2024-01-10", "Lima", 10.0, 1),
            record("2024-01-25", "Lima", 5.0, 1),
        ])
        .unwrap();
        let series = trend(&view_of(ds), Granularity::Month);

        let starts: Vec<NaiveDate> = series.iter().map(|b| b.start).collect();
        assert_eq!(starts, vec![date("2024-01-01"), date("2024-02-01"), date("2024-03-01")]);

        assert_eq!(series[0].sales, 15.0);
        assert_eq!(series[0].units, 2);
        assert_eq!(series[0].rows, 2);
        assert_eq!(series[0].avg_inventory, Some(50.0));

        assert_eq!(series[1].sales, 0.0);
        assert_eq!(series[1].rows, 0);
        assert_eq!(series[1].avg_inventory, None);

        assert_eq!(series[2].sales, 30.0);
    }

    #[test]
    fn weekly_keys_strictly_increase() {
        let ds = Dataset::from_records(vec![
            record("2024-01-01", "Lima", 1.0, 1),
            record("2024-01-07", "Lima", 1.0, 1),
            record("2024-01-08", "Lima", 1.0, 1),
            record("2024-01-29", "Lima", 1.0, 1),
        ])
        .unwrap();
        let series = trend(&view_of(ds), Granularity::Week);
        assert_eq!(series.len(), 5);
        assert_eq!(series[0].rows, 2);
        assert!(series.windows(2).all(|w| w[0].start < w[1].start));
        assert_eq!(series.iter().map(|b| b.rows).sum::<usize>(), 4);
    }

    #[test]
    fn trend_stops_at_the_last_representable_date() {
        let mut rows = vec![record("2024-01-01", "Lima", 1.0, 1), record("2024-01-01", "Lima", 2.0, 1)];
        rows[0].date = NaiveDate::MAX;
        rows[1].date = NaiveDate::MAX - Days::new(1);
        let view = view_of(Dataset::from_records(rows).unwrap());

        for g in Granularity::ALL {
            let series = trend(&view, g);
            assert!(!series.is_empty(), "{g}");
            assert_eq!(series.iter().map(|b| b.rows).sum::<usize>(), 2, "{g}");
        }
        assert_eq!(trend(&view, Granularity::Day).len(), 2);
        assert_eq!(Granularity::Day.next_start(NaiveDate::MAX), None);
        assert_eq!(Granularity::Year.next_start(Granularity::Year.bucket_start(NaiveDate::MAX)), None);

        let agg = AggregateResult::compute(&view, Granularity::Year);
        assert_eq!(agg.trend.len(), 1);
    }

    #[test]
    fn aggregate_result_bundles_views() {
        let view = view_of(lima_dataset());
        let mut agg = AggregateResult::compute(&view, Granularity::Day);
        assert_eq!(agg.rows, 3);
        assert_eq!(agg.period, (date("2024-01-01"), date("2024-01-03")));
        assert_eq!(agg.trend.len(), 3);
        assert_eq!(agg.by_region["Lima"], 600.0);

        agg.regroup(&view, Granularity::Year);
        assert_eq!(agg.trend.len(), 1);
        assert_eq!(agg.trend[0].sales, 600.0);
    }
}
