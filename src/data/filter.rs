use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::NaiveDate;

use super::error::FilterError;
use super::model::{Dataset, Dimension, Record};

// ---------------------------------------------------------------------------
// Filter predicate: date interval + selected values per dimension
// ---------------------------------------------------------------------------

/// A date interval as entered by the user. Either endpoint may be missing
/// while the user is still picking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        DateRange {
            start: Some(start),
            end: Some(end),
        }
    }

    /// The inclusive bounds, or the reason they cannot be used.
    pub fn resolve(&self) -> Result<(NaiveDate, NaiveDate), FilterError> {
        match (self.start, self.end) {
            (Some(start), Some(end)) if start <= end => Ok((start, end)),
            (Some(start), Some(end)) => Err(FilterError::InvalidDateRange {
                reason: format!("end {end} is before start {start}"),
            }),
            _ => Err(FilterError::InvalidDateRange {
                reason: "select both a start and an end date".to_string(),
            }),
        }
    }
}

/// Everything the user has constrained at one point in time.
/// An empty selection set for a dimension means "no filter" on it.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterState {
    pub date_range: DateRange,
    pub selections: BTreeMap<Dimension, BTreeSet<String>>,
}

impl FilterState {
    /// Initialise a [`FilterState`] with the whole date span and all values
    /// selected (i.e., show everything).
    pub fn full(dataset: &Dataset) -> Self {
        let (start, end) = dataset.date_span();
        FilterState {
            date_range: DateRange::new(start, end),
            selections: Dimension::ALL
                .iter()
                .map(|&dim| (dim, dataset.options(dim).clone()))
                .collect(),
        }
    }

    pub fn selected(&self, dim: Dimension) -> Option<&BTreeSet<String>> {
        self.selections.get(&dim)
    }

    fn admits(&self, record: &Record) -> bool {
        self.selections.iter().all(|(dim, selected)| {
            selected.is_empty() || selected.contains(dim.value(record))
        })
    }
}

// ---------------------------------------------------------------------------
// FilteredView – the rows that passed
// ---------------------------------------------------------------------------

/// Indices of the dataset rows that passed a [`FilterState`], in their
/// original order. Never empty.
#[derive(Debug, Clone)]
pub struct FilteredView {
    dataset: Arc<Dataset>,
    indices: Vec<usize>,
}

impl FilteredView {
    pub fn records(&self) -> impl Iterator<Item = &Record> + '_ {
        self.indices.iter().map(|&i| &self.dataset.records()[i])
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    /// Earliest and latest date among the visible rows.
    pub fn date_span(&self) -> (NaiveDate, NaiveDate) {
        let mut dates = self.records().map(|r| r.date);
        // non-empty by construction
        let first = dates.next().unwrap_or_default();
        dates.fold((first, first), |(lo, hi), d| (lo.min(d), hi.max(d)))
    }

    /// Rows newest first, for display. Ties keep view order.
    pub fn newest_first(&self) -> Vec<&Record> {
        let mut rows: Vec<&Record> = self.records().collect();
        rows.sort_by(|a, b| b.date.cmp(&a.date));
        rows
    }
}

/// Result of one filtering pass.
#[derive(Debug, Clone)]
pub struct FilterOutcome {
    /// The matching rows, or [`FilterError::EmptyResultSet`].
    pub view: Result<FilteredView, FilterError>,
    /// Set when the date interval was unusable and got ignored.
    pub warning: Option<FilterError>,
}

/// Apply the date predicate and every categorical predicate conjunctively.
pub fn apply(dataset: &Arc<Dataset>, state: &FilterState) -> FilterOutcome {
    let (bounds, warning) = match state.date_range.resolve() {
        Ok(bounds) => (Some(bounds), None),
        Err(e) => {
            log::warn!("{e}");
            (None, Some(e))
        }
    };

    let indices: Vec<usize> = dataset
        .records()
        .iter()
        .enumerate()
        .filter(|(_, r)| match bounds {
            Some((start, end)) => start <= r.date && r.date <= end,
            None => true,
        })
        .filter(|(_, r)| state.admits(r))
        .map(|(i, _)| i)
        .collect();

    log::debug!("Filter kept {} of {} rows", indices.len(), dataset.len());

    let view = if indices.is_empty() {
        Err(FilterError::EmptyResultSet)
    } else {
        Ok(FilteredView {
            dataset: Arc::clone(dataset),
            indices,
        })
    };
    FilterOutcome { view, warning }
}

/// Distinct values per dimension among the rows inside `date_range`, which
/// is what the filter widgets offer once a date interval is chosen. An
/// unusable interval offers the whole dataset.
pub fn options_in_range(
    dataset: &Dataset,
    date_range: &DateRange,
) -> BTreeMap<Dimension, BTreeSet<String>> {
    let bounds = date_range.resolve().ok();
    let mut options: BTreeMap<Dimension, BTreeSet<String>> =
        Dimension::ALL.iter().map(|&d| (d, BTreeSet::new())).collect();

    for r in dataset.records() {
        if let Some((start, end)) = bounds {
            if r.date < start || r.date > end {
                continue;
            }
        }
        for dim in Dimension::ALL {
            options
                .entry(dim)
                .or_default()
                .insert(dim.value(r).to_string());
        }
    }
    options
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::tests::{date, lima_dataset, record};

    fn mixed_dataset() -> Arc<Dataset> {
        let mut rows = vec![
            record("2024-01-05", "Lima", 100.0, 1),
            record("2024-01-01", "Cusco", 200.0, 2),
            record("2024-02-10", "Arequipa", 300.0, 3),
            record("2024-03-01", "lima", 400.0, 4),
        ];
        rows[1].channel = "Online".to_string();
        rows[2].product = "Ibuprofeno".to_string();
        rows[3].salesperson = "Luis".to_string();
        Arc::new(Dataset::from_records(rows).unwrap())
    }

    fn with_range(ds: &Dataset, start: &str, end: &str) -> FilterState {
        let mut state = FilterState::full(ds);
        state.date_range = DateRange::new(date(start), date(end));
        state
    }

    #[test]
    fn full_state_is_identity() {
        let ds = mixed_dataset();
        let outcome = apply(&ds, &FilterState::full(&ds));
        assert!(outcome.warning.is_none());
        let view = outcome.view.unwrap();
        assert_eq!(view.indices, [0, 1, 2, 3]);
    }

    #[test]
    fn date_range_is_inclusive_and_keeps_order() {
        let ds = mixed_dataset();
        let view = apply(&ds, &with_range(&ds, "2024-01-01", "2024-02-10")).view.unwrap();
        assert_eq!(view.indices, [0, 1, 2]);
        assert_eq!(view.date_span(), (date("2024-01-01"), date("2024-02-10")));
    }

    #[test]
    fn every_kept_row_satisfies_every_predicate() {
        let ds = mixed_dataset();
        let mut state = with_range(&ds, "2024-01-01", "2024-03-01");
        state.selections.insert(
            Dimension::Region,
            ["Lima", "Arequipa"].iter().map(|s| s.to_string()).collect(),
        );
        state
            .selections
            .insert(Dimension::Salesperson, ["Ana".to_string()].into());

        let view = apply(&ds, &state).view.unwrap();
        assert_eq!(view.indices, [0, 2]);
        for r in view.records() {
            assert!(ds.records().contains(r));
            assert!(r.region == "Lima" || r.region == "Arequipa");
            assert_eq!(r.salesperson, "Ana");
        }
    }

    #[test]
    fn empty_selection_means_unfiltered() {
        let ds = mixed_dataset();
        let mut state = FilterState::full(&ds);
        state.selections.insert(Dimension::Region, BTreeSet::new());
        let view = apply(&ds, &state).view.unwrap();
        assert_eq!(view.len(), ds.len());
    }

    #[test]
    fn invalid_range_falls_back_with_warning() {
        let ds = mixed_dataset();

        let mut reversed = FilterState::full(&ds);
        reversed.date_range = DateRange::new(date("2024-03-01"), date("2024-01-01"));
        let outcome = apply(&ds, &reversed);
        assert!(matches!(
            outcome.warning,
            Some(FilterError::InvalidDateRange { .. })
        ));
        assert_eq!(outcome.view.unwrap().len(), 4);

        let mut half = FilterState::full(&ds);
        half.date_range.end = None;
        let outcome = apply(&ds, &half);
        assert!(outcome.warning.is_some());
        assert_eq!(outcome.view.unwrap().len(), 4);
    }

    #[test]
    fn no_match_is_empty_result_set() {
        let ds = mixed_dataset();
        let mut state = with_range(&ds, "2024-01-01", "2024-01-31");
        state
            .selections
            .insert(Dimension::Region, ["Arequipa".to_string()].into());
        let outcome = apply(&ds, &state);
        assert!(outcome.warning.is_none());
        assert_eq!(outcome.view.unwrap_err(), FilterError::EmptyResultSet);
    }

    #[test]
    fn lima_scenario_filters_by_date() {
        let ds = Arc::new(lima_dataset());
        let view = apply(&ds, &with_range(&ds, "2024-01-01", "2024-01-02")).view.unwrap();
        assert_eq!(view.len(), 2);
        let view = apply(&ds, &with_range(&ds, "2024-01-03", "2024-01-03")).view.unwrap();
        assert_eq!(view.len(), 1);
    }

    #[test]
    fn options_follow_the_date_range() {
        let ds = mixed_dataset();
        let opts = options_in_range(&ds, &DateRange::new(date("2024-01-01"), date("2024-01-31")));
        let regions: Vec<&String> = opts[&Dimension::Region].iter().collect();
        assert_eq!(regions, vec!["Cusco", "Lima"]);
        assert!(!opts[&Dimension::Product].contains("Ibuprofeno"));

        let all = options_in_range(&ds, &DateRange { start: None, end: None });
        assert_eq!(all[&Dimension::Region].len(), 3);
    }

    #[test]
    fn newest_first_sorts_for_display() {
        let ds = mixed_dataset();
        let view = apply(&ds, &FilterState::full(&ds)).view.unwrap();
        let dates: Vec<NaiveDate> = view.newest_first().iter().map(|r| r.date).collect();
        assert_eq!(
            dates,
            vec![date("2024-03-01"), date("2024-02-10"), date("2024-01-05"), date("2024-01-01")]
        );
    }
}
