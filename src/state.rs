use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::NaiveDate;

use crate::config::Config;
use crate::data::aggregate::{AggregateResult, Granularity};
use crate::data::error::{FilterError, LoadError};
use crate::data::export::{self, ExportFormat};
use crate::data::filter::{apply, options_in_range, DateRange, FilterState, FilteredView};
use crate::data::loader;
use crate::data::model::{Dataset, Dimension};
use crate::data::ranking::top_n;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tab {
    #[default]
    Overview,
    Trends,
    Distribution,
    Cities,
    Data,
}

impl Tab {
    pub const ALL: [Tab; 5] = [Tab::Overview, Tab::Trends, Tab::Distribution, Tab::Cities, Tab::Data];

    pub fn title(self) -> &'static str {
        match self {
            Tab::Overview => "Overview",
            Tab::Trends => "Trends",
            Tab::Distribution => "Distribution",
            Tab::Cities => "Sales by City",
            Tab::Data => "Data & Export",
        }
    }
}

/// A dataset together with the source it was read from.
#[derive(Debug, Clone)]
pub struct LoadedSource {
    pub path: PathBuf,
    pub dataset: Arc<Dataset>,
}

// ---------------------------------------------------------------------------
// Application state
// ---------------------------------------------------------------------------

/// The full session state, independent of rendering.
pub struct AppState {
    pub config: Config,

    /// Loaded dataset (None until a load succeeds).
    pub source: Option<LoadedSource>,

    /// Why the last load failed. While set, nothing else is shown.
    pub load_error: Option<LoadError>,

    /// Source of the last load attempt, for reloading.
    last_path: Option<PathBuf>,

    /// Current user constraints.
    pub filters: FilterState,

    /// Values the filter widgets offer for the current date range.
    pub options: BTreeMap<Dimension, BTreeSet<String>>,

    pub granularity: Granularity,
    pub tab: Tab,

    /// Rows passing the current filters (None when nothing matches).
    pub view: Option<FilteredView>,

    /// Everything derived from `view`.
    pub aggregates: Option<AggregateResult>,

    /// Non-fatal filter condition shown next to the widgets.
    pub filter_warning: Option<FilterError>,

    /// Status / error message shown in the UI.
    pub status_message: Option<String>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self {
            granularity: config.dashboard.granularity,
            config,
            source: None,
            load_error: None,
            last_path: None,
            filters: FilterState {
                date_range: DateRange {
                    start: None,
                    end: None,
                },
                selections: BTreeMap::new(),
            },
            options: BTreeMap::new(),
            tab: Tab::default(),
            view: None,
            aggregates: None,
            filter_warning: None,
            status_message: None,
        }
    }

    pub fn dataset(&self) -> Option<&Arc<Dataset>> {
        self.source.as_ref().map(|s| &s.dataset)
    }

    /// Open `path` unless it is already the loaded source.
    pub fn open(&mut self, path: &Path) {
        if let Some(src) = &self.source {
            if src.path == path {
                log::debug!("{} already loaded", path.display());
                return;
            }
        }
        self.load(path.to_path_buf());
    }

    /// Re-read the current source from disk.
    pub fn reload(&mut self) {
        match self.last_path.clone() {
            Some(path) => self.load(path),
            None => self.status_message = Some("Nothing to reload".to_string()),
        }
    }

    fn load(&mut self, path: PathBuf) {
        self.last_path = Some(path.clone());
        match loader::load_file(&path) {
            Ok(dataset) => self.set_dataset(path, dataset),
            Err(e) => {
                log::error!("Failed to load {}: {e}", path.display());
                self.source = None;
                self.view = None;
                self.aggregates = None;
                self.filter_warning = None;
                self.load_error = Some(e);
            }
        }
    }

    /// Ingest a newly loaded dataset and reset filters to show everything.
    pub fn set_dataset(&mut self, path: PathBuf, dataset: Dataset) {
        log::info!(
            "Session dataset: {} rows, {} regions, {} products",
            dataset.len(),
            dataset.options(Dimension::Region).len(),
            dataset.options(Dimension::Product).len()
        );
        self.filters = FilterState::full(&dataset);
        self.source = Some(LoadedSource {
            path,
            dataset: Arc::new(dataset),
        });
        self.load_error = None;
        self.status_message = None;
        self.refresh_options();
        self.refilter();
    }

    /// Recompute the view and every aggregate from the current filters.
    pub fn refilter(&mut self) {
        let Some(dataset) = self.dataset().cloned() else {
            return;
        };
        let outcome = apply(&dataset, &self.filters);
        self.filter_warning = outcome.warning;
        match outcome.view {
            Ok(view) => {
                self.aggregates = Some(AggregateResult::compute(&view, self.granularity));
                self.view = Some(view);
            }
            Err(e) => {
                log::info!("{e}");
                self.view = None;
                self.aggregates = None;
            }
        }
    }

    fn refresh_options(&mut self) {
        if let Some(ds) = self.dataset() {
            self.options = options_in_range(ds, &self.filters.date_range);
        }
    }

    pub fn set_granularity(&mut self, granularity: Granularity) {
        self.granularity = granularity;
        if let (Some(view), Some(agg)) = (&self.view, &mut self.aggregates) {
            agg.regroup(view, granularity);
        }
    }

    /// Change the date interval. A dimension with every offered value
    /// selected keeps everything selected; otherwise values the new interval
    /// no longer offers are dropped, so the widgets show the whole restriction.
    pub fn set_date_range(&mut self, start: Option<NaiveDate>, end: Option<NaiveDate>) {
        let was_full: BTreeSet<Dimension> = self
            .filters
            .selections
            .iter()
            .filter(|(dim, selected)| {
                self.options
                    .get(*dim)
                    .is_some_and(|offered| !offered.is_empty() && offered.is_subset(selected))
            })
            .map(|(dim, _)| *dim)
            .collect();

        self.filters.date_range = DateRange { start, end };
        self.refresh_options();

        for (dim, selected) in &mut self.filters.selections {
            let offered = self.options.get(dim).cloned().unwrap_or_default();
            if was_full.contains(dim) {
                *selected = offered;
            } else {
                selected.retain(|v| offered.contains(v));
            }
        }
        self.refilter();
    }

    /// Toggle a single value in a dimension's selection.
    pub fn toggle_filter_value(&mut self, dim: Dimension, value: &str) {
        let selected = self.filters.selections.entry(dim).or_default();
        if !selected.remove(value) {
            selected.insert(value.to_string());
        }
        self.refilter();
    }

    /// Select every value offered for a dimension.
    pub fn select_all(&mut self, dim: Dimension) {
        let all = self.options.get(&dim).cloned().unwrap_or_default();
        self.filters.selections.insert(dim, all);
        self.refilter();
    }

    /// Deselect all values in a dimension, which lifts its restriction.
    pub fn select_none(&mut self, dim: Dimension) {
        self.filters.selections.insert(dim, BTreeSet::new());
        self.refilter();
    }

    /// Back to the whole dataset.
    pub fn reset_filters(&mut self) {
        if let Some(ds) = self.dataset() {
            self.filters = FilterState::full(ds);
        }
        self.refresh_options();
        self.refilter();
    }

    /// Top entries of a grouped aggregate, sized by the config.
    pub fn top(&self, sums: &BTreeMap<String, f64>) -> Vec<(String, f64)> {
        top_n(sums.iter().map(|(k, v)| (k.clone(), *v)), self.config.dashboard.top_n)
    }

    /// Suggested download name for today's export.
    pub fn export_file_name(&self, format: ExportFormat, today: NaiveDate) -> String {
        export::file_name(&self.config.export.file_stem, today, format)
    }

    /// Encode the current view and write it to `path`.
    pub fn export_to(&mut self, format: ExportFormat, path: &Path) -> Result<()> {
        let result = self.write_export(format, path);
        self.status_message = Some(match &result {
            Ok(()) => format!("Exported {}", path.display()),
            Err(e) => format!("Export failed: {e:#}"),
        });
        result
    }

    fn write_export(&self, format: ExportFormat, path: &Path) -> Result<()> {
        let view = self.view.as_ref().context("no rows to export")?;
        let bytes = export::encode(view, format, &self.config.export.sheet_name)?;
        std::fs::write(path, bytes).with_context(|| format!("writing {}", path.display()))?;
        log::info!("Exported {} rows to {}", view.len(), path.display());
        Ok(())
    }
}
