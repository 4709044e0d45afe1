use eframe::egui::{self, Color32, RichText, ScrollArea, Ui};
use egui_extras::DatePickerButton;

use crate::data::aggregate::Kpis;
use crate::data::model::Dimension;
use crate::state::{AppState, Tab};
use crate::ui::format::{format_money, format_number};
use crate::ui::{plot, table};

// ---------------------------------------------------------------------------
// Left side panel – filter widgets
// ---------------------------------------------------------------------------

/// Changes requested by the filter widgets, applied after the panel is drawn.
enum FilterAction {
    Toggle(Dimension, String),
    All(Dimension),
    Clear(Dimension),
}

/// Render the left filter panel.
pub fn side_panel(ui: &mut Ui, state: &mut AppState) {
    ui.heading("Filters");
    ui.separator();

    let (min_date, max_date) = match state.dataset() {
        Some(ds) => ds.date_span(),
        None => {
            ui.label("No dataset loaded.");
            return;
        }
    };

    // ---- Date range ----
    ui.strong("Date range");
    let range = state.filters.date_range;
    let mut start = range.start.unwrap_or(min_date);
    let mut end = range.end.unwrap_or(max_date);
    let mut has_end = range.end.is_some();
    let mut date_changed = false;
    egui::Grid::new("date_range").num_columns(2).show(ui, |ui: &mut Ui| {
        ui.label("From");
        date_changed |= ui
            .add(DatePickerButton::new(&mut start).id_salt("date_from"))
            .changed();
        ui.end_row();

        ui.label("To");
        ui.horizontal(|ui: &mut Ui| {
            date_changed |= ui.checkbox(&mut has_end, "").changed();
            if has_end {
                date_changed |= ui
                    .add(DatePickerButton::new(&mut end).id_salt("date_to"))
                    .changed();
            }
        });
        ui.end_row();
    });
    if date_changed {
        state.set_date_range(Some(start), has_end.then_some(end));
    }

    if let Some(warning) = &state.filter_warning {
        ui.label(RichText::new(format!("⚠ {warning}")).color(Color32::from_rgb(0xe0, 0x8a, 0x00)));
    }
    if ui.small_button("Reset filters").clicked() {
        state.reset_filters();
    }
    ui.separator();

    // Clone what we need so we can mutate state after the loop.
    let options = state.options.clone();
    let mut actions = Vec::new();

    ScrollArea::vertical()
        .auto_shrink([false, false])
        .show(ui, |ui: &mut Ui| {
            // ---- Per-dimension filter widgets (collapsible) ----
            for dim in Dimension::ALL {
                let Some(values) = options.get(&dim) else {
                    continue;
                };
                let selected = state.filters.selected(dim);
                let n_selected = values
                    .iter()
                    .filter(|v| selected.is_some_and(|s| s.contains(*v)))
                    .count();
                let header_text = format!("{dim}  ({n_selected}/{})", values.len());

                egui::CollapsingHeader::new(RichText::new(header_text).strong())
                    .id_salt(dim.header())
                    .default_open(false)
                    .show(ui, |ui: &mut Ui| {
                        ui.horizontal(|ui: &mut Ui| {
                            if ui.small_button("All").clicked() {
                                actions.push(FilterAction::All(dim));
                            }
                            if ui.small_button("None").clicked() {
                                actions.push(FilterAction::Clear(dim));
                            }
                        });
                        if n_selected == 0 {
                            ui.weak("Nothing selected: showing all");
                        }

                        for value in values {
                            let mut checked = selected.is_some_and(|s| s.contains(value));
                            if ui.checkbox(&mut checked, value.as_str()).changed() {
                                actions.push(FilterAction::Toggle(dim, value.clone()));
                            }
                        }
                    });
            }
        });

    for action in actions {
        match action {
            FilterAction::Toggle(dim, value) => state.toggle_filter_value(dim, &value),
            FilterAction::All(dim) => state.select_all(dim),
            FilterAction::Clear(dim) => state.select_none(dim),
        }
    }
}

// ---------------------------------------------------------------------------
// Top bar
// ---------------------------------------------------------------------------

/// Render the top menu / toolbar.
pub fn top_bar(ui: &mut Ui, state: &mut AppState) {
    egui::menu::bar(ui, |ui: &mut Ui| {
        ui.menu_button("File", |ui: &mut Ui| {
            if ui.button("Open…").clicked() {
                open_file_dialog(state);
                ui.close_menu();
            }
            if ui.button("Reload").clicked() {
                state.reload();
                ui.close_menu();
            }
        });

        ui.separator();

        if let Some(ds) = state.dataset() {
            ui.label(format!(
                "{} records loaded, {} visible",
                ds.len(),
                state.view.as_ref().map_or(0, |v| v.len())
            ));
        }

        if let Some(msg) = &state.status_message {
            ui.separator();
            ui.label(RichText::new(msg).color(Color32::LIGHT_BLUE));
        }
    });
}

// ---------------------------------------------------------------------------
// Central panel
// ---------------------------------------------------------------------------

/// KPI cards, tab strip and the active tab.
pub fn central_panel(ui: &mut Ui, state: &mut AppState) {
    if let Some(err) = &state.load_error {
        ui.centered_and_justified(|ui: &mut Ui| {
            ui.heading(
                RichText::new(format!("Could not load data: {err}\n\nFile → Open… to pick another file"))
                    .color(Color32::RED),
            );
        });
        return;
    }
    if state.dataset().is_none() {
        ui.centered_and_justified(|ui: &mut Ui| {
            ui.heading("Open a sales file to start  (File → Open…)");
        });
        return;
    }
    let Some(agg) = state.aggregates.clone() else {
        ui.centered_and_justified(|ui: &mut Ui| {
            ui.heading(
                RichText::new("⚠ No data matches the selected filters. Adjust your selection.")
                    .color(Color32::from_rgb(0xe0, 0x8a, 0x00)),
            );
        });
        return;
    };

    ui.heading("Key indicators");
    kpi_row(ui, &agg.kpis);
    ui.separator();

    ui.horizontal(|ui: &mut Ui| {
        for tab in Tab::ALL {
            ui.selectable_value(&mut state.tab, tab, tab.title());
        }
    });
    ui.separator();

    match state.tab {
        Tab::Overview => plot::overview(ui, state, &agg),
        Tab::Trends => plot::trends(ui, state),
        Tab::Distribution => plot::distribution(ui, state, &agg),
        Tab::Cities => plot::cities(ui, &agg),
        Tab::Data => table::data_tab(ui, state, &agg),
    }
}

fn kpi_row(ui: &mut Ui, kpis: &Kpis) {
    ui.columns(5, |cols: &mut [Ui]| {
        kpi_card(&mut cols[0], "Total sales", format_money(kpis.total_sales));
        kpi_card(&mut cols[1], "Units sold", format_number(kpis.total_units as f64, 0));
        kpi_card(&mut cols[2], "Average inventory", format_number(kpis.avg_inventory, 0));
        kpi_card(
            &mut cols[3],
            "Average price / unit",
            format!("${}", format_number(kpis.unit_price, 2)),
        );
        kpi_card(
            &mut cols[4],
            "Average sales / salesperson",
            format_money(kpis.avg_sales_per_salesperson),
        );
    });
}

fn kpi_card(ui: &mut Ui, title: &str, value: String) {
    ui.group(|ui: &mut Ui| {
        ui.label(RichText::new(title).small());
        ui.label(RichText::new(value).heading().strong());
    });
}

// ---------------------------------------------------------------------------
// File dialog
// ---------------------------------------------------------------------------

pub fn open_file_dialog(state: &mut AppState) {
    let file = rfd::FileDialog::new()
        .set_title("Open sales data")
        .add_filter("Supported files", &["csv", "txt", "json"])
        .add_filter("CSV", &["csv", "txt"])
        .add_filter("JSON", &["json"])
        .pick_file();

    if let Some(path) = file {
        state.open(&path);
    }
}
