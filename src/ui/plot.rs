use std::ops::RangeInclusive;

use eframe::egui::{self, Color32, Ui};
use egui_plot::{Bar, BarChart, GridMark, Legend, Line, Plot, PlotPoints, Points};

use crate::color::{intensity, ColorMap, PRIMARY, SECONDARY};
use crate::data::aggregate::{shares, AggregateResult, Granularity, TrendBucket};
use crate::data::ranking::top_n;
use crate::state::AppState;
use crate::ui::format::{format_money, format_number};

const CHART_HEIGHT: f32 = 420.0;

// ---------------------------------------------------------------------------
// Tabs
// ---------------------------------------------------------------------------

/// Top products and sales per category.
pub fn overview(ui: &mut Ui, state: &AppState, agg: &AggregateResult) {
    let products = state.top(&agg.by_product);
    let categories = ranked(&agg.by_category);
    let category_colors = ColorMap::new(agg.by_category.keys());

    ui.columns(2, |cols: &mut [Ui]| {
        cols[0].strong(format!("Top {} products by sales", state.config.dashboard.top_n));
        horizontal_bars(&mut cols[0], "top_products", &products, &by_value(&products));

        cols[1].strong("Sales by category");
        let colors: Vec<Color32> = categories
            .iter()
            .map(|(k, _)| category_colors.color_for(k))
            .collect();
        horizontal_bars(&mut cols[1], "by_category", &categories, &colors);
    });
}

/// Sales and average inventory per period. Drawn from the session's
/// aggregates after any granularity change, never from a stale copy.
pub fn trends(ui: &mut Ui, state: &mut AppState) {
    let mut selected = state.granularity;
    egui::ComboBox::from_label("Aggregation period")
        .selected_text(selected.to_string())
        .show_ui(ui, |ui: &mut Ui| {
            for g in Granularity::ALL {
                ui.selectable_value(&mut selected, g, g.to_string());
            }
        });
    if selected != state.granularity {
        state.set_granularity(selected);
    }

    if let Some(agg) = &state.aggregates {
        trend_charts(ui, agg);
    }
}

fn trend_charts(ui: &mut Ui, agg: &AggregateResult) {
    let labels: Vec<String> = agg
        .trend
        .iter()
        .map(|b| agg.granularity.label(b.start))
        .collect();

    ui.strong(format!("Sales ({})", agg.granularity));
    let sales: Vec<[f64; 2]> = agg
        .trend
        .iter()
        .enumerate()
        .map(|(i, b)| [i as f64, b.sales])
        .collect();
    let axis = labels.clone();
    Plot::new("sales_trend")
        .height(260.0)
        .legend(Legend::default())
        .x_axis_formatter(move |mark: GridMark, _range: &RangeInclusive<f64>| {
            axis_label(&axis, mark.value)
        })
        .show(ui, |plot_ui| {
            plot_ui.line(
                Line::new(PlotPoints::from(sales.clone()))
                    .name("Sales ($)")
                    .color(PRIMARY)
                    .width(2.0),
            );
            plot_ui.points(Points::new(PlotPoints::from(sales)).radius(3.0).color(PRIMARY));
        });

    ui.strong(format!("Average inventory ({})", agg.granularity));
    let segments = inventory_segments(&agg.trend);
    Plot::new("inventory_trend")
        .height(260.0)
        .legend(Legend::default())
        .x_axis_formatter(move |mark: GridMark, _range: &RangeInclusive<f64>| {
            axis_label(&labels, mark.value)
        })
        .show(ui, |plot_ui| {
            for segment in segments {
                plot_ui.points(
                    Points::new(PlotPoints::from(segment.clone()))
                        .radius(3.0)
                        .color(SECONDARY),
                );
                plot_ui.line(
                    Line::new(PlotPoints::from(segment))
                        .name("Average inventory (units)")
                        .color(SECONDARY)
                        .width(2.0),
                );
            }
        });

    ui.add_space(8.0);
    egui::CollapsingHeader::new("Per-period figures")
        .default_open(false)
        .show(ui, |ui: &mut Ui| {
            egui::Grid::new("trend_table")
                .striped(true)
                .num_columns(5)
                .show(ui, |ui: &mut Ui| {
                    ui.strong("Period");
                    ui.strong("Sales ($)");
                    ui.strong("Units");
                    ui.strong("Avg inventory");
                    ui.strong("Rows");
                    ui.end_row();

                    for bucket in &agg.trend {
                        ui.label(agg.granularity.label(bucket.start));
                        ui.label(format_money(bucket.sales));
                        ui.label(format_number(bucket.units as f64, 0));
                        ui.label(
                            bucket
                                .avg_inventory
                                .map(|v| format_number(v, 1))
                                .unwrap_or_else(|| "-".to_string()),
                        );
                        ui.label(bucket.rows.to_string());
                        ui.end_row();
                    }
                });
        });
}

/// Channel shares and top salespersons.
pub fn distribution(ui: &mut Ui, state: &AppState, agg: &AggregateResult) {
    let pct = shares(&agg.by_channel);
    let channels: Vec<(String, f64)> = ranked(&agg.by_channel)
        .into_iter()
        .map(|(k, v)| {
            let share = pct.get(&k).copied().unwrap_or_default();
            (format!("{k} ({}%)", format_number(share, 1)), v)
        })
        .collect();
    let channel_colors: Vec<Color32> = {
        let map = ColorMap::new(agg.by_channel.keys());
        ranked(&agg.by_channel)
            .iter()
            .map(|(k, _)| map.color_for(k))
            .collect()
    };
    let sellers = state.top(&agg.by_salesperson);

    ui.columns(2, |cols: &mut [Ui]| {
        cols[0].strong("Sales by distribution channel");
        horizontal_bars(&mut cols[0], "by_channel", &channels, &channel_colors);

        cols[1].strong(format!("Top {} salespersons", state.config.dashboard.top_n));
        horizontal_bars(&mut cols[1], "top_sellers", &sellers, &by_value(&sellers));
    });
}

/// Sales per city (region) as a chart and a table.
pub fn cities(ui: &mut Ui, agg: &AggregateResult) {
    let regions = ranked(&agg.by_region);

    ui.strong("Total sales by city");
    horizontal_bars(ui, "by_city", &regions, &by_value(&regions));

    ui.add_space(8.0);
    ui.strong("Data by city");
    egui::Grid::new("city_table")
        .striped(true)
        .num_columns(4)
        .show(ui, |ui: &mut Ui| {
            ui.strong("City");
            ui.strong("Sales ($)");
            ui.strong("Units");
            ui.strong("Distinct products");
            ui.end_row();

            for (region, _) in &regions {
                let Some(summary) = agg.regions.get(region) else {
                    continue;
                };
                ui.label(region);
                ui.label(format_money(summary.sales));
                ui.label(format_number(summary.units as f64, 0));
                ui.label(summary.distinct_products.to_string());
                ui.end_row();
            }
        });
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Every entry of a grouped sum, largest first.
fn ranked(sums: &std::collections::BTreeMap<String, f64>) -> Vec<(String, f64)> {
    top_n(sums.iter().map(|(k, v)| (k.clone(), *v)), sums.len())
}

/// Colour each bar by its share of the largest value.
fn by_value(entries: &[(String, f64)]) -> Vec<Color32> {
    let max = entries.iter().map(|(_, v)| *v).fold(0.0_f64, f64::max);
    entries
        .iter()
        .map(|(_, v)| intensity(if max > 0.0 { v / max } else { 0.0 }))
        .collect()
}

/// Horizontal bar chart, first entry at the top.
fn horizontal_bars(ui: &mut Ui, id: &str, entries: &[(String, f64)], colors: &[Color32]) {
    let n = entries.len();
    let bars: Vec<Bar> = entries
        .iter()
        .enumerate()
        .map(|(i, (label, value))| {
            Bar::new((n - 1 - i) as f64, *value)
                .name(format!("{label}: {}", format_money(*value)))
                .fill(colors.get(i).copied().unwrap_or(PRIMARY))
                .width(0.7)
        })
        .collect();
    let axis: Vec<String> = entries.iter().rev().map(|(k, _)| k.clone()).collect();

    Plot::new(id)
        .height(CHART_HEIGHT)
        .allow_drag(false)
        .allow_scroll(false)
        .allow_zoom(false)
        .allow_boxed_zoom(false)
        .include_x(0.0)
        .y_axis_formatter(move |mark: GridMark, _range: &RangeInclusive<f64>| {
            axis_label(&axis, mark.value)
        })
        .show(ui, |plot_ui| {
            plot_ui.bar_chart(BarChart::new(bars).horizontal());
        });
}

/// Category label at an integer axis position, blank elsewhere.
fn axis_label(labels: &[String], value: f64) -> String {
    if value < 0.0 || (value - value.round()).abs() > 1e-6 {
        return String::new();
    }
    labels.get(value.round() as usize).cloned().unwrap_or_default()
}

/// Runs of consecutive periods that have an inventory observation, so the
/// line breaks across empty periods instead of bridging them.
fn inventory_segments(trend: &[TrendBucket]) -> Vec<Vec<[f64; 2]>> {
    let mut segments = Vec::new();
    let mut current = Vec::new();
    for (i, bucket) in trend.iter().enumerate() {
        match bucket.avg_inventory {
            Some(v) => current.push([i as f64, v]),
            None if !current.is_empty() => segments.push(std::mem::take(&mut current)),
            None => {}
        }
    }
    if !current.is_empty() {
        segments.push(current);
    }
    segments
}
