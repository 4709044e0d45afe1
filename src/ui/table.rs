use eframe::egui::{RichText, Ui};
use egui_extras::{Column, TableBuilder};

use crate::data::aggregate::AggregateResult;
use crate::data::export::ExportFormat;
use crate::data::model::COLUMN_HEADERS;
use crate::state::AppState;
use crate::ui::format::{format_money, format_number};

// ---------------------------------------------------------------------------
// Data & export tab
// ---------------------------------------------------------------------------

pub fn data_tab(ui: &mut Ui, state: &mut AppState, agg: &AggregateResult) {
    ui.label(RichText::new(format!("Total records: {}", format_number(agg.rows as f64, 0))).strong());
    ui.label(format!(
        "Period: {} - {}",
        agg.period.0.format("%d/%m/%Y"),
        agg.period.1.format("%d/%m/%Y")
    ));

    ui.horizontal(|ui: &mut Ui| {
        if ui.button("Download as CSV").clicked() {
            save_dialog(state, ExportFormat::Csv);
        }
        if ui.button("Download as Excel").clicked() {
            save_dialog(state, ExportFormat::Xlsx);
        }
    });
    ui.separator();

    let Some(view) = &state.view else {
        return;
    };
    let rows = view.newest_first();

    TableBuilder::new(ui)
        .striped(true)
        .resizable(true)
        .columns(Column::auto().at_least(70.0), COLUMN_HEADERS.len())
        .header(20.0, |mut header| {
            for name in COLUMN_HEADERS {
                header.col(|ui: &mut Ui| {
                    ui.strong(name);
                });
            }
        })
        .body(|body| {
            body.rows(18.0, rows.len(), |mut row| {
                let r = rows[row.index()];
                let cells = [
                    r.date.format("%Y-%m-%d").to_string(),
                    r.region.clone(),
                    r.product.clone(),
                    r.channel.clone(),
                    r.category.clone(),
                    r.lab.clone(),
                    r.salesperson.clone(),
                    format_money(r.sales_amount),
                    format_number(r.units as f64, 0),
                    format_number(r.inventory, 0),
                ];
                for text in cells {
                    row.col(|ui: &mut Ui| {
                        ui.label(text);
                    });
                }
            });
        });
}

fn save_dialog(state: &mut AppState, format: ExportFormat) {
    let today = chrono::Local::now().date_naive();
    let (label, ext) = match format {
        ExportFormat::Csv => ("CSV", format.extension()),
        ExportFormat::Xlsx => ("Excel", format.extension()),
    };
    let target = rfd::FileDialog::new()
        .set_title("Export filtered data")
        .set_file_name(state.export_file_name(format, today))
        .add_filter(label, &[ext])
        .save_file();

    if let Some(path) = target {
        if let Err(e) = state.export_to(format, &path) {
            log::error!("Export to {} failed: {e:#}", path.display());
        }
    }
}
