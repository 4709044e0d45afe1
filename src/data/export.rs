use chrono::NaiveDate;
use rust_xlsxwriter::{Format, Workbook, Worksheet, XlsxError};

use super::error::ExportError;
use super::filter::FilteredView;
use super::model::{Record, COLUMN_HEADERS};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Xlsx,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Xlsx => "xlsx",
        }
    }
}

/// `{stem}_{YYYYMMDD}.{ext}`
pub fn file_name(stem: &str, date: NaiveDate, format: ExportFormat) -> String {
    format!("{stem}_{}.{}", date.format("%Y%m%d"), format.extension())
}

/// Serialize the view in the requested format.
pub fn encode(
    view: &FilteredView,
    format: ExportFormat,
    sheet_name: &str,
) -> Result<Vec<u8>, ExportError> {
    match format {
        ExportFormat::Csv => to_csv(view),
        ExportFormat::Xlsx => to_xlsx(view, sheet_name),
    }
}

/// Text of every column, in [`COLUMN_HEADERS`] order.
fn fields(r: &Record) -> [String; 10] {
    [
        r.date.format("%Y-%m-%d").to_string(),
        r.region.clone(),
        r.product.clone(),
        r.channel.clone(),
        r.category.clone(),
        r.lab.clone(),
        r.salesperson.clone(),
        r.sales_amount.to_string(),
        r.units.to_string(),
        r.inventory.to_string(),
    ]
}

// ---------------------------------------------------------------------------
// CSV
// ---------------------------------------------------------------------------

/// Comma-separated UTF-8 with the source header row, rows in view order.
pub fn to_csv(view: &FilteredView) -> Result<Vec<u8>, ExportError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record(COLUMN_HEADERS)
        .map_err(|e| ExportError::encoding(format!("CSV header: {e}")))?;
    for (i, r) in view.records().enumerate() {
        writer
            .write_record(fields(r))
            .map_err(|e| ExportError::encoding(format!("CSV row {}: {e}", i + 1)))?;
    }
    writer
        .into_inner()
        .map_err(|e| ExportError::encoding(format!("flushing CSV: {e}")))
}

// ---------------------------------------------------------------------------
// XLSX
// ---------------------------------------------------------------------------

/// Columns written as numeric cells: Ventas, Unidades, Inventario.
const FIRST_NUMERIC_COLUMN: u16 = 7;

/// Single-sheet workbook with a bold, frozen header row. Numbers are numeric
/// cells; text and dates are strings.
pub fn to_xlsx(view: &FilteredView, sheet_name: &str) -> Result<Vec<u8>, ExportError> {
    let mut workbook = Workbook::new();
    let header = Format::new().set_bold();
    let sheet = workbook.add_worksheet();
    sheet
        .set_name(sheet_name)
        .map_err(|e| ExportError::encoding(format!("sheet name '{sheet_name}': {e}")))?;

    for (col, title) in (0u16..).zip(COLUMN_HEADERS) {
        sheet
            .write_string_with_format(0, col, title, &header)
            .map_err(|e| ExportError::encoding(format!("header: {e}")))?;
    }
    sheet
        .set_freeze_panes(1, 0)
        .map_err(|e| ExportError::encoding(format!("header: {e}")))?;

    for (i, r) in view.records().enumerate() {
        let row = u32::try_from(i + 1).map_err(|_| {
            ExportError::encoding(format!("{} rows do not fit in one worksheet", view.len()))
        })?;
        write_row(sheet, row, r)
            .map_err(|e| ExportError::encoding(format!("row {}: {e}", i + 1)))?;
    }

    workbook
        .save_to_buffer()
        .map_err(|e| ExportError::encoding(format!("closing workbook: {e}")))
}

fn write_row(sheet: &mut Worksheet, row: u32, r: &Record) -> Result<(), XlsxError> {
    for (col, text) in (0u16..).zip(fields(r).iter().take(FIRST_NUMERIC_COLUMN as usize)) {
        sheet.write_string(row, col, text)?;
    }
    sheet.write_number(row, FIRST_NUMERIC_COLUMN, r.sales_amount)?;
    sheet.write_number(row, FIRST_NUMERIC_COLUMN + 1, r.units as f64)?;
    sheet.write_number(row, FIRST_NUMERIC_COLUMN + 2, r.inventory)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::filter::{apply, FilterState};
    use crate::data::loader::read_csv;
    use crate::data::model::tests::{date, lima_dataset, record};
    use crate::data::model::Dataset;
    use std::io::{Cursor, Read};
    use std::sync::Arc;
    use zip::ZipArchive;

    fn full_view(ds: Dataset) -> FilteredView {
        let ds = Arc::new(ds);
        apply(&ds, &FilterState::full(&ds)).view.unwrap()
    }

    /// Workbook, worksheet and shared-string parts of an XLSX file.
    fn parts_of(bytes: Vec<u8>) -> (String, String, String) {
        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        let mut read = |name: &str| {
            let mut s = String::new();
            archive.by_name(name).unwrap().read_to_string(&mut s).unwrap();
            s
        };
        (
            read("xl/workbook.xml"),
            read("xl/worksheets/sheet1.xml"),
            read("xl/sharedStrings.xml"),
        )
    }

    #[test]
    fn csv_round_trips_through_the_loader() {
        let mut rows = vec![
            record("2024-01-02", "Lima", 1234.5678, 7),
            record("2024-01-01", "Cusco", 0.1, 0),
        ];
        rows[0].product = "Jarabe, 120ml \"infantil\"".to_string();
        rows[1].inventory = 33.25;
        rows[1].region = "ßa".to_string();
        let view = full_view(Dataset::from_records(rows).unwrap());

        let bytes = to_csv(&view).unwrap();
        let text = String::from_utf8(bytes.clone()).unwrap();
        assert!(text.starts_with(
            "Fecha,Región,Producto,Canal,Categoría,Laboratorio,Vendedor,Ventas,Unidades,Inventario\n"
        ));

        let reparsed = read_csv(bytes.as_slice()).unwrap();
        let original: Vec<&Record> = view.records().collect();
        assert_eq!(reparsed.len(), original.len());
        for (a, b) in reparsed.records().iter().zip(original) {
            assert_eq!(a, b);
        }
    }

    #[test]
    fn xlsx_has_one_sheet_with_every_row() {
        let view = full_view(lima_dataset());
        let (workbook, sheet, strings) = parts_of(to_xlsx(&view, "DatosFarmaceuticos").unwrap());

        assert!(workbook.contains(r#"<sheet name="DatosFarmaceuticos""#));
        assert_eq!(sheet.matches("<row ").count(), 4);
        for header in COLUMN_HEADERS {
            assert!(strings.contains(&format!("<t>{header}</t>")), "{header}");
        }
        assert!(strings.contains("<t>2024-01-01</t>"));
        assert!(strings.contains("<t>Lima</t>"));
        assert!(sheet.contains("<v>300</v>"));
        assert!(sheet.contains("<v>20</v>"));
    }

    #[test]
    fn xlsx_escapes_markup() {
        let mut row = record("2024-01-01", "Lima", 1.0, 1);
        row.lab = "Johnson & Johnson <PE>".to_string();
        let view = full_view(Dataset::from_records(vec![row]).unwrap());
        let (_, _, strings) = parts_of(to_xlsx(&view, "Datos").unwrap());
        assert!(strings.contains("Johnson &amp; Johnson &lt;PE&gt;"));
    }

    #[test]
    fn oversized_cells_are_encoding_errors() {
        let mut row = record("2024-01-01", "Lima", 1.0, 1);
        row.product = "x".repeat(40_000);
        let view = full_view(Dataset::from_records(vec![row]).unwrap());
        match to_xlsx(&view, "Datos") {
            Err(ExportError::Encoding { message }) => {
                assert!(message.contains("row 1"), "{message}");
            }
            Ok(_) => panic!("expected an encoding error"),
        }
        // CSV has no cell limit
        assert!(to_csv(&view).is_ok());
    }

    #[test]
    fn bad_sheet_names_are_rejected() {
        let view = full_view(lima_dataset());
        for name in ["", "Ventas/2024", &"x".repeat(32), "'Ventas'"] {
            assert!(
                matches!(to_xlsx(&view, name), Err(ExportError::Encoding { .. })),
                "{name:?}"
            );
        }
    }

    #[test]
    fn file_names_embed_the_date() {
        let d = date("2025-03-09");
        assert_eq!(
            file_name("datos_farmaceuticos", d, ExportFormat::Csv),
            "datos_farmaceuticos_20250309.csv"
        );
        assert_eq!(
            file_name("datos_farmaceuticos", d, ExportFormat::Xlsx),
            "datos_farmaceuticos_20250309.xlsx"
        );
    }

    #[test]
    fn encode_dispatches_by_format() {
        let view = full_view(lima_dataset());
        let csv = encode(&view, ExportFormat::Csv, "Datos").unwrap();
        assert!(csv.starts_with(b"Fecha,"));
        let xlsx = encode(&view, ExportFormat::Xlsx, "Datos").unwrap();
        assert!(xlsx.starts_with(b"PK"));
    }
}
