//! Tabular renderer: payload → xlsx workbook bytes.

use anyhow::{Context, Result};
use rust_xlsxwriter::{Color, Format, Workbook, Worksheet, XlsxError};
use serde_json::Value;

use crate::action::TabularPayload;
use crate::extract::truncate_chars;

/// Hard limit of the target format.
const MAX_SHEET_NAME_CHARS: usize = 31;
/// Cap on auto-sized column widths so one long cell cannot produce a
/// degenerate layout.
const MAX_COLUMN_WIDTH: usize = 50;

pub fn render(payload: &TabularPayload) -> Result<Vec<u8>> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();

    if let Some(title) = payload.title.as_deref() {
        let name = truncate_chars(title.trim(), MAX_SHEET_NAME_CHARS);
        if !name.is_empty() {
            sheet
                .set_name(&name)
                .with_context(|| format!("Invalid sheet name: {}", name))?;
        }
    }

    let header_format = Format::new()
        .set_bold()
        .set_background_color(Color::RGB(0xD9E1F2));

    // Track the widest stringified value per column for auto-sizing.
    let mut widths: Vec<usize> = Vec::new();

    if let Some(headers) = &payload.headers {
        for (col, header) in headers.iter().enumerate() {
            sheet.write_string_with_format(0, col as u16, header, &header_format)?;
            note_width(&mut widths, col, header.chars().count());
        }
    }

    let start_row = if payload.headers.is_some() { 1u32 } else { 0 };
    for (r, row) in payload.rows.iter().enumerate() {
        for (c, cell) in row.iter().enumerate() {
            write_cell(sheet, start_row + r as u32, c as u16, cell)?;
            note_width(&mut widths, c, cell_display(cell).chars().count());
        }
    }

    for (col, width) in widths.iter().enumerate() {
        if *width > 0 {
            sheet.set_column_width(col as u16, (*width).min(MAX_COLUMN_WIDTH) as f64)?;
        }
    }

    workbook
        .save_to_buffer()
        .context("Failed to serialize workbook")
}

fn write_cell(sheet: &mut Worksheet, row: u32, col: u16, cell: &Value) -> Result<(), XlsxError> {
    match cell {
        Value::Null => {}
        Value::Bool(b) => {
            sheet.write_boolean(row, col, *b)?;
        }
        Value::Number(n) => {
            sheet.write_number(row, col, n.as_f64().unwrap_or(0.0))?;
        }
        Value::String(s) => {
            sheet.write_string(row, col, s)?;
        }
        other => {
            sheet.write_string(row, col, other.to_string())?;
        }
    }
    Ok(())
}

fn cell_display(cell: &Value) -> String {
    match cell {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn note_width(widths: &mut Vec<usize>, col: usize, width: usize) {
    if widths.len() <= col {
        widths.resize(col + 1, 0);
    }
    if widths[col] < width {
        widths[col] = width;
    }
}
