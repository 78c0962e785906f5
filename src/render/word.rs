//! Word-processing renderer: payload → docx bytes.

use anyhow::{anyhow, Result};
use docx_rs::{
    AbstractNumbering, AlignmentType, Docx, IndentLevel, Level, LevelJc, LevelText, NumberFormat,
    Numbering, NumberingId, Paragraph, Run, Start, Table, TableCell, TableRow,
};
use serde_json::Value;

use crate::action::{TableBlock, WordPayload};

const BULLET_NUMBERING: usize = 1;

// Run sizes are half-points.
const TITLE_SIZE: usize = 40;
const BODY_SIZE: usize = 22;

pub fn render(payload: &WordPayload) -> Result<Vec<u8>> {
    let mut docx = Docx::new()
        .add_abstract_numbering(AbstractNumbering::new(BULLET_NUMBERING).add_level(Level::new(
            0,
            Start::new(1),
            NumberFormat::new("bullet"),
            LevelText::new("•"),
            LevelJc::new("left"),
        )))
        .add_numbering(Numbering::new(BULLET_NUMBERING, BULLET_NUMBERING));

    if let Some(title) = payload.title.as_deref() {
        docx = docx.add_paragraph(
            Paragraph::new()
                .add_run(Run::new().add_text(title).size(TITLE_SIZE).bold())
                .align(AlignmentType::Center),
        );
    }

    for section in &payload.sections {
        if let Some(heading) = section.heading.as_deref() {
            let level = section.level.unwrap_or(1);
            docx = docx.add_paragraph(
                Paragraph::new().add_run(Run::new().add_text(heading).size(heading_size(level)).bold()),
            );
        }
        if let Some(content) = section.content.as_deref() {
            docx = docx
                .add_paragraph(Paragraph::new().add_run(Run::new().add_text(content).size(BODY_SIZE)));
        }
        for bullet in &section.bullets {
            docx = docx.add_paragraph(
                Paragraph::new()
                    .add_run(Run::new().add_text(bullet).size(BODY_SIZE))
                    .numbering(NumberingId::new(BULLET_NUMBERING), IndentLevel::new(0)),
            );
        }
    }

    // A bare top-level paragraph only applies when no sections were given.
    if payload.sections.is_empty() {
        if let Some(content) = payload.content.as_deref() {
            docx = docx
                .add_paragraph(Paragraph::new().add_run(Run::new().add_text(content).size(BODY_SIZE)));
        }
    }

    if let Some(table) = &payload.table {
        docx = docx.add_table(build_table(table));
    }

    let mut bytes = Vec::new();
    docx.build()
        .pack(&mut std::io::Cursor::new(&mut bytes))
        .map_err(|e| anyhow!("Failed to generate DOCX: {}", e))?;
    Ok(bytes)
}

fn heading_size(level: u32) -> usize {
    match level {
        0 | 1 => 32,
        2 => 28,
        _ => 24,
    }
}

/// Grid table: header row first, then data rows.
fn build_table(table: &TableBlock) -> Table {
    let mut rows = Vec::new();

    if !table.headers.is_empty() {
        let cells = table
            .headers
            .iter()
            .map(|h| {
                TableCell::new()
                    .add_paragraph(Paragraph::new().add_run(Run::new().add_text(h).size(BODY_SIZE).bold()))
            })
            .collect();
        rows.push(TableRow::new(cells));
    }

    for row in &table.rows {
        let cells = row
            .iter()
            .map(|cell| {
                TableCell::new().add_paragraph(
                    Paragraph::new().add_run(Run::new().add_text(scalar_text(cell)).size(BODY_SIZE)),
                )
            })
            .collect();
        rows.push(TableRow::new(cells));
    }

    Table::new(rows)
}

fn scalar_text(cell: &Value) -> String {
    match cell {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::WordSection;
    use crate::extract::{element_blocks, inline_text};
    use std::io::Read;

    fn document_xml(bytes: &[u8]) -> String {
        let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes.to_vec())).unwrap();
        let mut xml = String::new();
        archive
            .by_name("word/document.xml")
            .unwrap()
            .read_to_string(&mut xml)
            .unwrap();
        xml
    }

    #[test]
    fn sections_render_in_order_with_all_parts() {
        let payload = WordPayload {
            title: Some("График работы".to_string()),
            sections: vec![
                WordSection {
                    heading: Some("Неделя 1".to_string()),
                    level: Some(2),
                    content: Some("Описание недели.".to_string()),
                    bullets: vec!["Пн: Иванов".to_string(), "Вт: Петров".to_string()],
                },
                WordSection {
                    heading: None,
                    level: None,
                    content: Some("Только абзац.".to_string()),
                    bullets: Vec::new(),
                },
            ],
            content: Some("игнорируется при наличии секций".to_string()),
            table: None,
        };

        let xml = document_xml(&render(&payload).unwrap());
        let text = inline_text(&xml, "w:t");
        assert!(text.contains("График работы"));
        assert!(text.contains("Неделя 1"));
        assert!(text.contains("Пн: Иванов"));
        assert!(text.contains("Только абзац."));
        assert!(!text.contains("игнорируется"));

        // Order: title before first heading before bullets.
        let title_pos = text.find("График работы").unwrap();
        let heading_pos = text.find("Неделя 1").unwrap();
        let bullet_pos = text.find("Пн: Иванов").unwrap();
        assert!(title_pos < heading_pos && heading_pos < bullet_pos);
    }

    #[test]
    fn bare_content_renders_without_sections() {
        let payload = WordPayload {
            title: None,
            sections: Vec::new(),
            content: Some("Единственный абзац.".to_string()),
            table: None,
        };

        let xml = document_xml(&render(&payload).unwrap());
        assert!(inline_text(&xml, "w:t").contains("Единственный абзац."));
    }

    #[test]
    fn table_renders_header_row_first() {
        let payload = WordPayload {
            title: None,
            sections: Vec::new(),
            content: None,
            table: Some(TableBlock {
                headers: vec!["Имя".to_string(), "Смена".to_string()],
                rows: vec![vec!["Иванов".into(), 1.into()]],
            }),
        };

        let xml = document_xml(&render(&payload).unwrap());
        let tables = element_blocks(&xml, "w:tbl");
        assert_eq!(tables.len(), 1);

        let rows = element_blocks(tables[0], "w:tr");
        assert_eq!(rows.len(), 2);
        assert!(inline_text(rows[0], "w:t").contains("Имя"));
        assert!(inline_text(rows[1], "w:t").contains("Иванов"));
        assert!(inline_text(rows[1], "w:t").contains('1'));
    }
}
