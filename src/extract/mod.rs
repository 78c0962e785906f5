//! Content extraction: converts stored documents into bounded plain text.
//!
//! Extraction never fails past this module. Any per-format error (corrupt
//! file, malformed structure) is converted into a human-readable placeholder
//! string that is stored as the extracted content, so the model and the UI
//! always have something to display.

use anyhow::{anyhow, Context, Result};
use calamine::{open_workbook_auto, Data, Reader};
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use crate::config::ExtractionLimits;
use crate::types::DocumentKind;

/// Sentinel stored for files whose declared type is outside the supported set.
pub const UNSUPPORTED_TYPE: &str = "Unsupported file type";

/// Extract normalized text from a stored document.
///
/// Deterministic: the same file and declared kind always produce identical
/// output. The result is bounded by the per-format caps in `limits`; the
/// caller applies the overall storage budget before persisting.
pub fn extract(path: &Path, kind: DocumentKind, limits: &ExtractionLimits) -> String {
    let result = match kind {
        DocumentKind::Tabular | DocumentKind::LegacyTabular => extract_workbook(path, limits),
        DocumentKind::Word => extract_word(path),
        DocumentKind::SlideDeck => extract_slides(path),
        DocumentKind::Pdf => extract_pdf(path, limits),
        DocumentKind::PlainText => extract_plain_text(path, limits),
        DocumentKind::Unsupported => return UNSUPPORTED_TYPE.to_string(),
    };

    match result {
        Ok(text) => text,
        Err(e) => {
            tracing::warn!(path = %path.display(), kind = ?kind, error = %e, "Extraction failed");
            format!("Error reading {} file: {:#}", kind.error_label(), e)
        }
    }
}

/// Walk every sheet, joining cell values with `" | "` per row. Row iteration
/// is capped per sheet; earlier rows win.
fn extract_workbook(path: &Path, limits: &ExtractionLimits) -> Result<String> {
    let mut workbook = open_workbook_auto(path)
        .with_context(|| format!("Failed to open spreadsheet: {}", path.display()))?;

    let sheet_names: Vec<String> = workbook.sheet_names().to_vec();
    if sheet_names.is_empty() {
        return Err(anyhow!("Spreadsheet has no sheets: {}", path.display()));
    }

    let mut content = Vec::new();
    for sheet_name in &sheet_names {
        let range = match workbook.worksheet_range(sheet_name) {
            Ok(r) => r,
            Err(_) => continue,
        };

        content.push(format!("Sheet: {}", sheet_name));
        for row in range.rows().take(limits.max_rows_per_sheet) {
            let cells: Vec<String> = row.iter().map(cell_to_string).collect();
            content.push(cells.join(" | "));
        }
        content.push(String::new());
    }

    Ok(content.join("\n"))
}

/// Paragraph text in document order, then a `[Table]` marker and pipe-joined
/// cell text for each embedded table.
fn extract_word(path: &Path) -> Result<String> {
    let xml = read_archive_entry(path, "word/document.xml")?;
    let (narrative, tables) = split_out_tables(&xml);

    let mut content = Vec::new();
    for para in element_blocks(&narrative, "w:p") {
        let text = inline_text(para, "w:t");
        if !text.trim().is_empty() {
            content.push(text);
        }
    }

    for table in &tables {
        content.push("\n[Table]".to_string());
        for row in element_blocks(table, "w:tr") {
            let cells: Vec<String> = element_blocks(row, "w:tc")
                .iter()
                .map(|cell| inline_text(cell, "w:t"))
                .collect();
            content.push(cells.join(" | "));
        }
    }

    if content.is_empty() {
        return Err(anyhow!("DOCX contains no extractable text: {}", path.display()));
    }

    Ok(content.join("\n"))
}

/// Per slide: index, resolved layout name, and a 200-char prefix of every
/// text-bearing shape.
fn extract_slides(path: &Path) -> Result<String> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open PPTX: {}", path.display()))?;
    let mut archive = zip::ZipArchive::new(file)
        .with_context(|| format!("Failed to read PPTX as ZIP: {}", path.display()))?;

    let mut slides: Vec<(usize, String)> = Vec::new();
    let mut support: HashMap<String, String> = HashMap::new();

    for i in 0..archive.len() {
        let mut entry = match archive.by_index(i) {
            Ok(e) => e,
            Err(_) => continue,
        };
        let name = entry.name().to_string();

        let is_slide = name.starts_with("ppt/slides/slide") && name.ends_with(".xml");
        let is_slide_rels = name.starts_with("ppt/slides/_rels/") && name.ends_with(".xml.rels");
        let is_layout = name.starts_with("ppt/slideLayouts/slideLayout") && name.ends_with(".xml");
        if !(is_slide || is_slide_rels || is_layout) {
            continue;
        }

        let mut xml = String::new();
        if entry.read_to_string(&mut xml).is_err() {
            continue;
        }

        if is_slide {
            let num = name
                .trim_start_matches("ppt/slides/slide")
                .trim_end_matches(".xml")
                .parse::<usize>()
                .unwrap_or(0);
            slides.push((num, xml));
        } else {
            support.insert(name, xml);
        }
    }

    if slides.is_empty() {
        return Err(anyhow!("PPTX contains no slides: {}", path.display()));
    }
    slides.sort_by_key(|(num, _)| *num);

    let mut content = Vec::new();
    for (num, xml) in &slides {
        content.push(format!("--- Slide {} ---", num));
        content.push(format!("Layout: {}", resolve_layout_name(*num, &support)));
        for shape in element_blocks(xml, "p:sp") {
            let Some((body_start, body_end)) = find_element_block(shape, 0, "p:txBody") else {
                continue;
            };
            let body = &shape[body_start..body_end];
            let text = element_blocks(body, "a:p")
                .iter()
                .map(|para| inline_text(para, "a:t"))
                .filter(|t| !t.is_empty())
                .collect::<Vec<_>>()
                .join("\n");
            if !text.trim().is_empty() {
                content.push(truncate_chars(&text, 200));
            }
        }
    }

    Ok(content.join("\n"))
}

/// Layout name for a slide: follow its relationships to the layout part and
/// read the `<p:cSld name="...">` attribute. Sentinel when anything along
/// the chain is missing.
fn resolve_layout_name(slide_num: usize, support: &HashMap<String, String>) -> String {
    let rels_name = format!("ppt/slides/_rels/slide{}.xml.rels", slide_num);
    let Some(rels) = support.get(&rels_name) else {
        return "(no layout)".to_string();
    };

    let Some(idx) = rels.find("slideLayouts/slideLayout") else {
        return "(no layout)".to_string();
    };
    let tail = &rels[idx..];
    let Some(end) = tail.find('"') else {
        return "(no layout)".to_string();
    };
    let layout_file = format!("ppt/{}", &tail[..end]);

    let Some(layout_xml) = support.get(&layout_file) else {
        return "(no layout)".to_string();
    };

    attribute_value(layout_xml, "p:cSld", "name").unwrap_or_else(|| {
        layout_file
            .trim_start_matches("ppt/slideLayouts/")
            .trim_end_matches(".xml")
            .to_string()
    })
}

/// Page count line, then per-page text for a capped number of leading pages,
/// each page truncated to its character budget. Falls back to whole-document
/// extraction when the content streams yield nothing.
fn extract_pdf(path: &Path, limits: &ExtractionLimits) -> Result<String> {
    let doc = lopdf::Document::load(path)
        .with_context(|| format!("Failed to load PDF: {}", path.display()))?;

    let pages = doc.get_pages();
    let mut content = vec![format!("Pages: {}", pages.len())];
    let mut found_text = false;

    for page_number in pages.keys().take(limits.max_pdf_pages) {
        let text = match doc.extract_text(&[*page_number]) {
            Ok(t) => t,
            Err(_) => continue,
        };
        let trimmed = text.trim();
        if trimmed.is_empty() {
            continue;
        }
        found_text = true;
        content.push(truncate_chars(trimmed, limits.max_pdf_page_chars));
    }

    if !found_text {
        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read PDF: {}", path.display()))?;
        if let Ok(text) = pdf_extract::extract_text_from_mem(&bytes) {
            let cleaned = text
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .collect::<Vec<_>>()
                .join("\n");
            if !cleaned.is_empty() {
                content.push(truncate_chars(
                    &cleaned,
                    limits.max_pdf_pages * limits.max_pdf_page_chars,
                ));
            }
        }
    }

    Ok(content.join("\n"))
}

fn extract_plain_text(path: &Path, limits: &ExtractionLimits) -> Result<String> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read text file: {}", path.display()))?;

    let text = match String::from_utf8(bytes) {
        Ok(t) => t,
        // Latin-1 fallback: every byte maps to exactly one char.
        Err(e) => e.into_bytes().iter().map(|&b| b as char).collect(),
    };

    Ok(truncate_chars(&text, limits.max_text_chars))
}

/// Convert a calamine cell to a clean string representation. Empty cells
/// become empty strings, not "None".
fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => {
            if f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
                (*f as i64).to_string()
            } else {
                format!("{:.4}", f)
                    .trim_end_matches('0')
                    .trim_end_matches('.')
                    .to_string()
            }
        }
        Data::Bool(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
        Data::Error(e) => format!("#ERR:{:?}", e),
        Data::DateTime(dt) => dt.to_string(),
        Data::DateTimeIso(s) => s.clone(),
        Data::DurationIso(s) => s.clone(),
    }
}

/// Character-boundary-safe prefix truncation.
pub(crate) fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

fn read_archive_entry(path: &Path, entry_name: &str) -> Result<String> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    let mut archive = zip::ZipArchive::new(file)
        .with_context(|| format!("Failed to read {} as ZIP", path.display()))?;

    let mut content = String::new();
    archive
        .by_name(entry_name)
        .with_context(|| format!("Archive missing {}: {}", entry_name, path.display()))?
        .read_to_string(&mut content)
        .with_context(|| format!("Failed to read {} from archive", entry_name))?;
    Ok(content)
}

// ── XML scanning helpers ──────────────────────────────────────────────────
//
// OOXML parts are scanned with plain string searches rather than a full XML
// parser: the documents are machine-written, and only element text and a few
// attributes are needed.

/// Find the next `<tag ...>...</tag>` block at or after `from`. Returns the
/// byte range including both tags. Matches tag boundaries so `w:tbl` does
/// not match `w:tblPr`. Nested same-name elements are not balanced.
pub(crate) fn find_element_block(xml: &str, from: usize, tag: &str) -> Option<(usize, usize)> {
    let open = format!("<{}", tag);
    let close = format!("</{}>", tag);
    let mut pos = from;
    loop {
        let rel = xml[pos..].find(&open)?;
        let start = pos + rel;
        let after = start + open.len();
        match xml.as_bytes().get(after) {
            Some(b'>') | Some(b' ') | Some(b'/') | Some(b'\r') | Some(b'\n') | Some(b'\t') => {
                let tag_close = xml[start..].find('>').map(|i| start + i)?;
                if xml.as_bytes()[tag_close - 1] == b'/' {
                    // Self-closing element
                    return Some((start, tag_close + 1));
                }
                let end = xml[tag_close..]
                    .find(&close)
                    .map(|i| tag_close + i + close.len())
                    .unwrap_or(xml.len());
                return Some((start, end));
            }
            _ => pos = after,
        }
    }
}

/// All `<tag>...</tag>` blocks of the input, in order.
pub(crate) fn element_blocks<'a>(xml: &'a str, tag: &str) -> Vec<&'a str> {
    let mut blocks = Vec::new();
    let mut pos = 0;
    while let Some((start, end)) = find_element_block(xml, pos, tag) {
        blocks.push(&xml[start..end]);
        pos = end;
    }
    blocks
}

/// Concatenated, unescaped text content of every `<tag>` element inside the
/// input.
pub(crate) fn inline_text(xml: &str, tag: &str) -> String {
    let close = format!("</{}>", tag);
    let mut out = String::new();
    let mut pos = 0;
    while let Some((start, end)) = find_element_block(xml, pos, tag) {
        let block = &xml[start..end];
        if let Some(content_start) = block.find('>') {
            if block.ends_with(close.as_str()) {
                let content = &block[content_start + 1..block.len() - close.len()];
                out.push_str(&xml_unescape(content));
            }
        }
        pos = end;
    }
    out
}

/// Value of `attr` on the first `<tag ...>` element, if present.
pub(crate) fn attribute_value(xml: &str, tag: &str, attr: &str) -> Option<String> {
    let (start, _) = find_element_block(xml, 0, tag)?;
    let tag_close = xml[start..].find('>')? + start;
    let open_tag = &xml[start..tag_close];
    let needle = format!("{}=\"", attr);
    let attr_start = open_tag.find(&needle)? + needle.len();
    let attr_end = open_tag[attr_start..].find('"')? + attr_start;
    Some(xml_unescape(&open_tag[attr_start..attr_end]))
}

fn xml_unescape(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;

    fn limits() -> ExtractionLimits {
        AppConfig::default().extraction
    }

    #[test]
    fn unsupported_kind_yields_sentinel() {
        let out = extract(Path::new("/nonexistent"), DocumentKind::Unsupported, &limits());
        assert_eq!(out, UNSUPPORTED_TYPE);
    }

    #[test]
    fn missing_file_degrades_to_error_marker() {
        let out = extract(Path::new("/nonexistent.xlsx"), DocumentKind::Tabular, &limits());
        assert!(out.starts_with("Error reading Excel file:"));
    }

    #[test]
    fn plain_text_is_truncated_to_exact_budget() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big.txt");
        std::fs::write(&path, "a".repeat(25_000)).unwrap();

        let out = extract(&path, DocumentKind::PlainText, &limits());
        assert_eq!(out.chars().count(), limits().max_text_chars);
    }

    #[test]
    fn plain_text_falls_back_to_latin1() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("legacy.txt");
        // 0xE9 is 'é' in Latin-1 and invalid as a standalone UTF-8 byte.
        std::fs::write(&path, [b'c', b'a', b'f', 0xE9]).unwrap();

        let out = extract(&path, DocumentKind::PlainText, &limits());
        assert_eq!(out, "café");
    }

    #[test]
    fn extraction_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("note.txt");
        std::fs::write(&path, "same content every time").unwrap();

        let first = extract(&path, DocumentKind::PlainText, &limits());
        let second = extract(&path, DocumentKind::PlainText, &limits());
        assert_eq!(first, second);
    }

    #[test]
    fn workbook_rows_are_capped_per_sheet() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rows.xlsx");

        let mut workbook = rust_xlsxwriter::Workbook::new();
        let sheet = workbook.add_worksheet();
        for row in 0..150u32 {
            sheet.write_string(row, 0, format!("value {}", row)).unwrap();
        }
        workbook.save(&path).unwrap();

        let out = extract(&path, DocumentKind::Tabular, &limits());
        let data_rows = out.lines().filter(|l| l.starts_with("value ")).count();
        assert_eq!(data_rows, limits().max_rows_per_sheet);
        // Earlier rows win.
        assert!(out.contains("value 0"));
        assert!(!out.contains("value 120"));
    }

    #[test]
    fn workbook_empty_cells_join_as_empty_strings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gaps.xlsx");

        let mut workbook = rust_xlsxwriter::Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.write_string(0, 0, "a").unwrap();
        sheet.write_string(0, 2, "c").unwrap();
        workbook.save(&path).unwrap();

        let out = extract(&path, DocumentKind::Tabular, &limits());
        assert!(out.contains("a |  | c"), "got: {}", out);
    }

    #[test]
    fn pdf_pages_are_capped_with_page_count_reported() {
        use lopdf::content::{Content, Operation};
        use lopdf::{dictionary, Document, Object, Stream};

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("long.pdf");

        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut kids: Vec<Object> = Vec::new();
        for page in 1..=30 {
            let content = Content {
                operations: vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F1".into(), 12.into()]),
                    Operation::new("Td", vec![50.into(), 700.into()]),
                    Operation::new("Tj", vec![Object::string_literal(format!("Page {}", page))]),
                    Operation::new("ET", vec![]),
                ],
            };
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            kids.push(page_id.into());
        }

        let page_count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => page_count,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc.save(&path).unwrap();

        let out = extract(&path, DocumentKind::Pdf, &limits());
        assert!(out.starts_with("Pages: 30"), "got: {}", &out[..out.len().min(60)]);
        assert!(out.contains("Page 1"));
        assert!(out.contains("Page 20"));
        assert!(!out.contains("Page 21"));
    }

    #[test]
    fn slide_decks_report_index_layout_and_shape_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deck.pptx");

        let payload = crate::action::DeckPayload {
            slides: vec![
                crate::action::SlideSpec {
                    slide_type: Some("title".to_string()),
                    title: Some("Заголовок".to_string()),
                    subtitle: Some("Подзаголовок".to_string()),
                    ..Default::default()
                },
                crate::action::SlideSpec {
                    title: Some("Второй слайд".to_string()),
                    bullets: Some(vec!["тезис".to_string()]),
                    ..Default::default()
                },
            ],
        };
        std::fs::write(&path, crate::render::deck::render(&payload).unwrap()).unwrap();

        let out = extract(&path, DocumentKind::SlideDeck, &limits());
        assert!(out.contains("--- Slide 1 ---"));
        assert!(out.contains("Layout: Title Slide"));
        assert!(out.contains("Заголовок"));
        assert!(out.contains("--- Slide 2 ---"));
        assert!(out.contains("Layout: Title and Content"));
        assert!(out.contains("тезис"));
    }

    #[test]
    fn docx_paragraphs_and_tables_are_scanned() {
        let xml = r#"<w:document><w:body>
            <w:p><w:r><w:t>First paragraph</w:t></w:r></w:p>
            <w:p><w:pPr></w:pPr><w:r><w:t xml:space="preserve">Second </w:t></w:r><w:r><w:t>half</w:t></w:r></w:p>
            <w:tbl><w:tr><w:tc><w:p><w:r><w:t>A1</w:t></w:r></w:p></w:tc><w:tc><w:p><w:r><w:t>B1</w:t></w:r></w:p></w:tc></w:tr></w:tbl>
        </w:body></w:document>"#;

        let (narrative, tables) = split_out_tables(xml);
        assert_eq!(tables.len(), 1);

        let paras: Vec<String> = element_blocks(&narrative, "w:p")
            .iter()
            .map(|p| inline_text(p, "w:t"))
            .collect();
        assert_eq!(paras, vec!["First paragraph", "Second half"]);

        let rows = element_blocks(&tables[0], "w:tr");
        assert_eq!(rows.len(), 1);
        let cells: Vec<String> = element_blocks(rows[0], "w:tc")
            .iter()
            .map(|c| inline_text(c, "w:t"))
            .collect();
        assert_eq!(cells, vec!["A1", "B1"]);
    }

    #[test]
    fn inline_text_unescapes_entities_and_skips_empty_elements() {
        let xml = "<a:p><a:r><a:t>x &amp; y</a:t></a:r><a:r><a:t/></a:r></a:p>";
        assert_eq!(inline_text(xml, "a:t"), "x & y");
    }

    #[test]
    fn element_boundary_does_not_match_prefixed_tags() {
        let xml = "<w:tblPr>junk</w:tblPr><w:tbl><w:tr/></w:tbl>";
        let (start, end) = find_element_block(xml, 0, "w:tbl").unwrap();
        assert_eq!(&xml[start..end], "<w:tbl><w:tr/></w:tbl>");
    }
}
