//! Minimal OOXML presentation package parts.
//!
//! The deck renderer works at the package level: a pptx file is a ZIP of XML
//! parts, and both from-scratch generation and template editing are
//! expressed as building or patching those parts. Only the structures this
//! system reads back or fills are modeled; styling beyond the theme defaults
//! is out of scope.

use anyhow::{anyhow, Context, Result};
use std::collections::BTreeMap;
use std::io::{Read, Write};

use crate::extract::find_element_block;

/// Widescreen 16:9 slide size, in EMU.
pub const SLIDE_WIDTH_EMU: u64 = 12_192_000;
pub const SLIDE_HEIGHT_EMU: u64 = 6_858_000;

const XML_DECL: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n";

// ── Package I/O ───────────────────────────────────────────────────────────

/// Read every entry of a pptx archive into a part map.
pub fn read_package(bytes: &[u8]) -> Result<BTreeMap<String, Vec<u8>>> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes.to_vec()))
        .context("Failed to read deck as ZIP")?;

    let mut parts = BTreeMap::new();
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).context("Corrupt ZIP entry")?;
        if entry.is_dir() {
            continue;
        }
        let mut content = Vec::new();
        entry.read_to_end(&mut content)?;
        parts.insert(entry.name().to_string(), content);
    }
    Ok(parts)
}

/// Serialize a part map back into pptx bytes.
pub fn write_package(parts: &BTreeMap<String, Vec<u8>>) -> Result<Vec<u8>> {
    let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default();

    for (name, content) in parts {
        writer.start_file(name.as_str(), options)?;
        writer.write_all(content)?;
    }

    let cursor = writer.finish().context("Failed to finish deck archive")?;
    Ok(cursor.into_inner())
}

// ── Static parts for a from-scratch deck ──────────────────────────────────

pub fn content_types_xml(slide_count: usize) -> String {
    let mut overrides = String::new();
    for i in 1..=slide_count {
        overrides.push_str(&format!(
            "<Override PartName=\"/ppt/slides/slide{}.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.presentationml.slide+xml\"/>",
            i
        ));
    }
    format!(
        "{XML_DECL}<Types xmlns=\"http://schemas.openxmlformats.org/package/2006/content-types\">\
<Default Extension=\"rels\" ContentType=\"application/vnd.openxmlformats-package.relationships+xml\"/>\
<Default Extension=\"xml\" ContentType=\"application/xml\"/>\
<Override PartName=\"/ppt/presentation.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.presentationml.presentation.main+xml\"/>\
<Override PartName=\"/ppt/slideMasters/slideMaster1.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.presentationml.slideMaster+xml\"/>\
<Override PartName=\"/ppt/slideLayouts/slideLayout1.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.presentationml.slideLayout+xml\"/>\
<Override PartName=\"/ppt/slideLayouts/slideLayout2.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.presentationml.slideLayout+xml\"/>\
<Override PartName=\"/ppt/theme/theme1.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.theme+xml\"/>\
{overrides}</Types>"
    )
}

pub fn root_rels_xml() -> String {
    format!(
        "{XML_DECL}<Relationships xmlns=\"http://schemas.openxmlformats.org/package/2006/relationships\">\
<Relationship Id=\"rId1\" Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument\" Target=\"ppt/presentation.xml\"/>\
</Relationships>"
    )
}

/// Presentation part: master list, slide list, widescreen size. Slide `i`
/// is wired to relationship `rId{i+1}` (rId1 is the master).
pub fn presentation_xml(slide_count: usize) -> String {
    let mut slide_ids = String::new();
    for i in 1..=slide_count {
        slide_ids.push_str(&format!("<p:sldId id=\"{}\" r:id=\"rId{}\"/>", 255 + i, i + 1));
    }
    format!(
        "{XML_DECL}<p:presentation xmlns:a=\"http://schemas.openxmlformats.org/drawingml/2006/main\" \
xmlns:r=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships\" \
xmlns:p=\"http://schemas.openxmlformats.org/presentationml/2006/main\">\
<p:sldMasterIdLst><p:sldMasterId id=\"2147483648\" r:id=\"rId1\"/></p:sldMasterIdLst>\
<p:sldIdLst>{slide_ids}</p:sldIdLst>\
<p:sldSz cx=\"{SLIDE_WIDTH_EMU}\" cy=\"{SLIDE_HEIGHT_EMU}\"/>\
<p:notesSz cx=\"6858000\" cy=\"9144000\"/>\
</p:presentation>"
    )
}

pub fn presentation_rels_xml(slide_count: usize) -> String {
    let mut rels = String::from(
        "<Relationship Id=\"rId1\" Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/slideMaster\" Target=\"slideMasters/slideMaster1.xml\"/>",
    );
    for i in 1..=slide_count {
        rels.push_str(&format!(
            "<Relationship Id=\"rId{}\" Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/slide\" Target=\"slides/slide{}.xml\"/>",
            i + 1,
            i
        ));
    }
    format!(
        "{XML_DECL}<Relationships xmlns=\"http://schemas.openxmlformats.org/package/2006/relationships\">{rels}</Relationships>"
    )
}

pub fn slide_master_xml() -> String {
    format!(
        "{XML_DECL}<p:sldMaster xmlns:a=\"http://schemas.openxmlformats.org/drawingml/2006/main\" \
xmlns:r=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships\" \
xmlns:p=\"http://schemas.openxmlformats.org/presentationml/2006/main\">\
<p:cSld><p:spTree>\
<p:nvGrpSpPr><p:cNvPr id=\"1\" name=\"\"/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr/>\
</p:spTree></p:cSld>\
<p:clrMap bg1=\"lt1\" tx1=\"dk1\" bg2=\"lt2\" tx2=\"dk2\" accent1=\"accent1\" accent2=\"accent2\" \
accent3=\"accent3\" accent4=\"accent4\" accent5=\"accent5\" accent6=\"accent6\" hlink=\"hlink\" folHlink=\"folHlink\"/>\
<p:sldLayoutIdLst>\
<p:sldLayoutId id=\"2147483649\" r:id=\"rId1\"/>\
<p:sldLayoutId id=\"2147483650\" r:id=\"rId2\"/>\
</p:sldLayoutIdLst>\
</p:sldMaster>"
    )
}

pub fn slide_master_rels_xml() -> String {
    format!(
        "{XML_DECL}<Relationships xmlns=\"http://schemas.openxmlformats.org/package/2006/relationships\">\
<Relationship Id=\"rId1\" Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/slideLayout\" Target=\"../slideLayouts/slideLayout1.xml\"/>\
<Relationship Id=\"rId2\" Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/slideLayout\" Target=\"../slideLayouts/slideLayout2.xml\"/>\
<Relationship Id=\"rId3\" Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/theme\" Target=\"../theme/theme1.xml\"/>\
</Relationships>"
    )
}

pub fn slide_layout_xml(layout_type: Option<&str>, name: &str) -> String {
    let type_attr = layout_type
        .map(|t| format!(" type=\"{}\"", t))
        .unwrap_or_default();
    format!(
        "{XML_DECL}<p:sldLayout xmlns:a=\"http://schemas.openxmlformats.org/drawingml/2006/main\" \
xmlns:r=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships\" \
xmlns:p=\"http://schemas.openxmlformats.org/presentationml/2006/main\"{type_attr}>\
<p:cSld name=\"{name}\"><p:spTree>\
<p:nvGrpSpPr><p:cNvPr id=\"1\" name=\"\"/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr/>\
</p:spTree></p:cSld>\
<p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr>\
</p:sldLayout>"
    )
}

pub fn slide_layout_rels_xml() -> String {
    format!(
        "{XML_DECL}<Relationships xmlns=\"http://schemas.openxmlformats.org/package/2006/relationships\">\
<Relationship Id=\"rId1\" Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/slideMaster\" Target=\"../slideMasters/slideMaster1.xml\"/>\
</Relationships>"
    )
}

pub fn theme_xml() -> String {
    format!(
        "{XML_DECL}<a:theme xmlns:a=\"http://schemas.openxmlformats.org/drawingml/2006/main\" name=\"Office\">\
<a:themeElements>\
<a:clrScheme name=\"Office\">\
<a:dk1><a:sysClr val=\"windowText\" lastClr=\"000000\"/></a:dk1>\
<a:lt1><a:sysClr val=\"window\" lastClr=\"FFFFFF\"/></a:lt1>\
<a:dk2><a:srgbClr val=\"44546A\"/></a:dk2>\
<a:lt2><a:srgbClr val=\"E7E6E6\"/></a:lt2>\
<a:accent1><a:srgbClr val=\"4472C4\"/></a:accent1>\
<a:accent2><a:srgbClr val=\"ED7D31\"/></a:accent2>\
<a:accent3><a:srgbClr val=\"A5A5A5\"/></a:accent3>\
<a:accent4><a:srgbClr val=\"FFC000\"/></a:accent4>\
<a:accent5><a:srgbClr val=\"5B9BD5\"/></a:accent5>\
<a:accent6><a:srgbClr val=\"70AD47\"/></a:accent6>\
<a:hlink><a:srgbClr val=\"0563C1\"/></a:hlink>\
<a:folHlink><a:srgbClr val=\"954F72\"/></a:folHlink>\
</a:clrScheme>\
<a:fontScheme name=\"Office\">\
<a:majorFont><a:latin typeface=\"Calibri Light\"/><a:ea typeface=\"\"/><a:cs typeface=\"\"/></a:majorFont>\
<a:minorFont><a:latin typeface=\"Calibri\"/><a:ea typeface=\"\"/><a:cs typeface=\"\"/></a:minorFont>\
</a:fontScheme>\
<a:fmtScheme name=\"Office\">\
<a:fillStyleLst><a:solidFill><a:schemeClr val=\"phClr\"/></a:solidFill><a:solidFill><a:schemeClr val=\"phClr\"/></a:solidFill><a:solidFill><a:schemeClr val=\"phClr\"/></a:solidFill></a:fillStyleLst>\
<a:lnStyleLst><a:ln w=\"6350\"><a:solidFill><a:schemeClr val=\"phClr\"/></a:solidFill></a:ln><a:ln w=\"12700\"><a:solidFill><a:schemeClr val=\"phClr\"/></a:solidFill></a:ln><a:ln w=\"19050\"><a:solidFill><a:schemeClr val=\"phClr\"/></a:solidFill></a:ln></a:lnStyleLst>\
<a:effectStyleLst><a:effectStyle><a:effectLst/></a:effectStyle><a:effectStyle><a:effectLst/></a:effectStyle><a:effectStyle><a:effectLst/></a:effectStyle></a:effectStyleLst>\
<a:bgFillStyleLst><a:solidFill><a:schemeClr val=\"phClr\"/></a:solidFill><a:solidFill><a:schemeClr val=\"phClr\"/></a:solidFill><a:solidFill><a:schemeClr val=\"phClr\"/></a:solidFill></a:bgFillStyleLst>\
</a:fmtScheme>\
</a:themeElements>\
</a:theme>"
    )
}

/// Relationship part wiring one slide to its layout.
pub fn slide_rels_xml(layout_number: usize) -> String {
    format!(
        "{XML_DECL}<Relationships xmlns=\"http://schemas.openxmlformats.org/package/2006/relationships\">\
<Relationship Id=\"rId1\" Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/slideLayout\" Target=\"../slideLayouts/slideLayout{layout_number}.xml\"/>\
</Relationships>"
    )
}

// ── Slide XML ─────────────────────────────────────────────────────────────

/// A blank title slide: centered-title and subtitle placeholders.
pub fn blank_title_slide_xml() -> String {
    slide_xml(&[
        shape_xml(2, "Title 1", "ctrTitle", None, &[empty_paragraph()]),
        shape_xml(3, "Subtitle 2", "subTitle", Some(1), &[empty_paragraph()]),
    ])
}

/// A blank content slide: title and body placeholders.
pub fn blank_content_slide_xml() -> String {
    slide_xml(&[
        shape_xml(2, "Title 1", "title", None, &[empty_paragraph()]),
        shape_xml(3, "Content Placeholder 2", "body", Some(1), &[empty_paragraph()]),
    ])
}

fn slide_xml(shapes: &[String]) -> String {
    format!(
        "{XML_DECL}<p:sld xmlns:a=\"http://schemas.openxmlformats.org/drawingml/2006/main\" \
xmlns:r=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships\" \
xmlns:p=\"http://schemas.openxmlformats.org/presentationml/2006/main\">\
<p:cSld><p:spTree>\
<p:nvGrpSpPr><p:cNvPr id=\"1\" name=\"\"/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr/>\
{}\
</p:spTree></p:cSld>\
<p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr>\
</p:sld>",
        shapes.concat()
    )
}

fn shape_xml(
    id: u32,
    name: &str,
    ph_type: &str,
    ph_index: Option<u32>,
    paragraphs: &[String],
) -> String {
    let idx_attr = ph_index
        .map(|i| format!(" idx=\"{}\"", i))
        .unwrap_or_default();
    format!(
        "<p:sp>\
<p:nvSpPr><p:cNvPr id=\"{id}\" name=\"{name}\"/>\
<p:cNvSpPr><a:spLocks noGrp=\"1\"/></p:cNvSpPr>\
<p:nvPr><p:ph type=\"{ph_type}\"{idx_attr}/></p:nvPr></p:nvSpPr>\
<p:spPr/>\
<p:txBody><a:bodyPr/><a:lstStyle/>{}</p:txBody>\
</p:sp>",
        paragraphs.concat()
    )
}

pub fn paragraph_xml(text: &str) -> String {
    format!("<a:p><a:r><a:t>{}</a:t></a:r></a:p>", xml_escape(text))
}

fn empty_paragraph() -> String {
    "<a:p/>".to_string()
}

pub fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

// ── Slide filling ─────────────────────────────────────────────────────────

/// Fill a slide's placeholders with model-authored content.
///
/// The title placeholder is set when present and a title was given. The
/// body goes to the first remaining text-capable shape in shape order; the
/// routine stops at the first match, so multi-placeholder layouts only get
/// their first content region filled. Everything else on the slide is left
/// untouched.
pub fn fill_slide_xml(xml: &str, title: Option<&str>, body: &[String]) -> String {
    let mut out = String::with_capacity(xml.len());
    let mut pos = 0;
    let mut body_filled = false;

    while let Some((start, end)) = find_element_block(xml, pos, "p:sp") {
        out.push_str(&xml[pos..start]);
        let shape = &xml[start..end];

        let replacement = if is_title_shape(shape) {
            match title {
                Some(t) => replace_txbody_paragraphs(shape, &[paragraph_xml(t)])
                    .unwrap_or_else(|| shape.to_string()),
                None => shape.to_string(),
            }
        } else if !body_filled && !body.is_empty() && has_text_body(shape) {
            body_filled = true;
            replace_txbody_paragraphs(shape, body).unwrap_or_else(|| shape.to_string())
        } else {
            shape.to_string()
        };

        out.push_str(&replacement);
        pos = end;
    }
    out.push_str(&xml[pos..]);
    out
}

fn is_title_shape(shape: &str) -> bool {
    shape.contains("type=\"title\"") || shape.contains("type=\"ctrTitle\"")
}

fn has_text_body(shape: &str) -> bool {
    find_element_block(shape, 0, "p:txBody").is_some()
}

/// Replace every paragraph of the shape's text body, keeping the body
/// properties and list style that carry the template's formatting.
fn replace_txbody_paragraphs(shape: &str, paragraphs: &[String]) -> Option<String> {
    let (body_start, body_end) = find_element_block(shape, 0, "p:txBody")?;
    let body = &shape[body_start..body_end];

    let preserved_end = match find_element_block(body, 0, "a:p") {
        Some((first_para, _)) => first_para,
        None => body.len().checked_sub("</p:txBody>".len())?,
    };

    let mut rebuilt = String::with_capacity(shape.len() + paragraphs.iter().map(String::len).sum::<usize>());
    rebuilt.push_str(&shape[..body_start]);
    rebuilt.push_str(&body[..preserved_end]);
    rebuilt.push_str(&paragraphs.concat());
    rebuilt.push_str("</p:txBody>");
    rebuilt.push_str(&shape[body_end..]);
    Some(rebuilt)
}

// ── Patch helpers for template editing ────────────────────────────────────

/// Insert `insertion` immediately before the first occurrence of `marker`.
pub fn insert_before(haystack: &str, marker: &str, insertion: &str) -> Result<String> {
    let idx = haystack
        .find(marker)
        .ok_or_else(|| anyhow!("Marker {} not found", marker))?;
    let mut out = String::with_capacity(haystack.len() + insertion.len());
    out.push_str(&haystack[..idx]);
    out.push_str(insertion);
    out.push_str(&haystack[idx..]);
    Ok(out)
}

/// Highest numeric suffix among `rId<N>` relationship ids in a rels part.
pub fn max_relationship_id(rels_xml: &str) -> usize {
    let mut max = 0;
    let mut pos = 0;
    while let Some(rel) = rels_xml[pos..].find("Id=\"rId") {
        let digits_start = pos + rel + "Id=\"rId".len();
        let digits: String = rels_xml[digits_start..]
            .chars()
            .take_while(|c| c.is_ascii_digit())
            .collect();
        if let Ok(n) = digits.parse::<usize>() {
            max = max.max(n);
        }
        pos = digits_start;
    }
    max
}

/// Highest slide id inside `<p:sldIdLst>`; slide ids are required to be
/// 256 or greater.
pub fn max_slide_id(presentation_xml: &str) -> usize {
    let Some((start, end)) = find_element_block(presentation_xml, 0, "p:sldIdLst") else {
        return 255;
    };
    let list = &presentation_xml[start..end];

    let mut max = 255;
    let mut pos = 0;
    while let Some(idx) = list[pos..].find("id=\"") {
        let digits_start = pos + idx + "id=\"".len();
        let digits: String = list[digits_start..]
            .chars()
            .take_while(|c| c.is_ascii_digit())
            .collect();
        if let Ok(n) = digits.parse::<usize>() {
            max = max.max(n);
        }
        pos = digits_start;
    }
    max
}
