//! Slide-deck renderer: from-scratch decks and template-guided rendering.

use anyhow::{anyhow, Result};
use serde_json::Value;
use std::collections::BTreeMap;

use super::pptx;
use crate::action::{DeckPayload, SlideSpec};

/// Build a new widescreen deck. The first slide (or any slide explicitly
/// marked `type: "title"`) uses the title layout; all others use the content
/// layout and the shared fill routine.
pub fn render(payload: &DeckPayload) -> Result<Vec<u8>> {
    let slide_count = payload.slides.len();
    let mut parts: BTreeMap<String, Vec<u8>> = BTreeMap::new();

    parts.insert(
        "[Content_Types].xml".to_string(),
        pptx::content_types_xml(slide_count).into_bytes(),
    );
    parts.insert("_rels/.rels".to_string(), pptx::root_rels_xml().into_bytes());
    parts.insert(
        "ppt/presentation.xml".to_string(),
        pptx::presentation_xml(slide_count).into_bytes(),
    );
    parts.insert(
        "ppt/_rels/presentation.xml.rels".to_string(),
        pptx::presentation_rels_xml(slide_count).into_bytes(),
    );
    parts.insert(
        "ppt/slideMasters/slideMaster1.xml".to_string(),
        pptx::slide_master_xml().into_bytes(),
    );
    parts.insert(
        "ppt/slideMasters/_rels/slideMaster1.xml.rels".to_string(),
        pptx::slide_master_rels_xml().into_bytes(),
    );
    parts.insert(
        "ppt/slideLayouts/slideLayout1.xml".to_string(),
        pptx::slide_layout_xml(Some("title"), "Title Slide").into_bytes(),
    );
    parts.insert(
        "ppt/slideLayouts/slideLayout2.xml".to_string(),
        pptx::slide_layout_xml(None, "Title and Content").into_bytes(),
    );
    parts.insert(
        "ppt/slideLayouts/_rels/slideLayout1.xml.rels".to_string(),
        pptx::slide_layout_rels_xml().into_bytes(),
    );
    parts.insert(
        "ppt/slideLayouts/_rels/slideLayout2.xml.rels".to_string(),
        pptx::slide_layout_rels_xml().into_bytes(),
    );
    parts.insert("ppt/theme/theme1.xml".to_string(), pptx::theme_xml().into_bytes());

    for (i, spec) in payload.slides.iter().enumerate() {
        let number = i + 1;
        let is_title_slide = i == 0 || spec.is_title_slide();

        let (blank, layout) = if is_title_slide {
            (pptx::blank_title_slide_xml(), 1)
        } else {
            (pptx::blank_content_slide_xml(), 2)
        };

        let filled = pptx::fill_slide_xml(&blank, spec.title.as_deref(), &body_paragraphs(spec));
        parts.insert(format!("ppt/slides/slide{}.xml", number), filled.into_bytes());
        parts.insert(
            format!("ppt/slides/_rels/slide{}.xml.rels", number),
            pptx::slide_rels_xml(layout).into_bytes(),
        );
    }

    pptx::write_package(&parts)
}

/// Reuse an uploaded deck: payload slide `i` fills template slide `i` in
/// place (layout and styling preserved); once the template's slides are
/// exhausted, new slides are appended on the template's second layout
/// (first if it only has one). Extra template slides are left untouched.
pub fn render_with_template(template: &[u8], payload: &DeckPayload) -> Result<Vec<u8>> {
    let mut parts = pptx::read_package(template)?;

    let mut template_slides: Vec<usize> = parts.keys().filter_map(|name| slide_number(name)).collect();
    template_slides.sort_unstable();
    if template_slides.is_empty() {
        return Err(anyhow!("Template deck has no slides"));
    }

    let appended_layout = second_or_first_layout(&parts)
        .ok_or_else(|| anyhow!("Template deck has no slide layouts"))?;

    for (i, spec) in payload.slides.iter().enumerate() {
        if let Some(&number) = template_slides.get(i) {
            let name = format!("ppt/slides/slide{}.xml", number);
            let xml = part_string(&parts, &name)?;
            let filled = pptx::fill_slide_xml(&xml, spec.title.as_deref(), &body_paragraphs(spec));
            parts.insert(name, filled.into_bytes());
        } else {
            append_slide(&mut parts, spec, appended_layout)?;
        }
    }

    pptx::write_package(&parts)
}

/// Append one new slide to an existing package, wiring it into the content
/// types, the presentation relationships, and the slide-id list.
fn append_slide(
    parts: &mut BTreeMap<String, Vec<u8>>,
    spec: &SlideSpec,
    layout_number: usize,
) -> Result<()> {
    let next_number = parts
        .keys()
        .filter_map(|name| slide_number(name))
        .max()
        .unwrap_or(0)
        + 1;

    let blank = pptx::blank_content_slide_xml();
    let filled = pptx::fill_slide_xml(&blank, spec.title.as_deref(), &body_paragraphs(spec));
    parts.insert(
        format!("ppt/slides/slide{}.xml", next_number),
        filled.into_bytes(),
    );
    parts.insert(
        format!("ppt/slides/_rels/slide{}.xml.rels", next_number),
        pptx::slide_rels_xml(layout_number).into_bytes(),
    );

    let content_types = part_string(parts, "[Content_Types].xml")?;
    let override_entry = format!(
        "<Override PartName=\"/ppt/slides/slide{}.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.presentationml.slide+xml\"/>",
        next_number
    );
    parts.insert(
        "[Content_Types].xml".to_string(),
        pptx::insert_before(&content_types, "</Types>", &override_entry)?.into_bytes(),
    );

    let rels_name = "ppt/_rels/presentation.xml.rels";
    let rels = part_string(parts, rels_name)?;
    let new_rid = pptx::max_relationship_id(&rels) + 1;
    let relationship = format!(
        "<Relationship Id=\"rId{}\" Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/slide\" Target=\"slides/slide{}.xml\"/>",
        new_rid, next_number
    );
    parts.insert(
        rels_name.to_string(),
        pptx::insert_before(&rels, "</Relationships>", &relationship)?.into_bytes(),
    );

    let presentation_name = "ppt/presentation.xml";
    let presentation = part_string(parts, presentation_name)?;
    let slide_id = pptx::max_slide_id(&presentation) + 1;
    let sld_id_entry = format!("<p:sldId id=\"{}\" r:id=\"rId{}\"/>", slide_id, new_rid);
    parts.insert(
        presentation_name.to_string(),
        pptx::insert_before(&presentation, "</p:sldIdLst>", &sld_id_entry)?.into_bytes(),
    );

    Ok(())
}

/// Body paragraphs for one slide, in priority order: bullets, then a
/// list-valued `content`, then scalar `content`, then the subtitle.
fn body_paragraphs(spec: &SlideSpec) -> Vec<String> {
    if let Some(bullets) = &spec.bullets {
        return bullets.iter().map(|b| pptx::paragraph_xml(b)).collect();
    }
    match &spec.content {
        Some(Value::Array(items)) => items.iter().map(|item| pptx::paragraph_xml(&scalar_text(item))).collect(),
        Some(Value::Null) | None => spec
            .subtitle
            .as_deref()
            .map(|s| vec![pptx::paragraph_xml(s)])
            .unwrap_or_default(),
        Some(scalar) => vec![pptx::paragraph_xml(&scalar_text(scalar))],
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn slide_number(part_name: &str) -> Option<usize> {
    part_name
        .strip_prefix("ppt/slides/slide")?
        .strip_suffix(".xml")?
        .parse()
        .ok()
}

/// The template's second layout, falling back to its first when only one
/// exists.
fn second_or_first_layout(parts: &BTreeMap<String, Vec<u8>>) -> Option<usize> {
    let mut layouts: Vec<usize> = parts
        .keys()
        .filter_map(|name| {
            name.strip_prefix("ppt/slideLayouts/slideLayout")?
                .strip_suffix(".xml")?
                .parse()
                .ok()
        })
        .collect();
    layouts.sort_unstable();
    layouts.get(1).or_else(|| layouts.first()).copied()
}

fn part_string(parts: &BTreeMap<String, Vec<u8>>, name: &str) -> Result<String> {
    let bytes = parts
        .get(name)
        .ok_or_else(|| anyhow!("Deck is missing part {}", name))?;
    Ok(String::from_utf8_lossy(bytes).into_owned())
}
