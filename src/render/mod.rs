//! Document renderers: one per output kind, each pure given a payload.

pub mod deck;
pub mod pptx;
pub mod word;
pub mod workbook;

use anyhow::Result;
use std::path::Path;

use crate::action::{ActionDescriptor, ActionPayload};
use crate::types::DocumentKind;

/// A rendered document ready to be stored: bytes plus the user-facing
/// display name (decoupled from the uuid-keyed on-disk name).
#[derive(Debug, Clone)]
pub struct RenderedDocument {
    pub bytes: Vec<u8>,
    pub display_name: String,
    pub kind: DocumentKind,
}

/// Render a validated action into a concrete document.
///
/// `template` is the on-disk path of an uploaded slide deck to reuse; it is
/// only consulted for presentation actions with `use_template` set, and only
/// when the path still exists.
pub fn render_action(
    descriptor: &ActionDescriptor,
    template: Option<&Path>,
) -> Result<RenderedDocument> {
    match &descriptor.payload {
        ActionPayload::Tabular(payload) => {
            let bytes = workbook::render(payload)?;
            Ok(RenderedDocument {
                bytes,
                display_name: display_name(payload.title.as_deref(), "Таблица", "xlsx"),
                kind: DocumentKind::Tabular,
            })
        }
        ActionPayload::Word(payload) => {
            let bytes = word::render(payload)?;
            Ok(RenderedDocument {
                bytes,
                display_name: display_name(payload.title.as_deref(), "Документ", "docx"),
                kind: DocumentKind::Word,
            })
        }
        ActionPayload::Deck(payload) => {
            let template = template.filter(|p| descriptor.use_template && p.exists());
            let bytes = match template {
                Some(path) => {
                    let template_bytes = std::fs::read(path)?;
                    deck::render_with_template(&template_bytes, payload)?
                }
                None => deck::render(payload)?,
            };
            let first_title = payload.slides.first().and_then(|s| s.title.as_deref());
            Ok(RenderedDocument {
                bytes,
                display_name: display_name(first_title, "Презентация", "pptx"),
                kind: DocumentKind::SlideDeck,
            })
        }
    }
}

/// Display filename: payload title or a localized generic label, plus the
/// proper extension.
fn display_name(title: Option<&str>, fallback: &str, extension: &str) -> String {
    let base = title
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .unwrap_or(fallback);
    format!("{}.{}", base, extension)
}
