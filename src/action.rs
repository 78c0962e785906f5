//! Action parsing: tolerant extraction of a typed document-creation action
//! from free-form model output.
//!
//! The model is asked to embed a fenced ```json block (see
//! [`crate::context::SYSTEM_INSTRUCTIONS`]); some models return bare JSON
//! instead, so a whole-reply fallback is accepted too. Anything malformed
//! degrades to "no action" — the user always still sees the model's prose.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Closed set of document-creation actions the model may request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    CreateExcel,
    CreateWord,
    CreatePresentation,
}

impl ActionKind {
    pub fn wire_name(&self) -> &'static str {
        match self {
            Self::CreateExcel => "create_excel",
            Self::CreateWord => "create_word",
            Self::CreatePresentation => "create_presentation",
        }
    }
}

/// Parsed, validated intent extracted from a model reply. Ephemeral: handed
/// straight to the renderer, never persisted.
#[derive(Debug, Clone)]
pub struct ActionDescriptor {
    pub kind: ActionKind,
    pub is_edit: bool,
    pub use_template: bool,
    pub payload: ActionPayload,
}

#[derive(Debug, Clone)]
pub enum ActionPayload {
    Tabular(TabularPayload),
    Word(WordPayload),
    Deck(DeckPayload),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TabularPayload {
    #[serde(default)]
    pub title: Option<String>,
    /// Presence controls whether data rows start at row 2 or row 1.
    #[serde(default)]
    pub headers: Option<Vec<String>>,
    #[serde(default)]
    pub rows: Vec<Vec<Value>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WordPayload {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub sections: Vec<WordSection>,
    /// Bare top-level paragraph, used when no sections are given.
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub table: Option<TableBlock>,
}

/// One document section; every part is independently optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WordSection {
    #[serde(default)]
    pub heading: Option<String>,
    /// Heading level, default 1.
    #[serde(default)]
    pub level: Option<u32>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub bullets: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TableBlock {
    #[serde(default)]
    pub headers: Vec<String>,
    #[serde(default)]
    pub rows: Vec<Vec<Value>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeckPayload {
    #[serde(default)]
    pub slides: Vec<SlideSpec>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SlideSpec {
    /// "title" marks an explicit title slide; the first slide is one anyway.
    #[serde(rename = "type")]
    #[serde(default)]
    pub slide_type: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub subtitle: Option<String>,
    #[serde(default)]
    pub bullets: Option<Vec<String>>,
    /// Scalar paragraph or a list of paragraphs.
    #[serde(default)]
    pub content: Option<Value>,
}

impl SlideSpec {
    pub fn is_title_slide(&self) -> bool {
        self.slide_type.as_deref() == Some("title")
    }
}

/// Result of scanning one model reply.
#[derive(Debug)]
pub enum ParseOutcome {
    /// Plain analytical reply; nothing to render.
    NoAction,
    /// Valid action. `block_start` is the byte offset where the fenced block
    /// (or the whole-reply JSON) begins, used to strip it from the visible
    /// text.
    Action {
        descriptor: ActionDescriptor,
        block_start: usize,
    },
    /// Known action kind whose payload failed validation. Nothing is
    /// rendered; the reply is kept as-is.
    Rejected { kind: ActionKind, error: String },
}

/// Scan a model reply for an embedded action.
pub fn parse(reply: &str) -> ParseOutcome {
    let Some((json_str, block_start)) = locate_action_json(reply) else {
        return ParseOutcome::NoAction;
    };

    let raw: RawAction = match serde_json::from_str(json_str) {
        Ok(raw) => raw,
        Err(e) => {
            tracing::warn!(error = %e, "Action block is not valid JSON, keeping reply as-is");
            return ParseOutcome::NoAction;
        }
    };

    let kind = match raw.action.as_str() {
        "create_excel" => ActionKind::CreateExcel,
        "create_word" => ActionKind::CreateWord,
        "create_presentation" => ActionKind::CreatePresentation,
        other => {
            // Unknown kinds are a no-op; the fenced block stays visible.
            tracing::warn!(action = other, "Unknown action kind, ignoring");
            return ParseOutcome::NoAction;
        }
    };

    let payload = match kind {
        ActionKind::CreateExcel => {
            serde_json::from_value::<TabularPayload>(raw.data).map(ActionPayload::Tabular)
        }
        ActionKind::CreateWord => {
            serde_json::from_value::<WordPayload>(raw.data).map(ActionPayload::Word)
        }
        ActionKind::CreatePresentation => serde_json::from_value::<DeckPayload>(raw.data)
            .map(ActionPayload::Deck)
            .and_then(|payload| {
                if matches!(&payload, ActionPayload::Deck(d) if d.slides.is_empty()) {
                    Err(serde::de::Error::custom("presentation needs at least one slide"))
                } else {
                    Ok(payload)
                }
            }),
    };

    match payload {
        Ok(payload) => ParseOutcome::Action {
            descriptor: ActionDescriptor {
                kind,
                is_edit: raw.is_edit,
                use_template: raw.use_template,
                payload,
            },
            block_start,
        },
        Err(e) => ParseOutcome::Rejected {
            kind,
            error: e.to_string(),
        },
    }
}

/// Detection order: a fenced ```json block first, then a whole-reply JSON
/// object. Both require an `"action"` marker somewhere in the reply.
fn locate_action_json(reply: &str) -> Option<(&str, usize)> {
    if reply.contains("\"action\"") {
        if let Some(fence) = reply.find("```json") {
            let json_start = fence + "```json".len();
            let rest = &reply[json_start..];
            let json_end = rest.find("```").unwrap_or(rest.len());
            return Some((rest[..json_end].trim(), fence));
        }

        let trimmed = reply.trim();
        if trimmed.starts_with('{') {
            let offset = reply.len() - reply.trim_start().len();
            return Some((trimmed, offset));
        }
    }
    None
}

/// Strip the action block from the visible reply and append the
/// deterministic confirmation sentence naming the produced file and, when a
/// charge applied, the tokens deducted.
pub fn rewrite_reply(reply: &str, block_start: usize, file_name: &str, charged: Option<i64>) -> String {
    let prefix = reply[..block_start].trim_end();
    let confirmation = match charged {
        Some(cost) if cost > 0 => format!(
            "Я создал файл '{}'. Вы можете скачать его ниже. Списано {} токенов.",
            file_name, cost
        ),
        _ => format!("Я создал файл '{}'. Вы можете скачать его ниже.", file_name),
    };
    if prefix.is_empty() {
        confirmation
    } else {
        format!("{}\n\n{}", prefix, confirmation)
    }
}

#[derive(Debug, Deserialize)]
struct RawAction {
    action: String,
    #[serde(default)]
    is_edit: bool,
    #[serde(default)]
    use_template: bool,
    #[serde(default)]
    data: Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_reply_has_no_action() {
        assert!(matches!(
            parse("Вот анализ ваших данных: всё хорошо."),
            ParseOutcome::NoAction
        ));
    }

    #[test]
    fn fenced_tabular_action_round_trips() {
        let reply = r#"Конечно, вот таблица:

```json
{"action": "create_excel", "data": {"title": "Отчёт", "headers": ["A", "B"], "rows": [[1, 2], [3, 4]]}}
```
"#;
        let ParseOutcome::Action { descriptor, block_start } = parse(reply) else {
            panic!("expected action");
        };
        assert_eq!(descriptor.kind, ActionKind::CreateExcel);
        assert!(!descriptor.is_edit);
        assert!(!descriptor.use_template);
        assert_eq!(block_start, reply.find("```json").unwrap());

        let ActionPayload::Tabular(payload) = descriptor.payload else {
            panic!("expected tabular payload");
        };
        assert_eq!(payload.title.as_deref(), Some("Отчёт"));
        assert_eq!(payload.headers, Some(vec!["A".to_string(), "B".to_string()]));
        assert_eq!(payload.rows, vec![vec![1.into(), 2.into()], vec![3.into(), 4.into()]]);
    }

    #[test]
    fn whole_reply_json_is_accepted() {
        let reply = r#"  {"action": "create_word", "is_edit": true, "data": {"title": "Док"}}"#;
        let ParseOutcome::Action { descriptor, block_start } = parse(reply) else {
            panic!("expected action");
        };
        assert_eq!(descriptor.kind, ActionKind::CreateWord);
        assert!(descriptor.is_edit);
        assert_eq!(block_start, 2);
    }

    #[test]
    fn unknown_action_kind_is_ignored() {
        let reply = "```json\n{\"action\": \"create_pdf\", \"data\": {}}\n```";
        assert!(matches!(parse(reply), ParseOutcome::NoAction));
    }

    #[test]
    fn broken_json_is_ignored() {
        let reply = "```json\n{\"action\": \"create_excel\", \"data\": {broken\n```";
        assert!(matches!(parse(reply), ParseOutcome::NoAction));
    }

    #[test]
    fn malformed_payload_is_rejected_before_rendering() {
        let reply = r#"```json
{"action": "create_excel", "data": {"rows": "not an array"}}
```"#;
        let ParseOutcome::Rejected { kind, .. } = parse(reply) else {
            panic!("expected rejection");
        };
        assert_eq!(kind, ActionKind::CreateExcel);
    }

    #[test]
    fn empty_presentation_is_rejected() {
        let reply = r#"```json
{"action": "create_presentation", "data": {"slides": []}}
```"#;
        assert!(matches!(
            parse(reply),
            ParseOutcome::Rejected { kind: ActionKind::CreatePresentation, .. }
        ));
    }

    #[test]
    fn template_flag_is_parsed() {
        let reply = r#"```json
{"action": "create_presentation", "use_template": true, "data": {"slides": [{"title": "X"}]}}
```"#;
        let ParseOutcome::Action { descriptor, .. } = parse(reply) else {
            panic!("expected action");
        };
        assert!(descriptor.use_template);
    }

    #[test]
    fn rewrite_strips_block_and_appends_confirmation() {
        let reply = "Готово, создаю файл.\n\n```json\n{\"action\": \"create_excel\"}\n```";
        let block_start = reply.find("```json").unwrap();

        let rewritten = rewrite_reply(reply, block_start, "Отчёт.xlsx", Some(40));
        assert!(rewritten.starts_with("Готово, создаю файл."));
        assert!(!rewritten.contains("```"));
        assert!(rewritten.contains("Я создал файл 'Отчёт.xlsx'"));
        assert!(rewritten.contains("Списано 40 токенов"));

        let free = rewrite_reply(reply, block_start, "Отчёт.xlsx", None);
        assert!(!free.contains("Списано"));
    }
}
