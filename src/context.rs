//! Context assembly: system preamble + bounded conversational transcript.

use crate::config::ContextLimits;
use crate::extract::truncate_chars;
use crate::types::{MessageRole, StoredFile, StoredMessage};

/// Assistant-facing contract. Teaches the model how to request document
/// creation: the fenced JSON action format, the create-vs-edit distinction,
/// and the instruction to reuse an uploaded deck's structure as a template.
pub const SYSTEM_INSTRUCTIONS: &str = r#"Ты - помощник для работы с документами. Ты помогаешь пользователям:
1. Анализировать загруженные файлы (Excel, Word, PowerPoint, PDF, TXT)
2. Создавать новые документы на основе шаблонов
3. Составлять графики работы для сотрудников
4. Отвечать на вопросы о содержимом файлов

Когда пользователь просит создать документ, ты ДОЛЖЕН вернуть данные в формате JSON в блоке ```json.

Для Excel таблицы:
```json
{"action": "create_excel", "data": {"title": "Название листа", "headers": ["Колонка1", "Колонка2"], "rows": [["значение1", "значение2"], ["значение3", "значение4"]]}}
```

Для Word документа:
```json
{"action": "create_word", "data": {"title": "Заголовок документа", "sections": [{"heading": "Раздел 1", "content": "Текст раздела.", "bullets": ["пункт 1", "пункт 2"]}]}}
```

Для презентации PowerPoint:
```json
{"action": "create_presentation", "data": {"slides": [{"type": "title", "title": "Название", "subtitle": "Подзаголовок"}, {"title": "Слайд 2", "bullets": ["тезис 1", "тезис 2"]}]}}
```

Если пользователь просит ИЗМЕНИТЬ существующий документ, добавь "is_edit": true на верхнем уровне JSON.

Если в чат загружена презентация и пользователь просит сделать новую на её основе, добавь "use_template": true — тогда оформление и макеты загруженной презентации будут использованы повторно. Предпочитай структуру загруженной презентации, когда она есть.

Не добавляй никакого текста внутрь блока ```json кроме самого JSON."#;

/// Build the system preamble and the conversational transcript for one
/// model call.
///
/// `files` are taken in store order and capped; `recent` must be in
/// chronological order (the engine reverses the store's newest-first
/// result). The new user utterance is appended as the final transcript line.
pub fn build(
    files: &[StoredFile],
    recent: &[StoredMessage],
    new_user_text: &str,
    limits: &ContextLimits,
) -> (String, String) {
    let mut preamble = String::from(SYSTEM_INSTRUCTIONS);
    preamble.push_str("\n\nКонтекст загруженных файлов:\n");

    for file in files.iter().take(limits.max_files) {
        preamble.push_str(&format!(
            "\n\n=== File: {} ({}) ===\n{}",
            file.filename,
            file.kind.extension(),
            truncate_chars(&file.extracted_content, limits.max_file_chars)
        ));
    }

    let mut transcript = String::new();
    let window_start = recent.len().saturating_sub(limits.max_messages);
    for message in &recent[window_start..] {
        transcript.push_str(&format!(
            "\n{}: {}",
            speaker_label(message.role),
            message.content
        ));
    }
    transcript.push_str(&format!(
        "\n{}: {}",
        speaker_label(MessageRole::User),
        new_user_text
    ));

    (preamble, transcript)
}

fn speaker_label(role: MessageRole) -> &'static str {
    match role {
        MessageRole::User => "Пользователь",
        MessageRole::Assistant => "Ассистент",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::types::DocumentKind;
    use chrono::Utc;
    use uuid::Uuid;

    fn file(name: &str, content: &str) -> StoredFile {
        StoredFile {
            id: Uuid::new_v4(),
            chat_id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            filename: name.to_string(),
            kind: DocumentKind::Tabular,
            path: "/tmp/x".into(),
            extracted_content: content.to_string(),
            is_generated: false,
            created_at: Utc::now(),
        }
    }

    fn message(role: MessageRole, content: &str) -> StoredMessage {
        StoredMessage {
            id: Uuid::new_v4(),
            chat_id: Uuid::new_v4(),
            role,
            content: content.to_string(),
            file_id: None,
            file_name: None,
            cost_tokens: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn file_blocks_are_capped_and_truncated() {
        let limits = AppConfig::default().context;
        let files: Vec<StoredFile> = (0..12)
            .map(|i| file(&format!("f{}.xlsx", i), &"x".repeat(12_000)))
            .collect();

        let (preamble, _) = build(&files, &[], "hi", &limits);
        assert_eq!(preamble.matches("=== File:").count(), limits.max_files);
        assert!(preamble.contains("f0.xlsx"));
        assert!(!preamble.contains("f10.xlsx"));

        // Per-file content re-truncated below the stored size.
        let after = preamble.split("=== File: f0.xlsx (xlsx) ===").nth(1).unwrap();
        let block = after.split("=== File:").next().unwrap();
        assert_eq!(block.matches('x').count(), limits.max_file_chars);
    }

    #[test]
    fn transcript_is_chronological_with_localized_labels() {
        let limits = AppConfig::default().context;
        let recent = vec![
            message(MessageRole::User, "покажи данные"),
            message(MessageRole::Assistant, "вот данные"),
        ];

        let (_, transcript) = build(&[], &recent, "сделай таблицу", &limits);
        let expected = "\nПользователь: покажи данные\nАссистент: вот данные\nПользователь: сделай таблицу";
        assert_eq!(transcript, expected);
    }

    #[test]
    fn transcript_window_keeps_trailing_messages() {
        let mut limits = AppConfig::default().context;
        limits.max_messages = 3;
        let recent: Vec<StoredMessage> = (0..6)
            .map(|i| message(MessageRole::User, &format!("msg {}", i)))
            .collect();

        let (_, transcript) = build(&[], &recent, "latest", &limits);
        assert!(!transcript.contains("msg 2"));
        assert!(transcript.contains("msg 3"));
        assert!(transcript.contains("msg 5"));
        assert!(transcript.ends_with("Пользователь: latest"));
    }

    #[test]
    fn preamble_carries_action_contract() {
        let limits = AppConfig::default().context;
        let (preamble, _) = build(&[], &[], "hi", &limits);
        assert!(preamble.contains("create_excel"));
        assert!(preamble.contains("create_word"));
        assert!(preamble.contains("create_presentation"));
        assert!(preamble.contains("use_template"));
        assert!(preamble.contains("is_edit"));
    }
}
