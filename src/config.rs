use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::action::ActionKind;

/// Immutable application configuration, constructed once at process start
/// and passed by reference into every component. No module-level globals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Directory for user-uploaded files.
    pub upload_dir: PathBuf,
    /// Directory for generated files.
    pub generated_dir: PathBuf,
    pub extraction: ExtractionLimits,
    pub context: ContextLimits,
    pub pricing: PriceTable,
    pub llm: LlmConfig,
    /// Whether a failed model call still charges the minimal analysis cost.
    pub charge_on_model_failure: bool,
}

/// Per-format extraction caps. These bound memory and latency against
/// degenerate inputs (huge sheets, scanned PDFs); earlier content wins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionLimits {
    pub max_rows_per_sheet: usize,
    pub max_pdf_pages: usize,
    pub max_pdf_page_chars: usize,
    pub max_text_chars: usize,
    /// Overall budget applied before persisting extracted content.
    pub max_stored_chars: usize,
}

/// Bounds on the conversational context sent to the model. Generous enough
/// for useful analysis, bounded to keep token cost and latency predictable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextLimits {
    pub max_files: usize,
    pub max_file_chars: usize,
    pub max_messages: usize,
}

/// Fixed price table, in tokens. Not user-configurable at runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceTable {
    pub create_presentation: i64,
    pub edit_presentation: i64,
    pub create_word: i64,
    pub edit_word: i64,
    pub create_excel: i64,
    pub edit_excel: i64,
    /// Plain analysis reply with no document produced.
    pub analysis: i64,
}

impl PriceTable {
    pub fn cost(&self, kind: ActionKind, is_edit: bool) -> i64 {
        match (kind, is_edit) {
            (ActionKind::CreatePresentation, false) => self.create_presentation,
            (ActionKind::CreatePresentation, true) => self.edit_presentation,
            (ActionKind::CreateWord, false) => self.create_word,
            (ActionKind::CreateWord, true) => self.edit_word,
            (ActionKind::CreateExcel, false) => self.create_excel,
            (ActionKind::CreateExcel, true) => self.edit_excel,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub endpoint: String,
    pub api_key: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl AppConfig {
    /// Validate config values, returning errors for clearly broken
    /// configurations.
    pub fn validate(&self) -> Result<(), String> {
        if self.extraction.max_rows_per_sheet == 0 {
            return Err("extraction.max_rows_per_sheet must be > 0".into());
        }
        if self.extraction.max_pdf_pages == 0 {
            return Err("extraction.max_pdf_pages must be > 0".into());
        }
        if self.extraction.max_stored_chars < self.context.max_file_chars {
            return Err("extraction.max_stored_chars must be >= context.max_file_chars".into());
        }
        if self.context.max_files == 0 || self.context.max_messages == 0 {
            return Err("context caps must be > 0".into());
        }
        if self.pricing.analysis < 0 {
            return Err("pricing.analysis must be >= 0".into());
        }
        if self.llm.max_tokens == 0 {
            return Err("llm.max_tokens must be > 0".into());
        }
        Ok(())
    }

    /// Load config from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file: {}", e))?;
        let config: Self = serde_json::from_str(&content)
            .map_err(|e| format!("Failed to parse config: {}", e))?;
        config.validate()?;
        Ok(config)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("docchat");

        Self {
            upload_dir: data_dir.join("uploads"),
            generated_dir: data_dir.join("generated"),
            extraction: ExtractionLimits {
                max_rows_per_sheet: 100,
                max_pdf_pages: 20,
                max_pdf_page_chars: 3000,
                max_text_chars: 20_000,
                max_stored_chars: 50_000,
            },
            context: ContextLimits {
                max_files: 10,
                max_file_chars: 10_000,
                max_messages: 20,
            },
            pricing: PriceTable {
                create_presentation: 65,
                edit_presentation: 10,
                create_word: 35,
                edit_word: 6,
                create_excel: 40,
                edit_excel: 7,
                analysis: 5,
            },
            llm: LlmConfig {
                endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
                api_key: String::new(),
                model: "gpt-5".to_string(),
                max_tokens: 4096,
                temperature: 0.7,
            },
            charge_on_model_failure: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(AppConfig::default().validate().is_ok());
    }

    #[test]
    fn validation_rejects_zero_caps() {
        let mut config = AppConfig::default();
        config.context.max_files = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn price_lookup_matches_table() {
        let pricing = AppConfig::default().pricing;
        assert_eq!(pricing.cost(ActionKind::CreatePresentation, false), 65);
        assert_eq!(pricing.cost(ActionKind::CreatePresentation, true), 10);
        assert_eq!(pricing.cost(ActionKind::CreateWord, false), 35);
        assert_eq!(pricing.cost(ActionKind::CreateExcel, true), 7);
    }
}
