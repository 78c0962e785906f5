//! The orchestrator: sequences extraction, context assembly, the model
//! call, action dispatch, rendering, and charging for each incoming user
//! message.

use chrono::Utc;
use std::path::PathBuf;
use std::sync::Arc;
use uuid::Uuid;

use super::{ChatDeletion, ChatDetail, DownloadFile, EngineReply, UploadReceipt};
use crate::action::{self, ParseOutcome};
use crate::config::AppConfig;
use crate::context;
use crate::error::ChatError;
use crate::extract::{self, truncate_chars};
use crate::ledger::Ledger;
use crate::llm::ChatModel;
use crate::render;
use crate::storage::RecordStore;
use crate::types::{Actor, Chat, DocumentKind, MessageRole, StoredFile, StoredMessage};
use crate::vault::FileVault;

pub struct ChatEngine {
    config: Arc<AppConfig>,
    store: Arc<dyn RecordStore>,
    ledger: Arc<dyn Ledger>,
    model: Arc<dyn ChatModel>,
    vault: FileVault,
}

impl ChatEngine {
    pub fn new(
        config: Arc<AppConfig>,
        store: Arc<dyn RecordStore>,
        ledger: Arc<dyn Ledger>,
        model: Arc<dyn ChatModel>,
    ) -> anyhow::Result<Self> {
        let vault = FileVault::new(config.upload_dir.clone(), config.generated_dir.clone())?;
        Ok(Self {
            config,
            store,
            ledger,
            model,
            vault,
        })
    }

    pub async fn create_chat(&self, actor: &Actor, title: Option<String>) -> Result<Chat, ChatError> {
        let now = Utc::now();
        let chat = Chat {
            id: Uuid::new_v4(),
            owner_id: actor.id,
            title: title
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| "New Chat".to_string()),
            created_at: now,
            updated_at: now,
        };
        self.store.insert_chat(chat.clone()).await?;
        Ok(chat)
    }

    /// Store an uploaded document: save bytes, extract content, insert the
    /// file record and the synthetic "Uploaded file" message.
    pub async fn ingest_upload(
        &self,
        actor: &Actor,
        chat_id: Uuid,
        filename: &str,
        bytes: &[u8],
    ) -> Result<UploadReceipt, ChatError> {
        self.owned_chat(actor, chat_id).await?;

        let extension = filename.rsplit('.').next().unwrap_or("");
        let kind = DocumentKind::from_extension(extension);
        if kind == DocumentKind::Unsupported {
            return Err(ChatError::UnsupportedType(extension.to_string()));
        }

        let file_id = Uuid::new_v4();
        let path = self.vault.store_upload(file_id, filename, bytes)?;

        let extracted = extract::extract(&path, kind, &self.config.extraction);
        let extracted = truncate_chars(&extracted, self.config.extraction.max_stored_chars);

        let now = Utc::now();
        let file = StoredFile {
            id: file_id,
            chat_id,
            owner_id: actor.id,
            filename: filename.to_string(),
            kind,
            path,
            extracted_content: extracted.clone(),
            is_generated: false,
            created_at: now,
        };
        self.store.insert_file(file.clone()).await?;

        let message = StoredMessage {
            id: Uuid::new_v4(),
            chat_id,
            role: MessageRole::User,
            content: format!("Uploaded file: {}", filename),
            file_id: Some(file_id),
            file_name: Some(filename.to_string()),
            cost_tokens: None,
            created_at: now,
        };
        self.store.insert_message(message.clone()).await?;

        // First activity in the chat names it after the file.
        if self.store.count_messages(chat_id).await? == 1 {
            self.store
                .set_chat_title(chat_id, &format!("Chat: {}", filename))
                .await?;
        }
        self.store.touch_chat(chat_id, now).await?;

        tracing::info!(file = filename, kind = ?kind, chat = %chat_id, "Uploaded file ingested");

        let preview = if extracted.chars().count() > 500 {
            format!("{}...", truncate_chars(&extracted, 500))
        } else {
            extracted
        };

        Ok(UploadReceipt {
            file,
            message_id: message.id,
            preview,
        })
    }

    /// Handle one user message: persist it, consult the model, dispatch any
    /// requested document action, charge, and persist the reply.
    pub async fn handle_message(
        &self,
        actor: &Actor,
        chat_id: Uuid,
        text: &str,
    ) -> Result<EngineReply, ChatError> {
        self.owned_chat(actor, chat_id).await?;
        let now = Utc::now();

        // 1. The user's message is persisted verbatim before anything can fail.
        self.store
            .insert_message(StoredMessage {
                id: Uuid::new_v4(),
                chat_id,
                role: MessageRole::User,
                content: text.to_string(),
                file_id: None,
                file_name: None,
                cost_tokens: None,
                created_at: now,
            })
            .await?;

        // 2. Bounded context: the chat's files plus the trailing message window.
        let files = self
            .store
            .files_for_chat(chat_id, self.config.context.max_files)
            .await?;
        let mut recent = self
            .store
            .recent_messages(chat_id, self.config.context.max_messages)
            .await?;
        recent.reverse();
        let (preamble, transcript) = context::build(&files, &recent, text, &self.config.context);

        // 3. The model call is the sole suspension point; failures become an
        // in-band reply.
        let (mut reply, model_failed) = match self.model.send(&preamble, &transcript).await {
            Ok(reply) => (reply, false),
            Err(e) => {
                tracing::error!(error = %e, "Model call failed");
                (
                    format!("Извините, произошла ошибка при обработке запроса: {}", e),
                    true,
                )
            }
        };

        let mut cost = self.config.pricing.analysis;
        let mut charge_description = "analysis".to_string();
        let mut generated_file: Option<StoredFile> = None;

        if model_failed && !self.config.charge_on_model_failure {
            cost = 0;
        }

        // 4-5. Parse the reply for an action and render it.
        if !model_failed {
            match action::parse(&reply) {
                ParseOutcome::NoAction => {}
                ParseOutcome::Rejected { kind, error } => {
                    tracing::warn!(
                        kind = kind.wire_name(),
                        error = %error,
                        "Action payload failed validation, keeping analytical reply"
                    );
                }
                ParseOutcome::Action {
                    descriptor,
                    block_start,
                } => {
                    let action_cost = self.config.pricing.cost(descriptor.kind, descriptor.is_edit);

                    // The balance gate runs before any artifact side effect.
                    if !actor.exempt {
                        let balance = self.ledger.balance(actor.id).await?;
                        if balance < action_cost {
                            self.persist_assistant(chat_id, &reply, None, None).await?;
                            self.store.touch_chat(chat_id, Utc::now()).await?;
                            return Err(ChatError::InsufficientBalance {
                                required: action_cost,
                                balance,
                            });
                        }
                    }

                    let template = if descriptor.use_template {
                        self.latest_uploaded_deck(chat_id).await?
                    } else {
                        None
                    };

                    match render::render_action(&descriptor, template.as_deref()) {
                        Ok(rendered) => {
                            let file_id = Uuid::new_v4();
                            let path = self.vault.store_generated(
                                file_id,
                                rendered.kind.extension(),
                                &rendered.bytes,
                            )?;
                            let file = StoredFile {
                                id: file_id,
                                chat_id,
                                owner_id: actor.id,
                                filename: rendered.display_name.clone(),
                                kind: rendered.kind,
                                path,
                                extracted_content: String::new(),
                                is_generated: true,
                                created_at: Utc::now(),
                            };
                            self.store.insert_file(file.clone()).await?;

                            cost = action_cost;
                            charge_description = if descriptor.is_edit {
                                format!("{} (edit)", descriptor.kind.wire_name())
                            } else {
                                descriptor.kind.wire_name().to_string()
                            };
                            let charged = (!actor.exempt).then_some(action_cost);
                            reply = action::rewrite_reply(
                                &reply,
                                block_start,
                                &rendered.display_name,
                                charged,
                            );
                            generated_file = Some(file);

                            tracing::info!(
                                kind = descriptor.kind.wire_name(),
                                file = %rendered.display_name,
                                "Generated document"
                            );
                        }
                        Err(e) => {
                            // A failed render discards the action; the reply
                            // keeps its analytical text, fenced block included.
                            tracing::warn!(
                                kind = descriptor.kind.wire_name(),
                                error = %e,
                                "Render failed, discarding action"
                            );
                        }
                    }
                }
            }
        }

        // 6. Deduct. Exempt actors bypass the ledger entirely.
        let charged_amount = if actor.exempt || cost == 0 {
            0
        } else if self.ledger.charge(actor.id, cost, &charge_description).await? {
            cost
        } else {
            // Balance moved between the gate and the deduction; the artifact
            // (if any) was already delivered, so record the miss and move on.
            tracing::warn!(actor = %actor.id, cost, "Charge failed after render");
            0
        };

        // 7. Persist the assistant's message and bump chat activity.
        let message = self
            .persist_assistant(
                chat_id,
                &reply,
                generated_file.as_ref(),
                (charged_amount > 0).then_some(charged_amount),
            )
            .await?;
        self.store.touch_chat(chat_id, Utc::now()).await?;

        Ok(EngineReply {
            message,
            generated_file,
            cost: charged_amount,
        })
    }

    /// Delete a chat with its messages and files. Backing bytes that cannot
    /// be removed are reported as orphans, not swallowed.
    pub async fn delete_chat(&self, actor: &Actor, chat_id: Uuid) -> Result<ChatDeletion, ChatError> {
        self.owned_chat(actor, chat_id).await?;

        let removed = self.store.delete_files_for_chat(chat_id).await?;
        let mut orphaned_paths = Vec::new();
        for file in &removed {
            if let Err(e) = self.vault.remove(&file.path) {
                tracing::warn!(path = %file.path.display(), error = %e, "Backing file left orphaned");
                orphaned_paths.push(file.path.clone());
            }
        }

        self.store.delete_messages_for_chat(chat_id).await?;
        self.store.delete_chat(chat_id).await?;

        Ok(ChatDeletion {
            removed_files: removed.len(),
            orphaned_paths,
        })
    }

    /// Resolve a download request: 404-equivalent for missing records or
    /// bytes, 403-equivalent for foreign files.
    pub async fn resolve_download(
        &self,
        actor: &Actor,
        file_id: Uuid,
    ) -> Result<DownloadFile, ChatError> {
        let file = self
            .store
            .file(file_id)
            .await?
            .ok_or(ChatError::FileNotFound)?;

        if file.owner_id != actor.id && !actor.exempt {
            return Err(ChatError::Forbidden);
        }
        if !file.path.exists() {
            return Err(ChatError::FileNotFound);
        }

        Ok(DownloadFile {
            path: file.path.clone(),
            display_name: file.filename,
            content_type: file.kind.content_type(),
        })
    }

    pub async fn chat_detail(&self, actor: &Actor, chat_id: Uuid) -> Result<ChatDetail, ChatError> {
        let chat = self.owned_chat(actor, chat_id).await?;

        let mut messages = self.store.recent_messages(chat_id, 1000).await?;
        messages.reverse();

        let mut files = self.store.files_for_chat(chat_id, 100).await?;
        files.reverse();

        Ok(ChatDetail {
            chat,
            messages,
            files,
        })
    }

    pub async fn list_chats(&self, actor: &Actor) -> Result<Vec<Chat>, ChatError> {
        Ok(self.store.chats_for_owner(actor.id, 100).await?)
    }

    /// Missing and foreign chats are indistinguishable to the caller.
    async fn owned_chat(&self, actor: &Actor, chat_id: Uuid) -> Result<Chat, ChatError> {
        match self.store.chat(chat_id).await? {
            Some(chat) if chat.owner_id == actor.id => Ok(chat),
            _ => Err(ChatError::ChatNotFound),
        }
    }

    /// The most recently uploaded (not generated) slide deck of the chat,
    /// used as the base for template-guided rendering.
    async fn latest_uploaded_deck(&self, chat_id: Uuid) -> Result<Option<PathBuf>, ChatError> {
        let files = self
            .store
            .files_for_chat(chat_id, self.config.context.max_files)
            .await?;
        Ok(files
            .into_iter()
            .filter(|f| f.kind == DocumentKind::SlideDeck && !f.is_generated)
            .next_back()
            .map(|f| f.path))
    }

    async fn persist_assistant(
        &self,
        chat_id: Uuid,
        content: &str,
        file: Option<&StoredFile>,
        cost_tokens: Option<i64>,
    ) -> Result<StoredMessage, ChatError> {
        let message = StoredMessage {
            id: Uuid::new_v4(),
            chat_id,
            role: MessageRole::Assistant,
            content: content.to_string(),
            file_id: file.map(|f| f.id),
            file_name: file.map(|f| f.filename.clone()),
            cost_tokens,
            created_at: Utc::now(),
        };
        self.store.insert_message(message.clone()).await?;
        Ok(message)
    }
}
