//! Telegram adapter (teloxide).
//!
//! This crate implements the `tgrelay-core` PlatformPort over the Telegram
//! Bot API and runs the update dispatcher that feeds inbound events into
//! the relay.

use std::path::Path;

use async_trait::async_trait;

use teloxide::{
    net::Download,
    prelude::*,
    types::{InputFile, Recipient},
};

use tokio::time::sleep;

pub mod events;

use tgrelay_core::{
    domain::{ChatTarget, MessageId},
    errors::Error,
    event::MediaRef,
    platform::{MediaKind, PlatformPort},
    Result,
};

#[derive(Clone)]
pub struct TelegramPlatform {
    bot: Bot,
}

impl TelegramPlatform {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    pub fn bot(&self) -> Bot {
        self.bot.clone()
    }

    fn recipient(chat: &ChatTarget) -> Recipient {
        match chat {
            ChatTarget::Id(id) => Recipient::Id(teloxide::types::ChatId(*id)),
            ChatTarget::Username(name) => {
                let name = if name.starts_with('@') {
                    name.clone()
                } else {
                    format!("@{name}")
                };
                Recipient::ChannelUsername(name)
            }
        }
    }

    fn tg_msg_id(message_id: MessageId) -> teloxide::types::MessageId {
        teloxide::types::MessageId(message_id.0)
    }

    fn map_err(e: teloxide::RequestError) -> Error {
        Error::Platform(format!("telegram error: {e}"))
    }

    /// Resolve a media input string: an http(s) URL, an existing local
    /// file path, or a platform file id.
    fn input_file(input: &str) -> InputFile {
        if input.starts_with("http://") || input.starts_with("https://") {
            if let Ok(u) = url::Url::parse(input) {
                return InputFile::url(u);
            }
        }
        let path = Path::new(input);
        if path.is_file() {
            return InputFile::file(path);
        }
        InputFile::file_id(input.to_string())
    }

    async fn with_retry<T, Fut>(&self, mut op: impl FnMut() -> Fut) -> Result<T>
    where
        Fut: std::future::IntoFuture<Output = std::result::Result<T, teloxide::RequestError>>,
        Fut::IntoFuture: Send,
    {
        const MAX_RETRIES: usize = 1;
        let mut attempts = 0usize;
        loop {
            match op().await {
                Ok(v) => return Ok(v),
                Err(e) => match e {
                    teloxide::RequestError::RetryAfter(d) if attempts < MAX_RETRIES => {
                        attempts += 1;
                        sleep(d).await;
                        continue;
                    }
                    other => return Err(Self::map_err(other)),
                },
            }
        }
    }
}

#[async_trait]
impl PlatformPort for TelegramPlatform {
    async fn connect(&self) -> Result<()> {
        // `getMe` validates the credentials; an invalid token fails here,
        // before any of the runtimes start.
        let me = self.bot.get_me().await.map_err(Self::map_err)?;
        tracing::info!("session connected as @{}", me.username());
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        // The Bot API holds no persistent connection; the update dispatcher
        // is stopped separately via the supervisor's shutdown token.
        tracing::info!("session closed");
        Ok(())
    }

    async fn send_text(&self, chat: &ChatTarget, text: &str) -> Result<MessageId> {
        let msg = self
            .with_retry(|| {
                self.bot
                    .send_message(Self::recipient(chat), text.to_string())
            })
            .await?;
        Ok(MessageId(msg.id.0))
    }

    async fn send_media(
        &self,
        chat: &ChatTarget,
        kind: MediaKind,
        input: &str,
        caption: Option<&str>,
    ) -> Result<MessageId> {
        let recipient = Self::recipient(chat);
        let file = Self::input_file(input);
        let caption = caption.map(|c| c.to_string());

        let msg = match kind {
            MediaKind::Photo => {
                self.with_retry(|| {
                    let mut req = self.bot.send_photo(recipient.clone(), file.clone());
                    if let Some(c) = &caption {
                        req = req.caption(c.clone());
                    }
                    req
                })
                .await?
            }
            MediaKind::Document => {
                self.with_retry(|| {
                    let mut req = self.bot.send_document(recipient.clone(), file.clone());
                    if let Some(c) = &caption {
                        req = req.caption(c.clone());
                    }
                    req
                })
                .await?
            }
            MediaKind::Audio => {
                self.with_retry(|| {
                    let mut req = self.bot.send_audio(recipient.clone(), file.clone());
                    if let Some(c) = &caption {
                        req = req.caption(c.clone());
                    }
                    req
                })
                .await?
            }
            MediaKind::Voice => {
                self.with_retry(|| {
                    let mut req = self.bot.send_voice(recipient.clone(), file.clone());
                    if let Some(c) = &caption {
                        req = req.caption(c.clone());
                    }
                    req
                })
                .await?
            }
            MediaKind::Video => {
                self.with_retry(|| {
                    let mut req = self.bot.send_video(recipient.clone(), file.clone());
                    if let Some(c) = &caption {
                        req = req.caption(c.clone());
                    }
                    req
                })
                .await?
            }
            MediaKind::Animation => {
                self.with_retry(|| {
                    let mut req = self.bot.send_animation(recipient.clone(), file.clone());
                    if let Some(c) = &caption {
                        req = req.caption(c.clone());
                    }
                    req
                })
                .await?
            }
            MediaKind::VideoNote => {
                // Video notes carry no caption.
                self.with_retry(|| self.bot.send_video_note(recipient.clone(), file.clone()))
                    .await?
            }
        };

        Ok(MessageId(msg.id.0))
    }

    async fn send_location(
        &self,
        chat: &ChatTarget,
        latitude: f64,
        longitude: f64,
    ) -> Result<MessageId> {
        let msg = self
            .with_retry(|| {
                self.bot
                    .send_location(Self::recipient(chat), latitude, longitude)
            })
            .await?;
        Ok(MessageId(msg.id.0))
    }

    async fn send_contact(
        &self,
        chat: &ChatTarget,
        phone_number: &str,
        first_name: &str,
        last_name: Option<&str>,
    ) -> Result<MessageId> {
        let msg = self
            .with_retry(|| {
                let mut req = self.bot.send_contact(
                    Self::recipient(chat),
                    phone_number.to_string(),
                    first_name.to_string(),
                );
                if let Some(last) = last_name {
                    req = req.last_name(last.to_string());
                }
                req
            })
            .await?;
        Ok(MessageId(msg.id.0))
    }

    async fn edit_text(
        &self,
        chat: &ChatTarget,
        message_id: MessageId,
        text: &str,
    ) -> Result<MessageId> {
        let msg = self
            .with_retry(|| {
                self.bot.edit_message_text(
                    Self::recipient(chat),
                    Self::tg_msg_id(message_id),
                    text.to_string(),
                )
            })
            .await?;
        Ok(MessageId(msg.id.0))
    }

    async fn delete_message(&self, chat: &ChatTarget, message_id: MessageId) -> Result<()> {
        self.with_retry(|| {
            self.bot
                .delete_message(Self::recipient(chat), Self::tg_msg_id(message_id))
        })
        .await?;
        Ok(())
    }

    async fn download_media(&self, media: &MediaRef, dest: &Path) -> Result<()> {
        let file = self
            .bot
            .get_file(media.file_id.clone())
            .await
            .map_err(Self::map_err)?;

        let mut dst = tokio::fs::File::create(dest).await?;
        self.bot
            .download_file(&file.path, &mut dst)
            .await
            .map_err(|e| Error::Platform(format!("download error: {e}")))?;

        Ok(())
    }
}
