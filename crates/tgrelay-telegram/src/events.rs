//! Update dispatcher: subscribes the relay to session events.

use std::sync::Arc;

use teloxide::{dispatching::Dispatcher, dptree, prelude::*, types::InlineQuery};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use tgrelay_core::{
    event::{InboundEvent, MediaRef, MessageEvent, QueryEvent},
    relay::EventRelay,
};

/// Run the update loop, forwarding new messages, edits, and inline queries
/// to the relay until `shutdown` is cancelled.
///
/// Handlers run concurrently under the dispatcher, so relative ordering of
/// webhook dispatches across events is not preserved.
pub async fn run_events(bot: Bot, relay: Arc<EventRelay>, shutdown: CancellationToken) {
    let handler = dptree::entry()
        .branch(Update::filter_message().endpoint(on_message))
        .branch(Update::filter_edited_message().endpoint(on_edited_message))
        .branch(Update::filter_inline_query().endpoint(on_inline_query));

    let mut dispatcher = Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![relay])
        .build();

    let token = dispatcher.shutdown_token();
    tokio::spawn(async move {
        shutdown.cancelled().await;
        if let Ok(fut) = token.shutdown() {
            fut.await;
        }
    });

    dispatcher.dispatch().await;
}

async fn on_message(msg: Message, relay: Arc<EventRelay>) -> ResponseResult<()> {
    match message_event(&msg) {
        Ok(ev) => relay.on_event(InboundEvent::NewMessage(ev)).await,
        Err(e) => warn!("dropping message {}: {e}", msg.id.0),
    }
    Ok(())
}

async fn on_edited_message(msg: Message, relay: Arc<EventRelay>) -> ResponseResult<()> {
    match message_event(&msg) {
        Ok(ev) => relay.on_event(InboundEvent::EditedMessage(ev)).await,
        Err(e) => warn!("dropping edited message {}: {e}", msg.id.0),
    }
    Ok(())
}

async fn on_inline_query(query: InlineQuery, relay: Arc<EventRelay>) -> ResponseResult<()> {
    match serde_json::to_value(&query) {
        Ok(fields) => {
            relay
                .on_event(InboundEvent::InlineQuery(QueryEvent {
                    query_id: query.id.clone(),
                    fields,
                }))
                .await
        }
        Err(e) => warn!("dropping inline query {}: {e}", query.id),
    }
    Ok(())
}

fn message_event(msg: &Message) -> serde_json::Result<MessageEvent> {
    Ok(MessageEvent {
        message_id: msg.id.0,
        chat_id: msg.chat.id.0,
        media: extract_media(msg),
        fields: serde_json::to_value(msg)?,
    })
}

/// File id of the message's attachment, if any.
fn extract_media(msg: &Message) -> Option<MediaRef> {
    let file_id = if let Some(sizes) = msg.photo() {
        // The last size is the largest.
        sizes.last().map(|p| p.file.id.clone())
    } else if let Some(doc) = msg.document() {
        Some(doc.file.id.clone())
    } else if let Some(audio) = msg.audio() {
        Some(audio.file.id.clone())
    } else if let Some(voice) = msg.voice() {
        Some(voice.file.id.clone())
    } else if let Some(video) = msg.video() {
        Some(video.file.id.clone())
    } else if let Some(animation) = msg.animation() {
        Some(animation.file.id.clone())
    } else if let Some(note) = msg.video_note() {
        Some(note.file.id.clone())
    } else if let Some(sticker) = msg.sticker() {
        Some(sticker.file.id.clone())
    } else {
        None
    };

    file_id.map(|file_id| MediaRef { file_id })
}
