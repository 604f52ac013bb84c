use std::{
    collections::HashMap,
    fmt::Write,
    sync::{Arc, Weak},
    time::Duration,
};

use arch_bot_commons::teloxide_retry;
use chrono::Utc;
use html_escape::{encode_double_quoted_attribute, encode_text};
use teloxide::{
    payloads::{EditMessageReplyMarkupSetters, EditMessageTextSetters, SendMessageSetters},
    prelude::Requester,
    sugar::request::RequestLinkPreviewExt,
    types::{ChatId, InlineKeyboardButton, InlineKeyboardMarkup, MessageId, ParseMode, Recipient},
    ApiError, Bot, RequestError,
};
use tokio::{sync::Mutex, time::sleep};
use url::Url;

use crate::{
    parsing::Vote,
    reports::{Report, ReportId, Tracker},
};

/// What a channel post says about its report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostStatus {
    /// Still tracked, open for votes.
    Active,
    /// Voted away.
    Gone,
    /// Lived out its lifetime.
    Expired,
}

/// A report as last posted to the channel.
#[derive(Debug, Clone)]
struct PublishedPost {
    chat_id: ChatId,
    message_id: MessageId,
    report: Report,
}

/// The channel where reports are announced.
///
/// Remembers which message belongs to which report so the post can be
/// marked once the report expires. That's kept in memory only; posts made
/// before a restart keep their buttons until someone votes on them.
pub struct Channel {
    destination: Recipient,
    map_link: Option<Url>,
    gone_threshold: u32,
    posts: Mutex<HashMap<ReportId, PublishedPost>>,
}

impl Channel {
    pub fn new(destination: Recipient, map_link: Option<Url>, gone_threshold: u32) -> Channel {
        Channel {
            destination,
            map_link,
            gone_threshold,
            posts: Mutex::new(HashMap::new()),
        }
    }

    /// HTML text of a post about this report.
    pub fn render(&self, report: &Report, status: PostStatus) -> String {
        let mut text = format!(
            "🚓 <b>{}</b>\n📍 <a href=\"{}\">{}</a>\n",
            encode_text(report.description()),
            encode_double_quoted_attribute(report.location().map_link().as_str()),
            encode_text(&report.location().to_string()),
        );

        let _ = match status {
            PostStatus::Active => writeln!(
                text,
                "✅ {}  ❌ {}/{}",
                report.confirm_count(),
                report.retract_count(),
                self.gone_threshold
            ),
            PostStatus::Gone => writeln!(
                text,
                "❌ Gone ({} votes).",
                report.retract_count()
            ),
            PostStatus::Expired => writeln!(text, "⌛ Expired."),
        };

        if let Some(map_link) = &self.map_link {
            let _ = write!(
                text,
                "🌍 <a href=\"{}\">Shared map</a>",
                encode_double_quoted_attribute(map_link.as_str())
            );
        }

        text
    }

    /// Announce a fresh report, with voting buttons under it.
    pub async fn publish(&self, bot: &Bot, report: &Report) -> Result<(), RequestError> {
        let text = self.render(report, PostStatus::Active);
        let keyboard = vote_keyboard(report.id());

        let message = teloxide_retry!(
            bot.send_message(self.destination.clone(), &text)
                .parse_mode(ParseMode::Html)
                .disable_link_preview(true)
                .reply_markup(keyboard.clone())
                .await
        )?;

        self.posts.lock().await.insert(
            report.id(),
            PublishedPost {
                chat_id: message.chat.id,
                message_id: message.id,
                report: report.clone(),
            },
        );

        Ok(())
    }

    /// Rewrite a post to show the report's current state.
    /// Only [`PostStatus::Active`] posts keep their buttons.
    ///
    /// A [`PostStatus::Active`] update for a report the tracker no longer has
    /// is dropped, since whatever finished it rewrites the post on its own.
    pub async fn update(
        &self,
        bot: &Bot,
        tracker: &Tracker,
        chat_id: ChatId,
        message_id: MessageId,
        report: &Report,
        status: PostStatus,
    ) -> Result<(), RequestError> {
        // Held until the edit is done, so edits of a post can't overtake each other.
        let mut posts = self.posts.lock().await;

        match status {
            PostStatus::Active => {
                if tracker.get(report.id()).await.is_none() {
                    log::debug!("Report {} is gone already, leaving its post be", report.id());
                    return Ok(());
                }
                posts.insert(
                    report.id(),
                    PublishedPost {
                        chat_id,
                        message_id,
                        report: report.clone(),
                    },
                );
            }
            PostStatus::Gone | PostStatus::Expired => {
                posts.remove(&report.id());
            }
        }

        self.edit(bot, chat_id, message_id, report, status).await
    }

    /// Mark the post of an expired report as such, if we know where it is.
    pub async fn mark_expired(&self, bot: &Bot, id: ReportId) -> Result<(), RequestError> {
        let mut posts = self.posts.lock().await;

        let Some(post) = posts.remove(&id) else {
            log::debug!("No known post for expired report {}", id);
            return Ok(());
        };

        self.edit(
            bot,
            post.chat_id,
            post.message_id,
            &post.report,
            PostStatus::Expired,
        )
        .await
    }

    async fn edit(
        &self,
        bot: &Bot,
        chat_id: ChatId,
        message_id: MessageId,
        report: &Report,
        status: PostStatus,
    ) -> Result<(), RequestError> {
        let text = self.render(report, status);
        let keyboard = match status {
            PostStatus::Active => vote_keyboard(report.id()),
            PostStatus::Gone | PostStatus::Expired => InlineKeyboardMarkup {
                inline_keyboard: Vec::new(),
            },
        };

        let result = teloxide_retry!(
            bot.edit_message_text(chat_id, message_id, &text)
                .parse_mode(ParseMode::Html)
                .disable_link_preview(true)
                .reply_markup(keyboard.clone())
                .await
        );

        ignore_not_modified(result)
    }

    /// Stop remembering the post of this report.
    pub async fn forget(&self, id: ReportId) {
        self.posts.lock().await.remove(&id);
    }

    /// Remove voting buttons from a post whose report is no longer around.
    pub async fn strip_buttons(
        &self,
        bot: &Bot,
        chat_id: ChatId,
        message_id: MessageId,
    ) -> Result<(), RequestError> {
        let result = teloxide_retry!(
            bot.edit_message_reply_markup(chat_id, message_id)
                .reply_markup(InlineKeyboardMarkup {
                    inline_keyboard: Vec::new(),
                })
                .await
        );

        ignore_not_modified(result)
    }
}

/// "Still there" and "Gone" buttons for this report.
pub fn vote_keyboard(id: ReportId) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![
        InlineKeyboardButton::callback("✅ Still there", Vote::Confirm(id).to_string()),
        InlineKeyboardButton::callback("❌ Gone", Vote::Retract(id).to_string()),
    ]])
}

/// Editing a message into exactly what it already is errors. That's fine by us.
fn ignore_not_modified<T>(result: Result<T, RequestError>) -> Result<(), RequestError> {
    match result {
        Ok(_) | Err(RequestError::Api(ApiError::MessageNotModified)) => Ok(()),
        Err(e) => Err(e),
    }
}

/// Periodically drop expired reports and mark their posts.
///
/// Stops once the tracker is dropped.
pub async fn sweep_expired_spinloop(
    bot: Bot,
    tracker: Weak<Tracker>,
    channel: Arc<Channel>,
    interval: Duration,
) {
    loop {
        let Some(tracker_arc) = tracker.upgrade() else {
            return;
        };

        let removed = match tracker_arc.sweep_expired(Utc::now()).await {
            Ok(removed) => removed,
            Err(e) => {
                log::error!("Failed to sweep expired reports: {}", e);
                Vec::new()
            }
        };
        drop(tracker_arc);

        for id in removed {
            if let Err(e) = channel.mark_expired(&bot, id).await {
                log::warn!("Failed to mark post of report {} as expired: {}", id, e);
            }
        }

        sleep(interval).await;
    }
}
