use std::sync::Arc;

use arch_bot_commons::useful_methods::MessageStuff;
use teloxide::{
    payloads::{AnswerCallbackQuerySetters, SendMessageSetters},
    prelude::Requester,
    sugar::request::RequestReplyExt,
    types::{
        BotCommand, ButtonRequest, CallbackQuery, KeyboardButton, KeyboardMarkup, Me, Message,
    },
    Bot, RequestError,
};

use crate::{
    actions::{Channel, PostStatus},
    geocoding::resolve_location,
    parsing::{CoordinatesInput, CoordinatesParseError, Vote},
    reports::{self, Location, Tracker},
    AddressGeocoder,
};

static SEND_LOCATION_BUTTON: &str = "📍 Send location";
static ADD_ADDRESS_BUTTON: &str = "🏠 Add address";

static HELP: &str = "
Spotted a traffic police checkpoint? Tell everyone!

• Press \"📍 Send location\" to report it right where you are.
• Or send an address, like <code>Tverskaya 1, Moscow</code>.
• Or send coordinates with an optional description, like
<code>55.7512, 37.6184, two cars by the bridge</code>.

Reports get posted to the channel, where people can vote on whether it's still there.";

pub fn generate_bot_commands() -> Vec<BotCommand> {
    vec![
        BotCommand::new("start", "Report a checkpoint"),
        BotCommand::new("help", "How to use this bot"),
    ]
}

fn main_keyboard() -> KeyboardMarkup {
    KeyboardMarkup::new(vec![vec![
        KeyboardButton::new(SEND_LOCATION_BUTTON).request(ButtonRequest::Location),
        KeyboardButton::new(ADD_ADDRESS_BUTTON),
    ]])
    .resize_keyboard()
}

pub async fn handle_message(
    bot: Bot,
    me: Me,
    message: Message,
    tracker: Arc<Tracker>,
    channel: Arc<Channel>,
    geocoder: Arc<AddressGeocoder>,
) -> Result<(), RequestError> {
    // Reports are only taken in DMs. In groups this bot would just be noise.
    if !message.chat.is_private() {
        return Ok(());
    }

    if let Some(location) = message.location_full() {
        let location = Location::coordinates(location.latitude, location.longitude);
        return submit_report(
            &bot,
            &message,
            &tracker,
            &channel,
            message.venue_title(),
            location,
        )
        .await;
    }

    let Some(text) = message.text_full() else {
        return Ok(());
    };
    let text = text.trim();

    if handle_command(&bot, &me, &message, text).await? {
        return Ok(());
    }

    if text == ADD_ADDRESS_BUTTON {
        bot.send_message(
            message.chat.id,
            concat!(
                "Send the address, like <code>Tverskaya 1, Moscow</code>.\n",
                "Or coordinates, like <code>55.7512, 37.6184, two cars</code>."
            ),
        )
        .parse_mode(teloxide::types::ParseMode::Html)
        .await?;
        return Ok(());
    }

    if text == SEND_LOCATION_BUTTON {
        // Pressed on a client that can't share location.
        bot.send_message(
            message.chat.id,
            "Could not get your location. Try sending the address instead.",
        )
        .await?;
        return Ok(());
    }

    match text.parse::<CoordinatesInput>() {
        Ok(input) => {
            submit_report(
                &bot,
                &message,
                &tracker,
                &channel,
                input.description.as_deref(),
                Location::coordinates(input.latitude, input.longitude),
            )
            .await
        }
        Err(e @ CoordinatesParseError::OutOfRange) => {
            bot.send_message(message.chat.id, format!("Those coordinates are off: {e}."))
                .reply_to(message.id)
                .await?;
            Ok(())
        }
        Err(CoordinatesParseError::NotCoordinates) => {
            let location = resolve_location(&*geocoder, text).await;
            submit_report(&bot, &message, &tracker, &channel, None, location).await
        }
    }
}

/// Returns `true` if a command was parsed and responded to.
async fn handle_command(
    bot: &Bot,
    me: &Me,
    message: &Message,
    text: &str,
) -> Result<bool, RequestError> {
    // Check if it starts with "/", like how a command should.
    if !text.starts_with('/') {
        return Ok(false);
    }
    // Get first word in the message, the command itself.
    let Some(command) = text.split_whitespace().next() else {
        return Ok(false);
    };

    // Trim the bot's username from the command and convert to lowercase.
    let username = format!("@{}", me.username());
    let command = command.trim_end_matches(username.as_str()).to_lowercase();

    match command.as_str() {
        "/start" => {
            bot.send_message(message.chat.id, "Hi! How do you want to report a checkpoint?")
                .reply_markup(main_keyboard())
                .await?;
        }
        // Any other command gets the help message.
        _ => {
            bot.send_message(message.chat.id, HELP)
                .parse_mode(teloxide::types::ParseMode::Html)
                .reply_markup(main_keyboard())
                .await?;
        }
    }

    Ok(true)
}

async fn submit_report(
    bot: &Bot,
    message: &Message,
    tracker: &Tracker,
    channel: &Channel,
    description: Option<&str>,
    location: Location,
) -> Result<(), RequestError> {
    let report = match tracker.create_report(description, location).await {
        Ok(report) => report,
        Err(reports::Error::InvalidLocation) => {
            bot.send_message(
                message.chat.id,
                "Could not make sense of that location. Try an address or coordinates.",
            )
            .reply_to(message.id)
            .await?;
            return Ok(());
        }
        Err(e) => {
            log::error!("Failed to create a report: {}", e);
            bot.send_message(
                message.chat.id,
                "Something broke while saving the report. Please try again.",
            )
            .reply_to(message.id)
            .await?;
            return Ok(());
        }
    };

    if let Err(e) = channel.publish(bot, &report).await {
        log::error!("Failed to publish report {}: {:#?}", report.id(), e);
        bot.send_message(
            message.chat.id,
            "The report was saved, but posting it to the channel failed.",
        )
        .reply_to(message.id)
        .await?;
        return Ok(());
    }

    bot.send_message(
        message.chat.id,
        format!("Report #{} added, thanks!", report.id()),
    )
    .reply_to(message.id)
    .reply_markup(main_keyboard())
    .await?;

    Ok(())
}

pub async fn handle_callback_query(
    bot: Bot,
    query: CallbackQuery,
    tracker: Arc<Tracker>,
    channel: Arc<Channel>,
) -> Result<(), RequestError> {
    macro_rules! goodbye {
        ($text:expr) => {
            bot.answer_callback_query(query.id.clone())
                .text($text)
                .await?;
            return Ok(());
        };
    }

    let Some(vote) = query
        .data
        .as_deref()
        .and_then(|data| data.parse::<Vote>().ok())
    else {
        goodbye!("Unknown button.");
    };

    // May be missing if the message is too old.
    let post = query
        .regular_message()
        .map(|message| (message.chat.id, message.id));

    let outcome = match vote {
        Vote::Confirm(id) => tracker
            .confirm(id)
            .await
            .map(|report| (report, PostStatus::Active)),
        Vote::Retract(id) => tracker.retract(id).await.map(|result| {
            let status = match result.removed {
                true => PostStatus::Gone,
                false => PostStatus::Active,
            };
            (result.report, status)
        }),
    };

    match outcome {
        Ok((report, status)) => {
            if let Some((chat_id, message_id)) = post {
                if let Err(e) = channel
                    .update(&bot, &tracker, chat_id, message_id, &report, status)
                    .await
                {
                    log::warn!("Failed to update post of report {}: {}", report.id(), e);
                }
            }

            goodbye!(match status {
                PostStatus::Gone => "Thanks! It's marked as gone now.",
                _ => "Thanks, vote counted!",
            });
        }
        Err(reports::Error::NotFound(id)) => {
            channel.forget(id).await;
            if let Some((chat_id, message_id)) = post {
                if let Err(e) = channel.strip_buttons(&bot, chat_id, message_id).await {
                    log::warn!("Failed to strip buttons of report {}: {}", id, e);
                }
            }

            goodbye!("This report is no longer tracked.");
        }
        Err(e) => {
            log::error!("Failed to apply vote {}: {}", vote, e);
            goodbye!("Something broke while saving your vote. Please try again.");
        }
    }
}
