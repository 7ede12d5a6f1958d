//! Message preprocessing.
//!
//! Two in-place passes run on every freshly decoded message event before it
//! reaches any handler:
//!
//! 1. [`check_reply`] moves a leading quote into [`MessageEvent::reply`].
//! 2. [`check_at_me`] strips a mention of the bot and sets
//!    [`MessageEvent::to_me`].
//!
//! Both passes leave the message non-empty, so handlers can always look at
//! the first segment.

use crate::model::event::{Event, MessageEvent};
use crate::model::message::Message;
use crate::model::segment::Segment;

const NBSP: char = '\u{a0}';

fn ensure_not_empty(message: &mut Message) {
    if message.is_empty() {
        message.push(Segment::text(""));
    }
}

/// Extracts the first quote of the message into `reply`.
///
/// A mention of the bot right after the quote is dropped with it, and the
/// following text loses its leading whitespace.
pub fn check_reply(event: &mut MessageEvent, bot_user_id: &str) {
    let message = &mut event.message;
    let Some(index) = message.index_of("quote") else {
        return;
    };

    event.reply = Some(message.remove(index));

    if message.get(index).is_some_and(|s| s.is_at(bot_user_id)) {
        message.remove(index);
    }
    if let Some(text) = message.get_mut(index).and_then(Segment::as_text_mut) {
        let trimmed = text.trim_start().to_string();
        *text = trimmed;
        if text.is_empty() {
            message.remove(index);
        }
    }

    ensure_not_empty(message);
}

/// Detects a mention of the bot at the start or the end of the message.
///
/// Only one position triggers: when the message starts with the mention the
/// tail is left alone.
pub fn check_at_me(event: &mut MessageEvent, bot_user_id: &str) {
    let message = &mut event.message;
    ensure_not_empty(message);

    if message[0].is_at(bot_user_id) {
        message.remove(0);
        event.to_me = true;
        if let Some(text) = message.get_mut(0).and_then(Segment::as_text_mut) {
            let stripped = text
                .strip_prefix(NBSP)
                .unwrap_or(text.as_str())
                .trim_start()
                .to_string();
            *text = stripped;
            if text.is_empty() {
                message.remove(0);
            }
        }
    } else {
        let mut index = message.len() - 1;
        let trailing_blank = message[index]
            .as_text()
            .is_some_and(|text| text.trim().is_empty());
        if trailing_blank && message.len() >= 2 {
            index -= 1;
        }
        if message[index].is_at(bot_user_id) {
            event.to_me = true;
            message.truncate(index);
        }
    }

    ensure_not_empty(message);
}

/// Runs both passes on a message event; other events are left untouched.
pub fn preprocess(event: &mut Event, bot_user_id: &str) {
    if let Ok(message_event) = event.message_event_mut() {
        check_reply(message_event, bot_user_id);
        check_at_me(message_event, bot_user_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::signal::EventBody;
    use serde_json::json;

    const BOT: &str = "bot";

    fn event_with(content: &str) -> Event {
        let body: EventBody = serde_json::from_value(json!({
            "id": 1,
            "type": "message-created",
            "platform": "discord",
            "self_id": BOT,
            "timestamp": 0,
            "channel": {"id": "c", "type": 0},
            "user": {"id": "u"},
            "message": {"id": "m", "content": content},
        }))
        .unwrap();
        Event::decode(body).unwrap()
    }

    fn message_event(segments: Vec<Segment>) -> MessageEvent {
        let mut event = event_with("");
        let mut inner = event.message_event_mut().unwrap().clone();
        inner.message = Message::from_segments(segments);
        inner
    }

    #[test]
    fn test_leading_mention() {
        let mut event = message_event(vec![Segment::at(BOT), Segment::text(" hello")]);
        check_at_me(&mut event, BOT);
        assert!(event.to_me);
        assert_eq!(event.message, Message::from(vec![Segment::text("hello")]));
    }

    #[test]
    fn test_leading_mention_strips_nbsp() {
        let mut event = message_event(vec![Segment::at(BOT), Segment::text("\u{a0} hi")]);
        check_at_me(&mut event, BOT);
        assert_eq!(event.message.first_text(), Some("hi"));
    }

    #[test]
    fn test_mention_only_leaves_empty_text() {
        let mut event = message_event(vec![Segment::at(BOT), Segment::text("   ")]);
        check_at_me(&mut event, BOT);
        assert!(event.to_me);
        assert_eq!(event.message, Message::from(""));
    }

    #[test]
    fn test_trailing_mention() {
        let mut event = message_event(vec![
            Segment::text("hi "),
            Segment::at(BOT),
            Segment::text(" "),
        ]);
        check_at_me(&mut event, BOT);
        assert!(event.to_me);
        assert_eq!(event.message, Message::from("hi "));
    }

    #[test]
    fn test_single_trigger() {
        let mut event = message_event(vec![
            Segment::at(BOT),
            Segment::text("x"),
            Segment::at(BOT),
        ]);
        check_at_me(&mut event, BOT);
        assert!(event.to_me);
        assert_eq!(event.message.len(), 2);
        assert!(event.message[1].is_at(BOT));
    }

    #[test]
    fn test_other_mentions_ignored() {
        let mut event = message_event(vec![Segment::at("someone"), Segment::text(" hi")]);
        check_at_me(&mut event, BOT);
        assert!(!event.to_me);
        assert_eq!(event.message.len(), 2);
    }

    #[test]
    fn test_reply_extraction() {
        let mut event = message_event(vec![
            Segment::quote("42"),
            Segment::at(BOT),
            Segment::text(" hi"),
        ]);
        check_reply(&mut event, BOT);
        check_at_me(&mut event, BOT);
        let reply = event.reply.as_ref().and_then(Segment::as_quote).unwrap();
        assert_eq!(reply.id.as_deref(), Some("42"));
        assert_eq!(event.message, Message::from(vec![Segment::text("hi")]));
    }

    #[test]
    fn test_reply_only() {
        let mut event = message_event(vec![Segment::quote("1")]);
        check_reply(&mut event, BOT);
        assert!(event.reply.is_some());
        assert_eq!(event.message, Message::from(""));
    }

    #[test]
    fn test_preprocess_from_markup() {
        let mut event = event_with(r#"<quote id="7"/><at id="bot"/> ping"#);
        preprocess(&mut event, BOT);
        let inner = event.message_event().unwrap();
        assert_eq!(inner.message.first_text(), Some("ping"));
        assert_eq!(inner.original_message.len(), 3);
    }
}
