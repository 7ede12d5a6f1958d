//! Shared fixtures for the framework tests.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Value, json};

use satori_adapter::model::EventBody;
use satori_adapter::{AdapterConfig, Event, SatoriBot, User};
use satori_core::{HttpClient, HttpRequest, HttpResponse, TransportResult};

/// Records every API request and answers `[]`.
#[derive(Default)]
pub(crate) struct MockHttp {
    pub requests: Mutex<Vec<HttpRequest>>,
}

impl MockHttp {
    /// Contents of every `message.create` call, in order.
    pub(crate) fn sent(&self) -> Vec<String> {
        self.requests
            .lock()
            .iter()
            .filter(|r| r.url.ends_with("/message.create"))
            .filter_map(|r| r.body["content"].as_str().map(str::to_string))
            .collect()
    }
}

#[async_trait]
impl HttpClient for MockHttp {
    async fn post_json(&self, request: HttpRequest) -> TransportResult<HttpResponse> {
        self.requests.lock().push(request);
        Ok(HttpResponse {
            status: 200,
            body: "[]".into(),
        })
    }
}

pub(crate) fn test_bot(http: Arc<MockHttp>) -> Arc<SatoriBot> {
    let config = AdapterConfig {
        host_id: "owner".into(),
        ..Default::default()
    };
    let user = User {
        id: "bot".into(),
        name: Some("Bot".into()),
        nick: None,
        avatar: None,
        is_bot: Some(true),
    };
    Arc::new(SatoriBot::new(
        "bot",
        "discord",
        user,
        Arc::new(config),
        http,
    ))
}

fn decode(value: Value) -> Event {
    let body: EventBody = serde_json::from_value(value).unwrap();
    Event::decode(body).unwrap()
}

/// A `message-created` event in channel `c1` with the given markup.
pub(crate) fn message_event(content: &str, user_id: &str) -> Event {
    decode(json!({
        "id": 1,
        "type": "message-created",
        "platform": "discord",
        "self_id": "bot",
        "timestamp": 1_700_000_000_000_i64,
        "channel": {"id": "c1", "type": 0},
        "guild": {"id": "c1"},
        "user": {"id": user_id, "name": "User"},
        "message": {"id": "m1", "content": content},
    }))
}

/// A `guild-member-added` event in guild `c1`.
pub(crate) fn notice_event() -> Event {
    decode(json!({
        "id": 2,
        "type": "guild-member-added",
        "platform": "discord",
        "self_id": "bot",
        "timestamp": 1_700_000_000_000_i64,
        "guild": {"id": "c1"},
        "member": {},
        "user": {"id": "u9"},
    }))
}
