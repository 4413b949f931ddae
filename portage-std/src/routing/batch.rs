//! Batched queue and topic records.
//!
//! Recognised by a `Records` list. Queue records (`eventSource: "aws:sqs"`)
//! carry a JSON `body`; topic records (`EventSource: "aws:sns"`) carry a
//! JSON `Sns.Message`. Records are grouped by the queue or topic name at
//! the end of their source ARN.
//!
//! An action subscribed with [`QueueTrigger::new`] is called once per
//! record with the record's object as arguments. One subscribed with
//! [`QueueTrigger::batched`] is called once per delivery with
//! `{ "records": [...] }`.
//!
//! The reply lists the records to redeliver:
//! `{ "batchItemFailures": [{ "itemIdentifier": id }] }`.
//!
//! [`QueueTrigger::new`]: portage_core::QueueTrigger::new
//! [`QueueTrigger::batched`]: portage_core::QueueTrigger::batched

use super::BATCH_PRIORITY;
use futures::future::{BoxFuture, FutureExt, join_all};
use portage_core::{
    BoxHandler, Endpoint, EventHandler, EventRouter, Request, RoutingError, SharedEndpoint,
    first_usable,
};
use serde_json::{Value, json};
use std::collections::HashMap;

/// Routes record batches to queue-triggered endpoints.
#[derive(Default)]
pub struct BatchRouter {
    queues: HashMap<String, Vec<SharedEndpoint>>,
}

impl BatchRouter {
    /// Index every queue-triggered endpoint in `endpoints` by queue name.
    pub fn new<I>(endpoints: I) -> Self
    where
        I: IntoIterator<Item = SharedEndpoint>,
    {
        let mut queues: HashMap<String, Vec<SharedEndpoint>> = HashMap::new();
        for endpoint in endpoints {
            if let Some(queue) = endpoint.route().trigger.as_queue() {
                queues.entry(queue.queue.clone()).or_default().push(endpoint.clone());
            }
        }
        Self { queues }
    }

    /// Names of the queues with subscribers.
    pub fn queues(&self) -> impl Iterator<Item = &str> {
        self.queues.keys().map(String::as_str)
    }
}

impl EventRouter for BatchRouter {
    fn name(&self) -> &'static str {
        "batch"
    }

    fn priority(&self) -> i32 {
        BATCH_PRIORITY
    }

    fn create_handler<'a>(&'a self, event: &Value) -> Result<Option<BoxHandler<'a>>, RoutingError> {
        let Some(records) = event.get("Records").and_then(Value::as_array) else {
            return Ok(None);
        };
        if records.is_empty() {
            return Err(RoutingError::MalformedEvent("empty `Records`".into()));
        }
        let candidates: Vec<BoxHandler<'a>> = vec![
            Box::new(RecordsHandler {
                router: self,
                source: RecordSource::Queue,
            }),
            Box::new(RecordsHandler {
                router: self,
                source: RecordSource::Topic,
            }),
        ];
        first_usable(candidates, event)
            .map(Some)
            .ok_or_else(|| RoutingError::MalformedEvent("unsupported record source".into()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RecordSource {
    Queue,
    Topic,
}

/// One decoded record.
struct Message {
    id: String,
    queue: String,
    payload: Option<Value>,
}

impl RecordSource {
    fn accepts(self, record: &Value) -> bool {
        match self {
            RecordSource::Queue => {
                record.get("eventSource").and_then(Value::as_str) == Some("aws:sqs")
            }
            RecordSource::Topic => {
                record.get("EventSource").and_then(Value::as_str) == Some("aws:sns")
            }
        }
    }

    fn decode(self, record: &Value) -> Message {
        let (id, arn, body) = match self {
            RecordSource::Queue => ("/messageId", "/eventSourceARN", "/body"),
            RecordSource::Topic => ("/Sns/MessageId", "/Sns/TopicArn", "/Sns/Message"),
        };
        let text = |pointer: &str| {
            record
                .pointer(pointer)
                .and_then(Value::as_str)
                .unwrap_or_default()
        };
        let arn = text(arn);
        Message {
            id: text(id).to_string(),
            queue: arn.rsplit(':').next().unwrap_or(arn).to_string(),
            payload: serde_json::from_str(text(body)).ok(),
        }
    }
}

struct RecordsHandler<'a> {
    router: &'a BatchRouter,
    source: RecordSource,
}

impl RecordsHandler<'_> {
    async fn deliver(&self, queue: &str, messages: &[&Message]) -> Vec<String> {
        let Some(endpoints) = self.router.queues.get(queue) else {
            tracing::warn!(queue, records = messages.len(), "no subscriber for queue");
            return messages.iter().map(|m| m.id.clone()).collect();
        };
        let mut failed: Vec<String> = messages
            .iter()
            .filter(|m| m.payload.is_none())
            .map(|m| m.id.clone())
            .collect();
        if !failed.is_empty() {
            tracing::warn!(queue, records = failed.len(), "undecodable records");
        }
        let decoded: Vec<&Message> = messages
            .iter()
            .copied()
            .filter(|m| m.payload.is_some())
            .collect();

        for endpoint in endpoints {
            let batched = endpoint.route().trigger.as_queue().is_some_and(|q| q.batch);
            if batched {
                let records: Vec<Value> =
                    decoded.iter().filter_map(|m| m.payload.clone()).collect();
                let response = endpoint
                    .call(Request::post(queue, json!({ "records": records })))
                    .await;
                if !response.is_success() {
                    failed.extend(decoded.iter().map(|m| m.id.clone()));
                }
            } else {
                let calls = decoded.iter().map(|m| async move {
                    let body = m.payload.clone().unwrap_or(Value::Null);
                    (m, endpoint.call(Request::post(queue, body)).await)
                });
                for (message, response) in join_all(calls).await {
                    if !response.is_success() {
                        failed.push(message.id.clone());
                    }
                }
            }
        }
        failed
    }
}

impl EventHandler for RecordsHandler<'_> {
    fn name(&self) -> &'static str {
        match self.source {
            RecordSource::Queue => "batch-queue",
            RecordSource::Topic => "batch-topic",
        }
    }

    fn is_usable(&self, event: &Value) -> bool {
        event
            .get("Records")
            .and_then(Value::as_array)
            .is_some_and(|records| records.iter().all(|r| self.source.accepts(r)))
    }

    fn handle(&self, event: Value) -> BoxFuture<'_, Value> {
        async move {
            let records = event
                .get("Records")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();
            let messages: Vec<Message> = records.iter().map(|r| self.source.decode(r)).collect();

            // Group by queue, keeping first-seen order.
            let mut order: Vec<&str> = Vec::new();
            let mut groups: HashMap<&str, Vec<&Message>> = HashMap::new();
            for message in &messages {
                let queue = message.queue.as_str();
                if !groups.contains_key(queue) {
                    order.push(queue);
                }
                groups.entry(queue).or_default().push(message);
            }

            let mut failures: Vec<String> = Vec::new();
            for queue in order {
                for id in self.deliver(queue, &groups[queue]).await {
                    if !failures.contains(&id) {
                        failures.push(id);
                    }
                }
            }
            if !failures.is_empty() {
                tracing::warn!(failed = failures.len(), total = messages.len(), "records failed");
            }
            let failures: Vec<Value> = failures
                .into_iter()
                .map(|id| json!({ "itemIdentifier": id }))
                .collect();
            json!({ "batchItemFailures": failures })
        }
        .boxed()
    }
}
