#![allow(dead_code)]

use portage::{
    AccessControl, Action, Authorizer, CacheControl, CallError, HmacAuthorizer, Identity,
    Invocation, Param, Portage, QueueTrigger, ValueType, WebTrigger, testing::echo_action,
};
use serde_json::{Value, json};

pub const SECRET: &str = "integration-secret";

// ============================================================================
// Actions
// ============================================================================

pub fn echo() -> Action {
    echo_action(AccessControl::AllowAll, CacheControl::no_cache()).unwrap()
}

/// Requires the `root` scope.
pub fn reveal_secret() -> Action {
    Action::builder("reveal_secret", |_: Invocation| async {
        Ok::<_, CallError>("classified")
    })
    .returns(ValueType::String)
    .access(AccessControl::scope("root"))
    .trigger(WebTrigger::get())
    .build()
    .unwrap()
}

/// Cached for thirty seconds.
pub fn server_motd() -> Action {
    Action::builder("server_motd", |_: Invocation| async {
        Ok::<_, CallError>(json!({ "motd": "hello" }))
    })
    .cache(CacheControl::ttl(30))
    .trigger(WebTrigger::get())
    .build()
    .unwrap()
}

/// Returns the caller's subject.
pub fn whoami() -> Action {
    Action::builder("whoami", |inv: Invocation| async move {
        let caller = inv.identity("caller").and_then(|id| id.subject);
        Ok::<_, CallError>(caller)
    })
    .identity("caller")
    .access(AccessControl::scope("user"))
    .trigger(WebTrigger::get())
    .build()
    .unwrap()
}

/// Consumes `orders` records one by one; rejects the `bad` SKU.
pub fn record_order() -> Action {
    Action::builder("record_order", |inv: Invocation| async move {
        let sku: String = inv.get("sku")?;
        if sku == "bad" {
            return Err(CallError::execution("unknown sku"));
        }
        Ok(sku)
    })
    .param(Param::typed("sku", ValueType::String))
    .trigger(QueueTrigger::new("orders"))
    .build()
    .unwrap()
}

// ============================================================================
// Assembly
// ============================================================================

pub fn authorizer() -> HmacAuthorizer {
    HmacAuthorizer::new(SECRET)
}

pub fn token(identity: &Identity) -> String {
    authorizer().encode(identity).unwrap()
}

pub fn portage() -> Portage {
    Portage::builder()
        .authorizer(authorizer())
        .action(echo())
        .action(reveal_secret())
        .action(server_motd())
        .action(whoami())
        .action(record_order())
        .build()
        .unwrap()
}

pub fn sqs_record(id: &str, queue: &str, body: Value) -> Value {
    json!({
        "messageId": id,
        "eventSource": "aws:sqs",
        "eventSourceARN": format!("arn:aws:sqs:eu-west-1:123456789012:{queue}"),
        "body": body.to_string(),
    })
}
