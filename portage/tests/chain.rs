use portage::{
    AccessControl, Action, AdapterFactory, BoxEndpoint, CacheControl, CallError, Chain,
    ConfigurationError, Endpoint, FactoryChain, Identity, Invocation, Param, Request, Response,
    RouteInfo, SchemaDoc, Trigger, TriggerKind, ValueType, WebTrigger,
    adapters::{AuthorizationFactory, BaseEndpointFactory, CachingFactory, SelfBindingFactory},
    http::{HeaderValue, StatusCode, header},
    route::RouteStyle,
    testing::{RecordingFactory, StaticAuthorizer, echo_action},
};
use serde_json::{Value, json};
use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

// ============================================================================
// A custom decorator
// ============================================================================

/// Adds an `x-served-by` header to whatever the rest of the chain builds.
struct StampFactory;

struct Stamped {
    inner: BoxEndpoint,
}

impl AdapterFactory for StampFactory {
    fn name(&self) -> &'static str {
        "stamp"
    }

    fn priority(&self) -> i32 {
        500
    }

    fn create(
        &self,
        action: &Action,
        trigger: &Trigger,
        remaining: Chain<'_>,
    ) -> Result<Option<BoxEndpoint>, ConfigurationError> {
        Ok(remaining
            .build(action, trigger)?
            .map(|inner| Box::new(Stamped { inner }) as BoxEndpoint))
    }
}

impl Endpoint for Stamped {
    fn route(&self) -> &RouteInfo {
        self.inner.route()
    }

    fn action(&self) -> &Action {
        self.inner.action()
    }

    async fn parse(&self, request: &Request) -> Result<Invocation, CallError> {
        self.inner.parse(request).await
    }

    async fn invoke(&self, invocation: Invocation) -> Result<Value, CallError> {
        self.inner.invoke(invocation).await
    }

    fn render(&self, request: &Request, result: Value) -> Result<Response, CallError> {
        let mut response = self.inner.render(request, result)?;
        response
            .headers
            .insert("x-served-by", HeaderValue::from_static("stamp"));
        Ok(response)
    }

    fn describe(&self, doc: &mut SchemaDoc) {
        self.inner.describe(doc)
    }
}

const ROOT_TOKEN: &str = "root-token";

fn web_chain(extra: Option<StampFactory>) -> FactoryChain {
    let authorizer = StaticAuthorizer::new()
        .with_token(ROOT_TOKEN, Identity::new("ada").with_scope("root"));
    let mut builder = FactoryChain::builder()
        .with(SelfBindingFactory)
        .with(AuthorizationFactory::new(authorizer))
        .with(CachingFactory)
        .with(BaseEndpointFactory::for_kinds(RouteStyle::default(), [TriggerKind::Web]));
    if let Some(stamp) = extra {
        builder = builder.with(stamp);
    }
    builder.build().unwrap()
}

fn get_trigger() -> Trigger {
    WebTrigger::get().into()
}

// ============================================================================
// Mixed workload
// ============================================================================

struct Greeter {
    greeting: &'static str,
}

type Outcome = (String, StatusCode, Option<String>, Option<Value>);

/// One open, one scoped, one cached and one receiver-bound action, each
/// paired with the request that exercises it.
fn mixed_cases(resolved: Arc<AtomicUsize>) -> Vec<(Action, Request)> {
    let open = echo_action(AccessControl::AllowAll, CacheControl::no_cache()).unwrap();

    let scoped = Action::builder("purge", |inv: Invocation| async move {
        inv.get::<String>("target")
    })
    .param(Param::typed("target", ValueType::String))
    .access(AccessControl::scope("root"))
    .trigger(WebTrigger::get())
    .build()
    .unwrap();

    let cached = Action::builder("motd", |_: Invocation| async {
        Ok::<_, CallError>(json!({ "motd": "hello" }))
    })
    .cache(CacheControl::ttl(60))
    .trigger(WebTrigger::get())
    .build()
    .unwrap();

    let bound = Action::builder("greet", |inv: Invocation| async move {
        let greeter = inv
            .receiver::<Greeter>()
            .ok_or_else(|| CallError::execution("unbound"))?;
        Ok::<_, CallError>(format!("{}, {}", greeter.greeting, inv.get::<String>("name")?))
    })
    .param(Param::typed("name", ValueType::String))
    .receiver("greeter", move || {
        resolved.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(Greeter { greeting: "hello" }))
    })
    .trigger(WebTrigger::post())
    .build()
    .unwrap();

    vec![
        (open, Request::get("/actions/echo").with_query("val", "x")),
        (scoped.clone(), Request::get("/actions/purge").with_query("target", "t")),
        (
            scoped,
            Request::get("/actions/purge")
                .with_query("target", "t")
                .with_bearer(ROOT_TOKEN),
        ),
        (cached, Request::get("/actions/motd")),
        (bound, Request::post("/actions/greet", json!({ "name": "ada" }))),
    ]
}

/// Build a fresh endpoint per case from `chain` and call it once.
async fn exercise(chain: &FactoryChain, cases: &[(Action, Request)]) -> Vec<Outcome> {
    let mut outcomes = Vec::with_capacity(cases.len());
    for (action, request) in cases {
        let trigger = action.triggers()[0].clone();
        let endpoint = chain.build_endpoint(action, &trigger).unwrap().unwrap();
        let response = endpoint.call(request.clone()).await;
        let etag = response.header(header::ETAG).map(str::to_string);
        outcomes.push((action.name().to_string(), response.status, etag, response.body));
    }
    outcomes
}

// ============================================================================
// Tests
// ============================================================================

#[test]
fn factories_are_consulted_highest_priority_first() {
    let log = RecordingFactory::log();
    let chain = FactoryChain::builder()
        .with(RecordingFactory::new("p100", 100, log.clone()))
        .with(RecordingFactory::new("p50", 50, log.clone()))
        .with(RecordingFactory::new("p200", 200, log.clone()))
        .with(RecordingFactory::new("p150", 150, log.clone()))
        .build()
        .unwrap();
    let action = echo_action(AccessControl::AllowAll, CacheControl::no_cache()).unwrap();
    assert!(chain.build_endpoint(&action, &get_trigger()).unwrap().is_none());
    assert_eq!(*log.lock().unwrap(), vec!["p200", "p150", "p100", "p50"]);
}

#[tokio::test]
async fn open_actions_pass_through_the_decorators_untouched() {
    let action = echo_action(AccessControl::AllowAll, CacheControl::no_cache()).unwrap();
    let full = web_chain(None).build_endpoint(&action, &get_trigger()).unwrap().unwrap();
    let plain = FactoryChain::builder()
        .with(BaseEndpointFactory::for_kinds(RouteStyle::default(), [TriggerKind::Web]))
        .build()
        .unwrap()
        .build_endpoint(&action, &get_trigger())
        .unwrap()
        .unwrap();

    let request = || Request::get("/actions/echo").with_query("val", "same");
    assert_eq!(full.call(request()).await, plain.call(request()).await);
    assert_eq!(full.route(), plain.route());
}

#[tokio::test]
async fn custom_decorators_wrap_the_remainder() {
    let chain = web_chain(Some(StampFactory));
    let open = echo_action(AccessControl::AllowAll, CacheControl::no_cache()).unwrap();
    let endpoint = chain.build_endpoint(&open, &get_trigger()).unwrap().unwrap();
    let response = endpoint
        .call(Request::get("/actions/echo").with_query("val", "x"))
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.headers.get("x-served-by").unwrap(), "stamp");

    // Authorization still runs underneath the stamp.
    let guarded = echo_action(AccessControl::scope("root"), CacheControl::no_cache()).unwrap();
    let endpoint = chain.build_endpoint(&guarded, &get_trigger()).unwrap().unwrap();
    let response = endpoint
        .call(Request::get("/actions/echo").with_query("val", "x"))
        .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);

    let mut doc = SchemaDoc::default();
    endpoint.describe(&mut doc);
    assert_eq!(doc.find("echo").unwrap().required_scope.as_deref(), Some("root"));
}

#[tokio::test]
async fn receivers_are_bound_once_per_endpoint() {
    struct Counter {
        hits: AtomicUsize,
    }

    let resolved = Arc::new(AtomicUsize::new(0));
    let resolutions = resolved.clone();
    let action = Action::builder("bump", |inv: Invocation| async move {
        let counter = inv
            .receiver::<Counter>()
            .ok_or_else(|| CallError::execution("unbound"))?;
        Ok::<_, CallError>(counter.hits.fetch_add(1, Ordering::SeqCst) + 1)
    })
    .receiver("counter", move || {
        resolutions.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(Counter {
            hits: AtomicUsize::new(0),
        }))
    })
    .trigger(WebTrigger::post())
    .build()
    .unwrap();

    let trigger: Trigger = WebTrigger::post().into();
    let endpoint = web_chain(None).build_endpoint(&action, &trigger).unwrap().unwrap();
    for expected in 1..=3 {
        let response = endpoint.call(Request::post("/actions/bump", json!({}))).await;
        assert_eq!(response.body, Some(json!(expected)));
    }
    assert_eq!(resolved.load(Ordering::SeqCst), 1);
}

#[test]
fn two_terminals_for_one_kind_are_rejected() {
    let err = FactoryChain::builder()
        .with(BaseEndpointFactory::for_kinds(RouteStyle::default(), [TriggerKind::Web]))
        .with(BaseEndpointFactory::new(RouteStyle::default()))
        .build()
        .unwrap_err();
    assert!(matches!(
        err,
        ConfigurationError::ConflictingTerminals {
            kind: TriggerKind::Web,
            ..
        }
    ));
    assert_eq!(
        FactoryChain::builder()
            .with(BaseEndpointFactory::new(RouteStyle::default()))
            .build()
            .unwrap()
            .names(),
        vec!["base"]
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn one_chain_serves_concurrent_builds() {
    let resolved = Arc::new(AtomicUsize::new(0));
    let cases = Arc::new(mixed_cases(resolved.clone()));
    let chain = Arc::new(web_chain(None));

    let expected = exercise(&chain, &cases).await;
    let statuses: Vec<StatusCode> = expected.iter().map(|o| o.1).collect();
    assert_eq!(
        statuses,
        vec![
            StatusCode::OK,
            StatusCode::UNAUTHORIZED,
            StatusCode::OK,
            StatusCode::OK,
            StatusCode::OK
        ]
    );
    assert!(expected[3].2.is_some());
    assert_eq!(expected[4].3, Some(json!("hello, ada")));

    const TASKS: usize = 8;
    let tasks: Vec<_> = (0..TASKS)
        .map(|i| {
            let chain = chain.clone();
            let cases = cases.clone();
            tokio::spawn(async move {
                // Each task walks the actions starting at a different one.
                let shift = i % cases.len();
                let mut order = cases.to_vec();
                order.rotate_left(shift);
                let mut outcomes = exercise(&chain, &order).await;
                outcomes.rotate_right(shift);
                outcomes
            })
        })
        .collect();
    for task in tasks {
        assert_eq!(task.await.unwrap(), expected);
    }

    // Every build binds its own receiver, resolved exactly once.
    assert_eq!(resolved.load(Ordering::SeqCst), TASKS + 1);
}
