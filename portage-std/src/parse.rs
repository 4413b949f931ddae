//! Request parsing and result rendering.
//!
//! Where the arguments of a call come from depends on the trigger: the body
//! for body-carrying web methods and queue messages, the query string for
//! other web methods, nothing for timers. Route parameters are merged in
//! last and never override an explicit argument.

use portage_core::{
    Action, CallError, Invocation, Kwargs, Request, Response, Trigger, ValidationError,
};
use serde_json::Value;

/// Where a trigger's arguments are read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgumentSource {
    /// A JSON object body.
    Body,
    /// Query string parameters.
    Query,
    /// No arguments.
    Empty,
}

impl ArgumentSource {
    /// The source used for `trigger`.
    pub fn for_trigger(trigger: &Trigger) -> Self {
        match trigger {
            Trigger::Web(web) if web.carries_body() => ArgumentSource::Body,
            Trigger::Web(_) => ArgumentSource::Query,
            Trigger::Queue(_) => ArgumentSource::Body,
            Trigger::FixedRate(_) => ArgumentSource::Empty,
        }
    }
}

/// Turns a [`Request`] into a validated [`Invocation`].
#[derive(Debug, Clone, Copy)]
pub struct RequestParser {
    source: ArgumentSource,
}

impl RequestParser {
    /// A parser reading from `source`.
    pub fn new(source: ArgumentSource) -> Self {
        Self { source }
    }

    /// The parser for `trigger`.
    pub fn for_trigger(trigger: &Trigger) -> Self {
        Self::new(ArgumentSource::for_trigger(trigger))
    }

    /// Where arguments are read from.
    pub fn source(&self) -> ArgumentSource {
        self.source
    }

    /// Collect the wire arguments of `request` and load them through the
    /// action's parameter schema.
    pub fn parse(&self, action: &Action, request: &Request) -> Result<Invocation, CallError> {
        let mut wire = self.collect(request)?;
        for (key, value) in &request.path_params {
            wire.entry(key.clone())
                .or_insert_with(|| Value::String(value.clone()));
        }
        // Identities are only ever injected by the authorization adapter.
        if let Some(identity) = action.identity_param() {
            wire.remove(identity);
        }
        match action.param_schema().load(Value::Object(wire))? {
            Value::Object(args) => Ok(Invocation::new(args)),
            _ => Err(ValidationError::new("", "parameters must load to an object").into()),
        }
    }

    fn collect(&self, request: &Request) -> Result<Kwargs, CallError> {
        match self.source {
            ArgumentSource::Empty => Ok(Kwargs::new()),
            ArgumentSource::Query => Ok(request
                .query
                .iter()
                .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                .collect()),
            ArgumentSource::Body => match &request.body {
                None | Some(Value::Null) => Ok(Kwargs::new()),
                Some(Value::Object(map)) => Ok(map.clone()),
                Some(_) => Err(ValidationError::new("", "expected a JSON object body").into()),
            },
        }
    }
}

/// Dumps a result through the action's result schema.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResultRenderer;

impl ResultRenderer {
    /// Dump and validate `result`, producing a `200` response.
    ///
    /// A result that does not satisfy its schema is a server fault.
    pub fn render(&self, action: &Action, result: Value) -> Result<Response, CallError> {
        let schema = action.result_schema();
        let wire = schema.dump(result).map_err(CallError::Render)?;
        schema.validate(&wire).map_err(CallError::Render)?;
        Ok(Response::ok(wire))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use portage_core::{
        FixedRateTrigger, Param, QueueTrigger, ValueType, WebTrigger, http::StatusCode,
    };
    use serde_json::json;

    fn add() -> Action {
        Action::builder("add", |inv: Invocation| async move {
            Ok::<_, CallError>(inv.get::<i64>("a")? + inv.get::<i64>("b")?)
        })
        .param(Param::typed("a", ValueType::Integer))
        .param(Param::typed("b", ValueType::Integer).default_value(json!(1)))
        .identity("caller")
        .returns(ValueType::Integer)
        .build()
        .unwrap()
    }

    #[test]
    fn sources_follow_trigger() {
        let source = |t: Trigger| ArgumentSource::for_trigger(&t);
        assert_eq!(source(WebTrigger::get().into()), ArgumentSource::Query);
        assert_eq!(source(WebTrigger::post().into()), ArgumentSource::Body);
        assert_eq!(source(QueueTrigger::new("q").into()), ArgumentSource::Body);
        assert_eq!(source(FixedRateTrigger::every_secs(5).into()), ArgumentSource::Empty);
    }

    #[test]
    fn query_values_are_coerced() {
        let parser = RequestParser::new(ArgumentSource::Query);
        let inv = parser
            .parse(&add(), &Request::get("/").with_query("a", "41"))
            .unwrap();
        assert_eq!(inv.arg("a"), Some(&json!(41)));
        assert_eq!(inv.arg("b"), Some(&json!(1)));
    }

    #[test]
    fn path_params_do_not_override_arguments() {
        let parser = RequestParser::new(ArgumentSource::Body);
        let mut request = Request::post("/", json!({ "a": 2 }));
        request.path_params.insert("a".into(), "9".into());
        request.path_params.insert("b".into(), "3".into());
        let inv = parser.parse(&add(), &request).unwrap();
        assert_eq!(inv.arg("a"), Some(&json!(2)));
        assert_eq!(inv.arg("b"), Some(&json!(3)));
    }

    #[test]
    fn caller_supplied_identity_is_dropped() {
        let parser = RequestParser::new(ArgumentSource::Body);
        let inv = parser
            .parse(&add(), &Request::post("/", json!({ "a": 1, "caller": { "sub": "root" } })))
            .unwrap();
        assert!(inv.arg("caller").is_none());
    }

    #[test]
    fn bad_input_is_a_validation_error() {
        let parser = RequestParser::new(ArgumentSource::Body);
        let err = parser
            .parse(&add(), &Request::post("/", json!([1, 2])))
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let err = parser
            .parse(&add(), &Request::post("/", json!({ "b": 2 })))
            .unwrap_err();
        assert!(matches!(err, CallError::Validation(_)));
    }

    #[test]
    fn render_checks_result_schema() {
        let renderer = ResultRenderer;
        let ok = renderer.render(&add(), json!(3)).unwrap();
        assert_eq!(ok.body, Some(json!(3)));

        let err = renderer.render(&add(), json!("three")).unwrap_err();
        assert!(matches!(err, CallError::Render(_)));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
