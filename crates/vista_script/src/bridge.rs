//! Script bridge: evaluate program text, marshal the result
//!
//! Every call builds a fresh QuickJS runtime and context, evaluates the
//! program, and converts the outcome into a [`ScriptValue`]. State never
//! survives a call; the capture global never leaks into the next one.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use rquickjs::{CatchResultExt, CaughtError, Context, Function, Runtime, Type, Value};
use tracing::trace;

use crate::error::ScriptError;
use crate::value::ScriptValue;

/// Global function a server-rendering bundle calls to hand markup back.
/// The captured string wins over the program's completion value.
pub const CAPTURE_BINDING: &str = "__vista_set_html";

/// Largest float that still identifies an exact integer.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

/// Stateless script evaluator.
///
/// A global assigned in one call is never observable in a later call, and a
/// failed call never poisons the bridge. Server-rendering script authors
/// must not rely on globals across evaluations.
#[derive(Debug, Clone, Default)]
pub struct ScriptBridge {
    memory_limit: Option<usize>,
}

impl ScriptBridge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cap the per-call QuickJS heap. Unlimited by default.
    pub fn with_memory_limit(mut self, bytes: usize) -> Self {
        self.memory_limit = Some(bytes);
        self
    }

    /// Evaluate `source` in a fresh isolated context.
    ///
    /// Runs on the blocking pool; evaluation itself is CPU-bound.
    pub async fn run(&self, source: &str) -> Result<ScriptValue, ScriptError> {
        let source = source.to_owned();
        let memory_limit = self.memory_limit;
        tokio::task::spawn_blocking(move || evaluate(&source, memory_limit))
            .await
            .map_err(|err| ScriptError::Execution(format!("script task failed: {err}")))?
    }
}

fn evaluate(source: &str, memory_limit: Option<usize>) -> Result<ScriptValue, ScriptError> {
    let runtime = Runtime::new().map_err(|err| ScriptError::Execution(err.to_string()))?;
    if let Some(limit) = memory_limit {
        runtime.set_memory_limit(limit);
    }
    let context =
        Context::full(&runtime).map_err(|err| ScriptError::Execution(err.to_string()))?;

    context.with(|ctx| {
        let captured: Rc<RefCell<Option<String>>> = Rc::new(RefCell::new(None));
        let slot = Rc::clone(&captured);
        let capture_fn = Function::new(ctx.clone(), move |html: String| {
            *slot.borrow_mut() = Some(html);
        })
        .map_err(|err| ScriptError::Execution(err.to_string()))?;
        ctx.globals()
            .set(CAPTURE_BINDING, capture_fn)
            .map_err(|err| ScriptError::Execution(err.to_string()))?;

        let value = ctx
            .eval::<Value, _>(source)
            .catch(&ctx)
            .map_err(execution_error)?;

        if let Some(html) = captured.borrow_mut().take() {
            trace!(bytes = html.len(), "captured server-rendered markup");
            return Ok(ScriptValue::Str(html));
        }
        convert_value(&value)
    })
}

fn execution_error(err: CaughtError<'_>) -> ScriptError {
    let message = match err {
        CaughtError::Exception(exception) => exception
            .message()
            .unwrap_or_else(|| "unknown script exception".to_owned()),
        CaughtError::Value(value) => value
            .as_string()
            .and_then(|text| text.to_string().ok())
            .unwrap_or_else(|| format!("{value:?}")),
        CaughtError::Error(error) => error.to_string(),
    };
    ScriptError::Execution(message)
}

fn convert_value(value: &Value<'_>) -> Result<ScriptValue, ScriptError> {
    if value.is_null() {
        return Ok(ScriptValue::Null);
    }
    if let Some(flag) = value.as_bool() {
        return Ok(ScriptValue::Bool(flag));
    }
    if let Some(int) = value.as_int() {
        return Ok(ScriptValue::Int(int.into()));
    }
    if let Some(number) = value.as_float() {
        return convert_number(number);
    }
    if let Some(text) = value.as_string() {
        let text = text
            .to_string()
            .map_err(|err| ScriptError::Execution(err.to_string()))?;
        return Ok(ScriptValue::Str(text));
    }
    if let Some(array) = value.as_array() {
        let mut items = Vec::with_capacity(array.len());
        for item in array.iter::<Value>() {
            let item = item.map_err(|err| ScriptError::Execution(err.to_string()))?;
            items.push(convert_value(&item)?);
        }
        return Ok(ScriptValue::Seq(items));
    }
    // Plain objects only: functions, constructors, promises, exceptions, and
    // modules carry their own type tag and fall through to the rejection.
    if value.type_of() == Type::Object {
        if let Some(object) = value.as_object() {
            let mut entries = BTreeMap::new();
            for prop in object.props::<String, Value>() {
                let (key, item) =
                    prop.map_err(|err| ScriptError::Execution(err.to_string()))?;
                entries.insert(key, convert_value(&item)?);
            }
            return Ok(ScriptValue::Map(entries));
        }
    }
    Err(ScriptError::UnsupportedValue(value.type_name().to_owned()))
}

fn convert_number(number: f64) -> Result<ScriptValue, ScriptError> {
    if !number.is_finite() {
        return Err(ScriptError::UnsupportedValue("non-finite number".to_owned()));
    }
    if number.fract() == 0.0 && number.abs() <= MAX_SAFE_INTEGER {
        return Ok(ScriptValue::Int(number as i64));
    }
    Ok(ScriptValue::Float(number))
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn run(source: &str) -> Result<ScriptValue, ScriptError> {
        ScriptBridge::new().run(source).await
    }

    #[tokio::test]
    async fn evaluates_basic_expression() {
        let result = run("let a = 1 + 4; a * 2").await.expect("evaluation result");
        assert_eq!(result, ScriptValue::Int(10));
    }

    #[tokio::test]
    async fn does_not_preserve_state_across_calls() {
        run("globalThis.counter = 1")
            .await
            .expect("assignment to succeed");
        let err = run("counter += 2; counter")
            .await
            .expect_err("stateless evaluation");
        assert!(matches!(err, ScriptError::Execution(_)));
    }

    #[tokio::test]
    async fn supports_nested_values() {
        let result = run(r#"({ ok: true, count: 2, values: [1, { name: "x" }, null] })"#)
            .await
            .expect("nested object result");

        let expected = ScriptValue::Map(BTreeMap::from([
            ("ok".to_owned(), ScriptValue::Bool(true)),
            ("count".to_owned(), ScriptValue::Int(2)),
            (
                "values".to_owned(),
                ScriptValue::Seq(vec![
                    ScriptValue::Int(1),
                    ScriptValue::Map(BTreeMap::from([(
                        "name".to_owned(),
                        ScriptValue::Str("x".to_owned()),
                    )])),
                    ScriptValue::Null,
                ]),
            ),
        ]));
        assert_eq!(result, expected);
    }

    #[tokio::test]
    async fn integral_float_collapses_to_integer() {
        let result = run("3.5 - 0.5").await.expect("evaluation result");
        assert_eq!(result, ScriptValue::Int(3));
    }

    #[tokio::test]
    async fn fractional_float_stays_float() {
        let result = run("0.5").await.expect("evaluation result");
        assert_eq!(result, ScriptValue::Float(0.5));
    }

    #[tokio::test]
    async fn reports_syntax_errors_as_execution_errors() {
        let err = run("let = ;").await.expect_err("syntax error");
        assert!(matches!(err, ScriptError::Execution(_)));
    }

    #[tokio::test]
    async fn reports_thrown_errors_with_message() {
        let err = run("throw new Error('boom')").await.expect_err("thrown error");
        match err {
            ScriptError::Execution(message) => assert!(message.contains("boom")),
            other => panic!("expected execution error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn rejects_undefined_results() {
        let err = run("undefined").await.expect_err("undefined result");
        assert!(matches!(err, ScriptError::UnsupportedValue(_)));
    }

    #[tokio::test]
    async fn rejects_function_results() {
        let err = run("(() => 42)").await.expect_err("function result");
        assert!(matches!(err, ScriptError::UnsupportedValue(_)));
    }

    #[tokio::test]
    async fn rejects_symbol_results() {
        let err = run("Symbol('x')").await.expect_err("symbol result");
        assert!(matches!(err, ScriptError::UnsupportedValue(_)));
    }

    #[tokio::test]
    async fn rejects_bigint_results() {
        let err = run("1n").await.expect_err("bigint result");
        assert!(matches!(err, ScriptError::UnsupportedValue(_)));
    }

    #[tokio::test]
    async fn rejects_promise_results() {
        let err = run("Promise.resolve(1)").await.expect_err("promise result");
        assert!(matches!(err, ScriptError::UnsupportedValue(_)));
    }

    #[tokio::test]
    async fn rejects_nan_results() {
        let err = run("0/0").await.expect_err("NaN result");
        assert!(matches!(err, ScriptError::UnsupportedValue(_)));
    }

    #[tokio::test]
    async fn rejects_infinite_results() {
        for source in ["1/0", "-1/0"] {
            let err = run(source).await.expect_err("infinite result");
            assert!(matches!(err, ScriptError::UnsupportedValue(_)));
        }
    }

    #[tokio::test]
    async fn execution_error_does_not_poison_the_bridge() {
        let bridge = ScriptBridge::new();
        let err = bridge
            .run("throw new Error('boom')")
            .await
            .expect_err("execution error");
        assert!(matches!(err, ScriptError::Execution(_)));

        let recovered = bridge.run("40 + 2").await.expect("recovery after failure");
        assert_eq!(recovered, ScriptValue::Int(42));
    }

    #[tokio::test]
    async fn unsupported_value_does_not_poison_the_bridge() {
        let bridge = ScriptBridge::new();
        let err = bridge
            .run("Symbol('x')")
            .await
            .expect_err("unsupported value");
        assert!(matches!(err, ScriptError::UnsupportedValue(_)));

        let recovered = bridge.run("50 + 2").await.expect("recovery after failure");
        assert_eq!(recovered, ScriptValue::Int(52));
    }

    #[tokio::test]
    async fn supports_empty_object_and_array() {
        let object = run("({})").await.expect("empty object");
        assert_eq!(object, ScriptValue::Map(BTreeMap::new()));

        let array = run("[]").await.expect("empty array");
        assert_eq!(array, ScriptValue::Seq(Vec::new()));
    }

    #[tokio::test]
    async fn supports_unicode_string_values() {
        let result = run(r#""café 👋""#).await.expect("unicode string");
        assert_eq!(result, ScriptValue::Str("café 👋".to_owned()));
    }

    #[tokio::test]
    async fn captured_markup_is_returned() {
        let result = run(r#"__vista_set_html("<div>ok</div>");"#)
            .await
            .expect("captured markup");
        assert_eq!(result, ScriptValue::Str("<div>ok</div>".to_owned()));
    }

    #[tokio::test]
    async fn captured_markup_wins_over_completion_value() {
        let result = run(r#"__vista_set_html("<div>ok</div>"); 1 + 1"#)
            .await
            .expect("captured markup");
        assert_eq!(result, ScriptValue::Str("<div>ok</div>".to_owned()));
    }

    #[tokio::test]
    async fn captured_markup_does_not_leak_between_calls() {
        let bridge = ScriptBridge::new();
        let first = bridge
            .run(r#"__vista_set_html("<div>ok</div>");"#)
            .await
            .expect("captured markup");
        assert_eq!(first, ScriptValue::Str("<div>ok</div>".to_owned()));

        let second = bridge.run("2 + 2").await.expect("plain evaluation");
        assert_eq!(second, ScriptValue::Int(4));
    }

    #[tokio::test]
    async fn memory_limit_rejects_runaway_allocation() {
        let bridge = ScriptBridge::new().with_memory_limit(256 * 1024);
        let err = bridge
            .run("let blob = []; for (let i = 0; i < 1e6; i++) blob.push('x'.repeat(64));")
            .await
            .expect_err("allocation past the limit");
        assert!(matches!(err, ScriptError::Execution(_)));
    }
}
