//! Script evaluation inside an agent.

use rquickjs::{CatchResultExt, CaughtError, Context, Runtime, Value};

use super::wire::SerializedError;

/// Evaluates script source and yields its completion value.
///
/// Implementations are synchronous; agents call them from a blocking task.
pub trait ScriptEvaluator: Send + Sync {
    fn evaluate(&self, source: &str) -> Result<serde_json::Value, SerializedError>;
}

/// QuickJS-backed evaluator. Each evaluation gets a fresh runtime, so no
/// global state leaks between requests.
#[derive(Debug, Clone, Default)]
pub struct QuickJsEvaluator {
    memory_limit: Option<usize>,
}

impl QuickJsEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cap the heap of each evaluation, in bytes.
    pub fn with_memory_limit(mut self, bytes: usize) -> Self {
        self.memory_limit = Some(bytes);
        self
    }
}

impl ScriptEvaluator for QuickJsEvaluator {
    fn evaluate(&self, source: &str) -> Result<serde_json::Value, SerializedError> {
        let runtime = Runtime::new().map_err(|err| internal(&err))?;
        if let Some(limit) = self.memory_limit {
            runtime.set_memory_limit(limit);
        }
        let context = Context::full(&runtime).map_err(|err| internal(&err))?;

        context.with(|ctx| {
            let completion = ctx
                .eval::<Value, _>(source)
                .catch(&ctx)
                .map_err(serialize_caught)?;
            js_to_json(completion)
        })
    }
}

fn internal(err: &rquickjs::Error) -> SerializedError {
    SerializedError::new("InternalError", format!("QuickJS: {err}"))
}

fn serialize_caught(caught: CaughtError<'_>) -> SerializedError {
    match caught {
        CaughtError::Exception(exception) => {
            let name = exception
                .as_object()
                .get::<_, Option<String>>("name")
                .ok()
                .flatten()
                .unwrap_or_else(|| "Error".to_string());
            let mut serialized =
                SerializedError::new(name, exception.message().unwrap_or_default());
            if let Some(stack) = exception.stack().filter(|s| !s.is_empty()) {
                serialized = serialized.with_stack(stack);
            }
            serialized
        }
        CaughtError::Value(thrown) => {
            // `throw "text"` and friends: no name, no stack.
            let message = match js_to_json(thrown) {
                Ok(serde_json::Value::String(text)) => text,
                Ok(other) => other.to_string(),
                Err(err) => err.to_string(),
            };
            SerializedError {
                name: None,
                message,
                stack: None,
            }
        }
        CaughtError::Error(err) => internal(&err),
    }
}

/// Containers nested deeper than this are refused; cyclic values hit it too.
const MAX_DEPTH: usize = 128;

/// Values reachable through shared references are copied once per path.
const MAX_NODES: usize = 1 << 20;

/// Structured-clone-ish conversion of a completion value.
///
/// Functions, symbols and `undefined` become `null`. Cyclic, overly deep or
/// overly large values fail with a `DataCloneError`.
fn js_to_json(value: Value<'_>) -> Result<serde_json::Value, SerializedError> {
    Converter { nodes: 0 }.convert(value, 0)
}

struct Converter {
    nodes: usize,
}

impl Converter {
    fn convert(
        &mut self,
        value: Value<'_>,
        depth: usize,
    ) -> Result<serde_json::Value, SerializedError> {
        self.nodes += 1;
        if self.nodes > MAX_NODES {
            return Err(not_cloneable("completion value is too large"));
        }

        if value.is_null() || value.is_undefined() {
            return Ok(serde_json::Value::Null);
        }
        if let Some(b) = value.as_bool() {
            return Ok(serde_json::Value::Bool(b));
        }
        if let Some(i) = value.as_int() {
            return Ok(serde_json::Value::from(i));
        }
        if let Some(f) = value.as_float() {
            // Integral doubles (e.g. 2**40) stay integers on the wire.
            if f.fract() == 0.0 && f.abs() < 9.0e15 {
                return Ok(serde_json::Value::from(f as i64));
            }
            return Ok(serde_json::Number::from_f64(f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null));
        }
        if let Some(s) = value.as_string() {
            let text = s.to_string().map_err(|err| internal(&err))?;
            return Ok(serde_json::Value::String(text));
        }
        if value.is_function() {
            return Ok(serde_json::Value::Null);
        }

        if depth >= MAX_DEPTH {
            return Err(not_cloneable("completion value is cyclic or nested too deeply"));
        }
        if let Some(array) = value.as_array() {
            let mut items = Vec::with_capacity(array.len());
            for item in array.iter::<Value>() {
                let item = item.map_err(|err| internal(&err))?;
                items.push(self.convert(item, depth + 1)?);
            }
            return Ok(serde_json::Value::Array(items));
        }
        if let Some(object) = value.as_object() {
            let mut map = serde_json::Map::new();
            for prop in object.props::<String, Value>() {
                let (key, item) = prop.map_err(|err| internal(&err))?;
                map.insert(key, self.convert(item, depth + 1)?);
            }
            return Ok(serde_json::Value::Object(map));
        }
        Ok(serde_json::Value::Null)
    }
}

fn not_cloneable(message: &str) -> SerializedError {
    SerializedError::new("DataCloneError", message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn eval(source: &str) -> Result<serde_json::Value, SerializedError> {
        QuickJsEvaluator::new().evaluate(source)
    }

    #[test]
    fn test_completion_value() {
        assert_eq!(eval("1+1").unwrap(), json!(2));
        assert_eq!(eval("'a' + 'b'").unwrap(), json!("ab"));
        assert_eq!(eval("0.5").unwrap(), json!(0.5));
        assert_eq!(eval("undefined").unwrap(), serde_json::Value::Null);
    }

    #[test]
    fn test_structured_values() {
        assert_eq!(
            eval("({ title: 'Home', tags: [1, true, null] })").unwrap(),
            json!({ "title": "Home", "tags": [1, true, null] })
        );
        assert_eq!(eval("[() => 1]").unwrap(), json!([null]));
    }

    #[test]
    fn test_thrown_error_keeps_message_and_name() {
        let err = eval("throw new Error('x')").unwrap_err();
        assert_eq!(err.message, "x");
        assert_eq!(err.name.as_deref(), Some("Error"));

        let err = eval("null.foo").unwrap_err();
        assert_eq!(err.name.as_deref(), Some("TypeError"));
    }

    #[test]
    fn test_thrown_plain_value() {
        let err = eval("throw 'nope'").unwrap_err();
        assert_eq!(err.name, None);
        assert_eq!(err.message, "nope");
    }

    #[test]
    fn test_syntax_error() {
        let err = eval("function (").unwrap_err();
        assert_eq!(err.name.as_deref(), Some("SyntaxError"));
    }

    #[test]
    fn test_cyclic_value_is_refused() {
        let err = eval("var o = {}; o.self = o; o").unwrap_err();
        assert_eq!(err.name.as_deref(), Some("DataCloneError"));

        let err = eval("var a = []; a.push(a); a").unwrap_err();
        assert_eq!(err.name.as_deref(), Some("DataCloneError"));
    }

    #[test]
    fn test_nesting_limit() {
        let shallow = eval("var v = 0; for (var i = 0; i < 100; i++) v = [v]; v");
        assert!(shallow.is_ok());

        let err = eval("var v = 0; for (var i = 0; i < 10000; i++) v = { v }; v").unwrap_err();
        assert_eq!(err.name.as_deref(), Some("DataCloneError"));
    }

    #[test]
    fn test_shared_references_are_bounded() {
        let err = eval("var v = [0]; for (var i = 0; i < 40; i++) v = [v, v]; v").unwrap_err();
        assert_eq!(err.name.as_deref(), Some("DataCloneError"));
        assert_eq!(err.message, "completion value is too large");
    }

    #[test]
    fn test_thrown_cyclic_value() {
        let err = eval("var o = {}; o.self = o; throw o").unwrap_err();
        assert_eq!(err.name, None);
        assert!(err.message.contains("DataCloneError"));
    }

    #[test]
    fn test_memory_limit() {
        let evaluator = QuickJsEvaluator::new().with_memory_limit(4 * 1024 * 1024);
        assert_eq!(evaluator.evaluate("'x'.repeat(8).length").unwrap(), json!(8));
        assert!(evaluator.evaluate("'x'.repeat(64 * 1024 * 1024)").is_err());
    }

    #[test]
    fn test_evaluations_are_isolated() {
        let evaluator = QuickJsEvaluator::new();
        evaluator.evaluate("globalThis.leak = 1").unwrap();
        assert_eq!(
            evaluator.evaluate("typeof globalThis.leak").unwrap(),
            json!("undefined")
        );
    }
}
