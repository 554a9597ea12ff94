//! Sandboxed expression evaluator and JSON-path extractor for Tempest
//! assertions.
//!
//! Expressions are parsed once into a whitelisted [`Expr`] AST — every
//! construct outside the sandbox (imports, assignments, arbitrary
//! attribute/function access) is rejected at parse time, not eval time —
//! and then evaluated by a pure, synchronous, deadline-bounded walker.
//! There is no network or filesystem access anywhere in this crate.

pub mod error;
pub mod eval;
pub mod expr;
pub mod extractor;
pub mod lexer;
pub mod parser;

use std::time::{Duration, Instant};

use serde_json::Value;

pub use error::{ExpressionError, ExtractError};
pub use eval::truthy;
pub use expr::{BinaryOp, Expr, UnaryOp};
pub use extractor::extract_values;

/// Parse and evaluate `source` against the three bindings an expression
/// assertion may reference, bounding total evaluation time by `timeout`.
pub fn evaluate(source: &str, body: &Value, headers: &Value, context: &Value, timeout: Duration) -> Result<Value, ExpressionError> {
    let expr = parser::parse(source)?;
    let deadline = Instant::now() + timeout;
    eval::eval(&expr, body, headers, context, deadline)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    fn run(src: &str) -> Value {
        evaluate(src, &json!({}), &json!({}), &json!({}), Duration::from_secs(1)).unwrap()
    }

    #[test]
    fn literal_true() {
        assert_eq!(run("True"), json!(true));
    }

    #[test]
    fn literal_false() {
        assert_eq!(run("False"), json!(false));
    }

    #[test]
    fn literal_none() {
        assert_eq!(run("None"), Value::Null);
    }

    #[test]
    fn arithmetic() {
        assert_eq!(run("1 + 2"), json!(3.0));
    }

    #[test]
    fn comparison_and_boolean() {
        assert_eq!(run("1 < 2 and 3 > 2"), json!(true));
    }

    #[test]
    fn ternary() {
        assert_eq!(run("'yes' if True else 'no'"), json!("yes"));
    }

    #[test]
    fn body_field_access() {
        let body = json!({"status": "ok", "count": 3});
        let result = evaluate("body.status == 'ok' and body.count > 0", &body, &json!({}), &json!({}), Duration::from_secs(1)).unwrap();
        assert_eq!(result, json!(true));
    }

    #[test]
    fn headers_membership() {
        let headers = json!({"content-type": "application/json"});
        let result = evaluate("'content-type' in headers", &json!({}), &headers, &json!({}), Duration::from_secs(1)).unwrap();
        assert_eq!(result, json!(true));
    }

    #[test]
    fn whitelisted_aggregators() {
        assert_eq!(run("sum([1, 2, 3])"), json!(6.0));
        assert_eq!(run("len([1, 2, 3])"), json!(3));
        assert_eq!(run("max([1, 5, 2])"), json!(5.0));
        assert_eq!(run("any([False, True])"), json!(true));
        assert_eq!(run("all([True, True])"), json!(true));
    }

    #[test]
    fn comprehension() {
        assert_eq!(run("[x * 2 for x in [1, 2, 3]]"), json!([2.0, 4.0, 6.0]));
        assert_eq!(run("[x for x in [1, 2, 3, 4] if x % 2 == 0]"), json!([2, 4]));
    }

    #[test]
    fn string_methods_whitelisted() {
        assert_eq!(run("'Hello'.lower()"), json!("hello"));
        assert_eq!(run("'hello'.startswith('he')"), json!(true));
    }

    #[test]
    fn rejects_unbound_name() {
        let result = parser::parse("os.system('rm -rf /')");
        assert!(matches!(result, Err(ExpressionError::Security(_))));
    }

    #[test]
    fn rejects_disallowed_function() {
        let result = parser::parse("eval('1')");
        assert!(matches!(result, Err(ExpressionError::Security(_))));
    }

    #[test]
    fn rejects_disallowed_attribute() {
        let result = parser::parse("body.__class__");
        assert!(matches!(result, Err(ExpressionError::Security(_))));
    }

    #[test]
    fn rejects_assignment() {
        let result = parser::parse("x = 1");
        assert!(result.is_err());
    }

    #[test]
    fn timeout_fires_on_expired_deadline() {
        let expr = parser::parse("sum([1, 2, 3])").unwrap();
        let expired = Instant::now() - Duration::from_secs(1);
        let result = eval::eval(&expr, &json!({}), &json!({}), &json!({}), expired);
        assert!(matches!(result, Err(ExpressionError::Timeout)));
    }
}
