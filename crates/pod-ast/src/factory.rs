//! Builds swc `Expr` nodes from [`Value`]s and folds literal-shaped `Expr`
//! nodes back into `Value`s. This is the seam the expander's argument
//! evaluator (Phase 2/4) and the rewrite phase sit on either side of.

use std::collections::BTreeMap;

use swc_common::DUMMY_SP;
use swc_ecma_ast::{
    ArrayLit, Bool, Expr, ExprOrSpread, Ident, IdentName, KeyValueProp, Lit, Null, Number,
    ObjectLit, Prop, PropName, PropOrSpread, Str,
};

use crate::value::Value;

/// Builds a `null` literal expression.
pub fn null_lit() -> Expr {
    Expr::Lit(Lit::Null(Null { span: DUMMY_SP }))
}

/// Builds a boolean literal expression.
pub fn bool_lit(value: bool) -> Expr {
    Expr::Lit(Lit::Bool(Bool {
        span: DUMMY_SP,
        value,
    }))
}

/// Builds a numeric literal expression.
pub fn num_lit(value: f64) -> Expr {
    Expr::Lit(Lit::Num(Number {
        span: DUMMY_SP,
        value,
        raw: None,
    }))
}

/// Builds a string literal expression.
pub fn str_lit(value: impl Into<String>) -> Expr {
    Expr::Lit(Lit::Str(Str {
        span: DUMMY_SP,
        value: value.into().into(),
        raw: None,
    }))
}

/// Builds a bare identifier reference expression.
pub fn ident(name: impl Into<String>) -> Expr {
    Expr::Ident(Ident::new(name.into().into(), DUMMY_SP))
}

/// Builds an array literal expression from already-built element
/// expressions. `None` gaps (elisions) are never produced here — macro
/// return values never carry holes.
pub fn array_lit(elems: Vec<Expr>) -> Expr {
    Expr::Array(ArrayLit {
        span: DUMMY_SP,
        elems: elems
            .into_iter()
            .map(|e| {
                Some(ExprOrSpread {
                    spread: None,
                    expr: Box::new(e),
                })
            })
            .collect(),
    })
}

/// Builds an object literal expression from ordered key/value pairs.
pub fn object_lit(entries: Vec<(String, Expr)>) -> Expr {
    Expr::Object(ObjectLit {
        span: DUMMY_SP,
        props: entries
            .into_iter()
            .map(|(key, value)| {
                PropOrSpread::Prop(Box::new(Prop::KeyValue(KeyValueProp {
                    key: PropName::Ident(IdentName::new(key.into(), DUMMY_SP)),
                    value: Box::new(value),
                })))
            })
            .collect(),
    })
}

/// Recursively lowers a [`Value`] into the `Expr` that represents it
/// literally. `Value::Undefined` lowers to the `undefined` identifier,
/// since there is no dedicated `undefined` literal node in the AST.
pub fn value_to_expr(value: &Value) -> Expr {
    match value {
        Value::Null => null_lit(),
        Value::Undefined => ident("undefined"),
        Value::Bool(b) => bool_lit(*b),
        Value::Num(n) => num_lit(*n),
        Value::Str(s) => str_lit(s.clone()),
        Value::Array(items) => array_lit(items.iter().map(value_to_expr).collect()),
        Value::Object(entries) => object_lit(
            entries
                .iter()
                .map(|(k, v)| (k.clone(), value_to_expr(v)))
                .collect(),
        ),
    }
}

/// Folds a literal-shaped `Expr` into a [`Value`]. Returns `None` for any
/// expression that isn't a literal, array, or object made entirely of
/// literals — the caller (the expander's argument evaluator) handles the
/// richer expression grammar (templates, operators, member access) itself
/// and only calls this fold at its leaves.
pub fn expr_to_value(expr: &Expr) -> Option<Value> {
    match expr {
        Expr::Lit(Lit::Null(_)) => Some(Value::Null),
        Expr::Lit(Lit::Bool(b)) => Some(Value::Bool(b.value)),
        Expr::Lit(Lit::Num(n)) => Some(Value::Num(n.value)),
        Expr::Lit(Lit::Str(s)) => Some(Value::Str(s.value.to_string())),
        Expr::Ident(id) if &*id.sym == "undefined" => Some(Value::Undefined),
        Expr::Array(arr) => {
            let mut items = Vec::with_capacity(arr.elems.len());
            for elem in &arr.elems {
                let elem = elem.as_ref()?;
                if elem.spread.is_some() {
                    return None;
                }
                items.push(expr_to_value(&elem.expr)?);
            }
            Some(Value::Array(items))
        }
        Expr::Object(obj) => {
            let mut entries = BTreeMap::new();
            for prop in &obj.props {
                let PropOrSpread::Prop(prop) = prop else {
                    return None;
                };
                let Prop::KeyValue(kv) = prop.as_ref() else {
                    return None;
                };
                let key = match &kv.key {
                    PropName::Ident(id) => id.sym.to_string(),
                    PropName::Str(s) => s.value.to_string(),
                    _ => return None,
                };
                entries.insert(key, expr_to_value(&kv.value)?);
            }
            Some(Value::Object(entries))
        }
        Expr::Paren(p) => expr_to_value(&p.expr),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_scalars_through_expr() {
        for value in [
            Value::Null,
            Value::Bool(true),
            Value::Num(42.0),
            Value::Str("hi".into()),
        ] {
            let expr = value_to_expr(&value);
            assert_eq!(expr_to_value(&expr), Some(value));
        }
    }

    #[test]
    fn round_trips_nested_array_and_object() {
        let mut obj = BTreeMap::new();
        obj.insert("a".to_string(), Value::Num(1.0));
        obj.insert(
            "b".to_string(),
            Value::Array(vec![Value::Str("x".into()), Value::Bool(false)]),
        );
        let value = Value::Object(obj);

        let expr = value_to_expr(&value);
        assert_eq!(expr_to_value(&expr), Some(value));
    }

    #[test]
    fn undefined_lowers_to_identifier_and_back() {
        let expr = value_to_expr(&Value::Undefined);
        assert!(matches!(&expr, Expr::Ident(id) if &*id.sym == "undefined"));
        assert_eq!(expr_to_value(&expr), Some(Value::Undefined));
    }

    #[test]
    fn non_literal_expr_folds_to_none() {
        let expr = ident("someRuntimeValue");
        assert_eq!(expr_to_value(&expr), None);
    }
}
