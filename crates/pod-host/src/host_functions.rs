//! The `ast` global exposed to macro bodies: a small set of functions
//! that build nodes into the shared [`NodeArena`] and hand back an opaque
//! handle object (`{ __pod_node: <id> }`), plus the `Value <-> JsValue`
//! marshaling used for everything else crossing the host boundary.

use std::cell::RefCell;
use std::rc::Rc;

use pod_ast::{NodeArena, NodeHandle, Value, factory};
use rquickjs::{Array, Ctx, Exception, Function, Object, Result as JsResult, Value as JsValue};

use crate::store::SharedStore;

/// Prefix on the message of a JS exception thrown by `context.error(...)`,
/// distinguishing an explicit macro-author error from an ordinary
/// uncaught exception inside the macro body.
pub const EXPLICIT_ERROR_PREFIX: &str = "__pod_explicit_error__: ";

fn handle_to_js<'js>(ctx: &Ctx<'js>, handle: NodeHandle) -> JsResult<JsValue<'js>> {
    let obj = Object::new(ctx.clone())?;
    obj.set("__pod_node", handle.id as u32)?;
    Ok(obj.into_value())
}

/// Installs the `ast` factory object into `ctx`'s globals, bound to
/// `arena`. Called once per `invoke` (the arena is per-expansion-run, not
/// per-cached-context), so it must be re-installed even when the
/// underlying bundle's compiled context is reused from cache.
pub fn install_ast_factory<'js>(
    ctx: &Ctx<'js>,
    arena: Rc<RefCell<NodeArena>>,
) -> JsResult<()> {
    let ast = Object::new(ctx.clone())?;

    // `Function::new` closures below return `NodeHandle`-shaped plain
    // objects directly rather than a `NodeId`, since macro code only ever
    // sees the opaque handle.
    install_fn0(ctx, &ast, "null", arena.clone(), |_| factory::null_lit())?;
    install_fn1_bool(ctx, &ast, "bool", arena.clone())?;
    install_fn1_num(ctx, &ast, "num", arena.clone())?;
    install_fn1_str(ctx, &ast, "str", arena.clone())?;
    install_fn1_str_ident(ctx, &ast, "ident", arena.clone())?;
    install_array_fn(ctx, &ast, arena.clone())?;
    install_object_fn(ctx, &ast, arena.clone())?;

    ctx.globals().set("ast", ast)?;
    Ok(())
}

fn install_fn0<'js>(
    ctx: &Ctx<'js>,
    ast: &Object<'js>,
    name: &str,
    arena: Rc<RefCell<NodeArena>>,
    build: impl Fn(()) -> swc_ecma_ast::Expr + 'static,
) -> JsResult<()> {
    let ctx = ctx.clone();
    ast.set(
        name,
        Function::new(ctx.clone(), move || -> JsResult<JsValue> {
            let id = arena.borrow_mut().insert(build(()));
            handle_to_js(&ctx, id.into())
        }),
    )
}

fn install_fn1_bool<'js>(
    ctx: &Ctx<'js>,
    ast: &Object<'js>,
    name: &str,
    arena: Rc<RefCell<NodeArena>>,
) -> JsResult<()> {
    let ctx = ctx.clone();
    ast.set(
        name,
        Function::new(ctx.clone(), move |value: bool| -> JsResult<JsValue> {
            let id = arena.borrow_mut().insert(factory::bool_lit(value));
            handle_to_js(&ctx, id.into())
        }),
    )
}

fn install_fn1_num<'js>(
    ctx: &Ctx<'js>,
    ast: &Object<'js>,
    name: &str,
    arena: Rc<RefCell<NodeArena>>,
) -> JsResult<()> {
    let ctx = ctx.clone();
    ast.set(
        name,
        Function::new(ctx.clone(), move |value: f64| -> JsResult<JsValue> {
            let id = arena.borrow_mut().insert(factory::num_lit(value));
            handle_to_js(&ctx, id.into())
        }),
    )
}

fn install_fn1_str<'js>(
    ctx: &Ctx<'js>,
    ast: &Object<'js>,
    name: &str,
    arena: Rc<RefCell<NodeArena>>,
) -> JsResult<()> {
    let ctx = ctx.clone();
    ast.set(
        name,
        Function::new(ctx.clone(), move |value: String| -> JsResult<JsValue> {
            let id = arena.borrow_mut().insert(factory::str_lit(value));
            handle_to_js(&ctx, id.into())
        }),
    )
}

fn install_fn1_str_ident<'js>(
    ctx: &Ctx<'js>,
    ast: &Object<'js>,
    name: &str,
    arena: Rc<RefCell<NodeArena>>,
) -> JsResult<()> {
    let ctx = ctx.clone();
    ast.set(
        name,
        Function::new(ctx.clone(), move |value: String| -> JsResult<JsValue> {
            let id = arena.borrow_mut().insert(factory::ident(value));
            handle_to_js(&ctx, id.into())
        }),
    )
}

fn install_array_fn<'js>(
    ctx: &Ctx<'js>,
    ast: &Object<'js>,
    arena: Rc<RefCell<NodeArena>>,
) -> JsResult<()> {
    let ctx = ctx.clone();
    ast.set(
        "array",
        Function::new(ctx.clone(), move |items: Array| -> JsResult<JsValue> {
            let mut exprs = Vec::with_capacity(items.len());
            for item in items.iter::<Object>() {
                let item = item?;
                let id: u32 = item.get("__pod_node")?;
                let mut arena_mut = arena.borrow_mut();
                exprs.push(
                    arena_mut
                        .take(pod_ast::NodeId::from_index(id as usize))
                        .unwrap_or_else(factory::null_lit),
                );
            }
            let id = arena.borrow_mut().insert(factory::array_lit(exprs));
            handle_to_js(&ctx, id.into())
        }),
    )
}

fn install_object_fn<'js>(
    ctx: &Ctx<'js>,
    ast: &Object<'js>,
    arena: Rc<RefCell<NodeArena>>,
) -> JsResult<()> {
    let ctx = ctx.clone();
    ast.set(
        "object",
        Function::new(ctx.clone(), move |entries: Object| -> JsResult<JsValue> {
            let mut built = Vec::new();
            for key in entries.keys::<String>() {
                let key = key?;
                let item: Object = entries.get(&key)?;
                let id: u32 = item.get("__pod_node")?;
                let mut arena_mut = arena.borrow_mut();
                let expr = arena_mut
                    .take(pod_ast::NodeId::from_index(id as usize))
                    .unwrap_or_else(factory::null_lit);
                built.push((key, expr));
            }
            let id = arena.borrow_mut().insert(factory::object_lit(built));
            handle_to_js(&ctx, id.into())
        }),
    )
}

/// Installs the per-invocation `context` global: the macro's source
/// file, a `store` handle backed by the process-wide
/// [`SharedStore`], and an `error(message)` function that throws a fatal
/// macro error distinguishable from an ordinary uncaught exception.
pub fn install_context<'js>(
    ctx: &Ctx<'js>,
    call_file: &str,
    store: SharedStore,
) -> JsResult<()> {
    let context = Object::new(ctx.clone())?;
    context.set("file", call_file)?;

    let store_obj = Object::new(ctx.clone())?;
    let get_store = store.clone();
    store_obj.set(
        "get",
        Function::new(ctx.clone(), move |key: String| -> JsResult<Vec<String>> {
            Ok(get_store
                .get(&key)
                .into_iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect())
        }),
    )?;
    let push_store = store;
    store_obj.set(
        "push",
        Function::new(ctx.clone(), move |key: String, value: String| {
            push_store.push(&key, Value::Str(value));
        }),
    )?;
    context.set("store", store_obj)?;

    let error_ctx = ctx.clone();
    context.set(
        "error",
        Function::new(ctx.clone(), move |message: String| -> JsResult<()> {
            Err(Exception::throw_message(
                &error_ctx,
                &format!("{EXPLICIT_ERROR_PREFIX}{message}"),
            ))
        }),
    )?;

    ctx.globals().set("__pod_context", context)?;
    Ok(())
}

/// Lowers a [`Value`] into a `JsValue` for passing macro call arguments
/// into JS.
pub fn value_to_js<'js>(ctx: &Ctx<'js>, value: &Value) -> JsResult<JsValue<'js>> {
    Ok(match value {
        Value::Null => JsValue::new_null(ctx.clone()),
        Value::Undefined => JsValue::new_undefined(ctx.clone()),
        Value::Bool(b) => JsValue::new_bool(ctx.clone(), *b),
        Value::Num(n) => JsValue::new_float(ctx.clone(), *n),
        Value::Str(s) => rquickjs::String::from_str(ctx.clone(), s)?.into_value(),
        Value::Array(items) => {
            let arr = Array::new(ctx.clone())?;
            for (i, item) in items.iter().enumerate() {
                arr.set(i, value_to_js(ctx, item)?)?;
            }
            arr.into_value()
        }
        Value::Object(entries) => {
            let obj = Object::new(ctx.clone())?;
            for (k, v) in entries {
                obj.set(k.as_str(), value_to_js(ctx, v)?)?;
            }
            obj.into_value()
        }
    })
}

/// Raises a `JsValue` returned from macro code back into a [`Value`],
/// used when the caller needs a plain value rather than an AST node
/// handle (e.g. reading a field off the shared store object).
pub fn js_to_value(_ctx: &Ctx<'_>, value: &JsValue<'_>) -> JsResult<Value> {
    if value.is_null() {
        return Ok(Value::Null);
    }
    if value.is_undefined() {
        return Ok(Value::Undefined);
    }
    if let Some(b) = value.as_bool() {
        return Ok(Value::Bool(b));
    }
    if let Some(n) = value.as_float() {
        return Ok(Value::Num(n));
    }
    if let Some(n) = value.as_int() {
        return Ok(Value::Num(n as f64));
    }
    if let Some(s) = value.as_string() {
        return Ok(Value::Str(s.to_string()?));
    }
    if let Some(arr) = value.as_array() {
        let mut items = Vec::with_capacity(arr.len());
        for item in arr.iter::<JsValue>() {
            items.push(js_to_value(_ctx, &item?)?);
        }
        return Ok(Value::Array(items));
    }
    if let Some(obj) = value.as_object() {
        let mut entries = std::collections::BTreeMap::new();
        for key in obj.keys::<String>() {
            let key = key?;
            let v: JsValue = obj.get(&key)?;
            entries.insert(key, js_to_value(_ctx, &v)?);
        }
        return Ok(Value::Object(entries));
    }
    Ok(Value::Undefined)
}
