//! Phase 2/4: the no-commit argument evaluator. Folds an
//! argument expression down to a [`Value`], resolving identifiers through
//! the three-layer lookup — local const, macro-produced binding, imported
//! binding — and recording a dependency edge whenever the second layer
//! fires.
//!
//! `Ok(None)` means "not yet knowable": either the expression references a
//! macro site that hasn't been computed yet (expected during Phase 2's
//! probe) or it uses a shape this evaluator doesn't fold (member access
//! into something dynamic, for instance). Phase 4 calls back into the same
//! functions after the topological sort, at which point every referenced
//! site is computed and a `None` there signals a genuine, fatal failure.

use std::path::Path;

use pod_ast::Value;
use pod_graph::Graph;
use pod_types::{ExpanderError, SiteKey};
use swc_ecma_ast::{
    BinaryOp, Expr, Lit, MemberProp, Prop, PropName, PropOrSpread, UnaryOp,
};

use crate::discovery::{FileIndex, ImportBinding};
use crate::project::{Project, resolve_relative};

pub struct EvalCtx<'a> {
    pub project: &'a Project,
    pub graph: &'a mut Graph,
    /// The macro site whose arguments are being evaluated — dependency
    /// edges recorded while resolving identifiers always originate here,
    /// even when resolution recurses into a different file.
    pub current_site: SiteKey,
    /// `true` during Phase 2's no-commit probe: an unresolvable identifier
    /// is tolerated (folds to `Ok(None)`) rather than erroring, since the
    /// dependency set it would complete may simply not exist yet.
    pub probe: bool,
}

fn parse_error(project: &Project, path: &Path, source: anyhow::Error) -> ExpanderError {
    ExpanderError::Parse {
        file: project.key_of(path),
        source,
    }
}

/// Loads and indexes `path` if needed, then runs `f` against its index.
fn with_file_index<R>(
    ctx: &mut EvalCtx,
    path: &Path,
    f: impl FnOnce(&FileIndex) -> R,
) -> Result<R, ExpanderError> {
    ctx.project
        .load(path, ctx.graph)
        .map_err(|e| parse_error(ctx.project, path, e))?;
    Ok(ctx
        .project
        .with_index(path, f)
        .expect("just loaded above"))
}

/// Resolves a bare identifier seen in `file_path`'s scope through the
/// three-layer lookup.
pub fn resolve_identifier(
    name: &str,
    file_path: &Path,
    ctx: &mut EvalCtx,
) -> Result<Option<Value>, ExpanderError> {
    let file_key = ctx.project.key_of(file_path);

    // Layer 2 takes priority over layer 1's plain lookup: a const whose
    // initializer is itself a macro call was indexed into `consts` by
    // `discovery::index_var_decl` (it stores the raw call expr), but it is
    // also registered as a graph site — check the graph first so such
    // bindings are treated as macro-produced, not re-evaluated as a plain
    // expression.
    let site_key = SiteKey::from_root(&ctx.project.root, file_path, name);
    if ctx.graph.contains(&site_key) {
        // Best-effort: `current_site` is a registered site during Phase
        // 2/4 probing and execution, so this always succeeds there. Phase
        // 5's inline (untracked) macro calls pass a synthetic site that
        // was never registered — they don't participate in the graph, so
        // there's nothing to record the edge against, and that's fine.
        let _ = ctx
            .graph
            .add_dependency(&ctx.current_site, site_key.clone());
        return Ok(match ctx.graph.get_result(&site_key) {
            Some(result_expr) => pod_ast::factory::expr_to_value(result_expr),
            None => None,
        });
    }

    let lookup: LookupResult = with_file_index(ctx, file_path, |index| {
        classify(index, name)
    })?;

    match lookup {
        LookupResult::Const(init) => eval_expr(&init, file_path, ctx),
        LookupResult::NonConst => Err(ExpanderError::NonConstBinding {
            name: name.to_string(),
            file: file_key,
        }),
        LookupResult::Import(binding) => resolve_import(&binding, file_path, name, ctx),
        LookupResult::Unknown => {
            if ctx.probe {
                Ok(None)
            } else {
                Err(ExpanderError::Resolution {
                    name: name.to_string(),
                    file: file_key,
                })
            }
        }
    }
}

enum LookupResult {
    Const(Expr),
    NonConst,
    Import(ImportBinding),
    Unknown,
}

fn classify(index: &FileIndex, name: &str) -> LookupResult {
    if let Some(expr) = index.consts.get(name) {
        return LookupResult::Const(expr.clone());
    }
    if index.non_const_bindings.contains(name) {
        return LookupResult::NonConst;
    }
    if let Some(binding) = index.imports.get(name) {
        return LookupResult::Import(binding.clone());
    }
    LookupResult::Unknown
}

pub(crate) fn is_resolvable_path(specifier: &str) -> bool {
    specifier.starts_with("./") || specifier.starts_with("../") || specifier.starts_with('/')
}

fn resolve_import(
    binding: &ImportBinding,
    from_file: &Path,
    local_name: &str,
    ctx: &mut EvalCtx,
) -> Result<Option<Value>, ExpanderError> {
    let file_key = ctx.project.key_of(from_file);
    if !is_resolvable_path(&binding.specifier) {
        return Err(ExpanderError::PackageImport {
            name: local_name.to_string(),
            file: file_key,
            specifier: binding.specifier.clone(),
        });
    }

    let target = resolve_relative(from_file, &binding.specifier).ok_or_else(|| {
        ExpanderError::Resolution {
            name: local_name.to_string(),
            file: file_key.clone(),
        }
    })?;

    resolve_identifier(&binding.imported, &target, ctx)
}

/// Folds `expr` to a [`Value`] across the supported expression grammar:
/// literals, templates, array/object literals (spread, shorthand),
/// unary/binary operators, parens, conditional, member/element access.
pub fn eval_expr(
    expr: &Expr,
    file_path: &Path,
    ctx: &mut EvalCtx,
) -> Result<Option<Value>, ExpanderError> {
    match expr {
        Expr::Lit(Lit::Null(_)) => Ok(Some(Value::Null)),
        Expr::Lit(Lit::Bool(b)) => Ok(Some(Value::Bool(b.value))),
        Expr::Lit(Lit::Num(n)) => Ok(Some(Value::Num(n.value))),
        Expr::Lit(Lit::Str(s)) => Ok(Some(Value::Str(s.value.to_string()))),
        Expr::Ident(id) if &*id.sym == "undefined" => Ok(Some(Value::Undefined)),
        Expr::Ident(id) => resolve_identifier(&id.sym, file_path, ctx),
        Expr::Paren(p) => eval_expr(&p.expr, file_path, ctx),

        Expr::Tpl(tpl) => {
            let mut out = String::new();
            for (i, quasi) in tpl.quasis.iter().enumerate() {
                let text = quasi
                    .cooked
                    .as_ref()
                    .map(|a| a.to_string())
                    .unwrap_or_else(|| quasi.raw.to_string());
                out.push_str(&text);
                if let Some(sub) = tpl.exprs.get(i) {
                    match eval_expr(sub, file_path, ctx)? {
                        Some(v) => out.push_str(&value_to_display(&v)),
                        None => return Ok(None),
                    }
                }
            }
            Ok(Some(Value::Str(out)))
        }

        Expr::Array(arr) => {
            let mut items = Vec::with_capacity(arr.elems.len());
            for elem in &arr.elems {
                let Some(elem) = elem else {
                    items.push(Value::Null);
                    continue;
                };
                let Some(value) = eval_expr(&elem.expr, file_path, ctx)? else {
                    return Ok(None);
                };
                if elem.spread.is_some() {
                    match value {
                        Value::Array(spread_items) => items.extend(spread_items),
                        other => items.push(other),
                    }
                } else {
                    items.push(value);
                }
            }
            Ok(Some(Value::Array(items)))
        }

        Expr::Object(obj) => {
            let mut entries = std::collections::BTreeMap::new();
            for prop in &obj.props {
                match prop {
                    PropOrSpread::Spread(spread) => {
                        let Some(value) = eval_expr(&spread.expr, file_path, ctx)? else {
                            return Ok(None);
                        };
                        if let Value::Object(spread_entries) = value {
                            entries.extend(spread_entries);
                        }
                    }
                    PropOrSpread::Prop(prop) => match prop.as_ref() {
                        Prop::Shorthand(ident) => {
                            let Some(value) = resolve_identifier(&ident.sym, file_path, ctx)?
                            else {
                                return Ok(None);
                            };
                            entries.insert(ident.sym.to_string(), value);
                        }
                        Prop::KeyValue(kv) => {
                            let key = match &kv.key {
                                PropName::Ident(id) => id.sym.to_string(),
                                PropName::Str(s) => s.value.to_string(),
                                PropName::Num(n) => n.value.to_string(),
                                _ => return Ok(None),
                            };
                            let Some(value) = eval_expr(&kv.value, file_path, ctx)? else {
                                return Ok(None);
                            };
                            entries.insert(key, value);
                        }
                        _ => return Ok(None),
                    },
                }
            }
            Ok(Some(Value::Object(entries)))
        }

        Expr::Unary(u) => {
            let Some(arg) = eval_expr(&u.arg, file_path, ctx)? else {
                return Ok(None);
            };
            Ok(Some(match u.op {
                UnaryOp::Bang => Value::Bool(!arg.is_truthy()),
                UnaryOp::Minus => Value::Num(-arg.as_num().unwrap_or(f64::NAN)),
                UnaryOp::Plus => Value::Num(arg.as_num().unwrap_or(f64::NAN)),
                UnaryOp::Tilde => Value::Num(!(arg.as_num().unwrap_or(0.0) as i32) as f64),
                UnaryOp::Void => Value::Undefined,
                UnaryOp::TypeOf | UnaryOp::Delete => return Ok(None),
            }))
        }

        Expr::Bin(bin) => eval_binary(bin, file_path, ctx),

        Expr::Cond(cond) => {
            let Some(test) = eval_expr(&cond.test, file_path, ctx)? else {
                return Ok(None);
            };
            if test.is_truthy() {
                eval_expr(&cond.cons, file_path, ctx)
            } else {
                eval_expr(&cond.alt, file_path, ctx)
            }
        }

        Expr::Member(member) => {
            let Some(obj) = eval_expr(&member.obj, file_path, ctx)? else {
                return Ok(None);
            };
            let key = match &member.prop {
                MemberProp::Ident(id) => id.sym.to_string(),
                MemberProp::Computed(computed) => {
                    let Some(key) = eval_expr(&computed.expr, file_path, ctx)? else {
                        return Ok(None);
                    };
                    value_to_display(&key)
                }
                MemberProp::PrivateName(_) => return Ok(None),
            };
            Ok(Some(member_access(&obj, &key)))
        }

        _ => Ok(None),
    }
}

fn member_access(obj: &Value, key: &str) -> Value {
    match obj {
        Value::Object(entries) => entries.get(key).cloned().unwrap_or(Value::Undefined),
        Value::Array(items) => key
            .parse::<usize>()
            .ok()
            .and_then(|i| items.get(i).cloned())
            .unwrap_or(Value::Undefined),
        Value::Str(s) if key == "length" => Value::Num(s.chars().count() as f64),
        _ => Value::Undefined,
    }
}

fn value_to_display(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Undefined => "undefined".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Num(n) => {
            if n.fract() == 0.0 && n.abs() < 1e15 {
                format!("{}", *n as i64)
            } else {
                n.to_string()
            }
        }
        Value::Str(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(value_to_display)
            .collect::<Vec<_>>()
            .join(","),
        Value::Object(_) => "[object Object]".to_string(),
    }
}

fn eval_binary(
    bin: &swc_ecma_ast::BinExpr,
    file_path: &Path,
    ctx: &mut EvalCtx,
) -> Result<Option<Value>, ExpanderError> {
    // Logical operators short-circuit: the right operand is only evaluated
    // (and so only contributes dependency edges) when it's actually needed.
    match bin.op {
        BinaryOp::LogicalAnd => {
            let Some(left) = eval_expr(&bin.left, file_path, ctx)? else {
                return Ok(None);
            };
            return if left.is_truthy() {
                eval_expr(&bin.right, file_path, ctx)
            } else {
                Ok(Some(left))
            };
        }
        BinaryOp::LogicalOr => {
            let Some(left) = eval_expr(&bin.left, file_path, ctx)? else {
                return Ok(None);
            };
            return if left.is_truthy() {
                Ok(Some(left))
            } else {
                eval_expr(&bin.right, file_path, ctx)
            };
        }
        BinaryOp::NullishCoalescing => {
            let Some(left) = eval_expr(&bin.left, file_path, ctx)? else {
                return Ok(None);
            };
            return if matches!(left, Value::Null | Value::Undefined) {
                eval_expr(&bin.right, file_path, ctx)
            } else {
                Ok(Some(left))
            };
        }
        _ => {}
    }

    let Some(left) = eval_expr(&bin.left, file_path, ctx)? else {
        return Ok(None);
    };
    let Some(right) = eval_expr(&bin.right, file_path, ctx)? else {
        return Ok(None);
    };

    let result = match bin.op {
        BinaryOp::Add => match (&left, &right) {
            (Value::Str(_), _) | (_, Value::Str(_)) => {
                Value::Str(format!("{}{}", value_to_display(&left), value_to_display(&right)))
            }
            _ => Value::Num(left.as_num().unwrap_or(f64::NAN) + right.as_num().unwrap_or(f64::NAN)),
        },
        BinaryOp::Sub => Value::Num(num(&left) - num(&right)),
        BinaryOp::Mul => Value::Num(num(&left) * num(&right)),
        BinaryOp::Div => Value::Num(num(&left) / num(&right)),
        BinaryOp::Mod => Value::Num(num(&left) % num(&right)),
        BinaryOp::Exp => Value::Num(num(&left).powf(num(&right))),
        BinaryOp::BitOr => Value::Num(((num(&left) as i32) | (num(&right) as i32)) as f64),
        BinaryOp::BitAnd => Value::Num(((num(&left) as i32) & (num(&right) as i32)) as f64),
        BinaryOp::BitXor => Value::Num(((num(&left) as i32) ^ (num(&right) as i32)) as f64),
        BinaryOp::LShift => Value::Num(((num(&left) as i32) << (num(&right) as i32 & 31)) as f64),
        BinaryOp::RShift => Value::Num(((num(&left) as i32) >> (num(&right) as i32 & 31)) as f64),
        BinaryOp::ZeroFillRShift => {
            Value::Num(((num(&left) as u32) >> (num(&right) as i32 & 31)) as f64)
        }
        BinaryOp::Lt => Value::Bool(compare(&left, &right) == Some(std::cmp::Ordering::Less)),
        BinaryOp::LtEq => Value::Bool(matches!(
            compare(&left, &right),
            Some(std::cmp::Ordering::Less | std::cmp::Ordering::Equal)
        )),
        BinaryOp::Gt => Value::Bool(compare(&left, &right) == Some(std::cmp::Ordering::Greater)),
        BinaryOp::GtEq => Value::Bool(matches!(
            compare(&left, &right),
            Some(std::cmp::Ordering::Greater | std::cmp::Ordering::Equal)
        )),
        BinaryOp::EqEq | BinaryOp::EqEqEq => Value::Bool(left == right),
        BinaryOp::NotEq | BinaryOp::NotEqEq => Value::Bool(left != right),
        _ => return Ok(None),
    };
    Ok(Some(result))
}

fn num(value: &Value) -> f64 {
    value.as_num().unwrap_or(f64::NAN)
}

fn compare(left: &Value, right: &Value) -> Option<std::cmp::Ordering> {
    match (left, right) {
        (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
        _ => num(left).partial_cmp(&num(right)),
    }
}
