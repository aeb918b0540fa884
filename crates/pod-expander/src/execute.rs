//! Phase 4: invokes the macro definition behind a not-yet-computed site,
//! in topological order, and stores both its AST result and folded value
//! on the graph.

use std::cell::RefCell;
use std::rc::Rc;

use pod_ast::NodeArena;
use pod_graph::Graph;
use pod_host::HostRuntime;
use pod_types::{ExpanderError, SiteKey};

use crate::discovery::direct_call_callee;
use crate::project::{Project, resolve_relative};
use crate::resolve::{EvalCtx, eval_expr, is_resolvable_path};

/// Executes one site: resolves its macro definition, evaluates its
/// arguments (now safe — the topological order guarantees every site it
/// depends on is already computed), invokes the macro, and stores the
/// result.
pub fn execute_site(
    key: &SiteKey,
    project: &Project,
    graph: &mut Graph,
    host: &HostRuntime,
    arena: Rc<RefCell<NodeArena>>,
) -> Result<(), ExpanderError> {
    let site = graph
        .get(key)
        .expect("topological_sort only returns registered sites")
        .clone();

    let macro_name = direct_call_callee(&site.call)
        .map(str::to_string)
        .ok_or_else(|| ExpanderError::Resolution {
            name: site.binding.clone(),
            file: site.file.clone(),
        })?;

    let file_path = project.root.join(&site.file);
    let import = project
        .with_index(&file_path, |index| index.imports.get(&macro_name).cloned())
        .flatten()
        .ok_or_else(|| ExpanderError::Resolution {
            name: macro_name.clone(),
            file: site.file.clone(),
        })?;

    if !is_resolvable_path(&import.specifier) {
        return Err(ExpanderError::PackageImport {
            name: macro_name,
            file: site.file.clone(),
            specifier: import.specifier,
        });
    }

    let module_path = resolve_relative(&file_path, &import.specifier).ok_or_else(|| {
        ExpanderError::MacroLoad {
            specifier: import.specifier.clone(),
            source: anyhow::anyhow!(
                "no candidate file found for `{}` relative to {}",
                import.specifier,
                file_path.display()
            ),
        }
    })?;

    let mut args = Vec::with_capacity(site.call.args.len());
    for arg in &site.call.args {
        let mut ctx = EvalCtx {
            project,
            graph,
            current_site: key.clone(),
            probe: false,
        };
        let value = eval_expr(&arg.expr, &file_path, &mut ctx)?.ok_or_else(|| {
            ExpanderError::Resolution {
                name: macro_name.clone(),
                file: site.file.clone(),
            }
        })?;
        args.push(value);
    }

    tracing::debug!(site = %key, macro_name, "invoking macro");

    let handle = host
        .invoke(
            &module_path,
            &project.root,
            &import.imported,
            &args,
            arena.clone(),
            &site.file,
        )
        .map_err(|source| ExpanderError::MacroExecution {
            macro_name: macro_name.clone(),
            source: anyhow::anyhow!(source),
        })?;

    let result_expr = arena
        .borrow_mut()
        .take(handle.to_node_id())
        .ok_or_else(|| ExpanderError::MacroReturn {
            macro_name: macro_name.clone(),
        })?;

    graph
        .set_result(key, result_expr)
        .map_err(|_| ExpanderError::Resolution {
            name: site.binding.clone(),
            file: site.file.clone(),
        })?;

    Ok(())
}
