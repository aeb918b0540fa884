//! The isolated macro execution context: one `rquickjs` `Runtime`/`Context`
//! pair, bundles cached per entry module until [`HostRuntime::clear_cache`]
//! is called.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::path::Path;
use std::rc::Rc;

use pod_ast::{NodeArena, NodeHandle, Value};
use pod_retry::{RetryExecutor, RetryPolicy};
use rquickjs::{CatchResultExt, Context, Function, Object, Runtime, Value as JsValue};

use crate::bundler::bundle;
use crate::error::HostError;
use crate::host_functions::{
    EXPLICIT_ERROR_PREFIX, install_ast_factory, install_context, js_to_value, value_to_js,
};
use crate::store::{SharedStore, Store};

/// A `!Send` macro execution context. QuickJS contexts are single-threaded
/// by construction, which is what statically enforces the "macros MUST
/// NOT suspend, single thread" rule rather than merely documenting it.
pub struct HostRuntime {
    runtime: Runtime,
    contexts: RefCell<BTreeMap<String, Context>>,
    store: SharedStore,
}

impl HostRuntime {
    pub fn new() -> anyhow::Result<Self> {
        let runtime = Runtime::new()?;
        // Macro bodies are small transforms, not general-purpose programs;
        // a generous but finite heap turns a runaway allocation loop into
        // a clean error instead of an OOM kill.
        runtime.set_memory_limit(64 * 1024 * 1024);
        Ok(Self {
            runtime,
            contexts: RefCell::new(BTreeMap::new()),
            store: Store::new(),
        })
    }

    /// The shared store macro bodies read and write through `context.store`.
    /// Exposed so the expander can also inspect it once a build finishes
    /// (e.g. to flush collected style rules).
    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    /// Drops the cached context for `specifier`, or every cached context
    /// when `specifier` is `None`. The next `invoke` against a cleared
    /// entry rebundles and re-evaluates from source.
    pub fn clear_cache(&self, specifier: Option<&str>) {
        match specifier {
            Some(key) => {
                self.contexts.borrow_mut().remove(key);
            }
            None => self.contexts.borrow_mut().clear(),
        }
    }

    /// Runs the export named `export` from the macro module rooted at
    /// `entry_file`, passing `args` and building any returned AST node
    /// into `arena`. Returns the handle to that node.
    pub fn invoke(
        &self,
        entry_file: &Path,
        project_root: &Path,
        export: &str,
        args: &[Value],
        arena: Rc<RefCell<NodeArena>>,
        call_file: &str,
    ) -> Result<NodeHandle, HostError> {
        // Bundling reads from the filesystem; a module shared over a
        // network mount can see a transient read failure that succeeds on
        // a retry, the same class of error `pod-deploy`'s verify loop
        // tolerates.
        let executor = RetryExecutor::from_policy(RetryPolicy::Conservative);
        let bundled = executor
            .run(|_attempt| bundle(entry_file, project_root))
            .map_err(|source| HostError::Load {
                specifier: entry_file.display().to_string(),
                source,
            })?;

        if !self.contexts.borrow().contains_key(&bundled.entry_key) {
            let context = Context::full(&self.runtime).map_err(|e| HostError::Load {
                specifier: bundled.entry_key.clone(),
                source: anyhow::anyhow!(e.to_string()),
            })?;

            context
                .with(|ctx| ctx.eval::<(), _>(bundled.script.clone()))
                .catch(&context)
                .map_err(|e| HostError::Load {
                    specifier: bundled.entry_key.clone(),
                    source: anyhow::anyhow!("{e:?}"),
                })?;

            self.contexts
                .borrow_mut()
                .insert(bundled.entry_key.clone(), context);
        }

        let interrupted = Rc::new(Cell::new(false));
        {
            let flag = interrupted.clone();
            self.runtime
                .set_interrupt_handler(Some(Box::new(move || flag.get())));
        }

        let contexts = self.contexts.borrow();
        let context = contexts
            .get(&bundled.entry_key)
            .expect("context inserted above");

        let run = context.with(|ctx| -> anyhow::Result<NodeHandle> {
            install_ast_factory(&ctx, arena.clone())?;
            install_context(&ctx, call_file, self.store.clone())?;

            let entry: Object = ctx.globals().get("__pod_entry")?;
            let func: Function = entry.get(export)?;

            let mut js_args = Vec::with_capacity(args.len() + 1);
            for arg in args {
                js_args.push(value_to_js(&ctx, arg)?);
            }
            let pod_context: JsValue = ctx.globals().get("__pod_context")?;
            js_args.push(pod_context);

            let returned: JsValue = func
                .call((rquickjs::function::Rest(js_args),))
                .catch(&ctx)
                .map_err(|e| anyhow::anyhow!("{e:?}"))?;
            let value = js_to_value(&ctx, &returned)?;
            node_handle_from_value(export, &value)
        });

        self.runtime.set_interrupt_handler(None);

        run.map_err(|source| {
            if interrupted.get() {
                return HostError::Interrupted {
                    export: export.to_string(),
                };
            }
            let rendered = format!("{source:#}");
            match rendered.strip_prefix(EXPLICIT_ERROR_PREFIX) {
                Some(message) => HostError::ExplicitError {
                    export: export.to_string(),
                    message: message.to_string(),
                },
                None => HostError::Execution {
                    export: export.to_string(),
                    source,
                },
            }
        })
    }
}

fn node_handle_from_value(export: &str, value: &Value) -> anyhow::Result<NodeHandle> {
    match value {
        Value::Object(obj) => {
            let id = obj
                .get("__pod_node")
                .and_then(Value::as_num)
                .ok_or_else(|| anyhow::anyhow!("macro `{export}` did not return an AST node"))?;
            Ok(NodeHandle { id: id as usize })
        }
        _ => anyhow::bail!("macro `{export}` did not return an AST node"),
    }
}
