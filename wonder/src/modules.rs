//! Module registry and the `module`, `require` and `use` forms.
//!
//! Modules live in a tree keyed by the dotted segments of their names.
//! Each module owns a scope whose parent is the global environment; the
//! active module travels with evaluation in a `ModuleContext`.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use tracing::debug;
use wonder_core::{InternedSymbol, LispError, Metadata, Module, ModuleContext, Name, Value};

use crate::forms::expect_symbol;
use crate::interpreter::{Completion, EvalResult, Interpreter};

#[derive(Default)]
struct ModuleNode {
    module: Option<Rc<Module>>,
    children: BTreeMap<String, ModuleNode>,
}

/// Tree of named modules.
#[derive(Default)]
pub struct ModuleRegistry {
    root: RefCell<ModuleNode>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, module: Rc<Module>) {
        let path = module.name.to_string();
        let mut root = self.root.borrow_mut();
        let mut node = &mut *root;
        for segment in path.split('.') {
            node = node.children.entry(segment.to_string()).or_default();
        }
        node.module = Some(module);
    }

    pub fn find(&self, name: &str) -> Option<Rc<Module>> {
        let root = self.root.borrow();
        let mut node = &*root;
        for segment in name.split('.') {
            node = node.children.get(segment)?;
        }
        node.module.clone()
    }

    /// Names of every registered module, in tree order.
    pub fn names(&self) -> Vec<String> {
        fn walk(node: &ModuleNode, out: &mut Vec<String>) {
            if let Some(module) = &node.module {
                out.push(module.name.to_string());
            }
            for child in node.children.values() {
                walk(child, out);
            }
        }
        let mut out = Vec::new();
        walk(&self.root.borrow(), &mut out);
        out
    }
}

fn module_name(args: &[Value], form: &str) -> Result<Name, LispError> {
    match args {
        [name] => Ok(*expect_symbol(name, form)?),
        _ => Err(LispError::arity(form, "1", args.len())),
    }
}

impl Interpreter {
    /// Find a module, creating it (scope, registry entry and global
    /// binding) on first use.
    pub fn define_module(&self, name: &Name) -> Rc<Module> {
        let key = name.to_string();
        if let Some(module) = self.modules.find(&key) {
            return module;
        }
        let scope = self.global.extend();
        scope.set_ident(key.clone());
        scope.define(
            InternedSymbol::new("*module-name*"),
            Some(Value::Symbol(*name)),
            None,
        );
        let module = Rc::new(Module { name: *name, scope });
        self.modules.insert(module.clone());
        self.global.define(
            InternedSymbol::new(&key),
            Some(Value::Module(module.clone())),
            Some(Metadata::new().with("tag", Value::keyword("module"))),
        );
        debug!(module = %key, "defined module");
        module
    }

    pub(crate) fn eval_module(&self, args: &[Value], ctx: &mut ModuleContext) -> EvalResult {
        let name = module_name(args, "module")?;
        let module = self.define_module(&name);
        debug!(module = %name, "entering module");
        ctx.module = module.clone();
        Ok(Completion::Value(Value::Module(module)))
    }

    pub(crate) fn eval_use(&self, args: &[Value], ctx: &mut ModuleContext) -> EvalResult {
        let name = module_name(args, "use")?;
        let module = self
            .modules
            .find(&name.to_string())
            .ok_or_else(|| LispError::module(format!("module {name} does not exist")))?;
        ctx.module = module;
        Ok(Completion::Value(Value::Nil))
    }

    /// Load a file by relative path (string) or module name (symbol). The
    /// active module is unchanged afterwards.
    pub(crate) fn eval_require(&self, args: &[Value], ctx: &mut ModuleContext) -> EvalResult {
        let [target] = args else {
            return Err(LispError::arity("require", "1", args.len()));
        };
        let dir = ctx
            .dir
            .clone()
            .unwrap_or_else(|| self.options.source_root.clone());
        let (path, module) = match target {
            Value::String(path) => (dir.join(&**path), None),
            Value::Symbol(name) => {
                let name = name.to_string();
                (dir.join(self.options.module_path(&name)), Some(name))
            }
            other => {
                return Err(LispError::invalid(format!(
                    "module name should be a symbol or string, got {other}"
                )));
            }
        };
        debug!(path = %path.display(), "require");
        self.eval_file(&path, ctx.clone())?;
        if let Some(name) = module
            && self.modules.find(&name).is_none()
        {
            return Err(LispError::module(format!("module {name} does not exist")));
        }
        Ok(Completion::Value(Value::Bool(true)))
    }
}
