//! Macro expansion.
//!
//! A list whose head symbol resolves to a binding flagged `:macro` is
//! replaced by the result of applying that lambda to the unevaluated
//! operand forms, repeatedly, until the head no longer names a macro.
//! Special forms are checked first and never expand.

use tracing::trace;
use wonder_core::{Environment, LispError, ModuleContext, Value};

use crate::forms::SpecialForm;
use crate::interpreter::Interpreter;

impl Interpreter {
    /// The macro a form's head names, if any.
    fn macro_for(
        &self,
        form: &Value,
        env: &Environment,
        ctx: &ModuleContext,
    ) -> Result<Option<(Value, Vec<Value>)>, LispError> {
        let Value::List(list) = form else {
            return Ok(None);
        };
        let Some((Value::Symbol(name), operands)) = list.elements.split_first() else {
            return Ok(None);
        };
        if SpecialForm::from_name(name).is_some() {
            return Ok(None);
        }
        // An unknown namespace is an error for evaluation to report.
        let Ok(Some(binding)) = self.resolve_binding(name, env, ctx) else {
            return Ok(None);
        };
        let is_macro = binding.meta.as_ref().is_some_and(|meta| meta.flag("macro"));
        match binding.value {
            Value::Lambda(_) if is_macro => Ok(Some((binding.value, operands.to_vec()))),
            _ => Ok(None),
        }
    }

    pub(crate) fn macroexpand_in(
        &self,
        form: &Value,
        env: &Environment,
        ctx: &ModuleContext,
    ) -> Result<Value, LispError> {
        let mut current = form.clone();
        while let Some((expander, operands)) = self.macro_for(&current, env, ctx)? {
            let expanded = self.apply(&expander, operands)?;
            trace!(from = %current, to = %expanded, "macro expansion");
            current = expanded;
        }
        Ok(current)
    }
}
