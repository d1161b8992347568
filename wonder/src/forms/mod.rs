//! Special forms
//!
//! A list whose head is one of these unqualified symbols is syntax: it is
//! never macro-expanded and never evaluated as an application.

pub mod control;
pub mod definition;
pub mod interop;

use std::rc::Rc;

use wonder_core::{Environment, LispError, ListValue, ModuleContext, Name, Value};

use crate::interpreter::{EvalResult, Interpreter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecialForm {
    Quote,
    Define,
    Cond,
    Lambda,
    Do,
    Try,
    Catch,
    Finally,
    Loop,
    Again,
    Set,
    DefineProtocol,
    DefineType,
    DefineMacro,
    Throw,
    PropertyGet,
    PropertySet,
    MethodCall,
    New,
    Module,
    Require,
    Use,
}

impl SpecialForm {
    pub const ALL: [SpecialForm; 22] = [
        SpecialForm::Quote,
        SpecialForm::Define,
        SpecialForm::Cond,
        SpecialForm::Lambda,
        SpecialForm::Do,
        SpecialForm::Try,
        SpecialForm::Catch,
        SpecialForm::Finally,
        SpecialForm::Loop,
        SpecialForm::Again,
        SpecialForm::Set,
        SpecialForm::DefineProtocol,
        SpecialForm::DefineType,
        SpecialForm::DefineMacro,
        SpecialForm::Throw,
        SpecialForm::PropertyGet,
        SpecialForm::PropertySet,
        SpecialForm::MethodCall,
        SpecialForm::New,
        SpecialForm::Module,
        SpecialForm::Require,
        SpecialForm::Use,
    ];

    pub fn name(self) -> &'static str {
        match self {
            SpecialForm::Quote => "quote",
            SpecialForm::Define => "define",
            SpecialForm::Cond => "cond",
            SpecialForm::Lambda => "lambda",
            SpecialForm::Do => "do",
            SpecialForm::Try => "try",
            SpecialForm::Catch => "catch",
            SpecialForm::Finally => "finally",
            SpecialForm::Loop => "loop",
            SpecialForm::Again => "again",
            SpecialForm::Set => "set!",
            SpecialForm::DefineProtocol => "define-protocol",
            SpecialForm::DefineType => "define-type",
            SpecialForm::DefineMacro => "define-macro",
            SpecialForm::Throw => "throw",
            SpecialForm::PropertyGet => ".-",
            SpecialForm::PropertySet => ".-set!",
            SpecialForm::MethodCall => ".",
            SpecialForm::New => "new",
            SpecialForm::Module => "module",
            SpecialForm::Require => "require",
            SpecialForm::Use => "use",
        }
    }

    /// The special form an unqualified symbol names, if any.
    pub fn from_name(name: &Name) -> Option<Self> {
        if name.is_qualified() {
            return None;
        }
        name.name
            .with_str(|s| Self::ALL.iter().copied().find(|form| form.name() == s))
    }
}

/// Forms after the head of a special form.
pub(crate) fn operands(list: &ListValue) -> &[Value] {
    &list.elements[1..]
}

pub(crate) fn expect_symbol<'a>(form: &'a Value, context: &str) -> Result<&'a Name, LispError> {
    form.as_symbol()
        .ok_or_else(|| LispError::invalid(format!("{context}: expected a symbol, got {form}")))
}

impl Interpreter {
    pub(crate) fn eval_special(
        &self,
        form: SpecialForm,
        list: &Rc<ListValue>,
        env: &Environment,
        ctx: &mut ModuleContext,
    ) -> EvalResult {
        let args = operands(list);
        let source = Value::List(list.clone());
        match form {
            SpecialForm::Quote => match args {
                [quoted] => Ok(crate::interpreter::Completion::Value(quoted.clone())),
                _ => Err(LispError::arity("quote", "1", args.len())),
            },
            SpecialForm::Define => self.eval_define(args, env, ctx),
            SpecialForm::Cond => self.eval_cond(args, env, ctx),
            SpecialForm::Lambda => self.eval_lambda_form(args, source, env, ctx),
            SpecialForm::Do => self.eval_do(args, env, ctx),
            SpecialForm::Try => self.eval_try(args, env, ctx),
            SpecialForm::Catch | SpecialForm::Finally => Err(LispError::invalid(format!(
                "{} is only valid inside try: {source}",
                form.name()
            ))),
            SpecialForm::Loop => self.eval_loop(args, env, ctx),
            SpecialForm::Again => self.eval_again(args, env, ctx),
            SpecialForm::Set => self.eval_set(args, env, ctx),
            SpecialForm::DefineProtocol => self.eval_define_protocol(args, env, ctx),
            SpecialForm::DefineType => self.eval_define_type(args, env, ctx),
            SpecialForm::DefineMacro => self.eval_define_macro(args, env, ctx),
            SpecialForm::Throw => self.eval_throw(args, env, ctx),
            SpecialForm::PropertyGet => self.eval_property_get(args, &source, env, ctx),
            SpecialForm::PropertySet => self.eval_property_set(args, env, ctx),
            SpecialForm::MethodCall => self.eval_method_call(args, &source, env, ctx),
            SpecialForm::New => self.eval_new(args, env, ctx),
            SpecialForm::Module => self.eval_module(args, ctx),
            SpecialForm::Require => self.eval_require(args, ctx),
            SpecialForm::Use => self.eval_use(args, ctx),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip() {
        for form in SpecialForm::ALL {
            assert_eq!(SpecialForm::from_name(&Name::simple(form.name())), Some(form));
        }
    }

    #[test]
    fn qualified_symbols_are_never_special() {
        assert_eq!(SpecialForm::from_name(&Name::qualified("m", "define")), None);
        assert_eq!(SpecialForm::from_name(&Name::simple("defined")), None);
    }
}
