//! Protocols, record types and the built-in error classes.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use tracing::debug;
use wonder_core::{
    Environment, ErrorKind, InternedSymbol, LispError, Metadata, ModuleContext, Name,
    ObjectValue, ProtocolValue, TypeValue, Value,
};

use crate::forms::expect_symbol;
use crate::interpreter::{Completion, EvalResult, Interpreter};

// ============================================================================
// Error classes
// ============================================================================

/// `Error` and one subclass per interpreter error category.
pub struct ErrorTypes {
    pub base: Rc<TypeValue>,
    pub syntax: Rc<TypeValue>,
    pub undefined: Rc<TypeValue>,
    pub arity: Rc<TypeValue>,
    pub not_invocable: Rc<TypeValue>,
    pub invalid: Rc<TypeValue>,
    pub module: Rc<TypeValue>,
    pub type_error: Rc<TypeValue>,
    pub io: Rc<TypeValue>,
}

impl Default for ErrorTypes {
    fn default() -> Self {
        Self::new()
    }
}

impl ErrorTypes {
    pub fn new() -> Self {
        let base = Rc::new(TypeValue::new(
            Name::simple("Error"),
            vec![InternedSymbol::new("message")],
            None,
        ));
        let sub = |name: &str| {
            Rc::new(TypeValue::new(
                Name::simple(name),
                vec![InternedSymbol::new("message")],
                Some(base.clone()),
            ))
        };
        ErrorTypes {
            syntax: sub("SyntaxError"),
            undefined: sub("UndefinedVariableError"),
            arity: sub("ArityError"),
            not_invocable: sub("NotInvocableError"),
            invalid: sub("InvalidExpressionError"),
            module: sub("ModuleError"),
            type_error: sub("TypeError"),
            io: sub("IOError"),
            base,
        }
    }

    pub fn all(&self) -> [&Rc<TypeValue>; 9] {
        [
            &self.base,
            &self.syntax,
            &self.undefined,
            &self.arity,
            &self.not_invocable,
            &self.invalid,
            &self.module,
            &self.type_error,
            &self.io,
        ]
    }

    pub fn install(&self, env: &Environment) {
        for ty in self.all() {
            env.define(ty.name.name, Some(Value::Type(ty.clone())), None);
        }
    }

    pub fn class_for(&self, kind: &ErrorKind) -> &Rc<TypeValue> {
        match kind {
            ErrorKind::Syntax { .. } => &self.syntax,
            ErrorKind::UndefinedVariable(_) => &self.undefined,
            ErrorKind::Arity { .. } => &self.arity,
            ErrorKind::NotInvocable(_) => &self.not_invocable,
            ErrorKind::InvalidExpression(_) | ErrorKind::UncaughtRecursionPoint => &self.invalid,
            ErrorKind::Module(_) => &self.module,
            ErrorKind::Type(_) => &self.type_error,
            ErrorKind::Io(_) => &self.io,
            ErrorKind::Thrown(_) => &self.base,
        }
    }

    pub fn instantiate(&self, class: &Rc<TypeValue>, message: Value, stack: Value) -> Value {
        let mut fields = BTreeMap::new();
        fields.insert("message".to_string(), message);
        fields.insert("stack".to_string(), stack);
        Value::Object(Rc::new(ObjectValue {
            class: class.clone(),
            fields: RefCell::new(fields),
        }))
    }
}

/// Methods of a protocol or type body: `(name [self ...] body...)`.
fn method_spec(spec: &Value) -> Result<(Name, &[Value]), LispError> {
    match spec {
        Value::List(list) if list.elements.len() >= 2 => {
            let name = expect_symbol(&list.elements[0], "method")?;
            Ok((*name, &list.elements[1..]))
        }
        other => Err(LispError::invalid(format!(
            "method should look like (name [self args...] body...), got {other}"
        ))),
    }
}

impl Interpreter {
    fn make_method(
        &self,
        name: Name,
        rest: &[Value],
        env: &Environment,
        ctx: &ModuleContext,
    ) -> Result<Value, LispError> {
        let mut source = vec![Value::symbol("lambda")];
        source.extend_from_slice(rest);
        let lambda = self.make_lambda(rest, Value::list(source), env, ctx)?;
        *lambda.ident.borrow_mut() = Some(name);
        Ok(Value::Lambda(lambda))
    }

    pub(crate) fn eval_define_protocol(
        &self,
        args: &[Value],
        env: &Environment,
        ctx: &mut ModuleContext,
    ) -> EvalResult {
        let Some((name, specs)) = args.split_first() else {
            return Err(LispError::arity("define-protocol", "at least 1", 0));
        };
        let name = *expect_symbol(name, "define-protocol")?;
        let mut methods = Vec::with_capacity(specs.len());
        for spec in specs {
            let (method, rest) = method_spec(spec)?;
            methods.push((method.name_str(), self.make_method(method, rest, env, ctx)?));
        }
        debug!(protocol = %name, methods = methods.len(), "defined protocol");
        let protocol = Value::Protocol(Rc::new(ProtocolValue { name, methods }));
        let meta = Metadata::new().with("protocol", Value::Bool(true));
        self.define_variable(env, ctx, &name, protocol, Some(meta))?;
        Ok(Completion::Value(Value::Symbol(name)))
    }

    pub(crate) fn eval_define_type(
        &self,
        args: &[Value],
        env: &Environment,
        ctx: &mut ModuleContext,
    ) -> EvalResult {
        let [name, fields, specs @ ..] = args else {
            return Err(LispError::arity("define-type", "at least 2", args.len()));
        };
        let name = *expect_symbol(name, "define-type")?;
        let Some(field_forms) = fields.sequential_items().filter(|_| fields.is_vector()) else {
            return Err(LispError::invalid(format!(
                "field list should be a vector of symbols, got {fields}"
            )));
        };
        let field_names = field_forms
            .iter()
            .map(|f| expect_symbol(f, "define-type").map(|n| n.name))
            .collect::<Result<Vec<_>, _>>()?;

        let ty = Rc::new(TypeValue::new(name, field_names, None));
        // Bound before the specs run so methods can construct instances.
        let meta = Metadata::new().with("type", Value::Bool(true));
        self.define_variable(env, ctx, &name, Value::Type(ty.clone()), Some(meta))?;

        for spec in specs {
            match spec {
                Value::Symbol(_) => match value!(self.eval_in(spec, env, ctx)) {
                    Value::Protocol(protocol) => install_protocol(&ty, &protocol),
                    other => {
                        return Err(LispError::type_error(format!(
                            "{spec} is not a protocol: {other}"
                        )));
                    }
                },
                _ => {
                    let (method, rest) = method_spec(spec)?;
                    let lambda = self.make_method(method, rest, env, ctx)?;
                    ty.methods.borrow_mut().insert(method.name_str(), lambda);
                }
            }
        }
        debug!(
            type_name = %name,
            fields = ty.fields.len(),
            mixins = ty.mixins.borrow().len(),
            "defined type"
        );
        Ok(Completion::Value(Value::Symbol(name)))
    }

    /// Calling a protocol mixes its methods into a type (or an instance's type).
    pub(crate) fn apply_mixin(
        &self,
        protocol: &Rc<ProtocolValue>,
        args: &[Value],
    ) -> Result<Value, LispError> {
        let [target] = args else {
            return Err(LispError::arity(protocol.name.to_string(), "1", args.len()));
        };
        match target {
            Value::Type(ty) => install_protocol(ty, protocol),
            Value::Object(obj) => install_protocol(&obj.class, protocol),
            other => {
                return Err(LispError::type_error(format!(
                    "cannot mix {} into {other}",
                    protocol.name
                )));
            }
        }
        Ok(target.clone())
    }

    /// Build an instance from positional field values.
    /// Error classes also accept no arguments, leaving `message` empty.
    pub fn construct(&self, ty: &Rc<TypeValue>, mut args: Vec<Value>) -> Result<Value, LispError> {
        if args.is_empty() && ty.is_subtype_of(&self.errors.base) {
            args.push(Value::string(""));
        }
        if args.len() != ty.fields.len() {
            return Err(LispError::arity(
                ty.name.to_string(),
                ty.fields.len().to_string(),
                args.len(),
            ));
        }
        let fields = ty
            .fields
            .iter()
            .map(InternedSymbol::resolve)
            .zip(args)
            .collect();
        Ok(Value::Object(Rc::new(ObjectValue {
            class: ty.clone(),
            fields: RefCell::new(fields),
        })))
    }

    /// The value a `catch` clause binds for an error.
    pub fn reify_error(&self, error: &LispError) -> Value {
        if let ErrorKind::Thrown(value) = error.kind() {
            return value.clone();
        }
        let stack: Vec<String> = error.trace.iter().map(|f| format!("    at {f}")).collect();
        self.errors.instantiate(
            self.errors.class_for(error.kind()),
            Value::string(error.kind().to_string()),
            Value::string(stack.join("\n")),
        )
    }

    /// Whether `value` is an instance of a type (or carries a protocol).
    pub fn instance_of(&self, value: &Value, class: &Value) -> Result<bool, LispError> {
        match (value, class) {
            (Value::Object(obj), Value::Type(ty)) => Ok(obj.class.is_subtype_of(ty)),
            (Value::Object(obj), Value::Protocol(protocol)) => {
                Ok(obj.class.mixins.borrow().contains(&protocol.name))
            }
            (_, Value::Type(_) | Value::Protocol(_)) => Ok(false),
            (_, other) => Err(LispError::type_error(format!(
                "{other} is not a type or protocol"
            ))),
        }
    }
}

/// Copy a protocol's methods onto a type. Later protocols override earlier ones.
pub fn install_protocol(ty: &TypeValue, protocol: &ProtocolValue) {
    let mut methods = ty.methods.borrow_mut();
    for (name, method) in &protocol.methods {
        methods.insert(name.clone(), method.clone());
    }
    ty.mixins.borrow_mut().push(protocol.name);
}
