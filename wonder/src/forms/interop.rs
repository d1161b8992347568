//! Object interop: `.-`, `.-set!`, `.` and `new`, plus the operator
//! shorthands that rewrite into them.

use wonder_core::{CollectionOps, Environment, LispError, ModuleContext, Name, Value};

use crate::host;
use crate::interpreter::{Completion, EvalResult, Interpreter};

/// Rewrite interop shorthand in operator position:
/// `(.-x obj)` is `(.- obj x)`, `(.m obj a)` is `(. obj (m a))` and
/// `(Point. 1 2)` is `(new Point 1 2)`.
pub fn desugar(op: &Name, items: &[Value]) -> Option<Value> {
    let text = op.name_str();
    let args = &items[1..];
    if !op.is_qualified() && text.len() > 1 && text.starts_with('.') {
        let (receiver, rest) = args.split_first()?;
        if let Some(prop) = text.strip_prefix(".-") {
            if prop.is_empty() || prop == "set!" {
                return None;
            }
            return Some(Value::list(vec![
                Value::symbol(".-"),
                receiver.clone(),
                Value::Symbol(Name::simple(prop)),
            ]));
        }
        let mut call = vec![Value::Symbol(Name::simple(&text[1..]))];
        call.extend_from_slice(rest);
        return Some(Value::list(vec![
            Value::symbol("."),
            receiver.clone(),
            Value::list(call),
        ]));
    }
    if text.len() > 1 && text.ends_with('.') && !text.starts_with('.') {
        let class = Name {
            namespace: op.namespace,
            name: text[..text.len() - 1].into(),
        };
        let mut form = vec![Value::symbol("new"), Value::Symbol(class)];
        form.extend_from_slice(args);
        return Some(Value::list(form));
    }
    None
}

/// Property name from the second operand of `.-`/`.-set!`.
fn property_key(
    interp: &Interpreter,
    form: &Value,
    env: &Environment,
    ctx: &mut ModuleContext,
) -> Result<Completion, LispError> {
    match form {
        Value::Symbol(name) => Ok(Completion::Value(Value::string(name.to_string()))),
        other => interp.eval_in(other, env, ctx),
    }
}

fn key_text(key: &Value) -> String {
    match key {
        Value::String(s) => s.to_string(),
        Value::Keyword(name) | Value::Symbol(name) => name.name_str(),
        other => other.to_string(),
    }
}

impl Interpreter {
    /// Read a property of an object, map, sequence, string or module.
    pub fn get_property(&self, target: &Value, key: &Value) -> Result<Value, LispError> {
        let coll = self.collections_ref();
        let prop = key_text(key);
        Ok(match target {
            Value::Object(obj) => obj
                .field(&prop)
                .or_else(|| obj.class.method(&prop))
                .unwrap_or(Value::Nil),
            Value::Map(_) | Value::PersistentMap(_) => {
                let keyword = Value::Keyword(Name::parse(&prop));
                if coll.contains(target, &keyword) {
                    coll.get(target, &keyword)
                } else if coll.contains(target, key) {
                    coll.get(target, key)
                } else {
                    coll.get(target, &Value::string(&prop))
                }
            }
            Value::String(_) | Value::List(_) | Value::Vector(_) | Value::PersistentVector(_) => {
                match key {
                    Value::Number(_) => coll.get(target, key),
                    _ if prop == "length" => Value::Number(coll.count(target)? as f64),
                    _ => Value::Nil,
                }
            }
            Value::Module(module) => module
                .scope
                .own(Name::simple(&prop).name)
                .map(|binding| binding.value)
                .unwrap_or(Value::Nil),
            Value::Type(ty) if prop == "name" => Value::string(ty.name.to_string()),
            _ => Value::Nil,
        })
    }

    pub(crate) fn eval_property_get(
        &self,
        args: &[Value],
        source: &Value,
        env: &Environment,
        ctx: &mut ModuleContext,
    ) -> EvalResult {
        let [target, prop] = args else {
            return Err(LispError::arity(".-", "2", args.len()));
        };
        let target = value!(self.eval_in(target, env, ctx));
        if matches!(target, Value::Nil) {
            return Err(LispError::type_error(format!(
                "nil is not an object from: {source}"
            )));
        }
        let key = value!(property_key(self, prop, env, ctx));
        self.get_property(&target, &key).map(Completion::Value)
    }

    pub(crate) fn eval_property_set(
        &self,
        args: &[Value],
        env: &Environment,
        ctx: &mut ModuleContext,
    ) -> EvalResult {
        let [target, prop, form] = args else {
            return Err(LispError::arity(".-set!", "3", args.len()));
        };
        let target = value!(self.eval_in(target, env, ctx));
        let key = value!(property_key(self, prop, env, ctx));
        let value = value!(self.eval_in(form, env, ctx));
        match &target {
            Value::Object(obj) => {
                obj.set_field(key_text(&key), value.clone());
                Ok(Completion::Value(value))
            }
            other => Err(LispError::type_error(format!(
                "cannot set property {} of {other}",
                key_text(&key)
            ))),
        }
    }

    pub(crate) fn eval_method_call(
        &self,
        args: &[Value],
        source: &Value,
        env: &Environment,
        ctx: &mut ModuleContext,
    ) -> EvalResult {
        let Some((target, call)) = args.split_first() else {
            return Err(LispError::arity(".", "at least 2", args.len()));
        };
        // Either `(. obj (method a b))` or `(. obj method a b)`.
        let (method, arg_forms) = match call {
            [Value::List(list)] if !list.elements.is_empty() => {
                (&list.elements[0], &list.elements[1..])
            }
            [method, rest @ ..] => (method, rest),
            [] => return Err(LispError::arity(".", "at least 2", args.len())),
        };
        let Some(method) = method.as_symbol() else {
            return Err(LispError::invalid(format!(
                "method name should be a symbol: {source}"
            )));
        };
        let method = method.name_str();

        let receiver = value!(self.eval_in(target, env, ctx));
        let mut call_args = Vec::with_capacity(arg_forms.len());
        for form in arg_forms {
            call_args.push(value!(self.eval_in(form, env, ctx)));
        }
        self.call_method(&receiver, &method, call_args, source)
            .map(Completion::Value)
    }

    /// Apply a named method to a receiver.
    pub fn call_method(
        &self,
        receiver: &Value,
        method: &str,
        args: Vec<Value>,
        source: &Value,
    ) -> Result<Value, LispError> {
        match receiver {
            Value::Object(obj) => {
                if let Some(func) = obj.class.method(method) {
                    let mut full = Vec::with_capacity(args.len() + 1);
                    full.push(receiver.clone());
                    full.extend(args);
                    return self.invoke(&func, full, source);
                }
                match obj.field(method) {
                    Some(func) => self.invoke(&func, args, source),
                    None => Err(LispError::type_error(format!(
                        "{} has no method {method}",
                        obj.class.name
                    ))),
                }
            }
            Value::String(s) => host::string_method(method, s, &args),
            Value::Nil => Err(LispError::type_error(format!(
                "nil is not an object from: {source}"
            ))),
            other => {
                let func = self.get_property(other, &Value::string(method))?;
                if matches!(func, Value::Nil) {
                    return Err(LispError::type_error(format!(
                        "{} has no method {method}",
                        other.type_name()
                    )));
                }
                self.invoke(&func, args, source)
            }
        }
    }

    pub(crate) fn eval_new(
        &self,
        args: &[Value],
        env: &Environment,
        ctx: &mut ModuleContext,
    ) -> EvalResult {
        let Some((class, arg_forms)) = args.split_first() else {
            return Err(LispError::arity("new", "at least 1", 0));
        };
        let class = value!(self.eval_in(class, env, ctx));
        let mut values = Vec::with_capacity(arg_forms.len());
        for form in arg_forms {
            values.push(value!(self.eval_in(form, env, ctx)));
        }
        match &class {
            Value::Type(ty) => self.construct(ty, values).map(Completion::Value),
            _ => Err(LispError::type_error(format!(
                "class given is not a valid constructor: {class}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn items(text: &str) -> Vec<Value> {
        let forms = wonder_core::read_string(text, "test").unwrap();
        forms[0].sequential_items().unwrap()
    }

    #[test]
    fn property_shorthand() {
        let form = items("(.-x point)");
        let op = *form[0].as_symbol().unwrap();
        assert_eq!(desugar(&op, &form).unwrap().to_string(), "(.- point x)");
    }

    #[test]
    fn method_shorthand() {
        let form = items("(.toUpperCase s 1)");
        let op = *form[0].as_symbol().unwrap();
        assert_eq!(desugar(&op, &form).unwrap().to_string(), "(. s (toUpperCase 1))");
    }

    #[test]
    fn constructor_shorthand_keeps_the_namespace() {
        let form = items("(geo/Point. 1 2)");
        let op = *form[0].as_symbol().unwrap();
        assert_eq!(desugar(&op, &form).unwrap().to_string(), "(new geo/Point 1 2)");
    }

    #[test]
    fn plain_symbols_are_left_alone() {
        let form = items("(foo 1)");
        let op = *form[0].as_symbol().unwrap();
        assert!(desugar(&op, &form).is_none());
    }
}
