//! Forms encoded as JSON.
//!
//! Arrays become lists and objects become keyword-keyed maps. A string is
//! a keyword when it starts with `:`, a string literal when wrapped in
//! double quotes, and a symbol otherwise.

use serde_json::Value as Json;

use crate::builder::LiteralBuilder;
use crate::error::LispError;
use crate::language::{Name, Value};

pub fn read_json(text: &str, builder: &'static dyn LiteralBuilder) -> Result<Value, LispError> {
    let json: Json = serde_json::from_str(text).map_err(|e| {
        LispError::syntax(e.to_string(), "json-input", e.line(), e.column())
    })?;
    from_json(&json, builder)
}

pub fn from_json(json: &Json, builder: &'static dyn LiteralBuilder) -> Result<Value, LispError> {
    Ok(match json {
        Json::Null => builder.nil(),
        Json::Bool(b) => builder.boolean(*b),
        Json::Number(n) => {
            let n = n
                .as_f64()
                .ok_or_else(|| LispError::invalid(format!("'{n}' is an invalid expression")))?;
            builder.number(n)
        }
        Json::String(s) => {
            if s.len() >= 2 && s.starts_with('"') && s.ends_with('"') {
                builder.string(&s[1..s.len() - 1])
            } else if let Some(kw) = s.strip_prefix(':') {
                builder.keyword(Name::parse(kw))
            } else {
                builder.symbol(Name::parse(s))
            }
        }
        Json::Array(items) => {
            let elements = items
                .iter()
                .map(|item| from_json(item, builder))
                .collect::<Result<Vec<_>, _>>()?;
            builder.list(elements)
        }
        Json::Object(fields) => {
            let entries = fields
                .iter()
                .map(|(k, v)| Ok((builder.keyword(Name::parse(k)), from_json(v, builder)?)))
                .collect::<Result<Vec<_>, LispError>>()?;
            builder.map(entries)
        }
    })
}
