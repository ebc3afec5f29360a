//! Advice decoders.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use serde::Deserialize;
use serde_yaml::Value;

use crate::aspect::advice::{
    AddBlankImport, AddComment, AddStructField, Advice, AdviceOrder, AppendArgs, AppendStatements, AssignValue,
    InjectDeclarations, PrependStatements, ReplaceFunction, Template, WrapExpression,
};

use super::join::ty;
use super::{payload, singleton, symbol, ConfigError, Decoder};

type AdviceDecoder = Decoder<Box<dyn Advice>>;

static ADVICE: Lazy<HashMap<&'static str, AdviceDecoder>> = Lazy::new(|| {
    let mut registry: HashMap<&'static str, AdviceDecoder> = HashMap::new();
    registry.insert("prepend-statements", |v| {
        let (template, order) = ordered_template("prepend-statements", v)?;
        let advice = PrependStatements::new(template);
        Ok(Box::new(match order {
            Some(order) => advice.with_order(order),
            None => advice,
        }))
    });
    registry.insert("append-statements", |v| {
        let (template, order) = ordered_template("append-statements", v)?;
        let advice = AppendStatements::new(template);
        Ok(Box::new(match order {
            Some(order) => advice.with_order(order),
            None => advice,
        }))
    });
    registry.insert("assign-value", |v| {
        Ok(Box::new(AssignValue::new(payload::<Template>("assign-value", v)?)))
    });
    registry.insert("wrap-expression", |v| {
        Ok(Box::new(WrapExpression::new(payload::<Template>("wrap-expression", v)?)))
    });
    registry.insert("add-struct-field", decode_add_struct_field);
    registry.insert("inject-declarations", decode_inject_declarations);
    registry.insert("add-blank-import", |v| {
        Ok(Box::new(AddBlankImport(payload("add-blank-import", v)?)))
    });
    registry.insert("replace-function", |v| {
        let (path, name) = symbol("replace-function", v)?;
        Ok(Box::new(ReplaceFunction::new(path, name)))
    });
    registry.insert("append-args", decode_append_args);
    registry.insert("add-comment", |v| Ok(Box::new(AddComment(payload("add-comment", v)?))));
    registry
});

/// Decodes an advice written as a single-key mapping.
pub fn decode_advice(value: &Value) -> Result<Box<dyn Advice>, ConfigError> {
    let (key, payload) = singleton(value, "advice")?;
    let decode = ADVICE.get(key).ok_or_else(|| ConfigError::UnknownKey {
        context: "advice",
        key: key.to_string(),
    })?;
    decode(payload)
}

/// Removes `keys` from a mapping payload, returning their values in order.
fn split_off<const N: usize>(value: &Value, keys: [&str; N]) -> (Value, [Option<Value>; N]) {
    let mut value = value.clone();
    let taken = keys.map(|key| match &mut value {
        Value::Mapping(map) => map.remove(key),
        _ => None,
    });
    (value, taken)
}

/// A statement template with its optional `order` and `namespace`.
fn ordered_template(key: &str, value: &Value) -> Result<(Template, Option<AdviceOrder>), ConfigError> {
    let (rest, [order, namespace]) = split_off(value, ["order", "namespace"]);
    let template = payload::<Template>(key, &rest)?;
    if order.is_none() && namespace.is_none() {
        return Ok((template, None));
    }
    let order = match order {
        Some(order) => payload::<i64>(key, &order)?,
        None => 0,
    };
    let namespace = match namespace {
        Some(namespace) => payload::<String>(key, &namespace)?,
        None => AdviceOrder::default().namespace,
    };
    Ok((template, Some(AdviceOrder::new(namespace, order))))
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct StructFieldSpec {
    name: String,
    #[serde(rename = "type")]
    ty: Value,
}

fn decode_add_struct_field(value: &Value) -> Result<Box<dyn Advice>, ConfigError> {
    let spec: StructFieldSpec = payload("add-struct-field", value)?;
    Ok(Box::new(AddStructField::new(spec.name, ty("add-struct-field", &spec.ty)?)))
}

fn decode_inject_declarations(value: &Value) -> Result<Box<dyn Advice>, ConfigError> {
    let (rest, [links]) = split_off(value, ["links"]);
    let template = payload::<Template>("inject-declarations", &rest)?;
    let links = match links {
        Some(links) => payload::<Vec<String>>("inject-declarations", &links)?,
        None => Vec::new(),
    };
    Ok(Box::new(InjectDeclarations::new(template).with_links(links)))
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct AppendArgsSpec {
    #[serde(rename = "type")]
    ty: Value,
    values: Vec<Template>,
}

fn decode_append_args(value: &Value) -> Result<Box<dyn Advice>, ConfigError> {
    let spec: AppendArgsSpec = payload("append-args", value)?;
    Ok(Box::new(AppendArgs::new(ty("append-args", &spec.ty)?, spec.values)))
}
