//! Join point and function option decoders.

use std::collections::{BTreeMap, HashMap};

use once_cell::sync::Lazy;
use serde::Deserialize;
use serde_yaml::Value;

use crate::aspect::join::{
    AllOf, AssignmentOf, Configuration, DeclarationOf, Directive, Function, FunctionBody, FunctionCall,
    FunctionOption, ImportPath, Not, OneOf, PackageFilter, PackageName, Point, StructDefinition, StructLiteral,
    StructLiteralMatch, TestMain, ValueDeclaration,
};
use crate::typed::{NamedType, Type};

use super::{payload, singleton, symbol, ConfigError, Decoder};

type PointDecoder = Decoder<Box<dyn Point>>;

static JOIN_POINTS: Lazy<HashMap<&'static str, PointDecoder>> = Lazy::new(|| {
    let mut registry: HashMap<&'static str, PointDecoder> = HashMap::new();
    registry.insert("all-of", |v| Ok(Box::new(AllOf(points(v, "all-of")?))));
    registry.insert("one-of", |v| Ok(Box::new(OneOf(points(v, "one-of")?))));
    registry.insert("not", |v| Ok(Box::new(Not(decode_join_point(v)?))));
    registry.insert("configuration", |v| {
        Ok(Box::new(Configuration(payload::<BTreeMap<String, String>>("configuration", v)?)))
    });
    registry.insert("declaration-of", decode_declaration_of);
    registry.insert("value-declaration", |v| {
        Ok(Box::new(ValueDeclaration(ty("value-declaration", v)?)))
    });
    registry.insert("assignment-of", |v| Ok(Box::new(AssignmentOf(decode_join_point(v)?))));
    registry.insert("directive", |v| {
        Ok(Box::new(Directive::new(payload::<String>("directive", v)?)))
    });
    registry.insert("function-call", |v| {
        let (path, name) = symbol("function-call", v)?;
        Ok(Box::new(FunctionCall::new(path, name)))
    });
    registry.insert("function", decode_function);
    registry.insert("function-body", |v| Ok(Box::new(FunctionBody(decode_join_point(v)?))));
    registry.insert("import-path", |v| {
        Ok(Box::new(ImportPath(payload::<String>("import-path", v)?)))
    });
    registry.insert("package-name", |v| {
        Ok(Box::new(PackageName(payload::<String>("package-name", v)?)))
    });
    registry.insert("package-filter", decode_package_filter);
    registry.insert("struct-definition", |v| {
        let text: String = payload("struct-definition", v)?;
        Ok(Box::new(StructDefinition(named("struct-definition", &text)?)))
    });
    registry.insert("struct-literal", decode_struct_literal);
    registry.insert("test-main", |v| Ok(Box::new(TestMain(payload::<bool>("test-main", v)?))));
    registry
});

type OptionDecoder = Decoder<FunctionOption>;

static FUNCTION_OPTIONS: Lazy<HashMap<&'static str, OptionDecoder>> = Lazy::new(|| {
    let mut registry: HashMap<&'static str, OptionDecoder> = HashMap::new();
    registry.insert("name", |v| Ok(FunctionOption::Name(payload("name", v)?)));
    registry.insert("signature", |v| {
        let (args, returns) = signature("signature", v)?;
        Ok(FunctionOption::Signature { args, returns })
    });
    registry.insert("signature-contains", |v| {
        let (args, returns) = signature("signature-contains", v)?;
        Ok(FunctionOption::SignatureContains { args, returns })
    });
    registry.insert("receiver", |v| Ok(FunctionOption::Receiver(ty("receiver", v)?)));
    registry.insert("result-implements", |v| {
        Ok(FunctionOption::ResultImplements(ty("result-implements", v)?))
    });
    registry.insert("final-result-implements", |v| {
        Ok(FunctionOption::FinalResultImplements(ty("final-result-implements", v)?))
    });
    registry
});

/// Decodes a join point written as a single-key mapping.
pub fn decode_join_point(value: &Value) -> Result<Box<dyn Point>, ConfigError> {
    let (key, payload) = singleton(value, "join point")?;
    let decode = JOIN_POINTS.get(key).ok_or_else(|| ConfigError::UnknownKey {
        context: "join point",
        key: key.to_string(),
    })?;
    decode(payload)
}

/// Decodes one entry of a `function` join point.
pub fn decode_function_option(value: &Value) -> Result<FunctionOption, ConfigError> {
    let (key, payload) = singleton(value, "function option")?;
    let decode = FUNCTION_OPTIONS.get(key).ok_or_else(|| ConfigError::UnknownKey {
        context: "function option",
        key: key.to_string(),
    })?;
    decode(payload)
}

fn points(value: &Value, key: &str) -> Result<Vec<Box<dyn Point>>, ConfigError> {
    payload::<Vec<Value>>(key, value)?
        .iter()
        .map(decode_join_point)
        .collect()
}

fn parse_type(key: &str, text: &str) -> Result<Type, ConfigError> {
    Type::parse(text).map_err(|source| ConfigError::Type {
        key: key.to_string(),
        source,
    })
}

pub(crate) fn ty(key: &str, value: &Value) -> Result<Type, ConfigError> {
    parse_type(key, &payload::<String>(key, value)?)
}

fn types(key: &str, list: Vec<String>) -> Result<Vec<Type>, ConfigError> {
    list.iter().map(|text| parse_type(key, text)).collect()
}

fn named(key: &str, text: &str) -> Result<NamedType, ConfigError> {
    match parse_type(key, text)? {
        Type::Named(named) => Ok(named),
        other => Err(ConfigError::NotNamed {
            key: key.to_string(),
            found: other.to_string(),
        }),
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct SignatureSpec {
    #[serde(default)]
    args: Vec<String>,
    #[serde(default)]
    returns: Vec<String>,
}

fn signature(key: &str, value: &Value) -> Result<(Vec<Type>, Vec<Type>), ConfigError> {
    let spec: SignatureSpec = payload(key, value)?;
    Ok((types(key, spec.args)?, types(key, spec.returns)?))
}

#[derive(Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct DeclarationSpec {
    import_path: String,
    name: String,
}

fn decode_declaration_of(value: &Value) -> Result<Box<dyn Point>, ConfigError> {
    let spec: DeclarationSpec = payload("declaration-of", value)?;
    Ok(Box::new(DeclarationOf::new(spec.import_path, spec.name)))
}

fn decode_function(value: &Value) -> Result<Box<dyn Point>, ConfigError> {
    let options = payload::<Vec<Value>>("function", value)?
        .iter()
        .map(decode_function_option)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Box::new(Function::new(options)))
}

#[derive(Deserialize)]
#[serde(untagged)]
enum FilterSpec {
    Pattern(String),
    #[serde(rename_all = "kebab-case")]
    Full {
        pattern: String,
        #[serde(default)]
        root: bool,
    },
}

fn decode_package_filter(value: &Value) -> Result<Box<dyn Point>, ConfigError> {
    let (pattern, root) = match payload::<FilterSpec>("package-filter", value)? {
        FilterSpec::Pattern(pattern) => (pattern, false),
        FilterSpec::Full { pattern, root } => (pattern, root),
    };
    let filter = PackageFilter::new(pattern.clone(), root)
        .map_err(|source| ConfigError::Glob { pattern, source })?;
    Ok(Box::new(filter))
}

#[derive(Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct StructLiteralSpec {
    #[serde(rename = "type")]
    ty: String,
    field: Option<String>,
    #[serde(rename = "match", default)]
    kind: StructLiteralMatch,
}

fn decode_struct_literal(value: &Value) -> Result<Box<dyn Point>, ConfigError> {
    let spec: StructLiteralSpec = payload("struct-literal", value)?;
    let ty = named("struct-literal", &spec.ty)?;
    let point = match spec.field {
        Some(field) => StructLiteral {
            field: Some(field),
            ..StructLiteral::new(ty, spec.kind)
        },
        None => StructLiteral::new(ty, spec.kind),
    };
    Ok(Box::new(point))
}
