/*!
# Aspect files

Aspects are declared in YAML. A file holds one or more documents; each is
either a list of aspects or a mapping with an `aspects:` list.

```yaml
aspects:
  - id: trace-handlers
    join-point:
      function:
        - name: Handle
        - signature:
            args: ['net/http.ResponseWriter', '*net/http.Request']
    advice:
      - prepend-statements:
          imports:
            fmt: fmt
          template: fmt.Println("entered {{ .Function.Name }}")
```

Join points, function options and advice are written as single-key
mappings; the key selects the decoder from an immutable registry.
*/

mod advice;
mod join;

#[cfg(test)]
mod tests;

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_yaml::Value;
use tracing::debug;

use crate::aspect::advice::Advice;
use crate::aspect::Aspect;
use crate::typed::TypeParseError;

pub use advice::decode_advice;
pub use join::{decode_function_option, decode_join_point};

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path}: {source}")]
    InFile {
        path: PathBuf,
        #[source]
        source: Box<ConfigError>,
    },

    #[error("expected a list of aspects or a mapping with an `aspects` key, found {found}")]
    Document { found: &'static str },

    #[error("{context} must be a mapping with exactly one key, found {found}")]
    NotSingleton {
        context: &'static str,
        found: String,
    },

    #[error("unknown {context} {key:?}")]
    UnknownKey { context: &'static str, key: String },

    #[error("invalid {key}: {source}")]
    Payload {
        key: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid type in {key}: {source}")]
    Type {
        key: String,
        #[source]
        source: TypeParseError,
    },

    #[error("{key} requires a named type, got {found}")]
    NotNamed { key: String, found: String },

    #[error("{key}: expected `import/path.Name`, got {found:?}")]
    Symbol { key: String, found: String },

    #[error("invalid package pattern {pattern:?}: {source}")]
    Glob {
        pattern: String,
        #[source]
        source: globset::Error,
    },

    #[error("aspect {id:?}: {source}")]
    Aspect {
        id: String,
        #[source]
        source: Box<ConfigError>,
    },

    #[error("duplicate aspect id {0:?}")]
    DuplicateId(String),
}

/// Per-key decoder stored in the registries.
pub(crate) type Decoder<T> = fn(&Value) -> Result<T, ConfigError>;

fn describe(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a list",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}

/// Splits a single-key mapping into its key and value.
pub(crate) fn singleton<'v>(value: &'v Value, context: &'static str) -> Result<(&'v str, &'v Value), ConfigError> {
    let not_singleton = |found: String| ConfigError::NotSingleton { context, found };
    let Value::Mapping(map) = value else {
        return Err(not_singleton(describe(value).to_string()));
    };
    let mut entries = map.iter();
    match (entries.next(), entries.next()) {
        (Some((Value::String(key), value)), None) => Ok((key, value)),
        (Some((key, _)), None) => Err(not_singleton(format!("a {} key", describe(key)))),
        _ => Err(not_singleton(format!("{} keys", map.len()))),
    }
}

/// Deserializes the payload of `key`.
pub(crate) fn payload<T: DeserializeOwned>(key: &str, value: &Value) -> Result<T, ConfigError> {
    serde_yaml::from_value(value.clone()).map_err(|source| ConfigError::Payload {
        key: key.to_string(),
        source,
    })
}

/// Splits `import/path.Name` at the last dot after the last slash.
pub(crate) fn symbol(key: &str, value: &Value) -> Result<(String, String), ConfigError> {
    let text: String = payload(key, value)?;
    let split = text
        .rfind('.')
        .filter(|&dot| dot > text.rfind('/').map_or(0, |slash| slash + 1) && dot + 1 < text.len());
    match split {
        Some(dot) => Ok((text[..dot].to_string(), text[dot + 1..].to_string())),
        None => Err(ConfigError::Symbol {
            key: key.to_string(),
            found: text,
        }),
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    Many(Vec<Value>),
    One(Value),
}

#[derive(Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct AspectSpec {
    id: String,
    join_point: Value,
    advice: OneOrMany,
    #[serde(default)]
    tracer_internal: bool,
}

impl AspectSpec {
    fn decode(self) -> Result<Aspect, ConfigError> {
        let join_point = decode_join_point(&self.join_point)?;
        let advice = match self.advice {
            OneOrMany::Many(list) => list,
            OneOrMany::One(single) => vec![single],
        };
        let advice = advice
            .iter()
            .map(decode_advice)
            .collect::<Result<Vec<Box<dyn Advice>>, _>>()?;
        Ok(Aspect::new(self.id, join_point, advice).tracer_internal(self.tracer_internal))
    }
}

fn aspect_list(document: Value) -> Result<Vec<Value>, ConfigError> {
    match document {
        Value::Null => Ok(Vec::new()),
        Value::Sequence(list) => Ok(list),
        Value::Mapping(mut map) => match map.remove("aspects") {
            Some(Value::Sequence(list)) if map.is_empty() => Ok(list),
            Some(Value::Null) if map.is_empty() => Ok(Vec::new()),
            _ => Err(ConfigError::Document { found: "a mapping" }),
        },
        other => Err(ConfigError::Document {
            found: describe(&other),
        }),
    }
}

/// Loads every aspect declared in `yaml`, in declaration order.
pub fn load_aspects(yaml: &str) -> Result<Vec<Aspect>, ConfigError> {
    let mut aspects = Vec::new();
    let mut ids = HashSet::new();
    for document in serde_yaml::Deserializer::from_str(yaml) {
        let document = Value::deserialize(document)?;
        for entry in aspect_list(document)? {
            let id = entry
                .get("id")
                .and_then(Value::as_str)
                .unwrap_or("<unnamed>")
                .to_string();
            let aspect = payload::<AspectSpec>("aspect", &entry)
                .and_then(AspectSpec::decode)
                .map_err(|source| ConfigError::Aspect {
                    id: id.clone(),
                    source: Box::new(source),
                })?;
            if !ids.insert(aspect.id.clone()) {
                return Err(ConfigError::DuplicateId(aspect.id));
            }
            debug!(id = %aspect.id, advice = aspect.advice.len(), "loaded aspect");
            aspects.push(aspect);
        }
    }
    Ok(aspects)
}

/// Reads and loads an aspect file.
pub fn load_aspects_from_path(path: impl AsRef<Path>) -> Result<Vec<Aspect>, ConfigError> {
    let path = path.as_ref();
    let yaml = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    load_aspects(&yaml).map_err(|source| ConfigError::InFile {
        path: path.to_path_buf(),
        source: Box::new(source),
    })
}
