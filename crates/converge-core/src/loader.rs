//! Loading desired state from fragments
//!
//! Each fragment is parsed on its own, typed against the [`Schema`], and
//! merged left to right into one tree. A value written as a single-key
//! table `{ "@override" = <value> }` takes precedence over what earlier
//! fragments say for the same path:
//!
//! ```toml
//! user = { "@override" = "root" }
//! ```

use crate::{Error, Result};
use converge_fs::{ConfigStore, Format};
use converge_model::{
    ConfigTree, FieldKind, FieldSpec, MAX_DEPTH, Schema, SchemaError, TreePath, Value, merge,
};
use serde_json::Value as Json;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// Key of the single-entry table that marks an override.
pub const OVERRIDE_KEY: &str = "@override";

/// One source text contributing to the desired tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    /// Where the text came from, for diagnostics
    pub origin: String,
    pub format: Format,
    pub text: String,
}

impl Fragment {
    pub fn new(origin: impl Into<String>, format: Format, text: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            format,
            text: text.into(),
        }
    }

    pub fn toml(origin: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(origin, Format::Toml, text)
    }

    /// Read a fragment from disk, detecting the format from its extension.
    pub fn from_file(path: &Path) -> Result<Self> {
        let format = Format::from_path(path)?;
        let text = converge_fs::io::read_text(path)?;
        Ok(Self::new(path.display().to_string(), format, text))
    }
}

/// Load a schema declaration from a TOML, JSON or YAML file.
pub fn load_schema(path: &Path) -> Result<Schema> {
    let schema = ConfigStore::new().load(path)?;
    tracing::debug!(path = %path.display(), "schema loaded");
    Ok(schema)
}

/// Parses fragments and merges them into a desired tree.
#[derive(Debug, Clone, Default)]
pub struct Loader {
    schema: Schema,
}

impl Loader {
    pub fn new(schema: Schema) -> Self {
        Self { schema }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Parse and merge `fragments` in order. Override markers are resolved
    /// in the result.
    pub fn load(&self, fragments: &[Fragment]) -> Result<ConfigTree> {
        let mut merged = ConfigTree::new();
        for fragment in fragments {
            let tree = self.parse(fragment)?;
            merged = merge(&merged, &tree, &self.schema).map_err(|source| Error::Conflict {
                origin: fragment.origin.clone(),
                source,
            })?;
            tracing::debug!(origin = %fragment.origin, keys = tree.len(), "fragment merged");
        }
        Ok(merged.resolved())
    }

    /// Read and load fragment files in order.
    pub fn load_files<P: AsRef<Path>>(&self, paths: &[P]) -> Result<ConfigTree> {
        let fragments = paths
            .iter()
            .map(|p| Fragment::from_file(p.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        self.load(&fragments)
    }

    /// Parse one fragment into a typed tree. Override markers are kept.
    pub fn parse(&self, fragment: &Fragment) -> Result<ConfigTree> {
        let document = parse_document(fragment)?;
        to_tree(document, &self.schema).map_err(|source| Error::Schema {
            origin: fragment.origin.clone(),
            source,
        })
    }
}

fn parse_document(fragment: &Fragment) -> Result<Json> {
    let parse_error = |line, column, message: String| Error::Parse {
        origin: fragment.origin.clone(),
        format: fragment.format,
        line,
        column,
        message,
    };

    match fragment.format {
        Format::Toml => {
            let table = toml::from_str::<toml::Table>(&fragment.text).map_err(|e| {
                let (line, column) = e
                    .span()
                    .map_or((1, 1), |span| line_col(&fragment.text, span.start));
                parse_error(line, column, e.message().to_string())
            })?;
            Ok(toml_to_json(toml::Value::Table(table)))
        }
        Format::Json => serde_json::from_str(&fragment.text)
            .map_err(|e| parse_error(e.line(), e.column(), e.to_string())),
        Format::Yaml => serde_yaml::from_str(&fragment.text).map_err(|e| {
            let (line, column) = e.location().map_or((1, 1), |l| (l.line(), l.column()));
            parse_error(line, column, e.to_string())
        }),
    }
}

/// 1-based line and column of a byte offset.
fn line_col(text: &str, offset: usize) -> (usize, usize) {
    let before = text.get(..offset).unwrap_or(text);
    let line = before.matches('\n').count() + 1;
    let column = before.rsplit('\n').next().map_or(0, |l| l.chars().count()) + 1;
    (line, column)
}

fn toml_to_json(value: toml::Value) -> Json {
    match value {
        toml::Value::String(s) => Json::String(s),
        toml::Value::Integer(i) => Json::from(i),
        // Non-finite floats have no JSON form and are rejected like null.
        toml::Value::Float(f) => serde_json::Number::from_f64(f).map_or(Json::Null, Json::Number),
        toml::Value::Boolean(b) => Json::Bool(b),
        toml::Value::Datetime(d) => Json::String(d.to_string()),
        toml::Value::Array(items) => Json::Array(items.into_iter().map(toml_to_json).collect()),
        toml::Value::Table(table) => {
            Json::Object(table.into_iter().map(|(k, v)| (k, toml_to_json(v))).collect())
        }
    }
}

fn to_tree(document: Json, schema: &Schema) -> std::result::Result<ConfigTree, SchemaError> {
    let object = match document {
        Json::Object(object) => object,
        // An empty YAML document
        Json::Null => return Ok(ConfigTree::new()),
        other => {
            return Err(SchemaError::new(
                TreePath::root(),
                format!("a fragment must be a mapping, found {}", json_kind(&other)),
            ));
        }
    };

    let mut root = BTreeMap::new();
    let mut path = TreePath::root();
    for (key, raw) in object {
        path.push(key.clone());
        let spec = schema
            .get(&key)
            .ok_or_else(|| SchemaError::unknown_key(path.clone()))?;
        root.insert(key, to_value(raw, Some(spec), &mut path)?);
        path.pop();
    }
    Ok(ConfigTree::from_map(root))
}

fn to_value(raw: Json, spec: Option<&FieldSpec>, path: &mut TreePath) -> std::result::Result<Value, SchemaError> {
    if path.len() > MAX_DEPTH {
        return Err(SchemaError::too_deep(path.clone()));
    }
    let raw = match raw {
        Json::Object(mut object) if object.len() == 1 && object.contains_key(OVERRIDE_KEY) => {
            let inner = object.remove(OVERRIDE_KEY).unwrap_or(Json::Null);
            return to_value(inner, spec, path).map(Value::forced);
        }
        other => other,
    };

    let kind = spec.map_or(FieldKind::Any, FieldSpec::effective_kind);
    match (kind, raw) {
        (_, Json::Null) => Err(SchemaError::new(
            path.clone(),
            "null and non-finite values are not supported",
        )),
        (FieldKind::Scalar | FieldKind::Any, Json::Bool(b)) => Ok(Value::bool(b)),
        (FieldKind::Scalar | FieldKind::Any, Json::String(s)) => Ok(Value::str(s)),
        // Integers beyond i64 are rejected rather than widened to a float.
        (FieldKind::Scalar | FieldKind::Any, Json::Number(n)) => match n.as_i64() {
            Some(i) => Ok(Value::int(i)),
            None => match n.as_f64() {
                Some(f) if n.is_f64() && f.is_finite() => Ok(Value::float(f)),
                _ => Err(SchemaError::new(path.clone(), format!("number {n} is out of range"))),
            },
        },
        (FieldKind::Set, Json::Array(items)) => elements(items, path)
            .map(|items| Value::Set(items.into_iter().collect::<BTreeSet<_>>())),
        (FieldKind::List | FieldKind::Any, Json::Array(items)) => elements(items, path).map(Value::List),
        (FieldKind::Map | FieldKind::Any, Json::Object(object)) => {
            let mut map = BTreeMap::new();
            for (key, raw) in object {
                path.push(key.clone());
                let child = spec.and_then(|s| s.child(&key));
                if child.is_none() && spec.is_some_and(|s| !s.is_open()) {
                    return Err(SchemaError::unknown_key(path.clone()));
                }
                map.insert(key, to_value(raw, child, path)?);
                path.pop();
            }
            Ok(Value::Map(map))
        }
        (kind, raw) => Err(SchemaError::new(
            path.clone(),
            format!("expected {}, found {}", kind_label(kind), json_kind(&raw)),
        )),
    }
}

/// Array elements are untyped by the schema; their paths carry the index
/// for diagnostics only.
fn elements(items: Vec<Json>, path: &mut TreePath) -> std::result::Result<Vec<Value>, SchemaError> {
    items
        .into_iter()
        .enumerate()
        .map(|(i, item)| {
            path.push(format!("[{i}]"));
            let value = to_value(item, None, path);
            path.pop();
            value
        })
        .collect()
}

fn kind_label(kind: FieldKind) -> &'static str {
    match kind {
        FieldKind::Scalar => "a scalar",
        FieldKind::List => "a list",
        FieldKind::Set => "a set",
        FieldKind::Map => "a map",
        FieldKind::Any => "a value",
    }
}

fn json_kind(value: &Json) -> &'static str {
    match value {
        Json::Null => "null",
        Json::Bool(_) => "a boolean",
        Json::Number(_) => "a number",
        Json::String(_) => "a string",
        Json::Array(_) => "an array",
        Json::Object(_) => "a table",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_col_counts_from_one() {
        let text = "a = 1\nb = ?\n";
        assert_eq!(line_col(text, 0), (1, 1));
        assert_eq!(line_col(text, 10), (2, 5));
    }

    #[test]
    fn toml_datetimes_become_strings() {
        let table: toml::Table = toml::from_str("at = 1979-05-27T07:32:00Z").unwrap();
        assert_eq!(
            toml_to_json(toml::Value::Table(table)),
            serde_json::json!({ "at": "1979-05-27T07:32:00Z" })
        );
    }

    #[test]
    fn nested_override_marker_is_recognized() {
        let schema = Schema::new().field("boot", FieldSpec::map());
        let tree = to_tree(
            serde_json::json!({ "boot": { "timeout": { "@override": 3 } } }),
            &schema,
        )
        .unwrap();

        assert_eq!(
            tree.get(&"boot.timeout".parse().unwrap()),
            Some(&Value::forced(Value::int(3)))
        );
    }
}
