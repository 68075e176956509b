//! Conversion of a result tree into JSON and into caller-defined types.

use crate::value::{ResultTree, Value};
use serde::de::DeserializeOwned;
use serde_json::{Map, Number, Value as Json};
use thiserror::Error;

/// The target type does not match the schema it was parsed with.
#[derive(Debug, Error)]
#[error("parsed values do not fit the target type: {0}")]
pub struct BindError(#[from] serde_json::Error);

/// Render a result tree as a JSON object.
pub fn reconstruct(tree: &ResultTree) -> Json {
    let map: Map<String, Json> = tree
        .iter()
        .map(|(name, value)| (name.to_string(), to_json(value)))
        .collect();
    Json::Object(map)
}

fn to_json(value: &Value) -> Json {
    match value {
        Value::Absent => Json::Null,
        Value::Bool(b) => Json::Bool(*b),
        Value::Int(n) => Json::from(*n),
        Value::UInt(n) => Json::from(*n),
        // Coercion only admits finite floats.
        Value::Float(x) => Number::from_f64(*x).map_or(Json::Null, Json::Number),
        Value::Str(s) | Value::Choice(s) => Json::String(s.clone()),
        Value::Path(p) => Json::String(p.to_string_lossy().into_owned()),
        Value::List(items) => Json::Array(items.iter().map(to_json).collect()),
        Value::Record(tree) => reconstruct(tree),
    }
}

/// Build a `T` from a result tree.
pub fn reconstruct_into<T: DeserializeOwned>(tree: &ResultTree) -> Result<T, BindError> {
    Ok(serde_json::from_value(reconstruct(tree))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;
    use std::path::PathBuf;

    #[derive(Debug, Deserialize, PartialEq)]
    #[serde(rename_all = "lowercase")]
    enum Mode {
        Fast,
        Slow,
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Server {
        host: String,
        port: u16,
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Args {
        server: Server,
        mode: Mode,
        name: Option<String>,
        files: Vec<PathBuf>,
        ratio: f64,
    }

    fn tree() -> ResultTree {
        let mut server = ResultTree::new();
        server.insert("host", Value::Str("example.com".to_string()));
        server.insert("port", Value::Int(8080));

        let mut tree = ResultTree::new();
        tree.insert("server", Value::Record(server));
        tree.insert("mode", Value::Choice("fast".to_string()));
        tree.insert("name", Value::Absent);
        tree.insert(
            "files",
            Value::List(vec![Value::Path(PathBuf::from("a.txt"))]),
        );
        tree.insert("ratio", Value::Float(0.5));
        tree
    }

    #[test]
    fn test_reconstruct_json() {
        assert_eq!(
            reconstruct(&tree()),
            json!({
                "server": {"host": "example.com", "port": 8080},
                "mode": "fast",
                "name": null,
                "files": ["a.txt"],
                "ratio": 0.5
            })
        );
    }

    #[test]
    fn test_reconstruct_into_struct() {
        let args: Args = reconstruct_into(&tree()).unwrap();
        assert_eq!(
            args,
            Args {
                server: Server {
                    host: "example.com".to_string(),
                    port: 8080,
                },
                mode: Mode::Fast,
                name: None,
                files: vec![PathBuf::from("a.txt")],
                ratio: 0.5,
            }
        );
    }

    #[test]
    fn test_bind_error_on_mismatched_type() {
        #[derive(Debug, Deserialize)]
        #[allow(dead_code)]
        struct Wrong {
            server: String,
        }
        assert!(reconstruct_into::<Wrong>(&tree()).is_err());
    }
}
