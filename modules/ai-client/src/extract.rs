use anyhow::{anyhow, Result};
use regex::Regex;
use schemars::{schema_for, JsonSchema};
use serde::de::DeserializeOwned;
use std::sync::OnceLock;

use crate::util::strip_code_blocks;

/// Types that can be extracted as forced tool-call output.
///
/// Automatically implemented for anything that is `JsonSchema +
/// DeserializeOwned`. The schema is inlined and stripped of the metadata
/// keys the messages API rejects.
pub trait StructuredOutput: DeserializeOwned {
    fn output_schema() -> serde_json::Value;
}

impl<T: JsonSchema + DeserializeOwned> StructuredOutput for T {
    fn output_schema() -> serde_json::Value {
        let schema = schema_for!(T);
        let mut value = serde_json::to_value(schema).unwrap_or_default();
        inline_refs(&mut value);
        if let serde_json::Value::Object(map) = &mut value {
            map.remove("definitions");
            map.remove("$schema");
            map.remove("title");
        }
        value
    }
}

/// Best-effort JSON recovery from free text: strip markdown fences, try the
/// whole string, then the outermost `{...}` span.
pub fn recover_json<T: DeserializeOwned>(text: &str) -> Result<T> {
    let stripped = strip_code_blocks(text);
    if let Ok(value) = serde_json::from_str(stripped) {
        return Ok(value);
    }

    static JSON_BLOCK: OnceLock<Regex> = OnceLock::new();
    let re = JSON_BLOCK.get_or_init(|| Regex::new(r"\{[\s\S]*\}").expect("valid regex"));

    if let Some(m) = re.find(stripped) {
        return serde_json::from_str(m.as_str())
            .map_err(|e| anyhow!("recovered JSON block did not parse: {e}"));
    }

    Err(anyhow!("no JSON object found in response text"))
}

fn inline_refs(value: &mut serde_json::Value) {
    let definitions = match value {
        serde_json::Value::Object(map) => map.get("definitions").cloned(),
        _ => None,
    };
    if let Some(defs) = definitions {
        inline_refs_recursive(value, &defs);
    }
}

fn inline_refs_recursive(value: &mut serde_json::Value, definitions: &serde_json::Value) {
    match value {
        serde_json::Value::Object(map) => {
            if let Some(serde_json::Value::String(ref_path)) = map.get("$ref").cloned() {
                if let Some(name) = ref_path.strip_prefix("#/definitions/") {
                    if let Some(definition) = definitions.get(name) {
                        *value = definition.clone();
                        inline_refs_recursive(value, definitions);
                        return;
                    }
                }
            }
            for (_, v) in map.iter_mut() {
                inline_refs_recursive(v, definitions);
            }
        }
        serde_json::Value::Array(items) => {
            for item in items.iter_mut() {
                inline_refs_recursive(item, definitions);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, JsonSchema)]
    struct Sample {
        name: String,
        #[serde(default)]
        count: u32,
    }

    #[derive(Debug, Deserialize, JsonSchema)]
    struct Nested {
        inner: Sample,
    }

    #[test]
    fn schema_has_no_meta_keys() {
        let schema = Sample::output_schema();
        assert!(schema.get("$schema").is_none());
        assert!(schema.get("definitions").is_none());
        assert_eq!(schema["type"], "object");
        assert!(schema["properties"].get("name").is_some());
    }

    #[test]
    fn nested_schema_is_inlined() {
        let schema = Nested::output_schema();
        let inner = &schema["properties"]["inner"];
        assert!(inner.get("$ref").is_none(), "refs must be inlined: {inner}");
        assert!(inner["properties"].get("name").is_some());
    }

    #[test]
    fn recover_plain_json() {
        let sample: Sample = recover_json(r#"{"name": "a", "count": 2}"#).unwrap();
        assert_eq!(sample.name, "a");
        assert_eq!(sample.count, 2);
    }

    #[test]
    fn recover_fenced_json() {
        let sample: Sample = recover_json("```json\n{\"name\": \"b\"}\n```").unwrap();
        assert_eq!(sample.name, "b");
        assert_eq!(sample.count, 0);
    }

    #[test]
    fn recover_json_embedded_in_prose() {
        let text = "Here is the result you asked for:\n{\"name\": \"c\", \"count\": 7}\nLet me know if you need more.";
        let sample: Sample = recover_json(text).unwrap();
        assert_eq!(sample.name, "c");
        assert_eq!(sample.count, 7);
    }

    #[test]
    fn recover_rejects_plain_prose() {
        let result: Result<Sample> = recover_json("I could not find anything.");
        assert!(result.is_err());
    }
}
