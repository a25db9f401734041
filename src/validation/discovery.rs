use chrono::Utc;
use serde_json::Value;
use tracing::debug;

use crate::http::{ApiRequest, RequestExecutor};
use crate::scim::{CORE_SCHEMA_PREFIXES, get_resources};

/// A custom / extension attribute discovered from the target's
/// `/Schemas` catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredSchemaAttribute {
    pub schema_urn: String,
    pub schema_name: String,
    pub attr_name: String,
    /// Lowercased SCIM attribute type: `boolean`, `string`, `integer`,
    /// `decimal`, `datetime`, `reference`, ...
    pub attr_type: String,
}

impl DiscoveredSchemaAttribute {
    /// Values to round-trip through a create. Booleans get both
    /// polarities; everything else gets one type-appropriate probe.
    #[must_use]
    pub fn probe_values(&self) -> Vec<Value> {
        if self.attr_type == "boolean" {
            return vec![Value::Bool(true), Value::Bool(false)];
        }
        vec![probe_value(&self.attr_type)]
    }
}

fn probe_value(attr_type: &str) -> Value {
    match attr_type {
        "integer" => serde_json::json!(42),
        "decimal" => serde_json::json!(3.14),
        "boolean" => Value::Bool(true),
        "datetime" => Value::String(Utc::now().to_rfc3339()),
        "reference" => Value::String("https://example.com/test".to_owned()),
        _ => Value::String("scimstress_probe_value".to_owned()),
    }
}

/// Fetches `/Schemas` and extracts extension-schema attributes,
/// skipping core schemas and complex, binary, or multi-valued
/// attributes. Best effort: any failure yields an empty list.
pub async fn discover_schema_attributes(
    executor: &dyn RequestExecutor,
) -> Vec<DiscoveredSchemaAttribute> {
    let response = match executor.execute(&ApiRequest::get("/Schemas")).await {
        Ok(response) if response.status == 200 => response,
        Ok(response) => {
            debug!(status = response.status, "schema discovery skipped");
            return Vec::new();
        }
        Err(err) => {
            debug!(error = %err, "schema discovery failed");
            return Vec::new();
        }
    };

    let Some(json) = response.json() else {
        return Vec::new();
    };

    // Schemas may arrive as a ListResponse or a bare array.
    let schemas: Vec<&Value> = if let Some(resources) = get_resources(&json) {
        resources
            .as_array()
            .map(|array| array.iter().collect())
            .unwrap_or_default()
    } else if let Some(array) = json.as_array() {
        array.iter().collect()
    } else {
        return Vec::new();
    };

    let mut attributes = Vec::new();
    for schema in schemas {
        let schema_id = schema.get("id").and_then(Value::as_str).unwrap_or("");
        if CORE_SCHEMA_PREFIXES
            .iter()
            .any(|prefix| schema_id.starts_with(prefix))
        {
            continue;
        }
        let schema_name = schema
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or("Extension");

        let Some(schema_attrs) = schema.get("attributes").and_then(Value::as_array) else {
            continue;
        };
        for attr in schema_attrs {
            let name = attr.get("name").and_then(Value::as_str).unwrap_or("");
            let attr_type = attr
                .get("type")
                .and_then(Value::as_str)
                .unwrap_or("string")
                .to_lowercase();
            let multi_valued = attr
                .get("multiValued")
                .and_then(Value::as_bool)
                .unwrap_or(false);

            if name.is_empty() || attr_type == "complex" || attr_type == "binary" || multi_valued {
                continue;
            }

            attributes.push(DiscoveredSchemaAttribute {
                schema_urn: schema_id.to_owned(),
                schema_name: schema_name.to_owned(),
                attr_name: name.to_owned(),
                attr_type,
            });
        }
    }

    attributes
}
