//! Per-resource OpenAPI 3 document generator (§4.7). One query-parameter
//! entry per `<column>__<operator>` combination legal for that column's
//! semantic type; the profile's column order is the document's order.

use crate::domain::{Profile, ResourceId, SemanticType};
use crate::query::operators::{Suffix, ALL_SUFFIXES};
use serde_json::{json, Value as JsonValue};

/// JSON Schema `type` for a semantic type, used for the value schema of
/// suffixes that take a value.
fn json_schema_type(ty: SemanticType) -> &'static str {
    match ty {
        SemanticType::String => "string",
        SemanticType::Int => "integer",
        SemanticType::Float => "number",
        SemanticType::Bool => "boolean",
        SemanticType::Date => "string",
        SemanticType::Datetime => "string",
        SemanticType::Json => "object",
    }
}

fn parameter_schema(suffix: Suffix, ty: SemanticType) -> JsonValue {
    match suffix {
        Suffix::Sort => json!({ "type": "string", "enum": ["asc", "desc"] }),
        Suffix::Filter(crate::query::operators::FilterOp::In) => json!({
            "type": "string",
            "description": "comma-separated list of values",
        }),
        _ if suffix.takes_value() => {
            let mut schema = json!({ "type": json_schema_type(ty) });
            if ty == SemanticType::Date {
                schema["format"] = json!("date");
            } else if ty == SemanticType::Datetime {
                schema["format"] = json!("date-time");
            }
            schema
        }
        _ => json!({ "type": "boolean", "description": "presence of this key activates the clause" }),
    }
}

/// Build the OpenAPI 3 document for one resource's `/data/` query surface.
pub fn build_swagger_document(resource_id: ResourceId, profile: &Profile, base_url: &str) -> JsonValue {
    let mut parameters = Vec::new();

    for column in &profile.columns {
        for suffix in ALL_SUFFIXES {
            if !suffix.allowed_on(column.semantic_type) {
                continue;
            }
            let name = format!("{}__{}", column.name, suffix.token());
            parameters.push(json!({
                "name": name,
                "in": "query",
                "required": false,
                "schema": parameter_schema(*suffix, column.semantic_type),
            }));
        }
    }

    // Reserved, always-present query parameters.
    parameters.push(json!({
        "name": "page",
        "in": "query",
        "required": false,
        "schema": { "type": "integer", "minimum": 1 },
    }));
    parameters.push(json!({
        "name": "page_size",
        "in": "query",
        "required": false,
        "schema": { "type": "integer", "minimum": 1 },
    }));
    parameters.push(json!({
        "name": "columns",
        "in": "query",
        "required": false,
        "schema": { "type": "string", "description": "comma-separated list of column names" },
    }));

    let path = format!("/api/resources/{resource_id}/data/");

    json!({
        "openapi": "3.0.3",
        "info": {
            "title": format!("Resource {resource_id}"),
            "version": "1.0.0",
        },
        "servers": [{ "url": base_url }],
        "paths": {
            path: {
                "get": {
                    "summary": "Query this resource's data",
                    "parameters": parameters,
                    "responses": {
                        "200": { "description": "A page of matching rows" },
                        "400": { "description": "Invalid parameter or value" },
                        "403": { "description": "Aggregation not allowed on this resource" },
                    },
                },
            },
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ProfileColumn;
    use uuid::Uuid;

    fn sample_profile() -> Profile {
        Profile {
            columns: vec![
                ProfileColumn {
                    name: "score".to_string(),
                    semantic_type: SemanticType::Float,
                },
                ProfileColumn {
                    name: "name".to_string(),
                    semantic_type: SemanticType::String,
                },
            ],
            metadata: JsonValue::Null,
        }
    }

    #[test]
    fn contains_only_generated_for_string_columns() {
        let id = Uuid::new_v4();
        let doc = build_swagger_document(id, &sample_profile(), "https://api.example.org");
        let params = doc["paths"][format!("/api/resources/{id}/data/")]["get"]["parameters"]
            .as_array()
            .unwrap();
        let names: Vec<&str> = params.iter().map(|p| p["name"].as_str().unwrap()).collect();
        assert!(names.contains(&"name__contains"));
        assert!(!names.contains(&"score__contains"));
    }

    #[test]
    fn sum_only_generated_for_numeric_columns() {
        let id = Uuid::new_v4();
        let doc = build_swagger_document(id, &sample_profile(), "https://api.example.org");
        let params = doc["paths"][format!("/api/resources/{id}/data/")]["get"]["parameters"]
            .as_array()
            .unwrap();
        let names: Vec<&str> = params.iter().map(|p| p["name"].as_str().unwrap()).collect();
        assert!(names.contains(&"score__sum"));
        assert!(!names.contains(&"name__sum"));
    }

    #[test]
    fn reserved_parameters_always_present() {
        let id = Uuid::new_v4();
        let doc = build_swagger_document(id, &sample_profile(), "https://api.example.org");
        let params = doc["paths"][format!("/api/resources/{id}/data/")]["get"]["parameters"]
            .as_array()
            .unwrap();
        let names: Vec<&str> = params.iter().map(|p| p["name"].as_str().unwrap()).collect();
        assert!(names.contains(&"page"));
        assert!(names.contains(&"page_size"));
        assert!(names.contains(&"columns"));
    }
}
