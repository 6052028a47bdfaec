//! Schema phase: validate the parsed model against the API schema of the
//! detected version.
//!
//! The bundled OpenAPI component schemas use `$ref` and `allOf` composition.
//! Off-the-shelf validators do not merge `additionalProperties: false`
//! across composed schemas, so resolution and merging are done manually
//! here. Payloads are canonicalized first, which strips null fields exactly
//! the way the server sees them.

use crate::diff::normalize;
use crate::error::{ValidationError, ValidationPhase};
use crate::model::Configuration;
use crate::version::Version;
use serde_json::{Map, Value};
use std::sync::OnceLock;

const SCHEMA_V3_0: &str = include_str!("../../resources/schemas/dataplane-v3.0.json");
const SCHEMA_V3_2: &str = include_str!("../../resources/schemas/dataplane-v3.2.json");

/// Bundled schema document for a server version
///
/// 3.1 is payload-compatible with 3.0 for every validated section and
/// resolves to the 3.0 document; an unknown version gets the oldest one.
fn document_for(version: Option<&Version>) -> &'static Value {
    static V3_0: OnceLock<Value> = OnceLock::new();
    static V3_2: OnceLock<Value> = OnceLock::new();
    if version.is_some_and(|v| v.at_least(3, 2)) {
        V3_2.get_or_init(|| {
            serde_json::from_str(SCHEMA_V3_2).expect("bundled 3.2 schema is valid JSON")
        })
    } else {
        V3_0.get_or_init(|| {
            serde_json::from_str(SCHEMA_V3_0).expect("bundled 3.0 schema is valid JSON")
        })
    }
}

fn schema_error(path: &str, constraint: &str, value: Option<&Value>) -> ValidationError {
    let mut message = format!("Error at \"{path}\": {constraint}");
    if let Some(value) = value {
        let rendered = match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        message.push_str(&format!("\nValue: \"{rendered}\""));
    }
    ValidationError::new(ValidationPhase::Schema, message)
}

/// Look up a named component schema
fn component<'a>(doc: &'a Value, name: &str) -> Result<&'a Value, ValidationError> {
    doc.pointer(&format!("/components/schemas/{name}"))
        .ok_or_else(|| {
            ValidationError::new(
                ValidationPhase::Schema,
                format!("schema document has no component '{name}'"),
            )
        })
}

/// Resolve `$ref` and flatten `allOf` composition into one effective schema
///
/// Merging unions `properties` and `required` and keeps
/// `additionalProperties: false` if any composed schema sets it.
fn effective_schema(doc: &Value, schema: &Value) -> Result<Value, ValidationError> {
    if let Some(reference) = schema.get("$ref").and_then(Value::as_str) {
        let name = reference
            .strip_prefix("#/components/schemas/")
            .ok_or_else(|| {
                ValidationError::new(
                    ValidationPhase::Schema,
                    format!("unsupported schema reference '{reference}'"),
                )
            })?;
        return effective_schema(doc, component(doc, name)?);
    }

    let Some(parts) = schema.get("allOf").and_then(Value::as_array) else {
        return Ok(schema.clone());
    };

    let mut merged = Map::new();
    let mut properties = Map::new();
    let mut required: Vec<Value> = Vec::new();
    let mut closed = false;
    for part in parts {
        let resolved = effective_schema(doc, part)?;
        let Some(object) = resolved.as_object() else {
            continue;
        };
        for (key, entry) in object {
            match key.as_str() {
                "properties" => {
                    if let Some(props) = entry.as_object() {
                        for (prop, prop_schema) in props {
                            properties.insert(prop.clone(), prop_schema.clone());
                        }
                    }
                }
                "required" => {
                    if let Some(names) = entry.as_array() {
                        for name in names {
                            if !required.contains(name) {
                                required.push(name.clone());
                            }
                        }
                    }
                }
                "additionalProperties" => {
                    if entry == &Value::Bool(false) {
                        closed = true;
                    }
                }
                _ => {
                    merged.entry(key.clone()).or_insert_with(|| entry.clone());
                }
            }
        }
    }
    if !properties.is_empty() {
        merged.insert("properties".to_string(), Value::Object(properties));
    }
    if !required.is_empty() {
        merged.insert("required".to_string(), Value::Array(required));
    }
    if closed {
        merged.insert("additionalProperties".to_string(), Value::Bool(false));
    }
    Ok(Value::Object(merged))
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn check_type(expected: &str, value: &Value, path: &str) -> Result<(), ValidationError> {
    let actual = type_name(value);
    let matches = match expected {
        "number" => actual == "number" || actual == "integer",
        other => actual == other,
    };
    if matches {
        Ok(())
    } else {
        Err(schema_error(
            path,
            &format!("must be of type {expected}"),
            Some(value),
        ))
    }
}

/// Validate one canonical payload against a resolved schema
fn validate_value(
    doc: &Value,
    schema: &Value,
    value: &Value,
    path: &str,
) -> Result<(), ValidationError> {
    let schema = effective_schema(doc, schema)?;

    if let Some(expected) = schema.get("type").and_then(Value::as_str) {
        check_type(expected, value, path)?;
    }

    if let Some(allowed) = schema.get("enum").and_then(Value::as_array) {
        if !allowed.contains(value) {
            let names: Vec<String> = allowed
                .iter()
                .map(|v| v.as_str().map_or_else(|| v.to_string(), str::to_string))
                .collect();
            return Err(schema_error(
                path,
                &format!("must be one of {}", names.join(", ")),
                Some(value),
            ));
        }
    }

    if let Some(minimum) = schema.get("minimum").and_then(Value::as_i64) {
        if let Some(actual) = value.as_i64() {
            if actual < minimum {
                return Err(schema_error(
                    path,
                    &format!("must be at least {minimum}"),
                    Some(value),
                ));
            }
        }
    }
    if let Some(maximum) = schema.get("maximum").and_then(Value::as_i64) {
        if let Some(actual) = value.as_i64() {
            if actual > maximum {
                return Err(schema_error(
                    path,
                    &format!("must be at most {maximum}"),
                    Some(value),
                ));
            }
        }
    }

    if let Some(pattern) = schema.get("pattern").and_then(Value::as_str) {
        if let Some(text) = value.as_str() {
            let re = regex::Regex::new(pattern).map_err(|cause| {
                ValidationError::new(
                    ValidationPhase::Schema,
                    format!("schema pattern '{pattern}' is invalid"),
                )
                .with_cause(cause)
            })?;
            if !re.is_match(text) {
                return Err(schema_error(
                    path,
                    &format!("must match pattern {pattern}"),
                    Some(value),
                ));
            }
        }
    }

    if let Some(object) = value.as_object() {
        if let Some(required) = schema.get("required").and_then(Value::as_array) {
            for name in required.iter().filter_map(Value::as_str) {
                if !object.contains_key(name) {
                    return Err(schema_error(
                        &format!("{path}/{name}"),
                        "is required",
                        None,
                    ));
                }
            }
        }
        let properties = schema.get("properties").and_then(Value::as_object);
        let closed = schema.get("additionalProperties") == Some(&Value::Bool(false));
        for (key, entry) in object {
            match properties.and_then(|props| props.get(key)) {
                Some(prop_schema) => {
                    validate_value(doc, prop_schema, entry, &format!("{path}/{key}"))?;
                }
                None if closed => {
                    return Err(schema_error(
                        &format!("{path}/{key}"),
                        "is not an allowed property",
                        Some(entry),
                    ));
                }
                None => {}
            }
        }
    }

    if let Some(items) = value.as_array() {
        if let Some(item_schema) = schema.get("items") {
            for (index, item) in items.iter().enumerate() {
                validate_value(doc, item_schema, item, &format!("{path}/{index}"))?;
            }
        }
    }

    Ok(())
}

fn validate_named<T: serde::Serialize>(
    doc: &Value,
    component_name: &str,
    value: &T,
    path: &str,
) -> Result<(), ValidationError> {
    let payload = normalize::canonical(value).map_err(|cause| {
        ValidationError::new(
            ValidationPhase::Schema,
            format!("could not canonicalize payload at {path}"),
        )
        .with_cause(cause)
    })?;
    let schema = component(doc, component_name)?;
    validate_value(doc, schema, &payload, path)
}

/// Validate every section of a parsed configuration
///
/// # Errors
/// The first schema violation found, with its JSON-pointer-style path.
pub fn validate_model(
    config: &Configuration,
    version: Option<&Version>,
) -> Result<(), ValidationError> {
    let doc = document_for(version);

    if let Some(global) = &config.global {
        validate_named(doc, "global", global, "/global")?;
    }
    if let Some(defaults) = &config.defaults {
        validate_named(doc, "defaults", defaults, "/defaults")?;
    }
    for (name, frontend) in &config.frontends {
        validate_named(doc, "frontend", frontend, &format!("/frontend/{name}"))?;
        for (bind_name, bind) in &frontend.binds {
            validate_named(
                doc,
                "bind",
                bind,
                &format!("/frontend/{name}/bind/{bind_name}"),
            )?;
        }
        for (index, acl) in frontend.acls.iter().enumerate() {
            validate_named(doc, "acl", acl, &format!("/frontend/{name}/acl/{index}"))?;
        }
        for (index, rule) in frontend.http_request_rules.iter().enumerate() {
            validate_named(
                doc,
                "http_request_rule",
                rule,
                &format!("/frontend/{name}/http_request_rule/{index}"),
            )?;
        }
        for (index, rule) in frontend.backend_switching_rules.iter().enumerate() {
            validate_named(
                doc,
                "backend_switching_rule",
                rule,
                &format!("/frontend/{name}/backend_switching_rule/{index}"),
            )?;
        }
    }
    for (name, backend) in &config.backends {
        validate_named(doc, "backend", backend, &format!("/backend/{name}"))?;
        for (server_name, server) in &backend.servers {
            validate_named(
                doc,
                "server",
                server,
                &format!("/backend/{name}/server/{server_name}"),
            )?;
        }
        for (index, acl) in backend.acls.iter().enumerate() {
            validate_named(doc, "acl", acl, &format!("/backend/{name}/acl/{index}"))?;
        }
        for (index, rule) in backend.http_request_rules.iter().enumerate() {
            validate_named(
                doc,
                "http_request_rule",
                rule,
                &format!("/backend/{name}/http_request_rule/{index}"),
            )?;
        }
    }
    Ok(())
}
