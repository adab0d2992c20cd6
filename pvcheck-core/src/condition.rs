//! Condition extraction from loosely-typed status documents.
//!
//! Status documents come from `oc get ... -o json` and follow the usual
//! Kubernetes list shape:
//!
//! ```json
//! {"items": [{"metadata": {"name": "..."},
//!             "status": {"conditions": [{"type": "Ready", "status": "True"}],
//!                        "ready": true,
//!                        "addresses": [{"type": "InternalIP", "address": "10.0.0.1"}]}}]}
//! ```
//!
//! Extraction never fails outright. Each malformed field is recorded in a
//! [`FaultSet`] and replaced by a zero value so the remaining fields can still
//! be read. The caller decides what a non-empty fault set means for the pass.

use serde_json::Value;

use crate::error::ExtractError;
use crate::faults::FaultSet;

/// A single readiness indicator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    /// Condition type tag, or the item name for per-item readiness.
    pub kind: String,
    pub status: bool,
    pub name: Option<String>,
    pub address: Option<String>,
    pub message: Option<String>,
}

impl Condition {
    pub fn new(kind: impl Into<String>, status: bool) -> Self {
        Self {
            kind: kind.into(),
            status,
            name: None,
            address: None,
            message: None,
        }
    }
}

/// Result of one extraction pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extraction {
    pub conditions: Vec<Condition>,
    /// Explicit `status.ready` flag, if any item carried one.
    pub ready: Option<bool>,
    pub faults: FaultSet,
}

/// Raw operator condition strings (`"True"`, `"False"`, empty, or anything else).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OperatorConditions {
    pub available: String,
    pub degraded: String,
    pub progressing: String,
    pub upgradeable: String,
}

impl OperatorConditions {
    pub fn is_available(&self) -> bool {
        self.available == "True"
    }
}

/// Decode a boolean-like status value.
///
/// Native booleans pass through; the text tokens `"True"` and `"False"` are
/// accepted case-sensitively. Anything else is a fault.
pub fn decode_bool(field: &str, value: &Value) -> Result<bool, ExtractError> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::String(s) if s == "True" => Ok(true),
        Value::String(s) if s == "False" => Ok(false),
        other => Err(ExtractError::NotBoolean {
            field: field.to_string(),
            value: render(other),
        }),
    }
}

/// Condition extractor.
///
/// In strict mode a missing `conditions` array is a fault; in lenient mode it
/// decodes to an empty list.
#[derive(Debug, Clone, Copy)]
pub struct Extractor {
    conditions_required: bool,
}

impl Default for Extractor {
    fn default() -> Self {
        Self::strict()
    }
}

impl Extractor {
    pub fn strict() -> Self {
        Self {
            conditions_required: true,
        }
    }

    pub fn lenient() -> Self {
        Self {
            conditions_required: false,
        }
    }

    /// Extract every condition of every item, plus the combined ready flag.
    pub fn extract(&self, document: &Value) -> Extraction {
        let mut faults = FaultSet::new();
        let mut conditions = Vec::new();
        let mut ready: Option<bool> = None;

        for item in items(document, &mut faults) {
            let Some(status) = object_field(item, "status", &mut faults) else {
                continue;
            };
            self.read_conditions(status, &mut conditions, &mut faults);

            if let Some(flag) = status.get("ready") {
                let value = decode_bool("status.ready", flag).unwrap_or_else(|e| {
                    faults.push(e);
                    false
                });
                ready = Some(ready.unwrap_or(true) && value);
            }
        }

        Extraction {
            conditions,
            ready,
            faults,
        }
    }

    /// Like [`Extractor::extract`], but requires exactly `count` items.
    pub fn extract_exact(&self, document: &Value, count: usize) -> Extraction {
        let found = items(document, &mut FaultSet::new()).len();
        let mut extraction = self.extract(document);
        if found != count {
            extraction.faults.push(ExtractError::ItemCount {
                expected: count,
                found,
            });
        }
        extraction
    }

    fn read_conditions(&self, status: &Value, out: &mut Vec<Condition>, faults: &mut FaultSet) {
        let list = match status.get("conditions") {
            None => {
                if self.conditions_required {
                    faults.push(ExtractError::Missing("status.conditions".to_string()));
                }
                return;
            }
            Some(Value::Array(list)) => list,
            Some(other) => {
                faults.push(wrong_shape("status.conditions", "array", other));
                return;
            }
        };

        for entry in list {
            if !entry.is_object() {
                faults.push(wrong_shape("status.conditions[]", "object", entry));
                continue;
            }
            let Some(kind) = string_field(entry, "type", faults) else {
                continue;
            };
            let status = match entry.get("status") {
                Some(v) => decode_bool("status", v).unwrap_or_else(|e| {
                    faults.push(e);
                    false
                }),
                None => {
                    faults.push(ExtractError::Missing(format!("{}.status", kind)));
                    false
                }
            };
            let mut condition = Condition::new(kind, status);
            condition.message = entry
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string);
            out.push(condition);
        }
    }
}

/// Strict extraction of every condition in the document.
pub fn extract(document: &Value) -> Extraction {
    Extractor::strict().extract(document)
}

/// One condition per item: the item's name, its `status.ready` flag and its
/// preferred address.
///
/// A missing `ready` flag reads as not ready without a fault.
pub fn extract_machines(document: &Value) -> Extraction {
    let mut faults = FaultSet::new();
    let mut conditions = Vec::new();

    for item in items(document, &mut faults) {
        let name = item
            .get("metadata")
            .and_then(|m| string_field(m, "name", &mut faults))
            .unwrap_or_else(|| {
                if item.get("metadata").is_none() {
                    faults.push(ExtractError::Missing("metadata".to_string()));
                }
                String::new()
            });

        let status = item.get("status");
        let ready = match status.and_then(|s| s.get("ready")) {
            Some(v) => decode_bool("status.ready", v).unwrap_or_else(|e| {
                faults.push(e);
                false
            }),
            None => false,
        };
        let address = status
            .and_then(|s| s.get("addresses"))
            .and_then(|a| preferred_address(a, &mut faults));

        let mut condition = Condition::new("Ready", ready);
        condition.name = Some(name);
        condition.address = address;
        conditions.push(condition);
    }

    Extraction {
        conditions,
        ready: None,
        faults,
    }
}

/// Find the item named `name` and collect its operator-style conditions.
pub fn extract_operator(document: &Value, name: &str) -> (OperatorConditions, FaultSet) {
    let mut faults = FaultSet::new();
    let mut found = None;

    for item in items(document, &mut faults) {
        let item_name = item
            .get("metadata")
            .and_then(|m| m.get("name"))
            .and_then(Value::as_str);
        if item_name == Some(name) {
            found = Some(item);
            break;
        }
    }

    let Some(item) = found else {
        faults.push(ExtractError::NoSuchItem(name.to_string()));
        return (OperatorConditions::default(), faults);
    };

    (operator_conditions(item, &mut faults), faults)
}

/// Operator-style conditions of a single object document (e.g. a deployment).
pub fn extract_deployment(document: &Value) -> (OperatorConditions, FaultSet) {
    let mut faults = FaultSet::new();
    let conditions = operator_conditions(document, &mut faults);
    (conditions, faults)
}

fn operator_conditions(item: &Value, faults: &mut FaultSet) -> OperatorConditions {
    let mut out = OperatorConditions::default();
    let Some(status) = object_field(item, "status", faults) else {
        return out;
    };
    let list = match status.get("conditions") {
        Some(Value::Array(list)) => list,
        Some(other) => {
            faults.push(wrong_shape("status.conditions", "array", other));
            return out;
        }
        None => {
            faults.push(ExtractError::Missing("status.conditions".to_string()));
            return out;
        }
    };

    for entry in list {
        let Some(kind) = string_field(entry, "type", faults) else {
            continue;
        };
        let status = match entry.get("status") {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Bool(true)) => "True".to_string(),
            Some(Value::Bool(false)) => "False".to_string(),
            Some(other) => {
                faults.push(wrong_shape("status", "string", other));
                continue;
            }
            None => {
                faults.push(ExtractError::Missing(format!("{}.status", kind)));
                continue;
            }
        };
        match kind.as_str() {
            "Available" => out.available = status,
            "Degraded" => out.degraded = status,
            "Progressing" => out.progressing = status,
            "Upgradeable" => out.upgradeable = status,
            _ => {}
        }
    }
    out
}

/// The items of a list document.
///
/// `items` may be an array or a single object. A document with no `items`
/// key but its own `status` is treated as a single item.
fn items<'a>(document: &'a Value, faults: &mut FaultSet) -> Vec<&'a Value> {
    match document.get("items") {
        Some(Value::Array(list)) => list
            .iter()
            .filter(|item| {
                if item.is_object() {
                    true
                } else {
                    faults.push(wrong_shape("items[]", "object", item));
                    false
                }
            })
            .collect(),
        Some(item @ Value::Object(_)) => vec![item],
        Some(other) => {
            faults.push(wrong_shape("items", "array", other));
            Vec::new()
        }
        None if document.get("status").is_some() => vec![document],
        None => {
            faults.push(ExtractError::Missing("items".to_string()));
            Vec::new()
        }
    }
}

fn preferred_address(addresses: &Value, faults: &mut FaultSet) -> Option<String> {
    let Value::Array(list) = addresses else {
        faults.push(wrong_shape("status.addresses", "array", addresses));
        return None;
    };
    let address_of = |entry: &Value| {
        entry
            .get("address")
            .and_then(Value::as_str)
            .filter(|a| !a.is_empty())
            .map(str::to_string)
    };
    list.iter()
        .find(|entry| entry.get("type").and_then(Value::as_str) == Some("InternalIP"))
        .and_then(address_of)
        .or_else(|| list.iter().find_map(address_of))
}

fn object_field<'a>(value: &'a Value, key: &str, faults: &mut FaultSet) -> Option<&'a Value> {
    match value.get(key) {
        Some(v @ Value::Object(_)) => Some(v),
        Some(other) => {
            faults.push(wrong_shape(key, "object", other));
            None
        }
        None => {
            faults.push(ExtractError::Missing(key.to_string()));
            None
        }
    }
}

fn string_field(value: &Value, key: &str, faults: &mut FaultSet) -> Option<String> {
    match value.get(key) {
        Some(Value::String(s)) => Some(s.clone()),
        Some(other) => {
            faults.push(wrong_shape(key, "string", other));
            None
        }
        None => {
            faults.push(ExtractError::Missing(key.to_string()));
            None
        }
    }
}

fn wrong_shape(field: &str, expected: &'static str, found: &Value) -> ExtractError {
    ExtractError::WrongShape {
        field: field.to_string(),
        expected,
        found: shape_of(found).to_string(),
    }
}

fn shape_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
