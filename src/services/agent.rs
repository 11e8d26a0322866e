//! Agent operation surface.
//!
//! DESIGN
//! ======
//! Intent translators (rule-based or model-driven) see a fixed set of
//! operations, each with a JSON input schema. `execute_operation` parses the
//! input and calls the same service functions the interactive surface uses,
//! always as a recorded action, so an agent edit undoes like a user edit.
//!
//! Positional updates honor advisory locks: `updateShape` with a position or
//! size change fails with a lock conflict if another user holds the shape.

use serde::Serialize;
use serde_json::{Value, json};
use tracing::{debug, info};
use uuid::Uuid;

use super::connection::{ConnectionError, create_connection};
use super::layout::{LayoutError, align_shapes, distribute_shapes};
use super::lock::{LockError, check_lock};
use super::shape::{ShapeError, add_shape, remove_shape, update_shape};
use crate::doc::{Anchor, ArrowType, ConnectionPatch, Patch, ShapeKind, ShapePatch};
use crate::error::ErrorCode;
use crate::geometry::align::{AlignMode, DistributeDirection};
use crate::state::{HistoryMode, SessionState};

#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("unknown operation: {0}")]
    UnknownOperation(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error(transparent)]
    Shape(#[from] ShapeError),
    #[error(transparent)]
    Lock(#[from] LockError),
    #[error(transparent)]
    Layout(#[from] LayoutError),
    #[error(transparent)]
    Connection(#[from] ConnectionError),
}

impl ErrorCode for AgentError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::UnknownOperation(_) => "E_UNKNOWN_OPERATION",
            Self::InvalidInput(_) => "E_INVALID_INPUT",
            Self::Shape(e) => e.error_code(),
            Self::Lock(e) => e.error_code(),
            Self::Layout(e) => e.error_code(),
            Self::Connection(e) => e.error_code(),
        }
    }

    fn retryable(&self) -> bool {
        match self {
            Self::Shape(e) => e.retryable(),
            Self::Lock(e) => e.retryable(),
            Self::Layout(e) => e.retryable(),
            Self::Connection(e) => e.retryable(),
            _ => false,
        }
    }
}

/// One operation as advertised to an intent translator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperationSpec {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

fn shape_kind_names() -> Vec<&'static str> {
    ShapeKind::ALL.iter().map(|k| k.as_str()).collect()
}

/// The fixed operation surface.
#[must_use]
pub fn operation_specs() -> Vec<OperationSpec> {
    let anchors = json!(["top", "right", "bottom", "left"]);
    vec![
        OperationSpec {
            name: "createShape".into(),
            description: "Create a shape at a position. Unset style fields use the shape type's defaults.".into(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "type": { "type": "string", "enum": shape_kind_names() },
                    "x": { "type": "number" },
                    "y": { "type": "number" },
                    "width": { "type": "number" },
                    "height": { "type": "number" },
                    "radius": { "type": "number" },
                    "rotation": { "type": "number" },
                    "fill": { "type": "string" },
                    "stroke": { "type": "string" },
                    "text": { "type": "string" }
                },
                "required": ["type", "x", "y"]
            }),
        },
        OperationSpec {
            name: "updateShape".into(),
            description: "Change fields of an existing shape. Pass null for text to remove it.".into(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "shapeId": { "type": "string", "format": "uuid" },
                    "x": { "type": "number" },
                    "y": { "type": "number" },
                    "width": { "type": "number" },
                    "height": { "type": "number" },
                    "rotation": { "type": "number" },
                    "fill": { "type": "string" },
                    "stroke": { "type": "string" },
                    "opacity": { "type": "number" },
                    "text": { "type": ["string", "null"] }
                },
                "required": ["shapeId"]
            }),
        },
        OperationSpec {
            name: "deleteShape".into(),
            description: "Delete a shape and any connections attached to it.".into(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "shapeId": { "type": "string", "format": "uuid" }
                },
                "required": ["shapeId"]
            }),
        },
        OperationSpec {
            name: "alignShapes".into(),
            description: "Align two or more shapes to a common edge or center line.".into(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "shapeIds": { "type": "array", "items": { "type": "string", "format": "uuid" }, "minItems": 2 },
                    "mode": { "type": "string", "enum": ["left", "right", "top", "bottom", "centerH", "centerV"] }
                },
                "required": ["shapeIds", "mode"]
            }),
        },
        OperationSpec {
            name: "distributeShapes".into(),
            description: "Space three or more shapes evenly along an axis.".into(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "shapeIds": { "type": "array", "items": { "type": "string", "format": "uuid" }, "minItems": 3 },
                    "direction": { "type": "string", "enum": ["horizontal", "vertical"] }
                },
                "required": ["shapeIds", "direction"]
            }),
        },
        OperationSpec {
            name: "createConnection".into(),
            description: "Connect two shapes. Anchors default to the sides facing each other.".into(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "fromId": { "type": "string", "format": "uuid" },
                    "toId": { "type": "string", "format": "uuid" },
                    "fromAnchor": { "type": "string", "enum": anchors.clone() },
                    "toAnchor": { "type": "string", "enum": anchors },
                    "arrowType": { "type": "string", "enum": ["none", "end", "both"] },
                    "label": { "type": "string" }
                },
                "required": ["fromId", "toId"]
            }),
        },
    ]
}

// =============================================================================
// EXECUTION
// =============================================================================

/// Run one operation and return a short transcript line describing the result.
///
/// # Errors
///
/// `UnknownOperation`, `InvalidInput` for missing or malformed fields, or
/// the underlying service error.
pub async fn execute_operation(state: &SessionState, name: &str, input: &Value) -> Result<String, AgentError> {
    debug!(doc_id = %state.doc_id, operation = name, "agent: executing");
    let result = match name {
        "createShape" => execute_create_shape(state, input).await,
        "updateShape" => execute_update_shape(state, input).await,
        "deleteShape" => execute_delete_shape(state, input).await,
        "alignShapes" => execute_align_shapes(state, input).await,
        "distributeShapes" => execute_distribute_shapes(state, input).await,
        "createConnection" => execute_create_connection(state, input).await,
        _ => Err(AgentError::UnknownOperation(name.to_owned())),
    };
    match &result {
        Ok(line) => info!(doc_id = %state.doc_id, operation = name, result = %line, "agent: done"),
        Err(e) => info!(doc_id = %state.doc_id, operation = name, code = e.error_code(), error = %e, "agent: failed"),
    }
    result
}

fn uuid_field(input: &Value, key: &str) -> Result<Uuid, AgentError> {
    input
        .get(key)
        .and_then(|v| v.as_str())
        .and_then(|s| s.parse::<Uuid>().ok())
        .ok_or_else(|| AgentError::InvalidInput(format!("missing or invalid {key}")))
}

fn uuid_list(input: &Value, key: &str) -> Result<Vec<Uuid>, AgentError> {
    let items = input
        .get(key)
        .and_then(Value::as_array)
        .ok_or_else(|| AgentError::InvalidInput(format!("missing {key}")))?;
    items
        .iter()
        .map(|v| {
            v.as_str()
                .and_then(|s| s.parse::<Uuid>().ok())
                .ok_or_else(|| AgentError::InvalidInput(format!("invalid id in {key}")))
        })
        .collect()
}

fn f64_field(input: &Value, key: &str) -> Option<f64> {
    input.get(key).and_then(Value::as_f64)
}

fn string_field(input: &Value, key: &str) -> Option<String> {
    input.get(key).and_then(|v| v.as_str()).map(str::to_owned)
}

fn required_f64(input: &Value, key: &str) -> Result<f64, AgentError> {
    f64_field(input, key).ok_or_else(|| AgentError::InvalidInput(format!("missing {key}")))
}

/// Absent keeps the field, `null` clears it, a string sets it.
fn text_patch(input: &Value, key: &str) -> Patch<String> {
    match input.get(key) {
        None => Patch::Keep,
        Some(Value::Null) => Patch::Clear,
        Some(v) => v.as_str().map_or(Patch::Keep, |s| Patch::Set(s.to_owned())),
    }
}

fn parse_enum<T>(input: &Value, key: &str, parse: impl Fn(&str) -> Option<T>) -> Result<Option<T>, AgentError> {
    match input.get(key).and_then(|v| v.as_str()) {
        None => Ok(None),
        Some(name) => parse(name)
            .map(Some)
            .ok_or_else(|| AgentError::InvalidInput(format!("unknown {key}: {name}"))),
    }
}

async fn execute_create_shape(state: &SessionState, input: &Value) -> Result<String, AgentError> {
    let kind = parse_enum(input, "type", ShapeKind::parse)?
        .ok_or_else(|| AgentError::InvalidInput("missing type".into()))?;
    let x = required_f64(input, "x")?;
    let y = required_f64(input, "y")?;
    let overrides = ShapePatch {
        width: f64_field(input, "width"),
        height: f64_field(input, "height"),
        radius: f64_field(input, "radius").map_or(Patch::Keep, Patch::Set),
        rotation: f64_field(input, "rotation"),
        fill: string_field(input, "fill"),
        stroke: string_field(input, "stroke"),
        text: text_patch(input, "text"),
        ..ShapePatch::default()
    };
    let id = add_shape(state, kind, x, y, &overrides, HistoryMode::Record).await?;
    Ok(format!("created {} {id}", kind.as_str()))
}

async fn execute_update_shape(state: &SessionState, input: &Value) -> Result<String, AgentError> {
    let id = uuid_field(input, "shapeId")?;
    let patch = ShapePatch {
        x: f64_field(input, "x"),
        y: f64_field(input, "y"),
        width: f64_field(input, "width"),
        height: f64_field(input, "height"),
        rotation: f64_field(input, "rotation"),
        fill: string_field(input, "fill"),
        stroke: string_field(input, "stroke"),
        opacity: f64_field(input, "opacity"),
        text: text_patch(input, "text"),
        ..ShapePatch::default()
    };
    if patch.is_positional() {
        check_lock(state, id).await?;
    }
    update_shape(state, id, patch, HistoryMode::Record).await?;
    Ok(format!("updated shape {id}"))
}

async fn execute_delete_shape(state: &SessionState, input: &Value) -> Result<String, AgentError> {
    let id = uuid_field(input, "shapeId")?;
    remove_shape(state, id, HistoryMode::Record).await?;
    Ok(format!("deleted shape {id}"))
}

async fn execute_align_shapes(state: &SessionState, input: &Value) -> Result<String, AgentError> {
    let ids = uuid_list(input, "shapeIds")?;
    let mode = parse_enum(input, "mode", AlignMode::parse)?
        .ok_or_else(|| AgentError::InvalidInput("missing mode".into()))?;
    let moved = align_shapes(state, &ids, mode, HistoryMode::Record).await?;
    Ok(format!("aligned {} shapes", moved.len()))
}

async fn execute_distribute_shapes(state: &SessionState, input: &Value) -> Result<String, AgentError> {
    let ids = uuid_list(input, "shapeIds")?;
    let direction = parse_enum(input, "direction", DistributeDirection::parse)?
        .ok_or_else(|| AgentError::InvalidInput("missing direction".into()))?;
    let moved = distribute_shapes(state, &ids, direction, HistoryMode::Record).await?;
    Ok(format!("distributed {} shapes, moved {}", ids.len(), moved.len()))
}

async fn execute_create_connection(state: &SessionState, input: &Value) -> Result<String, AgentError> {
    let from = uuid_field(input, "fromId")?;
    let to = uuid_field(input, "toId")?;
    let from_anchor = parse_enum(input, "fromAnchor", Anchor::parse)?;
    let to_anchor = parse_enum(input, "toAnchor", Anchor::parse)?;
    let anchors = match (from_anchor, to_anchor) {
        (Some(a), Some(b)) => Some((a, b)),
        (None, None) => None,
        _ => return Err(AgentError::InvalidInput("fromAnchor and toAnchor must be given together".into())),
    };
    let style = ConnectionPatch {
        arrow_type: parse_enum(input, "arrowType", ArrowType::parse)?,
        label: text_patch(input, "label"),
        ..ConnectionPatch::default()
    };
    let id = create_connection(state, from, to, anchors, &style, HistoryMode::Record).await?;
    Ok(format!("created connection {id} from {from} to {to}"))
}

#[cfg(test)]
#[path = "agent_test.rs"]
mod tests;
