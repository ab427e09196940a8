//! Trace field extraction
//!
//! The assistant reports flow execution as a list of trace events, each
//! shaped `{"trace": {"<traceType>": {"nodeName", "fields": [...]}}}`. The
//! inputs fed to the prompt node carry the answer categories we render,
//! so we pull `fields` out of the first `nodeInputTrace` for that node.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::{Map, Value};

/// Flow node whose inputs carry the categorised answers.
pub const DEFAULT_TARGET_NODE: &str = "Prompt_1";

/// Trace-type label of node input traces.
pub const NODE_INPUT_TRACE: &str = "nodeInputTrace";

/// Field name → document text.
pub type TraceFieldTable = BTreeMap<String, String>;

/// Top-level shape of a `trace` value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TraceShape<'a> {
    Absent,
    Single(&'a Map<String, Value>),
    Sequence(&'a [Value]),
    Invalid,
}

impl<'a> TraceShape<'a> {
    pub fn decode(trace: Option<&'a Value>) -> Self {
        match trace {
            None | Some(Value::Null) => TraceShape::Absent,
            Some(Value::Object(obj)) => TraceShape::Single(obj),
            Some(Value::Array(items)) => TraceShape::Sequence(items),
            Some(_) => TraceShape::Invalid,
        }
    }

    /// Trace events in reporting order. Absent and invalid shapes have none.
    fn events(self) -> Vec<&'a Map<String, Value>> {
        match self {
            TraceShape::Single(obj) => vec![obj],
            TraceShape::Sequence(items) => items.iter().filter_map(Value::as_object).collect(),
            TraceShape::Absent | TraceShape::Invalid => Vec::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TraceField {
    #[serde(default)]
    node_input_name: Option<String>,
    #[serde(default)]
    node_output_name: Option<String>,
    #[serde(default)]
    content: Option<Map<String, Value>>,
}

impl TraceField {
    fn into_entry(self) -> Option<(String, String)> {
        let name = self.node_input_name.or(self.node_output_name)?;
        let document = match self.content?.remove("document")? {
            Value::Null => return None,
            Value::String(s) => s,
            other => other.to_string(),
        };
        Some((name, document))
    }
}

/// Map the fields of the first node input trace for `target_node`.
///
/// Malformed or absent traces yield an empty table. Later matches for the
/// same node are ignored.
pub fn extract_fields(trace: Option<&Value>, target_node: &str) -> TraceFieldTable {
    for event in TraceShape::decode(trace).events() {
        let Some(bodies) = event.get("trace").and_then(Value::as_object) else {
            continue;
        };

        for (label, body) in bodies {
            if label != NODE_INPUT_TRACE {
                continue;
            }
            if body.get("nodeName").and_then(Value::as_str) != Some(target_node) {
                continue;
            }
            let Some(fields) = body.get("fields").and_then(Value::as_array) else {
                continue;
            };

            return fields
                .iter()
                .filter_map(|f| serde_json::from_value::<TraceField>(f.clone()).ok())
                .filter_map(TraceField::into_entry)
                .collect();
        }
    }

    TraceFieldTable::new()
}
