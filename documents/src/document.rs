use crate::defaults::{DEFAULT_CONTEXT, DEFAULT_TOOLS_PROMPT};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentKind {
    Context,
    ToolsPrompt,
}

impl DocumentKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::Context => "context",
            DocumentKind::ToolsPrompt => "tools_prompt",
        }
    }
}

/// Column name in the store and key name in the JSON representation of one field.
#[derive(Debug, Clone, Copy)]
pub struct FieldNames {
    pub column: &'static str,
    pub key: &'static str,
}

/// Where the three fields of a document live, both in the store and in JSON.
///
/// Every document has two prompt texts and one JSON payload.
#[derive(Debug, Clone, Copy)]
pub struct DocumentLayout {
    pub table: &'static str,
    pub id_column: &'static str,
    pub prompt: FieldNames,
    pub instructions: FieldNames,
    pub data: FieldNames,
}

/// The raw fields of a document as read from a store row or a file.
/// Any of them may be missing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentFields {
    pub prompt: Option<String>,
    pub instructions: Option<String>,
    pub data: Option<Value>,
    /// Top-level keys outside the layout, served unchanged.
    pub extra: Map<String, Value>,
}

impl DocumentFields {
    /// Reads the fields out of a JSON object using the layout's key names.
    /// Every other key is kept in `extra`.
    ///
    /// Keys with a value of the wrong type are treated as missing.
    pub fn from_json(layout: &DocumentLayout, value: Value) -> Option<Self> {
        let Value::Object(mut object) = value else {
            return None;
        };

        let mut take_text = |key: &str| match object.remove(key) {
            Some(Value::String(s)) => Some(s),
            _ => None,
        };
        let prompt = take_text(layout.prompt.key);
        let instructions = take_text(layout.instructions.key);
        let data = object.remove(layout.data.key);

        let fields = DocumentFields {
            prompt,
            instructions,
            data,
            extra: object,
        };
        Some(fields.normalized())
    }

    /// Whether the object has at least one of the layout's keys.
    pub fn has_layout_key(layout: &DocumentLayout, object: &Map<String, Value>) -> bool {
        [layout.prompt.key, layout.instructions.key, layout.data.key]
            .iter()
            .any(|key| object.contains_key(*key))
    }

    /// Empty texts and null or empty payloads count as missing.
    pub fn normalized(self) -> Self {
        DocumentFields {
            prompt: self.prompt.filter(|s| !s.is_empty()),
            instructions: self.instructions.filter(|s| !s.is_empty()),
            data: self.data.filter(|v| match v {
                Value::Null => false,
                Value::Object(map) => !map.is_empty(),
                _ => true,
            }),
            extra: self.extra,
        }
    }
}

/// A document served by the resolver.
pub trait Document: Serialize + Clone + Send + Sync + 'static {
    const KIND: DocumentKind;
    const LAYOUT: DocumentLayout;
    /// Identifier looked up in the store when the caller supplied none.
    const DEFAULT_ID: Option<&'static str>;

    /// The built-in document used when no other tier has one.
    fn builtin() -> Self;

    /// Completes partial fields, taking missing texts from the built-in
    /// default and a missing payload as an empty object.
    fn from_fields(fields: DocumentFields) -> Self;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextDocument {
    pub system: String,
    pub context: Value,
    pub instructions: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Document for ContextDocument {
    const KIND: DocumentKind = DocumentKind::Context;
    const LAYOUT: DocumentLayout = DocumentLayout {
        table: "report_context",
        id_column: "report_id",
        prompt: FieldNames {
            column: "system_prompt",
            key: "system",
        },
        instructions: FieldNames {
            column: "instructions",
            key: "instructions",
        },
        data: FieldNames {
            column: "context_data",
            key: "context",
        },
    };
    const DEFAULT_ID: Option<&'static str> = None;

    fn builtin() -> Self {
        DEFAULT_CONTEXT.clone()
    }

    fn from_fields(fields: DocumentFields) -> Self {
        let fields = fields.normalized();
        ContextDocument {
            system: fields
                .prompt
                .unwrap_or_else(|| DEFAULT_CONTEXT.system.clone()),
            context: fields.data.unwrap_or_else(empty_object),
            instructions: fields
                .instructions
                .unwrap_or_else(|| DEFAULT_CONTEXT.instructions.clone()),
            extra: fields.extra,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolsPromptDocument {
    pub tools_system_prompt: String,
    pub recommendation_instructions: String,
    pub tools_data: Value,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Document for ToolsPromptDocument {
    const KIND: DocumentKind = DocumentKind::ToolsPrompt;
    const LAYOUT: DocumentLayout = DocumentLayout {
        table: "tools_prompt",
        id_column: "prompt_id",
        prompt: FieldNames {
            column: "tools_system_prompt",
            key: "tools_system_prompt",
        },
        instructions: FieldNames {
            column: "recommendation_instructions",
            key: "recommendation_instructions",
        },
        data: FieldNames {
            column: "tools_data",
            key: "tools_data",
        },
    };
    const DEFAULT_ID: Option<&'static str> = Some("default_tools_prompt");

    fn builtin() -> Self {
        DEFAULT_TOOLS_PROMPT.clone()
    }

    fn from_fields(fields: DocumentFields) -> Self {
        let fields = fields.normalized();
        ToolsPromptDocument {
            tools_system_prompt: fields
                .prompt
                .unwrap_or_else(|| DEFAULT_TOOLS_PROMPT.tools_system_prompt.clone()),
            recommendation_instructions: fields
                .instructions
                .unwrap_or_else(|| DEFAULT_TOOLS_PROMPT.recommendation_instructions.clone()),
            tools_data: fields.data.unwrap_or_else(empty_object),
            extra: fields.extra,
        }
    }
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}
