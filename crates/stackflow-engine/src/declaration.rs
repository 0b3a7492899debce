//! Resource declarations
//!
//! A declaration is the caller-facing description of one resource: a stable
//! logical name, a type tag understood by the provider, and a set of input
//! properties that are either literal values or references to another
//! resource's outputs.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

/// Resolved property values (inputs after resolution, or outputs).
pub type Properties = BTreeMap<String, serde_json::Value>;

/// Reference to an output property of another resource
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Reference {
    /// Logical name of the referenced resource
    pub target: String,

    /// Output property of the referenced resource
    pub output: String,
}

impl Reference {
    pub fn new(target: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            output: output.into(),
        }
    }

    /// Parse the `target.output` notation. The split happens at the last `.`
    /// so logical names may themselves contain dots.
    pub fn parse(s: &str) -> Option<Self> {
        let (target, output) = s.rsplit_once('.')?;
        if target.is_empty() || output.is_empty() {
            return None;
        }
        Some(Self::new(target, output))
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.target, self.output)
    }
}

/// Value of a single input property
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputValue {
    /// Value known at declaration time
    Literal(serde_json::Value),
    /// Value taken from another resource's outputs once it is known
    Reference(Reference),
}

impl InputValue {
    pub fn as_reference(&self) -> Option<&Reference> {
        match self {
            InputValue::Reference(r) => Some(r),
            InputValue::Literal(_) => None,
        }
    }
}

impl From<serde_json::Value> for InputValue {
    fn from(value: serde_json::Value) -> Self {
        InputValue::Literal(value)
    }
}

impl From<Reference> for InputValue {
    fn from(reference: Reference) -> Self {
        InputValue::Reference(reference)
    }
}

/// Declaration of a single resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Declaration {
    /// Stable logical name, unique within a stack
    pub logical_name: String,

    /// Resource type tag (e.g., "vps", "ssh-key")
    pub resource_type: String,

    /// Input properties
    pub inputs: BTreeMap<String, InputValue>,
}

impl Declaration {
    pub fn new(logical_name: impl Into<String>, resource_type: impl Into<String>) -> Self {
        Self {
            logical_name: logical_name.into(),
            resource_type: resource_type.into(),
            inputs: BTreeMap::new(),
        }
    }

    /// Add a literal input
    pub fn with_literal(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.inputs.insert(key.into(), InputValue::Literal(value));
        self
    }

    /// Add an input referencing `target.output`
    pub fn with_reference(
        mut self,
        key: impl Into<String>,
        target: impl Into<String>,
        output: impl Into<String>,
    ) -> Self {
        self.inputs
            .insert(key.into(), InputValue::Reference(Reference::new(target, output)));
        self
    }

    /// All references held by this declaration, keyed by input property
    pub fn references(&self) -> impl Iterator<Item = (&String, &Reference)> {
        self.inputs
            .iter()
            .filter_map(|(k, v)| v.as_reference().map(|r| (k, r)))
    }
}

/// Declared output keys per resource type
///
/// Types without an entry are not checked: any output key may be referenced
/// and availability is only known at resolution time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourceSchema {
    outputs: HashMap<String, BTreeSet<String>>,
}

impl ResourceSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn declare<I, S>(&mut self, resource_type: impl Into<String>, outputs: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.outputs
            .entry(resource_type.into())
            .or_default()
            .extend(outputs.into_iter().map(Into::into));
    }

    pub fn with_type<I, S>(mut self, resource_type: impl Into<String>, outputs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.declare(resource_type, outputs);
        self
    }

    /// Declared outputs of a type, if the type is known
    pub fn outputs_of(&self, resource_type: &str) -> Option<&BTreeSet<String>> {
        self.outputs.get(resource_type)
    }

    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }
}
