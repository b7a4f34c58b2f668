//! Declarative schema the host renders as the node's parameter UI.
//!
//! Everything here serializes to the host's camelCase JSON shape. Nothing
//! in this module performs I/O.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Map, Value};

/// Describes a node type to the host: identity, connections, credentials
/// and the parameter fields it shows.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeDescription {
    pub display_name: &'static str,
    pub name: &'static str,
    pub icon: &'static str,
    pub group: Vec<&'static str>,
    pub version: u32,
    pub subtitle: &'static str,
    pub description: &'static str,
    pub defaults: NodeDefaults,
    pub inputs: Vec<ConnectionType>,
    pub outputs: Vec<ConnectionType>,
    pub credentials: Vec<CredentialRequirement>,
    pub properties: Vec<NodeProperty>,
}

impl NodeDescription {
    /// Look up a top-level property by parameter name.
    pub fn property(&self, name: &str) -> Option<&NodeProperty> {
        self.properties.iter().find(|p| p.name == name)
    }

    /// Names of the top-level properties the host would show for `params`.
    ///
    /// Parameters missing from `params` take their declared default.
    pub fn visible_properties(&self, params: &Map<String, Value>) -> Vec<&'static str> {
        let mut effective: Map<String, Value> = self
            .properties
            .iter()
            .map(|p| (p.name.to_owned(), p.default.clone()))
            .collect();
        for (k, v) in params {
            effective.insert(k.clone(), v.clone());
        }

        self.properties
            .iter()
            .filter(|p| p.is_visible(&effective))
            .map(|p| p.name)
            .collect()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NodeDefaults {
    pub name: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionType {
    Main,
}

/// A credential type the node needs the host to supply.
#[derive(Debug, Clone, Serialize)]
pub struct CredentialRequirement {
    pub name: &'static str,
    pub required: bool,
}

/// Widget type of a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyType {
    String,
    Number,
    Boolean,
    Options,
    Collection,
}

/// One parameter field.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeProperty {
    pub display_name: &'static str,
    pub name: &'static str,
    #[serde(rename = "type")]
    pub kind: PropertyType,
    pub default: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<&'static str>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub required: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub no_data_expression: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub type_options: Option<TypeOptions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_options: Option<DisplayOptions>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<PropertyOption>,
}

impl NodeProperty {
    pub fn new(
        display_name: &'static str,
        name: &'static str,
        kind: PropertyType,
        default: Value,
    ) -> Self {
        Self {
            display_name,
            name,
            kind,
            default,
            description: None,
            placeholder: None,
            required: false,
            no_data_expression: false,
            type_options: None,
            display_options: None,
            options: Vec::new(),
        }
    }

    pub fn description(mut self, text: &'static str) -> Self {
        self.description = Some(text);
        self
    }

    pub fn placeholder(mut self, text: &'static str) -> Self {
        self.placeholder = Some(text);
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn no_data_expression(mut self) -> Self {
        self.no_data_expression = true;
        self
    }

    pub fn type_options(mut self, options: TypeOptions) -> Self {
        self.type_options = Some(options);
        self
    }

    /// Show this field only when parameter `name` has one of `values`.
    pub fn show_when(mut self, name: &'static str, values: &[&str]) -> Self {
        let display = self.display_options.get_or_insert_with(DisplayOptions::default);
        display
            .show
            .insert(name, values.iter().map(|v| Value::from(*v)).collect());
        self
    }

    pub fn options(mut self, options: Vec<PropertyOption>) -> Self {
        self.options = options;
        self
    }

    /// Whether the host would display this field given `params`.
    pub fn is_visible(&self, params: &Map<String, Value>) -> bool {
        let Some(display) = &self.display_options else {
            return true;
        };
        display.show.iter().all(|(name, allowed)| {
            params
                .get(*name)
                .map(|current| allowed.contains(current))
                .unwrap_or(false)
        })
    }
}

/// Extra widget hints.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TypeOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<bool>,
}

/// Conditional visibility: every listed parameter must match one of its
/// allowed values.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DisplayOptions {
    pub show: BTreeMap<&'static str, Vec<Value>>,
}

/// Entry of an `options` list: a selectable choice, or a nested field of a
/// collection.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum PropertyOption {
    Choice(OptionChoice),
    Field(NodeProperty),
}

#[derive(Debug, Clone, Serialize)]
pub struct OptionChoice {
    pub name: &'static str,
    pub value: &'static str,
    pub description: &'static str,
    pub action: &'static str,
}
