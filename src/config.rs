//! Configuration records and rewrite plans.
//!
//! A [`ToolConfig`] is what gets injected into one annotation site. Its values
//! are already source expressions. A [`RewritePlan`] is the host-side file the
//! CLI reads: which annotation to target and, per function, the tool entry
//! that is rendered into a [`ToolConfig`].

use std::{
    collections::BTreeMap,
    fs,
    path::{Component, Path},
};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::{
    rewrite::synth::{parse_config_value, DESCRIPTION_FIELD, NAME_FIELD, PARAMETERS_FIELD},
    rewrite_err, RewriteError,
};

// ============================================================================
// TOOL CONFIGURATION
// ============================================================================

/// The configuration injected into one annotation site.
///
/// Every value is source text for an expression, e.g. `"sum"` with quotes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolConfig {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub parameter_schema: String,
}

impl ToolConfig {
    pub fn new(
        name: impl Into<String>,
        description: Option<String>,
        parameter_schema: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description,
            parameter_schema: parameter_schema.into(),
        }
    }

    /// The description, or the name when no description was given.
    pub fn description_or_name(&self) -> &str {
        self.description.as_deref().unwrap_or(&self.name)
    }

    /// Checks that every value parses as an expression.
    pub fn validate(&self) -> Result<(), RewriteError> {
        parse_config_value(NAME_FIELD, &self.name)?;
        if let Some(description) = &self.description {
            parse_config_value(DESCRIPTION_FIELD, description)?;
        }
        parse_config_value(PARAMETERS_FIELD, &self.parameter_schema)?;
        Ok(())
    }
}

// ============================================================================
// REWRITE PLANS
// ============================================================================

/// Host-side plan: which annotations to fill, and with what.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RewritePlan {
    /// Annotation reference to target, as written (`ai:Tool`).
    pub annotation: String,
    /// Extension of source documents, without the dot.
    pub extension: String,
    /// Directory names that mark test documents.
    pub test_dirs: Vec<String>,
    /// Tool entries keyed by function name.
    pub tools: BTreeMap<String, ToolEntry>,
}

impl Default for RewritePlan {
    fn default() -> Self {
        Self {
            annotation: "ai:Tool".to_string(),
            extension: "bal".to_string(),
            test_dirs: vec!["tests".to_string()],
            tools: BTreeMap::new(),
        }
    }
}

/// One tool entry in plain data form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ToolEntry {
    /// Tool name; the function name is used when absent.
    pub name: Option<String>,
    pub description: Option<String>,
    /// JSON schema for the tool's parameters; `{}` when absent.
    pub parameters: Option<Value>,
}

impl ToolEntry {
    /// Renders the entry into source expressions.
    pub fn to_config(&self, function_name: &str) -> ToolConfig {
        let name = self.name.as_deref().unwrap_or(function_name);
        let parameters = match &self.parameters {
            Some(value) => render_json(value),
            None => "{}".to_string(),
        };
        ToolConfig::new(
            string_literal(name),
            self.description.as_deref().map(string_literal),
            parameters,
        )
    }
}

impl RewritePlan {
    /// Loads a plan, choosing JSON or YAML by file extension.
    pub fn load(path: &Path) -> Result<Self, RewriteError> {
        let text = fs::read_to_string(path).map_err(|e| {
            rewrite_err!(Config, format!("cannot read plan {}", path.display())).caused_by(e)
        })?;
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let plan = if is_json {
            Self::from_json_str(&text)
        } else {
            Self::from_yaml_str(&text)
        }
        .map_err(|e| e.with_help(format!("while loading {}", path.display())))?;

        debug!(path = %path.display(), tools = plan.tools.len(), "loaded rewrite plan");
        Ok(plan)
    }

    pub fn from_yaml_str(text: &str) -> Result<Self, RewriteError> {
        serde_yaml::from_str(text)
            .map_err(|e| rewrite_err!(Config, format!("invalid YAML plan: {e}")).caused_by(e))
    }

    pub fn from_json_str(text: &str) -> Result<Self, RewriteError> {
        serde_json::from_str(text)
            .map_err(|e| rewrite_err!(Config, format!("invalid JSON plan: {e}")).caused_by(e))
    }

    /// The configuration for a function, if the plan lists it.
    pub fn config_for(&self, function_name: &str) -> Option<ToolConfig> {
        self.tools
            .get(function_name)
            .map(|entry| entry.to_config(function_name))
    }

    /// True when any directory component of `path` is a test directory.
    pub fn is_test_path(&self, path: &Path) -> bool {
        path.parent()
            .into_iter()
            .flat_map(Path::components)
            .any(|component| match component {
                Component::Normal(name) => self.test_dirs.iter().any(|dir| name == dir.as_str()),
                _ => false,
            })
    }

    /// True when `path` has the plan's source extension.
    pub fn is_source_path(&self, path: &Path) -> bool {
        path.extension()
            .is_some_and(|ext| ext == self.extension.as_str())
    }
}

// ============================================================================
// RENDERING
// ============================================================================

/// Renders text as a double-quoted string literal.
pub fn string_literal(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for c in text.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => out.push_str(&format!("\\u{{{:X}}}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Renders a JSON value as a key-value literal expression.
pub fn render_json(value: &Value) -> String {
    match value {
        Value::Null => "()".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => string_literal(s),
        Value::Array(items) => {
            let items: Vec<String> = items.iter().map(render_json).collect();
            format!("[{}]", items.join(","))
        }
        Value::Object(fields) => {
            let fields: Vec<String> = fields
                .iter()
                .map(|(key, value)| format!("{}:{}", string_literal(key), render_json(value)))
                .collect();
            format!("{{{}}}", fields.join(","))
        }
    }
}
