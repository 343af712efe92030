//! Shared fixtures and helpers for the annotweave integration tests.
#![allow(dead_code)]

use annotweave::{
    rewrite::annotation_sites, rewrite_module, syntax::parse_module, RewriteError, SiteConfigs,
    ToolConfig,
};

/// A small module with every annotation shape and some declarations around it.
pub const CALCULATOR: &str = r#"// Calculator tools
import ballerina/ai;
import ballerina/io;

# Adds two numbers.
# + a - first operand
@ai:Tool
isolated function sum(int a, int b) returns int {
    // keep "quotes" and {braces} in comments
    return a + b;
}

@ai:Tool {
    name: "mult"
}
public isolated function mult(int a, int b) returns int => a * b;

@ai:Tool {}
function ping() returns string {
    string s = "}";
    return s;
}

@display {label: "Config"}
configurable string apiKey = ?;

type Point record {|
    int x;
    int y;
|};
"#;

pub fn tool(name: &str, description: Option<&str>, schema: &str) -> ToolConfig {
    ToolConfig::new(name, description.map(str::to_string), schema)
}

/// `{name:"sum", description:"adds", parameterSchema:"{}"}`
pub fn sum_tool() -> ToolConfig {
    tool("\"sum\"", Some("\"adds\""), "{}")
}

/// Rewrites every `reference` annotation in `source` with `config`.
pub fn rewrite_all(source: &str, reference: &str, config: &ToolConfig) -> Result<String, RewriteError> {
    let tree = parse_module("test.bal", source)?;
    let mut sites = SiteConfigs::new();
    for site in annotation_sites(tree.root(), reference) {
        sites.insert(&site.annotation, config.clone());
    }
    let root = rewrite_module(&tree, &sites)?;
    Ok(tree.modify_with(root).text())
}

/// Rewrites `ai:Tool` annotations with the `sum` tool.
pub fn rewrite_sum(source: &str) -> String {
    rewrite_all(source, "ai:Tool", &sum_tool()).unwrap()
}
