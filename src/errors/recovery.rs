// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipeflow contributors

//! Error recovery suggestions
//!
//! Provides actionable suggestions for recovering from errors.

use crate::script::ScriptErrorKind;

/// A recovery suggestion with concrete steps
#[derive(Debug, Clone)]
pub struct RecoverySuggestion {
    /// Brief description of what to do
    pub action: String,
    /// Example snippets to try
    pub examples: Vec<String>,
}

impl RecoverySuggestion {
    /// Suggest a fix for a script error, if there is a useful one
    pub fn for_script_error(kind: &ScriptErrorKind) -> Option<Self> {
        match kind {
            ScriptErrorKind::UndefinedFunction(name) => Some(Self::undefined_function(name)),
            ScriptErrorKind::UnknownModule(_) => Some(Self {
                action: "Available modules: std, pipe, math, layout".into(),
                examples: vec!["import math".into()],
            }),
            ScriptErrorKind::OutsideContext { function, context } => Some(Self {
                action: format!("Call '{}' inside a {} block", function, context),
                examples: vec![format!(
                    "{}(\"name\") {{\n    {}(...)\n}}",
                    context, function
                )],
            }),
            ScriptErrorKind::NonBoolCondition { .. } => Some(Self {
                action: "Conditions must evaluate to true or false".into(),
                examples: vec!["if len(items) > 0 { ... }".into()],
            }),
            ScriptErrorKind::InvalidInterpolation => Some(Self {
                action: "Interpolate a variable with ${name}, or escape the dollar as \\$".into(),
                examples: vec!["cmd(\"echo ${target}\")".into()],
            }),
            ScriptErrorKind::Reserved(word) => Some(Self {
                action: format!("'{}' is a keyword and cannot be used as a name", word),
                examples: vec![],
            }),
            _ => None,
        }
    }

    fn undefined_function(name: &str) -> Self {
        match name {
            "pipeline" | "step" | "parallel" | "cmd" | "workspace" | "move" | "copy"
            | "replace" | "echo" => Self {
                action: format!(
                    "'{}' belongs to the pipe module. You can try to add 'import pipe' to use pipeline.",
                    name
                ),
                examples: vec!["import pipe".into()],
            },
            "max" | "min" | "abs" | "pow" | "floor" | "ceil" => Self {
                action: format!("'{}' belongs to the math module", name),
                examples: vec!["import math".into(), format!("math.{}(...)", name)],
            },
            "layout" | "folder" | "template" | "set" => Self {
                action: format!("'{}' is only available in layout scripts", name),
                examples: vec!["pipeflow layout <name>".into()],
            },
            _ => Self {
                action: format!("Define it first with: fn {}(...) {{ ... }}", name),
                examples: vec![],
            },
        }
    }

    /// List the names that would have matched
    pub fn known_names(what: &str, known: &[&str]) -> Option<Self> {
        if known.is_empty() {
            return None;
        }
        Some(Self {
            action: format!("Known {}: {}", what, known.join(", ")),
            examples: vec![],
        })
    }

    /// Render as a single help string
    pub fn render(&self) -> String {
        if self.examples.is_empty() {
            return self.action.clone();
        }
        let mut out = self.action.clone();
        out.push_str("\n\nExample:\n");
        for example in &self.examples {
            out.push_str("    ");
            out.push_str(example);
            out.push('\n');
        }
        out.trim_end().to_string()
    }
}
