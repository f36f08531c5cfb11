//! Workflow step tree: the recursive instruction/condition structure stored
//! against a workflow-target trigger, and its deterministic rendering into a
//! prompt augmentation for the Execution Bridge.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Resolves a saved workflow's step tree by id, for a workflow-target
/// trigger or a direct workflow execution request.
#[async_trait]
pub trait WorkflowStore: Send + Sync {
    async fn load(&self, workflow_id: &str) -> Result<Vec<Step>, CoreError>;
}

/// One node of the tree the workflow author built. `Instruction` nodes are
/// the executable leaves (or branches with nested sub-steps); `Condition`
/// nodes gate their `children` on an `if`/`elseif`/`else` expression.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Step {
    Instruction {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tool: Option<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        children: Vec<Step>,
    },
    Condition {
        condition_kind: ConditionKind,
        expression: Option<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        children: Vec<Step>,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionKind {
    If,
    ElseIf,
    Else,
}

/// A single entry in the flattened, numbered rendering of the tree.
#[derive(Clone, Debug, Serialize)]
#[serde(untagged)]
enum RenderedNode {
    Instruction {
        step_number: u32,
        name: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        description: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        tool: Option<String>,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        then: Vec<RenderedNode>,
    },
    Condition {
        condition: String,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        then: Vec<RenderedNode>,
    },
}

/// The counts the Execution Bridge surfaces to the LLM up front, per the
/// workflow prompt's summary block.
#[derive(Clone, Copy, Debug, Default, Serialize)]
pub struct WorkflowSummary {
    pub total_steps: u32,
    pub total_conditions: u32,
    pub max_nesting_depth: u32,
    pub has_conditional_logic: bool,
}

fn is_placeholder_start(step: &Step) -> bool {
    matches!(step, Step::Instruction { name, .. } if name.eq_ignore_ascii_case("start"))
}

struct Renderer {
    next_step_number: u32,
    summary: WorkflowSummary,
}

impl Renderer {
    fn render_all(&mut self, steps: &[Step], depth: u32) -> Vec<RenderedNode> {
        self.summary.max_nesting_depth = self.summary.max_nesting_depth.max(depth);
        steps
            .iter()
            .filter(|s| depth > 0 || !is_placeholder_start(s))
            .map(|s| self.render(s, depth))
            .collect()
    }

    fn render(&mut self, step: &Step, depth: u32) -> RenderedNode {
        match step {
            Step::Instruction { name, description, tool, children } => {
                let step_number = self.next_step_number;
                self.next_step_number += 1;
                self.summary.total_steps += 1;
                let then = self.render_all(children, depth + 1);
                RenderedNode::Instruction {
                    step_number,
                    name: name.clone(),
                    description: description.clone(),
                    tool: tool.clone(),
                    then,
                }
            }
            Step::Condition { condition_kind, expression, children } => {
                self.summary.total_conditions += 1;
                self.summary.has_conditional_logic = true;
                let condition = match condition_kind {
                    ConditionKind::If => expression.clone().unwrap_or_default(),
                    ConditionKind::ElseIf => format!("else if {}", expression.clone().unwrap_or_default()),
                    ConditionKind::Else => "else".to_string(),
                };
                let then = self.render_all(children, depth + 1);
                RenderedNode::Condition { condition, then }
            }
        }
    }
}

/// Numbers instruction steps depth-first, computes the summary, and wraps
/// the resulting JSON in fixed instructional prose.
pub fn render_workflow_prompt(steps: &[Step]) -> String {
    let mut renderer = Renderer { next_step_number: 1, summary: WorkflowSummary::default() };
    let rendered = renderer.render_all(steps, 0);
    let summary = renderer.summary;

    let body = serde_json::json!({
        "steps": rendered,
        "summary": {
            "total_steps": summary.total_steps,
            "total_conditions": summary.total_conditions,
            "max_nesting_depth": summary.max_nesting_depth,
            "has_conditional_logic": summary.has_conditional_logic,
        },
    });

    format!(
        "You are executing a structured workflow. Follow the steps below in \
order. For a step that names a tool, call that tool exactly as specified — \
do not substitute an equivalent. For a condition node, evaluate its \
expression against the current state and only enter its `then` branch if \
true; evaluate `if`/`else if` branches top to bottom and fall through to \
`else` when none match. After completing each step, report progress before \
moving to the next one.\n\n{}",
        serde_json::to_string_pretty(&body).unwrap_or_default()
    )
}

/// Union of every tool name an agent exposes via static configuration or an
/// enabled MCP server, for the workflow prompt's tool allow-list.
pub fn flatten_tool_names(configured_tools: &[String], mcp_enabled_tools: &[String]) -> Vec<String> {
    let mut names: Vec<String> = configured_tools.iter().chain(mcp_enabled_tools.iter()).cloned().collect();
    names.sort();
    names.dedup();
    names
}

pub fn summarize(steps: &[Step]) -> WorkflowSummary {
    let mut renderer = Renderer { next_step_number: 1, summary: WorkflowSummary::default() };
    renderer.render_all(steps, 0);
    renderer.summary
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instruction(name: &str, tool: Option<&str>, children: Vec<Step>) -> Step {
        Step::Instruction { name: name.into(), description: None, tool: tool.map(String::from), children }
    }

    #[test]
    fn placeholder_start_is_filtered_from_top_level_numbering() {
        let steps = vec![
            instruction("Start", None, vec![]),
            instruction("Fetch data", Some("http_get"), vec![]),
        ];
        let summary = summarize(&steps);
        assert_eq!(summary.total_steps, 1);
    }

    #[test]
    fn nested_start_named_step_is_not_filtered() {
        let steps = vec![instruction(
            "Top",
            None,
            vec![instruction("Start", None, vec![])],
        )];
        let summary = summarize(&steps);
        assert_eq!(summary.total_steps, 2);
    }

    #[test]
    fn conditions_are_counted_and_flagged() {
        let steps = vec![Step::Condition {
            condition_kind: ConditionKind::If,
            expression: Some("x > 0".into()),
            children: vec![instruction("Branch step", None, vec![])],
        }];
        let summary = summarize(&steps);
        assert_eq!(summary.total_conditions, 1);
        assert!(summary.has_conditional_logic);
        assert_eq!(summary.total_steps, 1);
    }

    #[test]
    fn max_nesting_depth_counts_the_deepest_branch() {
        let steps = vec![instruction(
            "a",
            None,
            vec![instruction("b", None, vec![instruction("c", None, vec![])])],
        )];
        let summary = summarize(&steps);
        assert_eq!(summary.max_nesting_depth, 2);
    }

    #[test]
    fn render_wraps_json_in_fixed_instructional_prose() {
        let steps = vec![instruction("Send email", Some("send_email"), vec![])];
        let prompt = render_workflow_prompt(&steps);
        assert!(prompt.starts_with("You are executing a structured workflow."));
        assert!(prompt.contains("\"step_number\": 1"));
        assert!(prompt.contains("send_email"));
    }

    #[test]
    fn flatten_tool_names_dedupes_and_sorts() {
        let names = flatten_tool_names(&["b".into(), "a".into()], &["a".into(), "c".into()]);
        assert_eq!(names, vec!["a".to_string(), "b".to_string(), "c".to_string()]);
    }
}
