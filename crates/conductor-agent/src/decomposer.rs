use crate::backends::ReasoningBackend;
use async_trait::async_trait;
use conductor_core::{Agent, ConductorError, ConductorResult};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// A plan as returned by a decomposer, before validation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawPlan {
    /// Tasks as returned by the collaborator.
    #[serde(default)]
    pub tasks: Vec<RawPlannedTask>,
    /// Planner reasoning, if any.
    #[serde(default)]
    pub reasoning: Option<String>,
}

/// A task as proposed by the collaborator, before validation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawPlannedTask {
    /// Short task name.
    #[serde(default)]
    pub title: String,
    /// What the agent should do.
    #[serde(default)]
    pub description: String,
    /// Roster agent id, as text.
    #[serde(default, alias = "agentId")]
    pub agent_id: Option<String>,
    /// 1-based position in the run.
    #[serde(default)]
    pub order: Option<i64>,
}

/// A validated task ready to be persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedTask {
    /// Short task name.
    pub title: String,
    /// What the agent should do.
    pub description: String,
    /// Assigned roster agent.
    pub agent_id: Uuid,
    /// 1-based position in the run.
    pub order: u32,
}

/// A validated plan, tasks sorted by `order`.
#[derive(Debug, Clone)]
pub struct DecompositionPlan {
    /// Validated tasks, sorted by order.
    pub tasks: Vec<PlannedTask>,
    /// Planner reasoning, if any.
    pub reasoning: Option<String>,
}

/// Turns a goal and an agent roster into an ordered plan.
#[async_trait]
pub trait Decomposer: Send + Sync {
    /// Propose tasks for `goal` using only agents from `agents`.
    async fn decompose(&self, goal: &str, agents: &[Agent]) -> ConductorResult<RawPlan>;
}

/// Wraps a [`Decomposer`] and rejects plans that would break job invariants.
pub struct GoalDecomposer {
    inner: Arc<dyn Decomposer>,
}

impl GoalDecomposer {
    /// Wrap `inner` with plan validation.
    pub fn new(inner: Arc<dyn Decomposer>) -> Self {
        Self { inner }
    }

    /// Decompose `goal` for `agents` and validate the result.
    pub async fn decompose(
        &self,
        goal: &str,
        agents: &[Agent],
    ) -> ConductorResult<DecompositionPlan> {
        if agents.is_empty() {
            return Err(ConductorError::Decomposition(
                "job has no agents to assign tasks to".into(),
            ));
        }
        let raw = self.inner.decompose(goal, agents).await.map_err(|e| match e {
            ConductorError::Decomposition(_) => e,
            other => ConductorError::Decomposition(other.to_string()),
        })?;
        let plan = Self::validate(raw, agents)?;
        info!(tasks = plan.tasks.len(), "Goal decomposed");
        Ok(plan)
    }

    /// Check every task references a roster agent and that orders are
    /// positive and unique. Returns the tasks sorted by order.
    pub fn validate(raw: RawPlan, agents: &[Agent]) -> ConductorResult<DecompositionPlan> {
        let roster: HashSet<Uuid> = agents.iter().map(|a| a.id).collect();
        let mut seen_orders = HashSet::new();
        let mut tasks = Vec::with_capacity(raw.tasks.len());

        for (i, t) in raw.tasks.into_iter().enumerate() {
            let title = t.title.trim().to_string();
            if title.is_empty() {
                return Err(ConductorError::Decomposition(format!(
                    "task #{} has an empty title",
                    i + 1
                )));
            }

            let agent_id = t
                .agent_id
                .as_deref()
                .and_then(|s| Uuid::parse_str(s.trim()).ok())
                .filter(|id| roster.contains(id))
                .ok_or_else(|| {
                    ConductorError::Decomposition(format!(
                        "task '{title}' references unknown agent {:?}",
                        t.agent_id
                    ))
                })?;

            let order = t
                .order
                .filter(|o| *o >= 1)
                .and_then(|o| u32::try_from(o).ok())
                .ok_or_else(|| {
                    ConductorError::Decomposition(format!(
                        "task '{title}' has invalid order {:?}",
                        t.order
                    ))
                })?;
            if !seen_orders.insert(order) {
                return Err(ConductorError::Decomposition(format!(
                    "duplicate task order {order}"
                )));
            }

            tasks.push(PlannedTask {
                title,
                description: t.description,
                agent_id,
                order,
            });
        }

        tasks.sort_by_key(|t| t.order);
        Ok(DecompositionPlan {
            tasks,
            reasoning: raw.reasoning,
        })
    }
}

const DECOMPOSE_INSTRUCTIONS: &str = "You are a planning assistant. Break the user's goal into \
an ordered list of tasks and assign each task to exactly one of the listed agents. \
Respond with a single JSON object and nothing else, in the form \
{\"reasoning\": \"...\", \"tasks\": [{\"title\": \"...\", \"description\": \"...\", \
\"agent_id\": \"<agent uuid>\", \"order\": 1}]}. Orders start at 1 and must be unique.";

/// Asks a [`ReasoningBackend`] for a JSON plan.
pub struct LlmDecomposer {
    backend: Arc<dyn ReasoningBackend>,
}

impl LlmDecomposer {
    /// Plan with `backend`.
    pub fn new(backend: Arc<dyn ReasoningBackend>) -> Self {
        Self { backend }
    }

    fn build_prompt(goal: &str, agents: &[Agent]) -> String {
        let mut prompt = format!("## Goal\n{goal}\n\n## Agents\n");
        for a in agents {
            prompt.push_str(&format!("- id: {}\n  name: {}\n", a.id, a.name));
            if !a.description.is_empty() {
                prompt.push_str(&format!("  description: {}\n", a.description));
            }
            if !a.tool_ids.is_empty() {
                prompt.push_str(&format!("  tools: {}\n", a.tool_ids.join(", ")));
            }
        }
        prompt
    }
}

#[async_trait]
impl Decomposer for LlmDecomposer {
    async fn decompose(&self, goal: &str, agents: &[Agent]) -> ConductorResult<RawPlan> {
        let completion = self
            .backend
            .complete(DECOMPOSE_INSTRUCTIONS, &Self::build_prompt(goal, agents))
            .await?;
        let mut plan = parse_plan(&completion.text)?;
        if plan.reasoning.is_none() {
            plan.reasoning = completion.reasoning;
        }
        Ok(plan)
    }
}

/// Extract the JSON object from model output, tolerating code fences and
/// surrounding prose.
pub fn parse_plan(text: &str) -> ConductorResult<RawPlan> {
    let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) else {
        warn!("Decomposer output contained no JSON object");
        return Err(ConductorError::Decomposition(
            "model output contained no JSON object".into(),
        ));
    };
    if end < start {
        return Err(ConductorError::Decomposition(
            "model output contained no JSON object".into(),
        ));
    }
    serde_json::from_str(&text[start..=end])
        .map_err(|e| ConductorError::Decomposition(format!("invalid plan JSON: {e}")))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::backends::{Completion, ReasoningOutput, ReasoningRequest};
    use conductor_skills::ToolSession;

    fn roster() -> Vec<Agent> {
        vec![
            Agent::new("Researcher", "Research"),
            Agent::new("Writer", "Write"),
        ]
    }

    fn raw_task(title: &str, agent: &Agent, order: i64) -> RawPlannedTask {
        RawPlannedTask {
            title: title.into(),
            description: String::new(),
            agent_id: Some(agent.id.to_string()),
            order: Some(order),
        }
    }

    #[test]
    fn test_validate_sorts_by_order() {
        let agents = roster();
        let raw = RawPlan {
            tasks: vec![
                raw_task("Write", &agents[1], 2),
                raw_task("Research", &agents[0], 1),
            ],
            reasoning: Some("two steps".into()),
        };
        let plan = GoalDecomposer::validate(raw, &agents).unwrap();
        assert_eq!(plan.tasks[0].title, "Research");
        assert_eq!(plan.tasks[1].agent_id, agents[1].id);
        assert_eq!(plan.reasoning.as_deref(), Some("two steps"));
    }

    #[test]
    fn test_validate_rejects_unknown_agent() {
        let agents = roster();
        let mut t = raw_task("Research", &agents[0], 1);
        t.agent_id = Some(Uuid::new_v4().to_string());
        let raw = RawPlan {
            tasks: vec![t],
            reasoning: None,
        };
        assert!(matches!(
            GoalDecomposer::validate(raw, &agents),
            Err(ConductorError::Decomposition(_))
        ));
    }

    #[test]
    fn test_validate_rejects_bad_orders_and_titles() {
        let agents = roster();
        let dup = RawPlan {
            tasks: vec![
                raw_task("A", &agents[0], 1),
                raw_task("B", &agents[1], 1),
            ],
            reasoning: None,
        };
        assert!(GoalDecomposer::validate(dup, &agents).is_err());

        let zero = RawPlan {
            tasks: vec![raw_task("A", &agents[0], 0)],
            reasoning: None,
        };
        assert!(GoalDecomposer::validate(zero, &agents).is_err());

        let untitled = RawPlan {
            tasks: vec![raw_task("  ", &agents[0], 1)],
            reasoning: None,
        };
        assert!(GoalDecomposer::validate(untitled, &agents).is_err());
    }

    #[test]
    fn test_parse_plan_tolerates_code_fences() {
        let text = "Here you go:\n```json\n{\"reasoning\": \"r\", \"tasks\": [{\"title\": \"T\", \"agentId\": \"x\", \"order\": 1}]}\n```";
        let plan = parse_plan(text).unwrap();
        assert_eq!(plan.tasks.len(), 1);
        assert_eq!(plan.tasks[0].agent_id.as_deref(), Some("x"));
        assert!(parse_plan("no json here").is_err());
    }

    struct PlanningBackend {
        reply: String,
    }

    #[async_trait]
    impl ReasoningBackend for PlanningBackend {
        async fn complete(&self, system: &str, prompt: &str) -> ConductorResult<Completion> {
            assert!(system.contains("JSON"));
            assert!(prompt.contains("## Agents"));
            Ok(Completion {
                text: self.reply.clone(),
                reasoning: Some("model trace".into()),
            })
        }

        async fn execute_with_tools(
            &self,
            _request: &ReasoningRequest,
            _tools: &dyn ToolSession,
        ) -> ConductorResult<ReasoningOutput> {
            unreachable!("decomposition never calls tools")
        }
    }

    #[tokio::test]
    async fn test_llm_decomposer_end_to_end() {
        let agents = roster();
        let reply = serde_json::json!({
            "tasks": [
                {"title": "Draft", "description": "Write it", "agent_id": agents[1].id, "order": 2},
                {"title": "Gather", "description": "Find facts", "agent_id": agents[0].id, "order": 1},
            ]
        })
        .to_string();
        let decomposer = GoalDecomposer::new(Arc::new(LlmDecomposer::new(Arc::new(
            PlanningBackend { reply },
        ))));

        let plan = decomposer.decompose("Write a report", &agents).await.unwrap();
        assert_eq!(plan.tasks.len(), 2);
        assert_eq!(plan.tasks[0].title, "Gather");
        assert_eq!(plan.reasoning.as_deref(), Some("model trace"));
    }

    #[tokio::test]
    async fn test_backend_errors_become_decomposition_errors() {
        struct Broken;

        #[async_trait]
        impl Decomposer for Broken {
            async fn decompose(&self, _goal: &str, _agents: &[Agent]) -> ConductorResult<RawPlan> {
                Err(ConductorError::Http("connection refused".into()))
            }
        }

        let decomposer = GoalDecomposer::new(Arc::new(Broken));
        let err = decomposer.decompose("g", &roster()).await.unwrap_err();
        assert!(matches!(err, ConductorError::Decomposition(msg) if msg.contains("refused")));
    }
}
