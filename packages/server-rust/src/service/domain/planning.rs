//! Planning and lookup tools: cycles, projects, labels, workflow states.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::{json, Value};

use super::{
    id_filter, page_size, register_tool, require_non_empty, IdParams, PageParams, ToolParams,
    ToolSpec, DEFAULT_PAGE_SIZE,
};
use crate::service::registry::ToolRegistry;
use crate::traits::TrackerApi;

pub static LIST_CYCLES: ToolSpec = ToolSpec {
    name: "list_cycles",
    description: "List a team's cycles",
    document: r"query ListCycles($teamId: String!, $first: Int!) {
  team(id: $teamId) {
    cycles(first: $first) {
      nodes { id number name startsAt endsAt completedAt progress }
    }
  }
}",
    result_path: "team.cycles",
    entity: "team",
};

pub static LIST_PROJECTS: ToolSpec = ToolSpec {
    name: "list_projects",
    description: "List projects in the workspace",
    document: r"query ListProjects($first: Int!) {
  projects(first: $first) {
    nodes { id name state progress targetDate url }
    pageInfo { hasNextPage endCursor }
  }
}",
    result_path: "projects",
    entity: "projects",
};

pub static GET_PROJECT: ToolSpec = ToolSpec {
    name: "get_project",
    description: "Fetch one project with its teams and lead",
    document: r"query GetProject($id: String!) {
  project(id: $id) {
    id name description state progress startDate targetDate url
    lead { id name }
    teams { nodes { id key } }
  }
}",
    result_path: "project",
    entity: "project",
};

pub static LIST_LABELS: ToolSpec = ToolSpec {
    name: "list_labels",
    description: "List issue labels, optionally for one team",
    document: r"query ListLabels($first: Int!, $filter: IssueLabelFilter) {
  issueLabels(first: $first, filter: $filter) {
    nodes { id name color team { id } }
  }
}",
    result_path: "issueLabels",
    entity: "labels",
};

pub static LIST_WORKFLOW_STATES: ToolSpec = ToolSpec {
    name: "list_workflow_states",
    description: "List workflow states, optionally for one team",
    document: r"query ListWorkflowStates($filter: WorkflowStateFilter) {
  workflowStates(filter: $filter) {
    nodes { id name type position team { id key } }
  }
}",
    result_path: "workflowStates",
    entity: "workflow states",
};

pub(super) fn register(registry: &ToolRegistry, api: &Arc<dyn TrackerApi>) {
    register_tool::<ListCyclesParams>(registry, api, &LIST_CYCLES);
    register_tool::<PageParams>(registry, api, &LIST_PROJECTS);
    register_tool::<IdParams>(registry, api, &GET_PROJECT);
    register_tool::<ListLabelsParams>(registry, api, &LIST_LABELS);
    register_tool::<ListWorkflowStatesParams>(registry, api, &LIST_WORKFLOW_STATES);
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ListCyclesParams {
    pub team_id: String,
    pub first: Option<u32>,
}

impl ToolParams for ListCyclesParams {
    fn validate(&self) -> Result<(), String> {
        require_non_empty("teamId", &self.team_id)?;
        page_size(self.first).map(|_| ())
    }

    fn variables(&self) -> Value {
        json!({
            "teamId": self.team_id,
            "first": page_size(self.first).unwrap_or(DEFAULT_PAGE_SIZE),
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ListLabelsParams {
    pub team_id: Option<String>,
    pub first: Option<u32>,
}

impl ToolParams for ListLabelsParams {
    fn validate(&self) -> Result<(), String> {
        page_size(self.first).map(|_| ())
    }

    fn variables(&self) -> Value {
        json!({
            "first": page_size(self.first).unwrap_or(DEFAULT_PAGE_SIZE),
            "filter": team_filter(self.team_id.as_deref()),
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ListWorkflowStatesParams {
    pub team_id: Option<String>,
}

impl ToolParams for ListWorkflowStatesParams {
    fn variables(&self) -> Value {
        json!({ "filter": team_filter(self.team_id.as_deref()) })
    }
}

fn team_filter(team_id: Option<&str>) -> Value {
    team_id.map_or(Value::Null, |id| json!({ "team": id_filter(id) }))
}

#[cfg(test)]
mod tests {
    use super::super::mock::{catalog, invoke, MockApi};
    use super::*;
    use crate::service::operation::OperationError;

    #[tokio::test]
    async fn list_cycles_reads_nested_connection() {
        let api = MockApi::replying(json!({
            "team": { "cycles": { "nodes": [{ "id": "c1", "number": 4 }] } }
        }));
        let registry = catalog(&api);
        let out = invoke(&registry, "list_cycles", json!({ "teamId": "t1", "first": 3 }))
            .await
            .unwrap();
        assert_eq!(out["nodes"][0]["number"], 4);
        assert_eq!(api.last_variables(), json!({ "teamId": "t1", "first": 3 }));
    }

    #[tokio::test]
    async fn list_cycles_for_missing_team_is_not_found() {
        let registry = catalog(&MockApi::replying(json!({ "team": null })));
        let err = invoke(&registry, "list_cycles", json!({ "teamId": "nope" }))
            .await
            .unwrap_err();
        assert!(matches!(err, OperationError::NotFound { ref entity } if entity == "team"));
    }

    #[tokio::test]
    async fn labels_filter_by_team_only_when_given() {
        let api = MockApi::replying(json!({ "issueLabels": { "nodes": [] } }));
        let registry = catalog(&api);

        invoke(&registry, "list_labels", json!({})).await.unwrap();
        assert!(api.last_variables()["filter"].is_null());

        invoke(&registry, "list_labels", json!({ "teamId": "t1" })).await.unwrap();
        assert_eq!(api.last_variables()["filter"], json!({ "team": { "id": { "eq": "t1" } } }));
    }

    #[tokio::test]
    async fn workflow_states_take_optional_team() {
        let api = MockApi::replying(json!({ "workflowStates": { "nodes": [] } }));
        let registry = catalog(&api);
        invoke(&registry, "list_workflow_states", json!({ "teamId": "t2" }))
            .await
            .unwrap();
        assert_eq!(api.last_variables()["filter"]["team"]["id"]["eq"], "t2");
    }
}
