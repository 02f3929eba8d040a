//! Issue tools: list, fetch, search, create, update, archive.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use super::{
    check_priority, id_filter, page_size, register_tool, require_non_empty, IdParams, ToolParams,
    ToolSpec, DEFAULT_PAGE_SIZE,
};
use crate::service::registry::ToolRegistry;
use crate::traits::TrackerApi;

// ---------------------------------------------------------------------------
// Documents
// ---------------------------------------------------------------------------

pub static LIST_ISSUES: ToolSpec = ToolSpec {
    name: "list_issues",
    description: "List issues, optionally filtered by team, assignee or workflow state",
    document: r"query ListIssues($first: Int!, $after: String, $filter: IssueFilter, $includeArchived: Boolean) {
  issues(first: $first, after: $after, filter: $filter, includeArchived: $includeArchived) {
    nodes {
      id identifier title priority url createdAt updatedAt
      state { id name type }
      assignee { id name }
      team { id key }
    }
    pageInfo { hasNextPage endCursor }
  }
}",
    result_path: "issues",
    entity: "issues",
};

pub static GET_ISSUE: ToolSpec = ToolSpec {
    name: "get_issue",
    description: "Fetch one issue by id or identifier (e.g. ENG-123)",
    document: r"query GetIssue($id: String!) {
  issue(id: $id) {
    id identifier title description priority url createdAt updatedAt
    state { id name type }
    assignee { id name email }
    team { id key name }
    project { id name }
    cycle { id number }
    parent { id identifier }
    labels { nodes { id name } }
  }
}",
    result_path: "issue",
    entity: "issue",
};

pub static SEARCH_ISSUES: ToolSpec = ToolSpec {
    name: "search_issues",
    description: "Full-text search over issue titles and descriptions",
    document: r"query SearchIssues($term: String!, $first: Int!) {
  searchIssues(term: $term, first: $first) {
    nodes {
      id identifier title priority url
      state { id name }
      team { id key }
    }
  }
}",
    result_path: "searchIssues",
    entity: "issues",
};

pub static CREATE_ISSUE: ToolSpec = ToolSpec {
    name: "create_issue",
    description: "Create an issue in a team",
    document: r"mutation CreateIssue($input: IssueCreateInput!) {
  issueCreate(input: $input) {
    success
    issue { id identifier title url team { id key } }
  }
}",
    result_path: "issueCreate.issue",
    entity: "issue",
};

pub static UPDATE_ISSUE: ToolSpec = ToolSpec {
    name: "update_issue",
    description: "Update fields of an existing issue",
    document: r"mutation UpdateIssue($id: String!, $input: IssueUpdateInput!) {
  issueUpdate(id: $id, input: $input) {
    success
    issue { id identifier title priority url state { id name } }
  }
}",
    result_path: "issueUpdate.issue",
    entity: "issue",
};

pub static ARCHIVE_ISSUE: ToolSpec = ToolSpec {
    name: "archive_issue",
    description: "Archive an issue",
    document: r"mutation ArchiveIssue($id: String!) {
  issueArchive(id: $id) { success }
}",
    result_path: "issueArchive",
    entity: "issue",
};

pub(super) fn register(registry: &ToolRegistry, api: &Arc<dyn TrackerApi>) {
    register_tool::<ListIssuesParams>(registry, api, &LIST_ISSUES);
    register_tool::<IdParams>(registry, api, &GET_ISSUE);
    register_tool::<SearchIssuesParams>(registry, api, &SEARCH_ISSUES);
    register_tool::<CreateIssueParams>(registry, api, &CREATE_ISSUE);
    register_tool::<UpdateIssueParams>(registry, api, &UPDATE_ISSUE);
    register_tool::<IdParams>(registry, api, &ARCHIVE_ISSUE);
}

// ---------------------------------------------------------------------------
// Parameters
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ListIssuesParams {
    pub first: Option<u32>,
    pub after: Option<String>,
    pub team_id: Option<String>,
    pub assignee_id: Option<String>,
    pub state_id: Option<String>,
    pub include_archived: Option<bool>,
}

impl ToolParams for ListIssuesParams {
    fn validate(&self) -> Result<(), String> {
        page_size(self.first).map(|_| ())
    }

    fn variables(&self) -> Value {
        let mut filter = Map::new();
        if let Some(id) = &self.team_id {
            filter.insert("team".into(), id_filter(id));
        }
        if let Some(id) = &self.assignee_id {
            filter.insert("assignee".into(), id_filter(id));
        }
        if let Some(id) = &self.state_id {
            filter.insert("state".into(), id_filter(id));
        }
        json!({
            "first": page_size(self.first).unwrap_or(DEFAULT_PAGE_SIZE),
            "after": self.after,
            "filter": if filter.is_empty() { Value::Null } else { Value::Object(filter) },
            "includeArchived": self.include_archived.unwrap_or(false),
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SearchIssuesParams {
    pub query: String,
    pub first: Option<u32>,
}

impl ToolParams for SearchIssuesParams {
    fn validate(&self) -> Result<(), String> {
        require_non_empty("query", &self.query)?;
        page_size(self.first).map(|_| ())
    }

    fn variables(&self) -> Value {
        json!({
            "term": self.query,
            "first": page_size(self.first).unwrap_or(DEFAULT_PAGE_SIZE),
        })
    }
}

/// Serialized verbatim as `IssueCreateInput`; absent options are omitted.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateIssueParams {
    pub title: String,
    pub team_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignee_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label_ids: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cycle_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
}

impl ToolParams for CreateIssueParams {
    fn validate(&self) -> Result<(), String> {
        require_non_empty("title", &self.title)?;
        require_non_empty("teamId", &self.team_id)?;
        check_priority(self.priority)
    }

    fn variables(&self) -> Value {
        json!({ "input": self })
    }
}

/// `id` addresses the issue; every other field is a change. `removedLabelIds`
/// is accepted for compatibility and not applied.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateIssueParams {
    #[serde(skip_serializing)]
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignee_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label_ids: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub added_label_ids: Option<Vec<String>>,
    #[serde(skip_serializing)]
    pub removed_label_ids: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cycle_id: Option<String>,
}

impl ToolParams for UpdateIssueParams {
    fn validate(&self) -> Result<(), String> {
        require_non_empty("id", &self.id)?;
        if let Some(title) = &self.title {
            require_non_empty("title", title)?;
        }
        check_priority(self.priority)
    }

    fn variables(&self) -> Value {
        if let Some(ids) = &self.removed_label_ids {
            tracing::debug!(count = ids.len(), "removedLabelIds accepted but not applied");
        }
        json!({ "id": self.id, "input": self })
    }
}
