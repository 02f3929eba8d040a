//! People and team tools.

use std::sync::Arc;

use super::{register_tool, IdParams, NoParams, PageParams, ToolSpec};
use crate::service::registry::ToolRegistry;
use crate::traits::TrackerApi;

pub static GET_VIEWER: ToolSpec = ToolSpec {
    name: "get_viewer",
    description: "The user the API key belongs to",
    document: r"query Viewer {
  viewer { id name displayName email admin }
}",
    result_path: "viewer",
    entity: "viewer",
};

pub static LIST_USERS: ToolSpec = ToolSpec {
    name: "list_users",
    description: "List users in the workspace",
    document: r"query ListUsers($first: Int!) {
  users(first: $first) {
    nodes { id name displayName email active }
    pageInfo { hasNextPage endCursor }
  }
}",
    result_path: "users",
    entity: "users",
};

pub static LIST_TEAMS: ToolSpec = ToolSpec {
    name: "list_teams",
    description: "List teams in the workspace",
    document: r"query ListTeams($first: Int!) {
  teams(first: $first) {
    nodes { id key name description }
    pageInfo { hasNextPage endCursor }
  }
}",
    result_path: "teams",
    entity: "teams",
};

pub static GET_TEAM: ToolSpec = ToolSpec {
    name: "get_team",
    description: "Fetch one team with its members and workflow states",
    document: r"query GetTeam($id: String!) {
  team(id: $id) {
    id key name description
    members { nodes { id name } }
    states { nodes { id name type position } }
  }
}",
    result_path: "team",
    entity: "team",
};

pub(super) fn register(registry: &ToolRegistry, api: &Arc<dyn TrackerApi>) {
    register_tool::<NoParams>(registry, api, &GET_VIEWER);
    register_tool::<PageParams>(registry, api, &LIST_USERS);
    register_tool::<PageParams>(registry, api, &LIST_TEAMS);
    register_tool::<IdParams>(registry, api, &GET_TEAM);
}
