//! Collaboration tools: comments and issue relations.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{page_size, register_tool, require_non_empty, ToolParams, ToolSpec, DEFAULT_PAGE_SIZE};
use crate::service::registry::ToolRegistry;
use crate::traits::TrackerApi;

pub static LIST_COMMENTS: ToolSpec = ToolSpec {
    name: "list_comments",
    description: "List comments on an issue",
    document: r"query ListComments($issueId: String!, $first: Int!) {
  issue(id: $issueId) {
    comments(first: $first) {
      nodes { id body createdAt user { id name } }
    }
  }
}",
    result_path: "issue.comments",
    entity: "issue",
};

pub static CREATE_COMMENT: ToolSpec = ToolSpec {
    name: "create_comment",
    description: "Add a comment to an issue",
    document: r"mutation CreateComment($input: CommentCreateInput!) {
  commentCreate(input: $input) {
    success
    comment { id body createdAt url }
  }
}",
    result_path: "commentCreate.comment",
    entity: "comment",
};

pub static LIST_ISSUE_RELATIONS: ToolSpec = ToolSpec {
    name: "list_issue_relations",
    description: "List blocking, duplicate and related links of an issue",
    document: r"query ListIssueRelations($issueId: String!) {
  issue(id: $issueId) {
    relations {
      nodes { id type relatedIssue { id identifier title } }
    }
  }
}",
    result_path: "issue.relations",
    entity: "issue",
};

pub static CREATE_ISSUE_RELATION: ToolSpec = ToolSpec {
    name: "create_issue_relation",
    description: "Link two issues as blocking, duplicate or related",
    document: r"mutation CreateIssueRelation($input: IssueRelationCreateInput!) {
  issueRelationCreate(input: $input) {
    success
    issueRelation { id type issue { id } relatedIssue { id } }
  }
}",
    result_path: "issueRelationCreate.issueRelation",
    entity: "issue relation",
};

pub(super) fn register(registry: &ToolRegistry, api: &Arc<dyn TrackerApi>) {
    register_tool::<ListCommentsParams>(registry, api, &LIST_COMMENTS);
    register_tool::<CreateCommentParams>(registry, api, &CREATE_COMMENT);
    register_tool::<IssueRelationsParams>(registry, api, &LIST_ISSUE_RELATIONS);
    register_tool::<CreateRelationParams>(registry, api, &CREATE_ISSUE_RELATION);
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ListCommentsParams {
    pub issue_id: String,
    pub first: Option<u32>,
}

impl ToolParams for ListCommentsParams {
    fn validate(&self) -> Result<(), String> {
        require_non_empty("issueId", &self.issue_id)?;
        page_size(self.first).map(|_| ())
    }

    fn variables(&self) -> Value {
        json!({
            "issueId": self.issue_id,
            "first": page_size(self.first).unwrap_or(DEFAULT_PAGE_SIZE),
        })
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateCommentParams {
    pub issue_id: String,
    pub body: String,
}

impl ToolParams for CreateCommentParams {
    fn validate(&self) -> Result<(), String> {
        require_non_empty("issueId", &self.issue_id)?;
        require_non_empty("body", &self.body)
    }

    fn variables(&self) -> Value {
        json!({ "input": self })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct IssueRelationsParams {
    pub issue_id: String,
}

impl ToolParams for IssueRelationsParams {
    fn validate(&self) -> Result<(), String> {
        require_non_empty("issueId", &self.issue_id)
    }

    fn variables(&self) -> Value {
        json!({ "issueId": self.issue_id })
    }
}

/// Kind of link between two issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RelationType {
    Blocks,
    Duplicate,
    Related,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateRelationParams {
    pub issue_id: String,
    pub related_issue_id: String,
    #[serde(rename = "type")]
    pub relation_type: RelationType,
}

impl ToolParams for CreateRelationParams {
    fn validate(&self) -> Result<(), String> {
        require_non_empty("issueId", &self.issue_id)?;
        require_non_empty("relatedIssueId", &self.related_issue_id)?;
        if self.issue_id == self.related_issue_id {
            return Err("an issue cannot be related to itself".to_string());
        }
        Ok(())
    }

    fn variables(&self) -> Value {
        json!({ "input": self })
    }
}

#[cfg(test)]
mod tests {
    use super::super::mock::{catalog, invoke, MockApi};
    use super::*;
    use crate::service::operation::OperationError;

    #[tokio::test]
    async fn create_comment_wraps_input() {
        let api = MockApi::replying(json!({
            "commentCreate": { "success": true, "comment": { "id": "c1", "body": "hi" } }
        }));
        let registry = catalog(&api);
        let out = invoke(&registry, "create_comment", json!({ "issueId": "i1", "body": "hi" }))
            .await
            .unwrap();
        assert_eq!(out["id"], "c1");
        assert_eq!(
            api.last_variables(),
            json!({ "input": { "issueId": "i1", "body": "hi" } })
        );
    }

    #[tokio::test]
    async fn create_comment_rejects_blank_body() {
        let api = MockApi::replying(json!({}));
        let registry = catalog(&api);
        let err = invoke(&registry, "create_comment", json!({ "issueId": "i1", "body": "  " }))
            .await
            .unwrap_err();
        assert!(matches!(err, OperationError::Validation { .. }));
    }

    #[tokio::test]
    async fn relation_type_is_a_closed_set() {
        let api = MockApi::replying(json!({
            "issueRelationCreate": { "success": true, "issueRelation": { "id": "r1", "type": "blocks" } }
        }));
        let registry = catalog(&api);

        invoke(
            &registry,
            "create_issue_relation",
            json!({ "issueId": "i1", "relatedIssueId": "i2", "type": "blocks" }),
        )
        .await
        .unwrap();
        assert_eq!(
            api.last_variables(),
            json!({ "input": { "issueId": "i1", "relatedIssueId": "i2", "type": "blocks" } })
        );

        let err = invoke(
            &registry,
            "create_issue_relation",
            json!({ "issueId": "i1", "relatedIssueId": "i2", "type": "parent" }),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, OperationError::Validation { .. }));
    }

    #[tokio::test]
    async fn self_relation_is_rejected() {
        let registry = catalog(&MockApi::replying(json!({})));
        let err = invoke(
            &registry,
            "create_issue_relation",
            json!({ "issueId": "i1", "relatedIssueId": "i1", "type": "related" }),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, OperationError::Validation { .. }));
    }

    #[tokio::test]
    async fn relations_of_missing_issue_are_not_found() {
        let registry = catalog(&MockApi::replying(json!({ "issue": null })));
        let err = invoke(&registry, "list_issue_relations", json!({ "issueId": "i404" }))
            .await
            .unwrap_err();
        assert!(matches!(err, OperationError::NotFound { .. }));
    }
}
