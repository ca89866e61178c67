//! Workflow records: `/api/workflows[/{id}]`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::ApiError;
use super::gateway::Gateway;

const WORKFLOWS_PATH: &str = "/api/workflows";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowStatus {
    Active,
    Completed,
    Pending,
}

impl WorkflowStatus {
    pub const ALL: [WorkflowStatus; 3] = [
        WorkflowStatus::Active,
        WorkflowStatus::Completed,
        WorkflowStatus::Pending,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            WorkflowStatus::Active => "active",
            WorkflowStatus::Completed => "completed",
            WorkflowStatus::Pending => "pending",
        }
    }
}

impl fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkflowStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "active" => Ok(WorkflowStatus::Active),
            "completed" => Ok(WorkflowStatus::Completed),
            "pending" => Ok(WorkflowStatus::Pending),
            other => Err(format!(
                "unknown workflow status '{other}' (expected active, completed or pending)"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workflow {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub status: WorkflowStatus,
    #[serde(default)]
    pub created_by: String,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
}

/// Body of a create request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewWorkflow {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<WorkflowStatus>,
}

/// Partial update; unset fields are left untouched by the backend.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<WorkflowStatus>,
}

impl WorkflowPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.description.is_none() && self.status.is_none()
    }
}

/// Case-insensitive substring match on name or description.
///
/// A blank term matches everything.
pub fn filter_workflows<'a>(workflows: &'a [Workflow], term: &str) -> Vec<&'a Workflow> {
    let needle = term.trim().to_lowercase();
    workflows
        .iter()
        .filter(|w| {
            needle.is_empty()
                || w.name.to_lowercase().contains(&needle)
                || w.description.to_lowercase().contains(&needle)
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct WorkflowsApi {
    gateway: Gateway,
}

impl WorkflowsApi {
    pub fn new(gateway: Gateway) -> Self {
        Self { gateway }
    }

    fn item_path(id: &str) -> String {
        format!("{WORKFLOWS_PATH}/{}", urlencoding::encode(id))
    }

    /// # Errors
    /// See [`ApiError`].
    pub async fn list(&self) -> Result<Vec<Workflow>, ApiError> {
        self.gateway.get(WORKFLOWS_PATH).await
    }

    /// # Errors
    /// See [`ApiError`].
    pub async fn get(&self, id: &str) -> Result<Workflow, ApiError> {
        self.gateway.get(&Self::item_path(id)).await
    }

    /// # Errors
    /// See [`ApiError`].
    pub async fn create(&self, workflow: &NewWorkflow) -> Result<Workflow, ApiError> {
        self.gateway.post(WORKFLOWS_PATH, workflow).await
    }

    /// # Errors
    /// See [`ApiError`].
    pub async fn update(&self, id: &str, patch: &WorkflowPatch) -> Result<Workflow, ApiError> {
        self.gateway.patch(&Self::item_path(id), patch).await
    }

    /// # Errors
    /// See [`ApiError`].
    pub async fn delete(&self, id: &str) -> Result<(), ApiError> {
        self.gateway.delete(&Self::item_path(id)).await
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::session::SessionStore;

    fn workflow(id: &str, name: &str, description: &str) -> Workflow {
        Workflow {
            id: id.to_string(),
            name: name.to_string(),
            description: description.to_string(),
            status: WorkflowStatus::Active,
            created_by: "a@b.com".to_string(),
            created_at: "2024-01-01T00:00:00Z".to_string(),
            updated_at: "2024-01-02T00:00:00Z".to_string(),
        }
    }

    fn api(server: &MockServer) -> WorkflowsApi {
        let store = SessionStore::in_memory();
        store.set_token("abc");
        WorkflowsApi::new(Gateway::new(&server.uri(), store))
    }

    #[test]
    fn test_status_parse_and_display() {
        assert_eq!("Active".parse::<WorkflowStatus>(), Ok(WorkflowStatus::Active));
        assert_eq!(" pending ".parse::<WorkflowStatus>(), Ok(WorkflowStatus::Pending));
        assert!("archived".parse::<WorkflowStatus>().is_err());
        for status in WorkflowStatus::ALL {
            assert_eq!(status.to_string().parse::<WorkflowStatus>(), Ok(status));
        }
    }

    #[test]
    fn test_filter_workflows() {
        let items = vec![
            workflow("1", "Invoice approval", "Finance sign-off"),
            workflow("2", "Onboarding", "New hire INVOICE setup"),
            workflow("3", "Travel", "Expense claims"),
        ];

        let ids = |found: Vec<&Workflow>| found.iter().map(|w| w.id.clone()).collect::<Vec<_>>();
        assert_eq!(ids(filter_workflows(&items, "invoice")), vec!["1", "2"]);
        assert_eq!(ids(filter_workflows(&items, "EXPENSE")), vec!["3"]);
        assert_eq!(ids(filter_workflows(&items, "  ")), vec!["1", "2", "3"]);
        assert!(filter_workflows(&items, "payroll").is_empty());
    }

    #[test]
    fn test_workflow_json_is_camel_case() {
        let value = serde_json::to_value(workflow("1", "n", "d")).unwrap();
        assert_eq!(value["createdBy"], "a@b.com");
        assert_eq!(value["status"], "active");

        let patch = WorkflowPatch {
            status: Some(WorkflowStatus::Completed),
            ..Default::default()
        };
        assert_eq!(serde_json::to_value(&patch).unwrap(), json!({"status": "completed"}));
        assert!(WorkflowPatch::default().is_empty());
    }

    #[tokio::test]
    async fn test_crud_round_trip_against_backend() {
        let server = MockServer::start().await;
        let stored = json!({
            "id": "7", "name": "Invoice approval", "description": "",
            "status": "pending", "createdBy": "a@b.com",
            "createdAt": "2024-01-01T00:00:00Z", "updatedAt": "2024-01-01T00:00:00Z"
        });
        Mock::given(method("GET"))
            .and(path("/api/workflows"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([stored.clone()])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/workflows/7"))
            .respond_with(ResponseTemplate::new(200).set_body_json(stored.clone()))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/workflows"))
            .and(body_json(json!({"name": "Invoice approval", "status": "pending"})))
            .respond_with(ResponseTemplate::new(201).set_body_json(stored.clone()))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PATCH"))
            .and(path("/api/workflows/7"))
            .and(body_json(json!({"status": "active"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "7", "name": "Invoice approval", "status": "active"
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/api/workflows/7"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let api = api(&server);
        assert_eq!(api.list().await.unwrap().len(), 1);
        assert_eq!(api.get("7").await.unwrap().status, WorkflowStatus::Pending);

        let created = api
            .create(&NewWorkflow {
                name: "Invoice approval".to_string(),
                description: None,
                status: Some(WorkflowStatus::Pending),
            })
            .await
            .unwrap();
        assert_eq!(created.id, "7");

        let updated = api
            .update(
                "7",
                &WorkflowPatch {
                    status: Some(WorkflowStatus::Active),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.status, WorkflowStatus::Active);
        assert!(updated.created_by.is_empty());

        api.delete("7").await.unwrap();
    }

    #[tokio::test]
    async fn test_item_ids_are_escaped() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/workflows/a%2Fb"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({"message": "Not found"})))
            .expect(1)
            .mount(&server)
            .await;

        let err = api(&server).get("a/b").await.unwrap_err();
        assert_eq!(err.server_message(), Some("Not found"));
    }

    #[tokio::test]
    async fn test_item_id_spaces_stay_in_path() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/api/workflows/a%20b"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/api/workflows/a+b"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        api(&server).delete("a b").await.unwrap();
    }
}
