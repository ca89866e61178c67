//! Backend HTTP API.

pub mod auth;
pub mod error;
pub mod gateway;
pub mod users;
pub mod workflows;

pub use auth::{AuthApi, SessionGrant};
pub use error::ApiError;
pub use gateway::Gateway;
pub use users::{UpdateUser, UsersApi};
pub use workflows::{
    NewWorkflow, Workflow, WorkflowPatch, WorkflowStatus, WorkflowsApi, filter_workflows,
};
