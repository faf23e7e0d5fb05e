use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// A user record exposed by the users API.
///
/// Immutable value; the directories holding these are built once at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
}

impl User {
    #[must_use]
    pub fn new(id: i64, name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            email: email.into(),
        }
    }
}

/// Terminal status of an export task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExportStatus {
    Completed,
    Failed,
}

/// Terminal output of one long-running export run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportTask {
    pub task_id: i64,
    pub file_name: String,
    pub download_url: String,
    pub total_records: u64,
    pub status: ExportStatus,
    pub completed_at: NaiveDateTime,
    pub file_size_bytes: u64,
}

impl ExportTask {
    /// Builds a completed task for `file_name`, stamped with the local wall clock.
    ///
    /// The download URL is derived from the file name; the size is
    /// `total_records * bytes_per_record`.
    #[must_use]
    pub fn completed(
        task_id: i64,
        file_name: String,
        total_records: u64,
        bytes_per_record: u64,
    ) -> Self {
        let download_url = format!("/api/downloads/{file_name}");
        Self {
            task_id,
            file_name,
            download_url,
            total_records,
            status: ExportStatus::Completed,
            completed_at: Local::now().naive_local(),
            file_size_bytes: total_records.saturating_mul(bytes_per_record),
        }
    }
}

/// Role granted to an authenticated principal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "USER",
            Self::Admin => "ADMIN",
        }
    }

    /// Authority string in the `ROLE_` form reported by `/api/auth/me`.
    #[must_use]
    pub fn authority(self) -> String {
        format!("ROLE_{}", self.as_str())
    }
}

/// Authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    /// Login name the caller authenticated with.
    pub username: String,
    /// Roles assigned to this principal for authorization checks.
    pub roles: Vec<Role>,
}

impl Principal {
    #[must_use]
    pub fn new(username: impl Into<String>, roles: Vec<Role>) -> Self {
        Self {
            username: username.into(),
            roles,
        }
    }

    #[must_use]
    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn user_serializes_flat() {
        let user = User::new(1, "Alice", "alice@example.com");
        assert_eq!(
            serde_json::to_value(&user).unwrap(),
            json!({"id": 1, "name": "Alice", "email": "alice@example.com"})
        );
    }

    #[test]
    fn export_task_uses_camel_case_fields() {
        let task = ExportTask::completed(7, "user_export_7_1.csv".to_string(), 10, 50);
        let value = serde_json::to_value(&task).unwrap();
        assert_eq!(value["taskId"], 7);
        assert_eq!(value["fileName"], "user_export_7_1.csv");
        assert_eq!(value["downloadUrl"], "/api/downloads/user_export_7_1.csv");
        assert_eq!(value["totalRecords"], 10);
        assert_eq!(value["status"], "COMPLETED");
        assert_eq!(value["fileSizeBytes"], 500);
        assert!(value["completedAt"].is_string());
    }

    #[test]
    fn export_task_parses_back() {
        let task = ExportTask::completed(3, "batch_export_3_9.csv".to_string(), 10, 75);
        let text = serde_json::to_string(&task).unwrap();
        let parsed: ExportTask = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed, task);
    }

    #[test]
    fn failed_status_serializes_upper_case() {
        assert_eq!(
            serde_json::to_value(ExportStatus::Failed).unwrap(),
            json!("FAILED")
        );
    }

    #[test]
    fn role_authority_prefix() {
        assert_eq!(Role::Admin.authority(), "ROLE_ADMIN");
        assert_eq!(Role::User.as_str(), "USER");
    }

    #[test]
    fn principal_role_lookup() {
        let admin = Principal::new("admin", vec![Role::User, Role::Admin]);
        assert!(admin.has_role(Role::Admin));
        let user = Principal::new("user", vec![Role::User]);
        assert!(!user.has_role(Role::Admin));
    }
}
