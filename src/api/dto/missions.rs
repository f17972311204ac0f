/*
 * Responsibility
 * - Missions request/response DTOs
 */
use serde::{Deserialize, Serialize};

use crate::repos::mission_repo::MissionRow;

#[derive(Debug, Deserialize)]
pub struct CreateMissionRequest {
    pub name: String,
    pub status: String,
}

impl CreateMissionRequest {
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.name.trim().is_empty() {
            return Err("name is required");
        }
        if self.status.trim().is_empty() {
            return Err("status is required");
        }

        Ok(())
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateMissionRequest {
    pub name: Option<String>,
    pub status: Option<String>,
}

impl UpdateMissionRequest {
    pub fn validate(&self) -> Result<(), &'static str> {
        if let Some(name) = &self.name
            && name.trim().is_empty()
        {
            return Err("name cannot be empty");
        }
        if let Some(status) = &self.status
            && status.trim().is_empty()
        {
            return Err("status cannot be empty");
        }

        Ok(())
    }
}

#[derive(Debug, Serialize)]
pub struct MissionResponse {
    pub id: i64,
    pub name: String,
    pub status: String,
}

impl From<MissionRow> for MissionResponse {
    fn from(row: MissionRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            status: row.status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_fields_are_rejected() {
        let create = CreateMissionRequest {
            name: " ".to_string(),
            status: "planned".to_string(),
        };
        assert_eq!(create.validate(), Err("name is required"));

        let update = UpdateMissionRequest {
            name: None,
            status: Some(String::new()),
        };
        assert_eq!(update.validate(), Err("status cannot be empty"));

        let noop = UpdateMissionRequest {
            name: None,
            status: None,
        };
        assert_eq!(noop.validate(), Ok(()));
    }
}
