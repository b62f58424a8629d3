//! Built-in demo datasets served when no credential is present.
//!
//! The fixtures are a small but fully connected workspace: every reference
//! column points at rows that exist, except where a dangling or blank
//! reference is deliberate (`task_004`).

use serde_json::{Value, json};

use super::{Credential, DatasetSource};
use crate::core::HydrantError;
use crate::dataset::{DatasetKey, Record, Row, index_records};

/// Read-only preview data for every dataset.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixtureSource;

impl FixtureSource {
    /// Raw records of `key`, in table order.
    #[must_use]
    pub fn records(self, key: DatasetKey) -> Vec<Record> {
        let table = match key {
            DatasetKey::People => json!([
                {"User_id": "user_001", "full_name": "Maya Chen", "email": "maya.chen@example.com",
                 "role": "Head of Growth", "manager_User_id": "", "business_unit_id": "bu_01"},
                {"User_id": "user_002", "full_name": "Diego Alvarez", "email": "diego.alvarez@example.com",
                 "role": "Platform Lead", "manager_User_id": "user_001", "business_unit_id": "bu_02"},
                {"User_id": "user_003", "full_name": "Arun Nair", "email": "arun.nair@example.com",
                 "role": "Product Designer", "manager_User_id": "user_001", "business_unit_id": "bu_01"},
                {"User_id": "user_004", "full_name": "Lena Fischer", "email": "lena.fischer@example.com",
                 "role": "Data Engineer", "manager_User_id": "user_002", "business_unit_id": "bu_02"}
            ]),
            DatasetKey::BusinessUnits => json!([
                {"bu_id": "bu_01", "bu_name": "Growth", "owner_User_id": "user_001"},
                {"bu_id": "bu_02", "bu_name": "Platform", "owner_User_id": "user_002"}
            ]),
            DatasetKey::Clients => json!([
                {"client_id": "cl_001", "client_name": "Northwind Traders", "tier": "Enterprise",
                 "account_manager_User_id": "user_002"},
                {"client_id": "cl_002", "client_name": "Contoso", "tier": "Growth",
                 "account_manager_User_id": "user_004"}
            ]),
            DatasetKey::Projects => json!([
                {"project_id": "proj_001", "Project Name": "Onboarding Revamp", "status": "Active",
                 "owner_User_id": "user_001", "business_unit_id": "bu_01", "client_id": "cl_001"},
                {"project_id": "proj_002", "Project Name": "Data Platform Migration", "status": "Active",
                 "owner_User_id": "user_002", "business_unit_id": "bu_02", "client_id": "cl_002"},
                {"project_id": "proj_003", "Project Name": "Website Redesign", "status": "Planning",
                 "owner_User_id": "user_003", "business_unit_id": "bu_01", "client_id": "cl_001"}
            ]),
            DatasetKey::Tasks => json!([
                {"task_id": "task_001", "title": "Draft sitemap", "Project id": "proj_003",
                 "assignee_User_id": "user_003", "reporter_User_id": "user_001",
                 "collaborator_User_ids": "user_002, user_004", "status": "In Progress",
                 "due_date": "2026-11-02"},
                {"task_id": "task_002", "title": "Migrate billing tables", "Project id": "proj_002",
                 "assignee_User_id": "user_002", "reporter_User_id": "user_004",
                 "collaborator_User_ids": "", "status": "Open", "due_date": "2026-11-15"},
                {"task_id": "task_003", "title": "Kickoff workshop", "Project id": "proj_001",
                 "assignee_User_id": "user_004", "reporter_User_id": "user_001",
                 "collaborator_User_ids": "user_001", "status": "Done", "due_date": "2026-10-01"},
                {"task_id": "task_004", "title": "Accessibility audit", "Project id": "proj_003",
                 "assignee_User_id": "", "reporter_User_id": "user_003",
                 "collaborator_User_ids": "007", "status": "Open", "due_date": ""}
            ]),
            DatasetKey::Flywheels => json!([
                {"flywheel_id": "fw_01", "flywheel_name": "Referral Loop",
                 "owner_User_id": "user_001", "business_unit_id": "bu_01"},
                {"flywheel_id": "fw_02", "flywheel_name": "Content Engine",
                 "owner_User_id": "user_003", "business_unit_id": "bu_01"}
            ]),
            DatasetKey::Campaigns => json!([
                {"campaign_id": "camp_001", "campaign_name": "Autumn Launch", "channel": "Email",
                 "Project id": "proj_003", "flywheel_id": "fw_02", "owner_User_id": "user_003"},
                {"campaign_id": "camp_002", "campaign_name": "Partner Webinar", "channel": "Events",
                 "Project id": "proj_001", "flywheel_id": "fw_01", "owner_User_id": "user_004"}
            ]),
        };

        match table {
            Value::Array(rows) => rows
                .into_iter()
                .filter_map(|row| match row {
                    Value::Object(record) => Some(record),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Indexed rows of `key`.
    #[must_use]
    pub fn rows(self, key: DatasetKey) -> Vec<Row> {
        index_records(self.records(key))
    }
}

impl DatasetSource for FixtureSource {
    async fn fetch_records(
        &self,
        key: DatasetKey,
        _credential: &Credential,
    ) -> Result<Vec<Record>, HydrantError> {
        Ok(self.records(key))
    }
}
