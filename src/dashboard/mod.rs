pub mod buckets;
pub mod day_range;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use buckets::MonthBucket;

/// Label used when a grouped column is NULL.
pub const UNSPECIFIED: &str = "UNSPECIFIED";

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Kpis {
    #[schema(example = 1280)]
    pub total_students: i64,
    #[schema(example = 37)]
    pub pending_payments: i64,
    #[schema(example = 912)]
    pub approved_payments: i64,
    #[schema(example = 1004)]
    pub invoices_generated: i64,
    #[schema(example = 18)]
    pub active_employees: i64,
    #[schema(example = 9)]
    pub logins_today: i64,
}

/// `GROUP BY x` row: the group value and its row count.
#[derive(Debug, sqlx::FromRow)]
pub struct GroupCount {
    pub name: Option<String>,
    pub value: i64,
}

#[derive(Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct NamedCount {
    #[schema(example = "APPROVED")]
    pub name: String,
    #[schema(example = 12)]
    pub value: i64,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub kpis: Kpis,
    pub monthly_registrations: Vec<MonthBucket>,
    pub payment_status: Vec<NamedCount>,
    pub masters_distribution: Vec<NamedCount>,
}

pub fn named_counts(rows: Vec<GroupCount>) -> Vec<NamedCount> {
    rows.into_iter()
        .map(|row| NamedCount {
            name: row.name.unwrap_or_else(|| UNSPECIFIED.to_string()),
            value: row.value,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_rows_project_one_to_one() {
        let rows = vec![
            GroupCount { name: Some("PENDING".into()), value: 4 },
            GroupCount { name: None, value: 1 },
        ];

        assert_eq!(
            named_counts(rows),
            vec![
                NamedCount { name: "PENDING".into(), value: 4 },
                NamedCount { name: UNSPECIFIED.into(), value: 1 },
            ]
        );
    }
}
