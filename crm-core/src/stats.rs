use chrono::NaiveDate;
use serde::Serialize;

use crate::models::{Contact, Deal, DealStatus, Task, TaskUrgency};

/// Totals shown on the dashboard
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_contacts: usize,
    /// Deals in lead or negotiation
    pub active_deals: usize,
    pub won_deals: usize,
    /// Sum of every deal value except lost deals
    pub pipeline_value: f64,
    pub pending_tasks: usize,
    pub overdue_tasks: usize,
}

impl DashboardStats {
    pub fn compute(contacts: &[Contact], deals: &[Deal], tasks: &[Task], today: NaiveDate) -> Self {
        Self {
            total_contacts: contacts.len(),
            active_deals: deals.iter().filter(|d| d.status.is_active()).count(),
            won_deals: deals
                .iter()
                .filter(|d| d.status == DealStatus::Won)
                .count(),
            pipeline_value: deals
                .iter()
                .filter(|d| d.status != DealStatus::Lost)
                .map(|d| d.value)
                .sum(),
            pending_tasks: tasks.iter().filter(|t| !t.completed).count(),
            overdue_tasks: tasks
                .iter()
                .filter(|t| t.urgency(today) == TaskUrgency::Overdue)
                .count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seed;

    #[test]
    fn test_stats_from_seed_data() {
        let contacts: Vec<Contact> = serde_json::from_str(seed::CONTACTS).unwrap();
        let deals: Vec<Deal> = serde_json::from_str(seed::DEALS).unwrap();
        let tasks: Vec<Task> = serde_json::from_str(seed::TASKS).unwrap();

        // Before any seeded due date
        let today = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        let stats = DashboardStats::compute(&contacts, &deals, &tasks, today);

        assert_eq!(stats.total_contacts, 5);
        assert_eq!(stats.active_deals, 3);
        assert_eq!(stats.won_deals, 1);
        assert_eq!(stats.pending_tasks, 4);
        assert_eq!(stats.overdue_tasks, 0);

        let expected: f64 = deals
            .iter()
            .filter(|d| d.status != DealStatus::Lost)
            .map(|d| d.value)
            .sum();
        assert_eq!(stats.pipeline_value, expected);
    }

    #[test]
    fn test_overdue_excludes_completed() {
        let tasks: Vec<Task> = serde_json::from_str(seed::TASKS).unwrap();
        let far_future = NaiveDate::from_ymd_opt(2100, 1, 1).unwrap();
        let stats = DashboardStats::compute(&[], &[], &tasks, far_future);
        assert_eq!(stats.overdue_tasks, stats.pending_tasks);
    }

    #[test]
    fn test_empty_collections() {
        let today = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        assert_eq!(
            DashboardStats::compute(&[], &[], &[], today),
            DashboardStats::default()
        );
    }
}
