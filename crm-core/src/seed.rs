//! Bundled demo dataset written on first access to an empty backend.

pub const CONTACTS: &str = include_str!("../seed/contacts.json");
pub const DEALS: &str = include_str!("../seed/deals.json");
pub const TASKS: &str = include_str!("../seed/tasks.json");

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Contact, Deal, DealStatus, Task};

    #[test]
    fn test_seed_data_parses() {
        let contacts: Vec<Contact> = serde_json::from_str(CONTACTS).unwrap();
        let deals: Vec<Deal> = serde_json::from_str(DEALS).unwrap();
        let tasks: Vec<Task> = serde_json::from_str(TASKS).unwrap();

        assert_eq!(contacts.len(), 5);
        assert_eq!(deals.len(), 5);
        assert_eq!(tasks.len(), 6);
        assert!(deals.iter().any(|d| d.status == DealStatus::Won));
        assert!(tasks.iter().any(|t| t.related_id.is_none()));
    }
}
