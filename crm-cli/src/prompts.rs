use anyhow::Result;
use chrono::NaiveDate;
use colored::Colorize;
use inquire::{Confirm, CustomType, Select, Text};

use crm_core::{
    Contact, ContactPatch, Deal, DealPatch, DealStatus, EntityId, NewContact, NewDeal, NewTask,
    RelatedType, Task, TaskPatch,
};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Asks for a date until the answer parses. Empty input is `None` when
/// `optional` is set
fn prompt_date(message: &str, default: Option<NaiveDate>, optional: bool) -> Result<Option<NaiveDate>> {
    let default_text = default.map(|d| d.format(DATE_FORMAT).to_string());
    loop {
        let mut prompt = Text::new(message).with_help_message("YYYY-MM-DD");
        if let Some(text) = &default_text {
            prompt = prompt.with_default(text);
        }

        let input = prompt.prompt()?;
        let input = input.trim();
        if input.is_empty() && optional {
            return Ok(None);
        }
        match NaiveDate::parse_from_str(input, DATE_FORMAT) {
            Ok(date) => return Ok(Some(date)),
            Err(_) => println!("{}", "Please enter a date as YYYY-MM-DD".red()),
        }
    }
}

fn optional_text(message: &str, current: Option<&str>) -> Result<Option<String>> {
    let input = Text::new(message)
        .with_default(current.unwrap_or(""))
        .prompt()?;
    let trimmed = input.trim();
    Ok((!trimmed.is_empty()).then(|| trimmed.to_string()))
}

/// Lets the user pick a contact; returns its identifier
fn select_contact(contacts: &[Contact], current: Option<EntityId>) -> Result<EntityId> {
    if contacts.is_empty() {
        anyhow::bail!("No contacts found. Add a contact first.");
    }

    let options: Vec<String> = contacts
        .iter()
        .map(|c| match &c.company {
            Some(company) => format!("{} - {} ({})", c.id, c.name, company),
            None => format!("{} - {}", c.id, c.name),
        })
        .collect();
    let cursor = current
        .and_then(|id| contacts.iter().position(|c| c.id == id))
        .unwrap_or(0);

    let selection = Select::new("Contact:", options)
        .with_starting_cursor(cursor)
        .raw_prompt()?;
    Ok(contacts[selection.index].id)
}

fn select_status(current: DealStatus) -> Result<DealStatus> {
    let cursor = DealStatus::ALL
        .iter()
        .position(|s| *s == current)
        .unwrap_or(0);
    Ok(Select::new("Status:", DealStatus::ALL.to_vec())
        .with_starting_cursor(cursor)
        .prompt()?)
}

/// Prompts the user for a new contact
pub fn prompt_new_contact() -> Result<NewContact> {
    let name = Text::new("Name:").prompt()?;
    let company = optional_text("Company:", None)?;
    let email = optional_text("Email:", None)?;
    let phone = optional_text("Phone:", None)?;
    let last_contact_date = prompt_date("Last contact date (optional):", None, true)?;

    Ok(NewContact {
        name,
        company,
        email,
        phone,
        last_contact_date,
    })
}

/// Prompts for every contact field, pre-filled with the current values
pub fn prompt_edit_contact(contact: &Contact) -> Result<ContactPatch> {
    println!("Editing contact: {}", contact.name);

    let name = Text::new("Name:").with_default(&contact.name).prompt()?;
    Ok(ContactPatch {
        name: Some(name),
        company: Some(optional_text("Company:", contact.company.as_deref())?),
        email: Some(optional_text("Email:", contact.email.as_deref())?),
        phone: Some(optional_text("Phone:", contact.phone.as_deref())?),
        last_contact_date: Some(prompt_date(
            "Last contact date (optional):",
            contact.last_contact_date,
            true,
        )?),
    })
}

/// Prompts the user for a new deal
pub fn prompt_new_deal(contacts: &[Contact]) -> Result<NewDeal> {
    let name = Text::new("Deal name:").prompt()?;
    let contact_id = select_contact(contacts, None)?;
    let value = CustomType::<f64>::new("Value (USD):")
        .with_error_message("Please enter a number")
        .prompt()?;
    let status = select_status(DealStatus::Lead)?;
    let notes = optional_text("Notes:", None)?;

    Ok(NewDeal {
        name,
        contact_id: Some(contact_id),
        value,
        status,
        notes,
    })
}

/// Prompts for every deal field, pre-filled with the current values
pub fn prompt_edit_deal(deal: &Deal, contacts: &[Contact]) -> Result<DealPatch> {
    println!("Editing deal: {}", deal.name);

    let name = Text::new("Deal name:").with_default(&deal.name).prompt()?;
    let contact_id = if contacts.is_empty() {
        deal.contact_id
    } else {
        select_contact(contacts, Some(deal.contact_id))?
    };
    let value = CustomType::<f64>::new("Value (USD):")
        .with_default(deal.value)
        .with_error_message("Please enter a number")
        .prompt()?;
    let status = select_status(deal.status)?;

    let notes = if Confirm::new("Edit notes?").with_default(false).prompt()? {
        inquire::Editor::new("Notes:")
            .with_predefined_text(&deal.notes)
            .prompt()?
    } else {
        deal.notes.clone()
    };

    Ok(DealPatch {
        name: Some(name),
        contact_id: Some(contact_id),
        value: Some(value),
        status: Some(status),
        notes: Some(notes),
    })
}

fn select_related_to(current: RelatedType) -> Result<RelatedType> {
    let options = vec![RelatedType::Contact, RelatedType::Deal];
    let cursor = options.iter().position(|r| *r == current).unwrap_or(0);
    Ok(Select::new("Related to:", options)
        .with_starting_cursor(cursor)
        .prompt()?)
}

fn prompt_related_id(
    related_to: RelatedType,
    contacts: &[Contact],
    deals: &[Deal],
    current: Option<EntityId>,
) -> Result<Option<EntityId>> {
    let mut options = vec!["(none)".to_string()];
    let ids: Vec<EntityId> = match related_to {
        RelatedType::Contact => {
            options.extend(contacts.iter().map(|c| format!("{} - {}", c.id, c.name)));
            contacts.iter().map(|c| c.id).collect()
        }
        RelatedType::Deal => {
            options.extend(deals.iter().map(|d| format!("{} - {}", d.id, d.name)));
            deals.iter().map(|d| d.id).collect()
        }
    };
    let cursor = current
        .and_then(|id| ids.iter().position(|i| *i == id))
        .map_or(0, |i| i + 1);

    let selection = Select::new("Related record:", options)
        .with_starting_cursor(cursor)
        .raw_prompt()?;
    Ok(selection.index.checked_sub(1).map(|i| ids[i]))
}

/// Prompts the user for a new task
pub fn prompt_new_task(contacts: &[Contact], deals: &[Deal]) -> Result<NewTask> {
    let description = Text::new("Description:").prompt()?;
    let due_date = prompt_date("Due date:", None, false)?;
    let related_to = select_related_to(RelatedType::Contact)?;
    let related_id = prompt_related_id(related_to, contacts, deals, None)?;

    Ok(NewTask {
        description,
        due_date,
        completed: false,
        related_to,
        related_id,
    })
}

/// Prompts for every task field, pre-filled with the current values
pub fn prompt_edit_task(task: &Task, contacts: &[Contact], deals: &[Deal]) -> Result<TaskPatch> {
    println!("Editing task: {}", task.description);

    let description = Text::new("Description:")
        .with_default(&task.description)
        .prompt()?;
    let due_date = prompt_date("Due date:", Some(task.due_date), false)?;
    let completed = Confirm::new("Completed?")
        .with_default(task.completed)
        .prompt()?;
    let related_to = select_related_to(task.related_to)?;
    let related_id = prompt_related_id(related_to, contacts, deals, task.related_id)?;

    Ok(TaskPatch {
        description: Some(description),
        due_date,
        completed: Some(completed),
        related_to: Some(related_to),
        related_id: Some(related_id),
    })
}

/// Asks before deleting; `--yes` skips the question
pub fn confirm_delete(kind: &str, skip_confirm: bool) -> Result<bool> {
    if skip_confirm {
        return Ok(true);
    }
    let message = format!("Are you sure you want to delete this {}?", kind);
    Ok(Confirm::new(&message).with_default(false).prompt()?)
}
