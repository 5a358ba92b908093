mod cli;
mod prompts;

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use clap::Parser;
use colored::{ColoredString, Colorize};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use crm_core::ai::prompts::format_usd;
use crm_core::ai::DisabledEnricher;
use crm_core::db::{create_backend, export_to_json, import_from_json, migrate};
use crm_core::{
    default_config_path, enricher_or_unavailable, BackendType, Contact, ContactPatch, CrmConfig,
    DashboardStats, DatabaseBackend, Deal, DealEnricher, DealPatch, DealStatus, DealWorkflow,
    EmailGateway, EnrichmentStatus, EntityId, NewContact, NewDeal, NewTask, ProviderSettings,
    RelatedType, Stores, Task, TaskPatch, TaskUrgency, ValidationErrors,
};

use crate::cli::{Cli, Command, ContactCommand, DataCommand, DealCommand, TaskCommand};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = run(&cli);
    if let Err(err) = &result {
        if let Some(errors) = err.downcast_ref::<ValidationErrors>() {
            print_validation_errors(errors);
            std::process::exit(1);
        }
    }
    result
}

fn run(cli: &Cli) -> Result<()> {
    let config = load_config(cli)?;
    let data_path = config.data_path()?;
    let backend = create_backend(&data_path, config.backend)?;
    tracing::debug!(
        location = %backend.location(),
        backend = %backend.backend_type(),
        "opened data store"
    );

    let stores = Stores::new(backend.clone(), config.latency.latency());
    stores.init()?;

    match &cli.command {
        Command::Contact(cmd) => handle_contact_command(cmd, &stores),
        Command::Deal(cmd) => handle_deal_command(cmd, &stores, &config),
        Command::Task(cmd) => handle_task_command(cmd, &stores),
        Command::Dashboard => show_dashboard(&stores),
        Command::Data(cmd) => handle_data_command(cmd, backend.as_ref()),
        Command::Email {
            deal,
            value,
            contact,
        } => draft_email(&config, deal, value, contact),
    }
}

/// Config file, then `AUTOCRM_*` variables, then command-line flags
fn load_config(cli: &Cli) -> Result<CrmConfig> {
    let path = match &cli.config {
        Some(path) => path.clone(),
        None => default_config_path()?,
    };

    let mut config = CrmConfig::load_or_create(&path)?;
    config.apply_env()?;

    if let Some(data) = &cli.data {
        config.data_path = Some(data.clone());
    }
    if let Some(backend) = &cli.backend {
        config.backend = Some(backend.parse()?);
    }
    if let Some(latency) = &cli.latency {
        config.latency = latency.parse()?;
    }
    Ok(config)
}

fn print_validation_errors(errors: &ValidationErrors) {
    println!("{}", "Please fix the following:".red());
    for (field, message) in errors.iter() {
        println!("  {}: {}", field.yellow(), message);
    }
}

// =========================================================================
// Parsing helpers
// =========================================================================

fn parse_id(id_str: &str) -> Result<EntityId> {
    id_str
        .trim()
        .parse()
        .with_context(|| format!("Invalid ID '{}': expected a number", id_str))
}

fn parse_date(date_str: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(date_str.trim(), "%Y-%m-%d")
        .with_context(|| format!("Invalid date '{}': expected YYYY-MM-DD", date_str))
}

/// `--flag ""` clears an optional field, `--flag x` sets it
fn clearable(value: &Option<String>) -> Option<Option<String>> {
    value
        .as_ref()
        .map(|v| (!v.trim().is_empty()).then(|| v.clone()))
}

fn clearable_date(value: &Option<String>) -> Result<Option<Option<NaiveDate>>> {
    match clearable(value) {
        None => Ok(None),
        Some(None) => Ok(Some(None)),
        Some(Some(date)) => Ok(Some(Some(parse_date(&date)?))),
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max.saturating_sub(1)).collect();
        format!("{}…", cut)
    }
}

fn status_label(status: DealStatus) -> ColoredString {
    match status {
        DealStatus::Lead => "lead".blue(),
        DealStatus::Negotiation => "negotiation".yellow(),
        DealStatus::Won => "won".green(),
        DealStatus::Lost => "lost".red(),
    }
}

fn urgency_label(urgency: TaskUrgency) -> ColoredString {
    match urgency {
        TaskUrgency::Completed => "completed".green(),
        TaskUrgency::Overdue => "overdue".red(),
        TaskUrgency::DueToday => "due today".yellow(),
        TaskUrgency::Upcoming => "upcoming".normal(),
    }
}

fn contact_name(contacts: &[Contact], id: EntityId) -> String {
    contacts
        .iter()
        .find(|c| c.id == id)
        .map(|c| c.name.clone())
        .unwrap_or_else(|| "Unknown Contact".to_string())
}

fn related_name(task: &Task, contacts: &[Contact], deals: &[Deal]) -> String {
    let Some(id) = task.related_id else {
        return String::new();
    };
    match task.related_to {
        RelatedType::Contact => contact_name(contacts, id),
        RelatedType::Deal => deals
            .iter()
            .find(|d| d.id == id)
            .map(|d| d.name.clone())
            .unwrap_or_else(|| "Unknown Deal".to_string()),
    }
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

// =========================================================================
// Contacts
// =========================================================================

fn handle_contact_command(cmd: &ContactCommand, stores: &Stores) -> Result<()> {
    match cmd {
        ContactCommand::Add {
            name,
            company,
            email,
            phone,
            last_contact,
            interactive,
        } => {
            let draft = if *interactive || name.is_none() {
                prompts::prompt_new_contact()?
            } else {
                NewContact {
                    name: name.clone().unwrap_or_default(),
                    company: company.clone(),
                    email: email.clone(),
                    phone: phone.clone(),
                    last_contact_date: last_contact.as_deref().map(parse_date).transpose()?,
                }
            };

            let contact = stores.contacts.create(draft)?;
            println!(
                "{}",
                format!("Contact added with ID: {}", contact.id).green()
            );
        }
        ContactCommand::List => list_contacts(stores)?,
        ContactCommand::Show { id } => show_contact(stores, id)?,
        ContactCommand::Edit {
            id,
            name,
            company,
            email,
            phone,
            last_contact,
        } => {
            let id = parse_id(id)?;
            let contact = stores
                .contacts
                .get_by_id(id)?
                .context("Contact not found")?;

            let no_flags = name.is_none()
                && company.is_none()
                && email.is_none()
                && phone.is_none()
                && last_contact.is_none();

            let patch = if no_flags {
                prompts::prompt_edit_contact(&contact)?
            } else {
                ContactPatch {
                    name: name.clone(),
                    company: clearable(company),
                    email: clearable(email),
                    phone: clearable(phone),
                    last_contact_date: clearable_date(last_contact)?,
                }
            };

            stores
                .contacts
                .update(id, patch)?
                .context("Contact not found")?;
            println!("{}", "Contact updated successfully!".green());
        }
        ContactCommand::Del { id, yes } => {
            let id = parse_id(id)?;
            let contact = stores
                .contacts
                .get_by_id(id)?
                .context("Contact not found")?;

            println!("{}", "Contact to delete:".yellow());
            println!("  ID: {}", contact.id);
            println!("  Name: {}", contact.name);

            if !prompts::confirm_delete("contact", *yes)? {
                println!("{}", "Deletion cancelled.".yellow());
                return Ok(());
            }

            stores.contacts.delete(id)?;
            println!("{}", "Contact deleted successfully!".green());
        }
    }
    Ok(())
}

fn list_contacts(stores: &Stores) -> Result<()> {
    let contacts = stores.contacts.get_all()?;
    if contacts.is_empty() {
        println!("{}", "No contacts found.".yellow());
        return Ok(());
    }

    println!(
        "{:<5} | {:<24} | {:<24} | {:<30} | {:<16} | {:<12}",
        "ID", "Name", "Company", "Email", "Phone", "Last Contact"
    );
    println!("{}", "-".repeat(125));

    for contact in contacts {
        println!(
            "{:<5} | {:<24} | {:<24} | {:<30} | {:<16} | {:<12}",
            contact.id,
            truncate(&contact.name, 24),
            truncate(contact.company.as_deref().unwrap_or("-"), 24),
            truncate(contact.email.as_deref().unwrap_or("-"), 30),
            contact.phone.as_deref().unwrap_or("-"),
            contact
                .last_contact_date
                .map(|d| d.to_string())
                .unwrap_or_else(|| "-".to_string())
        );
    }
    Ok(())
}

fn show_contact(stores: &Stores, id_str: &str) -> Result<()> {
    let id = parse_id(id_str)?;
    let contact = stores
        .contacts
        .get_by_id(id)?
        .context("Contact not found")?;

    println!("{}: {}", "ID".blue(), contact.id);
    println!("{}: {}", "Name".blue(), contact.name);
    if let Some(company) = &contact.company {
        println!("{}: {}", "Company".blue(), company);
    }
    if let Some(email) = &contact.email {
        println!("{}: {}", "Email".blue(), email);
    }
    if let Some(phone) = &contact.phone {
        println!("{}: {}", "Phone".blue(), phone);
    }
    if let Some(date) = contact.last_contact_date {
        println!("{}: {}", "Last Contact".blue(), date);
    }
    println!("{}: {}", "Created".blue(), contact.created_at);

    let deals: Vec<Deal> = stores
        .deals
        .get_all()?
        .into_iter()
        .filter(|d| d.contact_id == contact.id)
        .collect();
    if !deals.is_empty() {
        println!("\n{}:", "Deals".blue());
        for deal in deals {
            println!(
                "  {} {} ({}, {})",
                deal.id,
                deal.name,
                format_usd(deal.value),
                status_label(deal.status)
            );
        }
    }
    Ok(())
}

// =========================================================================
// Deals
// =========================================================================

fn handle_deal_command(cmd: &DealCommand, stores: &Stores, config: &CrmConfig) -> Result<()> {
    match cmd {
        DealCommand::Add {
            name,
            contact,
            value,
            status,
            notes,
            interactive,
        } => {
            let draft = if *interactive || name.is_none() || contact.is_none() || value.is_none() {
                prompts::prompt_new_deal(&stores.contacts.get_all()?)?
            } else {
                NewDeal {
                    name: name.clone().unwrap_or_default(),
                    contact_id: contact.as_deref().map(parse_id).transpose()?,
                    value: value.unwrap_or_default(),
                    status: status
                        .as_deref()
                        .map(str::parse::<DealStatus>)
                        .transpose()?
                        .unwrap_or_default(),
                    notes: notes.clone(),
                }
            };

            let deal = stores.deals.create(draft)?;
            println!("{}", format!("Deal added with ID: {}", deal.id).green());
        }
        DealCommand::List { status } => list_deals(stores, status)?,
        DealCommand::Show { id } => show_deal(stores, id)?,
        DealCommand::Edit {
            id,
            name,
            contact,
            value,
            status,
            notes,
        } => {
            let id = parse_id(id)?;
            let deal = stores.deals.get_by_id(id)?.context("Deal not found")?;

            let no_flags = name.is_none()
                && contact.is_none()
                && value.is_none()
                && status.is_none()
                && notes.is_none();

            let patch = if no_flags {
                prompts::prompt_edit_deal(&deal, &stores.contacts.get_all()?)?
            } else {
                DealPatch {
                    name: name.clone(),
                    contact_id: contact.as_deref().map(parse_id).transpose()?,
                    value: *value,
                    status: status.as_deref().map(str::parse::<DealStatus>).transpose()?,
                    notes: Some(notes.clone().unwrap_or_else(|| deal.notes.clone())),
                }
            };

            edit_deal(stores, config, &deal, patch)?;
        }
        DealCommand::Del { id, yes } => {
            let id = parse_id(id)?;
            let deal = stores.deals.get_by_id(id)?.context("Deal not found")?;

            println!("{}", "Deal to delete:".yellow());
            println!("  ID: {}", deal.id);
            println!("  Name: {}", deal.name);
            println!("  Value: {}", format_usd(deal.value));

            if !prompts::confirm_delete("deal", *yes)? {
                println!("{}", "Deletion cancelled.".yellow());
                return Ok(());
            }

            stores.deals.delete(id)?;
            println!("{}", "Deal deleted successfully!".green());
        }
    }
    Ok(())
}

fn edit_deal(stores: &Stores, config: &CrmConfig, deal: &Deal, patch: DealPatch) -> Result<()> {
    let becomes_won = deal.status != DealStatus::Won && patch.status == Some(DealStatus::Won);

    // Only a transition into won needs a working enricher
    let enricher: Arc<dyn DealEnricher> = if becomes_won {
        enricher_or_unavailable(&config.enrichment)
    } else {
        Arc::new(DisabledEnricher)
    };

    let contact_id = patch.contact_id.unwrap_or(deal.contact_id);
    let contact = stores.contacts.get_by_id(contact_id)?;

    let workflow = DealWorkflow::new(stores.deals.clone(), enricher);
    let update = workflow
        .update_deal(deal.id, patch, contact.as_ref().map(|c| c.name.as_str()))?
        .context("Deal not found")?;

    println!("{}", "Deal updated successfully!".green());
    match update.enrichment {
        EnrichmentStatus::NotTriggered => {}
        EnrichmentStatus::Appended { model, tokens_used } => println!(
            "{}",
            format!(
                "Congratulatory email added to notes ({}, {} tokens)",
                model, tokens_used
            )
            .green()
        ),
        EnrichmentStatus::Failed { reason } => {
            println!("{}", format!("Email not generated: {}", reason).dimmed())
        }
    }
    Ok(())
}

fn list_deals(stores: &Stores, status: &Option<String>) -> Result<()> {
    let mut deals = stores.deals.get_all()?;
    if let Some(status_str) = status {
        let status_filter: DealStatus = status_str.parse()?;
        deals.retain(|d| d.status == status_filter);
    }

    if deals.is_empty() {
        println!("{}", "No deals found.".yellow());
        return Ok(());
    }

    let contacts = stores.contacts.get_all()?;

    println!(
        "{:<5} | {:<30} | {:<22} | {:>14} | {:<12} | {:<10}",
        "ID", "Name", "Contact", "Value", "Status", "Updated"
    );
    println!("{}", "-".repeat(110));

    for deal in deals {
        println!(
            "{:<5} | {:<30} | {:<22} | {:>14} | {:<12} | {:<10}",
            deal.id,
            truncate(&deal.name, 30),
            truncate(&contact_name(&contacts, deal.contact_id), 22),
            format_usd(deal.value),
            status_label(deal.status),
            deal.updated_at.format("%Y-%m-%d")
        );
    }
    Ok(())
}

fn show_deal(stores: &Stores, id_str: &str) -> Result<()> {
    let id = parse_id(id_str)?;
    let deal = stores.deals.get_by_id(id)?.context("Deal not found")?;
    let contacts = stores.contacts.get_all()?;

    println!("{}: {}", "ID".blue(), deal.id);
    println!("{}: {}", "Name".blue(), deal.name);
    println!(
        "{}: {} (ID {})",
        "Contact".blue(),
        contact_name(&contacts, deal.contact_id),
        deal.contact_id
    );
    println!("{}: {}", "Value".blue(), format_usd(deal.value));
    println!("{}: {}", "Status".blue(), status_label(deal.status));
    println!("{}: {}", "Created".blue(), deal.created_at);
    println!("{}: {}", "Updated".blue(), deal.updated_at);
    if !deal.notes.is_empty() {
        println!("{}:", "Notes".blue());
        println!("{}", deal.notes);
    }
    Ok(())
}

// =========================================================================
// Tasks
// =========================================================================

fn handle_task_command(cmd: &TaskCommand, stores: &Stores) -> Result<()> {
    match cmd {
        TaskCommand::Add {
            description,
            due,
            related_to,
            related_id,
            interactive,
        } => {
            let draft = if *interactive || description.is_none() || due.is_none() {
                prompts::prompt_new_task(&stores.contacts.get_all()?, &stores.deals.get_all()?)?
            } else {
                NewTask {
                    description: description.clone().unwrap_or_default(),
                    due_date: due.as_deref().map(parse_date).transpose()?,
                    completed: false,
                    related_to: related_to
                        .as_deref()
                        .map(str::parse::<RelatedType>)
                        .transpose()?
                        .unwrap_or_default(),
                    related_id: related_id.as_deref().map(parse_id).transpose()?,
                }
            };

            let task = stores.tasks.create(draft)?;
            println!("{}", format!("Task added with ID: {}", task.id).green());
        }
        TaskCommand::List { pending, overdue } => list_tasks(stores, *pending, *overdue)?,
        TaskCommand::Show { id } => show_task(stores, id)?,
        TaskCommand::Edit {
            id,
            description,
            due,
            related_to,
            related_id,
        } => {
            let id = parse_id(id)?;
            let task = stores.tasks.get_by_id(id)?.context("Task not found")?;

            let no_flags = description.is_none()
                && due.is_none()
                && related_to.is_none()
                && related_id.is_none();

            let patch = if no_flags {
                prompts::prompt_edit_task(
                    &task,
                    &stores.contacts.get_all()?,
                    &stores.deals.get_all()?,
                )?
            } else {
                let related_id = match clearable(related_id) {
                    None => None,
                    Some(None) => Some(None),
                    Some(Some(value)) => Some(Some(parse_id(&value)?)),
                };
                TaskPatch {
                    description: description.clone(),
                    due_date: due.as_deref().map(parse_date).transpose()?,
                    completed: None,
                    related_to: related_to
                        .as_deref()
                        .map(str::parse::<RelatedType>)
                        .transpose()?,
                    related_id,
                }
            };

            stores.tasks.update(id, patch)?.context("Task not found")?;
            println!("{}", "Task updated successfully!".green());
        }
        TaskCommand::Toggle { id } => {
            let id = parse_id(id)?;
            let task = stores.tasks.get_by_id(id)?.context("Task not found")?;
            let updated = stores
                .tasks
                .update(
                    id,
                    TaskPatch {
                        completed: Some(!task.completed),
                        ..Default::default()
                    },
                )?
                .context("Task not found")?;

            if updated.completed {
                println!("{}", "Task marked as completed.".green());
            } else {
                println!("{}", "Task marked as pending.".yellow());
            }
        }
        TaskCommand::Del { id, yes } => {
            let id = parse_id(id)?;
            let task = stores.tasks.get_by_id(id)?.context("Task not found")?;

            println!("{}", "Task to delete:".yellow());
            println!("  ID: {}", task.id);
            println!("  Description: {}", task.description);

            if !prompts::confirm_delete("task", *yes)? {
                println!("{}", "Deletion cancelled.".yellow());
                return Ok(());
            }

            stores.tasks.delete(id)?;
            println!("{}", "Task deleted successfully!".green());
        }
    }
    Ok(())
}

fn list_tasks(stores: &Stores, pending: bool, overdue: bool) -> Result<()> {
    let today = today();
    let mut tasks = stores.tasks.get_all()?;
    if pending {
        tasks.retain(|t| !t.completed);
    }
    if overdue {
        tasks.retain(|t| t.urgency(today) == TaskUrgency::Overdue);
    }

    if tasks.is_empty() {
        println!("{}", "No tasks found.".yellow());
        return Ok(());
    }

    let contacts = stores.contacts.get_all()?;
    let deals = stores.deals.get_all()?;

    println!(
        "{:<5} | {:<36} | {:<10} | {:<10} | {:<8} | {:<24}",
        "ID", "Description", "Due", "Status", "Type", "Related To"
    );
    println!("{}", "-".repeat(110));

    for task in tasks {
        println!(
            "{:<5} | {:<36} | {:<10} | {:<10} | {:<8} | {:<24}",
            task.id,
            truncate(&task.description, 36),
            task.due_date,
            urgency_label(task.urgency(today)),
            task.related_to,
            truncate(&related_name(&task, &contacts, &deals), 24)
        );
    }
    Ok(())
}

fn show_task(stores: &Stores, id_str: &str) -> Result<()> {
    let id = parse_id(id_str)?;
    let task = stores.tasks.get_by_id(id)?.context("Task not found")?;
    let contacts = stores.contacts.get_all()?;
    let deals = stores.deals.get_all()?;

    println!("{}: {}", "ID".blue(), task.id);
    println!("{}: {}", "Description".blue(), task.description);
    println!("{}: {}", "Due".blue(), task.due_date);
    println!("{}: {}", "Status".blue(), urgency_label(task.urgency(today())));
    if task.related_id.is_some() {
        println!(
            "{}: {} {}",
            "Related To".blue(),
            task.related_to,
            related_name(&task, &contacts, &deals)
        );
    }
    println!("{}: {}", "Created".blue(), task.created_at);
    Ok(())
}

// =========================================================================
// Dashboard, data and email
// =========================================================================

fn show_dashboard(stores: &Stores) -> Result<()> {
    let contacts = stores.contacts.get_all()?;
    let deals = stores.deals.get_all()?;
    let tasks = stores.tasks.get_all()?;
    let stats = DashboardStats::compute(&contacts, &deals, &tasks, today());

    println!("{}", "Dashboard".bold());
    println!("{}", "-".repeat(40));
    println!("{:<20} {}", "Total Contacts", stats.total_contacts);
    println!("{:<20} {}", "Active Deals", stats.active_deals);
    println!("{:<20} {}", "Total Deal Value", format_usd(stats.pipeline_value));
    println!("{:<20} {}", "Pending Tasks", stats.pending_tasks);
    println!();
    println!("{} deals won", stats.won_deals.to_string().green());
    if stats.overdue_tasks > 0 {
        println!("{} tasks overdue", stats.overdue_tasks.to_string().red());
    }
    Ok(())
}

fn handle_data_command(cmd: &DataCommand, backend: &dyn DatabaseBackend) -> Result<()> {
    match cmd {
        DataCommand::Export { file } => {
            let count = export_to_json(backend, file)?;
            println!(
                "{}",
                format!("Exported {} collections to {}", count, file.display()).green()
            );
        }
        DataCommand::Import { file, yes } => {
            if !*yes {
                let message = format!(
                    "Replace the collections in {} with {}?",
                    backend.location(),
                    file.display()
                );
                if !inquire::Confirm::new(&message).with_default(false).prompt()? {
                    println!("{}", "Import cancelled.".yellow());
                    return Ok(());
                }
            }
            let count = import_from_json(file, backend)?;
            println!("{}", format!("Imported {} collections", count).green());
        }
        DataCommand::Migrate { to, to_backend } => {
            let target_type = to_backend
                .as_deref()
                .map(str::parse::<BackendType>)
                .transpose()?;
            let target = create_backend(to, target_type)?;
            let count = migrate(backend, target.as_ref())?;
            println!(
                "{}",
                format!(
                    "Copied {} collections from {} ({}) to {} ({})",
                    count,
                    backend.location(),
                    backend.backend_type(),
                    target.location(),
                    target.backend_type()
                )
                .green()
            );
        }
        DataCommand::Stats => {
            let stats = backend.stats()?;
            println!("{}: {}", "Backend".blue(), stats.backend_type);
            println!("{}: {}", "Location".blue(), backend.location());
            for (key, count) in stats.collections {
                println!("  {:<20} {} records", key, count);
            }
        }
    }
    Ok(())
}

fn draft_email(config: &CrmConfig, deal: &str, value: &str, contact: &str) -> Result<()> {
    let gateway = EmailGateway::new(ProviderSettings::from_config(&config.enrichment))?;
    let body = serde_json::json!({
        "dealName": deal,
        "dealValue": value,
        "contactName": contact,
    });

    let response = gateway.handle("POST", &body.to_string());
    if response.status != 200 {
        anyhow::bail!(
            "{} (HTTP {})",
            response.body.error.unwrap_or_default(),
            response.status
        );
    }

    if let Some(metadata) = &response.body.metadata {
        println!(
            "{}",
            format!("{} · {} tokens", metadata.model, metadata.tokens_used).dimmed()
        );
    }
    println!("{}", response.body.email.unwrap_or_default());
    Ok(())
}
