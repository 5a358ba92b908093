use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(author, version, about = "A small CRM for contacts, deals and tasks")]
pub struct Cli {
    /// Data directory (JSON backend) or database file (SQLite backend)
    #[clap(long, global = true)]
    pub data: Option<PathBuf>,

    /// Storage backend (json, sqlite, memory)
    #[clap(long, global = true)]
    pub backend: Option<String>,

    /// Path to the config file
    #[clap(long, global = true)]
    pub config: Option<PathBuf>,

    /// Simulated store latency (none, demo)
    #[clap(long, global = true)]
    pub latency: Option<String>,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum ContactCommand {
    /// Add a new contact
    Add {
        /// Full name
        #[clap(long)]
        name: Option<String>,

        #[clap(long)]
        company: Option<String>,

        #[clap(long)]
        email: Option<String>,

        #[clap(long)]
        phone: Option<String>,

        /// Date of the last contact (YYYY-MM-DD)
        #[clap(long)]
        last_contact: Option<String>,

        /// Use interactive mode (prompts)
        #[clap(long)]
        interactive: bool,
    },

    /// List all contacts
    List,

    /// Show details for a specific contact
    Show {
        /// The ID of the contact to show
        id: String,
    },

    /// Edit an existing contact (prompts when no field is given)
    Edit {
        /// The ID of the contact to edit
        id: String,

        #[clap(long)]
        name: Option<String>,

        /// New company, empty to clear
        #[clap(long)]
        company: Option<String>,

        /// New email, empty to clear
        #[clap(long)]
        email: Option<String>,

        /// New phone, empty to clear
        #[clap(long)]
        phone: Option<String>,

        /// Date of the last contact (YYYY-MM-DD), empty to clear
        #[clap(long)]
        last_contact: Option<String>,
    },

    /// Delete a contact
    Del {
        /// The ID of the contact to delete
        id: String,

        /// Skip confirmation prompt
        #[clap(long, short = 'y')]
        yes: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum DealCommand {
    /// Add a new deal
    Add {
        /// Name of the deal
        #[clap(long)]
        name: Option<String>,

        /// ID of the contact the deal belongs to
        #[clap(long)]
        contact: Option<String>,

        /// Deal value in USD
        #[clap(long)]
        value: Option<f64>,

        /// Status of the deal (lead, negotiation, won, lost)
        #[clap(long)]
        status: Option<String>,

        #[clap(long)]
        notes: Option<String>,

        /// Use interactive mode (prompts)
        #[clap(long)]
        interactive: bool,
    },

    /// List all deals
    List {
        /// Filter by status
        #[clap(long)]
        status: Option<String>,
    },

    /// Show details for a specific deal
    Show {
        /// The ID of the deal to show
        id: String,
    },

    /// Edit an existing deal (prompts when no field is given).
    /// Moving a deal to "won" drafts a congratulatory email into its notes
    Edit {
        /// The ID of the deal to edit
        id: String,

        #[clap(long)]
        name: Option<String>,

        /// ID of the contact the deal belongs to
        #[clap(long)]
        contact: Option<String>,

        #[clap(long)]
        value: Option<f64>,

        /// New status (lead, negotiation, won, lost)
        #[clap(long)]
        status: Option<String>,

        /// Replaces the notes; current notes are kept when omitted
        #[clap(long)]
        notes: Option<String>,
    },

    /// Delete a deal
    Del {
        /// The ID of the deal to delete
        id: String,

        /// Skip confirmation prompt
        #[clap(long, short = 'y')]
        yes: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum TaskCommand {
    /// Add a new task
    Add {
        #[clap(long)]
        description: Option<String>,

        /// Due date (YYYY-MM-DD)
        #[clap(long)]
        due: Option<String>,

        /// Kind of record the task is about (contact, deal)
        #[clap(long)]
        related_to: Option<String>,

        /// ID of the related contact or deal
        #[clap(long)]
        related_id: Option<String>,

        /// Use interactive mode (prompts)
        #[clap(long)]
        interactive: bool,
    },

    /// List all tasks
    List {
        /// Only tasks that are not completed
        #[clap(long)]
        pending: bool,

        /// Only tasks past their due date
        #[clap(long)]
        overdue: bool,
    },

    /// Show details for a specific task
    Show {
        /// The ID of the task to show
        id: String,
    },

    /// Edit an existing task (prompts when no field is given)
    Edit {
        /// The ID of the task to edit
        id: String,

        #[clap(long)]
        description: Option<String>,

        /// Due date (YYYY-MM-DD)
        #[clap(long)]
        due: Option<String>,

        /// Kind of record the task is about (contact, deal)
        #[clap(long)]
        related_to: Option<String>,

        /// ID of the related contact or deal, empty to clear
        #[clap(long)]
        related_id: Option<String>,
    },

    /// Mark a task completed, or pending again
    Toggle {
        /// The ID of the task to toggle
        id: String,
    },

    /// Delete a task
    Del {
        /// The ID of the task to delete
        id: String,

        /// Skip confirmation prompt
        #[clap(long, short = 'y')]
        yes: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum DataCommand {
    /// Write every collection to one JSON file
    Export {
        /// Output file path
        file: PathBuf,
    },

    /// Replace collections with the contents of an exported JSON file
    Import {
        /// Input file path
        file: PathBuf,

        /// Skip confirmation prompt
        #[clap(long, short = 'y')]
        yes: bool,
    },

    /// Copy every collection into another backend
    Migrate {
        /// Target data directory or database file
        #[clap(long)]
        to: PathBuf,

        /// Target backend type (inferred from the path when omitted)
        #[clap(long)]
        to_backend: Option<String>,
    },

    /// Show the backend location and collection sizes
    Stats,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Contact management commands
    #[clap(subcommand)]
    Contact(ContactCommand),

    /// Deal management commands
    #[clap(subcommand)]
    Deal(DealCommand),

    /// Task management commands
    #[clap(subcommand)]
    Task(TaskCommand),

    /// Show pipeline totals
    Dashboard,

    /// Backup, restore and migration commands
    #[clap(subcommand)]
    Data(DataCommand),

    /// Draft a congratulatory email without touching any deal
    Email {
        /// Name of the won deal
        #[clap(long)]
        deal: String,

        /// Deal value; trailing text after the number is ignored
        #[clap(long)]
        value: String,

        /// Name of the contact to address
        #[clap(long)]
        contact: String,
    },
}
