use anyhow::{Context, Result, bail};
use chrono::{DateTime, Local, Utc};
use clap::{Parser, Subcommand};
mod auth;
use std::path::PathBuf;
use std::str::FromStr;
use stickyvault::{
    CipherSuite, FileRepository, KdfParams, Note, NotePatch, NoteStore, ReminderChange,
    ReminderScheduler, Vault, default_data_path, schedule_upcoming,
};
use tracing_subscriber::EnvFilter;

#[derive(Debug, clap::Args)]
struct Argon2Args {
    /// Argon2 memory cost in KiB (default: 262144)
    #[arg(long = "argon-mem", global = true, env = "STICKYVAULT_ARGON_MEM")]
    mem_cost_kib: Option<u32>,

    /// Argon2 time cost / iterations (default: 3)
    #[arg(long = "argon-time", global = true, env = "STICKYVAULT_ARGON_TIME")]
    time_cost: Option<u32>,

    /// Argon2 parallelism (default: 1)
    #[arg(
        long = "argon-parallelism",
        global = true,
        env = "STICKYVAULT_ARGON_PARALLELISM"
    )]
    parallelism: Option<u32>,
}

impl Argon2Args {
    fn to_kdf_params(&self) -> Result<KdfParams> {
        let default = KdfParams::default();

        Ok(KdfParams::new(
            self.mem_cost_kib.unwrap_or(default.mem_cost_kib()),
            self.time_cost.unwrap_or(default.time_cost()),
            self.parallelism.unwrap_or(default.parallelism()),
        )?)
    }
}

#[derive(Debug, Parser)]
#[command(name = "stickyvault")]
#[command(
    version,
    about = "Local-first sticky notes with encrypted, portable vault export."
)]
struct Cli {
    /// Path to the notes document
    #[arg(long, global = true, value_name = "PATH", env = "STICKYVAULT_DATA")]
    data: Option<PathBuf>,

    /// Folder to select before running the command
    #[arg(long, global = true, value_name = "ID")]
    folder: Option<i64>,

    #[command(flatten)]
    argon2: Argon2Args,

    /// Log progress to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Manages folders
    #[command(subcommand)]
    Folder(FolderCommand),

    /// Manages notes in the selected folder
    #[command(subcommand)]
    Note(NoteCommand),

    /// Sets the colour theme
    #[command(arg_required_else_help = true)]
    Theme { name: String },

    /// Lists upcoming reminders in the selected folder
    Reminders,

    /// Writes every folder, note, reminder and setting to an encrypted vault
    #[command(arg_required_else_help = true)]
    Export {
        path: PathBuf,

        /// auto, xchacha20poly1305 or aes256gcm
        #[arg(long, env = "STICKYVAULT_CIPHER", default_value = "auto")]
        cipher: CipherArg,
    },

    /// Replaces all data with the contents of an encrypted vault
    #[command(arg_required_else_help = true)]
    Import { path: PathBuf },
}

#[derive(Debug, Subcommand)]
enum FolderCommand {
    /// Creates a folder
    #[command(arg_required_else_help = true)]
    Add { name: String },

    /// Lists folders, marking the selected one
    List,

    /// Renames a folder
    #[command(arg_required_else_help = true)]
    Rename { id: i64, name: String },

    /// Deletes a folder and all of its notes
    #[command(arg_required_else_help = true)]
    Remove { id: i64 },
}

#[derive(Debug, Subcommand)]
enum NoteCommand {
    /// Creates an empty note
    Add,

    /// Lists notes
    List,

    /// Finds notes in every folder by title or body, best match first
    #[command(arg_required_else_help = true)]
    Search { query: String },

    /// Prints a note as JSON
    #[command(arg_required_else_help = true)]
    Show { id: i64 },

    /// Changes the given fields of a note
    #[command(arg_required_else_help = true)]
    Update {
        id: i64,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        body: Option<String>,
        #[arg(long)]
        pinned: Option<bool>,
        #[arg(long, allow_hyphen_values = true)]
        x: Option<i32>,
        #[arg(long, allow_hyphen_values = true)]
        y: Option<i32>,
        #[arg(long)]
        width: Option<i32>,
        #[arg(long)]
        height: Option<i32>,
        /// Moves the note to another folder
        #[arg(long)]
        folder_id: Option<i64>,
        /// Reminder time, RFC 3339
        #[arg(long, value_name = "TIME", conflicts_with = "clear_reminder")]
        remind_at: Option<DateTime<Utc>>,
        #[arg(long)]
        clear_reminder: bool,
    },

    /// Deletes a note
    #[command(arg_required_else_help = true)]
    Remove { id: i64 },
}

#[derive(Debug, Clone, Copy)]
enum CipherArg {
    Auto,
    Suite(CipherSuite),
}

impl FromStr for CipherArg {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auto" => Ok(CipherArg::Auto),
            other => other.parse().map(CipherArg::Suite),
        }
    }
}

impl CipherArg {
    fn resolve(self) -> CipherSuite {
        match self {
            CipherArg::Auto => CipherSuite::preferred(),
            CipherArg::Suite(suite) => suite,
        }
    }
}

struct PrintScheduler;

impl ReminderScheduler for PrintScheduler {
    fn schedule(&mut self, note_id: i64, title: &str, at: DateTime<Utc>) {
        let title = if title.is_empty() { "Reminder" } else { title };
        println!(
            "{}  #{note_id}  {title}",
            at.with_timezone(&Local).format("%Y-%m-%d %H:%M")
        );
    }
}

fn print_notes(notes: &[Note]) {
    if notes.is_empty() {
        println!("No notes.");
        return;
    }

    let title_width = notes
        .iter()
        .map(|n| n.title.chars().count())
        .chain(std::iter::once("Title".len()))
        .max()
        .unwrap_or(5);

    println!(
        "{:>4}  {:>6}  {:<3}  {:<title_width$}  Updated",
        "Id", "Folder", "Pin", "Title"
    );
    println!(
        "{:->4}  {:->6}  {:-<3}  {:-<title_width$}  {:-<16}",
        "", "", "", "", ""
    );
    for n in notes {
        println!(
            "{:>4}  {:>6}  {:<3}  {:<title_width$}  {}",
            n.id,
            n.folder_id,
            if n.pinned { "*" } else { "" },
            n.title,
            n.updated_at.with_timezone(&Local).format("%Y-%m-%d %H:%M")
        );
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "stickyvault=info" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.verbose);

    let path = match args.data {
        Some(p) => p,
        None => default_data_path()?,
    };
    let repo = FileRepository::open(&path)
        .await
        .with_context(|| format!("failed to open notes at {}", path.display()))?;

    let mut store = NoteStore::new(repo);
    store.refresh().await?;
    if let Some(id) = args.folder {
        store.set_current_folder(id).await?;
    }

    let vault = Vault::new().with_kdf(args.argon2.to_kdf_params()?);

    match args.command {
        Commands::Folder(FolderCommand::Add { name }) => {
            let folder = store.add_folder(&name).await?;
            println!("created folder {} '{}'", folder.id, folder.name);
        }
        Commands::Folder(FolderCommand::List) => {
            if store.folders().is_empty() {
                println!("No folders.");
                return Ok(());
            }
            for folder in store.folders() {
                let mark = if Some(folder.id) == store.current_folder_id() {
                    "*"
                } else {
                    " "
                };
                println!("{mark} {:>4}  {}", folder.id, folder.name);
            }
        }
        Commands::Folder(FolderCommand::Rename { id, name }) => {
            let folder = store.rename_folder(id, &name).await?;
            println!("folder {} renamed to '{}'", folder.id, folder.name);
        }
        Commands::Folder(FolderCommand::Remove { id }) => {
            store.remove_folder(id).await?;
            println!("folder {id} removed");
        }
        Commands::Note(NoteCommand::Add) => match store.add_note().await? {
            Some(note) => println!("created note {} in folder {}", note.id, note.folder_id),
            None => bail!("no folder selected; create one with `stickyvault folder add <NAME>`"),
        },
        Commands::Note(NoteCommand::List) => print_notes(store.notes()),
        Commands::Note(NoteCommand::Search { query }) => {
            print_notes(&store.search(&query).await?);
        }
        Commands::Note(NoteCommand::Show { id }) => match store.note(id) {
            Some(note) => println!("{}", serde_json::to_string_pretty(note)?),
            None => bail!("note {id} is not in the selected folder"),
        },
        Commands::Note(NoteCommand::Update {
            id,
            title,
            body,
            pinned,
            x,
            y,
            width,
            height,
            folder_id,
            remind_at,
            clear_reminder,
        }) => {
            let remind_at = match (remind_at, clear_reminder) {
                (Some(at), _) => ReminderChange::Set(at),
                (None, true) => ReminderChange::Clear,
                (None, false) => ReminderChange::Keep,
            };
            let patch = NotePatch {
                id,
                title,
                body_enc: body,
                folder_id,
                pinned,
                x,
                y,
                width,
                height,
                remind_at,
            };
            let note = store.update_note(&patch).await?;
            println!("note {} updated", note.id);
        }
        Commands::Note(NoteCommand::Remove { id }) => {
            store.remove_note(id).await?;
            println!("note {id} removed");
        }
        Commands::Theme { name } => {
            store.set_theme(&name).await?;
            println!("theme set to '{name}'");
        }
        Commands::Reminders => {
            let count = schedule_upcoming(&store, &mut PrintScheduler, Utc::now());
            if count == 0 {
                println!("No upcoming reminders.");
            }
        }
        Commands::Export { path, cipher } => {
            let passphrase = auth::read_new_passphrase()?;
            let vault = vault.with_cipher(cipher.resolve());
            let written = vault.export_to_path(&store, passphrase, &path).await?;
            println!("exported {written} bytes to {}", path.display());
        }
        Commands::Import { path } => {
            let passphrase = auth::read_passphrase()?;
            let mut file = tokio::fs::File::open(&path)
                .await
                .with_context(|| format!("failed to open {}", path.display()))?;
            let summary = vault.import_from(&mut store, passphrase, &mut file).await?;
            println!(
                "imported {} folders, {} notes, {} reminders",
                summary.folders, summary.notes, summary.reminders
            );
        }
    }

    Ok(())
}
