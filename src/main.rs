// daw-session - create, inspect, validate and upgrade project files

use clap::{Parser, Subcommand};
use daw_session::{Project, ProjectError, ProjectManager, SessionContext, Settings, SoftwareGraph};
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;
use std::rc::Rc;

#[derive(Parser, Debug)]
#[command(name = "daw-session")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Manage multi-track audio project files", long_about = None)]
struct Args {
    /// Settings file (defaults to the user config directory)
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create a new project directory with an empty project file
    Create {
        /// Parent directory, as a path or file:// URI
        location: String,
        name: String,
        author: String,
    },

    /// Print a summary of a project
    Info {
        file: String,

        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check that every media file a project plays exists
    Validate { file: String },

    /// Rewrite a project file in the current format, keeping a backup
    Upgrade { file: String },
}

#[derive(Serialize)]
struct InstrumentSummary {
    id: u32,
    name: String,
    instr_type: String,
    events: usize,
    muted: bool,
    solo: bool,
}

#[derive(Serialize)]
struct ProjectSummary {
    name: String,
    author: String,
    instruments: Vec<InstrumentSummary>,
    graveyard: usize,
    undo: usize,
    redo: usize,
}

impl ProjectSummary {
    fn of(project: &Project) -> Self {
        Self {
            name: project.name().to_string(),
            author: project.author().to_string(),
            instruments: project
                .instruments()
                .iter()
                .map(|i| InstrumentSummary {
                    id: i.id(),
                    name: i.name().to_string(),
                    instr_type: i.instr_type().to_string(),
                    events: i.events().len(),
                    muted: i.is_muted(),
                    solo: i.is_solo(),
                })
                .collect(),
            graveyard: project.graveyard().len(),
            undo: project.history().undo_count(),
            redo: project.history().redo_count(),
        }
    }

    fn print(&self) {
        println!("{} by {}", self.name, self.author);
        for i in &self.instruments {
            let mut flags = String::new();
            if i.muted {
                flags.push_str(" [muted]");
            }
            if i.solo {
                flags.push_str(" [solo]");
            }
            println!(
                "  #{} {} ({}): {} events{}",
                i.id, i.name, i.instr_type, i.events, flags
            );
        }
        println!(
            "{} removed instruments, {} undo / {} redo actions",
            self.graveyard, self.undo, self.redo
        );
    }
}

fn load_settings(path: Option<&PathBuf>) -> Settings {
    let result = match path {
        Some(path) => Settings::load_from(path),
        None => Settings::load(),
    };
    result.unwrap_or_else(|e| {
        log::warn!("Using default settings: {}", e);
        Settings::default()
    })
}

fn run(args: Args) -> Result<(), ProjectError> {
    let settings = load_settings(args.config.as_ref());
    let graph = Rc::new(SoftwareGraph::with_standard_plugins());
    let mut manager = ProjectManager::new(SessionContext::from_settings(graph, settings));

    match args.command {
        Commands::Create {
            location,
            name,
            author,
        } => {
            let project = manager.create_project(&location, &name, &author)?;
            if let Some(file) = project.project_file() {
                println!("Created {}", file.display());
            }
        }
        Commands::Info { file, json } => {
            let summary = ProjectSummary::of(manager.load_project(&file)?);
            if json {
                match serde_json::to_string_pretty(&summary) {
                    Ok(text) => println!("{}", text),
                    Err(e) => log::error!("Could not encode summary: {}", e),
                }
            } else {
                summary.print();
            }
        }
        Commands::Validate { file } => {
            manager.load_project(&file)?;
            manager.validate_active()?;
            println!("All media files present");
        }
        Commands::Upgrade { file } => {
            manager.load_project(&file)?;
            manager.save_project()?;
            println!("{} is now in the current format", file);
        }
    }
    manager.close_project()
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    match run(Args::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(ProjectError::MissingAssets { files, .. }) => {
            eprintln!("Missing media files:");
            for file in files {
                eprintln!("  {}", file.display());
            }
            ExitCode::FAILURE
        }
        Err(e) => {
            eprintln!("ERROR: {}", e);
            ExitCode::FAILURE
        }
    }
}
