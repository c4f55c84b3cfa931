// Project manager: creating, loading, validating and closing projects

use crate::command::CommandError;
use crate::context::SessionContext;
use crate::media::MediaError;
use crate::project::loader::loader_for;
use crate::project::migration::{self, FormatVersion};
use crate::project::serialization::{SerializationError, read_compressed_document};
use crate::project::types::{AUDIO_DIR, Project};
use crate::project::writer::{ROOT_ELEMENT, save_project_file};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// File extension of project documents
pub const PROJECT_EXTENSION: &str = "jokosher";

/// Project error types
#[derive(Debug, thiserror::Error)]
pub enum ProjectError {
    #[error("Invalid argument: {0} must not be empty")]
    InvalidArgument(&'static str),

    #[error("Unsupported location: {0}")]
    UnsupportedLocation(String),

    #[error("Project already exists at {}", .0.display())]
    AlreadyExists(PathBuf),

    #[error("IO error on {}: {source}", .path.display())]
    IoFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Missing media plugin: {0}")]
    MissingCapability(String),

    #[error("Project file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Corrupt project file {}: {reason}", .path.display())]
    CorruptArchive { path: PathBuf, reason: String },

    #[error("Unsupported project format version '{0}'")]
    UnsupportedVersion(String),

    #[error("{} media files missing", .files.len())]
    MissingAssets {
        files: Vec<PathBuf>,
        images: Vec<PathBuf>,
    },

    #[error("No project is open")]
    NoActiveProject,

    #[error("Command error: {0}")]
    Command(#[from] CommandError),

    #[error("Media error: {0}")]
    Media(#[from] MediaError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] SerializationError),
}

impl ProjectError {
    /// A graph missing a required factory is a capability problem
    fn from_construction(error: MediaError) -> Self {
        match error {
            MediaError::ElementNotFound { factory } => ProjectError::MissingCapability(factory),
            other => ProjectError::Media(other),
        }
    }
}

/// Turn a location given as `file://` URI or plain path into a path
///
/// Any other URI scheme is rejected.
pub fn parse_location(location: &str) -> Result<PathBuf, ProjectError> {
    let unsupported = || ProjectError::UnsupportedLocation(location.to_string());
    match url::Url::parse(location) {
        Ok(url) if url.scheme() == "file" => url.to_file_path().map_err(|_| unsupported()),
        // `C:\music` parses as a URL with scheme "c"
        Ok(url) if url.scheme().len() == 1 => Ok(PathBuf::from(location)),
        Ok(_) => Err(unsupported()),
        Err(_) if location.contains("://") => Err(unsupported()),
        Err(_) => Ok(PathBuf::from(location)),
    }
}

/// Check that every file the project plays is present on disk
///
/// Only active instruments and events count; the graveyard and events
/// without a source file are ignored.
/// Has no side effects, so repeated calls give the same answer.
pub fn validate_project(project: &Project) -> Result<(), ProjectError> {
    let missing: BTreeSet<PathBuf> = project
        .instruments()
        .iter()
        .flat_map(|instrument| instrument.events())
        .map(|event| event.file())
        .filter(|file| !file.as_os_str().is_empty() && !file.exists())
        .map(Path::to_path_buf)
        .collect();

    if missing.is_empty() {
        return Ok(());
    }
    for file in &missing {
        log::warn!("Missing media file {}", file.display());
    }
    Err(ProjectError::MissingAssets {
        files: missing.into_iter().collect(),
        images: Vec::new(),
    })
}

/// Owns the single active project of a session
pub struct ProjectManager {
    context: SessionContext,
    active: Option<Project>,
}

impl ProjectManager {
    pub fn new(context: SessionContext) -> Self {
        Self {
            context,
            active: None,
        }
    }

    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    pub fn active(&self) -> Option<&Project> {
        self.active.as_ref()
    }

    pub fn active_mut(&mut self) -> Option<&mut Project> {
        self.active.as_mut()
    }

    pub fn has_active(&self) -> bool {
        self.active.is_some()
    }

    /// Create `<location>/<name>/` with an `audio/` directory and an empty
    /// project file, and make it the active project
    pub fn create_project(
        &mut self,
        location: &str,
        name: &str,
        author: &str,
    ) -> Result<&mut Project, ProjectError> {
        let (location, name, author) = (location.trim(), name.trim(), author.trim());
        if location.is_empty() {
            return Err(ProjectError::InvalidArgument("location"));
        }
        if name.is_empty() {
            return Err(ProjectError::InvalidArgument("name"));
        }
        if author.is_empty() {
            return Err(ProjectError::InvalidArgument("author"));
        }

        let project_dir = parse_location(location)?.join(name);
        let mut project =
            Project::new(self.context.clone()).map_err(ProjectError::from_construction)?;
        if project_dir.exists() {
            return Err(ProjectError::AlreadyExists(project_dir));
        }
        project.set_name(name);
        project.set_author(author);

        for dir in [project_dir.clone(), project_dir.join(AUDIO_DIR)] {
            std::fs::create_dir(&dir).map_err(|source| ProjectError::IoFailure {
                path: dir.clone(),
                source,
            })?;
        }

        let file = project_dir.join(format!("{}.{}", name, PROJECT_EXTENSION));
        project.set_project_file(&file);
        save_project_file(&project, &file)?;
        log::info!("Created project '{}' at {}", name, file.display());

        Ok(self.replace_active(project))
    }

    /// Open a project file of any known format version and make it active
    ///
    /// Files in an older format are first copied to
    /// `<stem>.<version>.jokosher` next to the original.
    pub fn load_project(&mut self, location: &str) -> Result<&mut Project, ProjectError> {
        let path = parse_location(location.trim())?;
        if !path.is_file() {
            return Err(ProjectError::NotFound(path));
        }

        let corrupt = |reason: String| ProjectError::CorruptArchive {
            path: path.clone(),
            reason,
        };
        let root = read_compressed_document(&path).map_err(|e| corrupt(e.to_string()))?;
        if root.name != ROOT_ELEMENT {
            return Err(corrupt(format!("unexpected root element <{}>", root.name)));
        }
        let tag = root.attr("version").unwrap_or("").to_string();
        let version = FormatVersion::from_tag(&tag).ok_or(ProjectError::UnsupportedVersion(tag))?;
        log::info!("Loading {} (format {})", path.display(), version);

        let mut project =
            Project::new(self.context.clone()).map_err(ProjectError::from_construction)?;
        project.set_project_file(&path);
        loader_for(version)
            .load_project(&mut project, &root)
            .map_err(|e| match e {
                ProjectError::Serialization(e) => corrupt(e.to_string()),
                ProjectError::Media(e) => ProjectError::from_construction(e),
                other => other,
            })?;

        if !version.is_current() {
            migration::create_backup(&path, version)?;
        }
        Ok(self.replace_active(project))
    }

    /// Validate the active project's media files
    pub fn validate_active(&self) -> Result<(), ProjectError> {
        validate_project(self.active.as_ref().ok_or(ProjectError::NoActiveProject)?)
    }

    /// Write the active project to its file in the current format
    pub fn save_project(&self) -> Result<(), ProjectError> {
        let project = self.active.as_ref().ok_or(ProjectError::NoActiveProject)?;
        let file = project
            .project_file()
            .ok_or(ProjectError::InvalidArgument("project file"))?;
        save_project_file(project, file)
    }

    /// Release the active project
    pub fn close_project(&mut self) -> Result<(), ProjectError> {
        let project = self.active.take().ok_or(ProjectError::NoActiveProject)?;
        project.close();
        Ok(())
    }

    fn replace_active(&mut self, project: Project) -> &mut Project {
        if let Some(previous) = self.active.take() {
            previous.close();
        }
        self.active.insert(project)
    }
}
