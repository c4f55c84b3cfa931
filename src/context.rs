// Collaborators shared by every project a manager opens

use crate::config::Settings;
use crate::media::MediaGraph;
use crate::media::software::SoftwareGraph;
use crate::project::icons::IconCache;
use std::rc::Rc;

/// Media graph, icon cache and settings handed to the project manager
///
/// Cloning is cheap; every clone shares the same collaborators.
#[derive(Clone)]
pub struct SessionContext {
    pub graph: Rc<dyn MediaGraph>,
    pub icons: Rc<IconCache>,
    pub settings: Rc<Settings>,
}

impl SessionContext {
    pub fn new(graph: Rc<dyn MediaGraph>, icons: IconCache, settings: Settings) -> Self {
        Self {
            graph,
            icons: Rc::new(icons),
            settings: Rc::new(settings),
        }
    }

    /// Context over the given graph with default settings and no icons
    pub fn with_graph(graph: Rc<dyn MediaGraph>) -> Self {
        Self::new(graph, IconCache::new(), Settings::default())
    }

    /// Context over an in-process graph with every standard element available
    pub fn software() -> Self {
        Self::with_graph(Rc::new(SoftwareGraph::with_standard_plugins()))
    }

    /// Build a context from settings, scanning the configured icon directory
    pub fn from_settings(graph: Rc<dyn MediaGraph>, settings: Settings) -> Self {
        let icons = match &settings.icon_dir {
            Some(dir) => IconCache::scan_dir(dir).unwrap_or_else(|e| {
                log::warn!("Could not scan icon directory {}: {}", dir.display(), e);
                IconCache::new()
            }),
            None => IconCache::new(),
        };
        Self::new(graph, icons, settings)
    }
}
