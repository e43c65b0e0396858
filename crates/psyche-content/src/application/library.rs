//! The set of narratives available to play.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use psyche_core::error::DomainError;
use tracing::{info, warn};

use super::loader::{load_narrative_from_path, load_narrative_from_str};
use crate::domain::narrative::{Narrative, NarrativeSummary};

const BUNDLED: [(&str, &str); 2] = [
    ("lore.yaml", include_str!("../../content/lore.yaml")),
    ("satellite.yaml", include_str!("../../content/satellite.yaml")),
];

/// Narratives keyed by name.
#[derive(Debug, Clone, Default)]
pub struct NarrativeLibrary {
    narratives: BTreeMap<String, Arc<Narrative>>,
}

impl NarrativeLibrary {
    /// Creates an empty library.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The narratives compiled into the binary.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if a bundled document is invalid.
    pub fn bundled() -> Result<Self, DomainError> {
        let mut library = Self::new();
        for (file, source) in BUNDLED {
            let narrative = load_narrative_from_str(source)
                .map_err(|e| DomainError::Validation(format!("bundled {file}: {e}")))?;
            library.insert(narrative);
        }
        Ok(library)
    }

    /// Loads every `.yaml` / `.yml` file in `dir`, in file name order.
    /// Later files replace earlier narratives with the same name.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the directory cannot be
    /// listed, or the first loader error.
    pub fn load_dir(&mut self, dir: &Path) -> Result<usize, DomainError> {
        let entries = std::fs::read_dir(dir).map_err(|e| {
            DomainError::Infrastructure(format!("cannot list {}: {e}", dir.display()))
        })?;
        let mut paths: Vec<_> = entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| {
                path.extension()
                    .is_some_and(|ext| ext == "yaml" || ext == "yml")
            })
            .collect();
        paths.sort();

        for path in &paths {
            let narrative = load_narrative_from_path(path)?;
            self.insert(narrative);
        }
        info!(dir = %dir.display(), count = paths.len(), "narratives loaded");
        Ok(paths.len())
    }

    /// Adds a narrative, replacing any with the same name.
    pub fn insert(&mut self, narrative: Narrative) {
        let name = narrative.name.clone();
        if self
            .narratives
            .insert(name.clone(), Arc::new(narrative))
            .is_some()
        {
            warn!(narrative = %name, "narrative replaced");
        } else {
            info!(narrative = %name, "narrative registered");
        }
    }

    /// Looks up a narrative by name.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NotFound` if no narrative has that name.
    pub fn get(&self, name: &str) -> Result<Arc<Narrative>, DomainError> {
        self.narratives
            .get(name)
            .cloned()
            .ok_or_else(|| DomainError::NotFound(format!("narrative {name}")))
    }

    /// Summaries of all narratives, ordered by name.
    #[must_use]
    pub fn summaries(&self) -> Vec<NarrativeSummary> {
        self.narratives.values().map(|n| n.summary()).collect()
    }

    /// Number of narratives.
    #[must_use]
    pub fn len(&self) -> usize {
        self.narratives.len()
    }

    /// Whether the library holds no narrative.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.narratives.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use psyche_narrative::domain::sequencer::TransitionMode;

    use super::*;

    #[test]
    fn test_bundled_lore_has_twelve_phases_in_order() {
        // Arrange
        let library = NarrativeLibrary::bundled().unwrap();

        // Act
        let lore = library.get("lore").unwrap();

        // Assert
        let ids: Vec<&str> = lore.sequence.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(
            ids,
            [
                "annibale",
                "chrysalis1",
                "chrysalis2",
                "chrysalis3",
                "chrysalis4",
                "psychegoddess1",
                "psychegoddess2",
                "psychegoddess3",
                "psychegoddess4",
                "psychegoddess5",
                "psychegoddess6",
                "finalphase",
            ]
        );
        assert_eq!(lore.mode, TransitionMode::Auto);
    }

    #[test]
    fn test_bundled_chrysalis4_has_no_banner() {
        let library = NarrativeLibrary::bundled().unwrap();
        let lore = library.get("lore").unwrap();
        let index = lore
            .sequence
            .position(&psyche_narrative::domain::phase::PhaseId::new("chrysalis4"))
            .unwrap();
        assert!(lore.sequence.get(index).unwrap().caption_banner.is_none());
    }

    #[test]
    fn test_bundled_satellite_is_manual() {
        let library = NarrativeLibrary::bundled().unwrap();
        let satellite = library.get("satellite").unwrap();
        assert_eq!(satellite.mode, TransitionMode::Manual);
        assert_eq!(satellite.sequence.len(), 5);
    }

    #[test]
    fn test_summaries_are_ordered_by_name() {
        let library = NarrativeLibrary::bundled().unwrap();
        let names: Vec<String> = library.summaries().into_iter().map(|s| s.name).collect();
        assert_eq!(names, ["lore", "satellite"]);
    }

    #[test]
    fn test_new_library_is_empty() {
        let library = NarrativeLibrary::new();
        assert!(library.is_empty());
        assert_eq!(library.len(), 0);
        assert!(!NarrativeLibrary::bundled().unwrap().is_empty());
    }

    #[test]
    fn test_get_unknown_is_not_found() {
        let library = NarrativeLibrary::new();
        assert!(matches!(library.get("nope"), Err(DomainError::NotFound(_))));
    }

    #[test]
    fn test_insert_replaces_by_name() {
        // Arrange
        let mut library = NarrativeLibrary::new();
        library.insert(load_narrative_from_str("name: a\nphases: []").unwrap());

        // Act
        library.insert(
            load_narrative_from_str("name: a\nphases:\n  p: { duration: 5 }").unwrap(),
        );

        // Assert
        assert_eq!(library.len(), 1);
        assert_eq!(library.get("a").unwrap().sequence.len(), 1);
    }

    #[test]
    fn test_load_dir_reads_yaml_files_only() {
        // Arrange
        let dir = std::env::temp_dir().join(format!("psyche-content-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("one.yaml"), "name: one\nphases: []").unwrap();
        std::fs::write(dir.join("two.yml"), "name: two\nphases: []").unwrap();
        std::fs::write(dir.join("notes.txt"), "not a narrative").unwrap();
        let mut library = NarrativeLibrary::new();

        // Act
        let count = library.load_dir(&dir).unwrap();

        // Assert
        assert_eq!(count, 2);
        assert!(library.get("one").is_ok());
        assert!(library.get("two").is_ok());
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_load_dir_missing_directory_is_infrastructure_error() {
        let mut library = NarrativeLibrary::new();
        let result = library.load_dir(Path::new("/nonexistent/narratives"));
        assert!(matches!(result, Err(DomainError::Infrastructure(_))));
    }
}
