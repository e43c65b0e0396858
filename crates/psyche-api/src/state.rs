//! Shared application state.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use psyche_content::application::library::NarrativeLibrary;
use psyche_core::error::DomainError;
use psyche_narrative::application::player::PlayerHandle;
use psyche_narrative::application::view_surface::{SurfaceView, ViewSurface};
use uuid::Uuid;

use crate::config::ServerConfig;

/// A running sequencer session.
#[derive(Debug, Clone)]
pub struct Session {
    /// Name of the narrative being played.
    pub narrative: String,
    /// Handle to the session's player task.
    pub handle: PlayerHandle,
    /// The surface the player renders into.
    pub view: Arc<Mutex<ViewSurface>>,
}

impl Session {
    /// What the session currently shows.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the surface lock is poisoned.
    pub fn view(&self) -> Result<SurfaceView, DomainError> {
        self.view
            .lock()
            .map(|surface| surface.view())
            .map_err(|_| DomainError::Infrastructure("session surface lock poisoned".into()))
    }
}

/// Running sessions by id.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<Uuid, Session>>,
}

impl SessionRegistry {
    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<Uuid, Session>>, DomainError> {
        self.sessions
            .lock()
            .map_err(|_| DomainError::Infrastructure("session registry lock poisoned".into()))
    }

    /// Registers a session under a fresh id.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the registry lock is poisoned.
    pub fn insert(&self, session: Session) -> Result<Uuid, DomainError> {
        let id = Uuid::new_v4();
        self.lock()?.insert(id, session);
        Ok(id)
    }

    /// Looks up a session.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::SessionNotFound` for an unknown id.
    pub fn get(&self, id: Uuid) -> Result<Session, DomainError> {
        self.lock()?
            .get(&id)
            .cloned()
            .ok_or(DomainError::SessionNotFound(id))
    }

    /// Removes a session and returns it.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::SessionNotFound` for an unknown id.
    pub fn remove(&self, id: Uuid) -> Result<Session, DomainError> {
        self.lock()?
            .remove(&id)
            .ok_or(DomainError::SessionNotFound(id))
    }

    /// Number of registered sessions, finished ones included.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the registry lock is poisoned.
    pub fn len(&self) -> Result<usize, DomainError> {
        Ok(self.lock()?.len())
    }

    /// Whether no session is registered.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the registry lock is poisoned.
    pub fn is_empty(&self) -> Result<bool, DomainError> {
        Ok(self.lock()?.is_empty())
    }

    /// Number of sessions whose run is still in progress.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the registry lock is poisoned.
    pub fn active(&self) -> Result<usize, DomainError> {
        Ok(self
            .lock()?
            .values()
            .filter(|session| {
                let snapshot = session.handle.snapshot();
                snapshot.running && snapshot.completion.is_none()
            })
            .count())
    }
}

/// Application state shared across all request handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Narratives available to play.
    pub library: Arc<NarrativeLibrary>,
    /// Running sessions.
    pub sessions: Arc<SessionRegistry>,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
}

impl AppState {
    /// Create new application state.
    #[must_use]
    pub fn new(library: NarrativeLibrary, config: ServerConfig) -> Self {
        Self {
            library: Arc::new(library),
            sessions: Arc::new(SessionRegistry::default()),
            config: Arc::new(config),
        }
    }
}
