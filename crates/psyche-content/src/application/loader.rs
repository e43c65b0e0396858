//! Loads narrative documents into validated [`Narrative`]s.

use std::path::Path;
use std::time::Duration;

use psyche_core::error::DomainError;
use psyche_core::overlay::{AssetHandle, Placement};
use psyche_narrative::domain::phase::{OverlayImage, Phase, PhaseId};
use psyche_narrative::domain::sequence::Sequence;
use serde_yaml::Value;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::domain::narrative::Narrative;
use crate::domain::schema::{CaptionText, NarrativeDocument, RawOverlayImage, RawPhase};

/// Hex-encoded SHA-256 of a document.
#[must_use]
pub fn version_hash(source: &str) -> String {
    format!("{:x}", Sha256::digest(source.as_bytes()))
}

/// Parses and validates a narrative document.
///
/// # Errors
///
/// Returns `DomainError::Validation` if the document is not valid YAML, a
/// phase lacks an id or duration, a stacked image lacks a source, or two
/// phases share an id.
pub fn load_narrative_from_str(source: &str) -> Result<Narrative, DomainError> {
    let document: NarrativeDocument = serde_yaml::from_str(source)
        .map_err(|e| DomainError::Validation(format!("invalid narrative document: {e}")))?;

    let name = document.name.trim();
    if name.is_empty() {
        return Err(DomainError::Validation("narrative name is empty".into()));
    }

    let phases = raw_phases(document.phases)?
        .into_iter()
        .map(|(id, raw)| normalize(id, raw))
        .collect::<Result<Vec<_>, _>>()?;
    let sequence = Sequence::new(phases)
        .map_err(|e| DomainError::Validation(format!("narrative {name}: {e}")))?;

    debug!(narrative = name, phases = sequence.len(), "narrative loaded");
    Ok(Narrative {
        name: name.to_owned(),
        mode: document.mode,
        fade_out: document.fade_out_ms.map(Duration::from_millis),
        sequence,
        version_hash: version_hash(source),
    })
}

/// Reads and validates a narrative document from disk.
///
/// # Errors
///
/// Returns `DomainError::Infrastructure` if the file cannot be read, or
/// any error of [`load_narrative_from_str`].
pub fn load_narrative_from_path(path: &Path) -> Result<Narrative, DomainError> {
    let source = std::fs::read_to_string(path).map_err(|e| {
        DomainError::Infrastructure(format!("cannot read {}: {e}", path.display()))
    })?;
    load_narrative_from_str(&source).map_err(|e| match e {
        DomainError::Validation(msg) => {
            DomainError::Validation(format!("{}: {msg}", path.display()))
        }
        other => other,
    })
}

/// Splits the `phases` value into (id, phase) pairs in authoring order.
fn raw_phases(phases: Value) -> Result<Vec<(String, RawPhase)>, DomainError> {
    match phases {
        Value::Null => Ok(Vec::new()),
        Value::Sequence(items) => items
            .into_iter()
            .enumerate()
            .map(|(index, item)| {
                let raw: RawPhase = serde_yaml::from_value(item)
                    .map_err(|e| DomainError::Validation(format!("phase #{index}: {e}")))?;
                let id = raw
                    .id
                    .clone()
                    .ok_or_else(|| DomainError::Validation(format!("phase #{index} has no id")))?;
                Ok((id, raw))
            })
            .collect(),
        Value::Mapping(entries) => entries
            .into_iter()
            .map(|(key, item)| {
                let id = match key {
                    Value::String(id) => id,
                    Value::Number(n) => n.to_string(),
                    other => {
                        return Err(DomainError::Validation(format!(
                            "phase key must be a string, got {other:?}"
                        )));
                    }
                };
                let raw: RawPhase = serde_yaml::from_value(item)
                    .map_err(|e| DomainError::Validation(format!("phase {id}: {e}")))?;
                Ok((id, raw))
            })
            .collect(),
        _ => Err(DomainError::Validation(
            "phases must be a list or a mapping".into(),
        )),
    }
}

fn normalize(id: String, raw: RawPhase) -> Result<Phase, DomainError> {
    let id = id.trim().to_owned();
    if id.is_empty() {
        return Err(DomainError::Validation("phase id is empty".into()));
    }

    let overlay_images = raw
        .overlay_images
        .into_iter()
        .map(|image| overlay_image(&id, image))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Phase {
        title: raw
            .title
            .map(|t| t.trim().to_owned())
            .filter(|t| !t.is_empty()),
        primary_image: raw.primary_image.as_deref().and_then(AssetHandle::parse),
        alt_text: raw.alt_text.unwrap_or_default(),
        duration_ms: raw.duration_ms,
        caption_banner: raw.caption_banner.as_deref().and_then(AssetHandle::parse),
        caption_lines: raw
            .caption_lines
            .map(CaptionText::into_lines)
            .unwrap_or_default(),
        overlay_images,
        id: PhaseId::new(id),
    })
}

fn overlay_image(phase_id: &str, raw: RawOverlayImage) -> Result<OverlayImage, DomainError> {
    let handle = AssetHandle::parse(&raw.handle).ok_or_else(|| {
        DomainError::Validation(format!(
            "phase {phase_id}: stacked image {:?} has no source",
            raw.id
        ))
    })?;
    let non_empty = |value: Option<String>| value.filter(|v| !v.trim().is_empty());
    Ok(OverlayImage {
        id: raw.id,
        handle,
        placement: Placement {
            position: non_empty(raw.position),
            top: non_empty(raw.top),
            left: non_empty(raw.left),
        },
        stacking_order: raw.stacking_order,
    })
}
