//! Process-wide defaults read once when a dispatcher is constructed.
//!
//! Changing a default affects only dispatchers constructed afterwards.

use std::sync::{PoisonError, RwLock};

use herald_core::{DEFAULT_MAX_LISTENERS, MaxListeners};
use tracing::debug;

/// Defaults applied to newly constructed dispatchers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventDefaults {
    /// Per-key listener threshold.
    pub max_listeners: MaxListeners,
    /// Whether emitters capture failures of pending listener computations.
    pub capture_rejections: bool,
}

impl EventDefaults {
    const INITIAL: Self = Self {
        max_listeners: MaxListeners::Limited(DEFAULT_MAX_LISTENERS),
        capture_rejections: false,
    };
}

impl Default for EventDefaults {
    fn default() -> Self {
        Self::INITIAL
    }
}

static DEFAULTS: RwLock<EventDefaults> = RwLock::new(EventDefaults::INITIAL);

/// Snapshot of the current defaults.
#[must_use]
pub fn current() -> EventDefaults {
    *DEFAULTS.read().unwrap_or_else(PoisonError::into_inner)
}

/// Replace every default at once.
pub fn install(defaults: EventDefaults) {
    *DEFAULTS.write().unwrap_or_else(PoisonError::into_inner) = defaults;
    debug!(
        max_listeners = %defaults.max_listeners,
        capture_rejections = defaults.capture_rejections,
        "Installed event defaults"
    );
}

/// Restore the built-in defaults.
pub fn reset() {
    install(EventDefaults::INITIAL);
}

/// Current default per-key listener threshold.
#[must_use]
pub fn default_max_listeners() -> MaxListeners {
    current().max_listeners
}

/// Change the default per-key listener threshold.
pub fn set_default_max_listeners(max: MaxListeners) {
    DEFAULTS
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .max_listeners = max;
    debug!(max_listeners = %max, "Default max listeners changed");
}

/// Current default capture-rejections flag.
#[must_use]
pub fn capture_rejections() -> bool {
    current().capture_rejections
}

/// Change the default capture-rejections flag.
pub fn set_capture_rejections(enabled: bool) {
    DEFAULTS
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .capture_rejections = enabled;
    debug!(capture_rejections = enabled, "Default capture rejections changed");
}

#[cfg(feature = "config")]
impl TryFrom<&herald_config::EventsSection> for EventDefaults {
    type Error = herald_core::EventsError;

    fn try_from(section: &herald_config::EventsSection) -> Result<Self, Self::Error> {
        Ok(Self {
            max_listeners: MaxListeners::try_from(section.max_listeners)?,
            capture_rejections: section.capture_rejections,
        })
    }
}

/// Install defaults from a loaded configuration section.
///
/// # Errors
///
/// Returns [`herald_core::EventsError::InvalidArgument`] for a negative
/// `max_listeners`.
#[cfg(feature = "config")]
pub fn install_from_config(
    section: &herald_config::EventsSection,
) -> herald_core::EventsResult<EventDefaults> {
    let defaults = EventDefaults::try_from(section)?;
    install(defaults);
    Ok(defaults)
}

#[cfg(test)]
mod tests {
    use super::*;

    // Mutating tests for the global live in the integration test crate.
    #[test]
    fn test_initial_defaults() {
        let defaults = EventDefaults::default();
        assert_eq!(defaults.max_listeners, MaxListeners::Limited(10));
        assert!(!defaults.capture_rejections);
    }
}
