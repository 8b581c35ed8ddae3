//! Edit-mode state machine.
//!
//! ```text
//!            mount(Embedded)                 mode-set(view)
//!  Disabled ─────────────────▶ Enabled ◀──────────────────▶ Disabled
//!      │                                  mode-set(edit)
//!      └── mount(TopLevel): stays Disabled, no ready-signal
//! ```
//!
//! Embedding is decided once, when the page mounts.  An embedded page turns
//! edit mode on and announces itself with a single ready-signal.  From then on
//! only `mode-set` messages change the mode.  A `mode-set` that arrives
//! before the mount is an explicit host choice and the mount keeps it.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::protocol::messages::RequestedMode;

/// Whether pointer interactions are intercepted for selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EditMode {
    #[default]
    Disabled,
    Enabled,
}

impl EditMode {
    pub fn is_enabled(&self) -> bool {
        matches!(self, EditMode::Enabled)
    }
}

impl From<RequestedMode> for EditMode {
    fn from(mode: RequestedMode) -> Self {
        match mode {
            RequestedMode::Edit => EditMode::Enabled,
            RequestedMode::View => EditMode::Disabled,
        }
    }
}

/// Where the page is displayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EmbeddingContext {
    /// Displayed directly; no host to talk to.
    TopLevel,
    /// Displayed inside a host's browsing context.
    Embedded,
}

impl EmbeddingContext {
    pub fn from_embedded(embedded: bool) -> Self {
        if embedded {
            EmbeddingContext::Embedded
        } else {
            EmbeddingContext::TopLevel
        }
    }
}

/// Tracks the mode and whether the ready-signal is still owed.
#[derive(Debug, Default)]
pub struct EditModeController {
    mode: EditMode,
    context: Option<EmbeddingContext>,
    ready_sent: bool,
    host_chose: bool,
}

impl EditModeController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handles the page mount.
    ///
    /// Returns `true` when the caller must emit the ready-signal.  That happens
    /// at most once per controller, on the first embedded mount.  Later mounts
    /// are ignored.
    pub fn mount(&mut self, context: EmbeddingContext) -> bool {
        if self.context.is_some() {
            debug!("page already mounted; ignoring repeated mount");
            return false;
        }
        self.context = Some(context);

        match context {
            EmbeddingContext::TopLevel => {
                info!("page mounted top-level; edit mode stays disabled");
                false
            }
            EmbeddingContext::Embedded => {
                if self.host_chose {
                    info!(mode = ?self.mode, "page mounted inside a host; keeping host's mode");
                } else {
                    self.mode = EditMode::Enabled;
                    info!("page mounted inside a host; edit mode enabled");
                }
                if self.ready_sent {
                    false
                } else {
                    self.ready_sent = true;
                    true
                }
            }
        }
    }

    /// Applies a host `mode-set`.  Returns the new mode.
    pub fn apply(&mut self, requested: RequestedMode) -> EditMode {
        let next = EditMode::from(requested);
        if next != self.mode {
            info!(from = ?self.mode, to = ?next, "edit mode changed by host");
        }
        self.mode = next;
        self.host_chose = true;
        next
    }

    pub fn mode(&self) -> EditMode {
        self.mode
    }

    pub fn is_enabled(&self) -> bool {
        self.mode.is_enabled()
    }

    /// Hover highlighting is shown only while edit mode is on.
    pub fn affordances_visible(&self) -> bool {
        self.is_enabled()
    }

    pub fn context(&self) -> Option<EmbeddingContext> {
        self.context
    }

    pub fn ready_sent(&self) -> bool {
        self.ready_sent
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_disabled() {
        let controller = EditModeController::new();
        assert_eq!(controller.mode(), EditMode::Disabled);
        assert!(!controller.affordances_visible());
        assert_eq!(controller.context(), None);
    }

    #[test]
    fn test_embedded_mount_enables_and_signals_once() {
        let mut controller = EditModeController::new();
        assert!(controller.mount(EmbeddingContext::Embedded));
        assert!(controller.is_enabled());
        assert!(controller.ready_sent());
        assert!(!controller.mount(EmbeddingContext::Embedded));
    }

    #[test]
    fn test_top_level_mount_stays_disabled_without_signal() {
        let mut controller = EditModeController::new();
        assert!(!controller.mount(EmbeddingContext::TopLevel));
        assert!(!controller.is_enabled());
        assert!(!controller.ready_sent());
    }

    #[test]
    fn test_mode_set_overrides_mount_state() {
        // Arrange
        let mut controller = EditModeController::new();
        controller.mount(EmbeddingContext::Embedded);

        // Act / Assert
        assert_eq!(controller.apply(RequestedMode::View), EditMode::Disabled);
        assert!(!controller.affordances_visible());
        assert_eq!(controller.apply(RequestedMode::Edit), EditMode::Enabled);
        assert!(controller.affordances_visible());
    }

    #[test]
    fn test_mode_set_before_mount_is_honoured() {
        let mut controller = EditModeController::new();
        controller.apply(RequestedMode::Edit);
        assert!(controller.is_enabled());
    }

    #[test]
    fn test_view_chosen_before_embedded_mount_survives_mount() {
        // Arrange
        let mut controller = EditModeController::new();
        controller.apply(RequestedMode::View);

        // Act
        let signal = controller.mount(EmbeddingContext::Embedded);

        // Assert: the ready-signal is still owed, the host's choice stands
        assert!(signal);
        assert_eq!(controller.mode(), EditMode::Disabled);
    }
}
