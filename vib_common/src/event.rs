//! Device event commands forwarded to the backend.
//!
//! Purely informational: the last command is stored and passed through,
//! it never influences playback.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Known device events. Unknown input maps to [`EventCommand::None`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum EventCommand {
    /// No event.
    #[default]
    None,
    /// Folding device closed.
    FolderClose,
    /// Folding device opened.
    FolderOpen,
    /// Accessibility intensity boost switched on.
    AccessibilityBoostOn,
    /// Accessibility intensity boost switched off.
    AccessibilityBoostOff,
    /// Folding device closed into tent posture.
    TentClose,
    /// Folding device opened from tent posture.
    TentOpen,
}

impl EventCommand {
    /// All commands in index order.
    pub const ALL: [EventCommand; 7] = [
        Self::None,
        Self::FolderClose,
        Self::FolderOpen,
        Self::AccessibilityBoostOn,
        Self::AccessibilityBoostOff,
        Self::TentClose,
        Self::TentOpen,
    ];

    /// Wire name of the command.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::FolderClose => "FOLDER_CLOSE",
            Self::FolderOpen => "FOLDER_OPEN",
            Self::AccessibilityBoostOn => "ACCESSIBILITY_BOOST_ON",
            Self::AccessibilityBoostOff => "ACCESSIBILITY_BOOST_OFF",
            Self::TentClose => "FOLDER_TENT_CLOSE",
            Self::TentOpen => "FOLDER_TENT_OPEN",
        }
    }

    /// Numeric index passed to backends that key events by position.
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Map a wire name to a command. Never fails: unknown names are `None`.
    pub fn from_name(name: &str) -> Self {
        Self::ALL
            .into_iter()
            .find(|cmd| cmd.as_str() == name)
            .unwrap_or_default()
    }

    /// Map the first whitespace-delimited token of `input`.
    pub fn from_input(input: &str) -> Self {
        input
            .split_whitespace()
            .next()
            .map(Self::from_name)
            .unwrap_or_default()
    }
}

impl fmt::Display for EventCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
