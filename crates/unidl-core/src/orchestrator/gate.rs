//! One-shot format selection latch.
//!
//! `Idle` and `Selected` are both closed. The only way out of `Open` is a user
//! selection, and `Selected` never reopens: stale "needs selection" rows that
//! arrive after the user answered are suppressed structurally.

use crate::store::Format;

/// Result of observing a `waiting_for_selection` update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateTransition {
    /// Closed -> Open; the picker must be shown.
    Opened,
    /// Already open; offered formats refreshed, picker stays as is.
    AlreadyOpen,
    /// Selection already made, or no formats offered; nothing to show.
    Suppressed,
}

/// Why a selection was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateError {
    NotOpen,
    UnknownFormat,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SelectionGate {
    #[default]
    Idle,
    Open {
        formats: Vec<Format>,
    },
    Selected {
        format_id: String,
    },
}

impl SelectionGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Format chosen by the user, once selected.
    pub fn selected(&self) -> Option<&str> {
        match self {
            SelectionGate::Selected { format_id } => Some(format_id),
            _ => None,
        }
    }

    /// Apply a `waiting_for_selection` update carrying `formats`.
    pub fn observe(&mut self, formats: Option<&[Format]>) -> GateTransition {
        let formats = match formats {
            Some(f) if !f.is_empty() => f,
            _ => return GateTransition::Suppressed,
        };
        match self {
            SelectionGate::Idle => {
                *self = SelectionGate::Open {
                    formats: formats.to_vec(),
                };
                GateTransition::Opened
            }
            SelectionGate::Open { formats: offered } => {
                if offered.as_slice() != formats {
                    *offered = formats.to_vec();
                }
                GateTransition::AlreadyOpen
            }
            SelectionGate::Selected { .. } => GateTransition::Suppressed,
        }
    }

    /// Check that `format_id` can be selected right now, without closing.
    pub fn check(&self, format_id: &str) -> Result<(), GateError> {
        match self {
            SelectionGate::Open { formats } => {
                if formats.iter().any(|f| f.format_id == format_id) {
                    Ok(())
                } else {
                    Err(GateError::UnknownFormat)
                }
            }
            _ => Err(GateError::NotOpen),
        }
    }

    /// Open -> Selected. Permanent for the rest of the job.
    pub fn select(&mut self, format_id: &str) -> Result<(), GateError> {
        self.check(format_id)?;
        *self = SelectionGate::Selected {
            format_id: format_id.to_string(),
        };
        Ok(())
    }
}
