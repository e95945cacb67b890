use crate::error::InteractionError;

const OPTIONS_PREFIX: &str = "backup-options-";
const CONFIRM_PREFIX: &str = "backup-confirm-";
const CANCEL_PREFIX: &str = "backup-cancel-";

/// A button or select-menu interaction on a restore prompt, identified by
/// the component's custom ID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComponentAction {
    SelectOptions(String),
    Confirm(String),
    Cancel(String),
}

impl ComponentAction {
    pub fn parse(custom_id: &str) -> Result<Self, InteractionError> {
        let action = if let Some(id) = custom_id.strip_prefix(OPTIONS_PREFIX) {
            Self::SelectOptions(id.to_string())
        } else if let Some(id) = custom_id.strip_prefix(CONFIRM_PREFIX) {
            Self::Confirm(id.to_string())
        } else if let Some(id) = custom_id.strip_prefix(CANCEL_PREFIX) {
            Self::Cancel(id.to_string())
        } else {
            return Err(InteractionError::UnknownComponent(custom_id.to_string()));
        };

        if action.backup_id().is_empty() {
            return Err(InteractionError::UnknownComponent(custom_id.to_string()));
        }
        Ok(action)
    }

    pub fn backup_id(&self) -> &str {
        match self {
            Self::SelectOptions(id) | Self::Confirm(id) | Self::Cancel(id) => id,
        }
    }

    pub fn custom_id(&self) -> String {
        match self {
            Self::SelectOptions(id) => format!("{OPTIONS_PREFIX}{id}"),
            Self::Confirm(id) => format!("{CONFIRM_PREFIX}{id}"),
            Self::Cancel(id) => format!("{CANCEL_PREFIX}{id}"),
        }
    }
}
