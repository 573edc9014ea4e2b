use grouping_records::StoreError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, InteractionError>;

#[derive(Error, Debug)]
pub enum InteractionError {
    /// The entry already belongs to a resolved group
    #[error("Entry {0} already belongs to a group")]
    AlreadyGrouped(String),

    /// The new span would claim an entry of another group
    #[error("Entry {key} is already part of group \"{group}\"")]
    Overlap { key: String, group: String },

    /// A marked anchor is not in the live entry list anymore
    #[error("Marked entries could not be found in the current list")]
    Unresolvable,

    #[error("Both a start and an end entry must be marked")]
    MarksIncomplete,

    /// Host toggle API failed
    #[error("Host error: {0}")]
    Host(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl InteractionError {
    pub fn host(msg: impl Into<String>) -> Self {
        Self::Host(msg.into())
    }

    /// Whether the user should see this failure.
    #[must_use]
    pub const fn is_user_facing(&self) -> bool {
        matches!(
            self,
            Self::AlreadyGrouped(_) | Self::Overlap { .. } | Self::Unresolvable | Self::MarksIncomplete
        )
    }
}
