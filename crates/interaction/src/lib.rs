//! # Grouping Interaction
//!
//! Turns raw pointer input on entry lists into group edits.
//!
//! - [`ClickSequencer`]: three clicks on one entry open the group menu
//! - [`GroupComposer`]: mark start and end, name, overlap check, store
//! - [`GroupHeaders`]: rename, delete, reassign and toggle-all on a group
//! - [`WorldInfoSurface`]: toolbar, long-press entry menu, group drag reorder

mod click;
mod config;
mod error;
mod header;
mod long_press;
mod marks;
mod notice;
mod toggle;
mod world_info;

pub use click::{ClickOutcome, ClickSequencer, ClickTarget};
pub use config::GestureConfig;
pub use error::{InteractionError, Result};
pub use header::{GroupHeaders, HeaderIntent, HeaderOutcome};
pub use long_press::{LongPress, Point};
pub use marks::{check_new_span, GroupComposer, MarkBuffer, MarkState, MenuAction};
pub use notice::{unresolved_notice, Notice, NoticeLevel, NoticeLog, Notifier};
pub use toggle::{group_state, toggle_all, EntryToggles, ToggleReport, ToggleState};
pub use world_info::{EntryMenu, EntryMenuAction, GroupDrag, ToolbarAction, WorldInfoSurface};
