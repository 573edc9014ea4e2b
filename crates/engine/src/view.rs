//! Boundary to the live, host-rendered entry list.

use crate::Result;
use grouping_records::Span;
use tokio::sync::mpsc;

/// Identity of the container node currently rendering the entry list.
///
/// Changes whenever the host replaces the whole panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ViewId(pub u64);

/// What the presentation shows for one group container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupLabel {
    pub id: String,
    pub name: String,
    /// Position of the group among rendered groups.
    pub ordinal: usize,
    pub span: Span,
}

/// Node touched by a mutation, as classified by the adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeRef {
    /// A recognized entry element, with its identifier if it has one.
    Entry { key: Option<String> },
    /// A group container element created by this engine.
    GroupWrapper,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationRecord {
    ChildList {
        added: Vec<NodeRef>,
        removed: Vec<NodeRef>,
    },
    Attribute {
        target: NodeRef,
        attribute: String,
    },
}

/// Everything the synchronizer reacts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewEvent {
    /// Batch delivered by the primary observer on the entry container.
    Mutations(Vec<MutationRecord>),
    /// The coarse observer saw the container node itself being replaced.
    ContainerReplaced,
    /// Host settings or theme changed.
    SettingsChanged,
}

/// How a mutation batch should be scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Relevance {
    Ignored,
    /// Entries were added, removed or re-keyed.
    Entries,
    /// Group wrappers were added or removed.
    Wrappers,
}

/// Classify a mutation batch. Wrapper churn outranks entry churn.
#[must_use]
pub fn classify(records: &[MutationRecord], identifier_attribute: &str) -> Relevance {
    records
        .iter()
        .map(|record| match record {
            MutationRecord::ChildList { added, removed } => added
                .iter()
                .chain(removed)
                .map(|node| match node {
                    NodeRef::GroupWrapper => Relevance::Wrappers,
                    NodeRef::Entry { .. } => Relevance::Entries,
                    NodeRef::Other => Relevance::Ignored,
                })
                .max()
                .unwrap_or(Relevance::Ignored),
            MutationRecord::Attribute { target, attribute } => match target {
                NodeRef::Entry { .. } if attribute == identifier_attribute => Relevance::Entries,
                _ => Relevance::Ignored,
            },
        })
        .max()
        .unwrap_or(Relevance::Ignored)
}

/// Sending half handed to observers and listeners.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<ViewEvent>,
}

impl EventSink {
    #[must_use]
    pub fn new(tx: mpsc::UnboundedSender<ViewEvent>) -> Self {
        Self { tx }
    }

    /// Fresh sink plus its receiving end.
    #[must_use]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ViewEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Deliver an event; `false` once the engine is gone.
    pub fn emit(&self, event: ViewEvent) -> bool {
        self.tx.send(event).is_ok()
    }
}

/// Live entry list owned by the host.
///
/// Reads and structural writes happen synchronously inside a reconciliation
/// pass; mutation delivery is asynchronous through the [`EventSink`] given to
/// [`ViewAdapter::observe`].
pub trait ViewAdapter: Send {
    /// Identity of the current container, `None` when it is not mounted.
    fn view_id(&self) -> Option<ViewId>;

    /// Stable keys of the entries in display order.
    fn ordered_keys(&self) -> Result<Vec<String>>;

    /// Whether group containers from a previous pass are still present.
    fn has_presentation(&self) -> bool;

    /// Wrap the entries with `keys` (contiguous, in order) into one group container.
    fn wrap_range(&mut self, keys: &[String], label: &GroupLabel) -> Result<()>;

    /// Remove every group container, leaving entries in place.
    fn unwrap_all(&mut self) -> Result<()>;

    /// Start delivering container mutations and container replacement to `sink`.
    fn observe(&mut self, sink: EventSink) -> Result<()>;

    /// Stop delivering events. Safe to call when not observing.
    fn disconnect(&mut self);

    /// Aggregate "N groups could not be resolved" indicator.
    fn show_unresolved_notice(&mut self, _count: usize) {}
}

/// Opaque handle returned by [`SettingsEvents::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

/// Host settings-changed notifications.
pub trait SettingsEvents: Send + Sync {
    /// `None` when the host has no event API; the engine runs without bursts.
    fn subscribe(&self, sink: EventSink) -> Option<SubscriptionId>;

    /// Must tolerate unknown or already-removed ids.
    fn unsubscribe(&self, id: SubscriptionId);
}
