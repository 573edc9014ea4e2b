use crate::host::{scaffold, ContainerToggles, FileHost};
use crate::settings::GroupingSettings;
use crate::view::{ListingSection, ListingView};
use anyhow::{anyhow, bail, Context, Result};
use grouping_engine::{EventSink, GroupingEngine, ReconcileOutcome};
use grouping_interaction::{
    EntryMenuAction, GroupComposer, GroupHeaders, HeaderIntent, HeaderOutcome, Notice,
    NoticeLevel, Notifier, ToggleReport, ToolbarAction, WorldInfoSurface,
};
use grouping_records::{
    resolve_all, GroupPatch, GroupRecord, GroupStatus, GroupStore, HostDocuments, Section,
    StoreError, StoredGroup, WorldInfoStore,
};
use log::{debug, info, warn};
use serde::Serialize;
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

/// Open host file plus the stores built on top of it.
pub struct Workspace {
    host: Arc<FileHost>,
    store: Arc<GroupStore<dyn HostDocuments>>,
    world_info: Arc<WorldInfoStore<dyn HostDocuments>>,
    settings: GroupingSettings,
}

impl Workspace {
    pub fn open(data: &Path, settings: GroupingSettings) -> Result<Self> {
        let host = Arc::new(FileHost::open(data)?);
        let shared: Arc<dyn HostDocuments> = host.clone();
        let store = Arc::new(GroupStore::new(Arc::clone(&shared), settings.store.clone()));
        let world_info = Arc::new(WorldInfoStore::new(shared, settings.store.clone()));
        Ok(Self {
            host,
            store,
            world_info,
            settings,
        })
    }

    /// `explicit`, else the host's active container.
    fn container(&self, explicit: Option<&str>) -> Result<String> {
        explicit
            .map(str::to_string)
            .or_else(|| self.host.active())
            .ok_or_else(|| anyhow!("No container given and the host has no active container"))
    }

    fn keys(&self, container: &str) -> Result<Vec<String>> {
        self.host.ordered_keys(container)
    }

    fn index(&self, container: &str, keys: &[String], raw: i64) -> Result<usize> {
        let len = self.store.read(container, keys)?.len();
        match usize::try_from(raw) {
            Ok(index) if index < len => Ok(index),
            _ => Err(StoreError::IndexOutOfRange { index: raw, len }.into()),
        }
    }

    fn surface(&self) -> WorldInfoSurface<dyn HostDocuments> {
        WorldInfoSurface::new(
            Arc::clone(&self.world_info),
            &self.settings.gesture_config(),
        )
    }
}

/// Notices go to the log; stdout carries only the JSON result.
struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notice: Notice) {
        match notice.level {
            NoticeLevel::Info => info!("{}", notice.message),
            NoticeLevel::Warning => warn!("{}", notice.message),
            NoticeLevel::Error => log::error!("{}", notice.message),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct GroupView {
    pub index: usize,
    #[serde(flatten)]
    pub stored: StoredGroup,
    pub resolution: GroupStatus,
}

#[derive(Debug, Serialize)]
pub struct ListOutput {
    pub container: String,
    pub groups: Vec<GroupView>,
    pub unresolved: usize,
}

#[derive(Debug, Serialize)]
pub struct RenderOutput {
    pub container: String,
    pub outcome: Option<ReconcileOutcome>,
    pub passes: u64,
    pub sections: Vec<ListingSection>,
    pub unresolved: usize,
}

#[derive(Debug, Serialize)]
pub struct BookOutput {
    pub book: String,
    pub sections: Vec<BookSection>,
}

#[derive(Debug, Serialize)]
pub struct BookSection {
    #[serde(flatten)]
    pub section: Section,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<&'static str>,
}

fn record_value(record: &GroupRecord) -> Result<Value> {
    Ok(serde_json::to_value(record.to_stored())?)
}

pub fn run_init(data: &Path, container: &str, keys: &[String], force: bool) -> Result<Value> {
    if data.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", data.display());
    }
    if let Some(parent) = data.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Cannot create {}", parent.display()))?;
    }
    let document = scaffold(container, keys);
    std::fs::write(data, serde_json::to_vec_pretty(&document)?)
        .with_context(|| format!("Cannot write {}", data.display()))?;
    info!("initialized {} with {} entries", data.display(), keys.len());
    Ok(json!({ "path": data.display().to_string(), "container": container, "entries": keys.len() }))
}

pub fn run_list(ws: &Workspace, container: Option<&str>) -> Result<ListOutput> {
    let container = ws.container(container)?;
    let keys = ws.keys(&container)?;
    let records = ws.store.read(&container, &keys)?;
    let resolution = resolve_all(&records, &keys);
    let unresolved = resolution.unresolved_count();
    let groups = resolution
        .groups
        .into_iter()
        .enumerate()
        .map(|(index, group)| GroupView {
            index,
            stored: group.record.to_stored(),
            resolution: group.status,
        })
        .collect();
    Ok(ListOutput {
        container,
        groups,
        unresolved,
    })
}

pub async fn run_add(
    ws: &Workspace,
    container: Option<&str>,
    start: &str,
    end: &str,
    name: &str,
) -> Result<Value> {
    let container = ws.container(container)?;
    let keys = ws.keys(&container)?;
    let composer = GroupComposer::new(Arc::clone(&ws.store), Arc::new(LogNotifier));
    let record = composer
        .create(&container, start, end, name, &keys)
        .await?;
    record_value(&record)
}

pub async fn run_update(
    ws: &Workspace,
    container: Option<&str>,
    index: i64,
    name: Option<String>,
    start: Option<String>,
    end: Option<String>,
) -> Result<Value> {
    if name.is_none() && start.is_none() && end.is_none() {
        bail!("Nothing to update: pass --name, --start or --end");
    }
    let container = ws.container(container)?;
    let keys = ws.keys(&container)?;
    let index = ws.index(&container, &keys, index)?;
    let toggles = Arc::new(ContainerToggles::new(Arc::clone(&ws.host), &container));
    let headers = GroupHeaders::new(Arc::clone(&ws.store), toggles);

    let mut record = None;
    if start.is_some() || end.is_some() {
        let current = ws.store.read(&container, &keys)?.swap_remove(index);
        record = Some(match current.anchor.keys() {
            Some((s, e)) => {
                let intent = HeaderIntent::Reassign {
                    start: start.unwrap_or_else(|| s.to_string()),
                    end: end.unwrap_or_else(|| e.to_string()),
                };
                match headers.apply(&container, index, intent, &keys).await? {
                    HeaderOutcome::Reassigned(record) => record,
                    other => bail!("unexpected header outcome {other:?}"),
                }
            }
            // Flagged records have no current anchors; the store rejects half a patch.
            None => {
                let patch = GroupPatch {
                    start,
                    end,
                    name: None,
                };
                ws.store.update(&container, index, patch, &keys).await?
            }
        });
    }
    if let Some(name) = name {
        match headers
            .apply(&container, index, HeaderIntent::Rename { name }, &keys)
            .await?
        {
            HeaderOutcome::Renamed(renamed) => record = Some(renamed),
            other => bail!("unexpected header outcome {other:?}"),
        }
    }
    let record = record.ok_or_else(|| anyhow!("group {index} was not updated"))?;
    record_value(&record)
}

pub async fn run_remove(ws: &Workspace, container: Option<&str>, index: i64) -> Result<Value> {
    let container = ws.container(container)?;
    let keys = ws.keys(&container)?;
    let index = ws.index(&container, &keys, index)?;
    let removed = ws.store.remove(&container, index, &keys).await?;
    record_value(&removed)
}

pub async fn run_migrate(ws: &Workspace, container: Option<&str>) -> Result<Value> {
    let container = ws.container(container)?;
    let keys = ws.keys(&container)?;
    let kept = ws.store.migrate(&container, &keys).await?;
    let unresolved = ws
        .store
        .read(&container, &keys)?
        .iter()
        .filter(|record| record.is_unresolved())
        .count();
    Ok(json!({ "container": container, "groups": kept, "unresolved": unresolved }))
}

pub async fn run_toggle(ws: &Workspace, container: Option<&str>, index: i64) -> Result<ToggleReport> {
    let container = ws.container(container)?;
    let keys = ws.keys(&container)?;
    let index = ws.index(&container, &keys, index)?;
    let toggles = Arc::new(ContainerToggles::new(Arc::clone(&ws.host), &container));
    let headers = GroupHeaders::new(Arc::clone(&ws.store), toggles);
    match headers
        .apply(&container, index, HeaderIntent::ToggleAll, &keys)
        .await?
    {
        HeaderOutcome::Toggled(report) => Ok(report),
        other => bail!("unexpected header outcome {other:?}"),
    }
}

/// One engine pass against a headless view, fast-forwarding retry timers.
pub fn run_render(ws: &Workspace, container: Option<&str>) -> Result<RenderOutput> {
    let container = ws.container(container)?;
    let keys = ws.keys(&container)?;
    if ws.host.active().as_deref() != Some(container.as_str()) {
        // The engine always follows the active container.
        bail!("render needs the active container ({container} is not active)");
    }

    let view = ListingView::new(keys);
    let mut engine = GroupingEngine::new(view, Arc::clone(&ws.store), ws.settings.sync_config())?;
    let (sink, _events) = EventSink::channel();
    let mut now = Instant::now();
    engine.init(sink, now);
    loop {
        if let Some(outcome) = engine.run_due(now) {
            debug!("render pass: {outcome:?}");
        }
        match engine.next_deadline() {
            Some(next) => now = now.max(next),
            None => break,
        }
    }

    let status = engine.status().clone();
    let output = RenderOutput {
        container,
        outcome: status.last_outcome,
        passes: status.passes,
        sections: engine.view().sections(),
        unresolved: engine.view().unresolved(),
    };
    engine.destroy();
    Ok(output)
}

pub fn run_config(settings: &GroupingSettings) -> Result<Value> {
    Ok(serde_json::to_value(settings)?)
}

pub fn run_wi_list(ws: &Workspace, book: &str, entries: Option<Vec<u64>>) -> Result<BookOutput> {
    let entries = entries.unwrap_or_else(|| ws.host.book_entries(book));
    let sections = ws
        .surface()
        .sections(book, &entries)?
        .into_iter()
        .map(|section| BookSection {
            placeholder: section.placeholder(),
            section,
        })
        .collect();
    Ok(BookOutput {
        book: book.to_string(),
        sections,
    })
}

pub async fn run_wi_create(ws: &Workspace, book: &str, name: &str) -> Result<Value> {
    let id = ws
        .surface()
        .toolbar(
            book,
            ToolbarAction::CreateGroup {
                name: name.to_string(),
            },
        )
        .await?;
    Ok(json!({ "book": book, "id": id }))
}

pub async fn run_wi_add(ws: &Workspace, book: &str, group: &str, uid: u64) -> Result<Value> {
    let action = EntryMenuAction::AddToGroup {
        group_id: group.to_string(),
    };
    let group = ws.surface().apply_entry_action(book, uid, action).await?;
    Ok(json!({ "book": book, "uid": uid, "group": group }))
}

pub async fn run_wi_remove(ws: &Workspace, book: &str, uid: u64) -> Result<Value> {
    let surface = ws.surface();
    let from = surface.entry_menu(book, uid)?.current;
    surface
        .apply_entry_action(book, uid, EntryMenuAction::RemoveFromGroup)
        .await?;
    Ok(json!({ "book": book, "uid": uid, "removed_from": from }))
}

pub async fn run_wi_move(ws: &Workspace, book: &str, from: usize, to: usize) -> Result<Value> {
    let mut surface = ws.surface();
    surface.begin_drag(from);
    surface.drag_over(to);
    let moved = surface.drop_group(book).await?;
    Ok(json!({ "book": book, "moved": moved }))
}

pub async fn run_wi_rename(ws: &Workspace, book: &str, id: &str, name: &str) -> Result<Value> {
    ws.surface().rename_group(book, id, name).await?;
    Ok(json!({ "book": book, "id": id, "name": name }))
}

pub async fn run_wi_delete(ws: &Workspace, book: &str, id: &str) -> Result<Value> {
    ws.surface().delete_group(book, id).await?;
    Ok(json!({ "book": book, "id": id, "deleted": true }))
}

pub async fn run_wi_toggle(ws: &Workspace, book: &str, id: &str) -> Result<Value> {
    let collapsed = ws.surface().toggle_group(book, id).await?;
    Ok(json!({ "book": book, "id": id, "collapsed": collapsed }))
}

pub async fn run_wi_collapse_all(ws: &Workspace, book: &str, collapsed: bool) -> Result<Value> {
    let action = if collapsed {
        ToolbarAction::CollapseAll
    } else {
        ToolbarAction::ExpandAll
    };
    ws.surface().toolbar(book, action).await?;
    Ok(json!({ "book": book, "collapsed": collapsed }))
}
