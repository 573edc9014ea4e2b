use crate::engine::{EngineStatus, GroupingEngine};
use crate::view::{EventSink, ViewAdapter, ViewEvent};
use crate::{EngineError, Result};
use log::debug;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{self, Instant};

enum EngineCommand {
    Refresh,
    RefreshBurst,
    Destroy { done: oneshot::Sender<()> },
    Shutdown,
}

/// Handle to a synchronizer running on its own tokio task.
#[derive(Clone)]
pub struct EngineHandle {
    inner: Arc<EngineHandleInner>,
}

struct EngineHandleInner {
    command_tx: mpsc::Sender<EngineCommand>,
    status_rx: watch::Receiver<EngineStatus>,
    sink: EventSink,
}

/// Initialize `engine` and drive it on a spawned task.
///
/// Must be called from within a tokio runtime.
pub fn spawn_engine<V>(mut engine: GroupingEngine<V>) -> EngineHandle
where
    V: ViewAdapter + 'static,
{
    let (sink, event_rx) = EventSink::channel();
    let (command_tx, command_rx) = mpsc::channel(16);
    engine.init(sink.clone(), Instant::now().into_std());
    let (status_tx, status_rx) = watch::channel(engine.status().clone());

    spawn_engine_loop(engine, event_rx, command_rx, status_tx);

    EngineHandle {
        inner: Arc::new(EngineHandleInner {
            command_tx,
            status_rx,
            sink,
        }),
    }
}

fn spawn_engine_loop<V>(
    mut engine: GroupingEngine<V>,
    mut event_rx: mpsc::UnboundedReceiver<ViewEvent>,
    mut command_rx: mpsc::Receiver<EngineCommand>,
    status_tx: watch::Sender<EngineStatus>,
) where
    V: ViewAdapter + 'static,
{
    tokio::spawn(async move {
        loop {
            let next_deadline = engine.next_deadline().map(Instant::from_std);

            tokio::select! {
                biased;
                Some(event) = event_rx.recv() => {
                    engine.handle_event(event, Instant::now().into_std());
                }
                cmd = command_rx.recv() => {
                    let now = Instant::now().into_std();
                    match cmd {
                        Some(EngineCommand::Refresh) => {
                            engine.refresh(now);
                        }
                        Some(EngineCommand::RefreshBurst) => {
                            engine.refresh_burst(now);
                        }
                        Some(EngineCommand::Destroy { done }) => {
                            engine.destroy();
                            let _ = status_tx.send(engine.status().clone());
                            let _ = done.send(());
                            break;
                        }
                        Some(EngineCommand::Shutdown) | None => {
                            engine.destroy();
                            break;
                        }
                    }
                }
                () = async {
                    if let Some(deadline) = next_deadline {
                        time::sleep_until(deadline).await;
                    }
                }, if next_deadline.is_some() => {
                    engine.run_due(Instant::now().into_std());
                }
            }
            let _ = status_tx.send(engine.status().clone());
        }
        debug!("grouping engine loop stopped");
    });
}

impl EngineHandle {
    /// Schedule a pass on the next tick.
    pub async fn refresh(&self) -> Result<()> {
        self.send(EngineCommand::Refresh).await
    }

    /// Schedule a settings-change refresh burst.
    pub async fn refresh_burst(&self) -> Result<()> {
        self.send(EngineCommand::RefreshBurst).await
    }

    /// Tear down and wait until the view is restored.
    pub async fn destroy(&self) -> Result<()> {
        let (done, wait) = oneshot::channel();
        self.send(EngineCommand::Destroy { done }).await?;
        wait.await.map_err(|_| EngineError::Shutdown)
    }

    /// Sink for host-side observers that live outside the view adapter.
    #[must_use]
    pub fn event_sink(&self) -> EventSink {
        self.inner.sink.clone()
    }

    #[must_use]
    pub fn status(&self) -> EngineStatus {
        self.inner.status_rx.borrow().clone()
    }

    #[must_use]
    pub fn status_stream(&self) -> watch::Receiver<EngineStatus> {
        self.inner.status_rx.clone()
    }

    async fn send(&self, cmd: EngineCommand) -> Result<()> {
        self.inner
            .command_tx
            .send(cmd)
            .await
            .map_err(|_| EngineError::Shutdown)
    }
}

impl Drop for EngineHandle {
    fn drop(&mut self) {
        if Arc::strong_count(&self.inner) == 1 {
            let _ = self.inner.command_tx.try_send(EngineCommand::Shutdown);
        }
    }
}
