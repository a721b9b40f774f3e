//! Phase two: visit every discovered link and scrape its content.

use parking_lot::Mutex;
use serde_json::json;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::context::{PhaseState, TaskContext};
use super::models::SearchInfo;
use super::session::Phase;
use crate::browser::{ContentResponse, TabId, TabRequest};
use crate::errors::DriverError;
use crate::events::TabTerminal;
use crate::sync::{BarrierWait, CompletionBarrier};

type InfoState = Arc<Mutex<PhaseState<SearchInfo>>>;

/// A link queued for extraction, addressed by its position in the report.
#[derive(Debug, Clone)]
struct WorkItem {
    group: usize,
    index: usize,
    url: String,
    script_id: String,
}

impl WorkItem {
    fn unit(&self) -> String {
        format!("{}:{}", self.group, self.index)
    }
}

fn worklist(info: &SearchInfo) -> Vec<WorkItem> {
    info.result
        .iter()
        .enumerate()
        .flat_map(|(group, link_group)| {
            link_group
                .links
                .iter()
                .enumerate()
                .map(move |(index, link)| WorkItem {
                    group,
                    index,
                    url: link.url.clone(),
                    script_id: link_group.script_id.clone(),
                })
        })
        .collect()
}

/// Extracts content for every link in `info` and returns the sealed report.
pub(crate) async fn run(ctx: &Arc<TaskContext>, mut info: SearchInfo) -> (SearchInfo, BarrierWait) {
    let items = worklist(&info);
    info.total = items.len();
    info.running = 0;
    info.succeed = 0;
    info.failed = 0;
    info.failed_links.clear();

    let barrier = Arc::new(CompletionBarrier::new(items.len()));
    let state: InfoState = Arc::new(Mutex::new(PhaseState::new(info)));

    for item in items {
        tokio::spawn(extract(ctx.clone(), item, state.clone(), barrier.clone()));
    }

    let outcome = barrier.wait(ctx.config.extraction_timeout()).await;
    let mut info = state.lock().seal();
    info.extraction_timed_out = outcome.is_timed_out();
    if outcome.is_timed_out() {
        ctx.sweep(Phase::Extraction).await;
    }

    info!(
        task_id = %ctx.task_id,
        total = info.total,
        succeed = info.succeed,
        failed = info.failed,
        running = info.running,
        timed_out = outcome.is_timed_out(),
        "Content extraction finished"
    );
    (info, outcome)
}

/// Why a link produced no content.
#[derive(Debug)]
enum LinkFailure {
    Driver(DriverError),
    Reply(String),
}

impl LinkFailure {
    fn kind(&self) -> &'static str {
        match self {
            Self::Driver(e) => e.kind(),
            Self::Reply(_) => "reply",
        }
    }
}

impl fmt::Display for LinkFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Driver(e) => write!(f, "{e}"),
            Self::Reply(reason) => write!(f, "{reason}"),
        }
    }
}

impl From<DriverError> for LinkFailure {
    fn from(e: DriverError) -> Self {
        Self::Driver(e)
    }
}

fn failure_payload(url: &str, failure: &LinkFailure) -> serde_json::Value {
    json!({"url": url, "kind": failure.kind(), "reason": failure.to_string()})
}

async fn extract(ctx: Arc<TaskContext>, item: WorkItem, state: InfoState, barrier: Arc<CompletionBarrier>) {
    let session = match ctx.open_tab(Phase::Extraction, &item.unit(), &item.url).await {
        Ok(Some(session)) => session,
        Ok(None) => return,
        Err(e) => {
            warn!(task_id = %ctx.task_id, url = %item.url, kind = e.kind(), error = %e, "Could not open content tab");
            let recorded = state
                .lock()
                .apply(|info| info.record_failure(item.group, item.index, false));
            if recorded.is_some() {
                ctx.sink.try_emit(
                    "extraction.link_failed",
                    Some(failure_payload(&item.url, &LinkFailure::Driver(e))),
                );
            }
            barrier.count_down();
            return;
        }
    };
    let tab_id = session.tab_id();

    state.lock().apply(SearchInfo::mark_running);
    debug!(task_id = %ctx.task_id, tab_id, event_id = %session.event_id(), url = %item.url, "Content tab opened");

    match session.terminal().await {
        None => {}
        Some(TabTerminal::Unloaded) => {
            warn!(task_id = %ctx.task_id, tab_id, url = %item.url, "Content tab unloaded before loading");
            if state.lock().apply(SearchInfo::record_loss).is_some() {
                ctx.sink
                    .try_emit("extraction.link_lost", Some(json!({"url": item.url})));
            }
            barrier.count_down();
            ctx.close_tab(tab_id).await;
        }
        Some(TabTerminal::Loaded) => {
            let outcome = scrape_content(&ctx, tab_id, &item.script_id).await;
            let (event_type, payload) = match &outcome {
                Ok(response) => (
                    "extraction.link_succeeded",
                    json!({"url": item.url, "content_len": response.content.len()}),
                ),
                Err(failure) => {
                    warn!(task_id = %ctx.task_id, tab_id, url = %item.url, kind = failure.kind(), reason = %failure, "Content extraction failed");
                    ("extraction.link_failed", failure_payload(&item.url, failure))
                }
            };

            let committed = state.lock().apply(|info| match outcome {
                Ok(response) => info.record_success(item.group, item.index, response),
                Err(_) => info.record_failure(item.group, item.index, true),
            });

            if committed.is_some() {
                ctx.sink.try_emit(event_type, Some(payload));
            } else {
                debug!(task_id = %ctx.task_id, tab_id, url = %item.url, "Discarding content that arrived after extraction closed");
                ctx.sink
                    .try_emit("extraction.link_discarded", Some(json!({"url": item.url})));
            }
            barrier.count_down();
            ctx.close_tab(tab_id).await;
        }
    }
}

async fn scrape_content(ctx: &TaskContext, tab_id: TabId, script_id: &str) -> Result<ContentResponse, LinkFailure> {
    ctx.driver.inject(tab_id, script_id).await?;
    tokio::time::sleep(ctx.config.settle_delay()).await;

    let reply = ctx.driver.send(tab_id, &TabRequest::PageContent).await?;
    ContentResponse::from_reply(reply).map_err(LinkFailure::Reply)
}
