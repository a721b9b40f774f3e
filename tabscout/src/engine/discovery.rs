//! Phase one: open each search results page and scrape its links.

use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::context::{PhaseState, TaskContext};
use super::models::{DetailLink, LinkGroup, SearchRequest};
use super::session::Phase;
use crate::adapters::{resolve, SiteAdapter};
use crate::browser::{LinksResponse, TabId, TabRequest};
use crate::errors::DriverError;
use crate::events::TabTerminal;
use crate::sync::{BarrierWait, CompletionBarrier};

type GroupState = Arc<Mutex<PhaseState<Vec<LinkGroup>>>>;

/// Runs discovery for every request and returns the groups collected
/// before the barrier released.
pub(crate) async fn run(ctx: &Arc<TaskContext>, requests: &[SearchRequest]) -> (Vec<LinkGroup>, BarrierWait) {
    let barrier = Arc::new(CompletionBarrier::new(requests.len()));
    let state: GroupState = Arc::new(Mutex::new(PhaseState::new(Vec::new())));

    for (index, request) in requests.iter().enumerate() {
        tokio::spawn(discover(
            ctx.clone(),
            index,
            request.clone(),
            state.clone(),
            barrier.clone(),
        ));
    }

    let outcome = barrier.wait(ctx.config.discovery_timeout()).await;
    let groups = state.lock().seal();
    if outcome.is_timed_out() {
        ctx.sweep(Phase::Discovery).await;
    }

    info!(
        task_id = %ctx.task_id,
        groups = groups.len(),
        requests = requests.len(),
        timed_out = outcome.is_timed_out(),
        "Link discovery finished"
    );
    (groups, outcome)
}

async fn discover(
    ctx: Arc<TaskContext>,
    index: usize,
    request: SearchRequest,
    state: GroupState,
    barrier: Arc<CompletionBarrier>,
) {
    let adapter = resolve(&request.target_url);
    let search_url = adapter.build_search_url(&request.target_url, &request.keyword);

    let session = match ctx.open_tab(Phase::Discovery, &index.to_string(), &search_url).await {
        Ok(Some(session)) => session,
        Ok(None) => return,
        Err(e) => {
            warn!(task_id = %ctx.task_id, url = %search_url, kind = e.kind(), error = %e, "Could not open search tab");
            barrier.count_down();
            return;
        }
    };
    let tab_id = session.tab_id();
    debug!(task_id = %ctx.task_id, tab_id, event_id = %session.event_id(), url = %search_url, "Search tab opened");

    match session.terminal().await {
        None => {}
        Some(TabTerminal::Unloaded) => {
            warn!(task_id = %ctx.task_id, tab_id, url = %search_url, "Search tab unloaded before loading");
            barrier.count_down();
            ctx.close_tab(tab_id).await;
        }
        Some(TabTerminal::Loaded) => {
            match scrape_links(&ctx, tab_id, adapter, &request.keyword).await {
                Ok(links) => {
                    let group = LinkGroup {
                        search_url,
                        script_id: adapter.script_id().to_string(),
                        links,
                    };
                    let accepted = state.lock().apply(|groups| groups.push(group));
                    if accepted.is_none() {
                        debug!(task_id = %ctx.task_id, tab_id, "Discarding links that arrived after discovery closed");
                    }
                }
                Err(e) => {
                    warn!(task_id = %ctx.task_id, tab_id, kind = e.kind(), error = %e, "Link scraping failed");
                }
            }
            barrier.count_down();
            ctx.close_tab(tab_id).await;
        }
    }
}

async fn scrape_links(
    ctx: &TaskContext,
    tab_id: TabId,
    adapter: SiteAdapter,
    keyword: &str,
) -> Result<Vec<DetailLink>, DriverError> {
    ctx.driver.inject(tab_id, adapter.script_id()).await?;
    tokio::time::sleep(ctx.config.settle_delay()).await;

    let request = TabRequest::SearchLinks {
        keyword: keyword.to_string(),
    };
    let reply = ctx.driver.send(tab_id, &request).await?;
    if reply.is_none() {
        debug!(task_id = %ctx.task_id, tab_id, "Search page returned no links reply");
    }

    let mut links = LinksResponse::from_reply(reply).links;
    links.truncate(ctx.details_max_num);
    Ok(links.into_iter().map(DetailLink::from).collect())
}
