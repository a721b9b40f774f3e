//! Scenario tests for the research engine.

#[cfg(test)]
mod tests {
    use crate::config::EngineConfig;
    use crate::engine::{ResearchEngine, SearchRequest, SESSION_TABLE_SUBSCRIBER};
    use crate::errors::ResearchError;
    use crate::events::CollectingEventSink;
    use crate::testing::{content_reply, links_reply, PageScript, ScriptedBrowser};
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    const GOOGLE_AI: &str = "https://www.google.com/search?q=ai";

    fn fast_config() -> EngineConfig {
        EngineConfig::default()
            .with_discovery_timeout(Duration::from_millis(500))
            .with_extraction_timeout(Duration::from_millis(500))
            .with_settle_delay(Duration::from_millis(5))
    }

    fn engine_over(browser: &Arc<ScriptedBrowser>, config: EngineConfig) -> ResearchEngine {
        let engine = ResearchEngine::new(browser.clone(), config);
        browser.attach(engine.lifecycle());
        engine
    }

    fn google(keyword: &str) -> Vec<SearchRequest> {
        vec![SearchRequest::new("https://google.com", keyword)]
    }

    /// Scripts `count` result links under `base` that all return content.
    fn with_content_pages(mut browser: ScriptedBrowser, base: &str, count: usize) -> ScriptedBrowser {
        for i in 0..count {
            browser = browser.with_page(
                format!("{base}/{i}"),
                PageScript::replies(content_reply(&format!("Page {i}"), &format!("body {i}"))),
            );
        }
        browser
    }

    #[tokio::test]
    async fn test_google_search_extracts_every_link() {
        let browser = ScriptedBrowser::new()
            .with_page(GOOGLE_AI, PageScript::replies(links_reply("https://r", 5)));
        let browser = Arc::new(with_content_pages(browser, "https://r", 5));
        let engine = engine_over(&browser, fast_config());

        let info = engine.run(&google("ai"), 5, None).await.unwrap();

        assert_eq!(info.result.len(), 1);
        assert_eq!(info.result[0].script_id, "google");
        assert_eq!(info.total, 5);
        assert_eq!(info.succeed, 5);
        assert_eq!(info.failed, 0);
        assert_eq!(info.running, 0);
        assert!(info.is_consistent());
        assert!(info.links().all(|link| link.has_content()));
        assert!(!info.discovery_timed_out);
        assert!(!info.extraction_timed_out);
        assert!(info.finished_at.is_some());

        assert!(browser
            .injections()
            .iter()
            .any(|(_, script)| script == "google"));
        assert!(browser.open_tabs().is_empty());
        assert_eq!(engine.pending_sessions(), 0);
    }

    #[tokio::test]
    async fn test_unloaded_search_tab_contributes_nothing() {
        let browser = Arc::new(ScriptedBrowser::new().with_page(GOOGLE_AI, PageScript::Unloads));
        let config = fast_config().with_discovery_timeout(Duration::from_secs(5));
        let engine = engine_over(&browser, config);

        let start = Instant::now();
        let info = engine.run(&google("ai"), 5, None).await.unwrap();

        assert!(start.elapsed() < Duration::from_secs(1));
        assert!(info.result.is_empty());
        assert_eq!(info.total, 0);
        assert!(!info.discovery_timed_out);
        assert!(browser.open_tabs().is_empty());
    }

    #[tokio::test]
    async fn test_silent_link_counts_as_failure() {
        let browser = ScriptedBrowser::new()
            .with_page(GOOGLE_AI, PageScript::replies(links_reply("https://r", 5)));
        let browser = with_content_pages(browser, "https://r", 5)
            .with_page("https://r/3", PageScript::silent());
        let browser = Arc::new(browser);
        let engine = engine_over(&browser, fast_config());

        let info = engine.run(&google("ai"), 5, None).await.unwrap();

        assert_eq!(info.total, 5);
        assert_eq!(info.succeed, 4);
        assert_eq!(info.failed, 1);
        assert_eq!(info.failed_links.len(), 1);
        assert_eq!(info.failed_links[0].url, "https://r/3");
        assert!(info.is_consistent());
    }

    #[tokio::test]
    async fn test_details_max_num_truncates_candidates() {
        let browser = ScriptedBrowser::new()
            .with_page(GOOGLE_AI, PageScript::replies(links_reply("https://r", 10)));
        let browser = Arc::new(with_content_pages(browser, "https://r", 10));
        let engine = engine_over(&browser, fast_config());

        let info = engine.run(&google("ai"), 2, None).await.unwrap();

        assert_eq!(info.total, 2);
        assert_eq!(info.result[0].links.len(), 2);
        assert_eq!(info.succeed, 2);
        let opened = browser.opened_urls();
        assert!(opened.contains(&"https://r/0".to_string()));
        assert!(opened.contains(&"https://r/1".to_string()));
        assert!(!opened.contains(&"https://r/2".to_string()));
    }

    #[tokio::test]
    async fn test_hanging_search_tab_is_closed_at_timeout() {
        let browser = Arc::new(ScriptedBrowser::new().with_page(GOOGLE_AI, PageScript::Hangs));
        let config = fast_config().with_discovery_timeout(Duration::from_millis(100));
        let engine = engine_over(&browser, config);

        let info = engine.run(&google("ai"), 5, None).await.unwrap();

        assert!(info.discovery_timed_out);
        assert!(info.result.is_empty());
        let tab = browser.tab_for(GOOGLE_AI).unwrap();
        assert!(browser.closed_tabs().contains(&tab));
        assert_eq!(engine.pending_sessions(), 0);
        assert!(engine.lifecycle().is_subscribed(SESSION_TABLE_SUBSCRIBER));
        assert_eq!(engine.lifecycle().len(), 1);
    }

    #[tokio::test]
    async fn test_hanging_link_times_out_extraction() {
        let browser = ScriptedBrowser::new()
            .with_page(GOOGLE_AI, PageScript::replies(links_reply("https://r", 3)));
        let browser = with_content_pages(browser, "https://r", 3)
            .with_page("https://r/1", PageScript::Hangs);
        let browser = Arc::new(browser);
        let config = fast_config().with_extraction_timeout(Duration::from_millis(150));
        let engine = engine_over(&browser, config);

        let info = engine.run(&google("ai"), 5, None).await.unwrap();

        assert!(info.extraction_timed_out);
        assert_eq!(info.total, 3);
        assert_eq!(info.succeed, 2);
        assert_eq!(info.failed, 0);
        assert_eq!(info.running, 1);
        assert!(info.is_consistent());
        assert!(browser.open_tabs().is_empty());
        assert_eq!(engine.pending_sessions(), 0);
    }

    #[tokio::test]
    async fn test_late_content_is_discarded() {
        let browser = ScriptedBrowser::new()
            .with_page(GOOGLE_AI, PageScript::replies(links_reply("https://r", 2)));
        let browser = with_content_pages(browser, "https://r", 2).with_page(
            "https://r/0",
            PageScript::replies_after(content_reply("Slow", "late"), Duration::from_millis(300)),
        );
        let browser = Arc::new(browser);
        let sink = Arc::new(CollectingEventSink::new());
        let config = fast_config().with_extraction_timeout(Duration::from_millis(100));
        let engine = engine_over(&browser, config).with_event_sink(sink.clone());

        let info = engine.run(&google("ai"), 5, None).await.unwrap();

        assert!(info.extraction_timed_out);
        assert_eq!(info.succeed, 1);
        assert!(info.result[0].links[0].content.is_none());

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(sink.count("extraction.link_discarded"), 1);
        assert!(browser.open_tabs().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_complete_events_count_once() {
        let browser = ScriptedBrowser::new()
            .with_page(GOOGLE_AI, PageScript::replies(links_reply("https://r", 1)));
        let browser = Arc::new(with_content_pages(browser, "https://r", 1));
        let engine = engine_over(&browser, fast_config());

        let info = engine.run(&google("ai"), 5, None).await.unwrap();

        assert_eq!(info.succeed, 1);
        assert_eq!(
            browser
                .requests()
                .iter()
                .filter(|(tab, _)| Some(*tab) == browser.tab_for("https://r/0"))
                .count(),
            1
        );
    }

    #[tokio::test]
    async fn test_link_tab_open_failure_is_recorded() {
        let browser = ScriptedBrowser::new()
            .with_page(GOOGLE_AI, PageScript::replies(links_reply("https://r", 2)));
        let browser = with_content_pages(browser, "https://r", 2)
            .with_page("https://r/1", PageScript::FailsToOpen);
        let browser = Arc::new(browser);
        let engine = engine_over(&browser, fast_config());

        let info = engine.run(&google("ai"), 5, None).await.unwrap();

        assert_eq!(info.succeed, 1);
        assert_eq!(info.failed, 1);
        assert_eq!(info.failed_links[0].url, "https://r/1");
        assert_eq!(info.running, 0);
        assert!(!info.extraction_timed_out);
    }

    #[tokio::test]
    async fn test_unloaded_link_is_lost() {
        let browser = ScriptedBrowser::new()
            .with_page(GOOGLE_AI, PageScript::replies(links_reply("https://r", 2)));
        let browser = with_content_pages(browser, "https://r", 2)
            .with_page("https://r/0", PageScript::Unloads);
        let browser = Arc::new(browser);
        let sink = Arc::new(CollectingEventSink::new());
        let engine = engine_over(&browser, fast_config()).with_event_sink(sink.clone());

        let info = engine.run(&google("ai"), 5, None).await.unwrap();

        assert_eq!(info.total, 2);
        assert_eq!(info.succeed, 1);
        assert_eq!(info.failed, 0);
        assert_eq!(info.running, 0);
        assert!(!info.extraction_timed_out);
        assert_eq!(sink.count("extraction.link_lost"), 1);
    }

    #[tokio::test]
    async fn test_search_injection_failure_skips_group() {
        let browser = ScriptedBrowser::new()
            .with_page(GOOGLE_AI, PageScript::FailsInjection)
            .with_page(
                "https://www.bing.com/search?q=ai",
                PageScript::replies(links_reply("https://b", 1)),
            );
        let browser = Arc::new(with_content_pages(browser, "https://b", 1));
        let engine = engine_over(&browser, fast_config());
        let requests = vec![
            SearchRequest::new("https://google.com", "ai"),
            SearchRequest::new("https://www.bing.com", "ai"),
        ];

        let info = engine.run(&requests, 5, None).await.unwrap();

        assert_eq!(info.result.len(), 1);
        assert_eq!(info.result[0].script_id, "bing");
        assert_eq!(info.succeed, 1);
        assert!(!info.discovery_timed_out);
    }

    #[tokio::test]
    async fn test_default_adapter_scopes_search_to_site() {
        let url = "https://www.google.com/search?q=site%3Adocs.rs+tokio";
        let browser = Arc::new(ScriptedBrowser::new().with_page(url, PageScript::silent()));
        let engine = engine_over(&browser, fast_config());

        let requests = vec![SearchRequest::new("https://docs.rs/tokio", "tokio")];
        let info = engine.run(&requests, 5, None).await.unwrap();

        assert_eq!(info.result.len(), 1);
        assert_eq!(info.result[0].script_id, "default");
        assert!(info.result[0].links.is_empty());
        assert_eq!(browser.opened_urls(), vec![url.to_string()]);
    }

    #[tokio::test]
    async fn test_owned_window_is_removed() {
        let browser = Arc::new(ScriptedBrowser::new().with_page(GOOGLE_AI, PageScript::silent()));
        let engine = engine_over(&browser, fast_config());

        engine.run(&google("ai"), 5, None).await.unwrap();

        let created = browser.windows_created();
        assert_eq!(created.len(), 1);
        assert_eq!(browser.windows_removed(), created);
    }

    #[tokio::test]
    async fn test_caller_window_is_left_open() {
        let browser = Arc::new(ScriptedBrowser::new().with_page(GOOGLE_AI, PageScript::silent()));
        let engine = engine_over(&browser, fast_config());

        engine.run(&google("ai"), 5, Some(42)).await.unwrap();

        assert!(browser.windows_created().is_empty());
        assert!(browser.windows_removed().is_empty());
    }

    #[tokio::test]
    async fn test_window_failure_is_driver_error() {
        let browser = Arc::new(ScriptedBrowser::new().failing_windows());
        let engine = engine_over(&browser, fast_config());

        let result = engine.run(&google("ai"), 5, None).await;
        assert!(matches!(result, Err(ResearchError::Driver(_))));
    }

    #[tokio::test]
    async fn test_invalid_requests_are_rejected() {
        let browser = Arc::new(ScriptedBrowser::new());
        let engine = engine_over(&browser, fast_config());

        let empty = engine.run(&[], 5, None).await;
        assert!(matches!(empty, Err(ResearchError::InvalidRequest(_))));

        let blank = engine.run(&google(""), 5, None).await;
        assert!(matches!(blank, Err(ResearchError::InvalidRequest(_))));
        assert!(browser.opened_urls().is_empty());
    }

    #[tokio::test]
    async fn test_progress_events_are_emitted() {
        let browser = ScriptedBrowser::new()
            .with_page(GOOGLE_AI, PageScript::replies(links_reply("https://r", 2)));
        let browser = with_content_pages(browser, "https://r", 2)
            .with_page("https://r/1", PageScript::FailsMessaging);
        let browser = Arc::new(browser);
        let sink = Arc::new(CollectingEventSink::new());
        let engine = engine_over(&browser, fast_config()).with_event_sink(sink.clone());

        engine.run(&google("ai"), 5, None).await.unwrap();

        let types: Vec<String> = sink.events().into_iter().map(|(t, _)| t).collect();
        assert_eq!(types.first().map(String::as_str), Some("research.started"));
        assert_eq!(types.last().map(String::as_str), Some("research.completed"));
        assert_eq!(sink.count("discovery.completed"), 1);
        assert_eq!(sink.count("extraction.completed"), 1);
        assert_eq!(sink.count("extraction.link_succeeded"), 1);
        assert_eq!(sink.count("extraction.link_failed"), 1);
    }

    #[tokio::test]
    async fn test_concurrent_tasks_do_not_interfere() {
        let browser = ScriptedBrowser::new()
            .with_page(GOOGLE_AI, PageScript::replies(links_reply("https://a", 2)))
            .with_page(
                "https://www.google.com/search?q=rust",
                PageScript::replies(links_reply("https://b", 3)),
            );
        let browser = with_content_pages(browser, "https://a", 2);
        let browser = Arc::new(with_content_pages(browser, "https://b", 3));
        let engine = engine_over(&browser, fast_config());

        let ai = google("ai");
        let rust = google("rust");
        let (first, second) = tokio::join!(engine.run(&ai, 5, None), engine.run(&rust, 5, None));
        let (first, second) = (first.unwrap(), second.unwrap());

        assert_ne!(first.task_id, second.task_id);
        assert_eq!(first.succeed, 2);
        assert_eq!(second.succeed, 3);
        assert!(first.links().all(|link| link.url.starts_with("https://a")));
        assert!(second.links().all(|link| link.url.starts_with("https://b")));
    }

    #[tokio::test]
    async fn test_shutdown_closes_pending_tabs() {
        let browser = Arc::new(ScriptedBrowser::new().with_page(GOOGLE_AI, PageScript::Hangs));
        let config = fast_config().with_discovery_timeout(Duration::from_secs(30));
        let engine = Arc::new(engine_over(&browser, config));

        let running = {
            let engine = engine.clone();
            tokio::spawn(async move { engine.run(&google("ai"), 5, None).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(engine.pending_sessions(), 1);
        assert_eq!(engine.shutdown().await, 1);
        assert_eq!(engine.pending_sessions(), 0);
        assert!(browser.open_tabs().is_empty());
        assert!(engine.lifecycle().is_subscribed(SESSION_TABLE_SUBSCRIBER));

        running.abort();
    }

    #[tokio::test]
    async fn test_load_reported_while_tab_opens_is_not_lost() {
        let browser = ScriptedBrowser::new()
            .with_page(GOOGLE_AI, PageScript::replies(links_reply("https://r", 3)))
            .with_eager_lifecycle();
        let browser = Arc::new(with_content_pages(browser, "https://r", 3));
        let config = fast_config()
            .with_discovery_timeout(Duration::from_secs(5))
            .with_extraction_timeout(Duration::from_secs(5));
        let engine = engine_over(&browser, config);

        let start = Instant::now();
        let info = engine.run(&google("ai"), 5, None).await.unwrap();

        assert!(start.elapsed() < Duration::from_secs(1));
        assert!(!info.discovery_timed_out);
        assert!(!info.extraction_timed_out);
        assert_eq!(info.result.len(), 1);
        assert_eq!(info.succeed, 3);
        assert!(browser.open_tabs().is_empty());
        assert_eq!(engine.pending_sessions(), 0);
    }

    #[tokio::test]
    async fn test_tab_opened_after_timeout_is_closed() {
        let browser = Arc::new(
            ScriptedBrowser::new()
                .with_page(GOOGLE_AI, PageScript::Hangs)
                .with_open_delay(Duration::from_millis(150)),
        );
        let config = fast_config().with_discovery_timeout(Duration::from_millis(50));
        let engine = engine_over(&browser, config);

        let info = engine.run(&google("ai"), 5, None).await.unwrap();
        assert!(info.discovery_timed_out);

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(browser.opened_urls(), vec![GOOGLE_AI.to_string()]);
        assert!(browser.open_tabs().is_empty());
        assert_eq!(engine.pending_sessions(), 0);
        assert_eq!(engine.lifecycle().len(), 1);
    }

    #[tokio::test]
    async fn test_link_failure_event_names_its_kind() {
        let browser = ScriptedBrowser::new()
            .with_page(GOOGLE_AI, PageScript::replies(links_reply("https://r", 2)));
        let browser = with_content_pages(browser, "https://r", 2)
            .with_page("https://r/0", PageScript::FailsMessaging)
            .with_page("https://r/1", PageScript::FailsToOpen);
        let browser = Arc::new(browser);
        let sink = Arc::new(CollectingEventSink::new());
        let engine = engine_over(&browser, fast_config()).with_event_sink(sink.clone());

        engine.run(&google("ai"), 5, None).await.unwrap();

        let mut kinds: Vec<String> = sink
            .events_of_type("extraction.link_failed")
            .into_iter()
            .filter_map(|(_, data)| data)
            .map(|data| data["kind"].as_str().unwrap_or_default().to_string())
            .collect();
        kinds.sort();
        assert_eq!(kinds, vec!["messaging".to_string(), "tab_open".to_string()]);
    }
}
