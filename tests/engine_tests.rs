//! End-to-end tests for the engine runtime.
//!
//! These use wiremock to stand in for the scraped sites and exercise the
//! full crawl cycle: dispatch, completion merging, pruning, interval
//! refresh, nested requests, and the export paths.

use std::sync::Arc;
use std::time::Duration;

use scrapex::{
    async_trait, Engine, EngineBuilder, ExportFormat, Exported, Init, ParseValue, Record,
    RequestContext, Response, ScrapexError, Spider,
};
use serde_json::{json, Value};
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn serve(server: &MockServer, route: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

/// Returns the response body as the single record.
struct BodySpider;

#[async_trait]
impl Spider for BodySpider {
    async fn parse(
        self: Arc<Self>,
        response: Response,
        _ctx: RequestContext,
    ) -> Result<ParseValue, ScrapexError> {
        Ok(ParseValue::Records(vec![Value::String(response.body)]))
    }
}

/// Prefixes sixteen random hex characters to the body, so every crawl of
/// the same page produces a distinguishable record.
struct NonceSpider;

#[async_trait]
impl Spider for NonceSpider {
    async fn parse(
        self: Arc<Self>,
        response: Response,
        _ctx: RequestContext,
    ) -> Result<ParseValue, ScrapexError> {
        let nonce = format!("{:016x}", rand::random::<u64>());
        Ok(ParseValue::Records(vec![Value::String(format!(
            "{}{}",
            nonce, response.body
        ))]))
    }
}

fn nonce_of(record: &Record) -> &str {
    &record.as_str().unwrap()[..16]
}

fn suffix_of(record: &Record) -> &str {
    &record.as_str().unwrap()[16..]
}

#[tokio::test]
async fn single_page_extract_exports_the_parsed_body() {
    let server = MockServer::start().await;
    serve(&server, "/example.com.html", "<html>example body</html>").await;

    let engine = EngineBuilder::new(BodySpider)
        .url(format!("{}/example.com.html", server.uri()))
        .start()
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    let records = engine.export().await.unwrap();
    assert_eq!(records, vec![json!("<html>example body</html>")]);
    engine.stop().await;
}

#[tokio::test]
async fn export_preserves_seed_order_regardless_of_completion_order() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("slow")
                .set_delay(Duration::from_millis(250)),
        )
        .mount(&server)
        .await;
    serve(&server, "/fast", "fast").await;

    let engine = EngineBuilder::new(BodySpider)
        .urls([
            format!("{}/slow", server.uri()),
            format!("{}/fast", server.uri()),
        ])
        .start()
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    let records = engine.export().await.unwrap();
    assert_eq!(records, vec![json!("slow"), json!("fast")]);
    engine.stop().await;
}

#[tokio::test]
async fn duplicate_seeds_dispatch_twice_and_settle_into_one_slot() {
    let server = MockServer::start().await;
    // The first request to arrive consumes the delayed mock; the other
    // answers fast, so the two completions are well separated.
    Mock::given(method("GET"))
        .and(path("/page"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("slow")
                .set_delay(Duration::from_millis(300)),
        )
        .up_to_n_times(1)
        .mount(&server)
        .await;
    serve(&server, "/page", "fast").await;

    let engine = EngineBuilder::new(BodySpider)
        .urls([
            format!("{}/page", server.uri()),
            format!("{}/page", server.uri()),
        ])
        .start()
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    // The export drain must wait for both in-flight requests, not just
    // the first completion for the shared URL. Last write wins the slot.
    let records = engine.export().await.unwrap();
    assert_eq!(records, vec![json!("slow")]);

    use std::sync::atomic::Ordering;
    let stats = engine.stats();
    assert_eq!(stats.requests_dispatched.load(Ordering::SeqCst), 2);
    assert_eq!(stats.requests_completed.load(Ordering::SeqCst), 2);
    engine.stop().await;
}

#[tokio::test]
async fn periodic_refresh_replaces_rather_than_appends() {
    let server = MockServer::start().await;
    serve(&server, "/page", "stable body").await;

    let engine = EngineBuilder::new(NonceSpider)
        .url(format!("{}/page", server.uri()))
        .interval(Duration::from_millis(500))
        .start()
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(300)).await;
    let first = engine.export().await.unwrap();
    assert_eq!(first.len(), 1);

    tokio::time::sleep(Duration::from_millis(550)).await;
    let second = engine.export().await.unwrap();
    assert_eq!(second.len(), 1);

    assert_ne!(nonce_of(&first[0]), nonce_of(&second[0]));
    assert_eq!(suffix_of(&first[0]), "stable body");
    assert_eq!(suffix_of(&first[0]), suffix_of(&second[0]));
    engine.stop().await;
}

#[tokio::test]
async fn not_found_seeds_are_pruned_and_not_refetched() {
    let server = MockServer::start().await;
    serve(&server, "/alive", "alpha").await;
    Mock::given(method("GET"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let engine = EngineBuilder::new(BodySpider)
        .urls([
            format!("{}/alive", server.uri()),
            format!("{}/gone", server.uri()),
        ])
        .interval(Duration::from_millis(300))
        .start()
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(200)).await;
    let records = engine.export().await.unwrap();
    assert_eq!(records, vec![json!("alpha")]);

    // Two more ticks; only the surviving seed is fetched again.
    tokio::time::sleep(Duration::from_millis(700)).await;
    assert_eq!(engine.stats().urls_pruned.load(std::sync::atomic::Ordering::SeqCst), 1);
    engine.stop().await;
    server.verify().await;
}

#[tokio::test]
async fn transport_errors_degrade_to_an_empty_result_and_keep_the_seed() {
    let server = MockServer::start().await;
    serve(&server, "/ok", "fine").await;
    Mock::given(method("GET"))
        .and(path("/broken"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let engine = EngineBuilder::new(BodySpider)
        .urls([
            format!("{}/ok", server.uri()),
            format!("{}/broken", server.uri()),
        ])
        .start()
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    // The broken seed contributes nothing but still holds its slot, so
    // the export is complete and the engine stays up.
    let records = engine.export().await.unwrap();
    assert_eq!(records, vec![json!("fine")]);
    let records = engine.export().await.unwrap();
    assert_eq!(records, vec![json!("fine")]);
    engine.stop().await;
}

/// Spawns a nested request inside the callback and synchronously awaits
/// it, returning the sub-page's body.
struct NestedSpider {
    target: Url,
}

#[async_trait]
impl Spider for NestedSpider {
    async fn parse(
        self: Arc<Self>,
        _response: Response,
        ctx: RequestContext,
    ) -> Result<ParseValue, ScrapexError> {
        let handle = ctx.request(self.target.clone(), |sub, _ctx| async move {
            Ok(ParseValue::Records(vec![Value::String(sub.body)]))
        });
        handle.await_result().await
    }
}

#[tokio::test]
async fn nested_request_in_callback_exports_the_sub_page() {
    let server = MockServer::start().await;
    serve(&server, "/a", "outer").await;
    serve(&server, "/b", "inner").await;

    let engine = EngineBuilder::new(NestedSpider {
        target: Url::parse(&format!("{}/b", server.uri())).unwrap(),
    })
    .url(format!("{}/a", server.uri()))
    .start()
    .await
    .unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    let records = engine.export().await.unwrap();
    assert_eq!(records, vec![json!("inner")]);
    engine.stop().await;
}

/// Hands follow-up requests back to the engine instead of awaiting them.
struct FollowSpider {
    targets: Vec<Url>,
}

#[async_trait]
impl Spider for FollowSpider {
    async fn parse(
        self: Arc<Self>,
        _response: Response,
        ctx: RequestContext,
    ) -> Result<ParseValue, ScrapexError> {
        let mut handles = Vec::new();
        for target in &self.targets {
            handles.push(ctx.request(target.clone(), |sub, _ctx| async move {
                Ok(ParseValue::Records(vec![Value::String(sub.body)]))
            }));
        }
        if handles.len() == 1 {
            Ok(ParseValue::Follow(handles.remove(0)))
        } else {
            Ok(ParseValue::FollowMany(handles))
        }
    }
}

#[tokio::test]
async fn returned_sub_request_is_awaited_by_the_engine() {
    let server = MockServer::start().await;
    serve(&server, "/a", "outer").await;
    serve(&server, "/b", "followed").await;

    let engine = EngineBuilder::new(FollowSpider {
        targets: vec![Url::parse(&format!("{}/b", server.uri())).unwrap()],
    })
    .url(format!("{}/a", server.uri()))
    .start()
    .await
    .unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert_eq!(engine.export().await.unwrap(), vec![json!("followed")]);
    engine.stop().await;
}

#[tokio::test]
async fn returned_sub_requests_concatenate_in_list_order() {
    let server = MockServer::start().await;
    serve(&server, "/a", "outer").await;
    Mock::given(method("GET"))
        .and(path("/b1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("one")
                .set_delay(Duration::from_millis(150)),
        )
        .mount(&server)
        .await;
    serve(&server, "/b2", "two").await;

    let engine = EngineBuilder::new(FollowSpider {
        targets: vec![
            Url::parse(&format!("{}/b1", server.uri())).unwrap(),
            Url::parse(&format!("{}/b2", server.uri())).unwrap(),
        ],
    })
    .url(format!("{}/a", server.uri()))
    .start()
    .await
    .unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(
        engine.export().await.unwrap(),
        vec![json!("one"), json!("two")]
    );
    engine.stop().await;
}

/// Awaits a nested request under a budget far shorter than the server's
/// response delay.
struct ImpatientSpider {
    target: Url,
}

#[async_trait]
impl Spider for ImpatientSpider {
    async fn parse(
        self: Arc<Self>,
        _response: Response,
        ctx: RequestContext,
    ) -> Result<ParseValue, ScrapexError> {
        let handle = ctx.request(self.target.clone(), |sub, _ctx| async move {
            Ok(ParseValue::Records(vec![Value::String(sub.body)]))
        });
        match handle.await_within(Some(Duration::from_millis(50))).await {
            Err(ScrapexError::AwaitTimeout(_)) => {
                Ok(ParseValue::Records(vec![json!("timed out")]))
            }
            other => other,
        }
    }
}

#[tokio::test]
async fn awaiting_a_request_respects_the_caller_budget() {
    let server = MockServer::start().await;
    serve(&server, "/a", "outer").await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("late")
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let engine = EngineBuilder::new(ImpatientSpider {
        target: Url::parse(&format!("{}/slow", server.uri())).unwrap(),
    })
    .url(format!("{}/a", server.uri()))
    .start()
    .await
    .unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;

    assert_eq!(engine.export().await.unwrap(), vec![json!("timed out")]);
    engine.stop().await;
}

/// Panics inside the callback; the engine must degrade the crash to an
/// empty result and keep the other seed's data.
struct PanickySpider;

#[async_trait]
impl Spider for PanickySpider {
    async fn parse(
        self: Arc<Self>,
        response: Response,
        _ctx: RequestContext,
    ) -> Result<ParseValue, ScrapexError> {
        if response.body.contains("boom") {
            panic!("callback blew up");
        }
        Ok(ParseValue::Records(vec![Value::String(response.body)]))
    }
}

#[tokio::test]
async fn a_crashed_request_task_degrades_to_an_empty_result() {
    let server = MockServer::start().await;
    serve(&server, "/ok", "survivor").await;
    serve(&server, "/bad", "boom").await;

    let engine = EngineBuilder::new(PanickySpider)
        .urls([
            format!("{}/ok", server.uri()),
            format!("{}/bad", server.uri()),
        ])
        .start()
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert_eq!(engine.export().await.unwrap(), vec![json!("survivor")]);
    use std::sync::atomic::Ordering;
    assert_eq!(engine.stats().requests_failed.load(Ordering::SeqCst), 1);
    engine.stop().await;
}

#[tokio::test]
async fn export_is_idempotent_without_an_intervening_tick() {
    let server = MockServer::start().await;
    serve(&server, "/page", "body").await;

    let engine = EngineBuilder::new(NonceSpider)
        .url(format!("{}/page", server.uri()))
        .start()
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    let first = engine.export().await.unwrap();
    let second = engine.export().await.unwrap();
    assert_eq!(first, second);
    engine.stop().await;
}

#[tokio::test]
async fn override_export_strictly_follows_a_fresh_fetch() {
    let server = MockServer::start().await;
    serve(&server, "/page", "body").await;

    let engine = EngineBuilder::new(NonceSpider)
        .url(format!("{}/page", server.uri()))
        .start()
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    let stale = engine.export().await.unwrap();
    let fresh = engine
        .export_with(ExportFormat::Records, true)
        .await
        .unwrap()
        .into_records();
    assert_eq!(fresh.len(), 1);
    assert_ne!(nonce_of(&stale[0]), nonce_of(&fresh[0]));
    engine.stop().await;
}

#[tokio::test]
async fn json_and_custom_encodings_apply_to_the_merged_list() {
    let server = MockServer::start().await;
    serve(&server, "/page", "encoded").await;

    let engine = EngineBuilder::new(BodySpider)
        .url(format!("{}/page", server.uri()))
        .start()
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    let json_out = engine
        .export_with(ExportFormat::Json, false)
        .await
        .unwrap()
        .into_text();
    assert_eq!(json_out, r#"["encoded"]"#);

    let counted = engine
        .export_with(
            ExportFormat::Custom(Arc::new(|rows| Ok(format!("{} records", rows.len())))),
            false,
        )
        .await
        .unwrap();
    assert_eq!(counted, Exported::Text("1 records".to_string()));
    engine.stop().await;
}

#[tokio::test]
async fn unsupported_format_errors_and_leaves_the_engine_idle() {
    let server = MockServer::start().await;
    serve(&server, "/page", "still here").await;

    let engine = EngineBuilder::new(BodySpider)
        .url(format!("{}/page", server.uri()))
        .start()
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    let err = engine.export_with(ExportFormat::Csv, false).await.unwrap_err();
    assert!(matches!(err, ScrapexError::UnsupportedFormat(_)));

    assert_eq!(engine.export().await.unwrap(), vec![json!("still here")]);
    engine.stop().await;
}

/// Accepts startup but postpones the first crawl far beyond the test.
struct DormantSpider;

#[async_trait]
impl Spider for DormantSpider {
    async fn init(self: Arc<Self>) -> Init {
        Init::After(Duration::from_secs(60))
    }

    async fn parse(
        self: Arc<Self>,
        _response: Response,
        _ctx: RequestContext,
    ) -> Result<ParseValue, ScrapexError> {
        Ok(ParseValue::Records(Vec::new()))
    }
}

#[tokio::test]
async fn partial_export_returns_the_data_and_terminates_the_engine() {
    let server = MockServer::start().await;

    let engine = EngineBuilder::new(DormantSpider)
        .url(format!("{}/never", server.uri()))
        .start()
        .await
        .unwrap();

    // No crawl has run; every slot is still empty.
    assert!(engine.export().await.unwrap().is_empty());

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(matches!(
        engine.export().await.unwrap_err(),
        ScrapexError::Stopped
    ));
}

/// Stops the whole engine from inside the parse callback.
struct StopSpider;

#[async_trait]
impl Spider for StopSpider {
    async fn parse(
        self: Arc<Self>,
        _response: Response,
        _ctx: RequestContext,
    ) -> Result<ParseValue, ScrapexError> {
        Ok(ParseValue::Stop("done after one page".to_string()))
    }
}

#[tokio::test]
async fn parse_stop_terminates_the_engine() {
    let server = MockServer::start().await;
    serve(&server, "/page", "body").await;

    let engine = EngineBuilder::new(StopSpider)
        .url(format!("{}/page", server.uri()))
        .start()
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;

    assert!(matches!(
        engine.export().await.unwrap_err(),
        ScrapexError::Stopped
    ));
}

struct IgnoreSpider;

#[async_trait]
impl Spider for IgnoreSpider {
    async fn init(self: Arc<Self>) -> Init {
        Init::Ignore
    }

    async fn parse(
        self: Arc<Self>,
        _response: Response,
        _ctx: RequestContext,
    ) -> Result<ParseValue, ScrapexError> {
        unreachable!("never started")
    }
}

struct RefusingSpider;

#[async_trait]
impl Spider for RefusingSpider {
    async fn init(self: Arc<Self>) -> Init {
        Init::Stop("not today".to_string())
    }

    async fn parse(
        self: Arc<Self>,
        _response: Response,
        _ctx: RequestContext,
    ) -> Result<ParseValue, ScrapexError> {
        unreachable!("never started")
    }
}

#[tokio::test]
async fn init_verdicts_can_refuse_startup() {
    let err = EngineBuilder::new(IgnoreSpider)
        .url("http://localhost:9090/x")
        .start()
        .await
        .unwrap_err();
    assert!(matches!(err, ScrapexError::InitIgnore));

    let err = EngineBuilder::new(RefusingSpider)
        .url("http://localhost:9090/x")
        .start()
        .await
        .unwrap_err();
    assert!(matches!(err, ScrapexError::InitStop(reason) if reason == "not today"));
}

#[tokio::test]
async fn named_engines_are_discoverable_until_they_stop() {
    let server = MockServer::start().await;
    serve(&server, "/page", "registered").await;

    let engine = EngineBuilder::new(BodySpider)
        .url(format!("{}/page", server.uri()))
        .name("lookup-target")
        .start()
        .await
        .unwrap();

    let found = Engine::lookup("lookup-target").expect("registered engine");
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(found.export().await.unwrap(), vec![json!("registered")]);

    let err = EngineBuilder::new(BodySpider)
        .url(format!("{}/page", server.uri()))
        .name("lookup-target")
        .start()
        .await
        .unwrap_err();
    assert!(matches!(err, ScrapexError::AlreadyRegistered(_)));

    engine.stop().await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(Engine::lookup("lookup-target").is_none());
}

#[tokio::test]
async fn stats_reflect_the_crawl() {
    let server = MockServer::start().await;
    serve(&server, "/a", "one").await;
    serve(&server, "/b", "two").await;

    let engine = EngineBuilder::new(BodySpider)
        .urls([
            format!("{}/a", server.uri()),
            format!("{}/b", server.uri()),
        ])
        .start()
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;
    engine.export().await.unwrap();

    use std::sync::atomic::Ordering;
    let stats = engine.stats();
    assert_eq!(stats.crawls_started.load(Ordering::SeqCst), 1);
    assert_eq!(stats.requests_dispatched.load(Ordering::SeqCst), 2);
    assert_eq!(stats.requests_completed.load(Ordering::SeqCst), 2);
    assert_eq!(stats.records_stored.load(Ordering::SeqCst), 2);
    assert_eq!(stats.exports_served.load(Ordering::SeqCst), 1);
    engine.stop().await;
}
