//! End-to-end hook scenarios on a shared virtual-clock host.
//!
//! Set `RUST_LOG=tether=debug` to see lifecycle logging.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tether_hooks::{
    Debounced, Fetch, FetchOptions, FetchState, Interval, LocalStorage, OnlineStatus, Toggle,
    WindowSizeTracker,
};
use tether_runtime::{
    FetchError, HookConfig, Host, MemoryStorage, MockTransport, Request, Response, Storage,
    WindowSize,
};
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();
}

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

fn recorder<T: Clone + 'static>() -> (Rc<RefCell<Vec<T>>>, impl Fn(&T) + 'static) {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    (seen, move |v: &T| sink.borrow_mut().push(v.clone()))
}

#[test]
fn toggle_three_times() {
    init_tracing();
    let flag = Toggle::new(false);
    let (seen, record) = recorder::<bool>();
    let _w = flag.watch(record);

    flag.toggle();
    flag.toggle();
    flag.toggle();
    assert!(flag.value());
    assert_eq!(*seen.borrow(), vec![true, false, true]);
}

#[test]
fn interval_ticks_then_stops_on_drop() {
    init_tracing();
    let host = Host::new();
    let interval = Interval::from_config(host.timers(), &HookConfig::default()).unwrap();
    let (seen, record) = recorder::<u64>();
    let _w = interval.watch(record);

    host.advance(ms(3500));
    assert_eq!(*seen.borrow(), vec![1, 2, 3]);

    drop(interval);
    assert_eq!(host.timers().pending(), 0);
    host.advance(ms(5000));
    assert_eq!(seen.borrow().len(), 3);
}

#[test]
fn debounced_search_emits_once() {
    init_tracing();
    let host = Host::new();
    let config = HookConfig::default();
    let search = Debounced::from_config(host.timers(), String::new(), &config).unwrap();
    let (seen, record) = recorder::<String>();
    let _w = search.watch(record);

    search.set("a".into());
    host.advance(ms(50));
    search.set("ab".into());
    host.advance(ms(50));
    search.set("abc".into());
    host.advance(ms(299));
    assert!(seen.borrow().is_empty());
    host.advance(ms(1));

    assert_eq!(host.now(), ms(400));
    assert_eq!(*seen.borrow(), vec!["abc".to_string()]);
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Draft {
    title: String,
    words: u32,
}

#[test]
fn local_storage_survives_remount_and_syncs_tabs() {
    init_tracing();
    let tab_a = MemoryStorage::new();
    let tab_b = tab_a.new_tab();
    let empty = Draft {
        title: String::new(),
        words: 0,
    };

    let editor = LocalStorage::new(Rc::new(tab_a.clone()), "draft", empty.clone()).unwrap();
    let preview = LocalStorage::new(Rc::new(tab_b), "draft", empty.clone()).unwrap();
    let saved = Draft {
        title: "Notes".into(),
        words: 120,
    };
    editor.set(saved.clone()).unwrap();
    assert_eq!(preview.value(), saved);
    assert_eq!(
        tab_a.get("draft").as_deref(),
        Some(r#"{"title":"Notes","words":120}"#)
    );

    drop(editor);
    let remounted = LocalStorage::new(Rc::new(tab_a), "draft", empty).unwrap();
    assert_eq!(remounted.value(), saved);
}

#[test]
fn window_and_connectivity_follow_host() {
    init_tracing();
    let host = Host::new();
    let size = WindowSizeTracker::new(&host).unwrap();
    let online = OnlineStatus::new(&host).unwrap();
    let (seen, record) = recorder::<bool>();
    let _w = online.watch(record);

    host.resize(800, 600);
    host.set_online(false);
    host.set_online(false);
    host.set_online(true);

    assert_eq!(size.size(), WindowSize::new(800, 600));
    assert!(online.is_online());
    assert_eq!(*seen.borrow(), vec![false, true]);

    drop(size);
    drop(online);
    assert_eq!(host.events().listener_count("resize"), 0);
    assert_eq!(host.events().listener_count("online"), 0);
    assert_eq!(host.events().listener_count("offline"), 0);
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
struct Profile {
    id: u32,
}

#[test]
fn fetch_cancelled_by_unmount() {
    init_tracing();
    let host = Host::new();
    let transport = MockTransport::new(host.timers()).with_latency(ms(200));
    transport.route("/profile", Ok(Response::ok(r#"{"id":7}"#)));

    let profile: Fetch<Profile> = Fetch::new(
        &host,
        Rc::new(transport.clone()),
        Request::get("/profile"),
        FetchOptions::default(),
    )
    .unwrap();
    let (seen, record) = recorder::<FetchState<Profile>>();
    let _w = profile.watch(record);

    host.advance(ms(100));
    drop(profile);
    host.advance(ms(1000));

    assert!(seen.borrow().is_empty());
    assert_eq!(transport.cancelled(), 1);
}

#[test]
fn fetch_offline_then_recovers() {
    init_tracing();
    let host = Host::new();
    let transport = MockTransport::new(host.timers());
    transport.enqueue("/profile", Err(FetchError::Network("offline".into())));
    transport.route("/profile", Ok(Response::ok(r#"{"id":7}"#)));

    let profile: Fetch<Profile> = Fetch::new(
        &host,
        Rc::new(transport.clone()),
        Request::get("/profile"),
        FetchOptions::from_config(&HookConfig::default(), host.timers()),
    )
    .unwrap();

    host.timers().run_until_idle(100);
    assert_eq!(profile.state(), FetchState::Data(Profile { id: 7 }));
    assert_eq!(transport.request_count("/profile"), 2);
}
