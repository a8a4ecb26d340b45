#![cfg(all(target_arch = "wasm32", feature = "wasm-web"))]

use js_sys::{Array, Function, Object, Reflect};
use matomo_rs_tracker::tracker::{MatomoTracker, TrackerSettings};
use wasm_bindgen::closure::Closure;
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_test::*;

wasm_bindgen_test_configure!(run_in_browser);

fn install_queue(name: &str) -> Array {
    let queue = Array::new();
    Reflect::set(&js_sys::global(), &JsValue::from_str(name), &queue).expect("install queue");
    queue
}

fn tracker_for(name: &str) -> MatomoTracker {
    MatomoTracker::with_settings(
        TrackerSettings::default()
            .with_queue_name(name)
            .with_request_timeout(None),
    )
}

#[wasm_bindgen_test]
fn commands_are_pushed_onto_the_window_queue() {
    let queue = install_queue("_paq_smoke_commands");
    let tracker = tracker_for("_paq_smoke_commands");

    tracker.track_page_view(None).unwrap();
    tracker
        .track_event("Videos", "Play", None, Some(3.0))
        .unwrap();

    assert_eq!(queue.length(), 2);
    let first: Array = queue.get(0).unchecked_into();
    assert_eq!(first.length(), 1);
    assert_eq!(first.get(0).as_string().as_deref(), Some("trackPageView"));

    let second: Array = queue.get(1).unchecked_into();
    assert_eq!(second.length(), 5);
    assert!(second.get(3).is_undefined());
    assert_eq!(second.get(4).as_f64(), Some(3.0));
}

#[wasm_bindgen_test(async)]
async fn accessor_resolves_when_the_script_runs_it() {
    let queue = install_queue("_paq_smoke_accessor");
    let tracker = tracker_for("_paq_smoke_accessor");

    let visitor_id = tracker.get_visitor_id();
    assert_eq!(queue.length(), 1);

    let entry: Array = queue.get(0).unchecked_into();
    let callback: Function = entry.get(0).dyn_into().expect("queued function");

    let stub = Object::new();
    let get_visitor_id = Function::new_no_args("return 'abc123';");
    Reflect::set(&stub, &JsValue::from_str("getVisitorId"), &get_visitor_id).unwrap();
    callback.call0(&stub).expect("run queued function");

    assert_eq!(visitor_id.await.unwrap(), "abc123");
}

fn stub_tracker(method: &str, value: &'static str) -> (Object, Closure<dyn Fn() -> JsValue>) {
    let stub = Object::new();
    let accessor =
        Closure::wrap(Box::new(move || JsValue::from_str(value)) as Box<dyn Fn() -> JsValue>);
    Reflect::set(&stub, &JsValue::from_str(method), accessor.as_ref()).unwrap();
    (stub, accessor)
}

#[wasm_bindgen_test(async)]
async fn each_queued_function_reads_the_tracker_it_runs_on() {
    let queue = install_queue("_paq_smoke_this");
    let tracker = tracker_for("_paq_smoke_this");

    let first = tracker.get_visitor_id();
    let second = tracker.get_visitor_id();
    assert_eq!(queue.length(), 2);

    let (first_stub, _first_accessor) = stub_tracker("getVisitorId", "first");
    let (second_stub, _second_accessor) = stub_tracker("getVisitorId", "second");
    for (index, stub) in [(1, &second_stub), (0, &first_stub)] {
        let entry: Array = queue.get(index).unchecked_into();
        let callback: Function = entry.get(0).dyn_into().expect("queued function");
        callback.call0(stub).expect("run queued function");
    }

    assert_eq!(first.await.unwrap(), "first");
    assert_eq!(second.await.unwrap(), "second");
}

#[wasm_bindgen_test]
fn missing_queue_is_reported() {
    let tracker = tracker_for("_paq_smoke_missing");
    assert!(tracker.track_page_view(None).is_err());
}
