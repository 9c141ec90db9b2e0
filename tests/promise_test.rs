use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use copromise::{
    all_in, pack, DiagnosticSink, Host, Outcome, Promise, Resolver, Status, TickQueue, Value,
    ValuePack,
};

#[derive(Default)]
struct RecordingSink {
    messages: Mutex<Vec<String>>,
}

impl DiagnosticSink for RecordingSink {
    fn report(&self, message: &str) {
        self.messages.lock().push(message.to_owned());
    }
}

fn test_host() -> (Arc<Host>, Arc<TickQueue>, Arc<RecordingSink>) {
    let ticks = Arc::new(TickQueue::new());
    let sink = Arc::new(RecordingSink::default());
    let host = Host::new(ticks.clone(), sink.clone(), false);
    (host, ticks, sink)
}

fn deferred(host: &Arc<Host>) -> (Promise, Resolver, copromise::Rejecter) {
    let mut handles = None;
    let p = Promise::new_in(host.clone(), |resolve, reject| {
        handles = Some((resolve, reject));
    });
    let (resolve, reject) = handles.unwrap();
    (p, resolve, reject)
}

#[test]
fn settlement_is_exactly_once() {
    let (host, ticks, _) = test_host();
    let (p, resolve, reject) = deferred(&host);
    resolve.resolve(pack![1i64]).unwrap();
    resolve.resolve(pack![2i64, 3i64]).unwrap();
    reject.reject(pack!["never"]);
    assert_eq!(p.status(), Status::Fulfilled);
    assert_eq!(p.wait(), Outcome::Fulfilled(pack![1i64]));
    ticks.run_until_idle();
}

#[test]
fn continuations_preserve_attachment_order() {
    let (host, _, _) = test_host();
    let (p, resolve, _reject) = deferred(&host);
    let order = Arc::new(Mutex::new(Vec::new()));
    for i in 0..5 {
        let order = order.clone();
        p.then(move |_| {
            order.lock().push(i);
            Ok(ValuePack::empty())
        });
    }
    resolve.resolve(ValuePack::empty()).unwrap();
    assert_eq!(*order.lock(), vec![0, 1, 2, 3, 4]);
}

#[test]
fn late_attachment_sees_the_same_outcome() {
    let (host, _, _) = test_host();
    let (p, resolve, _reject) = deferred(&host);

    let early = Arc::new(Mutex::new(None));
    let seen = early.clone();
    p.then(move |values| {
        *seen.lock() = Some(values);
        Ok(ValuePack::empty())
    });

    resolve.resolve(pack![7i64, "x"]).unwrap();

    let late = Arc::new(Mutex::new(None));
    let seen = late.clone();
    p.then(move |values| {
        *seen.lock() = Some(values);
        Ok(ValuePack::empty())
    });

    assert_eq!(*early.lock(), *late.lock());
    assert_eq!(*late.lock(), Some(pack![7i64, "x"]));
}

#[test]
fn resolving_with_a_promise_adopts_its_outcome() {
    let (host, _, _) = test_host();
    let (outer, resolve_outer, _) = deferred(&host);
    let (inner, resolve_inner, _) = deferred(&host);

    resolve_outer
        .resolve(ValuePack::single(Value::Promise(inner)))
        .unwrap();
    assert_eq!(outer.status(), Status::Pending);

    resolve_inner.resolve(pack!["adopted", 2i64]).unwrap();
    assert_eq!(outer.wait(), Outcome::Fulfilled(pack!["adopted", 2i64]));
}

#[test]
fn resolving_with_a_promise_adopts_its_rejection() {
    let (host, ticks, sink) = test_host();
    let (outer, resolve_outer, _) = deferred(&host);
    let (inner, _, reject_inner) = deferred(&host);

    resolve_outer
        .resolve(ValuePack::single(Value::Promise(inner)))
        .unwrap();
    reject_inner.reject(pack!["inner failure"]);

    assert_eq!(outer.status(), Status::Rejected);
    assert_eq!(outer.wait(), Outcome::Rejected(pack!["inner failure"]));
    ticks.run_until_idle();
    // The outer promise observed the inner rejection by assimilating it;
    // the outer one itself was waited on.
    assert!(sink.messages.lock().is_empty());
}

#[test]
fn handler_returning_a_promise_assimilates() {
    let (host, _, _) = test_host();
    let (p, resolve, _) = deferred(&host);
    let (nested, resolve_nested, _) = deferred(&host);

    let derived = p.then(move |_| Ok(ValuePack::single(Value::Promise(nested))));
    resolve.resolve(ValuePack::empty()).unwrap();
    assert_eq!(derived.status(), Status::Pending);

    resolve_nested.resolve(pack![99i64]).unwrap();
    assert_eq!(derived.wait(), Outcome::Fulfilled(pack![99i64]));
}

#[test]
fn sparse_values_keep_their_count_and_positions() {
    let (host, _, _) = test_host();
    let (p, resolve, _) = deferred(&host);

    let seen = Arc::new(Mutex::new(None));
    let out = seen.clone();
    p.then(move |values| {
        *out.lock() = Some(values.clone());
        Ok(values)
    });

    resolve
        .resolve(ValuePack::of(vec![
            Value::Int(1),
            Value::Nil,
            Value::Int(3),
            Value::Nil,
        ]))
        .unwrap();

    let values = seen.lock().clone().unwrap();
    assert_eq!(values.count(), 4);
    assert!(values.get(1).is_nil());
    assert_eq!(values.get(2), &Value::Int(3));
    assert!(values.get(3).is_nil());
}

#[test]
fn failures_travel_until_caught() {
    let (host, _, _) = test_host();
    let (p, _, reject) = deferred(&host);

    // No reject handler on the first link: the rejection passes through.
    let caught = Arc::new(Mutex::new(None));
    let out = caught.clone();
    let tail = p
        .then(|_| Ok(pack!["not reached"]))
        .catch(move |values| {
            *out.lock() = Some(values.first().clone());
            Ok(pack!["recovered"])
        });

    reject.reject(pack!["boom"]);
    assert_eq!(*caught.lock(), Some(Value::from("boom")));
    // Catching converts the failure back into fulfillment downstream.
    assert_eq!(tail.wait(), Outcome::Fulfilled(pack!["recovered"]));
}

#[test]
fn panicking_handler_rejects_the_derived_promise() {
    let (host, _, _) = test_host();
    let (p, resolve, _) = deferred(&host);
    let derived = p.then(|_| -> Result<ValuePack, Value> { panic!("handler blew up") });
    resolve.resolve(ValuePack::empty()).unwrap();
    assert_eq!(derived.wait(), Outcome::Rejected(pack!["handler blew up"]));
}

#[test]
fn all_fulfills_positionally() {
    let (host, _, _) = test_host();
    let (p1, r1, _) = deferred(&host);
    let (p2, r2, _) = deferred(&host);
    let (p3, r3, _) = deferred(&host);
    let agg = all_in(
        host,
        &[
            Value::Promise(p1),
            Value::Promise(p2),
            Value::Promise(p3),
        ],
    )
    .unwrap();

    r2.resolve(pack![20i64]).unwrap();
    r1.resolve(pack![10i64]).unwrap();
    r3.resolve(pack![30i64]).unwrap();

    let expected = Value::list(vec![Value::Int(10), Value::Int(20), Value::Int(30)]);
    assert_eq!(agg.wait(), Outcome::Fulfilled(ValuePack::single(expected)));
}

#[test]
fn all_rejects_with_the_first_rejection() {
    let (host, _, _) = test_host();
    let (p1, r1, _) = deferred(&host);
    let (p2, _, j2) = deferred(&host);
    let agg = all_in(host, &[Value::Promise(p1), Value::Promise(p2)]).unwrap();

    j2.reject(pack!["boom"]);
    assert_eq!(agg.status(), Status::Rejected);
    r1.resolve(pack![1i64]).unwrap();
    assert_eq!(agg.wait(), Outcome::Rejected(pack!["boom"]));
}

#[test]
fn all_of_nothing_fulfills_with_an_empty_list() {
    let (host, _, _) = test_host();
    let agg = all_in(host, &[]).unwrap();
    assert_eq!(agg.status(), Status::Fulfilled);
    assert_eq!(
        agg.wait(),
        Outcome::Fulfilled(ValuePack::single(Value::list(Vec::new())))
    );
}

#[test]
fn wait_blocks_until_settlement() {
    let (host, _, _) = test_host();
    let (p, resolve, _) = deferred(&host);

    let delay = Duration::from_millis(10);
    let started = Instant::now();
    thread::spawn(move || {
        thread::sleep(delay);
        resolve.resolve(pack![1i64, 2i64]).unwrap();
    });

    assert_eq!(p.wait(), Outcome::Fulfilled(pack![1i64, 2i64]));
    assert!(started.elapsed() >= delay);
}

#[test]
fn unhandled_rejection_is_reported_exactly_once() {
    let (host, ticks, sink) = test_host();
    let (_p, _, reject) = deferred(&host);
    reject.reject(pack!["dropped on the floor"]);

    assert!(sink.messages.lock().is_empty());
    ticks.run_until_idle();
    assert_eq!(sink.messages.lock().len(), 1);
    assert!(sink.messages.lock()[0].contains("dropped on the floor"));

    // Further ticks do not repeat the report.
    ticks.run_until_idle();
    assert_eq!(sink.messages.lock().len(), 1);
}

#[test]
fn same_tick_catch_suppresses_the_report() {
    let (host, ticks, sink) = test_host();
    let (p, _, reject) = deferred(&host);
    reject.reject(pack!["caught in time"]);
    let caught = p.catch(|_| Ok(ValuePack::empty()));
    ticks.run_until_idle();
    assert!(sink.messages.lock().is_empty());
    assert_eq!(caught.wait(), Outcome::Fulfilled(ValuePack::empty()));
}
