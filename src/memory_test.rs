use std::cell::RefCell;
use std::rc::Rc;

use serde_json::json;

use super::*;

fn recording_handler() -> (MessageHandler, Rc<RefCell<Vec<MessageEvent>>>) {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    let handler: MessageHandler = Rc::new(move |event: &MessageEvent| sink.borrow_mut().push(event.clone()));
    (handler, seen)
}

fn event(data: serde_json::Value) -> MessageEvent {
    MessageEvent { data, origin: "https://host.test".to_owned() }
}

#[test]
fn post_delivers_to_attached_handlers() {
    let window = MemoryWindow::new("https://frame.test");
    let (handler, seen) = recording_handler();
    window.add_message_listener(&handler);

    window.post_message(event(json!({ "type": "ready" })), "*");

    let seen = seen.borrow();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].data, json!({ "type": "ready" }));
    assert_eq!(seen[0].origin, "https://host.test");
}

#[test]
fn post_with_matching_origin_delivers() {
    let window = MemoryWindow::new("https://frame.test");
    let (handler, seen) = recording_handler();
    window.add_message_listener(&handler);

    window.post_message(event(json!(1)), "https://frame.test");

    assert_eq!(seen.borrow().len(), 1);
}

#[test]
fn post_with_mismatched_origin_is_dropped() {
    let window = MemoryWindow::new("https://frame.test");
    let (handler, seen) = recording_handler();
    window.add_message_listener(&handler);

    window.post_message(event(json!(1)), "https://evil.test");

    assert!(seen.borrow().is_empty());
}

#[test]
fn same_origin_target_requires_matching_sender() {
    let window = MemoryWindow::new("https://host.test");
    let (handler, seen) = recording_handler();
    window.add_message_listener(&handler);

    window.post_message(event(json!(1)), "/");
    window.post_message(MessageEvent { data: json!(2), origin: "https://other.test".to_owned() }, "/");

    let seen = seen.borrow();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].data, json!(1));
}

#[test]
fn duplicate_registration_delivers_twice_and_removes_once() {
    let window = MemoryWindow::new("https://frame.test");
    let (handler, seen) = recording_handler();
    window.add_message_listener(&handler);
    window.add_message_listener(&handler);
    assert_eq!(window.listener_count(), 2);

    window.post_message(event(json!(1)), "*");
    assert_eq!(seen.borrow().len(), 2);

    window.remove_message_listener(&handler);
    assert_eq!(window.listener_count(), 1);
}

#[test]
fn remove_unknown_handler_is_noop() {
    let window = MemoryWindow::new("https://frame.test");
    let (attached, _) = recording_handler();
    let (stranger, _) = recording_handler();
    window.add_message_listener(&attached);

    window.remove_message_listener(&stranger);

    assert_eq!(window.listener_count(), 1);
}

#[test]
fn handler_may_detach_itself_during_delivery() {
    let window = MemoryWindow::new("https://frame.test");
    let slot: Rc<RefCell<Option<MessageHandler>>> = Rc::new(RefCell::new(None));
    let calls = Rc::new(RefCell::new(0));

    let weak_window = Rc::downgrade(&window);
    let slot_in = Rc::clone(&slot);
    let calls_in = Rc::clone(&calls);
    let handler: MessageHandler = Rc::new(move |_event: &MessageEvent| {
        *calls_in.borrow_mut() += 1;
        if let (Some(window), Some(me)) = (weak_window.upgrade(), slot_in.borrow().as_ref()) {
            window.remove_message_listener(me);
        }
    });
    *slot.borrow_mut() = Some(Rc::clone(&handler));
    window.add_message_listener(&handler);

    window.post_message(event(json!(1)), "*");
    window.post_message(event(json!(2)), "*");

    assert_eq!(*calls.borrow(), 1);
    assert_eq!(window.listener_count(), 0);
}

#[test]
fn frames_are_looked_up_by_selector() {
    let host = MemoryWindow::new("https://host.test");
    assert!(host.frame_window("#grafana-iframe").is_none());

    let frame = MemoryWindow::new("https://host.test");
    host.mount_frame("#grafana-iframe", Rc::clone(&frame));
    let found = host.frame_window("#grafana-iframe").expect("mounted frame");
    assert_eq!(found.origin(), "https://host.test");

    let removed = host.unmount_frame("#grafana-iframe").expect("unmounted frame");
    assert!(Rc::ptr_eq(&removed, &frame));
    assert!(host.frame_window("#grafana-iframe").is_none());
}
