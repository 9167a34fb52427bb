use super::*;
use serde_json::json;

// =============================================================================
// MessageType
// =============================================================================

#[test]
fn message_type_tags_match_wire_values() {
    assert_eq!(MessageType::Ready.as_str(), "ready");
    assert_eq!(MessageType::LocationChange.as_str(), "location-change");
    assert_eq!(MessageType::DocumentTitleChange.as_str(), "document-title-change");
    assert_eq!(MessageType::ChangeTheme.as_str(), "change-theme");
    assert_eq!(MessageType::DashboardVariables.as_str(), "dashboard-variables");
}

#[test]
fn message_type_serde_agrees_with_as_str() {
    for t in MessageType::ALL {
        let value = serde_json::to_value(t).expect("serialize");
        assert_eq!(value, Value::String(t.as_str().to_owned()));
        assert_eq!(t.as_str().parse::<MessageType>().expect("parse"), t);
    }
}

#[test]
fn message_type_from_str_rejects_unknown_tag() {
    let err = "reload".parse::<MessageType>().expect_err("should be unknown");
    assert_eq!(err, UnknownMessageType("reload".to_owned()));
}

// =============================================================================
// encode / decode
// =============================================================================

#[test]
fn encode_omits_absent_fields() {
    let value = encode_message(&Message::new(MessageType::Ready)).expect("encode");
    assert_eq!(value, json!({ "type": "ready" }));
}

#[test]
fn encode_includes_present_fields() {
    let msg = Message::new(MessageType::ChangeTheme)
        .with_id("abc")
        .with_source("document")
        .with_payload(json!({ "theme": "dark" }));
    let value = encode_message(&msg).expect("encode");
    assert_eq!(
        value,
        json!({ "id": "abc", "type": "change-theme", "source": "document", "payload": { "theme": "dark" } })
    );
}

#[test]
fn decode_accepts_minimal_message() {
    let msg = decode_message(&json!({ "type": "ready" })).expect("decode").expect("message");
    assert_eq!(msg, Message::new(MessageType::Ready));
}

#[test]
fn decode_ignores_falsy_data() {
    for data in [Value::Null, json!(false), json!(0), json!(0.0), json!("")] {
        assert!(decode_message(&data).expect("decode").is_none(), "{data} should be ignored");
    }
}

#[test]
fn decode_rejects_unknown_type() {
    let err = decode_message(&json!({ "type": "reload" })).expect_err("unknown type");
    assert!(matches!(err, FrameError::Decode(_)));
}

#[test]
fn decode_rejects_truthy_non_message() {
    let err = decode_message(&json!("hello")).expect_err("not an object");
    assert!(matches!(err, FrameError::Decode(_)));
}

#[test]
fn is_falsy_treats_containers_as_truthy() {
    assert!(!is_falsy(&json!({})));
    assert!(!is_falsy(&json!([])));
    assert!(!is_falsy(&json!(true)));
    assert!(!is_falsy(&json!(-1)));
    assert!(!is_falsy(&json!("0")));
}

// =============================================================================
// typed payloads
// =============================================================================

#[test]
fn typed_sets_type_and_payload() {
    let msg = Message::typed(&ChangeTheme { theme: Theme::Light }).expect("typed");
    assert_eq!(msg.message_type, MessageType::ChangeTheme);
    assert_eq!(msg.payload, Some(json!({ "theme": "light" })));
    assert!(msg.id.is_none());
}

#[test]
fn payload_as_decodes_location_change() {
    let msg = Message::new(MessageType::LocationChange).with_payload(json!({
        "pathname": "/graph/d/mysql",
        "search": "?orgId=1",
        "hash": "",
        "title": "MySQL",
        "action": "PUSH"
    }));
    let loc: LocationChange = msg.payload_as().expect("payload");
    assert_eq!(loc.pathname, "/graph/d/mysql");
    assert_eq!(loc.search, "?orgId=1");
    assert_eq!(loc.action, HistoryAction::Push);
}

#[test]
fn payload_as_rejects_other_type() {
    let msg = Message::new(MessageType::Ready).with_payload(json!({ "title": "x" }));
    let err = msg.payload_as::<DocumentTitleChange>().expect_err("mismatch");
    assert!(matches!(
        err,
        FrameError::TypeMismatch { expected: MessageType::DocumentTitleChange, actual: MessageType::Ready }
    ));
}

#[test]
fn payload_as_reports_missing_payload() {
    let msg = Message::new(MessageType::DashboardVariables);
    let err = msg.payload_as::<DashboardVariables>().expect_err("missing");
    assert!(matches!(err, FrameError::MissingPayload { message_type: MessageType::DashboardVariables }));
}

#[test]
fn payload_as_reports_wrong_shape() {
    let msg = Message::new(MessageType::ChangeTheme).with_payload(json!({ "theme": "sepia" }));
    let err = msg.payload_as::<ChangeTheme>().expect_err("bad theme");
    assert!(matches!(err, FrameError::Decode(_)));
}

#[test]
fn dashboard_variables_default_to_empty_map() {
    let vars: DashboardVariables = serde_json::from_value(json!({})).expect("decode");
    assert!(vars.variables.is_empty());
}

// =============================================================================
// reply / ids
// =============================================================================

#[test]
fn reply_echoes_id_and_type() {
    let req = Message::new(MessageType::DashboardVariables).with_id("req-1").with_source("document");
    let reply = req.reply(Some(json!({ "variables": {} })));
    assert_eq!(reply.id.as_deref(), Some("req-1"));
    assert_eq!(reply.message_type, MessageType::DashboardVariables);
    assert!(reply.source.is_none());
}

#[test]
fn generate_id_is_unique_and_non_empty() {
    let a = generate_id();
    let b = generate_id();
    assert!(!a.is_empty());
    assert_ne!(a, b);
}
