use std::{cell::RefCell, collections::BTreeMap, rc::Rc};

use serde_json::json;
use shared::domain::{Collection, NotificationKind};

use super::*;

#[derive(Clone, Default)]
struct RecordingDispatcher {
    actions: Rc<RefCell<Vec<Action>>>,
}

impl Dispatch for RecordingDispatcher {
    fn dispatch(&self, action: Action) {
        self.actions.borrow_mut().push(action);
    }
}

fn handler() -> (MessageHandler<RecordingDispatcher>, Rc<RefCell<Vec<Action>>>) {
    let dispatcher = RecordingDispatcher::default();
    let actions = Rc::clone(&dispatcher.actions);
    (
        MessageHandler::new(TranslationTable::with_defaults(), dispatcher),
        actions,
    )
}

#[test]
fn unrecognized_kind_produces_no_dispatch() {
    let (handler, actions) = handler();
    handler.handle(&ChannelMessage::new("unknown_x", json!({})));
    assert!(actions.borrow().is_empty());
}

#[test]
fn progress_then_unknown_yields_exactly_one_dispatch() {
    let (handler, actions) = handler();
    let messages = [
        ChannelMessage::new("progress", json!({"stage": "features", "pct": 50})),
        ChannelMessage::new("unknown_x", json!({})),
    ];
    for message in &messages {
        handler.handle(message);
    }

    let actions = actions.borrow();
    assert_eq!(actions.len(), 1);
    match &actions[0] {
        Action::UpdateProgress { progress } => {
            assert_eq!(progress.stage, "features");
            assert_eq!(progress.pct, 50);
        }
        other => panic!("unexpected action: {other:?}"),
    }
}

#[test]
fn fetch_kinds_request_refresh_of_matching_collection() {
    let (handler, actions) = handler();
    handler.handle(&ChannelMessage::new("cesium/FETCH_MODELS", json!(null)));
    handler.handle(&ChannelMessage::new("FETCH_PROJECTS", json!(null)));
    assert_eq!(
        *actions.borrow(),
        vec![
            Action::refresh(Collection::Models),
            Action::refresh(Collection::Projects),
        ]
    );
}

#[test]
fn notification_type_selects_error_kind() {
    let (handler, actions) = handler();
    handler.handle(&ChannelMessage::new(
        "cesium/SHOW_NOTIFICATION",
        json!({"note": "Cannot create model 'm1': boom", "type": "error"}),
    ));
    handler.handle(&ChannelMessage::new(
        "cesium/SHOW_NOTIFICATION",
        json!({"note": "Model 'm1' computed."}),
    ));

    let kinds: Vec<_> = actions
        .borrow()
        .iter()
        .map(|action| match action {
            Action::ShowNotification { notification } => notification.kind,
            other => panic!("unexpected action: {other:?}"),
        })
        .collect();
    assert_eq!(kinds, vec![NotificationKind::Error, NotificationKind::Info]);
}

#[test]
fn malformed_payload_for_known_kind_is_dropped() {
    let (handler, actions) = handler();
    handler.handle(&ChannelMessage::new("progress", json!({"stage": "features"})));
    handler.handle(&ChannelMessage::new("cesium/SHOW_NOTIFICATION", json!("oops")));
    assert!(actions.borrow().is_empty());
}

#[test]
fn progress_percentage_is_clamped() {
    let (handler, _) = handler();
    let actions = handler.translate(&ChannelMessage::new(
        "progress",
        json!({"stage": "models", "pct": 140.2}),
    ));
    assert!(matches!(
        actions.as_slice(),
        [Action::UpdateProgress { progress }] if progress.pct == 100
    ));
}

#[test]
fn configured_routes_extend_defaults() {
    let routes = BTreeMap::from([("custom/SPIN".to_string(), "spin_logo".to_string())]);
    let table = TranslationTable::from_routes(&routes).expect("valid routes");
    assert!(table.get("custom/SPIN").is_some());
    assert!(table.get("cesium/FETCH_MODELS").is_some());
}

#[test]
fn route_to_unknown_translator_is_a_configuration_error() {
    let routes = BTreeMap::from([("custom/X".to_string(), "launch_rockets".to_string())]);
    let err = TranslationTable::from_routes(&routes).expect_err("should fail");
    assert_eq!(
        err,
        HandlerConfigError::UnknownTranslator {
            kind: "custom/X".into(),
            translator: "launch_rockets".into(),
        }
    );
}

#[test]
fn custom_translator_can_be_registered_without_core_changes() {
    let mut table = TranslationTable::empty();
    table
        .insert(
            "cesium/NEW_THING",
            Translator::new("new_thing", |payload| {
                Ok(payload["ids"]
                    .as_array()
                    .map(|ids| ids.iter().map(|_| Action::SpinLogo).collect())
                    .unwrap_or_default())
            }),
        )
        .expect("insert");
    assert_eq!(table.insert(" ", Translator::constant("x", Action::SpinLogo)), Err(HandlerConfigError::EmptyKind));

    let dispatcher = RecordingDispatcher::default();
    let actions = Rc::clone(&dispatcher.actions);
    let handler = MessageHandler::new(table, dispatcher);
    handler.handle(&ChannelMessage::new("cesium/NEW_THING", json!({"ids": [1, 2]})));
    assert_eq!(actions.borrow().len(), 2);
}
