//! End-to-end tests for the board stack without a broker.
//!
//! Each test wires the real manager to the virtual pin driver and runs the
//! cooperative loop on a tokio task. Publications land in a channel instead
//! of MQTT; bus commands are enqueued exactly as the MQTT adapter does.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use boneio_adapter_virtual::VirtualPins;
use boneio_app::manager::Manager;
use boneio_app::ports::MessagePublisher;
use boneio_app::scheduler::{self, SchedulerHandle, Task};
use boneio_domain::action::{ActionConfig, ActionSpec};
use boneio_domain::board::{BoardConfig, InputConfig, RelayConfig};
use boneio_domain::click::ClickType;
use boneio_domain::id::{InputId, PinRef, RelayId};
use boneio_domain::message::{Payload, StateMessage};
use boneio_domain::pin::{Level, Pull};
use serde_json::json;
use tokio::sync::mpsc;

struct ChannelPublisher {
    tx: mpsc::UnboundedSender<StateMessage>,
}

impl MessagePublisher for ChannelPublisher {
    async fn send_message(&self, message: StateMessage) {
        let _ = self.tx.send(message);
    }
}

struct Board {
    pins: Arc<VirtualPins>,
    manager: Manager<VirtualPins>,
    handle: SchedulerHandle,
    published: mpsc::UnboundedReceiver<StateMessage>,
}

impl Board {
    /// Next publication, or `None` if nothing arrives within a second.
    async fn next(&mut self) -> Option<StateMessage> {
        tokio::time::timeout(Duration::from_secs(1), self.published.recv())
            .await
            .ok()
            .flatten()
    }

    async fn expect(&mut self, count: usize) -> Vec<StateMessage> {
        let mut messages = Vec::with_capacity(count);
        while messages.len() < count {
            let message = self.next().await.expect("publication should arrive");
            messages.push(message);
        }
        messages
    }

    async fn assert_quiet(&mut self) {
        let extra = tokio::time::timeout(Duration::from_millis(300), self.published.recv()).await;
        assert!(extra.is_err(), "unexpected publication: {extra:?}");
    }
}

fn layout() -> BoardConfig {
    BoardConfig {
        topic_prefix: "home".to_string(),
        initial_state_delay_ms: 0,
        relays: vec![RelayConfig {
            pin: PinRef::from("P1"),
            id: Some(RelayId::from("r1")),
            kind: "gpio".to_string(),
        }],
        inputs: vec![InputConfig {
            pin: PinRef::from("P2"),
            id: Some(InputId::from("b1")),
            pull: Pull::Up,
            actions: HashMap::from([(
                ClickType::Single,
                ActionConfig {
                    action: "output".to_string(),
                    pin: "r1".to_string(),
                },
            )]),
        }],
        ..BoardConfig::default()
    }
}

/// Start the board and consume its startup publications.
async fn start() -> Board {
    let pins = Arc::new(VirtualPins::new());
    let (scheduler, handle) = scheduler::channel();
    let manager = Manager::new(&layout(), Arc::clone(&pins), handle.clone())
        .expect("board should initialise");

    let (tx, published) = mpsc::unbounded_channel();
    let runner = manager.clone();
    tokio::spawn(async move {
        runner.run(scheduler, &ChannelPublisher { tx }).await;
    });

    let mut board = Board {
        pins,
        manager,
        handle,
        published,
    };
    let startup = board.expect(3).await;
    let topics: Vec<_> = startup.iter().map(|m| m.topic.as_str()).collect();
    assert_eq!(
        topics,
        vec![
            "homeassistant/switch/home/switch/config",
            "home/state",
            "home/relay/r1",
        ]
    );
    board
}

#[tokio::test]
async fn should_start_with_relay_off_and_announce_online() {
    let mut board = start().await;
    assert_eq!(board.pins.level("P1"), Some(Level::Low));
    assert!(!board.manager.relay("r1").unwrap().is_active());
    board.assert_quiet().await;
}

#[tokio::test]
async fn should_publish_input_and_relay_state_when_single_click_is_delivered() {
    let mut board = start().await;

    let actions = HashMap::from([(
        ClickType::Single,
        ActionSpec::Output {
            target_relay_id: RelayId::from("r1"),
        },
    )]);
    board
        .manager
        .handle_input_event(ClickType::Single, &InputId::from("b1"), &actions);

    let sent = board.expect(2).await;
    assert_eq!(sent[0].topic, "home/input/b1");
    assert_eq!(sent[0].payload, Payload::from("single"));
    assert_eq!(sent[1].topic, "home/relay/r1");
    assert_eq!(sent[1].payload.as_json(), Some(&json!({"state": true})));
    board.assert_quiet().await;
}

#[tokio::test]
async fn should_toggle_relay_when_virtual_button_is_clicked() {
    let mut board = start().await;

    assert!(board.pins.press("P2"));
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(board.pins.release("P2"));

    let sent = board.expect(2).await;
    assert_eq!(sent[0].topic, "home/input/b1");
    assert_eq!(sent[0].payload, Payload::from("single"));
    assert_eq!(sent[1].payload.as_json(), Some(&json!({"state": true})));
    assert_eq!(board.pins.level("P1"), Some(Level::High));
}

#[tokio::test]
async fn should_publish_input_event_only_for_unmapped_long_press() {
    let mut board = start().await;

    board.pins.press("P2");
    let sent = board.expect(1).await;
    board.pins.release("P2");

    assert_eq!(sent[0].topic, "home/input/b1");
    assert_eq!(sent[0].payload, Payload::from("long"));
    assert_eq!(board.pins.level("P1"), Some(Level::Low));
    board.assert_quiet().await;
}

#[tokio::test]
async fn should_switch_relay_from_bus_commands() {
    let mut board = start().await;

    board.handle.call_soon(Task::Command {
        topic: "home/relay/r1/set".to_string(),
        payload: "ON".to_string(),
    });
    let on = board.expect(1).await;
    assert_eq!(on[0].payload.as_json(), Some(&json!({"state": true})));
    assert_eq!(board.pins.level("P1"), Some(Level::High));

    board.handle.call_soon(Task::Command {
        topic: "home/relay/r1/set".to_string(),
        payload: "BOGUS".to_string(),
    });
    board.handle.call_soon(Task::Command {
        topic: "home/relay/r1/set".to_string(),
        payload: "OFF".to_string(),
    });
    let off = board.expect(1).await;
    assert_eq!(off[0].payload.as_json(), Some(&json!({"state": false})));
    board.assert_quiet().await;
}

#[tokio::test]
async fn should_reannounce_status_and_state_after_reconnect() {
    let mut board = start().await;
    board.manager.relay("r1").unwrap().turn_on();
    board.expect(1).await;

    board.handle.call_soon(Task::Announce);

    let sent = board.expect(2).await;
    assert_eq!(sent[0].topic, "home/state");
    assert!(sent[0].retain);
    assert_eq!(sent[1].topic, "home/relay/r1");
    assert_eq!(sent[1].payload.as_json(), Some(&json!({"state": true})));
}
