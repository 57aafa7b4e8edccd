//! Manager: wires relays and inputs into one coordinated board.
//!
//! The manager is the only component that moves work from hardware
//! callback contexts onto the cooperative loop. Two paths touch relays:
//!
//! - **bus commands** are enqueued by the bus adapter and applied inside
//!   [`Manager::run`], so they never leave the loop;
//! - **input clicks** arrive on watcher threads. The relay is switched
//!   right there, and only the resulting publication is handed to the loop
//!   through the [`SchedulerHandle`].
//!
//! Relay state is therefore not guarded by any lock. The physical switch
//! may happen a moment before its state message is queued, which is fine:
//! the relay, not the notification, is authoritative.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Weak};
use std::time::Duration;

use boneio_domain::action::ActionSpec;
use boneio_domain::board::{BoardConfig, OutputKind};
use boneio_domain::click::ClickType;
use boneio_domain::discovery::build_discovery;
use boneio_domain::error::BoneIoError;
use boneio_domain::id::{InputId, RelayId};
use boneio_domain::message::StateMessage;
use boneio_domain::topic::{OFF, ON, ONLINE, Topics};

use crate::input::InputWatcher;
use crate::ports::{MessagePublisher, PinDriver};
use crate::relay::RelayOutput;
use crate::scheduler::{Scheduler, SchedulerHandle, Task};

/// Actions of one input, keyed by click type.
pub type ActionMap = HashMap<ClickType, ActionSpec>;

/// Coordinator of one board: relays, inputs and their publications.
///
/// Cheap to clone; clones share the same relays and watchers.
pub struct Manager<D> {
    shared: Arc<Shared<D>>,
    watchers: Arc<Vec<InputWatcher>>,
}

impl<D> Clone for Manager<D> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            watchers: Arc::clone(&self.watchers),
        }
    }
}

/// State reachable from watcher threads.
struct Shared<D> {
    topics: Topics,
    relays: BTreeMap<RelayId, RelayOutput<D>>,
    scheduler: SchedulerHandle,
    span: tracing::Span,
}

impl<D: PinDriver> Manager<D> {
    /// Build the board described by `config`.
    ///
    /// In order: claim every relay (forced low), queue discovery documents,
    /// queue one delayed state broadcast per relay, start every input
    /// watcher, queue the `online` status. All publications go through
    /// `scheduler`; nothing is sent until the loop runs.
    ///
    /// The delayed broadcast only gives the bus a moment to connect. It is
    /// not a synchronisation point; [`Task::Announce`] covers reconnects.
    ///
    /// # Errors
    ///
    /// Returns [`BoneIoError::Configuration`] for an invalid description and
    /// [`BoneIoError::HardwareInit`] when a pin cannot be claimed. Either
    /// aborts the whole board.
    pub fn new(
        config: &BoardConfig,
        driver: Arc<D>,
        scheduler: SchedulerHandle,
    ) -> Result<Self, BoneIoError> {
        config.validate()?;

        let span = tracing::info_span!("board", prefix = %config.topic_prefix);
        let _entered = span.clone().entered();
        let topics = Topics::new(config.topic_prefix.clone());

        let mut relays = BTreeMap::new();
        let mut order = Vec::with_capacity(config.relays.len());
        for relay_config in &config.relays {
            let relay = match relay_config.output_kind()? {
                OutputKind::Gpio => RelayOutput::initialize(
                    Arc::clone(&driver),
                    relay_config.pin.clone(),
                    relay_config.id.clone(),
                    &topics,
                    scheduler.clone(),
                    &span,
                )?,
            };
            order.push(relay.id().clone());
            relays.insert(relay.id().clone(), relay);
        }

        let delay = Duration::from_millis(config.initial_state_delay_ms);
        for id in &order {
            if config.ha_discovery.enabled {
                tracing::debug!(relay = %id, "sending HA discovery");
                let message = StateMessage::new(
                    topics.discovery(&config.ha_discovery.topic_prefix),
                    build_discovery(topics.prefix(), id.as_str()),
                )
                .retained();
                scheduler.call_soon(Task::Publish(message));
            }
            scheduler.call_later(delay, Task::SendState(id.clone()));
        }

        let shared = Arc::new(Shared {
            topics,
            relays,
            scheduler: scheduler.clone(),
            span: span.clone(),
        });

        let mut watchers = Vec::with_capacity(config.inputs.len());
        for input_config in &config.inputs {
            let actions = input_config.resolve_actions()?;
            let input_id = input_config.input_id();
            let dispatcher = Arc::downgrade(&shared);
            let callback_id = input_id.clone();
            let watcher = InputWatcher::spawn(
                driver.as_ref(),
                input_id,
                &input_config.pin,
                input_config.pull,
                config.timing,
                Box::new(move |click| dispatch_click(&dispatcher, click, &callback_id, &actions)),
                &span,
            )?;
            watchers.push(watcher);
        }

        scheduler.call_soon(Task::Publish(
            StateMessage::new(shared.topics.unit_state(), ONLINE).retained(),
        ));

        tracing::info!(
            relays = shared.relays.len(),
            inputs = watchers.len(),
            "manager ready to handle inputs and outputs"
        );

        Ok(Self {
            shared,
            watchers: Arc::new(watchers),
        })
    }

    #[must_use]
    pub fn topics(&self) -> &Topics {
        &self.shared.topics
    }

    /// Look up a relay by id.
    #[must_use]
    pub fn relay(&self, id: &str) -> Option<&RelayOutput<D>> {
        self.shared.relays.get(id)
    }

    /// All relays, ordered by id.
    pub fn relays(&self) -> impl Iterator<Item = &RelayOutput<D>> {
        self.shared.relays.values()
    }

    /// Running input watchers.
    #[must_use]
    pub fn inputs(&self) -> &[InputWatcher] {
        &self.watchers
    }

    /// React to a click reported by an input.
    ///
    /// Safe to call from any thread. Always queues the input event
    /// publication; then toggles the target relay if `actions` maps this
    /// click to an output. Unmapped clicks and unknown relays are ignored.
    pub fn handle_input_event(&self, click: ClickType, input_id: &InputId, actions: &ActionMap) {
        self.shared.handle_input_event(click, input_id, actions);
    }

    /// Apply a relay command received on `<prefix>/relay/<id>/set`.
    ///
    /// `ON` and `OFF` switch the relay; any other payload, foreign topic or
    /// unknown relay is ignored.
    pub fn receive_message(&self, topic: &str, payload: &str) {
        self.shared.receive_message(topic, payload);
    }

    /// Drive the cooperative loop.
    ///
    /// Only returns once the scheduler closes, which cannot happen while
    /// this manager is alive since it holds handles itself. Race it against
    /// a shutdown signal.
    pub async fn run<P: MessagePublisher>(&self, mut scheduler: Scheduler, publisher: &P) {
        while let Some(task) = scheduler.next().await {
            self.process(task, publisher).await;
        }
        tracing::debug!(parent: &self.shared.span, "scheduler closed, loop stopped");
    }

    /// Execute one scheduled task. Must only be called from the loop.
    pub async fn process<P: MessagePublisher>(&self, task: Task, publisher: &P) {
        match task {
            Task::Publish(message) => publisher.send_message(message).await,
            Task::SendState(id) => match self.shared.relays.get(&id) {
                Some(relay) => relay.send_state(publisher).await,
                None => tracing::debug!(relay = %id, "state requested for unknown relay"),
            },
            Task::Command { topic, payload } => self.receive_message(&topic, &payload),
            Task::Announce => {
                publisher
                    .send_message(
                        StateMessage::new(self.shared.topics.unit_state(), ONLINE).retained(),
                    )
                    .await;
                for relay in self.shared.relays.values() {
                    relay.send_state(publisher).await;
                }
            }
        }
    }
}

fn dispatch_click<D: PinDriver>(
    shared: &Weak<Shared<D>>,
    click: ClickType,
    input_id: &InputId,
    actions: &ActionMap,
) {
    if let Some(shared) = shared.upgrade() {
        shared.handle_input_event(click, input_id, actions);
    }
}

impl<D: PinDriver> Shared<D> {
    fn handle_input_event(&self, click: ClickType, input_id: &InputId, actions: &ActionMap) {
        let _entered = self.span.enter();
        self.scheduler.call_soon(Task::Publish(StateMessage::new(
            self.topics.input_event(input_id),
            click.label(),
        )));

        match actions.get(&click) {
            Some(ActionSpec::Output { target_relay_id }) => {
                match self.relays.get(target_relay_id) {
                    Some(relay) => relay.toggle(),
                    None => tracing::debug!(
                        input = %input_id,
                        relay = %target_relay_id,
                        "action targets unknown relay"
                    ),
                }
            }
            None => tracing::debug!(input = %input_id, %click, "no action configured"),
        }
    }

    fn receive_message(&self, topic: &str, payload: &str) {
        let _entered = self.span.enter();
        let Some(relay) = self
            .topics
            .parse_relay_command(topic)
            .and_then(|id| self.relays.get(id))
        else {
            tracing::debug!(topic, "command for unknown relay ignored");
            return;
        };

        match payload {
            ON => relay.turn_on(),
            OFF => relay.turn_off(),
            other => tracing::debug!(topic, payload = other, "unsupported relay command"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use boneio_domain::action::ActionConfig;
    use boneio_domain::board::{InputConfig, RelayConfig};
    use boneio_domain::error::{ConfigurationError, HardwareInitError};
    use boneio_domain::id::PinRef;
    use boneio_domain::message::Payload;
    use boneio_domain::pin::{Level, Pull};

    use super::*;
    use crate::ports::EdgeCallback;
    use crate::scheduler;

    #[derive(Default)]
    struct FakeBoard {
        levels: Mutex<HashMap<PinRef, Level>>,
        callbacks: Mutex<HashMap<PinRef, EdgeCallback>>,
    }

    impl FakeBoard {
        fn level(&self, pin: &str) -> Option<Level> {
            self.levels.lock().unwrap().get(pin).copied()
        }
    }

    impl PinDriver for FakeBoard {
        fn setup_output(&self, pin: &PinRef) -> Result<(), HardwareInitError> {
            let mut levels = self.levels.lock().unwrap();
            if levels.contains_key(pin) {
                return Err(HardwareInitError::PinInUse { pin: pin.clone() });
            }
            levels.insert(pin.clone(), Level::High);
            Ok(())
        }

        fn write_output(&self, pin: &PinRef, level: Level) {
            if let Some(current) = self.levels.lock().unwrap().get_mut(pin) {
                *current = level;
            }
        }

        fn setup_input(&self, pin: &PinRef, pull: Pull) -> Result<(), HardwareInitError> {
            let mut levels = self.levels.lock().unwrap();
            if levels.contains_key(pin) {
                return Err(HardwareInitError::PinInUse { pin: pin.clone() });
            }
            levels.insert(pin.clone(), pull.pressed_level().inverted());
            Ok(())
        }

        fn read_input(&self, pin: &PinRef, on_state: Level) -> bool {
            self.level(pin.as_str()) == Some(on_state)
        }

        fn edge_detect(&self, pin: &PinRef, callback: EdgeCallback) -> Result<(), HardwareInitError> {
            self.callbacks.lock().unwrap().insert(pin.clone(), callback);
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingPublisher {
        sent: Mutex<Vec<StateMessage>>,
    }

    impl RecordingPublisher {
        fn take(&self) -> Vec<StateMessage> {
            std::mem::take(&mut *self.sent.lock().unwrap())
        }
    }

    impl MessagePublisher for RecordingPublisher {
        async fn send_message(&self, message: StateMessage) {
            self.sent.lock().unwrap().push(message);
        }
    }

    fn relay(pin: &str, id: &str) -> RelayConfig {
        RelayConfig {
            pin: PinRef::from(pin),
            id: Some(RelayId::from(id)),
            kind: "gpio".to_string(),
        }
    }

    fn toggle(target: &str) -> ActionConfig {
        ActionConfig {
            action: "output".to_string(),
            pin: target.to_string(),
        }
    }

    fn board() -> BoardConfig {
        BoardConfig {
            topic_prefix: "home".to_string(),
            initial_state_delay_ms: 0,
            relays: vec![relay("P8_30", "relay1"), relay("P8_31", "relay2")],
            inputs: vec![InputConfig {
                pin: PinRef::from("P9_11"),
                id: Some(InputId::from("btn1")),
                pull: Pull::Up,
                actions: HashMap::from([(ClickType::Single, toggle("relay1"))]),
            }],
            ..BoardConfig::default()
        }
    }

    fn single_to(target: &str) -> ActionMap {
        HashMap::from([(
            ClickType::Single,
            ActionSpec::Output {
                target_relay_id: RelayId::from(target),
            },
        )])
    }

    async fn drain(
        manager: &Manager<FakeBoard>,
        scheduler: &mut Scheduler,
        publisher: &RecordingPublisher,
    ) -> Vec<StateMessage> {
        while let Some(task) = scheduler.try_next() {
            manager.process(task, publisher).await;
        }
        publisher.take()
    }

    async fn started() -> (Manager<FakeBoard>, Scheduler, RecordingPublisher, Arc<FakeBoard>) {
        let driver = Arc::new(FakeBoard::default());
        let (mut scheduler, handle) = scheduler::channel();
        let manager = Manager::new(&board(), Arc::clone(&driver), handle).unwrap();
        let publisher = RecordingPublisher::default();
        drain(&manager, &mut scheduler, &publisher).await;
        (manager, scheduler, publisher, driver)
    }

    fn topics(messages: &[StateMessage]) -> Vec<&str> {
        messages.iter().map(|m| m.topic.as_str()).collect()
    }

    #[tokio::test]
    async fn should_publish_startup_sequence_in_order() {
        let driver = Arc::new(FakeBoard::default());
        let (mut scheduler, handle) = scheduler::channel();
        let manager = Manager::new(&board(), driver, handle).unwrap();
        let publisher = RecordingPublisher::default();

        let sent = drain(&manager, &mut scheduler, &publisher).await;
        assert_eq!(
            topics(&sent),
            vec![
                "homeassistant/switch/home/switch/config",
                "homeassistant/switch/home/switch/config",
                "home/state",
                "home/relay/relay1",
                "home/relay/relay2",
            ]
        );
        assert_eq!(sent[0].payload.as_json().unwrap()["unique_id"], "homerelayrelay1");
        assert_eq!(sent[1].payload.as_json().unwrap()["unique_id"], "homerelayrelay2");
        assert!(sent[0].retain);
        assert_eq!(sent[2].payload, Payload::from("online"));
        assert!(sent[2].retain);
        assert_eq!(
            sent[3].payload.as_json(),
            Some(&serde_json::json!({"state": false}))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn should_delay_initial_state_broadcast() {
        let config = BoardConfig {
            initial_state_delay_ms: 500,
            ..board()
        };
        let (mut scheduler, handle) = scheduler::channel();
        let manager = Manager::new(&config, Arc::new(FakeBoard::default()), handle).unwrap();
        let publisher = RecordingPublisher::default();

        let early = drain(&manager, &mut scheduler, &publisher).await;
        assert!(!topics(&early).contains(&"home/relay/relay1"));

        tokio::time::advance(Duration::from_millis(500)).await;
        let late = drain(&manager, &mut scheduler, &publisher).await;
        assert_eq!(topics(&late), vec!["home/relay/relay1", "home/relay/relay2"]);
    }

    #[tokio::test]
    async fn should_skip_discovery_when_disabled() {
        let mut config = board();
        config.ha_discovery.enabled = false;
        let (mut scheduler, handle) = scheduler::channel();
        let manager = Manager::new(&config, Arc::new(FakeBoard::default()), handle).unwrap();
        let publisher = RecordingPublisher::default();

        let sent = drain(&manager, &mut scheduler, &publisher).await;
        assert!(sent.iter().all(|m| !m.topic.starts_with("homeassistant")));
    }

    #[tokio::test]
    async fn should_force_relays_low_on_startup() {
        let (manager, _scheduler, _publisher, driver) = started().await;
        assert_eq!(driver.level("P8_30"), Some(Level::Low));
        assert!(!manager.relay("relay1").unwrap().is_active());
    }

    #[tokio::test]
    async fn should_toggle_relay_and_publish_input_event_on_click() {
        let (manager, mut scheduler, publisher, _driver) = started().await;

        manager.handle_input_event(ClickType::Single, &InputId::from("btn1"), &single_to("relay1"));

        assert!(manager.relay("relay1").unwrap().is_active());
        let sent = drain(&manager, &mut scheduler, &publisher).await;
        assert_eq!(topics(&sent), vec!["home/input/btn1", "home/relay/relay1"]);
        assert_eq!(sent[0].payload, Payload::from("single"));
        assert_eq!(
            sent[1].payload.as_json(),
            Some(&serde_json::json!({"state": true}))
        );
    }

    #[tokio::test]
    async fn should_only_publish_input_event_when_no_action_matches() {
        let (manager, mut scheduler, publisher, _driver) = started().await;

        manager.handle_input_event(ClickType::Double, &InputId::from("btn1"), &single_to("relay1"));

        assert!(!manager.relay("relay1").unwrap().is_active());
        let sent = drain(&manager, &mut scheduler, &publisher).await;
        assert_eq!(topics(&sent), vec!["home/input/btn1"]);
        assert_eq!(sent[0].payload, Payload::from("double"));
    }

    #[tokio::test]
    async fn should_ignore_action_targeting_unknown_relay() {
        let (manager, mut scheduler, publisher, _driver) = started().await;

        manager.handle_input_event(ClickType::Single, &InputId::from("btn1"), &single_to("nope"));

        let sent = drain(&manager, &mut scheduler, &publisher).await;
        assert_eq!(topics(&sent), vec!["home/input/btn1"]);
        assert!(manager.relays().all(|relay| !relay.is_active()));
    }

    #[tokio::test]
    async fn should_switch_relay_on_bus_commands() {
        let (manager, mut scheduler, publisher, _driver) = started().await;
        let relay = manager.relay("relay1").unwrap();

        manager.receive_message("home/relay/relay1/set", "ON");
        assert!(relay.is_active());
        manager.receive_message("home/relay/relay1/set", "toggle");
        assert!(relay.is_active());
        manager.receive_message("home/relay/relay1/set", "OFF");
        assert!(!relay.is_active());

        let sent = drain(&manager, &mut scheduler, &publisher).await;
        assert_eq!(topics(&sent), vec!["home/relay/relay1", "home/relay/relay1"]);
    }

    #[tokio::test]
    async fn should_ignore_commands_for_unknown_relays_or_topics() {
        let (manager, mut scheduler, publisher, _driver) = started().await;

        manager.receive_message("home/relay/relay9/set", "ON");
        manager.receive_message("other/relay/relay1/set", "ON");
        manager.receive_message("home/relay/relay1", "ON");

        assert!(manager.relays().all(|relay| !relay.is_active()));
        assert!(drain(&manager, &mut scheduler, &publisher).await.is_empty());
    }

    #[tokio::test]
    async fn should_apply_queued_bus_command_on_loop() {
        let (manager, mut scheduler, publisher, _driver) = started().await;

        manager.process(
            Task::Command {
                topic: "home/relay/relay2/set".to_string(),
                payload: "ON".to_string(),
            },
            &publisher,
        )
        .await;

        assert!(manager.relay("relay2").unwrap().is_active());
        let sent = drain(&manager, &mut scheduler, &publisher).await;
        assert_eq!(topics(&sent), vec!["home/relay/relay2"]);
    }

    #[tokio::test]
    async fn should_republish_status_and_states_on_announce() {
        let (manager, _scheduler, publisher, _driver) = started().await;
        manager.relay("relay2").unwrap().turn_on();

        manager.process(Task::Announce, &publisher).await;

        let sent = publisher.take();
        assert_eq!(
            topics(&sent),
            vec!["home/state", "home/relay/relay1", "home/relay/relay2"]
        );
        assert_eq!(
            sent[2].payload.as_json(),
            Some(&serde_json::json!({"state": true}))
        );
    }

    #[tokio::test]
    async fn should_dispatch_clicks_detected_by_input_watcher() {
        let (manager, mut scheduler, publisher, driver) = started().await;
        assert_eq!(manager.inputs().len(), 1);

        let edge = |level: Level| {
            let callbacks = driver.callbacks.lock().unwrap();
            (callbacks.get("P9_11").unwrap())(level);
        };
        edge(Level::Low);
        std::thread::sleep(Duration::from_millis(80));
        edge(Level::High);

        let mut sent = Vec::new();
        for _ in 0..200 {
            sent.extend(drain(&manager, &mut scheduler, &publisher).await);
            if sent.len() >= 2 {
                break;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(topics(&sent), vec!["home/input/btn1", "home/relay/relay1"]);
        assert!(manager.relay("relay1").unwrap().is_active());
    }

    #[test]
    fn should_reject_unknown_output_kind() {
        let mut config = board();
        config.relays[0].kind = "mcp23017".to_string();
        let (_scheduler, handle) = scheduler::channel();
        let result = Manager::new(&config, Arc::new(FakeBoard::default()), handle);
        assert!(matches!(
            result,
            Err(BoneIoError::Configuration(ConfigurationError::UnknownOutputKind(_)))
        ));
    }

    #[test]
    fn should_reject_unknown_action_kind() {
        let mut config = board();
        config.inputs[0]
            .actions
            .insert(ClickType::Long, ActionConfig {
                action: "cover".to_string(),
                pin: "relay1".to_string(),
            });
        let (_scheduler, handle) = scheduler::channel();
        let result = Manager::new(&config, Arc::new(FakeBoard::default()), handle);
        assert!(matches!(
            result,
            Err(BoneIoError::Configuration(ConfigurationError::UnknownActionKind(_)))
        ));
    }

    #[test]
    fn should_abort_when_pin_is_claimed_twice() {
        let mut config = board();
        config.relays[1].pin = PinRef::from("P8_30");
        let (_scheduler, handle) = scheduler::channel();
        let result = Manager::new(&config, Arc::new(FakeBoard::default()), handle);
        assert!(matches!(
            result,
            Err(BoneIoError::HardwareInit(HardwareInitError::PinInUse { .. }))
        ));
    }
}
