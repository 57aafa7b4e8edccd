//! # boneio-adapter-mqtt
//!
//! MQTT adapter: connects the board to a broker through `rumqttc`.
//!
//! ## Responsibilities
//! - Publish every [`StateMessage`] handed over by the cooperative loop
//! - Register a retained `offline` last will on `<prefix>/state`
//! - On every (re)connection, subscribe to `<prefix>/relay/+/set` and ask
//!   the loop to announce the board again
//! - Forward inbound relay commands to the loop as [`Task::Command`]
//!
//! The rumqttc event loop runs on its own tokio task. It never touches
//! relays: everything it receives is enqueued on the scheduler.
//!
//! ## Dependency rule
//! Same as other adapters: depends on `boneio-app` and `boneio-domain`.

pub mod config;
pub mod error;

use std::time::Duration;

use rumqttc::{AsyncClient, Event, EventLoop, LastWill, MqttOptions, Outgoing, Packet, QoS};
use tokio::task::JoinHandle;
use tracing::Instrument;

use boneio_app::ports::MessagePublisher;
use boneio_app::scheduler::{SchedulerHandle, Task};
use boneio_domain::message::StateMessage;
use boneio_domain::topic::{OFFLINE, Topics};

pub use config::MqttConfig;
pub use error::MqttError;

/// Connected MQTT client, usable as the board's [`MessagePublisher`].
#[derive(Clone)]
pub struct MqttBus {
    client: AsyncClient,
    status_topic: String,
}

impl MqttBus {
    /// Create the client and spawn its event loop.
    ///
    /// The connection itself is established by the event loop; until then
    /// publications wait in the request queue. Must be called from within a
    /// tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`MqttError::InvalidConfig`] when `config` is unusable.
    pub fn connect(
        config: &MqttConfig,
        topics: &Topics,
        scheduler: SchedulerHandle,
    ) -> Result<(Self, JoinHandle<()>), MqttError> {
        config.validate()?;

        let options = mqtt_options(config, topics);
        let span = tracing::info_span!(
            "mqtt",
            host = %config.host,
            port = config.port,
            client_id = %options.client_id(),
        );
        let (client, event_loop) = AsyncClient::new(options, config.request_capacity);
        let handler = EventHandler {
            client: client.clone(),
            command_filter: topics.relay_command_filter(),
            scheduler,
        };
        let task = tokio::spawn(
            drive(event_loop, handler, config.reconnect_delay()).instrument(span),
        );

        Ok((
            Self {
                client,
                status_topic: topics.unit_state(),
            },
            task,
        ))
    }

    /// Publish `offline` and disconnect cleanly.
    ///
    /// The event loop task ends once the disconnect went out. While the
    /// broker is unreachable the request queue may stay full; the attempt
    /// is abandoned after `grace`.
    ///
    /// # Errors
    ///
    /// Returns [`MqttError::Client`] if the request queue is closed and
    /// [`MqttError::ShutdownTimeout`] if `grace` elapsed first.
    pub async fn shutdown(&self, grace: Duration) -> Result<(), MqttError> {
        let requests = async {
            self.client
                .publish(self.status_topic.as_str(), QoS::AtLeastOnce, true, OFFLINE)
                .await?;
            self.client.disconnect().await
        };
        tokio::time::timeout(grace, requests)
            .await
            .map_err(|_| MqttError::ShutdownTimeout(grace))??;
        tracing::info!("mqtt disconnect requested");
        Ok(())
    }
}

impl MessagePublisher for MqttBus {
    async fn send_message(&self, message: StateMessage) {
        let StateMessage {
            topic,
            payload,
            retain,
        } = message;
        tracing::trace!(%topic, retain, "publishing");
        // never wait on the request queue: it stops draining while offline
        if let Err(err) =
            self.client
                .try_publish(topic.as_str(), QoS::AtLeastOnce, retain, payload.to_bytes())
        {
            tracing::warn!(%topic, error = %err, "dropping publication");
        }
    }
}

fn mqtt_options(config: &MqttConfig, topics: &Topics) -> MqttOptions {
    let mut options = MqttOptions::new(config.client_id(), config.host.clone(), config.port);
    options.set_keep_alive(config.keep_alive());
    options.set_last_will(LastWill::new(
        topics.unit_state(),
        OFFLINE,
        QoS::AtLeastOnce,
        true,
    ));
    if let Some(username) = &config.username {
        options.set_credentials(username, config.password.as_deref().unwrap_or_default());
    }
    options
}

/// What the event loop should do after an event.
#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Stop,
}

struct EventHandler {
    client: AsyncClient,
    command_filter: String,
    scheduler: SchedulerHandle,
}

impl EventHandler {
    fn handle(&self, event: Event) -> Flow {
        match event {
            Event::Incoming(Packet::ConnAck(ack)) => {
                tracing::info!(code = ?ack.code, "connected to broker");
                if let Err(err) = self
                    .client
                    .try_subscribe(self.command_filter.as_str(), QoS::AtLeastOnce)
                {
                    tracing::warn!(error = %err, filter = %self.command_filter, "failed to subscribe");
                }
                self.scheduler.call_soon(Task::Announce);
            }
            Event::Incoming(Packet::Publish(publish)) => {
                match std::str::from_utf8(&publish.payload) {
                    Ok(payload) => self.scheduler.call_soon(Task::Command {
                        topic: publish.topic,
                        payload: payload.to_string(),
                    }),
                    Err(_) => {
                        tracing::debug!(topic = %publish.topic, "ignoring non UTF-8 payload");
                    }
                }
            }
            Event::Outgoing(Outgoing::Disconnect) => return Flow::Stop,
            _ => {}
        }
        Flow::Continue
    }
}

async fn drive(mut event_loop: EventLoop, handler: EventHandler, reconnect_delay: Duration) {
    tracing::debug!("mqtt event loop started");
    loop {
        match event_loop.poll().await {
            Ok(event) => {
                if handler.handle(event) == Flow::Stop {
                    break;
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "mqtt connection error, retrying in {reconnect_delay:?}");
                tokio::time::sleep(reconnect_delay).await;
            }
        }
    }
    tracing::debug!("mqtt event loop stopped");
}
