//! MQTT transport
//!
//! One client connection carries every subscription. A background task drives the
//! client's event loop: it routes incoming publishes to the arrival handle registered
//! for their topic, hands SUBACKs back to the waiting `subscribe` call, and subscribes
//! again to every routed topic when the broker accepts a new session after a
//! connection loss.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use rumqttc::{
    AsyncClient, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS, SubAck,
    SubscribeReasonCode,
};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, instrument, trace, warn};

use super::Transport;
use crate::config::TransportConfig;
use crate::error::{TransportError, TransportResult};
use crate::registry::{Channel, ChannelKind};
use crate::tracker::ArrivalHandle;

/// Who is waiting for the SUBACK of a subscribe request.
#[derive(Debug)]
enum Waiter {
    Caller(oneshot::Sender<SubAck>),
    Resubscribe(String),
}

#[derive(Debug)]
struct Route {
    handle: ArrivalHandle,
    qos: QoS,
}

/// State shared between the transport and its event-loop task.
#[derive(Debug, Default)]
struct Router {
    routes: HashMap<String, Route>,
    /// Requests handed to the client but not yet written, in request order
    queued: VecDeque<Waiter>,
    /// Requests written to the broker, by packet id
    in_flight: HashMap<u16, Waiter>,
    closing: bool,
}

type SharedRouter = Arc<Mutex<Router>>;

impl Router {
    fn handle_for(&self, topic: &str) -> Option<ArrivalHandle> {
        self.routes.get(topic).map(|route| route.handle.clone())
    }

    fn sent(&mut self, pkid: u16) {
        match self.queued.pop_front() {
            Some(waiter) => {
                self.in_flight.insert(pkid, waiter);
            }
            None => trace!("untracked subscribe request {pkid}"),
        }
    }

    fn acknowledge(&mut self, ack: SubAck) {
        match self.in_flight.remove(&ack.pkid) {
            Some(Waiter::Caller(waiting)) => {
                let _ = waiting.send(ack);
            }
            Some(Waiter::Resubscribe(topic)) => {
                if granted(&ack) {
                    debug!("subscribed again to {topic}");
                } else {
                    error!("broker rejected resubscription to {topic}, channel will read as dead");
                }
            }
            None => trace!("SUBACK for unknown packet {}", ack.pkid),
        }
    }

    /// Forget pending requests. Dropping a caller's sender fails its `subscribe`.
    fn connection_lost(&mut self) -> usize {
        self.queued.clear();
        self.in_flight.clear();
        self.routes.len()
    }

    fn resubscribe(&mut self, client: &AsyncClient) {
        let topics: Vec<(String, QoS)> = self
            .routes
            .iter()
            .map(|(topic, route)| (topic.clone(), route.qos))
            .collect();

        for (topic, qos) in topics {
            self.queued.push_back(Waiter::Resubscribe(topic.clone()));
            if let Err(e) = client.try_subscribe(topic.as_str(), qos) {
                self.queued.pop_back();
                error!("failed to subscribe again to {topic}: {e}");
            }
        }
    }
}

fn granted(ack: &SubAck) -> bool {
    !ack.return_codes.is_empty()
        && ack
            .return_codes
            .iter()
            .all(|code| matches!(code, SubscribeReasonCode::Success(_)))
}

pub struct MqttTransport {
    client: AsyncClient,
    router: SharedRouter,
    event_task: Option<JoinHandle<()>>,
    ack_timeout: Duration,
}

/// Power status is subscribed reliably, distance sensors best-effort.
fn qos_for(kind: ChannelKind) -> QoS {
    match kind {
        ChannelKind::Battery => QoS::AtLeastOnce,
        ChannelKind::Range => QoS::AtMostOnce,
    }
}

impl MqttTransport {
    /// Connect to the broker and wait for it to accept the session.
    #[instrument(skip_all, fields(broker = %format!("{}:{}", config.host, config.port)))]
    pub async fn connect(config: &TransportConfig) -> TransportResult<Self> {
        let mut options = MqttOptions::new(&config.client_id, &config.host, config.port);
        options.set_keep_alive(Duration::from_secs(config.keep_alive_secs));

        let (client, mut eventloop) = AsyncClient::new(options, config.capacity);

        let handshake = async {
            loop {
                match eventloop.poll().await {
                    Ok(Event::Incoming(Packet::ConnAck(_))) => return Ok(()),
                    Ok(_) => continue,
                    Err(e) => return Err(TransportError::Connect(e.to_string())),
                }
            }
        };

        let ack_timeout = Duration::from_secs(config.connect_timeout_secs);
        tokio::time::timeout(ack_timeout, handshake)
            .await
            .map_err(|_| {
                TransportError::Connect(format!(
                    "no answer from broker within {}s",
                    config.connect_timeout_secs
                ))
            })??;

        debug!("connected to broker");

        let router = SharedRouter::default();
        let event_task = tokio::spawn(drive(eventloop, client.clone(), router.clone()));

        Ok(Self {
            client,
            router,
            event_task: Some(event_task),
            ack_timeout,
        })
    }
}

/// Run the event loop until the DISCONNECT is written or the connection fails while
/// shutting down.
async fn drive(mut eventloop: EventLoop, client: AsyncClient, router: SharedRouter) {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                let handle = router.lock().handle_for(&publish.topic);
                match handle {
                    Some(handle) => {
                        handle.record();
                    }
                    None => trace!("publish on unrouted topic {}", publish.topic),
                }
            }
            Ok(Event::Incoming(Packet::SubAck(ack))) => router.lock().acknowledge(ack),
            Ok(Event::Outgoing(Outgoing::Subscribe(pkid))) => router.lock().sent(pkid),
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                warn!("reconnected to broker, subscribing again");
                router.lock().resubscribe(&client);
            }
            Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                debug!("disconnect sent");
                return;
            }
            Ok(_) => {}
            Err(e) => {
                let dropped = {
                    let mut router = router.lock();
                    if router.closing {
                        debug!("event loop stopped while shutting down: {e}");
                        return;
                    }
                    router.connection_lost()
                };

                error!(
                    "MQTT connection lost, {dropped} subscriptions dropped until the broker reconnects: {e}"
                );
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        }
    }
}

#[async_trait]
impl Transport for MqttTransport {
    async fn subscribe(
        &mut self,
        channel: &Channel,
        handle: ArrivalHandle,
    ) -> TransportResult<()> {
        let subscribe_error = |reason: String| TransportError::Subscribe {
            channel: channel.id.clone(),
            reason,
        };

        let qos = qos_for(channel.kind);
        let (waiting, acknowledged) = oneshot::channel();

        {
            let mut router = self.router.lock();
            router
                .routes
                .insert(channel.id.clone(), Route { handle, qos });
            router.queued.push_back(Waiter::Caller(waiting));

            if let Err(e) = self.client.try_subscribe(channel.id.as_str(), qos) {
                router.queued.pop_back();
                router.routes.remove(&channel.id);
                return Err(subscribe_error(e.to_string()));
            }
        }

        let outcome = match tokio::time::timeout(self.ack_timeout, acknowledged).await {
            Ok(Ok(ack)) if granted(&ack) => Ok(()),
            Ok(Ok(ack)) => Err(format!(
                "broker rejected subscription ({:?})",
                ack.return_codes
            )),
            Ok(Err(_)) => Err("connection lost before the broker acknowledged".to_string()),
            Err(_) => Err(format!(
                "no acknowledgement within {}s",
                self.ack_timeout.as_secs()
            )),
        };

        if let Err(reason) = outcome {
            self.router.lock().routes.remove(&channel.id);
            return Err(subscribe_error(reason));
        }

        debug!("subscribed to {} ({})", channel.id, channel.kind);
        Ok(())
    }

    async fn shutdown(&mut self) {
        {
            let mut router = self.router.lock();
            router.closing = true;
            router.routes.clear();
        }

        let Some(mut task) = self.event_task.take() else {
            return;
        };

        if let Err(e) = self.client.disconnect().await {
            warn!("failed to request disconnect: {e}");
            task.abort();
            return;
        }

        if tokio::time::timeout(self.ack_timeout, &mut task).await.is_err() {
            warn!("broker connection did not close in time, dropping it");
            task.abort();
        }

        debug!("MQTT transport shut down");
    }
}
