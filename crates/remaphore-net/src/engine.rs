//! C7: Send / SendRequest / Receive engines (spec §4.7).
//!
//! Grounded in `original_source/src/nats/send.go` (`Send`, `SendRequest`,
//! `receiveReplies`) and `src/nats/recv.go` (`Receive`); the
//! subscribe-before-publish ordering and the `PotentialReceivers`-driven
//! collector loop are carried over exactly. `tokio_util::sync::CancellationToken`
//! stands in for the original's `context.Context` the way `gossipd::server`
//! structures its `tokio::select!` shutdown signal.

use crate::transport::{reply_subject, subject_for, Subscription, Transport, TransportError};
use remaphore_core::message::{Message, NewMessage};
use remaphore_core::model::Config;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::warn;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Protocol(#[from] remaphore_core::Error),
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Fire-and-forget send (spec §4.7 Send). `suffix` is the optional subject
/// suffix appended to the configured base subject.
pub async fn send<T: Transport>(
    transport: &T,
    config: &Config,
    suffix: Option<&str>,
    new: NewMessage,
) -> Result<(), EngineError> {
    let (wire, _hash) = Message::encode(new, config)?;
    let subject = subject_for(&config.base_subject, suffix);
    transport.publish(&subject, &wire).await?;
    transport.flush().await?;
    Ok(())
}

/// Request-with-replies (spec §4.7 SendRequest). `on_reply` is invoked once
/// per decoded, permission-checked reply; the collector stops once every
/// peer in `config.potential_receivers(new.destination)` has answered, the
/// token is cancelled, or the subscription closes.
pub async fn send_request<T, F>(
    transport: &T,
    config: &Config,
    suffix: Option<&str>,
    mut new: NewMessage,
    cancel: CancellationToken,
    mut on_reply: F,
) -> Result<(), EngineError>
where
    T: Transport,
    F: FnMut(Message),
{
    let mut remaining = config.potential_receivers(&new.destination);
    if remaining.is_empty() {
        return Err(remaphore_core::Error::NoReceivers.into());
    }

    new.request_reply = true;
    let (wire, hash) = Message::encode(new, config)?;
    let reply_subject = reply_subject(&config.base_subject, &hash);

    // Subscribe before publishing: a reply racing the publish must not be lost.
    let mut sub = transport.subscribe_sync(&reply_subject).await?;

    let subject = subject_for(&config.base_subject, suffix);
    transport.publish(&subject, &wire).await?;
    transport.flush().await?;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            maybe_bytes = sub.next_message() => {
                let Some(bytes) = maybe_bytes else { break };
                let reply = match Message::decode_reply(config, &bytes) {
                    Ok(reply) => reply,
                    Err(err) => {
                        warn!(error = %err, "dropping malformed reply");
                        continue;
                    }
                };
                if reply.request_reply {
                    continue;
                }
                remaining.remove(&reply.sender_public_key);
                on_reply(reply);
                if remaining.is_empty() {
                    break;
                }
            }
        }
    }

    transport.unsubscribe(sub).await?;
    Ok(())
}

/// What a receive handler wants to happen after processing one message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Continuation {
    Continue,
    Stop,
}

/// Handed to the receive handler when the decoded message requested a
/// reply; publishes to the private reply subject derived from the
/// message's content hash.
pub struct ReplyHandle<'a, T: Transport> {
    transport: &'a T,
    config: &'a Config,
    reply_subject: String,
}

impl<'a, T: Transport> ReplyHandle<'a, T> {
    /// Encode `new` as a reply (forcing verb `"reply"`) and publish it.
    pub async fn reply(&self, mut new: NewMessage) -> Result<(), EngineError> {
        new.verb = "reply".to_string();
        let (wire, _hash) = Message::encode_reply(new, self.config)?;
        self.transport.publish(&self.reply_subject, &wire).await?;
        self.transport.flush().await?;
        Ok(())
    }
}

/// Passive receive loop (spec §4.7 Receive). `predicates` filters decoded
/// messages before `handler` is invoked; `handler` returns
/// `Continuation::Stop` to end the loop early (one-shot mode).
pub async fn receive<'a, T, F>(
    transport: &'a T,
    config: &'a Config,
    suffix: Option<&str>,
    predicates: &[remaphore_core::MatchPredicate],
    cancel: CancellationToken,
    mut handler: F,
) -> Result<(), EngineError>
where
    T: Transport,
    F: FnMut(Message, Option<ReplyHandle<'a, T>>) -> futures::future::BoxFuture<'a, Continuation>,
{
    let subject = subject_for(&config.base_subject, suffix);
    let mut sub = transport.subscribe_sync(&subject).await?;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            maybe_bytes = sub.next_message() => {
                let Some(bytes) = maybe_bytes else { break };
                let message = match Message::decode(config, &bytes) {
                    Ok(message) => message,
                    Err(err) => {
                        warn!(error = %err, "dropping malformed message");
                        continue;
                    }
                };
                if !remaphore_core::evaluate(predicates, config, &message) {
                    continue;
                }
                let reply_handle = message.request_reply.then(|| ReplyHandle {
                    transport,
                    config,
                    reply_subject: reply_subject(&config.base_subject, &message.hash),
                });
                if handler(message, reply_handle).await == Continuation::Stop {
                    break;
                }
            }
        }
    }

    transport.unsubscribe(sub).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::LocalBus;
    use remaphore_core::keys::generate;
    use remaphore_core::model::{Identity, Peer, DEFAULT_ALLOWED_SKEW, DEFAULT_SUBJECT};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    fn two_party() -> (Config, Config) {
        let (a_pub, a_priv) = generate();
        let (b_pub, b_priv) = generate();
        let a = Config {
            transport_endpoints: vec!["local".into()],
            transport_credentials: "/creds".into(),
            base_subject: DEFAULT_SUBJECT.into(),
            default_key: a_pub,
            destination: "net.opaque.a".into(),
            allowed_clock_skew: DEFAULT_ALLOWED_SKEW,
            identities: vec![Identity {
                public_key: a_pub,
                private_key: a_priv,
                permissions: vec!["*".into()],
            }],
            peers: vec![Peer {
                public_key: b_pub,
                destination: "net.opaque.b".into(),
                permissions: vec!["*".into()],
            }],
        };
        let b = Config {
            transport_endpoints: vec!["local".into()],
            transport_credentials: "/creds".into(),
            base_subject: DEFAULT_SUBJECT.into(),
            default_key: b_pub,
            destination: "net.opaque.b".into(),
            allowed_clock_skew: DEFAULT_ALLOWED_SKEW,
            identities: vec![Identity {
                public_key: b_pub,
                private_key: b_priv,
                permissions: vec!["*".into()],
            }],
            peers: vec![Peer {
                public_key: a_pub,
                destination: "net.opaque.a".into(),
                permissions: vec!["*".into()],
            }],
        };
        (a, b)
    }

    #[tokio::test]
    async fn send_then_receive_round_trips() {
        let bus = LocalBus::new();
        let (sender_cfg, receiver_cfg) = two_party();
        let received = Arc::new(Mutex::new(None));
        let received2 = received.clone();

        let cancel = CancellationToken::new();
        let recv_cancel = cancel.clone();
        let recv_bus = bus.clone();
        let recv_task = tokio::spawn(async move {
            receive(
                &recv_bus,
                &receiver_cfg,
                None,
                &[],
                recv_cancel,
                move |msg, _reply| {
                    let received2 = received2.clone();
                    Box::pin(async move {
                        *received2.lock().unwrap() = Some(msg.payload.clone());
                        Continuation::Stop
                    })
                },
            )
            .await
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        send(
            &bus,
            &sender_cfg,
            None,
            NewMessage {
                sender: None,
                destination: "net.opaque.b".into(),
                request_reply: false,
                uuid: vec![],
                verb: "ping".into(),
                payload: "hello".into(),
            },
        )
        .await
        .unwrap();

        recv_task.await.unwrap().unwrap();
        assert_eq!(received.lock().unwrap().as_deref(), Some("hello"));
    }

    #[tokio::test]
    async fn send_request_collects_reply_from_every_receiver() {
        let bus = LocalBus::new();
        let (sender_cfg, receiver_cfg) = two_party();

        let cancel = CancellationToken::new();
        let recv_cancel = cancel.clone();
        let recv_bus = bus.clone();
        let recv_task = tokio::spawn(async move {
            receive(
                &recv_bus,
                &receiver_cfg,
                None,
                &[],
                recv_cancel,
                |msg, reply| {
                    Box::pin(async move {
                        let reply = reply.unwrap();
                        let payload = format!("pong:{}", msg.payload);
                        reply
                            .reply(NewMessage {
                                sender: None,
                                destination: String::new(),
                                request_reply: false,
                                uuid: vec![],
                                verb: String::new(),
                                payload,
                            })
                            .await
                            .unwrap();
                        Continuation::Stop
                    })
                },
            )
            .await
        });

        tokio::time::sleep(Duration::from_millis(20)).await;

        let replies = Arc::new(Mutex::new(Vec::new()));
        let replies2 = replies.clone();
        send_request(
            &bus,
            &sender_cfg,
            None,
            NewMessage {
                sender: None,
                destination: "net.opaque.b".into(),
                request_reply: true,
                uuid: vec![],
                verb: "ping".into(),
                payload: "hi".into(),
            },
            CancellationToken::new(),
            move |msg| replies2.lock().unwrap().push(msg.payload.clone()),
        )
        .await
        .unwrap();

        recv_task.await.unwrap().unwrap();
        assert_eq!(replies.lock().unwrap().as_slice(), ["pong:hi".to_string()]);
    }

    #[tokio::test]
    async fn send_request_with_no_receivers_errors() {
        let bus = LocalBus::new();
        let (sender_cfg, _) = two_party();
        let err = send_request(
            &bus,
            &sender_cfg,
            None,
            NewMessage {
                sender: None,
                destination: "net.opaque.nobody".into(),
                request_reply: true,
                uuid: vec![],
                verb: "ping".into(),
                payload: "hi".into(),
            },
            CancellationToken::new(),
            |_| {},
        )
        .await
        .unwrap_err();
        assert!(matches!(
            err,
            EngineError::Protocol(remaphore_core::Error::NoReceivers)
        ));
    }

    fn three_party() -> (Config, Config, Config) {
        let (req_pub, req_priv) = generate();
        let (p1_pub, p1_priv) = generate();
        let (p2_pub, p2_priv) = generate();

        let requester = Config {
            transport_endpoints: vec!["local".into()],
            transport_credentials: "/creds".into(),
            base_subject: DEFAULT_SUBJECT.into(),
            default_key: req_pub,
            destination: "net.opaque.requester".into(),
            allowed_clock_skew: DEFAULT_ALLOWED_SKEW,
            identities: vec![Identity {
                public_key: req_pub,
                private_key: req_priv,
                permissions: vec!["*".into()],
            }],
            peers: vec![
                Peer {
                    public_key: p1_pub,
                    destination: "net.opaque.p1".into(),
                    permissions: vec!["*".into()],
                },
                Peer {
                    public_key: p2_pub,
                    destination: "net.opaque.p2".into(),
                    permissions: vec!["*".into()],
                },
            ],
        };
        let p1 = Config {
            transport_endpoints: vec!["local".into()],
            transport_credentials: "/creds".into(),
            base_subject: DEFAULT_SUBJECT.into(),
            default_key: p1_pub,
            destination: "net.opaque.p1".into(),
            allowed_clock_skew: DEFAULT_ALLOWED_SKEW,
            identities: vec![Identity {
                public_key: p1_pub,
                private_key: p1_priv,
                permissions: vec!["*".into()],
            }],
            peers: vec![Peer {
                public_key: req_pub,
                destination: "net.opaque.requester".into(),
                permissions: vec!["*".into()],
            }],
        };
        let p2 = Config {
            transport_endpoints: vec!["local".into()],
            transport_credentials: "/creds".into(),
            base_subject: DEFAULT_SUBJECT.into(),
            default_key: p2_pub,
            destination: "net.opaque.p2".into(),
            allowed_clock_skew: DEFAULT_ALLOWED_SKEW,
            identities: vec![Identity {
                public_key: p2_pub,
                private_key: p2_priv,
                permissions: vec!["*".into()],
            }],
            peers: vec![Peer {
                public_key: req_pub,
                destination: "net.opaque.requester".into(),
                permissions: vec!["*".into()],
            }],
        };
        (requester, p1, p2)
    }

    /// spec §8 item 10, "Fan-out ping": two peers reply, the requester
    /// collects exactly both entries.
    #[tokio::test]
    async fn fan_out_ping_collects_both_replies() {
        let bus = LocalBus::new();
        let (requester_cfg, p1_cfg, p2_cfg) = three_party();
        let cancel = CancellationToken::new();

        for peer_cfg in [p1_cfg, p2_cfg] {
            let bus = bus.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move {
                receive(&bus, &peer_cfg, None, &[], cancel, |_msg, reply| {
                    Box::pin(async move {
                        reply
                            .unwrap()
                            .reply(NewMessage {
                                sender: None,
                                destination: String::new(),
                                request_reply: false,
                                uuid: vec![],
                                verb: String::new(),
                                payload: "0,pong".into(),
                            })
                            .await
                            .unwrap();
                        Continuation::Stop
                    })
                })
                .await
                .unwrap();
            });
        }

        tokio::time::sleep(Duration::from_millis(20)).await;

        let replies = Arc::new(Mutex::new(Vec::new()));
        let replies2 = replies.clone();
        send_request(
            &bus,
            &requester_cfg,
            None,
            NewMessage {
                sender: None,
                destination: "net.**".into(),
                request_reply: true,
                uuid: vec![],
                verb: "ping".into(),
                payload: "hello".into(),
            },
            CancellationToken::new(),
            move |msg| replies2.lock().unwrap().push(msg.payload.clone()),
        )
        .await
        .unwrap();

        let mut got = replies.lock().unwrap().clone();
        got.sort();
        assert_eq!(got, vec!["0,pong".to_string(), "0,pong".to_string()]);
    }

    /// spec §8 item 10, "One-shot by UUID": a UUID filter makes the first
    /// matching message trigger the handler once; an unrelated message is
    /// ignored.
    #[tokio::test]
    async fn one_shot_by_uuid_ignores_unrelated_messages() {
        use remaphore_core::MatchPredicate;

        let bus = LocalBus::new();
        let (sender_cfg, receiver_cfg) = two_party();
        let target_uuid = b"0123456789ab".to_vec();

        let received = Arc::new(Mutex::new(Vec::new()));
        let received2 = received.clone();
        let cancel = CancellationToken::new();
        let recv_cancel = cancel.clone();
        let recv_bus = bus.clone();
        let predicates = vec![MatchPredicate::UuidEquals(target_uuid.clone())];
        let recv_task = tokio::spawn(async move {
            receive(
                &recv_bus,
                &receiver_cfg,
                None,
                &predicates,
                recv_cancel,
                move |msg, _reply| {
                    let received2 = received2.clone();
                    Box::pin(async move {
                        received2.lock().unwrap().push(msg.payload.clone());
                        Continuation::Stop
                    })
                },
            )
            .await
        });

        tokio::time::sleep(Duration::from_millis(20)).await;

        send(
            &bus,
            &sender_cfg,
            None,
            NewMessage {
                sender: None,
                destination: "net.opaque.b".into(),
                request_reply: false,
                uuid: b"unrelated-id".to_vec(),
                verb: "ping".into(),
                payload: "ignored".into(),
            },
        )
        .await
        .unwrap();

        send(
            &bus,
            &sender_cfg,
            None,
            NewMessage {
                sender: None,
                destination: "net.opaque.b".into(),
                request_reply: false,
                uuid: target_uuid,
                verb: "ping".into(),
                payload: "matched".into(),
            },
        )
        .await
        .unwrap();

        recv_task.await.unwrap().unwrap();
        assert_eq!(received.lock().unwrap().as_slice(), ["matched".to_string()]);
    }
}
