use crate::api::schemas::gateway::{ClientFrame, ServerFrame};
use crate::config::GatewayConfig;
use crate::domain::message::Message;
use crate::error::AppError;
use crate::services::fanout::Fanout;
use crate::services::gateway::Metrics;
use crate::services::room_service::RoomService;
use axum::extract::ws::{Message as WsMessage, WebSocket};
use futures::{SinkExt, StreamExt, stream::SplitSink};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_stream::StreamMap;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use uuid::Uuid;

pub struct Session {
    pub user_id: Uuid,
    pub request_id: String,
    pub socket: WebSocket,
    pub room_service: RoomService,
    pub fanout: Arc<dyn Fanout>,
    pub metrics: Metrics,
    pub config: GatewayConfig,
    pub shutdown_rx: tokio::sync::watch::Receiver<bool>,
}

impl Session {
    #[tracing::instrument(
        name = "gateway_session",
        skip(self),
        fields(
            user_id = %self.user_id,
            request_id = %self.request_id,
            otel.kind = "server",
            ws.session_id = %Uuid::new_v4()
        )
    )]
    pub(crate) async fn run(self) {
        // Destructuring allows independent mutable access to fields while the
        // socket is split into sink and stream halves.
        let Self { user_id, socket, room_service, fanout, metrics, config, mut shutdown_rx, .. } = self;

        metrics.active_connections.add(1, &[]);
        tracing::info!("Gateway connected");

        // The inbox subscription is implicit; room topics are opt-in per frame.
        let mut inbox_rx = fanout.subscribe_user(user_id).await;
        let (mut ws_sink, mut ws_stream) = socket.split();

        // The ready frame follows the inbox subscription, so a client that has
        // seen it cannot miss activity for messages sent afterwards.
        if send_frame(&mut ws_sink, &ServerFrame::Ready { user_id }).await.is_err() {
            metrics.active_connections.add(-1, &[]);
            tracing::info!("Gateway disconnected");
            return;
        }

        let mut room_streams: StreamMap<i64, BroadcastStream<Message>> = StreamMap::new();

        loop {
            // Shutdown and client control frames take priority over fanout traffic.
            if *shutdown_rx.borrow() {
                tracing::info!("Shutdown signal received, closing gateway session");
                let _ = ws_sink
                    .send(WsMessage::Close(Some(axum::extract::ws::CloseFrame {
                        code: axum::extract::ws::close_code::AWAY,
                        reason: "Server shutting down".into(),
                    })))
                    .await;
                break;
            }

            tokio::select! {
                biased;

                _ = shutdown_rx.changed() => {}

                msg = ws_stream.next() => {
                    let (reply, continue_loop) = match msg {
                        Some(Ok(WsMessage::Text(text))) => match serde_json::from_str::<ClientFrame>(&text) {
                            Ok(ClientFrame::Subscribe { room_id }) => {
                                let frame = subscribe(
                                    &room_service,
                                    &fanout,
                                    &mut room_streams,
                                    &metrics,
                                    config.max_room_subscriptions,
                                    user_id,
                                    room_id,
                                )
                                .await;
                                (Some(frame), true)
                            }
                            Ok(ClientFrame::Unsubscribe { room_id }) => {
                                if room_streams.remove(&room_id).is_some() {
                                    metrics.room_subscriptions.add(-1, &[]);
                                }
                                (Some(ServerFrame::Unsubscribed { room_id }), true)
                            }
                            Err(e) => {
                                tracing::warn!(error = %e, "Unparseable gateway frame");
                                (Some(ServerFrame::Error { message: "Unrecognized frame".to_owned() }), true)
                            }
                        },
                        Some(Ok(WsMessage::Close(_)) | Err(_)) | None => (None, false),
                        Some(Ok(WsMessage::Binary(_))) => {
                            tracing::warn!("Received unexpected binary frame");
                            (Some(ServerFrame::Error { message: "Binary frames are not supported".to_owned() }), true)
                        }
                        Some(Ok(WsMessage::Ping(_))) => {
                            tracing::debug!("Received heartbeat ping from client");
                            (None, true)
                        }
                        Some(Ok(WsMessage::Pong(_))) => {
                            tracing::debug!("Received heartbeat pong from client");
                            (None, true)
                        }
                    };

                    if let Some(frame) = reply
                        && send_frame(&mut ws_sink, &frame).await.is_err()
                    {
                        break;
                    }
                    if !continue_loop { break; }
                }

                Some((room_id, result)) = room_streams.next(), if !room_streams.is_empty() => {
                    match result {
                        Ok(message) => {
                            if send_frame(&mut ws_sink, &ServerFrame::from(&message)).await.is_err() { break; }
                        }
                        Err(BroadcastStreamRecvError::Lagged(missed)) => {
                            metrics.frames_lagged_total.add(1, &[]);
                            tracing::warn!(room_id, missed, "Session lagged behind room channel, frames dropped");
                        }
                    }
                }

                result = inbox_rx.recv() => {
                    match result {
                        Ok(activity) => {
                            if send_frame(&mut ws_sink, &ServerFrame::from(&activity)).await.is_err() { break; }
                        }
                        Err(broadcast::error::RecvError::Lagged(missed)) => {
                            metrics.frames_lagged_total.add(1, &[]);
                            tracing::warn!(missed, "Session lagged behind inbox channel, activity dropped");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            }
        }

        let _ = ws_sink.close().await;

        if !room_streams.is_empty() {
            metrics.room_subscriptions.add(-(room_streams.len() as i64), &[]);
        }
        metrics.active_connections.add(-1, &[]);
        tracing::info!("Gateway disconnected");
    }
}

async fn send_frame(sink: &mut SplitSink<WebSocket, WsMessage>, frame: &ServerFrame) -> Result<(), axum::Error> {
    match serde_json::to_string(frame) {
        Ok(json) => sink.send(WsMessage::Text(json.into())).await,
        Err(e) => {
            // Encoding only fails on a malformed frame type; keep the connection.
            tracing::error!(error = %e, "Failed to encode gateway frame");
            Ok(())
        }
    }
}

async fn subscribe(
    room_service: &RoomService,
    fanout: &Arc<dyn Fanout>,
    room_streams: &mut StreamMap<i64, BroadcastStream<Message>>,
    metrics: &Metrics,
    max_room_subscriptions: usize,
    user_id: Uuid,
    room_id: i64,
) -> ServerFrame {
    if room_streams.contains_key(&room_id) {
        return ServerFrame::Subscribed { room_id };
    }
    if room_streams.len() >= max_room_subscriptions {
        return ServerFrame::Error { message: "Room subscription limit reached".to_owned() };
    }

    match room_service.authorize_subscription(user_id, room_id).await {
        Ok(_) => {
            let rx = fanout.subscribe_room(room_id).await;
            room_streams.insert(room_id, BroadcastStream::new(rx));
            metrics.room_subscriptions.add(1, &[]);
            ServerFrame::Subscribed { room_id }
        }
        Err(AppError::NotFound) => ServerFrame::Error { message: format!("Room {room_id} not found") },
        Err(AppError::Forbidden) => ServerFrame::Error { message: format!("Not a participant of room {room_id}") },
        Err(e) => {
            tracing::error!(error = %e, "Room subscription check failed");
            ServerFrame::Error { message: "Subscription failed".to_owned() }
        }
    }
}
