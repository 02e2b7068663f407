use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use bytes::Bytes;
use futures::{Sink, SinkExt, StreamExt};
use realtime::Error;
use serde_json::{Value, json};
use tracing::{debug, info, warn};
use trip_tracker::{ErrorReply, Outcome, Provider, Tracker, Trip};

pub fn router<P: Provider>(tracker: Tracker<P>) -> Router {
    Router::new()
        .route("/", get(connect::<P>))
        .route("/ws", get(connect::<P>))
        .route("/health", get(health::<P>))
        .route("/trips/{trip_id}", get(trip::<P>))
        .with_state(tracker)
}

async fn connect<P: Provider>(
    State(tracker): State<Tracker<P>>, upgrade: WebSocketUpgrade,
) -> Response {
    upgrade.on_upgrade(move |socket| session(socket, tracker))
}

/// Drives one client connection until either side closes it.
async fn session<P: Provider>(socket: WebSocket, tracker: Tracker<P>) {
    let mut subscription = tracker.subscribe();
    let observer = subscription.id();
    info!(monotonic_counter.connections = 1, %observer, "observer connected");

    let (mut sink, mut stream) = socket.split();
    loop {
        tokio::select! {
            frame = subscription.recv() => {
                let Some(frame) = frame else { break };
                if let Err(err) = send(&mut sink, &frame).await {
                    debug!(%observer, error = %err, "broadcast send failed");
                    break;
                }
            }
            message = stream.next() => match message {
                Some(Ok(Message::Text(text))) => {
                    if let Outcome::Reply(reply) = tracker.handle(text.as_str().as_bytes()).await
                        && let Err(err) = send(&mut sink, &reply).await
                    {
                        debug!(%observer, error = %err, "reply send failed");
                        break;
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                // binary frames are ignored, ping/pong is answered by axum
                Some(Ok(_)) => {}
                Some(Err(err)) => {
                    debug!(%observer, error = %err, "socket error");
                    break;
                }
            },
        }
    }

    info!(%observer, "observer disconnected");
}

async fn send<S>(sink: &mut S, frame: &Bytes) -> anyhow::Result<()>
where
    S: Sink<Message> + Unpin,
    S::Error: std::error::Error + Send + Sync + 'static,
{
    let text = std::str::from_utf8(frame)?;
    sink.send(Message::Text(text.into())).await?;
    Ok(())
}

async fn health<P: Provider>(State(tracker): State<Tracker<P>>) -> Json<Value> {
    Json(json!({"status": "ok", "observers": tracker.observers()}))
}

async fn trip<P: Provider>(
    State(tracker): State<Tracker<P>>, Path(trip_id): Path<String>,
) -> Result<Json<Trip>, HttpError> {
    match tracker.trip(&trip_id).await? {
        Some(trip) => Ok(Json(trip)),
        None => Err(HttpError(Error::TripNotFound(format!("Scheduled bus {trip_id} not found")))),
    }
}

/// Maps tracking errors onto HTTP responses.
#[derive(Debug)]
pub struct HttpError(Error);

impl HttpError {
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match &self.0 {
            Error::Validation(_) | Error::InvalidFormat(_) => StatusCode::BAD_REQUEST,
            Error::TripNotFound(_) => StatusCode::NOT_FOUND,
            Error::IncompleteRoute(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Error::TransientStore(_) => StatusCode::SERVICE_UNAVAILABLE,
            Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<Error> for HttpError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            warn!(code = self.0.code(), error = %self.0, "request failed");
        }
        (status, Json(ErrorReply::from(&self.0))).into_response()
    }
}
