//! Real-time chat over WebSocket.
//!
//! Frames are JSON objects of the `{"event": <name>, "data": {...}}` shape in
//! both directions.

use axum::{
    extract::ws::{self, WebSocket, WebSocketUpgrade},
    response::{IntoResponse as _, Response},
};
use futures::{SinkExt as _, StreamExt as _};
use service::{
    command::{self, Command as _},
    domain::user,
    realtime::{ConnectionId, Event, Inbound, Registration},
};
use tracing as log;

use crate::{define_error, rest, AsError, Context, Error, Service};

/// Chat WebSocket handler.
///
/// The connection is authenticated with the `Authorization` header or the
/// `token` query parameter.
pub async fn chat(mut context: Context, ws: WebSocketUpgrade) -> Response {
    let session = match context.apply_query_token() {
        Ok(()) => context.current_session().await,
        Err(e) => Err(e),
    };
    let user_id = match session {
        Ok(session) => session.user_id.into(),
        Err(e) => return rest::Envelope::<()>::failed(&e).into_response(),
    };

    let service = context.service().clone();
    ws.max_message_size(64 * 1024)
        .on_upgrade(move |socket| serve(socket, service, user_id))
}

/// Serves the chat over the provided [`WebSocket`] until either side closes
/// it.
#[tracing::instrument(
    skip_all,
    fields(%user_id, connection_id = tracing::field::Empty),
)]
async fn serve(socket: WebSocket, service: Service, user_id: user::Id) {
    let Registration {
        id: connection_id,
        mut events,
        is_first,
    } = service
        .execute(command::ConnectUser { user_id })
        .await
        .unwrap_or_else(|e| match e {});
    _ = tracing::Span::current()
        .record("connection_id", tracing::field::display(connection_id));
    log::debug!(is_first, "connection registered");

    let (mut sink, mut stream) = socket.split();
    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else {
                    break;
                };
                if send(&mut sink, &event).await.is_err() {
                    break;
                }
            }
            frame = stream.next() => {
                let reply = match frame {
                    Some(Ok(ws::Message::Text(text))) => {
                        dispatch(&service, connection_id, user_id, &text).await
                    }
                    Some(Ok(ws::Message::Binary(_))) => {
                        Err(FrameError::Malformed.into())
                    }
                    Some(Ok(
                        ws::Message::Ping(_) | ws::Message::Pong(_),
                    )) => Ok(()),
                    Some(Ok(ws::Message::Close(_)) | Err(_)) | None => break,
                };
                if let Err(e) = reply {
                    if send(&mut sink, &error_event(&e)).await.is_err() {
                        break;
                    }
                }
            }
        }
    }

    let unregistered = service
        .execute(command::DisconnectUser { connection_id })
        .await
        .unwrap_or_else(|e| match e {});
    log::debug!(
        is_last = unregistered.is_some_and(|u| u.is_last),
        "connection unregistered",
    );
}

/// Sends the provided [`Event`] as a JSON text frame.
async fn send<S>(sink: &mut S, event: &Event) -> Result<(), ()>
where
    S: futures::Sink<ws::Message> + Unpin,
    S::Error: std::fmt::Display,
{
    let json = serde_json::to_string(event).map_err(|e| {
        log::error!("failed to serialize `Event`: {e}");
    })?;
    sink.send(ws::Message::Text(json)).await.map_err(|e| {
        log::debug!("failed to send `Event`: {e}");
    })
}

/// Creates an [`Event::Error`] reporting the provided [`Error`] to the client.
fn error_event(err: &Error) -> Event {
    Event::error(err.public_message())
}

/// Parses the provided text frame and executes the requested command.
///
/// # Errors
///
/// Errors if the frame is malformed or the command fails.
async fn dispatch(
    service: &Service,
    connection_id: ConnectionId,
    user_id: user::Id,
    frame: &str,
) -> Result<(), Error> {
    let inbound = serde_json::from_str::<Inbound>(frame).map_err(|e| {
        log::debug!("malformed frame: {e}");
        Error::from(FrameError::Malformed)
    })?;

    let res = match inbound {
        Inbound::JoinConversation { conversation_id } => service
            .execute(command::JoinConversation {
                connection_id,
                conversation_id,
            })
            .await
            .map_err(AsError::into_error),
        Inbound::LeaveConversation { conversation_id } => service
            .execute(command::LeaveConversation {
                connection_id,
                conversation_id,
            })
            .await
            .map_err(AsError::into_error),
        Inbound::SendMessage {
            conversation_id,
            content,
            kind,
            reply_to,
        } => service
            .execute(command::SendMessage {
                conversation_id,
                sender_id: user_id,
                content,
                kind: kind.unwrap_or_default(),
                reply_to,
            })
            .await
            .map(drop)
            .map_err(AsError::into_error),
        Inbound::TypingStart { conversation_id } => service
            .execute(command::NotifyTyping {
                connection_id,
                conversation_id,
                is_typing: true,
            })
            .await
            .map_err(AsError::into_error),
        Inbound::TypingStop { conversation_id } => service
            .execute(command::NotifyTyping {
                connection_id,
                conversation_id,
                is_typing: false,
            })
            .await
            .map_err(AsError::into_error),
        Inbound::MarkAsRead {
            conversation_id,
            message_id,
        } => service
            .execute(command::MarkConversationRead {
                conversation_id,
                reader_id: user_id,
                message_id,
            })
            .await
            .map(drop)
            .map_err(AsError::into_error),
    };
    res.inspect_err(|e| {
        if e.status_code.is_server_error() {
            log::error!("chat command failed: {e}");
        }
    })
}

define_error! {
    enum FrameError {
        #[code = "MALFORMED_FRAME"]
        #[status = BAD_REQUEST]
        #[message = "Frame must be a JSON object with known `event` and \
                     valid `data`"]
        Malformed,
    }
}

#[cfg(test)]
mod spec {
    use service::realtime::Event;

    use crate::Error;

    use super::{error_event, FrameError};

    #[test]
    fn reports_client_errors_as_is() {
        assert_eq!(
            error_event(&FrameError::Malformed.into()),
            Event::error(
                "Frame must be a JSON object with known `event` and valid \
                 `data`",
            ),
        );
    }

    #[test]
    fn hides_internal_error_details() {
        let err = Error::internal(&"db error: messages_pkey violated");

        assert_eq!(error_event(&err), Event::error("Internal server error"));
    }
}
