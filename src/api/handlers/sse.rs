use crate::events::Event;
use crate::AppState;
use axum::{
    extract::State,
    response::sse::{Event as SseEvent, KeepAlive, Sse},
};
use futures::stream::Stream;
use std::convert::Infallible;
use std::sync::Arc;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;
use tracing::debug;

/// Stream DRS run events to the client as they happen.
pub(crate) async fn sse_events(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<SseEvent, Infallible>>> {
    let rx = state.event_hub.subscribe();

    let stream = BroadcastStream::new(rx).filter_map(
        |result: Result<Event, BroadcastStreamRecvError>| match result {
            Ok(event) => serde_json::to_string(&event)
                .ok()
                .map(|json| Ok(SseEvent::default().event(event.event_type()).data(json))),
            Err(BroadcastStreamRecvError::Lagged(missed)) => {
                debug!("SSE subscriber lagged, {} event(s) dropped", missed);
                None
            }
        },
    );

    Sse::new(stream).keep_alive(KeepAlive::default())
}
