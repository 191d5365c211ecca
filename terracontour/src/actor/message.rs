//! Wire messages exchanged between two actors.

use crate::error::DemError;

/// Correlation id of a request, unique per sending side.
pub type RequestId = u64;

/// Names a request variant for logging.
pub trait Method {
    fn method(&self) -> &'static str;
}

/// One message on an actor channel.
///
/// A side sends its own requests and the responses to requests it received
/// over the same channel, so both directions multiplex onto one link.
#[derive(Debug)]
pub enum Message<Req, Resp> {
    /// Invoke a method on the receiving side.
    Request { id: RequestId, request: Req },
    /// Result of a request the receiving side sent earlier.
    Response {
        id: RequestId,
        result: Result<Resp, DemError>,
    },
    /// The sender no longer wants the result of request `id`.
    Cancel { id: RequestId },
}

impl<Req: Method, Resp> Message<Req, Resp> {
    /// Short description for tracing.
    pub fn describe(&self) -> String {
        match self {
            Message::Request { id, request } => format!("request #{} {}", id, request.method()),
            Message::Response { id, result } => match result {
                Ok(_) => format!("response #{} ok", id),
                Err(e) => format!("response #{} error: {}", id, e),
            },
            Message::Cancel { id } => format!("cancel #{}", id),
        }
    }
}
