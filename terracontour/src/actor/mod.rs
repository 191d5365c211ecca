//! Bidirectional request/response actors over message channels.
//!
//! Two execution contexts that share no memory talk through a [`Link`]: a
//! pair of unbounded channels carrying [`Message`]s. Each side runs an
//! [`Actor`] that
//!
//! - serves incoming requests through its local [`Dispatch`] table,
//! - routes incoming responses to the caller waiting on that correlation id,
//! - cancels an in-progress handler when a `Cancel` arrives for it.
//!
//! ```text
//!   primary                                     worker
//! ┌──────────────┐  Request / Cancel  ──►  ┌──────────────┐
//! │ Actor<P, W>  │                         │ Actor<W, P>  │
//! │  pending ids │  ◄── Response            │  in-progress │
//! └──────────────┘  ◄── Request / Cancel   └──────────────┘
//!                      Response ──►
//! ```
//!
//! Either side may call the other, so a worker can ask the primary for a
//! facility it lacks while serving one of the primary's requests.

mod message;

pub use self::message::{Message, Method, RequestId};

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, trace};

use crate::error::DemError;
use crate::BoxFuture;

/// The method table one side of a link serves.
pub trait Dispatch: Send + Sync + Sized + 'static {
    type Request: Method + Send + 'static;
    type Response: Send + 'static;

    /// Handles one request. `cancel` fires if the caller withdraws it.
    fn dispatch(
        &self,
        request: Self::Request,
        cancel: CancellationToken,
    ) -> BoxFuture<'static, Result<Self::Response, DemError>>;
}

type Outgoing<L, R> = Message<<R as Dispatch>::Request, <L as Dispatch>::Response>;
type Incoming<L, R> = Message<<L as Dispatch>::Request, <R as Dispatch>::Response>;
type PendingTable<R> = Mutex<HashMap<RequestId, oneshot::Sender<Result<<R as Dispatch>::Response, DemError>>>>;

/// Side `L`'s end of a link to side `R`.
pub struct Link<L: Dispatch, R: Dispatch> {
    tx: mpsc::UnboundedSender<Outgoing<L, R>>,
    rx: mpsc::UnboundedReceiver<Incoming<L, R>>,
}

/// Creates the two ends of a link.
pub fn link<L: Dispatch, R: Dispatch>() -> (Link<L, R>, Link<R, L>) {
    let (l_tx, r_rx) = mpsc::unbounded_channel();
    let (r_tx, l_rx) = mpsc::unbounded_channel();
    (
        Link { tx: l_tx, rx: l_rx },
        Link { tx: r_tx, rx: r_rx },
    )
}

/// Sending half of an actor: issues requests to the remote side.
///
/// A `Peer` does not keep the actor alive; handlers hold one to call back
/// to the other side.
pub struct Peer<L: Dispatch, R: Dispatch> {
    name: &'static str,
    outbox: mpsc::UnboundedSender<Outgoing<L, R>>,
    pending: Arc<PendingTable<R>>,
    next_id: Arc<AtomicU64>,
}

impl<L: Dispatch, R: Dispatch> Clone for Peer<L, R> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            outbox: self.outbox.clone(),
            pending: Arc::clone(&self.pending),
            next_id: Arc::clone(&self.next_id),
        }
    }
}

impl<L: Dispatch, R: Dispatch> Peer<L, R> {
    /// Calls `request` on the remote side.
    ///
    /// Cancelling `cancel`, or dropping the returned future, sends `Cancel`
    /// for the request and discards any late response.
    pub async fn send(
        &self,
        request: R::Request,
        cancel: &CancellationToken,
    ) -> Result<R::Response, DemError> {
        if cancel.is_cancelled() {
            return Err(DemError::Cancelled);
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let method = request.method();
        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(id, tx);

        let mut call = InFlightCall {
            peer: self,
            id,
            done: false,
        };

        trace!(actor = self.name, id, method, "Sending request");
        if self.outbox.send(Message::Request { id, request }).is_err() {
            call.done = true;
            self.pending.lock().remove(&id);
            return Err(DemError::Worker(format!("{}: peer is gone", self.name)));
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(actor = self.name, id, method, "Request cancelled by caller");
                Err(DemError::Cancelled)
            }
            result = rx => {
                call.done = true;
                result.unwrap_or_else(|_| {
                    Err(DemError::Worker(format!("{}: link closed before response", self.name)))
                })
            }
        }
    }
}

/// Withdraws a request whose caller stopped waiting.
struct InFlightCall<'a, L: Dispatch, R: Dispatch> {
    peer: &'a Peer<L, R>,
    id: RequestId,
    done: bool,
}

impl<L: Dispatch, R: Dispatch> Drop for InFlightCall<'_, L, R> {
    fn drop(&mut self) {
        if self.done {
            return;
        }
        if self.peer.pending.lock().remove(&self.id).is_some() {
            let _ = self.peer.outbox.send(Message::Cancel { id: self.id });
        }
    }
}

/// One side of a link: a [`Peer`] plus the receive loop serving `L`.
///
/// The receive loop stops when the last clone of the actor is dropped or
/// when the remote side goes away.
pub struct Actor<L: Dispatch, R: Dispatch> {
    peer: Peer<L, R>,
    _shutdown: Arc<DropGuard>,
    closed: CancellationToken,
}

impl<L: Dispatch, R: Dispatch> Clone for Actor<L, R> {
    fn clone(&self) -> Self {
        Self {
            peer: self.peer.clone(),
            _shutdown: Arc::clone(&self._shutdown),
            closed: self.closed.clone(),
        }
    }
}

impl<L: Dispatch, R: Dispatch> Actor<L, R> {
    /// Starts the receive loop for `local` on the current tokio runtime.
    pub fn spawn(name: &'static str, local: L, link: Link<L, R>) -> Self {
        Self::spawn_with(name, link, |_| local)
    }

    /// Like [`Actor::spawn`], but builds the local handler with a [`Peer`]
    /// so it can call the remote side.
    pub fn spawn_with(
        name: &'static str,
        link: Link<L, R>,
        build: impl FnOnce(Peer<L, R>) -> L,
    ) -> Self {
        let Link { tx, rx } = link;
        let peer = Peer {
            name,
            outbox: tx,
            pending: Arc::new(Mutex::new(HashMap::new())),
            next_id: Arc::new(AtomicU64::new(1)),
        };
        let local = build(peer.clone());

        let shutdown = CancellationToken::new();
        let closed = CancellationToken::new();
        tokio::spawn(receive_loop::<L, R>(
            ReceiveLoop::<L, R> {
                name,
                local,
                outbox: peer.outbox.clone(),
                pending: Arc::clone(&peer.pending),
                in_progress: Arc::new(Mutex::new(HashMap::new())),
            },
            rx,
            shutdown.clone(),
            closed.clone(),
        ));

        Self {
            peer,
            _shutdown: Arc::new(shutdown.drop_guard()),
            closed,
        }
    }

    /// Connects two handlers on the current runtime.
    pub fn pair(
        left_name: &'static str,
        left: L,
        right_name: &'static str,
        right: R,
    ) -> (Actor<L, R>, Actor<R, L>) {
        let (left_link, right_link) = link::<L, R>();
        (
            Actor::spawn(left_name, left, left_link),
            Actor::spawn(right_name, right, right_link),
        )
    }

    /// Calls `request` on the remote side. See [`Peer::send`].
    pub async fn send(
        &self,
        request: R::Request,
        cancel: &CancellationToken,
    ) -> Result<R::Response, DemError> {
        self.peer.send(request, cancel).await
    }

    /// A sending handle that does not keep the receive loop alive.
    pub fn peer(&self) -> Peer<L, R> {
        self.peer.clone()
    }

    /// Resolves once the receive loop has exited.
    pub async fn closed(&self) {
        self.closed.cancelled().await
    }

    /// Number of requests sent and not yet answered.
    pub fn pending_count(&self) -> usize {
        self.peer.pending.lock().len()
    }
}

struct ReceiveLoop<L: Dispatch, R: Dispatch> {
    name: &'static str,
    local: L,
    outbox: mpsc::UnboundedSender<Outgoing<L, R>>,
    pending: Arc<PendingTable<R>>,
    in_progress: Arc<Mutex<HashMap<RequestId, CancellationToken>>>,
}

impl<L: Dispatch, R: Dispatch> ReceiveLoop<L, R> {
    fn handle(&self, message: Incoming<L, R>) {
        match message {
            Message::Request { id, request } => {
                let method = request.method();
                trace!(actor = self.name, id, method, "Serving request");
                let token = CancellationToken::new();
                self.in_progress.lock().insert(id, token.clone());

                let work = self.local.dispatch(request, token.clone());
                let outbox = self.outbox.clone();
                let in_progress = Arc::clone(&self.in_progress);
                let name = self.name;
                tokio::spawn(async move {
                    let result = tokio::select! {
                        biased;
                        _ = token.cancelled() => Err(DemError::Cancelled),
                        result = work => result,
                    };
                    // A cancelled request has already been answered locally
                    // on the caller's side.
                    if in_progress.lock().remove(&id).is_some() {
                        if outbox.send(Message::Response { id, result }).is_err() {
                            debug!(actor = name, id, method, "Response dropped; link closed");
                        }
                    }
                });
            }
            Message::Response { id, result } => match self.pending.lock().remove(&id) {
                Some(tx) => {
                    let _ = tx.send(result);
                }
                None => trace!(actor = self.name, id, "Discarding response for withdrawn request"),
            },
            Message::Cancel { id } => {
                if let Some(token) = self.in_progress.lock().remove(&id) {
                    debug!(actor = self.name, id, "Cancelling in-progress request");
                    token.cancel();
                }
            }
        }
    }

    fn shut_down(&self) {
        for (_, token) in self.in_progress.lock().drain() {
            token.cancel();
        }
        for (_, tx) in self.pending.lock().drain() {
            let _ = tx.send(Err(DemError::Worker(format!(
                "{}: link closed before response",
                self.name
            ))));
        }
    }
}

async fn receive_loop<L: Dispatch, R: Dispatch>(
    state: ReceiveLoop<L, R>,
    mut inbox: mpsc::UnboundedReceiver<Incoming<L, R>>,
    shutdown: CancellationToken,
    closed: CancellationToken,
) {
    debug!(actor = state.name, "Actor started");
    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            message = inbox.recv() => match message {
                Some(message) => state.handle(message),
                None => break,
            },
        }
    }
    state.shut_down();
    debug!(actor = state.name, "Actor stopped");
    closed.cancel();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    /// Arithmetic service used to exercise the protocol.
    struct Calculator {
        cancelled: Arc<AtomicUsize>,
    }

    enum CalcRequest {
        Double(i64),
        Hang,
    }

    impl Method for CalcRequest {
        fn method(&self) -> &'static str {
            match self {
                CalcRequest::Double(_) => "double",
                CalcRequest::Hang => "hang",
            }
        }
    }

    impl Dispatch for Calculator {
        type Request = CalcRequest;
        type Response = i64;

        fn dispatch(
            &self,
            request: CalcRequest,
            cancel: CancellationToken,
        ) -> BoxFuture<'static, Result<i64, DemError>> {
            let cancelled = Arc::clone(&self.cancelled);
            Box::pin(async move {
                match request {
                    CalcRequest::Double(n) => Ok(n * 2),
                    CalcRequest::Hang => {
                        // Counts whether the handler ends or is aborted.
                        let _stopped = CountOnDrop(cancelled);
                        cancel.cancelled().await;
                        Err(DemError::Cancelled)
                    }
                }
            })
        }
    }

    struct CountOnDrop(Arc<AtomicUsize>);

    impl Drop for CountOnDrop {
        fn drop(&mut self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Serves `Add` by asking the other side to double first.
    struct Forwarder {
        calculator: Peer<Forwarder, Calculator>,
    }

    struct Add(i64);

    impl Method for Add {
        fn method(&self) -> &'static str {
            "add"
        }
    }

    impl Dispatch for Forwarder {
        type Request = Add;
        type Response = i64;

        fn dispatch(
            &self,
            request: Add,
            cancel: CancellationToken,
        ) -> BoxFuture<'static, Result<i64, DemError>> {
            let calculator = self.calculator.clone();
            Box::pin(async move {
                let doubled = calculator
                    .send(CalcRequest::Double(request.0), &cancel)
                    .await?;
                Ok(doubled + 1)
            })
        }
    }

    fn calculator() -> (Calculator, Arc<AtomicUsize>) {
        let cancelled = Arc::new(AtomicUsize::new(0));
        (
            Calculator {
                cancelled: Arc::clone(&cancelled),
            },
            cancelled,
        )
    }

    #[tokio::test]
    async fn test_request_response_roundtrip() {
        let (calc, _) = calculator();
        let (left, right) = link::<Forwarder, Calculator>();
        let forwarder = Actor::spawn_with("forwarder", left, |peer| Forwarder { calculator: peer });
        let _calc = Actor::spawn("calculator", calc, right);

        let token = CancellationToken::new();
        let doubled = forwarder.send(CalcRequest::Double(21), &token).await;
        assert_eq!(doubled, Ok(42));
        assert_eq!(forwarder.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_reverse_direction_call() {
        let (calc, _) = calculator();
        let (left, right) = link::<Forwarder, Calculator>();
        let _forwarder =
            Actor::spawn_with("forwarder", left, |peer| Forwarder { calculator: peer });
        let calc = Actor::spawn("calculator", calc, right);

        // calculator -> forwarder (Add) -> calculator (Double) -> back
        let result = calc.send(Add(5), &CancellationToken::new()).await;
        assert_eq!(result, Ok(11));
    }

    #[tokio::test]
    async fn test_concurrent_requests_are_matched_by_id() {
        let (calc, _) = calculator();
        let (left, right) = link::<Forwarder, Calculator>();
        let forwarder = Actor::spawn_with("forwarder", left, |peer| Forwarder { calculator: peer });
        let _calc = Actor::spawn("calculator", calc, right);

        let token = CancellationToken::new();
        let results = futures::future::join_all(
            (0..16).map(|n| forwarder.send(CalcRequest::Double(n), &token)),
        )
        .await;
        for (n, result) in results.into_iter().enumerate() {
            assert_eq!(result, Ok(n as i64 * 2));
        }
    }

    #[tokio::test]
    async fn test_cancel_reaches_remote_handler() {
        let (calc, cancelled) = calculator();
        let (left, right) = link::<Forwarder, Calculator>();
        let forwarder = Actor::spawn_with("forwarder", left, |peer| Forwarder { calculator: peer });
        let _calc = Actor::spawn("calculator", calc, right);

        let token = CancellationToken::new();
        let call = {
            let forwarder = forwarder.clone();
            let token = token.clone();
            tokio::spawn(async move { forwarder.send(CalcRequest::Hang, &token).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        token.cancel();

        assert_eq!(call.await.unwrap(), Err(DemError::Cancelled));
        tokio::time::timeout(Duration::from_secs(1), async {
            while cancelled.load(Ordering::SeqCst) == 0 {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        })
        .await
        .unwrap();
        assert_eq!(forwarder.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_dropped_remote_fails_pending_requests() {
        let (calc, _) = calculator();
        let (left, right) = link::<Forwarder, Calculator>();
        let forwarder = Actor::spawn_with("forwarder", left, |peer| Forwarder { calculator: peer });
        let calc = Actor::spawn("calculator", calc, right);

        let call = {
            let forwarder = forwarder.clone();
            tokio::spawn(async move {
                forwarder
                    .send(CalcRequest::Hang, &CancellationToken::new())
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        drop(calc);

        let result = call.await.unwrap();
        assert!(matches!(result, Err(DemError::Worker(_))));
        tokio::time::timeout(Duration::from_secs(1), forwarder.closed())
            .await
            .unwrap();
    }
}
