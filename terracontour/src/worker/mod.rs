//! Background decode context.
//!
//! [`DecodeWorker`] runs tile decoding on a dedicated OS thread with its own
//! single-threaded runtime. The primary side reaches it only through an
//! [`Actor`] link; tile bytes travel as [`Bytes`] and decoded samples come
//! back as an owned [`DemTile`].
//!
//! A worker may be started without an image decoder. It then asks the
//! primary side to turn image payloads into pixels (a reverse-direction
//! call) and applies the elevation mapping itself.

use std::sync::Arc;
use std::thread;

use bytes::Bytes;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::actor::{self, Actor, Dispatch, Method, Peer};
use crate::decode::{self, DemTile, Encoding, ImageDecoder, RgbaPixels};
use crate::error::{DecodeError, DemError};
use crate::BoxFuture;

/// Requests the primary side sends to the worker.
#[derive(Debug)]
pub enum WorkerRequest {
    /// Liveness probe.
    Ping,
    /// Decode tile bytes with the given encoding.
    Decode { bytes: Bytes, encoding: Encoding },
}

impl Method for WorkerRequest {
    fn method(&self) -> &'static str {
        match self {
            WorkerRequest::Ping => "ping",
            WorkerRequest::Decode { .. } => "decode",
        }
    }
}

#[derive(Debug)]
pub enum WorkerResponse {
    Pong,
    Decoded(DemTile),
}

/// Requests the worker sends back to the primary side.
#[derive(Debug)]
pub enum PrimaryRequest {
    /// Decode an image payload into RGBA pixels.
    DecodeImage { bytes: Bytes },
}

impl Method for PrimaryRequest {
    fn method(&self) -> &'static str {
        match self {
            PrimaryRequest::DecodeImage { .. } => "decode_image",
        }
    }
}

#[derive(Debug)]
pub enum PrimaryResponse {
    Image(RgbaPixels),
}

/// Methods served on the worker thread.
pub struct WorkerHandler {
    images: Option<Arc<dyn ImageDecoder>>,
    primary: Peer<WorkerHandler, PrimaryHandler>,
}

impl Dispatch for WorkerHandler {
    type Request = WorkerRequest;
    type Response = WorkerResponse;

    fn dispatch(
        &self,
        request: WorkerRequest,
        cancel: CancellationToken,
    ) -> BoxFuture<'static, Result<WorkerResponse, DemError>> {
        let images = self.images.clone();
        let primary = self.primary.clone();
        Box::pin(async move {
            match request {
                WorkerRequest::Ping => Ok(WorkerResponse::Pong),
                WorkerRequest::Decode { bytes, encoding } => {
                    let tile = match (&images, encoding.is_image()) {
                        (Some(images), _) => decode::decode(&bytes, encoding, images.as_ref())?,
                        (None, false) => decode::decode(&bytes, encoding, &NoImages)?,
                        (None, true) => {
                            let pixels =
                                match primary.send(PrimaryRequest::DecodeImage { bytes }, &cancel).await? {
                                    PrimaryResponse::Image(pixels) => pixels,
                                };
                            decode::decode_parsed_image(
                                pixels.width,
                                pixels.height,
                                encoding,
                                &pixels.data,
                            )?
                        }
                    };
                    Ok(WorkerResponse::Decoded(tile))
                }
            }
        })
    }
}

/// Methods the primary side serves for the worker.
pub struct PrimaryHandler {
    images: Arc<dyn ImageDecoder>,
}

impl PrimaryHandler {
    pub fn new(images: Arc<dyn ImageDecoder>) -> Self {
        Self { images }
    }
}

impl Dispatch for PrimaryHandler {
    type Request = PrimaryRequest;
    type Response = PrimaryResponse;

    fn dispatch(
        &self,
        request: PrimaryRequest,
        _cancel: CancellationToken,
    ) -> BoxFuture<'static, Result<PrimaryResponse, DemError>> {
        let images = Arc::clone(&self.images);
        Box::pin(async move {
            match request {
                PrimaryRequest::DecodeImage { bytes } => {
                    let pixels = tokio::task::spawn_blocking(move || images.decode_rgba(&bytes))
                        .await
                        .map_err(|e| DemError::Worker(format!("image decode task failed: {}", e)))??;
                    Ok(PrimaryResponse::Image(pixels))
                }
            }
        })
    }
}

/// Stand-in for raw encodings, which never reach the image decoder.
struct NoImages;

impl ImageDecoder for NoImages {
    fn decode_rgba(&self, _bytes: &[u8]) -> Result<RgbaPixels, DecodeError> {
        Err(DecodeError::Image("no image decoder in this context".to_string()))
    }
}

/// Handle to a decode worker thread.
///
/// Dropping the handle closes the link; the thread exits once its actor
/// notices.
pub struct DecodeWorker {
    actor: Actor<PrimaryHandler, WorkerHandler>,
    thread: Option<thread::JoinHandle<()>>,
}

impl DecodeWorker {
    /// Starts the worker thread.
    ///
    /// `worker_images` is the image decoder available on the worker; with
    /// `None` image payloads are decoded by `primary_images` on request of
    /// the worker. Must be called within a tokio runtime.
    pub fn spawn(
        worker_images: Option<Arc<dyn ImageDecoder>>,
        primary_images: Arc<dyn ImageDecoder>,
    ) -> Result<Self, DemError> {
        let (primary_link, worker_link) = actor::link::<PrimaryHandler, WorkerHandler>();
        let actor = Actor::spawn("primary", PrimaryHandler::new(primary_images), primary_link);

        let thread = thread::Builder::new()
            .name("terracontour-worker".to_string())
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(runtime) => runtime,
                    Err(e) => {
                        error!(error = %e, "Failed to start worker runtime");
                        return;
                    }
                };
                runtime.block_on(async move {
                    let worker = Actor::spawn_with("worker", worker_link, |primary| {
                        WorkerHandler {
                            images: worker_images,
                            primary,
                        }
                    });
                    debug!("Decode worker running");
                    worker.closed().await;
                });
                debug!("Decode worker stopped");
            })
            .map_err(|e| DemError::Worker(format!("failed to spawn worker thread: {}", e)))?;

        info!("Decode worker started");
        Ok(Self {
            actor,
            thread: Some(thread),
        })
    }

    /// Resolves once the worker answers a ping.
    pub async fn loaded(&self) -> Result<(), DemError> {
        match self
            .actor
            .send(WorkerRequest::Ping, &CancellationToken::new())
            .await?
        {
            WorkerResponse::Pong => Ok(()),
            other => Err(unexpected("ping", &other)),
        }
    }

    /// Decodes `bytes` on the worker thread.
    pub async fn decode(
        &self,
        bytes: Bytes,
        encoding: Encoding,
        cancel: &CancellationToken,
    ) -> Result<DemTile, DemError> {
        match self
            .actor
            .send(WorkerRequest::Decode { bytes, encoding }, cancel)
            .await?
        {
            WorkerResponse::Decoded(tile) => Ok(tile),
            other => Err(unexpected("decode", &other)),
        }
    }

    /// Closes the link and waits for the thread to exit.
    pub async fn shutdown(mut self) {
        let thread = self.thread.take();
        drop(self);
        if let Some(thread) = thread {
            let _ = tokio::task::spawn_blocking(move || thread.join()).await;
        }
    }
}

fn unexpected(method: &str, response: &WorkerResponse) -> DemError {
    DemError::Worker(format!("unexpected response to {}: {:?}", method, response))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::{encode_terrarium, ImageCrateDecoder};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts calls and hands back a 1×1 terrarium pixel.
    struct CountingImages {
        calls: Arc<AtomicUsize>,
        elevation: f64,
    }

    impl ImageDecoder for CountingImages {
        fn decode_rgba(&self, _bytes: &[u8]) -> Result<RgbaPixels, DecodeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let [r, g, b] = encode_terrarium(self.elevation);
            Ok(RgbaPixels {
                width: 1,
                height: 1,
                data: vec![r, g, b, 255],
            })
        }
    }

    fn raw16(width: u16, height: u16, samples: &[i16]) -> Bytes {
        let mut out = Vec::new();
        out.extend_from_slice(&width.to_le_bytes());
        out.extend_from_slice(&height.to_le_bytes());
        for s in samples {
            out.extend_from_slice(&s.to_le_bytes());
        }
        Bytes::from(out)
    }

    #[tokio::test]
    async fn test_worker_answers_ping() {
        let worker = DecodeWorker::spawn(
            Some(Arc::new(ImageCrateDecoder)),
            Arc::new(ImageCrateDecoder),
        )
        .unwrap();
        worker.loaded().await.unwrap();
        worker.shutdown().await;
    }

    #[tokio::test]
    async fn test_worker_decodes_raw() {
        let worker = DecodeWorker::spawn(None, Arc::new(ImageCrateDecoder)).unwrap();
        let tile = worker
            .decode(
                raw16(2, 1, &[5, -7]),
                Encoding::Raw16,
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(tile.data, vec![5.0, -7.0]);
        worker.shutdown().await;
    }

    #[tokio::test]
    async fn test_worker_without_images_calls_back_to_primary() {
        let calls = Arc::new(AtomicUsize::new(0));
        let primary = Arc::new(CountingImages {
            calls: Arc::clone(&calls),
            elevation: 812.5,
        });
        let worker = DecodeWorker::spawn(None, primary).unwrap();

        let tile = worker
            .decode(
                Bytes::from_static(b"png"),
                Encoding::Terrarium,
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(tile.data, vec![812.5]);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        worker.shutdown().await;
    }

    #[tokio::test]
    async fn test_worker_with_images_decodes_locally() {
        let primary_calls = Arc::new(AtomicUsize::new(0));
        let worker_calls = Arc::new(AtomicUsize::new(0));
        let worker = DecodeWorker::spawn(
            Some(Arc::new(CountingImages {
                calls: Arc::clone(&worker_calls),
                elevation: -20.0,
            })),
            Arc::new(CountingImages {
                calls: Arc::clone(&primary_calls),
                elevation: 0.0,
            }),
        )
        .unwrap();

        let tile = worker
            .decode(
                Bytes::from_static(b"png"),
                Encoding::Terrarium,
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(tile.data, vec![-20.0]);
        assert_eq!(worker_calls.load(Ordering::SeqCst), 1);
        assert_eq!(primary_calls.load(Ordering::SeqCst), 0);
        worker.shutdown().await;
    }

    #[tokio::test]
    async fn test_decode_error_crosses_the_link() {
        let worker = DecodeWorker::spawn(None, Arc::new(ImageCrateDecoder)).unwrap();
        let err = worker
            .decode(
                Bytes::from_static(&[1, 0]),
                Encoding::Raw16,
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert_eq!(
            err,
            DemError::Decode(DecodeError::TruncatedHeader { len: 2 })
        );
        worker.shutdown().await;
    }
}
