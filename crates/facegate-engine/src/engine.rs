use std::panic::{self, AssertUnwindSafe};

use facegate_core::detector::panic_message;
use facegate_core::{
    EnrollmentOutcome, FaceEncoding, FaceVerifier, LandmarkDetector, LivenessVerdict,
    QualityAnalyzer, VerificationOutcome,
};
use image::RgbImage;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("failed to spawn engine thread: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("queue depth must be at least 1")]
    ZeroQueueDepth,
    #[error("engine thread exited")]
    ChannelClosed,
    #[error("request aborted by a panic on the engine thread")]
    RequestAborted,
}

/// Messages sent from callers to the engine thread.
enum EngineRequest {
    Liveness {
        image: RgbImage,
        reply: oneshot::Sender<LivenessVerdict>,
    },
    Enroll {
        image: RgbImage,
        reply: oneshot::Sender<EnrollmentOutcome>,
    },
    Verify {
        image: RgbImage,
        stored: Option<FaceEncoding>,
        reply: oneshot::Sender<VerificationOutcome>,
    },
}

/// Clone-safe handle to the engine thread.
///
/// The thread exits once every handle has been dropped.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineRequest>,
}

impl EngineHandle {
    pub async fn liveness(&self, image: RgbImage) -> Result<LivenessVerdict, EngineError> {
        self.request(|reply| EngineRequest::Liveness { image, reply })
            .await
    }

    pub async fn enroll(&self, image: RgbImage) -> Result<EnrollmentOutcome, EngineError> {
        self.request(|reply| EngineRequest::Enroll { image, reply })
            .await
    }

    pub async fn verify(
        &self,
        image: RgbImage,
        stored: Option<FaceEncoding>,
    ) -> Result<VerificationOutcome, EngineError> {
        self.request(|reply| EngineRequest::Verify {
            image,
            stored,
            reply,
        })
        .await
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> EngineRequest,
    ) -> Result<T, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(build(reply_tx))
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        // A dropped reply with the channel still open means the request panicked.
        reply_rx.await.map_err(|_| EngineError::RequestAborted)
    }
}

/// Move `verifier` onto a dedicated OS thread and return a handle to it.
///
/// At most `queue_depth` requests wait in the channel; further senders
/// suspend until the worker catches up.
pub fn spawn_engine<D, Q>(
    verifier: FaceVerifier<D, Q>,
    queue_depth: usize,
) -> Result<EngineHandle, EngineError>
where
    D: LandmarkDetector + 'static,
    Q: QualityAnalyzer + 'static,
{
    if queue_depth == 0 {
        return Err(EngineError::ZeroQueueDepth);
    }

    let (tx, mut rx) = mpsc::channel::<EngineRequest>(queue_depth);

    std::thread::Builder::new()
        .name("facegate-engine".into())
        .spawn(move || {
            tracing::info!(queue_depth, "engine thread started");
            while let Some(req) = rx.blocking_recv() {
                // A panicking stage drops the reply sender; the loop keeps serving.
                let served = panic::catch_unwind(AssertUnwindSafe(|| serve(&verifier, req)));
                if let Err(payload) = served {
                    tracing::error!(
                        reason = %panic_message(&*payload),
                        "engine request panicked"
                    );
                }
            }
            tracing::info!("engine thread exiting");
        })
        .map_err(EngineError::Spawn)?;

    Ok(EngineHandle { tx })
}

fn serve<D, Q>(verifier: &FaceVerifier<D, Q>, req: EngineRequest)
where
    D: LandmarkDetector,
    Q: QualityAnalyzer,
{
    match req {
        EngineRequest::Liveness { image, reply } => {
            let verdict = verifier.assess_liveness(&image);
            tracing::debug!(is_live = verdict.is_live, "liveness request served");
            let _ = reply.send(verdict);
        }
        EngineRequest::Enroll { image, reply } => {
            let outcome = verifier.enroll(&image);
            tracing::debug!(enrolled = outcome.is_enrolled(), "enroll request served");
            let _ = reply.send(outcome);
        }
        EngineRequest::Verify {
            image,
            stored,
            reply,
        } => {
            let outcome = verifier.verify(&image, stored.as_ref());
            tracing::debug!(recognized = outcome.recognized, "verify request served");
            let _ = reply.send(outcome);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use facegate_core::fixtures::{
        good_metrics, live_face, live_face_with_ear, textured_frame, FixedQuality, FRAME_SIZE,
    };
    use facegate_core::{PipelineConfig, StaticDetector};
    use std::sync::atomic::{AtomicBool, Ordering};

    fn handle(faces: Vec<facegate_core::LandmarkSet>) -> EngineHandle {
        let verifier = FaceVerifier::with_quality(
            StaticDetector::new(faces),
            PipelineConfig::default(),
            FixedQuality(good_metrics()),
        );
        spawn_engine(verifier, 4).unwrap()
    }

    fn frame() -> RgbImage {
        textured_frame(FRAME_SIZE, FRAME_SIZE)
    }

    #[test]
    fn test_zero_queue_depth_rejected() {
        let verifier = FaceVerifier::new(StaticDetector::empty(), PipelineConfig::default());
        assert!(matches!(
            spawn_engine(verifier, 0),
            Err(EngineError::ZeroQueueDepth)
        ));
    }

    #[tokio::test]
    async fn test_liveness_round_trip() {
        let engine = handle(vec![live_face()]);
        let verdict = engine.liveness(frame()).await.unwrap();
        assert!(verdict.is_live);
        assert_eq!(verdict.confidence, 1.0);
    }

    #[tokio::test]
    async fn test_enroll_then_verify() {
        let engine = handle(vec![live_face()]);
        let EnrollmentOutcome::Enrolled { encoding, .. } = engine.enroll(frame()).await.unwrap()
        else {
            panic!("expected enrollment");
        };

        let outcome = engine.verify(frame(), Some(encoding)).await.unwrap();
        assert!(outcome.recognized);
        assert_eq!(outcome.confidence, Some(1.0));
    }

    #[tokio::test]
    async fn test_failed_liveness_is_reported() {
        let engine = handle(vec![live_face_with_ear(0.1)]);
        let outcome = engine.verify(frame(), None).await.unwrap();
        assert!(!outcome.liveness_passed);
        assert_eq!(outcome.confidence, Some(0.8));
    }

    #[tokio::test]
    async fn test_concurrent_callers() {
        let engine = handle(vec![live_face()]);
        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let engine = engine.clone();
                tokio::spawn(async move { engine.liveness(frame()).await })
            })
            .collect();
        for task in tasks {
            assert!(task.await.unwrap().unwrap().is_live);
        }
    }

    #[tokio::test]
    async fn test_detector_panic_is_a_fault_verdict() {
        struct FlakyDetector {
            tripped: AtomicBool,
        }

        impl LandmarkDetector for FlakyDetector {
            fn detect(
                &self,
                _image: &RgbImage,
            ) -> Result<Vec<facegate_core::LandmarkSet>, facegate_core::DetectorError> {
                if !self.tripped.swap(true, Ordering::SeqCst) {
                    panic!("detector crashed");
                }
                Ok(vec![live_face()])
            }
        }

        let verifier = FaceVerifier::with_quality(
            FlakyDetector {
                tripped: AtomicBool::new(false),
            },
            PipelineConfig::default(),
            FixedQuality(good_metrics()),
        );
        let engine = spawn_engine(verifier, 1).unwrap();

        let first = engine.liveness(frame()).await.unwrap();
        assert!(!first.is_live);
        assert_eq!(first.confidence, 0.0);
        assert_eq!(
            first.message,
            "Liveness detection error: detector panicked: detector crashed"
        );

        let second = engine.liveness(frame()).await.unwrap();
        assert!(second.is_live);
    }

    #[tokio::test]
    async fn test_stage_panic_keeps_worker_alive() {
        struct FlakyQuality {
            tripped: AtomicBool,
        }

        impl QualityAnalyzer for FlakyQuality {
            fn assess(&self, _image: &RgbImage) -> facegate_core::QualityMetrics {
                if !self.tripped.swap(true, Ordering::SeqCst) {
                    panic!("quality analyzer crashed");
                }
                good_metrics()
            }
        }

        let verifier = FaceVerifier::with_quality(
            StaticDetector::new(vec![live_face()]),
            PipelineConfig::default(),
            FlakyQuality {
                tripped: AtomicBool::new(false),
            },
        );
        let engine = spawn_engine(verifier, 1).unwrap();

        assert!(matches!(
            engine.liveness(frame()).await,
            Err(EngineError::RequestAborted)
        ));
        assert!(engine.liveness(frame()).await.unwrap().is_live);
    }
}
