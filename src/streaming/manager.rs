//! セッションマネージャ
//!
//! - ディスパッチ経路はキュー投入のみで即時返却し、下流の往復を待たない
//! - セッションごとの専用ワーカーが自分のキューを到着順に排出して下流へ送る
//! - 結果リレーは partial/final を発信元の接続だけに返す
//!
//! セッション間で共有されるのはレジストリだけで、フレーム処理中に
//! セッション横断のロックは保持しません。
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::config::StreamingSessionConfig;
use crate::engine::{BlobStore, RecognitionResult, RecognitionStream, StreamingRecognizer};

use super::error::StreamingError;
use super::events::ServerEvent;
use super::registry::SessionRegistry;
use super::session::{FrameCommand, SessionState, StreamingSession};

pub struct SessionManager<R, B>
where
    R: StreamingRecognizer + Send + Sync + 'static,
    B: BlobStore + Send + Sync + 'static,
{
    recognizer: Arc<R>,
    blobs: Arc<B>,
    registry: Arc<SessionRegistry>,
    config: StreamingSessionConfig,
}

impl<R, B> SessionManager<R, B>
where
    R: StreamingRecognizer + Send + Sync + 'static,
    B: BlobStore + Send + Sync + 'static,
{
    pub fn new(recognizer: Arc<R>, blobs: Arc<B>, config: StreamingSessionConfig) -> Self {
        Self {
            recognizer,
            blobs,
            registry: Arc::new(SessionRegistry::new()),
            config,
        }
    }

    pub fn registry(&self) -> Arc<SessionRegistry> {
        self.registry.clone()
    }

    pub fn config(&self) -> &StreamingSessionConfig {
        &self.config
    }

    /// セッション開始。接続につき1つまで。セッションハンドルを返す
    ///
    /// 下流ストリームの確立に失敗した場合は `error` を1件通知して
    /// 登録せずに終わる（CLOSED 直行）。
    pub async fn start(
        &self,
        connection_id: &str,
        language_code: Option<String>,
        outbound: mpsc::Sender<ServerEvent>,
    ) -> Result<Arc<StreamingSession>, StreamingError> {
        if self.registry.contains(connection_id) {
            return Err(StreamingError::AlreadyActive {
                connection_id: connection_id.to_string(),
            });
        }

        let language = language_code
            .unwrap_or_else(|| self.config.default_language_code.clone());

        let mut stream = match self.recognizer.open(connection_id, &language) {
            Ok(stream) => stream,
            Err(e) => {
                error!(session_id = %connection_id, error = %e, "failed to open recognition stream");
                let _ = outbound
                    .send(ServerEvent::Error {
                        message: format!("failed to start transcription: {e}"),
                    })
                    .await;
                return Err(StreamingError::Engine(e));
            }
        };

        let result_rx = match stream.take_results() {
            Some(rx) => rx,
            None => {
                let _ = stream.close().await;
                return Err(StreamingError::DownstreamFailure {
                    session_id: connection_id.to_string(),
                    message: "result channel not available".to_string(),
                });
            }
        };

        let (frame_tx, frame_rx) = mpsc::channel(self.config.frame_queue_capacity);
        let session = Arc::new(StreamingSession::new(connection_id, &language, frame_tx));

        if !self.registry.insert(session.clone()) {
            // 同時開始の競合。開いたストリームは閉じて撤退する
            let _ = stream.close().await;
            return Err(StreamingError::AlreadyActive {
                connection_id: connection_id.to_string(),
            });
        }
        session.advance_to(SessionState::Streaming);

        let _ = outbound
            .send(ServerEvent::TranscriptionStarted {
                status: "started".to_string(),
                message: "Real-time transcription started".to_string(),
                language_code: language.clone(),
            })
            .await;

        let relay = spawn_relay(result_rx, outbound.clone());
        let worker = SessionWorker {
            session: session.clone(),
            registry: self.registry.clone(),
            blobs: self.blobs.clone(),
            stream,
            outbound,
            frame_rx,
            relay,
        };
        tokio::spawn(worker.run());

        info!(session_id = %connection_id, language = %language, "session started");
        Ok(session)
    }

    /// フレーム投入。キューに積むだけで即時返却する
    ///
    /// STREAMING 以外の状態（停止中・終了後・未登録）への投入は
    /// 棄却のみ記録するソフトエラーで、接続は維持される。
    pub async fn submit_frame(
        &self,
        session_id: &str,
        frame: Bytes,
    ) -> Result<(), StreamingError> {
        let session = match self.registry.get(session_id) {
            Some(session) => session,
            None => {
                return Err(StreamingError::InvalidState {
                    session_id: session_id.to_string(),
                })
            }
        };

        if !session.state().is_live() {
            let rejected = session.record_rejected_frame();
            warn!(session_id = %session_id, rejected, "late frame rejected");
            return Err(StreamingError::InvalidState {
                session_id: session_id.to_string(),
            });
        }

        session
            .frame_sender()
            .send(FrameCommand::Frame(frame))
            .await
            .map_err(|_| StreamingError::InvalidState {
                session_id: session_id.to_string(),
            })
    }

    /// 停止要求。冪等で、多重呼び出しや終了後の呼び出しは no-op
    pub async fn stop(&self, session_id: &str) -> Result<(), StreamingError> {
        let session = match self.registry.get(session_id) {
            Some(session) => session,
            None => return Ok(()),
        };

        // 最初の呼び出しだけが STOPPING へ進め、Stop をキューへ積む。
        // 以降の submit_frame は状態検査で弾かれる
        if !session.advance_to(SessionState::Stopping) {
            return Ok(());
        }
        let _ = session.frame_sender().send(FrameCommand::Stop).await;
        Ok(())
    }
}

/// 認識結果を発信元接続へ転送するリレー
fn spawn_relay(
    mut result_rx: mpsc::Receiver<RecognitionResult>,
    outbound: mpsc::Sender<ServerEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(result) = result_rx.recv().await {
            let event = ServerEvent::TranscriptionResult {
                text: result.text,
                is_partial: result.is_partial,
            };
            if outbound.send(event).await.is_err() {
                // 接続側が先に閉じた
                break;
            }
        }
    })
}

/// セッション専用ワーカー
///
/// 下流ハンドルとアーカイブバッファを占有し、キューをFIFOで排出する。
struct SessionWorker<B>
where
    B: BlobStore + Send + Sync + 'static,
{
    session: Arc<StreamingSession>,
    registry: Arc<SessionRegistry>,
    blobs: Arc<B>,
    stream: RecognitionStream,
    outbound: mpsc::Sender<ServerEvent>,
    frame_rx: mpsc::Receiver<FrameCommand>,
    relay: JoinHandle<()>,
}

impl<B> SessionWorker<B>
where
    B: BlobStore + Send + Sync + 'static,
{
    async fn run(mut self) {
        let session_id = self.session.id().to_string();
        let mut archive: Vec<u8> = Vec::new();
        let mut failed = false;

        while let Some(command) = self.frame_rx.recv().await {
            match command {
                FrameCommand::Frame(frame) => {
                    archive.extend_from_slice(&frame);
                    if let Err(e) = self.stream.send_frame(frame).await {
                        // 下流が切れた。壊れるのはこのセッションだけ
                        error!(session_id = %session_id, error = %e, "recognition stream failed");
                        let _ = self
                            .outbound
                            .send(ServerEvent::Error {
                                message: format!("transcription stream failed: {e}"),
                            })
                            .await;
                        failed = true;
                        break;
                    }
                }
                FrameCommand::Stop => break,
            }
        }

        self.session.advance_to(SessionState::Stopping);
        let _ = self.stream.close().await;

        // 下流の残り結果（最終結果を含む）を流し切ってから後片付けへ
        let _ = self.relay.await;

        let s3_url = if archive.is_empty() {
            None
        } else {
            let hint = format!("sessions/{session_id}.pcm");
            match self.blobs.upload(Bytes::from(archive), &hint).await {
                Ok(uri) => Some(uri),
                Err(e) => {
                    warn!(session_id = %session_id, error = %e, "archive upload failed");
                    None
                }
            }
        };

        self.session.advance_to(SessionState::Closed);
        self.registry.remove(&session_id);

        if !failed {
            let _ = self
                .outbound
                .send(ServerEvent::TranscriptionStopped {
                    status: "stopped".to_string(),
                    message: "Transcription session closed".to_string(),
                    s3_url,
                })
                .await;
        }
        info!(session_id = %session_id, rejected_frames = self.session.rejected_frames(), "session closed");
    }
}
