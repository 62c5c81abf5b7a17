//! WebSocket 配信サーバ
//!
//! 1接続=1セッション。受信イベントをセッションマネージャへ転送し、
//! セッション側からのイベントを同じ接続へ書き戻します。
//! 接続IDはサーバ側で採番し、そのままセッションIDになります。
use std::net::SocketAddr;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::engine::{BlobStore, StreamingRecognizer};
use crate::streaming::{ClientEvent, ServerEvent, SessionManager, StreamingError};

#[derive(thiserror::Error, Debug)]
pub enum ServerError {
    #[error("bind error: {0}")]
    Bind(std::io::Error),
    #[error("accept error: {0}")]
    Accept(std::io::Error),
}

/// 指定アドレスにバインドしてWSサーバを起動
pub async fn bind_and_run<R, B>(
    bind_addr: &str,
    manager: Arc<SessionManager<R, B>>,
) -> Result<(), ServerError>
where
    R: StreamingRecognizer + Send + Sync + 'static,
    B: BlobStore + Send + Sync + 'static,
{
    let listener = TcpListener::bind(bind_addr)
        .await
        .map_err(ServerError::Bind)?;
    run_with_listener(listener, manager).await
}

/// 既存の`TcpListener`でWSサーバを起動（テストでも使用）
pub async fn run_with_listener<R, B>(
    listener: TcpListener,
    manager: Arc<SessionManager<R, B>>,
) -> Result<(), ServerError>
where
    R: StreamingRecognizer + Send + Sync + 'static,
    B: BlobStore + Send + Sync + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "realtime transcription server listening");
    }

    loop {
        let (stream, peer_addr) = match listener.accept().await {
            Ok(v) => v,
            Err(e) => return Err(ServerError::Accept(e)),
        };
        let manager = manager.clone();
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, manager, peer_addr).await {
                warn!(%peer_addr, error = %e, "connection handling failed");
            }
        });
    }
}

async fn handle_connection<R, B, S>(
    stream: S,
    manager: Arc<SessionManager<R, B>>,
    peer: SocketAddr,
) -> Result<(), String>
where
    R: StreamingRecognizer + Send + Sync + 'static,
    B: BlobStore + Send + Sync + 'static,
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin + Send + 'static,
{
    let ws = accept_async(stream)
        .await
        .map_err(|e| format!("websocket handshake failed: {e}"))?;

    let connection_id = Uuid::new_v4().to_string();
    info!(%peer, %connection_id, "accepted websocket connection");

    let (mut ws_sender, mut ws_receiver) = ws.split();
    let capacity = manager.config().outbound_queue_capacity;
    let (outbound_tx, outbound_rx) = mpsc::channel::<ServerEvent>(capacity);

    // 接続確立の通知（送信タスクが最初に書き出す）
    let _ = outbound_tx
        .send(ServerEvent::Connected {
            status: "connected".to_string(),
        })
        .await;

    // 送信タスク（セッション→クライアント）
    let connection_id_for_send = connection_id.clone();
    let send_task = tokio::spawn(async move {
        let mut events = ReceiverStream::new(outbound_rx);
        while let Some(event) = events.next().await {
            let json = match serde_json::to_string(&event) {
                Ok(json) => json,
                Err(e) => {
                    warn!(connection_id = %connection_id_for_send, error = %e, "event serialization failed");
                    continue;
                }
            };
            if ws_sender.send(Message::Text(json.into())).await.is_err() {
                warn!(connection_id = %connection_id_for_send, "WebSocket送信失敗");
                break;
            }
        }
    });

    // 受信ループ（クライアント→セッション）
    while let Some(msg) = ws_receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientEvent>(&text) {
                Ok(event) => {
                    handle_client_event(&manager, &connection_id, event, &outbound_tx).await;
                }
                Err(e) => {
                    debug!(connection_id = %connection_id, error = %e, "JSON解析失敗");
                    let _ = outbound_tx
                        .send(ServerEvent::Error {
                            message: format!("invalid event: {e}"),
                        })
                        .await;
                }
            },
            Ok(Message::Close(_)) => {
                info!(connection_id = %connection_id, "WebSocket切断");
                break;
            }
            Err(e) => {
                warn!(connection_id = %connection_id, error = %e, "WebSocketエラー");
                break;
            }
            _ => {}
        }
    }

    // 切断時は停止経路へ（冪等なので明示停止済みでも安全）
    let _ = manager.stop(&connection_id).await;

    // 自分の送信権を手放し、セッション側が出し切ったら送信タスクも終わる
    drop(outbound_tx);
    let _ = send_task.await;

    info!(connection_id = %connection_id, "connection closed");
    Ok(())
}

async fn handle_client_event<R, B>(
    manager: &Arc<SessionManager<R, B>>,
    connection_id: &str,
    event: ClientEvent,
    outbound: &mpsc::Sender<ServerEvent>,
) where
    R: StreamingRecognizer + Send + Sync + 'static,
    B: BlobStore + Send + Sync + 'static,
{
    match event {
        ClientEvent::StartTranscription { language_code } => {
            match manager
                .start(connection_id, language_code, outbound.clone())
                .await
            {
                Ok(_session) => {}
                Err(StreamingError::AlreadyActive { .. }) => {
                    let _ = outbound
                        .send(ServerEvent::Error {
                            message: "transcription already active".to_string(),
                        })
                        .await;
                }
                Err(e) => {
                    // 確立失敗時の error イベントは start 側が送出済み
                    warn!(connection_id = %connection_id, error = %e, "start failed");
                }
            }
        }
        ClientEvent::AudioChunk { chunk } => match BASE64.decode(chunk.as_bytes()) {
            Ok(raw) => {
                if let Err(e) = manager
                    .submit_frame(connection_id, Bytes::from(raw))
                    .await
                {
                    // ソフトエラー: 接続は維持する
                    debug!(connection_id = %connection_id, error = %e, "frame rejected");
                }
            }
            Err(e) => {
                let _ = outbound
                    .send(ServerEvent::Error {
                        message: format!("invalid audio chunk: {e}"),
                    })
                    .await;
            }
        },
        ClientEvent::StopTranscription {} => {
            let _ = manager.stop(connection_id).await;
        }
    }
}
