use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::time::timeout;

use transcribe_gateway::config::StreamingSessionConfig;
use transcribe_gateway::engine::{
    EngineError, MockBlobStore, RecognitionResult, RecognitionStream, StreamCommand,
    StreamingRecognizer,
};
use transcribe_gateway::streaming::{ServerEvent, SessionManager, StreamingError};

fn partial(text: &str) -> RecognitionResult {
    RecognitionResult {
        text: text.to_string(),
        is_partial: true,
    }
}

fn final_result(text: &str) -> RecognitionResult {
    RecognitionResult {
        text: text.to_string(),
        is_partial: false,
    }
}

/// フレームn件目ごとの応答と close 時の応答をスクリプトで返す認識エンジン
struct ScriptedRecognizer {
    per_frame: Vec<Vec<RecognitionResult>>,
    on_close: Vec<RecognitionResult>,
}

impl StreamingRecognizer for ScriptedRecognizer {
    fn open(
        &self,
        session_id: &str,
        _language_code: &str,
    ) -> Result<RecognitionStream, EngineError> {
        let (command_tx, mut command_rx) = mpsc::channel(32);
        let (result_tx, result_rx) = mpsc::channel(32);
        let per_frame = self.per_frame.clone();
        let on_close = self.on_close.clone();

        tokio::spawn(async move {
            let mut index = 0_usize;
            while let Some(command) = command_rx.recv().await {
                match command {
                    StreamCommand::Frame(_) => {
                        if let Some(results) = per_frame.get(index) {
                            for result in results {
                                let _ = result_tx.send(result.clone()).await;
                            }
                        }
                        index += 1;
                    }
                    StreamCommand::Close => {
                        for result in &on_close {
                            let _ = result_tx.send(result.clone()).await;
                        }
                        break;
                    }
                }
            }
        });

        Ok(RecognitionStream::new(session_id, command_tx, result_rx))
    }
}

/// 特定セッションだけ下流の往復が遅い認識エンジン
struct SelectiveSlowRecognizer {
    slow_session: String,
    delay: Duration,
}

impl StreamingRecognizer for SelectiveSlowRecognizer {
    fn open(
        &self,
        session_id: &str,
        _language_code: &str,
    ) -> Result<RecognitionStream, EngineError> {
        let (command_tx, mut command_rx) = mpsc::channel(32);
        let (result_tx, result_rx) = mpsc::channel(32);
        let delay = if session_id == self.slow_session {
            Some(self.delay)
        } else {
            None
        };
        let session_id_for_task = session_id.to_string();

        tokio::spawn(async move {
            let mut frame_index = 0_u32;
            while let Some(command) = command_rx.recv().await {
                match command {
                    StreamCommand::Frame(_) => {
                        frame_index += 1;
                        if let Some(delay) = delay {
                            tokio::time::sleep(delay).await;
                        }
                        let _ = result_tx
                            .send(partial(&format!(
                                "{} frame {}",
                                session_id_for_task, frame_index
                            )))
                            .await;
                    }
                    StreamCommand::Close => {
                        let _ = result_tx
                            .send(final_result(&format!("{} done", session_id_for_task)))
                            .await;
                        break;
                    }
                }
            }
        });

        Ok(RecognitionStream::new(session_id, command_tx, result_rx))
    }
}

/// 指定フレーム数を受けた後に黙って切断する認識エンジン
struct BrittleRecognizer {
    frames_before_failure: usize,
}

impl StreamingRecognizer for BrittleRecognizer {
    fn open(
        &self,
        session_id: &str,
        _language_code: &str,
    ) -> Result<RecognitionStream, EngineError> {
        let (command_tx, mut command_rx) = mpsc::channel(32);
        let (_result_tx, result_rx) = mpsc::channel::<RecognitionResult>(32);
        let budget = self.frames_before_failure;

        tokio::spawn(async move {
            let mut seen = 0_usize;
            while let Some(command) = command_rx.recv().await {
                match command {
                    StreamCommand::Frame(_) => {
                        seen += 1;
                        if seen >= budget {
                            // チャネルを落として下流断を再現する
                            break;
                        }
                    }
                    StreamCommand::Close => break,
                }
            }
        });

        Ok(RecognitionStream::new(session_id, command_tx, result_rx))
    }
}

/// 確立そのものを拒否する認識エンジン
struct RefusingRecognizer;

impl StreamingRecognizer for RefusingRecognizer {
    fn open(
        &self,
        _session_id: &str,
        _language_code: &str,
    ) -> Result<RecognitionStream, EngineError> {
        Err(EngineError::Connection {
            message: "refused".to_string(),
        })
    }
}

/// transcription_stopped が届くまでイベントを収集する
async fn collect_until_stopped(rx: &mut mpsc::Receiver<ServerEvent>) -> Vec<ServerEvent> {
    let mut events = Vec::new();
    loop {
        let event = timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("event within deadline")
            .expect("channel open");
        let stopped = matches!(event, ServerEvent::TranscriptionStopped { .. });
        events.push(event);
        if stopped {
            return events;
        }
    }
}

#[tokio::test]
async fn frames_produce_results_in_submission_order() {
    let recognizer = ScriptedRecognizer {
        per_frame: vec![vec![partial("a")], vec![partial("a b")], vec![]],
        on_close: vec![final_result("a b c")],
    };
    let blobs = Arc::new(MockBlobStore::default());
    let manager = SessionManager::new(
        Arc::new(recognizer),
        blobs.clone(),
        StreamingSessionConfig::default(),
    );
    let (tx, mut rx) = mpsc::channel(32);

    manager
        .start("s1", Some("en-US".to_string()), tx)
        .await
        .expect("start");
    for frame in ["a", "b", "c"] {
        manager
            .submit_frame("s1", Bytes::from(frame.as_bytes().to_vec()))
            .await
            .expect("frame accepted");
    }
    manager.stop("s1").await.expect("stop");

    let events = collect_until_stopped(&mut rx).await;
    assert!(matches!(
        events.first(),
        Some(ServerEvent::TranscriptionStarted { .. })
    ));

    let results: Vec<(String, bool)> = events
        .iter()
        .filter_map(|event| match event {
            ServerEvent::TranscriptionResult { text, is_partial } => {
                Some((text.clone(), *is_partial))
            }
            _ => None,
        })
        .collect();
    assert_eq!(
        results,
        vec![
            ("a".to_string(), true),
            ("a b".to_string(), true),
            ("a b c".to_string(), false),
        ]
    );

    match events.last() {
        Some(ServerEvent::TranscriptionStopped { s3_url, .. }) => {
            assert!(s3_url.is_some(), "archive location should be reported");
        }
        other => panic!("expected transcription_stopped, got {other:?}"),
    }

    // アーカイブは1回だけ保存され、セッションは破棄済み
    assert_eq!(blobs.uploaded().len(), 1);
    assert!(manager.registry().is_empty());
}

#[tokio::test]
async fn stop_is_idempotent_and_emits_one_stopped_event() {
    let recognizer = ScriptedRecognizer {
        per_frame: vec![vec![partial("x")]],
        on_close: vec![final_result("x")],
    };
    let manager = SessionManager::new(
        Arc::new(recognizer),
        Arc::new(MockBlobStore::default()),
        StreamingSessionConfig::default(),
    );
    let (tx, mut rx) = mpsc::channel(32);

    manager.start("s1", None, tx).await.expect("start");
    manager
        .submit_frame("s1", Bytes::from_static(b"x"))
        .await
        .expect("frame accepted");

    manager.stop("s1").await.expect("first stop");
    manager.stop("s1").await.expect("second stop is a no-op");

    let events = collect_until_stopped(&mut rx).await;
    let stopped_count = events
        .iter()
        .filter(|e| matches!(e, ServerEvent::TranscriptionStopped { .. }))
        .count();
    assert_eq!(stopped_count, 1);

    // CLOSED 後の停止要求も no-op
    manager.stop("s1").await.expect("stop after close");
    match timeout(Duration::from_millis(100), rx.recv()).await {
        Err(_) => {}
        Ok(None) => {}
        Ok(Some(event)) => panic!("unexpected event after close: {event:?}"),
    }
}

#[tokio::test]
async fn duplicate_start_is_rejected() {
    let recognizer = ScriptedRecognizer {
        per_frame: vec![],
        on_close: vec![final_result("done")],
    };
    let manager = SessionManager::new(
        Arc::new(recognizer),
        Arc::new(MockBlobStore::default()),
        StreamingSessionConfig::default(),
    );
    let (tx, _rx) = mpsc::channel(32);
    let (tx2, _rx2) = mpsc::channel(32);

    manager.start("s1", None, tx).await.expect("first start");
    let err = manager.start("s1", None, tx2).await.unwrap_err();
    assert!(matches!(err, StreamingError::AlreadyActive { .. }));
}

#[tokio::test]
async fn late_frames_are_rejected_without_touching_other_sessions() {
    let recognizer = ScriptedRecognizer {
        per_frame: vec![vec![partial("ok")]],
        on_close: vec![final_result("done")],
    };
    let manager = SessionManager::new(
        Arc::new(recognizer),
        Arc::new(MockBlobStore::default()),
        StreamingSessionConfig::default(),
    );

    // 未登録セッションへの投入はソフトエラー
    let err = manager
        .submit_frame("ghost", Bytes::from_static(b"x"))
        .await
        .unwrap_err();
    assert!(matches!(err, StreamingError::InvalidState { .. }));

    let (tx1, mut rx1) = mpsc::channel(32);
    let (tx2, mut rx2) = mpsc::channel(32);
    manager.start("s1", None, tx1).await.expect("start s1");
    manager.start("s2", None, tx2).await.expect("start s2");

    // s1 を閉じてから投入すると拒否される
    manager.stop("s1").await.expect("stop s1");
    let _ = collect_until_stopped(&mut rx1).await;
    let err = manager
        .submit_frame("s1", Bytes::from_static(b"late"))
        .await
        .unwrap_err();
    assert!(matches!(err, StreamingError::InvalidState { .. }));

    // s2 は影響を受けずに動き続ける
    manager
        .submit_frame("s2", Bytes::from_static(b"y"))
        .await
        .expect("s2 still accepts frames");
    let event = timeout(Duration::from_secs(1), async {
        loop {
            if let Some(ServerEvent::TranscriptionResult { .. }) = rx2.recv().await {
                break;
            }
        }
    })
    .await;
    assert!(event.is_ok(), "s2 should keep receiving results");
}

#[tokio::test]
async fn slow_session_does_not_delay_siblings() {
    let recognizer = SelectiveSlowRecognizer {
        slow_session: "slow".to_string(),
        delay: Duration::from_millis(150),
    };
    let manager = SessionManager::new(
        Arc::new(recognizer),
        Arc::new(MockBlobStore::default()),
        StreamingSessionConfig::default(),
    );
    let (slow_tx, _slow_rx) = mpsc::channel(64);
    let (fast_tx, mut fast_rx) = mpsc::channel(64);

    manager.start("slow", None, slow_tx).await.expect("start slow");
    manager.start("fast", None, fast_tx).await.expect("start fast");

    // slow 側に滞留を作ってから fast 側に1フレーム入れる
    for _ in 0..10 {
        manager
            .submit_frame("slow", Bytes::from_static(b"x"))
            .await
            .expect("slow frame accepted");
    }
    manager
        .submit_frame("fast", Bytes::from_static(b"y"))
        .await
        .expect("fast frame accepted");

    let waited = timeout(Duration::from_millis(500), async {
        loop {
            if let Some(ServerEvent::TranscriptionResult { .. }) = fast_rx.recv().await {
                break;
            }
        }
    })
    .await;
    assert!(
        waited.is_ok(),
        "fast session result must not wait on the slow session's backlog"
    );
}

#[tokio::test]
async fn downstream_failure_emits_single_error_and_closes_session() {
    let recognizer = BrittleRecognizer {
        frames_before_failure: 1,
    };
    let manager = SessionManager::new(
        Arc::new(recognizer),
        Arc::new(MockBlobStore::default()),
        StreamingSessionConfig::default(),
    );
    let (tx, mut rx) = mpsc::channel(32);

    manager.start("s1", None, tx).await.expect("start");
    manager
        .submit_frame("s1", Bytes::from_static(b"one"))
        .await
        .expect("first frame accepted");

    // 下流が落ちるのを待ってから次のフレームで断を踏ませる
    tokio::time::sleep(Duration::from_millis(50)).await;
    let _ = manager.submit_frame("s1", Bytes::from_static(b"two")).await;

    let got_error = timeout(Duration::from_secs(1), async {
        loop {
            match rx.recv().await {
                Some(ServerEvent::Error { .. }) => break true,
                Some(ServerEvent::TranscriptionStopped { .. }) => break false,
                Some(_) => continue,
                None => break false,
            }
        }
    })
    .await
    .expect("event within deadline");
    assert!(got_error, "downstream failure should surface one error event");

    // error の後に transcription_stopped は届かない
    let trailing = timeout(Duration::from_millis(150), rx.recv()).await;
    match trailing {
        Err(_) => {}
        Ok(None) => {}
        Ok(Some(event)) => {
            assert!(
                !matches!(event, ServerEvent::TranscriptionStopped { .. }),
                "no stopped event after a downstream failure"
            );
        }
    }

    // セッションはレジストリから破棄される
    let deadline = tokio::time::Instant::now() + Duration::from_secs(1);
    while !manager.registry().is_empty() {
        assert!(tokio::time::Instant::now() < deadline, "session evicted");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn failed_establishment_emits_error_and_registers_nothing() {
    let manager = SessionManager::new(
        Arc::new(RefusingRecognizer),
        Arc::new(MockBlobStore::default()),
        StreamingSessionConfig::default(),
    );
    let (tx, mut rx) = mpsc::channel(32);

    let err = manager.start("s1", None, tx).await.unwrap_err();
    assert!(matches!(err, StreamingError::Engine(_)));

    match timeout(Duration::from_millis(200), rx.recv()).await {
        Ok(Some(ServerEvent::Error { message })) => {
            assert!(message.contains("failed to start transcription"));
        }
        other => panic!("expected error event, got {other:?}"),
    }
    assert!(manager.registry().is_empty());
}
