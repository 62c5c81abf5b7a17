//! 認識エンジン連携モジュール
//!
//! 音声認識サービスとブロブストアはこのモジュールのトレイト越しに扱います。
//!
//! - `StreamingRecognizer` はストリーミング認識セッションの開始を提供
//! - `RecognitionStream` は1セッションぶんの送受信ハンドル（共有されない）
//! - `BatchRecognizer` は長時間ジョブの開始とステータス取得を提供
//! - `BlobStore` は音声アーティファクトの保存と削除を提供
//!
//! モック実装はデモ起動とテストの両方で使用します。
mod client;
mod error;
mod mock;

pub use client::{
    BatchRecognizer, BlobStore, JobPoll, RecognitionResult, RecognitionStream, RemoteJobStatus,
    StreamCommand, StreamingRecognizer,
};
pub use error::EngineError;
pub use mock::{MockBatchRecognizer, MockBlobStore, MockRecognizer};
