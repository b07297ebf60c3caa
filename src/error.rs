//! 에러 타입 정의

use thiserror::Error;

use crate::integrity::Checksum;
use crate::{SeqNum, TransmissionId};

/// SWFT 프로토콜 에러 타입
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO 에러: {0}")]
    Io(#[from] std::io::Error),

    #[error("잘못된 패킷: {len} bytes")]
    MalformedPacket { len: usize },

    #[error("전송 ID 불일치: expected {expected:04X}, got {got:04X}")]
    IdentifierMismatch {
        expected: TransmissionId,
        got: TransmissionId,
    },

    #[error("핸드쉐이크 타임아웃: {waited_ms}ms 동안 파일 정보 미수신")]
    HandshakeTimeout { waited_ms: u64 },

    #[error("전송 중단: {idle_ms}ms 동안 송신자 응답 없음")]
    TransferAbandoned { idle_ms: u64 },

    #[error("청크 누락: seq={seq} (전체 {total})")]
    MissingChunk { seq: SeqNum, total: SeqNum },

    #[error("무결성 검증 실패: expected {expected}, got {actual}")]
    IntegrityMismatch { expected: Checksum, actual: Checksum },

    #[error("재시도 한도 초과: seq={seq}, attempts={attempts}")]
    GaveUp { seq: SeqNum, attempts: u32 },

    #[error("파일 이름이 너무 김: {len} bytes (최대 {max})")]
    FileNameTooLong { len: usize, max: usize },

    #[error("파일이 너무 큼: {size} bytes (청크 수가 32비트 범위 초과)")]
    FileTooLarge { size: u64 },

    #[error("유효하지 않은 파일 이름: {0:?}")]
    InvalidFileName(String),

    #[error("유효하지 않은 설정: {0}")]
    InvalidConfig(String),

    #[error("태스크 실패: {0}")]
    TaskFailed(String),
}

/// Result 타입 별칭
pub type Result<T> = std::result::Result<T, Error>;
