//! # SWFT (Sliding Window File Transfer)
//!
//! UDP 기반 ACK 슬라이딩 윈도우 파일 전송 프로토콜
//!
//! ## 핵심 특징
//! - **3단계 교환**: 핸드쉐이크 → 윈도우 데이터 전송 → 체크섬 종료 핸드쉐이크
//! - **개별 ACK**: 청크마다 독립 ACK, 연속 구간이 채워지면 윈도우 전진
//! - **타임아웃 재전송**: ACK가 오지 않으면 미확인 패킷 전체 재전송
//! - **순서 무관 수신**: 재정렬/중복/손실 허용, 마지막에 순서대로 조립
//! - **무결성 검증**: 파일 전체 MD5를 최종 패킷으로 전달
//!
//! ## 와이어 포맷
//!
//! ```text
//!  0      2          6
//!  ┌──────┬──────────┬──────────────────────────┐
//!  │  id  │   seq    │ payload (0..=payload_size)│
//!  └──────┴──────────┴──────────────────────────┘
//! ```
//!
//! 모든 정수는 빅엔디안.

pub mod chunk;
pub mod config;
pub mod error;
pub mod integrity;
pub mod packet;
pub mod receiver;
pub mod sender;
pub mod stats;
pub mod transport;
pub mod window;

pub use chunk::{chunk_count, ChunkReader, ReceiveStore};
pub use config::Config;
pub use error::{Error, Result};
pub use integrity::{Checksum, Verification};
pub use packet::{HandshakeInfo, Packet};
pub use receiver::{ReceiveOutcome, Receiver, Session};
pub use sender::{SendReport, Sender};
pub use stats::TransferStats;
pub use transport::Datagram;
pub use window::{AckOutcome, SendWindow};

/// 전송 식별자 (16비트, 전송마다 무작위)
pub type TransmissionId = u16;

/// 시퀀스 번호 (32비트)
pub type SeqNum = u32;

/// 헤더 크기: 전송 ID(2) + 시퀀스 번호(4)
pub const HEADER_SIZE: usize = 6;

/// 기본 페이로드 크기 (바이트)
pub const DEFAULT_PAYLOAD_SIZE: usize = 1024;

/// 기본 윈도우 크기 (패킷 수)
pub const DEFAULT_WINDOW_SIZE: u32 = 8;

/// 체크섬 크기 (MD5, 바이트)
pub const CHECKSUM_SIZE: usize = 16;

/// 핸드쉐이크 시퀀스 번호
pub const HANDSHAKE_SEQ: SeqNum = 0;
