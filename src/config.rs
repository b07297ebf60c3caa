//! 프로토콜 설정

use std::time::Duration;

use crate::{Error, Result, CHECKSUM_SIZE, DEFAULT_PAYLOAD_SIZE, DEFAULT_WINDOW_SIZE, HEADER_SIZE};

/// SWFT 프로토콜 설정
///
/// 송신자와 수신자는 `payload_size`가 같아야 함 (수신 버퍼 크기 결정)
#[derive(Debug, Clone)]
pub struct Config {
    /// 청크 페이로드 크기 (바이트)
    pub payload_size: usize,

    /// 송신 윈도우 크기 (동시에 미확인 상태로 둘 수 있는 패킷 수)
    pub window_size: u32,

    /// ACK 대기 타임아웃 (밀리초)
    /// 송신 루프 간격과 수신 루프 폴링 간격으로도 사용
    pub ack_timeout_ms: u64,

    /// 수신측 핸드쉐이크 대기 시간 (밀리초)
    pub handshake_deadline_ms: u64,

    /// 핸드쉐이크 이후 최대 무응답 시간 (밀리초)
    pub idle_timeout_ms: u64,

    /// 연속 재시도 한도 (0이면 무제한)
    pub max_attempts: u32,

    /// 최종 ACK 이후 수신측 대기 시간 (밀리초)
    /// 최종 ACK 손실 시 재전송된 최종 패킷에 다시 응답
    pub linger_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            payload_size: DEFAULT_PAYLOAD_SIZE,
            window_size: DEFAULT_WINDOW_SIZE,
            ack_timeout_ms: 100,          // 100ms
            handshake_deadline_ms: 10_000, // 10초
            idle_timeout_ms: 30_000,      // 30초
            max_attempts: 300,            // 100ms 기준 약 30초
            linger_ms: 300,
        }
    }
}

impl Config {
    /// 새 설정 생성
    pub fn new() -> Self {
        Self::default()
    }

    /// 최대 데이터그램 크기 (헤더 + 페이로드)
    pub fn max_datagram_size(&self) -> usize {
        HEADER_SIZE + self.payload_size
    }

    /// 수신 버퍼 크기: 최대 데이터그램보다 1바이트 크게 잡아 초과 길이를 감지
    pub fn recv_buffer_size(&self) -> usize {
        self.max_datagram_size() + 1
    }

    /// 핸드쉐이크에 담을 수 있는 최대 파일 이름 길이
    pub fn max_file_name_len(&self) -> usize {
        self.payload_size.saturating_sub(4)
    }

    pub fn ack_timeout(&self) -> Duration {
        Duration::from_millis(self.ack_timeout_ms)
    }

    pub fn handshake_deadline(&self) -> Duration {
        Duration::from_millis(self.handshake_deadline_ms)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }

    pub fn linger(&self) -> Duration {
        Duration::from_millis(self.linger_ms)
    }

    /// 재시도 한도 도달 여부
    pub fn attempts_exhausted(&self, attempts: u32) -> bool {
        self.max_attempts != 0 && attempts >= self.max_attempts
    }

    /// 설정 검증
    pub fn validate(&self) -> Result<()> {
        // 최종 패킷이 체크섬을 담을 수 있어야 함
        if self.payload_size < CHECKSUM_SIZE {
            return Err(Error::InvalidConfig(format!(
                "payload_size {} 너무 작음 (최소 {})",
                self.payload_size, CHECKSUM_SIZE
            )));
        }
        if self.window_size == 0 {
            return Err(Error::InvalidConfig("window_size는 1 이상".into()));
        }
        if self.ack_timeout_ms == 0 {
            return Err(Error::InvalidConfig("ack_timeout_ms는 1 이상".into()));
        }
        if self.handshake_deadline_ms == 0 || self.idle_timeout_ms == 0 {
            return Err(Error::InvalidConfig(
                "handshake_deadline_ms / idle_timeout_ms는 1 이상".into(),
            ));
        }
        Ok(())
    }

    /// 로컬 네트워크용 설정
    pub fn lan() -> Self {
        Self {
            window_size: 32,
            ack_timeout_ms: 30,
            max_attempts: 1000,
            linger_ms: 100,
            ..Self::default()
        }
    }

    /// 불안정한 네트워크용 설정
    pub fn lossy_network() -> Self {
        Self {
            payload_size: 512,           // 작은 청크
            window_size: 4,
            ack_timeout_ms: 250,
            handshake_deadline_ms: 30_000,
            idle_timeout_ms: 60_000,
            max_attempts: 0,             // 무제한 재시도
            linger_ms: 1000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_matches_wire_limits() {
        let config = Config::default();
        assert_eq!(config.max_datagram_size(), 1030);
        assert_eq!(config.recv_buffer_size(), 1031);
        assert_eq!(config.max_file_name_len(), 1020);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_presets_are_valid() {
        assert!(Config::lan().validate().is_ok());
        assert!(Config::lossy_network().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_window() {
        let config = Config {
            window_size: 0,
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_validate_rejects_payload_smaller_than_checksum() {
        let config = Config {
            payload_size: 8,
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_attempts_exhausted() {
        let mut config = Config::default();
        config.max_attempts = 3;
        assert!(!config.attempts_exhausted(2));
        assert!(config.attempts_exhausted(3));

        config.max_attempts = 0;
        assert!(!config.attempts_exhausted(u32::MAX));
    }
}
