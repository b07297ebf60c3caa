//! 전송 통계

use std::time::{Duration, Instant};

/// 단일 전송의 통계 (송신/수신 공용)
#[derive(Debug, Clone)]
pub struct TransferStats {
    /// 시작 시간
    pub start_time: Instant,

    /// 총 청크 수 (N)
    pub total_chunks: u32,

    /// 파일 바이트 수
    pub total_bytes: u64,

    /// 송신한 데이터 패킷 수 (재전송 포함)
    pub packets_sent: u64,

    /// 재전송한 데이터 패킷 수
    pub retransmitted_packets: u64,

    /// 타임아웃으로 인한 재전송 라운드 수
    pub retransmit_rounds: u64,

    /// 수신한 ACK 수
    pub acks_received: u64,

    /// 중복 ACK 수
    pub duplicate_acks: u64,

    /// 수신한 데이터 패킷 수 (중복 포함)
    pub packets_received: u64,

    /// 중복 수신 데이터 패킷 수
    pub duplicate_packets: u64,

    /// 버린 패킷 수 (잘못된 형식, 다른 전송 ID)
    pub discarded_packets: u64,

    /// 핸드쉐이크 시도 횟수
    pub handshake_attempts: u32,

    /// 최종 패킷 시도 횟수
    pub final_attempts: u32,
}

impl TransferStats {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            total_chunks: 0,
            total_bytes: 0,
            packets_sent: 0,
            retransmitted_packets: 0,
            retransmit_rounds: 0,
            acks_received: 0,
            duplicate_acks: 0,
            packets_received: 0,
            duplicate_packets: 0,
            discarded_packets: 0,
            handshake_attempts: 0,
            final_attempts: 0,
        }
    }

    /// 경과 시간
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// 처리율 (bytes/sec)
    pub fn throughput(&self) -> f64 {
        let elapsed = self.elapsed().as_secs_f64();
        if elapsed == 0.0 {
            return 0.0;
        }
        self.total_bytes as f64 / elapsed
    }

    /// 재전송 비율
    pub fn retransmit_ratio(&self) -> f64 {
        if self.packets_sent == 0 {
            return 0.0;
        }
        self.retransmitted_packets as f64 / self.packets_sent as f64
    }

    /// 통계 요약 문자열
    pub fn summary(&self) -> String {
        format!(
            "Elapsed: {:.2}s | Chunks: {} | Bytes: {} | Throughput: {:.2} MB/s | Sent: {} | Retransmitted: {} ({:.1}%) | Received: {} | Dup: {} | Discarded: {}",
            self.elapsed().as_secs_f64(),
            self.total_chunks,
            self.total_bytes,
            self.throughput() / 1_000_000.0,
            self.packets_sent,
            self.retransmitted_packets,
            self.retransmit_ratio() * 100.0,
            self.packets_received,
            self.duplicate_packets,
            self.discarded_packets,
        )
    }
}

impl Default for TransferStats {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retransmit_ratio() {
        let mut stats = TransferStats::new();
        assert_eq!(stats.retransmit_ratio(), 0.0);

        stats.packets_sent = 20;
        stats.retransmitted_packets = 5;
        assert!((stats.retransmit_ratio() - 0.25).abs() < f64::EPSILON);
    }

    #[test]
    fn test_summary_mentions_counters() {
        let mut stats = TransferStats::new();
        stats.total_chunks = 3;
        stats.retransmitted_packets = 2;

        let summary = stats.summary();
        assert!(summary.contains("Chunks: 3"));
        assert!(summary.contains("Retransmitted: 2"));
    }
}
