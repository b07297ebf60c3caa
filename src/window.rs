//! 송신 윈도우
//!
//! 송신 태스크와 ACK 태스크가 공유하는 상태. 내부 필드는 하나의 락으로 보호되고
//! 외부에는 원자적 연산만 노출한다. 락은 네트워크 I/O 동안 잡지 않는다.
//!
//! ```text
//!        base                 next
//!         │                    │
//!  ... ✓ ✓│ ✗ ✓ ✗ ✓ ✗ ✗ ✗ ✗ ✗ │ . . .
//!         └──── 전송됨 (≤ W) ──┘
//! ```

use std::collections::HashMap;

use bytes::Bytes;
use parking_lot::Mutex;

use crate::SeqNum;

/// ACK 처리 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckOutcome {
    /// 새 ACK, base 전진
    Advanced { base: SeqNum },

    /// 새 ACK, 앞쪽 구멍 때문에 base 유지
    Accepted,

    /// 이미 확인된 시퀀스 번호
    Duplicate,

    /// 전송하지 않은 시퀀스 번호
    OutOfRange,
}

/// 락 내부 상태
#[derive(Debug)]
struct WindowState {
    /// 가장 낮은 미확인 시퀀스 번호
    base: SeqNum,

    /// 다음에 전송할 시퀀스 번호
    next: SeqNum,

    /// 시퀀스 번호별 ACK 여부 (인덱스 0은 핸드쉐이크)
    acked: Vec<bool>,

    /// 재전송용 원본 데이터그램 (ACK되면 제거)
    store: HashMap<SeqNum, Bytes>,

    /// 강제 종료 여부
    closed: bool,

    /// 관측된 최대 미확인 패킷 수
    peak_in_flight: u32,
}

impl WindowState {
    fn in_flight(&self) -> u32 {
        (self.base..self.next)
            .filter(|&seq| !self.acked[seq as usize])
            .count() as u32
    }
}

/// 슬라이딩 송신 윈도우
#[derive(Debug)]
pub struct SendWindow {
    /// 총 청크 수 (N), 데이터는 1..N-1
    total_chunks: SeqNum,

    /// 윈도우 크기 (W)
    window_size: u32,

    state: Mutex<WindowState>,
}

impl SendWindow {
    pub fn new(total_chunks: SeqNum, window_size: u32) -> Self {
        Self {
            total_chunks,
            window_size,
            state: Mutex::new(WindowState {
                base: 1,
                next: 1,
                acked: vec![false; total_chunks.max(1) as usize],
                store: HashMap::new(),
                closed: false,
                peak_in_flight: 0,
            }),
        }
    }

    pub fn base(&self) -> SeqNum {
        self.state.lock().base
    }

    pub fn next(&self) -> SeqNum {
        self.state.lock().next
    }

    /// 모든 데이터 청크 확인 완료 (base == N)
    pub fn is_complete(&self) -> bool {
        self.state.lock().base >= self.total_chunks
    }

    /// 데이터 단계 진행 중 여부
    pub fn is_active(&self) -> bool {
        let state = self.state.lock();
        !state.closed && state.base < self.total_chunks
    }

    /// 데이터 단계 강제 종료 (에러 시)
    pub fn close(&self) {
        self.state.lock().closed = true;
    }

    /// 윈도우에 여유가 있으면 다음 전송할 시퀀스 번호
    pub fn next_admissible(&self) -> Option<SeqNum> {
        let state = self.state.lock();
        if state.closed {
            return None;
        }

        let limit = state.base.saturating_add(self.window_size);
        if state.next < limit && state.next < self.total_chunks {
            Some(state.next)
        } else {
            None
        }
    }

    /// `seq` 패킷을 윈도우에 등록하고 next 증가
    ///
    /// `next_admissible()`이 돌려준 값이 아니면 false
    pub fn admit(&self, seq: SeqNum, datagram: Bytes) -> bool {
        let mut state = self.state.lock();
        let limit = state.base.saturating_add(self.window_size);
        if state.closed || seq != state.next || seq >= limit || seq >= self.total_chunks {
            return false;
        }

        state.store.insert(seq, datagram);
        state.next += 1;

        let in_flight = state.in_flight();
        state.peak_in_flight = state.peak_in_flight.max(in_flight);
        true
    }

    /// ACK 기록 (멱등), 연속 확인 구간만큼 base 전진
    pub fn mark_acked(&self, seq: SeqNum) -> AckOutcome {
        let mut state = self.state.lock();
        if seq == 0 || seq >= self.total_chunks || seq >= state.next {
            return AckOutcome::OutOfRange;
        }

        let idx = seq as usize;
        if state.acked[idx] {
            return AckOutcome::Duplicate;
        }
        state.acked[idx] = true;
        state.store.remove(&seq);

        let before = state.base;
        while state.base < self.total_chunks && state.acked[state.base as usize] {
            state.base += 1;
        }

        if state.base != before {
            AckOutcome::Advanced { base: state.base }
        } else {
            AckOutcome::Accepted
        }
    }

    /// [base, next) 중 미확인 패킷 (재전송용)
    pub fn outstanding_unacked(&self) -> Vec<(SeqNum, Bytes)> {
        let state = self.state.lock();
        (state.base..state.next)
            .filter(|&seq| !state.acked[seq as usize])
            .filter_map(|seq| state.store.get(&seq).map(|data| (seq, data.clone())))
            .collect()
    }

    /// 현재 미확인 패킷 수
    pub fn in_flight(&self) -> u32 {
        self.state.lock().in_flight()
    }

    pub fn peak_in_flight(&self) -> u32 {
        self.state.lock().peak_in_flight
    }

    /// 재전송 저장소 크기
    pub fn stored_packets(&self) -> usize {
        self.state.lock().store.len()
    }
}
