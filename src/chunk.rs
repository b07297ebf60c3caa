//! 청크 분할과 조립
//!
//! - 송신측: 파일 오프셋 `(seq-1) * payload_size`에서 청크 읽기
//! - 수신측: 시퀀스 번호별로 보관, 마지막에 1..N-1 순서대로 기록

use std::collections::HashMap;
use std::io::SeekFrom;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeek, AsyncSeekExt, AsyncWrite, AsyncWriteExt};

use crate::{Error, Result, SeqNum};

/// 총 청크 수 (N) 계산
///
/// 데이터 청크 `1..N-1`에 최종 체크섬 슬롯 하나를 더한 값.
/// 빈 파일은 데이터 청크 없이 N=1.
pub fn chunk_count(file_size: u64, payload_size: usize) -> Result<SeqNum> {
    if payload_size == 0 {
        return Err(Error::InvalidConfig("payload_size는 0보다 커야 함".into()));
    }
    let payload_size = payload_size as u64;
    let data_chunks = (file_size + payload_size - 1) / payload_size;

    SeqNum::try_from(data_chunks + 1).map_err(|_| Error::FileTooLarge { size: file_size })
}

/// 원본 파일에서 청크를 읽는 리더 (송신측)
pub struct ChunkReader<R> {
    inner: R,
    payload_size: usize,
}

impl<R> ChunkReader<R>
where
    R: AsyncRead + AsyncSeek + Unpin,
{
    pub fn new(inner: R, payload_size: usize) -> Self {
        Self {
            inner,
            payload_size,
        }
    }

    /// 데이터 청크 `seq` 읽기 (seq >= 1)
    ///
    /// 마지막 청크는 payload_size보다 짧을 수 있음
    pub async fn read_chunk(&mut self, seq: SeqNum) -> Result<Bytes> {
        debug_assert!(seq >= 1, "seq 0은 핸드쉐이크 전용");

        let offset = u64::from(seq.saturating_sub(1)) * self.payload_size as u64;
        self.inner.seek(SeekFrom::Start(offset)).await?;

        let mut buf = BytesMut::zeroed(self.payload_size);
        let mut filled = 0;
        while filled < buf.len() {
            let n = self.inner.read(&mut buf[filled..]).await?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        buf.truncate(filled);

        Ok(buf.freeze())
    }
}

/// 수신 저장소 (수신측)
///
/// 도착 순서와 무관하게 시퀀스 번호로 보관, 중복은 덮어씀
#[derive(Debug)]
pub struct ReceiveStore {
    /// 총 청크 수 (N)
    total_chunks: SeqNum,

    /// seq -> 페이로드
    chunks: HashMap<SeqNum, Bytes>,
}

impl ReceiveStore {
    pub fn new(total_chunks: SeqNum) -> Self {
        Self {
            total_chunks,
            chunks: HashMap::new(),
        }
    }

    /// 데이터 청크 범위 (1..N-1) 여부
    pub fn is_data_seq(&self, seq: SeqNum) -> bool {
        seq >= 1 && seq < self.total_chunks
    }

    /// 청크 삽입, 새 청크면 true
    ///
    /// 같은 seq가 다시 오면 나중 페이로드로 덮어씀. 범위 밖 시퀀스 번호는 무시
    pub fn insert(&mut self, seq: SeqNum, payload: Bytes) -> bool {
        if !self.is_data_seq(seq) {
            return false;
        }

        self.chunks.insert(seq, payload).is_none()
    }

    /// 수신된 데이터 청크 수
    pub fn received_count(&self) -> usize {
        self.chunks.len()
    }

    /// 완료 여부 확인
    pub fn is_complete(&self) -> bool {
        self.first_missing().is_none()
    }

    pub fn first_missing(&self) -> Option<SeqNum> {
        (1..self.total_chunks).find(|seq| !self.chunks.contains_key(seq))
    }

    /// 누락 청크가 있으면 MissingChunk
    pub fn ensure_complete(&self) -> Result<()> {
        match self.first_missing() {
            Some(seq) => Err(Error::MissingChunk {
                seq,
                total: self.total_chunks,
            }),
            None => Ok(()),
        }
    }

    /// 1..N-1 순서대로 기록, 기록한 바이트 수 반환
    ///
    /// 누락 청크가 있으면 아무것도 쓰지 않고 실패
    pub async fn write_to<W>(&self, writer: &mut W) -> Result<u64>
    where
        W: AsyncWrite + Unpin,
    {
        self.ensure_complete()?;

        let mut written = 0u64;
        for seq in 1..self.total_chunks {
            if let Some(data) = self.chunks.get(&seq) {
                writer.write_all(data).await?;
                written += data.len() as u64;
            }
        }
        writer.flush().await?;

        Ok(written)
    }
}
