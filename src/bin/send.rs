//! SWFT 송신기 - Sliding Window File Transfer
//!
//! 핸드쉐이크 → 윈도우 데이터 전송 → 체크섬 종료 핸드쉐이크
//!
//! 사용법:
//!   cargo run --release --bin swft-send -- <FILE> <HOST:PORT> [OPTIONS]
//!
//! 예시:
//!   # 기본 전송
//!   cargo run --release --bin swft-send -- data.bin 127.0.0.1:9000
//!
//!   # 다른 이름으로 저장 요청 + 큰 윈도우
//!   cargo run --release --bin swft-send -- data.bin 10.0.0.2:9000 --name copy.bin --window 32

use std::net::SocketAddr;
use std::path::PathBuf;

use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use swft::{Config, Sender};

/// 송신기 설정
struct SendArgs {
    file_path: Option<PathBuf>,
    target: Option<String>,
    name: Option<String>,
    bind_addr: Option<SocketAddr>,
    config: Config,
}

impl Default for SendArgs {
    fn default() -> Self {
        Self {
            file_path: None,
            target: None,
            name: None,
            bind_addr: None,
            config: Config::default(),
        }
    }
}

fn print_help() {
    println!(
        r#"SWFT Send - Sliding Window File Transfer 송신기

UDP 위에서 슬라이딩 윈도우 + ACK 재전송으로 파일 전송
- 파일 전체 MD5 체크섬으로 무결성 검증

사용법:
  cargo run --release --bin swft-send -- <FILE> <HOST:PORT> [OPTIONS]

옵션:
  -n, --name <NAME>       수신측에 알릴 파일 이름 (기본: FILE의 파일 이름)
  -b, --bind <ADDR>       로컬 바인드 주소 (기본: 0.0.0.0:0 = 자동 할당)
  -w, --window <N>        송신 윈도우 크기 (기본: 8)
  --payload <SIZE>        청크 페이로드 크기 바이트 (기본: 1024, 수신측과 동일해야 함)
  --timeout-ms <MS>       ACK 대기 타임아웃 (기본: 100)
  --attempts <N>          연속 재시도 한도, 0이면 무제한 (기본: 300)
  --lan                   로컬 네트워크 프리셋
  --lossy                 불안정한 네트워크 프리셋
  -h, --help              이 도움말 출력

예시:
  cargo run --release --bin swft-send -- data.bin 192.168.1.100:9000
  cargo run --release --bin swft-send -- data.bin 127.0.0.1:9000 --window 32 --timeout-ms 30
"#
    );
}

fn parse_args() -> SendArgs {
    let args: Vec<String> = std::env::args().collect();
    let mut parsed = SendArgs::default();
    let mut positional = Vec::new();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--name" | "-n" => {
                if i + 1 < args.len() {
                    parsed.name = Some(args[i + 1].clone());
                    i += 1;
                }
            }
            "--bind" | "-b" => {
                if i + 1 < args.len() {
                    parsed.bind_addr = Some(args[i + 1].parse().expect("유효한 주소 필요"));
                    i += 1;
                }
            }
            "--window" | "-w" => {
                if i + 1 < args.len() {
                    parsed.config.window_size = args[i + 1].parse().expect("유효한 숫자 필요");
                    i += 1;
                }
            }
            "--payload" => {
                if i + 1 < args.len() {
                    parsed.config.payload_size = args[i + 1].parse().expect("유효한 숫자 필요");
                    i += 1;
                }
            }
            "--timeout-ms" => {
                if i + 1 < args.len() {
                    parsed.config.ack_timeout_ms = args[i + 1].parse().expect("유효한 숫자 필요");
                    i += 1;
                }
            }
            "--attempts" => {
                if i + 1 < args.len() {
                    parsed.config.max_attempts = args[i + 1].parse().expect("유효한 숫자 필요");
                    i += 1;
                }
            }
            "--lan" => parsed.config = Config::lan(),
            "--lossy" => parsed.config = Config::lossy_network(),
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            other => positional.push(other.to_string()),
        }
        i += 1;
    }

    let mut positional = positional.into_iter();
    parsed.file_path = positional.next().map(PathBuf::from);
    parsed.target = positional.next();
    parsed
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 로깅 설정 (RUST_LOG로 조정 가능)
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = parse_args();
    let (file_path, target) = match (args.file_path, args.target) {
        (Some(file_path), Some(target)) => (file_path, target),
        _ => {
            print_help();
            std::process::exit(1);
        }
    };

    let peer = tokio::net::lookup_host(&target)
        .await?
        .next()
        .ok_or_else(|| format!("주소 해석 실패: {}", target))?;

    let bind_addr = args.bind_addr.unwrap_or_else(|| {
        if peer.is_ipv6() {
            SocketAddr::from(([0u16; 8], 0))
        } else {
            SocketAddr::from(([0u8; 4], 0))
        }
    });

    let name = match args.name {
        Some(name) => name,
        None => file_path
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string)
            .ok_or_else(|| format!("파일 이름을 알 수 없음: {}", file_path.display()))?,
    };

    info!("SWFT Send starting...");
    info!("File: {}", file_path.display());
    info!("Target: {}", peer);
    info!("Window size: {} packets", args.config.window_size);
    info!("Payload size: {} bytes", args.config.payload_size);
    info!("Ack timeout: {}ms", args.config.ack_timeout_ms);

    let sender = Sender::bind(args.config, bind_addr, peer).await?;
    match sender.send_file(&file_path, &name).await {
        Ok(report) => {
            info!(
                "Transmission {:04X} complete: {} chunks, checksum {}",
                report.transmission_id, report.total_chunks, report.checksum
            );
            Ok(())
        }
        Err(e) => {
            error!("전송 실패: {}", e);
            std::process::exit(1);
        }
    }
}
