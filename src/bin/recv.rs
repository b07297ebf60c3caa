//! SWFT 수신기 - Sliding Window File Transfer
//!
//! 파일 하나를 수신하고 MD5로 무결성 검증
//!
//! 사용법:
//!   cargo run --release --bin swft-recv -- [OPTIONS]
//!
//! 예시:
//!   # 9000번 포트에서 수신, 현재 디렉터리에 저장
//!   cargo run --release --bin swft-recv -- --bind 0.0.0.0:9000
//!
//!   # 지정한 경로로 저장
//!   cargo run --release --bin swft-recv -- -b 0.0.0.0:9000 --output received.bin

use std::net::SocketAddr;
use std::path::PathBuf;

use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use swft::{Config, Receiver};

/// 수신기 설정
struct RecvArgs {
    bind_addr: SocketAddr,
    out_dir: PathBuf,
    output_path: Option<PathBuf>,
    config: Config,
}

impl Default for RecvArgs {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0u8; 4], 9000)),
            out_dir: PathBuf::from("."),
            output_path: None,
            config: Config::default(),
        }
    }
}

fn parse_args() -> RecvArgs {
    let args: Vec<String> = std::env::args().collect();
    let mut parsed = RecvArgs::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--bind" | "-b" => {
                if i + 1 < args.len() {
                    parsed.bind_addr = args[i + 1].parse().expect("유효한 주소 필요");
                    i += 1;
                }
            }
            "--out" | "-d" => {
                if i + 1 < args.len() {
                    parsed.out_dir = PathBuf::from(&args[i + 1]);
                    i += 1;
                }
            }
            "--output" | "-o" => {
                if i + 1 < args.len() {
                    parsed.output_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--deadline-ms" => {
                if i + 1 < args.len() {
                    parsed.config.handshake_deadline_ms =
                        args[i + 1].parse().expect("유효한 숫자 필요");
                    i += 1;
                }
            }
            "--idle-ms" => {
                if i + 1 < args.len() {
                    parsed.config.idle_timeout_ms = args[i + 1].parse().expect("유효한 숫자 필요");
                    i += 1;
                }
            }
            "--payload" => {
                if i + 1 < args.len() {
                    parsed.config.payload_size = args[i + 1].parse().expect("유효한 숫자 필요");
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!(
                    r#"SWFT Recv - Sliding Window File Transfer 수신기

파일 하나를 수신하여 저장하고 MD5 체크섬으로 무결성 검증

사용법:
  cargo run --release --bin swft-recv -- [OPTIONS]

옵션:
  -b, --bind <ADDR>       바인드 주소 (기본: 0.0.0.0:9000)
  -d, --out <DIR>         저장 디렉터리, 송신자가 알린 파일 이름 사용 (기본: .)
  -o, --output <PATH>     저장 경로 (지정 시 --out 무시)
  --deadline-ms <MS>      핸드쉐이크 대기 시간 (기본: 10000)
  --idle-ms <MS>          전송 중 최대 무응답 시간 (기본: 30000)
  --payload <SIZE>        청크 페이로드 크기 바이트 (기본: 1024, 송신측과 동일해야 함)
  -h, --help              이 도움말 출력

예시:
  cargo run --release --bin swft-recv -- --bind 0.0.0.0:9000 --out downloads
  cargo run --release --bin swft-recv -- -b 127.0.0.1:9000 -o received.bin
"#
                );
                std::process::exit(0);
            }
            _ => {}
        }
        i += 1;
    }

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

    info!("SWFT Recv starting...");
    info!("Bind address: {}", args.bind_addr);
    info!("Handshake deadline: {}ms", args.config.handshake_deadline_ms);

    let receiver = Receiver::bind(args.config, args.bind_addr).await?;
    let result = match &args.output_path {
        Some(path) => receiver.receive_to(path).await,
        None => receiver.receive_file(&args.out_dir).await,
    };

    let outcome = match result {
        Ok(outcome) => outcome,
        Err(e) => {
            error!("수신 실패: {}", e);
            std::process::exit(1);
        }
    };

    info!(
        "Saved {} ({} bytes) from {}",
        outcome.path.display(),
        outcome.bytes_written,
        outcome.session.peer
    );

    // 검증 실패해도 파일은 남겨둠
    if let Err(e) = outcome.verification.ensure() {
        error!("{}", e);
        std::process::exit(2);
    }

    Ok(())
}
