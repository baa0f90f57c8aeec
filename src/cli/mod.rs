//! CLI 모듈
//!
//! campus-query CLI 명령어 정의 및 구현

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use crate::chat::CampusQueryEngine;
use crate::collector::{derive_document_id, CollectionStats, CollectorConfig, FileCollector};
use crate::config::{ChatBackend, EngineConfig};
use crate::embedding::has_api_key;
use crate::extractor::{Document, MediaType};
use crate::knowledge::{LanceVectorIndex, VectorIndex};

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Parser)]
#[command(name = "campus-query")]
#[command(version, about = "문서 기반 학생 질의응답 RAG 엔진", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 파일, 폴더, 또는 텍스트를 인덱스에 추가
    Ingest {
        /// 직접 입력할 텍스트
        #[arg(short, long)]
        text: Option<String>,

        /// 수집할 파일 경로 (pdf, txt, md)
        #[arg(long)]
        file: Option<PathBuf>,

        /// 수집할 폴더 경로 (재귀)
        #[arg(short, long)]
        dir: Option<PathBuf>,

        /// 문서 ID (기본: 내용의 SHA-256에서 생성)
        #[arg(long)]
        id: Option<String>,

        /// PDF 파일 건너뛰기
        #[arg(long)]
        skip_pdfs: bool,
    },

    /// 질문 한 번 하기
    Ask {
        /// 질문
        question: String,

        /// 세션 ID
        #[arg(short, long, default_value = "cli")]
        session: String,
    },

    /// 대화형 세션 (기록 유지)
    Chat {
        /// 세션 ID (기본: 새 UUID)
        #[arg(short, long)]
        session: Option<String>,
    },

    /// 상태 확인
    Status,
}

// ============================================================================
// CLI Runner
// ============================================================================

/// CLI 명령어 실행
pub async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Ingest {
            text,
            file,
            dir,
            id,
            skip_pdfs,
        } => cmd_ingest(text, file, dir, id, skip_pdfs).await,
        Commands::Ask { question, session } => cmd_ask(&question, &session).await,
        Commands::Chat { session } => cmd_chat(session).await,
        Commands::Status => cmd_status().await,
    }
}

/// API 키 확인 후 엔진 생성
async fn open_engine() -> Result<CampusQueryEngine> {
    let config = EngineConfig::from_env().context("설정 로드 실패")?;

    if !has_api_key() {
        bail!(
            "API 키가 설정되지 않았습니다.\n\n\
             설정 방법:\n  \
             export GEMINI_API_KEY=your-api-key\n  \
             또는\n  \
             export GOOGLE_AI_API_KEY=your-api-key\n\n\
             API 키 발급: https://aistudio.google.com/app/apikey"
        );
    }

    CampusQueryEngine::from_config(&config)
        .await
        .context("엔진 초기화 실패")
}

// ============================================================================
// Command Implementations
// ============================================================================

/// 문서 수집 명령어 (ingest)
async fn cmd_ingest(
    text: Option<String>,
    file: Option<PathBuf>,
    dir: Option<PathBuf>,
    id: Option<String>,
    skip_pdfs: bool,
) -> Result<()> {
    if file.is_some() || dir.is_some() {
        return cmd_ingest_files(file, dir, id, skip_pdfs).await;
    }

    let Some(text) = text else {
        bail!("--text, --file, --dir 중 하나를 지정해야 합니다");
    };

    let engine = open_engine().await?;
    let document_id = id.unwrap_or_else(|| derive_document_id(text.as_bytes()));

    println!("[*] 문서 임베딩 및 인덱싱 중...");
    let report = engine
        .ingest(&document_id, &Document::text(text))
        .await
        .context("문서 추가 실패")?;

    println!(
        "[OK] 문서가 추가되었습니다 (ID: {}, 청크: {}, 상태: {})",
        report.document_id,
        report.chunk_count,
        report.file_status()
    );

    Ok(())
}

/// 파일/폴더 수집 명령어
async fn cmd_ingest_files(
    file: Option<PathBuf>,
    dir: Option<PathBuf>,
    id: Option<String>,
    skip_pdfs: bool,
) -> Result<()> {
    let collector = FileCollector::new(CollectorConfig {
        skip_pdfs,
        ..Default::default()
    });

    let files = if let Some(ref file_path) = file {
        match collector.collect_file(file_path)? {
            Some(f) => vec![f],
            None => {
                println!("[!] 지원하지 않는 파일 형식이거나 크기 제한 초과: {:?}", file_path);
                return Ok(());
            }
        }
    } else if let Some(ref dir_path) = dir {
        if id.is_some() {
            bail!("--id는 --file 또는 --text와 함께만 사용할 수 있습니다");
        }
        collector.collect_directory(dir_path)?
    } else {
        bail!("--file 또는 --dir를 지정해야 합니다");
    };

    if files.is_empty() {
        println!("[!] 수집할 파일이 없습니다.");
        return Ok(());
    }

    let stats = CollectionStats::from_files(&files);
    println!("[*] 수집 대상: {} 파일", stats.total_files);
    println!("    텍스트: {}, PDF: {}", stats.text_files, stats.pdf_files);
    println!("    총 크기: {}", format_bytes(stats.total_size as usize));
    println!();

    let engine = open_engine().await?;

    let mut success_count = 0;
    let mut error_count = 0;

    for (i, collected_file) in files.iter().enumerate() {
        let type_str = match collected_file.media_type {
            MediaType::Pdf => "PDF",
            MediaType::Markdown => "MD",
            _ => "TXT",
        };

        print!(
            "[{}/{}] [{}] {}... ",
            i + 1,
            files.len(),
            type_str,
            collected_file.file_name()
        );

        let document = match collected_file.load().await {
            Ok(d) => d,
            Err(e) => {
                println!("실패: {}", e);
                error_count += 1;
                continue;
            }
        };

        let document_id = id
            .clone()
            .unwrap_or_else(|| derive_document_id(&document.bytes));

        match engine.ingest(&document_id, &document).await {
            Ok(report) => {
                println!("완료 ({}, 청크 {})", report.document_id, report.chunk_count);
                success_count += 1;
            }
            Err(e) => {
                println!("실패: {}", e);
                error_count += 1;
            }
        }
    }

    println!();
    println!("[OK] 완료: 성공 {}, 실패 {}", success_count, error_count);

    Ok(())
}

/// 질문 명령어 (ask)
async fn cmd_ask(question: &str, session: &str) -> Result<()> {
    let engine = open_engine().await?;

    let answer = engine
        .answer(question, session)
        .await
        .context("답변 생성 실패")?;

    println!("{}", answer);
    Ok(())
}

/// 대화형 명령어 (chat)
///
/// 빈 줄은 무시하고, `exit` / `quit` 또는 EOF에서 종료합니다.
async fn cmd_chat(session: Option<String>) -> Result<()> {
    let engine = open_engine().await?;
    let session_id = session.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    println!("[*] 세션: {} (종료: exit)", session_id);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    loop {
        stdout.write_all(b"\n> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let question = line.trim();

        if question.is_empty() {
            continue;
        }
        if matches!(question, "exit" | "quit") {
            break;
        }

        match engine.answer(question, &session_id).await {
            Ok(answer) => println!("{}", answer),
            Err(e) => println!("[!] 오류: {}", e),
        }
    }

    let turns = engine.sessions().get(&session_id).await.len();
    println!("[OK] 세션 종료 ({} 턴)", turns);
    Ok(())
}

/// 상태 명령어 (status)
async fn cmd_status() -> Result<()> {
    println!("campus-query v{}", env!("CARGO_PKG_VERSION"));
    println!();

    let config = EngineConfig::from_env().context("설정 로드 실패")?;

    println!("[*] 데이터 디렉토리: {}", config.data_dir.display());
    println!(
        "[*] 임베딩 모델: {} ({}차원)",
        config.embedding_model, config.embedding_dimension
    );
    let backend = match config.chat_backend {
        ChatBackend::Gemini => "gemini",
        ChatBackend::OpenAi => "openai",
    };
    println!(
        "[*] 채팅 백엔드: {} (재작성: {}, 생성: {})",
        backend, config.rewrite.model, config.generate.model
    );

    if has_api_key() {
        println!("[OK] API 키: 설정됨");
    } else {
        println!("[!] API 키: 미설정");
        println!("    설정: export GEMINI_API_KEY=your-key");
    }

    match LanceVectorIndex::open(&config.lance_path(), &config.index_name, config.embedding_dimension).await {
        Ok(index) => match index.count().await {
            Ok(count) => println!("[OK] 벡터 인덱스 '{}': {} 청크", config.index_name, count),
            Err(e) => println!("[!] 인덱스 통계 조회 실패: {}", e),
        },
        Err(e) => println!("[!] 벡터 인덱스 열기 실패: {}", e),
    }

    Ok(())
}

// ============================================================================
// Helper Functions
// ============================================================================

/// 바이트 크기 포맷팅
fn format_bytes(bytes: usize) -> String {
    const KB: usize = 1024;
    const MB: usize = KB * 1024;

    if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

// ============================================================================
// Tests
// ============================================================================
