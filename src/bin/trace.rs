// chattrace: stream-chat 실시간 이벤트 관찰 CLI
//
// 사용법:
//   chattrace [--host HOST] [--port PORT] [--filter KIND] [ROOM]
//
// 예시:
//   chattrace                            # 전체 이벤트 스트림
//   chattrace stream_42                  # stream_42 룸만
//   chattrace --filter rejected          # 거절 이벤트만 (전체 룸)
//   chattrace stream_42 -f message       # stream_42 + 채팅 메시지만

use chrono::{Local, TimeZone};
use clap::Parser;
use colored::Colorize;
use reqwest::blocking::Client;
use serde::Deserialize;
use std::io::{BufRead, BufReader};
use std::process::ExitCode;

// ----------------------------------------------------------------------------
// [CLI 인자]
// ----------------------------------------------------------------------------

#[derive(Parser)]
#[command(
    name    = "chattrace",
    about   = "stream-chat 실시간 채팅 이벤트 스트림 관찰",
    version,
)]
struct Cli {
    /// 서버 호스트
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// 서버 포트
    #[arg(long, default_value_t = 8080)]
    port: u16,

    /// 이벤트 종류 필터 (예: join, message, rejected, reaction)
    /// 대소문자 무관, 부분 일치
    #[arg(long, short = 'f')]
    filter: Option<String>,

    /// 관찰할 룸 (생략 시 전체)
    room: Option<String>,
}

// ----------------------------------------------------------------------------
// [TraceEvent 역직렬화] src/trace.rs 와 동일 구조
// ----------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct TraceEvent {
    ts:      u64,
    dir:     String, // "in" | "out" | "sys"
    room:    Option<String>,
    user_id: Option<String>,
    kind:    String,
    summary: String,
}

// ----------------------------------------------------------------------------
// [메인]
// ----------------------------------------------------------------------------

fn main() -> ExitCode {
    let cli = Cli::parse();

    let url = match &cli.room {
        Some(room) => format!("http://{}:{}/trace/{}", cli.host, cli.port, room),
        None       => format!("http://{}:{}/trace",    cli.host, cli.port),
    };

    let filter = cli.filter.as_ref().map(|s| s.to_lowercase());

    println!("{}", "─".repeat(90).dimmed());
    println!(
        "  {} {}  {}  {}",
        "chattrace".bold().cyan(),
        "▶".green(),
        url.dimmed(),
        filter.as_deref()
            .map(|f| format!("[filter: {}]", f).yellow().to_string())
            .unwrap_or_default(),
    );
    println!("{}", "─".repeat(90).dimmed());
    println!(
        "  {:<12} {:<6} {:<14} {:<18} {:<16} {}",
        "TIME".dimmed(),
        "DIR".dimmed(),
        "KIND".dimmed(),
        "USER".dimmed(),
        "ROOM".dimmed(),
        "SUMMARY".dimmed(),
    );
    println!("{}", "─".repeat(90).dimmed());

    // SSE 스트림 연결 (blocking, chunked read). 스트림이라 타임아웃 없음
    let client = match Client::builder().timeout(None).build() {
        Ok(c)  => c,
        Err(e) => {
            eprintln!("{} HTTP 클라이언트 생성 실패: {}", "✗".red(), e);
            return ExitCode::FAILURE;
        }
    };

    let resp = match client.get(&url).header("Accept", "text/event-stream").send() {
        Ok(r)  => r,
        Err(e) => {
            eprintln!("{} 서버 연결 실패: {}", "✗".red(), e);
            eprintln!("  서버가 실행 중인지 확인하세요: {}", url.dimmed());
            return ExitCode::FAILURE;
        }
    };

    if !resp.status().is_success() {
        eprintln!("{} HTTP {}", "✗".red(), resp.status());
        return ExitCode::FAILURE;
    }

    let mut event_count: u64 = 0;

    for line in BufReader::new(resp).lines() {
        let line = match line {
            Ok(l)  => l,
            Err(e) => {
                eprintln!("{} 스트림 읽기 실패: {}", "✗".red(), e);
                break;
            }
        };

        // "data: {JSON}" 만 처리. ": keep-alive" 주석과 빈 줄은 무시
        let Some(json_str) = line.strip_prefix("data: ") else { continue };

        let event: TraceEvent = match serde_json::from_str(json_str) {
            Ok(e)  => e,
            Err(e) => {
                eprintln!("{} JSON 파싱 실패: {} ({})", "⚠".yellow(), e, json_str);
                continue;
            }
        };

        // 클라이언트 측 kind 필터 (서버 SSE 룸 필터와 별도)
        if let Some(ref f) = filter {
            if !event.kind.to_lowercase().contains(f.as_str()) {
                continue;
            }
        }

        print_event(&event);
        event_count += 1;
    }

    println!("{}", "─".repeat(90).dimmed());
    println!("  스트림 종료 (총 {} 이벤트)", event_count);
    ExitCode::SUCCESS
}

// ----------------------------------------------------------------------------
// [이벤트 출력]
// ----------------------------------------------------------------------------

fn print_event(e: &TraceEvent) {
    let dir_str = match e.dir.as_str() {
        "in"  => "↓ C→S".bright_blue().to_string(),
        "out" => "↑ S→C".bright_green().to_string(),
        "sys" => "· SYS".bright_yellow().to_string(),
        other => other.dimmed().to_string(),
    };

    println!(
        "  {} {} {:<14} {} {:<16} {}",
        format_ts(e.ts).dimmed(),
        dir_str,
        colorize_kind(&e.kind),
        truncate(e.user_id.as_deref().unwrap_or("-"), 18).bright_white(),
        e.room.as_deref().unwrap_or("-").dimmed(),
        e.summary,
    );
}

fn colorize_kind(kind: &str) -> String {
    match kind {
        "rejected"                => kind.bright_red().bold().to_string(),
        "deactivate" | "activate" => kind.bright_magenta().bold().to_string(),
        "join" | "leave"          => kind.bright_cyan().to_string(),
        "reaction"                => kind.bright_yellow().to_string(),
        "viewer_count"            => kind.dimmed().to_string(),
        _                         => kind.normal().to_string(),
    }
}

/// Unix millis → 로컬 "HH:MM:SS.mmm"
fn format_ts(ts_ms: u64) -> String {
    match Local.timestamp_millis_opt(ts_ms as i64).single() {
        Some(dt) => dt.format("%H:%M:%S%.3f").to_string(),
        None     => "-".to_string(),
    }
}

/// 문자 단위로 자르고 폭 맞춤
fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        format!("{:<width$}", s, width = max)
    } else {
        let head: String = s.chars().take(max - 1).collect();
        format!("{}…", head)
    }
}
