// chatadmin: stream-chat 운영 관리 CLI
//
// 사용법:
//   chatadmin [--host HOST] [--port PORT] <COMMAND>
//
// 조회 명령
//   chatadmin status              서버 상태 요약 (uptime, 커넥션, 영속화 큐)
//   chatadmin rooms               룸 전체 테이블 (시청자 수 포함)
//   chatadmin rooms <room>        룸 상세
//
// 조작 명령
//   chatadmin deactivate <room>   채팅 OFF (신규 입장 차단)
//   chatadmin activate <room>     채팅 ON

use chrono::{TimeZone, Utc};
use clap::{Parser, Subcommand};
use colored::Colorize;
use serde::Deserialize;
use tabled::{Table, Tabled};

type CmdResult = Result<(), Box<dyn std::error::Error>>;

// ----------------------------------------------------------------------------
// [CLI 정의]
// ----------------------------------------------------------------------------

#[derive(Parser)]
#[command(
    name    = "chatadmin",
    about   = "stream-chat 운영 관리 CLI",
    version,
)]
struct Cli {
    /// 서버 호스트
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// 서버 포트 (WS/HTTP 공용)
    #[arg(long, default_value_t = 8080)]
    port: u16,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// 서버 상태 요약
    Status,

    /// 룸 목록 또는 상세
    Rooms {
        /// 룸 이름 지정 시 상세 보기
        room: Option<String>,
    },

    /// 채팅 OFF
    Deactivate {
        room: String,
    },

    /// 채팅 ON
    Activate {
        room: String,
    },
}

// ----------------------------------------------------------------------------
// [응답 타입] http/dto.rs 와 대응
// ----------------------------------------------------------------------------

#[derive(Deserialize)]
struct ServerStatus {
    uptime_secs:       u64,
    connection_count:  usize,
    room_count:        usize,
    member_count:      usize,
    topic_count:       usize,
    banned_word_count: usize,
    timeout_count:     usize,
    moderation_loaded_at: u64,
    persist_workers:   usize,
    persist_enqueued:  u64,
    persist_completed: u64,
    persist_failed:    u64,
    persist_dropped:   u64,
}

#[derive(Deserialize)]
struct AdminRoomSummary {
    room:         String,
    stream_id:    Option<String>,
    member_count: usize,
    is_active:    bool,
    created_at:   u64,
    viewer_count: Option<u64>,
    peak_viewers: Option<u64>,
}

// 컬러 렌더링용 표시 타입
#[derive(Tabled)]
struct RoomRow {
    #[tabled(rename = "ROOM")]
    room:    String,
    #[tabled(rename = "STREAM")]
    stream:  String,
    #[tabled(rename = "MEMBERS")]
    members: usize,
    #[tabled(rename = "VIEWERS")]
    viewers: String,
    #[tabled(rename = "PEAK")]
    peak:    String,
    #[tabled(rename = "CHAT")]
    chat:    String,
}

impl From<&AdminRoomSummary> for RoomRow {
    fn from(r: &AdminRoomSummary) -> Self {
        Self {
            room:    r.room.clone(),
            stream:  r.stream_id.clone().unwrap_or_else(|| "-".to_string()),
            members: r.member_count,
            viewers: opt_count(r.viewer_count),
            peak:    opt_count(r.peak_viewers),
            chat:    active_label(r.is_active),
        }
    }
}

#[derive(Deserialize)]
struct RoomToggleResult {
    room:       String,
    was_active: bool,
    is_active:  bool,
}

// ----------------------------------------------------------------------------
// [main]
// ----------------------------------------------------------------------------

fn main() {
    let cli  = Cli::parse();
    let base = format!("http://{}:{}", cli.host, cli.port);

    let result = match &cli.command {
        Command::Status                   => cmd_status(&base),
        Command::Rooms { room: None }     => cmd_rooms(&base),
        Command::Rooms { room: Some(r) }  => cmd_room_detail(&base, r),
        Command::Deactivate { room }      => cmd_toggle(&base, room, "deactivate"),
        Command::Activate { room }        => cmd_toggle(&base, room, "activate"),
    };

    if let Err(e) = result {
        eprintln!("{} {}", "ERROR:".red().bold(), e);
        std::process::exit(1);
    }
}

// ----------------------------------------------------------------------------
// [커맨드 구현]
// ----------------------------------------------------------------------------

fn cmd_status(base: &str) -> CmdResult {
    let s: ServerStatus = get_json(&format!("{}/admin/status", base))?;

    let hours   = s.uptime_secs / 3600;
    let minutes = (s.uptime_secs % 3600) / 60;
    let secs    = s.uptime_secs % 60;

    println!();
    println!("{}", "  stream-chat Server Status".bold().cyan());
    println!("  {}", "─".repeat(36).dimmed());
    println!("  {:18} {}", "Uptime:".bold(), format!("{}h {}m {}s", hours, minutes, secs).green());
    println!("  {:18} {}", "Connections:".bold(), s.connection_count.to_string().yellow());
    println!("  {:18} {}", "Rooms:".bold(),       s.room_count.to_string().yellow());
    println!("  {:18} {}", "Members:".bold(),     s.member_count.to_string().yellow());
    println!("  {:18} {}", "Bus Topics:".bold(),  s.topic_count);
    println!(
        "  {:18} {} word(s), {} timeout(s), loaded {}",
        "Moderation:".bold(),
        s.banned_word_count,
        s.timeout_count,
        format_ts(s.moderation_loaded_at).dimmed(),
    );
    println!(
        "  {:18} {} worker(s), {} queued / {} done / {} failed / {} dropped",
        "Persist:".bold(),
        s.persist_workers,
        s.persist_enqueued,
        s.persist_completed,
        highlight_nonzero(s.persist_failed),
        highlight_nonzero(s.persist_dropped),
    );
    println!();
    Ok(())
}

fn cmd_rooms(base: &str) -> CmdResult {
    let rooms: Vec<AdminRoomSummary> = get_json(&format!("{}/admin/rooms", base))?;

    if rooms.is_empty() {
        println!("{}", "  룸 없음".dimmed());
        return Ok(());
    }

    let rows: Vec<RoomRow> = rooms.iter().map(RoomRow::from).collect();

    println!();
    println!("{}", Table::new(&rows));
    println!("  {} room(s)", rooms.len());
    println!();
    Ok(())
}

fn cmd_room_detail(base: &str, room: &str) -> CmdResult {
    let r: AdminRoomSummary = get_json(&format!("{}/admin/rooms/{}", base, room))?;

    println!();
    println!("{}", format!("  Room: {}", r.room).bold().cyan());
    println!("  {}", "─".repeat(36).dimmed());
    println!("  {:16} {}", "Stream:".bold(),  r.stream_id.as_deref().unwrap_or("(generic)"));
    println!("  {:16} {}", "Chat:".bold(),    active_label(r.is_active));
    println!("  {:16} {}", "Members:".bold(), r.member_count.to_string().yellow());
    if r.stream_id.is_some() {
        println!("  {:16} {} (peak {})", "Viewers:".bold(), opt_count(r.viewer_count), opt_count(r.peak_viewers));
    }
    println!("  {:16} {}", "Created:".bold(), format_ts(r.created_at));
    println!();
    Ok(())
}

fn cmd_toggle(base: &str, room: &str, action: &str) -> CmdResult {
    let client = reqwest::blocking::Client::new();
    let url    = format!("{}/admin/rooms/{}/{}", base, room, action);
    let resp   = client.post(&url).send()?;

    let status = resp.status();
    if !status.is_success() {
        let body: serde_json::Value = resp.json().unwrap_or_default();
        let msg = body["error"].as_str().unwrap_or("unknown error");
        return Err(format!("[{}] {}", status, msg).into());
    }

    let result: RoomToggleResult = resp.json()?;
    println!();
    println!(
        "  {} room={} chat: {} → {}",
        format!("{} OK", action).green().bold(),
        result.room.yellow(),
        active_label(result.was_active),
        active_label(result.is_active),
    );
    println!();
    Ok(())
}

// ----------------------------------------------------------------------------
// [공통 유틸]
// ----------------------------------------------------------------------------

/// GET 요청 + JSON 역직렬화
fn get_json<T: for<'de> Deserialize<'de>>(url: &str) -> Result<T, Box<dyn std::error::Error>> {
    let resp = reqwest::blocking::get(url)?;
    let status = resp.status();
    if !status.is_success() {
        let body: serde_json::Value = resp.json().unwrap_or_default();
        let msg = body["error"].as_str().unwrap_or("unknown error");
        return Err(format!("[{}] {}", status, msg).into());
    }
    Ok(resp.json()?)
}

fn active_label(active: bool) -> String {
    if active {
        "● on".green().to_string()
    } else {
        "○ off".red().to_string()
    }
}

fn opt_count(v: Option<u64>) -> String {
    v.map_or_else(|| "-".to_string(), |n| n.to_string())
}

fn highlight_nonzero(n: u64) -> String {
    if n > 0 { n.to_string().red().bold().to_string() } else { n.to_string().dimmed().to_string() }
}

/// Unix millis → "YYYY-MM-DD HH:MM:SS UTC"
fn format_ts(ms: u64) -> String {
    match Utc.timestamp_millis_opt(ms as i64).single() {
        Some(dt) if ms > 0 => dt.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        _ => "-".to_string(),
    }
}
