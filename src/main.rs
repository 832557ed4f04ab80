mod app_state;
mod commands;
mod coordinator;
mod map;
mod model;
mod provider;
mod ui;

use chrono::Local;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::io;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::app_state::{App, AppEvent};
use crate::commands::AppCommand;
use crate::provider::{FieldProvider, MockProvider, RemoteProvider};
use crate::ui::draw;

const DEFAULT_REFRESH_SECS: u64 = 30;

#[tokio::main(flavor = "multi_thread")]
async fn main() -> io::Result<()> {
    let ts = Local::now().format("%Y%m%d-%H%M%S").to_string();
    let log_dir = std::path::PathBuf::from("logs");
    std::fs::create_dir_all(&log_dir)?;
    let log_path = log_dir.join(format!("app-{}.log", ts));
    let log_file = std::fs::File::create(log_path)?;
    env_logger::Builder::from_default_env()
        .target(env_logger::Target::Pipe(Box::new(log_file))) // 核心：重定向输出到文件
        .filter_level(log::LevelFilter::Warn)
        .filter_module("olivemap", log::LevelFilter::Info)
        .filter_module("reqwest", log::LevelFilter::Error)
        .init();

    // 加载环境变量
    let mut startup_info = Vec::new();

    // 获取当前工作目录
    let current_dir = std::env::current_dir().unwrap_or_else(|_| std::path::PathBuf::from("."));
    startup_info.push(format!("当前工作目录: {}", current_dir.display()));

    // 检查 .env 文件是否存在
    let env_path = current_dir.join(".env");
    let env_exists = env_path.exists();

    // 尝试加载 .env 文件（直接手动解析，避免递归栈问题）
    let env_loaded = if env_exists {
        if let Ok(content) = std::fs::read_to_string(&env_path) {
            startup_info.push(format!("✓ 读取 .env 文件: {}", env_path.display()));
            let mut loaded = false;
            for line in content.lines() {
                let line = line.trim();
                if line.is_empty() || line.starts_with('#') {
                    continue;
                }
                if let Some(equal_pos) = line.find('=') {
                    let key = line[..equal_pos].trim();
                    let value = line[equal_pos + 1..].trim();
                    let value = value.trim_matches(|c| c == '"' || c == '\'');
                    std::env::set_var(key, value);
                    loaded = true;
                }
            }
            loaded
        } else {
            startup_info.push("⚠ 无法读取 .env 文件".to_string());
            false
        }
    } else {
        startup_info.push(format!("⚠ 未找到 .env 文件: {}", env_path.display()));
        false
    };

    if !env_loaded {
        startup_info.push("⚠ 尝试从系统环境变量读取".to_string());
    }

    // 数据源：配置了远程接口就用它，模拟数据始终作为兜底
    let fallback: Arc<dyn FieldProvider> = Arc::new(MockProvider::new());
    let primary: Arc<dyn FieldProvider> = match RemoteProvider::from_env() {
        Ok(remote) => {
            startup_info.push(format!("✓ 远程数据源: {}", remote));
            Arc::new(remote)
        }
        Err(_) => {
            startup_info.push("⚠ 未配置 OLIVEMAP_DATA_URL，使用模拟数据".to_string());
            Arc::clone(&fallback)
        }
    };

    let refresh_secs = std::env::var("OLIVEMAP_REFRESH_SECS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .filter(|&v| v > 0)
        .unwrap_or(DEFAULT_REFRESH_SECS);
    startup_info.push(format!("刷新周期: {} 秒", refresh_secs));

    // 创建核心 Channel (使用 AppCommand)
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<AppCommand>();
    let (evt_tx, evt_rx) = mpsc::unbounded_channel::<AppEvent>();

    // 启动单后台任务模型 (Actor)
    tokio::spawn(coordinator::run(
        primary,
        fallback,
        cmd_rx,
        evt_tx,
        refresh_secs,
    ));

    // TUI 初始化
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // 创建 App 状态
    let mut app = App::new(startup_info, cmd_tx, evt_rx);

    // 主循环
    let rx = match app.evt_rx.take() {
        Some(rx) => rx,
        None => unreachable!("evt_rx 在 new 之后必然存在"),
    };
    let res = run_app_loop(&mut terminal, &mut app, rx).await;

    // 恢复终端
    app.map.teardown();
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    res
}

async fn run_app_loop<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    mut evt_rx: mpsc::UnboundedReceiver<AppEvent>,
) -> io::Result<()> {
    loop {
        terminal.draw(|f| draw(f, app))?;

        while let Ok(event) = evt_rx.try_recv() {
            match event {
                AppEvent::Log(msg) => app.add_log(msg),
                AppEvent::Message(msg) => app.add_log(msg),
                AppEvent::Error(msg) => app.add_log(msg),
                AppEvent::Snapshot(snapshot) => app.apply_snapshot(snapshot),
            }
        }

        if event::poll(std::time::Duration::from_millis(100))? {
            match event::read()? {
                Event::Key(key) => {
                    if key.kind == KeyEventKind::Press {
                        if app.handle_key_event(key.code) {
                            return Ok(());
                        }
                    }
                }
                Event::Mouse(mouse) => app.handle_mouse(mouse),
                _ => {}
            }
        }
    }
}
