use crate::commands::AppCommand;
use crate::coordinator::DashboardSnapshot;
use crate::map::canvas::{CanvasState, CanvasSurface};
use crate::map::controller::MapController;
use crate::model::{Field, HealthStatus, LatLng};
use crossterm::event::{KeyCode, MouseButton, MouseEvent, MouseEventKind};
use ratatui::layout::Rect;
use ratatui::widgets::ListState;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

#[derive(PartialEq, Debug, Clone)]
pub enum ViewMode {
    Map,
    FieldList,
    Detail,
    Insights,
}

#[derive(PartialEq, Debug, Clone)]
pub enum InputMode {
    Normal,
    Command,
}

#[derive(PartialEq, Debug, Clone)]
pub enum FocusArea {
    Menu,     // 焦点在左侧菜单
    MainView, // 焦点在主视图
}

#[derive(Debug)]
pub enum AppEvent {
    Log(String),
    Message(String),
    Error(String),
    Snapshot(DashboardSnapshot),
}

pub struct App {
    pub view_mode: ViewMode,
    pub input_mode: InputMode,
    pub focus_area: FocusArea,
    pub menu_selected_index: usize,
    pub snapshot: DashboardSnapshot,
    pub field_list_state: ListState,
    pub filter_status: Option<HealthStatus>,
    pub detail_scroll: u16,
    pub command_input: String,
    pub command_cursor: usize,
    pub command_history: Vec<String>,
    pub command_history_index: Option<usize>,
    pub log_messages: Vec<String>,
    pub map: MapController,
    pub canvas_state: Arc<Mutex<CanvasState>>,
    pub map_area: Option<Rect>,
    map_fitted: bool,
    pub cmd_tx: mpsc::UnboundedSender<AppCommand>,
    pub evt_rx: Option<mpsc::UnboundedReceiver<AppEvent>>, // Option 以便主循环把它取出来
}

impl App {
    pub fn new(
        startup_info: Vec<String>,
        cmd_tx: mpsc::UnboundedSender<AppCommand>,
        evt_rx: mpsc::UnboundedReceiver<AppEvent>,
    ) -> App {
        let mut log_messages = vec!["应用已启动".to_string()];
        log_messages.extend(startup_info);

        let (surface, canvas_state) = CanvasSurface::new();
        let mut map = MapController::new();
        map.initialize(Box::new(surface));
        // 地图点击不直接改选中，统一走协调器
        let select_tx = cmd_tx.clone();
        map.set_on_select(move |id: &str| {
            let _ = select_tx.send(AppCommand::Select { id: id.to_string() });
        });

        App {
            view_mode: ViewMode::Map,
            input_mode: InputMode::Normal,
            focus_area: FocusArea::Menu,
            menu_selected_index: 0,
            snapshot: DashboardSnapshot::default(),
            field_list_state: {
                let mut s = ListState::default();
                s.select(Some(0));
                s
            },
            filter_status: None,
            detail_scroll: 0,
            command_input: String::new(),
            command_cursor: 0,
            command_history: Vec::new(),
            command_history_index: None,
            log_messages,
            map,
            canvas_state,
            map_area: None,
            map_fitted: false,
            cmd_tx,
            evt_rx: Some(evt_rx),
        }
    }

    pub fn add_log(&mut self, msg: String) {
        self.log_messages.push(msg);
    }

    /// 新快照落地：同步地图图层，并把列表光标对齐到选中项。
    pub fn apply_snapshot(&mut self, snapshot: DashboardSnapshot) {
        self.map
            .reconcile(&snapshot.fields, snapshot.selected.as_deref());
        if !self.map_fitted && !snapshot.fields.is_empty() {
            self.map.fit_all(&snapshot.fields);
            self.map_fitted = true;
        }
        self.snapshot = snapshot;

        let idx = self.selected_list_index().unwrap_or(0);
        self.field_list_state.select(Some(idx));
    }

    /// 经过状态过滤后展示给列表的田块
    pub fn visible_fields(&self) -> Vec<&Field> {
        self.snapshot
            .fields
            .iter()
            .filter(|f| match self.filter_status {
                Some(status) => f.health_status == status,
                None => true,
            })
            .collect()
    }

    pub fn selected_field(&self) -> Option<&Field> {
        let id = self.snapshot.selected.as_deref()?;
        self.snapshot.fields.iter().find(|f| f.id == id)
    }

    fn selected_list_index(&self) -> Option<usize> {
        let id = self.snapshot.selected.as_deref()?;
        self.visible_fields().iter().position(|f| f.id == id)
    }

    /// 列表导航：选中相邻田块。本地不改状态，发命令给协调器。
    fn select_adjacent(&mut self, delta: isize) {
        let visible = self.visible_fields();
        if visible.is_empty() {
            return;
        }
        let cur = self.selected_list_index().unwrap_or(0) as isize;
        let next = (cur + delta).clamp(0, visible.len() as isize - 1) as usize;
        let id = visible[next].id.clone();
        let _ = self.cmd_tx.send(AppCommand::Select { id });
    }

    /// 获取当前的预测建议
    pub fn get_completion_hint(&self) -> Option<String> {
        let commands = vec!["select", "refresh", "interval", "mock", "help", "quit"];
        let input = self.command_input.trim();

        if input.is_empty() {
            return None;
        }

        let parts: Vec<&str> = input.split_whitespace().collect();
        if parts.len() == 1 && !self.command_input.ends_with(' ') {
            for cmd in commands {
                if cmd.starts_with(parts[0]) && cmd != parts[0] {
                    return Some(cmd[parts[0].len()..].to_string());
                }
            }
            return None;
        }
        match parts[0] {
            "select" => {
                let cur = parts.get(1).copied().unwrap_or("");
                for f in &self.snapshot.fields {
                    if f.id.starts_with(cur) && f.id != cur {
                        return Some(f.id[cur.len()..].to_string());
                    }
                }
            }
            "mock" => {
                let cur = parts.get(1).copied().unwrap_or("");
                for s in ["on", "off"] {
                    if s.starts_with(cur) && s != cur {
                        return Some(s[cur.len()..].to_string());
                    }
                }
            }
            _ => {}
        }
        None
    }

    /// 终端格子坐标 → 地理坐标。列/行按视野线性映射，行向下纬度递减。
    fn cell_to_latlng(&self, column: u16, row: u16) -> Option<LatLng> {
        let area = self.map_area?;
        if !area.contains(ratatui::layout::Position { x: column, y: row }) {
            return None;
        }
        let viewport = {
            let guard = self.canvas_state.lock().unwrap_or_else(|e| e.into_inner());
            guard.viewport
        };
        let fx = (column - area.x) as f64 / area.width.max(1) as f64;
        let fy = (row - area.y) as f64 / area.height.max(1) as f64;
        let lng = viewport.west + fx * (viewport.east - viewport.west);
        let lat = viewport.north - fy * (viewport.north - viewport.south);
        Some(LatLng::new(lat, lng))
    }

    fn hit_tolerance(&self) -> f64 {
        let guard = self.canvas_state.lock().unwrap_or_else(|e| e.into_inner());
        let span = (guard.viewport.east - guard.viewport.west)
            .max(guard.viewport.north - guard.viewport.south);
        span * 0.02
    }

    pub fn handle_mouse(&mut self, ev: MouseEvent) {
        if self.view_mode != ViewMode::Map {
            return;
        }
        match ev.kind {
            MouseEventKind::Moved => {
                if let Some(p) = self.cell_to_latlng(ev.column, ev.row) {
                    let tol = self.hit_tolerance();
                    let hit = self.map.hit_test(p, tol);
                    self.map.set_hover(hit.as_deref());
                } else {
                    self.map.set_hover(None);
                }
            }
            MouseEventKind::Down(MouseButton::Left) => {
                if let Some(p) = self.cell_to_latlng(ev.column, ev.row) {
                    let tol = self.hit_tolerance();
                    self.map.click_at(p, tol);
                }
            }
            _ => {}
        }
    }

    pub fn handle_key_event(&mut self, key: KeyCode) -> bool {
        if self.input_mode == InputMode::Command {
            match key {
                KeyCode::Enter => {
                    let cmd_owned = self.command_input.trim().to_string();
                    self.command_input.clear();
                    self.command_cursor = 0;
                    self.input_mode = InputMode::Normal;
                    if cmd_owned.is_empty() {
                        return false;
                    }

                    if let Ok(app_cmd) = AppCommand::from_str(&cmd_owned) {
                        let quit = app_cmd == AppCommand::Quit;
                        let _ = self.cmd_tx.send(app_cmd);
                        if quit {
                            return true;
                        }
                    }
                    self.command_history.push(cmd_owned);
                    self.command_history_index = None;
                    return false;
                }
                KeyCode::Esc => {
                    self.command_input.clear();
                    self.command_cursor = 0;
                    self.input_mode = InputMode::Normal;
                    return false;
                }
                KeyCode::Tab => {
                    if let Some(hint) = self.get_completion_hint() {
                        let insert = format!("{} ", hint);
                        self.command_input.insert_str(self.command_cursor, &insert);
                        self.command_cursor += insert.len();
                    }
                    return false;
                }
                KeyCode::Up => {
                    if self.command_history.is_empty() {
                        return false;
                    }
                    let next = match self.command_history_index {
                        None => self.command_history.len().saturating_sub(1),
                        Some(i) => i.saturating_sub(1),
                    };
                    self.command_history_index = Some(next);
                    if let Some(cmd) = self.command_history.get(next) {
                        self.command_input = cmd.clone();
                        self.command_cursor = self.command_input.len();
                    }
                    return false;
                }
                KeyCode::Down => {
                    if self.command_history.is_empty() {
                        return false;
                    }
                    let next = match self.command_history_index {
                        None => return false,
                        Some(i) => {
                            let n = i + 1;
                            if n >= self.command_history.len() {
                                self.command_history_index = None;
                                self.command_input.clear();
                                self.command_cursor = 0;
                                return false;
                            }
                            n
                        }
                    };
                    self.command_history_index = Some(next);
                    if let Some(cmd) = self.command_history.get(next) {
                        self.command_input = cmd.clone();
                        self.command_cursor = self.command_input.len();
                    }
                    return false;
                }
                KeyCode::Backspace => {
                    if self.command_cursor > 0 && !self.command_input.is_empty() {
                        let idx = self.command_cursor - 1;
                        self.command_input.remove(idx);
                        self.command_cursor = self.command_cursor.saturating_sub(1);
                    }
                    return false;
                }
                KeyCode::Delete => {
                    if self.command_cursor < self.command_input.len() {
                        self.command_input.remove(self.command_cursor);
                    }
                    return false;
                }
                KeyCode::Left => {
                    if self.command_cursor > 0 {
                        self.command_cursor -= 1;
                    }
                    return false;
                }
                KeyCode::Right => {
                    if self.command_cursor < self.command_input.len() {
                        self.command_cursor += 1;
                    }
                    return false;
                }
                KeyCode::Home => {
                    self.command_cursor = 0;
                    return false;
                }
                KeyCode::End => {
                    self.command_cursor = self.command_input.len();
                    return false;
                }
                KeyCode::Char(c) => {
                    self.command_input.insert(self.command_cursor, c);
                    self.command_cursor += 1;
                    return false;
                }
                _ => return false,
            }
        }

        // 正常模式下的按键处理
        match key {
            KeyCode::Char('/') => {
                self.input_mode = InputMode::Command;
                self.command_input.clear();
                self.command_cursor = 0;
                false
            }
            KeyCode::Char('q') => {
                let _ = self.cmd_tx.send(AppCommand::Quit);
                true // 退出应用
            }
            KeyCode::Char('r') => {
                let _ = self.cmd_tx.send(AppCommand::Refresh);
                false
            }
            KeyCode::Left => {
                self.focus_area = FocusArea::Menu;
                false
            }
            KeyCode::Right => {
                self.focus_area = FocusArea::MainView;
                false
            }
            KeyCode::Up => {
                if self.focus_area == FocusArea::Menu {
                    if self.menu_selected_index > 0 {
                        self.menu_selected_index -= 1;
                    }
                } else if self.view_mode == ViewMode::Detail || self.view_mode == ViewMode::Insights
                {
                    self.detail_scroll = self.detail_scroll.saturating_sub(1);
                } else {
                    self.select_adjacent(-1);
                }
                false
            }
            KeyCode::Down => {
                if self.focus_area == FocusArea::Menu {
                    let menu_items_count = 4;
                    if self.menu_selected_index < menu_items_count - 1 {
                        self.menu_selected_index += 1;
                    }
                } else if self.view_mode == ViewMode::Detail || self.view_mode == ViewMode::Insights
                {
                    self.detail_scroll = self.detail_scroll.saturating_add(1);
                } else {
                    self.select_adjacent(1);
                }
                false
            }
            KeyCode::Enter | KeyCode::Char('c') => {
                if self.focus_area == FocusArea::Menu {
                    match self.menu_selected_index {
                        0 => self.view_mode = ViewMode::Map,
                        1 => self.view_mode = ViewMode::FieldList,
                        2 => {
                            self.view_mode = ViewMode::Detail;
                            self.detail_scroll = 0;
                        }
                        3 => {
                            self.view_mode = ViewMode::Insights;
                            self.detail_scroll = 0;
                        }
                        _ => {}
                    }
                    // 确认后自动切换焦点到主视图
                    self.focus_area = FocusArea::MainView;
                } else if self.view_mode == ViewMode::FieldList {
                    // 列表上按 Enter 直接进详情
                    self.view_mode = ViewMode::Detail;
                    self.menu_selected_index = 2;
                    self.detail_scroll = 0;
                }
                false
            }
            KeyCode::Char('x') => {
                if self.focus_area == FocusArea::MainView && self.view_mode == ViewMode::Detail {
                    self.view_mode = ViewMode::FieldList;
                    self.menu_selected_index = 1;
                }
                false
            }
            KeyCode::Char('f') => {
                if self.focus_area == FocusArea::MainView && self.view_mode == ViewMode::FieldList {
                    self.filter_status = match self.filter_status {
                        None => Some(HealthStatus::Healthy),
                        Some(HealthStatus::Healthy) => Some(HealthStatus::Warning),
                        Some(HealthStatus::Warning) => Some(HealthStatus::Critical),
                        Some(HealthStatus::Critical) => None,
                    };
                }
                false
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::{Coordinator, Phase};
    use crate::model::field::tests::sample_set;

    fn app_with(specs: &[(&str, f64)]) -> (App, mpsc::UnboundedReceiver<AppCommand>) {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (_evt_tx, evt_rx) = mpsc::unbounded_channel();
        let mut app = App::new(Vec::new(), cmd_tx, evt_rx);

        let mut c = Coordinator::new();
        let seq = c.begin_fetch().unwrap();
        c.apply_fetch(seq, Ok(sample_set(specs)));
        app.apply_snapshot(c.snapshot());
        (app, cmd_rx)
    }

    #[test]
    fn snapshot_reconciles_map_layers() {
        let (app, _rx) = app_with(&[("f1", 23.0), ("f2", 67.0)]);
        assert_eq!(app.map.tracked_ids(), vec!["f1".to_string(), "f2".to_string()]);
        assert_eq!(app.snapshot.phase, Phase::Ready);
    }

    #[test]
    fn list_navigation_sends_select_command() {
        let (mut app, mut rx) = app_with(&[("f1", 23.0), ("f2", 45.0), ("f3", 67.0)]);
        app.focus_area = FocusArea::MainView;
        app.view_mode = ViewMode::FieldList;

        app.handle_key_event(KeyCode::Down);
        assert_eq!(
            rx.try_recv().ok(),
            Some(AppCommand::Select {
                id: "f2".to_string()
            })
        );
        // 本地快照未被改动，等协调器回发
        assert_eq!(app.snapshot.selected.as_deref(), Some("f1"));
    }

    #[test]
    fn filter_cycles_through_statuses() {
        let (mut app, _rx) = app_with(&[("f1", 23.0), ("f2", 45.0), ("f3", 67.0)]);
        app.focus_area = FocusArea::MainView;
        app.view_mode = ViewMode::FieldList;

        assert_eq!(app.visible_fields().len(), 3);
        app.handle_key_event(KeyCode::Char('f'));
        assert_eq!(app.filter_status, Some(HealthStatus::Healthy));
        assert_eq!(app.visible_fields().len(), 1);
        app.handle_key_event(KeyCode::Char('f'));
        app.handle_key_event(KeyCode::Char('f'));
        app.handle_key_event(KeyCode::Char('f'));
        assert_eq!(app.filter_status, None);
    }

    #[test]
    fn command_input_parses_and_sends() {
        let (mut app, mut rx) = app_with(&[("f1", 23.0)]);
        app.handle_key_event(KeyCode::Char('/'));
        assert_eq!(app.input_mode, InputMode::Command);
        for c in "refresh".chars() {
            app.handle_key_event(KeyCode::Char(c));
        }
        app.handle_key_event(KeyCode::Enter);
        assert_eq!(rx.try_recv().ok(), Some(AppCommand::Refresh));
        assert_eq!(app.input_mode, InputMode::Normal);
    }

    #[test]
    fn completion_hints_cover_field_ids() {
        let (mut app, _rx) = app_with(&[("north-01", 23.0)]);
        app.command_input = "sel".to_string();
        assert_eq!(app.get_completion_hint(), Some("ect".to_string()));
        app.command_input = "select nor".to_string();
        assert_eq!(app.get_completion_hint(), Some("th-01".to_string()));
    }

    #[test]
    fn quit_key_requests_shutdown() {
        let (mut app, mut rx) = app_with(&[("f1", 23.0)]);
        assert!(app.handle_key_event(KeyCode::Char('q')));
        assert_eq!(rx.try_recv().ok(), Some(AppCommand::Quit));
    }
}
