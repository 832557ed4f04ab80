use crate::app_state::{App, FocusArea, InputMode, ViewMode};
use crate::coordinator::Phase;
use crate::model::Field;
use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{
        canvas::{Canvas, Line as CanvasLine},
        Block, Borders, Clear, List, ListItem, Paragraph,
    },
    Frame,
};

pub fn draw(f: &mut Frame, app: &mut App) {
    // 创建布局
    let chunks = Layout::default()
        .direction(ratatui::layout::Direction::Vertical)
        .constraints([
            Constraint::Length(3), // 顶部标题栏
            Constraint::Min(0),    // 中间内容区域
            Constraint::Min(8),    // 底部命令/日志区域
        ])
        .split(f.size());

    // 顶部标题栏
    render_top_bar(f, chunks[0], app);

    // 中间内容区域（左侧菜单 + 主视图）
    let middle_chunks = Layout::default()
        .direction(ratatui::layout::Direction::Horizontal)
        .constraints([Constraint::Length(20), Constraint::Min(0)])
        .split(chunks[1]);

    // 左侧菜单
    render_left_menu(f, middle_chunks[0], app);

    // 主视图
    render_main_view(f, middle_chunks[1], app);

    // 底部命令/日志区域
    render_bottom_bar(f, chunks[2], app);
}

fn render_top_bar(f: &mut Frame, area: Rect, app: &App) {
    let title = Block::default()
        .borders(Borders::ALL)
        .style(Style::default().fg(Color::Cyan));

    let phase_color = match app.snapshot.phase {
        Phase::Ready => Color::Green,
        Phase::Loading | Phase::Refreshing => Color::Yellow,
        Phase::Failed => Color::Red,
        Phase::Unmounted => Color::Gray,
    };

    let title_text = Line::from(vec![
        Span::styled(
            " 橄榄田卫星监测 ",
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw(" - Terminal TUI  "),
        Span::styled(
            format!("[{}]", app.snapshot.phase.label()),
            Style::default().fg(phase_color),
        ),
        Span::raw(format!("  田块: {}", app.snapshot.fields.len())),
    ]);

    let paragraph = Paragraph::new(title_text)
        .block(title)
        .alignment(ratatui::layout::Alignment::Center);

    f.render_widget(paragraph, area);
}

fn render_left_menu(f: &mut Frame, area: Rect, app: &App) {
    let menu_items: Vec<ListItem> = vec!["地图视图", "田块列表", "详细信息", "智能建议"]
        .iter()
        .enumerate()
        .map(|(i, text)| {
            let is_selected = i == app.menu_selected_index;
            let is_active = match (i, &app.view_mode) {
                (0, ViewMode::Map) => true,
                (1, ViewMode::FieldList) => true,
                (2, ViewMode::Detail) => true,
                (3, ViewMode::Insights) => true,
                _ => false,
            };

            let style = if is_selected {
                // 选中的菜单项
                if app.focus_area == FocusArea::Menu {
                    Style::default()
                        .fg(Color::Black)
                        .bg(Color::Magenta)
                        .add_modifier(Modifier::BOLD)
                } else {
                    Style::default()
                        .fg(Color::Magenta)
                        .add_modifier(Modifier::BOLD)
                }
            } else if is_active {
                // 当前激活的视图
                Style::default().fg(Color::Yellow)
            } else {
                Style::default().fg(Color::White)
            };

            let prefix = if is_active { "● " } else { "○ " };
            ListItem::new(format!("{}{}", prefix, text)).style(style)
        })
        .collect();

    let title = if app.focus_area == FocusArea::Menu {
        "菜单 (Enter/c 确认)"
    } else {
        "菜单 (← 切换)"
    };

    let menu =
        List::new(menu_items).block(Block::default().borders(Borders::ALL).title(title).style(
            if app.focus_area == FocusArea::Menu {
                Style::default().fg(Color::Cyan)
            } else {
                Style::default().fg(Color::White)
            },
        ));

    f.render_widget(menu, area);
}

fn render_main_view(f: &mut Frame, area: Rect, app: &mut App) {
    match app.view_mode {
        ViewMode::Map => render_map(f, area, app),
        ViewMode::FieldList => render_field_list(f, area, app),
        ViewMode::Detail => render_detail(f, area, app),
        ViewMode::Insights => render_insights(f, area, app),
    }
}

fn render_map(f: &mut Frame, area: Rect, app: &mut App) {
    // 鼠标命中测试需要知道地图占据的终端区域
    app.map_area = Some(area);

    let title = if app.focus_area == FocusArea::MainView {
        "地图视图 (鼠标点击选中, r 刷新, ← 菜单)"
    } else {
        "地图视图"
    };
    let block = Block::default().borders(Borders::ALL).title(title).style(
        if app.focus_area == FocusArea::MainView {
            Style::default().fg(Color::Cyan)
        } else {
            Style::default().fg(Color::White)
        },
    );

    match app.snapshot.phase {
        Phase::Loading => {
            let paragraph = Paragraph::new("正在加载卫星数据...")
                .block(block)
                .alignment(ratatui::layout::Alignment::Center);
            f.render_widget(paragraph, area);
            return;
        }
        Phase::Failed => {
            let paragraph = Paragraph::new(vec![
                Line::from(Span::styled(
                    "✗ 数据加载失败",
                    Style::default().fg(Color::Red),
                )),
                Line::from("按 r 或输入 refresh 重试"),
            ])
            .block(block)
            .alignment(ratatui::layout::Alignment::Center);
            f.render_widget(paragraph, area);
            return;
        }
        _ => {}
    }

    let state = {
        let guard = app
            .canvas_state
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        guard.clone()
    };
    let viewport = state.viewport;

    let canvas = Canvas::default()
        .block(block)
        .x_bounds([viewport.west, viewport.east])
        .y_bounds([viewport.south, viewport.north])
        .paint(|ctx| {
            // 田块边界
            for poly in state.polygons.values() {
                let pts = &poly.points;
                if pts.len() < 2 {
                    continue;
                }
                for i in 0..pts.len() {
                    let a = pts[i];
                    let b = pts[(i + 1) % pts.len()];
                    ctx.draw(&CanvasLine {
                        x1: a.lng,
                        y1: a.lat,
                        x2: b.lng,
                        y2: b.lat,
                        color: poly.style.color,
                    });
                }
            }
            ctx.layer();
            // 中心标记
            for marker in state.markers.values() {
                let glyph = if marker.style.size >= 24 { "◉" } else { "●" };
                ctx.print(
                    marker.at.lng,
                    marker.at.lat,
                    Span::styled(glyph, Style::default().fg(marker.style.color)),
                );
            }
        });
    f.render_widget(canvas, area);

    // 弹窗叠加在地图左下角
    if let Some(id) = &state.open_popup {
        if let Some(content) = state.popups.get(id) {
            let lines: Vec<Line> = content.lines().map(Line::from).collect();
            let height = (lines.len() as u16 + 2).min(area.height.saturating_sub(2));
            let width = 34.min(area.width.saturating_sub(2));
            if height > 2 && width > 4 {
                let popup_area = Rect {
                    x: area.x + 1,
                    y: area.y + area.height - height - 1,
                    width,
                    height,
                };
                let popup = Paragraph::new(lines).block(
                    Block::default()
                        .borders(Borders::ALL)
                        .title("田块信息")
                        .style(Style::default().fg(Color::Yellow)),
                );
                f.render_widget(Clear, popup_area);
                f.render_widget(popup, popup_area);
            }
        }
    }
}

fn render_field_list(f: &mut Frame, area: Rect, app: &mut App) {
    let selected_id = app.snapshot.selected.clone();
    let items: Vec<ListItem> = app
        .visible_fields()
        .iter()
        .map(|field| {
            let status = field.health_status;
            let is_selected = selected_id.as_deref() == Some(field.id.as_str());
            let style = if is_selected {
                Style::default()
                    .fg(Color::Black)
                    .bg(Color::White)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::White)
            };

            let content = Line::from(vec![
                Span::styled(
                    format!("{} ", status.symbol()),
                    Style::default().fg(status.color()),
                ),
                Span::styled(
                    format!("{:<6}", status.label()),
                    Style::default().fg(status.color()),
                ),
                Span::raw(format!(
                    "{:<20} 胁迫 {:>5.1}  {:.1} 公顷",
                    field.name, field.stress_score, field.area_hectares
                )),
            ]);

            ListItem::new(content).style(style)
        })
        .collect();

    let status_filter = app
        .filter_status
        .map(|s| s.label())
        .unwrap_or("全部");
    let title = if app.focus_area == FocusArea::MainView {
        format!(
            "田块列表 [筛选: {}] (f 切换, ↑↓ 选中, Enter/c 详情, ← 菜单)",
            status_filter
        )
    } else {
        format!("田块列表 [筛选: {}]", status_filter)
    };

    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title(title).style(
            if app.focus_area == FocusArea::MainView {
                Style::default().fg(Color::Cyan)
            } else {
                Style::default().fg(Color::White)
            },
        ))
        .highlight_style(
            Style::default()
                .fg(Color::Black)
                .bg(Color::White)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol(">> ");
    f.render_stateful_widget(list, area, &mut app.field_list_state);
}

fn field_detail_lines(field: &Field) -> Vec<Line<'_>> {
    let status = field.health_status;
    let risk = field.yield_risk;
    let mut lines = vec![
        Line::from(vec![
            Span::styled("名称: ", Style::default().add_modifier(Modifier::BOLD)),
            Span::styled(field.name.as_str(), Style::default().fg(Color::Cyan)),
            Span::raw(format!("  ({})", field.id)),
        ]),
        Line::from(vec![
            Span::styled("状态: ", Style::default().add_modifier(Modifier::BOLD)),
            Span::styled(
                format!("{} {}", status.symbol(), status.label()),
                Style::default().fg(status.color()),
            ),
            Span::raw("  "),
            Span::styled("产量风险: ", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw(risk.label()),
            Span::raw("  "),
            Span::styled("趋势: ", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw(format!("{} {}", field.trend.symbol(), field.trend.label())),
        ]),
        Line::from(format!(
            "面积: {:.1} 公顷   橄榄树: {} 棵",
            field.area_hectares, field.trees_count
        )),
        Line::from(""),
        Line::from(vec![Span::styled(
            "--- 胁迫与灌溉 ---",
            Style::default().fg(Color::Yellow),
        )]),
        Line::from(format!(
            "水分胁迫指数: {:>5.1} / 100    土壤湿度: {:>5.1}%",
            field.stress_score, field.moisture_level
        )),
        Line::from(format!("地表温度异常: {:+.1} ℃", field.temperature_anomaly)),
        Line::from(""),
        Line::from(vec![Span::styled(
            "--- Sentinel-2 指数 ---",
            Style::default().fg(Color::Yellow),
        )]),
    ];

    lines.push(Line::from(format!(
        "NDVI (植被): {:.3}    NDWI (水分): {:.3}",
        field.sentinel_data.ndvi, field.sentinel_data.ndwi
    )));
    lines.push(Line::from(format!(
        "Sentinel-1 拍摄: {}   Sentinel-2 拍摄: {}",
        field.sentinel_data.sentinel1_date, field.sentinel_data.sentinel2_date
    )));
    lines.push(Line::from(format!(
        "数据更新于: {}",
        field.last_updated.format("%Y-%m-%d %H:%M UTC")
    )));
    lines.push(Line::from(""));
    lines.push(Line::from(vec![Span::styled(
        "--- 边界顶点 ---",
        Style::default().fg(Color::Yellow),
    )]));
    for p in &field.coordinates {
        lines.push(Line::from(format!("  • {:.4}, {:.4}", p.lat, p.lng)));
    }
    lines
}

fn render_detail(f: &mut Frame, area: Rect, app: &App) {
    let content = if let Some(field) = app.selected_field() {
        field_detail_lines(field)
    } else {
        vec![Line::from("未选中田块，回到列表或地图选择一个")]
    };

    let title = if app.focus_area == FocusArea::MainView {
        "详细信息 (↑↓ 滚动, x 返回, ← 菜单)"
    } else {
        "详细信息"
    };

    let paragraph = Paragraph::new(content)
        .block(Block::default().borders(Borders::ALL).title(title).style(
            if app.focus_area == FocusArea::MainView {
                Style::default().fg(Color::Cyan)
            } else {
                Style::default().fg(Color::White)
            },
        ))
        .scroll((app.detail_scroll, 0));
    f.render_widget(paragraph, area);
}

fn render_insights(f: &mut Frame, area: Rect, app: &App) {
    let mut lines = vec![
        Line::from(vec![Span::styled(
            "--- AI 灌溉建议 ---",
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        )]),
        Line::from(""),
    ];

    if let Some(insights) = &app.snapshot.insights {
        lines.push(Line::from(insights.summary.as_str()));
        lines.push(Line::from(""));
        for rec in &insights.recommendations {
            lines.push(Line::from(format!("  {}", rec)));
        }
        lines.push(Line::from(""));
        lines.push(Line::from(vec![
            Span::raw("置信度: "),
            Span::styled(
                format!("{}%", insights.confidence),
                Style::default().fg(Color::Green),
            ),
            Span::raw(format!("   分析方法: {}", insights.analysis_method)),
        ]));
        lines.push(Line::from(format!(
            "分析时间: {}",
            insights.last_analysis.format("%Y-%m-%d %H:%M UTC")
        )));
    } else {
        lines.push(Line::from("暂无建议，等待数据加载"));
    }

    if let Some(sat) = &app.snapshot.satellite {
        lines.push(Line::from(""));
        lines.push(Line::from(vec![Span::styled(
            "--- 卫星数据源 ---",
            Style::default().fg(Color::Yellow),
        )]));
        lines.push(Line::from(format!(
            "Sentinel-1 过境: {}   Sentinel-2 过境: {}",
            sat.last_sentinel1_pass, sat.last_sentinel2_pass
        )));
        lines.push(Line::from(format!(
            "覆盖区域: {}   下次更新: {}",
            sat.coverage_area,
            sat.next_update.format("%m-%d %H:%M UTC")
        )));
    }

    let title = if app.focus_area == FocusArea::MainView {
        "智能建议 (↑↓ 滚动, ← 菜单)"
    } else {
        "智能建议"
    };
    let paragraph = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title(title).style(
            if app.focus_area == FocusArea::MainView {
                Style::default().fg(Color::Cyan)
            } else {
                Style::default().fg(Color::White)
            },
        ))
        .scroll((app.detail_scroll, 0));
    f.render_widget(paragraph, area);
}

fn render_bottom_bar(f: &mut Frame, area: Rect, app: &App) {
    let bottom_chunks = Layout::default()
        .direction(ratatui::layout::Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(0)])
        .split(area);

    // 命令输入区域
    let command_prompt = if app.input_mode == InputMode::Command {
        let mut spans = vec![Span::styled(
            "命令: ",
            Style::default()
                .fg(Color::Green)
                .add_modifier(Modifier::BOLD),
        )];
        let cur = app.command_cursor.min(app.command_input.len());
        let (left, right) = app.command_input.split_at(cur);
        spans.push(Span::raw(left));
        spans.push(Span::styled("_", Style::default().fg(Color::Yellow)));
        spans.push(Span::raw(right));

        // 如果有建议，添加浅灰色幽灵文本
        if let Some(hint) = app.get_completion_hint() {
            spans.push(Span::styled(hint, Style::default().fg(Color::DarkGray)));
        }

        vec![
            Line::from(spans),
            Line::from("Enter执行 Esc取消 Tab补全 ←→光标 Home/End ↑历史 ↓下一条"),
        ]
    } else {
        vec![
            Line::from(vec![
                Span::styled("命令: ", Style::default().fg(Color::Yellow)),
                Span::raw("(按 / 进入命令模式)"),
            ]),
            Line::from("/命令 r刷新 f筛选 ←→切换 ↑↓导航 Enter/c确认 x返回 q退出"),
        ]
    };
    let command_paragraph = Paragraph::new(command_prompt).block(
        Block::default()
            .borders(Borders::ALL)
            .title(if app.input_mode == InputMode::Command {
                "命令输入模式"
            } else {
                "命令输入"
            })
            .style(if app.input_mode == InputMode::Command {
                Style::default().fg(Color::Green)
            } else {
                Style::default().fg(Color::White)
            }),
    );
    f.render_widget(command_paragraph, bottom_chunks[0]);

    // 日志区域 - 显示最近的日志消息（最多显示最后20条）
    let log_items: Vec<ListItem> = app
        .log_messages
        .iter()
        .rev() // 反转，显示最新的在顶部
        .take(20)
        .map(|msg| {
            // 根据消息类型设置不同的样式
            let style = if msg.starts_with("✓") {
                Style::default().fg(Color::Green)
            } else if msg.starts_with("✗") {
                Style::default().fg(Color::Red)
            } else if msg.starts_with("⚠") {
                Style::default().fg(Color::Yellow)
            } else {
                Style::default().fg(Color::White)
            };
            ListItem::new(msg.as_str()).style(style)
        })
        .collect();

    let log = List::new(log_items).block(
        Block::default()
            .borders(Borders::ALL)
            .title(format!("日志 (共 {} 条)", app.log_messages.len()))
            .style(Style::default().fg(Color::White)),
    );
    f.render_widget(log, bottom_chunks[1]);
}
