use std::sync::Arc;
use std::time::Duration;

use log::{info, warn};
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant};

use crate::app_state::AppEvent;
use crate::commands::AppCommand;
use crate::coordinator::{Coordinator, FetchOutcome, Phase};
use crate::provider::{FieldProvider, ProviderError};

/// 发起一次后台拉取：先试主数据源，失败则落到兜底数据源。
/// 结果连同请求序号发回协调器循环，由它按序号裁决是否采纳。
fn spawn_fetch(
    seq: u64,
    primary: Arc<dyn FieldProvider>,
    fallback: Arc<dyn FieldProvider>,
    result_tx: mpsc::UnboundedSender<(u64, Result<crate::model::FieldSet, ProviderError>)>,
    event_tx: mpsc::UnboundedSender<AppEvent>,
) {
    tokio::spawn(async move {
        let result = match primary.fetch_field_set().await {
            Ok(set) => Ok(set),
            Err(e) => {
                warn!("主数据源拉取失败，切换兜底: {}", e);
                let _ = event_tx.send(AppEvent::Log(format!("⚠ 主数据源失败，使用模拟数据: {}", e)));
                fallback.fetch_field_set().await
            }
        };
        let _ = result_tx.send((seq, result));
    });
}

/// 协调器后台任务：周期刷新 + 命令处理，唯一持有 Coordinator。
/// UI 只通过 AppCommand 提交意图，通过 AppEvent::Snapshot 拿到状态。
pub async fn run(
    primary: Arc<dyn FieldProvider>,
    fallback: Arc<dyn FieldProvider>,
    mut command_rx: mpsc::UnboundedReceiver<AppCommand>,
    event_tx: mpsc::UnboundedSender<AppEvent>,
    refresh_secs: u64,
) {
    let mut coordinator = Coordinator::new();
    let (result_tx, mut result_rx) = mpsc::unbounded_channel();

    let mut period = Duration::from_secs(refresh_secs.max(1));
    let mut ticker = interval_at(Instant::now() + period, period);
    // mock on 之后主数据源被模拟源顶替，直到 mock off
    let mut force_mock = false;

    info!("协调器启动，刷新周期 {} 秒", period.as_secs());

    let pick_primary = |force_mock: bool,
                        primary: &Arc<dyn FieldProvider>,
                        fallback: &Arc<dyn FieldProvider>| {
        if force_mock {
            Arc::clone(fallback)
        } else {
            Arc::clone(primary)
        }
    };

    // 立即发起首次加载，不等第一个周期
    if let Some(seq) = coordinator.begin_fetch() {
        spawn_fetch(
            seq,
            pick_primary(force_mock, &primary, &fallback),
            Arc::clone(&fallback),
            result_tx.clone(),
            event_tx.clone(),
        );
    }
    let _ = event_tx.send(AppEvent::Snapshot(coordinator.snapshot()));

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                // 只在 Ready 时周期刷新；Loading/Refreshing 已有在途请求，
                // Failed 等待手动重试
                if coordinator.phase() == Phase::Ready {
                    if let Some(seq) = coordinator.begin_fetch() {
                        spawn_fetch(
                            seq,
                            pick_primary(force_mock, &primary, &fallback),
                            Arc::clone(&fallback),
                            result_tx.clone(),
                            event_tx.clone(),
                        );
                        let _ = event_tx.send(AppEvent::Snapshot(coordinator.snapshot()));
                    }
                }
            }

            Some((seq, result)) = result_rx.recv() => {
                match coordinator.apply_fetch(seq, result) {
                    FetchOutcome::Applied => {
                        let snapshot = coordinator.snapshot();
                        let _ = event_tx.send(AppEvent::Log(format!(
                            "✓ 数据已更新（第 {} 代，{} 个田块）",
                            snapshot.generation,
                            snapshot.fields.len()
                        )));
                        let _ = event_tx.send(AppEvent::Snapshot(snapshot));
                    }
                    FetchOutcome::KeptLastGood => {
                        let _ = event_tx.send(AppEvent::Log(
                            "⚠ 刷新失败，继续显示上次数据".to_string(),
                        ));
                        let _ = event_tx.send(AppEvent::Snapshot(coordinator.snapshot()));
                    }
                    FetchOutcome::FatalFirstLoad => {
                        let _ = event_tx.send(AppEvent::Error(
                            "✗ 初次加载失败，输入 refresh 重试".to_string(),
                        ));
                        let _ = event_tx.send(AppEvent::Snapshot(coordinator.snapshot()));
                    }
                    FetchOutcome::StaleDiscarded | FetchOutcome::Ignored => {}
                }
            }

            cmd = command_rx.recv() => {
                let Some(cmd) = cmd else { break };
                match cmd {
                    AppCommand::Select { id } => {
                        if coordinator.select(&id) {
                            let _ = event_tx.send(AppEvent::Snapshot(coordinator.snapshot()));
                        } else {
                            let _ = event_tx.send(AppEvent::Log(format!("⚠ 未找到田块: {}", id)));
                        }
                    }
                    AppCommand::Refresh => {
                        coordinator.retry();
                        if let Some(seq) = coordinator.begin_fetch() {
                            spawn_fetch(
                                seq,
                                pick_primary(force_mock, &primary, &fallback),
                                Arc::clone(&fallback),
                                result_tx.clone(),
                                event_tx.clone(),
                            );
                            let _ = event_tx.send(AppEvent::Log("🔄 正在刷新...".to_string()));
                            let _ = event_tx.send(AppEvent::Snapshot(coordinator.snapshot()));
                        }
                    }
                    AppCommand::Interval { secs } => {
                        period = Duration::from_secs(secs.max(1));
                        ticker = interval_at(Instant::now() + period, period);
                        info!("刷新周期调整为 {} 秒", period.as_secs());
                        let _ = event_tx.send(AppEvent::Message(format!(
                            "✓ 刷新周期已设为 {} 秒",
                            period.as_secs()
                        )));
                    }
                    AppCommand::Mock { on } => {
                        force_mock = on;
                        info!("模拟数据源强制开关: {}", on);
                        let _ = event_tx.send(AppEvent::Message(if on {
                            "✓ 已切换到模拟数据源（下次刷新生效）".to_string()
                        } else {
                            "✓ 已恢复主数据源（下次刷新生效）".to_string()
                        }));
                    }
                    AppCommand::Help => {
                        let _ = event_tx.send(AppEvent::Message(AppCommand::usage().to_string()));
                    }
                    AppCommand::Quit => {
                        coordinator.unmount();
                        info!("协调器收到退出命令，已卸载");
                        break;
                    }
                    AppCommand::Unknown(raw) => {
                        let _ = event_tx.send(AppEvent::Error(format!(
                            "✗ 未知命令: {}（输入 help 查看用法）",
                            raw
                        )));
                    }
                }
            }
        }
    }
}
