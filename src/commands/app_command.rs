use std::str::FromStr;

#[derive(Debug, Clone, PartialEq)]
pub enum AppCommand {
    /// 选中某个田块（地图点击与列表导航都走这一条路）
    Select { id: String },
    /// 手动触发一次刷新（初次加载失败时等价于重试）
    Refresh,
    /// 调整自动刷新间隔
    Interval { secs: u64 },
    /// 强制使用/停用模拟数据源
    Mock { on: bool },
    Help,
    Quit,
    Unknown(String),
}

impl AppCommand {
    pub fn usage() -> &'static str {
        "可用命令: select <field_id> | refresh | interval <sec> | mock on|off | help | quit"
    }
}

impl FromStr for AppCommand {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split_whitespace().collect();
        if parts.is_empty() {
            return Ok(AppCommand::Unknown("".to_string()));
        }

        match parts[0] {
            "select" | "s" => {
                if let Some(id) = parts.get(1) {
                    Ok(AppCommand::Select { id: id.to_string() })
                } else {
                    Ok(AppCommand::Unknown("用法: select <field_id>".to_string()))
                }
            }
            "refresh" | "r" | "retry" => Ok(AppCommand::Refresh),
            "interval" => {
                if let Some(secs) = parts.get(1).and_then(|s| parse_interval_seconds(s)) {
                    if secs == 0 {
                        Ok(AppCommand::Unknown("刷新间隔必须大于 0".to_string()))
                    } else {
                        Ok(AppCommand::Interval { secs })
                    }
                } else {
                    Ok(AppCommand::Unknown(
                        "用法: interval <sec>（支持 30s / 5m / 1h 后缀）".to_string(),
                    ))
                }
            }
            "mock" => match parts.get(1).copied() {
                Some("on") => Ok(AppCommand::Mock { on: true }),
                Some("off") => Ok(AppCommand::Mock { on: false }),
                _ => Ok(AppCommand::Unknown("用法: mock on|off".to_string())),
            },
            "help" | "h" => Ok(AppCommand::Help),
            "quit" | "q" | "exit" => Ok(AppCommand::Quit),
            _ => Ok(AppCommand::Unknown(format!("未知命令: {}", parts[0]))),
        }
    }
}

fn parse_interval_seconds(s: &str) -> Option<u64> {
    let raw = s.trim();
    if raw.is_empty() {
        return None;
    }
    let t = raw.to_ascii_lowercase();
    if let Ok(v) = t.parse::<u64>() {
        return Some(v);
    }

    let parse_num = |x: &str| x.trim().parse::<u64>().ok();

    for (suffix, mul) in [
        ("s", 1u64),
        ("sec", 1u64),
        ("secs", 1u64),
        ("m", 60u64),
        ("min", 60u64),
        ("mins", 60u64),
        ("minute", 60u64),
        ("minutes", 60u64),
        ("h", 3600u64),
        ("hr", 3600u64),
        ("hrs", 3600u64),
        ("hour", 3600u64),
        ("hours", 3600u64),
    ] {
        if let Some(prefix) = t.strip_suffix(suffix) {
            if let Some(v) = parse_num(prefix) {
                return v.checked_mul(mul);
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_select_with_id() {
        assert_eq!(
            "select sfax-north-001".parse::<AppCommand>().unwrap(),
            AppCommand::Select {
                id: "sfax-north-001".to_string()
            }
        );
        assert!(matches!(
            "select".parse::<AppCommand>().unwrap(),
            AppCommand::Unknown(_)
        ));
    }

    #[test]
    fn parses_refresh_aliases() {
        for s in ["refresh", "r", "retry"] {
            assert_eq!(s.parse::<AppCommand>().unwrap(), AppCommand::Refresh);
        }
    }

    #[test]
    fn parses_interval_with_suffix() {
        assert_eq!(
            "interval 30".parse::<AppCommand>().unwrap(),
            AppCommand::Interval { secs: 30 }
        );
        assert_eq!(
            "interval 5m".parse::<AppCommand>().unwrap(),
            AppCommand::Interval { secs: 300 }
        );
        assert_eq!(
            "interval 1h".parse::<AppCommand>().unwrap(),
            AppCommand::Interval { secs: 3600 }
        );
        assert!(matches!(
            "interval 0".parse::<AppCommand>().unwrap(),
            AppCommand::Unknown(_)
        ));
        assert!(matches!(
            "interval abc".parse::<AppCommand>().unwrap(),
            AppCommand::Unknown(_)
        ));
    }

    #[test]
    fn parses_mock_toggle() {
        assert_eq!(
            "mock on".parse::<AppCommand>().unwrap(),
            AppCommand::Mock { on: true }
        );
        assert_eq!(
            "mock off".parse::<AppCommand>().unwrap(),
            AppCommand::Mock { on: false }
        );
        assert!(matches!(
            "mock maybe".parse::<AppCommand>().unwrap(),
            AppCommand::Unknown(_)
        ));
    }

    #[test]
    fn unknown_command_is_reported() {
        assert!(matches!(
            "frobnicate".parse::<AppCommand>().unwrap(),
            AppCommand::Unknown(_)
        ));
    }
}
