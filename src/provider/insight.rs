use crate::model::{AiInsights, Field, HealthStatus};
use chrono::Utc;

/// 由田块集合推导聚合建议。对相同的胁迫分数输入结果必须一致，
/// 这里不允许出现任何随机量。
pub fn build_insights(fields: &[Field]) -> AiInsights {
    let critical = fields
        .iter()
        .filter(|f| f.health_status == HealthStatus::Critical)
        .count();
    let warning = fields
        .iter()
        .filter(|f| f.health_status == HealthStatus::Warning)
        .count();

    let avg = if fields.is_empty() {
        0.0
    } else {
        fields.iter().map(|f| f.stress_score).sum::<f64>() / fields.len() as f64
    };
    let avg = avg.round();

    let mut summary = if critical > 0 {
        format!("⚠ 需要关注：{} 个田块出现严重水分胁迫。", critical)
    } else if warning > 0 {
        format!("部分田块需要监测：{} 个田块胁迫水平偏高。", warning)
    } else {
        "✓ 橄榄园整体状况良好！".to_string()
    };
    summary.push_str(&format!("平均胁迫指数: {}/100。", avg as i64));

    let mut recommendations: Vec<String> = Vec::new();
    for field in fields {
        if field.stress_score > 60.0 {
            recommendations.push(format!(
                "🚨 {}: 建议立即灌溉 - 胁迫指数已达危急水平 ({}/100)",
                field.name, field.stress_score as i64
            ));
        } else if field.stress_score > 40.0 {
            recommendations.push(format!("⚡ {}: 密切监测，3-5 天内安排灌溉", field.name));
        }
    }
    if recommendations.is_empty() {
        recommendations.push("🌿 各田块状况良好 - 维持当前灌溉计划".to_string());
    }
    recommendations.truncate(4);

    AiInsights {
        summary,
        recommendations,
        // 展示用置信度，同样只取决于输入分数
        confidence: 85 + (avg as u8) % 10,
        analysis_method: "Sentinel-1 SAR + Sentinel-2 多光谱融合".to_string(),
        last_analysis: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::field::tests::sample_field;

    #[test]
    fn insights_are_deterministic_for_same_scores() {
        let fields: Vec<Field> = [23.0, 45.0, 67.0]
            .iter()
            .enumerate()
            .map(|(i, s)| sample_field(&format!("f{}", i), *s))
            .collect();
        let a = build_insights(&fields);
        let b = build_insights(&fields);
        assert_eq!(a.summary, b.summary);
        assert_eq!(a.recommendations, b.recommendations);
        assert_eq!(a.confidence, b.confidence);
    }

    #[test]
    fn critical_field_drives_summary_and_recommendation() {
        let fields = vec![sample_field("a", 10.0), sample_field("b", 82.0)];
        let insights = build_insights(&fields);
        assert!(insights.summary.contains("1 个田块"));
        assert!(insights.recommendations.iter().any(|r| r.contains("立即灌溉")));
    }

    #[test]
    fn healthy_set_gets_keep_going_advice() {
        let fields = vec![sample_field("a", 10.0), sample_field("b", 20.0)];
        let insights = build_insights(&fields);
        assert_eq!(insights.recommendations.len(), 1);
        assert!(insights.recommendations[0].contains("维持当前灌溉计划"));
    }

    #[test]
    fn recommendations_are_capped_at_four() {
        let fields: Vec<Field> = (0..8).map(|i| sample_field(&format!("f{}", i), 75.0)).collect();
        let insights = build_insights(&fields);
        assert_eq!(insights.recommendations.len(), 4);
    }
}
