use chrono::{DateTime, Utc};

use crate::core::{AlertMessage, OutlierVerdict, RuleAlert};

/// Combine the rule engine and the outlier model: either one firing raises an alert.
///
/// Returns `None` for a silent pass; the caller still has `verdict.score` to log.
pub fn decide(
    subject: &str,
    source: &str,
    rule_alerts: &[RuleAlert],
    verdict: &OutlierVerdict,
    now: DateTime<Utc>,
) -> Option<AlertMessage> {
    let mut lines = Vec::new();
    if !rule_alerts.is_empty() {
        let joined: Vec<&str> = rule_alerts.iter().map(|a| a.message.as_str()).collect();
        lines.push(format!("Rule alerts: {}", joined.join("; ")));
    }
    if verdict.is_anomaly() {
        lines.push(format!("ML anomaly detected (score={:.4})", verdict.score));
    }

    if lines.is_empty() {
        return None;
    }

    let body = format!(
        "File: {source}\nTime(UTC): {}\n{}",
        now.format("%Y-%m-%d %H:%M:%S"),
        lines.join("\n")
    );
    Some(AlertMessage {
        subject: subject.to_string(),
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::OutlierLabel;
    use chrono::TimeZone;

    fn verdict(label: OutlierLabel, score: f64) -> OutlierVerdict {
        OutlierVerdict { label, score }
    }

    fn alert(message: &str) -> RuleAlert {
        RuleAlert {
            rule_name: "test".to_string(),
            message: message.to_string(),
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 8, 30, 0).unwrap()
    }

    #[test]
    fn silent_when_nothing_fires() {
        let v = verdict(OutlierLabel::Normal, 0.12);
        assert!(decide("Alert", "a.json", &[], &v, now()).is_none());
    }

    #[test]
    fn rule_alerts_alone_raise() {
        let v = verdict(OutlierLabel::Normal, 0.12);
        let msg = decide(
            "Alert",
            "a.json",
            &[alert("Empty sensor states present"), alert("Mass activation (>3 active in file)")],
            &v,
            now(),
        )
        .unwrap();
        assert_eq!(
            msg.body,
            "File: a.json\nTime(UTC): 2024-03-01 08:30:00\n\
             Rule alerts: Empty sensor states present; Mass activation (>3 active in file)"
        );
        assert!(!msg.body.contains("ML anomaly"));
    }

    #[test]
    fn anomaly_alone_raises() {
        let v = verdict(OutlierLabel::Anomaly, -0.05);
        let msg = decide("Railway Sensor Alert", "a.json", &[], &v, now()).unwrap();
        assert_eq!(msg.subject, "Railway Sensor Alert");
        assert!(msg.body.ends_with("ML anomaly detected (score=-0.0500)"));
        assert!(!msg.body.contains("Rule alerts"));
    }

    #[test]
    fn both_fire() {
        let v = verdict(OutlierLabel::Anomaly, -0.2);
        let msg = decide("Alert", "a.json", &[alert("x")], &v, now()).unwrap();
        let lines: Vec<&str> = msg.body.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[2], "Rule alerts: x");
        assert_eq!(lines[3], "ML anomaly detected (score=-0.2000)");
    }
}
