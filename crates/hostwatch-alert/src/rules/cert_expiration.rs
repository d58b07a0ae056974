use chrono::{DateTime, Utc};
use hostwatch_common::types::{AlertEvent, Severity};

pub const CERT_EXPIRY_KEY: &str = "cert_expiry";

/// Remaining validity of one certificate, local file or remote domain.
#[derive(Debug, Clone, PartialEq)]
pub struct CertExpiry {
    /// File path or `host:port`.
    pub source: String,
    /// Negative once expired.
    pub days_left: i64,
}

/// Collects every certificate at or below `min_days` into one combined
/// alert. Severity escalates to critical once any entry is at or below
/// `critical_days` (expired certificates included).
#[derive(Debug, Clone)]
pub struct CertExpirationRule {
    pub min_days: i64,
    pub critical_days: i64,
}

impl CertExpirationRule {
    pub fn new(min_days: i64) -> Self {
        Self {
            min_days,
            critical_days: 3,
        }
    }

    fn determine_severity(&self, days: i64) -> Severity {
        if days <= self.critical_days {
            Severity::Critical
        } else {
            Severity::Warning
        }
    }

    pub fn evaluate(&self, certs: &[CertExpiry], now: DateTime<Utc>) -> Option<AlertEvent> {
        let mut expiring: Vec<&CertExpiry> =
            certs.iter().filter(|c| c.days_left <= self.min_days).collect();
        if expiring.is_empty() {
            return None;
        }
        expiring.sort_by(|a, b| a.days_left.cmp(&b.days_left).then(a.source.cmp(&b.source)));

        let soonest = expiring[0].days_left;
        let lines = expiring
            .iter()
            .map(|c| {
                if c.days_left < 0 {
                    format!("{}: expired", c.source)
                } else {
                    format!("{}: {} days left", c.source, c.days_left)
                }
            })
            .collect();

        Some(AlertEvent {
            key: CERT_EXPIRY_KEY.to_string(),
            title: format!("Certificates expiring ({})", expiring.len()),
            metric_name: "certificate.days_until_expiry".to_string(),
            severity: self.determine_severity(soonest),
            lines,
            value: soonest as f64,
            threshold: self.min_days as f64,
            timestamp: now,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cert(source: &str, days_left: i64) -> CertExpiry {
        CertExpiry {
            source: source.to_string(),
            days_left,
        }
    }

    #[test]
    fn no_alert_when_all_valid() {
        let rule = CertExpirationRule::new(14);
        assert!(rule
            .evaluate(&[cert("example.com:443", 60), cert("/etc/ssl/a.pem", 15)], Utc::now())
            .is_none());
    }

    #[test]
    fn combines_expiring_certs_into_one_alert() {
        let rule = CertExpirationRule::new(14);
        let event = rule
            .evaluate(
                &[
                    cert("example.com:443", 10),
                    cert("/etc/ssl/ok.pem", 90),
                    cert("/etc/ssl/old.pem", -2),
                    cert("api.example.com:8443", 14),
                ],
                Utc::now(),
            )
            .unwrap();
        assert_eq!(event.key, CERT_EXPIRY_KEY);
        assert_eq!(event.severity, Severity::Critical);
        assert_eq!(
            event.lines,
            vec![
                "/etc/ssl/old.pem: expired",
                "example.com:443: 10 days left",
                "api.example.com:8443: 14 days left",
            ]
        );
        assert_eq!(event.value, -2.0);
    }

    #[test]
    fn warning_when_above_critical_days() {
        let rule = CertExpirationRule::new(14);
        let event = rule.evaluate(&[cert("example.com:443", 7)], Utc::now()).unwrap();
        assert_eq!(event.severity, Severity::Warning);
    }
}
