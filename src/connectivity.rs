use serde::Serialize;

use crate::registry::DeviceRecord;
use crate::remote::{Delivery, DeliveryRequest, ExecutionResult};

const PROBE_COMMAND: &str = "echo 'test'";

#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum ReachedVia {
    Hostname,
    IpAddress,
}

#[derive(Clone, Debug, Serialize)]
pub struct ConnectivityReport {
    pub heater_name: String,
    pub location: String,
    pub device_class: String,
    pub hostname: String,
    pub ip_address: String,
    pub hostname_ok: bool,
    pub ip_ok: bool,
    pub reached_via: Option<ReachedVia>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ConnectivityReport {
    pub fn online(&self) -> bool {
        self.reached_via.is_some()
    }

    fn auth_failed(&self) -> bool {
        self.error
            .as_deref()
            .is_some_and(|e| e.starts_with("Authentication failed"))
    }

    fn timed_out(&self) -> bool {
        self.error
            .as_deref()
            .is_some_and(|e| e.to_lowercase().contains("timed out"))
    }
}

#[derive(Clone, Debug, Default, Serialize, PartialEq)]
pub struct SweepSummary {
    pub total: usize,
    pub online: usize,
    pub offline: usize,
    /// Hostnames whose key was rejected; they need `ssh-copy-id`.
    pub auth_failures: Vec<String>,
    pub timeouts: usize,
}

fn probe_ok(result: &ExecutionResult) -> bool {
    !result.is_failure() && result.exit_code == Some(0)
}

/// Probe one heater, first by mDNS hostname and then by IP address.
pub async fn probe(delivery: &dyn Delivery, record: &DeviceRecord, hostname_suffix: &str) -> ConnectivityReport {
    let mut report = ConnectivityReport {
        heater_name: record.heater_name.clone(),
        location: record.location.clone(),
        device_class: record.device_class().to_string(),
        hostname: record.hostname.clone(),
        ip_address: record.ip_address.clone(),
        hostname_ok: false,
        ip_ok: false,
        reached_via: None,
        error: None,
    };

    if !record.hostname.trim().is_empty() {
        let address = format!("{}{}", record.hostname.trim(), hostname_suffix);
        let result = delivery.deliver(&address, DeliveryRequest::command(PROBE_COMMAND)).await;
        if probe_ok(&result) {
            report.hostname_ok = true;
            report.reached_via = Some(ReachedVia::Hostname);
            return report;
        }
        report.error = Some(failure_reason(&result));
    }

    if !record.ip_address.trim().is_empty() {
        let result = delivery
            .deliver(record.ip_address.trim(), DeliveryRequest::command(PROBE_COMMAND))
            .await;
        if probe_ok(&result) {
            report.ip_ok = true;
            report.reached_via = Some(ReachedVia::IpAddress);
            report.error = None;
        } else if report.error.is_none() {
            report.error = Some(failure_reason(&result));
        }
    } else if report.error.is_none() {
        report.error = Some("no hostname or IP address recorded".to_string());
    }

    report
}

fn failure_reason(result: &ExecutionResult) -> String {
    match (&result.error, result.exit_code) {
        (Some(err), _) if !err.is_empty() => err.clone(),
        (_, Some(code)) => format!("probe exited with status {code}"),
        _ => "probe returned no exit status".to_string(),
    }
}

/// Probe every heater in registry order, one at a time.
pub async fn sweep(delivery: &dyn Delivery, records: &[DeviceRecord], hostname_suffix: &str) -> Vec<ConnectivityReport> {
    let mut reports = Vec::with_capacity(records.len());
    for record in records {
        let report = probe(delivery, record, hostname_suffix).await;
        if report.online() {
            tracing::info!(heater = %report.heater_name, via = ?report.reached_via, "heater reachable");
        } else {
            tracing::warn!(heater = %report.heater_name, error = ?report.error, "heater unreachable");
        }
        reports.push(report);
    }
    reports
}

pub fn summarize(reports: &[ConnectivityReport]) -> SweepSummary {
    let online = reports.iter().filter(|r| r.online()).count();
    SweepSummary {
        total: reports.len(),
        online,
        offline: reports.len() - online,
        auth_failures: reports
            .iter()
            .filter(|r| !r.online() && r.auth_failed())
            .map(|r| r.hostname.clone())
            .collect(),
        timeouts: reports.iter().filter(|r| !r.online() && r.timed_out()).count(),
    }
}

pub fn render_text(reports: &[ConnectivityReport], summary: &SweepSummary, username: &str, hostname_suffix: &str) -> String {
    let rule = "=".repeat(80);
    let mut out = String::new();
    out.push_str(&format!("{rule}\nCONNECTIVITY TEST SUMMARY\n{rule}\n\n"));
    out.push_str(&format!(
        "Total Miners: {}\nOnline: {}\nOffline: {}\n\n",
        summary.total, summary.online, summary.offline
    ));

    if summary.online > 0 {
        out.push_str("ONLINE MINERS:\n");
        out.push_str(&format!("{:<20} {:<15} {:<10} {:<15}\n", "Heater Name", "Location", "Type", "Method"));
        for r in reports.iter().filter(|r| r.online()) {
            let method = match r.reached_via {
                Some(ReachedVia::Hostname) => "hostname",
                _ => "IP address",
            };
            out.push_str(&format!("{:<20} {:<15} {:<10} {:<15}\n", r.heater_name, r.location, r.device_class, method));
        }
        out.push('\n');
    }

    if summary.offline > 0 {
        out.push_str("OFFLINE MINERS:\n");
        out.push_str(&format!("{:<20} {:<15} {:<50}\n", "Heater Name", "Location", "Error"));
        for r in reports.iter().filter(|r| !r.online()) {
            let error = r.error.as_deref().unwrap_or_default();
            let error = if error.chars().count() > 50 {
                format!("{}...", error.chars().take(47).collect::<String>())
            } else {
                error.to_string()
            };
            out.push_str(&format!("{:<20} {:<15} {:<50}\n", r.heater_name, r.location, error));
        }
        out.push('\n');
    }

    out.push_str(&rule);
    out.push('\n');

    if !summary.auth_failures.is_empty() || summary.timeouts > 0 {
        out.push_str("\nRECOMMENDATIONS:\n");
        if !summary.auth_failures.is_empty() {
            out.push_str(&format!(
                "  - {} miner(s) failed authentication, add the SSH key with:\n",
                summary.auth_failures.len()
            ));
            for host in &summary.auth_failures {
                out.push_str(&format!("    ssh-copy-id {username}@{host}{hostname_suffix}\n"));
            }
        }
        if summary.timeouts > 0 {
            out.push_str(&format!(
                "  - {} miner(s) timed out, check power and network access\n",
                summary.timeouts
            ));
        }
    }
    out
}
