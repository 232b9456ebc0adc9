//! Chat message formatting
//!
//! Shared by interactive commands and scheduled jobs so both paths render
//! the same views the same way. Placeholder values carry an "(est.)" marker.

use crate::models::{HealthCheckResult, MetricsSnapshot, StatusSnapshot};
use chrono::{DateTime, NaiveDate, Utc};

const ESTIMATED: &str = " (est.)";

fn est(flag: bool) -> &'static str {
    if flag {
        ESTIMATED
    } else {
        ""
    }
}

fn check(ok: bool) -> &'static str {
    if ok {
        "✅"
    } else {
        "❌"
    }
}

pub fn failure(context: &str, error: &dyn std::fmt::Display) -> String {
    format!("❌ {}: {}", context, error)
}

pub fn rejected(error: &dyn std::fmt::Display) -> String {
    format!("❌ {}", error)
}

// Canary

pub fn canary_ack(percentage: u32, user: &str) -> String {
    format!(
        "🚀 Starting canary deployment at {}% requested by @{}...",
        percentage, user
    )
}

pub fn canary_started(deployment_id: &str) -> String {
    format!("✅ Canary deployment started. ID: {}", deployment_id)
}

pub fn canary_notice(percentage: u32, user: &str, deployment_id: &str) -> String {
    format!(
        "🐤 Canary deployment {}% started by @{} - ID: {}",
        percentage, user, deployment_id
    )
}

// Promote

pub fn promote_ack(app: &str, percentage: u32) -> String {
    format!("📈 Promoting {} to {}%...", app, percentage)
}

pub fn promoted(app: &str, percentage: u32, capacity: u32) -> String {
    format!(
        "✅ {} promoted to {}% (desired capacity {})",
        app, percentage, capacity
    )
}

pub fn promote_notice(app: &str, percentage: u32, user: &str) -> String {
    format!("📈 @{} promoted {} to {}%", user, app, percentage)
}

// Rollback

pub fn rollback_ack(app: &str) -> String {
    format!("⏪ Starting rollback of {}...", app)
}

pub fn rolled_back(deployment_id: &str, stopped_id: &str) -> String {
    format!(
        "✅ Rollback completed. ID: {} (stopped {})",
        deployment_id, stopped_id
    )
}

pub fn rollback_notice(app: &str, user: &str, stopped_id: &str) -> String {
    format!(
        "⚠️ @{} rolled back {} (stopped deployment {})",
        user, app, stopped_id
    )
}

// Restart

pub fn restart_ack(service: &str) -> String {
    format!("🔄 Restarting service {}...", service)
}

pub fn restarted(service: &str) -> String {
    format!("✅ Restart of service {} accepted", service)
}

pub fn restart_notice(service: &str, user: &str) -> String {
    format!("🔄 @{} restarted service {}", user, service)
}

// Status

pub fn status_ack(app: &str) -> String {
    format!("🔍 Checking {} status...", app)
}

pub fn status_report(app: &str, status: &StatusSnapshot) -> String {
    let health = match status.health {
        crate::models::HealthVerdict::Healthy => "🟢 **Health**: Healthy",
        crate::models::HealthVerdict::Unhealthy => "🔴 **Health**: Unhealthy",
    };
    let last = status
        .last_deployment
        .map(timestamp)
        .unwrap_or_else(|| "N/A".to_string());

    format!(
        "📊 **{} Status**\n\
         {}\n\
         📈 **Instances**: {}/{}\n\
         ⚡ **Average CPU**: {}%{}\n\
         🕐 **Response Time**: {}ms{}\n\
         📦 **Last Deploy**: {}",
        app,
        health,
        status.running_instances,
        status.desired_instances,
        status.cpu_percent,
        est(status.estimated),
        status.response_time_ms,
        est(status.estimated),
        last
    )
}

// Metrics

pub fn metrics_ack(window_hours: u32) -> String {
    format!("📊 Fetching metrics for the last {}h...", window_hours)
}

pub fn metrics_report(app: &str, m: &MetricsSnapshot) -> String {
    format!(
        "📈 **{} Metrics ({}h)**\n\
         \n\
         ⚡ **Performance:**\n\
         - Requests: {}/min{}\n\
         - Response Time: {}ms{}\n\
         - Error Rate: {:.1}%{}\n\
         \n\
         🚢 **Business:**\n\
         - Ships processed: {}{}\n\
         - Cargo operations: {}{}\n\
         - Average time: {}min{}\n\
         \n\
         🖥️ **System:**\n\
         - CPU: {}%{}\n\
         - Memory: {}%{}\n\
         - Disk: {}%{}",
        app,
        m.window_hours,
        m.requests_per_min,
        est(m.requests_estimated),
        m.response_time_ms,
        ESTIMATED,
        m.error_rate_percent,
        ESTIMATED,
        m.units_processed,
        ESTIMATED,
        m.operations_count,
        ESTIMATED,
        m.avg_processing_minutes,
        ESTIMATED,
        m.cpu_percent,
        ESTIMATED,
        m.memory_percent,
        ESTIMATED,
        m.disk_percent,
        ESTIMATED,
    )
}

// Health check

pub fn health_ack() -> String {
    "🏥 Running health check...".to_string()
}

pub fn health_report(app: &str, h: &HealthCheckResult) -> String {
    format!(
        "🏥 **{} Health Check**\n\
         \n\
         {} **Overall**: {}\n\
         🌐 **Frontend**: {} ({}ms)\n\
         🔗 **Load Balancer**: {}\n\
         💾 **Database**: {}\n\
         📊 **Metrics Backend**: {}",
        app,
        check(h.is_healthy()),
        h.overall,
        check(h.frontend),
        h.frontend_latency_ms,
        check(h.load_balancer),
        check(h.database),
        check(h.metrics_backend)
    )
}

pub fn health_check_failed_notice(app: &str, user: &str) -> String {
    format!("🚨 Health check requested by @{} failed for {}", user, app)
}

// Scheduled jobs

pub fn health_poll_alert(app: &str) -> String {
    format!("🚨 **ALERT**: {} is reporting health problems", app)
}

pub fn monitoring_failed(error: &dyn std::fmt::Display) -> String {
    format!("🚨 Automated monitoring failed: {}", error)
}

pub fn daily_report(app: &str, date: NaiveDate, m: &MetricsSnapshot, dashboard_url: &str) -> String {
    format!(
        "📊 **{} Daily Report - {}**\n\
         \n\
         ✅ **24h Summary:**\n\
         🚢 Ships processed: {}{}\n\
         📦 Cargo operations: {}{}\n\
         ⚡ Average response time: {}ms{}\n\
         📈 Uptime: {:.1}%{}\n\
         \n\
         🔗 Dashboard: {}",
        app,
        date.format("%Y-%m-%d"),
        m.units_processed,
        ESTIMATED,
        m.operations_count,
        ESTIMATED,
        m.response_time_ms,
        ESTIMATED,
        m.uptime_percent,
        ESTIMATED,
        dashboard_url
    )
}

pub fn daily_report_failed(error: &dyn std::fmt::Display) -> String {
    format!("❌ Daily report failed: {}", error)
}

/// Timestamp rendering used in replies
pub fn timestamp(t: DateTime<Utc>) -> String {
    t.format("%Y-%m-%d %H:%M UTC").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::HealthVerdict;

    fn snapshot() -> MetricsSnapshot {
        MetricsSnapshot {
            window_hours: 24,
            requests_per_min: 950,
            requests_estimated: false,
            response_time_ms: 210,
            error_rate_percent: 0.4,
            units_processed: 20,
            operations_count: 99,
            avg_processing_minutes: 30,
            cpu_percent: 50,
            memory_percent: 65,
            disk_percent: 40,
            uptime_percent: 99.9,
        }
    }

    #[test]
    fn test_canary_notice_names_percentage_and_user() {
        let notice = canary_notice(30, "alice", "d-000000001");
        assert!(notice.contains("30%"));
        assert!(notice.contains("alice"));
        assert!(notice.contains("d-000000001"));
    }

    #[test]
    fn test_status_report_flags_estimates() {
        let report = status_report(
            "PortTrack",
            &StatusSnapshot {
                health: HealthVerdict::Healthy,
                running_instances: 2,
                desired_instances: 3,
                cpu_percent: 55,
                response_time_ms: 300,
                estimated: true,
                last_deployment: None,
            },
        );
        assert!(report.contains("2/3"));
        assert!(report.contains("55% (est.)"));
        assert!(report.contains("N/A"));
    }

    #[test]
    fn test_metrics_report_measured_requests_not_flagged() {
        let report = metrics_report("PortTrack", &snapshot());
        assert!(report.contains("Requests: 950/min\n"));
        assert!(report.contains("Error Rate: 0.4% (est.)"));
    }

    #[test]
    fn test_daily_report_contains_date_and_dashboard() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let report = daily_report("PortTrack", date, &snapshot(), "https://dash");
        assert!(report.contains("2024-03-01"));
        assert!(report.contains("https://dash"));
        assert!(report.contains("Ships processed: 20"));
    }

    #[test]
    fn test_health_report_marks_failed_probes() {
        let report = health_report("PortTrack", &HealthCheckResult::failed());
        assert!(report.contains("❌ **Overall**: unhealthy"));
        assert!(report.contains("**Database**: ❌"));
    }
}
