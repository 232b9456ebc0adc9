//! Placeholder metrics source
//!
//! The backend does not expose CPU, response time or the business
//! counters yet. [`MetricsSource`] is the seam a real instrumentation
//! backend would implement; [`SimulatedMetrics`] draws every value from a
//! fixed range and is always reported as estimated.

use crate::error::AdapterError;
use async_trait::async_trait;
use rand::Rng;
use std::ops::Range;

/// Point estimates used by the status view
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointEstimates {
    pub cpu_percent: u32,
    pub response_time_ms: u32,
}

/// Window estimates used by the metrics view and the daily report
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowEstimates {
    pub requests_per_min: u64,
    pub response_time_ms: u32,
    pub error_rate_percent: f64,
    pub units_processed: u32,
    pub operations_count: u32,
    pub avg_processing_minutes: u32,
    pub cpu_percent: u32,
    pub memory_percent: u32,
    pub disk_percent: u32,
    pub uptime_percent: f64,
}

#[async_trait]
pub trait MetricsSource: Send + Sync {
    async fn point_estimates(&self) -> Result<PointEstimates, AdapterError>;

    async fn window_estimates(&self, window_hours: u32) -> Result<WindowEstimates, AdapterError>;
}

/// Documented value ranges for the simulated source (upper bound exclusive)
pub mod ranges {
    use std::ops::Range;

    pub const STATUS_CPU_PERCENT: Range<u32> = 40..70;
    pub const STATUS_RESPONSE_MS: Range<u32> = 200..700;

    pub const REQUESTS_PER_MIN: Range<u64> = 800..1300;
    pub const RESPONSE_MS: Range<u32> = 150..350;
    pub const ERROR_RATE_PERCENT: Range<f64> = 0.0..2.0;
    pub const UNITS_PROCESSED: Range<u32> = 15..35;
    pub const OPERATIONS_COUNT: Range<u32> = 80..130;
    pub const AVG_PROCESSING_MINUTES: Range<u32> = 25..40;
    pub const CPU_PERCENT: Range<u32> = 45..70;
    pub const MEMORY_PERCENT: Range<u32> = 60..80;
    pub const DISK_PERCENT: Range<u32> = 35..50;
    pub const UPTIME_PERCENT: f64 = 99.9;
}

/// Random values within [`ranges`]
#[derive(Debug, Clone, Default)]
pub struct SimulatedMetrics;

impl SimulatedMetrics {
    pub fn new() -> Self {
        Self
    }

    fn draw_u32(rng: &mut impl Rng, range: Range<u32>) -> u32 {
        rng.gen_range(range)
    }
}

#[async_trait]
impl MetricsSource for SimulatedMetrics {
    async fn point_estimates(&self) -> Result<PointEstimates, AdapterError> {
        let mut rng = rand::thread_rng();
        Ok(PointEstimates {
            cpu_percent: Self::draw_u32(&mut rng, ranges::STATUS_CPU_PERCENT),
            response_time_ms: Self::draw_u32(&mut rng, ranges::STATUS_RESPONSE_MS),
        })
    }

    async fn window_estimates(&self, _window_hours: u32) -> Result<WindowEstimates, AdapterError> {
        let mut rng = rand::thread_rng();
        let error_rate: f64 = rng.gen_range(ranges::ERROR_RATE_PERCENT);
        Ok(WindowEstimates {
            requests_per_min: rng.gen_range(ranges::REQUESTS_PER_MIN),
            response_time_ms: Self::draw_u32(&mut rng, ranges::RESPONSE_MS),
            error_rate_percent: (error_rate * 10.0).round() / 10.0,
            units_processed: Self::draw_u32(&mut rng, ranges::UNITS_PROCESSED),
            operations_count: Self::draw_u32(&mut rng, ranges::OPERATIONS_COUNT),
            avg_processing_minutes: Self::draw_u32(&mut rng, ranges::AVG_PROCESSING_MINUTES),
            cpu_percent: Self::draw_u32(&mut rng, ranges::CPU_PERCENT),
            memory_percent: Self::draw_u32(&mut rng, ranges::MEMORY_PERCENT),
            disk_percent: Self::draw_u32(&mut rng, ranges::DISK_PERCENT),
            uptime_percent: ranges::UPTIME_PERCENT,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_point_estimates_within_ranges() {
        let source = SimulatedMetrics::new();
        for _ in 0..50 {
            let estimates = source.point_estimates().await.unwrap();
            assert!(ranges::STATUS_CPU_PERCENT.contains(&estimates.cpu_percent));
            assert!(ranges::STATUS_RESPONSE_MS.contains(&estimates.response_time_ms));
        }
    }

    #[tokio::test]
    async fn test_window_estimates_within_ranges() {
        let source = SimulatedMetrics::new();
        for _ in 0..50 {
            let w = source.window_estimates(24).await.unwrap();
            assert!(ranges::REQUESTS_PER_MIN.contains(&w.requests_per_min));
            assert!(ranges::RESPONSE_MS.contains(&w.response_time_ms));
            assert!(w.error_rate_percent >= 0.0 && w.error_rate_percent <= 2.0);
            assert!(ranges::UNITS_PROCESSED.contains(&w.units_processed));
            assert!(ranges::OPERATIONS_COUNT.contains(&w.operations_count));
            assert!(ranges::AVG_PROCESSING_MINUTES.contains(&w.avg_processing_minutes));
            assert!(ranges::CPU_PERCENT.contains(&w.cpu_percent));
            assert!(ranges::MEMORY_PERCENT.contains(&w.memory_percent));
            assert!(ranges::DISK_PERCENT.contains(&w.disk_percent));
        }
    }
}
