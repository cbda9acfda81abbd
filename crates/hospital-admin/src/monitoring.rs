//! 业务与 HTTP 指标
//!
//! Prometheus 注册表，文本格式通过 `/metrics` 暴露

use std::time::Duration;

use anyhow::Result;
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use tracing::debug;

/// 系统指标集合
#[derive(Debug, Clone)]
pub struct HospitalMetrics {
    registry: Registry,
    http_requests_total: IntCounterVec,
    http_request_duration: Histogram,
    prescriptions_created: IntCounter,
    stock_rejections: IntCounter,
    invoices_paid: IntCounter,
    admissions: IntCounter,
    discharges: IntCounter,
    active_inpatients: IntGauge,
}

impl HospitalMetrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let http_requests_total = IntCounterVec::new(
            Opts::new("http_requests_total", "Total number of HTTP requests"),
            &["method", "status"],
        )?;

        let http_request_duration = Histogram::with_opts(HistogramOpts::new(
            "http_request_duration_seconds",
            "HTTP request duration in seconds",
        ))?;

        let prescriptions_created = IntCounter::with_opts(Opts::new(
            "prescriptions_created_total",
            "Prescription lines written with stock deducted",
        ))?;

        let stock_rejections = IntCounter::with_opts(Opts::new(
            "stock_rejections_total",
            "Prescriptions rejected for insufficient stock",
        ))?;

        let invoices_paid = IntCounter::with_opts(Opts::new(
            "invoices_paid_total",
            "Invoices created for completed visits",
        ))?;

        let admissions = IntCounter::with_opts(Opts::new(
            "inpatient_admissions_total",
            "Inpatient admissions",
        ))?;

        let discharges = IntCounter::with_opts(Opts::new(
            "inpatient_discharges_total",
            "Inpatient discharges",
        ))?;

        let active_inpatients = IntGauge::with_opts(Opts::new(
            "inpatients_active",
            "Number of active inpatient records",
        ))?;

        registry.register(Box::new(http_requests_total.clone()))?;
        registry.register(Box::new(http_request_duration.clone()))?;
        registry.register(Box::new(prescriptions_created.clone()))?;
        registry.register(Box::new(stock_rejections.clone()))?;
        registry.register(Box::new(invoices_paid.clone()))?;
        registry.register(Box::new(admissions.clone()))?;
        registry.register(Box::new(discharges.clone()))?;
        registry.register(Box::new(active_inpatients.clone()))?;

        Ok(Self {
            registry,
            http_requests_total,
            http_request_duration,
            prescriptions_created,
            stock_rejections,
            invoices_paid,
            admissions,
            discharges,
            active_inpatients,
        })
    }

    /// 记录HTTP请求
    pub fn record_http_request(&self, method: &str, path: &str, status: u16, duration: Duration) {
        debug!("HTTP request: {} {} - {} in {:?}", method, path, status, duration);

        self.http_requests_total
            .with_label_values(&[method, &status.to_string()])
            .inc();
        self.http_request_duration.observe(duration.as_secs_f64());
    }

    pub fn record_prescription(&self) {
        self.prescriptions_created.inc();
    }

    pub fn record_stock_rejection(&self) {
        self.stock_rejections.inc();
    }

    pub fn record_invoice(&self) {
        self.invoices_paid.inc();
    }

    pub fn record_admission(&self) {
        self.admissions.inc();
        self.active_inpatients.inc();
    }

    pub fn record_discharge(&self) {
        self.discharges.inc();
        self.active_inpatients.dec();
    }

    /// 启动时用数据库中的实际数量校准
    pub fn set_active_inpatients(&self, count: i64) {
        self.active_inpatients.set(count);
    }

    /// 获取Prometheus文本格式指标
    pub fn render(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;

        Ok(String::from_utf8(buffer)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_render() {
        let metrics = HospitalMetrics::new().unwrap();
        metrics.record_http_request("GET", "/health", 200, Duration::from_millis(3));
        metrics.record_prescription();
        metrics.record_stock_rejection();

        let text = metrics.render().unwrap();
        assert!(text.contains("http_requests_total{method=\"GET\",status=\"200\"} 1"));
        assert!(text.contains("prescriptions_created_total 1"));
        assert!(text.contains("stock_rejections_total 1"));
    }

    #[test]
    fn test_active_inpatient_gauge() {
        let metrics = HospitalMetrics::new().unwrap();
        metrics.set_active_inpatients(4);
        metrics.record_admission();
        metrics.record_discharge();
        metrics.record_discharge();

        let text = metrics.render().unwrap();
        assert!(text.contains("inpatients_active 3"));
        assert!(text.contains("inpatient_admissions_total 1"));
        assert!(text.contains("inpatient_discharges_total 2"));
    }
}
