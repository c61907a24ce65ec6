//! 服务监控指标
//!
//! 每个实例持有独立的 Prometheus 注册表，由 `/metrics` 以文本格式导出。

use anyhow::Result;
use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};

/// 服务指标收集器
#[derive(Clone)]
pub struct ServiceMetrics {
    /// Prometheus指标注册表
    registry: Registry,
    /// HTTP请求计数器
    http_requests_total: IntCounterVec,
    /// 分类结果计数器
    classifications_total: IntCounterVec,
    /// 删除记录计数器
    records_deleted_total: IntCounterVec,
}

impl ServiceMetrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let http_requests_total = IntCounterVec::new(
            Opts::new("xspand_http_requests_total", "Total number of HTTP requests"),
            &["method", "status"],
        )?;
        let classifications_total = IntCounterVec::new(
            Opts::new("xspand_classifications_total", "Classification attempts by outcome"),
            &["outcome"],
        )?;
        let records_deleted_total = IntCounterVec::new(
            Opts::new("xspand_records_deleted_total", "Records deleted by collection"),
            &["collection"],
        )?;

        registry.register(Box::new(http_requests_total.clone()))?;
        registry.register(Box::new(classifications_total.clone()))?;
        registry.register(Box::new(records_deleted_total.clone()))?;

        Ok(Self {
            registry,
            http_requests_total,
            classifications_total,
            records_deleted_total,
        })
    }

    pub fn record_http_request(&self, method: &str, status: u16) {
        self.http_requests_total
            .with_label_values(&[method, &status.to_string()])
            .inc();
    }

    /// `outcome` 取 `labeled` 或 `failed`
    pub fn record_classification(&self, outcome: &str) {
        self.classifications_total.with_label_values(&[outcome]).inc();
    }

    pub fn record_deletions(&self, collection: &str, count: usize) {
        self.records_deleted_total
            .with_label_values(&[collection])
            .inc_by(count as u64);
    }

    /// 获取Prometheus指标
    pub fn export(&self) -> Result<String> {
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
    fn test_export_contains_recorded_metrics() {
        let metrics = ServiceMetrics::new().unwrap();
        metrics.record_http_request("GET", 200);
        metrics.record_classification("labeled");
        metrics.record_deletions("patients", 1);
        metrics.record_deletions("doctor_patient_relations", 3);

        let text = metrics.export().unwrap();
        assert!(text.contains("xspand_http_requests_total{method=\"GET\",status=\"200\"} 1"));
        assert!(text.contains("xspand_classifications_total{outcome=\"labeled\"} 1"));
        assert!(text.contains("xspand_records_deleted_total{collection=\"doctor_patient_relations\"} 3"));
    }

    #[test]
    fn test_instances_do_not_share_registries() {
        let first = ServiceMetrics::new().unwrap();
        let second = ServiceMetrics::new().unwrap();
        first.record_classification("failed");

        assert!(!second.export().unwrap().contains("outcome=\"failed\""));
    }
}
