use std::{
    collections::HashMap,
    sync::{Mutex, OnceLock},
};

static METRICS: OnceLock<Mutex<MetricsState>> = OnceLock::new();

struct MetricsState {
    total: u64,
    errors: u64,
    per_endpoint: HashMap<&'static str, u64>,
    per_endpoint_err: HashMap<&'static str, u64>,
    // 上游 RPC 成功/失败与时延统计（毫秒）
    upstream_ok: u64,
    upstream_err: u64,
    upstream_latency_sum_ms: u128,
    // 简易直方图分桶（毫秒）：<50, <100, <250, <500, <1000, >=1000
    upstream_hist_buckets: [u64; 6],
    // 报价与转发相关
    quotes_issued: u64,
    estimates_served: u64,
    relays_submitted: u64,
    relays_failed: u64,
    relays_requeued: u64,
    relays_unsupported: u64,
    relays_underpaid: u64,
}

fn state() -> &'static Mutex<MetricsState> {
    METRICS.get_or_init(|| {
        Mutex::new(MetricsState {
            total: 0,
            errors: 0,
            per_endpoint: HashMap::new(),
            per_endpoint_err: HashMap::new(),
            upstream_ok: 0,
            upstream_err: 0,
            upstream_latency_sum_ms: 0,
            upstream_hist_buckets: [0; 6],
            quotes_issued: 0,
            estimates_served: 0,
            relays_submitted: 0,
            relays_failed: 0,
            relays_requeued: 0,
            relays_unsupported: 0,
            relays_underpaid: 0,
        })
    })
}

fn lock() -> std::sync::MutexGuard<'static, MetricsState> {
    match state().lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(), // 避免因锁污染导致 panic
    }
}

pub fn count_ok(endpoint: &'static str) {
    let mut s = lock();
    s.total += 1;
    *s.per_endpoint.entry(endpoint).or_insert(0) += 1;
}

pub fn count_err(endpoint: &'static str) {
    let mut s = lock();
    s.total += 1;
    s.errors += 1;
    *s.per_endpoint.entry(endpoint).or_insert(0) += 1;
    *s.per_endpoint_err.entry(endpoint).or_insert(0) += 1;
}

pub fn observe_upstream(ok: bool, latency_ms: u128) {
    let mut s = lock();
    if ok {
        s.upstream_ok += 1;
    } else {
        s.upstream_err += 1;
    }
    s.upstream_latency_sum_ms += latency_ms;
    let bucket = match latency_ms {
        0..=49 => 0,
        50..=99 => 1,
        100..=249 => 2,
        250..=499 => 3,
        500..=999 => 4,
        _ => 5,
    };
    s.upstream_hist_buckets[bucket] += 1;
}

pub fn inc_quote_issued() {
    lock().quotes_issued += 1;
}

pub fn inc_estimate_served() {
    lock().estimates_served += 1;
}

pub fn inc_relay_submitted() {
    lock().relays_submitted += 1;
}

pub fn inc_relay_failed() {
    lock().relays_failed += 1;
}

pub fn inc_relay_requeued() {
    lock().relays_requeued += 1;
}

pub fn inc_relay_unsupported() {
    lock().relays_unsupported += 1;
}

pub fn inc_relay_underpaid() {
    lock().relays_underpaid += 1;
}

pub fn render_prometheus() -> String {
    let s = lock();
    let mut out = String::new();
    out.push_str(&format!("ironrelay_requests_total {}\n", s.total));
    out.push_str(&format!("ironrelay_requests_errors_total {}\n", s.errors));
    for (endpoint, count) in &s.per_endpoint {
        out.push_str(&format!(
            "ironrelay_requests_total{{endpoint=\"{}\"}} {}\n",
            endpoint, count
        ));
    }
    for (endpoint, count) in &s.per_endpoint_err {
        out.push_str(&format!(
            "ironrelay_requests_errors_total{{endpoint=\"{}\"}} {}\n",
            endpoint, count
        ));
    }
    out.push_str(&format!("ironrelay_upstream_ok_total {}\n", s.upstream_ok));
    out.push_str(&format!(
        "ironrelay_upstream_err_total {}\n",
        s.upstream_err
    ));
    out.push_str(&format!(
        "ironrelay_upstream_latency_sum_ms {}\n",
        s.upstream_latency_sum_ms
    ));
    let labels = ["50", "100", "250", "500", "1000", "+Inf"];
    let mut cumulative = 0;
    for (i, label) in labels.iter().enumerate() {
        cumulative += s.upstream_hist_buckets[i];
        out.push_str(&format!(
            "ironrelay_upstream_latency_ms_bucket{{le=\"{}\"}} {}\n",
            label, cumulative
        ));
    }
    out.push_str(&format!(
        "ironrelay_quotes_issued_total {}\n",
        s.quotes_issued
    ));
    out.push_str(&format!(
        "ironrelay_estimates_served_total {}\n",
        s.estimates_served
    ));
    out.push_str(&format!(
        "ironrelay_relays_submitted_total {}\n",
        s.relays_submitted
    ));
    out.push_str(&format!(
        "ironrelay_relays_failed_total {}\n",
        s.relays_failed
    ));
    out.push_str(&format!(
        "ironrelay_relays_requeued_total {}\n",
        s.relays_requeued
    ));
    out.push_str(&format!(
        "ironrelay_relays_unsupported_total {}\n",
        s.relays_unsupported
    ));
    out.push_str(&format!(
        "ironrelay_relays_underpaid_total {}\n",
        s.relays_underpaid
    ));
    out
}
