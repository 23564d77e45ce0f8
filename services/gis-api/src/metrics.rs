//! Prometheus counters.

use metrics::counter;

/// Count a request against its route label.
pub fn record_request(route: &'static str) {
    counter!("gis_requests_total", "route" => route).increment(1);
}

pub fn record_ingested_features(count: usize) {
    counter!("gis_ingested_features_total").increment(count as u64);
}

pub fn record_proxy_error(kind: &'static str) {
    counter!("gis_geoserver_proxy_errors_total", "kind" => kind).increment(1);
}
