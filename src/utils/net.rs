/// accept ip either like 127.0.0.1:2379 or a host name: etcd-0:2379
pub(crate) fn address_str(addr: &str) -> String {
    // Strip existing "http://" or "https://" prefixes if duplicated.
    let normalized = addr.trim().trim_start_matches("http://").trim_start_matches("https://");
    format!("http://{}", normalized)
}
