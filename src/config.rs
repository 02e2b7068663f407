pub const DEFAULT_PORT: u16 = 4000;
pub const DEFAULT_STORE_URL: &str = "memory://";

pub fn get_port() -> u16 {
    std::env::var("PORT").ok().and_then(|value| value.trim().parse().ok()).unwrap_or_else(|| {
        tracing::trace!("PORT not set, using default: {DEFAULT_PORT}");
        DEFAULT_PORT
    })
}

pub fn get_store_url() -> String {
    std::env::var("STORE_URL").unwrap_or_else(|_| {
        tracing::trace!("STORE_URL not set, using default: {DEFAULT_STORE_URL}");
        DEFAULT_STORE_URL.to_string()
    })
}
