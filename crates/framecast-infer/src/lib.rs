mod mock;
mod remote;

use std::sync::Arc;

use framecast_core::Detector;
use tracing::info;

pub use mock::MockDetector;
pub use remote::RemoteDetector;

// `wasm` mode runs inference in the browser; the server keeps the
// mock backend so its own pipeline stays exercised.
pub fn select_backend(mode: &str, endpoint: Option<String>) -> Arc<dyn Detector> {
    let detector: Arc<dyn Detector> = match (mode, endpoint) {
        ("server", Some(url)) => {
            info!("Forwarding server-side inference to {}", url);
            Arc::new(RemoteDetector::new(url))
        }
        _ => Arc::new(MockDetector::new()),
    };
    info!(
        "Selected {} inference backend (requested mode: {})",
        detector.mode(),
        mode
    );
    detector
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_selection_follows_mode_and_endpoint() {
        assert_eq!(select_backend("wasm", None).mode(), "mock");
        assert_eq!(select_backend("server", None).mode(), "mock");
        assert_eq!(
            select_backend("server", Some("http://localhost:8500/detect".into())).mode(),
            "server"
        );
    }
}
