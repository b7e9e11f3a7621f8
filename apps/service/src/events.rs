use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

use crate::monitoring::types::NodeStatus;

/// Notable service events, fanned out to whoever subscribed
#[derive(Debug, Clone, PartialEq)]
pub enum ServiceEvent {
    ProxiesUpdated { count: usize },
    ProxyRefreshFailed { url: String, error: String },
    NodeChecked { id: Uuid, url: String, status: NodeStatus },
}

static BUS_TX: std::sync::OnceLock<broadcast::Sender<ServiceEvent>> = std::sync::OnceLock::new();

fn bus() -> &'static broadcast::Sender<ServiceEvent> {
    BUS_TX.get_or_init(|| {
        let (tx, _rx) = broadcast::channel::<ServiceEvent>(256);
        tx
    })
}

pub fn subscribe() -> broadcast::Receiver<ServiceEvent> { bus().subscribe() }

pub fn publish_proxies_updated(count: usize) { publish(ServiceEvent::ProxiesUpdated { count }); }

pub fn publish_proxy_refresh_failed(url: String, error: String) {
    debug!(url = %url, "event bus: proxy refresh failure");
    publish(ServiceEvent::ProxyRefreshFailed { url, error });
}

pub fn publish_node_checked(id: Uuid, url: String, status: NodeStatus) {
    publish(ServiceEvent::NodeChecked { id, url, status });
}

fn publish(ev: ServiceEvent) {
    // No receivers is fine
    let _ = bus().send(ev);
}
