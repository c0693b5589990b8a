use crate::constants::*;
use crate::error::TransportError;
use crate::types::CommandToken;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::Duration;
use parking_lot::Mutex;
use btleplug::api::{Central, CentralEvent, CharPropFlags, Characteristic, Manager as _, Peripheral as _, ScanFilter, WriteType};
use btleplug::platform::{Manager, Peripheral};
use futures::stream::StreamExt;
use uuid::Uuid;

/// Called once when the link drops.
pub type DisconnectListener = Box<dyn FnOnce() + Send + 'static>;

/// A connected, single-channel link to the arm.
///
/// Implementations must tolerate being shared behind an `Arc`; the controller guarantees that
/// at most one `send` is outstanding at a time.
pub trait TransportPort: Send + Sync + 'static {
    /// Writes one token as a single byte. Resolves once the write is acknowledged or has failed.
    fn send(&self, token: CommandToken) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Registers the listener for link loss. It fires at most once, immediately if the link is
    /// already down.
    fn on_disconnected(&self, listener: DisconnectListener);

    fn is_connected(&self) -> bool;

    /// Tears the link down from our side.
    fn close(&self) -> impl Future<Output = Result<(), TransportError>> + Send {
        async { Ok(()) }
    }
}

#[derive(Debug, Clone)]
pub struct BleConfig {
    /// Match peripherals whose local name starts with this. `None` matches on the advertised
    /// service instead.
    pub name_prefix: Option<String>,
    pub service: Uuid,
    pub characteristic: Uuid,
    pub scan_timeout: Duration,
}

impl Default for BleConfig {
    fn default() -> Self {
        BleConfig {
            name_prefix: Some(DEFAULT_NAME_PREFIX.to_string()),
            service: SERVICE_UUID,
            characteristic: CHARACTERISTIC_UUID,
            scan_timeout: DEFAULT_SCAN_TIMEOUT,
        }
    }
}

/// Connected flag plus the pending disconnect listener, shared with watcher tasks.
pub(crate) struct LinkState {
    connected: AtomicBool,
    listener: Mutex<Option<DisconnectListener>>,
}

impl LinkState {
    pub(crate) fn new() -> Self {
        LinkState {
            connected: AtomicBool::new(true),
            listener: Mutex::new(None),
        }
    }

    pub(crate) fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    pub(crate) fn register(&self, listener: DisconnectListener) {
        let mut slot = self.listener.lock();
        if self.is_connected() {
            *slot = Some(listener);
        } else {
            drop(slot);
            listener();
        }
    }

    /// Marks the link down without firing the listener.
    pub(crate) fn close(&self) {
        self.connected.store(false, Ordering::SeqCst);
        self.listener.lock().take();
    }

    pub(crate) fn lost(&self) {
        self.connected.store(false, Ordering::SeqCst);
        let listener = self.listener.lock().take();
        if let Some(listener) = listener {
            listener();
        }
    }
}

pub struct BleTransport {
    device: Peripheral,
    characteristic: Characteristic,
    write_type: WriteType,
    link: Arc<LinkState>,
    watcher: JoinHandle<()>,
}

impl BleTransport {
    pub async fn connect(config: &BleConfig) -> Result<Self, TransportError> {
        let manager = Manager::new().await?;
        let adapters = manager.adapters().await?;
        let adapter = adapters.into_iter().next().ok_or(TransportError::NoAdapter)?;

        // Subscribe before scanning so no discovery or disconnect event is missed.
        let mut events = adapter.events().await?;
        adapter.start_scan(ScanFilter::default()).await?;

        log::info!("Scanning for arm...");

        let mut found_device = None;
        while let Ok(Some(event)) = tokio::time::timeout(config.scan_timeout, events.next()).await {
            if let CentralEvent::DeviceDiscovered(id) = event {
                let peripheral = adapter.peripheral(&id).await?;
                if let Ok(Some(properties)) = peripheral.properties().await {
                    let name_matches = match (&config.name_prefix, &properties.local_name) {
                        (Some(prefix), Some(name)) => name.starts_with(prefix.as_str()),
                        _ => false,
                    };
                    if name_matches || properties.services.contains(&config.service) {
                        log::debug!("Found {:?} ({:?})", properties.local_name, id);
                        found_device = Some(peripheral);
                        break;
                    }
                }
            }
        }

        adapter.stop_scan().await?;

        let device = found_device.ok_or(TransportError::NoDeviceFound)?;
        device.connect().await?;
        device.discover_services().await?;

        let characteristic = device.characteristics()
            .into_iter()
            .find(|c| c.uuid == config.characteristic && c.service_uuid == config.service)
            .ok_or(TransportError::CharacteristicNotFound)?;

        let write_type = if characteristic.properties.contains(CharPropFlags::WRITE) {
            WriteType::WithResponse
        } else {
            WriteType::WithoutResponse
        };

        let link = Arc::new(LinkState::new());

        let id = device.id();
        let watched = Arc::clone(&link);
        let watcher = tokio::spawn(async move {
            while let Some(event) = events.next().await {
                if let CentralEvent::DeviceDisconnected(gone) = event {
                    if gone == id {
                        log::info!("Arm disconnected");
                        watched.lost();
                        break;
                    }
                }
            }
        });

        log::info!("Connected via Bluetooth");
        Ok(BleTransport {
            device,
            characteristic,
            write_type,
            link,
            watcher,
        })
    }
}

impl TransportPort for BleTransport {
    async fn send(&self, token: CommandToken) -> Result<(), TransportError> {
        if !self.is_connected() {
            return Err(TransportError::Disconnected);
        }
        self.device.write(&self.characteristic, &[token.as_byte()], self.write_type).await?;
        Ok(())
    }

    fn on_disconnected(&self, listener: DisconnectListener) {
        self.link.register(listener);
    }

    fn is_connected(&self) -> bool {
        self.link.is_connected()
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.link.close();
        self.device.disconnect().await?;
        Ok(())
    }
}

impl Drop for BleTransport {
    fn drop(&mut self) {
        self.watcher.abort();
    }
}
