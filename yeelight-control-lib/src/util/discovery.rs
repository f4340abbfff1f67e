use std::cmp::max;
use std::collections::HashSet;
use std::fmt::{Display, Formatter};
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use derivative::Derivative;
use log::{debug, error, info};
use serde::Serialize;
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout, Instant};

use crate::error::Result;

/// One unbounded queue per subscriber, so a slow handler never loses a response.
type Subscribers = Arc<Mutex<Vec<mpsc::UnboundedSender<DiscoveredDevice>>>>;

pub const MULTICAST_ADDRESS: Ipv4Addr = Ipv4Addr::new(239, 255, 255, 250);
pub const DISCOVERY_PORT: u16 = 1982;
pub const MULTICAST_TTL: u32 = 128;

const RECEIVE_BUFFER_SIZE: usize = 2048;
const RECEIVE_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Socket parameters for the discovery channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryConfig {
    pub multicast_addr: Ipv4Addr,
    pub port: u16,
    /// Local interface used for binding and group membership.
    pub interface: Ipv4Addr,
    pub multicast_ttl: u32,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        DiscoveryConfig {
            multicast_addr: MULTICAST_ADDRESS,
            port: DISCOVERY_PORT,
            interface: Ipv4Addr::UNSPECIFIED,
            multicast_ttl: MULTICAST_TTL,
        }
    }
}

impl DiscoveryConfig {
    /// The multicast group and port probes are sent to.
    pub fn target(&self) -> SocketAddr {
        SocketAddrV4::new(self.multicast_addr, self.port).into()
    }
}

/// Builds the search probe sent to `target`.
pub fn probe_message(target: SocketAddr) -> String {
    format!(
        "M-SEARCH * HTTP/1.1\r\n\
         HOST: {target}\r\n\
         MAN: \"ssdp:discover\"\r\n\
         ST: wifi_bulb\r\n\
         MX: 2\r\n\
         \r\n"
    )
}

/// The fields a device reports in a discovery response or advertisement.
///
/// Every field is optional. Keys the parser does not recognise are dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
pub struct DeviceInfo {
    /// Control endpoint, e.g. `yeelight://192.168.1.239:55443`.
    pub location: Option<String>,
    pub id: Option<String>,
    pub model: Option<String>,
    /// `on` or `off`.
    pub power: Option<String>,
    /// Range 1..100.
    pub brightness: Option<String>,
    /// 1 = rgb, 2 = color temperature, 3 = hsv.
    pub color_mode: Option<String>,
    /// Kelvin.
    pub color_temperature: Option<String>,
    pub rgb: Option<String>,
    pub hue: Option<String>,
    pub saturation: Option<String>,
    pub name: Option<String>,
    pub firmware_version: Option<String>,
    /// Space separated list of supported methods.
    pub support: Option<String>,
}

impl DeviceInfo {
    /// Parses a CRLF delimited `key: value` response.
    ///
    /// Never fails: lines without a colon, empty lines and unknown keys are skipped.
    /// Only the first colon separates key from value, so `location` keeps its port.
    pub fn parse(response: &str) -> Self {
        let mut info = DeviceInfo::default();
        for line in response.split("\r\n") {
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let key = key.trim().to_lowercase();
            if let Some(field) = info.field_mut(&key) {
                *field = Some(value.trim().to_string());
            }
        }
        info
    }

    fn field_mut(&mut self, key: &str) -> Option<&mut Option<String>> {
        let field = match key {
            "location" => &mut self.location,
            "id" => &mut self.id,
            "model" => &mut self.model,
            "power" => &mut self.power,
            "bright" | "brightness" => &mut self.brightness,
            "color_mode" => &mut self.color_mode,
            "ct" | "color_temperature" => &mut self.color_temperature,
            "rgb" => &mut self.rgb,
            "hue" => &mut self.hue,
            "sat" | "saturation" => &mut self.saturation,
            "name" => &mut self.name,
            "fw_ver" | "firmware_version" => &mut self.firmware_version,
            "support" => &mut self.support,
            _ => return None,
        };
        Some(field)
    }

    /// True if no recognised field was present.
    pub fn is_empty(&self) -> bool {
        *self == DeviceInfo::default()
    }

    /// Host and port of the control endpoint, taken from `location`.
    pub fn control_address(&self) -> Option<(String, u16)> {
        let location = self.location.as_deref()?;
        let authority = location.strip_prefix("yeelight://").unwrap_or(location);
        let authority = authority.split('/').next()?;
        let (host, port) = authority.rsplit_once(':')?;
        if host.is_empty() {
            return None;
        }
        Some((host.to_string(), port.parse().ok()?))
    }

    pub fn supported_methods(&self) -> Vec<&str> {
        self.support
            .as_deref()
            .map(|support| support.split_whitespace().collect())
            .unwrap_or_default()
    }
}

/// A parsed response together with the address it came from.
///
/// Two responses describe the same device if their parsed fields match,
/// whichever port they were sent from.
#[derive(Derivative)]
#[derivative(Hash, PartialEq, Eq)]
#[derive(Debug, Clone, Serialize)]
pub struct DiscoveredDevice {
    #[derivative(Hash = "ignore", PartialEq = "ignore")]
    pub source: SocketAddr,
    #[serde(flatten)]
    pub info: DeviceInfo,
}

impl DiscoveredDevice {
    fn dedup_key(&self) -> String {
        self.info
            .id
            .clone()
            .unwrap_or_else(|| self.source.ip().to_string())
    }
}

impl Display for DiscoveredDevice {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "ID: {}, Model: {}, Location: {}",
            self.info.id.as_deref().unwrap_or("-"),
            self.info.model.as_deref().unwrap_or("-"),
            self.info.location.as_deref().unwrap_or("-"),
        )
    }
}

/// Handle for a handler registered with [`DiscoveryListener::on_discovery_response`].
///
/// Dropping it leaves the handler running. The handler stops once the listener closes.
pub struct Subscription {
    task: JoinHandle<()>,
}

impl Subscription {
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Waits until the handler has seen the listener close.
    pub async fn finished(self) {
        let _ = self.task.await;
    }
}

/**
Owns the discovery socket for its whole lifetime.

Every inbound datagram is parsed once and fanned out to all registered handlers.
The socket is released by [`DiscoveryListener::close`] or when the listener is dropped.
 */
pub struct DiscoveryListener {
    socket: Arc<UdpSocket>,
    target: SocketAddr,
    subscribers: Subscribers,
    receive_task: JoinHandle<()>,
}

impl DiscoveryListener {
    /// Binds the discovery port, joins the multicast group and starts receiving.
    pub async fn open(config: &DiscoveryConfig) -> Result<Self> {
        let socket = UdpSocket::from_std(Self::bind_multicast(config)?)?;
        info!(
            "UDP client listening on {}, joined {}",
            socket.local_addr()?,
            config.multicast_addr
        );
        Ok(Self::from_socket(socket, config.target()))
    }

    /**
    Adopts an already configured socket. Probes are sent to `target`.

    Must be called from within a tokio runtime.
     */
    pub fn from_socket(socket: UdpSocket, target: SocketAddr) -> Self {
        let socket = Arc::new(socket);
        let subscribers = Subscribers::default();
        let receive_task = tokio::spawn(Self::receive_loop(socket.clone(), subscribers.clone()));
        DiscoveryListener {
            socket,
            target,
            subscribers,
            receive_task,
        }
    }

    fn bind_multicast(config: &DiscoveryConfig) -> Result<std::net::UdpSocket> {
        let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
        socket.set_reuse_address(true)?;
        socket.set_broadcast(true)?;
        socket.set_multicast_ttl_v4(config.multicast_ttl)?;
        // Our own probe would otherwise come back as a response.
        socket.set_multicast_loop_v4(false)?;
        let bind_address = SocketAddrV4::new(config.interface, config.port);
        socket.bind(&bind_address.into())?;
        socket.join_multicast_v4(&config.multicast_addr, &config.interface)?;
        socket.set_nonblocking(true)?;
        Ok(socket.into())
    }

    async fn receive_loop(socket: Arc<UdpSocket>, subscribers: Subscribers) {
        let mut buffer = [0u8; RECEIVE_BUFFER_SIZE];
        loop {
            match socket.recv_from(&mut buffer).await {
                Ok((number_of_bytes, source)) => {
                    let text = String::from_utf8_lossy(&buffer[..number_of_bytes]);
                    debug!("Received message from {}: {:?}", source, text);
                    let device = DiscoveredDevice {
                        source,
                        info: DeviceInfo::parse(&text),
                    };
                    debug!("Device info: {:?}", device.info);
                    Self::deliver(&subscribers, device);
                }
                Err(e) => {
                    error!("Failed to receive discovery response: {}", e);
                    sleep(RECEIVE_ERROR_BACKOFF).await;
                }
            }
        }
    }

    /// Hands `device` to every live subscriber and forgets the ones that went away.
    fn deliver(subscribers: &Subscribers, device: DiscoveredDevice) {
        let mut subscribers = subscribers.lock().unwrap_or_else(PoisonError::into_inner);
        subscribers.retain(|subscriber| subscriber.send(device.clone()).is_ok());
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Sends one search probe. A failed send leaves the listener usable.
    pub async fn send_discovery(&self) -> Result<()> {
        let message = probe_message(self.target);
        match self.socket.send_to(message.as_bytes(), self.target).await {
            Ok(_) => {
                info!("Discovery message sent to {}", self.target);
                Ok(())
            }
            Err(e) => {
                error!("Failed to send discovery message: {}", e);
                Err(e.into())
            }
        }
    }

    /// Runs `handler` for every datagram received from now until the listener closes.
    pub fn on_discovery_response<F>(&self, mut handler: F) -> Subscription
    where
        F: FnMut(DiscoveredDevice) + Send + 'static,
    {
        let mut receiver = self.subscribe();
        let task = tokio::spawn(async move {
            while let Some(device) = receiver.recv().await {
                handler(device);
            }
        });
        Subscription { task }
    }

    /**
    Stream-style access to the same responses the handlers receive.

    The queue is unbounded; the receiver yields `None` once the listener closes.
     */
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<DiscoveredDevice> {
        let (sender, receiver) = mpsc::unbounded_channel();
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(sender);
        receiver
    }

    /**
    Sends a probe and gathers responses until `given_timeout` elapses.

    Devices answering more than once are reported once. Responses without any
    recognised field are skipped.
     */
    pub async fn collect_devices(&self, given_timeout: Duration) -> Result<Vec<DiscoveredDevice>> {
        let mut receiver = self.subscribe();
        self.send_discovery().await?;

        let mut seen = HashSet::new();
        let mut devices = Vec::new();
        let timeout_end = Instant::now() + given_timeout;

        loop {
            let remaining_time = timeout_end.saturating_duration_since(Instant::now());
            if remaining_time.is_zero() {
                break;
            }
            match timeout(remaining_time, receiver.recv()).await {
                Ok(Some(device)) => {
                    if device.info.is_empty() {
                        debug!("Ignoring response from {} without device fields", device.source);
                        continue;
                    }
                    if !seen.insert(device.dedup_key()) {
                        info!("Found device {} again, skipping", device);
                        continue;
                    }
                    info!("Found device: {}", device);
                    devices.push(device);
                }
                Ok(None) => break,
                Err(_) => {
                    info!("Discovery time complete. If devices are missing, try increasing the search timeout.");
                    break;
                }
            }
        }

        Ok(devices)
    }

    /// Stops receiving and releases the socket.
    pub fn close(self) {
        debug!("Closing discovery listener");
    }
}

impl Drop for DiscoveryListener {
    fn drop(&mut self) {
        self.receive_task.abort();
    }
}

pub struct Discovery;

impl Discovery {
    /// Opens a listener, probes once, and returns what answered within `given_timeout`.
    pub async fn find_devices(
        config: &DiscoveryConfig,
        given_timeout: Duration,
    ) -> Result<Vec<DiscoveredDevice>> {
        let listener = DiscoveryListener::open(config).await?;
        let devices = listener.collect_devices(given_timeout).await;
        listener.close();
        devices
    }

    pub fn pretty_print_devices(devices: &[DiscoveredDevice]) {
        let address = |d: &DiscoveredDevice| match d.info.control_address() {
            Some((host, port)) => format!("{}:{}", host, port),
            None => d.source.ip().to_string(),
        };
        let field = |value: &Option<String>| value.clone().unwrap_or_else(|| "-".to_string());

        let rows: Vec<[String; 5]> = devices
            .iter()
            .map(|d| {
                [
                    address(d),
                    field(&d.info.id),
                    field(&d.info.model),
                    field(&d.info.power),
                    field(&d.info.name),
                ]
            })
            .collect();
        let header = ["Address", "Device ID", "Model", "Power", "Name"];

        let mut widths = header.map(str::len);
        for row in &rows {
            for (width, cell) in widths.iter_mut().zip(row) {
                *width = max(*width, cell.len());
            }
        }

        let print_row = |cells: [&str; 5]| {
            println!(
                "{:<w0$} {:<w1$} {:<w2$} {:<w3$} {:<w4$}",
                cells[0],
                cells[1],
                cells[2],
                cells[3],
                cells[4],
                w0 = widths[0] + 2, // Add some padding
                w1 = widths[1] + 2,
                w2 = widths[2] + 2,
                w3 = widths[3] + 2,
                w4 = widths[4] + 2,
            );
        };

        print_row(header);
        let separators = widths.map(|width| "-".repeat(width));
        print_row(separators.each_ref().map(String::as_str));
        for row in &rows {
            print_row(row.each_ref().map(String::as_str));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    const RESPONSE: &str = "HTTP/1.1 200 OK\r\n\
        Cache-Control: max-age=3600\r\n\
        Date: \r\n\
        Ext: \r\n\
        Location: yeelight://192.168.1.239:55443\r\n\
        Server: POSIX UPnP/1.0 YGLC/1\r\n\
        id: 0x000000000015243f\r\n\
        model: color\r\n\
        fw_ver: 18\r\n\
        support: get_prop set_default set_power toggle set_bright start_cf stop_cf\r\n\
        power: on\r\n\
        bright: 100\r\n\
        color_mode: 2\r\n\
        ct: 4000\r\n\
        rgb: 16711680\r\n\
        hue: 100\r\n\
        sat: 35\r\n\
        name: my_bulb\r\n";

    const WAIT: Duration = Duration::from_secs(2);

    #[test]
    fn test_probe_message_default_constants() {
        let probe = probe_message(DiscoveryConfig::default().target());
        assert_eq!(
            probe,
            "M-SEARCH * HTTP/1.1\r\nHOST: 239.255.255.250:1982\r\nMAN: \"ssdp:discover\"\r\nST: wifi_bulb\r\nMX: 2\r\n\r\n"
        );
    }

    #[test]
    fn test_parse_device_response() {
        let info = DeviceInfo::parse(RESPONSE);
        assert_eq!(info.location.as_deref(), Some("yeelight://192.168.1.239:55443"));
        assert_eq!(info.id.as_deref(), Some("0x000000000015243f"));
        assert_eq!(info.model.as_deref(), Some("color"));
        assert_eq!(info.power.as_deref(), Some("on"));
        assert_eq!(info.brightness.as_deref(), Some("100"));
        assert_eq!(info.color_mode.as_deref(), Some("2"));
        assert_eq!(info.color_temperature.as_deref(), Some("4000"));
        assert_eq!(info.rgb.as_deref(), Some("16711680"));
        assert_eq!(info.hue.as_deref(), Some("100"));
        assert_eq!(info.saturation.as_deref(), Some("35"));
        assert_eq!(info.name.as_deref(), Some("my_bulb"));
        assert_eq!(info.firmware_version.as_deref(), Some("18"));
    }

    #[test]
    fn test_parse_is_deterministic() {
        assert_eq!(DeviceInfo::parse(RESPONSE), DeviceInfo::parse(RESPONSE));
    }

    #[test]
    fn test_parse_ignores_unknown_keys() {
        let info = DeviceInfo::parse("id: 0x1\r\nfoo: bar\r\n");
        assert_eq!(
            info,
            DeviceInfo {
                id: Some("0x1".to_string()),
                ..Default::default()
            }
        );
    }

    #[test]
    fn test_parse_skips_lines_without_colon() {
        let info = DeviceInfo::parse("garbage\r\n\r\nmodel: mono\r\n");
        assert_eq!(
            info,
            DeviceInfo {
                model: Some("mono".to_string()),
                ..Default::default()
            }
        );
    }

    #[test]
    fn test_parse_normalizes_keys_and_values() {
        let info = DeviceInfo::parse("  POWER :   off  \r\nBrightness: 42");
        assert_eq!(info.power.as_deref(), Some("off"));
        assert_eq!(info.brightness.as_deref(), Some("42"));
    }

    #[test]
    fn test_parse_garbage_yields_empty_info() {
        assert!(DeviceInfo::parse("\u{0}\u{1}not a response").is_empty());
    }

    #[test]
    fn test_control_address() {
        let info = DeviceInfo::parse(RESPONSE);
        assert_eq!(
            info.control_address(),
            Some(("192.168.1.239".to_string(), 55443))
        );

        let missing_port = DeviceInfo {
            location: Some("yeelight://192.168.1.239".to_string()),
            ..Default::default()
        };
        assert_eq!(missing_port.control_address(), None);
        assert_eq!(DeviceInfo::default().control_address(), None);
    }

    #[test]
    fn test_supported_methods() {
        let info = DeviceInfo::parse(RESPONSE);
        let methods = info.supported_methods();
        assert_eq!(methods.len(), 7);
        assert!(methods.contains(&"set_bright"));
        assert!(DeviceInfo::default().supported_methods().is_empty());
    }

    #[test]
    fn test_discovered_device_equality_ignores_source() {
        let info = DeviceInfo::parse(RESPONSE);
        let a = DiscoveredDevice {
            source: "192.168.1.239:1982".parse().unwrap(),
            info: info.clone(),
        };
        let b = DiscoveredDevice {
            source: "192.168.1.239:40000".parse().unwrap(),
            info,
        };
        assert_eq!(a, b);
    }

    async fn loopback_listener() -> (DiscoveryListener, UdpSocket) {
        let device = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let listener = DiscoveryListener::from_socket(socket, device.local_addr().unwrap());
        (listener, device)
    }

    #[tokio::test]
    async fn test_send_discovery_transmits_probe() {
        let (listener, device) = loopback_listener().await;
        listener.send_discovery().await.unwrap();

        let mut buffer = [0u8; 512];
        let (n, source) = timeout(WAIT, device.recv_from(&mut buffer))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(source, listener.local_addr().unwrap());
        assert_eq!(
            &buffer[..n],
            probe_message(device.local_addr().unwrap()).as_bytes()
        );
    }

    #[tokio::test]
    async fn test_every_handler_receives_every_response() {
        let (listener, device) = loopback_listener().await;
        let (first_tx, mut first_rx) = mpsc::unbounded_channel();
        let (second_tx, mut second_rx) = mpsc::unbounded_channel();
        let _first = listener.on_discovery_response(move |d| {
            let _ = first_tx.send(d);
        });
        let _second = listener.on_discovery_response(move |d| {
            let _ = second_tx.send(d);
        });

        let target = listener.local_addr().unwrap();
        device.send_to(RESPONSE.as_bytes(), target).await.unwrap();
        device.send_to(b"id: 0x2\r\n", target).await.unwrap();

        for rx in [&mut first_rx, &mut second_rx] {
            let first = timeout(WAIT, rx.recv()).await.unwrap().unwrap();
            assert_eq!(first.info, DeviceInfo::parse(RESPONSE));
            assert_eq!(first.source, device.local_addr().unwrap());
            let second = timeout(WAIT, rx.recv()).await.unwrap().unwrap();
            assert_eq!(second.info.id.as_deref(), Some("0x2"));
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_slow_handler_sees_every_response_in_a_burst() {
        const BURST: usize = 200;
        let (listener, device) = loopback_listener().await;
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _subscription = listener.on_discovery_response(move |d| {
            std::thread::sleep(Duration::from_millis(2));
            let _ = tx.send(d);
        });

        let target = listener.local_addr().unwrap();
        for n in 0..BURST {
            device
                .send_to(format!("id: {n}\r\n").as_bytes(), target)
                .await
                .unwrap();
            // Keep the kernel receive buffer from overflowing.
            if n % 16 == 15 {
                sleep(Duration::from_millis(1)).await;
            }
        }

        for n in 0..BURST {
            let device = timeout(Duration::from_secs(5), rx.recv())
                .await
                .unwrap()
                .unwrap();
            assert_eq!(device.info.id, Some(n.to_string()));
        }
    }

    #[tokio::test]
    async fn test_receive_error_keeps_listener_running() {
        let device = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let device_address = device.local_addr().unwrap();
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        socket.connect(device_address).await.unwrap();
        let listener = DiscoveryListener::from_socket(socket, device_address);
        let mut receiver = listener.subscribe();

        // Nobody listens on the port any more; the ICMP reply surfaces as a receive error.
        drop(device);
        listener.send_discovery().await.unwrap();
        sleep(RECEIVE_ERROR_BACKOFF / 2).await;

        let device = UdpSocket::bind(device_address).await.unwrap();
        device
            .send_to(RESPONSE.as_bytes(), listener.local_addr().unwrap())
            .await
            .unwrap();
        let received = timeout(WAIT, receiver.recv()).await.unwrap().unwrap();
        assert_eq!(received.info.model.as_deref(), Some("color"));
    }

    #[tokio::test]
    async fn test_handlers_finish_after_close() {
        let (listener, _device) = loopback_listener().await;
        let subscription = listener.on_discovery_response(|_| {});
        assert!(!subscription.is_finished());
        listener.close();
        assert!(timeout(WAIT, subscription.finished()).await.is_ok());
    }

    #[tokio::test]
    async fn test_failed_send_keeps_listener_usable() {
        let device = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        // An IPv6 target cannot be reached from an IPv4 socket.
        let listener = DiscoveryListener::from_socket(socket, "[::1]:1982".parse().unwrap());
        let mut receiver = listener.subscribe();

        assert!(listener.send_discovery().await.is_err());

        device
            .send_to(RESPONSE.as_bytes(), listener.local_addr().unwrap())
            .await
            .unwrap();
        let received = timeout(WAIT, receiver.recv()).await.unwrap().unwrap();
        assert_eq!(received.info.model.as_deref(), Some("color"));
    }

    #[tokio::test]
    async fn test_collect_devices_deduplicates() {
        let (listener, device) = loopback_listener().await;
        let responder = tokio::spawn(async move {
            let mut buffer = [0u8; 512];
            let (_, source) = device.recv_from(&mut buffer).await.unwrap();
            device.send_to(RESPONSE.as_bytes(), source).await.unwrap();
            device.send_to(RESPONSE.as_bytes(), source).await.unwrap();
            device.send_to(b"garbage\r\n", source).await.unwrap();
            device
                .send_to(b"id: 0x2\r\nmodel: mono\r\n", source)
                .await
                .unwrap();
        });

        let devices = listener
            .collect_devices(Duration::from_millis(500))
            .await
            .unwrap();
        responder.await.unwrap();

        assert_eq!(devices.len(), 2);
        assert_eq!(devices[0].info.id.as_deref(), Some("0x000000000015243f"));
        assert_eq!(devices[1].info.model.as_deref(), Some("mono"));
    }
}
