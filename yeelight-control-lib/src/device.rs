use log::info;

use crate::control_interface::{CommandConfig, ControlInterface};
use crate::error::Result;
use crate::util::discovery::{DiscoveredDevice, DiscoveryConfig, DiscoveryListener, Subscription};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct YeelightConfig {
    pub discovery: DiscoveryConfig,
    pub command: CommandConfig,
}

/**
One discovery channel plus the command interface.

Commands never go through the discovery channel: any address, discovered or
not, can be passed to [`Yeelight::control`].
 */
pub struct Yeelight {
    listener: DiscoveryListener,
    control: ControlInterface,
}

impl Yeelight {
    pub async fn open(config: YeelightConfig) -> Result<Self> {
        let listener = DiscoveryListener::open(&config.discovery).await?;
        Ok(Self::with_listener(listener, config.command))
    }

    /// Uses an already opened listener, e.g. one built with [`DiscoveryListener::from_socket`].
    pub fn with_listener(listener: DiscoveryListener, command: CommandConfig) -> Self {
        Yeelight {
            listener,
            control: ControlInterface::new(command),
        }
    }

    pub async fn send_discovery(&self) -> Result<()> {
        self.listener.send_discovery().await
    }

    pub fn on_discovery_response<F>(&self, handler: F) -> Subscription
    where
        F: FnMut(DiscoveredDevice) + Send + 'static,
    {
        self.listener.on_discovery_response(handler)
    }

    pub fn discovery(&self) -> &DiscoveryListener {
        &self.listener
    }

    pub fn control(&self) -> &ControlInterface {
        &self.control
    }

    /// Releases the discovery socket. Registered handlers finish afterwards.
    pub fn close(self) {
        info!("Closing Yeelight handle");
        self.listener.close();
    }
}
