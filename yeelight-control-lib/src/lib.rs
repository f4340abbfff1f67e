//! # Yeelight Control Library
//!
//! `yeelight-control-lib` discovers Yeelight smart lights on the local network and
//! controls them over their LAN protocol.
//!
//! Discovery is a multicast search on `239.255.255.250:1982`; devices answer with
//! HTTP-like `key: value` lines. Control is one JSON object per command, sent over
//! a short-lived TCP connection to port 55443, answered by one JSON reply.
//!
//! The "LAN Control" switch must be enabled for a device in the Yeelight app
//! before it answers either exchange.
//!
//! ## Example
//!
//! ```no_run
//! use std::time::Duration;
//! use yeelight_control_lib::control_interface::ControlInterface;
//! use yeelight_control_lib::util::discovery::{Discovery, DiscoveryConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let devices = Discovery::find_devices(&DiscoveryConfig::default(), Duration::from_secs(3)).await?;
//!
//!     let control = ControlInterface::default();
//!     for device in devices {
//!         if let Some((host, _)) = device.info.control_address() {
//!             let reply = control.set_brightness(&host, 40).await?;
//!             println!("{}: {:?}", device, reply);
//!         }
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Disclaimer
//!
//! This project is not affiliated with, authorized by, endorsed by, or in any way officially connected
//! with Yeelight or its affiliates.
//!
//! ## License
//!
//! This project is dual-licensed under the MIT License and the Apache License, Version 2.0.
//! You may choose to use either license, depending on your project needs.

// The `control_interface` module sends JSON commands to a device and decodes its
// replies. It also carries the convenience operations (power, brightness,
// color temperature, RGB, HSV, name) and the color helpers the CLI uses.
pub mod control_interface;

// The `device` module combines a discovery listener with the command interface
// into a single handle.
pub mod device;

pub mod error;

// The `util` module holds the discovery exchange: the search probe, the response
// parser and the listener that owns the multicast socket.
pub mod util;

pub use error::{Error, Result};
