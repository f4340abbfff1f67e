use std::fmt;
use std::time::Duration;

use bytes::{Buf, BytesMut};
use clap::ValueEnum;
use log::{debug, info, warn};
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::error::{Error, Result};

pub const CONTROL_PORT: u16 = 55443;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Transition used by the convenience operations.
pub const TRANSITION_EFFECT: Effect = Effect::Smooth;
pub const TRANSITION_DURATION: Duration = Duration::from_millis(500);

/// Request ids are drawn uniformly from `0..REQUEST_ID_RANGE`.
const REQUEST_ID_RANGE: u32 = 10000;
const READ_BUFFER_SIZE: usize = 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandConfig {
    pub control_port: u16,
    /// Upper bound for connect, write and reply together.
    pub timeout: Duration,
}

impl Default for CommandConfig {
    fn default() -> Self {
        CommandConfig {
            control_port: CONTROL_PORT,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// A single command parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Param {
    Int(i64),
    Str(String),
}

impl From<i64> for Param {
    fn from(value: i64) -> Self {
        Param::Int(value)
    }
}

impl From<u32> for Param {
    fn from(value: u32) -> Self {
        Param::Int(value.into())
    }
}

impl From<u16> for Param {
    fn from(value: u16) -> Self {
        Param::Int(value.into())
    }
}

impl From<u8> for Param {
    fn from(value: u8) -> Self {
        Param::Int(value.into())
    }
}

impl From<&str> for Param {
    fn from(value: &str) -> Self {
        Param::Str(value.to_string())
    }
}

impl From<String> for Param {
    fn from(value: String) -> Self {
        Param::Str(value)
    }
}

impl From<Duration> for Param {
    fn from(value: Duration) -> Self {
        Param::Int(i64::try_from(value.as_millis()).unwrap_or(i64::MAX))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandRequest {
    pub id: u32,
    pub method: String,
    pub params: Vec<Param>,
}

impl CommandRequest {
    /// Compact JSON terminated by CRLF, as the device expects it.
    pub fn to_wire(&self) -> Result<String> {
        Ok(format!("{}\r\n", serde_json::to_string(self)?))
    }
}

/// The `error` object of a reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceError {
    pub code: i64,
    pub message: String,
}

/// A decoded reply.
///
/// A device error is carried as data; use [`CommandResult::into_result`] to turn it into a failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResult {
    pub id: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<DeviceError>,
}

impl CommandResult {
    /// Decodes a reply, rejecting objects that carry neither `result` nor `error`.
    pub fn from_json(json: &str) -> Result<Self> {
        let value: Value =
            serde_json::from_str(json).map_err(|e| Error::MalformedReply(e.to_string()))?;
        Self::from_value(value)
    }

    fn from_value(value: Value) -> Result<Self> {
        let reply: CommandResult =
            serde_json::from_value(value).map_err(|e| Error::MalformedReply(e.to_string()))?;
        if reply.result.is_none() && reply.error.is_none() {
            return Err(Error::MalformedReply(format!(
                "reply {} has neither result nor error",
                reply.id
            )));
        }
        Ok(reply)
    }

    /// `true` for the `["ok"]` acknowledgement of set commands.
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
            && self
                .result
                .as_ref()
                .is_some_and(|result| result.len() == 1 && result[0] == "ok")
    }

    /// The result values, or [`Error::Device`] if the device reported an error.
    pub fn into_result(self) -> Result<Vec<String>> {
        match self.error {
            Some(error) => Err(Error::Device(error)),
            None => Ok(self.result.unwrap_or_default()),
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum Power {
    On,
    Off,
}

impl fmt::Display for Power {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let power_str = match self {
            Power::On => "on",
            Power::Off => "off",
        };
        write!(f, "{}", power_str)
    }
}

impl From<Power> for Param {
    fn from(power: Power) -> Self {
        Param::Str(power.to_string())
    }
}

/// How the device moves to a new state.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum Effect {
    Smooth,
    Sudden,
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let effect_str = match self {
            Effect::Smooth => "smooth",
            Effect::Sudden => "sudden",
        };
        write!(f, "{}", effect_str)
    }
}

impl From<Effect> for Param {
    fn from(effect: Effect) -> Self {
        Param::Str(effect.to_string())
    }
}

/// Sends commands to a device's control endpoint.
///
/// Every call opens its own connection, so calls share no state and may run concurrently.
#[derive(Debug, Clone, Default)]
pub struct ControlInterface {
    config: CommandConfig,
}

impl ControlInterface {
    pub fn new(config: CommandConfig) -> Self {
        ControlInterface { config }
    }

    pub fn config(&self) -> &CommandConfig {
        &self.config
    }

    /**
    Performs one request/reply round trip with the device at `host`.

    A reply carrying `error` is returned as data. Transport failures, an
    undecodable reply and the timeout are errors. Nothing is retried.
     */
    pub async fn send_command(
        &self,
        host: &str,
        method: &str,
        params: Vec<Param>,
    ) -> Result<CommandResult> {
        let request = CommandRequest {
            id: rand::thread_rng().gen_range(0..REQUEST_ID_RANGE),
            method: method.to_string(),
            params,
        };
        timeout(self.config.timeout, self.exchange(host, &request))
            .await
            .map_err(|_| Error::Timeout(self.config.timeout))?
    }

    async fn exchange(&self, host: &str, request: &CommandRequest) -> Result<CommandResult> {
        let mut stream = TcpStream::connect((host, self.config.control_port)).await?;
        let payload = request.to_wire()?;
        debug!("Sending to {}: {}", host, payload.trim_end());
        stream.write_all(payload.as_bytes()).await?;

        let reply = Self::read_reply(&mut stream).await?;
        if reply.id != request.id {
            warn!(
                "Reply id {} does not match request id {} for {}",
                reply.id, request.id, request.method
            );
        }
        info!("{} on {} answered: {:?}", request.method, host, reply);
        // The reply is already decoded; a failed shutdown changes nothing for the caller.
        let _ = stream.shutdown().await;
        Ok(reply)
    }

    async fn read_reply(stream: &mut TcpStream) -> Result<CommandResult> {
        let mut buffer = BytesMut::with_capacity(READ_BUFFER_SIZE);
        loop {
            if let Some(reply) = Self::decode_reply(&mut buffer)? {
                return Ok(reply);
            }
            if stream.read_buf(&mut buffer).await? == 0 {
                return if buffer.iter().all(u8::is_ascii_whitespace) {
                    Err(Error::ConnectionClosed)
                } else {
                    Err(Error::MalformedReply(format!(
                        "connection closed mid-reply: {:?}",
                        String::from_utf8_lossy(&buffer)
                    )))
                };
            }
        }
    }

    /**
    Decodes the first reply in `buffer`, consuming what it used.

    Returns `None` while the buffered bytes are only a prefix of a JSON value.
    Notifications the device pushes to every open connection are dropped.
     */
    fn decode_reply(buffer: &mut BytesMut) -> Result<Option<CommandResult>> {
        loop {
            let (next, consumed) = {
                let mut values = serde_json::Deserializer::from_slice(&buffer[..]).into_iter::<Value>();
                let next = values.next();
                (next, values.byte_offset())
            };
            match next {
                None => return Ok(None),
                Some(Err(e)) if e.is_eof() => return Ok(None),
                Some(Err(e)) => return Err(Error::MalformedReply(e.to_string())),
                Some(Ok(value)) => {
                    buffer.advance(consumed);
                    if Self::is_notification(&value) {
                        debug!("Skipping notification: {}", value);
                        continue;
                    }
                    return CommandResult::from_value(value).map(Some);
                }
            }
        }
    }

    fn is_notification(value: &Value) -> bool {
        value.get("id").is_none() && value.get("method").is_some()
    }

    /// Switches the device on or off with the given transition.
    pub async fn set_power(
        &self,
        host: &str,
        power: Power,
        effect: Effect,
        duration: Duration,
    ) -> Result<CommandResult> {
        self.send_command(
            host,
            "set_power",
            vec![power.into(), effect.into(), duration.into()],
        )
        .await
    }

    pub async fn turn_on(&self, host: &str) -> Result<CommandResult> {
        self.set_power(host, Power::On, TRANSITION_EFFECT, TRANSITION_DURATION)
            .await
    }

    pub async fn turn_off(&self, host: &str) -> Result<CommandResult> {
        self.set_power(host, Power::Off, TRANSITION_EFFECT, TRANSITION_DURATION)
            .await
    }

    pub async fn toggle(&self, host: &str) -> Result<CommandResult> {
        self.send_command(host, "toggle", Vec::new()).await
    }

    /// Sets the brightness.
    ///
    /// # Arguments
    /// - `brightness`: Range is 1..100. Values outside are logged and still sent;
    ///                 the device decides whether to accept them.
    pub async fn set_brightness(&self, host: &str, brightness: u32) -> Result<CommandResult> {
        if !is_valid_brightness(brightness) {
            warn!(
                "{} is not in range. Try a value between 1 and 100.",
                brightness
            );
        }
        self.send_command(host, "set_bright", Self::with_transition(brightness))
            .await
    }

    /// Sets the white color temperature in Kelvin.
    pub async fn set_color_temperature(&self, host: &str, kelvin: u32) -> Result<CommandResult> {
        self.send_command(host, "set_ct_abx", Self::with_transition(kelvin))
            .await
    }

    /// Sets the color as `0xRRGGBB`, see [`RGB::packed`].
    pub async fn set_rgb(&self, host: &str, rgb: u32) -> Result<CommandResult> {
        self.send_command(host, "set_rgb", Self::with_transition(rgb))
            .await
    }

    /// Sets hue (0..359) and saturation (0..100).
    pub async fn set_hsv(&self, host: &str, hue: u32, saturation: u32) -> Result<CommandResult> {
        self.send_command(
            host,
            "set_hsv",
            vec![
                hue.into(),
                saturation.into(),
                TRANSITION_EFFECT.into(),
                TRANSITION_DURATION.into(),
            ],
        )
        .await
    }

    pub async fn set_name(&self, host: &str, name: &str) -> Result<CommandResult> {
        self.send_command(host, "set_name", vec![name.into()]).await
    }

    /// Reads properties such as `power` or `bright`; values come back in request order.
    pub async fn get_properties(&self, host: &str, properties: &[&str]) -> Result<CommandResult> {
        let params = properties.iter().map(|&property| property.into()).collect();
        self.send_command(host, "get_prop", params).await
    }

    fn with_transition(value: u32) -> Vec<Param> {
        vec![
            value.into(),
            TRANSITION_EFFECT.into(),
            TRANSITION_DURATION.into(),
        ]
    }
}

pub fn is_valid_brightness(brightness: u32) -> bool {
    (1..=100).contains(&brightness)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RGB {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

impl RGB {
    /// The `0xRRGGBB` integer `set_rgb` takes.
    pub fn packed(&self) -> u32 {
        (u32::from(self.red) << 16) | (u32::from(self.green) << 8) | u32::from(self.blue)
    }

    pub fn from_packed(packed: u32) -> Self {
        RGB {
            red: (packed >> 16) as u8,
            green: (packed >> 8) as u8,
            blue: packed as u8,
        }
    }
}

impl From<(u8, u8, u8)> for RGB {
    fn from(tuple: (u8, u8, u8)) -> Self {
        RGB {
            red: tuple.0,
            green: tuple.1,
            blue: tuple.2,
        }
    }
}

impl From<RGB> for (u8, u8, u8) {
    fn from(rgb: RGB) -> Self {
        (rgb.red, rgb.green, rgb.blue)
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum CliColors {
    Red,
    Green,
    Blue,
    Yellow,
    Orange,
    Purple,
    Cyan,
    Magenta,
    Pink,
    Teal,
    White,
    WarmWhite,
}

impl From<CliColors> for RGB {
    fn from(color: CliColors) -> Self {
        let rgb = match color {
            CliColors::Red => (255, 0, 0),
            CliColors::Green => (0, 255, 0),
            CliColors::Blue => (0, 0, 255),
            CliColors::Yellow => (255, 255, 0),
            CliColors::Orange => (255, 165, 0),
            CliColors::Purple => (128, 0, 128),
            CliColors::Cyan => (0, 255, 255),
            CliColors::Magenta => (255, 0, 255),
            CliColors::Pink => (255, 192, 203),
            CliColors::Teal => (0, 128, 128),
            CliColors::White => (255, 255, 255),
            CliColors::WarmWhite => (255, 180, 107),
        };
        rgb.into()
    }
}
