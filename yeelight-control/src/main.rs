use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use log::debug;

use yeelight_control_lib::control_interface::{
    CliColors, CommandConfig, CommandResult, ControlInterface, Effect, Param, Power, RGB,
    CONTROL_PORT, TRANSITION_DURATION, TRANSITION_EFFECT,
};
use yeelight_control_lib::util::discovery::{Discovery, DiscoveryConfig};

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();

    handle_cli(cli).await
}

/// This struct defines the command line interface of the application
#[derive(Parser)]
#[clap(
    name = "yeelight_control",
    about = "Discovers and controls Yeelight smart lights",
    version
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

/// Supported output formats for the `discover` command.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
pub enum OutputFormat {
    /// Plain text format.
    Plaintext,
    /// JSON format.
    Json,
    /// YAML format.
    Yaml,
}

/// Subcommands available for the CLI
#[derive(Subcommand)]
pub enum Commands {
    /// Sends a command to a single device
    #[clap(name = "device-call")]
    DeviceCall {
        /// Sets the IP address or host name of the device
        #[clap(long)]
        ip: String,

        /// Control port of the device
        #[clap(long, default_value_t = CONTROL_PORT)]
        port: u16,

        /// Reply timeout in milliseconds
        #[clap(short = 't', long = "timeout", default_value_t = 5000)]
        timeout: u64,

        #[clap(subcommand)]
        action: DeviceAction,
    },
    /// Searches the local network for devices
    #[clap(name = "discover")]
    Discover {
        /// Output format (plaintext, json, yaml)
        #[clap(short, long, value_enum, default_value_t = OutputFormat::Plaintext)]
        output: OutputFormat,

        /// Search timeout in milliseconds
        #[clap(short = 't', long = "timeout", default_value_t = 3000)]
        timeout: u64,
    },
}

fn parse_duration(s: &str) -> Result<Duration, &'static str> {
    let millis = s
        .parse::<u64>()
        .map_err(|_| "could not parse duration in milliseconds")?;
    Ok(Duration::from_millis(millis))
}

/// Actions available under the `device-call` subcommand
#[derive(Subcommand)]
pub enum DeviceAction {
    /// Switches the device on or off.
    #[clap(name = "set-power")]
    SetPower {
        #[clap(value_enum)]
        state: Power,

        /// Transition effect
        #[clap(long, value_enum, default_value_t = TRANSITION_EFFECT)]
        effect: Effect,

        /// Transition duration in milliseconds
        #[clap(long, value_parser = parse_duration, default_value = "500")]
        duration: Duration,
    },
    /// Switches the device on.
    #[clap(name = "on")]
    On,
    /// Switches the device off.
    #[clap(name = "off")]
    Off,
    /// Toggles the power state.
    #[clap(name = "toggle")]
    Toggle,
    /// Sets the brightness (1-100).
    #[clap(name = "set-bright")]
    SetBright { value: u32 },
    /// Sets the color temperature in Kelvin.
    #[clap(name = "set-ct")]
    SetCt { kelvin: u32 },
    /// Sets an RGB color, by name or by components.
    #[clap(name = "set-rgb")]
    SetRgb {
        /// The color to display by name
        #[clap(value_enum)]
        color: Option<CliColors>,

        /// Red component of the color (0-255)
        #[clap(short = 'r', long = "red", value_parser = clap::value_parser!(u8))]
        red: Option<u8>,

        /// Green component of the color (0-255)
        #[clap(short = 'g', long = "green", value_parser = clap::value_parser!(u8))]
        green: Option<u8>,

        /// Blue component of the color (0-255)
        #[clap(short = 'b', long = "blue", value_parser = clap::value_parser!(u8))]
        blue: Option<u8>,
    },
    /// Sets hue (0-359) and saturation (0-100).
    #[clap(name = "set-hsv")]
    SetHsv { hue: u32, saturation: u32 },
    /// Stores a name on the device.
    #[clap(name = "set-name")]
    SetName { name: String },
    /// Reads properties, e.g. `power bright ct`.
    #[clap(name = "get-prop")]
    GetProp {
        #[clap(required = true)]
        properties: Vec<String>,
    },
    /// Sends an arbitrary method. Integer parameters are sent as numbers.
    #[clap(name = "raw")]
    Raw {
        method: String,
        params: Vec<String>,
    },
}

fn parse_raw_param(value: String) -> Param {
    match value.parse::<i64>() {
        Ok(number) => Param::Int(number),
        Err(_) => Param::Str(value),
    }
}

async fn handle_cli(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Discover { output, timeout } => {
            let devices =
                Discovery::find_devices(&DiscoveryConfig::default(), Duration::from_millis(timeout))
                    .await
                    .context("Discovery failed")?;
            match output {
                OutputFormat::Plaintext => {
                    Discovery::pretty_print_devices(&devices);
                }
                OutputFormat::Json => {
                    let json = serde_json::to_string(&devices)?;
                    println!("{}", json);
                }
                OutputFormat::Yaml => {
                    let yaml = serde_yaml::to_string(&devices)?;
                    println!("{}", yaml);
                }
            }
        }
        Commands::DeviceCall {
            ip,
            port,
            timeout,
            action,
        } => {
            let control = ControlInterface::new(CommandConfig {
                control_port: port,
                timeout: Duration::from_millis(timeout),
            });
            let host = ip.as_str();

            let reply = match action {
                DeviceAction::SetPower {
                    state,
                    effect,
                    duration,
                } => control.set_power(host, state, effect, duration).await,
                DeviceAction::On => control.turn_on(host).await,
                DeviceAction::Off => control.turn_off(host).await,
                DeviceAction::Toggle => control.toggle(host).await,
                DeviceAction::SetBright { value } => control.set_brightness(host, value).await,
                DeviceAction::SetCt { kelvin } => {
                    control.set_color_temperature(host, kelvin).await
                }
                DeviceAction::SetRgb {
                    color,
                    red,
                    green,
                    blue,
                } => {
                    let rgb: RGB = match (color, red, green, blue) {
                        (Some(color_name), None, None, None) => color_name.into(),
                        (None, Some(r), Some(g), Some(b)) => RGB {
                            red: r,
                            green: g,
                            blue: b,
                        },
                        _ => return Err(anyhow!("Invalid color specification")),
                    };
                    debug!("Packed {:?} as {:#08x}", rgb, rgb.packed());
                    control.set_rgb(host, rgb.packed()).await
                }
                DeviceAction::SetHsv { hue, saturation } => {
                    control.set_hsv(host, hue, saturation).await
                }
                DeviceAction::SetName { name } => control.set_name(host, &name).await,
                DeviceAction::GetProp { properties } => {
                    let properties: Vec<&str> = properties.iter().map(String::as_str).collect();
                    control.get_properties(host, &properties).await
                }
                DeviceAction::Raw { method, params } => {
                    let params = params.into_iter().map(parse_raw_param).collect();
                    control.send_command(host, &method, params).await
                }
            }
            .with_context(|| format!("Command to {}:{} failed", host, port))?;

            print_reply(&reply)?;
        }
    }

    Ok(())
}

fn print_reply(reply: &CommandResult) -> Result<()> {
    println!("{}", serde_json::to_string(reply)?);
    if let Some(error) = &reply.error {
        bail!("Device reported error {}: {}", error.code, error.message);
    }
    Ok(())
}
