//! CLI entry point for arm-bridge.
//!
//! A headless front for the transport core, useful without the panel UI:
//! - `monitor` runs the full pipeline (connect, observe, chart snapshots)
//!   and logs what the renderer would receive
//! - `send` fires one named command and prints the response
//!
//! # Usage
//!
//! ```bash
//! arm-bridge monitor --arm-ip 192.168.1.203 --field actual_joint_positions
//! arm-bridge send xarm_get_ft_sensor_config
//! ```

use anyhow::{anyhow, Context, Result};
use arm_bridge::chart::field::{model_joint_count, ObserveField};
use arm_bridge::chart::{ChartActor, ChartEvent};
use arm_bridge::config::Settings;
use arm_bridge::link::{
    connect, ArmCommands, ArmLink, ObserveMode, ObserveParams, SampleRate, Topic,
};
use arm_bridge::logging;
use clap::{Parser, Subcommand};
use tracing::info;

#[derive(Parser)]
#[command(name = "arm-bridge")]
#[command(about = "Command/telemetry bridge for the arm control plane", long_about = None)]
struct Cli {
    /// Config name under config/ (defaults built in)
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect, start an observation run and log chart snapshots
    Monitor {
        /// IP of the arm the control plane should connect to
        #[arg(long)]
        arm_ip: String,

        /// Arm model (xarm3..xarm8, lite6..lite8)
        #[arg(long, default_value = "xarm6")]
        model: String,

        /// Field or analysis pair to observe
        #[arg(long, default_value = "actual_joint_positions")]
        field: String,

        /// Report angular values in radians instead of degrees
        #[arg(long)]
        rad: bool,
    },

    /// Send one command and print the response
    Send {
        /// Command name, e.g. xarm_get_ft_sensor_config
        cmd: String,

        /// JSON payload (defaults to {})
        #[arg(long)]
        data: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = Settings::new(cli.config.as_deref())?;
    logging::init(&settings.log_level, logging::OutputFormat::Compact)
        .map_err(|e| anyhow!("logging init failed: {e}"))?;

    match cli.command {
        Commands::Monitor {
            arm_ip,
            model,
            field,
            rad,
        } => monitor(&settings, &arm_ip, &model, &field, rad).await,
        Commands::Send { cmd, data } => send_once(&settings, &cmd, data.as_deref()).await,
    }
}

async fn monitor(
    settings: &Settings,
    arm_ip: &str,
    model: &str,
    field: &str,
    use_rad: bool,
) -> Result<()> {
    let joints =
        model_joint_count(model).ok_or_else(|| anyhow!("unknown arm model: {model}"))?;
    let observe =
        ObserveField::parse(field).ok_or_else(|| anyhow!("unknown observe field: {field}"))?;

    let link = ArmLink::new();
    let (chart, mut snapshots, _chart_task) = ChartActor::spawn(&settings.chart);
    link.attach_chart(chart.clone()).await;

    let connection = connect(&link, &settings.link.addr())
        .await
        .with_context(|| format!("control plane at {}", settings.link.addr()))?;
    let commands = ArmCommands::new(link.clone());

    let mut run_over = link.subscribe(Topic::ObserveOver.name()).await?;

    commands.connect_arm(arm_ip).await?;
    info!(%arm_ip, "arm connected");

    chart.set_joint_model(joints).await?;
    chart.set_rad_unit(use_rad).await?;
    chart.set_observe_field(observe).await?;
    chart.clear_joints().await?;
    chart.set_streaming(true).await?;

    let params = ObserveParams {
        mode: if observe.is_analysis() {
            ObserveMode::Compare
        } else {
            ObserveMode::Observer
        },
        observe_type: observe.wire_name().to_string(),
        joint_dir: None,
        hz: SampleRate::Hz250,
        use_rad,
        timeout_secs: 100,
        csv: false,
    };
    commands.start_observation(&params).await?;
    info!(field = %observe.wire_name(), "observation started, ctrl-c to stop");

    loop {
        tokio::select! {
            Some(event) = snapshots.recv() => {
                let ChartEvent::Joints { value, label } = event;
                let samples: usize = value
                    .iter()
                    .flat_map(|axis| axis.channels.values())
                    .map(Vec::len)
                    .sum();
                info!(axes = value.len(), samples, points = label.len(), "snapshot");
            }
            _ = run_over.recv() => {
                info!("control plane ended the observation run");
                break;
            }
            _ = tokio::signal::ctrl_c() => {
                info!("stopping");
                break;
            }
        }
    }

    chart.set_streaming(false).await?;
    let _ = commands.stop_observation("", "").await;
    let _ = commands.disconnect_arm().await;
    connection.close().await;
    Ok(())
}

async fn send_once(settings: &Settings, cmd: &str, data: Option<&str>) -> Result<()> {
    let payload = match data {
        Some(raw) => serde_json::from_str(raw).context("payload is not valid JSON")?,
        None => serde_json::json!({}),
    };

    let link = ArmLink::new();
    let connection = connect(&link, &settings.link.addr())
        .await
        .with_context(|| format!("control plane at {}", settings.link.addr()))?;

    let reply = link.send(cmd, payload).await?;
    let response = reply.await?;
    println!("{}", serde_json::to_string_pretty(&response)?);

    connection.close().await;
    Ok(())
}
