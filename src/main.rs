use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use arm_remote::{
    BleConfig, BleTransport, Controller, Event, Preset, SimulatedTransport, TransportError,
    TransportPort,
};
use clap::Parser;
use crossterm::event::{Event as TermEvent, EventStream, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use futures::StreamExt;

const HELP: &str = "\
keys: a-j move a joint (a/b base, c/d shoulder, e/f elbow, g/h wrist, i/j gripper)
      1 home, 2 grab, 3 reach, 0 reset, x cancel, p pose, r reconnect, q quit";

#[derive(Parser)]
#[command(about = "Drive a five-joint arm over a Bluetooth LE serial link")]
struct Args {
    /// Local name prefix of the arm's Bluetooth module
    #[arg(long)]
    name: Option<String>,
    /// Ignore the name and match any device advertising the serial service
    #[arg(long, conflicts_with = "name")]
    any_name: bool,
    /// Seconds to scan before giving up
    #[arg(long, default_value_t = 5)]
    scan_timeout: u64,
    /// Drive an in-memory arm instead of real hardware
    #[arg(long)]
    simulate: bool,
    /// Write acknowledgement latency of the simulated arm, in milliseconds
    #[arg(long, default_value_t = 50)]
    latency_ms: u64,
}

fn render(event: &Event) {
    let line = match event {
        Event::JointChanged { joint, angle } => format!("  {joint:<8} {angle:>3} deg"),
        Event::ConnectionChanged(state) => format!("[{state}]"),
        Event::Log { message, severity } => format!("{severity}: {message}"),
        Event::SequenceChanged { preset, state } => format!("{preset}: {state}"),
    };
    // Raw mode needs an explicit carriage return.
    print!("{line}\r\n");
}

fn preset_for(key: char) -> Option<Preset> {
    match key {
        '1' => Some(Preset::Home),
        '2' => Some(Preset::Grab),
        '3' => Some(Preset::Reach),
        '0' => Some(Preset::Reset),
        _ => None,
    }
}

async fn session<T, F, Fut>(handshake: F) -> anyhow::Result<()>
where
    T: TransportPort,
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, TransportError>>,
{
    let controller = Controller::<T>::new();
    controller.subscribe(Arc::new(render));

    println!("{HELP}");
    // Failures are already reported through the observer; `r` retries.
    let _ = controller.connect(handshake()).await;

    enable_raw_mode()?;
    let result = key_loop(&controller, &handshake).await;
    disable_raw_mode()?;

    controller.disconnect().await;
    result
}

async fn key_loop<T, F, Fut>(controller: &Arc<Controller<T>>, handshake: &F) -> anyhow::Result<()>
where
    T: TransportPort,
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, TransportError>>,
{
    let mut events = EventStream::new();
    while let Some(ev) = events.next().await.transpose()? {
        let TermEvent::Key(ev) = ev else {
            continue;
        };
        if ev.kind != KeyEventKind::Press {
            continue;
        }
        let KeyCode::Char(key) = ev.code else {
            continue;
        };
        if key == 'c' && ev.modifiers.contains(KeyModifiers::CONTROL) {
            return Ok(());
        }

        match key {
            'q' => return Ok(()),
            'x' => {
                controller.cancel_sequence();
            }
            'p' => {
                for (joint, angle) in controller.joints().iter() {
                    render(&Event::JointChanged { joint, angle });
                }
            }
            'r' => {
                controller.disconnect().await;
                let _ = controller.connect(handshake()).await;
            }
            key => {
                let controller = Arc::clone(controller);
                if let Some(preset) = preset_for(key) {
                    tokio::spawn(async move {
                        let _ = controller.run(preset).await;
                    });
                } else {
                    // Errors, including stray keys, are logged by the controller.
                    tokio::spawn(async move {
                        let _ = controller.dispatch_key(key.to_ascii_uppercase()).await;
                    });
                }
            }
        }
    }
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    pretty_env_logger::init();
    let args = Args::parse();

    if args.simulate {
        let latency = Duration::from_millis(args.latency_ms);
        return session(move || {
            let arm = SimulatedTransport::new(latency);
            async move { Ok(arm) }
        })
        .await;
    }

    let mut config = BleConfig::default();
    if let Some(name) = args.name {
        config.name_prefix = Some(name);
    }
    if args.any_name {
        config.name_prefix = None;
    }
    config.scan_timeout = Duration::from_secs(args.scan_timeout);

    session(move || {
        let config = config.clone();
        async move { BleTransport::connect(&config).await }
    })
    .await
}
