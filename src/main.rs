use std::net::{SocketAddr, ToSocketAddrs};

use anyhow::{Context, Result, bail};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use rtpmidi_bridge::packets::midi_packets::midi_event::MidiEvent;
use rtpmidi_bridge::packets::midi_packets::midi_stream;
use rtpmidi_bridge::sessions::bridge::{DEFAULT_CONTROL_PORT, RtpMidiBridge};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::registry().with(fmt::layer()).with(EnvFilter::from_default_env()).init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.len() == 1 && args[0] == "test" {
        return codec_self_test();
    }

    let host = hostname::get()
        .map(|h| h.to_string_lossy().into_owned())
        .unwrap_or_else(|_| "rtpmidi".into());
    let name = format!("{host} - RTP bridge");

    let (bridge, mut sequencer) =
        RtpMidiBridge::start(DEFAULT_CONTROL_PORT, &name).await.context("failed to bind the AppleMIDI ports")?;

    for arg in &args {
        let addr = resolve(arg).with_context(|| format!("bad peer address {arg:?}"))?;
        bridge.connect_to(addr);
    }

    #[cfg(feature = "mdns")]
    let _mdns = (
        rtpmidi_bridge::discovery::advertise(&name, DEFAULT_CONTROL_PORT).context("mdns advertise failed")?,
        rtpmidi_bridge::discovery::browse(bridge.tasks()).context("mdns browse failed")?,
    );

    // No sequencer device is wired in here; show what the network delivers.
    tokio::spawn(async move {
        while let Some(event) = sequencer.recv().await {
            info!("network MIDI: {event:?}");
        }
    });

    tokio::signal::ctrl_c().await.context("failed to listen for ctrl-c")?;
    bridge.stop().await;
    Ok(())
}

fn resolve(arg: &str) -> Result<SocketAddr> {
    arg.to_socket_addrs()
        .context("address did not resolve")?
        .next()
        .context("address resolved to nothing")
}

/// Quick check behind the single `test` argument: a note on / note off run
/// pushed through the codec both ways.
fn codec_self_test() -> Result<()> {
    let bytes = [0x90, 10, 10, 0x80, 10, 0];
    let events = midi_stream::decode(&bytes);
    println!("{events:?}");

    let expected = vec![
        MidiEvent::NoteOn { channel: 0, key: 10, velocity: 10 },
        MidiEvent::NoteOff { channel: 0, key: 10, velocity: 0 },
    ];
    if events != expected {
        bail!("decode mismatch: {events:?}");
    }
    let encoded: Vec<u8> = events.iter().flat_map(MidiEvent::to_bytes).collect();
    if encoded != bytes {
        bail!("encode mismatch: {encoded:02X?}");
    }
    println!("MIDI codec self-test passed");
    Ok(())
}
