use std::time::Duration;

use serde::Serialize;
use volsync_channel::handshake_host;
use volsync_frame::{FrameCodec, FrameReader, FrameWriter};
use volsync_transport::{Discovery, Endpoint, SocketDiscovery, UnixDomainSocket};

use crate::cmd::{parse_duration, ProbeArgs};
use crate::exit::{CliResult, SUCCESS, TRANSPORT_ERROR};
use crate::output::{new_table, OutputFormat};

#[derive(Serialize)]
struct CandidateOutput {
    endpoint: String,
    present: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    handshake: Option<String>,
}

#[derive(Serialize)]
struct ProbeOutput {
    candidates: Vec<CandidateOutput>,
}

pub fn run(args: ProbeArgs, format: OutputFormat) -> CliResult<i32> {
    let timeout = parse_duration(&args.timeout)?;
    let config = args.discovery.load_config()?;
    let discovery = config.discovery();
    let codec = FrameCodec::standard();

    let found = discovery.candidates();
    let mut candidates: Vec<CandidateOutput> = found
        .iter()
        .map(|endpoint| CandidateOutput {
            endpoint: endpoint.path().display().to_string(),
            present: true,
            handshake: args
                .handshake
                .then(|| handshake_status(&discovery, endpoint, &codec, timeout)),
        })
        .collect();

    // Configured paths that are not live sockets.
    for path in &config.endpoints {
        if !UnixDomainSocket::is_socket(path) {
            candidates.push(CandidateOutput {
                endpoint: path.display().to_string(),
                present: false,
                handshake: None,
            });
        }
    }

    let out = ProbeOutput { candidates };
    print_probe(&out, format);

    if found.is_empty() {
        Ok(TRANSPORT_ERROR)
    } else {
        Ok(SUCCESS)
    }
}

fn handshake_status(
    discovery: &SocketDiscovery,
    endpoint: &Endpoint,
    codec: &FrameCodec,
    timeout: Duration,
) -> String {
    match try_handshake(discovery, endpoint, codec, timeout) {
        Ok(()) => "ok".to_string(),
        Err(err) => err.to_string(),
    }
}

fn try_handshake(
    discovery: &SocketDiscovery,
    endpoint: &Endpoint,
    codec: &FrameCodec,
    timeout: Duration,
) -> volsync_channel::Result<()> {
    let link = discovery.open(endpoint)?;
    link.set_read_timeout(Some(timeout))?;
    link.set_write_timeout(Some(timeout))?;
    let mut reader = FrameReader::new(link.try_clone()?);
    let mut writer = FrameWriter::new(link);
    let result = handshake_host(&mut reader, &mut writer, codec, timeout);
    let _ = writer.get_ref().shutdown();
    result
}

fn print_probe(out: &ProbeOutput, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string(out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = new_table(vec!["ENDPOINT", "PRESENT", "HANDSHAKE"]);
            for candidate in &out.candidates {
                table.add_row(vec![
                    candidate.endpoint.clone(),
                    candidate.present.to_string(),
                    candidate.handshake.clone().unwrap_or_else(|| "-".to_string()),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty | OutputFormat::Raw => {
            if out.candidates.is_empty() {
                println!("no control surface endpoints found");
            }
            for candidate in &out.candidates {
                let status = if candidate.present { "present" } else { "missing" };
                match &candidate.handshake {
                    Some(handshake) => {
                        println!("{} {status} handshake={handshake}", candidate.endpoint)
                    }
                    None => println!("{} {status}", candidate.endpoint),
                }
            }
        }
    }
}
