use crate::collectors::ProbeError;
use std::net::UdpSocket;
use std::process::{Command, Stdio};

pub fn disk_usage(mount: &str) -> Result<u8, ProbeError> {
    let output = Command::new("df")
        .args(["-P", mount])
        .stderr(Stdio::null())
        .output()
        .map_err(|source| ProbeError::Spawn {
            program: "df",
            source,
        })?;
    if !output.status.success() {
        return Err(ProbeError::Exit {
            program: "df",
            status: output.status,
        });
    }

    parse_df_usage(&String::from_utf8_lossy(&output.stdout))
}

pub fn parse_df_usage(output: &str) -> Result<u8, ProbeError> {
    let data = output
        .lines()
        .skip(1)
        .find(|l| !l.trim().is_empty())
        .ok_or_else(|| ProbeError::malformed("df output", "no data line"))?;

    let column = data
        .split_whitespace()
        .find(|tok| tok.ends_with('%'))
        .ok_or_else(|| ProbeError::malformed("df output", format!("no Use% column in {data:?}")))?;

    let pct: u32 = column
        .trim_end_matches('%')
        .parse()
        .map_err(|_| ProbeError::malformed("df output", format!("{column:?}")))?;
    Ok(pct.min(100) as u8)
}

// Connecting a UDP socket only selects a route; no datagram is sent.
pub fn outbound_ip(target: &str) -> Result<String, ProbeError> {
    let socket = UdpSocket::bind("0.0.0.0:0").map_err(ProbeError::Socket)?;
    socket.connect(target).map_err(ProbeError::Socket)?;
    let addr = socket.local_addr().map_err(ProbeError::Socket)?;
    if addr.ip().is_unspecified() {
        return Err(ProbeError::malformed(
            "local address",
            "no route selected for outbound traffic",
        ));
    }
    Ok(addr.ip().to_string())
}
