use std::io::Cursor;
use std::process::{Command, Stdio};
use std::time::Duration;

use plist::{Dictionary, Value};
use process_control::{ChildExt, Control};

use crate::config::Config;
use crate::error::ReporterError;

/// IOKit service matched by the registry query.
const IOREG_SERVICE: &str = "AppleSmartBattery";

/// Queries the hardware registry for the smart-battery service node.
///
/// `ioreg -a` emits an XML property list on stdout whose root is an array of
/// matched service dictionaries; the first entry is the battery node. A failed,
/// missing, or timed-out query is `SourceUnavailable`, unparseable output is
/// `MalformedSource`. Read-only, no retries.
pub fn read_registry(config: &Config) -> Result<Dictionary, ReporterError> {
    let stdout = run_query(
        &config.ioreg_path,
        &["-l", "-n", IOREG_SERVICE, "-r", "-a"],
        config.registry_timeout,
    )?;
    parse_registry_dump(&stdout)
}

/// Runs the registry query with a hard time limit; a hung query is terminated
/// instead of stalling the run past the scheduler's next interval.
fn run_query(program: &str, args: &[&str], timeout: Duration) -> Result<Vec<u8>, ReporterError> {
    let child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|err| {
            ReporterError::SourceUnavailable(format!("failed to execute {program}: {err}"))
        })?;

    let output = child
        .controlled_with_output()
        .time_limit(timeout)
        .terminate_for_timeout()
        .wait()
        .map_err(|err| {
            ReporterError::SourceUnavailable(format!("failed to wait for {program}: {err}"))
        })?
        .ok_or_else(|| {
            ReporterError::SourceUnavailable(format!(
                "{program} timed out after {}s",
                timeout.as_secs_f64()
            ))
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ReporterError::SourceUnavailable(format!(
            "{program} exited with code {}: {}",
            output.status.code().unwrap_or(-1),
            stderr.trim()
        )));
    }

    Ok(output.stdout)
}

/// Parses a raw registry dump into the battery service dictionary.
pub fn parse_registry_dump(raw: &[u8]) -> Result<Dictionary, ReporterError> {
    let value = Value::from_reader_xml(Cursor::new(raw))
        .map_err(|err| ReporterError::MalformedSource(format!("plist parse failed: {err}")))?;

    let node = match value {
        Value::Array(mut items) => {
            if items.is_empty() {
                return Err(ReporterError::MalformedSource(
                    "registry dump contains no service nodes".to_string(),
                ));
            }
            items.remove(0)
        }
        other => other,
    };

    match node {
        Value::Dictionary(dict) => Ok(dict),
        _ => Err(ReporterError::MalformedSource(
            "registry node is not a dictionary".to_string(),
        )),
    }
}

/// ioreg-style fixture shared with the pipeline tests: a discharging battery at
/// 85% health (5100 of 6000 mAh), 312 cycles, 12.1 V, -450 mA.
#[cfg(test)]
pub(crate) const SAMPLE_IOREG_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
<plist version="1.0">
<array>
  <dict>
    <key>Serial</key><string>F5D40211XYZ</string>
    <key>DeviceName</key><string>bq20z451</string>
    <key>Manufacturer</key><string>Apple Inc.</string>
    <key>DesignCapacity</key><integer>6000</integer>
    <key>AppleRawMaxCapacity</key><integer>5100</integer>
    <key>AppleRawCurrentCapacity</key><integer>4300</integer>
    <key>CurrentCapacity</key><integer>84</integer>
    <key>CycleCount</key><integer>312</integer>
    <key>Voltage</key><integer>12100</integer>
    <key>Amperage</key><integer>-450</integer>
    <key>Temperature</key><integer>3020</integer>
    <key>TimeRemaining</key><integer>245</integer>
    <key>ExternalConnected</key><false/>
    <key>IsCharging</key><false/>
    <key>FullyCharged</key><false/>
  </dict>
</array>
</plist>
"#;
