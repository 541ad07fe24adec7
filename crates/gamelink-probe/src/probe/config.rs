use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use gamelink::ClusterConfig;
use serde_json::Value;
use std::path::PathBuf;

/// Command-line surface of the `gamelink-probe` binary.
///
/// Cluster-wide settings can also be given through the environment (or a
/// `.env` file); flags win over the environment.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "gamelink-probe",
    version,
    about = "Inspect and call services on a gamelink cluster"
)]
pub struct CliArgs {
    /// JSON cluster file: local name, node addresses, service table and dial
    /// options.
    ///
    /// Environment variable: `GAMELINK_CLUSTER_FILE`
    #[arg(long, env = "GAMELINK_CLUSTER_FILE", default_value = "cluster.json")]
    pub cluster_file: PathBuf,

    /// Deadline for unary calls, overriding the cluster file.
    ///
    /// Environment variable: `GAMELINK_CALL_TIMEOUT_MS`
    #[arg(long, env = "GAMELINK_CALL_TIMEOUT_MS")]
    pub call_timeout_ms: Option<u64>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// List every registered service, ordered by protocol number.
    Services,

    /// Resolve a protocol number to its node and service, or a service name
    /// to its protocol number.
    Resolve { target: String },

    /// Call a service and print the reply as JSON.
    Call {
        /// Service name, or protocol number when `--by-number` is set.
        service: String,

        /// Request payload as JSON. It is sent as MessagePack.
        #[arg(default_value = "null")]
        payload: String,

        /// Target node. Defaults to the node the service table names.
        #[arg(long)]
        node: Option<String>,

        /// Treat `service` as a protocol number.
        #[arg(long, default_value_t = false)]
        by_number: bool,

        /// Send over a bidirectional stream instead of a unary call.
        #[arg(long, default_value_t = false)]
        stream: bool,

        /// Stream metadata as `key=value`; repeatable. Requires `--stream`.
        #[arg(long = "meta", value_parser = parse_metadata, requires = "stream")]
        metadata: Vec<(String, String)>,
    },
}

/// What the probe was asked to do, with its inputs validated.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Services,
    Resolve(String),
    Call(CallRequest),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CallRequest {
    pub target: CallTarget,
    pub node: Option<String>,
    pub payload: Value,
    pub stream: bool,
    pub metadata: Vec<(String, String)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallTarget {
    Service(String),
    Number(u16),
}

#[derive(Debug, Clone)]
pub struct ProbeConfig {
    pub cluster: ClusterConfig,
    pub action: Action,
}

impl TryFrom<CliArgs> for ProbeConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        let raw = std::fs::read_to_string(&args.cluster_file)
            .with_context(|| format!("failed to read {}", args.cluster_file.display()))?;
        let mut cluster: ClusterConfig = serde_json::from_str(&raw)
            .with_context(|| format!("invalid cluster file {}", args.cluster_file.display()))?;

        if let Some(timeout_ms) = args.call_timeout_ms {
            if timeout_ms == 0 {
                bail!("GAMELINK_CALL_TIMEOUT_MS must be greater than 0");
            }
            cluster.call_timeout_ms = timeout_ms;
        }

        let action = match args.command {
            Command::Services => Action::Services,
            Command::Resolve { target } => Action::Resolve(target),
            Command::Call {
                service,
                payload,
                node,
                by_number,
                stream,
                metadata,
            } => {
                let target = if by_number {
                    CallTarget::Number(
                        service
                            .parse()
                            .with_context(|| format!("{service:?} is not a protocol number"))?,
                    )
                } else {
                    CallTarget::Service(service)
                };
                let payload = serde_json::from_str(&payload).context("payload is not valid JSON")?;
                Action::Call(CallRequest {
                    target,
                    node,
                    payload,
                    stream,
                    metadata,
                })
            }
        };

        Ok(Self { cluster, action })
    }
}

fn parse_metadata(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got {raw:?}"))?;
    if key.is_empty() {
        return Err(format!("empty metadata key in {raw:?}"));
    }
    Ok((key.to_string(), value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::time::Duration;

    fn cluster_file(name: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "gamelink-probe-{name}-{}.json",
            std::process::id()
        ));
        std::fs::write(&path, contents).unwrap();
        path
    }

    fn args(path: PathBuf, extra: &[&str]) -> CliArgs {
        let path = path.to_string_lossy().into_owned();
        let mut argv = vec!["gamelink-probe", "--cluster-file", path.as_str()];
        argv.extend_from_slice(extra);
        CliArgs::try_parse_from(argv).unwrap()
    }

    const CLUSTER: &str = r#"{
        "name": "probe",
        "cluster": { "game1": "127.0.0.1:9000" },
        "services": [["2001", "Bag.Add", "game1"]]
    }"#;

    #[test]
    fn call_arguments_are_validated() {
        let path = cluster_file("call", CLUSTER);
        let config = ProbeConfig::try_from(args(
            path,
            &[
                "--call-timeout-ms",
                "250",
                "call",
                "2001",
                r#"{"item":"sword"}"#,
                "--by-number",
                "--stream",
                "--meta",
                "x-session=abc",
            ],
        ))
        .unwrap();

        assert_eq!(config.cluster.call_timeout(), Duration::from_millis(250));
        assert_eq!(
            config.action,
            Action::Call(CallRequest {
                target: CallTarget::Number(2001),
                node: None,
                payload: serde_json::json!({ "item": "sword" }),
                stream: true,
                metadata: vec![("x-session".to_string(), "abc".to_string())],
            })
        );
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let path = cluster_file("timeout", CLUSTER);
        let err = ProbeConfig::try_from(args(path, &["--call-timeout-ms", "0", "services"]));
        assert!(err.is_err());
    }

    #[test]
    fn bad_payload_is_rejected() {
        let path = cluster_file("payload", CLUSTER);
        let err = ProbeConfig::try_from(args(path, &["call", "Bag.Add", "{not json"]));
        assert!(err.is_err());
    }

    #[test]
    fn metadata_needs_key_and_value() {
        assert_eq!(
            parse_metadata("x-zone=7"),
            Ok(("x-zone".to_string(), "7".to_string()))
        );
        assert!(parse_metadata("x-zone").is_err());
        assert!(parse_metadata("=7").is_err());
    }
}
