use std::io::Write;

use clap::{Parser, Subcommand};
use relay_sdk::{RelayCall, RelayClient};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "relay-cli")]
#[command(about = "Send requests through a running http-relay", long_about = None)]
struct Cli {
    /// Base URL of the relay.
    #[arg(short, long, default_value = "http://localhost:3000")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check relay liveness
    Health,
    /// Relay a request to TARGET and print the upstream response
    Send {
        /// Absolute upstream URL
        target: String,

        /// HTTP method
        #[arg(short = 'X', long, default_value = "GET")]
        method: String,

        /// Header in `Name: value` form; repeatable
        #[arg(short = 'H', long = "header")]
        headers: Vec<String>,

        /// Request body; parsed as JSON when possible, sent as text otherwise
        #[arg(short, long)]
        data: Option<String>,

        /// Ask for raw bytes instead of structured decoding
        #[arg(long)]
        binary: bool,

        /// Return redirects instead of following them
        #[arg(long)]
        no_follow: bool,

        #[arg(long, default_value_t = 5)]
        max_redirects: usize,

        /// Outbound timeout in milliseconds; 0 disables it
        #[arg(long, default_value_t = 30_000)]
        timeout_ms: u64,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = RelayClient::new(&cli.url)?;

    match cli.command {
        Commands::Health => {
            if client.health().await? {
                println!("ok");
            } else {
                println!("unhealthy");
                std::process::exit(1);
            }
        }
        Commands::Send {
            target,
            method,
            headers,
            data,
            binary,
            no_follow,
            max_redirects,
            timeout_ms,
        } => {
            let call = build_call(target, &method, &headers, data, binary, no_follow, max_redirects, timeout_ms)?;
            let res = client.relay(&call).await?;
            print_response(res).await?;
        }
    }

    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn build_call(
    target: String,
    method: &str,
    headers: &[String],
    data: Option<String>,
    binary: bool,
    no_follow: bool,
    max_redirects: usize,
    timeout_ms: u64,
) -> Result<RelayCall, String> {
    let mut call = RelayCall::get(&target)
        .method(method)
        .timeout_ms(timeout_ms)
        .max_redirects(max_redirects);

    for raw in headers {
        let (name, value) = raw
            .split_once(':')
            .ok_or_else(|| format!("header '{}' must look like 'Name: value'", raw))?;
        call = call.add_header(name.trim(), value.trim());
    }
    if let Some(data) = data {
        call = call.body(serde_json::from_str(&data).unwrap_or(Value::String(data)));
    }
    if binary {
        call = call.raw_binary();
    }
    if no_follow {
        call = call.no_redirects();
    }
    Ok(call)
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("{:?} {}", res.version(), res.status());
    for (name, value) in res.headers() {
        eprintln!("{}: {}", name, value.to_str().unwrap_or("<binary>"));
    }
    eprintln!();

    let bytes = res.bytes().await?;
    let mut stdout = std::io::stdout();
    stdout.write_all(&bytes)?;
    stdout.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_send_flags_map_to_call() {
        let headers = vec!["X-Trace: one".to_string(), "X-Trace: two".to_string()];
        let call = build_call(
            "http://example.com".into(),
            "POST",
            &headers,
            Some(r#"{"a":1}"#.into()),
            true,
            true,
            5,
            100,
        )
        .unwrap();

        assert_eq!(call.headers["X-Trace"], json!(["one", "two"]));
        assert_eq!(call.body, Some(json!({ "a": 1 })));
        assert_eq!(call.response_mode.as_deref(), Some("raw-binary"));
        assert_eq!(call.follow_redirects, Some(false));
        assert_eq!(call.timeout_ms, Some(100));
    }

    #[test]
    fn test_non_json_data_is_text() {
        let call = build_call("http://example.com".into(), "POST", &[], Some("plain".into()), false, false, 5, 0).unwrap();
        assert_eq!(call.body, Some(json!("plain")));
        assert_eq!(call.follow_redirects, None);
    }

    #[test]
    fn test_malformed_header_rejected() {
        let err = build_call("http://x".into(), "GET", &["nocolon".into()], None, false, false, 5, 0).unwrap_err();
        assert!(err.contains("nocolon"));
    }
}
