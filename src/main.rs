use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use assembly_client::{
    AssemblyCallbacks, AssemblyClient, AssemblyDescription, AssemblyOutcome, ClientConfig, Credentials,
    SignatureAlgorithm, Step,
};
use clap::{Parser, Subcommand};
use std::collections::BTreeMap;
use tracing::warn;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use url::Url;

#[derive(Parser, Debug)]
#[command(name="assembly", version, about="Submit and track Assembly jobs")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    /// Verbose logs
    #[arg(short, long, global = true)]
    verbose: bool,
    /// Service endpoint (defaults to ASSEMBLY_ENDPOINT or the public API)
    #[arg(long, global = true)]
    endpoint: Option<Url>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Submit an assembly and wait until it finishes
    Submit {
        /// JSON file with a map of step name -> step (each with a "robot")
        #[arg(long)]
        steps: Option<PathBuf>,
        #[arg(long)]
        template_id: Option<String>,
        /// Template variable, repeatable: key=value
        #[arg(long = "field", value_parser = parse_key_value)]
        fields: Vec<(String, String)>,
        /// Local input, repeatable: field=path
        #[arg(long = "file", value_parser = parse_key_value)]
        files: Vec<(String, String)>,
        /// Remote input, repeatable: step=url
        #[arg(long = "import", value_parser = parse_key_value)]
        imports: Vec<(String, String)>,
        #[arg(long)]
        notify_url: Option<Url>,
        #[arg(long)]
        max_refresh: Option<u32>,
        #[arg(long)]
        refresh_delay_ms: Option<u64>,
        /// HMAC digest for the signature
        #[arg(long, default_value = "sha384")]
        algorithm: String,
        /// Send params without a signature
        #[arg(long)]
        no_sign: bool,
    },
    /// Print the current status of an assembly
    Status { assembly_url: Url },
    /// Cancel a running assembly
    Cancel { assembly_url: Url },
}

fn parse_key_value(s: &str) -> Result<(String, String)> {
    let (k, v) = s.split_once('=').ok_or_else(|| anyhow!("expected key=value, got '{s}'"))?;
    if k.is_empty() {
        bail!("empty key in '{s}'");
    }
    Ok((k.to_string(), v.to_string()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "info" } else { "warn" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("ASSEMBLY_LOG").unwrap_or_else(|_| filter.into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config = ClientConfig::from_env();
    if let Some(endpoint) = cli.endpoint {
        config.endpoint = endpoint.to_string();
    }
    let credentials = Credentials::from_env()
        .context("ASSEMBLY_AUTH_KEY is not set")?;

    match cli.command {
        Commands::Submit {
            steps, template_id, fields, files, imports, notify_url,
            max_refresh, refresh_delay_ms, algorithm, no_sign,
        } => {
            if let Some(max) = max_refresh { config.max_refresh = max; }
            if let Some(ms) = refresh_delay_ms { config.refresh_delay = Duration::from_millis(ms); }
            config.algorithm = algorithm.parse::<SignatureAlgorithm>()?;
            config.sign = !no_sign;

            let mut desc = AssemblyDescription::new();
            desc.template_id = template_id;
            desc.notify_url = notify_url.map(|u| u.to_string());
            if let Some(path) = steps {
                desc.steps = read_steps(&path)?;
            }
            for (step, url) in imports {
                desc.import_url(step, url);
            }
            for (key, value) in fields {
                desc.set_field(key, value);
            }
            for (field, path) in files {
                desc.add_file(field, path, None)?;
            }
            if desc.steps.is_empty() && desc.template_id.is_none() {
                bail!("nothing to run: pass --steps, --import or --template-id");
            }

            let client = AssemblyClient::new(credentials, config);
            cmd_submit(&client, desc).await?
        }
        Commands::Status { assembly_url } => {
            let client = AssemblyClient::new(credentials, config);
            let status = client.assembly_status(assembly_url.as_str()).await?;
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
        Commands::Cancel { assembly_url } => {
            let client = AssemblyClient::new(credentials, config);
            let status = client.cancel_assembly(assembly_url.as_str()).await?;
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
    }
    Ok(())
}

fn read_steps(path: &Path) -> Result<BTreeMap<String, Step>> {
    let data = std::fs::read(path).with_context(|| format!("reading steps from {}", path.display()))?;
    serde_json::from_slice(&data).with_context(|| format!("parsing steps in {}", path.display()))
}

async fn cmd_submit(client: &AssemblyClient, desc: AssemblyDescription) -> Result<()> {
    let callbacks = AssemblyCallbacks::new()
        .on_update(|s| {
            eprintln!("… {} ({})", s.ok.as_deref().unwrap_or("?"), s.assembly_id.as_deref().unwrap_or("-"));
        })
        .on_success(|s| eprintln!("✓ completed {}", s.assembly_id.as_deref().unwrap_or("-")))
        .on_error(|err, _| eprintln!("✗ {}: {err}", err.code()));

    let mut run = client.create_assembly(desc, callbacks);
    let result = tokio::select! {
        res = run.run() => res,
        _ = tokio::signal::ctrl_c() => {
            warn!("interrupted, no longer polling; the assembly keeps running remotely");
            bail!("interrupted");
        }
    };

    match result {
        Ok(outcome) => {
            if let AssemblyOutcome::Stopped(ref s) = outcome {
                eprintln!("■ stopped: {}", s.ok.as_deref().unwrap_or("?"));
            }
            println!("{}", serde_json::to_string_pretty(outcome.status())?);
            Ok(())
        }
        Err(err) => {
            if let Some(last) = run.last_response() {
                println!("{}", serde_json::to_string_pretty(last)?);
            }
            Err(err.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_key_value() {
        assert_eq!(parse_key_value("a=b").unwrap(), ("a".to_string(), "b".to_string()));
        assert_eq!(parse_key_value("url=https://x/y?z=1").unwrap().1, "https://x/y?z=1");
        assert!(parse_key_value("novalue").is_err());
        assert!(parse_key_value("=v").is_err());
    }

    #[test]
    fn test_cli_parses_submit() {
        let cli = Cli::try_parse_from([
            "assembly", "submit", "--template-id", "tpl", "--file", "video=./a.mp4", "--field", "w=100", "--no-sign",
        ])
        .unwrap();
        match cli.command {
            Commands::Submit { template_id, files, fields, no_sign, .. } => {
                assert_eq!(template_id.as_deref(), Some("tpl"));
                assert_eq!(files, vec![("video".to_string(), "./a.mp4".to_string())]);
                assert_eq!(fields, vec![("w".to_string(), "100".to_string())]);
                assert!(no_sign);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_read_steps_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("steps.json");
        std::fs::write(&path, r#"{"thumb": {"robot": "/image/resize", "width": 64}}"#).unwrap();
        let steps = read_steps(&path).unwrap();
        assert_eq!(steps["thumb"].robot, "/image/resize");
        assert_eq!(steps["thumb"].params["width"], 64);
    }
}
