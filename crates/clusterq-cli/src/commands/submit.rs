//! Submit command.

use anyhow::Result;
use std::path::PathBuf;
use std::time::Duration;

use clusterq_client::Cluster;
use clusterq_core::options::{DirectiveValue, SubmitOptions};
use clusterq_core::work::WorkItem;

/// How often `--watch` polls the queue.
const POLL_INTERVAL: Duration = Duration::from_secs(2);

pub struct Args {
    pub backend: String,
    pub uri: Option<String>,
    pub dir: PathBuf,
    pub remote_dir: Option<PathBuf>,
    pub name: Option<String>,
    pub options: Vec<String>,
    pub watch: bool,
    pub command: String,
}

/// Parse `key=value` directives, inferring flag and integer values.
fn parse_options(raw: &[String]) -> Result<SubmitOptions> {
    let mut options = SubmitOptions::new();
    for item in raw {
        let (key, value) = item
            .split_once('=')
            .ok_or_else(|| anyhow::anyhow!("malformed directive (expected key=value): {item}"))?;
        let value = match value {
            "true" => DirectiveValue::Flag(true),
            "false" => DirectiveValue::Flag(false),
            _ => match value.parse::<i64>() {
                Ok(n) => DirectiveValue::Int(n),
                Err(_) => DirectiveValue::Str(value.to_string()),
            },
        };
        options.insert(key.to_string(), value);
    }
    Ok(options)
}

pub async fn run(args: Args) -> Result<()> {
    let mut cluster = match &args.uri {
        Some(uri) => Cluster::attach(uri, Some(&args.dir), args.remote_dir.as_deref()).await?,
        None => Cluster::new(
            &args.backend,
            Some(&args.dir),
            args.remote_dir.as_deref(),
            None,
        )?,
    };

    let options = parse_options(&args.options)?;
    let job = cluster
        .client_mut()
        .new_job(WorkItem::Command(args.command), options, args.name)?;

    job.launch(false).await?;
    println!("name: {}", job.name());
    if let Some(id) = job.remote_id() {
        println!("id:   {id}");
    }

    if !args.watch {
        return Ok(());
    }

    while !job.finished() {
        tokio::time::sleep(POLL_INTERVAL).await;
        job.update().await?;
    }
    println!("status: {}", job.status());
    if let Some(out) = job.stdout().await? {
        print!("{out}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directives_infer_their_types() {
        let raw = vec![
            "queue=debug".to_string(),
            "nodes=4".to_string(),
            "exclusive=true".to_string(),
        ];
        let options = parse_options(&raw).unwrap();
        assert_eq!(options["queue"].as_str(), Some("debug"));
        assert_eq!(options["nodes"].as_int(), Some(4));
        assert_eq!(options["exclusive"].as_flag(), Some(true));
    }

    #[test]
    fn malformed_directive_is_rejected() {
        assert!(parse_options(&["nodes".to_string()]).is_err());
    }
}
