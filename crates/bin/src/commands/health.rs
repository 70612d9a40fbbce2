//! Health check command - checks a running Treesync server.

use std::time::Duration;

use serde::Deserialize;

use crate::cli::HealthArgs;

/// Body of `GET /health` as served by `treesync serve`.
#[derive(Debug, Deserialize)]
pub struct HealthReport {
    pub status: String,
    #[serde(default)]
    pub version: u64,
    #[serde(default)]
    pub sessions: usize,
}

fn health_url(base: &str) -> String {
    let base = base.trim_end_matches('/');
    if base.ends_with("/health") {
        base.to_string()
    } else {
        format!("{base}/health")
    }
}

/// Run the health check command
pub async fn run(args: &HealthArgs) -> Result<(), Box<dyn std::error::Error>> {
    let url = health_url(&args.url);
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(args.timeout))
        .build()?;

    let response = match client.get(&url).send().await {
        Ok(response) => response,
        Err(e) => {
            eprintln!("unhealthy: failed to connect to {url}: {e}");
            std::process::exit(1);
        }
    };
    if !response.status().is_success() {
        eprintln!(
            "unhealthy: server returned HTTP status {}",
            response.status()
        );
        std::process::exit(1);
    }

    let report: HealthReport = response.json().await?;
    if report.status != "healthy" {
        eprintln!("unhealthy: server returned status {}", report.status);
        std::process::exit(1);
    }
    println!(
        "healthy: document version {}, {} active sessions",
        report.version, report.sessions
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_url() {
        assert_eq!(health_url("http://h:1"), "http://h:1/health");
        assert_eq!(health_url("http://h:1/"), "http://h:1/health");
        assert_eq!(health_url("http://h:1/health"), "http://h:1/health");
    }
}
