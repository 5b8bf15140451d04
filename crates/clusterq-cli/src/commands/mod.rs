//! CLI command implementations.

pub mod submit;

use anyhow::Result;

use clusterq_client::ServerProxy;

pub fn backends() {
    for name in clusterq_backends::backend_names() {
        println!("{name}");
    }
}

pub async fn serve(backend: &str, host: &str, port: u16) -> Result<()> {
    if !clusterq_backends::is_registered(backend) {
        anyhow::bail!("unknown backend: {backend}");
    }
    let state_dir = clusterq_core::config::state_dir()?;
    let handle = clusterq_server::daemon::start(backend, host, port, &state_dir).await?;
    println!("instance: {}", handle.instance);
    println!("pid:      {}", handle.pid);
    println!("uri:      {}", handle.uri);
    Ok(())
}

pub async fn ping(uri: &str) -> Result<()> {
    let proxy = ServerProxy::new(uri)?;
    let token = proxy.ping().await?;
    let backend = proxy.backend_name().await?;
    println!("{token} ({backend})");
    Ok(())
}

pub async fn status(uri: &str, job: Option<&str>) -> Result<()> {
    let proxy = ServerProxy::new(uri)?;
    let entries = proxy.queue(job).await?;
    if entries.is_empty() {
        println!("Queue is empty");
        return Ok(());
    }
    for entry in entries {
        println!("{}\t{}", entry.id, entry.status);
    }
    Ok(())
}

pub async fn cancel(uri: &str, ids: &[String]) -> Result<()> {
    if ids.is_empty() {
        anyhow::bail!("no job ids given");
    }
    let proxy = ServerProxy::new(uri)?;
    if proxy.cancel(ids).await? {
        println!("Cancelled {} job(s)", ids.len());
        Ok(())
    } else {
        anyhow::bail!("cancellation was rejected");
    }
}

pub async fn metrics(uri: &str, job: Option<&str>) -> Result<()> {
    let proxy = ServerProxy::new(uri)?;
    let rows = proxy.metrics(job).await?;
    if rows.is_empty() {
        println!("No accounting data");
        return Ok(());
    }
    for row in rows {
        println!("{}", row.join("|"));
    }
    Ok(())
}

pub async fn selftest(uri: &str) -> Result<()> {
    let proxy = ServerProxy::new(uri)?;
    if proxy.self_test().await? {
        println!("Backend is usable");
        Ok(())
    } else {
        anyhow::bail!("backend self test failed");
    }
}

pub async fn shutdown(uri: &str) -> Result<()> {
    let proxy = ServerProxy::new(uri)?;
    proxy.shutdown().await?;
    println!("Shutdown requested");
    Ok(())
}
