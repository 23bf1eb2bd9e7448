//! Web server command.

use console::style;

use crate::config::Settings;

/// Start the governance service.
pub async fn cmd_serve(settings: &Settings, bind: Option<&str>) -> anyhow::Result<()> {
    let (host, port) = match bind {
        Some(bind) => parse_bind_address(bind, settings.port)?,
        None => (settings.host.clone(), settings.port),
    };

    settings.ensure_directories()?;

    println!(
        "{} Starting crawlgov at http://{}:{}",
        style("→").cyan(),
        host,
        port
    );
    println!("  Database: {}", settings.database_path().display());
    println!("  Press Ctrl+C to stop");

    crate::server::serve(settings, &host, port).await
}

/// Parse a bind address that can be:
/// - Just a port: "8002" -> 127.0.0.1:8002
/// - Just a host: "0.0.0.0" -> 0.0.0.0:<default port>
/// - Host and port: "0.0.0.0:8002" -> 0.0.0.0:8002
fn parse_bind_address(bind: &str, default_port: u16) -> anyhow::Result<(String, u16)> {
    let bind = bind.trim();
    if bind.is_empty() {
        anyhow::bail!("Empty bind address");
    }

    if let Ok(port) = bind.parse::<u16>() {
        return Ok(("127.0.0.1".to_string(), port));
    }

    if let Some((host, port_str)) = bind.rsplit_once(':') {
        if let Ok(port) = port_str.parse::<u16>() {
            return Ok((host.to_string(), port));
        }
    }

    Ok((bind.to_string(), default_port))
}
