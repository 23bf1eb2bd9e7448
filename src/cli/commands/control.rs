//! Flow-control commands: pause, resume, trigger, signal.

use console::style;

use crate::client::GovernanceClient;
use crate::config::Settings;
use crate::governance::GovernanceManager;
use crate::models::ControlSignal;

use super::super::helpers::styled_signal;

#[derive(Debug, Clone, Copy)]
pub enum Action {
    Pause,
    Resume,
    Immediate,
    Show,
}

pub async fn cmd_control(
    settings: &Settings,
    remote: Option<&str>,
    action: Action,
) -> anyhow::Result<()> {
    let signal = match remote {
        Some(base_url) => {
            let client = GovernanceClient::new(base_url)?;
            match action {
                Action::Pause => client.pause().await?,
                Action::Resume => client.resume().await?,
                Action::Immediate => client.trigger_immediate().await?,
                Action::Show => client.signal().await?,
            }
        }
        None => {
            let governor = GovernanceManager::from_settings(settings)?;
            match action {
                Action::Pause => governor.pause()?,
                Action::Resume => governor.resume()?,
                Action::Immediate => governor.trigger_immediate()?,
                Action::Show => {}
            }
            governor.current_signal()
        }
    };

    match action {
        Action::Show => println!("Signal: {}", styled_signal(signal)),
        _ => println!("{} Signal set to {}", style("✓").green(), styled_signal(signal)),
    }

    if remote.is_none() && !matches!(action, Action::Show) && signal != ControlSignal::Normal {
        println!(
            "  {}",
            style("Workers in other processes read the signal at start-up; use --remote for a running service").dim()
        );
    }

    Ok(())
}
