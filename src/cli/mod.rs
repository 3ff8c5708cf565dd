//! Command-line interface for the `teamnotify` binary.
//!
//! ```ignore
//! use teamnotify::cli::{parse_args, run_cli_command};
//!
//! let command = parse_args(std::env::args());
//! runtime.block_on(run_cli_command(command, NotifyConfig::from_env()))?;
//! ```

pub mod args;
pub mod listen;
pub mod version;

pub use args::{parse_args, CliCommand, USAGE};
pub use listen::run_listen;
pub use version::{version_string, VERSION};

use color_eyre::eyre::eyre;
use color_eyre::Result;

use crate::auth::{redact_token, Credential};
use crate::config::NotifyConfig;
use crate::hub::NotificationHub;

/// Execute a parsed command.
pub async fn run_cli_command(command: CliCommand, config: NotifyConfig) -> Result<()> {
    match command {
        CliCommand::Version => {
            println!("{}", version_string());
            Ok(())
        }
        CliCommand::Help => {
            println!("{}", USAGE);
            Ok(())
        }
        CliCommand::Invalid(message) => Err(eyre!("{}\n\n{}", message, USAGE)),
        CliCommand::Listen => {
            let hub = NotificationHub::builder(config).build().await?;
            run_listen(&hub).await
        }
        CliCommand::Test => {
            let hub = NotificationHub::builder(config)
                .without_proactive_renewal()
                .build()
                .await?;
            let response = hub.send_test_notification().await?;
            println!("test notification requested: {}", response);
            Ok(())
        }
        CliCommand::SignIn {
            access_token,
            refresh_token,
        } => {
            let credential = Credential::new(access_token, refresh_token);
            let claims = credential.claims()?;
            let hub = NotificationHub::builder(config)
                .without_proactive_renewal()
                .build()
                .await?;
            hub.sign_in(credential.clone()).await;
            println!(
                "signed in as {} ({})",
                claims.user_id().unwrap_or("unknown user"),
                redact_token(&credential.access_token)
            );
            Ok(())
        }
        CliCommand::SignOut => {
            let hub = NotificationHub::builder(config)
                .without_proactive_renewal()
                .build()
                .await?;
            hub.sign_out().await;
            println!("signed out");
            Ok(())
        }
    }
}
