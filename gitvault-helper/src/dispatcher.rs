// gitvault-helper/src/dispatcher.rs
//
// Reads one credential request from stdin, selects a provider through the
// registry, runs the verb, and writes the protocol response to stdout.

use std::io::BufReader;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

use gitvault_common::error::Error;
use gitvault_common::models::input::InputArguments;

use gitvault_core::config::StoreBackend;
use gitvault_core::protocol;

use crate::context::HelperContext;

pub struct Dispatcher {
    context: HelperContext,
}

impl Dispatcher {
    pub fn new(context: HelperContext) -> Self {
        Self { context }
    }

    fn read_input() -> Result<InputArguments, Error> {
        let stdin = std::io::stdin();
        let mut reader = BufReader::new(stdin.lock());
        let dict = protocol::read_dictionary(&mut reader)?;
        InputArguments::from_map(dict)
    }

    /// A ctrl-c anywhere during the attempt tears down listeners, polling
    /// loops and helper subprocesses.
    fn cancellation_token() -> CancellationToken {
        let cancel = CancellationToken::new();
        let signal_source = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                signal_source.cancel();
            }
        });
        cancel
    }

    pub async fn get(&self) -> Result<(), Error> {
        let input = Self::read_input()?;
        let provider = self.context.registry.get_provider(&input).await?;
        info!(provider = provider.id(), host = input.host(), "handling get request");

        let cancel = Self::cancellation_token();
        let credential = provider.get_credential(&input, &cancel).await?;

        let mut output: Vec<(String, String)> = Vec::new();
        output.push(("protocol".to_string(), input.protocol().to_string()));
        output.push(("host".to_string(), input.host().to_string()));
        if let Some(path) = input.path() {
            output.push(("path".to_string(), path.to_string()));
        }
        output.push(("username".to_string(), credential.account.clone()));
        output.push(("password".to_string(), credential.secret.clone()));

        let mut properties: Vec<_> = credential.properties.iter().collect();
        properties.sort();
        for (key, value) in properties {
            output.push((key.clone(), value.clone()));
        }
        output.push(("request-id".to_string(), Uuid::new_v4().to_string()));

        let stdout = std::io::stdout();
        protocol::write_dictionary(&mut stdout.lock(), &output)
    }

    pub async fn store(&self) -> Result<(), Error> {
        let input = Self::read_input()?;
        let provider = self.context.registry.get_provider(&input).await?;
        debug!(provider = provider.id(), host = input.host(), "handling store request");
        provider.store_credential(&input).await
    }

    pub async fn erase(&self) -> Result<(), Error> {
        let input = Self::read_input()?;
        let provider = self.context.registry.get_provider(&input).await?;
        debug!(provider = provider.id(), host = input.host(), "handling erase request");
        provider.erase_credential(&input).await
    }

    pub async fn clear_authority_cache(&self) -> Result<(), Error> {
        self.context.authority_cache.clear().await?;
        eprintln!("authority cache cleared");
        Ok(())
    }

    pub async fn diagnose(&self) -> Result<(), Error> {
        let settings = &self.context.settings;
        println!("gitvault diagnostics");
        println!("  version:            {}", env!("CARGO_PKG_VERSION"));
        println!(
            "  credential store:   {}",
            match settings.store_backend() {
                StoreBackend::Keyring => "keyring",
                StoreBackend::File => "file",
                StoreBackend::Memory => "memory",
            }
        );
        println!("  interactive:        {}", settings.is_interaction_allowed());
        println!(
            "  terminal prompts:   {}",
            settings.is_terminal_prompts_enabled()
        );
        println!("  desktop session:    {}", settings.is_desktop_session());
        println!("  autodetect probe:   {}", settings.is_probe_enabled());
        println!("  broker enabled:     {}", settings.use_broker());

        // Exercise the store end to end with a throwaway entry.
        let probe_service = "https://probe.gitvault.invalid";
        let roundtrip = self
            .context
            .store
            .add_or_update(probe_service, "probe", "probe")
            .and_then(|()| self.context.store.get(probe_service, Some("probe")))
            .and_then(|found| {
                self.context.store.remove(probe_service, Some("probe"))?;
                Ok(found.is_some())
            });
        match roundtrip {
            Ok(true) => println!("  store roundtrip:    ok"),
            Ok(false) => println!("  store roundtrip:    write succeeded but read came back empty"),
            Err(err) => println!("  store roundtrip:    failed ({})", err),
        }
        Ok(())
    }
}
