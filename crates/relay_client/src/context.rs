//! One relay session, owned.
//!
//! Bundles the settings, backend client, session store, interpreter and
//! poll loop that make up a running relay. Nothing here is global, so
//! several contexts can live side by side (tests do exactly that).

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use gridrelay_config::{RelayConfig, SessionStore};
use gridrelay_engine::{Interpreter, SpreadsheetHost};

use crate::client::{RelayClient, RelayError};
use crate::poller::{PollConfig, PollLoop, PollStats, TickOutcome};

/// What [`RelayContext::initialize`] managed to load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InitReport {
    /// Keys in the loaded mapping, if the mapping was fetched.
    pub mapped_keys: Option<usize>,
    /// Sheets seeded from the template, if it was requested and fetched.
    pub template_sheets: Option<usize>,
}

pub struct RelayContext<H: SpreadsheetHost + Send + 'static> {
    config: RelayConfig,
    client: RelayClient,
    sessions: SessionStore,
    interpreter: Arc<Mutex<Interpreter<H>>>,
    poller: PollLoop<Interpreter<H>>,
}

impl<H: SpreadsheetHost + Send + 'static> RelayContext<H> {
    pub fn new(config: RelayConfig, sessions: SessionStore, host: H) -> Result<Self, RelayError> {
        let client = RelayClient::new(&config)?;
        let interpreter = Arc::new(Mutex::new(Interpreter::new(host)));
        let poller = PollLoop::new(client.clone(), sessions.clone(), Arc::clone(&interpreter));
        poller.set_report_results(config.report_results);

        Ok(Self { config, client, sessions, interpreter, poller })
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn client(&self) -> &RelayClient {
        &self.client
    }

    pub fn interpreter(&self) -> Arc<Mutex<Interpreter<H>>> {
        Arc::clone(&self.interpreter)
    }

    /// Fetch the key mapping and, when configured, the template.
    ///
    /// Neither is fatal: a missing mapping only affects key-based commands,
    /// and a missing template leaves the grid as it was.
    pub fn initialize(&self) -> InitReport {
        let mut report = InitReport::default();

        match self.client.with_fallback(|base| self.client.fetch_mapping(base)) {
            Ok((base, rows)) => {
                let mut interpreter = self.interpreter.lock().unwrap_or_else(PoisonError::into_inner);
                if interpreter.load_key_map(&rows) {
                    let keys = interpreter.key_map().map(|m| m.len()).unwrap_or(0);
                    log::info!("Loaded {} key mapping(s) from {}", keys, base);
                    report.mapped_keys = Some(keys);
                }
            }
            Err(e) => log::warn!("Key mapping unavailable: {}", e),
        }

        if self.config.load_template {
            match self.client.with_fallback(|base| self.client.fetch_template(base)) {
                Ok((_, sheets)) => {
                    let mut interpreter = self.interpreter.lock().unwrap_or_else(PoisonError::into_inner);
                    match interpreter.host_mut().load_template(&sheets) {
                        Ok(()) => {
                            log::info!("Seeded {} sheet(s) from template", sheets.len());
                            report.template_sheets = Some(sheets.len());
                        }
                        Err(e) => log::warn!("Host rejected template: {}", e),
                    }
                }
                Err(e) => log::warn!("Template unavailable: {}", e),
            }
        }

        report
    }

    /// Start polling at the configured interval.
    pub fn start(&mut self) {
        let interval = Duration::from_millis(self.config.poll_interval_ms);
        self.poller.start(PollConfig { interval });
    }

    pub fn stop(&mut self) {
        self.poller.stop();
    }

    pub fn is_running(&self) -> bool {
        self.poller.is_running()
    }

    pub fn poll_once(&self) -> TickOutcome {
        self.poller.poll_once()
    }

    pub fn session_id(&self) -> String {
        self.poller.session_id()
    }

    pub fn stats(&self) -> PollStats {
        self.poller.stats()
    }
}
