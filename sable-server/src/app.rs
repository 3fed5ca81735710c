//! Server application state and process bootstrap.

use std::net::SocketAddr;

use sable_common::config::ServerConfig;
use sable_common::error::SableResult;
use sable_common::time::now_unix_millis;
use sable_core::StoreContext;
use sable_core::command::{CommandFrame, CommandReply};
use sable_core::db::{Database, REHASH_BUDGET_MS_PER_CYCLE};
use sable_core::dispatch::CommandRegistry;
use sable_facade::protocol::ParsedCommand;

use crate::event_loop::EventLoop;

/// Maintenance tick interval: the cron handler reschedules itself at 10 Hz.
pub(crate) const SERVER_CRON_INTERVAL_MS: u64 = 100;

/// Single-threaded application state: keyspace, command table, and storage parameters.
pub struct ServerApp {
    config: ServerConfig,
    ctx: StoreContext,
    registry: CommandRegistry,
    pub(crate) db: Database,
}

impl ServerApp {
    /// Builds application state from process config with a fresh hash key.
    #[must_use]
    pub fn new(config: ServerConfig) -> Self {
        let ctx = StoreContext::new(&config);
        Self {
            config,
            ctx,
            registry: CommandRegistry::with_builtin_commands(),
            db: Database::new(&ctx),
        }
    }

    /// Executes one decoded command against the keyspace.
    pub fn execute_command(&mut self, command: &ParsedCommand) -> CommandReply {
        let frame = CommandFrame::new(command.name.clone(), command.args.clone());
        self.registry.dispatch(&frame, &mut self.db, &self.ctx)
    }

    /// Periodic maintenance: expiry sweep plus bounded rehash work.
    ///
    /// Registered as a time event at startup; the `Some` return reschedules the next tick.
    pub(crate) fn server_cron(app: &mut ServerApp) -> Option<u64> {
        let now = now_unix_millis();
        let evicted = app.db.expire_cycle(now);
        if evicted > 0 {
            log::debug!("expiry sweep evicted {evicted} keys");
        }
        if app.db.is_rehashing() {
            let _ = app.db.rehash_step(REHASH_BUDGET_MS_PER_CYCLE);
        }
        Some(SERVER_CRON_INTERVAL_MS)
    }

    /// One-line startup banner.
    #[must_use]
    pub fn startup_summary(&self) -> String {
        format!(
            "sable-server listening on port {} (set upgrade threshold {})",
            self.config.port, self.config.max_list_size
        )
    }
}

/// Binds the listener, registers the maintenance tick, and runs the reactor forever.
///
/// # Errors
///
/// Returns `SableError::Io` when the listener cannot bind or polling fails.
pub(crate) fn run() -> SableResult<()> {
    let config = ServerConfig::from_env();
    let mut app = ServerApp::new(config);
    let bind_addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let mut event_loop = EventLoop::bind(bind_addr)?;
    let _ = event_loop.schedule(SERVER_CRON_INTERVAL_MS, ServerApp::server_cron);
    log::info!("{}", app.startup_summary());
    event_loop.run(&mut app)
}
