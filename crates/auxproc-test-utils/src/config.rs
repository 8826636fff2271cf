//! Configuration builders for tests.
//!
//! Use [`TestConfigBuilder`] to create customised [`AppConfig`] values without
//! repeating boilerplate across crate boundaries.

use auxproc_config::AppConfig;

/// Fluent builder for [`AppConfig`] in tests.
///
/// # Example
///
/// ```ignore
/// let config = TestConfigBuilder::new()
///     .kind("record")
///     .listen_port(9930)
///     .build();
/// ```
pub struct TestConfigBuilder {
    config: AppConfig,
}

impl TestConfigBuilder {
    pub fn new() -> Self {
        let mut config = AppConfig::default();
        // Tests never fork.
        config.daemon.daemonize = false;
        Self { config }
    }

    pub fn kind(mut self, kind: &str) -> Self {
        self.config.processor.kind = kind.to_string();
        self
    }

    pub fn identity(mut self, identity: &str) -> Self {
        self.config.processor.identity = Some(identity.to_string());
        self
    }

    pub fn listen_addr(mut self, addr: &str) -> Self {
        self.config.transport.listen_addr = addr.to_string();
        self
    }

    pub fn listen_port(mut self, port: u16) -> Self {
        self.config.transport.listen_port = port;
        self
    }

    pub fn auto_exit(mut self, auto_exit: bool) -> Self {
        self.config.daemon.auto_exit = auto_exit;
        self
    }

    pub fn parent_pid(mut self, pid: u32) -> Self {
        self.config.daemon.parent_pid = Some(pid);
        self
    }

    pub fn poll_interval_ms(mut self, ms: u64) -> Self {
        self.config.daemon.poll_interval_ms = ms;
        self
    }

    pub fn log_level(mut self, level: &str) -> Self {
        self.config.logging.level = level.to_string();
        self
    }

    pub fn build(self) -> AppConfig {
        self.config
    }
}

impl Default for TestConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
