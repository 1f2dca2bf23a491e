//! The configuration surface a [`Client`](crate::client::Client) binds to
//! one authority.

use tracing::Level;

const DEFAULT_MAX_CONNECTIONS: usize = 20;
const DEFAULT_MAX_WAITERS: usize = 100;

/// Which scheme an authority is reached over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    fn default_port(self) -> u16 {
        match self {
            Scheme::Http => 80,
            Scheme::Https => 443,
        }
    }
}

/// Binds a [`Client`](crate::client::Client) to one authority and bounds
/// its connection pool.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    host: String,
    port: u16,
    scheme: Scheme,
    max_connections: usize,
    max_waiters: usize,
    io_threads: usize,
    tcp_nodelay: bool,
    buffer_size: Option<usize>,
    debug: Option<Level>,
}

impl ClientConfig {
    pub fn builder(host: impl Into<String>) -> ClientConfigBuilder {
        ClientConfigBuilder::new(host)
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    pub(crate) fn is_tls(&self) -> bool {
        self.scheme == Scheme::Https
    }

    pub fn max_connections(&self) -> usize {
        self.max_connections
    }

    pub fn max_waiters(&self) -> usize {
        self.max_waiters
    }

    /// I/O driver parallelism, used to size the dedicated multi-thread
    /// runtime a [`Client`](crate::client::Client) spins up for itself.
    /// User callbacks still run on whatever executor polls the futures
    /// this crate returns; this only bounds the client's own I/O driver
    /// threads.
    pub fn io_threads(&self) -> usize {
        self.io_threads
    }

    pub fn tcp_nodelay(&self) -> bool {
        self.tcp_nodelay
    }

    pub fn buffer_size(&self) -> Option<usize> {
        self.buffer_size
    }

    /// If set, wire-level tracing for this client is emitted at this
    /// level under the `linkpool::wire` target.
    pub fn debug(&self) -> Option<Level> {
        self.debug
    }
}

/// Builder for [`ClientConfig`].
pub struct ClientConfigBuilder {
    host: String,
    port: Option<u16>,
    scheme: Scheme,
    max_connections: usize,
    max_waiters: usize,
    io_threads: usize,
    tcp_nodelay: bool,
    buffer_size: Option<usize>,
    debug: Option<Level>,
}

impl ClientConfigBuilder {
    fn new(host: impl Into<String>) -> ClientConfigBuilder {
        ClientConfigBuilder {
            host: host.into(),
            port: None,
            scheme: Scheme::Http,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            max_waiters: DEFAULT_MAX_WAITERS,
            io_threads: default_io_threads(),
            tcp_nodelay: true,
            buffer_size: None,
            debug: None,
        }
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn scheme(mut self, scheme: Scheme) -> Self {
        self.scheme = scheme;
        self
    }

    pub fn max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    pub fn max_waiters(mut self, max: usize) -> Self {
        self.max_waiters = max;
        self
    }

    pub fn io_threads(mut self, threads: usize) -> Self {
        self.io_threads = threads.max(1);
        self
    }

    pub fn tcp_nodelay(mut self, enabled: bool) -> Self {
        self.tcp_nodelay = enabled;
        self
    }

    pub fn buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = Some(size);
        self
    }

    pub fn debug(mut self, level: Level) -> Self {
        self.debug = Some(level);
        self
    }

    pub fn build(self) -> ClientConfig {
        let port = self.port.unwrap_or_else(|| self.scheme.default_port());
        ClientConfig {
            host: self.host,
            port,
            scheme: self.scheme,
            max_connections: self.max_connections,
            max_waiters: self.max_waiters,
            io_threads: self.io_threads,
            tcp_nodelay: self.tcp_nodelay,
            buffer_size: self.buffer_size,
            debug: self.debug,
        }
    }
}

fn default_io_threads() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get().min(2))
        .unwrap_or(1)
}
