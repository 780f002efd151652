//! Network stream source
//!
//! Reads Motion-JPEG from either a raw byte stream at `tcp://host:port` or an
//! `http://` URL (a `multipart/x-mixed-replace` camera stream; multipart
//! boundaries are skipped by the JPEG splitter). A dropped or stalled
//! connection is re-established with capped exponential backoff; after
//! `max_attempts` consecutive failures the source gives up with a fatal error.

use std::io::{ErrorKind, Read};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use contracts::{
    ContractError, Frame, FrameSource, ReadOutcome, SourceConfig, SourceType, StopSignal,
};
use metrics::counter;
use tracing::{debug, info, warn};

use crate::decode::decode_jpeg;
use crate::mjpeg::MjpegSplitter;

const TCP_SCHEME: &str = "tcp://";
const HTTP_SCHEME: &str = "http://";
const READ_CHUNK: usize = 64 * 1024;

type ByteStream = Box<dyn Read + Send>;

enum Endpoint<'a> {
    Tcp(&'a str),
    Http(&'a str),
}

/// Reconnect policy for network streams
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl ReconnectPolicy {
    pub fn from_config(config: &SourceConfig) -> Self {
        Self {
            max_attempts: config.reconnect_max_attempts.max(1),
            initial_delay: config.reconnect_initial_delay(),
            max_delay: config.reconnect_max_delay(),
        }
    }

    /// Delay before reconnect attempt `attempt` (1-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::from_config(&SourceConfig::default())
    }
}

/// TCP or HTTP MJPEG stream source
pub struct NetworkStreamSource {
    source_id: String,
    policy: ReconnectPolicy,
    stop: StopSignal,
    connect_timeout: Duration,
    read_timeout: Duration,
    stream: Option<ByteStream>,
    splitter: MjpegSplitter,
    chunk: Vec<u8>,
    sequence: u64,
    reconnects: u64,
    opened: bool,
}

impl NetworkStreamSource {
    pub fn new(url: impl Into<String>, policy: ReconnectPolicy, stop: StopSignal) -> Self {
        Self {
            source_id: url.into(),
            policy,
            stop,
            connect_timeout: Duration::from_secs(5),
            read_timeout: Duration::from_secs(5),
            stream: None,
            splitter: MjpegSplitter::default(),
            chunk: vec![0u8; READ_CHUNK],
            sequence: 0,
            reconnects: 0,
            opened: false,
        }
    }

    /// Override connect and read timeouts
    pub fn with_timeouts(mut self, connect: Duration, read: Duration) -> Self {
        self.connect_timeout = connect;
        self.read_timeout = read;
        self
    }

    /// Successful reconnects since open
    pub fn reconnects(&self) -> u64 {
        self.reconnects
    }

    fn endpoint(&self) -> Result<Endpoint<'_>, ContractError> {
        let url = self.source_id.as_str();
        let endpoint = if let Some(addr) = url.strip_prefix(TCP_SCHEME) {
            Some(addr).filter(|a| !a.is_empty()).map(Endpoint::Tcp)
        } else {
            url.strip_prefix(HTTP_SCHEME)
                .filter(|rest| !rest.is_empty())
                .map(|_| Endpoint::Http(url))
        };
        endpoint.ok_or_else(|| {
            ContractError::source_open(
                &self.source_id,
                "expected tcp://host:port or http://host[:port]/path",
            )
        })
    }

    fn connect(&self) -> std::io::Result<ByteStream> {
        let endpoint = self
            .endpoint()
            .map_err(|e| std::io::Error::new(ErrorKind::InvalidInput, e.to_string()))?;
        match endpoint {
            Endpoint::Tcp(address) => {
                let stream = self.connect_tcp(address)?;
                Ok(Box::new(stream))
            }
            Endpoint::Http(url) => self.connect_http(url),
        }
    }

    fn connect_tcp(&self, address: &str) -> std::io::Result<TcpStream> {
        let addrs: Vec<SocketAddr> = address.to_socket_addrs()?.collect();
        let mut last_error = None;
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, self.connect_timeout) {
                Ok(stream) => {
                    stream.set_read_timeout(Some(self.read_timeout))?;
                    return Ok(stream);
                }
                Err(e) => last_error = Some(e),
            }
        }
        Err(last_error
            .unwrap_or_else(|| std::io::Error::new(ErrorKind::NotFound, "address did not resolve")))
    }

    /// GET the stream; any non-2xx status is a connect failure
    fn connect_http(&self, url: &str) -> std::io::Result<ByteStream> {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(self.connect_timeout)
            .timeout_read(self.read_timeout)
            .build();
        let response = agent
            .get(url)
            .set("Accept", "multipart/x-mixed-replace, image/jpeg")
            .call()
            .map_err(|e| std::io::Error::new(ErrorKind::ConnectionRefused, e.to_string()))?;
        debug!(
            source = %self.source_id,
            status = response.status(),
            content_type = response.content_type(),
            "HTTP stream response"
        );
        Ok(Box::new(response.into_reader()))
    }

    fn disconnect(&mut self) {
        self.stream = None;
        self.splitter.reset();
    }

    /// Re-establish the connection or give up after `max_attempts`
    fn reconnect(&mut self) -> Result<(), ContractError> {
        for attempt in 1..=self.policy.max_attempts {
            let delay = self.policy.delay_for(attempt);
            if self.stop.wait_timeout(delay) {
                return Err(ContractError::source_read(
                    &self.source_id,
                    "stopped while reconnecting",
                ));
            }

            match self.connect() {
                Ok(stream) => {
                    self.stream = Some(stream);
                    self.splitter.reset();
                    self.reconnects += 1;
                    counter!("edge_agent_source_reconnects_total").increment(1);
                    info!(source = %self.source_id, attempt, "Stream reconnected");
                    return Ok(());
                }
                Err(e) => {
                    warn!(
                        source = %self.source_id,
                        attempt,
                        max_attempts = self.policy.max_attempts,
                        error = %e,
                        "Reconnect attempt failed"
                    );
                }
            }
        }

        Err(ContractError::source_fatal(
            &self.source_id,
            format!(
                "stream unreachable after {} reconnect attempts",
                self.policy.max_attempts
            ),
        ))
    }

    /// Pull one chunk into the splitter; `false` when the connection is gone
    fn fill(&mut self) -> bool {
        let Some(stream) = self.stream.as_mut() else {
            return false;
        };
        match stream.read(&mut self.chunk) {
            Ok(0) => {
                warn!(source = %self.source_id, "Stream closed by peer");
                false
            }
            Ok(n) => {
                self.splitter.push(&self.chunk[..n]);
                true
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => true,
            Err(e) => {
                warn!(source = %self.source_id, error = %e, "Stream read failed");
                false
            }
        }
    }
}

impl FrameSource for NetworkStreamSource {
    fn source_id(&self) -> &str {
        &self.source_id
    }

    fn kind(&self) -> SourceType {
        SourceType::NetworkStream
    }

    fn open(&mut self) -> Result<(), ContractError> {
        self.endpoint()?;
        let stream = self
            .connect()
            .map_err(|e| ContractError::source_open(&self.source_id, e.to_string()))?;
        info!(source = %self.source_id, "Network stream connected");
        self.stream = Some(stream);
        self.splitter.reset();
        self.opened = true;
        Ok(())
    }

    fn read(&mut self) -> Result<ReadOutcome, ContractError> {
        if !self.opened {
            return Err(ContractError::source_fatal(
                &self.source_id,
                "read on a closed stream",
            ));
        }

        loop {
            if self.stop.is_triggered() {
                return Err(ContractError::source_read(&self.source_id, "stopped"));
            }

            if let Some(jpeg) = self.splitter.next_frame() {
                match decode_jpeg(&jpeg, &format!("frame#{}", self.sequence)) {
                    Ok(image) => {
                        let frame = Frame::new(image, self.sequence, &self.source_id)
                            .with_meta("bytes", jpeg.len());
                        self.sequence += 1;
                        return Ok(ReadOutcome::Frame(frame));
                    }
                    Err(e) => {
                        warn!(source = %self.source_id, error = %e, "Dropping corrupt stream frame");
                        continue;
                    }
                }
            }

            if !self.fill() {
                self.disconnect();
                self.reconnect()?;
            }
        }
    }

    fn close(&mut self) {
        if self.opened {
            debug!(source = %self.source_id, reconnects = self.reconnects, "Network stream closed");
        }
        self.disconnect();
        self.opened = false;
    }

    fn progress(&self) -> Option<f64> {
        None
    }
}
