//! Vendor control request service framing.
//!
//! A control request is carried over endpoint 0 as a short exchange of
//! vendor requests, all using `bRequest = 0x50` and the service type in
//! `wIndex`:
//!
//! 1. `INIT` (IN, `wValue` = request type) allocates a request and returns its id.
//! 2. `SEND` (OUT, `wValue` = id) uploads the request payload, if any.
//! 3. `CHECK` (IN, `wValue` = id) is polled until the request is no longer pending;
//!    the final reply carries the result code and reply size.
//! 4. `RECV` (IN, `wValue` = id) downloads the reply data, if any.
//!
//! Every IN stage returns a little-endian reply header:
//! `status: u16, id: u16, size: u32, result: i32`. Shorter replies omit the
//! trailing fields.

use std::time::{Duration, Instant};

use rusb::Direction;
use tracing::{debug, trace, warn};

use crate::error::TransportFault;
use crate::transport::ControlReply;

/// `bRequest` shared by every service request ('P').
pub const SERVICE_BREQUEST: u8 = 0x50;
/// Minimum `wLength` the device accepts for service replies.
pub const MIN_WLENGTH: usize = 64;
/// Interval between `CHECK` polls while a request is pending.
pub const POLL_INTERVAL: Duration = Duration::from_millis(50);
/// Timeout for the best-effort `RESET` after a failed exchange.
pub const RESET_TIMEOUT: Duration = Duration::from_millis(500);
/// Largest reply the host will download. Keys replies are far smaller.
pub const MAX_REPLY_LEN: usize = 4096;
/// libusb takes whole milliseconds and treats 0 as "wait forever", so
/// anything shorter than this counts as expired.
const MIN_TRANSFER_TIMEOUT: Duration = Duration::from_millis(1);

/// Service request kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum ServiceType {
    Init = 1,
    Check = 2,
    Send = 3,
    Recv = 4,
    Reset = 5,
}

/// Status field of a service reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceStatus {
    Ok,
    Error,
    Pending,
    Busy,
    NoMemory,
    NotFound,
    Unknown(u16),
}

impl From<u16> for ServiceStatus {
    fn from(value: u16) -> Self {
        match value {
            0 => Self::Ok,
            1 => Self::Error,
            2 => Self::Pending,
            3 => Self::Busy,
            4 => Self::NoMemory,
            5 => Self::NotFound,
            other => Self::Unknown(other),
        }
    }
}

/// Setup packet fields of a single service request. `wLength` is the
/// length of the buffer handed to the pipe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Setup {
    pub direction: Direction,
    pub service: ServiceType,
    pub value: u16,
}

impl Setup {
    #[must_use]
    pub fn init(request_type: u16) -> Self {
        Self { direction: Direction::In, service: ServiceType::Init, value: request_type }
    }

    #[must_use]
    pub fn send(id: u16) -> Self {
        Self { direction: Direction::Out, service: ServiceType::Send, value: id }
    }

    #[must_use]
    pub fn check(id: u16) -> Self {
        Self { direction: Direction::In, service: ServiceType::Check, value: id }
    }

    #[must_use]
    pub fn recv(id: u16) -> Self {
        Self { direction: Direction::In, service: ServiceType::Recv, value: id }
    }

    #[must_use]
    pub fn reset(id: u16) -> Self {
        Self { direction: Direction::In, service: ServiceType::Reset, value: id }
    }

    /// `bmRequestType` for a vendor request addressed to the device.
    #[must_use]
    pub fn request_type(&self) -> u8 {
        rusb::request_type(self.direction, rusb::RequestType::Vendor, rusb::Recipient::Device)
    }

    /// `wIndex` carries the service type.
    #[must_use]
    pub fn index(&self) -> u16 {
        self.service as u16
    }
}

/// Parsed service reply header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceReply {
    pub status: ServiceStatus,
    id: Option<u16>,
    size: Option<u32>,
    result: Option<i32>,
}

impl ServiceReply {
    /// Parse a reply header.
    ///
    /// # Errors
    /// Returns [`TransportFault::Protocol`] if the reply is shorter than the
    /// status field.
    pub fn parse(buf: &[u8]) -> Result<Self, TransportFault> {
        let Some(status) = buf.get(0..2) else {
            return Err(TransportFault::Protocol(format!("reply too short ({} bytes)", buf.len())));
        };

        Ok(Self {
            status: u16::from_le_bytes([status[0], status[1]]).into(),
            id: buf.get(2..4).map(|b| u16::from_le_bytes([b[0], b[1]])),
            size: buf.get(4..8).map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]])),
            result: buf.get(8..12).map(|b| i32::from_le_bytes([b[0], b[1], b[2], b[3]])),
        })
    }

    /// Fail unless the status is OK.
    ///
    /// # Errors
    /// Returns [`TransportFault::Status`] for any other status.
    pub fn expect_ok(self, service: ServiceType) -> Result<Self, TransportFault> {
        if self.status == ServiceStatus::Ok {
            Ok(self)
        } else {
            Err(TransportFault::Status { service, status: self.status })
        }
    }

    /// Request id assigned by `INIT`.
    ///
    /// # Errors
    /// Returns [`TransportFault::Protocol`] if the reply has no id field.
    pub fn id(&self) -> Result<u16, TransportFault> {
        self.id.ok_or_else(|| TransportFault::Protocol("reply has no request id".into()))
    }

    /// Reply data size reported by `CHECK`.
    ///
    /// # Errors
    /// Returns [`TransportFault::Protocol`] if the reply has no size field.
    pub fn size(&self) -> Result<u32, TransportFault> {
        self.size.ok_or_else(|| TransportFault::Protocol("reply has no size".into()))
    }

    /// Result code reported by `CHECK`.
    ///
    /// # Errors
    /// Returns [`TransportFault::Protocol`] if the reply has no result field.
    pub fn result(&self) -> Result<i32, TransportFault> {
        self.result.ok_or_else(|| TransportFault::Protocol("reply has no result code".into()))
    }
}

/// Blocking access to endpoint 0.
pub trait ControlPipe {
    /// Device-to-host transfer; `buf.len()` is `wLength`.
    ///
    /// # Errors
    /// Returns the underlying USB error.
    fn control_in(&self, setup: Setup, buf: &mut [u8], timeout: Duration) -> rusb::Result<usize>;

    /// Host-to-device transfer.
    ///
    /// # Errors
    /// Returns the underlying USB error.
    fn control_out(&self, setup: Setup, data: &[u8], timeout: Duration) -> rusb::Result<usize>;
}

impl<T: rusb::UsbContext> ControlPipe for rusb::DeviceHandle<T> {
    fn control_in(&self, setup: Setup, buf: &mut [u8], timeout: Duration) -> rusb::Result<usize> {
        self.read_control(
            setup.request_type(),
            SERVICE_BREQUEST,
            setup.value,
            setup.index(),
            buf,
            timeout,
        )
    }

    fn control_out(&self, setup: Setup, data: &[u8], timeout: Duration) -> rusb::Result<usize> {
        self.write_control(
            setup.request_type(),
            SERVICE_BREQUEST,
            setup.value,
            setup.index(),
            data,
            timeout,
        )
    }
}

/// Time budget shared by every stage of one request.
#[derive(Debug, Clone, Copy)]
struct Deadline {
    at: Instant,
    budget: Duration,
}

impl Deadline {
    fn after(budget: Duration) -> Self {
        Self { at: Instant::now() + budget, budget }
    }

    fn remaining(&self) -> Result<Duration, TransportFault> {
        let left = self.at.saturating_duration_since(Instant::now());
        if left < MIN_TRANSFER_TIMEOUT {
            Err(TransportFault::Timeout(self.budget))
        } else {
            Ok(left)
        }
    }
}

fn query<P: ControlPipe>(
    pipe: &P,
    setup: Setup,
    deadline: &Deadline,
) -> Result<ServiceReply, TransportFault> {
    let mut buf = [0u8; MIN_WLENGTH];
    let len = pipe.control_in(setup, &mut buf, deadline.remaining()?)?;
    let reply = ServiceReply::parse(&buf[..len])?;
    trace!(service = ?setup.service, status = ?reply.status, "Service reply");
    Ok(reply)
}

/// Run one complete control request over `pipe`, blocking the caller.
///
/// # Errors
/// Returns a [`TransportFault`] if any stage fails, the device reports a
/// non-OK service status, or the whole exchange exceeds `timeout`.
pub fn transact<P: ControlPipe>(
    pipe: &P,
    request_type: u16,
    payload: &[u8],
    timeout: Duration,
) -> Result<ControlReply, TransportFault> {
    let deadline = Deadline::after(timeout);

    // Allocate the request
    let id = query(pipe, Setup::init(request_type), &deadline)?.expect_ok(ServiceType::Init)?.id()?;
    debug!(id, request_type, "Control request allocated");

    let outcome = exchange(pipe, id, payload, &deadline);

    // Free the device-side buffer on failure
    if outcome.is_err() {
        let mut buf = [0u8; MIN_WLENGTH];
        if let Err(e) = pipe.control_in(Setup::reset(id), &mut buf, RESET_TIMEOUT) {
            warn!(id, error = %e, "Failed to reset control request");
        }
    }
    outcome
}

fn exchange<P: ControlPipe>(
    pipe: &P,
    id: u16,
    payload: &[u8],
    deadline: &Deadline,
) -> Result<ControlReply, TransportFault> {
    if !payload.is_empty() {
        let written = pipe.control_out(Setup::send(id), payload, deadline.remaining()?)?;
        if written != payload.len() {
            return Err(TransportFault::Protocol(format!(
                "short write: {written} of {} bytes",
                payload.len()
            )));
        }
        debug!(id, len = written, "Request payload sent");
    }

    let reply = loop {
        let reply = query(pipe, Setup::check(id), deadline)?;
        if reply.status != ServiceStatus::Pending {
            break reply.expect_ok(ServiceType::Check)?;
        }
        std::thread::sleep(POLL_INTERVAL.min(deadline.remaining()?));
    };

    let result = reply.result()?;
    let size = reply.size()?;
    let size = usize::try_from(size).ok().filter(|len| *len <= MAX_REPLY_LEN).ok_or_else(|| {
        TransportFault::Protocol(format!("reply size {size} exceeds {MAX_REPLY_LEN} bytes"))
    })?;
    debug!(id, result, size, "Control request completed");

    let data = if size > 0 {
        let mut buf = vec![0u8; size];
        let len = pipe.control_in(Setup::recv(id), &mut buf, deadline.remaining()?)?;
        buf.truncate(len);
        Some(buf)
    } else {
        None
    };

    Ok(ControlReply { result, data })
}
