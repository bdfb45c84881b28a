//! SigmaStudio TCP server.
//!
//! Each connection is served by its own task. A session reads one packet at
//! a time: the operation byte selects the header shape, the rest of the
//! header follows, then the payload for writes. Reads are answered before
//! the next packet is read, so replies leave in request order.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, ToSocketAddrs};
use tracing::{debug, info, warn};

use crate::backend::DspHandle;
use crate::config::{config as global_config, hex_dump};
use crate::error::SigmaDspError;
use crate::generator::ChipFamily;
use crate::header::{FieldName, OperationKey, PacketHeader};
use crate::packet::Packet;
use crate::request::{ReadResponse, SigmaRequest};

#[derive(Clone, Debug)]
pub struct SigmaStudioServer {
    handle: DspHandle,
}

impl SigmaStudioServer {
    #[must_use]
    pub const fn new(handle: DspHandle) -> Self {
        Self { handle }
    }

    #[must_use]
    pub const fn chip_family(&self) -> ChipFamily {
        self.handle.chip_family()
    }

    pub async fn run<A: ToSocketAddrs>(&self, addr: A) -> Result<(), SigmaDspError> {
        let listener = TcpListener::bind(addr).await?;
        self.run_listener_on(listener).await
    }

    /// Accept connections forever, one session task per connection.
    pub async fn run_listener_on(&self, listener: TcpListener) -> Result<(), SigmaDspError> {
        if let Ok(addr) = listener.local_addr() {
            info!(%addr, family = %self.chip_family(), "SigmaStudio server listening");
        }
        loop {
            let (stream, peer) = listener.accept().await?;
            info!(%peer, "SigmaStudio connected");
            let _ = stream.set_nodelay(true);
            let handle = self.handle.clone();
            tokio::spawn(async move {
                let mut session = Session::new(stream, handle);
                match session.run().await {
                    Ok(()) => info!(%peer, "SigmaStudio disconnected"),
                    Err(e) => warn!(%peer, error = %e, "closing SigmaStudio connection"),
                }
            });
        }
    }
}

/// One SigmaStudio connection.
pub struct Session<S> {
    stream: S,
    handle: DspHandle,
    family: ChipFamily,
    max_payload_bytes: usize,
}

impl<S> Session<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S, handle: DspHandle) -> Self {
        let family = handle.chip_family();
        Self {
            stream,
            handle,
            family,
            max_payload_bytes: global_config().max_payload_bytes,
        }
    }

    #[must_use]
    pub fn with_max_payload_bytes(mut self, limit: usize) -> Self {
        self.max_payload_bytes = limit;
        self
    }

    /// Serve packets until the peer disconnects. A clean disconnect at any
    /// read boundary is `Ok`; framing errors end the session with `Err`.
    pub async fn run(&mut self) -> Result<(), SigmaDspError> {
        loop {
            match self.serve_one().await {
                Ok(()) => {}
                Err(SigmaDspError::ConnectionClosed) => return Ok(()),
                Err(e) => return Err(e),
            }
        }
    }

    async fn serve_one(&mut self) -> Result<(), SigmaDspError> {
        let packet = self.read_packet().await?;
        let request_header = packet.header().clone();
        let Some(request) = SigmaRequest::try_from_packet(packet)? else {
            debug!("ignoring unsolicited read response");
            return Ok(());
        };
        debug!(?request_header, "received request");
        if let Some(response) = self.handle.submit(request).await? {
            self.send_read_response(&request_header, response).await?;
        }
        Ok(())
    }

    async fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), SigmaDspError> {
        self.stream
            .read_exact(buf)
            .await
            .map(|_| ())
            .map_err(closed_or_io)
    }

    fn check_length(&self, length: usize) -> Result<(), SigmaDspError> {
        if length > self.max_payload_bytes {
            return Err(SigmaDspError::PayloadTooLarge {
                length,
                limit: self.max_payload_bytes,
            });
        }
        Ok(())
    }

    /// Read one complete packet: operation byte, rest of the header, payload.
    pub async fn read_packet(&mut self) -> Result<Packet, SigmaDspError> {
        let mut operation = [0u8; 1];
        self.read_exact(&mut operation).await?;

        let mut header = self
            .family
            .new_header_from_operation_byte(operation[0], None)?;
        let mut raw = vec![0u8; header.size()];
        raw[0] = operation[0];
        self.read_exact(&mut raw[1..]).await?;
        header.parse(&raw)?;
        if global_config().log_payloads {
            debug!("[SigmaStudio header] {}", hex_dump(&raw));
        }

        // a read's data_length sizes the reply buffers, so it is bounded too
        if header.is_read_request() {
            self.check_length(header.data_length()?)?;
        }
        if !header.carries_payload() {
            return Ok(Packet::new(header));
        }
        let length = header.data_length()?;
        self.check_length(length)?;
        let mut payload = vec![0u8; length];
        self.read_exact(&mut payload).await?;
        Packet::with_payload(header, payload)
    }

    async fn send_read_response(
        &mut self,
        request: &PacketHeader,
        response: ReadResponse,
    ) -> Result<(), SigmaDspError> {
        let mut header = self
            .family
            .new_header_from_operation_key(OperationKey::ReadResponse, Some(request))?;
        header.set(FieldName::Success, 0)?;
        let packet = Packet::with_payload(header, response.data)?;
        let bytes = packet.as_bytes();
        if global_config().log_payloads {
            debug!("[SigmaStudio response] {}", hex_dump(&bytes));
        }
        self.stream.write_all(&bytes).await.map_err(closed_or_io)?;
        self.stream.flush().await.map_err(closed_or_io)?;
        Ok(())
    }
}

/// A peer that hangs up or resets the connection ends the session normally.
fn closed_or_io(e: std::io::Error) -> SigmaDspError {
    use std::io::ErrorKind;
    match e.kind() {
        ErrorKind::UnexpectedEof
        | ErrorKind::ConnectionReset
        | ErrorKind::ConnectionAborted
        | ErrorKind::BrokenPipe => SigmaDspError::ConnectionClosed,
        _ => e.into(),
    }
}
