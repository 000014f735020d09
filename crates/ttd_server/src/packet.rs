//! Little-endian packet codec.
//!
//! A packet is a 16-bit little-endian size (header included), a one-byte
//! packet type and the payload. Strings are NUL-terminated UTF-8.
//! Reads past the end of the payload fail instead of yielding zeros.

use thiserror::Error;

/// Size of the size field plus the type byte.
pub const PACKET_HEADER_SIZE: usize = 3;

/// Largest packet that fits a UDP datagram without fragmentation.
pub const UDP_MTU: usize = 1460;

/// Errors raised while building or reading a packet.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PacketError {
    /// Fewer bytes than a header.
    #[error("Packet of {0} bytes is shorter than its header")]
    Truncated(usize),

    /// The size field disagrees with the received length.
    #[error("Packet size field says {declared} bytes, received {received}")]
    SizeMismatch {
        /// Value of the size field.
        declared: usize,
        /// Bytes actually received.
        received: usize,
    },

    /// A read ran past the end of the packet.
    #[error("Read of {wanted} bytes at offset {offset} runs past the end of a {size} byte packet")]
    Underflow {
        /// Read position.
        offset: usize,
        /// Bytes requested.
        wanted: usize,
        /// Packet size.
        size: usize,
    },

    /// A string has no terminator.
    #[error("Unterminated string at offset {0}")]
    UnterminatedString(usize),

    /// A write would exceed the packet limit.
    #[error("Packet would grow past {limit} bytes")]
    Overflow {
        /// Maximum packet size.
        limit: usize,
    },

    /// Packet type byte not understood by the receiver.
    #[error("Unknown packet type {0}")]
    UnknownType(u8),
}

/// Packet under construction.
#[derive(Debug, Clone)]
pub struct PacketWriter {
    buffer: Vec<u8>,
    limit: usize,
}

impl PacketWriter {
    /// Empty packet of the given type, limited to [`UDP_MTU`] bytes.
    #[must_use]
    pub fn new(packet_type: u8) -> Self {
        Self::with_limit(packet_type, UDP_MTU)
    }

    /// Empty packet with a custom size limit (at most `u16::MAX`).
    #[must_use]
    pub fn with_limit(packet_type: u8, limit: usize) -> Self {
        let mut buffer = Vec::with_capacity(64);
        buffer.extend_from_slice(&[0, 0, packet_type]);
        Self {
            buffer,
            limit: limit.min(usize::from(u16::MAX)),
        }
    }

    /// Current size including the header.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Whether nothing but the header was written.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buffer.len() == PACKET_HEADER_SIZE
    }

    fn put(&mut self, bytes: &[u8]) -> Result<(), PacketError> {
        if self.buffer.len() + bytes.len() > self.limit {
            return Err(PacketError::Overflow { limit: self.limit });
        }
        self.buffer.extend_from_slice(bytes);
        Ok(())
    }

    /// Append a byte.
    pub fn write_u8(&mut self, value: u8) -> Result<(), PacketError> {
        self.put(&[value])
    }

    /// Append a bool as one byte.
    pub fn write_bool(&mut self, value: bool) -> Result<(), PacketError> {
        self.write_u8(u8::from(value))
    }

    /// Append a little-endian u16.
    pub fn write_u16(&mut self, value: u16) -> Result<(), PacketError> {
        self.put(&value.to_le_bytes())
    }

    /// Append a little-endian u32.
    pub fn write_u32(&mut self, value: u32) -> Result<(), PacketError> {
        self.put(&value.to_le_bytes())
    }

    /// Append raw bytes.
    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), PacketError> {
        self.put(bytes)
    }

    /// Append a NUL-terminated string. Anything after an embedded NUL is dropped.
    pub fn write_string(&mut self, value: &str) -> Result<(), PacketError> {
        let bytes = value.as_bytes();
        let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
        if self.buffer.len() + end + 1 > self.limit {
            return Err(PacketError::Overflow { limit: self.limit });
        }
        self.buffer.extend_from_slice(&bytes[..end]);
        self.buffer.push(0);
        Ok(())
    }

    /// Fill in the size field and return the wire bytes.
    #[must_use]
    pub fn finish(mut self) -> Vec<u8> {
        // `limit` never exceeds u16::MAX, so the length always fits.
        let size = u16::try_from(self.buffer.len()).unwrap_or(u16::MAX);
        self.buffer[..2].copy_from_slice(&size.to_le_bytes());
        self.buffer
    }
}

/// Received packet being read front to back.
#[derive(Debug, Clone)]
pub struct PacketReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> PacketReader<'a> {
    /// Validate the header of `bytes` and position the reader after it.
    pub fn new(bytes: &'a [u8]) -> Result<Self, PacketError> {
        if bytes.len() < PACKET_HEADER_SIZE {
            return Err(PacketError::Truncated(bytes.len()));
        }
        let declared = usize::from(u16::from_le_bytes([bytes[0], bytes[1]]));
        if declared != bytes.len() {
            return Err(PacketError::SizeMismatch {
                declared,
                received: bytes.len(),
            });
        }
        Ok(Self {
            bytes,
            pos: PACKET_HEADER_SIZE,
        })
    }

    /// The packet type byte.
    #[must_use]
    pub fn packet_type(&self) -> u8 {
        self.bytes[2]
    }

    /// Bytes left to read.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    fn take(&mut self, wanted: usize) -> Result<&'a [u8], PacketError> {
        if self.remaining() < wanted {
            return Err(PacketError::Underflow {
                offset: self.pos,
                wanted,
                size: self.bytes.len(),
            });
        }
        let slice = &self.bytes[self.pos..self.pos + wanted];
        self.pos += wanted;
        Ok(slice)
    }

    /// Read a byte.
    pub fn read_u8(&mut self) -> Result<u8, PacketError> {
        Ok(self.take(1)?[0])
    }

    /// Read a bool; any non-zero byte is true.
    pub fn read_bool(&mut self) -> Result<bool, PacketError> {
        Ok(self.read_u8()? != 0)
    }

    /// Read a little-endian u16.
    pub fn read_u16(&mut self) -> Result<u16, PacketError> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    /// Read a little-endian u32.
    pub fn read_u32(&mut self) -> Result<u32, PacketError> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Read exactly `N` raw bytes.
    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N], PacketError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    /// Read a NUL-terminated string of at most `max_len - 1` bytes.
    ///
    /// Longer strings are truncated and the excess is skipped up to the
    /// terminator. Invalid UTF-8 is replaced.
    pub fn read_string(&mut self, max_len: usize) -> Result<String, PacketError> {
        let start = self.pos;
        let rest = &self.bytes[start..];
        let Some(end) = rest.iter().position(|&b| b == 0) else {
            return Err(PacketError::UnterminatedString(start));
        };
        let keep = end.min(max_len.saturating_sub(1));
        let mut keep_bytes = &rest[..keep];
        // Never cut a multi-byte character in half.
        while std::str::from_utf8(keep_bytes).is_err_and(|e| e.error_len().is_none()) {
            keep_bytes = &keep_bytes[..keep_bytes.len() - 1];
        }
        self.pos = start + end + 1;
        Ok(String::from_utf8_lossy(keep_bytes).into_owned())
    }

    /// Skip a NUL-terminated string.
    pub fn skip_string(&mut self) -> Result<(), PacketError> {
        while self.read_u8()? != 0 {}
        Ok(())
    }
}
