/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The connection was closed.
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    /// Sending data failed.
    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    /// Receiving data failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] std::io::Error),

    /// Binding or accepting connections failed.
    #[error("accept failed: {0}")]
    AcceptFailed(#[source] std::io::Error),

    /// The WebSocket upgrade was rejected or did not complete.
    #[error("handshake failed: {0}")]
    Handshake(String),
}

impl TransportError {
    /// Returns `true` if this is an accept failure caused by the process
    /// running out of descriptors, buffers, or memory.
    ///
    /// Retrying `accept` in a tight loop cannot recover from these; the
    /// listener treats them as fatal.
    pub fn is_resource_exhaustion(&self) -> bool {
        let Self::AcceptFailed(e) = self else {
            return false;
        };
        e.kind() == std::io::ErrorKind::OutOfMemory
            || e.raw_os_error()
                .is_some_and(|code| EXHAUSTION_ERRNOS.contains(&code))
    }
}

// ENOMEM, ENFILE, EMFILE, ENOBUFS. Only ENOBUFS differs between platforms.
#[cfg(any(target_os = "linux", target_os = "android"))]
const EXHAUSTION_ERRNOS: [i32; 4] = [12, 23, 24, 105];

#[cfg(any(
    target_os = "macos",
    target_os = "ios",
    target_os = "freebsd",
    target_os = "openbsd",
    target_os = "netbsd",
    target_os = "dragonfly"
))]
const EXHAUSTION_ERRNOS: [i32; 4] = [12, 23, 24, 55];

// WSA_NOT_ENOUGH_MEMORY, WSAEMFILE, WSAENOBUFS.
#[cfg(windows)]
const EXHAUSTION_ERRNOS: [i32; 3] = [8, 10024, 10055];

#[cfg(not(any(
    windows,
    target_os = "linux",
    target_os = "android",
    target_os = "macos",
    target_os = "ios",
    target_os = "freebsd",
    target_os = "openbsd",
    target_os = "netbsd",
    target_os = "dragonfly"
)))]
const EXHAUSTION_ERRNOS: [i32; 0] = [];
