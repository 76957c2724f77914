//! Error types for the handshake engine.

use core::fmt;

/// Result type for handshake operations.
pub type Result<T> = core::result::Result<T, Error>;

/// Errors that can occur while driving a handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Invalid configuration
    InvalidConfig(String),

    /// Protocol violation by the peer
    ProtocolError(ProtocolError),

    /// Cryptographic error
    CryptoError(String),

    /// Message received in a state that does not expect it
    UnexpectedMessage(String),

    /// Malformed message (encode-side length overflow and similar)
    InvalidMessage(String),

    /// Internal error
    InternalError(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidConfig(msg) => write!(f, "Invalid configuration: {}", msg),
            Error::ProtocolError(e) => write!(f, "Protocol error: {:?}", e),
            Error::CryptoError(msg) => write!(f, "Cryptographic error: {}", msg),
            Error::UnexpectedMessage(msg) => write!(f, "Unexpected message: {}", msg),
            Error::InvalidMessage(msg) => write!(f, "Invalid message: {}", msg),
            Error::InternalError(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

impl From<oxtls_crypto::Error> for Error {
    fn from(e: oxtls_crypto::Error) -> Self {
        Error::CryptoError(format!("{:?}", e))
    }
}

impl From<ProtocolError> for Error {
    fn from(e: ProtocolError) -> Self {
        Error::ProtocolError(e)
    }
}

/// Protocol-level error kinds, each with a fixed alert mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProtocolError {
    /// Malformed wire encoding, length overflow, trailing bytes
    DecodeError,

    /// Required extension absent from a message
    MissingExtension,

    /// Well-formed value disallowed by the protocol
    IllegalParameter,

    /// Extension not allowed for this message type
    UnsupportedExtension,

    /// No mutually supported parameters
    HandshakeFailure,

    /// Peer selected a protocol version we do not accept
    BadProtocolVersion,

    /// Finished verify-data mismatch
    DecryptError,

    /// Message out of sequence
    UnexpectedMessage,

    /// ALPN selection not among the offered protocols
    NoApplicationProtocol,

    /// Library-internal failure
    InternalError,
}

impl ProtocolError {
    /// The alert this error puts on the wire (RFC 8446 Section 6.2).
    pub const fn alert(self) -> AlertDescription {
        match self {
            ProtocolError::DecodeError => AlertDescription::DecodeError,
            ProtocolError::MissingExtension => AlertDescription::MissingExtension,
            ProtocolError::IllegalParameter => AlertDescription::IllegalParameter,
            ProtocolError::UnsupportedExtension => AlertDescription::UnsupportedExtension,
            ProtocolError::HandshakeFailure => AlertDescription::HandshakeFailure,
            ProtocolError::BadProtocolVersion => AlertDescription::ProtocolVersion,
            ProtocolError::DecryptError => AlertDescription::DecryptError,
            ProtocolError::UnexpectedMessage => AlertDescription::UnexpectedMessage,
            ProtocolError::NoApplicationProtocol => AlertDescription::NoApplicationProtocol,
            ProtocolError::InternalError => AlertDescription::InternalError,
        }
    }
}

/// Map any handshake error to the alert to pend on the record layer.
pub fn alert_for_error(error: &Error) -> AlertDescription {
    match error {
        Error::ProtocolError(e) => e.alert(),
        Error::UnexpectedMessage(_) => AlertDescription::UnexpectedMessage,
        Error::InvalidMessage(_) => AlertDescription::DecodeError,
        Error::InvalidConfig(_) | Error::CryptoError(_) | Error::InternalError(_) => {
            AlertDescription::InternalError
        },
    }
}

/// TLS alert descriptions (RFC 8446 Section 6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum AlertDescription {
    /// Close notify
    CloseNotify = 0,

    /// Unexpected message
    UnexpectedMessage = 10,

    /// Bad record MAC
    BadRecordMac = 20,

    /// Record overflow
    RecordOverflow = 22,

    /// Handshake failure
    HandshakeFailure = 40,

    /// Bad certificate
    BadCertificate = 42,

    /// Certificate unknown
    CertificateUnknown = 46,

    /// Illegal parameter
    IllegalParameter = 47,

    /// Unknown CA
    UnknownCa = 48,

    /// Decode error
    DecodeError = 50,

    /// Decrypt error
    DecryptError = 51,

    /// Protocol version
    ProtocolVersion = 70,

    /// Insufficient security
    InsufficientSecurity = 71,

    /// Internal error
    InternalError = 80,

    /// Inappropriate fallback
    InappropriateFallback = 86,

    /// User canceled
    UserCanceled = 90,

    /// Missing extension
    MissingExtension = 109,

    /// Unsupported extension
    UnsupportedExtension = 110,

    /// Unrecognized name
    UnrecognizedName = 112,

    /// Unknown PSK identity
    UnknownPskIdentity = 115,

    /// Certificate required
    CertificateRequired = 116,

    /// No application protocol
    NoApplicationProtocol = 120,
}

impl AlertDescription {
    /// Convert from wire format (u8).
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(AlertDescription::CloseNotify),
            10 => Some(AlertDescription::UnexpectedMessage),
            20 => Some(AlertDescription::BadRecordMac),
            22 => Some(AlertDescription::RecordOverflow),
            40 => Some(AlertDescription::HandshakeFailure),
            42 => Some(AlertDescription::BadCertificate),
            46 => Some(AlertDescription::CertificateUnknown),
            47 => Some(AlertDescription::IllegalParameter),
            48 => Some(AlertDescription::UnknownCa),
            50 => Some(AlertDescription::DecodeError),
            51 => Some(AlertDescription::DecryptError),
            70 => Some(AlertDescription::ProtocolVersion),
            71 => Some(AlertDescription::InsufficientSecurity),
            80 => Some(AlertDescription::InternalError),
            86 => Some(AlertDescription::InappropriateFallback),
            90 => Some(AlertDescription::UserCanceled),
            109 => Some(AlertDescription::MissingExtension),
            110 => Some(AlertDescription::UnsupportedExtension),
            112 => Some(AlertDescription::UnrecognizedName),
            115 => Some(AlertDescription::UnknownPskIdentity),
            116 => Some(AlertDescription::CertificateRequired),
            120 => Some(AlertDescription::NoApplicationProtocol),
            _ => None,
        }
    }

    /// Convert to wire format (u8).
    pub const fn to_u8(self) -> u8 {
        self as u8
    }

    /// Check if this alert is fatal.
    ///
    /// All alerts except CloseNotify and UserCanceled are fatal in TLS 1.3.
    pub const fn is_fatal(self) -> bool {
        !matches!(
            self,
            AlertDescription::CloseNotify | AlertDescription::UserCanceled
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alert_description_conversion() {
        assert_eq!(
            AlertDescription::from_u8(0),
            Some(AlertDescription::CloseNotify)
        );
        assert_eq!(
            AlertDescription::from_u8(47),
            Some(AlertDescription::IllegalParameter)
        );
        assert_eq!(AlertDescription::from_u8(255), None);
        assert_eq!(AlertDescription::HandshakeFailure.to_u8(), 40);
    }

    #[test]
    fn test_protocol_error_alert_mapping() {
        assert_eq!(
            ProtocolError::DecodeError.alert(),
            AlertDescription::DecodeError
        );
        assert_eq!(
            ProtocolError::UnsupportedExtension.alert(),
            AlertDescription::UnsupportedExtension
        );
        assert_eq!(
            ProtocolError::BadProtocolVersion.alert(),
            AlertDescription::ProtocolVersion
        );
        assert_eq!(
            ProtocolError::HandshakeFailure.alert().to_u8(),
            40
        );
    }

    #[test]
    fn test_alert_for_error_internal_classes() {
        let e = Error::InternalError("x".into());
        assert_eq!(alert_for_error(&e), AlertDescription::InternalError);
        let e = Error::ProtocolError(ProtocolError::IllegalParameter);
        assert_eq!(alert_for_error(&e), AlertDescription::IllegalParameter);
    }

    #[test]
    fn test_alert_fatality() {
        assert!(!AlertDescription::CloseNotify.is_fatal());
        assert!(!AlertDescription::UserCanceled.is_fatal());
        assert!(AlertDescription::IllegalParameter.is_fatal());
    }
}
