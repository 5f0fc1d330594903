//! Transport error classification.
//!
//! # Responsibilities
//! - Map a native result code and diagnostic text to a `TransportError`
//!
//! # Design Decisions
//! - Table-driven: result codes map to a family; new codes are added with
//!   `Classifier::register` without touching the engine
//! - Unknown codes keep the raw message and code verbatim

use std::collections::HashMap;

use crate::kernel::error::TransportError;
use crate::transport::ResultCode;

/// Error families recognised by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorFamily {
    Timeout,
    Tls,
    HostNotFound,
}

/// Built-in classification table.
const DEFAULT_RULES: &[(ResultCode, ErrorFamily)] = &[
    (ResultCode::OPERATION_TIMEDOUT, ErrorFamily::Timeout),
    (ResultCode::COULDNT_RESOLVE_HOST, ErrorFamily::HostNotFound),
    (ResultCode::COULDNT_RESOLVE_PROXY, ErrorFamily::HostNotFound),
    (ResultCode::SSL_CONNECT_ERROR, ErrorFamily::Tls),
    (ResultCode::SSL_ENGINE_NOTFOUND, ErrorFamily::Tls),
    (ResultCode::SSL_CERTPROBLEM, ErrorFamily::Tls),
    (ResultCode::SSL_CIPHER, ErrorFamily::Tls),
    (ResultCode::PEER_FAILED_VERIFICATION, ErrorFamily::Tls),
    (ResultCode::SSL_CACERT_BADFILE, ErrorFamily::Tls),
    (ResultCode::SSL_SHUTDOWN_FAILED, ErrorFamily::Tls),
    (ResultCode::SSL_CRL_BADFILE, ErrorFamily::Tls),
    (ResultCode::SSL_ISSUER_ERROR, ErrorFamily::Tls),
    (ResultCode::SSL_PINNEDPUBKEYNOTMATCH, ErrorFamily::Tls),
    (ResultCode::SSL_INVALIDCERTSTATUS, ErrorFamily::Tls),
];

#[derive(Debug, Clone)]
pub struct Classifier {
    rules: HashMap<ResultCode, ErrorFamily>,
}

impl Classifier {
    /// Classifier with no rules; everything is a generic failure.
    pub fn empty() -> Self {
        Self {
            rules: HashMap::new(),
        }
    }

    /// Add or override the family of a result code.
    pub fn register(&mut self, code: ResultCode, family: ErrorFamily) -> &mut Self {
        self.rules.insert(code, family);
        self
    }

    pub fn family_of(&self, code: ResultCode) -> Option<ErrorFamily> {
        self.rules.get(&code).copied()
    }

    pub fn classify(&self, raw_message: &str, code: ResultCode) -> TransportError {
        let message = raw_message.to_string();
        match self.family_of(code) {
            Some(ErrorFamily::Timeout) => TransportError::Timeout { message },
            Some(ErrorFamily::Tls) => TransportError::TlsFailure { message },
            Some(ErrorFamily::HostNotFound) => TransportError::HostNotFound { message },
            None => TransportError::GenericTransportFailure { message, code },
        }
    }
}

impl Default for Classifier {
    fn default() -> Self {
        let mut classifier = Self::empty();
        for (code, family) in DEFAULT_RULES {
            classifier.register(*code, *family);
        }
        classifier
    }
}
