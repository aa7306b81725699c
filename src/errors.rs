// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

//! A list of error types which are produced during an execution of the protocol
use displaydoc::Display;
use thiserror::Error;

/// Represents an error in the manipulation of internal cryptographic data
#[derive(Debug, Display, Error, PartialEq, Eq)]
pub enum InternalError {
    /// Deserializing from a byte sequence failed
    InvalidByteSequence,
    /// Invalid length for {name}: expected {len}, but is actually {actual_len}.
    SizeError {
        /// name
        name: &'static str,
        /// length
        len: usize,
        /// actual
        actual_len: usize,
    },
    /// Could not decompress point, or point outside the prime-order group.
    PointError,
    /// Computing HKDF failed while deriving subkeys
    HkdfError,
    /// Computing HMAC failed while supplying a secret key
    HmacError,
    /// Computing the memory-hard password hash failed
    KsfError,
}

/// Represents a failure of a protocol step. Verification failures carry no
/// information about which byte of the input was at fault.
#[derive(Debug, Display, Error, PartialEq, Eq)]
pub enum ProtocolError {
    /// Internal error during primitive operation: {0}
    CryptoError(InternalError),
    /// The envelope authentication tag did not verify
    EnvelopeAuthError,
    /// The server authentication tag did not verify
    ServerAuthError,
    /// The user authentication tag did not verify
    UserAuthError,
    /// A variable-length field exceeded its size bound
    OverflowError,
    /// An argument was malformed
    BadArgumentError,
    /// Error with serializing / deserializing protocol messages
    SerializationError,
}

// This is meant to express future(ly) non-trivial ways of converting the
// internal error into a ProtocolError
impl From<InternalError> for ProtocolError {
    fn from(e: InternalError) -> ProtocolError {
        ProtocolError::CryptoError(e)
    }
}

pub(crate) mod utils {
    use super::*;

    pub fn check_slice_size<'a>(
        slice: &'a [u8],
        expected_len: usize,
        arg_name: &'static str,
    ) -> Result<&'a [u8], InternalError> {
        if slice.len() != expected_len {
            return Err(InternalError::SizeError {
                name: arg_name,
                len: expected_len,
                actual_len: slice.len(),
            });
        }
        Ok(slice)
    }

    pub fn check_slice_size_atleast<'a>(
        slice: &'a [u8],
        expected_len: usize,
        arg_name: &'static str,
    ) -> Result<&'a [u8], InternalError> {
        if slice.len() < expected_len {
            return Err(InternalError::SizeError {
                name: arg_name,
                len: expected_len,
                actual_len: slice.len(),
            });
        }
        Ok(slice)
    }
}
