//! # Runtime Constants
//!
//! Hardcoded limits and format constants for the Trellis CORE.
//!
//! Every cascading or deserializing operation in this crate is
//! computationally bounded; the bounds live here and are immutable at
//! runtime.

/// Maximum recursion depth for the implied-edge cascade.
///
/// `EdgeType.implied_codes` may form chains (and, through misconfiguration,
/// cycles). `make` follows implications at most this many levels deep; a
/// visited set handles cycles, this bound handles pathological chains.
pub const MAX_IMPLIED_DEPTH: usize = 8;

/// Magic bytes for the Trellis snapshot format header.
///
/// File Header = Magic Bytes ("TRLS") + Version (u8) before payload.
pub const MAGIC_BYTES: &[u8; 4] = b"TRLS";

/// Current snapshot format version.
///
/// Increment this when making breaking changes to the snapshot format.
pub const FORMAT_VERSION: u8 = 1;

// =============================================================================
// INPUT VALIDATION LIMITS
// =============================================================================

/// Maximum length for edge-type codes.
///
/// Codes are short mnemonic identifiers ("CRT", "MLP", "ADM"); anything
/// longer than this is rejected when the type is defined.
pub const MAX_CODE_LENGTH: usize = 32;

/// Maximum length for node class names.
///
/// Mirrors the 64-character column the relational store allocates for
/// class tags.
pub const MAX_CLASS_NAME_LENGTH: usize = 64;

/// Maximum length for edge variant data.
///
/// Variant data is a short discriminator (an action sub-code), not a
/// payload field.
pub const MAX_VARIANT_LENGTH: usize = 256;

/// Maximum allowed payload size for the snapshot format.
///
/// Validated BEFORE attempting deserialization to prevent allocation-based
/// DoS from corrupted or malicious snapshot data.
pub const MAX_SNAPSHOT_PAYLOAD_SIZE: usize = 256 * 1024 * 1024; // 256 MB

/// Minimum valid snapshot size (header only).
pub const MIN_SNAPSHOT_SIZE: usize = 5;

// =============================================================================
// RULE EVALUATION DEFAULTS
// =============================================================================

/// Default parent code marking administrative edge types.
///
/// A subject holding a permission granted by any edge type under this
/// parent code bypasses per-type permission checks for the model pair.
pub const DEFAULT_ADMIN_PARENT_CODE: &str = "ADM";
