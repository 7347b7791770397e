//! Structured error codes
//!
//! Error code ranges:
//! - ESQL0100-ESQL0199: Semantic errors (resolution, aggregates, definitions)
//! - ESQL0400-ESQL0499: Internal contract violations (resolver defects)

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

/// Error code identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ErrorCode(u16);

impl ErrorCode {
    pub const fn new(code: u16) -> Self {
        Self(code)
    }

    pub const fn code(&self) -> u16 {
        self.0
    }

    /// Static description of this code
    pub fn info(&self) -> &'static ErrorInfo {
        ERROR_INFO.get(&self.0).unwrap_or(&UNKNOWN_ERROR)
    }

    pub const fn is_semantic_error(&self) -> bool {
        self.0 >= 100 && self.0 < 200
    }

    /// Internal codes never point at user input
    pub const fn is_internal_error(&self) -> bool {
        self.0 >= 400 && self.0 < 500
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ESQL{:04}", self.0)
    }
}

/// Information about an error code
#[derive(Debug, Clone)]
pub struct ErrorInfo {
    pub description: &'static str,
    pub help: Option<&'static str>,
}

impl ErrorInfo {
    const fn new(description: &'static str) -> Self {
        Self {
            description,
            help: None,
        }
    }

    const fn with_help(mut self, help: &'static str) -> Self {
        self.help = Some(help);
        self
    }
}

static UNKNOWN_ERROR: ErrorInfo = ErrorInfo::new("Unknown error");

static ERROR_INFO: LazyLock<HashMap<u16, ErrorInfo>> = LazyLock::new(|| {
    let mut map = HashMap::new();

    map.insert(
        100,
        ErrorInfo::new("Unresolved identifier")
            .with_help("Check that the name is defined in scope or in the catalog"),
    );
    map.insert(
        101,
        ErrorInfo::new("Invalid reference to group input")
            .with_help("After GROUP BY only group keys and aggregates may be referenced"),
    );
    map.insert(102, ErrorInfo::new("Duplicate parameter definition"));
    map.insert(103, ErrorInfo::new("Duplicate variable definition"));
    map.insert(104, ErrorInfo::new("Ambiguous name"));
    map.insert(105, ErrorInfo::new("Member not found"));
    map.insert(106, ErrorInfo::new("Member access on a collection"));
    map.insert(107, ErrorInfo::new("Invalid dereference"));
    map.insert(108, ErrorInfo::new("Not a member of the entity container"));
    map.insert(109, ErrorInfo::new("Invalid join left correlation"));
    map.insert(
        110,
        ErrorInfo::new("Aggregate outside of a group")
            .with_help("Aggregates are only valid over a GROUP BY input"),
    );
    map.insert(111, ErrorInfo::new("Nested aggregate"));
    map.insert(112, ErrorInfo::new("Circular function definition"));
    map.insert(113, ErrorInfo::new("Untyped null result"));
    map.insert(114, ErrorInfo::new("Invalid metadata member access"));
    map.insert(115, ErrorInfo::new("No matching function overload"));
    map.insert(116, ErrorInfo::new("Name is not a function"));
    map.insert(117, ErrorInfo::new("Value expression expected"));

    map.insert(400, ErrorInfo::new("Internal error"));
    map.insert(401, ErrorInfo::new("Duplicate scope binding"));
    map.insert(402, ErrorInfo::new("Invalid scope index"));
    map.insert(403, ErrorInfo::new("Invalid savepoint"));
    map.insert(404, ErrorInfo::new("Name not bound in scope"));
    map.insert(407, ErrorInfo::new("Scope stack empty"));
    map.insert(408, ErrorInfo::new("Invalid aggregate attachment"));
    map.insert(409, ErrorInfo::new("Guard misuse"));

    map
});

// Semantic
pub const ESQL0100: ErrorCode = ErrorCode::new(100);
pub const ESQL0101: ErrorCode = ErrorCode::new(101);
pub const ESQL0102: ErrorCode = ErrorCode::new(102);
pub const ESQL0103: ErrorCode = ErrorCode::new(103);
pub const ESQL0104: ErrorCode = ErrorCode::new(104);
pub const ESQL0105: ErrorCode = ErrorCode::new(105);
pub const ESQL0106: ErrorCode = ErrorCode::new(106);
pub const ESQL0107: ErrorCode = ErrorCode::new(107);
pub const ESQL0108: ErrorCode = ErrorCode::new(108);
pub const ESQL0109: ErrorCode = ErrorCode::new(109);
pub const ESQL0110: ErrorCode = ErrorCode::new(110);
pub const ESQL0111: ErrorCode = ErrorCode::new(111);
pub const ESQL0112: ErrorCode = ErrorCode::new(112);
pub const ESQL0113: ErrorCode = ErrorCode::new(113);
pub const ESQL0114: ErrorCode = ErrorCode::new(114);
pub const ESQL0115: ErrorCode = ErrorCode::new(115);
pub const ESQL0116: ErrorCode = ErrorCode::new(116);
pub const ESQL0117: ErrorCode = ErrorCode::new(117);

// Internal
pub const ESQL0400: ErrorCode = ErrorCode::new(400);
pub const ESQL0401: ErrorCode = ErrorCode::new(401);
pub const ESQL0402: ErrorCode = ErrorCode::new(402);
pub const ESQL0403: ErrorCode = ErrorCode::new(403);
pub const ESQL0404: ErrorCode = ErrorCode::new(404);
pub const ESQL0407: ErrorCode = ErrorCode::new(407);
pub const ESQL0408: ErrorCode = ErrorCode::new(408);
pub const ESQL0409: ErrorCode = ErrorCode::new(409);
