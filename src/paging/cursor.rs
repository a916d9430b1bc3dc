//! Paging cursor and its opaque token format
//!
//! Token layout: base64url (no padding) of the JSON body followed by a
//! big-endian CRC32 of that body. The checksum turns truncated or edited
//! tokens into `InvalidCursor` instead of a silently different page.

use std::fmt;
use std::str::FromStr;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::errors::{QueryError, QueryResult};
use crate::record::{SortExpr, SortExprSet};
use crate::schema::is_identifier;

/// Upper bound on accepted token length, in characters
pub const MAX_CURSOR_TOKEN_LEN: usize = 8 * 1024;

const CHECKSUM_LEN: usize = 4;

/// Position in an ordered result set.
///
/// Holds the sort key values of a boundary row. `r_order` marks a cursor
/// that pages backwards; `l_then` makes the boundary row itself part of
/// the next page.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PagingCursor {
    keys: Vec<String>,
    values: Vec<serde_json::Value>,
    desc: Vec<bool>,
    pub r_order: bool,
    pub l_then: bool,
}

#[derive(Serialize, Deserialize)]
struct CursorBody {
    #[serde(rename = "K")]
    keys: Vec<String>,
    #[serde(rename = "V")]
    values: Vec<serde_json::Value>,
    #[serde(rename = "D")]
    desc: Vec<bool>,
    #[serde(rename = "R", default)]
    r_order: bool,
    #[serde(rename = "LT", default)]
    l_then: bool,
}

impl PagingCursor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a key, replacing its value and direction if already present
    pub fn set(&mut self, key: impl Into<String>, value: serde_json::Value, descending: bool) {
        let key = key.into();
        match self.keys.iter().position(|k| *k == key) {
            Some(i) => {
                self.values[i] = value;
                self.desc[i] = descending;
            }
            None => {
                self.keys.push(key);
                self.values.push(value);
                self.desc.push(descending);
            }
        }
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn values(&self) -> &[serde_json::Value] {
        &self.values
    }

    /// Iterates keys in order as (key, value, descending)
    pub fn walk(&self) -> impl Iterator<Item = (&str, &serde_json::Value, bool)> {
        self.keys
            .iter()
            .zip(&self.values)
            .zip(&self.desc)
            .map(|((k, v), d)| (k.as_str(), v, *d))
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Sort the cursor was issued for
    pub fn sort(&self) -> SortExprSet {
        SortExprSet(
            self.keys
                .iter()
                .zip(&self.desc)
                .map(|(k, d)| SortExpr {
                    column: k.clone(),
                    descending: *d,
                })
                .collect(),
        )
    }

    /// Encodes the cursor as an opaque token
    pub fn encode(&self) -> String {
        let body = CursorBody {
            keys: self.keys.clone(),
            values: self.values.clone(),
            desc: self.desc.clone(),
            r_order: self.r_order,
            l_then: self.l_then,
        };

        // serializing strings, bools and JSON values cannot fail
        let mut bytes = serde_json::to_vec(&body).unwrap_or_default();
        let checksum = crc32fast::hash(&bytes);
        bytes.extend_from_slice(&checksum.to_be_bytes());
        URL_SAFE_NO_PAD.encode(bytes)
    }

    /// Decodes a token with the default length bound
    pub fn decode(token: &str) -> QueryResult<Self> {
        Self::decode_bounded(token, MAX_CURSOR_TOKEN_LEN)
    }

    /// Decodes a token, rejecting anything longer than `max_len`
    pub fn decode_bounded(token: &str, max_len: usize) -> QueryResult<Self> {
        let token = token.trim();
        if token.is_empty() {
            return Err(invalid("token is empty"));
        }
        if token.len() > max_len {
            return Err(invalid(format!(
                "token exceeds max length: {} chars (max {})",
                token.len(),
                max_len
            )));
        }

        let bytes = URL_SAFE_NO_PAD
            .decode(token)
            .map_err(|e| invalid(format!("malformed token: {}", e)))?;
        if bytes.len() <= CHECKSUM_LEN {
            return Err(invalid("token is truncated"));
        }

        let (body, checksum) = bytes.split_at(bytes.len() - CHECKSUM_LEN);
        let mut expected = [0u8; CHECKSUM_LEN];
        expected.copy_from_slice(checksum);
        if crc32fast::hash(body) != u32::from_be_bytes(expected) {
            return Err(invalid("checksum mismatch"));
        }

        let body: CursorBody = serde_json::from_slice(body)
            .map_err(|e| invalid(format!("malformed token body: {}", e)))?;

        if body.keys.is_empty() {
            return Err(invalid("cursor has no keys"));
        }
        if body.keys.len() != body.values.len() || body.keys.len() != body.desc.len() {
            return Err(invalid("cursor keys, values and directions differ in length"));
        }
        if let Some(bad) = body.keys.iter().find(|k| !is_identifier(k)) {
            return Err(invalid(format!("invalid cursor key {:?}", bad)));
        }
        if body
            .values
            .iter()
            .any(|v| v.is_array() || v.is_object())
        {
            return Err(invalid("cursor values must be scalars"));
        }

        Ok(Self {
            keys: body.keys,
            values: body.values,
            desc: body.desc,
            r_order: body.r_order,
            l_then: body.l_then,
        })
    }
}

fn invalid(msg: impl Into<String>) -> QueryError {
    QueryError::InvalidCursor(msg.into())
}

impl fmt::Display for PagingCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl FromStr for PagingCursor {
    type Err = QueryError;

    fn from_str(s: &str) -> QueryResult<Self> {
        Self::decode(s)
    }
}

impl Serialize for PagingCursor {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.encode())
    }
}

impl<'de> Deserialize<'de> for PagingCursor {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let token = String::deserialize(deserializer)?;
        Self::decode(&token).map_err(serde::de::Error::custom)
    }
}
