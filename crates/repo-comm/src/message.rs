//! Flat string-keyed wire message and the numbered-list codec.
//!
//! A [`Message`] is the wire unit: a small map of string keys to string
//! values, serialized as a flat JSON object. Variable-length collections are
//! embedded as repeated numbered keys (`package-1`, `package-2`, ...) and
//! decoded by probing successive indices; the first missing index ends the
//! list, so encoders must never leave gaps.

use crate::endpoint::Endpoint;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Reserved message keys.
pub mod keys {
    pub const TO: &str = "to";
    pub const FROM: &str = "from";
    pub const COMMAND: &str = "command";
    pub const REQUEST_ID: &str = "requestId";
    pub const RESPONSE_ID: &str = "responseId";
    pub const USER_ID: &str = "userId";
    /// Presence-only diagnostic flag; the value is never inspected.
    pub const VERBOSE: &str = "verbose";

    pub const ALIVE: &str = "alive";
    pub const SUCCESS: &str = "success";
    pub const AUTHOR: &str = "author";
    pub const DESCRIPTION: &str = "description";
    pub const PACKAGE: &str = "package";
    pub const NAMESPACE: &str = "namespace";
    pub const FILENAME: &str = "filename";
    pub const VERSION: &str = "version";
    pub const CATEGORY: &str = "category";
    pub const FILE: &str = "file";
    pub const DEPENDENCIES_REQUIRED: &str = "dependenciesRequired";
}

/// Command vocabulary. Exact strings, case-sensitive.
pub mod commands {
    pub const PING: &str = "ping";
    pub const GET_REPO_PACKAGES: &str = "get-repo-packages";
    pub const GET_PACKAGE_FILES: &str = "get-package-files";
    pub const GET_FILE_METADATA: &str = "get-file-metadata";
    pub const GET_FILE_TEXT: &str = "get-file-text";
    pub const CHECK_IN: &str = "check-in";
    pub const CHECK_OUT: &str = "check-out";
    /// Self-addressed sentinel that unwinds a listener loop.
    pub const QUIT: &str = "__quit";
}

/// Key prefixes for numbered-list values.
pub mod prefixes {
    pub const PACKAGE: &str = "package";
    pub const FILE: &str = "file";
    pub const DEPENDENCY: &str = "dependency";
}

/// The wire unit: a flat string-to-string map.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Message {
    attrs: BTreeMap<String, String>,
}

impl Message {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.attrs.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.attrs.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.attrs.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.attrs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attrs.is_empty()
    }

    // Reserved-key accessors.

    pub fn recipient(&self) -> Option<&str> {
        self.get(keys::TO)
    }

    pub fn sender(&self) -> Option<&str> {
        self.get(keys::FROM)
    }

    pub fn command(&self) -> Option<&str> {
        self.get(keys::COMMAND)
    }

    pub fn request_id(&self) -> Option<&str> {
        self.get(keys::REQUEST_ID)
    }

    pub fn response_id(&self) -> Option<&str> {
        self.get(keys::RESPONSE_ID)
    }

    pub fn user_id(&self) -> Option<&str> {
        self.get(keys::USER_ID)
    }

    /// The verbose flag is presence-only; any value counts.
    pub fn verbose(&self) -> bool {
        self.contains(keys::VERBOSE)
    }

    pub fn set_recipient(&mut self, endpoint: &Endpoint) {
        self.insert(keys::TO, endpoint.to_string());
    }

    pub fn set_sender(&mut self, endpoint: &Endpoint) {
        self.insert(keys::FROM, endpoint.to_string());
    }

    pub fn set_command(&mut self, command: &str) {
        self.insert(keys::COMMAND, command);
    }

    pub fn set_request_id(&mut self, id: &str) {
        self.insert(keys::REQUEST_ID, id);
    }

    pub fn set_response_id(&mut self, id: &str) {
        self.insert(keys::RESPONSE_ID, id);
    }

    pub fn mark_verbose(&mut self) {
        self.insert(keys::VERBOSE, "yes");
    }

    /// Encode `items` as `{prefix}-1..{prefix}-N`, gap-free and 1-based.
    pub fn set_list<I, T>(&mut self, prefix: &str, items: I)
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        for (index, item) in items.into_iter().enumerate() {
            self.attrs.insert(format!("{}-{}", prefix, index + 1), item.into());
        }
    }

    /// Decode a numbered list by probing `{prefix}-1`, `{prefix}-2`, ...
    /// The first missing index ends the list, even if higher indices exist.
    pub fn read_list(&self, prefix: &str) -> Vec<String> {
        let mut items = Vec::new();
        let mut index = 1;
        while let Some(value) = self.get(&format!("{}-{}", prefix, index)) {
            items.push(value.to_string());
            index += 1;
        }
        items
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserved_accessors() {
        let mut msg = Message::new();
        msg.set_recipient(&Endpoint::new("localhost", 7790));
        msg.set_sender(&Endpoint::new("localhost", 7890));
        msg.set_command(commands::PING);
        msg.set_request_id("abc");

        assert_eq!(msg.recipient(), Some("localhost:7790"));
        assert_eq!(msg.sender(), Some("localhost:7890"));
        assert_eq!(msg.command(), Some(commands::PING));
        assert_eq!(msg.request_id(), Some("abc"));
        assert_eq!(msg.response_id(), None);
    }

    #[test]
    fn test_verbose_is_presence_only() {
        let mut msg = Message::new();
        assert!(!msg.verbose());
        msg.mark_verbose();
        assert!(msg.verbose());
    }

    #[test]
    fn test_list_round_trip_preserves_order() {
        let mut msg = Message::new();
        msg.set_list(prefixes::PACKAGE, ["Logger", "NoSqlDb"]);

        assert_eq!(msg.read_list(prefixes::PACKAGE), vec!["Logger", "NoSqlDb"]);
    }

    #[test]
    fn test_list_decoding_stops_at_first_gap() {
        let mut msg = Message::new();
        msg.insert("package-1", "Logger");
        msg.insert("package-3", "NoSqlDb");

        assert_eq!(msg.read_list(prefixes::PACKAGE), vec!["Logger"]);
    }

    #[test]
    fn test_list_decoding_of_absent_prefix_is_empty() {
        let msg = Message::new();
        assert!(msg.read_list(prefixes::FILE).is_empty());
    }

    #[test]
    fn test_bytes_round_trip() {
        let mut msg = Message::new();
        msg.set_command(commands::GET_REPO_PACKAGES);
        msg.insert(keys::USER_ID, "tester");

        let bytes = msg.to_bytes().unwrap();
        let parsed = Message::from_bytes(&bytes).unwrap();
        assert_eq!(parsed, msg);
    }

    #[test]
    fn test_from_bytes_rejects_non_object() {
        assert!(Message::from_bytes(b"[1, 2]").is_err());
        assert!(Message::from_bytes(b"not json").is_err());
    }
}
