// Sentence builder and reply parsing
//
// Outgoing sentences are built with a small fluent builder. Incoming
// replies are collected into a `Reply` (every sentence up to `!done` or
// `!fatal`) and inspected through typed accessors.

use std::collections::BTreeMap;
use std::fmt;

use crate::error::Error;

/// Control word that opens every reply sentence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyKind {
    /// `!done`: last sentence of a reply.
    Done,
    /// `!re`: one data record.
    Data,
    /// `!trap`: the command was rejected.
    Trap,
    /// `!fatal`: the router is closing the connection.
    Fatal,
}

impl ReplyKind {
    pub fn from_word(word: &str) -> Option<Self> {
        match word {
            "!done" => Some(Self::Done),
            "!re" => Some(Self::Data),
            "!trap" => Some(Self::Trap),
            "!fatal" => Some(Self::Fatal),
            _ => None,
        }
    }

    /// Whether this sentence ends the reply.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Fatal)
    }
}

/// Split an attribute word `=key=value` into `(key, value)`.
///
/// Only the first `=` after the leading one separates key and value, so
/// values may themselves contain `=`.
pub fn parse_attribute(word: &str) -> Option<(&str, &str)> {
    word.strip_prefix('=')?.split_once('=')
}

/// One request or reply unit: an ordered list of words.
///
/// The terminating zero-length word is implicit and never stored.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Sentence {
    words: Vec<String>,
}

impl Sentence {
    /// Start a sentence with a command path such as `/ppp/secret/print`.
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            words: vec![command.into()],
        }
    }

    pub fn from_words(words: Vec<String>) -> Self {
        Self { words }
    }

    /// Append an attribute word `=key=value`.
    pub fn attr(mut self, key: &str, value: &str) -> Self {
        self.words.push(format!("={key}={value}"));
        self
    }

    /// Append an attribute word only when `value` is present.
    pub fn attr_opt(self, key: &str, value: Option<&str>) -> Self {
        match value {
            Some(v) => self.attr(key, v),
            None => self,
        }
    }

    /// Append a query word `?key=value`.
    pub fn query(mut self, key: &str, value: &str) -> Self {
        self.words.push(format!("?{key}={value}"));
        self
    }

    pub fn words(&self) -> &[String] {
        &self.words
    }

    pub fn into_words(self) -> Vec<String> {
        self.words
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// First word, i.e. the command path or reply marker.
    pub fn command(&self) -> Option<&str> {
        self.words.first().map(String::as_str)
    }

    /// Reply marker, if this sentence came from the router.
    pub fn kind(&self) -> Option<ReplyKind> {
        self.command().and_then(ReplyKind::from_word)
    }

    /// Value of the first attribute named `key`.
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.words
            .iter()
            .filter_map(|w| parse_attribute(w))
            .find_map(|(k, v)| (k == key).then_some(v))
    }

    /// All attributes of this sentence, keyed by name.
    pub fn attributes(&self) -> BTreeMap<String, String> {
        self.words
            .iter()
            .filter_map(|w| parse_attribute(w))
            .map(|(k, v)| (k.to_owned(), v.to_owned()))
            .collect()
    }
}

impl fmt::Debug for Sentence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let words: Vec<&str> = self
            .words
            .iter()
            .map(|w| {
                if w.starts_with("=password=") {
                    "=password=[REDACTED]"
                } else {
                    w.as_str()
                }
            })
            .collect();
        f.debug_tuple("Sentence").field(&words).finish()
    }
}

/// Every sentence of one logical reply, up to and including the terminal one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reply {
    sentences: Vec<Sentence>,
}

impl Reply {
    pub fn new(sentences: Vec<Sentence>) -> Self {
        Self { sentences }
    }

    pub fn sentences(&self) -> &[Sentence] {
        &self.sentences
    }

    /// Flattened response set: every word of every sentence, in order.
    pub fn words(&self) -> impl Iterator<Item = &str> {
        self.sentences
            .iter()
            .flat_map(|s| s.words().iter().map(String::as_str))
    }

    pub fn into_words(self) -> Vec<String> {
        self.sentences
            .into_iter()
            .flat_map(Sentence::into_words)
            .collect()
    }

    pub fn is_done(&self) -> bool {
        self.sentences
            .iter()
            .any(|s| s.kind() == Some(ReplyKind::Done))
    }

    fn first_of(&self, kind: ReplyKind) -> Option<&Sentence> {
        self.sentences.iter().find(|s| s.kind() == Some(kind))
    }

    /// The `!trap` sentence, if the router rejected the command.
    pub fn trap(&self) -> Option<&Sentence> {
        self.first_of(ReplyKind::Trap)
    }

    /// `!re` data sentences in reply order.
    pub fn records(&self) -> impl Iterator<Item = &Sentence> {
        self.sentences
            .iter()
            .filter(|s| s.kind() == Some(ReplyKind::Data))
    }

    /// First value of attribute `key` anywhere in the reply.
    pub fn find_attribute(&self, key: &str) -> Option<&str> {
        self.sentences.iter().find_map(|s| s.attribute(key))
    }

    /// Turn `!trap` and `!fatal` replies into errors.
    pub fn into_result(self) -> Result<Self, Error> {
        if let Some(trap) = self.trap() {
            let message = trap
                .attribute("message")
                .unwrap_or("command rejected")
                .to_owned();
            return Err(Error::Trap {
                message,
                reply: self.into_words(),
            });
        }
        if let Some(fatal) = self.first_of(ReplyKind::Fatal) {
            let message = fatal
                .words()
                .get(1)
                .map_or("connection closed", String::as_str)
                .to_owned();
            return Err(Error::Fatal { message });
        }
        Ok(self)
    }
}
